// WTF: Forwarding loop testbed generator
// Copyright (C) 2023 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! # WTF: Forwarding loop testbed generator
//!
//! This crate turns a graph document (routers, links, and the paths toward a single egress) into a
//! router testbed: one SR Linux configuration per router, the setup script of the egress host, and
//! a pair of configurations that inject and retract a transient forwarding loop. The heavy lifting
//! is done by [`loopsim`]; this crate adds the configuration file, the output directory layout, and
//! the command-line tool `gen-topo-testbed`.
//!
//! ## Structure
//! - The module [`config`] reads the [`config::LabConfig`] (a TOML file) and resolves input and
//!   output paths from the command line or the environment (`WTF_TOPOGRAPH`,
//!   `WTF_KNE_WORKDIR`).
//! - The module [`output`] writes all artifacts of a compilation, and traces the compiled routing
//!   state offline.

#![deny(
    missing_docs,
    clippy::missing_docs_in_private_items,
    missing_debug_implementations,
    rust_2018_idioms
)]

use thiserror::Error;

use loopsim::{export::ExportError, types::TopologyError};

pub mod config;
pub mod output;
#[cfg(test)]
mod test;

/// Errors of the testbed generator.
#[derive(Debug, Error)]
pub enum Error {
    /// The graph document is invalid, or compilation failed.
    #[error("{0}")]
    Topology(#[from] TopologyError),
    /// Rendering the configuration failed.
    #[error("{0}")]
    Export(#[from] ExportError),
    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration file cannot be parsed.
    #[error("Cannot parse the configuration: {0}")]
    Toml(#[from] toml::de::Error),
    /// Serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// A path is neither given explicitly nor derivable from the environment.
    #[error("No {0} given, and the environment variable `{1}` is not set")]
    MissingPath(&'static str, &'static str),
}
