// LoopSim: Forwarding Loop Testbed Compiler written in Rust
// Copyright (C) 2022-2023 Tibor Schneider <sctibor@ethz.ch>
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

#![deny(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # LoopSim
//!
//! This is a library for building point-to-point router testbeds in which transient forwarding
//! loops can be injected and observed.
//!
//! ## Main Concepts
//!
//! A [`topology::Topology`] is built from a graph document, which contains routers, links, and the
//! forwarding paths toward a single egress node. The [`compiler::RouteCompiler`] assigns a `/31` to
//! every link (using the [`addressor::Addressor`]), and derives the default and static routes that
//! realize all paths. Optionally, it generates a [`compiler::LoopArtifact`], a pair of rules that
//! redirect the default route of one router upstream (creating a loop), and restore it again.
//! The [`export`] module renders the compilation into router configurations.
//!
//! The [`tracer::PathTracer`] reconstructs the path of a packet by walking the routing tables of
//! the routers, as exposed by any [`tracer::RouteTableProvider`]. The crate ships with the
//! [`rib::StaticRib`], an in-memory provider built directly from a compilation.
//!
//! ## Optional Features
//!
//! - `export`: The [`export`] module that generates SR Linux configuration and `iproute2`
//!   commands (enabled by default).
//!
//! ## Example usage
//!
//! ```
//! use loopsim::prelude::*;
//!
//! fn main() -> Result<(), TopologyError> {
//!     let doc = GraphDocument::build(
//!         5,
//!         [(0, 1), (1, 2), (2, 3), (3, 4)],
//!         [(0, vec![0, 1, 2, 3, 4])],
//!     );
//!     let topo = Topology::from_document(&doc)?;
//!     let comp = RouteCompiler::new(&topo).loop_injection(true).compile()?;
//!
//!     let r = |x: u32| RouterId::from(x);
//!     let probe = "8.8.8.8".parse().unwrap();
//!     let mut rib = StaticRib::from_compilation(&topo, &comp);
//!     let path = PathTracer::new(&rib).trace(r(0), probe);
//!     assert_eq!(path.routers(), vec![r(0), r(1), r(2), r(3), r(4)]);
//!     assert!(path.is_ok());
//!
//!     // inject the loop
//!     let artifact = comp.loop_artifact().unwrap();
//!     rib.apply_rule(&artifact.create);
//!     let path = PathTracer::new(&rib).trace(r(0), probe);
//!     assert_eq!(path.routers(), vec![r(0), r(1), r(2), r(3), r(1)]);
//!     assert!(path.is_loop());
//!
//!     Ok(())
//! }
//! ```

pub mod addressor;
pub mod compiler;
#[cfg(feature = "export")]
#[cfg_attr(docsrs, doc(cfg(feature = "export")))]
pub mod export;
pub mod prelude;
pub mod rib;
pub mod topology;
pub mod tracer;
pub mod types;

#[cfg(test)]
mod test;
