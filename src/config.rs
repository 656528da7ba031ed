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

//! This module contains the code for reading the configuration and resolving paths.

use std::{
    net::Ipv4Addr,
    path::{Path, PathBuf},
};

use ipnet::Ipv4Net;
use lazy_static::lazy_static;
use log::debug;
use serde::{Deserialize, Serialize};

use loopsim::{
    addressor::DEFAULT_ADDRESS_POOL,
    export::{DEFAULT_NETWORK_INSTANCE, DEFAULT_TTL_FILTER},
    rib::EGRESS_UPLINK,
    tracer::DEFAULT_MAX_RECURSION,
};

use crate::Error;

lazy_static! {
    /// Working directory of the testbed (`WTF_KNE_WORKDIR`). Generated files are written to
    /// `<workdir>/out`, and the egress script to `<workdir>/egress/out`.
    pub static ref KNE_WORKDIR: Option<PathBuf> =
        std::env::var_os("WTF_KNE_WORKDIR").map(PathBuf::from);
    /// File name of the graph document inside `<workdir>/out` (`WTF_TOPOGRAPH`).
    pub static ref TOPOGRAPH: Option<String> = std::env::var("WTF_TOPOGRAPH").ok();
    /// File name of the topology descriptor (`WTF_TOPOFILE`).
    pub static ref TOPOFILE: Option<String> = std::env::var("WTF_TOPOFILE").ok();
}

/// Configuration of the testbed. Every field has a default value, such that an empty file (or no
/// file at all) is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    /// Address pool from which the `/31` link networks are allocated. The default is
    /// `192.168.0.0/24`, which supports 128 links.
    pub address_pool: Ipv4Net,
    /// The network instance configured on all routers (`DEFAULT`).
    pub network_instance: String,
    /// Name of the ACL that counts TTL-exceeded messages (`wtf_ttl_filter`).
    pub ttl_filter: String,
    /// Interface of the egress host that leads out of the testbed (`eth0`).
    pub egress_uplink: String,
    /// Bound on the recursive resolution of indirect next hops while tracing (8).
    pub max_recursion: usize,
    /// Destination address used when tracing the compiled routing state (`8.8.8.8`).
    pub probe: Ipv4Addr,
    /// File name of the topology descriptor, unless `WTF_TOPOFILE` is set
    /// (`topology.json`).
    pub topology_file: String,
    /// File name of the egress setup script (`egress_setup_ifaces.sh`).
    pub egress_script: String,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            address_pool: *DEFAULT_ADDRESS_POOL,
            network_instance: DEFAULT_NETWORK_INSTANCE.to_string(),
            ttl_filter: DEFAULT_TTL_FILTER.to_string(),
            egress_uplink: EGRESS_UPLINK.to_string(),
            max_recursion: DEFAULT_MAX_RECURSION,
            probe: Ipv4Addr::new(8, 8, 8, 8),
            topology_file: TOPOFILE
                .clone()
                .unwrap_or_else(|| "topology.json".to_string()),
            egress_script: "egress_setup_ifaces.sh".to_string(),
        }
    }
}

impl LabConfig {
    /// Parse the configuration from a TOML string.
    pub fn from_toml(s: &str) -> Result<Self, Error> {
        Ok(toml::from_str(s)?)
    }

    /// Read the configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        debug!("read configuration from {}", path.display());
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    /// Read the configuration from `path` if given, or use the default configuration.
    pub fn load_or_default(path: Option<impl AsRef<Path>>) -> Result<Self, Error> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

/// Output directories of the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDirs {
    /// Directory of the router configurations, loop artifacts, and the topology descriptor.
    pub out: PathBuf,
    /// Directory of the egress setup script.
    pub egress_out: PathBuf,
}

impl OutputDirs {
    /// Resolve the output directories. Without an explicit `out`, the directory
    /// `$WTF_KNE_WORKDIR/out` is used. Without an explicit `egress_out`, the directory
    /// `$WTF_KNE_WORKDIR/egress/out` is used if the variable is set, and `out` otherwise.
    pub fn resolve(out: Option<PathBuf>, egress_out: Option<PathBuf>) -> Result<Self, Error> {
        Self::resolve_with(out, egress_out, KNE_WORKDIR.as_deref())
    }

    /// Resolve the output directories relative to the given working directory.
    pub fn resolve_with(
        out: Option<PathBuf>,
        egress_out: Option<PathBuf>,
        workdir: Option<&Path>,
    ) -> Result<Self, Error> {
        let out = match (out, workdir) {
            (Some(out), _) => out,
            (None, Some(w)) => w.join("out"),
            (None, None) => return Err(Error::MissingPath("output directory", "WTF_KNE_WORKDIR")),
        };
        let egress_out = match (egress_out, workdir) {
            (Some(e), _) => e,
            (None, Some(w)) => w.join("egress").join("out"),
            (None, None) => out.clone(),
        };
        Ok(Self { out, egress_out })
    }
}

/// Resolve the path of the graph document. Without an explicit path, the file `$WTF_TOPOGRAPH`
/// inside `$WTF_KNE_WORKDIR/out` is used.
pub fn resolve_graph(graph: Option<PathBuf>) -> Result<PathBuf, Error> {
    resolve_graph_with(graph, KNE_WORKDIR.as_deref(), TOPOGRAPH.as_deref())
}

/// Resolve the path of the graph document relative to the given working directory and file name.
pub fn resolve_graph_with(
    graph: Option<PathBuf>,
    workdir: Option<&Path>,
    topograph: Option<&str>,
) -> Result<PathBuf, Error> {
    if let Some(graph) = graph {
        return Ok(graph);
    }
    let workdir = workdir.ok_or(Error::MissingPath("graph document", "WTF_KNE_WORKDIR"))?;
    let file = topograph.ok_or(Error::MissingPath("graph document", "WTF_TOPOGRAPH"))?;
    Ok(workdir.join("out").join(file))
}
