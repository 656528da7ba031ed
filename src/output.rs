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

//! This module writes the generated artifacts to disk, and traces the compiled routing state.

use std::{
    fs,
    net::Ipv4Addr,
    path::{Path, PathBuf},
};

use log::{debug, info};
use serde::Serialize;

use loopsim::{
    compiler::Compilation,
    export::CfgGen,
    rib::StaticRib,
    topology::Topology,
    tracer::{PathTracer, TracedPath},
    types::RouterId,
};

use crate::{
    config::{LabConfig, OutputDirs},
    Error,
};

/// Write all artifacts of a compiled topology: one configuration per router, the loop artifacts,
/// the topology descriptor, and the egress setup script. Returns the paths of all written files in
/// the order they were written.
pub fn write_all(
    topo: &Topology,
    comp: &Compilation,
    cfg: &LabConfig,
    dirs: &OutputDirs,
) -> Result<Vec<PathBuf>, Error> {
    fs::create_dir_all(&dirs.out)?;
    fs::create_dir_all(&dirs.egress_out)?;

    let gen = CfgGen::new(topo, comp)
        .network_instance(cfg.network_instance.as_str())
        .ttl_filter(cfg.ttl_filter.as_str());
    let mut written = Vec::new();

    for (name, content) in gen.router_configs()? {
        written.push(write_file(&dirs.out, &name, &content)?);
    }
    for r in topo.routers() {
        debug!("{}: {}", topo.name(r), gen.route_summary(r));
    }

    for (name, content) in gen.loop_configs() {
        written.push(write_file(&dirs.out, &name, &content)?);
    }

    let descriptor = serde_json::to_string_pretty(&gen.descriptor())?;
    written.push(write_file(&dirs.out, &cfg.topology_file, &descriptor)?);

    let script = gen.egress_script()?;
    written.push(write_file(&dirs.egress_out, &cfg.egress_script, &script)?);

    info!("Wrote {} files", written.len());
    Ok(written)
}

/// Write a single file and log it.
fn write_file(dir: &Path, name: &str, content: &str) -> Result<PathBuf, Error> {
    let path = dir.join(name);
    fs::write(&path, content)?;
    info!("Wrote {}", path.display());
    Ok(path)
}

/// Traces of all routers toward a single destination, before and after injecting the loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceReport {
    /// The traced destination
    pub probe: Ipv4Addr,
    /// Traces on the compiled state
    pub before: Vec<TracedPath>,
    /// Traces after applying the loop artifact, if one exists.
    pub with_loop: Option<Vec<TracedPath>>,
}

impl TraceReport {
    /// Sources whose trace ends in a forwarding loop once the loop is applied.
    pub fn looping_sources(&self) -> Vec<RouterId> {
        self.with_loop
            .iter()
            .flatten()
            .filter(|t| t.is_loop())
            .map(|t| t.source)
            .collect()
    }
}

/// Trace all routers toward `cfg.probe`, first on the compiled state and then, if the compilation
/// carries a loop artifact, with the loop applied.
pub fn trace_report(topo: &Topology, comp: &Compilation, cfg: &LabConfig) -> TraceReport {
    let sources: Vec<RouterId> = topo.routers().collect();

    let mut rib = StaticRib::from_compilation_with_uplink(topo, comp, &cfg.egress_uplink);
    let before = PathTracer::new(&rib)
        .max_recursion(cfg.max_recursion)
        .trace_all(&sources, cfg.probe);

    let with_loop = comp.loop_artifact().map(|artifact| {
        rib.apply_rule(&artifact.create);
        PathTracer::new(&rib)
            .max_recursion(cfg.max_recursion)
            .trace_all(&sources, cfg.probe)
    });

    for t in before.iter().chain(with_loop.iter().flatten()) {
        debug!("{:?}: {:?}", t.names(), t.termination);
    }

    TraceReport {
        probe: cfg.probe,
        before,
        with_loop,
    }
}
