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

use std::{net::Ipv4Addr, path::PathBuf};

use clap::Parser;
use log::info;

use loopsim::{compiler::RouteCompiler, topology::Topology};
use wtf::{
    config::{resolve_graph, LabConfig, OutputDirs},
    output::{trace_report, write_all},
};

/// Generate the router configurations, loop artifacts, and egress script of a forwarding-loop
/// testbed from a graph document.
#[derive(Debug, Parser)]
struct Cli {
    /// Graph document to read. Defaults to `$WTF_KNE_WORKDIR/out/$WTF_TOPOGRAPH`.
    #[clap(long = "graph", short = 'g')]
    graph: Option<PathBuf>,
    /// Output directory. Defaults to `$WTF_KNE_WORKDIR/out`.
    #[clap(long = "out", short = 'o')]
    out: Option<PathBuf>,
    /// Output directory of the egress script. Defaults to `$WTF_KNE_WORKDIR/egress/out`.
    #[clap(long = "egress-out")]
    egress_out: Option<PathBuf>,
    /// Generate the loop artifacts on the longest path.
    #[clap(long = "loop", short = 'l')]
    inject_loop: bool,
    /// TOML configuration file.
    #[clap(long = "config", short = 'c')]
    config: Option<PathBuf>,
    /// Trace all routers toward the probe address and print the result as JSON.
    #[clap(long = "trace", short = 't')]
    trace: bool,
    /// Destination of the traces, overriding the configuration.
    #[clap(long = "probe")]
    probe: Option<Ipv4Addr>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_timed();

    let args = Cli::parse();

    let mut cfg = LabConfig::load_or_default(args.config.as_ref())?;
    if let Some(probe) = args.probe {
        cfg.probe = probe;
    }

    let graph = resolve_graph(args.graph)?;
    let dirs = OutputDirs::resolve(args.out, args.egress_out)?;

    info!("Read graph from {}", graph.display());
    let topo = Topology::from_json(&std::fs::read_to_string(&graph)?)?;
    info!(
        "{} nodes, {} links, {} paths",
        topo.num_nodes(),
        topo.links().len(),
        topo.paths().len()
    );

    let comp = RouteCompiler::new(&topo)
        .address_pool(cfg.address_pool)
        .loop_injection(args.inject_loop)
        .compile()?;

    write_all(&topo, &comp, &cfg, &dirs)?;

    if args.trace {
        let report = trace_report(&topo, &comp, &cfg);
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
