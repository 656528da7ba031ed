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

//! # Export
//!
//! This module renders a [`Compilation`] into the artifacts that are pushed to the testbed: the
//! configuration of every router (SR Linux `set` commands), the shell script of the egress host,
//! the loop create/undo configurations, and a JSON descriptor of the topology.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    addressor::AddressError,
    compiler::{Compilation, RouteRule},
    topology::Topology,
    types::{NodeRole, RouterId, DUT_NAME_PREFIX},
};

pub mod linux;
pub mod srlinux;

/// Default network instance on all routers.
pub const DEFAULT_NETWORK_INSTANCE: &str = "DEFAULT";
/// Default name of the ACL that counts TTL-exceeded messages.
pub const DEFAULT_TTL_FILTER: &str = "wtf_ttl_filter";

/// Error thrown by the exporter
#[derive(Debug, Error, PartialEq)]
pub enum ExportError {
    /// Address lookup failed
    #[error("{0}")]
    Address(#[from] AddressError),
    /// The node is not a router.
    #[error("Node {0:?} is not a router")]
    NotARouter(RouterId),
}

/// Which half of a loop artifact a file contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoopAction {
    /// Redirect the default route into the loop.
    Create,
    /// Restore the original default route.
    Undo,
}

impl LoopAction {
    fn as_str(&self) -> &'static str {
        match self {
            LoopAction::Create => "create",
            LoopAction::Undo => "undo",
        }
    }
}

/// File name of a loop artifact, e.g. `loop_create_srl3_src_srl0.cfg`.
pub fn loop_artifact_name(action: LoopAction, looped: RouterId, source: RouterId) -> String {
    format!(
        "loop_{}_{DUT_NAME_PREFIX}{}_src_{DUT_NAME_PREFIX}{}.cfg",
        action.as_str(),
        looped.index(),
        source.index()
    )
}

/// Recover the action, the looped router, and the path source from a loop artifact file name.
///
/// ```
/// # use loopsim::export::{parse_loop_artifact_name, LoopAction};
/// # use loopsim::types::RouterId;
/// assert_eq!(
///     parse_loop_artifact_name("loop_undo_srl3_src_srl0.cfg"),
///     Some((LoopAction::Undo, RouterId::from(3), RouterId::from(0)))
/// );
/// assert_eq!(parse_loop_artifact_name("srl3.cfg"), None);
/// ```
pub fn parse_loop_artifact_name(name: &str) -> Option<(LoopAction, RouterId, RouterId)> {
    let rest = name.strip_prefix("loop_")?.strip_suffix(".cfg")?;
    let (action, rest) = rest.split_once('_')?;
    let action = match action {
        "create" => LoopAction::Create,
        "undo" => LoopAction::Undo,
        _ => return None,
    };
    let (looped, source) = rest.split_once("_src_")?;
    let looped: u32 = looped.strip_prefix(DUT_NAME_PREFIX)?.parse().ok()?;
    let source: u32 = source.strip_prefix(DUT_NAME_PREFIX)?.parse().ok()?;
    Some((action, looped.into(), source.into()))
}

/// Name of the next-hop group used for routes via `next_hop`.
pub fn group_name(next_hop: RouterId) -> String {
    format!("grp-{}", next_hop.index())
}

/// Interface entry of the topology descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDescriptor {
    /// Interface name, e.g. `ethernet-1/1`
    pub name: String,
    /// Interface key, e.g. `e1-1`
    pub key: String,
    /// Address with prefix length
    pub address: String,
}

/// Node entry of the topology descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// Name of the node
    pub name: String,
    /// Role of the node
    pub role: NodeRole,
    /// All interfaces, sorted by their index.
    pub interfaces: Vec<InterfaceDescriptor>,
}

/// Link entry of the topology descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDescriptor {
    /// First node
    pub a_node: String,
    /// Interface key of the first node
    pub a_int: String,
    /// Second node
    pub z_node: String,
    /// Interface key of the second node
    pub z_int: String,
}

/// Description of the whole testbed topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyDescriptor {
    /// All nodes
    pub nodes: Vec<NodeDescriptor>,
    /// All links in the order of address allocation.
    pub links: Vec<LinkDescriptor>,
}

/// Configuration generator for a compiled topology.
#[derive(Debug)]
pub struct CfgGen<'a> {
    topo: &'a Topology,
    comp: &'a Compilation,
    network_instance: String,
    ttl_filter: String,
}

impl<'a> CfgGen<'a> {
    /// Create a new config generator with the default network instance and filter name.
    pub fn new(topo: &'a Topology, comp: &'a Compilation) -> Self {
        Self {
            topo,
            comp,
            network_instance: DEFAULT_NETWORK_INSTANCE.to_string(),
            ttl_filter: DEFAULT_TTL_FILTER.to_string(),
        }
    }

    /// Set the network instance used on all routers.
    pub fn network_instance(mut self, name: impl Into<String>) -> Self {
        self.network_instance = name.into();
        self
    }

    /// Set the name of the ACL that counts TTL-exceeded messages.
    pub fn ttl_filter(mut self, name: impl Into<String>) -> Self {
        self.ttl_filter = name.into();
        self
    }

    /// Generate the entire configuration of a router: interfaces, the TTL filter attached to every
    /// subinterface, and all static routes.
    pub fn router_config(&self, router: RouterId) -> Result<String, ExportError> {
        if self.topo.role(router) != Some(NodeRole::Router) {
            return Err(ExportError::NotARouter(router));
        }
        let ni = self.network_instance.as_str();
        let mut config = String::new();

        for (_, iface) in self.comp.addressor().list_ifaces(router) {
            config.push_str(
                &srlinux::Interface::new(iface.name())
                    .address(iface.addr_with_len())
                    .network_instance(ni)
                    .build(),
            );
        }

        let mut filter = srlinux::TtlFilter::new(self.ttl_filter.as_str());
        for counter in self.comp.counters_of(router) {
            filter.attach(counter.iface.subiface());
        }
        config.push_str(&filter.build());

        let rules = self.comp.rules_of(router).collect::<Vec<_>>();
        let groups: BTreeMap<RouterId, std::net::Ipv4Addr> =
            rules.iter().map(|r| (r.next_hop, r.via)).collect();
        for (nh, via) in groups {
            config.push_str(&srlinux::NextHopGroup::new(group_name(nh), via).build(ni));
        }
        for rule in rules {
            config.push_str(&self.static_route(rule));
        }

        Ok(config)
    }

    /// Render a single rule as a next-hop group and a static route.
    fn static_route(&self, rule: &RouteRule) -> String {
        srlinux::StaticRoute::new(rule.destination)
            .next_hop_group(group_name(rule.next_hop))
            .build(&self.network_instance)
    }

    /// Render a single rule including its next-hop group.
    fn standalone_rule(&self, rule: &RouteRule) -> String {
        let ni = self.network_instance.as_str();
        let mut config = srlinux::NextHopGroup::new(group_name(rule.next_hop), rule.via).build(ni);
        config.push_str(&self.static_route(rule));
        config
    }

    /// Generate the shell script of the egress host. All addresses are assigned before any route is
    /// added.
    pub fn egress_script(&self) -> Result<String, ExportError> {
        let egress = self.topo.egress();
        let addressor = self.comp.addressor();
        let mut script = String::new();
        for (_, iface) in addressor.list_ifaces(egress) {
            script.push_str(&linux::IpAddr::new(iface.addr_with_len(), iface.key()).build());
        }
        for rule in self.comp.egress_rules() {
            let iface = addressor.iface(egress, rule.next_hop)?;
            script.push_str(
                &linux::IpRoute::new(rule.destination)
                    .via(rule.via)
                    .dev(iface.key())
                    .src(iface.addr)
                    .build(),
            );
        }
        Ok(script)
    }

    /// Generate the loop artifacts as `(file name, content)` pairs: first the create, then the
    /// undo configuration. Returns an empty vector if no loop was injected.
    pub fn loop_configs(&self) -> Vec<(String, String)> {
        self.comp
            .loop_artifact()
            .map(|a| {
                vec![
                    (
                        loop_artifact_name(LoopAction::Create, a.looped_router, a.path_source),
                        self.standalone_rule(&a.create),
                    ),
                    (
                        loop_artifact_name(LoopAction::Undo, a.looped_router, a.path_source),
                        self.standalone_rule(&a.undo),
                    ),
                ]
            })
            .unwrap_or_default()
    }

    /// Generate all router configurations as `(file name, content)` pairs, sorted by router id.
    pub fn router_configs(&self) -> Result<Vec<(String, String)>, ExportError> {
        self.topo
            .routers()
            .map(|r| Ok((format!("{}.cfg", self.topo.name(r)), self.router_config(r)?)))
            .collect()
    }

    /// Generate the descriptor of the topology.
    pub fn descriptor(&self) -> TopologyDescriptor {
        let addressor = self.comp.addressor();
        let nodes = self
            .topo
            .nodes()
            .map(|r| NodeDescriptor {
                name: self.topo.name(r),
                role: self.topo.role(r).unwrap_or(NodeRole::Router),
                interfaces: addressor
                    .list_ifaces(r)
                    .into_iter()
                    .map(|(_, i)| InterfaceDescriptor {
                        name: i.name(),
                        key: i.key(),
                        address: i.addr_with_len().to_string(),
                    })
                    .collect(),
            })
            .collect();
        let links = addressor
            .list_links()
            .iter()
            .map(|l| LinkDescriptor {
                a_node: self.topo.name(l.a),
                a_int: l.a_iface.key(),
                z_node: self.topo.name(l.b),
                z_int: l.b_iface.key(),
            })
            .collect();
        TopologyDescriptor { nodes, links }
    }

    /// One-line summary of all routes of a node, for logging.
    pub fn route_summary(&self, router: RouterId) -> String {
        self.comp
            .rules_of(router)
            .map(|r| format!("{} -> {}", r.destination, self.topo.name(r.next_hop)))
            .join(", ")
    }
}
