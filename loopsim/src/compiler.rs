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

//! # Route Compiler
//!
//! The [`RouteCompiler`] takes a validated [`Topology`], assigns addresses to all links, and
//! derives, for every node, the routing rules that realize all paths toward the egress. For a path
//! `[n0, n1, ..., nk]` (with `nk` being the egress), it generates:
//!
//! 1. A default route on every `ni` (`i < k`) via `n(i+1)`.
//! 2. A host route on the egress toward the address of every `ni` (`i < k - 1`) facing `n(i+1)`,
//!    always via the last router `n(k-1)`.
//! 3. A host route on every `nj` (`i + 2 <= j <= k - 1`) toward the address of `ni` facing
//!    `n(i+1)`, via `n(j-1)`.
//!
//! Optionally, the compiler generates a [`LoopArtifact`] on the longest path, and it always
//! generates one [`TtlCounter`] per router interface.

use std::{
    collections::{btree_map::Entry, BTreeMap},
    net::Ipv4Addr,
};

use ipnet::Ipv4Net;
use lazy_static::lazy_static;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    addressor::{Addressor, DEFAULT_ADDRESS_POOL},
    topology::Topology,
    types::{Iface, PathId, RouterId, TopologyError},
};

lazy_static! {
    /// The default route, `0.0.0.0/0`.
    pub static ref DEFAULT_ROUTE: Ipv4Net = Ipv4Net::default();
}

/// The kind of a routing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RuleKind {
    /// Default route toward the successor on the path.
    Default,
    /// Host route on a router toward an upstream router on the same path.
    StaticTowardEgress,
    /// Host route on the egress back toward a router on a path.
    StaticFromEgress,
}

/// A single routing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteRule {
    /// The node on which the rule is installed.
    pub owner: RouterId,
    /// Destination prefix.
    pub destination: Ipv4Net,
    /// The node that owns the next-hop address.
    pub next_hop: RouterId,
    /// The next-hop address.
    pub via: Ipv4Addr,
    /// Kind of the rule
    pub kind: RuleKind,
}

impl RouteRule {
    /// Check if this rule is a default route.
    pub fn is_default(&self) -> bool {
        self.destination == *DEFAULT_ROUTE
    }
}

/// A pair of rules that transiently misdirect the default route of a router into a forwarding
/// loop, and restore it afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopArtifact {
    /// The router whose default route is redirected.
    pub looped_router: RouterId,
    /// The source router of the path on which the loop is injected.
    pub path_source: RouterId,
    /// The id of that path.
    pub path_id: PathId,
    /// Rule that creates the loop (default route of `looped_router` pointing upstream).
    pub create: RouteRule,
    /// Rule that restores the original default route.
    pub undo: RouteRule,
}

/// Instrumentation rule: count the TTL-expiry notifications a router emits on one interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TtlCounter {
    /// The router
    pub router: RouterId,
    /// The neighbor connected to the interface.
    pub neighbor: RouterId,
    /// The interface.
    pub iface: Iface,
}

/// The result of compiling a topology.
#[derive(Debug, Clone)]
pub struct Compilation {
    addressor: Addressor,
    egress: RouterId,
    rules: BTreeMap<RouterId, BTreeMap<Ipv4Net, RouteRule>>,
    counters: BTreeMap<RouterId, Vec<TtlCounter>>,
    loop_artifact: Option<LoopArtifact>,
}

impl Compilation {
    /// The address assignment.
    pub fn addressor(&self) -> &Addressor {
        &self.addressor
    }

    /// All rules of a node, sorted by destination.
    pub fn rules_of(&self, r: RouterId) -> impl Iterator<Item = &RouteRule> {
        self.rules.get(&r).into_iter().flat_map(|x| x.values())
    }

    /// All rules of all nodes, sorted by owner and destination.
    pub fn rules(&self) -> impl Iterator<Item = &RouteRule> {
        self.rules.values().flat_map(|x| x.values())
    }

    /// All rules installed on the egress.
    pub fn egress_rules(&self) -> impl Iterator<Item = &RouteRule> {
        self.rules_of(self.egress)
    }

    /// The rule of router `r` for exactly the prefix `destination`.
    pub fn rule(&self, r: RouterId, destination: Ipv4Net) -> Option<&RouteRule> {
        self.rules.get(&r)?.get(&destination)
    }

    /// The default route of router `r`.
    pub fn default_rule(&self, r: RouterId) -> Option<&RouteRule> {
        self.rule(r, *DEFAULT_ROUTE)
    }

    /// The TTL counters of a router (one per interface, sorted by interface index).
    pub fn counters_of(&self, r: RouterId) -> &[TtlCounter] {
        self.counters.get(&r).map(|x| x.as_slice()).unwrap_or_default()
    }

    /// The loop artifact, if loop injection was enabled.
    pub fn loop_artifact(&self) -> Option<&LoopArtifact> {
        self.loop_artifact.as_ref()
    }
}

/// Compiler of a topology into addresses and routing rules.
///
/// ```
/// use loopsim::prelude::*;
///
/// # fn main() -> Result<(), TopologyError> {
/// let doc = GraphDocument::build(4, [(0, 1), (1, 2), (2, 3)], [(0, vec![0, 1, 2, 3])]);
/// let topo = Topology::from_document(&doc)?;
/// let comp = RouteCompiler::new(&topo).loop_injection(true).compile()?;
///
/// let artifact = comp.loop_artifact().unwrap();
/// assert_eq!(artifact.looped_router, RouterId::from(2));
/// assert_eq!(artifact.create.next_hop, RouterId::from(0));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RouteCompiler<'a> {
    topo: &'a Topology,
    pool: Ipv4Net,
    inject_loop: bool,
}

impl<'a> RouteCompiler<'a> {
    /// Create a new compiler for the topology, using the default address pool and no loop
    /// injection.
    pub fn new(topo: &'a Topology) -> Self {
        Self {
            topo,
            pool: *DEFAULT_ADDRESS_POOL,
            inject_loop: false,
        }
    }

    /// Use a different address pool for the links.
    pub fn address_pool(mut self, pool: Ipv4Net) -> Self {
        self.pool = pool;
        self
    }

    /// Enable or disable the loop injection.
    pub fn loop_injection(mut self, enable: bool) -> Self {
        self.inject_loop = enable;
        self
    }

    /// Compile the topology. The result only depends on the topology and the compiler settings.
    pub fn compile(&self) -> Result<Compilation, TopologyError> {
        let topo = self.topo;

        // pick the loop path first, so that we fail before doing any work.
        let loop_path = if self.inject_loop {
            Some(self.longest_path()?)
        } else {
            None
        };

        let mut addressor = Addressor::new(self.pool)?;
        for (a, b) in topo.links() {
            addressor.allocate(*a, *b)?;
        }

        let mut rules: BTreeMap<RouterId, BTreeMap<Ipv4Net, RouteRule>> = BTreeMap::new();
        for (pid, path) in topo.paths() {
            if path.len() < 2 {
                debug!("skip path {pid} with {} node", path.len());
                continue;
            }
            debug!(
                "compile path {pid}: {}",
                path.iter().map(|r| topo.name(*r)).collect::<Vec<_>>().join(" -> ")
            );
            for rule in path_rules(&addressor, path)? {
                insert_rule(&mut rules, rule)?;
            }
        }

        let loop_artifact = match loop_path {
            Some(pid) => Some(self.loop_artifact(pid, &addressor, &rules)?),
            None => None,
        };

        let counters = topo
            .routers()
            .map(|r| {
                let cs = addressor
                    .list_ifaces(r)
                    .into_iter()
                    .map(|(neighbor, iface)| TtlCounter {
                        router: r,
                        neighbor,
                        iface,
                    })
                    .collect();
                (r, cs)
            })
            .collect();

        Ok(Compilation {
            addressor,
            egress: topo.egress(),
            rules,
            counters,
            loop_artifact,
        })
    }

    /// Find the longest path. Paths are compared in ascending order of their id, and the first
    /// one with the largest number of nodes wins.
    fn longest_path(&self) -> Result<PathId, TopologyError> {
        let mut best: Option<(PathId, usize)> = None;
        for (pid, path) in self.topo.paths() {
            if best.map(|(_, len)| path.len() > len).unwrap_or(true) {
                best = Some((*pid, path.len()));
            }
        }
        let (pid, len) = best.ok_or(TopologyError::NoPaths)?;
        if len < 4 {
            return Err(TopologyError::PathTooShortForLoop(pid, len));
        }
        Ok(pid)
    }

    /// Build the loop artifact on the path `pid`, which has at least 4 nodes.
    fn loop_artifact(
        &self,
        pid: PathId,
        addressor: &Addressor,
        rules: &BTreeMap<RouterId, BTreeMap<Ipv4Net, RouteRule>>,
    ) -> Result<LoopArtifact, TopologyError> {
        let path = self
            .topo
            .path(pid)
            .ok_or(TopologyError::PathTooShortForLoop(pid, 0))?;
        let k = path.len() - 1;
        let r = path[k - 1];
        let far = path[k - 3];

        let undo = *rules
            .get(&r)
            .and_then(|x| x.get(&*DEFAULT_ROUTE))
            .ok_or(TopologyError::PathTooShortForLoop(pid, path.len()))?;
        let create = RouteRule {
            owner: r,
            destination: *DEFAULT_ROUTE,
            next_hop: far,
            via: addressor.iface_address(far, path[k - 2])?,
            kind: RuleKind::Default,
        };

        info!(
            "inject a loop on path {pid}: {} redirects its default route to {}",
            self.topo.name(r),
            self.topo.name(far)
        );

        Ok(LoopArtifact {
            looped_router: r,
            path_source: path[0],
            path_id: pid,
            create,
            undo,
        })
    }
}

/// Generate all rules for a single path of at least two nodes.
fn path_rules(addressor: &Addressor, path: &[RouterId]) -> Result<Vec<RouteRule>, TopologyError> {
    let k = path.len() - 1;
    let egress = path[k];
    let last = path[k - 1];
    let mut rules = Vec::new();

    for i in 0..k {
        rules.push(RouteRule {
            owner: path[i],
            destination: *DEFAULT_ROUTE,
            next_hop: path[i + 1],
            via: addressor.iface_address(path[i + 1], path[i])?,
            kind: RuleKind::Default,
        });
    }

    let egress_via = addressor.iface_address(last, egress)?;
    for i in 0..k - 1 {
        rules.push(RouteRule {
            owner: egress,
            destination: Ipv4Net::from(addressor.iface_address(path[i], path[i + 1])?),
            next_hop: last,
            via: egress_via,
            kind: RuleKind::StaticFromEgress,
        });
    }

    for i in 0..k.saturating_sub(2) {
        let destination = Ipv4Net::from(addressor.iface_address(path[i], path[i + 1])?);
        for j in i + 2..k {
            rules.push(RouteRule {
                owner: path[j],
                destination,
                next_hop: path[j - 1],
                via: addressor.iface_address(path[j - 1], path[j])?,
                kind: RuleKind::StaticTowardEgress,
            });
        }
    }

    Ok(rules)
}

/// Insert a rule, keyed by its owner and destination. Inserting the same rule twice is a no-op.
fn insert_rule(
    rules: &mut BTreeMap<RouterId, BTreeMap<Ipv4Net, RouteRule>>,
    rule: RouteRule,
) -> Result<(), TopologyError> {
    match rules.entry(rule.owner).or_default().entry(rule.destination) {
        Entry::Vacant(e) => {
            e.insert(rule);
            Ok(())
        }
        Entry::Occupied(e) if e.get().next_hop == rule.next_hop && e.get().via == rule.via => {
            Ok(())
        }
        Entry::Occupied(e) => Err(TopologyError::ConflictingRoute {
            router: rule.owner,
            destination: rule.destination,
            existing: e.get().next_hop,
            new: rule.next_hop,
        }),
    }
}
