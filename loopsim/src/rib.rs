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

//! In-memory routing state, built from a [`Compilation`]. The [`StaticRib`] implements
//! [`RouteTableProvider`], such that the routing state produced by the compiler can be traced
//! without any live router.

use std::{collections::HashMap, net::Ipv4Addr};

use ipnet::Ipv4Net;
use log::debug;
use prefix_trie::PrefixMap;

use crate::{
    compiler::{Compilation, RouteRule, DEFAULT_ROUTE},
    topology::Topology,
    tracer::{Interface, NextHop, RouteMatch, RouteTableProvider, TraceError},
    types::{Ipv4Prefix, RouterId},
};

/// Name of the uplink interface of the egress, which leaves the modeled network.
pub const EGRESS_UPLINK: &str = "eth0";

#[derive(Debug, Clone)]
struct RibIface {
    net: Ipv4Net,
    iface: Interface,
    neighbors: Vec<RouterId>,
}

/// Routing tables of all nodes of a compiled topology.
///
/// Every node has a connected route for each of its links, and the static and default routes
/// generated by the compiler. The egress additionally has a default route on its uplink interface
/// (without any neighbor), such that traffic to external destinations exits the network there.
#[derive(Debug, Clone)]
pub struct StaticRib {
    names: HashMap<RouterId, String>,
    tables: HashMap<RouterId, PrefixMap<Ipv4Prefix, RouteMatch>>,
    ifaces: HashMap<RouterId, Vec<RibIface>>,
    owners: HashMap<Ipv4Addr, (RouterId, Interface)>,
}

impl StaticRib {
    /// Build the routing tables from a compilation, using the default egress uplink `eth0`.
    pub fn from_compilation(topo: &Topology, comp: &Compilation) -> Self {
        Self::from_compilation_with_uplink(topo, comp, EGRESS_UPLINK)
    }

    /// Build the routing tables from a compilation, naming the uplink of the egress `uplink`.
    pub fn from_compilation_with_uplink(topo: &Topology, comp: &Compilation, uplink: &str) -> Self {
        let mut rib = Self {
            names: topo.nodes().map(|r| (r, topo.name(r))).collect(),
            tables: topo.nodes().map(|r| (r, PrefixMap::default())).collect(),
            ifaces: HashMap::new(),
            owners: HashMap::new(),
        };

        for link in comp.addressor().list_links() {
            for (r, iface, neighbor) in [
                (link.a, link.a_iface, link.b),
                (link.b, link.b_iface, link.a),
            ] {
                let interface = Interface::from(&iface);
                rib.table(r).insert(
                    Ipv4Prefix::from(iface.net),
                    RouteMatch {
                        prefix: iface.net,
                        next_hop: NextHop::Direct {
                            interface: interface.clone(),
                        },
                    },
                );
                if !topo.is_egress(r) {
                    rib.owners.insert(iface.addr, (r, interface.clone()));
                }
                rib.ifaces.entry(r).or_default().push(RibIface {
                    net: iface.net,
                    iface: interface,
                    neighbors: vec![neighbor],
                });
            }
        }

        for rule in comp.rules() {
            rib.apply_rule(rule);
        }

        let uplink = Interface {
            name: uplink.to_string(),
            addr: Ipv4Addr::UNSPECIFIED,
        };
        rib.table(topo.egress()).insert(
            Ipv4Prefix::from(*DEFAULT_ROUTE),
            RouteMatch {
                prefix: *DEFAULT_ROUTE,
                next_hop: NextHop::Direct {
                    interface: uplink.clone(),
                },
            },
        );
        rib.ifaces.entry(topo.egress()).or_default().push(RibIface {
            net: Ipv4Net::from(Ipv4Addr::UNSPECIFIED),
            iface: uplink,
            neighbors: Vec::new(),
        });

        rib
    }

    fn table(&mut self, r: RouterId) -> &mut PrefixMap<Ipv4Prefix, RouteMatch> {
        self.tables.entry(r).or_default()
    }

    /// Install a rule, replacing any existing route of the owner for the same destination. This is
    /// used to apply both the create and the undo rule of a loop artifact.
    pub fn apply_rule(&mut self, rule: &RouteRule) {
        debug!(
            "{:?}: install {} via {}",
            rule.owner, rule.destination, rule.via
        );
        self.table(rule.owner).insert(
            Ipv4Prefix::from(rule.destination),
            RouteMatch {
                prefix: rule.destination.trunc(),
                next_hop: NextHop::Indirect { peer: rule.via },
            },
        );
    }

    fn rib_ifaces(&self, router: RouterId) -> &[RibIface] {
        self.ifaces.get(&router).map(|x| x.as_slice()).unwrap_or_default()
    }
}

impl RouteTableProvider for StaticRib {
    fn name(&self, router: RouterId) -> Option<String> {
        self.names.get(&router).cloned()
    }

    fn lookup(
        &self,
        router: RouterId,
        destination: Ipv4Addr,
    ) -> Result<Option<RouteMatch>, TraceError> {
        let table = self
            .tables
            .get(&router)
            .ok_or(TraceError::UnknownRouter(router))?;
        Ok(table
            .get_lpm(&Ipv4Prefix::host(destination))
            .map(|(_, route)| route.clone()))
    }

    fn neighbors_of(
        &self,
        router: RouterId,
        interface: &Interface,
    ) -> Result<Vec<RouterId>, TraceError> {
        if !self.names.contains_key(&router) {
            return Err(TraceError::UnknownRouter(router));
        }
        Ok(self
            .rib_ifaces(router)
            .iter()
            .find(|i| i.iface.name == interface.name)
            .map(|i| i.neighbors.clone())
            .unwrap_or_default())
    }

    fn owner_of(&self, addr: Ipv4Addr) -> Option<(RouterId, Interface)> {
        self.owners.get(&addr).cloned()
    }

    fn interface_toward(&self, router: RouterId, addr: Ipv4Addr) -> Option<Interface> {
        self.rib_ifaces(router)
            .iter()
            .find(|i| i.net.prefix_len() > 0 && i.net.contains(&addr))
            .map(|i| i.iface.clone())
    }

    fn is_local(&self, router: RouterId, addr: Ipv4Addr) -> bool {
        self.rib_ifaces(router)
            .iter()
            .any(|i| i.iface.addr == addr && !addr.is_unspecified())
    }
}
