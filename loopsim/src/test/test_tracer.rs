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

use std::{collections::HashMap, net::Ipv4Addr};

use ipnet::Ipv4Net;
use maplit::hashmap;
use pretty_assertions::assert_eq;

use super::{linear, merging, r};
use crate::{
    compiler::RouteCompiler,
    rib::StaticRib,
    tracer::{
        Hop, Interface, NextHop, PathTracer, RouteMatch, RouteTableProvider, Termination,
        TraceError,
    },
    types::RouterId,
};

fn addr(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

fn iface(name: &str, a: &str) -> Option<Interface> {
    Some(Interface {
        name: name.to_string(),
        addr: addr(a),
    })
}

#[test]
fn trace_to_egress_address() {
    let topo = linear(4);
    let comp = RouteCompiler::new(&topo).compile().unwrap();
    let rib = StaticRib::from_compilation(&topo, &comp);

    let path = PathTracer::new(&rib).trace(r(0), addr("192.168.0.5"));
    assert_eq!(path.routers(), vec![r(0), r(1), r(2), r(3)]);
    assert_eq!(path.names(), vec!["srl0", "srl1", "srl2", "egress"]);
    assert_eq!(path.termination, Termination::Reached);
    assert!(!path.is_loop());
    assert!(path.is_ok());
    assert_eq!(
        path.hops,
        vec![
            Hop {
                router: r(0),
                name: "srl0".to_string(),
                inbound: None,
                outbound: iface("ethernet-1/1", "192.168.0.0"),
            },
            Hop {
                router: r(1),
                name: "srl1".to_string(),
                inbound: iface("ethernet-1/1", "192.168.0.1"),
                outbound: iface("ethernet-1/2", "192.168.0.2"),
            },
            Hop {
                router: r(2),
                name: "srl2".to_string(),
                inbound: iface("ethernet-1/1", "192.168.0.3"),
                outbound: iface("ethernet-1/2", "192.168.0.4"),
            },
            Hop {
                router: r(3),
                name: "egress".to_string(),
                inbound: iface("ethernet-1/1", "192.168.0.5"),
                outbound: None,
            },
        ]
    );
}

#[test]
fn trace_external_destination() {
    let topo = linear(5);
    let comp = RouteCompiler::new(&topo).compile().unwrap();
    let rib = StaticRib::from_compilation(&topo, &comp);

    let path = PathTracer::new(&rib).trace(r(0), addr("8.8.8.8"));
    assert_eq!(path.routers(), vec![r(0), r(1), r(2), r(3), r(4)]);
    assert_eq!(path.termination, Termination::Exited);
    assert_eq!(path.hops[4].outbound, iface("eth0", "0.0.0.0"));
}

#[test]
fn trace_from_egress() {
    let topo = linear(5);
    let comp = RouteCompiler::new(&topo).compile().unwrap();
    let rib = StaticRib::from_compilation(&topo, &comp);

    let path = PathTracer::new(&rib).trace(r(4), addr("192.168.0.0"));
    assert_eq!(path.routers(), vec![r(4), r(3), r(2), r(1), r(0)]);
    assert_eq!(path.termination, Termination::Reached);
}

#[test]
fn trace_between_routers_of_merging_paths() {
    let topo = merging();
    let comp = RouteCompiler::new(&topo).compile().unwrap();
    let rib = StaticRib::from_compilation(&topo, &comp);
    let tracer = PathTracer::new(&rib);

    // from router 2 back to router 3, without passing the egress
    let path = tracer.trace(r(2), addr("192.168.0.6"));
    assert_eq!(path.routers(), vec![r(2), r(4), r(3)]);
    assert_eq!(path.termination, Termination::Reached);

    // from router 3 to router 0, turning at the merge point
    let path = tracer.trace(r(3), addr("192.168.0.0"));
    assert_eq!(path.routers(), vec![r(3), r(4), r(2), r(1), r(0)]);
    assert_eq!(path.termination, Termination::Reached);

    let path = tracer.trace(r(0), addr("192.168.0.6"));
    assert_eq!(path.routers(), vec![r(0), r(1), r(2), r(4), r(3)]);
    assert_eq!(path.termination, Termination::Reached);
}

#[test]
fn inject_and_retract_loop() {
    let topo = linear(5);
    let comp = RouteCompiler::new(&topo).loop_injection(true).compile().unwrap();
    let artifact = *comp.loop_artifact().unwrap();
    let mut rib = StaticRib::from_compilation(&topo, &comp);
    let probe = addr("8.8.8.8");

    let before = PathTracer::new(&rib).trace(r(0), probe);
    assert!(before.is_ok());

    rib.apply_rule(&artifact.create);
    let looped = PathTracer::new(&rib).trace(r(0), probe);
    assert_eq!(looped.routers(), vec![r(0), r(1), r(2), r(3), r(1)]);
    assert!(looped.is_loop());
    assert!(!looped.is_ok());
    // the loop target is entered on its address facing router 2
    assert_eq!(looped.hops[4].inbound, iface("ethernet-1/2", "192.168.0.2"));
    // router 3 reaches router 1 via router 2
    assert_eq!(looped.hops[3].outbound, iface("ethernet-1/1", "192.168.0.5"));

    // at most one hop more than distinct routers
    let mut distinct = looped.routers();
    distinct.sort();
    distinct.dedup();
    assert!(looped.hops.len() <= distinct.len() + 1);
    // only the last hop repeats
    let (last, rest) = looped
        .routers()
        .split_last()
        .map(|(l, rest)| (*l, rest.to_vec()))
        .unwrap();
    assert!(rest.contains(&last));
    assert_eq!(rest.len(), distinct.len());

    rib.apply_rule(&artifact.undo);
    let after = PathTracer::new(&rib).trace(r(0), probe);
    assert_eq!(after, before);
}

#[test]
fn trace_all_in_parallel() {
    let topo = linear(5);
    let comp = RouteCompiler::new(&topo).compile().unwrap();
    let rib = StaticRib::from_compilation(&topo, &comp);

    let sources = [r(0), r(1), r(2), r(3)];
    let paths = PathTracer::new(&rib).trace_all(&sources, addr("8.8.8.8"));
    assert_eq!(paths.len(), 4);
    for (source, path) in sources.iter().zip(paths.iter()) {
        assert_eq!(path.source, *source);
        assert!(path.is_ok());
        assert_eq!(path.routers().first(), Some(source));
        assert_eq!(path.routers().last(), Some(&r(4)));
    }
}

#[test]
fn source_address() {
    let topo = linear(5);
    let comp = RouteCompiler::new(&topo).compile().unwrap();
    let rib = StaticRib::from_compilation(&topo, &comp);
    let tracer = PathTracer::new(&rib);

    assert_eq!(
        tracer.source_address(r(0), addr("8.8.8.8")),
        Ok(Some(addr("192.168.0.0")))
    );
    assert_eq!(
        tracer.source_address(r(2), addr("192.168.0.3")),
        Ok(Some(addr("192.168.0.3")))
    );
    assert_eq!(
        tracer.source_address(r(4), addr("192.168.0.0")),
        Ok(Some(addr("192.168.0.7")))
    );
}

/// Route table provider with hand-written state.
#[derive(Debug, Default)]
struct Mock {
    routes: HashMap<RouterId, Vec<RouteMatch>>,
    defaults: HashMap<RouterId, RouteMatch>,
    neighbors: HashMap<(RouterId, String), Vec<RouterId>>,
    owners: HashMap<Ipv4Addr, (RouterId, Interface)>,
    local: HashMap<RouterId, Vec<Ipv4Addr>>,
    /// Destinations for which every lookup fails.
    broken: Vec<Ipv4Addr>,
}

impl Mock {
    fn route(mut self, router: u32, prefix: &str, next_hop: NextHop) -> Self {
        self.routes.entry(r(router)).or_default().push(RouteMatch {
            prefix: prefix.parse().unwrap(),
            next_hop,
        });
        self
    }

    fn neighbors(mut self, router: u32, iface: &str, neighbors: &[u32]) -> Self {
        self.neighbors.insert(
            (r(router), iface.to_string()),
            neighbors.iter().map(|x| r(*x)).collect(),
        );
        self
    }
}

fn direct(name: &str) -> NextHop {
    NextHop::Direct {
        interface: Interface {
            name: name.to_string(),
            addr: addr("10.0.0.0"),
        },
    }
}

fn indirect(a: &str) -> NextHop {
    NextHop::Indirect { peer: addr(a) }
}

impl RouteTableProvider for Mock {
    fn name(&self, router: RouterId) -> Option<String> {
        (router.index() < 4).then(|| format!("r{}", router.index()))
    }

    fn lookup(
        &self,
        router: RouterId,
        destination: Ipv4Addr,
    ) -> Result<Option<RouteMatch>, TraceError> {
        if self.broken.contains(&destination) {
            return Err(TraceError::Provider(format!("lookup of {destination} failed")));
        }
        Ok(self
            .routes
            .get(&router)
            .into_iter()
            .flatten()
            .filter(|m| m.prefix.contains(&destination))
            .max_by_key(|m| m.prefix.prefix_len())
            .cloned())
    }

    fn default_route(&self, router: RouterId) -> Result<Option<RouteMatch>, TraceError> {
        Ok(self.defaults.get(&router).cloned())
    }

    fn neighbors_of(
        &self,
        router: RouterId,
        interface: &Interface,
    ) -> Result<Vec<RouterId>, TraceError> {
        Ok(self
            .neighbors
            .get(&(router, interface.name.clone()))
            .cloned()
            .unwrap_or_default())
    }

    fn owner_of(&self, addr: Ipv4Addr) -> Option<(RouterId, Interface)> {
        self.owners.get(&addr).cloned()
    }

    fn interface_toward(&self, _router: RouterId, _addr: Ipv4Addr) -> Option<Interface> {
        None
    }

    fn is_local(&self, router: RouterId, addr: Ipv4Addr) -> bool {
        self.local
            .get(&router)
            .map(|x| x.contains(&addr))
            .unwrap_or(false)
    }
}

#[test]
fn no_route() {
    let mock = Mock::default();
    let path = PathTracer::new(&mock).trace(r(0), addr("1.1.1.1"));
    assert_eq!(path.routers(), vec![r(0)]);
    assert_eq!(
        path.termination,
        Termination::Failed(TraceError::NoRoute(r(0), addr("1.1.1.1")))
    );
    assert_eq!(path.error(), Some(&TraceError::NoRoute(r(0), addr("1.1.1.1"))));
}

#[test]
fn fallback_to_default_route() {
    let mut mock = Mock::default().neighbors(0, "eth1", &[1]);
    mock.defaults = hashmap! {
        r(0) => RouteMatch { prefix: Ipv4Net::default(), next_hop: direct("eth1") },
    };
    mock.local = hashmap! { r(1) => vec![addr("1.1.1.1")] };
    let path = PathTracer::new(&mock).trace(r(0), addr("1.1.1.1"));
    assert_eq!(path.routers(), vec![r(0), r(1)]);
    assert_eq!(path.termination, Termination::Reached);
}

#[test]
fn ambiguous_adjacency() {
    let mock = Mock::default()
        .route(0, "0.0.0.0/0", direct("eth1"))
        .neighbors(0, "eth1", &[1, 2]);
    let path = PathTracer::new(&mock).trace(r(0), addr("1.1.1.1"));
    assert_eq!(path.routers(), vec![r(0)]);
    assert_eq!(
        path.termination,
        Termination::Failed(TraceError::AmbiguousAdjacency(r(0), "eth1".to_string()))
    );
}

#[test]
fn unresolved_indirect_route() {
    // the peer address is only reachable through the route that points to it.
    let mock = Mock::default().route(0, "0.0.0.0/0", indirect("10.0.0.1"));
    let path = PathTracer::new(&mock)
        .max_recursion(3)
        .trace(r(0), addr("1.1.1.1"));
    assert_eq!(
        path.termination,
        Termination::Failed(TraceError::UnresolvedIndirectRoute(r(0), addr("10.0.0.1")))
    );
}

#[test]
fn indirect_route_to_own_address() {
    let mut mock = Mock::default().route(0, "0.0.0.0/0", indirect("10.0.0.1"));
    mock.owners = hashmap! {
        addr("10.0.0.1") => (r(0), Interface { name: "eth1".to_string(), addr: addr("10.0.0.1") }),
    };
    let path = PathTracer::new(&mock).trace(r(0), addr("1.1.1.1"));
    assert_eq!(
        path.termination,
        Termination::Failed(TraceError::UnresolvedIndirectRoute(r(0), addr("10.0.0.1")))
    );
}

#[test]
fn failed_lookup_of_indirect_peer() {
    // router 2 owns the peer, but router 0 cannot look up the route toward it.
    let mut mock = Mock::default().route(0, "0.0.0.0/0", indirect("10.0.0.5"));
    mock.owners = hashmap! {
        addr("10.0.0.5") => (r(2), Interface { name: "eth1".to_string(), addr: addr("10.0.0.5") }),
    };
    mock.broken = vec![addr("10.0.0.5")];
    let error = TraceError::Provider("lookup of 10.0.0.5 failed".to_string());

    let tracer = PathTracer::new(&mock);
    let path = tracer.trace(r(0), addr("1.1.1.1"));
    assert_eq!(path.routers(), vec![r(0)]);
    assert_eq!(path.termination, Termination::Failed(error.clone()));
    assert_eq!(tracer.source_address(r(0), addr("1.1.1.1")), Err(error));

    // the only route toward the peer is the one that points to it.
    mock.broken.clear();
    let path = PathTracer::new(&mock).trace(r(0), addr("1.1.1.1"));
    assert_eq!(
        path.termination,
        Termination::Failed(TraceError::UnresolvedIndirectRoute(r(0), addr("10.0.0.5")))
    );
}

#[test]
fn recursive_indirect_route() {
    // 10.0.0.1 is not owned by any router, but reachable through eth2 of router 0.
    let mock = Mock::default()
        .route(0, "0.0.0.0/0", indirect("10.0.0.1"))
        .route(0, "10.0.0.0/24", indirect("10.0.1.1"))
        .route(0, "10.0.1.0/24", direct("eth2"))
        .neighbors(0, "eth2", &[3])
        .neighbors(3, "eth1", &[]);
    let mock = mock.route(3, "0.0.0.0/0", direct("eth1"));
    let path = PathTracer::new(&mock).trace(r(0), addr("1.1.1.1"));
    assert_eq!(path.routers(), vec![r(0), r(3)]);
    assert_eq!(path.termination, Termination::Exited);

    // with a recursion bound of 1, the second indirection cannot be resolved.
    let path = PathTracer::new(&mock)
        .max_recursion(1)
        .trace(r(0), addr("1.1.1.1"));
    assert_eq!(
        path.termination,
        Termination::Failed(TraceError::UnresolvedIndirectRoute(r(0), addr("10.0.1.1")))
    );
}

#[test]
fn stop_at_first_repeat() {
    let mock = Mock::default()
        .route(0, "0.0.0.0/0", direct("eth1"))
        .route(1, "0.0.0.0/0", direct("eth1"))
        .route(2, "0.0.0.0/0", direct("eth1"))
        .neighbors(0, "eth1", &[1])
        .neighbors(1, "eth1", &[2])
        .neighbors(2, "eth1", &[0]);
    let path = PathTracer::new(&mock).trace(r(0), addr("1.1.1.1"));
    assert_eq!(path.routers(), vec![r(0), r(1), r(2), r(0)]);
    assert!(path.is_loop());
}

#[test]
fn unknown_router() {
    let mock = Mock::default();
    let path = PathTracer::new(&mock).trace(r(9), addr("1.1.1.1"));
    assert!(path.hops.is_empty());
    assert_eq!(
        path.termination,
        Termination::Failed(TraceError::UnknownRouter(r(9)))
    );

    let mock = Mock::default()
        .route(0, "0.0.0.0/0", direct("eth1"))
        .neighbors(0, "eth1", &[7]);
    let path = PathTracer::new(&mock).trace(r(0), addr("1.1.1.1"));
    assert_eq!(path.routers(), vec![r(0)]);
    assert_eq!(
        path.termination,
        Termination::Failed(TraceError::UnknownRouter(r(7)))
    );
}
