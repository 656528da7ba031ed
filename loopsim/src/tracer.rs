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

//! # Path Tracer
//!
//! The [`PathTracer`] reconstructs the forwarding path of a packet by walking the routing state of
//! the routers, hop by hop, as exposed by a [`RouteTableProvider`]. It never sends any packet. The
//! result is a [`TracedPath`], which always carries a [`Termination`], including failures.

use std::{collections::HashSet, net::Ipv4Addr};

use ipnet::Ipv4Net;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Iface, RouterId};

/// Default bound on the recursive resolution of indirect next hops.
pub const DEFAULT_MAX_RECURSION: usize = 8;

/// An interface as seen by the tracer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Interface {
    /// Name of the interface
    pub name: String,
    /// Address of the interface
    pub addr: Ipv4Addr,
}

impl From<&Iface> for Interface {
    fn from(iface: &Iface) -> Self {
        Self {
            name: iface.name(),
            addr: iface.addr,
        }
    }
}

/// The next hop of a route.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NextHop {
    /// Directly connected route, leaving through `interface`.
    Direct {
        /// The outgoing interface (with its local address).
        interface: Interface,
    },
    /// Route via a peer address that must be resolved further.
    Indirect {
        /// The next-hop address.
        peer: Ipv4Addr,
    },
}

/// The result of a route lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteMatch {
    /// The matching prefix
    pub prefix: Ipv4Net,
    /// The next hop of the route
    pub next_hop: NextHop,
}

/// Errors that end a trace unsuccessfully.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceError {
    /// The router has no route (not even a default route) for the destination.
    #[error("Router {0:?} has no route to {1}")]
    NoRoute(RouterId, Ipv4Addr),
    /// An indirect next hop could not be resolved to a physical next hop.
    #[error("Router {0:?} cannot resolve the next hop {1}")]
    UnresolvedIndirectRoute(RouterId, Ipv4Addr),
    /// A direct route leaves through an interface with more than one neighbor.
    #[error("Interface {1} of router {0:?} has more than one neighbor")]
    AmbiguousAdjacency(RouterId, String),
    /// The router is not known to the route table provider.
    #[error("Router {0:?} is unknown")]
    UnknownRouter(RouterId),
    /// The route table provider failed.
    #[error("Route table provider error: {0}")]
    Provider(String),
}

/// Source of routing state of all routers. Implementations only need to support concurrent
/// read-only queries.
pub trait RouteTableProvider {
    /// The name of a router, or `None` if the router does not exist.
    fn name(&self, router: RouterId) -> Option<String>;

    /// Longest-prefix match on `router` covering `destination`.
    fn lookup(
        &self,
        router: RouterId,
        destination: Ipv4Addr,
    ) -> Result<Option<RouteMatch>, TraceError>;

    /// The default route of `router`, used if `lookup` yields no match.
    fn default_route(&self, _router: RouterId) -> Result<Option<RouteMatch>, TraceError> {
        Ok(None)
    }

    /// All routers physically adjacent to `router` on `interface`.
    fn neighbors_of(
        &self,
        router: RouterId,
        interface: &Interface,
    ) -> Result<Vec<RouterId>, TraceError>;

    /// The router (and its interface) owning `addr`. Addresses of nodes outside of the routers
    /// under test (like the egress) have no owner.
    fn owner_of(&self, addr: Ipv4Addr) -> Option<(RouterId, Interface)>;

    /// The interface of `router` on the same network as `addr`.
    fn interface_toward(&self, router: RouterId, addr: Ipv4Addr) -> Option<Interface>;

    /// Check if `addr` is assigned to `router`.
    fn is_local(&self, router: RouterId, addr: Ipv4Addr) -> bool;
}

/// A single hop of a traced path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    /// The router
    pub router: RouterId,
    /// Name of the router
    pub name: String,
    /// The interface on which the packet enters the router.
    pub inbound: Option<Interface>,
    /// The interface through which the packet leaves the router.
    pub outbound: Option<Interface>,
}

/// How a trace ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// The last hop owns the destination address.
    Reached,
    /// The last hop forwards the packet out of the modeled network.
    Exited,
    /// The last hop was already visited before.
    LoopDetected,
    /// The trace failed on the last hop.
    Failed(TraceError),
}

/// The result of a single trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracedPath {
    /// The source router
    pub source: RouterId,
    /// The destination address
    pub destination: Ipv4Addr,
    /// All hops, starting at the source.
    pub hops: Vec<Hop>,
    /// The reason why the trace stopped.
    pub termination: Termination,
}

impl TracedPath {
    /// The sequence of routers.
    pub fn routers(&self) -> Vec<RouterId> {
        self.hops.iter().map(|h| h.router).collect()
    }

    /// The sequence of router names.
    pub fn names(&self) -> Vec<&str> {
        self.hops.iter().map(|h| h.name.as_str()).collect()
    }

    /// Whether the trace ended in a forwarding loop.
    pub fn is_loop(&self) -> bool {
        self.termination == Termination::LoopDetected
    }

    /// Whether the trace ended without loop and without error.
    pub fn is_ok(&self) -> bool {
        matches!(self.termination, Termination::Reached | Termination::Exited)
    }

    /// The error that ended the trace, if any.
    pub fn error(&self) -> Option<&TraceError> {
        match &self.termination {
            Termination::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// The outcome of resolving the next hop on a single router.
enum Step {
    Next {
        router: RouterId,
        outbound: Option<Interface>,
        inbound: Option<Interface>,
    },
    Exit {
        outbound: Interface,
    },
}

/// Control-plane traceroute on top of a [`RouteTableProvider`].
#[derive(Debug)]
pub struct PathTracer<'a, P> {
    provider: &'a P,
    max_recursion: usize,
}

impl<'a, P: RouteTableProvider> PathTracer<'a, P> {
    /// Create a new tracer.
    pub fn new(provider: &'a P) -> Self {
        Self {
            provider,
            max_recursion: DEFAULT_MAX_RECURSION,
        }
    }

    /// Set the bound on the recursive resolution of indirect next hops.
    pub fn max_recursion(mut self, n: usize) -> Self {
        self.max_recursion = n;
        self
    }

    /// Trace the path from `source` toward `destination`.
    pub fn trace(&self, source: RouterId, destination: Ipv4Addr) -> TracedPath {
        let mut result = TracedPath {
            source,
            destination,
            hops: Vec::new(),
            termination: Termination::Exited,
        };
        let Some(name) = self.provider.name(source) else {
            result.termination = Termination::Failed(TraceError::UnknownRouter(source));
            return result;
        };
        result.hops.push(Hop {
            router: source,
            name,
            inbound: None,
            outbound: None,
        });

        let mut visited = HashSet::new();
        visited.insert(source);
        let mut current = source;

        result.termination = loop {
            if self.provider.is_local(current, destination) {
                break Termination::Reached;
            }

            let step = match self.step(current, destination) {
                Ok(step) => step,
                Err(e) => break Termination::Failed(e),
            };

            match step {
                Step::Exit { outbound } => {
                    if let Some(h) = result.hops.last_mut() {
                        h.outbound = Some(outbound);
                    }
                    break Termination::Exited;
                }
                Step::Next {
                    router,
                    outbound,
                    inbound,
                } => {
                    let Some(name) = self.provider.name(router) else {
                        break Termination::Failed(TraceError::UnknownRouter(router));
                    };
                    debug!("{destination}: {} -> {name}", result.hops.len());
                    if let Some(h) = result.hops.last_mut() {
                        h.outbound = outbound;
                    }
                    result.hops.push(Hop {
                        router,
                        name,
                        inbound,
                        outbound: None,
                    });
                    if !visited.insert(router) {
                        break Termination::LoopDetected;
                    }
                    current = router;
                }
            }
        };

        match &result.termination {
            Termination::Failed(e) => warn!("trace from {source:?} to {destination} failed: {e}"),
            Termination::LoopDetected => info!(
                "trace from {source:?} to {destination}: forwarding loop {:?}",
                result.names()
            ),
            _ => info!(
                "trace from {source:?} to {destination}: {:?}",
                result.names()
            ),
        }

        result
    }

    /// Trace the paths of all `sources` toward `destination` in parallel. The result is in the
    /// same order as `sources`.
    pub fn trace_all(&self, sources: &[RouterId], destination: Ipv4Addr) -> Vec<TracedPath>
    where
        P: Sync,
    {
        sources
            .par_iter()
            .map(|s| self.trace(*s, destination))
            .collect()
    }

    /// The address of the interface through which `router` sends packets toward `destination`.
    pub fn source_address(
        &self,
        router: RouterId,
        destination: Ipv4Addr,
    ) -> Result<Option<Ipv4Addr>, TraceError> {
        let route = match self.route(router, destination)? {
            Some(route) => route,
            None => return Ok(None),
        };
        Ok(match route.next_hop {
            NextHop::Direct { interface } => Some(interface.addr),
            NextHop::Indirect { peer } => Some(self.resolve_outbound(router, peer, 0)?.addr),
        })
    }

    /// Lookup the route, falling back to the default route.
    fn route(
        &self,
        router: RouterId,
        destination: Ipv4Addr,
    ) -> Result<Option<RouteMatch>, TraceError> {
        match self.provider.lookup(router, destination)? {
            Some(route) => Ok(Some(route)),
            None => self.provider.default_route(router),
        }
    }

    /// Compute the next step on `router` for `destination`.
    fn step(&self, router: RouterId, destination: Ipv4Addr) -> Result<Step, TraceError> {
        let route = self
            .route(router, destination)?
            .ok_or(TraceError::NoRoute(router, destination))?;
        self.resolve(router, &route.next_hop, 0)
    }

    /// Resolve a next hop of `router` into the next router.
    fn resolve(
        &self,
        router: RouterId,
        next_hop: &NextHop,
        depth: usize,
    ) -> Result<Step, TraceError> {
        match next_hop {
            NextHop::Direct { interface } => {
                let neighbors = self.provider.neighbors_of(router, interface)?;
                match neighbors.as_slice() {
                    [] => Ok(Step::Exit {
                        outbound: interface.clone(),
                    }),
                    [next] => Ok(Step::Next {
                        router: *next,
                        inbound: self.provider.interface_toward(*next, interface.addr),
                        outbound: Some(interface.clone()),
                    }),
                    _ => Err(TraceError::AmbiguousAdjacency(router, interface.name.clone())),
                }
            }
            NextHop::Indirect { peer } => match self.provider.owner_of(*peer) {
                Some((owner, _)) if owner == router => {
                    Err(TraceError::UnresolvedIndirectRoute(router, *peer))
                }
                Some((owner, iface)) => Ok(Step::Next {
                    router: owner,
                    inbound: Some(iface),
                    outbound: Some(self.resolve_outbound(router, *peer, depth)?),
                }),
                None => {
                    if depth >= self.max_recursion {
                        return Err(TraceError::UnresolvedIndirectRoute(router, *peer));
                    }
                    let route = self
                        .route(router, *peer)?
                        .ok_or(TraceError::UnresolvedIndirectRoute(router, *peer))?;
                    self.resolve(router, &route.next_hop, depth + 1)
                }
            },
        }
    }

    /// Find the interface through which `router` reaches `addr`. Fails if the route toward `addr`
    /// cannot be resolved within the recursion bound.
    fn resolve_outbound(
        &self,
        router: RouterId,
        addr: Ipv4Addr,
        depth: usize,
    ) -> Result<Interface, TraceError> {
        if let Some(iface) = self.provider.interface_toward(router, addr) {
            return Ok(iface);
        }
        if depth >= self.max_recursion {
            return Err(TraceError::UnresolvedIndirectRoute(router, addr));
        }
        let route = self
            .route(router, addr)?
            .ok_or(TraceError::UnresolvedIndirectRoute(router, addr))?;
        match route.next_hop {
            NextHop::Direct { interface } => Ok(interface),
            NextHop::Indirect { peer } if peer != addr => {
                self.resolve_outbound(router, peer, depth + 1)
            }
            NextHop::Indirect { .. } => Err(TraceError::UnresolvedIndirectRoute(router, addr)),
        }
    }
}
