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

//! Module containing all type definitions

use std::{
    fmt::{Display, Formatter},
    net::Ipv4Addr,
    str::FromStr,
};

use ipnet::{AddrParseError, Ipv4Net};
use petgraph::prelude::*;
use prefix_trie::Prefix as PPrefix;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::addressor::AddressError;

pub(crate) type IndexType = u32;
/// Router Identification (and index into the graph)
pub type RouterId = NodeIndex<IndexType>;
/// Identification of a path in the graph document.
pub type PathId = u32;

/// Prefix of the device names of all routers (the router with id `3` is called `srl3`).
pub const DUT_NAME_PREFIX: &str = "srl";
/// Name of the egress node.
pub const EGRESS_NAME: &str = "egress";

/// The role of a node in the topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeRole {
    /// A router under test, rendered as an SR Linux device.
    Router,
    /// The single egress host where all paths end.
    Egress,
}

/// An interface of a node on a point-to-point link. The interface index starts at 1 and is
/// assigned in the order in which the node's links are addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Iface {
    /// Index of the interface on the node (starting at 1).
    pub idx: usize,
    /// Address of the interface.
    pub addr: Ipv4Addr,
    /// The `/31` network of the link.
    pub net: Ipv4Net,
}

impl Iface {
    /// Name of the interface, e.g., `ethernet-1/2`.
    pub fn name(&self) -> String {
        format!("ethernet-1/{}", self.idx)
    }

    /// Short key of the interface used in topology descriptors, e.g., `e1-2`.
    pub fn key(&self) -> String {
        format!("e1-{}", self.idx)
    }

    /// Name of the (only) subinterface, e.g., `ethernet-1/2.0`.
    pub fn subiface(&self) -> String {
        format!("{}.0", self.name())
    }

    /// The interface address with the prefix length of the link, e.g., `192.168.0.2/31`.
    pub fn addr_with_len(&self) -> Ipv4Net {
        // the prefix length was taken from an existing network, so it is always valid.
        Ipv4Net::new(self.addr, self.net.prefix_len()).unwrap_or(self.net)
    }
}

/// Ipv4 prefix stored in a prefix trie. The contained network is always truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Ipv4Prefix(Ipv4Net);

impl Ipv4Prefix {
    /// The default route `0.0.0.0/0`
    pub fn default_route() -> Self {
        Self(Ipv4Net::default())
    }

    /// The host prefix (`/32`) of the given address.
    pub fn host(addr: Ipv4Addr) -> Self {
        Self(Ipv4Net::from(addr))
    }

    /// Get the contained network
    pub fn net(&self) -> Ipv4Net {
        self.0
    }

    /// Check if the prefix covers the given address.
    pub fn contains_addr(&self, addr: Ipv4Addr) -> bool {
        self.0.contains(&addr)
    }
}

impl PPrefix for Ipv4Prefix {
    type R = u32;

    fn repr(&self) -> u32 {
        self.0.addr().into()
    }

    fn prefix_len(&self) -> u8 {
        self.0.prefix_len()
    }

    fn from_repr_len(repr: u32, len: u8) -> Self {
        Ipv4Prefix(Ipv4Net::new(repr.into(), len.min(32)).unwrap_or_default().trunc())
    }

    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }

    fn mask(&self) -> u32 {
        self.0.network().into()
    }

    fn zero() -> Self {
        Self(Default::default())
    }

    fn contains(&self, other: &Self) -> bool {
        self.0.contains(&other.0)
    }
}

impl From<Ipv4Net> for Ipv4Prefix {
    fn from(value: Ipv4Net) -> Self {
        Self(value.trunc())
    }
}

impl From<Ipv4Addr> for Ipv4Prefix {
    fn from(value: Ipv4Addr) -> Self {
        Self::host(value)
    }
}

impl From<Ipv4Prefix> for Ipv4Net {
    fn from(value: Ipv4Prefix) -> Self {
        value.0
    }
}

impl FromStr for Ipv4Prefix {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(Ipv4Net::from_str(s)?))
    }
}

impl Display for Ipv4Prefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Topology Errors
#[derive(Error, Debug, PartialEq)]
pub enum TopologyError {
    /// The node ids in the graph document are not dense, starting at 0.
    #[error("Node at position {1} has id {0}; node ids must be 0, 1, 2, ...")]
    InvalidNodeId(u32, usize),
    /// A link or path refers to a node that does not exist.
    #[error("Node {0} does not exist")]
    UnknownNode(u32),
    /// A link connects a node with itself.
    #[error("Link from node {0} to itself is not allowed")]
    SelfLoop(u32),
    /// The same link is listed twice.
    #[error("Link between {0} and {1} is listed more than once")]
    DuplicateLink(u32, u32),
    /// Two consecutive nodes on a path are not connected by a link.
    #[error("Path {0} uses the link {1} -- {2}, which does not exist")]
    LinkNotFound(PathId, u32, u32),
    /// The graph document contains no paths.
    #[error("The graph document contains no paths")]
    NoPaths,
    /// A path is empty
    #[error("Path {0} is empty")]
    EmptyPath(PathId),
    /// Not all paths end at the same node.
    #[error("Path {0} does not end at the egress node {1}")]
    InconsistentEgress(PathId, u32),
    /// A path passes through the egress before its last node.
    #[error("Path {0} passes through the egress node {1} before its end")]
    EgressInPath(PathId, u32),
    /// A path visits the same node more than once.
    #[error("Path {0} visits node {1} more than once")]
    RepeatedNode(PathId, u32),
    /// The path selected for the loop injection is too short.
    #[error("Path {0} with {1} nodes is too short to inject a forwarding loop (requires 4)")]
    PathTooShortForLoop(PathId, usize),
    /// Two paths require different next hops for the same destination on the same router.
    #[error(
        "Router {router:?} has conflicting routes for {destination}: \
         via {existing:?} and via {new:?}"
    )]
    ConflictingRoute {
        /// The router owning the route.
        router: RouterId,
        /// The destination of the route.
        destination: Ipv4Net,
        /// The next hop that was already chosen.
        existing: RouterId,
        /// The next hop that conflicts with the existing one.
        new: RouterId,
    },
    /// Address allocation failed.
    #[error("{0}")]
    Address(#[from] AddressError),
    /// The graph document cannot be parsed.
    #[error("Cannot parse the graph document: {0}")]
    Json(String),
}

impl From<serde_json::Error> for TopologyError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value.to_string())
    }
}
