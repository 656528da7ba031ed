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

//! # Topology
//!
//! The graph document describes the routers, the links between them, and the forwarding paths that
//! should be realized. All paths end at the same node, the egress. A [`Topology`] is a validated
//! graph document: node ids are dense, every link connects two distinct known nodes, and
//! consecutive nodes on every path are linked.

use std::collections::{BTreeMap, HashSet};

use itertools::Itertools;
use log::debug;
use petgraph::{graph::UnGraph, visit::EdgeRef};
use serde::{Deserialize, Serialize};

use crate::types::{
    IndexType, NodeRole, PathId, RouterId, TopologyError, DUT_NAME_PREFIX, EGRESS_NAME,
};

/// A node entry of the graph document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeEntry {
    /// Id of the node, which must be equal to its position in the list of nodes.
    pub id: u32,
}

/// A link entry of the graph document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkEntry {
    /// First endpoint. This endpoint gets the lower address of the link.
    pub source: u32,
    /// Second endpoint.
    pub target: u32,
}

/// The graph document as read from the input file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Ordered list of nodes.
    pub nodes: Vec<NodeEntry>,
    /// Ordered list of links. Addresses are assigned in this order.
    pub links: Vec<LinkEntry>,
    /// Paths by their id. The last element of each path is the egress.
    pub paths: BTreeMap<PathId, Vec<u32>>,
}

/// The graph part of a networkx `node_link_data` document. Additional fields (`directed`,
/// `multigraph`, `graph`) are ignored.
#[derive(Debug, Deserialize)]
struct NodeLinkGraph {
    nodes: Vec<NodeEntry>,
    links: Vec<LinkEntry>,
}

/// The document written by the graph generator, wrapping a networkx graph and the paths.
#[derive(Debug, Deserialize)]
struct NodeLinkDocument {
    #[serde(rename = "Graph", alias = "graph")]
    graph: NodeLinkGraph,
    #[serde(rename = "Paths", alias = "paths")]
    paths: BTreeMap<PathId, Vec<u32>>,
}

impl GraphDocument {
    /// Parse a graph document from JSON. Both the flat format (`nodes`, `links`, `paths`) and the
    /// networkx wrapper (`{"Graph": {"nodes": ..., "links": ...}, "Paths": ...}`) are accepted.
    pub fn from_json(s: &str) -> Result<Self, TopologyError> {
        let value: serde_json::Value = serde_json::from_str(s)?;
        if value.get("Graph").or_else(|| value.get("graph")).is_some() {
            let doc: NodeLinkDocument = serde_json::from_str(s)?;
            Ok(GraphDocument {
                nodes: doc.graph.nodes,
                links: doc.graph.links,
                paths: doc.paths,
            })
        } else {
            Ok(serde_json::from_str(s)?)
        }
    }

    /// Build a document of `n` nodes from a list of links and paths. Mostly useful for tests.
    pub fn build(
        n: u32,
        links: impl IntoIterator<Item = (u32, u32)>,
        paths: impl IntoIterator<Item = (PathId, Vec<u32>)>,
    ) -> Self {
        Self {
            nodes: (0..n).map(|id| NodeEntry { id }).collect(),
            links: links
                .into_iter()
                .map(|(source, target)| LinkEntry { source, target })
                .collect(),
            paths: paths.into_iter().collect(),
        }
    }
}

/// A validated topology.
#[derive(Debug, Clone)]
pub struct Topology {
    graph: UnGraph<NodeRole, (), IndexType>,
    links: Vec<(RouterId, RouterId)>,
    paths: BTreeMap<PathId, Vec<RouterId>>,
    egress: RouterId,
}

impl Topology {
    /// Validate a graph document and build the topology from it.
    pub fn from_document(doc: &GraphDocument) -> Result<Self, TopologyError> {
        let mut graph = UnGraph::<NodeRole, (), IndexType>::default();
        for (pos, node) in doc.nodes.iter().enumerate() {
            if node.id as usize != pos {
                return Err(TopologyError::InvalidNodeId(node.id, pos));
            }
            graph.add_node(NodeRole::Router);
        }
        let n = doc.nodes.len() as u32;
        let known = |x: u32| -> Result<RouterId, TopologyError> {
            if x < n {
                Ok(RouterId::from(x))
            } else {
                Err(TopologyError::UnknownNode(x))
            }
        };

        let mut links = Vec::with_capacity(doc.links.len());
        let mut seen = HashSet::new();
        for link in doc.links.iter() {
            let a = known(link.source)?;
            let b = known(link.target)?;
            if a == b {
                return Err(TopologyError::SelfLoop(link.source));
            }
            if !seen.insert((a.min(b), a.max(b))) {
                return Err(TopologyError::DuplicateLink(link.source, link.target));
            }
            graph.add_edge(a, b, ());
            links.push((a, b));
        }

        let mut paths = BTreeMap::new();
        let mut egress = None;
        for (pid, path) in doc.paths.iter() {
            let last = *path.last().ok_or(TopologyError::EmptyPath(*pid))?;
            let e = *egress.get_or_insert(last);
            if last != e {
                return Err(TopologyError::InconsistentEgress(*pid, e));
            }
            if let Some(x) = path.iter().rev().skip(1).find(|x| **x == e) {
                return Err(TopologyError::EgressInPath(*pid, *x));
            }
            if let Some(x) = path.iter().duplicates().next() {
                return Err(TopologyError::RepeatedNode(*pid, *x));
            }
            let path = path.iter().map(|x| known(*x)).collect::<Result<Vec<_>, _>>()?;
            for (a, b) in path.iter().tuple_windows() {
                if graph.find_edge(*a, *b).is_none() {
                    return Err(TopologyError::LinkNotFound(
                        *pid,
                        a.index() as u32,
                        b.index() as u32,
                    ));
                }
            }
            paths.insert(*pid, path);
        }
        let egress = RouterId::from(egress.ok_or(TopologyError::NoPaths)?);
        graph[egress] = NodeRole::Egress;

        debug!(
            "topology with {} nodes, {} links and {} paths (egress: {})",
            graph.node_count(),
            links.len(),
            paths.len(),
            egress.index()
        );

        Ok(Self {
            graph,
            links,
            paths,
            egress,
        })
    }

    /// Parse and validate a graph document in JSON.
    pub fn from_json(s: &str) -> Result<Self, TopologyError> {
        Self::from_document(&GraphDocument::from_json(s)?)
    }

    /// The egress node
    pub fn egress(&self) -> RouterId {
        self.egress
    }

    /// Check if `r` is the egress node.
    pub fn is_egress(&self, r: RouterId) -> bool {
        r == self.egress
    }

    /// Number of nodes (including the egress)
    pub fn num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    /// All nodes in ascending order, including the egress.
    pub fn nodes(&self) -> impl Iterator<Item = RouterId> + '_ {
        self.graph.node_indices()
    }

    /// All routers in ascending order (every node except the egress).
    pub fn routers(&self) -> impl Iterator<Item = RouterId> + '_ {
        self.graph.node_indices().filter(|r| *r != self.egress)
    }

    /// The role of a node, or `None` if it does not exist.
    pub fn role(&self, r: RouterId) -> Option<NodeRole> {
        self.graph.node_weight(r).copied()
    }

    /// All links in the order of the graph document.
    pub fn links(&self) -> &[(RouterId, RouterId)] {
        &self.links
    }

    /// All neighbors of a node, in ascending order.
    pub fn neighbors(&self, r: RouterId) -> Vec<RouterId> {
        self.graph
            .edges(r)
            .map(|e| if e.source() == r { e.target() } else { e.source() })
            .sorted()
            .collect()
    }

    /// All paths by their id.
    pub fn paths(&self) -> &BTreeMap<PathId, Vec<RouterId>> {
        &self.paths
    }

    /// Get a specific path.
    pub fn path(&self, id: PathId) -> Option<&[RouterId]> {
        self.paths.get(&id).map(|p| p.as_slice())
    }

    /// The name of a node: `srl<id>` for routers, and `egress` for the egress.
    pub fn name(&self, r: RouterId) -> String {
        if r == self.egress {
            EGRESS_NAME.to_string()
        } else {
            format!("{}{}", DUT_NAME_PREFIX, r.index())
        }
    }

    /// Find a node by its name.
    pub fn node_by_name(&self, name: &str) -> Option<RouterId> {
        if name == EGRESS_NAME {
            return Some(self.egress);
        }
        let id: u32 = name.strip_prefix(DUT_NAME_PREFIX)?.parse().ok()?;
        let r = RouterId::from(id);
        (self.graph.node_weight(r) == Some(&NodeRole::Router)).then_some(r)
    }
}
