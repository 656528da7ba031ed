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

use crate::{
    topology::{GraphDocument, Topology},
    types::RouterId,
};

mod test_tracer;

pub(crate) fn r(x: u32) -> RouterId {
    RouterId::from(x)
}

/// A single path `[0, 1, ..., n-1]`, where `n-1` is the egress.
pub(crate) fn linear(n: u32) -> Topology {
    let path: Vec<u32> = (0..n).collect();
    let doc = GraphDocument::build(n, (1..n).map(|i| (i - 1, i)), [(0, path)]);
    Topology::from_document(&doc).unwrap()
}

/// Two paths `[0, 1, 2, 5]` and `[3, 4, 2, 5]` that merge at router 2.
pub(crate) fn merging() -> Topology {
    let doc = GraphDocument::build(
        6,
        [(0, 1), (1, 2), (2, 5), (3, 4), (4, 2)],
        [(0, vec![0, 1, 2, 5]), (3, vec![3, 4, 2, 5])],
    );
    Topology::from_document(&doc).unwrap()
}
