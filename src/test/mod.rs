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


//! Tests of the testbed generator

mod test_config;

use loopsim::topology::Topology;

/// Graph document of five nodes on a single path `0 -> 1 -> 2 -> 3 -> 4`, in the flat format.
const LINEAR_5: &str = r#"{
    "nodes": [{"id": 0}, {"id": 1}, {"id": 2}, {"id": 3}, {"id": 4}],
    "links": [
        {"source": 0, "target": 1},
        {"source": 1, "target": 2},
        {"source": 2, "target": 3},
        {"source": 3, "target": 4}
    ],
    "paths": {"0": [0, 1, 2, 3, 4]}
}"#;

/// Parse [`LINEAR_5`].
fn linear_5() -> Topology {
    Topology::from_json(LINEAR_5).unwrap()
}
