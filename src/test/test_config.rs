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

use ipnet::Ipv4Net;
use pretty_assertions::assert_eq;
use test_log::test;

use crate::{
    config::{resolve_graph_with, LabConfig, OutputDirs},
    Error,
};

#[test]
fn empty_config_is_default() {
    assert_eq!(LabConfig::from_toml("").unwrap(), LabConfig::default());
    let cfg = LabConfig::default();
    assert_eq!(cfg.address_pool, "192.168.0.0/24".parse::<Ipv4Net>().unwrap());
    assert_eq!(cfg.network_instance, "DEFAULT");
    assert_eq!(cfg.ttl_filter, "wtf_ttl_filter");
    assert_eq!(cfg.egress_uplink, "eth0");
    assert_eq!(cfg.max_recursion, 8);
    assert_eq!(cfg.probe, Ipv4Addr::new(8, 8, 8, 8));
    assert_eq!(cfg.egress_script, "egress_setup_ifaces.sh");
}

#[test]
fn partial_config() {
    let cfg = LabConfig::from_toml(
        r#"
address_pool = "10.0.0.0/16"
network_instance = "lab"
probe = "1.1.1.1"
"#,
    )
    .unwrap();
    assert_eq!(cfg.address_pool, "10.0.0.0/16".parse::<Ipv4Net>().unwrap());
    assert_eq!(cfg.network_instance, "lab");
    assert_eq!(cfg.probe, Ipv4Addr::new(1, 1, 1, 1));
    assert_eq!(cfg.ttl_filter, LabConfig::default().ttl_filter);
}

#[test]
fn invalid_config() {
    assert!(matches!(
        LabConfig::from_toml("address_pool = \"not a network\""),
        Err(Error::Toml(_))
    ));
    assert!(matches!(
        LabConfig::from_toml("max_recursion = \"eight\""),
        Err(Error::Toml(_))
    ));
}

#[test]
fn load_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lab.toml");
    std::fs::write(&path, "ttl_filter = \"count_ttl\"\nmax_recursion = 3\n").unwrap();
    let cfg = LabConfig::load(&path).unwrap();
    assert_eq!(cfg.ttl_filter, "count_ttl");
    assert_eq!(cfg.max_recursion, 3);

    assert!(matches!(
        LabConfig::load(dir.path().join("missing.toml")),
        Err(Error::Io(_))
    ));
    assert_eq!(
        LabConfig::load_or_default(None::<PathBuf>).unwrap(),
        LabConfig::default()
    );
}

#[test]
fn graph_path() {
    let explicit = PathBuf::from("/tmp/graph.json");
    assert_eq!(
        resolve_graph_with(Some(explicit.clone()), None, None).unwrap(),
        explicit
    );
    assert_eq!(
        resolve_graph_with(None, Some("/work".as_ref()), Some("topo.json")).unwrap(),
        PathBuf::from("/work/out/topo.json")
    );
    assert!(matches!(
        resolve_graph_with(None, None, Some("topo.json")),
        Err(Error::MissingPath(_, "WTF_KNE_WORKDIR"))
    ));
    assert!(matches!(
        resolve_graph_with(None, Some("/work".as_ref()), None),
        Err(Error::MissingPath(_, "WTF_TOPOGRAPH"))
    ));
}

#[test]
fn output_dirs() {
    assert_eq!(
        OutputDirs::resolve_with(None, None, Some("/work".as_ref())).unwrap(),
        OutputDirs {
            out: "/work/out".into(),
            egress_out: "/work/egress/out".into(),
        }
    );
    assert_eq!(
        OutputDirs::resolve_with(Some("/gen".into()), None, None).unwrap(),
        OutputDirs {
            out: "/gen".into(),
            egress_out: "/gen".into(),
        }
    );
    assert_eq!(
        OutputDirs::resolve_with(Some("/gen".into()), Some("/eg".into()), Some("/work".as_ref()))
            .unwrap(),
        OutputDirs {
            out: "/gen".into(),
            egress_out: "/eg".into(),
        }
    );
    assert!(matches!(
        OutputDirs::resolve_with(None, Some("/eg".into()), None),
        Err(Error::MissingPath(_, "WTF_KNE_WORKDIR"))
    ));
}
