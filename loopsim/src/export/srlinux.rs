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

//! Module that contains convenience methods to generate configuration for Nokia SR Linux, as flat
//! `set` commands.

use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// Interface configuration builder, with a single routed subinterface (index 0).
#[derive(Debug)]
pub struct Interface {
    iface_name: String,
    address: Option<Ipv4Net>,
    network_instance: Option<String>,
}

impl Interface {
    /// Create a new Interface Builder
    pub fn new(iface_name: impl Into<String>) -> Self {
        Self {
            iface_name: iface_name.into(),
            address: None,
            network_instance: None,
        }
    }

    /// Set the address (with the prefix length of the link) of subinterface 0.
    ///
    /// ```
    /// # use loopsim::export::srlinux::Interface;
    /// let addr = "192.168.0.1/31".parse().unwrap();
    /// assert_eq!(
    ///     Interface::new("ethernet-1/1").address(addr).build(),
    ///     "\
    /// set / interface ethernet-1/1 admin-state enable
    /// set / interface ethernet-1/1 subinterface 0 admin-state enable
    /// set / interface ethernet-1/1 subinterface 0 ipv4 admin-state enable
    /// set / interface ethernet-1/1 subinterface 0 ipv4 address 192.168.0.1/31
    /// "
    /// );
    /// ```
    pub fn address(&mut self, addr: Ipv4Net) -> &mut Self {
        self.address = Some(addr);
        self
    }

    /// Attach subinterface 0 to a network instance.
    ///
    /// ```
    /// # use loopsim::export::srlinux::Interface;
    /// assert_eq!(
    ///     Interface::new("ethernet-1/2").network_instance("DEFAULT").build(),
    ///     "\
    /// set / interface ethernet-1/2 admin-state enable
    /// set / interface ethernet-1/2 subinterface 0 admin-state enable
    /// set / network-instance DEFAULT interface ethernet-1/2.0
    /// "
    /// );
    /// ```
    pub fn network_instance(&mut self, name: impl Into<String>) -> &mut Self {
        self.network_instance = Some(name.into());
        self
    }

    /// Build the configuration lines.
    pub fn build(&self) -> String {
        let iface = &self.iface_name;
        let mut cfg = format!("set / interface {iface} admin-state enable\n");
        cfg.push_str(&format!(
            "set / interface {iface} subinterface 0 admin-state enable\n"
        ));
        if let Some(addr) = self.address {
            cfg.push_str(&format!(
                "set / interface {iface} subinterface 0 ipv4 admin-state enable\n"
            ));
            cfg.push_str(&format!(
                "set / interface {iface} subinterface 0 ipv4 address {addr}\n"
            ));
        }
        if let Some(ni) = self.network_instance.as_ref() {
            cfg.push_str(&format!("set / network-instance {ni} interface {iface}.0\n"));
        }
        cfg
    }
}

/// Builder for a next-hop group with a single next-hop address.
#[derive(Debug)]
pub struct NextHopGroup {
    name: String,
    next_hop: Ipv4Addr,
}

impl NextHopGroup {
    /// Create a new next-hop group.
    ///
    /// ```
    /// # use loopsim::export::srlinux::NextHopGroup;
    /// let nh = "192.168.0.3".parse().unwrap();
    /// assert_eq!(
    ///     NextHopGroup::new("grp-1", nh).build("DEFAULT"),
    ///     "\
    /// set / network-instance DEFAULT next-hop-groups group grp-1 admin-state enable
    /// set / network-instance DEFAULT next-hop-groups group grp-1 nexthop 1 ip-address 192.168.0.3
    /// set / network-instance DEFAULT next-hop-groups group grp-1 nexthop 1 resolve true
    /// "
    /// );
    /// ```
    pub fn new(name: impl Into<String>, next_hop: Ipv4Addr) -> Self {
        Self {
            name: name.into(),
            next_hop,
        }
    }

    /// Build the configuration lines in the given network instance.
    pub fn build(&self, network_instance: &str) -> String {
        let prefix = format!(
            "set / network-instance {network_instance} next-hop-groups group {}",
            self.name
        );
        format!(
            "{prefix} admin-state enable\n\
             {prefix} nexthop 1 ip-address {}\n\
             {prefix} nexthop 1 resolve true\n",
            self.next_hop
        )
    }
}

/// Builder to create static routes that point to a next-hop group.
#[derive(Debug)]
pub struct StaticRoute {
    destination: Ipv4Net,
    group: Option<String>,
}

impl StaticRoute {
    /// Create a new Static Route Builder. If you call build on that builder before calling
    /// `next_hop_group`, then the route will drop all traffic.
    pub fn new(destination: Ipv4Net) -> Self {
        Self {
            destination: destination.trunc(),
            group: None,
        }
    }

    /// Route packets via the given next-hop group.
    ///
    /// ```
    /// # use loopsim::export::srlinux::StaticRoute;
    /// let dest = "0.0.0.0/0".parse().unwrap();
    /// assert_eq!(
    ///     StaticRoute::new(dest).next_hop_group("grp-2").build("DEFAULT"),
    ///     "\
    /// set / network-instance DEFAULT static-routes route 0.0.0.0/0 admin-state enable
    /// set / network-instance DEFAULT static-routes route 0.0.0.0/0 next-hop-group grp-2
    /// "
    /// );
    /// ```
    pub fn next_hop_group(&mut self, group: impl Into<String>) -> &mut Self {
        self.group = Some(group.into());
        self
    }

    /// Build the command lines.
    pub fn build(&self, network_instance: &str) -> String {
        let prefix = format!(
            "set / network-instance {network_instance} static-routes route {}",
            self.destination
        );
        match self.group.as_ref() {
            Some(group) => {
                format!("{prefix} admin-state enable\n{prefix} next-hop-group {group}\n")
            }
            None => format!("{prefix} admin-state enable\n{prefix} blackhole\n"),
        }
    }
}

/// Builder for the IPv4 filter that counts the ICMP TTL-exceeded messages a router sends.
#[derive(Debug)]
pub struct TtlFilter {
    name: String,
    subinterfaces: Vec<String>,
}

impl TtlFilter {
    /// Create the filter builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subinterfaces: Vec::new(),
        }
    }

    /// Attach the filter to the output of a subinterface, such that each subinterface has its own
    /// counter.
    ///
    /// ```
    /// # use loopsim::export::srlinux::TtlFilter;
    /// assert_eq!(
    ///     TtlFilter::new("ttl").attach("ethernet-1/1.0").build(),
    ///     "\
    /// set / acl ipv4-filter ttl subinterface-specific output-only
    /// set / acl ipv4-filter ttl statistics-per-entry true
    /// set / acl ipv4-filter ttl entry 10 match protocol icmp
    /// set / acl ipv4-filter ttl entry 10 match icmp type time-exceeded
    /// set / acl ipv4-filter ttl entry 10 action accept
    /// set / acl ipv4-filter ttl entry 20 action accept
    /// set / interface ethernet-1/1 subinterface 0 acl output ipv4-filter ttl
    /// "
    /// );
    /// ```
    pub fn attach(&mut self, subinterface: impl Into<String>) -> &mut Self {
        self.subinterfaces.push(subinterface.into());
        self
    }

    /// Build the filter and all attachments.
    pub fn build(&self) -> String {
        let acl = format!("set / acl ipv4-filter {}", self.name);
        let mut cfg = format!(
            "{acl} subinterface-specific output-only\n\
             {acl} statistics-per-entry true\n\
             {acl} entry 10 match protocol icmp\n\
             {acl} entry 10 match icmp type time-exceeded\n\
             {acl} entry 10 action accept\n\
             {acl} entry 20 action accept\n"
        );
        for sub in self.subinterfaces.iter() {
            let (iface, idx) = sub.rsplit_once('.').unwrap_or((sub.as_str(), "0"));
            cfg.push_str(&format!(
                "set / interface {iface} subinterface {idx} acl output ipv4-filter {}\n",
                self.name
            ));
        }
        cfg
    }
}
