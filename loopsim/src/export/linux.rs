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

//! Module that generates `iproute2` commands for the egress host.

use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// Builder for an `ip addr add` command.
///
/// ```
/// # use loopsim::export::linux::IpAddr;
/// let addr = "192.168.0.7/31".parse().unwrap();
/// assert_eq!(IpAddr::new(addr, "e1-1").build(), "ip addr add 192.168.0.7/31 dev e1-1\n");
/// ```
#[derive(Debug)]
pub struct IpAddr {
    addr: Ipv4Net,
    dev: String,
}

impl IpAddr {
    /// Assign `addr` (including the prefix length) to the device `dev`.
    pub fn new(addr: Ipv4Net, dev: impl Into<String>) -> Self {
        Self {
            addr,
            dev: dev.into(),
        }
    }

    /// Build the command.
    pub fn build(&self) -> String {
        format!("ip addr add {} dev {}\n", self.addr, self.dev)
    }
}

/// Builder for an `ip route add` command.
#[derive(Debug)]
pub struct IpRoute {
    destination: Ipv4Net,
    via: Option<Ipv4Addr>,
    dev: Option<String>,
    src: Option<Ipv4Addr>,
}

impl IpRoute {
    /// Create a new route toward `destination`.
    pub fn new(destination: Ipv4Net) -> Self {
        Self {
            destination,
            via: None,
            dev: None,
            src: None,
        }
    }

    /// Set the next-hop address.
    pub fn via(&mut self, addr: Ipv4Addr) -> &mut Self {
        self.via = Some(addr);
        self
    }

    /// Set the outgoing device.
    pub fn dev(&mut self, dev: impl Into<String>) -> &mut Self {
        self.dev = Some(dev.into());
        self
    }

    /// Set the preferred source address.
    pub fn src(&mut self, addr: Ipv4Addr) -> &mut Self {
        self.src = Some(addr);
        self
    }

    /// Build the command.
    ///
    /// ```
    /// # use loopsim::export::linux::IpRoute;
    /// let dst = "192.168.0.0/32".parse().unwrap();
    /// assert_eq!(
    ///     IpRoute::new(dst)
    ///         .via("192.168.0.6".parse().unwrap())
    ///         .dev("e1-1")
    ///         .src("192.168.0.7".parse().unwrap())
    ///         .build(),
    ///     "ip route add 192.168.0.0/32 via 192.168.0.6 dev e1-1 src 192.168.0.7\n"
    /// );
    /// ```
    pub fn build(&self) -> String {
        let mut cmd = format!("ip route add {}", self.destination);
        if let Some(via) = self.via {
            cmd.push_str(&format!(" via {via}"));
        }
        if let Some(dev) = self.dev.as_ref() {
            cmd.push_str(&format!(" dev {dev}"));
        }
        if let Some(src) = self.src {
            cmd.push_str(&format!(" src {src}"));
        }
        cmd.push('\n');
        cmd
    }
}
