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

//! Point-to-point link addressing.
//!
//! The [`Addressor`] splits an address pool (by default `192.168.0.0/24`) into `/31` networks and
//! hands them out link by link. The first endpoint of a link gets the lower (even) address, the
//! second endpoint the upper (odd) address. Interface indices are assigned per node in the order
//! in which its links are allocated.

use std::{collections::BTreeMap, net::Ipv4Addr};

use ipnet::{Ipv4Net, Ipv4Subnets};
use lazy_static::lazy_static;
use log::trace;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Iface, RouterId};

/// Prefix length of every link network.
pub const LINK_PREFIX_LEN: u8 = 31;

lazy_static! {
    /// The default address pool, `192.168.0.0/24`.
    pub static ref DEFAULT_ADDRESS_POOL: Ipv4Net = "192.168.0.0/24".parse().unwrap();
}

/// Errors thrown while assigning or looking up addresses.
#[derive(Debug, Error, PartialEq)]
pub enum AddressError {
    /// The netmask is invalid.
    #[error("Invalid Netmask: {0}")]
    InvalidNetmask(#[from] ipnet::PrefixLenError),
    /// Prefix Assignment Error
    #[error("IP address could not be assigned! ran out of addresses.")]
    NotEnoughAddresses,
    /// The two routers are not connected!
    #[error("Router {0:?} and {1:?} are not connected!")]
    RouterNotConnectedTo(RouterId, RouterId),
}

/// Transforms an option into a result, returning `AddressError::NotEnoughAddresses` if it is
/// `None`.
fn ip_err<T>(option: Option<T>) -> Result<T, AddressError> {
    option.ok_or(AddressError::NotEnoughAddresses)
}

/// Identifier of an undirected link, always ordered by the router index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkId(RouterId, RouterId);

impl LinkId {
    /// Create a new Link ID
    pub fn new(a: RouterId, b: RouterId) -> Self {
        if a.index() < b.index() {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }
}

impl From<(RouterId, RouterId)> for LinkId {
    fn from(x: (RouterId, RouterId)) -> Self {
        Self::new(x.0, x.1)
    }
}

/// A link with both of its endpoints, as returned by [`Addressor::list_links`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressedLink {
    /// The first endpoint, which got the lower address.
    pub a: RouterId,
    /// Interface of `a` toward `b`.
    pub a_iface: Iface,
    /// The second endpoint, which got the upper address.
    pub b: RouterId,
    /// Interface of `b` toward `a`.
    pub b_iface: Iface,
}

/// Sequential `/31` allocator for point-to-point links.
#[derive(Debug, Clone)]
pub struct Addressor {
    pool: Ipv4Net,
    link_addr_iter: Ipv4Subnets,
    links: Vec<AddressedLink>,
    link_ids: BTreeMap<LinkId, usize>,
    interfaces: BTreeMap<RouterId, BTreeMap<RouterId, Iface>>,
}

impl Addressor {
    /// Create a new addressor that allocates `/31` networks out of `pool`. This fails if the pool
    /// is smaller than a single `/31`.
    pub fn new(pool: Ipv4Net) -> Result<Self, AddressError> {
        let pool = pool.trunc();
        Ok(Self {
            pool,
            link_addr_iter: pool.subnets(LINK_PREFIX_LEN)?,
            links: Vec::new(),
            link_ids: BTreeMap::new(),
            interfaces: BTreeMap::new(),
        })
    }

    /// The address pool of this addressor.
    pub fn pool(&self) -> Ipv4Net {
        self.pool
    }

    /// Number of links that were allocated.
    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    /// Allocate the next `/31` for the link between `a` and `b`. The lower address is assigned to
    /// `a`, and the upper address to `b`. Allocating the same link twice returns the existing
    /// interfaces. When the pool is exhausted, this returns `AddressError::NotEnoughAddresses` and
    /// leaves all earlier allocations untouched.
    pub fn allocate(&mut self, a: RouterId, b: RouterId) -> Result<(Iface, Iface), AddressError> {
        let id = LinkId::new(a, b);
        if self.link_ids.contains_key(&id) {
            return Ok((*self.iface(a, b)?, *self.iface(b, a)?));
        }

        let net = ip_err(self.link_addr_iter.next())?;
        let a_iface = Iface {
            idx: self.interfaces.get(&a).map(|x| x.len()).unwrap_or(0) + 1,
            addr: net.network(),
            net,
        };
        let b_iface = Iface {
            idx: self.interfaces.get(&b).map(|x| x.len()).unwrap_or(0) + 1,
            addr: net.broadcast(),
            net,
        };
        trace!(
            "allocate {net} for {} ({}) -- {} ({})",
            a.index(),
            a_iface.name(),
            b.index(),
            b_iface.name()
        );

        self.interfaces.entry(a).or_default().insert(b, a_iface);
        self.interfaces.entry(b).or_default().insert(a, b_iface);
        self.link_ids.insert(id, self.links.len());
        self.links.push(AddressedLink {
            a,
            a_iface,
            b,
            b_iface,
        });

        Ok((a_iface, b_iface))
    }

    /// Get the interface of `router` that faces `neighbor`.
    pub fn iface(&self, router: RouterId, neighbor: RouterId) -> Result<&Iface, AddressError> {
        self.try_get_iface(router, neighbor)
            .ok_or(AddressError::RouterNotConnectedTo(router, neighbor))
    }

    /// Get the interface of `router` that faces `neighbor`, or `None` if the two are not
    /// connected.
    pub fn try_get_iface(&self, router: RouterId, neighbor: RouterId) -> Option<&Iface> {
        self.interfaces.get(&router).and_then(|x| x.get(&neighbor))
    }

    /// Get the address of `router` on the link toward `neighbor`.
    pub fn iface_address(
        &self,
        router: RouterId,
        neighbor: RouterId,
    ) -> Result<Ipv4Addr, AddressError> {
        Ok(self.iface(router, neighbor)?.addr)
    }

    /// Get the `/31` network of the link between `a` and `b`.
    pub fn link_network(&self, a: RouterId, b: RouterId) -> Result<Ipv4Net, AddressError> {
        Ok(self.iface(a, b)?.net)
    }

    /// List all interfaces of a router, sorted by their index. Each entry contains the neighbor
    /// and the interface facing it.
    pub fn list_ifaces(&self, router: RouterId) -> Vec<(RouterId, Iface)> {
        let mut ifaces: Vec<(RouterId, Iface)> = self
            .interfaces
            .get(&router)
            .map(|x| x.iter().map(|(n, i)| (*n, *i)).collect())
            .unwrap_or_default();
        ifaces.sort_by_key(|(_, i)| i.idx);
        ifaces
    }

    /// List all links in the order in which they were allocated.
    pub fn list_links(&self) -> &[AddressedLink] {
        &self.links
    }

    /// Find the router that owns the given address, together with the interface holding it.
    pub fn find_address(&self, addr: Ipv4Addr) -> Option<(RouterId, Iface)> {
        self.links.iter().find_map(|l| {
            if l.a_iface.addr == addr {
                Some((l.a, l.a_iface))
            } else if l.b_iface.addr == addr {
                Some((l.b, l.b_iface))
            } else {
                None
            }
        })
    }

    /// Find the neighbor of `router` that is connected via the interface with index `idx`.
    pub fn find_neighbor(&self, router: RouterId, idx: usize) -> Option<RouterId> {
        self.interfaces
            .get(&router)?
            .iter()
            .find(|(_, i)| i.idx == idx)
            .map(|(n, _)| *n)
    }

    /// Find the neighbor on the other end of the link that contains `addr` (i.e., the peer that
    /// does *not* own `addr`).
    pub fn find_peer(&self, addr: Ipv4Addr) -> Option<(RouterId, Iface)> {
        self.links.iter().find_map(|l| {
            if l.a_iface.addr == addr {
                Some((l.b, l.b_iface))
            } else if l.b_iface.addr == addr {
                Some((l.a, l.a_iface))
            } else {
                None
            }
        })
    }
}

impl PartialEq for Addressor {
    fn eq(&self, other: &Self) -> bool {
        self.pool == other.pool && self.links == other.links
    }
}
