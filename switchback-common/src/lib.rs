//! Flat records shared between the switchback data plane and control-plane
//! embedders.
//!
//! Every value here is a small, `Copy`, value-typed record keyed by an
//! endpoint or a 4-tuple. All addresses and ports are **host byte order**;
//! conversion to and from network byte order happens exactly once, at the
//! packet buffer boundary in `switchback-core::packet`.
//!
//! The crate is `no_std` so the same types can back a restricted execution
//! environment (a kernel datapath port) without change.
#![no_std]
#![forbid(unsafe_code)]

use core::fmt;

/// Compile-time sizing of the data plane. There is no runtime configuration:
/// the tables are provisioned for these bounds and the engine's loops are
/// bounded by them.
pub mod limits {
    /// Destination port identifying the client-facing direction.
    pub const LB_LISTENER_PORT: u16 = 8080;

    /// Upper bound on concurrent client connections.
    pub const MAX_CLIENTS: usize = 4;

    /// Upper bound on backend endpoints.
    pub const MAX_SERVERS: usize = 3;

    /// Binding slots per backend endpoint.
    pub const MAX_PER_SERVER: usize = 3;

    /// Maximum nesting of stacked 802.1Q/802.1ad tags the decoder will hop.
    pub const VLAN_MAX_DEPTH: usize = 4;

    /// Iteration budget for the TCP checksum: one MTU's worth of segment.
    pub const TCP_CSUM_BUDGET: usize = 1480;

    /// `conn_map` capacity: two directions per client.
    pub const CONN_MAP_ENTRIES: usize = 2 * MAX_CLIENTS;

    /// `numbers_map` capacity: one entry per client direction plus one per
    /// provisioned backend binding.
    pub const NUMBERS_MAP_ENTRIES: usize = MAX_CLIENTS + MAX_SERVERS * MAX_PER_SERVER;

    /// `available_map` capacity.
    pub const AVAILABLE_MAP_ENTRIES: usize = MAX_SERVERS;

    /// `state_map` capacity.
    pub const STATE_MAP_ENTRIES: usize = MAX_CLIENTS;
}

/// An Ethernet hardware address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// The MAC pair of a frame as observed in one direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct EthConn {
    pub src: MacAddr,
    pub dst: MacAddr,
}

impl EthConn {
    pub const fn new(src: MacAddr, dst: MacAddr) -> Self {
        Self { src, dst }
    }

    /// The same pair as seen from the opposite direction.
    #[must_use]
    pub const fn reversed(self) -> Self {
        Self { src: self.dst, dst: self.src }
    }
}

/// One side of a TCP connection: IPv4 address and port, host byte order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Endpoint {
    pub ip: u32,
    pub port: u16,
}

impl Endpoint {
    pub const fn new(ip: u32, port: u16) -> Self {
        Self { ip, port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.ip.to_be_bytes();
        write!(f, "{a}.{b}.{c}.{d}:{}", self.port)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// An observed 4-tuple, the key of the route and numbers tables.
///
/// The reverse-direction relation between table entries is implicit via
/// [`Connection::reversed`]; entries never reference each other directly.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Connection {
    pub src: Endpoint,
    pub dst: Endpoint,
}

impl Connection {
    pub const fn new(src: Endpoint, dst: Endpoint) -> Self {
        Self { src, dst }
    }

    /// The opposite direction of this connection.
    #[must_use]
    pub const fn reversed(self) -> Self {
        Self { src: self.dst, dst: self.src }
    }

    /// A packet heads toward the load balancer's listener iff its
    /// destination port is the listener port.
    pub const fn from_client(&self) -> bool {
        self.dst.port == limits::LB_LISTENER_PORT
    }

    pub const fn src_endpoint(&self) -> Endpoint {
        self.src
    }

    pub const fn dst_endpoint(&self) -> Endpoint {
        self.dst
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A directional routing record: binds one observed 4-tuple to the tuple it
/// must be rewritten toward, with the sequence/ack offsets that keep TCP
/// continuity across the rewrite.
///
/// `seq_offset`/`ack_offset` are *observed − desired*; the rewriter subtracts
/// them. While `rematch_pending` is set the `new_*` fields describe the
/// target of a pending backend handoff; otherwise they mirror `original_*`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reroute {
    pub original_conn: Connection,
    pub original_eth: EthConn,
    /// Slot index into the backend's availability vector.
    pub original_index: u32,
    pub seq_offset: i32,
    pub ack_offset: i32,
    pub rematch_pending: bool,
    pub new_conn: Connection,
    pub new_eth: EthConn,
    pub new_index: u32,
}

impl Reroute {
    /// A freshly installed binding: zero offsets, no pending handoff,
    /// `new_*` mirroring `original_*`.
    pub const fn new(original_conn: Connection, original_eth: EthConn, original_index: u32) -> Self {
        Self {
            original_conn,
            original_eth,
            original_index,
            seq_offset: 0,
            ack_offset: 0,
            rematch_pending: false,
            new_conn: original_conn,
            new_eth: original_eth,
            new_index: original_index,
        }
    }
}

/// Per-direction sequence bookkeeping.
///
/// `init_seq`/`init_ack` are captured once, at connection birth, and replayed
/// on reset so a RST carries numbers consistent with the client's view of its
/// single virtual connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Numbers {
    pub seq_no: u32,
    pub ack_no: u32,
    pub init_seq: u32,
    pub init_ack: u32,
    /// MAC pair last seen in this direction.
    pub cur_eth: EthConn,
}

impl Numbers {
    /// Seed an entry at connection birth; the observed values become the
    /// initial values.
    pub const fn seeded(seq_no: u32, ack_no: u32, cur_eth: EthConn) -> Self {
        Self { seq_no, ack_no, init_seq: seq_no, init_ack: ack_no, cur_eth }
    }
}

/// Binding slots of one backend endpoint. The control plane stamps a slot
/// when it assigns the backend to a client; the data plane flips `valid`
/// off on teardown and handoff.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Availability {
    pub conns: [Connection; limits::MAX_PER_SERVER],
    pub valid: [bool; limits::MAX_PER_SERVER],
}

/// A client's transactional phase. A backend handoff is only allowed to
/// complete in `ResponseReceived`, so it never splits a half-delivered
/// transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum TxnPhase {
    /// The last payload moved client → server.
    RequestSent = 0,
    /// The last payload moved server → client.
    ResponseReceived = 1,
}
