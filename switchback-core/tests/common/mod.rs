//! Shared fixtures: a raw-frame builder, an independent checksum reference,
//! and the small two-backend topology the scenario tests run against.
#![allow(dead_code)]

use switchback_core::{Connection, DataPlane, Endpoint, EthConn, MacAddr};

pub const fn ip4(a: u8, b: u8, c: u8, d: u8) -> u32 {
    u32::from_be_bytes([a, b, c, d])
}

// ── Topology ────────────────────────────────────────────────────────────────
//
// One client, the balancer's listener, and two pre-established upstream
// connections (one ephemeral balancer socket per backend).

pub const CLIENT: Endpoint = Endpoint::new(ip4(10, 0, 0, 1), 40_000);
pub const LISTENER: Endpoint = Endpoint::new(ip4(10, 0, 0, 100), 8080);
pub const UP_A: Endpoint = Endpoint::new(ip4(10, 0, 0, 100), 50_001);
pub const UP_B: Endpoint = Endpoint::new(ip4(10, 0, 0, 100), 50_002);
pub const BACKEND_A: Endpoint = Endpoint::new(ip4(10, 0, 0, 50), 4171);
pub const BACKEND_B: Endpoint = Endpoint::new(ip4(10, 0, 0, 51), 4172);

/// Client-facing direction key.
pub const CLIENT_CONN: Connection = Connection::new(CLIENT, LISTENER);
/// Balancer → backend A direction key (numbers seeded by A's SYN+ACK).
pub const UPSTREAM_A: Connection = Connection::new(UP_A, BACKEND_A);
/// Balancer → backend B direction key.
pub const UPSTREAM_B: Connection = Connection::new(UP_B, BACKEND_B);

pub const CLIENT_MAC: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x01]);
pub const LB_CLIENT_SIDE_MAC: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x02]);
pub const LB_SERVER_SIDE_MAC: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x03]);
pub const BACKEND_A_MAC: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x0a]);
pub const BACKEND_B_MAC: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x0b]);

/// MAC pair of frames rewritten toward backend A.
pub const TOWARD_A_ETH: EthConn = EthConn::new(LB_SERVER_SIDE_MAC, BACKEND_A_MAC);
/// MAC pair of frames rewritten toward backend B.
pub const TOWARD_B_ETH: EthConn = EthConn::new(LB_SERVER_SIDE_MAC, BACKEND_B_MAC);
/// MAC pair of frames rewritten toward the client.
pub const TOWARD_CLIENT_ETH: EthConn = EthConn::new(LB_CLIENT_SIDE_MAC, CLIENT_MAC);

// ── Frame builder ───────────────────────────────────────────────────────────

pub struct FrameBuilder {
    src_mac: MacAddr,
    dst_mac: MacAddr,
    vlan_tags: usize,
    src: Endpoint,
    dst: Endpoint,
    seq: u32,
    ack: u32,
    flags: u8,
    payload: Vec<u8>,
}

impl FrameBuilder {
    pub fn tcp(src: Endpoint, dst: Endpoint) -> Self {
        Self {
            src_mac: CLIENT_MAC,
            dst_mac: LB_CLIENT_SIDE_MAC,
            vlan_tags: 0,
            src,
            dst,
            seq: 0,
            ack: 0,
            flags: 0,
            payload: Vec::new(),
        }
    }

    pub fn macs(mut self, src: MacAddr, dst: MacAddr) -> Self {
        self.src_mac = src;
        self.dst_mac = dst;
        self
    }

    pub fn vlan_tags(mut self, n: usize) -> Self {
        self.vlan_tags = n;
        self
    }

    pub fn seq_ack(mut self, seq: u32, ack: u32) -> Self {
        self.seq = seq;
        self.ack = ack;
        self
    }

    pub fn syn(mut self) -> Self {
        self.flags |= 0x02;
        self
    }

    pub fn ack_flag(mut self) -> Self {
        self.flags |= 0x10;
        self
    }

    pub fn psh(mut self) -> Self {
        self.flags |= 0x08;
        self
    }

    pub fn rst(mut self) -> Self {
        self.flags |= 0x04;
        self
    }

    pub fn payload(mut self, bytes: &[u8]) -> Self {
        self.payload = bytes.to_vec();
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.dst_mac.0);
        buf.extend_from_slice(&self.src_mac.0);
        if self.vlan_tags == 0 {
            buf.extend_from_slice(&0x0800u16.to_be_bytes());
        } else {
            buf.extend_from_slice(&0x8100u16.to_be_bytes());
            for i in 0..self.vlan_tags {
                buf.extend_from_slice(&[0, 0]); // TCI
                let inner: u16 = if i + 1 == self.vlan_tags { 0x0800 } else { 0x8100 };
                buf.extend_from_slice(&inner.to_be_bytes());
            }
        }

        let l3 = buf.len();
        let total_len = (20 + 20 + self.payload.len()) as u16;
        buf.push(0x45); // version 4, IHL 5
        buf.push(0);
        buf.extend_from_slice(&total_len.to_be_bytes());
        buf.extend_from_slice(&[0, 0, 0, 0]); // id, frag
        buf.push(64); // ttl
        buf.push(6); // TCP
        buf.extend_from_slice(&[0, 0]); // checksum placeholder
        buf.extend_from_slice(&self.src.ip.to_be_bytes());
        buf.extend_from_slice(&self.dst.ip.to_be_bytes());

        let l4 = buf.len();
        buf.extend_from_slice(&self.src.port.to_be_bytes());
        buf.extend_from_slice(&self.dst.port.to_be_bytes());
        buf.extend_from_slice(&self.seq.to_be_bytes());
        buf.extend_from_slice(&self.ack.to_be_bytes());
        buf.push(0x50); // doff 5
        buf.push(self.flags);
        buf.extend_from_slice(&0xffffu16.to_be_bytes()); // window
        buf.extend_from_slice(&[0, 0, 0, 0]); // checksum, urgent ptr
        buf.extend_from_slice(&self.payload);

        let ip_check = !(ref_ones_complement(&buf[l3..l3 + 20]) as u16);
        buf[l3 + 10..l3 + 12].copy_from_slice(&ip_check.to_be_bytes());

        let mut pseudo = Vec::new();
        pseudo.extend_from_slice(&buf[l3 + 12..l3 + 20]);
        pseudo.extend_from_slice(&[0, 6]);
        pseudo.extend_from_slice(&((buf.len() - l4) as u16).to_be_bytes());
        let mut sum =
            u64::from(ref_ones_complement(&pseudo)) + u64::from(ref_ones_complement(&buf[l4..]));
        while sum > 0xffff {
            sum = (sum >> 16) + (sum & 0xffff);
        }
        let tcp_check = !(sum as u16);
        buf[l4 + 16..l4 + 18].copy_from_slice(&tcp_check.to_be_bytes());

        buf
    }
}

// ── Checksum reference (independent of the crate under test) ────────────────

/// Folded (not inverted) one's-complement sum of big-endian 16-bit words.
pub fn ref_ones_complement(data: &[u8]) -> u32 {
    let mut sum = 0u64;
    let mut i = 0;
    while i + 1 < data.len() {
        sum += u64::from(u16::from_be_bytes([data[i], data[i + 1]]));
        i += 2;
    }
    if i < data.len() {
        sum += u64::from(data[i]) << 8;
    }
    while sum > 0xffff {
        sum = (sum >> 16) + (sum & 0xffff);
    }
    sum as u32
}

/// Verify both checksums of an un-tagged frame: a correct checksum makes the
/// covering one's-complement sum fold to all ones.
pub fn frame_checksums_are_valid(frame: &[u8]) -> bool {
    let ihl = usize::from(frame[14] & 0x0f) * 4;
    let l4 = 14 + ihl;
    if ref_ones_complement(&frame[14..14 + ihl]) != 0xffff {
        return false;
    }
    let total_len = usize::from(u16::from_be_bytes([frame[16], frame[17]]));
    let segment = &frame[l4..14 + total_len];
    let mut pseudo = Vec::new();
    pseudo.extend_from_slice(&frame[l3_addrs_start()..l3_addrs_start() + 8]);
    pseudo.extend_from_slice(&[0, 6]);
    pseudo.extend_from_slice(&(segment.len() as u16).to_be_bytes());
    let mut sum =
        u64::from(ref_ones_complement(&pseudo)) + u64::from(ref_ones_complement(segment));
    while sum > 0xffff {
        sum = (sum >> 16) + (sum & 0xffff);
    }
    sum == 0xffff
}

const fn l3_addrs_start() -> usize {
    14 + 12
}

// ── Plane fixtures ──────────────────────────────────────────────────────────

/// A plane that has observed the client's first ACK (seq 1000, ack 2000) and
/// backend A's SYN+ACK (seq 5000, ack 7001), but has no routes yet.
pub fn seeded_plane() -> DataPlane {
    let plane = DataPlane::new();

    let mut client_ack = FrameBuilder::tcp(CLIENT, LISTENER)
        .macs(CLIENT_MAC, LB_CLIENT_SIDE_MAC)
        .seq_ack(1000, 2000)
        .ack_flag()
        .build();
    assert_eq!(plane.process(&mut client_ack), switchback_core::Action::Pass);

    let mut syn_ack = FrameBuilder::tcp(BACKEND_A, UP_A)
        .macs(BACKEND_A_MAC, LB_SERVER_SIDE_MAC)
        .seq_ack(5000, 7001)
        .syn()
        .ack_flag()
        .build();
    assert_eq!(plane.process(&mut syn_ack), switchback_core::Action::Pass);

    plane
}

/// A seeded plane with the client admitted against backend A, slot 0.
pub fn admitted_plane() -> DataPlane {
    let plane = seeded_plane();
    plane
        .admit(CLIENT_CONN, UPSTREAM_A, TOWARD_A_ETH, TOWARD_CLIENT_ETH, 0)
        .expect("admit against backend A");
    plane
}

/// Run one request/response exchange through an admitted plane, leaving the
/// client in the response-received phase with numbers advanced to
/// (seq 1018, ack 2100).
pub fn exchanged_plane() -> DataPlane {
    let plane = admitted_plane();

    let mut request = FrameBuilder::tcp(CLIENT, LISTENER)
        .macs(CLIENT_MAC, LB_CLIENT_SIDE_MAC)
        .seq_ack(1000, 2000)
        .ack_flag()
        .psh()
        .payload(b"GET / HTTP/1.0\r\n\r\n")
        .build();
    assert_eq!(plane.process(&mut request), switchback_core::Action::Tx);

    let mut response = FrameBuilder::tcp(BACKEND_A, UP_A)
        .macs(BACKEND_A_MAC, LB_SERVER_SIDE_MAC)
        .seq_ack(5001, 7019)
        .ack_flag()
        .psh()
        .payload(&[0x55; 100])
        .build();
    assert_eq!(plane.process(&mut response), switchback_core::Action::Tx);

    plane
}
