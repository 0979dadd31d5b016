//! In-place frame rewriting.
//!
//! Offsets are *observed − desired*, so applying a route subtracts them;
//! a route with zero offsets and an identity address/MAC binding is a no-op
//! on everything but the (recomputed) checksums.

use switchback_common::{Numbers, Reroute};

use crate::packet::TcpFrame;

/// Rewrite a routed frame toward its bound destination: shift seq/ack by the
/// route's offsets, overwrite ports, addresses and MACs with the binding,
/// and recompute both checksums.
pub fn apply(pkt: &mut TcpFrame<'_>, reroute: &Reroute) {
    let seq = pkt.seq().wrapping_sub(reroute.seq_offset as u32);
    let ack = pkt.ack_seq().wrapping_sub(reroute.ack_offset as u32);
    pkt.set_seq(seq);
    pkt.set_ack_seq(ack);
    pkt.set_src_port(reroute.original_conn.src.port);
    pkt.set_dst_port(reroute.original_conn.dst.port);
    pkt.set_saddr(reroute.original_conn.src.ip);
    pkt.set_daddr(reroute.original_conn.dst.ip);
    pkt.set_eth_conn(reroute.original_eth);
    pkt.update_checksums();
}

/// Restore a frame's seq/ack to the connection-birth values, so a RST
/// reaches its recipient with numbering consistent with the client's view
/// of the virtual connection. Addressing and MACs are left untouched.
pub fn restore_initial(pkt: &mut TcpFrame<'_>, nums: &Numbers) {
    pkt.set_seq(nums.init_seq);
    pkt.set_ack_seq(nums.init_ack);
    pkt.update_checksums();
}
