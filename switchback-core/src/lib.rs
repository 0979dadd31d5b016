//! Data-plane core of a connection-aware, rematching TCP load balancer.
//!
//! switchback sits between clients and a pool of backends and rewrites every
//! Ethernet/IPv4/TCP frame in place so that one client-facing TCP connection
//! can be transparently re-bound to a different backend socket between
//! transactions, without the client ever observing a reset.
//!
//! The single entry point is [`DataPlane::process`]: hand it a mutable frame
//! buffer, get back the [`Action`] the surrounding I/O layer should take
//! (deliver unchanged, retransmit the rewritten frame out the ingress
//! interface, or drop and count). Route and slot provisioning is the control
//! plane's job, expressed through the typed table surface on [`DataPlane`];
//! the core never picks backends itself.
#![forbid(unsafe_code)]

pub mod bookkeeper;
pub mod checksum;
pub mod engine;
pub mod error;
pub mod packet;
pub mod rewrite;
pub mod tables;
pub mod telemetry;

pub use engine::{Action, DataPlane};
pub use error::{DatapathError, Result};
pub use packet::{decode, Decoded, TcpFrame};
pub use switchback_common::{
    limits, Availability, Connection, Endpoint, EthConn, MacAddr, Numbers, Reroute, TxnPhase,
};
