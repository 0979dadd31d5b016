//! The per-packet engine: route lookup, direction classification, and the
//! dispatch between the miss path (observation) and the hit path (rewrite).
//!
//! One invocation handles exactly one frame, never blocks and never waits:
//! every loop it reaches is compile-time bounded. Invocations may run
//! concurrently on different frames; the shared tables give per-key atomic
//! operations and the engine orders its multi-key side effects so concurrent
//! observers never see a freed slot still referenced by a live route.

mod handoff;
mod hit;

use switchback_common::{
    limits, Availability, Connection, Endpoint, EthConn, Numbers, Reroute, TxnPhase,
};
use tracing::{debug, warn};

use crate::bookkeeper::SeqBookkeeper;
use crate::error::{DatapathError, Result};
use crate::packet::{self, Decoded, TcpFrame};
use crate::tables::{
    availability_table, conn_table, state_table, AvailabilityTable, ConnTable, StateTable,
};

/// What the surrounding I/O layer should do with the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Deliver to the normal network stack unchanged.
    Pass,
    /// Retransmit the rewritten frame out the ingress interface.
    Tx,
    /// Drop and count as an error.
    Aborted,
}

/// The data plane: four shared tables and the per-packet state machine over
/// them. The control plane admits clients and requests handoffs through the
/// typed surface below; the engine owns invalidation (teardown, slot release)
/// and never allocates routes itself.
pub struct DataPlane {
    conn_map: ConnTable,
    bookkeeper: SeqBookkeeper,
    available_map: AvailabilityTable,
    state_map: StateTable,
}

impl DataPlane {
    pub fn new() -> Self {
        Self {
            conn_map: conn_table(),
            bookkeeper: SeqBookkeeper::new(),
            available_map: availability_table(),
            state_map: state_table(),
        }
    }

    /// Process one raw frame in place.
    ///
    /// Non-participating traffic comes back [`Action::Pass`] with the buffer
    /// untouched. Routed TCP traffic is rewritten in place and comes back
    /// [`Action::Tx`]. Errors are local to the frame: the tables keep the
    /// state they had before the failing step and the frame is dropped.
    pub fn process(&self, frame: &mut [u8]) -> Action {
        let mut pkt = match packet::decode(frame) {
            Decoded::Tcp(pkt) => pkt,
            Decoded::PassThrough => return Action::Pass,
        };
        let conn = pkt.connection();

        let outcome = match self.conn_map.get(&conn) {
            Some(reroute) => self.on_route_hit(&mut pkt, conn, reroute),
            None => self.on_route_miss(&pkt, conn),
        };
        match outcome {
            Ok(action) => action,
            Err(error) => {
                warn!(%conn, %error, "aborting packet");
                Action::Aborted
            }
        }
    }

    /// No route for this frame: either record a connection-birth observation
    /// for a future binding, or stay out of the way. A client data packet
    /// with no route is refused rather than leaked.
    fn on_route_miss(&self, pkt: &TcpFrame<'_>, conn: Connection) -> Result<Action> {
        if conn.from_client() && pkt.payload_len() > 0 {
            warn!(%conn, payload_len = pkt.payload_len(), "client data before route install, dropping");
            return Ok(Action::Aborted);
        }

        if pkt.ack() && conn.from_client() {
            self.bookkeeper.seed_from_client_ack(conn, pkt.seq(), pkt.ack_seq(), pkt.eth_conn())?;
        } else if pkt.syn() && pkt.ack() {
            self.bookkeeper.seed_from_syn_ack_reverse(
                conn,
                pkt.seq(),
                pkt.ack_seq(),
                pkt.eth_conn(),
            )?;
        }
        Ok(Action::Pass)
    }

    // ── Control-plane surface ───────────────────────────────────────────────

    /// Install (or replace) the reroute record for one direction.
    pub fn install_reroute(&self, key: Connection, reroute: Reroute) -> Result<()> {
        self.conn_map.insert(key, reroute)?;
        Ok(())
    }

    /// Stamp a backend slot as bound to `client_conn`. Creates the backend's
    /// availability entry on first use.
    pub fn stamp_slot(&self, server: Endpoint, index: u32, client_conn: Connection) -> Result<()> {
        let i = index as usize;
        if i >= limits::MAX_PER_SERVER {
            return Err(DatapathError::SlotOutOfRange { index, limit: limits::MAX_PER_SERVER });
        }
        let mut avail = self.available_map.get(&server).unwrap_or_default();
        avail.conns[i] = client_conn;
        avail.valid[i] = true;
        self.available_map.insert(server, avail)?;
        Ok(())
    }

    /// Admit a client whose numbers have been observed: install both route
    /// directions against the pre-established upstream connection
    /// (`upstream_conn` is the LB→backend direction whose numbers a SYN+ACK
    /// seeded), stamp the backend slot, and start the client in the
    /// request phase.
    ///
    /// The initial offsets use the same arithmetic a handoff uses: the
    /// difference between the client's observed numbering and the upstream
    /// connection's numbering, each direction mirrored.
    pub fn admit(
        &self,
        client_conn: Connection,
        upstream_conn: Connection,
        forward_eth: EthConn,
        reverse_eth: EthConn,
        slot: u32,
    ) -> Result<()> {
        let client_nums =
            self.bookkeeper.read(&client_conn).ok_or(DatapathError::MissingNumbers(client_conn))?;
        let upstream_nums = self
            .bookkeeper
            .read(&upstream_conn)
            .ok_or(DatapathError::MissingNumbers(upstream_conn))?;

        let mut forward = Reroute::new(upstream_conn, forward_eth, slot);
        forward.seq_offset = client_nums.seq_no.wrapping_sub(upstream_nums.seq_no) as i32;
        forward.ack_offset = client_nums.ack_no.wrapping_sub(upstream_nums.ack_no) as i32;

        let mut reverse = Reroute::new(client_conn.reversed(), reverse_eth, 0);
        reverse.seq_offset = upstream_nums.ack_no.wrapping_sub(client_nums.ack_no) as i32;
        reverse.ack_offset = upstream_nums.seq_no.wrapping_sub(client_nums.seq_no) as i32;

        self.install_reroute(client_conn, forward)?;
        self.install_reroute(upstream_conn.reversed(), reverse)?;
        self.stamp_slot(upstream_conn.dst_endpoint(), slot, client_conn)?;
        self.state_map.insert(client_conn.src_endpoint(), TxnPhase::RequestSent)?;
        debug!(client = %client_conn, upstream = %upstream_conn, slot, "client admitted");
        Ok(())
    }

    /// Request a handoff: record the target binding on the client-facing
    /// route and mark it pending. The engine completes the handoff on the
    /// next qualifying client packet.
    pub fn request_rematch(
        &self,
        key: Connection,
        new_conn: Connection,
        new_eth: EthConn,
        new_index: u32,
    ) -> Result<()> {
        let mut reroute = self.conn_map.get(&key).ok_or(DatapathError::MissingRoute(key))?;
        reroute.new_conn = new_conn;
        reroute.new_eth = new_eth;
        reroute.new_index = new_index;
        reroute.rematch_pending = true;
        self.conn_map.insert(key, reroute)?;
        Ok(())
    }

    // ── Read accessors ──────────────────────────────────────────────────────

    pub fn reroute(&self, conn: &Connection) -> Option<Reroute> {
        self.conn_map.get(conn)
    }

    pub fn numbers(&self, conn: &Connection) -> Option<Numbers> {
        self.bookkeeper.read(conn)
    }

    pub fn availability(&self, server: &Endpoint) -> Option<Availability> {
        self.available_map.get(server)
    }

    pub fn state(&self, client: &Endpoint) -> Option<TxnPhase> {
        self.state_map.get(client)
    }

    pub fn route_count(&self) -> usize {
        self.conn_map.len()
    }

    pub fn numbers_count(&self) -> usize {
        self.bookkeeper.len()
    }
}

impl Default for DataPlane {
    fn default() -> Self {
        Self::new()
    }
}
