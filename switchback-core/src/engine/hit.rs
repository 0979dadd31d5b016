//! Route-hit dispatch: teardown on client reset, sequence bookkeeping on
//! server PSH, handoff completion, phase tracking, and the final rewrite.

use switchback_common::{limits, Connection, Reroute, TxnPhase};
use tracing::debug;

use crate::error::{DatapathError, Result};
use crate::packet::TcpFrame;
use crate::rewrite;

use super::{Action, DataPlane};

impl DataPlane {
    pub(super) fn on_route_hit(
        &self,
        pkt: &mut TcpFrame<'_>,
        conn: Connection,
        reroute: Reroute,
    ) -> Result<Action> {
        if pkt.rst() && conn.from_client() {
            return self.teardown_on_client_rst(pkt, conn, &reroute);
        }

        // A PSH from a backend is the one event that moves the virtual
        // connection's numbers forward, on both directions at once.
        if pkt.psh() && !conn.from_client() {
            self.bookkeeper.advance_on_server_psh(
                conn.reversed(),
                reroute.original_conn.reversed(),
                pkt.seq(),
                pkt.ack_seq(),
                pkt.payload_len().max(0) as u32,
                reroute.seq_offset,
                reroute.ack_offset,
            )?;
        }

        let reroute = if reroute.rematch_pending && conn.from_client() {
            self.maybe_rematch(pkt, conn, reroute)?
        } else {
            reroute
        };

        self.update_phase(pkt, conn, &reroute)?;
        rewrite::apply(pkt, &reroute);
        Ok(Action::Tx)
    }

    /// A client reset tears the whole binding down: the RST itself is first
    /// restored to the connection-birth numbering so its recipient sees a
    /// coherent reset, then the numbers entry, the backend slot and both
    /// route directions are released, in that order.
    fn teardown_on_client_rst(
        &self,
        pkt: &mut TcpFrame<'_>,
        conn: Connection,
        reroute: &Reroute,
    ) -> Result<Action> {
        let nums = self.bookkeeper.read(&conn).ok_or(DatapathError::MissingNumbers(conn))?;
        rewrite::restore_initial(pkt, &nums);

        self.bookkeeper.delete(&conn);
        self.release_slot(reroute)?;
        self.conn_map.remove(&conn).ok_or(DatapathError::MissingRoute(conn))?;
        let rev = reroute.original_conn.reversed();
        self.conn_map.remove(&rev).ok_or(DatapathError::MissingRoute(rev))?;

        debug!(%conn, backend = %reroute.original_conn.dst_endpoint(), "torn down on client reset");
        Ok(Action::Pass)
    }

    /// Flip the backend slot this route holds back to free.
    pub(super) fn release_slot(&self, reroute: &Reroute) -> Result<()> {
        let server = reroute.original_conn.dst_endpoint();
        let mut avail =
            self.available_map.get(&server).ok_or(DatapathError::MissingAvailability(server))?;
        let index = reroute.original_index as usize;
        let slot = avail.valid.get_mut(index).ok_or(DatapathError::SlotOutOfRange {
            index: reroute.original_index,
            limit: limits::MAX_PER_SERVER,
        })?;
        *slot = false;
        self.available_map.insert(server, avail)?;
        Ok(())
    }

    /// Payload-bearing packets flip the owning client's transactional phase:
    /// client payload opens a request, server payload completes a response.
    /// The client endpoint is the packet source on the client-facing
    /// direction, and the route's rewrite destination on the server-facing
    /// one.
    fn update_phase(&self, pkt: &TcpFrame<'_>, conn: Connection, reroute: &Reroute) -> Result<()> {
        if pkt.payload_len() <= 0 {
            return Ok(());
        }
        if conn.from_client() {
            self.state_map.insert(conn.src_endpoint(), TxnPhase::RequestSent)?;
        } else {
            self.state_map
                .insert(reroute.original_conn.dst_endpoint(), TxnPhase::ResponseReceived)?;
        }
        Ok(())
    }
}
