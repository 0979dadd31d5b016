//! Backend handoff: re-binding an established client connection to a new
//! backend between transactions.

use switchback_common::{Connection, Reroute, TxnPhase};
use tracing::{debug, info};

use crate::error::{DatapathError, Result};
use crate::packet::TcpFrame;

use super::DataPlane;

impl DataPlane {
    /// Complete a pending handoff if the client's transaction is closed.
    ///
    /// `conn` is the client-facing key carrying the pending flag and `pkt`
    /// the client packet that hit it. When the client is still mid-request
    /// the route is returned unchanged and the flag stays pending; otherwise
    /// the old slot is freed, the stale server-facing route dropped, the
    /// client-facing route re-pointed at the target with fresh offsets, and
    /// a new server-facing route installed. This very packet is then the
    /// first one delivered to the new backend under the new offsets.
    pub(super) fn maybe_rematch(
        &self,
        pkt: &TcpFrame<'_>,
        conn: Connection,
        reroute: Reroute,
    ) -> Result<Reroute> {
        let client = conn.src_endpoint();
        let phase = self.state_map.get(&client).ok_or(DatapathError::MissingState(client))?;
        if phase != TxnPhase::ResponseReceived {
            debug!(%client, "handoff pending but a transaction is in flight");
            return Ok(reroute);
        }

        self.release_slot(&reroute)?;

        let client_nums =
            self.bookkeeper.read(&conn).ok_or(DatapathError::MissingNumbers(conn))?;
        let target_nums = self
            .bookkeeper
            .read(&reroute.new_conn)
            .ok_or(DatapathError::MissingNumbers(reroute.new_conn))?;

        // Client-side offsets: where the client's numbering stands relative
        // to the new upstream connection. Server-side offsets are the same
        // quantities mirrored.
        let c_seq_offset = client_nums.seq_no.wrapping_sub(target_nums.seq_no) as i32;
        let c_ack_offset = client_nums.ack_no.wrapping_sub(target_nums.ack_no) as i32;
        let s_seq_offset = target_nums.ack_no.wrapping_sub(client_nums.ack_no) as i32;
        let s_ack_offset = target_nums.seq_no.wrapping_sub(client_nums.seq_no) as i32;

        let stale_rev = reroute.original_conn.reversed();
        self.conn_map.remove(&stale_rev).ok_or(DatapathError::MissingRoute(stale_rev))?;

        let mut updated = reroute;
        updated.original_conn = reroute.new_conn;
        updated.original_eth = reroute.new_eth;
        updated.original_index = reroute.new_index;
        updated.seq_offset = c_seq_offset;
        updated.ack_offset = c_ack_offset;
        updated.rematch_pending = false;
        self.conn_map.insert(conn, updated)?;

        let mut reverse = updated;
        reverse.original_conn = conn.reversed();
        reverse.original_eth = pkt.eth_conn().reversed();
        reverse.original_index = 0;
        reverse.seq_offset = s_seq_offset;
        reverse.ack_offset = s_ack_offset;
        reverse.new_conn = reverse.original_conn;
        reverse.new_eth = reverse.original_eth;
        reverse.new_index = 0;
        self.conn_map.insert(updated.original_conn.reversed(), reverse)?;

        info!(%client, old = %reroute.original_conn, new = %updated.original_conn, "handoff complete");
        Ok(updated)
    }
}
