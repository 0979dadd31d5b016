//! Sequence bookkeeping: the one owner of `numbers_map`.
//!
//! Each entry tracks the `(seq, ack)` a direction is expected to carry next,
//! plus the initial values captured at connection birth. The bookkeeper
//! never touches any other table.

use switchback_common::{Connection, EthConn, Numbers};
use tracing::debug;

use crate::error::{DatapathError, Result};
use crate::tables::{numbers_table, NumbersTable, TableFull};

pub struct SeqBookkeeper {
    numbers: NumbersTable,
}

impl SeqBookkeeper {
    pub fn new() -> Self {
        Self { numbers: numbers_table() }
    }

    /// Connection-birth observation on the client side: the first ACK seen
    /// from a client with no route yet. The observed values become the
    /// entry's initial values.
    pub fn seed_from_client_ack(
        &self,
        conn: Connection,
        seq: u32,
        ack: u32,
        eth: EthConn,
    ) -> std::result::Result<(), TableFull> {
        debug!(%conn, seq, ack, "seeding client numbers");
        self.numbers.insert(conn, Numbers::seeded(seq, ack, eth))
    }

    /// Seed the *reverse* direction of an observed SYN+ACK using handshake
    /// arithmetic: the replying side will next send `ack` and expect
    /// `seq + 1`.
    pub fn seed_from_syn_ack_reverse(
        &self,
        packet_conn: Connection,
        seq: u32,
        ack: u32,
        eth: EthConn,
    ) -> std::result::Result<(), TableFull> {
        let rev = packet_conn.reversed();
        debug!(conn = %rev, seq = ack, ack = seq.wrapping_add(1), "seeding numbers from SYN+ACK");
        self.numbers.insert(rev, Numbers::seeded(ack, seq.wrapping_add(1), eth.reversed()))
    }

    /// A PSH from a backend advances both sides of the virtual connection in
    /// lockstep: the server-facing reverse direction in backend numbering,
    /// and the client-facing reverse direction shifted by the route's
    /// offsets into client numbering.
    #[allow(clippy::too_many_arguments)]
    pub fn advance_on_server_psh(
        &self,
        server_rev: Connection,
        client_rev: Connection,
        seq: u32,
        ack_seq: u32,
        payload_len: u32,
        seq_offset: i32,
        ack_offset: i32,
    ) -> Result<()> {
        let mut nums =
            self.numbers.get(&server_rev).ok_or(DatapathError::MissingNumbers(server_rev))?;
        nums.seq_no = ack_seq;
        nums.ack_no = seq.wrapping_add(payload_len);
        self.numbers.insert(server_rev, nums)?;

        let mut client_nums =
            self.numbers.get(&client_rev).ok_or(DatapathError::MissingNumbers(client_rev))?;
        client_nums.seq_no = ack_seq.wrapping_sub(ack_offset as u32);
        client_nums.ack_no = seq.wrapping_sub(seq_offset as u32).wrapping_add(payload_len);
        self.numbers.insert(client_rev, client_nums)?;
        Ok(())
    }

    pub fn read(&self, conn: &Connection) -> Option<Numbers> {
        self.numbers.get(conn)
    }

    pub fn delete(&self, conn: &Connection) -> Option<Numbers> {
        self.numbers.remove(conn)
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }
}

impl Default for SeqBookkeeper {
    fn default() -> Self {
        Self::new()
    }
}
