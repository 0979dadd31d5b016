use switchback_common::{Connection, Endpoint};
use thiserror::Error;

use crate::tables::TableFull;

/// Failures of a single packet's processing.
///
/// Every variant is local to the current frame: the engine drops the frame
/// (`Action::Aborted`) and leaves the tables in the state they had before
/// the failing step. There is no cross-packet recovery.
#[derive(Debug, Error)]
pub enum DatapathError {
    #[error("no numbers entry for {0}")]
    MissingNumbers(Connection),

    #[error("no route entry for {0}")]
    MissingRoute(Connection),

    #[error("no availability entry for backend {0}")]
    MissingAvailability(Endpoint),

    #[error("no transaction state for client {0}")]
    MissingState(Endpoint),

    #[error("slot index {index} out of range (limit {limit})")]
    SlotOutOfRange { index: u32, limit: usize },

    #[error(transparent)]
    TableFull(#[from] TableFull),
}

pub type Result<T> = std::result::Result<T, DatapathError>;
