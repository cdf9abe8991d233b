//! In-memory coordination state: who is online, which rooms exist, and the
//! message ledger. Plain synchronous structures with no interior locking —
//! the owner wraps each registry in a single coarse lock (see
//! `parley-gateway`), so operations appear atomic relative to each other.

pub mod ledger;
pub mod presence;
pub mod rooms;

pub use ledger::{LedgerError, MessageDraft, MessageLedger};
pub use presence::PresenceRegistry;
pub use rooms::{RoomDirectory, RoomError};
