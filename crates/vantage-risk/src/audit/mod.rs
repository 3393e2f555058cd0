//! Decision ledger: cached snapshot, the event bus that drives it, and CSV export.

pub mod bus;
pub mod channel;
pub mod entry;

pub use bus::{EventBus, Subscription, UnderwritingEvent};
pub use channel::{
    AuditSyncChannel, ChannelError, LedgerRequest, LedgerUnavailable, LedgerView, SyncStatus,
};
pub use entry::{
    normalize_entries, write_csv, LedgerEntry, LedgerSummary, UnknownVerdictFilter, VerdictFilter,
};
