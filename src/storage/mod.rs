pub mod memory;
pub mod sqlite;

use thiserror::Error;

use crate::models::counter::CounterRecord;
use crate::models::verdict::Verdict;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("persisted record for {ip} is corrupt: {detail}")]
    Corrupt { ip: String, detail: String },
}

// ---------------------------------------------------------------------------
// Record kinds
// ---------------------------------------------------------------------------

/// The two persisted partitions: rolling counters and verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Log,
    Rule,
}

impl RecordKind {
    /// Table-name suffix under the active channel.
    pub fn table_suffix(&self) -> &'static str {
        match self {
            RecordKind::Log => "logs",
            RecordKind::Rule => "rules",
        }
    }
}

// ---------------------------------------------------------------------------
// Store – the narrow CRUD contract the engine depends on
// ---------------------------------------------------------------------------

/// Record persistence keyed by identity, partitioned into counter records
/// (kind `log`) and verdicts (kind `rule`).
///
/// `get_*` returning `Ok(None)` means "never seen" / "no verdict". Saves
/// have upsert semantics. `init` must be idempotent and cheap when
/// `create_schema` is false, because the engine calls it on every request.
pub trait Store: Send + Sync {
    /// Select the logical namespace (table prefix). Applied before `init`.
    fn set_channel(&self, name: &str) -> Result<(), StoreError>;

    fn init(&self, create_schema: bool) -> Result<(), StoreError>;

    fn get_counter(&self, ip: &str) -> Result<Option<CounterRecord>, StoreError>;
    fn save_counter(&self, record: &CounterRecord) -> Result<(), StoreError>;
    fn delete_counter(&self, ip: &str) -> Result<(), StoreError>;

    fn get_verdict(&self, ip: &str) -> Result<Option<Verdict>, StoreError>;
    fn save_verdict(&self, verdict: &Verdict) -> Result<(), StoreError>;
    fn delete_verdict(&self, ip: &str) -> Result<(), StoreError>;
}
