pub mod components;
pub mod config;
pub mod engine;
pub mod models;
pub mod storage;

pub use components::robot::{RobotClassifier, UserAgentClassifier};
pub use components::rules::{ListKind, MemoryRuleList, RuleList, RuleLookup, RuleStatus};
pub use config::settings::{FailurePolicy, Settings};
pub use engine::{DecisionEngine, EngineError};
pub use models::context::RequestContext;
pub use models::counter::{CounterRecord, TimeUnit};
pub use models::verdict::{ActionKind, Decision, Outcome, ReasonCode, Verdict};
pub use storage::memory::MemoryStore;
pub use storage::sqlite::SqliteStore;
pub use storage::{RecordKind, Store, StoreError};
