use dashmap::DashMap;
use parking_lot::RwLock;

use super::{Store, StoreError};
use crate::models::counter::CounterRecord;
use crate::models::verdict::Verdict;

/// In-memory store on concurrent maps. Keys are namespaced by the active
/// channel so one instance can serve several logical sites, mirroring the
/// channel-prefixed tables of the SQLite backend.
pub struct MemoryStore {
    counters: DashMap<String, CounterRecord>,
    verdicts: DashMap<String, Verdict>,
    channel: RwLock<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
            verdicts: DashMap::new(),
            channel: RwLock::new("palisade".to_string()),
        }
    }

    fn key(&self, ip: &str) -> String {
        format!("{}:{}", self.channel.read(), ip)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn set_channel(&self, name: &str) -> Result<(), StoreError> {
        if name.is_empty() {
            return Err(StoreError::Backend("empty channel name".to_string()));
        }
        *self.channel.write() = name.to_string();
        Ok(())
    }

    fn init(&self, _create_schema: bool) -> Result<(), StoreError> {
        Ok(())
    }

    fn get_counter(&self, ip: &str) -> Result<Option<CounterRecord>, StoreError> {
        Ok(self.counters.get(&self.key(ip)).map(|r| r.clone()))
    }

    fn save_counter(&self, record: &CounterRecord) -> Result<(), StoreError> {
        self.counters.insert(self.key(&record.ip), record.clone());
        Ok(())
    }

    fn delete_counter(&self, ip: &str) -> Result<(), StoreError> {
        self.counters.remove(&self.key(ip));
        Ok(())
    }

    fn get_verdict(&self, ip: &str) -> Result<Option<Verdict>, StoreError> {
        Ok(self.verdicts.get(&self.key(ip)).map(|r| r.clone()))
    }

    fn save_verdict(&self, verdict: &Verdict) -> Result<(), StoreError> {
        self.verdicts.insert(self.key(&verdict.ip), verdict.clone());
        Ok(())
    }

    fn delete_verdict(&self, ip: &str) -> Result<(), StoreError> {
        self.verdicts.remove(&self.key(ip));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::verdict::{ActionKind, ReasonCode};

    #[test]
    fn test_counter_round_trip() {
        let store = MemoryStore::new();
        assert!(store.get_counter("10.0.0.1").unwrap().is_none());

        let rec = CounterRecord::fresh("10.0.0.1", "s", "h", 100);
        store.save_counter(&rec).unwrap();
        assert_eq!(store.get_counter("10.0.0.1").unwrap(), Some(rec));

        store.delete_counter("10.0.0.1").unwrap();
        assert!(store.get_counter("10.0.0.1").unwrap().is_none());
    }

    #[test]
    fn test_channel_namespacing() {
        let store = MemoryStore::new();
        let verdict = Verdict {
            ip: "10.0.0.2".to_string(),
            hostname: String::new(),
            time: 100,
            kind: ActionKind::Deny,
            reason: ReasonCode::ManualBan,
        };
        store.save_verdict(&verdict).unwrap();
        store.set_channel("other").unwrap();
        assert!(store.get_verdict("10.0.0.2").unwrap().is_none());
        store.set_channel("palisade").unwrap();
        assert!(store.get_verdict("10.0.0.2").unwrap().is_some());
    }
}
