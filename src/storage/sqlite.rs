use std::sync::Mutex;

use parking_lot::RwLock;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{RecordKind, Store, StoreError};
use crate::models::counter::CounterRecord;
use crate::models::verdict::{ActionKind, ReasonCode, Verdict};

const DEFAULT_CHANNEL: &str = "palisade";

/// SQLite-backed store. Counter and verdict tables are prefixed with the
/// active channel, so several engines can share one database file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    channel: RwLock<String>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self {
            conn: Mutex::new(conn),
            channel: RwLock::new(DEFAULT_CHANNEL.to_string()),
        })
    }

    /// In-memory database, handy for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
            channel: RwLock::new(DEFAULT_CHANNEL.to_string()),
        })
    }

    fn table(&self, kind: RecordKind) -> String {
        format!("{}_{}", self.channel.read(), kind.table_suffix())
    }
}

impl Store for SqliteStore {
    fn set_channel(&self, name: &str) -> Result<(), StoreError> {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(StoreError::Backend(format!(
                "invalid channel name: {:?}",
                name
            )));
        }
        *self.channel.write() = name.to_string();
        Ok(())
    }

    fn init(&self, create_schema: bool) -> Result<(), StoreError> {
        if !create_schema {
            return Ok(());
        }

        let logs = self.table(RecordKind::Log);
        let rules = self.table(RecordKind::Rule);
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        conn.execute_batch(&format!(
            "
            CREATE TABLE IF NOT EXISTS {logs} (
                log_ip              TEXT PRIMARY KEY,
                session             TEXT NOT NULL DEFAULT '',
                hostname            TEXT NOT NULL DEFAULT '',
                last_time           INTEGER NOT NULL DEFAULT 0,
                pageviews_s         INTEGER NOT NULL DEFAULT 0,
                pageviews_m         INTEGER NOT NULL DEFAULT 0,
                pageviews_h         INTEGER NOT NULL DEFAULT 0,
                pageviews_d         INTEGER NOT NULL DEFAULT 0,
                first_time_s        INTEGER NOT NULL DEFAULT 0,
                first_time_m        INTEGER NOT NULL DEFAULT 0,
                first_time_h        INTEGER NOT NULL DEFAULT 0,
                first_time_d        INTEGER NOT NULL DEFAULT 0,
                first_time_flag     INTEGER NOT NULL DEFAULT 0,
                flag_multi_session  INTEGER NOT NULL DEFAULT 0,
                flag_empty_referer  INTEGER NOT NULL DEFAULT 0,
                flag_js_cookie      INTEGER NOT NULL DEFAULT 0,
                pageviews_cookie    INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS {rules} (
                log_ip      TEXT PRIMARY KEY,
                ip_resolve  TEXT NOT NULL DEFAULT '',
                time        INTEGER NOT NULL,
                type        INTEGER NOT NULL,
                reason      INTEGER NOT NULL
            );
            "
        ))?;
        debug!(logs = %logs, rules = %rules, "Storage schema ensured");
        Ok(())
    }

    fn get_counter(&self, ip: &str) -> Result<Option<CounterRecord>, StoreError> {
        let table = self.table(RecordKind::Log);
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT log_ip, session, hostname, last_time,
                    pageviews_s, pageviews_m, pageviews_h, pageviews_d,
                    first_time_s, first_time_m, first_time_h, first_time_d,
                    first_time_flag, flag_multi_session, flag_empty_referer,
                    flag_js_cookie, pageviews_cookie
             FROM {table} WHERE log_ip = ?1"
        ))?;
        let record = stmt
            .query_row(params![ip], |row| {
                Ok(CounterRecord {
                    ip: row.get(0)?,
                    session: row.get(1)?,
                    hostname: row.get(2)?,
                    last_time: row.get(3)?,
                    pageviews_s: row.get(4)?,
                    pageviews_m: row.get(5)?,
                    pageviews_h: row.get(6)?,
                    pageviews_d: row.get(7)?,
                    first_time_s: row.get(8)?,
                    first_time_m: row.get(9)?,
                    first_time_h: row.get(10)?,
                    first_time_d: row.get(11)?,
                    first_time_flag: row.get(12)?,
                    flag_multi_session: row.get(13)?,
                    flag_empty_referer: row.get(14)?,
                    flag_js_cookie: row.get(15)?,
                    pageviews_cookie: row.get(16)?,
                })
            })
            .optional()?;
        Ok(record)
    }

    fn save_counter(&self, record: &CounterRecord) -> Result<(), StoreError> {
        let table = self.table(RecordKind::Log);
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {table}
                 (log_ip, session, hostname, last_time,
                  pageviews_s, pageviews_m, pageviews_h, pageviews_d,
                  first_time_s, first_time_m, first_time_h, first_time_d,
                  first_time_flag, flag_multi_session, flag_empty_referer,
                  flag_js_cookie, pageviews_cookie)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                         ?13, ?14, ?15, ?16, ?17)"
            ),
            params![
                record.ip,
                record.session,
                record.hostname,
                record.last_time,
                record.pageviews_s,
                record.pageviews_m,
                record.pageviews_h,
                record.pageviews_d,
                record.first_time_s,
                record.first_time_m,
                record.first_time_h,
                record.first_time_d,
                record.first_time_flag,
                record.flag_multi_session,
                record.flag_empty_referer,
                record.flag_js_cookie,
                record.pageviews_cookie,
            ],
        )?;
        Ok(())
    }

    fn delete_counter(&self, ip: &str) -> Result<(), StoreError> {
        let table = self.table(RecordKind::Log);
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        conn.execute(&format!("DELETE FROM {table} WHERE log_ip = ?1"), params![ip])?;
        Ok(())
    }

    fn get_verdict(&self, ip: &str) -> Result<Option<Verdict>, StoreError> {
        let table = self.table(RecordKind::Rule);
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT log_ip, ip_resolve, time, type, reason FROM {table} WHERE log_ip = ?1"
        ))?;
        let row = stmt
            .query_row(params![ip], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })
            .optional()?;

        match row {
            None => Ok(None),
            Some((log_ip, ip_resolve, time, type_code, reason_code)) => {
                let kind = ActionKind::from_code(type_code).ok_or_else(|| StoreError::Corrupt {
                    ip: log_ip.clone(),
                    detail: format!("unknown action code {}", type_code),
                })?;
                let reason =
                    ReasonCode::from_code(reason_code).ok_or_else(|| StoreError::Corrupt {
                        ip: log_ip.clone(),
                        detail: format!("unknown reason code {}", reason_code),
                    })?;
                Ok(Some(Verdict {
                    ip: log_ip,
                    hostname: ip_resolve,
                    time,
                    kind,
                    reason,
                }))
            }
        }
    }

    fn save_verdict(&self, verdict: &Verdict) -> Result<(), StoreError> {
        let table = self.table(RecordKind::Rule);
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {table} (log_ip, ip_resolve, time, type, reason)
                 VALUES (?1, ?2, ?3, ?4, ?5)"
            ),
            params![
                verdict.ip,
                verdict.hostname,
                verdict.time,
                verdict.kind.as_code(),
                verdict.reason.as_code(),
            ],
        )?;
        Ok(())
    }

    fn delete_verdict(&self, ip: &str) -> Result<(), StoreError> {
        let table = self.table(RecordKind::Rule);
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        conn.execute(&format!("DELETE FROM {table} WHERE log_ip = ?1"), params![ip])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init(true).unwrap();
        store
    }

    #[test]
    fn test_counter_round_trip() {
        let store = store();
        assert!(store.get_counter("10.0.0.1").unwrap().is_none());

        let mut rec = CounterRecord::fresh("10.0.0.1", "sess-1", "host.example", 1000);
        rec.increment_pageviews();
        rec.flag_empty_referer = 3;
        store.save_counter(&rec).unwrap();

        let loaded = store.get_counter("10.0.0.1").unwrap().unwrap();
        assert_eq!(loaded, rec);

        store.delete_counter("10.0.0.1").unwrap();
        assert!(store.get_counter("10.0.0.1").unwrap().is_none());
    }

    #[test]
    fn test_verdict_round_trip() {
        let store = store();
        let verdict = Verdict {
            ip: "10.0.0.2".to_string(),
            hostname: "crawler.example".to_string(),
            time: 2000,
            kind: ActionKind::Deny,
            reason: ReasonCode::LimitSecond,
        };
        store.save_verdict(&verdict).unwrap();
        assert_eq!(store.get_verdict("10.0.0.2").unwrap(), Some(verdict));

        store.delete_verdict("10.0.0.2").unwrap();
        assert!(store.get_verdict("10.0.0.2").unwrap().is_none());
    }

    #[test]
    fn test_save_is_upsert() {
        let store = store();
        let mut rec = CounterRecord::fresh("10.0.0.3", "s", "h", 1000);
        store.save_counter(&rec).unwrap();
        rec.increment_pageviews();
        store.save_counter(&rec).unwrap();
        assert_eq!(store.get_counter("10.0.0.3").unwrap().unwrap().pageviews_s, 1);
    }

    #[test]
    fn test_init_without_create_is_cheap_noop() {
        let store = SqliteStore::open_in_memory().unwrap();
        // No schema yet, but init(false) must not fail.
        store.init(false).unwrap();
    }

    #[test]
    fn test_channels_are_isolated() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();

        let a = SqliteStore::open(path).unwrap();
        a.set_channel("site_a").unwrap();
        a.init(true).unwrap();
        let b = SqliteStore::open(path).unwrap();
        b.set_channel("site_b").unwrap();
        b.init(true).unwrap();

        let rec = CounterRecord::fresh("10.0.0.4", "s", "h", 1000);
        a.save_counter(&rec).unwrap();
        assert!(a.get_counter("10.0.0.4").unwrap().is_some());
        assert!(b.get_counter("10.0.0.4").unwrap().is_none());
    }

    #[test]
    fn test_channel_name_is_validated() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.set_channel("ok_name1").is_ok());
        assert!(store.set_channel("").is_err());
        assert!(store.set_channel("bad;drop").is_err());
    }
}
