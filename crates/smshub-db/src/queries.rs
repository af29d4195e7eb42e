use crate::Database;
use crate::models::{OperatorRow, SmsRow, TokenRow};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

/// Sort direction for the message listing. `received_at` is the only sort
/// key the store supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    fn as_sql(self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

/// Conjunction of optional predicates over sms_records. Every field that
/// is `Some` contributes one AND clause; the same filter drives both the
/// total count and the page fetch so the two never disagree.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    /// Exact device tag.
    pub device: Option<String>,
    /// Substring of the sender identifier.
    pub phone: Option<String>,
    /// Substring of the message body.
    pub content: Option<String>,
    /// Inclusive lower bound, `YYYY-MM-DD HH:MM:SS`.
    pub received_from: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD HH:MM:SS`.
    pub received_to: Option<String>,
}

impl MessageFilter {
    fn where_sql(&self) -> (String, Vec<String>) {
        let mut clauses = Vec::new();
        let mut args = Vec::new();

        if let Some(device) = &self.device {
            clauses.push("device = ?");
            args.push(device.clone());
        }
        if let Some(phone) = &self.phone {
            clauses.push("phone LIKE ?");
            args.push(format!("%{}%", phone));
        }
        if let Some(content) = &self.content {
            clauses.push("content LIKE ?");
            args.push(format!("%{}%", content));
        }
        if let Some(from) = &self.received_from {
            clauses.push("received_at >= ?");
            args.push(from.clone());
        }
        if let Some(to) = &self.received_to {
            clauses.push("received_at <= ?");
            args.push(to.clone());
        }

        let sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        (sql, args)
    }
}

impl Database {
    // -- Operators --

    pub fn create_operator(&self, id: &str, username: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO operators (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_operator_by_username(&self, username: &str) -> Result<Option<OperatorRow>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(
                    "SELECT id, username, password, created_at FROM operators WHERE username = ?1",
                )?
                .query_row([username], |row| {
                    Ok(OperatorRow {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        password: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    pub fn count_operators(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let n = conn.query_row("SELECT COUNT(*) FROM operators", [], |row| row.get(0))?;
            Ok(n)
        })
    }

    // -- Access tokens --

    /// Exact-match lookup of an enabled credential. Disabled rows never
    /// match, even when the secret string is identical.
    pub fn find_enabled_token(&self, candidate: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let id = conn
                .query_row(
                    "SELECT id FROM access_tokens WHERE token = ?1 AND is_enabled = 1 LIMIT 1",
                    [candidate],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(id)
        })
    }

    /// Audit-only last-use stamp; callers treat failures as non-fatal.
    pub fn touch_token(&self, token_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE access_tokens SET last_used_at = datetime('now') WHERE id = ?1",
                [token_id],
            )?;
            Ok(())
        })
    }

    pub fn create_token(&self, name: &str, token: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO access_tokens (name, token, is_enabled) VALUES (?1, ?2, 1)",
                (name, token),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn list_tokens(&self) -> Result<Vec<TokenRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, token, is_enabled, created_at, last_used_at
                 FROM access_tokens
                 ORDER BY id DESC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(TokenRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        token: row.get(2)?,
                        enabled: row.get::<_, i64>(3)? != 0,
                        created_at: row.get(4)?,
                        last_used_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Flip the enabled flag. Returns false when no such token exists.
    pub fn toggle_token(&self, token_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE access_tokens SET is_enabled = 1 - is_enabled WHERE id = ?1",
                [token_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Replace the secret and reset created_at; the old secret stops
    /// validating immediately.
    pub fn reset_token(&self, token_id: i64, token: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE access_tokens SET token = ?1, created_at = datetime('now') WHERE id = ?2",
                params![token, token_id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_token(&self, token_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM access_tokens WHERE id = ?1", [token_id])?;
            Ok(changed > 0)
        })
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        phone: &str,
        content: &str,
        received_at: &str,
        device: &str,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sms_records (phone, content, received_at, device) VALUES (?1, ?2, ?3, ?4)",
                params![phone, content, received_at, device],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn count_messages(&self, filter: &MessageFilter) -> Result<i64> {
        let (where_sql, args) = filter.where_sql();
        self.with_conn(|conn| {
            let sql = format!("SELECT COUNT(*) FROM sms_records {}", where_sql);
            let n = conn.query_row(&sql, params_from_iter(args.iter()), |row| row.get(0))?;
            Ok(n)
        })
    }

    pub fn list_messages(
        &self,
        filter: &MessageFilter,
        dir: SortDir,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SmsRow>> {
        let (where_sql, args) = filter.where_sql();
        self.with_conn(|conn| {
            // limit/offset are clamped integers computed by the caller, so
            // they go into the statement text like the positional LIKE
            // patterns cannot.
            let sql = format!(
                "SELECT id, phone, content, received_at, device
                 FROM sms_records
                 {}
                 ORDER BY received_at {}
                 LIMIT {} OFFSET {}",
                where_sql,
                dir.as_sql(),
                limit,
                offset
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(args.iter()), query_sms_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Distinct non-empty device tags, for the listing filter dropdown.
    pub fn distinct_devices(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT device FROM sms_records WHERE device <> '' ORDER BY device ASC",
            )?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Coarse recall for the OTP scan: the most recent `limit` messages
    /// whose content contains the localized keyword or "code" in any
    /// casing. SQLite LIKE is already case-insensitive for ASCII, so one
    /// pattern covers code/Code/CODE. Precision comes later from the
    /// strict whole-word test in smshub-extract.
    pub fn keyword_candidates(&self, limit: u32) -> Result<Vec<SmsRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, phone, content, received_at, device
                 FROM sms_records
                 WHERE content LIKE '%验证码%' OR content LIKE '%code%'
                 ORDER BY received_at DESC
                 LIMIT ?1",
            )?;
            let rows = stmt
                .query_map([limit], query_sms_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Remove every message row. Irreversible.
    pub fn purge_messages(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM sms_records", [])?;
            Ok(removed)
        })
    }
}

fn query_sms_row(row: &rusqlite::Row<'_>) -> std::result::Result<SmsRow, rusqlite::Error> {
    Ok(SmsRow {
        id: row.get(0)?,
        phone: row.get(1)?,
        content: row.get(2)?,
        received_at: row.get(3)?,
        device: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn seed(db: &Database, phone: &str, content: &str, received_at: &str, device: &str) {
        db.insert_message(phone, content, received_at, device).unwrap();
    }

    #[test]
    fn insert_and_count() {
        let db = test_db();
        seed(&db, "10086", "hello", "2024-05-01 10:00:00", "SIM1");
        assert_eq!(db.count_messages(&MessageFilter::default()).unwrap(), 1);
    }

    #[test]
    fn filters_are_conjunctive() {
        let db = test_db();
        seed(&db, "10086", "your code 1234", "2024-05-01 10:00:00", "SIM1");
        seed(&db, "10010", "balance alert", "2024-05-02 10:00:00", "SIM2");
        seed(&db, "10086", "promo offer", "2024-05-03 10:00:00", "SIM1");

        let filter = MessageFilter {
            device: Some("SIM1".into()),
            phone: Some("100".into()),
            content: Some("code".into()),
            ..Default::default()
        };
        assert_eq!(db.count_messages(&filter).unwrap(), 1);

        let rows = db.list_messages(&filter, SortDir::Desc, 50, 0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, "your code 1234");
    }

    #[test]
    fn date_bounds_are_inclusive() {
        let db = test_db();
        seed(&db, "a", "one", "2024-05-01 00:00:00", "");
        seed(&db, "b", "two", "2024-05-02 12:00:00", "");
        seed(&db, "c", "three", "2024-05-03 23:59:59", "");

        let filter = MessageFilter {
            received_from: Some("2024-05-02 00:00:00".into()),
            received_to: Some("2024-05-03 23:59:59".into()),
            ..Default::default()
        };
        assert_eq!(db.count_messages(&filter).unwrap(), 2);
    }

    #[test]
    fn pagination_window_and_direction() {
        let db = test_db();
        for i in 0..101 {
            seed(
                &db,
                "10086",
                &format!("msg {}", i),
                &format!("2024-05-01 10:{:02}:{:02}", i / 60, i % 60),
                "",
            );
        }
        let filter = MessageFilter::default();
        assert_eq!(db.count_messages(&filter).unwrap(), 101);

        // Third page of 50 holds exactly the one remaining row.
        let page3 = db.list_messages(&filter, SortDir::Desc, 50, 100).unwrap();
        assert_eq!(page3.len(), 1);

        let newest_first = db.list_messages(&filter, SortDir::Desc, 50, 0).unwrap();
        let oldest_first = db.list_messages(&filter, SortDir::Asc, 50, 0).unwrap();
        assert_eq!(newest_first[0].content, "msg 100");
        assert_eq!(oldest_first[0].content, "msg 0");
    }

    #[test]
    fn keyword_candidates_ordered_and_capped() {
        let db = test_db();
        seed(&db, "a", "your code 1111", "2024-05-01 10:00:00", "");
        seed(&db, "b", "验证码 2222", "2024-05-03 10:00:00", "");
        seed(&db, "c", "no keyword here", "2024-05-04 10:00:00", "");
        seed(&db, "d", "Encoded blob", "2024-05-05 10:00:00", "");

        let rows = db.keyword_candidates(100).unwrap();
        // Coarse filter admits the "Encoded" false positive on purpose.
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].content, "Encoded blob");
        assert_eq!(rows[1].content, "验证码 2222");

        let capped = db.keyword_candidates(2).unwrap();
        assert_eq!(capped.len(), 2);
    }

    #[test]
    fn purge_removes_everything() {
        let db = test_db();
        seed(&db, "a", "one", "2024-05-01 10:00:00", "");
        seed(&db, "b", "two", "2024-05-02 10:00:00", "");
        assert_eq!(db.purge_messages().unwrap(), 2);
        assert_eq!(db.count_messages(&MessageFilter::default()).unwrap(), 0);
        assert!(db.keyword_candidates(100).unwrap().is_empty());
    }

    #[test]
    fn token_lifecycle() {
        let db = test_db();
        let id = db.create_token("forwarder #1", "secret-abc").unwrap();

        assert_eq!(db.find_enabled_token("secret-abc").unwrap(), Some(id));
        assert_eq!(db.find_enabled_token("wrong").unwrap(), None);

        // Disabled tokens fail validation even on an exact string match.
        assert!(db.toggle_token(id).unwrap());
        assert_eq!(db.find_enabled_token("secret-abc").unwrap(), None);
        assert!(db.toggle_token(id).unwrap());
        assert_eq!(db.find_enabled_token("secret-abc").unwrap(), Some(id));

        // Rotation invalidates the old secret.
        assert!(db.reset_token(id, "secret-def").unwrap());
        assert_eq!(db.find_enabled_token("secret-abc").unwrap(), None);
        assert_eq!(db.find_enabled_token("secret-def").unwrap(), Some(id));

        db.touch_token(id).unwrap();
        let rows = db.list_tokens().unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].last_used_at.is_some());

        assert!(db.delete_token(id).unwrap());
        assert!(!db.delete_token(id).unwrap());
        assert!(db.list_tokens().unwrap().is_empty());
    }

    #[test]
    fn duplicate_token_secret_is_rejected() {
        let db = test_db();
        db.create_token("one", "same-secret").unwrap();
        assert!(db.create_token("two", "same-secret").is_err());
    }

    #[test]
    fn distinct_devices_skips_empty() {
        let db = test_db();
        seed(&db, "a", "x", "2024-05-01 10:00:00", "SIM2");
        seed(&db, "b", "y", "2024-05-02 10:00:00", "SIM1");
        seed(&db, "c", "z", "2024-05-03 10:00:00", "");
        seed(&db, "d", "w", "2024-05-04 10:00:00", "SIM1");
        assert_eq!(db.distinct_devices().unwrap(), vec!["SIM1", "SIM2"]);
    }

    #[test]
    fn operators_roundtrip() {
        let db = test_db();
        assert_eq!(db.count_operators().unwrap(), 0);
        db.create_operator("op-1", "admin", "argon2-hash").unwrap();
        assert_eq!(db.count_operators().unwrap(), 1);

        let row = db.get_operator_by_username("admin").unwrap().unwrap();
        assert_eq!(row.id, "op-1");
        assert_eq!(row.password, "argon2-hash");
        assert!(db.get_operator_by_username("nobody").unwrap().is_none());
    }
}
