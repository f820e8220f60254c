//! Persistent record set for keywords, whitelist domains, prompt replies and
//! small config scalars, backed by SQLite.
//!
//! Keywords and whitelist reads go through a bounded-TTL cache: the first
//! caller after expiry repopulates synchronously and swaps in a complete
//! immutable snapshot (never in-place mutation), so concurrent readers either
//! see the old set or the new one, never a partial one. Repopulation runs its
//! query outside the cache lock; a per-slot generation counter detects writes
//! that race the query, so a stale snapshot is never installed as fresh.
//! Prompt replies are deliberately uncached; admin edits must be visible
//! immediately.

use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use chrono::{Months, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::Result;

const MIGRATION_DONE_KEY: &str = "keywords_migration_done";
const LEGACY_KEYWORDS_TABLE: &str = "filter_keywords";

type Snapshot = (Arc<Vec<String>>, Instant);

#[derive(Default)]
struct CacheSlot {
    snapshot: Option<Snapshot>,
    /// Bumped on every invalidation so a repopulating reader can tell whether
    /// a write landed while its query ran outside the cache lock.
    generation: u64,
}

#[derive(Default)]
struct Caches {
    keywords: CacheSlot,
    whitelist: CacheSlot,
}

impl Caches {
    fn slot_mut(&mut self, slot: Slot) -> &mut CacheSlot {
        match slot {
            Slot::Keywords => &mut self.keywords,
            Slot::Whitelist => &mut self.whitelist,
        }
    }
}

#[derive(Clone, Copy)]
enum Slot {
    Keywords,
    Whitelist,
}

pub struct KeywordStore {
    conn: Mutex<Connection>,
    caches: Mutex<Caches>,
    cache_ttl: Duration,
}

impl KeywordStore {
    pub fn open(path: &Path, cache_ttl: Duration) -> Result<Self> {
        Self::bootstrap(Connection::open(path)?, cache_ttl)
    }

    pub fn open_in_memory(cache_ttl: Duration) -> Result<Self> {
        Self::bootstrap(Connection::open_in_memory()?, cache_ttl)
    }

    fn bootstrap(conn: Connection, cache_ttl: Duration) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
            caches: Mutex::new(Caches::default()),
            cache_ttl,
        };
        store.create_tables()?;
        store.migrate_legacy_keywords()?;
        Ok(store)
    }

    fn create_tables(&self) -> Result<()> {
        let conn = lock(&self.conn);
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS keywords (
                 id INTEGER PRIMARY KEY,
                 keyword TEXT UNIQUE,
                 is_link BOOLEAN DEFAULT FALSE,
                 is_auto_added BOOLEAN DEFAULT FALSE,
                 added_at INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_keyword ON keywords(keyword);
             CREATE INDEX IF NOT EXISTS idx_added_at ON keywords(added_at);
             CREATE TABLE IF NOT EXISTS whitelist (
                 id INTEGER PRIMARY KEY,
                 domain TEXT UNIQUE
             );
             CREATE INDEX IF NOT EXISTS idx_domain ON whitelist(domain);
             CREATE TABLE IF NOT EXISTS prompt_replies (
                 prompt TEXT PRIMARY KEY,
                 reply TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS config (
                 key TEXT PRIMARY KEY,
                 value TEXT
             );",
        )?;
        Ok(())
    }

    /// One-time migration from the legacy keyword table name. Guarded by a
    /// persisted flag so it runs at most once even across restarts.
    fn migrate_legacy_keywords(&self) -> Result<()> {
        if self.get_config(MIGRATION_DONE_KEY)?.is_some() {
            return Ok(());
        }

        let mut conn = lock(&self.conn);
        let legacy_exists: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![LEGACY_KEYWORDS_TABLE],
                |row| row.get(0),
            )
            .optional()?;

        let tx = conn.transaction()?;
        if legacy_exists.is_some() {
            tx.execute(
                &format!(
                    "INSERT OR IGNORE INTO keywords (keyword, is_link, is_auto_added, added_at)
                     SELECT keyword, is_link, is_auto_added, added_at FROM {LEGACY_KEYWORDS_TABLE}"
                ),
                [],
            )?;
            tx.execute(&format!("DROP TABLE {LEGACY_KEYWORDS_TABLE}"), [])?;
            println!("[store] migrated legacy keyword table");
        }
        tx.execute(
            "INSERT OR REPLACE INTO config (key, value) VALUES (?1, '1')",
            params![MIGRATION_DONE_KEY],
        )?;
        tx.commit()?;
        Ok(())
    }

    // ============== Keywords ==============

    /// Insert-if-absent; duplicates are not an error.
    pub fn add_keyword(&self, keyword: &str, is_link: bool, is_auto_added: bool) -> Result<()> {
        {
            let conn = lock(&self.conn);
            conn.execute(
                "INSERT OR IGNORE INTO keywords (keyword, is_link, is_auto_added, added_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![keyword, is_link, is_auto_added, Utc::now().timestamp()],
            )?;
        }
        self.invalidate(Slot::Keywords);
        Ok(())
    }

    /// Exact-match delete; reports whether a row was actually removed.
    pub fn remove_keyword(&self, keyword: &str) -> Result<bool> {
        let removed = {
            let conn = lock(&self.conn);
            conn.execute("DELETE FROM keywords WHERE keyword = ?1", params![keyword])?
        };
        self.invalidate(Slot::Keywords);
        Ok(removed > 0)
    }

    /// Delete every keyword containing `substring` literally (no wildcard or
    /// regex semantics) and return the pre-delete matching set.
    pub fn remove_keywords_containing(&self, substring: &str) -> Result<Vec<String>> {
        let removed = {
            let conn = lock(&self.conn);
            let matching = select_strings(
                &conn,
                "SELECT keyword FROM keywords WHERE instr(keyword, ?1) > 0",
                params![substring],
            )?;
            conn.execute(
                "DELETE FROM keywords WHERE instr(keyword, ?1) > 0",
                params![substring],
            )?;
            matching
        };
        self.invalidate(Slot::Keywords);
        Ok(removed)
    }

    /// All keywords, via the TTL cache.
    pub fn list_keywords(&self) -> Result<Arc<Vec<String>>> {
        self.cached_list(Slot::Keywords)
    }

    pub fn list_manual_keywords(&self) -> Result<Vec<String>> {
        let conn = lock(&self.conn);
        select_strings(
            &conn,
            "SELECT keyword FROM keywords WHERE is_auto_added = 0",
            [],
        )
    }

    pub fn list_auto_added_links(&self) -> Result<Vec<String>> {
        let conn = lock(&self.conn);
        select_strings(
            &conn,
            "SELECT keyword FROM keywords WHERE is_link = 1 AND is_auto_added = 1",
            [],
        )
    }

    pub fn keyword_exists(&self, keyword: &str) -> Result<bool> {
        let conn = lock(&self.conn);
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM keywords WHERE keyword = ?1",
            params![keyword],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Literal substring search, used to suggest near-matches on failed delete.
    pub fn search_keywords(&self, pattern: &str) -> Result<Vec<String>> {
        let conn = lock(&self.conn);
        select_strings(
            &conn,
            "SELECT keyword FROM keywords WHERE instr(keyword, ?1) > 0",
            params![pattern],
        )
    }

    /// Delete auto-added link keywords older than the two-month retention
    /// window. Manually added keywords are never touched.
    pub fn cleanup_expired_links(&self) -> Result<usize> {
        let cutoff = Utc::now()
            .checked_sub_months(Months::new(2))
            .unwrap_or_else(Utc::now)
            .timestamp();
        let removed = {
            let conn = lock(&self.conn);
            conn.execute(
                "DELETE FROM keywords
                 WHERE is_link = 1 AND is_auto_added = 1 AND added_at < ?1",
                params![cutoff],
            )?
        };
        self.invalidate(Slot::Keywords);
        Ok(removed)
    }

    // ============== Whitelist ==============

    pub fn add_whitelist(&self, domain: &str) -> Result<()> {
        {
            let conn = lock(&self.conn);
            conn.execute(
                "INSERT OR IGNORE INTO whitelist (domain) VALUES (?1)",
                params![domain.to_lowercase()],
            )?;
        }
        self.invalidate(Slot::Whitelist);
        Ok(())
    }

    pub fn remove_whitelist(&self, domain: &str) -> Result<bool> {
        let removed = {
            let conn = lock(&self.conn);
            conn.execute(
                "DELETE FROM whitelist WHERE domain = ?1",
                params![domain.to_lowercase()],
            )?
        };
        self.invalidate(Slot::Whitelist);
        Ok(removed > 0)
    }

    pub fn list_whitelist(&self) -> Result<Arc<Vec<String>>> {
        self.cached_list(Slot::Whitelist)
    }

    pub fn whitelist_exists(&self, domain: &str) -> Result<bool> {
        let conn = lock(&self.conn);
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM whitelist WHERE domain = ?1",
            params![domain.to_lowercase()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // ============== Prompt replies (uncached) ==============

    /// Last-write-wins on duplicate prompt; the trigger is stored lower-cased.
    pub fn set_prompt_reply(&self, prompt: &str, reply: &str) -> Result<()> {
        let conn = lock(&self.conn);
        conn.execute(
            "INSERT OR REPLACE INTO prompt_replies (prompt, reply) VALUES (?1, ?2)",
            params![prompt.to_lowercase(), reply],
        )?;
        Ok(())
    }

    pub fn delete_prompt_reply(&self, prompt: &str) -> Result<bool> {
        let conn = lock(&self.conn);
        let removed = conn.execute(
            "DELETE FROM prompt_replies WHERE prompt = ?1",
            params![prompt.to_lowercase()],
        )?;
        Ok(removed > 0)
    }

    pub fn list_prompt_replies(&self) -> Result<Vec<(String, String)>> {
        let conn = lock(&self.conn);
        let mut stmt = conn.prepare("SELECT prompt, reply FROM prompt_replies")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ============== Config scalars ==============

    pub fn set_config(&self, key: &str, value: &str) -> Result<()> {
        let conn = lock(&self.conn);
        conn.execute(
            "INSERT OR REPLACE INTO config (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Missing key is `None`, not an error.
    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        let conn = lock(&self.conn);
        let value = conn
            .query_row(
                "SELECT value FROM config WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn delete_config(&self, key: &str) -> Result<()> {
        let conn = lock(&self.conn);
        conn.execute("DELETE FROM config WHERE key = ?1", params![key])?;
        Ok(())
    }

    // ============== Cache plumbing ==============

    fn cached_list(&self, slot: Slot) -> Result<Arc<Vec<String>>> {
        let generation = {
            let mut caches = lock(&self.caches);
            let entry = caches.slot_mut(slot);
            if let Some((snap, filled_at)) = &entry.snapshot {
                if filled_at.elapsed() < self.cache_ttl {
                    return Ok(snap.clone());
                }
            }
            entry.generation
        };

        // Repopulate without holding the cache lock across the query; the swap
        // below is a single assignment of a fresh snapshot.
        let rows = {
            let conn = lock(&self.conn);
            match slot {
                Slot::Keywords => select_strings(&conn, "SELECT keyword FROM keywords", [])?,
                Slot::Whitelist => select_strings(&conn, "SELECT domain FROM whitelist", [])?,
            }
        };
        let snap = Arc::new(rows);

        let mut caches = lock(&self.caches);
        let entry = caches.slot_mut(slot);
        if entry.generation == generation {
            entry.snapshot = Some((snap.clone(), Instant::now()));
        }
        // Otherwise a write invalidated the slot mid-query: serve the rows we
        // have but leave the slot empty so the next reader sees the write.
        Ok(snap)
    }

    fn invalidate(&self, slot: Slot) {
        let mut caches = lock(&self.caches);
        let entry = caches.slot_mut(slot);
        entry.snapshot = None;
        entry.generation = entry.generation.wrapping_add(1);
    }

    #[cfg(test)]
    pub(crate) fn backdate_keyword(&self, keyword: &str, added_at: i64) -> Result<()> {
        let conn = lock(&self.conn);
        conn.execute(
            "UPDATE keywords SET added_at = ?1 WHERE keyword = ?2",
            params![added_at, keyword],
        )?;
        Ok(())
    }
}

fn select_strings<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(rows)
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> KeywordStore {
        KeywordStore::open_in_memory(Duration::from_secs(300)).unwrap()
    }

    #[test]
    fn add_keyword_is_idempotent() {
        let s = store();
        s.add_keyword("spam", false, false).unwrap();
        s.add_keyword("spam", false, false).unwrap();

        assert!(s.keyword_exists("spam").unwrap());
        assert_eq!(s.list_keywords().unwrap().len(), 1);
    }

    #[test]
    fn remove_keyword_reports_whether_a_row_was_hit() {
        let s = store();
        s.add_keyword("spam", false, false).unwrap();

        assert!(s.remove_keyword("spam").unwrap());
        assert!(!s.remove_keyword("spam").unwrap());
    }

    #[test]
    fn writes_are_visible_through_the_cache_immediately() {
        let s = store();
        assert!(s.list_keywords().unwrap().is_empty());

        s.add_keyword("spam", false, false).unwrap();
        assert_eq!(s.list_keywords().unwrap().as_slice(), ["spam"]);

        s.remove_keyword("spam").unwrap();
        assert!(s.list_keywords().unwrap().is_empty());
    }

    #[test]
    fn remove_containing_returns_predelete_set_and_is_literal() {
        let s = store();
        s.add_keyword("buy-now.test/a", true, true).unwrap();
        s.add_keyword("buy-now.test/b", true, true).unwrap();
        s.add_keyword("unrelated", false, false).unwrap();
        // '%' must be treated as a literal character, not a wildcard.
        s.add_keyword("100%bonus", false, false).unwrap();

        let mut removed = s.remove_keywords_containing("buy-now.test").unwrap();
        removed.sort();
        assert_eq!(removed, ["buy-now.test/a", "buy-now.test/b"]);

        assert!(s.remove_keywords_containing("%").unwrap() == vec!["100%bonus".to_string()]);
        assert_eq!(s.list_keywords().unwrap().as_slice(), ["unrelated"]);
    }

    #[test]
    fn projections_split_manual_and_auto_added() {
        let s = store();
        s.add_keyword("manual", false, false).unwrap();
        s.add_keyword("site.test/x", true, true).unwrap();
        s.add_keyword("admin-link.test", true, false).unwrap();

        let manual = s.list_manual_keywords().unwrap();
        assert!(manual.contains(&"manual".to_string()));
        assert!(manual.contains(&"admin-link.test".to_string()));
        assert!(!manual.contains(&"site.test/x".to_string()));

        assert_eq!(s.list_auto_added_links().unwrap(), ["site.test/x"]);
    }

    #[test]
    fn cleanup_removes_only_expired_auto_added_links() {
        let s = store();
        s.add_keyword("old-auto.test/x", true, true).unwrap();
        s.add_keyword("old-manual", false, false).unwrap();
        s.add_keyword("fresh-auto.test/y", true, true).unwrap();

        let three_months_ago = (Utc::now() - chrono::Duration::days(90)).timestamp();
        s.backdate_keyword("old-auto.test/x", three_months_ago)
            .unwrap();
        s.backdate_keyword("old-manual", three_months_ago).unwrap();

        assert_eq!(s.cleanup_expired_links().unwrap(), 1);
        assert!(!s.keyword_exists("old-auto.test/x").unwrap());
        assert!(s.keyword_exists("old-manual").unwrap());
        assert!(s.keyword_exists("fresh-auto.test/y").unwrap());
    }

    #[test]
    fn whitelist_is_lowercased_and_idempotent() {
        let s = store();
        s.add_whitelist("Example.COM").unwrap();
        s.add_whitelist("example.com").unwrap();

        assert!(s.whitelist_exists("EXAMPLE.com").unwrap());
        assert_eq!(s.list_whitelist().unwrap().as_slice(), ["example.com"]);
        assert!(s.remove_whitelist("example.com").unwrap());
        assert!(!s.remove_whitelist("example.com").unwrap());
    }

    #[test]
    fn repopulating_reader_never_masks_a_racing_write() {
        let s = Arc::new(store());

        for i in 0..300 {
            let early = format!("early-{i}");
            let late = format!("late-{i}");
            s.add_keyword(&early, false, false).unwrap();

            // A reader repopulating the empty cache while the second write
            // lands must not install its pre-write snapshot as fresh.
            let reader = {
                let s = Arc::clone(&s);
                std::thread::spawn(move || {
                    let _ = s.list_keywords();
                })
            };
            s.add_keyword(&late, false, false).unwrap();
            reader.join().unwrap();

            assert!(
                s.list_keywords().unwrap().contains(&late),
                "stale snapshot hides {late}"
            );
        }
    }

    #[test]
    fn prompt_replies_are_last_write_wins_and_immediately_visible() {
        let s = store();
        s.set_prompt_reply("Hello", "hi there").unwrap();
        s.set_prompt_reply("hello", "welcome").unwrap();

        let replies = s.list_prompt_replies().unwrap();
        assert_eq!(replies, [("hello".to_string(), "welcome".to_string())]);

        assert!(s.delete_prompt_reply("HELLO").unwrap());
        assert!(s.list_prompt_replies().unwrap().is_empty());
    }

    #[test]
    fn config_missing_key_is_none() {
        let s = store();
        assert_eq!(s.get_config("nope").unwrap(), None);

        s.set_config("last_msg_id", "42").unwrap();
        assert_eq!(s.get_config("last_msg_id").unwrap().as_deref(), Some("42"));

        s.set_config("last_msg_id", "43").unwrap();
        assert_eq!(s.get_config("last_msg_id").unwrap().as_deref(), Some("43"));

        s.delete_config("last_msg_id").unwrap();
        assert_eq!(s.get_config("last_msg_id").unwrap(), None);
    }

    #[test]
    fn migration_flag_is_set_once() {
        let s = store();
        assert_eq!(
            s.get_config(MIGRATION_DONE_KEY).unwrap().as_deref(),
            Some("1")
        );
    }
}
