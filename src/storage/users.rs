//! User registry: one row per Telegram identity.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::i18n::Language;

/// Timestamp format SQLite's `datetime('now')` produces.
const SQLITE_TS: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub language: Language,
    pub is_admin: bool,
    pub is_allowed: bool,
    pub created_at: String,
    pub last_active: String,
}

impl User {
    /// Whether the user may browse the catalog. Admins always can.
    pub fn has_access(&self) -> bool {
        self.is_allowed || self.is_admin
    }

    /// `@username` when known, otherwise the numeric id.
    pub fn display_name(&self) -> String {
        match self.username.as_deref() {
            Some(name) if !name.is_empty() => format!("@{}", name),
            _ => self.telegram_id.to_string(),
        }
    }
}

/// Aggregate counters shown in the admin stats view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserStats {
    pub total: i64,
    pub allowed: i64,
    pub new_day: i64,
    pub new_week: i64,
    pub new_month: i64,
    pub active_day: i64,
    pub active_week: i64,
    pub active_month: i64,
}

const USER_COLUMNS: &str = "telegram_id, username, language, is_admin, is_allowed, created_at, last_active";

fn parse_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let language: String = row.get(2)?;
    Ok(User {
        telegram_id: row.get(0)?,
        username: row.get(1)?,
        language: Language::from_code(&language).unwrap_or_default(),
        is_admin: row.get::<_, i32>(3)? != 0,
        is_allowed: row.get::<_, i32>(4)? != 0,
        created_at: row.get(5)?,
        last_active: row.get(6)?,
    })
}

/// Registers the user on first contact and refreshes the username otherwise.
///
/// Returns `true` when a new row was created.
pub fn ensure_user(conn: &Connection, telegram_id: i64, username: Option<&str>) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO users (telegram_id, username) VALUES (?1, ?2)
         ON CONFLICT(telegram_id) DO NOTHING",
        params![telegram_id, username],
    )?;
    if inserted == 0 {
        if let Some(name) = username {
            conn.execute(
                "UPDATE users SET username = ?2 WHERE telegram_id = ?1 AND (username IS NULL OR username != ?2)",
                params![telegram_id, name],
            )?;
        }
    } else {
        log::info!("Registered new user {}", telegram_id);
    }
    Ok(inserted > 0)
}

pub fn get_user(conn: &Connection, telegram_id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE telegram_id = ?1", USER_COLUMNS),
        params![telegram_id],
        parse_row,
    )
    .optional()
}

/// Language of the user, the default one for unknown users.
pub fn get_language(conn: &Connection, telegram_id: i64) -> rusqlite::Result<Language> {
    Ok(get_user(conn, telegram_id)?.map(|u| u.language).unwrap_or_default())
}

pub fn set_language(conn: &Connection, telegram_id: i64, language: Language) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET language = ?2 WHERE telegram_id = ?1",
        params![telegram_id, language.code()],
    )?;
    Ok(changed > 0)
}

/// Grants the admin flag. Creates the row when the id has never contacted the bot,
/// so super-admins can be bootstrapped before their first message.
pub fn set_admin(conn: &Connection, telegram_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO users (telegram_id, is_admin) VALUES (?1, 1)
         ON CONFLICT(telegram_id) DO UPDATE SET is_admin = 1",
        params![telegram_id],
    )?;
    Ok(())
}

/// Updates the access flag. Returns `false` when the user does not exist.
pub fn set_allowed(conn: &Connection, telegram_id: i64, allowed: bool) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET is_allowed = ?2 WHERE telegram_id = ?1",
        params![telegram_id, allowed as i32],
    )?;
    Ok(changed > 0)
}

pub fn is_admin(conn: &Connection, telegram_id: i64) -> rusqlite::Result<bool> {
    let flag: Option<i32> = conn
        .query_row(
            "SELECT is_admin FROM users WHERE telegram_id = ?1",
            params![telegram_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(flag.unwrap_or(0) != 0)
}

pub fn touch_last_active(conn: &Connection, telegram_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET last_active = datetime('now') WHERE telegram_id = ?1",
        params![telegram_id],
    )?;
    Ok(())
}

/// Ids of every user holding the admin flag.
pub fn list_admin_ids(conn: &Connection) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT telegram_id FROM users WHERE is_admin = 1 ORDER BY telegram_id")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    rows.collect()
}

fn count_since(conn: &Connection, column: &str, since: DateTime<Utc>) -> rusqlite::Result<i64> {
    conn.query_row(
        &format!("SELECT COUNT(*) FROM users WHERE {} >= ?1", column),
        params![since.format(SQLITE_TS).to_string()],
        |row| row.get(0),
    )
}

/// Counts users by registration and activity windows relative to `now`.
///
/// "Today" starts at UTC midnight; week and month are rolling 7 and 30 day windows.
pub fn user_stats(conn: &Connection, now: DateTime<Utc>) -> rusqlite::Result<UserStats> {
    let start_of_day = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(now);
    let week = now - Duration::days(7);
    let month = now - Duration::days(30);

    let (total, allowed): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(is_allowed), 0) FROM users",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(UserStats {
        total,
        allowed,
        new_day: count_since(conn, "created_at", start_of_day)?,
        new_week: count_since(conn, "created_at", week)?,
        new_month: count_since(conn, "created_at", month)?,
        active_day: count_since(conn, "last_active", start_of_day)?,
        active_week: count_since(conn, "last_active", week)?,
        active_month: count_since(conn, "last_active", month)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_conn;
    use pretty_assertions::assert_eq;

    // ── ensure_user ─────────────────────────────────────────────────────────

    #[test]
    fn ensure_user_creates_once() {
        let conn = test_conn();
        assert!(ensure_user(&conn, 42, Some("alice")).unwrap());
        assert!(!ensure_user(&conn, 42, Some("alice")).unwrap());

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn ensure_user_refreshes_username() {
        let conn = test_conn();
        ensure_user(&conn, 42, None).unwrap();
        ensure_user(&conn, 42, Some("renamed")).unwrap();
        assert_eq!(get_user(&conn, 42).unwrap().unwrap().username.as_deref(), Some("renamed"));
    }

    #[test]
    fn new_user_defaults() {
        let conn = test_conn();
        ensure_user(&conn, 7, Some("bob")).unwrap();
        let user = get_user(&conn, 7).unwrap().unwrap();
        assert_eq!(user.language, Language::Uz);
        assert!(!user.is_admin);
        assert!(!user.is_allowed);
        assert!(!user.has_access());
        assert_eq!(user.display_name(), "@bob");
    }

    // ── flags ───────────────────────────────────────────────────────────────

    #[test]
    fn set_language_and_allowed() {
        let conn = test_conn();
        ensure_user(&conn, 1, None).unwrap();
        assert!(set_language(&conn, 1, Language::Es).unwrap());
        assert!(set_allowed(&conn, 1, true).unwrap());

        let user = get_user(&conn, 1).unwrap().unwrap();
        assert_eq!(user.language, Language::Es);
        assert!(user.has_access());
        assert_eq!(get_language(&conn, 1).unwrap(), Language::Es);
    }

    #[test]
    fn set_allowed_unknown_user_reports_false() {
        let conn = test_conn();
        assert!(!set_allowed(&conn, 999, true).unwrap());
    }

    #[test]
    fn set_admin_bootstraps_missing_row() {
        let conn = test_conn();
        set_admin(&conn, 5).unwrap();
        assert!(is_admin(&conn, 5).unwrap());
        assert!(!is_admin(&conn, 6).unwrap());
        assert_eq!(list_admin_ids(&conn).unwrap(), vec![5]);
    }

    // ── stats ───────────────────────────────────────────────────────────────

    #[test]
    fn user_stats_windows() {
        let conn = test_conn();
        let now = Utc::now();
        ensure_user(&conn, 1, None).unwrap();
        ensure_user(&conn, 2, None).unwrap();
        ensure_user(&conn, 3, None).unwrap();
        set_allowed(&conn, 2, true).unwrap();

        let old = (now - Duration::days(10)).format(SQLITE_TS).to_string();
        conn.execute(
            "UPDATE users SET created_at = ?1, last_active = ?1 WHERE telegram_id = 3",
            params![old],
        )
        .unwrap();

        let stats = user_stats(&conn, now).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.allowed, 1);
        assert_eq!(stats.new_week, 2);
        assert_eq!(stats.new_month, 3);
        assert_eq!(stats.active_week, 2);
        assert_eq!(stats.active_month, 3);
    }
}
