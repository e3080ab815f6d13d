//! Schema migration framework.
//!
//! Numbered SQL migrations are embedded at compile time via `include_str!`.
//! Each migration runs exactly once, tracked by the `schema_version` table.

use rusqlite::Connection;

struct Migration {
    version: i32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("migrations/001_baseline.sql"),
}];

/// Create the `schema_version` table if it doesn't exist.
fn ensure_schema_version_table(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| format!("Failed to create schema_version table: {}", e))
}

/// Return the highest applied migration version, or 0 if none.
fn current_version(conn: &Connection) -> Result<i32, String> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(|e| format!("Failed to read schema version: {}", e))
}

/// Run all pending migrations.
///
/// Returns the number of migrations applied (0 if already up-to-date).
/// A database stamped with a version newer than any known migration is
/// rejected rather than silently downgraded.
pub fn run_migrations(conn: &Connection) -> Result<usize, String> {
    ensure_schema_version_table(conn)?;

    let current = current_version(conn)?;
    let max_known = MIGRATIONS.last().map(|m| m.version).unwrap_or(0);

    if current > max_known {
        return Err(format!(
            "Database schema version ({}) is newer than this build supports ({}). \
             Upgrade contact-enrichment before opening this database.",
            current, max_known
        ));
    }

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();
    if pending.is_empty() {
        return Ok(0);
    }

    for migration in &pending {
        conn.execute_batch(migration.sql)
            .map_err(|e| format!("Migration v{} failed: {}", migration.version, e))?;

        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [migration.version],
        )
        .map_err(|e| format!("Failed to record migration v{}: {}", migration.version, e))?;

        log::info!("Applied migration v{}", migration.version);
    }

    Ok(pending.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_db() -> Connection {
        Connection::open_in_memory().expect("in-memory db")
    }

    #[test]
    fn test_fresh_db_applies_baseline() {
        let conn = mem_db();
        let applied = run_migrations(&conn).expect("migrations should succeed");
        assert_eq!(applied, 1);
        assert_eq!(current_version(&conn).expect("version query"), 1);

        conn.execute(
            "INSERT INTO organizations (domain, industry, employee_count, updated_at)
             VALUES ('acme.com', 'Software', 120, '2026-01-01T00:00:00.000Z')",
            [],
        )
        .expect("organizations should have firmographic columns");

        conn.execute(
            "INSERT INTO people (id, owner_id, email, organization_domain, external_id,
             last_enriched_at, title, headline, profile_url, photo_url, city, region, country,
             last_seen, updated_at)
             VALUES ('p1', 'u1', 'a@acme.com', 'acme.com', NULL, NULL, NULL, NULL, NULL, NULL,
             NULL, NULL, NULL, NULL, '2026-01-01T00:00:00.000Z')",
            [],
        )
        .expect("people should have enrichment columns");

        let log_count: i32 = conn
            .query_row("SELECT COUNT(*) FROM enrichment_log", [], |row| row.get(0))
            .expect("enrichment_log table should exist");
        assert_eq!(log_count, 0);
    }

    #[test]
    fn test_people_email_unique_per_owner() {
        let conn = mem_db();
        run_migrations(&conn).expect("migrations");
        let insert = "INSERT INTO people (id, owner_id, email, updated_at)
                      VALUES (?1, ?2, 'dup@acme.com', '2026-01-01T00:00:00.000Z')";
        conn.execute(insert, ["p1", "u1"]).expect("first insert");
        conn.execute(insert, ["p2", "u2"]).expect("other owner may share the email");
        assert!(conn.execute(insert, ["p3", "u1"]).is_err());
    }

    #[test]
    fn test_forward_compat_guard() {
        let conn = mem_db();
        ensure_schema_version_table(&conn).unwrap();
        conn.execute("INSERT INTO schema_version (version) VALUES (999)", [])
            .unwrap();

        let err = run_migrations(&conn).unwrap_err();
        assert!(err.contains("newer than this build"), "unexpected error: {}", err);
    }

    #[test]
    fn test_idempotency() {
        let conn = mem_db();
        assert_eq!(run_migrations(&conn).expect("first run"), 1);
        assert_eq!(run_migrations(&conn).expect("second run"), 0);
        assert_eq!(current_version(&conn).expect("version query"), 1);
    }

    #[test]
    fn test_file_db_migrates_in_place() {
        let dir = tempfile::tempdir().expect("tempdir");
        let conn = Connection::open(dir.path().join("enrichment.db")).expect("open db");
        assert_eq!(run_migrations(&conn).expect("migrations"), 1);

        let files: Vec<String> = std::fs::read_dir(dir.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files, vec!["enrichment.db".to_string()]);
    }
}
