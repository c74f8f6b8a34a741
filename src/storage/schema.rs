//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the course-harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    done_count INTEGER NOT NULL DEFAULT 0,
    skipped_count INTEGER NOT NULL DEFAULT 0,
    failed_count INTEGER NOT NULL DEFAULT 0
);

-- Accepted courses; unique_key is the deduplication guard
CREATE TABLE IF NOT EXISTS courses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    unique_key TEXT NOT NULL UNIQUE,
    slug TEXT NOT NULL,
    title TEXT NOT NULL,
    canonical_url TEXT NOT NULL,
    subtitle TEXT,
    price TEXT,
    rating TEXT,
    num_students TEXT,
    created_by TEXT NOT NULL,
    last_updated TEXT,
    instructor_name TEXT,
    instructor_url TEXT,
    instructor_rating TEXT,
    instructor_reviews TEXT,
    instructor_students TEXT,
    instructor_courses TEXT,
    instructor_profile TEXT,
    source_url TEXT NOT NULL,
    search_term TEXT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_courses_run ON courses(run_id);
CREATE INDEX IF NOT EXISTS idx_courses_search_term ON courses(search_term);

-- Links that failed or were never started during a run
CREATE TABLE IF NOT EXISTS task_failures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    link TEXT NOT NULL,
    search_term TEXT,
    error_kind TEXT NOT NULL,
    message TEXT NOT NULL,
    attempts INTEGER NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_task_failures_run ON task_failures(run_id);

-- Listing pages that yielded no links during a run
CREATE TABLE IF NOT EXISTS listing_failures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    error_kind TEXT NOT NULL,
    message TEXT NOT NULL,
    attempts INTEGER NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_listing_failures_run ON listing_failures(run_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        let result = initialize_schema(&conn);
        assert!(result.is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // Initialize twice
        initialize_schema(&conn).unwrap();
        let result = initialize_schema(&conn);

        // Should succeed the second time too
        assert!(result.is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["runs", "courses", "task_failures", "listing_failures"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_unique_key_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES ('now', 'h', 'running')",
            [],
        )
        .unwrap();

        let insert = "INSERT INTO courses (unique_key, slug, title, canonical_url, created_by,
                      source_url, run_id, created_at)
                      VALUES ('k', 's', 't', 'u', '[]', 'u', 1, 'now')";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }
}
