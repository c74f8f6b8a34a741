//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::record::{CourseRecord, InstructorProfile, InstructorSummary, ParsedCourse, UniqueKey};
use crate::state::OutcomeCounts;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{FailureRecord, InsertOutcome, RunRecord, RunStatus};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RUN_COLUMNS: &str =
    "id, started_at, finished_at, config_hash, status, done_count, skipped_count, failed_count";

const COURSE_COLUMNS: &str = "unique_key, slug, title, canonical_url, subtitle, price, rating,
    num_students, created_by, last_updated, instructor_name, instructor_url, instructor_rating,
    instructor_reviews, instructor_students, instructor_courses, instructor_profile, source_url,
    search_term";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        // Initialize schema
        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn query_courses(
        &self,
        filter: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> StorageResult<Vec<CourseRecord>> {
        let sql = format!("SELECT {} FROM courses {} ORDER BY id", COURSE_COLUMNS, filter);
        let mut stmt = self.conn.prepare(&sql)?;

        let courses = stmt
            .query_map(args, course_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(courses)
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
        done_count: row.get::<_, i64>(5)? as u64,
        skipped_count: row.get::<_, i64>(6)? as u64,
        failed_count: row.get::<_, i64>(7)? as u64,
    })
}

/// Decodes a JSON text column
fn json_column<T: serde::de::DeserializeOwned>(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|text| {
        serde_json::from_str(&text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn course_from_row(row: &Row<'_>) -> rusqlite::Result<CourseRecord> {
    Ok(CourseRecord {
        key: UniqueKey::new(row.get::<_, String>(0)?),
        course: ParsedCourse {
            slug: row.get(1)?,
            title: row.get(2)?,
            canonical_url: row.get(3)?,
            subtitle: row.get(4)?,
            price: row.get(5)?,
            rating: row.get(6)?,
            num_students: row.get(7)?,
            created_by: json_column(row, 8)?.unwrap_or_default(),
            last_updated: row.get(9)?,
            instructor: InstructorSummary {
                name: row.get(10)?,
                profile_url: row.get(11)?,
                rating: row.get(12)?,
                reviews: row.get(13)?,
                students: row.get(14)?,
                courses: row.get(15)?,
            },
        },
        instructor_profile: json_column::<InstructorProfile>(row, 16)?,
        source_url: row.get(17)?,
        search_term: row.get(18)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        let run = self.conn.query_row(&sql, [], run_from_row).optional()?;
        Ok(run)
    }

    fn complete_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counts: &OutcomeCounts,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, done_count = ?3,
             skipped_count = ?4, failed_count = ?5 WHERE id = ?6",
            params![
                status.to_db_string(),
                now,
                counts.done as i64,
                counts.skipped as i64,
                counts.failed as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn count_runs(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Courses =====

    fn list_unique_keys(&self) -> StorageResult<Vec<UniqueKey>> {
        let mut stmt = self.conn.prepare("SELECT unique_key FROM courses")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0).map(UniqueKey::new))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn insert_course(
        &mut self,
        record: &CourseRecord,
        run_id: i64,
    ) -> StorageResult<InsertOutcome> {
        let course = &record.course;
        let created_by = serde_json::to_string(&course.created_by)?;
        let profile = record
            .instructor_profile
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let now = Utc::now().to_rfc3339();

        let sql = format!(
            "INSERT INTO courses ({}, run_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?20, ?21)
             ON CONFLICT(unique_key) DO NOTHING",
            COURSE_COLUMNS
        );

        let inserted = self.conn.execute(
            &sql,
            params![
                record.key.as_str(),
                course.slug,
                course.title,
                course.canonical_url,
                course.subtitle,
                course.price,
                course.rating,
                course.num_students,
                created_by,
                course.last_updated,
                course.instructor.name,
                course.instructor.profile_url,
                course.instructor.rating,
                course.instructor.reviews,
                course.instructor.students,
                course.instructor.courses,
                profile,
                record.source_url,
                record.search_term,
                run_id,
                now
            ],
        )?;

        if inserted == 0 {
            Ok(InsertOutcome::AlreadyExists)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    fn get_courses_for_run(&self, run_id: i64) -> StorageResult<Vec<CourseRecord>> {
        self.query_courses("WHERE run_id = ?1", &[&run_id])
    }

    fn get_all_courses(&self) -> StorageResult<Vec<CourseRecord>> {
        self.query_courses("", &[])
    }

    fn count_courses(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM courses", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_courses_by_search_term(&self) -> StorageResult<Vec<(String, u64)>> {
        let query = "
            SELECT COALESCE(search_term, ''), COUNT(*) as count
            FROM courses
            GROUP BY search_term
            ORDER BY count DESC, search_term
        ";

        let mut stmt = self.conn.prepare(query)?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;

        let mut breakdown = Vec::new();
        for row in rows {
            breakdown.push(row?);
        }

        Ok(breakdown)
    }

    // ===== Failures =====

    fn record_failure(&mut self, run_id: i64, failure: &FailureRecord) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO task_failures (run_id, link, search_term, error_kind, message, attempts, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run_id,
                failure.link,
                failure.search_term,
                failure.error_kind,
                failure.message,
                failure.attempts,
                now
            ],
        )?;
        Ok(())
    }

    fn get_failures_for_run(&self, run_id: i64) -> StorageResult<Vec<FailureRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT link, search_term, error_kind, message, attempts
             FROM task_failures WHERE run_id = ?1 ORDER BY id",
        )?;

        let failures = stmt
            .query_map(params![run_id], |row| {
                Ok(FailureRecord {
                    link: row.get(0)?,
                    search_term: row.get(1)?,
                    error_kind: row.get(2)?,
                    message: row.get(3)?,
                    attempts: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(failures)
    }

    fn record_listing_failure(
        &mut self,
        run_id: i64,
        failure: &FailureRecord,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO listing_failures (run_id, url, error_kind, message, attempts, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                run_id,
                failure.link,
                failure.error_kind,
                failure.message,
                failure.attempts,
                now
            ],
        )?;
        Ok(())
    }

    fn get_listing_failures_for_run(&self, run_id: i64) -> StorageResult<Vec<FailureRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT url, error_kind, message, attempts
             FROM listing_failures WHERE run_id = ?1 ORDER BY id",
        )?;

        let failures = stmt
            .query_map(params![run_id], |row| {
                Ok(FailureRecord {
                    link: row.get(0)?,
                    search_term: None,
                    error_kind: row.get(1)?,
                    message: row.get(2)?,
                    attempts: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(failures)
    }
}
