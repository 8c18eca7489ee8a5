//! SQLite adapter: Implementation of AssessmentStore.
//!
//! Provides local persistence for assessment history.
//!
//! Timestamps are stored as fixed-width RFC 3339 text (microsecond precision,
//! `Z` suffix) so that lexical order equals chronological order.
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};

use crate::domain::{
    AssessmentRecord, AssessmentSummary, ClinicalFeatures, HistoryStats, RiskAssessment,
    RiskLevel, ValidatedObservation,
};
use crate::ports::{AssessmentPage, AssessmentStore};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

const SUMMARY_COLUMNS: &str = "id, patient_name, patient_id, age, sex, \
     risk_probability, risk_level, assessment_date";

const RECORD_COLUMNS: &str = "id, patient_name, patient_id, \
     age, sex, cp, trestbps, chol, fbs, restecg, thalachh, exang, oldpeak, slope, ca, thal, \
     risk_probability, risk_level, assessment_date";

/// SQL name of the Unicode-aware lowercase function registered per connection.
/// The built-in `lower()` only folds ASCII.
const FOLD_CASE_FN: &str = "fold_case";

const ORDER_RECENT_FIRST: &str = "ORDER BY assessment_date DESC, id DESC";

/// SQLite storage adapter.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Create a new SQLite storage with the given database path.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or initialized.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Create an in-memory SQLite database (for testing).
    ///
    /// # Errors
    /// Returns error if database cannot be created.
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.create_scalar_function(
            FOLD_CASE_FN,
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let value: Option<String> = ctx.get(0)?;
                Ok(value.map(|v| v.to_lowercase()))
            },
        )?;

        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS assessments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                patient_name TEXT NOT NULL,
                patient_id TEXT NOT NULL,
                age REAL NOT NULL,
                sex REAL NOT NULL,
                cp REAL NOT NULL,
                trestbps REAL NOT NULL,
                chol REAL NOT NULL,
                fbs REAL NOT NULL,
                restecg REAL NOT NULL,
                thalachh REAL NOT NULL,
                exang REAL NOT NULL,
                oldpeak REAL NOT NULL,
                slope REAL NOT NULL,
                ca REAL NOT NULL,
                thal REAL NOT NULL,
                risk_probability REAL,
                risk_level TEXT NOT NULL,
                assessment_date TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_assessments_date
                ON assessments(assessment_date DESC);

            CREATE INDEX IF NOT EXISTS idx_assessments_patient
                ON assessments(patient_id);
            ",
        )?;

        Ok(())
    }

    fn format_date(at: DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
        let raw: String = row.get(idx)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    fn parse_risk_level(row: &Row<'_>, idx: usize) -> rusqlite::Result<RiskLevel> {
        let raw: String = row.get(idx)?;
        RiskLevel::parse(&raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                Type::Text,
                format!("unknown risk level {raw:?}").into(),
            )
        })
    }

    fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<AssessmentSummary> {
        let sex: f64 = row.get(4)?;
        Ok(AssessmentSummary {
            id: row.get(0)?,
            patient_name: row.get(1)?,
            patient_id: row.get(2)?,
            age: row.get(3)?,
            sex: if sex == 1.0 { "Male" } else { "Female" }.to_string(),
            risk_probability: row.get(5)?,
            risk_level: Self::parse_risk_level(row, 6)?,
            assessment_date: Self::parse_date(row, 7)?,
        })
    }

    fn record_from_row(row: &Row<'_>) -> rusqlite::Result<AssessmentRecord> {
        let mut values = [0.0; 13];
        for (i, slot) in values.iter_mut().enumerate() {
            *slot = row.get(3 + i)?;
        }

        Ok(AssessmentRecord {
            id: row.get(0)?,
            patient_name: row.get(1)?,
            patient_id: row.get(2)?,
            features: ClinicalFeatures::from_array(values),
            risk_probability: row.get(16)?,
            risk_level: Self::parse_risk_level(row, 17)?,
            assessment_date: Self::parse_date(row, 18)?,
        })
    }
}

impl AssessmentStore for SqliteStorage {
    type Error = StorageError;

    fn save_assessment(
        &self,
        observation: &ValidatedObservation,
        assessment: &RiskAssessment,
    ) -> Result<i64, Self::Error> {
        let conn = self.conn()?;
        let f = &observation.features;

        conn.execute(
            r"
            INSERT INTO assessments (
                patient_name, patient_id,
                age, sex, cp, trestbps, chol, fbs, restecg,
                thalachh, exang, oldpeak, slope, ca, thal,
                risk_probability, risk_level, assessment_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            ",
            params![
                observation.patient_name,
                observation.patient_id,
                f.age,
                f.sex,
                f.cp,
                f.trestbps,
                f.chol,
                f.fbs,
                f.restecg,
                f.thalachh,
                f.exang,
                f.oldpeak,
                f.slope,
                f.ca,
                f.thal,
                assessment.risk_percentage(),
                assessment.risk_level.as_str(),
                Self::format_date(assessment.assessed_at),
            ],
        )?;

        let id = conn.last_insert_rowid();
        tracing::debug!("Saved assessment {} to storage", id);
        Ok(id)
    }

    fn find_latest_by_patient_id(
        &self,
        patient_id: &str,
    ) -> Result<Option<AssessmentRecord>, Self::Error> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM assessments WHERE patient_id = ?1 {ORDER_RECENT_FIRST} LIMIT 1"
        );

        match conn.query_row(&sql, params![patient_id], Self::record_from_row) {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn search(&self, term: &str) -> Result<Vec<AssessmentSummary>, Self::Error> {
        let conn = self.conn()?;
        // instr() instead of LIKE so `%` and `_` in the term match literally.
        let sql = format!(
            "SELECT {SUMMARY_COLUMNS} FROM assessments \
             WHERE instr({FOLD_CASE_FN}(patient_name), ?1) > 0 \
                OR instr({FOLD_CASE_FN}(patient_id), ?1) > 0 \
             {ORDER_RECENT_FIRST}"
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![term.to_lowercase()], Self::summary_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn list_all(&self) -> Result<Vec<AssessmentSummary>, Self::Error> {
        let conn = self.conn()?;
        let sql = format!("SELECT {SUMMARY_COLUMNS} FROM assessments {ORDER_RECENT_FIRST}");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], Self::summary_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn list_paginated(&self, offset: usize, limit: usize) -> Result<AssessmentPage, Self::Error> {
        let conn = self.conn()?;

        let total_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM assessments", [], |row| row.get(0))?;

        let sql = format!(
            "SELECT {SUMMARY_COLUMNS} FROM assessments {ORDER_RECENT_FIRST} LIMIT ?1 OFFSET ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        // Past i64::MAX nothing can match; clamping keeps the page empty.
        let sql_limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql_offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let items = stmt
            .query_map(params![sql_limit, sql_offset], Self::summary_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AssessmentPage::new(
            items,
            usize::try_from(total_count).unwrap_or(0),
            offset,
            limit,
        ))
    }

    fn stats(&self) -> Result<HistoryStats, Self::Error> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT risk_level, COUNT(*) FROM assessments GROUP BY risk_level")?;

        let mut stats = HistoryStats::default();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let level = Self::parse_risk_level(row, 0)?;
            let count: i64 = row.get(1)?;
            let count = count as usize;
            stats.total += count;
            match level {
                RiskLevel::High => stats.high_risk += count,
                RiskLevel::Low => stats.low_risk += count,
            }
        }
        Ok(stats)
    }

    fn delete_assessment(&self, id: i64) -> Result<bool, Self::Error> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM assessments WHERE id = ?1", params![id])?;
        if removed > 0 {
            tracing::info!("Deleted assessment {}", id);
        }
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{sample_observation, Classification};
    use chrono::Duration;

    fn observation(name: &str, id: &str) -> ValidatedObservation {
        let mut obs = sample_observation().to_validated().expect("complete");
        obs.patient_name = name.to_string();
        obs.patient_id = id.to_string();
        obs
    }

    fn assessment_at(class: u8, probability: Option<f64>, at: DateTime<Utc>) -> RiskAssessment {
        RiskAssessment::at(
            Classification {
                predicted_class: class,
                probability,
            },
            at,
        )
    }

    #[test]
    fn test_save_and_find_latest() {
        let storage = SqliteStorage::in_memory().expect("Should create db");
        let t0 = Utc::now();

        let first = storage
            .save_assessment(&observation("Jane Roe", "P-1"), &assessment_at(0, Some(0.2), t0))
            .expect("Should save");
        let second = storage
            .save_assessment(
                &observation("Jane Roe", "P-1"),
                &assessment_at(1, Some(0.75), t0 + Duration::seconds(5)),
            )
            .expect("Should save");
        assert!(second > first);

        let latest = storage
            .find_latest_by_patient_id("P-1")
            .expect("Should query")
            .expect("Should exist");
        assert_eq!(latest.id, second);
        assert_eq!(latest.risk_level, RiskLevel::High);
        assert!((latest.risk_probability.expect("pct") - 75.0).abs() < 1e-9);
        assert_eq!(latest.features, observation("x", "y").features);
        let stored_at = latest.assessment().assessed_at;
        assert!((stored_at - (t0 + Duration::seconds(5))).num_milliseconds().abs() < 1);

        assert!(storage
            .find_latest_by_patient_id("P-404")
            .expect("Should query")
            .is_none());
    }

    #[test]
    fn test_null_probability_round_trips() {
        let storage = SqliteStorage::in_memory().expect("Should create db");
        let id = storage
            .save_assessment(&observation("A", "B"), &assessment_at(1, None, Utc::now()))
            .expect("Should save");

        let record = storage
            .find_latest_by_patient_id("B")
            .expect("Should query")
            .expect("Should exist");
        assert_eq!(record.id, id);
        assert!(record.risk_probability.is_none());
        assert_eq!(record.assessment().predicted_class, 1);
    }

    #[test]
    fn test_listing_is_most_recent_first() {
        let storage = SqliteStorage::in_memory().expect("Should create db");
        let t0 = Utc::now();

        for (i, id) in ["P-1", "P-2", "P-3"].iter().enumerate() {
            storage
                .save_assessment(
                    &observation("Patient", id),
                    &assessment_at(0, Some(0.1), t0 + Duration::milliseconds(i as i64 * 10)),
                )
                .expect("Should save");
        }

        let all = storage.list_all().expect("Should list");
        let ids: Vec<&str> = all.iter().map(|s| s.patient_id.as_str()).collect();
        assert_eq!(ids, vec!["P-3", "P-2", "P-1"]);
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let storage = SqliteStorage::in_memory().expect("Should create db");
        let now = Utc::now();
        storage
            .save_assessment(&observation("Jane Roe", "CARD-001"), &assessment_at(0, None, now))
            .expect("Should save");
        storage
            .save_assessment(&observation("John Smith", "card-002"), &assessment_at(1, None, now))
            .expect("Should save");
        storage
            .save_assessment(&observation("Ann 100%", "X_9"), &assessment_at(1, None, now))
            .expect("Should save");

        assert_eq!(storage.search("roe").expect("Should search").len(), 1);
        assert_eq!(storage.search("Card").expect("Should search").len(), 2);
        assert_eq!(storage.search("%").expect("Should search").len(), 1);
        assert_eq!(storage.search("_").expect("Should search").len(), 1);
        assert!(storage.search("nobody").expect("Should search").is_empty());

        let hit = &storage.search("smith").expect("Should search")[0];
        assert_eq!(hit.sex, "Male");
        assert_eq!(hit.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_search_folds_non_ascii_case() {
        let storage = SqliteStorage::in_memory().expect("Should create db");
        let now = Utc::now();
        storage
            .save_assessment(&observation("JOSÉ ÁLVAREZ", "ÑU-7"), &assessment_at(1, None, now))
            .expect("Should save");
        storage
            .save_assessment(&observation("Jose Alvarez", "NU-8"), &assessment_at(0, None, now))
            .expect("Should save");

        let hits = storage.search("josé").expect("Should search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].patient_name, "JOSÉ ÁLVAREZ");

        assert_eq!(storage.search("álv").expect("Should search").len(), 1);
        assert_eq!(storage.search("ñu-").expect("Should search").len(), 1);
        assert_eq!(storage.search("ALVAREZ").expect("Should search").len(), 1);
    }

    #[test]
    fn test_pagination_and_stats() {
        let storage = SqliteStorage::in_memory().expect("Should create db");
        let t0 = Utc::now();
        for i in 0..5 {
            storage
                .save_assessment(
                    &observation("P", &format!("P-{i}")),
                    &assessment_at(u8::from(i % 2 == 0), None, t0 + Duration::seconds(i)),
                )
                .expect("Should save");
        }

        let page = storage.list_paginated(0, 2).expect("Should page");
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_count, 5);
        assert!(page.has_more);
        assert_eq!(page.next_offset(), Some(2));
        assert_eq!(page.items[0].patient_id, "P-4");

        let last = storage.list_paginated(4, 2).expect("Should page");
        assert_eq!(last.items.len(), 1);
        assert!(!last.has_more);
        assert_eq!(last.prev_offset(), Some(2));

        let stats = storage.stats().expect("Should count");
        assert_eq!(
            stats,
            HistoryStats {
                total: 5,
                high_risk: 3,
                low_risk: 2
            }
        );
    }

    #[test]
    fn test_delete() {
        let storage = SqliteStorage::in_memory().expect("Should create db");
        let id = storage
            .save_assessment(&observation("A", "B"), &assessment_at(0, None, Utc::now()))
            .expect("Should save");
        assert_eq!(storage.stats().expect("Should count").total, 1);

        assert!(storage.delete_assessment(id).expect("Should delete"));
        assert!(!storage.delete_assessment(id).expect("Should delete"));
        assert_eq!(storage.stats().expect("Should count").total, 0);
        assert!(storage.list_all().expect("Should list").is_empty());
        assert!(storage
            .find_latest_by_patient_id("B")
            .expect("Should query")
            .is_none());
    }

    #[test]
    fn test_offset_past_the_end() {
        let storage = SqliteStorage::in_memory().expect("Should create db");
        storage
            .save_assessment(&observation("A", "B"), &assessment_at(0, None, Utc::now()))
            .expect("Should save");

        for offset in [1, usize::MAX] {
            let page = storage.list_paginated(offset, 1).expect("Should page");
            assert!(page.items.is_empty());
            assert_eq!(page.total_count, 1);
            assert!(!page.has_more);
            assert_eq!(page.next_offset(), None);
        }
    }
}
