use std::path::Path;

use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tracing::debug;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS query_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    latency_ms INTEGER NOT NULL,
    success INTEGER NOT NULL,
    found INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_query_log_timestamp ON query_log(timestamp);
"#;

/// What happened to one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Passages were returned
    Found,
    /// Handled, but nothing to return (blank question, no index)
    NoAnswer,
    /// The query failed
    Failed,
}

pub struct MetricsStore {
    conn: Connection,
}

impl MetricsStore {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, rusqlite::Error> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "auto_vacuum", "INCREMENTAL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn record(&self, latency_ms: u64, outcome: QueryOutcome) {
        let success = outcome != QueryOutcome::Failed;
        let found = outcome == QueryOutcome::Found;
        if let Err(e) = self.conn.execute(
            "INSERT INTO query_log (timestamp, latency_ms, success, found)
             VALUES (datetime('now'), ?1, ?2, ?3)",
            params![latency_ms as i64, success as i32, found as i32],
        ) {
            debug!(error = %e, "failed to record query metrics");
        }
    }

    pub fn get_summary(&self, retention_days: u32) -> MetricsSummary {
        let query = format!(
            r#"
            SELECT
                COUNT(*) as total_queries,
                COALESCE(AVG(latency_ms), 0) as avg_latency_ms,
                COALESCE(SUM(CASE WHEN success = 0 THEN 1 ELSE 0 END) * 100.0 / NULLIF(COUNT(*), 0), 0) as error_rate,
                COALESCE(SUM(CASE WHEN success = 1 AND found = 0 THEN 1 ELSE 0 END) * 100.0 / NULLIF(COUNT(*), 0), 0) as no_answer_rate
            FROM query_log
            WHERE timestamp >= datetime('now', '-{} days')
            "#,
            retention_days
        );

        self.conn
            .query_row(&query, [], |row| {
                Ok(MetricsSummary {
                    total_queries: row.get::<_, i64>(0)? as u64,
                    avg_latency_ms: row.get::<_, f64>(1)? as u64,
                    error_rate: row.get::<_, f64>(2)? as f32,
                    no_answer_rate: row.get::<_, f64>(3)? as f32,
                })
            })
            .unwrap_or_default()
    }

    pub fn cleanup(&self, retention_days: u32) {
        let query = format!(
            "DELETE FROM query_log WHERE timestamp < datetime('now', '-{} days')",
            retention_days
        );
        if let Err(e) = self.conn.execute(&query, []) {
            debug!(error = %e, "failed to prune query metrics");
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_queries: u64,
    pub avg_latency_ms: u64,
    /// Percentage of queries that failed
    pub error_rate: f32,
    /// Percentage of queries answered with no passages
    pub no_answer_rate: f32,
}
