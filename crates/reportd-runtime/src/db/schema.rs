//! Bootstrap schema application.
//!
//! A Postgres advisory lock ensures only one node applies the DDL at a time;
//! the statements themselves are idempotent (`IF NOT EXISTS`), so this is
//! safe to run on every startup.

use sqlx::PgPool;
use tracing::{debug, info};

use reportd_core::error::Result;

/// The embedded schema SQL.
const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

/// Advisory lock id for schema application ("REPORT" in hex).
const SCHEMA_LOCK_ID: i64 = 0x5245_504F_5254;

/// Apply the bootstrap schema, serialized across nodes.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    debug!("acquiring schema lock");
    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(SCHEMA_LOCK_ID)
        .execute(pool)
        .await?;

    let result = apply_statements(pool).await;

    if let Err(e) = sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(SCHEMA_LOCK_ID)
        .execute(pool)
        .await
    {
        tracing::warn!(error = %e, "failed to release schema lock");
    }

    result?;
    info!("schema ready");
    Ok(())
}

async fn apply_statements(pool: &PgPool) -> Result<()> {
    for statement in split_sql_statements(SCHEMA_SQL) {
        sqlx::query(&statement).execute(pool).await?;
    }
    Ok(())
}

/// Split SQL into individual statements, dropping empty and comment-only
/// chunks. The bootstrap DDL carries no dollar-quoted bodies, so splitting
/// on semicolons is sufficient.
fn split_sql_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(str::trim)
        .filter(|chunk| {
            chunk.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            })
        })
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_contains_all_tables() {
        assert!(SCHEMA_SQL.contains("CREATE TABLE IF NOT EXISTS reports"));
        assert!(SCHEMA_SQL.contains("CREATE TABLE IF NOT EXISTS report_artifacts"));
        assert!(SCHEMA_SQL.contains("CREATE TABLE IF NOT EXISTS report_executions"));
    }

    #[test]
    fn test_schema_enforces_uniqueness() {
        assert!(SCHEMA_SQL.contains("idempotency_key TEXT UNIQUE"));
        assert!(SCHEMA_SQL.contains("report_id UUID NOT NULL UNIQUE"));
    }

    #[test]
    fn test_schema_has_claim_index() {
        assert!(SCHEMA_SQL.contains("ON reports (state, locked_at)"));
    }

    #[test]
    fn test_split_drops_comments_and_blanks() {
        let sql = "-- a comment\n\nSELECT 1;\n-- trailing\n";
        let stmts = split_sql_statements(sql);
        assert_eq!(stmts.len(), 1);
        assert!(stmts[0].contains("SELECT 1"));
    }

    #[test]
    fn test_split_keeps_statement_order() {
        let sql = "CREATE TABLE a (id INT);\nCREATE TABLE b (id INT);";
        let stmts = split_sql_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains("TABLE a"));
        assert!(stmts[1].contains("TABLE b"));
    }

    #[test]
    fn test_embedded_schema_splits_cleanly() {
        let stmts = split_sql_statements(SCHEMA_SQL);
        assert!(stmts.len() >= 6);
        assert!(stmts.iter().all(|s| !s.trim().is_empty()));
    }
}
