use uuid::Uuid;

use reportd_core::error::Result;
use reportd_core::report::Execution;

use super::{map_execution, ReportStore};

impl ReportStore {
    /// Open an execution audit row for one attempt at a report.
    pub async fn create_execution(&self, report_id: Uuid, attempt: i32) -> Result<Execution> {
        let row = sqlx::query(
            r#"
            INSERT INTO report_executions (id, report_id, attempt)
            VALUES ($1, $2, $3)
            RETURNING id, report_id, attempt, started_at, finished_at, error
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(report_id)
        .bind(attempt)
        .fetch_one(&self.pool)
        .await?;

        Ok(map_execution(&row)?)
    }

    /// Close an execution, recording the error when the attempt failed.
    pub async fn close_execution(&self, id: Uuid, error: Option<&str>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE report_executions
            SET finished_at = NOW(), error = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
