use uuid::Uuid;

use reportd_core::error::{ReportdError, Result};
use reportd_core::report::{Artifact, ArtifactMeta};

use super::{map_artifact, map_artifact_meta, ReportStore};

impl ReportStore {
    /// Insert the artifact for a report. The unique constraint on
    /// `report_id` makes this the convergence point: a `UniqueViolation`
    /// tells the caller another worker already produced the output.
    pub async fn insert_artifact(
        &self,
        report_id: Uuid,
        content_type: &str,
        content: &[u8],
        checksum: &str,
    ) -> Result<Artifact> {
        let row = sqlx::query(
            r#"
            INSERT INTO report_artifacts (id, report_id, content_type, content, size_bytes, checksum)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, report_id, content_type, content, size_bytes, checksum, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(report_id)
        .bind(content_type)
        .bind(content)
        .bind(content.len() as i64)
        .bind(checksum)
        .fetch_one(&self.pool)
        .await
        .map_err(ReportdError::from_sqlx)?;

        Ok(map_artifact(&row)?)
    }

    pub async fn find_artifact(&self, report_id: Uuid) -> Result<Option<Artifact>> {
        let row = sqlx::query(
            r#"
            SELECT id, report_id, content_type, content, size_bytes, checksum, created_at
            FROM report_artifacts
            WHERE report_id = $1
            "#,
        )
        .bind(report_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(map_artifact).transpose()?)
    }

    /// Artifact metadata without the content bytes.
    pub async fn find_artifact_meta(&self, report_id: Uuid) -> Result<Option<ArtifactMeta>> {
        let row = sqlx::query(
            r#"
            SELECT id, content_type, size_bytes, checksum, created_at
            FROM report_artifacts
            WHERE report_id = $1
            "#,
        )
        .bind(report_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(map_artifact_meta).transpose()?)
    }

    /// Metadata for a page of reports in one round trip.
    pub async fn find_artifact_metas(
        &self,
        report_ids: &[Uuid],
    ) -> Result<Vec<(Uuid, ArtifactMeta)>> {
        if report_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT report_id, id, content_type, size_bytes, checksum, created_at
            FROM report_artifacts
            WHERE report_id = ANY($1)
            "#,
        )
        .bind(report_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut metas = Vec::with_capacity(rows.len());
        for row in &rows {
            use sqlx::Row;
            let report_id: Uuid = row.try_get("report_id")?;
            metas.push((report_id, map_artifact_meta(row)?));
        }
        Ok(metas)
    }
}
