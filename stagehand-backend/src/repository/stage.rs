//! Stage Repository
//!
//! Handles all database operations on the `stages` table.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use stagehand_core::domain::stage::Stage;
use stagehand_core::domain::status::Status;
use stagehand_core::dto::stage::SaveStage;

/// Insert a stage or update the one with the same `(name, pipeline_file)`.
/// Returns the stage id.
pub async fn upsert(
    conn: &mut SqliteConnection,
    stage: &SaveStage,
    now: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO stages (name, pipeline_file, pipeline_path, status, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT (name, pipeline_file) DO UPDATE SET
            name = excluded.name,
            pipeline_file = excluded.pipeline_file,
            pipeline_path = excluded.pipeline_path,
            status = excluded.status,
            updated_at = excluded.updated_at
        RETURNING id
        "#,
    )
    .bind(&stage.name)
    .bind(&stage.pipeline_file)
    .bind(&stage.pipeline_path)
    .bind(stage.status.as_str())
    .bind(now)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

/// Find a stage by ID, without its steps
pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Option<Stage>, sqlx::Error> {
    let row = sqlx::query_as::<_, StageRow>(
        r#"
        SELECT id, name, pipeline_file, pipeline_path, status, updated_at
        FROM stages
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// List stages, optionally only those of one pipeline file, without their steps
pub async fn list(
    conn: &mut SqliteConnection,
    pipeline_file: Option<&str>,
) -> Result<Vec<Stage>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StageRow>(
        r#"
        SELECT id, name, pipeline_file, pipeline_path, status, updated_at
        FROM stages
        WHERE ?1 IS NULL OR pipeline_file = ?1
        ORDER BY pipeline_file, name
        "#,
    )
    .bind(pipeline_file)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Set the status of the stage identified by `(pipeline_file, name)`.
/// Returns the number of rows touched, zero when no such stage exists.
pub async fn update_status(
    conn: &mut SqliteConnection,
    pipeline_file: &str,
    name: &str,
    status: Status,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE stages
        SET status = ?1, updated_at = ?2
        WHERE pipeline_file = ?3 AND name = ?4
        "#,
    )
    .bind(status.as_str())
    .bind(now)
    .bind(pipeline_file)
    .bind(name)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Delete a stage by ID. Steps go with it through the foreign key cascade.
pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM stages WHERE id = ?1")
        .bind(id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete every stage of a pipeline file
pub async fn delete_by_pipeline_file(
    conn: &mut SqliteConnection,
    pipeline_file: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM stages WHERE pipeline_file = ?1")
        .bind(pipeline_file)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}

/// Delete every stage
pub async fn delete_all(conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM stages").execute(conn).await?;
    Ok(result.rows_affected())
}

/// Count the stages that still reference a pipeline file
pub async fn count_by_pipeline_file(
    conn: &mut SqliteConnection,
    pipeline_file: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM stages WHERE pipeline_file = ?1")
        .bind(pipeline_file)
        .fetch_one(conn)
        .await
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct StageRow {
    id: i64,
    name: String,
    pipeline_file: String,
    pipeline_path: String,
    status: String,
    updated_at: DateTime<Utc>,
}

impl From<StageRow> for Stage {
    fn from(row: StageRow) -> Self {
        Stage {
            id: row.id,
            name: row.name,
            pipeline_file: row.pipeline_file,
            pipeline_path: row.pipeline_path,
            status: Status::parse(&row.status),
            updated_at: row.updated_at,
            steps: Vec::new(),
        }
    }
}
