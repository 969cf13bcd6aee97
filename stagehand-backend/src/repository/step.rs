//! Step Repository
//!
//! Handles all database operations on the `stage_steps` table.
//! Steps are addressed by their stage's `(pipeline_file, name)` key so the
//! runner never needs to know numeric ids.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use stagehand_core::domain::stage::Step;
use stagehand_core::domain::status::Status;
use stagehand_core::dto::stage::SaveStep;

/// Insert a step or update the one with the same `(name, stage_id)`.
///
/// Every column but the id is overwritten on conflict, so the stored number
/// always matches the latest registration.
pub async fn upsert(
    conn: &mut SqliteConnection,
    stage_id: i64,
    step: &SaveStep,
    now: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO stage_steps (stage_id, name, number, image, status, err_ignore, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT (name, stage_id) DO UPDATE SET
            name = excluded.name,
            number = excluded.number,
            status = excluded.status,
            image = excluded.image,
            err_ignore = excluded.err_ignore,
            updated_at = excluded.updated_at
        RETURNING id
        "#,
    )
    .bind(stage_id)
    .bind(&step.name)
    .bind(step.number)
    .bind(&step.image)
    .bind(step.status.as_str())
    .bind(step.err_ignore)
    .bind(now)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

/// List the steps of one stage in execution order
pub async fn list_for_stage(
    conn: &mut SqliteConnection,
    stage_id: i64,
) -> Result<Vec<Step>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StepRow>(
        r#"
        SELECT id, stage_id, name, number, image, status, err_ignore, updated_at
        FROM stage_steps
        WHERE stage_id = ?1
        ORDER BY number, id
        "#,
    )
    .bind(stage_id)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// List the steps of every stage, optionally restricted to one pipeline file
pub async fn list(
    conn: &mut SqliteConnection,
    pipeline_file: Option<&str>,
) -> Result<Vec<Step>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StepRow>(
        r#"
        SELECT st.id, st.stage_id, st.name, st.number, st.image, st.status,
               st.err_ignore, st.updated_at
        FROM stage_steps st
        JOIN stages s ON s.id = st.stage_id
        WHERE ?1 IS NULL OR s.pipeline_file = ?1
        ORDER BY st.stage_id, st.number, st.id
        "#,
    )
    .bind(pipeline_file)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Set the status of one step of the stage `(pipeline_file, stage_name)`.
/// Returns the number of rows touched.
pub async fn update_status(
    conn: &mut SqliteConnection,
    pipeline_file: &str,
    stage_name: &str,
    step_name: &str,
    status: Status,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE stage_steps
        SET status = ?1, updated_at = ?2
        WHERE name = ?3
          AND stage_id IN (SELECT id FROM stages WHERE pipeline_file = ?4 AND name = ?5)
        "#,
    )
    .bind(status.as_str())
    .bind(now)
    .bind(step_name)
    .bind(pipeline_file)
    .bind(stage_name)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Put every step of the stage `(pipeline_file, stage_name)` back to `none`
pub async fn reset_for_stage(
    conn: &mut SqliteConnection,
    pipeline_file: &str,
    stage_name: &str,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE stage_steps
        SET status = ?1, updated_at = ?2
        WHERE stage_id IN (SELECT id FROM stages WHERE pipeline_file = ?3 AND name = ?4)
        "#,
    )
    .bind(Status::None.as_str())
    .bind(now)
    .bind(pipeline_file)
    .bind(stage_name)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Delete the steps of a stage whose names are not in `keep`
pub async fn delete_missing(
    conn: &mut SqliteConnection,
    stage_id: i64,
    keep: &[&str],
) -> Result<u64, sqlx::Error> {
    let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM stage_steps WHERE stage_id = ");
    query.push_bind(stage_id);
    if !keep.is_empty() {
        query.push(" AND name NOT IN (");
        let mut names = query.separated(", ");
        for name in keep {
            names.push_bind(*name);
        }
        names.push_unseparated(")");
    }

    let result = query.build().execute(conn).await?;
    Ok(result.rows_affected())
}

/// Delete every step
pub async fn delete_all(conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM stage_steps").execute(conn).await?;
    Ok(result.rows_affected())
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct StepRow {
    id: i64,
    stage_id: i64,
    name: String,
    number: i64,
    image: String,
    status: String,
    err_ignore: bool,
    updated_at: DateTime<Utc>,
}

impl From<StepRow> for Step {
    fn from(row: StepRow) -> Self {
        Step {
            id: row.id,
            stage_id: row.stage_id,
            name: row.name,
            number: row.number,
            image: row.image,
            status: Status::parse(&row.status),
            err_ignore: row.err_ignore,
            updated_at: row.updated_at,
        }
    }
}
