//! Stage Service
//!
//! Stage listing, registration and deletion.

use std::collections::HashMap;

use sqlx::SqlitePool;
use stagehand_core::domain::stage::Stage;
use stagehand_core::dto::log::LogRecord;
use stagehand_core::dto::stage::SaveStage;

use crate::logs::LogStore;
use crate::repository::{stage_repository, step_repository};
use crate::service::{Result, StageError};

/// List stages with their steps, optionally only those of one pipeline file
pub async fn list_stages(pool: &SqlitePool, pipeline_file: Option<&str>) -> Result<Vec<Stage>> {
    let mut conn = pool.acquire().await?;

    let mut stages = stage_repository::list(&mut conn, pipeline_file).await?;
    let steps = step_repository::list(&mut conn, pipeline_file).await?;

    let mut by_stage: HashMap<i64, Vec<_>> = HashMap::new();
    for step in steps {
        by_stage.entry(step.stage_id).or_default().push(step);
    }
    for stage in &mut stages {
        stage.steps = by_stage.remove(&stage.id).unwrap_or_default();
    }

    Ok(stages)
}

/// Get one stage with its steps
pub async fn get_stage(pool: &SqlitePool, id: i64) -> Result<Stage> {
    let mut conn = pool.acquire().await?;

    let mut stage = stage_repository::find_by_id(&mut conn, id)
        .await?
        .ok_or(StageError::NotFound(id))?;
    stage.steps = step_repository::list_for_stage(&mut conn, id).await?;

    Ok(stage)
}

/// Create or update stages and their steps in one transaction.
/// Returns the stored stages, with ids, in request order.
pub async fn save_stages(pool: &SqlitePool, stages: Vec<SaveStage>) -> Result<Vec<Stage>> {
    for stage in &stages {
        validate_save_stage(stage)?;
    }

    let now = chrono::Utc::now();
    let mut tx = pool.begin().await?;
    let mut ids = Vec::with_capacity(stages.len());

    for stage in &stages {
        let stage_id = stage_repository::upsert(&mut tx, stage, now).await?;
        // The payload is the stage's full step list
        let names: Vec<&str> = stage.steps.iter().map(|s| s.name.as_str()).collect();
        let dropped = step_repository::delete_missing(&mut tx, stage_id, &names).await?;
        if dropped > 0 {
            tracing::debug!("Dropped {} stale step(s) of stage {}", dropped, stage.name);
        }
        for step in &stage.steps {
            step_repository::upsert(&mut tx, stage_id, step, now).await?;
        }
        tracing::debug!(
            "Saved stage {} of {} ({} steps)",
            stage.name,
            stage.pipeline_file,
            stage.steps.len()
        );
        ids.push(stage_id);
    }

    tx.commit().await?;

    let mut saved = Vec::with_capacity(ids.len());
    for id in ids {
        saved.push(get_stage(pool, id).await?);
    }

    tracing::info!("Saved {} stage(s)", saved.len());
    Ok(saved)
}

/// Delete one stage. The pipeline's log file goes once no stage references it.
pub async fn delete_stage(pool: &SqlitePool, logs: &LogStore, id: i64) -> Result<()> {
    let mut tx = pool.begin().await?;

    let stage = stage_repository::find_by_id(&mut tx, id)
        .await?
        .ok_or(StageError::NotFound(id))?;
    stage_repository::delete(&mut tx, id).await?;
    let remaining = stage_repository::count_by_pipeline_file(&mut tx, &stage.pipeline_file).await?;

    tx.commit().await?;

    if remaining == 0 {
        logs.remove_pipeline(&stage.pipeline_file).await?;
    }

    tracing::info!("Stage deleted: {} ({})", stage.name, id);
    Ok(())
}

/// Delete every stage of a pipeline file together with its log artifacts
pub async fn delete_pipeline(pool: &SqlitePool, logs: &LogStore, pipeline_file: &str) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let deleted = stage_repository::delete_by_pipeline_file(&mut tx, pipeline_file).await?;
    tx.commit().await?;

    logs.remove_pipeline(pipeline_file).await?;

    tracing::info!("Pipeline deleted: {} ({} stage(s))", pipeline_file, deleted);
    Ok(deleted)
}

/// Truncate both tables and clear the logs directory
pub async fn delete_all_stages(pool: &SqlitePool, logs: &LogStore) -> Result<()> {
    let mut tx = pool.begin().await?;
    step_repository::delete_all(&mut tx).await?;
    let deleted = stage_repository::delete_all(&mut tx).await?;
    tx.commit().await?;

    logs.clear().await?;

    tracing::info!("All stages deleted ({})", deleted);
    Ok(())
}

/// Log records of a stage's pipeline that belong to the stage's steps
pub async fn stage_logs(pool: &SqlitePool, logs: &LogStore, id: i64) -> Result<Vec<LogRecord>> {
    let stage = get_stage(pool, id).await?;
    let records = logs.read(&stage.pipeline_file).await?;

    Ok(records
        .into_iter()
        .filter(|r| stage.step(&r.step).is_some())
        .collect())
}

// =============================================================================
// Validation
// =============================================================================

fn validate_save_stage(stage: &SaveStage) -> Result<()> {
    if stage.name.trim().is_empty() {
        return Err(StageError::ValidationError(
            "Stage name cannot be empty".to_string(),
        ));
    }

    if stage.pipeline_file.trim().is_empty() {
        return Err(StageError::ValidationError(format!(
            "Stage {} has no pipeline file",
            stage.name
        )));
    }

    if let Some(step) = stage.steps.iter().find(|s| s.name.trim().is_empty()) {
        return Err(StageError::ValidationError(format!(
            "Stage {} has a step without a name (number {})",
            stage.name, step.number
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::{pool, save_stage};
    use stagehand_core::domain::status::Status;
    use stagehand_core::pipeline_id;

    #[tokio::test]
    async fn test_save_and_list_stages() {
        let pool = pool().await;

        let saved = save_stages(
            &pool,
            vec![
                save_stage("b.yml", "default", &["build"]),
                save_stage("a.yml", "release", &["clone", "build", "test"]),
            ],
        )
        .await
        .unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[1].steps.len(), 3);
        assert_eq!(saved[1].steps[2].name, "test");
        assert_eq!(saved[1].steps[2].number, 3);

        let all = list_stages(&pool, None).await.unwrap();
        let keys: Vec<_> = all
            .iter()
            .map(|s| (s.pipeline_file.as_str(), s.name.as_str()))
            .collect();
        assert_eq!(keys, vec![("a.yml", "release"), ("b.yml", "default")]);

        let filtered = list_stages(&pool, Some("b.yml")).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].steps[0].name, "build");
    }

    #[tokio::test]
    async fn test_upsert_mutates_existing_row() {
        let pool = pool().await;

        let first = save_stages(&pool, vec![save_stage("p", "default", &["build"])])
            .await
            .unwrap();

        let mut again = save_stage("p", "default", &["build", "test"]);
        again.status = Status::Running;
        again.steps[0].image = "rust:1".to_string();
        let second = save_stages(&pool, vec![again]).await.unwrap();

        assert_eq!(first[0].id, second[0].id);
        assert_eq!(second[0].status, Status::Running);
        assert_eq!(second[0].steps.len(), 2);
        assert_eq!(second[0].steps[0].id, first[0].steps[0].id);
        assert_eq!(second[0].steps[0].image, "rust:1");
        assert_eq!(list_stages(&pool, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reregistration_replaces_step_list() {
        let pool = pool().await;

        save_stages(&pool, vec![save_stage("p", "default", &["clone", "test"])])
            .await
            .unwrap();
        let mut full = save_stage("p", "default", &["clone", "build", "test", "deploy"]);
        full.steps[2].err_ignore = true;
        let saved = save_stages(&pool, vec![full]).await.unwrap();

        let steps: Vec<(&str, i64)> = saved[0]
            .steps
            .iter()
            .map(|s| (s.name.as_str(), s.number))
            .collect();
        assert_eq!(
            steps,
            vec![("clone", 1), ("build", 2), ("test", 3), ("deploy", 4)]
        );
        assert!(saved[0].step("test").unwrap().err_ignore);

        // A narrower run drops the rows it does not register
        let saved = save_stages(&pool, vec![save_stage("p", "default", &["clone", "deploy"])])
            .await
            .unwrap();
        let steps: Vec<(&str, i64)> = saved[0]
            .steps
            .iter()
            .map(|s| (s.name.as_str(), s.number))
            .collect();
        assert_eq!(steps, vec![("clone", 1), ("deploy", 2)]);
    }

    #[tokio::test]
    async fn test_save_rejects_empty_names() {
        let pool = pool().await;
        let result = save_stages(&pool, vec![save_stage("p", "", &[])]).await;
        assert!(matches!(result, Err(StageError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_get_missing_stage() {
        let pool = pool().await;
        assert!(matches!(
            get_stage(&pool, 42).await,
            Err(StageError::NotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_delete_stage_cascades_and_keeps_shared_logs() {
        let pool = pool().await;
        let dir = tempfile::tempdir().unwrap();
        let logs = LogStore::new(dir.path());
        let log_path = pipeline_id::log_file(dir.path(), "p");
        std::fs::write(&log_path, "").unwrap();

        let saved = save_stages(
            &pool,
            vec![
                save_stage("p", "default", &["build"]),
                save_stage("p", "release", &["deploy"]),
            ],
        )
        .await
        .unwrap();

        delete_stage(&pool, &logs, saved[0].id).await.unwrap();
        assert!(log_path.exists());
        let mut conn = pool.acquire().await.unwrap();
        let orphan = step_repository::list_for_stage(&mut conn, saved[0].id)
            .await
            .unwrap();
        assert!(orphan.is_empty());
        drop(conn);

        delete_stage(&pool, &logs, saved[1].id).await.unwrap();
        assert!(!log_path.exists());

        assert!(matches!(
            delete_stage(&pool, &logs, saved[1].id).await,
            Err(StageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_pipeline_and_delete_all() {
        let pool = pool().await;
        let dir = tempfile::tempdir().unwrap();
        let logs = LogStore::new(dir.path());
        std::fs::write(pipeline_id::log_file(dir.path(), "a"), "").unwrap();
        std::fs::write(pipeline_id::log_file(dir.path(), "b"), "").unwrap();

        save_stages(
            &pool,
            vec![
                save_stage("a", "default", &["build"]),
                save_stage("a", "release", &["build"]),
                save_stage("b", "default", &["build"]),
            ],
        )
        .await
        .unwrap();

        assert_eq!(delete_pipeline(&pool, &logs, "a").await.unwrap(), 2);
        assert!(!pipeline_id::log_file(dir.path(), "a").exists());
        assert_eq!(list_stages(&pool, None).await.unwrap().len(), 1);

        delete_all_stages(&pool, &logs).await.unwrap();
        assert!(list_stages(&pool, None).await.unwrap().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_stage_logs_only_include_own_steps() {
        let pool = pool().await;
        let dir = tempfile::tempdir().unwrap();
        let logs = LogStore::new(dir.path());
        std::fs::write(
            pipeline_id::log_file(dir.path(), "p"),
            "{\"step\":\"build\",\"line\":\"ok\"}\n{\"step\":\"deploy\",\"line\":\"other\"}\n",
        )
        .unwrap();

        let saved = save_stages(&pool, vec![save_stage("p", "default", &["build"])])
            .await
            .unwrap();

        let records = stage_logs(&pool, &logs, saved[0].id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].line, "ok");
    }
}
