//! Workflow Repository
//!
//! Handles all database operations related to saved workflows.

use anyhow::Context;
use async_trait::async_trait;
use keel_core::domain::workflow::Workflow;
use sqlx::PgPool;

use crate::collaborator::WorkflowStore;

/// Insert a workflow, or replace the saved definition with the same name
pub async fn upsert(pool: &PgPool, workflow: &Workflow) -> Result<(), sqlx::Error> {
    let now = chrono::Utc::now();
    let definition =
        serde_json::to_value(workflow).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

    sqlx::query(
        r#"
        INSERT INTO workflows (name, display_name, definition, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $4)
        ON CONFLICT (name) DO UPDATE
        SET display_name = EXCLUDED.display_name,
            definition = EXCLUDED.definition,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(&workflow.name)
    .bind(&workflow.display_name)
    .bind(definition)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

/// Find a saved workflow by name
pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Workflow>, sqlx::Error> {
    let row = sqlx::query_as::<_, WorkflowRow>(
        r#"
        SELECT name, definition, updated_at
        FROM workflows
        WHERE name = $1
        "#,
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    row.map(Workflow::try_from).transpose()
}

/// Postgres-backed [`WorkflowStore`]
#[derive(Clone)]
pub struct PgWorkflowStore {
    pool: PgPool,
}

impl PgWorkflowStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    async fn find_saved_workflow(&self, name: &str) -> anyhow::Result<Option<Workflow>> {
        find_by_name(&self.pool, name)
            .await
            .with_context(|| format!("Failed to load workflow {}", name))
    }

    async fn save_workflow(&self, workflow: &Workflow) -> anyhow::Result<()> {
        upsert(&self.pool, workflow)
            .await
            .with_context(|| format!("Failed to save workflow {}", workflow.name))
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct WorkflowRow {
    name: String,
    definition: serde_json::Value,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<WorkflowRow> for Workflow {
    type Error = sqlx::Error;

    fn try_from(row: WorkflowRow) -> Result<Self, Self::Error> {
        let mut workflow: Workflow = serde_json::from_value(row.definition)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        tracing::debug!("Loaded workflow {} (updated {})", row.name, row.updated_at);
        workflow.name = row.name;
        Ok(workflow)
    }
}
