use chrono::{DateTime, Utc};
use sqlx::Row;

use taskbot_core::domain::task::Task;
use taskbot_core::domain::{TaskId, UserId};

use super::{RepositoryError, TaskRepository};
use crate::DbPool;

pub struct SqlTaskRepository {
    pool: DbPool,
}

impl SqlTaskRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn require_latest(
    result: sqlx::sqlite::SqliteQueryResult,
    owner: UserId,
) -> Result<(), RepositoryError> {
    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound(format!("task owned by user {owner}")));
    }
    Ok(())
}

fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> Result<Task, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let owner: i64 = row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let complexity: Option<i32> =
        row.try_get("complexity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let deadline_str: Option<String> =
        row.try_get("deadline").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: Option<String> =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let deadline = deadline_str
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| RepositoryError::Decode(format!("task {id} deadline `{raw}`: {e}")))
        })
        .transpose()?;

    Ok(Task { id: TaskId(id), owner: UserId(owner), complexity, deadline, description })
}

#[async_trait::async_trait]
impl TaskRepository for SqlTaskRepository {
    async fn create_stub(&self, owner: UserId) -> Result<TaskId, RepositoryError> {
        let id = sqlx::query("INSERT INTO task (user_id, created_at) VALUES (?, ?)")
            .bind(owner.0)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        Ok(TaskId(id))
    }

    async fn set_complexity(&self, owner: UserId, complexity: i32) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE task SET complexity = ?
             WHERE id = (SELECT MAX(id) FROM task WHERE user_id = ?)",
        )
        .bind(complexity)
        .bind(owner.0)
        .execute(&self.pool)
        .await?;
        require_latest(result, owner)
    }

    async fn set_deadline(
        &self,
        owner: UserId,
        deadline: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE task SET deadline = ?
             WHERE id = (SELECT MAX(id) FROM task WHERE user_id = ?)",
        )
        .bind(deadline.to_rfc3339())
        .bind(owner.0)
        .execute(&self.pool)
        .await?;
        require_latest(result, owner)
    }

    async fn set_description(
        &self,
        owner: UserId,
        description: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE task SET description = ?
             WHERE id = (SELECT MAX(id) FROM task WHERE user_id = ?)",
        )
        .bind(description)
        .bind(owner.0)
        .execute(&self.pool)
        .await?;
        require_latest(result, owner)
    }

    async fn latest_for_user(&self, owner: UserId) -> Result<Option<Task>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, user_id, complexity, deadline, description
             FROM task WHERE user_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(owner.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_task).transpose()
    }

    async fn list_for_user(&self, owner: UserId) -> Result<Vec<Task>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, complexity, deadline, description
             FROM task WHERE user_id = ? ORDER BY id",
        )
        .bind(owner.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_task).collect()
    }

    async fn delete(&self, id: TaskId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM task WHERE id = ?").bind(id.0).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}
