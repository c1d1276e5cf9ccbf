use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use taskbot_core::domain::task::Task;
use taskbot_core::domain::team::Team;
use taskbot_core::domain::user::User;
use taskbot_core::domain::{TaskId, TeamId, UserId};

pub mod memory;
pub mod task;
pub mod team;
pub mod user;

pub use memory::{InMemoryTaskRepository, InMemoryTeamRepository, InMemoryUserRepository};
pub use task::SqlTaskRepository;
pub use team::SqlTeamRepository;
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Login of the registered user, `None` when `id` never completed sign-up.
    async fn registered_login(&self, id: UserId) -> Result<Option<String>, RepositoryError>;
    async fn login_taken(&self, login: &str) -> Result<bool, RepositoryError>;
    async fn create(&self, user: User) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait TeamRepository: Send + Sync {
    async fn team_of(&self, user_id: UserId) -> Result<Option<TeamId>, RepositoryError>;

    /// Creates the team row and the creator's membership atomically.
    async fn create_with_creator(
        &self,
        creator: UserId,
        name: &str,
    ) -> Result<TeamId, RepositoryError>;

    async fn find(&self, id: TeamId) -> Result<Option<Team>, RepositoryError>;

    /// Returns the team name so the caller can greet the new member.
    async fn add_member(&self, team_id: TeamId, user_id: UserId)
        -> Result<String, RepositoryError>;

    async fn remove_member(&self, user_id: UserId) -> Result<bool, RepositoryError>;
}

/// Task rows are created as owner-only stubs and completed field by field.
/// The `set_*` operations address the owner's most recently created task.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create_stub(&self, owner: UserId) -> Result<TaskId, RepositoryError>;
    async fn set_complexity(&self, owner: UserId, complexity: i32) -> Result<(), RepositoryError>;
    async fn set_deadline(
        &self,
        owner: UserId,
        deadline: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
    async fn set_description(&self, owner: UserId, description: &str)
        -> Result<(), RepositoryError>;
    async fn latest_for_user(&self, owner: UserId) -> Result<Option<Task>, RepositoryError>;
    async fn list_for_user(&self, owner: UserId) -> Result<Vec<Task>, RepositoryError>;
    async fn delete(&self, id: TaskId) -> Result<bool, RepositoryError>;
}
