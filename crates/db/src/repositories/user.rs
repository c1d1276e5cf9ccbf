use chrono::Utc;
use sqlx::Row;

use taskbot_core::domain::user::User;
use taskbot_core::domain::UserId;

use super::{RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn registered_login(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let row = sqlx::query("SELECT login FROM user WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row.try_get::<String, _>("login"))
            .transpose()
            .map_err(|e| RepositoryError::Decode(e.to_string()))
    }

    async fn login_taken(&self, login: &str) -> Result<bool, RepositoryError> {
        let taken: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM user WHERE login = ?)")
            .bind(login)
            .fetch_one(&self.pool)
            .await?;
        Ok(taken != 0)
    }

    async fn create(&self, user: User) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO user (id, login, password_hash, display_name, handle, registered_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user.id.0)
        .bind(&user.login)
        .bind(&user.password_hash)
        .bind(&user.display_name)
        .bind(&user.handle)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                RepositoryError::Conflict(format!("user {} or login `{}`", user.id, user.login)),
            ),
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use taskbot_core::domain::user::User;
    use taskbot_core::domain::UserId;

    use super::SqlUserRepository;
    use crate::migrations::run_pending;
    use crate::repositories::{RepositoryError, UserRepository};
    use crate::{connect_with_settings, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrations");
        pool
    }

    fn user(id: i64, login: &str) -> User {
        User {
            id: UserId(id),
            login: login.to_owned(),
            password_hash: "$argon2id$v=19$stub".to_owned(),
            display_name: "Ada".to_owned(),
            handle: Some("ada".to_owned()),
        }
    }

    #[tokio::test]
    async fn unregistered_user_has_no_login() {
        let repo = SqlUserRepository::new(setup().await);
        assert_eq!(repo.registered_login(UserId(1)).await.expect("lookup"), None);
        assert!(!repo.login_taken("ada").await.expect("lookup"));
    }

    #[tokio::test]
    async fn created_user_is_registered_and_login_is_taken() {
        let repo = SqlUserRepository::new(setup().await);
        repo.create(user(1, "ada")).await.expect("create");

        assert_eq!(repo.registered_login(UserId(1)).await.expect("lookup").as_deref(), Some("ada"));
        assert!(repo.login_taken("ada").await.expect("lookup"));
        assert!(!repo.login_taken("grace").await.expect("lookup"));
    }

    #[tokio::test]
    async fn duplicate_login_is_a_conflict() {
        let repo = SqlUserRepository::new(setup().await);
        repo.create(user(1, "ada")).await.expect("create");

        let error = repo.create(user(2, "ada")).await.expect_err("duplicate login");
        assert!(matches!(error, RepositoryError::Conflict(_)));
    }
}
