use chrono::Utc;
use sqlx::Row;

use taskbot_core::domain::team::{Team, TeamMember};
use taskbot_core::domain::{TeamId, UserId};

use super::{RepositoryError, TeamRepository};
use crate::DbPool;

pub struct SqlTeamRepository {
    pool: DbPool,
}

impl SqlTeamRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_err(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

fn membership_conflict(error: sqlx::Error, user_id: UserId) -> RepositoryError {
    match error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(format!("user {user_id} already belongs to a team"))
        }
        other => other.into(),
    }
}

#[async_trait::async_trait]
impl TeamRepository for SqlTeamRepository {
    async fn team_of(&self, user_id: UserId) -> Result<Option<TeamId>, RepositoryError> {
        let team_id: Option<i64> =
            sqlx::query_scalar("SELECT team_id FROM user_team WHERE user_id = ?")
                .bind(user_id.0)
                .fetch_optional(&self.pool)
                .await?;
        Ok(team_id.map(TeamId))
    }

    async fn create_with_creator(
        &self,
        creator: UserId,
        name: &str,
    ) -> Result<TeamId, RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let team_id = sqlx::query("INSERT INTO team (name, created_at) VALUES (?, ?)")
            .bind(name)
            .bind(&now)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        sqlx::query("INSERT INTO user_team (user_id, team_id, joined_at) VALUES (?, ?, ?)")
            .bind(creator.0)
            .bind(team_id)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|error| membership_conflict(error, creator))?;

        tx.commit().await?;
        Ok(TeamId(team_id))
    }

    async fn find(&self, id: TeamId) -> Result<Option<Team>, RepositoryError> {
        let name: Option<String> = sqlx::query_scalar("SELECT name FROM team WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        let Some(name) = name else {
            return Ok(None);
        };

        let rows = sqlx::query(
            "SELECT ut.user_id, u.login
             FROM user_team ut
             JOIN user u ON u.id = ut.user_id
             WHERE ut.team_id = ?
             ORDER BY ut.joined_at, ut.user_id",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        let members = rows
            .iter()
            .map(|row| {
                Ok(TeamMember {
                    user_id: UserId(row.try_get("user_id").map_err(decode_err)?),
                    login: row.try_get("login").map_err(decode_err)?,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(Some(Team { id, name, members }))
    }

    async fn add_member(
        &self,
        team_id: TeamId,
        user_id: UserId,
    ) -> Result<String, RepositoryError> {
        let name: Option<String> = sqlx::query_scalar("SELECT name FROM team WHERE id = ?")
            .bind(team_id.0)
            .fetch_optional(&self.pool)
            .await?;
        let name = name.ok_or_else(|| RepositoryError::NotFound(format!("team {team_id}")))?;

        sqlx::query("INSERT INTO user_team (user_id, team_id, joined_at) VALUES (?, ?, ?)")
            .bind(user_id.0)
            .bind(team_id.0)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|error| membership_conflict(error, user_id))?;

        Ok(name)
    }

    async fn remove_member(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM user_team WHERE user_id = ?")
            .bind(user_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use taskbot_core::domain::user::User;
    use taskbot_core::domain::{TeamId, UserId};

    use super::SqlTeamRepository;
    use crate::migrations::run_pending;
    use crate::repositories::{RepositoryError, SqlUserRepository, TeamRepository, UserRepository};
    use crate::{connect_with_settings, DbPool};

    async fn setup(users: &[(i64, &str)]) -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrations");
        let users_repo = SqlUserRepository::new(pool.clone());
        for (id, login) in users {
            users_repo
                .create(User {
                    id: UserId(*id),
                    login: (*login).to_owned(),
                    password_hash: "hash".to_owned(),
                    display_name: (*login).to_owned(),
                    handle: None,
                })
                .await
                .expect("seed user");
        }
        pool
    }

    #[tokio::test]
    async fn create_with_creator_adds_first_member() {
        let repo = SqlTeamRepository::new(setup(&[(1, "ada")]).await);

        let team_id = repo.create_with_creator(UserId(1), "core").await.expect("create team");
        assert_eq!(repo.team_of(UserId(1)).await.expect("team_of"), Some(team_id));

        let team = repo.find(team_id).await.expect("find").expect("team exists");
        assert_eq!(team.name, "core");
        assert_eq!(team.members.len(), 1);
        assert_eq!(team.members[0].login, "ada");
    }

    #[tokio::test]
    async fn failed_membership_rolls_back_team_row() {
        let repo = SqlTeamRepository::new(setup(&[(1, "ada")]).await);
        repo.create_with_creator(UserId(1), "first").await.expect("first team");

        let error =
            repo.create_with_creator(UserId(1), "second").await.expect_err("already a member");
        assert!(matches!(error, RepositoryError::Conflict(_)));
        assert!(repo.find(TeamId(2)).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn add_and_remove_members() {
        let repo = SqlTeamRepository::new(setup(&[(1, "ada"), (2, "grace")]).await);
        let team_id = repo.create_with_creator(UserId(1), "core").await.expect("create team");

        let name = repo.add_member(team_id, UserId(2)).await.expect("add member");
        assert_eq!(name, "core");
        let team = repo.find(team_id).await.expect("find").expect("team exists");
        assert!(team.has_member(UserId(2)));

        assert!(repo.remove_member(UserId(2)).await.expect("remove"));
        assert!(!repo.remove_member(UserId(2)).await.expect("remove again"));
        assert_eq!(repo.team_of(UserId(2)).await.expect("team_of"), None);
    }

    #[tokio::test]
    async fn add_member_to_missing_team_is_not_found() {
        let repo = SqlTeamRepository::new(setup(&[(1, "ada")]).await);
        let error = repo.add_member(TeamId(99), UserId(1)).await.expect_err("no such team");
        assert!(matches!(error, RepositoryError::NotFound(_)));
    }
}
