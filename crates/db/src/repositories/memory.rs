use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use taskbot_core::domain::task::Task;
use taskbot_core::domain::team::{Team, TeamMember};
use taskbot_core::domain::user::User;
use taskbot_core::domain::{TaskId, TeamId, UserId};

use super::{RepositoryError, TaskRepository, TeamRepository, UserRepository};

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserRepository {
    pub async fn get(&self, id: UserId) -> Option<User> {
        self.users.read().await.get(&id).cloned()
    }
}

#[async_trait::async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn registered_login(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.get(&id).map(|user| user.login.clone()))
    }

    async fn login_taken(&self, login: &str) -> Result<bool, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.values().any(|user| user.login == login))
    }

    async fn create(&self, user: User) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) || users.values().any(|u| u.login == user.login) {
            return Err(RepositoryError::Conflict(format!(
                "user {} or login `{}`",
                user.id, user.login
            )));
        }
        users.insert(user.id, user);
        Ok(())
    }
}

#[derive(Default)]
struct TeamState {
    names: BTreeMap<TeamId, String>,
    // member -> (team, join order)
    memberships: HashMap<UserId, (TeamId, u64)>,
    next_team_id: i64,
    next_join_seq: u64,
}

/// Membership rows reference registered users, so this repository reads
/// logins from the user repository it was built with.
pub struct InMemoryTeamRepository {
    users: Arc<InMemoryUserRepository>,
    state: RwLock<TeamState>,
}

impl InMemoryTeamRepository {
    pub fn new(users: Arc<InMemoryUserRepository>) -> Self {
        Self { users, state: RwLock::new(TeamState::default()) }
    }

    async fn ensure_registered(&self, user_id: UserId) -> Result<(), RepositoryError> {
        match self.users.get(user_id).await {
            Some(_) => Ok(()),
            None => Err(RepositoryError::NotFound(format!("user {user_id}"))),
        }
    }
}

#[async_trait::async_trait]
impl TeamRepository for InMemoryTeamRepository {
    async fn team_of(&self, user_id: UserId) -> Result<Option<TeamId>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.memberships.get(&user_id).map(|(team_id, _)| *team_id))
    }

    async fn create_with_creator(
        &self,
        creator: UserId,
        name: &str,
    ) -> Result<TeamId, RepositoryError> {
        self.ensure_registered(creator).await?;

        let mut state = self.state.write().await;
        if state.memberships.contains_key(&creator) {
            return Err(RepositoryError::Conflict(format!(
                "user {creator} already belongs to a team"
            )));
        }

        state.next_team_id += 1;
        state.next_join_seq += 1;
        let team_id = TeamId(state.next_team_id);
        let seq = state.next_join_seq;
        state.names.insert(team_id, name.to_owned());
        state.memberships.insert(creator, (team_id, seq));
        Ok(team_id)
    }

    async fn find(&self, id: TeamId) -> Result<Option<Team>, RepositoryError> {
        let (name, mut member_ids) = {
            let state = self.state.read().await;
            let Some(name) = state.names.get(&id).cloned() else {
                return Ok(None);
            };
            let member_ids: Vec<(u64, UserId)> = state
                .memberships
                .iter()
                .filter(|(_, (team_id, _))| *team_id == id)
                .map(|(user_id, (_, seq))| (*seq, *user_id))
                .collect();
            (name, member_ids)
        };
        member_ids.sort();

        let mut members = Vec::with_capacity(member_ids.len());
        for (_, user_id) in member_ids {
            if let Some(user) = self.users.get(user_id).await {
                members.push(TeamMember { user_id, login: user.login });
            }
        }

        Ok(Some(Team { id, name, members }))
    }

    async fn add_member(
        &self,
        team_id: TeamId,
        user_id: UserId,
    ) -> Result<String, RepositoryError> {
        self.ensure_registered(user_id).await?;

        let mut state = self.state.write().await;
        let name = state
            .names
            .get(&team_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("team {team_id}")))?;
        if state.memberships.contains_key(&user_id) {
            return Err(RepositoryError::Conflict(format!(
                "user {user_id} already belongs to a team"
            )));
        }

        state.next_join_seq += 1;
        let seq = state.next_join_seq;
        state.memberships.insert(user_id, (team_id, seq));
        Ok(name)
    }

    async fn remove_member(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        Ok(state.memberships.remove(&user_id).is_some())
    }
}

#[derive(Default)]
struct TaskState {
    tasks: BTreeMap<TaskId, Task>,
    next_id: i64,
}

#[derive(Default)]
pub struct InMemoryTaskRepository {
    state: RwLock<TaskState>,
}

impl InMemoryTaskRepository {
    async fn update_latest(
        &self,
        owner: UserId,
        apply: impl FnOnce(&mut Task) + Send,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let task = state
            .tasks
            .values_mut()
            .rev()
            .find(|task| task.owner == owner)
            .ok_or_else(|| RepositoryError::NotFound(format!("task owned by user {owner}")))?;
        apply(task);
        Ok(())
    }
}

#[async_trait::async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn create_stub(&self, owner: UserId) -> Result<TaskId, RepositoryError> {
        let mut state = self.state.write().await;
        state.next_id += 1;
        let id = TaskId(state.next_id);
        state.tasks.insert(id, Task::stub(id, owner));
        Ok(id)
    }

    async fn set_complexity(&self, owner: UserId, complexity: i32) -> Result<(), RepositoryError> {
        self.update_latest(owner, |task| task.complexity = Some(complexity)).await
    }

    async fn set_deadline(
        &self,
        owner: UserId,
        deadline: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.update_latest(owner, |task| task.deadline = Some(deadline)).await
    }

    async fn set_description(
        &self,
        owner: UserId,
        description: &str,
    ) -> Result<(), RepositoryError> {
        let description = description.to_owned();
        self.update_latest(owner, move |task| task.description = Some(description)).await
    }

    async fn latest_for_user(&self, owner: UserId) -> Result<Option<Task>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.tasks.values().rev().find(|task| task.owner == owner).cloned())
    }

    async fn list_for_user(&self, owner: UserId) -> Result<Vec<Task>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.tasks.values().filter(|task| task.owner == owner).cloned().collect())
    }

    async fn delete(&self, id: TaskId) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        Ok(state.tasks.remove(&id).is_some())
    }
}
