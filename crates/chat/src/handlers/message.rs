use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use taskbot_core::commands::CommandKey;
use taskbot_core::credentials::hash_password;
use taskbot_core::domain::task::{parse_complexity, parse_deadline};
use taskbot_core::domain::{TaskId, User, UserId};
use taskbot_core::flows::DialogEvent;
use taskbot_db::repositories::RepositoryError;

use super::{member_listing, text_input, BotService};
use crate::events::Situation;
use crate::registry::{bind, HandlerError, MessageRegistry};

pub fn message_registry(service: &Arc<BotService>) -> MessageRegistry {
    MessageRegistry::from_entries([
        (CommandKey::Start, bind(service, BotService::start)),
        (CommandKey::SignUp, bind(service, BotService::sign_up)),
        (CommandKey::Login, bind(service, BotService::login)),
        (CommandKey::Password, bind(service, BotService::password)),
        (CommandKey::Unrecognized, bind(service, BotService::unrecognized)),
        (CommandKey::Team, bind(service, BotService::team)),
        (CommandKey::CreateTeam, bind(service, BotService::create_team)),
        (CommandKey::TeamName, bind(service, BotService::team_name)),
        (CommandKey::YourTeam, bind(service, BotService::your_team)),
        (CommandKey::AddUser, bind(service, BotService::add_user)),
        (CommandKey::JoinTeam, bind(service, BotService::join_team)),
        (CommandKey::DeleteUser, bind(service, BotService::delete_user)),
        (CommandKey::UserDeleted, bind(service, BotService::user_deleted)),
        (CommandKey::ExitTeam, bind(service, BotService::exit_team)),
        (CommandKey::CreateTask, bind(service, BotService::create_task)),
        (CommandKey::TaskAssignee, bind(service, BotService::task_assignee)),
        (CommandKey::TaskComplexity, bind(service, BotService::task_complexity)),
        (CommandKey::TaskDeadline, bind(service, BotService::task_deadline)),
        (CommandKey::TaskDescription, bind(service, BotService::task_description)),
        (CommandKey::CheckTasks, bind(service, BotService::check_tasks)),
        (CommandKey::TaskDelete, bind(service, BotService::task_delete)),
        (CommandKey::TaskDeleted, bind(service, BotService::task_deleted)),
    ])
}

impl BotService {
    pub async fn start(self: Arc<Self>, situation: Situation) -> Result<(), HandlerError> {
        let user_id = situation.user_id;
        self.sessions.advance(user_id, DialogEvent::MenuOpened).await?;

        if self.users.registered_login(user_id).await?.is_none() {
            return self.say(user_id, "not_registered").await;
        }

        self.send_with(user_id, self.labels.text("choose"), self.main_menu()).await
    }

    pub async fn sign_up(self: Arc<Self>, situation: Situation) -> Result<(), HandlerError> {
        let user_id = situation.user_id;
        if self.users.registered_login(user_id).await?.is_some() {
            return self.say(user_id, "already_registered").await;
        }

        self.sessions.advance(user_id, DialogEvent::SignUpStarted).await?;
        self.say(user_id, "send_login").await
    }

    pub async fn login(self: Arc<Self>, situation: Situation) -> Result<(), HandlerError> {
        let user_id = situation.user_id;
        let login = text_input(&situation)?;
        if login.is_empty() {
            return self.say(user_id, "send_login").await;
        }

        if self.users.login_taken(login).await? {
            return self.say(user_id, "login_exists").await;
        }

        self.sessions.advance(user_id, DialogEvent::LoginAccepted).await?;
        self.sessions.set_pending_login(user_id, login).await?;
        self.say(user_id, "send_password").await
    }

    /// Completes sign-up. The cursor is left on the password step; the next
    /// `/start` moves the user back to the menu.
    pub async fn password(self: Arc<Self>, situation: Situation) -> Result<(), HandlerError> {
        let user_id = situation.user_id;
        let password = text_input(&situation)?;

        if self.users.registered_login(user_id).await?.is_some() {
            return self.say(user_id, "already_registered").await;
        }

        let Some(login) = self.sessions.pending_login(user_id).await? else {
            return self.say(user_id, "some_wrong").await;
        };

        let user = User {
            id: user_id,
            login,
            password_hash: hash_password(password)?,
            display_name: situation.sender.display_name.clone(),
            handle: situation.sender.handle.clone(),
        };

        match self.users.create(user).await {
            Ok(()) => {}
            Err(RepositoryError::Conflict(_)) => return self.say(user_id, "login_exists").await,
            Err(error) => return Err(error.into()),
        }

        info!(event_name = "registration.completed", user_id = %user_id, "user registered");
        self.say(user_id, "registration_successful").await
    }

    pub async fn unrecognized(self: Arc<Self>, situation: Situation) -> Result<(), HandlerError> {
        self.say(situation.user_id, "unrecognized").await
    }

    pub async fn team(self: Arc<Self>, situation: Situation) -> Result<(), HandlerError> {
        self.send_with(situation.user_id, self.labels.text("choose"), self.team_menu()).await
    }

    pub async fn create_team(self: Arc<Self>, situation: Situation) -> Result<(), HandlerError> {
        let user_id = situation.user_id;
        if self.users.registered_login(user_id).await?.is_none() {
            return self.say(user_id, "not_registered").await;
        }

        if self.teams.team_of(user_id).await?.is_some() {
            return self.say(user_id, "team_exists").await;
        }

        self.sessions.advance(user_id, DialogEvent::TeamCreationStarted).await?;
        self.say(user_id, "team_name").await
    }

    pub async fn team_name(self: Arc<Self>, situation: Situation) -> Result<(), HandlerError> {
        let user_id = situation.user_id;
        let name = text_input(&situation)?.trim();
        if name.is_empty() {
            return self.say(user_id, "team_name").await;
        }

        if self.teams.team_of(user_id).await?.is_some() {
            self.sessions.advance(user_id, DialogEvent::MenuOpened).await?;
            return self.say(user_id, "team_exists").await;
        }

        self.sessions.advance(user_id, DialogEvent::TeamNamed).await?;
        let team_id = self.teams.create_with_creator(user_id, name).await?;
        info!(event_name = "team.created", user_id = %user_id, team_id = %team_id, "team created");
        self.say(user_id, "team_created_successfully").await
    }

    pub async fn your_team(self: Arc<Self>, situation: Situation) -> Result<(), HandlerError> {
        let user_id = situation.user_id;
        self.sessions.advance(user_id, DialogEvent::MenuOpened).await?;

        let Some(team) = self.require_team(user_id).await? else {
            return Ok(());
        };

        let listing = member_listing(&team, false);
        let text = self.labels.render("team_info", &[&team.name, &listing]);
        self.send_with(user_id, text, self.team_keyboard()).await
    }

    pub async fn add_user(self: Arc<Self>, situation: Situation) -> Result<(), HandlerError> {
        let user_id = situation.user_id;
        let Some(team_id) = self.teams.team_of(user_id).await? else {
            return self.say(user_id, "team_need_create").await;
        };

        let link = self.invite_link(team_id);
        self.send(user_id, self.labels.render("send_link", &[&link])).await
    }

    /// Entered through an invite deep link; the team id was decoded by the
    /// normalizer.
    pub async fn join_team(self: Arc<Self>, situation: Situation) -> Result<(), HandlerError> {
        let user_id = situation.user_id;
        let team_id =
            situation.team_id.ok_or(HandlerError::UnexpectedPayload { expected: "invite" })?;

        let Some(login) = self.users.registered_login(user_id).await? else {
            return self.say(user_id, "not_registered").await;
        };

        if self.teams.team_of(user_id).await?.is_some() {
            return self.say(user_id, "already_in_team").await;
        }

        let team_name = match self.teams.add_member(team_id, user_id).await {
            Ok(name) => name,
            Err(RepositoryError::NotFound(_)) => return self.say(user_id, "team_not_found").await,
            Err(RepositoryError::Conflict(_)) => return self.say(user_id, "already_in_team").await,
            Err(error) => return Err(error.into()),
        };

        info!(
            event_name = "team.member_joined",
            user_id = %user_id,
            team_id = %team_id,
            "member joined team"
        );
        self.send(user_id, self.labels.render("you_added_to_team", &[&team_name])).await?;

        let Some(team) = self.teams.find(team_id).await? else {
            return Ok(());
        };
        let notice = self.labels.render("new_team_member", &[&login]);
        for member in team.members.iter().filter(|member| member.user_id != user_id) {
            if let Err(error) = self.send(member.user_id, notice.clone()).await {
                warn!(
                    event_name = "team.member_notify_failed",
                    user_id = %member.user_id,
                    error = %error,
                    "could not notify team member"
                );
            }
        }

        Ok(())
    }

    pub async fn delete_user(self: Arc<Self>, situation: Situation) -> Result<(), HandlerError> {
        let user_id = situation.user_id;
        let Some(team) = self.require_team(user_id).await? else {
            return Ok(());
        };

        self.sessions.advance(user_id, DialogEvent::MemberRemovalStarted).await?;
        let listing = member_listing(&team, true);
        self.send(user_id, self.labels.render("delete_user_text", &[&listing])).await
    }

    /// Removes a member of the caller's own team. Ids outside the team are
    /// rejected and the dialog keeps waiting.
    pub async fn user_deleted(self: Arc<Self>, situation: Situation) -> Result<(), HandlerError> {
        let user_id = situation.user_id;
        let target = text_input(&situation)?.parse::<UserId>()?;

        let Some(team) = self.require_team(user_id).await? else {
            self.sessions.advance(user_id, DialogEvent::MenuOpened).await?;
            return Ok(());
        };

        if !team.has_member(target) {
            return self.say(user_id, "not_team_member").await;
        }

        self.sessions.advance(user_id, DialogEvent::MenuOpened).await?;
        self.teams.remove_member(target).await?;
        info!(
            event_name = "team.member_removed",
            user_id = %user_id,
            target = %target,
            "member removed"
        );
        self.say(user_id, "user_deleted").await
    }

    pub async fn exit_team(self: Arc<Self>, situation: Situation) -> Result<(), HandlerError> {
        let user_id = situation.user_id;
        if self.teams.team_of(user_id).await?.is_none() {
            return self.say(user_id, "team_need_create").await;
        }

        self.send_with(user_id, self.labels.text("you_sure"), self.exit_confirmation()).await
    }

    pub async fn create_task(self: Arc<Self>, situation: Situation) -> Result<(), HandlerError> {
        let user_id = situation.user_id;
        let Some(team) = self.require_team(user_id).await? else {
            return Ok(());
        };

        self.sessions.advance(user_id, DialogEvent::TaskCreationStarted).await?;
        let listing = member_listing(&team, true);
        self.send(user_id, self.labels.render("choose_user_to_add_task", &[&listing])).await
    }

    pub async fn task_assignee(self: Arc<Self>, situation: Situation) -> Result<(), HandlerError> {
        let user_id = situation.user_id;
        let assignee = text_input(&situation)?.parse::<UserId>()?;

        let Some(team) = self.require_team(user_id).await? else {
            self.sessions.advance(user_id, DialogEvent::MenuOpened).await?;
            return Ok(());
        };

        if !team.has_member(assignee) {
            return self.say(user_id, "not_team_member").await;
        }

        self.sessions.advance(user_id, DialogEvent::AssigneeChosen).await?;
        let task_id = self.tasks.create_stub(assignee).await?;
        self.sessions.set_pending_task_target(user_id, assignee).await?;
        info!(
            event_name = "task.stub_created",
            user_id = %user_id,
            assignee = %assignee,
            task_id = %task_id,
            "task stub created"
        );
        self.say(user_id, "complexity").await
    }

    pub async fn task_complexity(
        self: Arc<Self>,
        situation: Situation,
    ) -> Result<(), HandlerError> {
        let user_id = situation.user_id;
        let complexity = parse_complexity(text_input(&situation)?)?;

        let Some(assignee) = self.pending_assignee(user_id).await? else {
            return Ok(());
        };

        self.sessions.advance(user_id, DialogEvent::ComplexitySet).await?;
        self.tasks.set_complexity(assignee, complexity).await?;
        self.say(user_id, "send_deadline").await
    }

    pub async fn task_deadline(self: Arc<Self>, situation: Situation) -> Result<(), HandlerError> {
        let user_id = situation.user_id;
        let deadline = parse_deadline(text_input(&situation)?, Utc::now())?;

        let Some(assignee) = self.pending_assignee(user_id).await? else {
            return Ok(());
        };

        self.sessions.advance(user_id, DialogEvent::DeadlineSet).await?;
        self.tasks.set_deadline(assignee, deadline).await?;
        self.say(user_id, "send_description").await
    }

    /// Last task step: stores the description and sends the finished task to
    /// both the assignee and its creator.
    pub async fn task_description(
        self: Arc<Self>,
        situation: Situation,
    ) -> Result<(), HandlerError> {
        let user_id = situation.user_id;
        let description = text_input(&situation)?.trim();
        if description.is_empty() {
            return self.say(user_id, "send_description").await;
        }

        let Some(assignee) = self.pending_assignee(user_id).await? else {
            return Ok(());
        };

        self.sessions.advance(user_id, DialogEvent::DescriptionSet).await?;
        self.tasks.set_description(assignee, description).await?;
        self.sessions.clear_pending_task_target(user_id).await?;

        let Some(task) = self.tasks.latest_for_user(assignee).await? else {
            return self.say(user_id, "task_not_found").await;
        };

        info!(
            event_name = "task.completed",
            user_id = %user_id,
            assignee = %assignee,
            task_id = %task.id,
            "task created"
        );
        self.send(assignee, self.task_summary("task_info_to_user", &task)).await?;
        self.send(user_id, self.task_summary("task_info", &task)).await
    }

    pub async fn check_tasks(self: Arc<Self>, situation: Situation) -> Result<(), HandlerError> {
        let user_id = situation.user_id;
        self.sessions.advance(user_id, DialogEvent::MenuOpened).await?;

        let tasks = self.tasks.list_for_user(user_id).await?;
        if tasks.is_empty() {
            return self.say(user_id, "no_tasks_found").await;
        }

        let text: String = tasks
            .iter()
            .enumerate()
            .map(|(index, task)| {
                let summary = self.task_summary("task_info", task);
                let line = self.labels.render("task_info_id", &[&task.id, &summary]);
                format!("{index}. {line}\n")
            })
            .collect();

        self.send_with(user_id, text, self.task_keyboard()).await
    }

    pub async fn task_delete(self: Arc<Self>, situation: Situation) -> Result<(), HandlerError> {
        let user_id = situation.user_id;
        self.sessions.advance(user_id, DialogEvent::TaskDeletionStarted).await?;
        self.say(user_id, "task_id").await
    }

    /// Deletes one of the caller's own tasks.
    pub async fn task_deleted(self: Arc<Self>, situation: Situation) -> Result<(), HandlerError> {
        let user_id = situation.user_id;
        let task_id = text_input(&situation)?.parse::<TaskId>()?;

        let owned = self.tasks.list_for_user(user_id).await?.iter().any(|task| task.id == task_id);
        if !owned {
            return self.say(user_id, "task_not_found").await;
        }

        self.sessions.advance(user_id, DialogEvent::MenuOpened).await?;
        self.tasks.delete(task_id).await?;
        info!(event_name = "task.deleted", user_id = %user_id, task_id = %task_id, "task deleted");
        self.say(user_id, "task_deleted").await
    }

    /// Assignee chosen earlier in the task dialog. A missing value means the
    /// dialog expired, so the user is sent back to the menu.
    async fn pending_assignee(&self, user_id: UserId) -> Result<Option<UserId>, HandlerError> {
        if let Some(assignee) = self.sessions.pending_task_target(user_id).await? {
            return Ok(Some(assignee));
        }

        self.sessions.advance(user_id, DialogEvent::MenuOpened).await?;
        self.say(user_id, "some_wrong").await?;
        Ok(None)
    }
}
