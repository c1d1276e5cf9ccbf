//! Conversation handlers: registration, teams and tasks.
//!
//! Every handler follows the same shape: read and validate the user's input,
//! move the dialog cursor, then perform side effects. Business-rule
//! rejections are explained to the user and count as success.

mod callback;
mod message;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use taskbot_core::commands::CallbackKey;
use taskbot_core::config::invite_link;
use taskbot_core::domain::{Task, Team, TeamId, UserId};
use taskbot_core::labels::LabelCatalog;
use taskbot_core::session::DialogSessions;
use taskbot_db::repositories::{TaskRepository, TeamRepository, UserRepository};

use crate::events::Situation;
use crate::markup::{InlineButton, Markup};
use crate::registry::HandlerError;
use crate::transport::{ChatTransport, OutboundMessage};

pub use callback::callback_registry;
pub use message::message_registry;

const DEADLINE_FORMAT: &str = "%Y-%m-%d %H:%M UTC";
const MISSING_FIELD: &str = "-";

/// Shared state behind every message and callback handler.
pub struct BotService {
    users: Arc<dyn UserRepository>,
    teams: Arc<dyn TeamRepository>,
    tasks: Arc<dyn TaskRepository>,
    sessions: DialogSessions,
    transport: Arc<dyn ChatTransport>,
    labels: Arc<LabelCatalog>,
    bot_link: String,
}

pub struct BotServiceParts {
    pub users: Arc<dyn UserRepository>,
    pub teams: Arc<dyn TeamRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub sessions: DialogSessions,
    pub transport: Arc<dyn ChatTransport>,
    pub labels: Arc<LabelCatalog>,
    pub bot_link: String,
}

impl BotService {
    pub fn new(parts: BotServiceParts) -> Arc<Self> {
        Arc::new(Self {
            users: parts.users,
            teams: parts.teams,
            tasks: parts.tasks,
            sessions: parts.sessions,
            transport: parts.transport,
            labels: parts.labels,
            bot_link: parts.bot_link,
        })
    }

    pub fn sessions(&self) -> &DialogSessions {
        &self.sessions
    }

    pub fn labels(&self) -> &LabelCatalog {
        &self.labels
    }

    fn invite_link(&self, team_id: TeamId) -> String {
        invite_link(&self.bot_link, team_id.0)
    }

    async fn send(&self, to: UserId, text: String) -> Result<(), HandlerError> {
        self.transport.send(OutboundMessage::text(to, text)).await?;
        Ok(())
    }

    async fn send_with(
        &self,
        to: UserId,
        text: String,
        markup: Markup,
    ) -> Result<(), HandlerError> {
        self.transport.send(OutboundMessage::with_markup(to, text, markup)).await?;
        Ok(())
    }

    /// Sends the catalog text for `key` unchanged.
    async fn say(&self, to: UserId, key: &str) -> Result<(), HandlerError> {
        self.send(to, self.labels.text(key)).await
    }

    /// Team of a registered caller, or `None` after telling them to create one.
    async fn require_team(&self, user_id: UserId) -> Result<Option<Team>, HandlerError> {
        let Some(team_id) = self.teams.team_of(user_id).await? else {
            self.say(user_id, "team_need_create").await?;
            return Ok(None);
        };

        match self.teams.find(team_id).await? {
            Some(team) => Ok(Some(team)),
            None => {
                self.say(user_id, "team_not_found").await?;
                Ok(None)
            }
        }
    }

    fn main_menu(&self) -> Markup {
        Markup::reply()
            .row(|row| {
                row.key(self.labels.text("check_tasks")).key(self.labels.text("create_task"));
            })
            .row(|row| {
                row.key(self.labels.text("team"));
            })
            .build()
    }

    fn team_menu(&self) -> Markup {
        Markup::reply()
            .row(|row| {
                row.key(self.labels.text("create_team")).key(self.labels.text("your_team"));
            })
            .build()
    }

    fn team_keyboard(&self) -> Markup {
        Markup::reply()
            .row(|row| {
                row.key(self.labels.text("add_user")).key(self.labels.text("delete_user"));
            })
            .row(|row| {
                row.key(self.labels.text("exit_team"));
            })
            .build()
    }

    fn task_keyboard(&self) -> Markup {
        Markup::reply()
            .row(|row| {
                row.key(self.labels.text("delete_task"));
            })
            .build()
    }

    fn exit_confirmation(&self) -> Markup {
        Markup::inline()
            .row(|row| {
                row.button(InlineButton::new(
                    self.labels.text("yes"),
                    CallbackKey::ConfirmExitTeam.as_str(),
                ))
                .button(InlineButton::new(
                    self.labels.text("no"),
                    CallbackKey::CancelExitTeam.as_str(),
                ));
            })
            .build()
    }

    fn task_summary(&self, key: &str, task: &Task) -> String {
        let complexity = optional(task.complexity);
        let deadline = format_deadline(task.deadline);
        let description = optional(task.description.as_deref());
        self.labels.render(key, &[&complexity, &deadline, &description])
    }
}

fn text_input(situation: &Situation) -> Result<&str, HandlerError> {
    situation.text().ok_or(HandlerError::UnexpectedPayload { expected: "text" })
}

fn optional<T: fmt::Display>(value: Option<T>) -> String {
    value.map(|value| value.to_string()).unwrap_or_else(|| MISSING_FIELD.to_owned())
}

fn format_deadline(deadline: Option<DateTime<Utc>>) -> String {
    deadline
        .map(|deadline| deadline.format(DEADLINE_FORMAT).to_string())
        .unwrap_or_else(|| MISSING_FIELD.to_owned())
}

/// Numbered roster. `with_ids` adds the member id line users reply with.
fn member_listing(team: &Team, with_ids: bool) -> String {
    team.members
        .iter()
        .enumerate()
        .map(|(index, member)| {
            if with_ids {
                format!("{index}. {}\n{}\n", member.login, member.user_id)
            } else {
                format!("{index}. {}\n", member.login)
            }
        })
        .collect()
}
