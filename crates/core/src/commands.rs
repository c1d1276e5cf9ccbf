use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Key of the free-text handler registry. The string form is what users type
/// and what the dialog cursor persists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKey {
    Start,
    SignUp,
    Login,
    Password,
    Unrecognized,
    Team,
    CreateTeam,
    TeamName,
    YourTeam,
    AddUser,
    JoinTeam,
    DeleteUser,
    UserDeleted,
    ExitTeam,
    CreateTask,
    TaskAssignee,
    TaskComplexity,
    TaskDeadline,
    TaskDescription,
    CheckTasks,
    TaskDelete,
    TaskDeleted,
}

impl CommandKey {
    pub const ALL: [CommandKey; 22] = [
        Self::Start,
        Self::SignUp,
        Self::Login,
        Self::Password,
        Self::Unrecognized,
        Self::Team,
        Self::CreateTeam,
        Self::TeamName,
        Self::YourTeam,
        Self::AddUser,
        Self::JoinTeam,
        Self::DeleteUser,
        Self::UserDeleted,
        Self::ExitTeam,
        Self::CreateTask,
        Self::TaskAssignee,
        Self::TaskComplexity,
        Self::TaskDeadline,
        Self::TaskDescription,
        Self::CheckTasks,
        Self::TaskDelete,
        Self::TaskDeleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "/start",
            Self::SignUp => "/sign_up",
            Self::Login => "/login",
            Self::Password => "/password",
            Self::Unrecognized => "/unrecognized",
            Self::Team => "/team",
            Self::CreateTeam => "/create_team",
            Self::TeamName => "/team_name",
            Self::YourTeam => "/your_team",
            Self::AddUser => "/add_user",
            Self::JoinTeam => "/join_team",
            Self::DeleteUser => "/delete_user",
            Self::UserDeleted => "/user_deleted",
            Self::ExitTeam => "/exit_team",
            Self::CreateTask => "/create_task",
            Self::TaskAssignee => "/task_assignee",
            Self::TaskComplexity => "/task_complexity",
            Self::TaskDeadline => "/task_deadline",
            Self::TaskDescription => "/task_description",
            Self::CheckTasks => "/check_tasks",
            Self::TaskDelete => "/task_delete",
            Self::TaskDeleted => "/task_deleted",
        }
    }
}

impl fmt::Display for CommandKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl FromStr for CommandKey {
    type Err = UnknownCommand;

    /// Exact match only: no trimming, no case folding.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|command| command.as_str() == value)
            .ok_or_else(|| UnknownCommand(value.to_owned()))
    }
}

/// Key of the button-callback registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallbackKey {
    ConfirmExitTeam,
    CancelExitTeam,
}

impl CallbackKey {
    pub const ALL: [CallbackKey; 2] = [Self::ConfirmExitTeam, Self::CancelExitTeam];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfirmExitTeam => "/yes",
            Self::CancelExitTeam => "/no",
        }
    }
}

impl fmt::Display for CallbackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallbackKey {
    type Err = UnknownCommand;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == value)
            .ok_or_else(|| UnknownCommand(value.to_owned()))
    }
}
