use serde::{Deserialize, Serialize};

use crate::commands::CommandKey;

/// Persisted marker for a user who is not inside any multi-step dialog.
pub const IDLE_CURSOR: &str = "main";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationStep {
    Login,
    Password,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeamCreationStep {
    Name,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskCreationStep {
    Assignee,
    Complexity,
    Deadline,
    Description,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskDeletionStep {
    TaskId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberRemovalStep {
    Member,
}

/// Where a user is inside a multi-step dialog. Every non-idle state waits for
/// exactly one command key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogState {
    Idle,
    Registration(RegistrationStep),
    TeamCreation(TeamCreationStep),
    TaskCreation(TaskCreationStep),
    TaskDeletion(TaskDeletionStep),
    MemberRemoval(MemberRemovalStep),
}

impl DialogState {
    /// The command that handles this user's next free-text input.
    pub fn awaited_command(&self) -> Option<CommandKey> {
        match self {
            Self::Idle => None,
            Self::Registration(RegistrationStep::Login) => Some(CommandKey::Login),
            Self::Registration(RegistrationStep::Password) => Some(CommandKey::Password),
            Self::TeamCreation(TeamCreationStep::Name) => Some(CommandKey::TeamName),
            Self::TaskCreation(TaskCreationStep::Assignee) => Some(CommandKey::TaskAssignee),
            Self::TaskCreation(TaskCreationStep::Complexity) => Some(CommandKey::TaskComplexity),
            Self::TaskCreation(TaskCreationStep::Deadline) => Some(CommandKey::TaskDeadline),
            Self::TaskCreation(TaskCreationStep::Description) => Some(CommandKey::TaskDescription),
            Self::TaskDeletion(TaskDeletionStep::TaskId) => Some(CommandKey::TaskDeleted),
            Self::MemberRemoval(MemberRemovalStep::Member) => Some(CommandKey::UserDeleted),
        }
    }

    pub fn encode(&self) -> &'static str {
        self.awaited_command().map(|command| command.as_str()).unwrap_or(IDLE_CURSOR)
    }

    /// Decodes a persisted cursor. Values that name no dialog state yield
    /// `None` so resolution falls through to the next layer.
    pub fn decode(raw: &str) -> Option<Self> {
        if raw == IDLE_CURSOR {
            return Some(Self::Idle);
        }

        let command = raw.parse::<CommandKey>().ok()?;
        Self::awaiting(command)
    }

    fn awaiting(command: CommandKey) -> Option<Self> {
        let state = match command {
            CommandKey::Login => Self::Registration(RegistrationStep::Login),
            CommandKey::Password => Self::Registration(RegistrationStep::Password),
            CommandKey::TeamName => Self::TeamCreation(TeamCreationStep::Name),
            CommandKey::TaskAssignee => Self::TaskCreation(TaskCreationStep::Assignee),
            CommandKey::TaskComplexity => Self::TaskCreation(TaskCreationStep::Complexity),
            CommandKey::TaskDeadline => Self::TaskCreation(TaskCreationStep::Deadline),
            CommandKey::TaskDescription => Self::TaskCreation(TaskCreationStep::Description),
            CommandKey::TaskDeleted => Self::TaskDeletion(TaskDeletionStep::TaskId),
            CommandKey::UserDeleted => Self::MemberRemoval(MemberRemovalStep::Member),
            _ => return None,
        };
        Some(state)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogEvent {
    MenuOpened,
    SignUpStarted,
    LoginAccepted,
    TeamCreationStarted,
    TeamNamed,
    TaskCreationStarted,
    AssigneeChosen,
    ComplexitySet,
    DeadlineSet,
    DescriptionSet,
    TaskDeletionStarted,
    MemberRemovalStarted,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: DialogState,
    pub to: DialogState,
    pub event: DialogEvent,
}
