use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub mod task;
pub mod team;
pub mod user;

pub use task::Task;
pub use team::{Team, TeamMember};
pub use user::User;

/// Chat-platform user id. Doubles as the primary key of the `user` table and
/// as the chat id outbound messages are addressed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        parse_i64("user_id", value).map(Self)
    }
}

impl FromStr for TeamId {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        parse_i64("team_id", value).map(Self)
    }
}

impl FromStr for TaskId {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        parse_i64("task_id", value).map(Self)
    }
}

pub(crate) fn parse_i64(field: &'static str, value: &str) -> Result<i64, DomainError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| DomainError::InvalidInput { field, value: value.to_owned() })
}
