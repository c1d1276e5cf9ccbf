use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{parse_i64, TaskId, UserId};
use crate::errors::DomainError;

/// A task row. Creation happens in two phases, so every detail field may be
/// missing while the creation dialog is still in progress.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub owner: UserId,
    pub complexity: Option<i32>,
    pub deadline: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

impl Task {
    pub fn stub(id: TaskId, owner: UserId) -> Self {
        Self { id, owner, complexity: None, deadline: None, description: None }
    }

    pub fn is_complete(&self) -> bool {
        self.complexity.is_some() && self.deadline.is_some() && self.description.is_some()
    }
}

pub fn parse_complexity(text: &str) -> Result<i32, DomainError> {
    let value = parse_i64("complexity", text)?;
    i32::try_from(value)
        .map_err(|_| DomainError::InvalidInput { field: "complexity", value: text.to_owned() })
}

/// Parses an "in N hours" answer such as `3h` or `12` into an absolute
/// deadline relative to `now`. Every `h` in the input is ignored.
pub fn parse_deadline(text: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, DomainError> {
    let hours_text = text.replace('h', "");
    let hours = parse_i64("deadline", &hours_text)
        .map_err(|_| DomainError::InvalidInput { field: "deadline", value: text.to_owned() })?;
    let offset = Duration::try_hours(hours)
        .ok_or_else(|| DomainError::InvalidInput { field: "deadline", value: text.to_owned() })?;
    now.checked_add_signed(offset)
        .ok_or_else(|| DomainError::InvalidInput { field: "deadline", value: text.to_owned() })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{parse_complexity, parse_deadline, Task};
    use crate::domain::{TaskId, UserId};

    #[test]
    fn deadline_accepts_hour_suffix() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid timestamp");
        let deadline = parse_deadline("3h", now).expect("3h parses");
        assert_eq!(deadline, now + Duration::hours(3));

        let bare = parse_deadline("24", now).expect("bare hours parse");
        assert_eq!(bare, now + Duration::hours(24));
    }

    #[test]
    fn deadline_rejects_non_numeric_answers() {
        assert!(parse_deadline("tomorrow", Utc::now()).is_err());
    }

    #[test]
    fn complexity_must_fit_in_i32() {
        assert_eq!(parse_complexity("5"), Ok(5));
        assert!(parse_complexity("99999999999").is_err());
        assert!(parse_complexity("hard").is_err());
    }

    #[test]
    fn stub_task_is_incomplete_until_all_fields_are_set() {
        let mut task = Task::stub(TaskId(1), UserId(10));
        assert!(!task.is_complete());

        task.complexity = Some(3);
        task.deadline = Some(Utc::now());
        task.description = Some("write release notes".to_owned());
        assert!(task.is_complete());
    }
}
