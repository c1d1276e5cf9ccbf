use thiserror::Error;

use crate::flows::states::{
    DialogEvent, DialogState, MemberRemovalStep, RegistrationStep, TaskCreationStep,
    TaskDeletionStep, TeamCreationStep, TransitionOutcome,
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DialogTransitionError {
    #[error("invalid dialog transition from {state:?} using event {event:?}")]
    InvalidTransition { state: DialogState, event: DialogEvent },
}

/// Transition table for every conversation the bot runs.
///
/// Entry events (menu, sign-up, starting a team, task or removal dialog) are
/// accepted from any state so a user can always abandon a half-finished
/// dialog. Step events are only accepted from the step that awaits them.
#[derive(Clone, Copy, Debug, Default)]
pub struct DialogFlow;

impl DialogFlow {
    pub fn new() -> Self {
        Self
    }

    pub fn initial_state(&self) -> DialogState {
        DialogState::Idle
    }

    pub fn apply(
        &self,
        current: &DialogState,
        event: &DialogEvent,
    ) -> Result<TransitionOutcome, DialogTransitionError> {
        use DialogEvent::{
            AssigneeChosen, ComplexitySet, DeadlineSet, DescriptionSet, LoginAccepted, MenuOpened,
            MemberRemovalStarted, SignUpStarted, TaskCreationStarted, TaskDeletionStarted,
            TeamCreationStarted, TeamNamed,
        };
        use DialogState::{
            Idle, MemberRemoval, Registration, TaskCreation, TaskDeletion, TeamCreation,
        };

        let to = match (current, event) {
            (_, MenuOpened) => Idle,
            (_, SignUpStarted) => Registration(RegistrationStep::Login),
            (_, TeamCreationStarted) => TeamCreation(TeamCreationStep::Name),
            (_, TaskCreationStarted) => TaskCreation(TaskCreationStep::Assignee),
            (_, TaskDeletionStarted) => TaskDeletion(TaskDeletionStep::TaskId),
            (_, MemberRemovalStarted) => MemberRemoval(MemberRemovalStep::Member),
            (Registration(RegistrationStep::Login), LoginAccepted) => {
                Registration(RegistrationStep::Password)
            }
            (TeamCreation(TeamCreationStep::Name), TeamNamed) => Idle,
            (TaskCreation(TaskCreationStep::Assignee), AssigneeChosen) => {
                TaskCreation(TaskCreationStep::Complexity)
            }
            (TaskCreation(TaskCreationStep::Complexity), ComplexitySet) => {
                TaskCreation(TaskCreationStep::Deadline)
            }
            (TaskCreation(TaskCreationStep::Deadline), DeadlineSet) => {
                TaskCreation(TaskCreationStep::Description)
            }
            (TaskCreation(TaskCreationStep::Description), DescriptionSet) => Idle,
            _ => {
                return Err(DialogTransitionError::InvalidTransition {
                    state: *current,
                    event: *event,
                });
            }
        };

        Ok(TransitionOutcome { from: *current, to, event: *event })
    }
}

#[cfg(test)]
mod tests {
    use crate::flows::engine::{DialogFlow, DialogTransitionError};
    use crate::flows::states::{
        DialogEvent, DialogState, RegistrationStep, TaskCreationStep, TeamCreationStep,
    };

    #[test]
    fn registration_happy_path() {
        let flow = DialogFlow::new();
        let mut state = flow.initial_state();

        state = flow.apply(&state, &DialogEvent::SignUpStarted).expect("idle -> login").to;
        assert_eq!(state, DialogState::Registration(RegistrationStep::Login));

        state = flow.apply(&state, &DialogEvent::LoginAccepted).expect("login -> password").to;
        assert_eq!(state, DialogState::Registration(RegistrationStep::Password));
    }

    #[test]
    fn task_creation_walks_every_step_back_to_idle() {
        let flow = DialogFlow::default();
        let events = [
            DialogEvent::TaskCreationStarted,
            DialogEvent::AssigneeChosen,
            DialogEvent::ComplexitySet,
            DialogEvent::DeadlineSet,
            DialogEvent::DescriptionSet,
        ];

        let mut visited = Vec::new();
        let mut state = flow.initial_state();
        for event in &events {
            state = flow.apply(&state, event).expect("task creation step").to;
            visited.push(state);
        }

        assert_eq!(
            visited,
            vec![
                DialogState::TaskCreation(TaskCreationStep::Assignee),
                DialogState::TaskCreation(TaskCreationStep::Complexity),
                DialogState::TaskCreation(TaskCreationStep::Deadline),
                DialogState::TaskCreation(TaskCreationStep::Description),
                DialogState::Idle,
            ]
        );
    }

    #[test]
    fn step_event_out_of_order_is_rejected() {
        let flow = DialogFlow::new();
        let error = flow
            .apply(&DialogState::Idle, &DialogEvent::LoginAccepted)
            .expect_err("login cannot be accepted without sign-up");

        assert_eq!(
            error,
            DialogTransitionError::InvalidTransition {
                state: DialogState::Idle,
                event: DialogEvent::LoginAccepted,
            }
        );

        assert!(flow
            .apply(
                &DialogState::TaskCreation(TaskCreationStep::Assignee),
                &DialogEvent::DeadlineSet
            )
            .is_err());
    }

    #[test]
    fn entry_events_abandon_any_dialog() {
        let flow = DialogFlow::new();
        let outcome = flow
            .apply(
                &DialogState::TaskCreation(TaskCreationStep::Deadline),
                &DialogEvent::TeamCreationStarted,
            )
            .expect("entry event from mid-dialog");

        assert_eq!(outcome.from, DialogState::TaskCreation(TaskCreationStep::Deadline));
        assert_eq!(outcome.to, DialogState::TeamCreation(TeamCreationStep::Name));

        let menu = flow
            .apply(&DialogState::Registration(RegistrationStep::Password), &DialogEvent::MenuOpened)
            .expect("menu resets the dialog");
        assert_eq!(menu.to, DialogState::Idle);
    }

    #[test]
    fn every_awaiting_state_has_a_command() {
        let flow = DialogFlow::new();
        for event in [
            DialogEvent::SignUpStarted,
            DialogEvent::TeamCreationStarted,
            DialogEvent::TaskCreationStarted,
            DialogEvent::TaskDeletionStarted,
            DialogEvent::MemberRemovalStarted,
        ] {
            let outcome = flow.apply(&DialogState::Idle, &event).expect("entry event");
            assert!(outcome.to.awaited_command().is_some(), "{event:?} must await input");
        }
    }
}
