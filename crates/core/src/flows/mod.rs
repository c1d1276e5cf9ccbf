pub mod engine;
pub mod states;

pub use engine::{DialogFlow, DialogTransitionError};
pub use states::{
    DialogEvent, DialogState, MemberRemovalStep, RegistrationStep, TaskCreationStep,
    TaskDeletionStep, TeamCreationStep, TransitionOutcome,
};
