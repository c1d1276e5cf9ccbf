pub mod commands;
pub mod config;
pub mod credentials;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod labels;
pub mod session;

pub use commands::{CallbackKey, CommandKey};
pub use domain::task::Task;
pub use domain::team::{Team, TeamMember};
pub use domain::user::User;
pub use domain::{TaskId, TeamId, UserId};
pub use errors::DomainError;
pub use flows::{DialogEvent, DialogFlow, DialogState, DialogTransitionError, TransitionOutcome};
pub use labels::{CatalogError, CommandTable, LabelCatalog};
pub use session::{
    DialogError, DialogSessions, InMemorySessionStore, SessionError, SessionKey, SessionStore,
};
