use std::sync::Arc;

use tracing::{debug, info, warn};

use taskbot_core::commands::{CallbackKey, CommandKey};
use taskbot_core::labels::{CommandTable, LabelCatalog};
use taskbot_core::session::DialogSessions;

use crate::events::{normalize, InboundEvent, Normalized, Situation};
use crate::registry::{CallbackRegistry, Handler, MessageRegistry};

/// Which layer of the fallback chain picked the handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Invite,
    Literal(CommandKey),
    Cursor(CommandKey),
    Label { label_key: String, command: CommandKey },
    Unrecognized,
    Callback(CallbackKey),
}

impl Resolution {
    pub fn layer(&self) -> &'static str {
        match self {
            Self::Invite => "invite",
            Self::Literal(_) => "literal",
            Self::Cursor(_) => "cursor",
            Self::Label { .. } => "label",
            Self::Unrecognized => "unrecognized",
            Self::Callback(_) => "callback",
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Invite => CommandKey::JoinTeam.as_str(),
            Self::Literal(command) | Self::Cursor(command) => command.as_str(),
            Self::Label { command, .. } => command.as_str(),
            Self::Unrecognized => CommandKey::Unrecognized.as_str(),
            Self::Callback(key) => key.as_str(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropReason {
    MalformedInvite,
    NoHandler,
    UnknownCallback,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled(Resolution),
    /// The handler ran and failed; the event still counts as handled.
    Failed(Resolution),
    Dropped(DropReason),
}

pub struct Dispatcher {
    messages: MessageRegistry,
    callbacks: CallbackRegistry,
    sessions: DialogSessions,
    labels: Arc<LabelCatalog>,
    commands: Arc<CommandTable>,
    notify_unrecognized: bool,
}

impl Dispatcher {
    pub fn new(
        messages: MessageRegistry,
        callbacks: CallbackRegistry,
        sessions: DialogSessions,
        labels: Arc<LabelCatalog>,
        commands: Arc<CommandTable>,
    ) -> Self {
        Self { messages, callbacks, sessions, labels, commands, notify_unrecognized: false }
    }

    /// Invoke the unrecognized-input handler instead of dropping text that no
    /// layer resolves.
    pub fn notify_unrecognized(mut self, enabled: bool) -> Self {
        self.notify_unrecognized = enabled;
        self
    }

    pub fn message_handler_count(&self) -> usize {
        self.messages.len()
    }

    pub fn callback_handler_count(&self) -> usize {
        self.callbacks.len()
    }

    pub async fn dispatch(&self, event: InboundEvent) -> DispatchOutcome {
        let user_id = event.user_id();
        let kind = event.kind();

        match normalize(event) {
            Normalized::MalformedInvite => {
                debug!(
                    event_name = "dispatch.dropped",
                    user_id = %user_id,
                    reason = "malformed_invite",
                    "dropping invite link without a team id"
                );
                DispatchOutcome::Dropped(DropReason::MalformedInvite)
            }
            Normalized::Invite(situation) => match self.messages.get(&CommandKey::JoinTeam) {
                Some(handler) => self.invoke(handler, Resolution::Invite, situation).await,
                None => self.drop_unhandled(user_id, kind, DropReason::NoHandler),
            },
            Normalized::Callback(situation) => {
                let data = situation.callback_data().unwrap_or_default();
                let resolved = data.parse::<CallbackKey>().ok().and_then(|key| {
                    self.callbacks.get(&key).map(|handler| (key, handler))
                });
                match resolved {
                    Some((key, handler)) => {
                        self.invoke(handler, Resolution::Callback(key), situation).await
                    }
                    None => {
                        debug!(
                            event_name = "dispatch.dropped",
                            user_id = %user_id,
                            callback_data = data,
                            "no handler for callback payload"
                        );
                        DispatchOutcome::Dropped(DropReason::UnknownCallback)
                    }
                }
            }
            Normalized::Text(situation) => match self.resolve_text(&situation).await {
                Some((resolution, handler)) => self.invoke(handler, resolution, situation).await,
                None => self.drop_unhandled(user_id, kind, DropReason::NoHandler),
            },
        }
    }

    /// Literal command, then the user's dialog cursor, then the localized
    /// label the text matches. First hit wins.
    pub async fn resolve_text(&self, situation: &Situation) -> Option<(Resolution, Handler)> {
        let text = situation.text()?;

        if let Some(found) = self.literal(text) {
            return Some(found);
        }
        if let Some(found) = self.cursor(situation).await {
            return Some(found);
        }
        if let Some(found) = self.label(text) {
            return Some(found);
        }

        if self.notify_unrecognized {
            return self
                .messages
                .get(&CommandKey::Unrecognized)
                .map(|handler| (Resolution::Unrecognized, handler));
        }
        None
    }

    fn literal(&self, text: &str) -> Option<(Resolution, Handler)> {
        let command = text.parse::<CommandKey>().ok()?;
        self.messages.get(&command).map(|handler| (Resolution::Literal(command), handler))
    }

    async fn cursor(&self, situation: &Situation) -> Option<(Resolution, Handler)> {
        let awaited = match self.sessions.awaited_command(situation.user_id).await {
            Ok(awaited) => awaited?,
            Err(error) => {
                warn!(
                    event_name = "dispatch.cursor_unavailable",
                    user_id = %situation.user_id,
                    error = %error,
                    "could not read dialog cursor; skipping cursor layer"
                );
                return None;
            }
        };
        self.messages.get(&awaited).map(|handler| (Resolution::Cursor(awaited), handler))
    }

    /// Several label keys may share one text; the first one that translates to
    /// a registered command wins.
    fn label(&self, text: &str) -> Option<(Resolution, Handler)> {
        self.labels.label_keys_for(text).find_map(|label_key| {
            let command = self.commands.command_for(label_key)?;
            self.messages.get(&command).map(|handler| {
                (Resolution::Label { label_key: label_key.to_owned(), command }, handler)
            })
        })
    }

    async fn invoke(
        &self,
        handler: Handler,
        resolution: Resolution,
        situation: Situation,
    ) -> DispatchOutcome {
        let user_id = situation.user_id;
        debug!(
            event_name = "dispatch.resolved",
            user_id = %user_id,
            resolution = resolution.layer(),
            command = resolution.key(),
            "invoking handler"
        );

        match handler(situation).await {
            Ok(()) => {
                info!(
                    event_name = "dispatch.handled",
                    user_id = %user_id,
                    resolution = resolution.layer(),
                    command = resolution.key(),
                    "event handled"
                );
                DispatchOutcome::Handled(resolution)
            }
            Err(error) if error.is_decode() => {
                debug!(
                    event_name = "dispatch.input_rejected",
                    user_id = %user_id,
                    command = resolution.key(),
                    error = %error,
                    "dropping undecodable input"
                );
                DispatchOutcome::Failed(resolution)
            }
            Err(error) => {
                warn!(
                    event_name = "dispatch.handler_failed",
                    user_id = %user_id,
                    resolution = resolution.layer(),
                    command = resolution.key(),
                    error = %error,
                    "handler failed; event considered handled"
                );
                DispatchOutcome::Failed(resolution)
            }
        }
    }

    fn drop_unhandled(
        &self,
        user_id: taskbot_core::domain::UserId,
        kind: &'static str,
        reason: DropReason,
    ) -> DispatchOutcome {
        debug!(
            event_name = "dispatch.dropped",
            user_id = %user_id,
            event_kind = kind,
            reason = ?reason,
            "no handler resolved"
        );
        DispatchOutcome::Dropped(reason)
    }
}
