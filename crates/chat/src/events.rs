use taskbot_core::domain::{TeamId, UserId};

/// Marker the invite deep link carries in its start payload.
pub const INVITE_MARKER: &str = "new_team_user_";
/// Text a client sends when a user opens `<bot link>?start=new_team_user_<id>`.
pub const INVITE_PREFIX: &str = "/start new_team_user_";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SenderProfile {
    pub display_name: String,
    pub handle: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub user_id: UserId,
    pub text: String,
    pub sender: SenderProfile,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundCallback {
    pub user_id: UserId,
    pub data: String,
    pub sender: SenderProfile,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    Message(InboundMessage),
    Callback(InboundCallback),
}

impl InboundEvent {
    pub fn text(user_id: UserId, text: impl Into<String>) -> Self {
        Self::Message(InboundMessage {
            user_id,
            text: text.into(),
            sender: SenderProfile::default(),
        })
    }

    pub fn callback(user_id: UserId, data: impl Into<String>) -> Self {
        Self::Callback(InboundCallback {
            user_id,
            data: data.into(),
            sender: SenderProfile::default(),
        })
    }

    pub fn user_id(&self) -> UserId {
        match self {
            Self::Message(message) => message.user_id,
            Self::Callback(callback) => callback.user_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::Callback(_) => "callback",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Callback(String),
}

/// Canonical form of one inbound event. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Situation {
    pub user_id: UserId,
    pub payload: Payload,
    /// Team decoded from an invite deep link.
    pub team_id: Option<TeamId>,
    pub sender: SenderProfile,
}

impl Situation {
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(text) => Some(text),
            Payload::Callback(_) => None,
        }
    }

    pub fn callback_data(&self) -> Option<&str> {
        match &self.payload {
            Payload::Callback(data) => Some(data),
            Payload::Text(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Normalized {
    /// Invite deep link; goes straight to the join-team handler.
    Invite(Situation),
    Text(Situation),
    Callback(Situation),
    /// Text carried the invite marker but no decodable team id.
    MalformedInvite,
}

pub fn normalize(event: InboundEvent) -> Normalized {
    match event {
        InboundEvent::Message(message) => {
            if message.text.contains(INVITE_MARKER) {
                return match decode_invite(&message.text) {
                    Some(team_id) => Normalized::Invite(Situation {
                        user_id: message.user_id,
                        payload: Payload::Text(message.text),
                        team_id: Some(team_id),
                        sender: message.sender,
                    }),
                    None => Normalized::MalformedInvite,
                };
            }

            Normalized::Text(Situation {
                user_id: message.user_id,
                payload: Payload::Text(message.text),
                team_id: None,
                sender: message.sender,
            })
        }
        InboundEvent::Callback(callback) => Normalized::Callback(Situation {
            user_id: callback.user_id,
            payload: Payload::Callback(callback.data),
            team_id: None,
            sender: callback.sender,
        }),
    }
}

fn decode_invite(text: &str) -> Option<TeamId> {
    text.strip_prefix(INVITE_PREFIX)?.parse::<i64>().ok().map(TeamId)
}
