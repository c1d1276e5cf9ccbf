use std::sync::Arc;

use tracing::info;

use taskbot_core::commands::CallbackKey;
use taskbot_core::flows::DialogEvent;

use super::BotService;
use crate::events::Situation;
use crate::registry::{bind, CallbackRegistry, HandlerError};

pub fn callback_registry(service: &Arc<BotService>) -> CallbackRegistry {
    CallbackRegistry::from_entries([
        (CallbackKey::ConfirmExitTeam, bind(service, BotService::confirm_exit_team)),
        (CallbackKey::CancelExitTeam, bind(service, BotService::cancel_exit_team)),
    ])
}

impl BotService {
    pub async fn confirm_exit_team(
        self: Arc<Self>,
        situation: Situation,
    ) -> Result<(), HandlerError> {
        let user_id = situation.user_id;
        self.sessions.advance(user_id, DialogEvent::MenuOpened).await?;

        if !self.teams.remove_member(user_id).await? {
            return self.say(user_id, "team_need_create").await;
        }

        info!(event_name = "team.member_left", user_id = %user_id, "member left team");
        self.say(user_id, "you_deleted").await
    }

    pub async fn cancel_exit_team(
        self: Arc<Self>,
        situation: Situation,
    ) -> Result<(), HandlerError> {
        let user_id = situation.user_id;
        self.sessions.advance(user_id, DialogEvent::MenuOpened).await?;
        self.send_with(user_id, self.labels.text("choose"), self.main_menu()).await
    }
}
