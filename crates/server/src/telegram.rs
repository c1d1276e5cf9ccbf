//! Telegram adapter: long polling in, `sendMessage` out.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, ReplyMarkup,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use taskbot_chat::events::{InboundCallback, InboundMessage};
use taskbot_chat::markup::Markup;
use taskbot_chat::{ChatTransport, InboundEvent, OutboundMessage, SenderProfile, TransportError};
use taskbot_core::domain::UserId;

pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send(&self, message: OutboundMessage) -> Result<(), TransportError> {
        let mut request = self.bot.send_message(ChatId(message.chat_id.0), message.text);
        if let Some(markup) = message.markup {
            request = request.reply_markup(reply_markup(markup));
        }

        request
            .await
            .map(|_| ())
            .map_err(|error| TransportError::Send(format!("telegram sendMessage failed: {error}")))
    }
}

pub fn reply_markup(markup: Markup) -> ReplyMarkup {
    match markup {
        Markup::Reply { rows } => {
            let rows = rows
                .into_iter()
                .map(|row| row.into_iter().map(KeyboardButton::new).collect::<Vec<_>>());
            ReplyMarkup::Keyboard(KeyboardMarkup::new(rows))
        }
        Markup::Inline { rows } => {
            let rows = rows.into_iter().map(|row| {
                row.into_iter()
                    .map(|button| {
                        InlineKeyboardButton::callback(button.label, button.callback_data)
                    })
                    .collect::<Vec<_>>()
            });
            ReplyMarkup::InlineKeyboard(InlineKeyboardMarkup::new(rows))
        }
    }
}

/// Starts long polling. Updates are forwarded to `sender` in arrival order;
/// the task ends on Ctrl-C, which closes the channel for the update runner.
pub fn spawn_polling(bot: Bot, sender: mpsc::Sender<InboundEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(event_name = "system.telegram.polling_start", "starting Telegram long polling");

        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(forward_message))
            .branch(Update::filter_callback_query().endpoint(forward_callback));

        Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![sender])
            .default_handler(|_| async {})
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        info!(event_name = "system.telegram.polling_stopped", "Telegram long polling stopped");
    })
}

async fn forward_message(msg: Message, sender: mpsc::Sender<InboundEvent>) -> ResponseResult<()> {
    let (Some(from), Some(text)) = (msg.from.as_ref(), msg.text()) else {
        debug!(chat_id = msg.chat.id.0, "ignoring message without sender or text");
        return Ok(());
    };
    let Some(user_id) = user_id(from) else {
        return Ok(());
    };

    let event = InboundEvent::Message(InboundMessage {
        user_id,
        text: text.to_owned(),
        sender: sender_profile(from),
    });
    forward(&sender, event).await;
    Ok(())
}

async fn forward_callback(
    bot: Bot,
    query: CallbackQuery,
    sender: mpsc::Sender<InboundEvent>,
) -> ResponseResult<()> {
    if let Err(error) = bot.answer_callback_query(query.id.clone()).await {
        warn!(error = %error, "could not acknowledge callback query");
    }

    let (Some(data), Some(user_id)) = (query.data.as_ref(), user_id(&query.from)) else {
        return Ok(());
    };

    let event = InboundEvent::Callback(InboundCallback {
        user_id,
        data: data.clone(),
        sender: sender_profile(&query.from),
    });
    forward(&sender, event).await;
    Ok(())
}

async fn forward(sender: &mpsc::Sender<InboundEvent>, event: InboundEvent) {
    if sender.send(event).await.is_err() {
        warn!("update channel closed, dropping update");
    }
}

fn user_id(user: &teloxide::types::User) -> Option<UserId> {
    i64::try_from(user.id.0).ok().map(UserId)
}

fn sender_profile(user: &teloxide::types::User) -> SenderProfile {
    SenderProfile { display_name: user.full_name(), handle: user.username.clone() }
}
