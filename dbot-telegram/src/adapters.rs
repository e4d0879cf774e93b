//! Adapters from Telegram (teloxide) types to dbot_core types.
//! Depends only on teloxide and dbot_core type definitions.

use dbot_core::{
    CallbackQuery, ChosenInlineResult, IncomingMessage, InlineQuery, Update, UpdateKind, User,
};
use teloxide::types::UpdateKind as TgUpdateKind;

/// Wraps a teloxide User for conversion to core [`User`].
pub struct TelegramUserWrapper<'a>(pub &'a teloxide::types::User);

impl TelegramUserWrapper<'_> {
    pub fn to_core(&self) -> User {
        User {
            id: self.0.id.0 as i64,
            username: self.0.username.clone(),
            first_name: Some(self.0.first_name.clone()),
            last_name: self.0.last_name.clone(),
        }
    }
}

/// Wraps a teloxide Update for conversion to core [`Update`].
///
/// Chat key: the update's chat, else the sender's user id (inline queries), else 0 for updates that
/// carry neither (polls).
pub struct TelegramUpdateWrapper<'a>(pub &'a teloxide::types::Update);

impl TelegramUpdateWrapper<'_> {
    pub fn to_core(&self) -> Update {
        let update = self.0;
        let chat_id = update
            .chat()
            .map(|chat| chat.id.0)
            .or_else(|| update.from().map(|u| u.id.0 as i64))
            .unwrap_or(0);
        Update::new(update.id.0, chat_id, self.kind())
    }

    fn kind(&self) -> UpdateKind {
        match &self.0.kind {
            TgUpdateKind::Message(msg) => UpdateKind::Message(IncomingMessage {
                message_id: msg.id.0,
                from: msg.from.as_ref().map(|u| TelegramUserWrapper(u).to_core()),
                text: msg.text().map(str::to_string),
            }),
            TgUpdateKind::CallbackQuery(q) => UpdateKind::CallbackQuery(CallbackQuery {
                id: q.id.0.clone(),
                from: TelegramUserWrapper(&q.from).to_core(),
                data: q.data.clone(),
                message_id: q.message.as_ref().map(|m| m.id().0),
            }),
            TgUpdateKind::InlineQuery(q) => UpdateKind::InlineQuery(InlineQuery {
                from: TelegramUserWrapper(&q.from).to_core(),
                query: q.query.clone(),
            }),
            TgUpdateKind::ChosenInlineResult(r) => UpdateKind::ChosenInlineResult(ChosenInlineResult {
                from: TelegramUserWrapper(&r.from).to_core(),
                query: r.query.clone(),
            }),
            other => UpdateKind::Other(kind_name(other).to_string()),
        }
    }
}

fn kind_name(kind: &TgUpdateKind) -> &'static str {
    match kind {
        TgUpdateKind::EditedMessage(_) => "edited_message",
        TgUpdateKind::ChannelPost(_) => "channel_post",
        TgUpdateKind::EditedChannelPost(_) => "edited_channel_post",
        TgUpdateKind::Poll(_) => "poll",
        TgUpdateKind::PollAnswer(_) => "poll_answer",
        TgUpdateKind::MyChatMember(_) => "my_chat_member",
        TgUpdateKind::ChatMember(_) => "chat_member",
        TgUpdateKind::ChatJoinRequest(_) => "chat_join_request",
        _ => "other",
    }
}
