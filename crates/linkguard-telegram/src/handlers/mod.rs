//! Telegram update handlers.
//!
//! Private-chat messages from the admin go to the command handlers; group
//! messages pass the rate limiter and then the moderation path. Everything
//! else is ignored.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use crate::router::AppState;

mod admin;
mod group;

pub async fn handle_message(_bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let from_id = msg.from().map(|u| u.id.0 as i64);

    if msg.chat.is_private() {
        if from_id == Some(state.cfg.admin_id) {
            admin::handle_admin_command(&msg, text, &state).await;
        }
        return Ok(());
    }

    // Group traffic: shed load before touching the store.
    if !state.rate_limiter.allow() {
        return Ok(());
    }

    group::process_group_message(&msg, text, &state).await;
    Ok(())
}
