//! Group moderation path: filter check, offending-message removal, member
//! bans and the keyword auto-reply pass.

use std::{sync::Arc, time::Duration};

use teloxide::types::Message;

use linkguard_core::{
    domain::{MessageRef, UserId},
    messaging::{message_ref, MessagingPort},
};

use crate::router::AppState;

#[derive(Debug, PartialEq, Eq)]
enum GroupAction {
    /// Admin reply-command: remove the target message and kick its author.
    Ban,
    /// Admin chatter skips moderation but still gets auto-replies.
    AutoReply,
    /// Everyone else goes through the filter first.
    Moderate,
}

fn classify(is_admin: bool, text: &str) -> GroupAction {
    if !is_admin {
        return GroupAction::Moderate;
    }
    if is_ban_command(text) {
        GroupAction::Ban
    } else {
        GroupAction::AutoReply
    }
}

fn is_ban_command(text: &str) -> bool {
    let first = text.trim().split_whitespace().next().unwrap_or("");
    first.split('@').next() == Some("/ban")
}

pub async fn process_group_message(msg: &Message, text: &str, state: &AppState) {
    let from_id = msg.from().map(|u| u.id.0 as i64);
    let is_admin = from_id == Some(state.cfg.admin_id);

    if state.cfg.debug {
        println!(
            "[group] checking message {} in chat {}",
            msg.id.0, msg.chat.id.0
        );
    }

    match classify(is_admin, text) {
        GroupAction::Ban => handle_ban(msg, state).await,
        GroupAction::AutoReply => send_auto_reply(msg, text, state).await,
        GroupAction::Moderate => {
            match state.filter.check(text) {
                Ok(decision) if decision.filtered => {
                    remove_offending(msg, state).await;
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    // A broken store must not silence the chat; fall through to replies.
                    eprintln!("[group] filter check failed: {e}");
                }
            }
            send_auto_reply(msg, text, state).await;
        }
    }
}

async fn handle_ban(msg: &Message, state: &AppState) {
    let Some(target) = msg.reply_to_message() else {
        return;
    };
    let Some(user) = target.from() else {
        return;
    };
    let display_name = user
        .username
        .clone()
        .unwrap_or_else(|| user.full_name());

    ban_member(
        state.messenger.clone(),
        message_ref(msg.chat.id.0, target.id.0),
        message_ref(msg.chat.id.0, msg.id.0),
        UserId(user.id.0 as i64),
        &display_name,
        state.cfg.notice_ttl,
    )
    .await;
}

/// Delete the replied-to message, kick its author and post a notice; the
/// notice and the admin's command clean themselves up after the TTL.
async fn ban_member(
    messenger: Arc<dyn MessagingPort>,
    target: MessageRef,
    command: MessageRef,
    user: UserId,
    display_name: &str,
    notice_ttl: Duration,
) {
    let chat_id = target.chat_id;

    if let Err(e) = messenger.delete_message(target).await {
        eprintln!("[group] failed to delete banned message: {e}");
    }
    if let Err(e) = messenger.ban_user(chat_id, user).await {
        eprintln!("[group] failed to ban user {}: {e}", user.0);
        return;
    }

    let notice = format!("User {display_name} has been banned and removed from the group.");
    match messenger.send_text(chat_id, &notice).await {
        Ok(sent) => {
            schedule_delete(messenger.clone(), sent, notice_ttl);
            schedule_delete(messenger, command, notice_ttl);
        }
        Err(e) => eprintln!("[group] failed to send ban notice: {e}"),
    }
}

async fn remove_offending(msg: &Message, state: &AppState) {
    let offending = message_ref(msg.chat.id.0, msg.id.0);

    if let Err(e) = state.messenger.delete_message(offending).await {
        eprintln!("[group] failed to delete message {}: {e}", msg.id.0);
    }

    let notice = "This message was removed: the same link or keyword cannot be posted twice.";
    match state
        .messenger
        .send_text(offending.chat_id, notice)
        .await
    {
        Ok(sent) => schedule_delete(state.messenger.clone(), sent, state.cfg.notice_ttl),
        Err(e) => eprintln!("[group] failed to send notice: {e}"),
    }
}

fn schedule_delete(messenger: Arc<dyn MessagingPort>, msg: MessageRef, ttl: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(ttl).await;
        if let Err(e) = messenger.delete_message(msg).await {
            eprintln!("[group] failed to delete notice: {e}");
        }
    });
}

async fn send_auto_reply(msg: &Message, text: &str, state: &AppState) {
    let replies = match state.store.list_prompt_replies() {
        Ok(replies) => replies,
        Err(e) => {
            eprintln!("[group] failed to load auto-replies: {e}");
            return;
        }
    };

    if let Some(reply) = match_reply(text, &replies) {
        let target = message_ref(msg.chat.id.0, msg.id.0);
        if let Err(e) = state.messenger.send_reply(target, reply).await {
            eprintln!("[group] failed to send auto-reply: {e}");
        }
    }
}

/// First trigger contained (case-insensitively) in the text wins. Triggers
/// are stored lowercased.
fn match_reply<'a>(text: &str, replies: &'a [(String, String)]) -> Option<&'a str> {
    let lowered = text.to_lowercase();
    replies
        .iter()
        .find(|(prompt, _)| lowered.contains(prompt.as_str()))
        .map(|(_, reply)| reply.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;
    use linkguard_core::{domain::ChatId, Result};

    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<(i64, String)>>,
        deleted: Mutex<Vec<MessageRef>>,
        banned: Mutex<Vec<(i64, i64)>>,
    }

    #[async_trait]
    impl MessagingPort for RecordingMessenger {
        async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
            self.sent.lock().unwrap().push((chat_id.0, text.to_string()));
            Ok(message_ref(chat_id.0, 900))
        }

        async fn send_reply(&self, reply_to: MessageRef, text: &str) -> Result<MessageRef> {
            self.sent
                .lock()
                .unwrap()
                .push((reply_to.chat_id.0, text.to_string()));
            Ok(message_ref(reply_to.chat_id.0, 901))
        }

        async fn send_markdown(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
            self.sent.lock().unwrap().push((chat_id.0, text.to_string()));
            Ok(message_ref(chat_id.0, 902))
        }

        async fn delete_message(&self, msg: MessageRef) -> Result<()> {
            self.deleted.lock().unwrap().push(msg);
            Ok(())
        }

        async fn ban_user(&self, chat_id: ChatId, user: UserId) -> Result<()> {
            self.banned.lock().unwrap().push((chat_id.0, user.0));
            Ok(())
        }
    }

    #[test]
    fn admin_messages_skip_moderation_but_keep_auto_replies() {
        assert_eq!(classify(true, "gm all"), GroupAction::AutoReply);
        assert_eq!(classify(true, "/ban"), GroupAction::Ban);
        assert_eq!(classify(false, "gm all"), GroupAction::Moderate);
        assert_eq!(classify(false, "/ban"), GroupAction::Moderate);
    }

    #[test]
    fn ban_command_parsing() {
        assert!(is_ban_command("/ban"));
        assert!(is_ban_command("  /ban "));
        assert!(is_ban_command("/ban@guardbot"));
        assert!(!is_ban_command("/banish"));
        assert!(!is_ban_command("ban"));
    }

    #[tokio::test]
    async fn ban_deletes_target_kicks_author_and_posts_notice() {
        let m = Arc::new(RecordingMessenger::default());

        ban_member(
            m.clone(),
            message_ref(-100, 7),
            message_ref(-100, 8),
            UserId(42),
            "spammer",
            Duration::from_secs(600),
        )
        .await;

        assert_eq!(m.deleted.lock().unwrap().as_slice(), [message_ref(-100, 7)]);
        assert_eq!(m.banned.lock().unwrap().as_slice(), [(-100, 42)]);

        let sent = m.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, -100);
        assert!(sent[0].1.contains("spammer"));
    }

    fn replies() -> Vec<(String, String)> {
        vec![
            ("gm".to_string(), "good morning!".to_string()),
            ("price".to_string(), "see the hourly ticker".to_string()),
        ]
    }

    #[test]
    fn first_contained_trigger_wins() {
        let r = replies();
        assert_eq!(match_reply("GM everyone, price?", &r), Some("good morning!"));
    }

    #[test]
    fn matching_is_case_insensitive_containment() {
        let r = replies();
        assert_eq!(
            match_reply("what's the PRICE today", &r),
            Some("see the hourly ticker")
        );
    }

    #[test]
    fn no_trigger_means_no_reply() {
        let r = replies();
        assert_eq!(match_reply("hello there", &r), None);
    }
}
