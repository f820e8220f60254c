//! Admin command handlers (private chat only).

use teloxide::types::Message;

use linkguard_core::{
    domain::ChatId,
    messaging::paginate_list,
    validate::{validate_domain, validate_keyword, validate_prompt},
    Error,
};

use crate::router::AppState;

const MAX_MESSAGE_LEN: usize = 4000;

pub async fn handle_admin_command(msg: &Message, text: &str, state: &AppState) {
    let (cmd, args) = parse_command(text);
    let chat = ChatId(msg.chat.id.0);
    let args = args.trim();

    match cmd.as_str() {
        "add" => add_keyword(chat, args, state).await,
        "delete" => delete_keyword(chat, args, state).await,
        "list" => list_keywords(chat, state).await,
        "deletecontaining" => delete_containing(chat, args, state).await,
        "addwhite" => add_whitelist(chat, args, state).await,
        "delwhite" => delete_whitelist(chat, args, state).await,
        "listwhite" => list_whitelist(chat, state).await,
        "prompt" => handle_prompt(chat, args, state).await,
        _ => send(state, chat, "Unknown command.").await,
    }
}

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

async fn add_keyword(chat: ChatId, args: &str, state: &AppState) {
    if let Err(e) = validate_keyword(args) {
        send(state, chat, &user_message(&e)).await;
        return;
    }

    let keyword = state.filter.canonical_keyword(args);
    match state.store.keyword_exists(&keyword) {
        Ok(true) => send(state, chat, &format!("Keyword '{keyword}' already exists.")).await,
        Ok(false) => match state.filter.add_keyword(args) {
            Ok(stored) => send(state, chat, &format!("Keyword '{stored}' added.")).await,
            Err(e) => store_failure(state, chat, "adding the keyword", &e).await,
        },
        Err(e) => store_failure(state, chat, "checking the keyword", &e).await,
    }
}

async fn delete_keyword(chat: ChatId, args: &str, state: &AppState) {
    if args.is_empty() {
        send(state, chat, "Please provide a keyword to delete.").await;
        return;
    }

    let keyword = state.filter.canonical_keyword(args);
    match state.store.remove_keyword(&keyword) {
        Ok(true) => send(state, chat, &format!("Keyword '{keyword}' deleted.")).await,
        Ok(false) => suggest_similar(chat, &keyword, state).await,
        Err(e) => store_failure(state, chat, "deleting the keyword", &e).await,
    }
}

async fn suggest_similar(chat: ChatId, keyword: &str, state: &AppState) {
    match state.store.search_keywords(keyword) {
        Ok(similar) if !similar.is_empty() => {
            let prefix =
                format!("No exact match for '{keyword}'.\n\nSimilar keywords:");
            send_pages(state, chat, &prefix, &similar).await;
        }
        Ok(_) => send(state, chat, &format!("Keyword '{keyword}' does not exist.")).await,
        Err(e) => store_failure(state, chat, "searching keywords", &e).await,
    }
}

async fn list_keywords(chat: ChatId, state: &AppState) {
    match state.store.list_keywords() {
        Ok(keywords) if keywords.is_empty() => send(state, chat, "The keyword list is empty.").await,
        Ok(keywords) => send_pages(state, chat, "Current keywords:", &keywords).await,
        Err(e) => store_failure(state, chat, "listing keywords", &e).await,
    }
}

async fn delete_containing(chat: ChatId, args: &str, state: &AppState) {
    if args.is_empty() {
        send(state, chat, "Please provide a substring to delete by.").await;
        return;
    }

    match state.store.remove_keywords_containing(args) {
        Ok(removed) if removed.is_empty() => {
            send(state, chat, &format!("No keywords containing '{args}'.")).await;
        }
        Ok(removed) => {
            let prefix = format!("Deleted keywords containing '{args}':");
            send_pages(state, chat, &prefix, &removed).await;
        }
        Err(e) => store_failure(state, chat, "deleting keywords", &e).await,
    }
}

async fn add_whitelist(chat: ChatId, args: &str, state: &AppState) {
    if let Err(e) = validate_domain(args) {
        send(state, chat, &user_message(&e)).await;
        return;
    }

    let domain = args.trim().to_lowercase();
    match state.store.whitelist_exists(&domain) {
        Ok(true) => send(state, chat, &format!("Domain '{domain}' is already whitelisted.")).await,
        Ok(false) => match state.store.add_whitelist(&domain) {
            Ok(()) => send(state, chat, &format!("Domain '{domain}' added to the whitelist.")).await,
            Err(e) => store_failure(state, chat, "updating the whitelist", &e).await,
        },
        Err(e) => store_failure(state, chat, "checking the whitelist", &e).await,
    }
}

async fn delete_whitelist(chat: ChatId, args: &str, state: &AppState) {
    if let Err(e) = validate_domain(args) {
        send(state, chat, &user_message(&e)).await;
        return;
    }

    let domain = args.trim().to_lowercase();
    match state.store.remove_whitelist(&domain) {
        Ok(true) => {
            send(state, chat, &format!("Domain '{domain}' removed from the whitelist.")).await;
        }
        Ok(false) => send(state, chat, &format!("Domain '{domain}' is not whitelisted.")).await,
        Err(e) => store_failure(state, chat, "updating the whitelist", &e).await,
    }
}

async fn list_whitelist(chat: ChatId, state: &AppState) {
    match state.store.list_whitelist() {
        Ok(domains) if domains.is_empty() => send(state, chat, "The whitelist is empty.").await,
        Ok(domains) => send_pages(state, chat, "Whitelisted domains:", &domains).await,
        Err(e) => store_failure(state, chat, "listing the whitelist", &e).await,
    }
}

async fn handle_prompt(chat: ChatId, args: &str, state: &AppState) {
    const USAGE: &str =
        "Usage: /prompt set <trigger> <reply>\n/prompt delete <trigger>\n/prompt list";

    let mut parts = args.splitn(2, char::is_whitespace);
    let sub = parts.next().unwrap_or("").to_lowercase();
    let rest = parts.next().unwrap_or("").trim();

    match sub.as_str() {
        "set" => {
            let mut kv = rest.splitn(2, char::is_whitespace);
            let (Some(prompt), Some(reply)) = (kv.next(), kv.next()) else {
                send(state, chat, "Please provide both a trigger and a reply.").await;
                return;
            };
            if let Err(e) = validate_prompt(prompt, reply) {
                send(state, chat, &user_message(&e)).await;
                return;
            }
            match state.store.set_prompt_reply(prompt, reply) {
                Ok(()) => send(state, chat, &format!("Reply for trigger '{prompt}' set.")).await,
                Err(e) => store_failure(state, chat, "saving the reply", &e).await,
            }
        }
        "delete" => {
            if rest.is_empty() {
                send(state, chat, "Usage: /prompt delete <trigger>").await;
                return;
            }
            match state.store.delete_prompt_reply(rest) {
                Ok(true) => send(state, chat, &format!("Reply for trigger '{rest}' deleted.")).await,
                Ok(false) => send(state, chat, &format!("No reply set for trigger '{rest}'.")).await,
                Err(e) => store_failure(state, chat, "deleting the reply", &e).await,
            }
        }
        "list" => match state.store.list_prompt_replies() {
            Ok(replies) if replies.is_empty() => {
                send(state, chat, "No auto-replies configured.").await;
            }
            Ok(replies) => {
                let mut out = String::from("Configured auto-replies:\n");
                for (prompt, reply) in replies {
                    out.push_str(&format!("trigger: {prompt}\nreply: {reply}\n\n"));
                }
                send(state, chat, &out).await;
            }
            Err(e) => store_failure(state, chat, "listing replies", &e).await,
        },
        _ => send(state, chat, USAGE).await,
    }
}

// ============== helpers ==============

fn user_message(e: &Error) -> String {
    e.to_string()
}

async fn send(state: &AppState, chat: ChatId, text: &str) {
    if let Err(e) = state.messenger.send_text(chat, text).await {
        eprintln!("[admin] failed to send reply: {e}");
    }
}

async fn send_pages(state: &AppState, chat: ChatId, prefix: &str, items: &[String]) {
    for page in paginate_list(prefix, items, MAX_MESSAGE_LEN) {
        send(state, chat, &page).await;
    }
}

async fn store_failure(state: &AppState, chat: ChatId, action: &str, e: &Error) {
    eprintln!("[admin] store error while {action}: {e}");
    send(state, chat, &format!("An error occurred while {action}.")).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_parsing_strips_slash_and_bot_name() {
        assert_eq!(
            parse_command("/add@guardbot spam link"),
            ("add".to_string(), "spam link".to_string())
        );
        assert_eq!(parse_command("/list"), ("list".to_string(), String::new()));
        assert_eq!(
            parse_command("/PROMPT set hi hello"),
            ("prompt".to_string(), "set hi hello".to_string())
        );
    }
}
