use std::sync::Arc;

use chat_protocol::{grammar, naming};

use crate::registry::SessionRegistry;
use crate::session::Session;

/// Interprets one complete input line relative to `session`'s current name
/// and registry membership, enqueueing any replies/notifications/routed
/// chat frames this line produces.
pub fn dispatch_line(registry: &SessionRegistry, session: &Arc<Session>, line: &str) {
    if let Some((who, body)) = grammar::split_directed(line) {
        route_chat(registry, session, &who, &body);
        return;
    }

    let mut parts = line.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("").trim();

    match cmd {
        "name" => handle_name(registry, session, rest),
        "who" => handle_who(registry, session, rest),
        "protocol" => handle_protocol(session, rest),
        _ => {} // unknown command tokens are silently ignored
    }
}

fn route_chat(registry: &SessionRegistry, session: &Arc<Session>, who: &str, body: &str) {
    if let Some(remote) = registry.find(who) {
        let _ = remote.send_chat(session.clone(), format!("{} >> {}", session.name(), body));
        return;
    }

    if grammar::is_wildcard(who) {
        let Ok(pattern) = grammar::wildcard_to_regex(who) else {
            let _ = session.send_line("% failed chat: invalid broadcast".to_string());
            return;
        };

        let matched: Vec<Arc<Session>> = registry
            .list()
            .into_iter()
            .filter(|s| pattern.is_match(&s.name()))
            .collect();

        if matched.is_empty() {
            let _ = session.send_line("% failed chat: invalid broadcast".to_string());
            return;
        }

        let names: Vec<String> = matched.iter().map(|s| s.name()).collect();
        let _ = session.send_line(format!("# broadcast: {}", names.join(" ")));
        for remote in matched {
            let _ = remote.send_chat(session.clone(), format!("{} >> {}", session.name(), body));
        }
    } else {
        let _ = session.send_line("% failed chat: invalid client".to_string());
    }
}

fn handle_name(registry: &SessionRegistry, session: &Arc<Session>, requested: &str) {
    let current = session.name();
    if requested.is_empty() || requested == current {
        let _ = session.send_line(format!("% name: {}", current));
        return;
    }

    if naming::is_valid_name(requested) && registry.rename(session, requested) {
        let _ = session.send_line(format!("% name: {}", session.name()));
        for other in registry.list() {
            let _ = other.send_line(format!("# name: {} becomes {}", current, requested));
        }
    } else {
        let _ = session.send_line("% failed name: invalid or duplicate".to_string());
    }
}

fn handle_who(registry: &SessionRegistry, session: &Arc<Session>, requested: &str) {
    if requested.is_empty() {
        let names: Vec<String> = registry.list().iter().map(|s| s.name()).collect();
        let _ = session.send_line(format!("% who: {}", names.join(" ")));
        return;
    }

    match registry.find(requested) {
        Some(remote) => {
            let _ = session.send_line(format!("% who: {} from {}", remote.name(), remote.addr()));
        }
        None => {
            let _ = session.send_line("% failed who: invalid client".to_string());
        }
    }
}

fn handle_protocol(session: &Arc<Session>, version: &str) {
    let version = if version.is_empty() { "0" } else { version };
    if version == "0" {
        let _ = session.send_line(format!("% protocol: {}", version));
    } else {
        let _ = session.send_line("% failed protocol: unsupported".to_string());
    }
}
