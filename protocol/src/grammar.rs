//! Line grammar shared by the relay (directed-message/wildcard routing) and
//! the broker adapter (overlay request/response/notify forms).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::WireError;

/// Splits a relay input line of the form `who << body` at the first run of
/// `<` characters. Returns `None` if the line contains no `<` at all.
///
/// `who` is the trimmed text before the run; `body` is the text after the
/// run with a single leading space stripped.
pub fn split_directed(line: &str) -> Option<(String, String)> {
    let lt_pos = line.find('<')?;
    let who = line[..lt_pos].trim().to_string();

    let bytes = line.as_bytes();
    let mut mt = lt_pos;
    while mt < bytes.len() && bytes[mt] == b'<' {
        mt += 1;
    }
    let mut body = &line[mt..];
    if let Some(stripped) = body.strip_prefix(' ') {
        body = stripped;
    }
    Some((who, body.to_string()))
}

/// True when `who` should be treated as a wildcard broadcast target.
pub fn is_wildcard(who: &str) -> bool {
    who.contains('*') || who.contains('?')
}

/// Compiles a `*`/`?` wildcard pattern into an anchored, full-match regex.
pub fn wildcard_to_regex(pattern: &str) -> Result<Regex, WireError> {
    let mut translated = String::with_capacity(pattern.len() * 2);
    for c in pattern.chars() {
        match c {
            '.' => translated.push_str("\\."),
            '*' => translated.push_str(".*"),
            '?' => translated.push('.'),
            other => translated.push(other),
        }
    }
    Regex::new(&format!("^{}$", translated)).map_err(|_| WireError::InvalidWildcard(pattern.to_string()))
}

static MESSAGE_FROM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\S+) >> (.+)$").unwrap());
static CONFIRM_REQUEST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(accept|reject) request ([0-9]+ )?\{(.+)\}$").unwrap());
static RESPONSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^response ([0-9]+) (.+) \{(.*)\}$").unwrap());
static NOTIFY_ASSIGN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^notify assign request ([0-9]+) to (\S+)$").unwrap());
static NOTIFY_STATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^notify (\S+) state (idle|busy)$").unwrap());
static NOTIFY_CAPACITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^notify capacity ([0-9]+) ?(.*)$").unwrap());
static CONFIRM_PROTOCOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(accept|reject) protocol (.+)$").unwrap());

/// One fully-parsed line received by the broker adapter, before overlay dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundLine {
    /// `<sender> >> <payload>` — a chat frame, possibly from the broker.
    Chat { sender: String, payload: String },
    /// `% <payload>` — system reply.
    SystemReply(String),
    /// `# <payload>` — system notification.
    SystemNotification(String),
    /// Line matched none of the above top-level shapes.
    Unrecognized(String),
}

pub fn parse_inbound(line: &str) -> InboundLine {
    if let Some(caps) = MESSAGE_FROM.captures(line) {
        return InboundLine::Chat {
            sender: caps[1].to_string(),
            payload: caps[2].to_string(),
        };
    }
    if let Some(rest) = line.strip_prefix("% ") {
        return InboundLine::SystemReply(rest.to_string());
    }
    if let Some(rest) = line.strip_prefix("# ") {
        return InboundLine::SystemNotification(rest.to_string());
    }
    InboundLine::Unrecognized(line.to_string())
}

/// One parsed overlay form, carried inside a chat payload from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayMessage {
    ConfirmRequest { accepted: bool, id: Option<u64>, command: String },
    Response { id: u64, code: String, output: String },
    NotifyState { worker: String, busy: bool },
    NotifyAssign { id: u64, worker: String },
    NotifyCapacity { capacity: u64, details: String },
    ConfirmProtocol { accepted: bool, name: String },
}

/// Matches `message` against the overlay grammar in the same priority order
/// as the forms are tried against one another (earlier forms shadow later
/// ones on the rare input that could match more than one).
pub fn parse_overlay(message: &str) -> Option<OverlayMessage> {
    if let Some(caps) = CONFIRM_REQUEST.captures(message) {
        let accepted = &caps[1] == "accept";
        let id = caps.get(2).map(|m| m.as_str().trim().parse::<u64>().unwrap());
        let command = caps[3].to_string();
        return Some(OverlayMessage::ConfirmRequest {
            accepted,
            id: if accepted { id } else { None },
            command,
        });
    }
    if let Some(caps) = RESPONSE.captures(message) {
        return Some(OverlayMessage::Response {
            id: caps[1].parse().unwrap(),
            code: caps[2].to_string(),
            output: caps[3].to_string(),
        });
    }
    if let Some(caps) = NOTIFY_STATE.captures(message) {
        return Some(OverlayMessage::NotifyState {
            worker: caps[1].to_string(),
            busy: &caps[2] == "busy",
        });
    }
    if let Some(caps) = NOTIFY_ASSIGN.captures(message) {
        return Some(OverlayMessage::NotifyAssign {
            id: caps[1].parse().unwrap(),
            worker: caps[2].to_string(),
        });
    }
    if let Some(caps) = NOTIFY_CAPACITY.captures(message) {
        return Some(OverlayMessage::NotifyCapacity {
            capacity: caps[1].parse().unwrap(),
            details: caps[2].to_string(),
        });
    }
    if let Some(caps) = CONFIRM_PROTOCOL.captures(message) {
        return Some(OverlayMessage::ConfirmProtocol {
            accepted: &caps[1] == "accept",
            name: caps[2].to_string(),
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_directed_message() {
        let (who, body) = split_directed("bob << hi").unwrap();
        assert_eq!(who, "bob");
        assert_eq!(body, "hi");
    }

    #[test]
    fn tolerates_multiple_angle_brackets_and_no_space() {
        let (who, body) = split_directed("bob <<<hi").unwrap();
        assert_eq!(who, "bob");
        assert_eq!(body, "hi");
    }

    #[test]
    fn whitespace_only_body_becomes_empty_after_one_strip() {
        let (_, body) = split_directed("bob << ").unwrap();
        assert_eq!(body, "");
    }

    #[test]
    fn wildcard_translates_star_and_question_mark() {
        let re = wildcard_to_regex("b*.1?").unwrap();
        assert!(re.is_match("bob.1x"));
        assert!(!re.is_match("bob.12"));
    }

    #[test]
    fn parses_accept_request_with_id() {
        let msg = parse_overlay("accept request 7 {ls}").unwrap();
        assert_eq!(
            msg,
            OverlayMessage::ConfirmRequest {
                accepted: true,
                id: Some(7),
                command: "ls".to_string(),
            }
        );
    }

    #[test]
    fn parses_reject_request_without_id() {
        let msg = parse_overlay("reject request {ls}").unwrap();
        assert_eq!(
            msg,
            OverlayMessage::ConfirmRequest {
                accepted: false,
                id: None,
                command: "ls".to_string(),
            }
        );
    }

    #[test]
    fn parses_response_with_non_numeric_code() {
        let msg = parse_overlay("response 9 timeout {v}").unwrap();
        assert_eq!(
            msg,
            OverlayMessage::Response {
                id: 9,
                code: "timeout".to_string(),
                output: "v".to_string(),
            }
        );
    }

    #[test]
    fn top_level_dispatch_recognizes_all_shapes() {
        assert_eq!(
            parse_inbound("broker >> accept protocol chat"),
            InboundLine::Chat {
                sender: "broker".to_string(),
                payload: "accept protocol chat".to_string(),
            }
        );
        assert_eq!(parse_inbound("% name: u1"), InboundLine::SystemReply("name: u1".to_string()));
        assert_eq!(
            parse_inbound("# login: u1"),
            InboundLine::SystemNotification("login: u1".to_string())
        );
    }
}
