use once_cell::sync::Lazy;
use regex::Regex;

static NAME_CHARSET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9/_.+-]+$").unwrap());

/// Character set allowed in a session name, per the relay's naming rules.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && NAME_CHARSET.is_match(name)
}

/// Next unused `u<N>` auto-name given a predicate over names currently taken.
/// `ticket` is the last-used candidate counter; the caller persists it
/// across calls. Pre-increments before formatting, so a fresh `ticket: 0`
/// yields `u1` first, matching the original's pre-increment `++ticket_`.
pub fn next_auto_name(ticket: &mut u64, is_taken: impl Fn(&str) -> bool) -> String {
    loop {
        *ticket += 1;
        let candidate = format!("u{}", *ticket);
        if !is_taken(&candidate) {
            return candidate;
        }
    }
}
