/// Escapes a string for transport inside a `{…}` overlay payload.
///
/// Mirrors the adapter's `decode_output` in reverse order, so ordinary content
/// (containing literal backslashes, tabs, or newlines but no hand-crafted
/// escape sequences) round-trips through `decode_output(encode_output(s)) == s`.
pub fn encode_output(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('\t', "\\t")
        .replace('\n', "\\n")
}

/// Decodes the `\\n`, `\\t`, `\\\\` escapes used by the overlay protocol.
///
/// Applies the substitutions in the same order as the original adapter:
/// newline, then tab, then backslash. This order is a faithful port, not a
/// fix — a literal `\t` two-character sequence in the input does not survive
/// a round trip, matching the original's behavior.
pub fn decode_output(encoded: &str) -> String {
    encoded
        .replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\\\", "\\")
}
