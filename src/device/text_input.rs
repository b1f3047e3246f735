// `adb shell input text` goes through the device shell and cannot type
// characters outside ASCII; spaces must be sent as `%s`.

/// Returns true if the text contains characters `input text` cannot type.
pub fn contains_non_ascii(text: &str) -> bool {
    !text.is_ascii()
}

/// Escape text for a single `input text` argument.
pub fn escape_for_input(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for ch in text.chars() {
        match ch {
            ' ' => out.push_str("%s"),
            '\\' | '\'' | '"' | '(' | ')' | '&' | '<' | '>' | ';' | '|' | '*' | '~' | '$' | '`'
            | '!' | '?' | '#' | '%' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}
