//! Shell-like tokenization of command text.

#[derive(Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

/// Splits text into whitespace-separated tokens.
///
/// Handles:
/// - Any Unicode whitespace as a separator
/// - Quoted strings (single and double quotes), including empty ones (`""`)
/// - Backslash escapes outside quotes and inside double quotes
///
/// An unterminated quote runs to the end of the input.
pub fn shell_split(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote = Quote::None;
    // Tracks `""` so an explicitly empty token survives.
    let mut has_token = false;
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (Quote::Single, '\'') | (Quote::Double, '"') => quote = Quote::None,
            (Quote::None, '\'') => {
                quote = Quote::Single;
                has_token = true;
            }
            (Quote::None, '"') => {
                quote = Quote::Double;
                has_token = true;
            }
            (Quote::None | Quote::Double, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                has_token = true;
            }
            (Quote::None, c) if c.is_whitespace() => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            (_, c) => {
                current.push(c);
                has_token = true;
            }
        }
    }

    if has_token {
        tokens.push(current);
    }

    tokens
}

/// Splits off the first whitespace-delimited word.
///
/// Returns the word and the remainder with leading whitespace removed.
pub fn split_first_word(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.find(char::is_whitespace) {
        Some(end) => (&input[..end], input[end..].trim_start()),
        None => (input, ""),
    }
}
