//! Prefix detection and command base extraction.

use crate::command::split::split_first_word;

/// A message recognised as a command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// The prefix (or mention) that introduced the command.
    pub prefix: String,
    /// Lower-cased command base, used for lookup.
    pub base: String,
    /// The base as typed.
    pub invoked: String,
    /// Everything after the base, leading whitespace removed.
    pub tail: String,
}

/// Splits messages into prefix, base and tail.
#[derive(Debug, Clone)]
pub struct CommandParser {
    /// Sorted longest first so overlapping prefixes (`!` and `!!`) resolve
    /// to the longer one.
    prefixes: Vec<String>,
    mention: bool,
}

impl CommandParser {
    /// Creates a parser. Empty prefixes are ignored.
    pub fn new<I, S>(prefixes: I, mention: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut prefixes: Vec<String> = prefixes
            .into_iter()
            .map(Into::into)
            .filter(|p| !p.is_empty())
            .collect();
        prefixes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        prefixes.dedup();
        Self { prefixes, mention }
    }

    /// Configured prefixes, longest first.
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Returns `true` if mentions of the bot act as a prefix.
    pub fn mention_enabled(&self) -> bool {
        self.mention
    }

    fn strip_mention<'a>(&self, content: &'a str, bot_id: &str) -> Option<(&'a str, &'a str)> {
        if !self.mention || bot_id.is_empty() {
            return None;
        }
        for form in [format!("<@{bot_id}>"), format!("<@!{bot_id}>")] {
            if let Some(rest) = content.strip_prefix(form.as_str()) {
                let prefix_len = content.len() - rest.len();
                return Some((&content[..prefix_len], rest));
            }
        }
        None
    }

    /// Parses a message.
    ///
    /// Returns `None` when the message does not start with a prefix or the
    /// bot mention, or when nothing follows the prefix.
    pub fn parse(&self, content: &str, bot_id: &str) -> Option<Invocation> {
        let (prefix, rest) = self.strip_mention(content, bot_id).or_else(|| {
            self.prefixes.iter().find_map(|prefix| {
                content
                    .strip_prefix(prefix.as_str())
                    .map(|rest| (prefix.as_str(), rest))
            })
        })?;

        let (base, tail) = split_first_word(rest);
        if base.is_empty() {
            return None;
        }

        Some(Invocation {
            prefix: prefix.to_string(),
            base: base.to_lowercase(),
            invoked: base.to_string(),
            tail: tail.to_string(),
        })
    }
}
