//! Typed argument schema of a command.

use std::collections::HashSet;
use std::fmt;

use serde_json::Value;

use crate::error::SchemaError;

/// Built-in primitive argument types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// Any token.
    String,
    /// An integer or floating point number.
    Number,
    /// `true`/`false`, `yes`/`no`, `on`/`off`, `1`/`0`.
    Boolean,
}

impl Primitive {
    /// Returns the name used in usage lines and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Number => "number",
            Primitive::Boolean => "boolean",
        }
    }
}

/// The declared type of an argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgumentType {
    /// A built-in primitive.
    Primitive(Primitive),
    /// A custom type registered in the [`TypeRegistry`](super::resolver::TypeRegistry).
    Custom(String),
    /// Satisfied by the first candidate that accepts the token.
    AnyOf(Vec<ArgumentType>),
}

impl ArgumentType {
    /// Shorthand for [`Primitive::String`].
    pub const STRING: ArgumentType = ArgumentType::Primitive(Primitive::String);
    /// Shorthand for [`Primitive::Number`].
    pub const NUMBER: ArgumentType = ArgumentType::Primitive(Primitive::Number);
    /// Shorthand for [`Primitive::Boolean`].
    pub const BOOLEAN: ArgumentType = ArgumentType::Primitive(Primitive::Boolean);

    /// A custom registered type.
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }

    /// An OR chain of candidates.
    pub fn any_of(candidates: impl IntoIterator<Item = ArgumentType>) -> Self {
        Self::AnyOf(candidates.into_iter().collect())
    }

    /// Returns `true` for an OR chain.
    pub fn is_chain(&self) -> bool {
        matches!(self, ArgumentType::AnyOf(_))
    }

    /// Returns `true` if the type is (or only contains) the boolean primitive.
    pub(crate) fn is_boolean(&self) -> bool {
        match self {
            ArgumentType::Primitive(Primitive::Boolean) => true,
            ArgumentType::AnyOf(c) => !c.is_empty() && c.iter().all(ArgumentType::is_boolean),
            _ => false,
        }
    }

    /// Names of every custom type referenced by this type.
    pub(crate) fn custom_names(&self) -> Vec<&str> {
        match self {
            ArgumentType::Primitive(_) => Vec::new(),
            ArgumentType::Custom(name) => vec![name.as_str()],
            ArgumentType::AnyOf(c) => c.iter().flat_map(ArgumentType::custom_names).collect(),
        }
    }
}

impl fmt::Display for ArgumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentType::Primitive(p) => f.write_str(p.as_str()),
            ArgumentType::Custom(name) => f.write_str(name),
            ArgumentType::AnyOf(candidates) => {
                for (i, c) in candidates.iter().enumerate() {
                    if i > 0 {
                        f.write_str("|")?;
                    }
                    write!(f, "{c}")?;
                }
                Ok(())
            }
        }
    }
}

/// One argument of a command.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    /// Name used for flag binding and lookup.
    pub name: String,
    /// Shown by the help command.
    pub description: Option<String>,
    /// Declared type.
    pub kind: ArgumentType,
    /// Whether resolution fails when no value is bound.
    pub required: bool,
    /// Value used when nothing is bound.
    pub default: Option<Value>,
    /// Single character flag (`-a value`).
    pub short: Option<char>,
    /// Consumes every remaining positional token.
    pub rest: bool,
}

impl Argument {
    /// Creates a required argument.
    pub fn required(name: impl Into<String>, kind: ArgumentType) -> Self {
        Self {
            name: name.into(),
            description: None,
            kind,
            required: true,
            default: None,
            short: None,
            rest: false,
        }
    }

    /// Creates an optional argument.
    pub fn optional(name: impl Into<String>, kind: ArgumentType) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    /// Sets the description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the default value. Only meaningful for optional arguments.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets the short flag.
    pub fn short(mut self, flag: char) -> Self {
        self.short = Some(flag);
        self
    }

    /// Makes the argument consume the remaining input.
    pub fn rest(mut self) -> Self {
        self.rest = true;
        self
    }

    /// Renders the argument for a usage line: `<name:type>` or `[name:type]`.
    pub fn usage(&self) -> String {
        let dots = if self.rest { "..." } else { "" };
        if self.required {
            format!("<{}:{}{dots}>", self.name, self.kind)
        } else {
            format!("[{}:{}{dots}]", self.name, self.kind)
        }
    }
}

/// Validates an argument list.
///
/// Called whenever an argument decorator is applied, so a malformed schema is
/// rejected while the command is being defined rather than at dispatch.
pub fn validate_schema(args: &[Argument]) -> Result<(), SchemaError> {
    let mut names = HashSet::new();
    let mut shorts = HashSet::new();

    for (i, arg) in args.iter().enumerate() {
        if arg.name.is_empty() || arg.name.chars().any(char::is_whitespace) {
            return Err(SchemaError::InvalidName(arg.name.clone()));
        }
        if !names.insert(arg.name.to_lowercase()) {
            return Err(SchemaError::DuplicateArgument(arg.name.clone()));
        }
        if let Some(flag) = arg.short
            && !shorts.insert(flag)
        {
            return Err(SchemaError::DuplicateShort {
                flag,
                argument: arg.name.clone(),
            });
        }
        if arg.required && arg.kind.is_chain() {
            return Err(SchemaError::RequiredAnyOf(arg.name.clone()));
        }
        if arg.required && arg.default.is_some() {
            return Err(SchemaError::RequiredWithDefault(arg.name.clone()));
        }
        if arg.rest && i + 1 != args.len() {
            return Err(SchemaError::RestNotLast(arg.name.clone()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_rendering() {
        let amount = Argument::required("amount", ArgumentType::NUMBER);
        assert_eq!(amount.usage(), "<amount:number>");

        let target = Argument::optional(
            "target",
            ArgumentType::any_of([ArgumentType::custom("user"), ArgumentType::STRING]),
        );
        assert_eq!(target.usage(), "[target:user|string]");

        let text = Argument::optional("text", ArgumentType::STRING).rest();
        assert_eq!(text.usage(), "[text:string...]");
    }

    #[test]
    fn test_required_or_chain_rejected() {
        let args = [Argument::required(
            "target",
            ArgumentType::any_of([ArgumentType::NUMBER, ArgumentType::STRING]),
        )];
        assert_eq!(
            validate_schema(&args),
            Err(SchemaError::RequiredAnyOf("target".into()))
        );
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let args = [
            Argument::required("a", ArgumentType::STRING),
            Argument::optional("A", ArgumentType::NUMBER),
        ];
        assert_eq!(
            validate_schema(&args),
            Err(SchemaError::DuplicateArgument("A".into()))
        );
    }

    #[test]
    fn test_rest_must_be_last() {
        let args = [
            Argument::optional("text", ArgumentType::STRING).rest(),
            Argument::optional("n", ArgumentType::NUMBER),
        ];
        assert_eq!(
            validate_schema(&args),
            Err(SchemaError::RestNotLast("text".into()))
        );
    }

    #[test]
    fn test_required_default_rejected() {
        let args = [Argument::required("n", ArgumentType::NUMBER).default_value(1)];
        assert!(matches!(
            validate_schema(&args),
            Err(SchemaError::RequiredWithDefault(_))
        ));
    }

    #[test]
    fn test_valid_schema() {
        let args = [
            Argument::required("amount", ArgumentType::NUMBER).short('a'),
            Argument::optional("silent", ArgumentType::BOOLEAN)
                .short('s')
                .default_value(false),
            Argument::optional("reason", ArgumentType::STRING).rest(),
        ];
        assert!(validate_schema(&args).is_ok());
    }
}
