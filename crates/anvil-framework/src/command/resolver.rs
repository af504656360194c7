//! Argument resolution: binds the raw tail of an invocation to a command's
//! typed argument schema.
//!
//! Tokens are bound in two passes:
//!
//! 1. **Flags** (`--name=value`, `--name value`, `-s value`, or a bare flag
//!    for boolean arguments) bind an argument out of position.
//! 2. **Positional** tokens bind to the remaining arguments in declaration
//!    order; a `rest` argument joins everything that is left.
//!
//! An unknown `--flag` is an error, unless the schema ends in a `rest`
//! argument and the flag lands inside it; `!say --hi` then reads as text.
//!
//! Unbound arguments take their default, or fail when required.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};
use thiserror::Error;

use super::argument::{Argument, ArgumentType, Primitive};
use super::split::shell_split;

// =============================================================================
// Custom type resolvers
// =============================================================================

/// Converts a raw token into a bound value, or `None` when it does not apply.
pub trait TypeResolver: Send + Sync + 'static {
    /// Resolves a single token.
    fn resolve(&self, token: &str) -> Option<Value>;
}

impl<F> TypeResolver for F
where
    F: Fn(&str) -> Option<Value> + Send + Sync + 'static,
{
    fn resolve(&self, token: &str) -> Option<Value> {
        self(token)
    }
}

/// Resolves tokens that match a regular expression.
///
/// The bound value is the first capture group when the pattern has one,
/// otherwise the whole match.
#[derive(Debug, Clone)]
pub struct PatternResolver {
    pattern: Regex,
}

impl PatternResolver {
    /// Creates a resolver from a compiled pattern.
    pub fn new(pattern: Regex) -> Self {
        Self { pattern }
    }

    /// Compiles `pattern` into a resolver.
    pub fn from_pattern(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::new)
    }
}

impl TypeResolver for PatternResolver {
    fn resolve(&self, token: &str) -> Option<Value> {
        let caps = self.pattern.captures(token)?;
        let matched = caps.get(1).or_else(|| caps.get(0))?;
        Some(Value::String(matched.as_str().to_string()))
    }
}

/// Registry of custom argument types, keyed by type name.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    resolvers: HashMap<String, Arc<dyn TypeResolver>>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in mention types:
    ///
    /// | Type      | Accepts                 |
    /// |-----------|-------------------------|
    /// | `user`    | `<@id>`, `<@!id>`, `id` |
    /// | `channel` | `<#id>`                 |
    /// | `role`    | `<@&id>`                |
    pub fn with_builtins() -> Self {
        static USER: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"^(?:<@!?(\d+)>|(\d+))$").expect("user pattern is valid"));
        static CHANNEL: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"^<#(\d+)>$").expect("channel pattern is valid"));
        static ROLE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"^<@&(\d+)>$").expect("role pattern is valid"));

        let mut registry = Self::new();
        // Two alternative groups; bind whichever matched.
        registry.register("user", |token: &str| {
            let caps = USER.captures(token)?;
            let id = caps.get(1).or_else(|| caps.get(2))?;
            Some(Value::String(id.as_str().to_string()))
        });
        registry.register("channel", PatternResolver::new(CHANNEL.clone()));
        registry.register("role", PatternResolver::new(ROLE.clone()));
        registry
    }

    /// Registers (or replaces) a custom type.
    pub fn register(&mut self, name: impl Into<String>, resolver: impl TypeResolver) -> &mut Self {
        self.resolvers
            .insert(name.into().to_lowercase(), Arc::new(resolver));
        self
    }

    /// Returns `true` if the type is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.resolvers.contains_key(&name.to_lowercase())
    }

    /// Returns the resolver for a type.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn TypeResolver>> {
        self.resolvers.get(&name.to_lowercase())
    }

    /// Returns the registered type names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.resolvers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.names())
            .finish()
    }
}

// =============================================================================
// Resolution errors
// =============================================================================

/// Why argument resolution failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    /// A required argument received no value.
    #[error("missing required argument '{argument}'")]
    Missing {
        /// Argument name.
        argument: String,
    },

    /// A token could not be converted to the declared type.
    #[error("'{token}' is not a valid {expected} for argument '{argument}'")]
    TypeMismatch {
        /// Argument name.
        argument: String,
        /// Declared type, rendered.
        expected: String,
        /// Offending token.
        token: String,
    },

    /// A flag had no value after it.
    #[error("flag '{flag}' expects a value")]
    MissingFlagValue {
        /// The flag as written.
        flag: String,
    },

    /// A `--name` flag that matches no argument.
    #[error("unknown flag '{0}'")]
    UnknownFlag(String),

    /// The same argument was bound twice by flags.
    #[error("argument '{0}' was given more than once")]
    Duplicate(String),

    /// An argument type is not registered.
    #[error("argument '{argument}' uses unregistered type '{kind}'")]
    UnknownType {
        /// Argument name.
        argument: String,
        /// The unregistered type.
        kind: String,
    },
}

impl ArgumentError {
    /// Short machine-readable reason.
    pub fn reason(&self) -> &'static str {
        match self {
            ArgumentError::Missing { .. } => "missing-argument",
            ArgumentError::TypeMismatch { .. } => "type-mismatch",
            ArgumentError::MissingFlagValue { .. } => "missing-flag-value",
            ArgumentError::UnknownFlag(_) => "unknown-flag",
            ArgumentError::Duplicate(_) => "duplicate-argument",
            ArgumentError::UnknownType { .. } => "unknown-type",
        }
    }

    /// Name of the argument the error concerns, when there is one.
    pub fn argument(&self) -> Option<&str> {
        match self {
            ArgumentError::Missing { argument }
            | ArgumentError::TypeMismatch { argument, .. }
            | ArgumentError::UnknownType { argument, .. } => Some(argument),
            ArgumentError::Duplicate(argument) => Some(argument),
            ArgumentError::MissingFlagValue { .. } | ArgumentError::UnknownFlag(_) => None,
        }
    }
}

// =============================================================================
// Resolved arguments
// =============================================================================

/// Named argument values bound for one invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: Map<String, Value>,
}

impl Arguments {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw value of an argument.
    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Deserializes an argument into `T`.
    ///
    /// Returns `None` when the argument is unbound or has the wrong shape.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.values
            .get(name)
            .and_then(|v| T::deserialize(v).ok())
    }

    /// Returns a string argument.
    pub fn str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    /// Returns `true` if the argument is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of bound arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns all bound values as a JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub(crate) fn insert(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }
}

// =============================================================================
// Resolution
// =============================================================================

fn parse_primitive(primitive: Primitive, token: &str) -> Option<Value> {
    match primitive {
        Primitive::String => Some(Value::String(token.to_string())),
        Primitive::Number => {
            if let Ok(int) = token.parse::<i64>() {
                return Some(Value::Number(int.into()));
            }
            token
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
        }
        Primitive::Boolean => match token.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(Value::Bool(true)),
            "false" | "no" | "off" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
    }
}

fn convert(
    arg: &Argument,
    kind: &ArgumentType,
    token: &str,
    types: &TypeRegistry,
) -> Result<Option<Value>, ArgumentError> {
    match kind {
        ArgumentType::Primitive(p) => Ok(parse_primitive(*p, token)),
        ArgumentType::Custom(name) => match types.get(name) {
            Some(resolver) => Ok(resolver.resolve(token)),
            None => Err(ArgumentError::UnknownType {
                argument: arg.name.clone(),
                kind: name.clone(),
            }),
        },
        ArgumentType::AnyOf(candidates) => {
            for candidate in candidates {
                if let Some(value) = convert(arg, candidate, token, types)? {
                    return Ok(Some(value));
                }
            }
            Ok(None)
        }
    }
}

fn bind(arg: &Argument, token: &str, types: &TypeRegistry) -> Result<Value, ArgumentError> {
    convert(arg, &arg.kind, token, types)?.ok_or_else(|| ArgumentError::TypeMismatch {
        argument: arg.name.clone(),
        expected: arg.kind.to_string(),
        token: token.to_string(),
    })
}

fn looks_numeric(token: &str) -> bool {
    token.parse::<f64>().is_ok()
}

/// Resolves the raw tail of an invocation against an argument schema.
///
/// # Example
///
/// ```rust,ignore
/// let schema = [Argument::required("amount", ArgumentType::NUMBER)];
/// let args = resolve(&schema, "42", &TypeRegistry::new())?;
/// assert_eq!(args.get::<i64>("amount"), Some(42));
/// ```
pub fn resolve(
    schema: &[Argument],
    tail: &str,
    types: &TypeRegistry,
) -> Result<Arguments, ArgumentError> {
    let tokens = shell_split(tail);
    let mut bound: Vec<Option<Value>> = vec![None; schema.len()];
    // (token, was an unknown `--flag`)
    let mut positional: Vec<(String, bool)> = Vec::new();
    let greedy_tail = schema.last().is_some_and(|a| a.rest);

    let find_long = |name: &str| {
        schema
            .iter()
            .position(|a| a.name.eq_ignore_ascii_case(name))
    };
    let find_short = |flag: char| schema.iter().position(|a| a.short == Some(flag));

    // Pass 1: flags.
    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        let (index, inline, flag) = if let Some(long) = token.strip_prefix("--") {
            if long.is_empty() {
                // `--` ends flag parsing.
                positional.extend(iter.by_ref().map(|token| (token, false)));
                break;
            }
            let (name, inline) = match long.split_once('=') {
                Some((name, value)) => (name, Some(value.to_string())),
                None => (long, None),
            };
            match find_long(name) {
                Some(index) => (index, inline, token.clone()),
                None if greedy_tail => {
                    positional.push((token, true));
                    continue;
                }
                None => return Err(ArgumentError::UnknownFlag(token)),
            }
        } else if let Some(short) = token.strip_prefix('-')
            && !looks_numeric(&token)
            && short.chars().count() == 1
            && let Some(index) = short.chars().next().and_then(find_short)
        {
            (index, None, token.clone())
        } else {
            positional.push((token, false));
            continue;
        };

        let arg = &schema[index];
        if bound[index].is_some() {
            return Err(ArgumentError::Duplicate(arg.name.clone()));
        }

        let value = match inline {
            Some(value) => bind(arg, &value, types)?,
            None if arg.kind.is_boolean() => {
                // A bare boolean flag means `true` unless followed by an explicit literal.
                match iter.peek().and_then(|next| parse_primitive(Primitive::Boolean, next)) {
                    Some(explicit) => {
                        iter.next();
                        explicit
                    }
                    None => Value::Bool(true),
                }
            }
            None => match iter.next() {
                Some(value) => bind(arg, &value, types)?,
                None => return Err(ArgumentError::MissingFlagValue { flag }),
            },
        };
        bound[index] = Some(value);
    }

    // Pass 2: positional binding. Unknown flags are only text inside the
    // greedy argument.
    let mut remaining = positional.into_iter();
    for (index, arg) in schema.iter().enumerate() {
        if bound[index].is_some() {
            continue;
        }
        if arg.rest {
            let rest: Vec<String> = remaining.by_ref().map(|(token, _)| token).collect();
            if !rest.is_empty() {
                bound[index] = Some(bind(arg, &rest.join(" "), types)?);
            }
            continue;
        }
        match remaining.next() {
            Some((token, true)) => return Err(ArgumentError::UnknownFlag(token)),
            Some((token, false)) => bound[index] = Some(bind(arg, &token, types)?),
            None => {}
        }
    }
    if let Some((token, _)) = remaining.find(|(_, unknown_flag)| *unknown_flag) {
        return Err(ArgumentError::UnknownFlag(token));
    }

    let mut arguments = Arguments::new();
    for (arg, value) in schema.iter().zip(bound) {
        match value.or_else(|| arg.default.clone()) {
            Some(value) => arguments.insert(&arg.name, value),
            None if arg.required => {
                return Err(ArgumentError::Missing {
                    argument: arg.name.clone(),
                });
            }
            None => {}
        }
    }

    Ok(arguments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn amount_schema() -> Vec<Argument> {
        vec![Argument::required("amount", ArgumentType::NUMBER)]
    }

    #[test]
    fn test_resolve_required_number() {
        let args = resolve(&amount_schema(), "42", &TypeRegistry::new()).unwrap();
        assert_eq!(args.raw("amount"), Some(&json!(42)));
        assert_eq!(args.get::<i64>("amount"), Some(42));
    }

    #[test]
    fn test_missing_required() {
        let err = resolve(&amount_schema(), "", &TypeRegistry::new()).unwrap_err();
        assert_eq!(
            err,
            ArgumentError::Missing {
                argument: "amount".into()
            }
        );
        assert_eq!(err.argument(), Some("amount"));
    }

    #[test]
    fn test_type_mismatch() {
        let err = resolve(&amount_schema(), "many", &TypeRegistry::new()).unwrap_err();
        assert_eq!(err.reason(), "type-mismatch");
    }

    #[test]
    fn test_float_and_negative_numbers() {
        let args = resolve(&amount_schema(), "-2.5", &TypeRegistry::new()).unwrap();
        assert_eq!(args.get::<f64>("amount"), Some(-2.5));
    }

    #[test]
    fn test_optional_default() {
        let schema = vec![
            Argument::required("amount", ArgumentType::NUMBER),
            Argument::optional("unit", ArgumentType::STRING).default_value("coins"),
        ];
        let args = resolve(&schema, "3", &TypeRegistry::new()).unwrap();
        assert_eq!(args.str("unit"), Some("coins"));

        let args = resolve(&schema, "3 gems", &TypeRegistry::new()).unwrap();
        assert_eq!(args.str("unit"), Some("gems"));
    }

    #[test]
    fn test_optional_without_default_is_absent() {
        let schema = vec![Argument::optional("reason", ArgumentType::STRING)];
        let args = resolve(&schema, "", &TypeRegistry::new()).unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn test_long_flag_binds_out_of_position() {
        let schema = vec![
            Argument::required("amount", ArgumentType::NUMBER),
            Argument::optional("unit", ArgumentType::STRING),
        ];
        let args = resolve(&schema, "--unit=gems 7", &TypeRegistry::new()).unwrap();
        assert_eq!(args.get::<i64>("amount"), Some(7));
        assert_eq!(args.str("unit"), Some("gems"));

        let args = resolve(&schema, "--amount 9", &TypeRegistry::new()).unwrap();
        assert_eq!(args.get::<i64>("amount"), Some(9));
    }

    #[test]
    fn test_short_flag() {
        let schema = vec![
            Argument::optional("reason", ArgumentType::STRING),
            Argument::optional("days", ArgumentType::NUMBER).short('d'),
        ];
        let args = resolve(&schema, "-d 3 spam", &TypeRegistry::new()).unwrap();
        assert_eq!(args.get::<i64>("days"), Some(3));
        assert_eq!(args.str("reason"), Some("spam"));
    }

    #[test]
    fn test_bare_boolean_flag() {
        let schema = vec![
            Argument::optional("text", ArgumentType::STRING),
            Argument::optional("silent", ArgumentType::BOOLEAN)
                .short('s')
                .default_value(false),
        ];
        let args = resolve(&schema, "-s hello", &TypeRegistry::new()).unwrap();
        assert_eq!(args.get::<bool>("silent"), Some(true));
        assert_eq!(args.str("text"), Some("hello"));

        let args = resolve(&schema, "hello", &TypeRegistry::new()).unwrap();
        assert_eq!(args.get::<bool>("silent"), Some(false));

        let args = resolve(&schema, "--silent no hello", &TypeRegistry::new()).unwrap();
        assert_eq!(args.get::<bool>("silent"), Some(false));
    }

    #[test]
    fn test_unknown_long_flag() {
        let err = resolve(&amount_schema(), "--nope=1", &TypeRegistry::new()).unwrap_err();
        assert_eq!(err, ArgumentError::UnknownFlag("--nope=1".into()));
    }

    #[test]
    fn test_flag_missing_value() {
        let err = resolve(&amount_schema(), "--amount", &TypeRegistry::new()).unwrap_err();
        assert_eq!(err.reason(), "missing-flag-value");
    }

    #[test]
    fn test_duplicate_flag() {
        let err = resolve(&amount_schema(), "--amount=1 --amount=2", &TypeRegistry::new())
            .unwrap_err();
        assert_eq!(err, ArgumentError::Duplicate("amount".into()));
    }

    #[test]
    fn test_rest_argument() {
        let schema = vec![
            Argument::required("target", ArgumentType::custom("user")),
            Argument::optional("reason", ArgumentType::STRING).rest(),
        ];
        let args = resolve(&schema, "<@!123> being rude again", &TypeRegistry::with_builtins())
            .unwrap();
        assert_eq!(args.str("target"), Some("123"));
        assert_eq!(args.str("reason"), Some("being rude again"));
    }

    #[test]
    fn test_unknown_flags_are_text_in_rest_argument() {
        let say = vec![Argument::optional("text", ArgumentType::STRING).rest()];
        let args = resolve(&say, "--hi there", &TypeRegistry::new()).unwrap();
        assert_eq!(args.str("text"), Some("--hi there"));

        let schema = vec![
            Argument::required("amount", ArgumentType::NUMBER),
            Argument::optional("note", ArgumentType::STRING).rest(),
        ];
        let args = resolve(&schema, "5 --loud and clear", &TypeRegistry::new()).unwrap();
        assert_eq!(args.get::<i64>("amount"), Some(5));
        assert_eq!(args.str("note"), Some("--loud and clear"));

        // Known flags still bind, even next to the greedy argument.
        let args = resolve(&schema, "--amount=2 --loud", &TypeRegistry::new()).unwrap();
        assert_eq!(args.get::<i64>("amount"), Some(2));
        assert_eq!(args.str("note"), Some("--loud"));

        // An unknown flag in a non-greedy slot is still an error.
        let err = resolve(&schema, "--loud 5", &TypeRegistry::new()).unwrap_err();
        assert_eq!(err, ArgumentError::UnknownFlag("--loud".into()));
        let err = resolve(&schema, "--note=x --loud", &TypeRegistry::new()).unwrap_err();
        assert_eq!(err, ArgumentError::UnknownFlag("--loud".into()));
    }

    #[test]
    fn test_custom_types() {
        let types = TypeRegistry::with_builtins();
        let schema = vec![
            Argument::required("user", ArgumentType::custom("user")),
            Argument::required("channel", ArgumentType::custom("channel")),
            Argument::required("role", ArgumentType::custom("role")),
        ];
        let args = resolve(&schema, "42 <#7> <@&9>", &types).unwrap();
        assert_eq!(args.str("user"), Some("42"));
        assert_eq!(args.str("channel"), Some("7"));
        assert_eq!(args.str("role"), Some("9"));

        let err = resolve(&schema, "42 general <@&9>", &types).unwrap_err();
        assert_eq!(err.argument(), Some("channel"));
    }

    #[test]
    fn test_closure_resolver() {
        let mut types = TypeRegistry::new();
        types.register("color", |token: &str| {
            matches!(token, "red" | "green" | "blue").then(|| json!(token.to_uppercase()))
        });
        let schema = vec![Argument::required("color", ArgumentType::custom("color"))];
        let args = resolve(&schema, "green", &types).unwrap();
        assert_eq!(args.str("color"), Some("GREEN"));
        assert!(resolve(&schema, "pink", &types).is_err());
    }

    #[test]
    fn test_or_chain_first_candidate_wins() {
        let types = TypeRegistry::with_builtins();
        let schema = vec![Argument::optional(
            "target",
            ArgumentType::any_of([ArgumentType::custom("channel"), ArgumentType::NUMBER]),
        )];
        let args = resolve(&schema, "<#5>", &types).unwrap();
        assert_eq!(args.str("target"), Some("5"));

        let args = resolve(&schema, "12", &types).unwrap();
        assert_eq!(args.get::<i64>("target"), Some(12));

        assert!(resolve(&schema, "nope", &types).is_err());
    }

    #[test]
    fn test_unknown_custom_type() {
        let schema = vec![Argument::required("x", ArgumentType::custom("ghost"))];
        let err = resolve(&schema, "1", &TypeRegistry::new()).unwrap_err();
        assert_eq!(err.reason(), "unknown-type");
    }

    #[test]
    fn test_quoted_tokens() {
        let schema = vec![
            Argument::required("title", ArgumentType::STRING),
            Argument::required("count", ArgumentType::NUMBER),
        ];
        let args = resolve(&schema, r#""two words" 2"#, &TypeRegistry::new()).unwrap();
        assert_eq!(args.str("title"), Some("two words"));
    }
}
