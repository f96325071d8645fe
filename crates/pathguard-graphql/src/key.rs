//! Request actions and rule keys.
//!
//! A [`RuleKey`] combines a resource path with an action into a single lookup
//! key of the form `path_action`, e.g. `project.members.name_query`. GraphQL
//! field names may themselves contain `_`, so the key is split at the *last*
//! separator; the action part is escaped to never contain one.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use async_graphql::parser::types::OperationType;
use pathguard_policy::PolicyRule;

use crate::path::ResourcePath;

/// Separator between path and action in a rule key.
pub const KEY_SEPARATOR: char = '_';

/// The operation kind a request performs. One action applies to every field
/// of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Query,
    Mutation,
    Subscription,
}

impl Action {
    /// Returns the action name as stored in policy rules.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<OperationType> for Action {
    fn from(ty: OperationType) -> Self {
        match ty {
            OperationType::Query => Self::Query,
            OperationType::Mutation => Self::Mutation,
            OperationType::Subscription => Self::Subscription,
        }
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "query" => Ok(Self::Query),
            "mutation" => Ok(Self::Mutation),
            "subscription" => Ok(Self::Subscription),
            other => Err(format!("unknown action '{other}'")),
        }
    }
}

/// Lookup key for a (resource path, action) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleKey(String);

impl RuleKey {
    /// Encodes an arbitrary path and action string.
    ///
    /// Used for rules read back from the policy engine, whose action strings
    /// are not restricted to [`Action`].
    #[must_use]
    pub fn encode(path: &str, action: &str) -> Self {
        Self(format!("{path}{KEY_SEPARATOR}{}", escape_action(action)))
    }

    /// Encodes the key for a field path under a request action.
    #[must_use]
    pub fn new(path: &ResourcePath, action: Action) -> Self {
        Self::encode(path.as_str(), action.as_str())
    }

    /// Encodes the key a stored policy rule covers.
    #[must_use]
    pub fn from_rule(rule: &PolicyRule) -> Self {
        Self::encode(&rule.resource, &rule.action)
    }

    /// Splits the key back into its path and action.
    #[must_use]
    pub fn decode(&self) -> (&str, String) {
        match self.0.rsplit_once(KEY_SEPARATOR) {
            Some((path, action)) => (path, unescape_action(action)),
            None => (self.0.as_str(), String::new()),
        }
    }

    /// Returns the encoded key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn escape_action(action: &str) -> Cow<'_, str> {
    if !action.contains(['\\', KEY_SEPARATOR]) {
        return Cow::Borrowed(action);
    }

    let mut escaped = String::with_capacity(action.len() + 4);
    for c in action.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            KEY_SEPARATOR => escaped.push_str("\\-"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

fn unescape_action(escaped: &str) -> String {
    let mut action = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            action.push(c);
            continue;
        }
        match chars.next() {
            Some('-') => action.push(KEY_SEPARATOR),
            Some(other) => action.push(other),
            None => action.push('\\'),
        }
    }

    action
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        let path = ResourcePath::from_segments(["project", "members", "name"]);
        assert_eq!(
            RuleKey::new(&path, Action::Query).as_str(),
            "project.members.name_query"
        );
    }

    #[test]
    fn test_key_is_deterministic() {
        let path = ResourcePath::from_segments(["userById", "id"]);
        assert_eq!(
            RuleKey::new(&path, Action::Mutation),
            RuleKey::encode("userById.id", "mutation")
        );
    }

    #[test]
    fn test_field_names_with_separator_do_not_collide() {
        let a = RuleKey::encode("user_name", "query");
        let b = RuleKey::encode("user", "name_query");
        assert_ne!(a, b);

        assert_eq!(a.decode(), ("user_name", "query".to_string()));
        assert_eq!(b.decode(), ("user", "name_query".to_string()));
    }

    #[test]
    fn test_escape_round_trips_backslashes() {
        let key = RuleKey::encode("a", r"x\-y_z");
        assert_eq!(key.decode(), ("a", r"x\-y_z".to_string()));
        assert_ne!(key, RuleKey::encode("a", "x__y_z"));
    }

    #[test]
    fn test_from_rule() {
        let rule = PolicyRule::new("user", "project.id", "query");
        assert_eq!(RuleKey::from_rule(&rule).as_str(), "project.id_query");
    }

    #[test]
    fn test_action_from_operation_type() {
        assert_eq!(Action::from(OperationType::Query), Action::Query);
        assert_eq!(Action::from(OperationType::Mutation), Action::Mutation);
        assert_eq!(
            Action::from(OperationType::Subscription),
            Action::Subscription
        );
    }

    #[test]
    fn test_action_parse() {
        assert_eq!("mutation".parse::<Action>(), Ok(Action::Mutation));
        assert!("read".parse::<Action>().is_err());
    }
}
