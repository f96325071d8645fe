//! Policy data types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single `(subject, resource, action)` permission rule.
///
/// The subject is a role name (or the anonymous sentinel), the resource is a
/// dotted field path such as `project.members.name`, and the action is the
/// GraphQL operation type (`query`, `mutation`, `subscription`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Role the rule grants access to.
    pub subject: String,
    /// Resource path the rule governs.
    pub resource: String,
    /// Action the rule permits.
    pub action: String,
}

impl PolicyRule {
    /// Creates a new rule.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            resource: resource.into(),
            action: action.into(),
        }
    }
}

impl fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p, {}, {}, {}", self.subject, self.resource, self.action)
    }
}

/// Role inheritance: `member` is granted everything `role` is granted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleGrouping {
    /// The inheriting role or user.
    pub member: String,
    /// The inherited role.
    pub role: String,
}

impl RoleGrouping {
    /// Creates a new grouping.
    #[must_use]
    pub fn new(member: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            member: member.into(),
            role: role.into(),
        }
    }
}

impl fmt::Display for RoleGrouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g, {}, {}", self.member, self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_display_matches_csv_form() {
        let rule = PolicyRule::new("user", "project.id", "query");
        assert_eq!(rule.to_string(), "p, user, project.id, query");
    }

    #[test]
    fn test_rule_serde_shape() {
        let rule = PolicyRule::new("user", "project.id", "query");
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"subject": "user", "resource": "project.id", "action": "query"})
        );
    }
}
