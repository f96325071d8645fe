//! In-memory RBAC policy engine.
//!
//! [`MemoryPolicyEngine`] keeps permission rules and role groupings behind a
//! tokio `RwLock`. A request is allowed when some rule matches the resource and
//! action exactly and its subject is either the requesting role or a role the
//! requester inherits (transitively) through groupings.

use std::collections::{HashSet, VecDeque};
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::error::PolicyResult;
use crate::source::PolicySource;
use crate::traits::PolicyEngine;
use crate::types::{PolicyRule, RoleGrouping};

#[derive(Debug, Default)]
struct PolicyState {
    rules: Vec<PolicyRule>,
    groupings: Vec<RoleGrouping>,
}

impl PolicyState {
    /// Returns `role` plus every role it inherits.
    fn effective_roles<'a>(&'a self, role: &'a str) -> HashSet<&'a str> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue = VecDeque::from([role]);

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            queue.extend(
                self.groupings
                    .iter()
                    .filter(|g| g.member == current)
                    .map(|g| g.role.as_str()),
            );
        }

        seen
    }
}

/// Policy engine holding all rules in memory.
///
/// # Example
///
/// ```ignore
/// use pathguard_policy::{MemoryPolicyEngine, PolicyEngine};
///
/// let engine = MemoryPolicyEngine::from_csv("p, user, project.id, query")?;
/// assert!(engine.enforce("user", "project.id", "query").await?);
/// ```
#[derive(Debug, Default)]
pub struct MemoryPolicyEngine {
    state: RwLock<PolicyState>,
}

impl MemoryPolicyEngine {
    /// Creates an engine with no rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine from a parsed policy source, dropping duplicates.
    #[must_use]
    pub fn from_source(source: PolicySource) -> Self {
        let mut state = PolicyState::default();
        for rule in source.rules {
            if !state.rules.contains(&rule) {
                state.rules.push(rule);
            }
        }
        for grouping in source.groupings {
            if !state.groupings.contains(&grouping) {
                state.groupings.push(grouping);
            }
        }

        debug!(
            rules = state.rules.len(),
            groupings = state.groupings.len(),
            "Loaded in-memory policy engine"
        );

        Self {
            state: RwLock::new(state),
        }
    }

    /// Creates an engine from policy text (see [`crate::source`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the text cannot be parsed.
    pub fn from_csv(text: &str) -> PolicyResult<Self> {
        Ok(Self::from_source(PolicySource::parse(text)?))
    }

    /// Reads a policy file and creates an engine from it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load_csv(path: impl AsRef<Path>) -> PolicyResult<Self> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_csv(&text)
    }

    /// Makes `grouping.member` inherit `grouping.role`.
    ///
    /// Returns `false` if the grouping already existed.
    pub async fn add_grouping(&self, grouping: RoleGrouping) -> bool {
        let mut state = self.state.write().await;
        if state.groupings.contains(&grouping) {
            return false;
        }
        state.groupings.push(grouping);
        true
    }

    /// Lists all role groupings.
    pub async fn get_groupings(&self) -> Vec<RoleGrouping> {
        self.state.read().await.groupings.clone()
    }

    /// Removes a permission rule.
    ///
    /// Returns `false` if no such rule existed.
    pub async fn remove_policy(&self, rule: &PolicyRule) -> bool {
        let mut state = self.state.write().await;
        let before = state.rules.len();
        state.rules.retain(|r| r != rule);
        state.rules.len() != before
    }
}

#[async_trait]
impl PolicyEngine for MemoryPolicyEngine {
    async fn enforce(&self, role: &str, resource: &str, action: &str) -> PolicyResult<bool> {
        let state = self.state.read().await;
        let roles = state.effective_roles(role);

        let allowed = state.rules.iter().any(|rule| {
            rule.resource == resource
                && rule.action == action
                && roles.contains(rule.subject.as_str())
        });

        trace!(role, resource, action, allowed, "Enforced policy");
        Ok(allowed)
    }

    async fn get_policy(&self) -> PolicyResult<Vec<PolicyRule>> {
        Ok(self.state.read().await.rules.clone())
    }

    async fn add_policy(&self, rule: PolicyRule) -> PolicyResult<bool> {
        let mut state = self.state.write().await;
        if state.rules.contains(&rule) {
            return Ok(false);
        }
        debug!(rule = %rule, "Added policy rule");
        state.rules.push(rule);
        Ok(true)
    }
}
