//! The policy engine trait.
//!
//! This is the boundary between field authorization and whatever stores and
//! matches rules. Implementations must be thread-safe (`Send + Sync`) because a
//! single handle is shared by every field evaluated within a request.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PolicyResult;
use crate::types::PolicyRule;

/// Stores permission rules and answers allow/deny questions about them.
///
/// Matching semantics (role inheritance, wildcards, ...) are entirely the
/// implementation's business; callers only ever see the boolean outcome.
///
/// # Example
///
/// ```ignore
/// use pathguard_policy::{PolicyEngine, PolicyRule};
///
/// async fn grant(engine: &dyn PolicyEngine) -> pathguard_policy::PolicyResult<bool> {
///     engine.add_policy(PolicyRule::new("user", "project.id", "query")).await?;
///     engine.enforce("user", "project.id", "query").await
/// }
/// ```
#[async_trait]
pub trait PolicyEngine: Send + Sync {
    /// Decides whether `role` may perform `action` on `resource`.
    ///
    /// # Errors
    ///
    /// Returns an error only for backend failures, never for a denial.
    async fn enforce(&self, role: &str, resource: &str, action: &str) -> PolicyResult<bool>;

    /// Lists every permission rule currently known to the engine, in storage
    /// order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    async fn get_policy(&self) -> PolicyResult<Vec<PolicyRule>>;

    /// Adds a permission rule.
    ///
    /// Returns `false` when an identical rule already exists; the rule set is
    /// left unchanged in that case.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    async fn add_policy(&self, rule: PolicyRule) -> PolicyResult<bool>;
}

/// Type alias for a shareable policy engine instance.
pub type DynPolicyEngine = Arc<dyn PolicyEngine>;
