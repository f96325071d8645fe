//! Enforcement gate.
//!
//! Asks the policy engine whether a role may perform the request action on a
//! resource path. Matching semantics are the engine's; this module only turns
//! the answer into an [`AuthzError::PermissionDenied`] with the fixed message
//! `"<role> can not <action> <path>"`.

use pathguard_policy::{PolicyEngine, PolicyResult};
use tracing::{debug, warn};

use crate::config::AuthzConfig;
use crate::error::{AuthzError, AuthzResult};
use crate::key::Action;
use crate::path::ResourcePath;

/// Outcome of a policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied,
}

impl Decision {
    /// Returns whether access was allowed.
    #[must_use]
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Consults the engine for `(role, path, action)`.
///
/// `role` is passed through untouched, including the anonymous sentinel.
///
/// # Errors
///
/// Returns the engine's error if it fails to evaluate.
pub async fn enforce(
    engine: &dyn PolicyEngine,
    role: &str,
    path: &ResourcePath,
    action: Action,
) -> PolicyResult<Decision> {
    let allowed = engine
        .enforce(role, path.as_str(), action.as_str())
        .await?;

    Ok(if allowed {
        Decision::Allowed
    } else {
        Decision::Denied
    })
}

/// Enforces and converts a denial into [`AuthzError::PermissionDenied`].
///
/// The denial message shows `config.anonymous_label` in place of the
/// anonymous sentinel; the engine still sees the sentinel.
///
/// # Errors
///
/// Returns `PermissionDenied` on deny, or `Engine` if the engine fails.
pub async fn require(
    engine: &dyn PolicyEngine,
    config: &AuthzConfig,
    role: &str,
    path: &ResourcePath,
    action: Action,
) -> AuthzResult<()> {
    match enforce(engine, role, path, action).await? {
        Decision::Allowed => {
            debug!(role, %action, %path, "Access allowed");
            Ok(())
        }
        Decision::Denied => {
            warn!(role, %action, %path, "Access denied");
            Err(AuthzError::PermissionDenied {
                role: config.display_role(role).to_string(),
                action,
                path: path.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pathguard_policy::{MemoryPolicyEngine, PolicyError, PolicyRule};

    use super::*;

    /// Engine wrapper recording the roles it was asked about.
    struct RoleRecording {
        inner: MemoryPolicyEngine,
        roles: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PolicyEngine for RoleRecording {
        async fn enforce(&self, role: &str, resource: &str, action: &str) -> PolicyResult<bool> {
            self.roles.lock().unwrap().push(role.to_string());
            self.inner.enforce(role, resource, action).await
        }

        async fn get_policy(&self) -> PolicyResult<Vec<PolicyRule>> {
            self.inner.get_policy().await
        }

        async fn add_policy(&self, rule: PolicyRule) -> PolicyResult<bool> {
            self.inner.add_policy(rule).await
        }
    }

    struct Failing;

    #[async_trait]
    impl PolicyEngine for Failing {
        async fn enforce(&self, _: &str, _: &str, _: &str) -> PolicyResult<bool> {
            Err(PolicyError::backend("unreachable"))
        }

        async fn get_policy(&self) -> PolicyResult<Vec<PolicyRule>> {
            Ok(Vec::new())
        }

        async fn add_policy(&self, _: PolicyRule) -> PolicyResult<bool> {
            Ok(false)
        }
    }

    fn path(s: &str) -> ResourcePath {
        ResourcePath::from_segments(s.split('.'))
    }

    #[tokio::test]
    async fn test_enforce_decisions() {
        let engine = MemoryPolicyEngine::from_csv("p, user, userById.id, query").unwrap();

        let allowed = enforce(&engine, "user", &path("userById.id"), Action::Query)
            .await
            .unwrap();
        let denied = enforce(&engine, "user", &path("userById.name"), Action::Query)
            .await
            .unwrap();

        assert!(allowed.is_allowed());
        assert_eq!(denied, Decision::Denied);
    }

    #[tokio::test]
    async fn test_require_denial_message() {
        let engine = MemoryPolicyEngine::from_csv("p, user, userById.id, query").unwrap();
        let config = AuthzConfig::default();

        let err = require(&engine, &config, "user", &path("userById.name"), Action::Query)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "user can not query userById.name");
    }

    #[tokio::test]
    async fn test_sentinel_rewritten_for_display_only() {
        let engine = RoleRecording {
            inner: MemoryPolicyEngine::new(),
            roles: Mutex::new(Vec::new()),
        };
        let config = AuthzConfig::default();

        let err = require(&engine, &config, "*", &path("project.name"), Action::Query)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "anonymous can not query project.name");
        assert_eq!(*engine.roles.lock().unwrap(), vec!["*".to_string()]);
    }

    #[tokio::test]
    async fn test_custom_anonymous_label() {
        let engine = MemoryPolicyEngine::new();
        let config = AuthzConfig {
            anonymous_role: "guest".into(),
            anonymous_label: "someone unauthenticated".into(),
            ..Default::default()
        };

        let err = require(&engine, &config, "guest", &path("a"), Action::Mutation)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "someone unauthenticated can not mutation a");
    }

    #[tokio::test]
    async fn test_engine_failure_propagates() {
        let config = AuthzConfig::default();

        let err = require(&Failing, &config, "user", &path("a"), Action::Query)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthzError::Engine(_)));
    }
}
