//! Per-request authorization scope.
//!
//! Callers hand the acting [`Role`] and a [`PolicyEngineHandle`] to
//! async-graphql as request data; the authorization extension collects them,
//! together with the request action, into a [`RequestScope`] that every field
//! of the request shares. The scope also owns the request's path cache and the
//! guard serializing inline rule registration.
//!
//! # Example
//!
//! ```ignore
//! use pathguard_graphql::{PolicyEngineHandle, Role};
//!
//! let request = async_graphql::Request::new(query)
//!     .data(Role::new("user"))
//!     .data(PolicyEngineHandle::new(engine.clone()));
//! let response = schema.execute(request).await;
//! ```

use std::fmt;
use std::sync::Arc;

use pathguard_policy::{DynPolicyEngine, PolicyEngine};
use tokio::sync::{Mutex, MutexGuard};

use crate::cache::{CacheSlot, PathCache};
use crate::config::AuthzConfig;
use crate::error::{AuthzError, AuthzResult};
use crate::key::Action;

/// Acting role of a request, as established by the caller's authentication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Role(String);

impl Role {
    /// Creates a role.
    #[must_use]
    pub fn new(role: impl Into<String>) -> Self {
        Self(role.into())
    }

    /// Returns the role name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Policy engine supplied for a request.
#[derive(Clone)]
pub struct PolicyEngineHandle(DynPolicyEngine);

impl PolicyEngineHandle {
    /// Wraps an engine.
    #[must_use]
    pub fn new(engine: DynPolicyEngine) -> Self {
        Self(engine)
    }

    /// Returns the shared engine.
    #[must_use]
    pub fn engine(&self) -> &DynPolicyEngine {
        &self.0
    }
}

impl fmt::Debug for PolicyEngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyEngineHandle").finish_non_exhaustive()
    }
}

/// Authorization state shared by all fields of one request.
pub struct RequestScope {
    role: String,
    engine: Option<DynPolicyEngine>,
    action: Action,
    config: Arc<AuthzConfig>,
    cache: CacheSlot,
    registration: Mutex<()>,
}

impl RequestScope {
    /// Creates a scope. A missing or empty `role` becomes the configured
    /// anonymous sentinel.
    #[must_use]
    pub fn new(
        role: Option<&Role>,
        engine: Option<DynPolicyEngine>,
        action: Action,
        config: Arc<AuthzConfig>,
    ) -> Self {
        let role = role
            .map(Role::as_str)
            .filter(|r| !r.is_empty())
            .map_or_else(|| config.anonymous_role.clone(), str::to_string);

        Self {
            role,
            engine,
            action,
            config,
            cache: CacheSlot::new(),
            registration: Mutex::new(()),
        }
    }

    /// Returns the acting role; the anonymous sentinel when none was given.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Returns the request action.
    #[must_use]
    pub fn action(&self) -> Action {
        self.action
    }

    /// Returns the authorization configuration.
    #[must_use]
    pub fn config(&self) -> &AuthzConfig {
        &self.config
    }

    /// Returns the policy engine.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::EngineNotFound`] if the request has no engine.
    pub fn engine(&self) -> AuthzResult<&dyn PolicyEngine> {
        self.engine.as_deref().ok_or(AuthzError::EngineNotFound)
    }

    /// Returns the request's path cache, scanning the engine on first use.
    ///
    /// # Errors
    ///
    /// Returns `EngineNotFound` without an engine, or the engine's error if the
    /// scan fails.
    pub async fn ensure_cache(&self) -> AuthzResult<&PathCache> {
        let engine = self.engine()?;
        Ok(self.cache.ensure(engine).await?)
    }

    /// Acquires the guard under which inline rules are checked and registered.
    pub(crate) async fn lock_registration(&self) -> MutexGuard<'_, ()> {
        self.registration.lock().await
    }
}

impl fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestScope")
            .field("role", &self.role)
            .field("action", &self.action)
            .field("has_engine", &self.engine.is_some())
            .field("cache_built", &self.cache.get().is_some())
            .finish()
    }
}
