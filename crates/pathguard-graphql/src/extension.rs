//! Field authorization extension.
//!
//! [`PathAuthorization`] intercepts every field the executor resolves. A field
//! resolves only when a policy rule for its path and the request action exists
//! and the engine allows the acting role; otherwise the field fails with a
//! field-scoped error and its siblings still resolve.
//!
//! # Example
//!
//! ```ignore
//! use pathguard_graphql::{FieldDeclarations, PathAuthorization, PolicyEngineHandle, Role};
//!
//! let schema = Schema::build("Query", None, None)
//!     .register(query)
//!     .extension(PathAuthorization::new(FieldDeclarations::from_sdl(SDL)?))
//!     .finish()?;
//!
//! let request = Request::new("{ project(id: 2) { id name } }")
//!     .data(Role::new("user"))
//!     .data(PolicyEngineHandle::new(engine));
//! ```

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use async_graphql::extensions::{
    Extension, ExtensionContext, ExtensionFactory, NextExecute, NextParseQuery, NextResolve,
    NextSubscribe, ResolveInfo,
};
use async_graphql::parser::types::ExecutableDocument;
use async_graphql::{QueryPathSegment, Response, ServerError, ServerResult, Value, Variables};
use futures_util::stream::{BoxStream, StreamExt};
use pathguard_policy::DynPolicyEngine;
use tracing::{trace, warn};

use crate::config::AuthzConfig;
use crate::directive::{self, FieldAuthorization, FieldDeclarations};
use crate::enforce;
use crate::error::{AuthzError, AuthzResult};
use crate::key::{Action, RuleKey};
use crate::path::{PathTracker, ResourcePath, error_path};
use crate::scope::{PolicyEngineHandle, RequestScope, Role};

/// Authorizes one field access.
///
/// Fields without a cached rule key defer to their declaration, if any, and
/// fail with `RuleNotFound` otherwise.
///
/// # Errors
///
/// Returns `EngineNotFound`, `RuleNotFound`, `PermissionDenied`, or the
/// engine's error.
pub async fn authorize_field(
    scope: &RequestScope,
    path: &ResourcePath,
    authorization: FieldAuthorization<'_>,
) -> AuthzResult<()> {
    let engine = scope.engine()?;
    let action = scope.action();
    trace!(role = scope.role(), %action, %path, "Authorizing field");

    let cache = scope.ensure_cache().await?;
    let key = RuleKey::new(path, action);

    if !cache.contains(&key).await {
        return match authorization {
            FieldAuthorization::Declared { principal } => {
                directive::authorize_declared(scope, path, principal).await
            }
            FieldAuthorization::Undeclared => Err(AuthzError::RuleNotFound {
                action,
                path: path.clone(),
            }),
        };
    }

    enforce::require(engine, scope.config(), scope.role(), path, action).await
}

/// Extension factory installing path-based field authorization on a schema.
///
/// The policy engine is taken from the request data ([`PolicyEngineHandle`]);
/// an engine given with [`PathAuthorization::with_engine`] is used for
/// requests that carry none.
#[derive(Clone)]
pub struct PathAuthorization {
    config: Arc<AuthzConfig>,
    declarations: Arc<FieldDeclarations>,
    default_engine: Option<DynPolicyEngine>,
}

impl PathAuthorization {
    /// Creates the extension with the schema's field declarations.
    #[must_use]
    pub fn new(declarations: FieldDeclarations) -> Self {
        Self {
            config: Arc::new(AuthzConfig::default()),
            declarations: Arc::new(declarations),
            default_engine: None,
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: AuthzConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// Sets the engine used when a request supplies none.
    #[must_use]
    pub fn with_engine(mut self, engine: DynPolicyEngine) -> Self {
        self.default_engine = Some(engine);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &AuthzConfig {
        &self.config
    }
}

impl Default for PathAuthorization {
    fn default() -> Self {
        Self::new(FieldDeclarations::new())
    }
}

impl ExtensionFactory for PathAuthorization {
    fn create(&self) -> Arc<dyn Extension> {
        Arc::new(PathAuthorizationExtension {
            config: self.config.clone(),
            declarations: self.declarations.clone(),
            default_engine: self.default_engine.clone(),
            operations: Mutex::new(Vec::new()),
            action: OnceLock::new(),
            scope: OnceLock::new(),
            paths: PathTracker::new(),
            errors: Arc::new(Mutex::new(Vec::new())),
        })
    }
}

/// Per-request state of [`PathAuthorization`].
struct PathAuthorizationExtension {
    config: Arc<AuthzConfig>,
    declarations: Arc<FieldDeclarations>,
    default_engine: Option<DynPolicyEngine>,
    /// Operations of the parsed document, by name.
    operations: Mutex<Vec<(Option<String>, Action)>>,
    action: OnceLock<Action>,
    scope: OnceLock<RequestScope>,
    paths: PathTracker,
    /// Errors of nullable fields that were resolved to `null`.
    errors: Arc<Mutex<Vec<ServerError>>>,
}

fn take_errors(errors: &Mutex<Vec<ServerError>>) -> Vec<ServerError> {
    std::mem::take(&mut *errors.lock().unwrap_or_else(PoisonError::into_inner))
}

impl PathAuthorizationExtension {
    fn select_operation(&self, operation_name: Option<&str>) {
        let operations = self
            .operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let selected = match operation_name {
            Some(name) => operations
                .iter()
                .find(|(op, _)| op.as_deref() == Some(name))
                .map(|(_, action)| *action),
            None if operations.len() == 1 => operations.first().map(|(_, action)| *action),
            None => None,
        };

        if let Some(action) = selected {
            let _ = self.action.set(action);
        }
    }

    fn scope(&self, ctx: &ExtensionContext<'_>) -> &RequestScope {
        self.scope.get_or_init(|| {
            let engine = ctx
                .data_opt::<PolicyEngineHandle>()
                .map(|handle| handle.engine().clone())
                .or_else(|| self.default_engine.clone());
            let action = self.action.get().copied().unwrap_or(Action::Query);

            RequestScope::new(
                ctx.data_opt::<Role>(),
                engine,
                action,
                self.config.clone(),
            )
        })
    }

    fn is_introspection(&self, info: &ResolveInfo<'_>) -> bool {
        self.config.skip_introspection
            && (info.is_for_introspection
                || info.name.starts_with("__")
                || info.parent_type.starts_with("__"))
    }
}

#[async_trait::async_trait]
impl Extension for PathAuthorizationExtension {
    async fn parse_query(
        &self,
        ctx: &ExtensionContext<'_>,
        query: &str,
        variables: &Variables,
        next: NextParseQuery<'_>,
    ) -> ServerResult<ExecutableDocument> {
        let document = next.run(ctx, query, variables).await?;

        let operations: Vec<(Option<String>, Action)> = document
            .operations
            .iter()
            .map(|(name, op)| (name.map(|n| n.to_string()), Action::from(op.node.ty)))
            .collect();

        if let [(_, action)] = operations.as_slice() {
            let _ = self.action.set(*action);
        }
        *self
            .operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = operations;

        Ok(document)
    }

    async fn execute(
        &self,
        ctx: &ExtensionContext<'_>,
        operation_name: Option<&str>,
        next: NextExecute<'_>,
    ) -> Response {
        self.select_operation(operation_name);
        let mut response = next.run(ctx, operation_name).await;
        response.errors.extend(take_errors(&self.errors));
        response
    }

    fn subscribe<'s>(
        &self,
        ctx: &ExtensionContext<'_>,
        stream: BoxStream<'s, Response>,
        next: NextSubscribe<'_>,
    ) -> BoxStream<'s, Response> {
        let errors = self.errors.clone();
        next.run(ctx, stream)
            .map(move |mut response| {
                response.errors.extend(take_errors(&errors));
                response
            })
            .boxed()
    }

    async fn resolve(
        &self,
        ctx: &ExtensionContext<'_>,
        info: ResolveInfo<'_>,
        next: NextResolve<'_>,
    ) -> ServerResult<Option<Value>> {
        // List elements are covered by the list field's own check.
        if matches!(info.path_node.segment, QueryPathSegment::Index(_))
            || self.is_introspection(&info)
        {
            return next.run(ctx, info).await;
        }

        let scope = self.scope(ctx);
        let path = self.paths.resolve(info.path_node, info.name);
        let authorization = self.declarations.lookup(info.parent_type, info.name);

        if let Err(err) = authorize_field(scope, &path, authorization).await {
            if err.is_configuration_gap() {
                warn!(code = err.error_code(), %path, "Field authorization is not configured");
            }
            let error = err.into_server_error(error_path(info.path_node));

            // Non-null fields propagate the error to their parent.
            if info.return_type.ends_with('!') {
                return Err(error);
            }
            self.errors
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(error);
            return Ok(None);
        }

        next.run(ctx, info).await
    }
}
