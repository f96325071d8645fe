//! Error types for field authorization.
//!
//! Every authorization outcome other than "allowed" is an [`AuthzError`].
//! Errors are field-scoped: they are converted into an
//! [`async_graphql::ServerError`] attached at the field's own response path, so
//! one rejected field never aborts its siblings.

use async_graphql::{ErrorExtensionValues, PathSegment, ServerError, Value};
use pathguard_policy::PolicyError;

use crate::key::Action;
use crate::path::ResourcePath;

/// Errors that can occur while authorizing a field.
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// No policy engine was supplied for the request.
    #[error("You must provide a policy engine in the request data as PolicyEngineHandle")]
    EngineNotFound,

    /// Neither a stored rule nor an inline declaration covers the field.
    #[error("Can not find rule for {action} {path}")]
    RuleNotFound {
        /// Request action.
        action: Action,
        /// Resource path of the field.
        path: ResourcePath,
    },

    /// The policy engine denied the acting role.
    ///
    /// `role` is the display form: the anonymous sentinel has already been
    /// replaced by its label.
    #[error("{role} can not {action} {path}")]
    PermissionDenied {
        /// Display name of the acting role.
        role: String,
        /// Request action.
        action: Action,
        /// Resource path of the field.
        path: ResourcePath,
    },

    /// The policy engine itself failed.
    #[error(transparent)]
    Engine(#[from] PolicyError),
}

impl AuthzError {
    /// Returns the error code exposed in GraphQL error extensions.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EngineNotFound => "ENGINE_NOT_FOUND",
            Self::RuleNotFound { .. } => "RULE_NOT_FOUND",
            Self::PermissionDenied { .. } => "PERMISSION_DENIED",
            Self::Engine(_) => "POLICY_ENGINE_ERROR",
        }
    }

    /// Returns whether this error reflects missing configuration rather than
    /// an access decision.
    #[must_use]
    pub fn is_configuration_gap(&self) -> bool {
        matches!(self, Self::EngineNotFound | Self::RuleNotFound { .. })
    }

    /// Converts the error into a GraphQL server error located at `path`.
    #[must_use]
    pub fn into_server_error(self, path: Vec<PathSegment>) -> ServerError {
        let mut extensions = ErrorExtensionValues::default();
        extensions.set("code", Value::String(self.error_code().to_string()));

        let mut error = ServerError::new(self.to_string(), None);
        error.path = path;
        error.extensions = Some(extensions);
        error
    }
}

/// Type alias for authorization results.
pub type AuthzResult<T> = Result<T, AuthzError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> ResourcePath {
        ResourcePath::from_segments(s.split('.'))
    }

    #[test]
    fn test_permission_denied_message() {
        let err = AuthzError::PermissionDenied {
            role: "user".into(),
            action: Action::Query,
            path: path("project.members.tickets.message"),
        };
        assert_eq!(
            err.to_string(),
            "user can not query project.members.tickets.message"
        );
    }

    #[test]
    fn test_rule_not_found_message() {
        let err = AuthzError::RuleNotFound {
            action: Action::Mutation,
            path: path("createProject"),
        };
        assert_eq!(err.to_string(), "Can not find rule for mutation createProject");
    }

    #[test]
    fn test_engine_error_is_verbatim() {
        let err = AuthzError::from(PolicyError::backend("timeout"));
        assert_eq!(err.to_string(), "Policy backend error: timeout");
        assert_eq!(err.error_code(), "POLICY_ENGINE_ERROR");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AuthzError::EngineNotFound.error_code(), "ENGINE_NOT_FOUND");
        assert_eq!(
            AuthzError::RuleNotFound {
                action: Action::Query,
                path: path("a"),
            }
            .error_code(),
            "RULE_NOT_FOUND"
        );
    }

    #[test]
    fn test_configuration_gap_classification() {
        assert!(AuthzError::EngineNotFound.is_configuration_gap());
        assert!(
            !AuthzError::PermissionDenied {
                role: "user".into(),
                action: Action::Query,
                path: path("a"),
            }
            .is_configuration_gap()
        );
    }

    #[test]
    fn test_into_server_error() {
        let err = AuthzError::PermissionDenied {
            role: "anonymous".into(),
            action: Action::Query,
            path: path("project.name"),
        };
        let server_error = err.into_server_error(vec![
            PathSegment::Field("project".into()),
            PathSegment::Field("name".into()),
        ]);

        let json = serde_json::to_value(&server_error).unwrap();
        assert_eq!(json["message"], "anonymous can not query project.name");
        assert_eq!(json["path"], serde_json::json!(["project", "name"]));
        assert_eq!(json["extensions"]["code"], "PERMISSION_DENIED");
    }
}
