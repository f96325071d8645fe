//! # pathguard-graphql
//!
//! Path-based field authorization for async-graphql.
//!
//! Every field the executor resolves is identified by its resource path, the
//! dotted chain of field names from the root with list indices dropped
//! (`project.members.tickets.message`). Together with the request action
//! (`query`, `mutation` or `subscription`) the path is checked against a
//! [`PolicyEngine`](pathguard_policy::PolicyEngine):
//!
//! - a field resolves only if a rule for its path and action exists and the
//!   engine allows the acting role;
//! - a field with no rule fails with "no rule found", unless it carries an
//!   inline declaration, which registers the missing rule on first use;
//! - denials are field-scoped, so siblings still resolve.
//!
//! ## Overview
//!
//! Install [`PathAuthorization`] on a schema and pass the acting [`Role`] and a
//! [`PolicyEngineHandle`] as request data. Inline declarations come from
//! [`FieldDeclarations`], built programmatically or from SDL annotated with
//! `@can(who: "...")`.
//!
//! ## Configuration
//!
//! ```toml
//! [authz]
//! anonymous_role = "*"
//! anonymous_label = "anonymous"
//! skip_introspection = true
//! ```
//!
//! ## Modules
//!
//! - [`path`] - Resource paths from the execution tree
//! - [`key`] - Actions and rule keys
//! - [`cache`] - Request-scoped path cache
//! - [`enforce`] - Enforcement gate
//! - [`scope`] - Per-request role, engine and cache
//! - [`directive`] - Inline rule declarations
//! - [`extension`] - The async-graphql extension
//! - [`config`] - Configuration options
//! - [`error`] - Error types

pub mod cache;
pub mod config;
pub mod directive;
pub mod enforce;
pub mod error;
pub mod extension;
pub mod key;
pub mod path;
pub mod scope;

// Re-export main types
pub use config::AuthzConfig;
pub use directive::{
    CAN_DIRECTIVE_SDL, DeclarationError, FieldAuthorization, FieldDeclarations,
};
pub use error::{AuthzError, AuthzResult};
pub use extension::{PathAuthorization, authorize_field};
pub use key::{Action, RuleKey};
pub use path::ResourcePath;
pub use scope::{PolicyEngineHandle, RequestScope, Role};

pub use pathguard_policy::{DynPolicyEngine, MemoryPolicyEngine, PolicyEngine, PolicyRule};
