//! Inline rule declarations.
//!
//! A field may declare the principal its rule belongs to instead of relying on
//! a stored policy rule. The first time such a field is reached and no rule for
//! its path exists yet, a rule `(principal, path, action)` is registered with
//! the policy engine; the acting role is then enforced against it like any
//! stored rule.
//!
//! Declarations are collected once, when the schema is built, and looked up by
//! `(parent type, field)` during execution:
//!
//! ```ignore
//! let declarations = FieldDeclarations::new()
//!     .declare("User", "id", "user")
//!     .declare("User", "name", "someone");
//!
//! // or, from SDL annotated with `@can`
//! let declarations = FieldDeclarations::from_sdl(SDL)?;
//! ```
//!
//! Only scalar and enum fields can carry a declaration.

use std::collections::HashMap;

use async_graphql_parser::types::{
    BaseType, ConstDirective, FieldDefinition, TypeDefinition, TypeKind, TypeSystemDefinition,
};
use async_graphql_parser::parse_schema;
use async_graphql_value::ConstValue;
use pathguard_policy::PolicyRule;
use tracing::debug;

use crate::enforce;
use crate::error::AuthzResult;
use crate::key::RuleKey;
use crate::path::ResourcePath;
use crate::scope::RequestScope;

/// Principal used when `@can` is given without `who`.
pub const DEFAULT_PRINCIPAL: &str = "*";

/// Name of the declaration directive.
pub const CAN_DIRECTIVE: &str = "can";

/// Definition of the `@can` directive, for inclusion in an SDL document.
pub const CAN_DIRECTIVE_SDL: &str = r#"directive @can(who: String = "*") on FIELD_DEFINITION"#;

/// How a field is authorized when no stored rule covers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAuthorization<'a> {
    /// No declaration; the field needs a stored rule.
    Undeclared,
    /// The field registers a rule for `principal` on first use.
    Declared { principal: &'a str },
}

/// Errors raised while collecting declarations from SDL.
#[derive(Debug, thiserror::Error)]
pub enum DeclarationError {
    #[error("Invalid SDL: {0}")]
    Syntax(String),

    #[error("Not a scalar type: {type_name}.{field} is {ty}")]
    NotScalar {
        type_name: String,
        field: String,
        ty: String,
    },

    #[error("@can on {type_name}.{field} requires a string `who` argument")]
    InvalidPrincipal { type_name: String, field: String },
}

/// Field declarations keyed by parent type and field name.
#[derive(Debug, Clone, Default)]
pub struct FieldDeclarations {
    types: HashMap<String, HashMap<String, String>>,
}

impl FieldDeclarations {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `type_name.field` for `principal`.
    #[must_use]
    pub fn declare(
        mut self,
        type_name: impl Into<String>,
        field: impl Into<String>,
        principal: impl Into<String>,
    ) -> Self {
        self.insert(type_name, field, principal);
        self
    }

    /// Declares `type_name.field` for the default principal.
    #[must_use]
    pub fn declare_default(self, type_name: impl Into<String>, field: impl Into<String>) -> Self {
        self.declare(type_name, field, DEFAULT_PRINCIPAL)
    }

    /// Adds or replaces a declaration.
    pub fn insert(
        &mut self,
        type_name: impl Into<String>,
        field: impl Into<String>,
        principal: impl Into<String>,
    ) {
        self.types
            .entry(type_name.into())
            .or_default()
            .insert(field.into(), principal.into());
    }

    /// Looks up the declaration of `field` on `parent_type`.
    #[must_use]
    pub fn lookup(&self, parent_type: &str, field: &str) -> FieldAuthorization<'_> {
        self.types
            .get(parent_type)
            .and_then(|fields| fields.get(field))
            .map_or(FieldAuthorization::Undeclared, |principal| {
                FieldAuthorization::Declared { principal }
            })
    }

    /// Merges `other` into this set; declarations in `other` win.
    pub fn merge(&mut self, other: FieldDeclarations) {
        for (type_name, fields) in other.types {
            self.types.entry(type_name).or_default().extend(fields);
        }
    }

    /// Returns the number of declared fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.values().map(HashMap::len).sum()
    }

    /// Returns whether nothing is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Collects `@can` declarations from an SDL document.
    ///
    /// Object and interface fields are read. Objects inherit the declarations
    /// of the interfaces they implement unless they declare the field
    /// themselves.
    ///
    /// # Errors
    ///
    /// Returns `Syntax` if the document does not parse, `NotScalar` if `@can`
    /// sits on a list field or one whose type is an object, interface, union or
    /// input type of the document, and `InvalidPrincipal` if `who` is not a
    /// string.
    pub fn from_sdl(sdl: &str) -> Result<Self, DeclarationError> {
        let document = parse_schema(sdl).map_err(|e| DeclarationError::Syntax(e.to_string()))?;

        let types: Vec<&TypeDefinition> = document
            .definitions
            .iter()
            .filter_map(|definition| match definition {
                TypeSystemDefinition::Type(ty) => Some(&ty.node),
                _ => None,
            })
            .collect();

        let composite: HashMap<&str, &'static str> = types
            .iter()
            .filter_map(|ty| {
                let kind = match &ty.kind {
                    TypeKind::Object(_) => "an object type",
                    TypeKind::Interface(_) => "an interface type",
                    TypeKind::Union(_) => "a union type",
                    TypeKind::InputObject(_) => "an input type",
                    TypeKind::Scalar | TypeKind::Enum(_) => return None,
                };
                Some((ty.name.node.as_str(), kind))
            })
            .collect();

        let mut declarations = Self::new();
        let mut implements: Vec<(&str, Vec<&str>)> = Vec::new();

        for ty in &types {
            let type_name = ty.name.node.as_str();
            let fields = match &ty.kind {
                TypeKind::Object(object) => {
                    implements.push((
                        type_name,
                        object.implements.iter().map(|i| i.node.as_str()).collect(),
                    ));
                    &object.fields
                }
                TypeKind::Interface(interface) => &interface.fields,
                _ => continue,
            };

            for field in fields {
                if let Some(principal) = declared_principal(type_name, &field.node, &composite)? {
                    declarations.insert(type_name, field.node.name.node.as_str(), principal);
                }
            }
        }

        for (object, interfaces) in implements {
            for interface in interfaces {
                let Some(inherited) = declarations.types.get(interface).cloned() else {
                    continue;
                };
                let fields = declarations.types.entry(object.to_string()).or_default();
                for (field, principal) in inherited {
                    fields.entry(field).or_insert(principal);
                }
            }
        }

        debug!(fields = declarations.len(), "Collected @can declarations");
        Ok(declarations)
    }
}

fn can_directive(field: &FieldDefinition) -> Option<&ConstDirective> {
    field
        .directives
        .iter()
        .map(|d| &d.node)
        .find(|d| d.name.node.as_str() == CAN_DIRECTIVE)
}

fn declared_principal(
    type_name: &str,
    field: &FieldDefinition,
    composite: &HashMap<&str, &'static str>,
) -> Result<Option<String>, DeclarationError> {
    let Some(directive) = can_directive(field) else {
        return Ok(None);
    };
    let field_name = field.name.node.as_str();

    let not_scalar = |ty: String| DeclarationError::NotScalar {
        type_name: type_name.to_string(),
        field: field_name.to_string(),
        ty,
    };
    match &field.ty.node.base {
        BaseType::List(_) => return Err(not_scalar("a list".to_string())),
        BaseType::Named(name) => {
            if let Some(kind) = composite.get(name.as_str()) {
                return Err(not_scalar(format!("{kind} ({name})")));
            }
        }
    }

    match directive.get_argument("who").map(|value| &value.node) {
        None => Ok(Some(DEFAULT_PRINCIPAL.to_string())),
        Some(ConstValue::String(who)) => Ok(Some(who.clone())),
        Some(_) => Err(DeclarationError::InvalidPrincipal {
            type_name: type_name.to_string(),
            field: field_name.to_string(),
        }),
    }
}

/// Authorizes a declared field.
///
/// Registers `(principal, path, action)` with the engine if no rule covers the
/// key yet, then enforces the request's acting role. Registration happens at
/// most once per key and request.
///
/// # Errors
///
/// Returns `EngineNotFound`, `PermissionDenied`, or the engine's error.
pub async fn authorize_declared(
    scope: &RequestScope,
    path: &ResourcePath,
    principal: &str,
) -> AuthzResult<()> {
    let engine = scope.engine()?;
    let cache = scope.ensure_cache().await?;
    let action = scope.action();
    let key = RuleKey::new(path, action);

    if !cache.contains(&key).await {
        let _guard = scope.lock_registration().await;
        if !cache.contains(&key).await {
            let added = engine
                .add_policy(PolicyRule::new(principal, path.as_str(), action.as_str()))
                .await?;
            cache.record(key).await;
            debug!(principal, %action, %path, added, "Registered declared rule");
        }
    }

    enforce::require(engine, scope.config(), scope.role(), path, action).await
}
