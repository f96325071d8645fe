//! Authorization configuration.
//!
//! This module provides configuration options for field authorization.
//! Configuration can be embedded in a host application's TOML file under an
//! `[authz]` section.
//!
//! # Example Configuration
//!
//! ```toml
//! [authz]
//! anonymous_role = "*"
//! anonymous_label = "anonymous"
//! skip_introspection = true
//! ```

use serde::{Deserialize, Serialize};

/// Field authorization configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthzConfig {
    /// Role used when the request carries no role (or an empty one).
    /// The policy engine is consulted with this exact value.
    /// Default: "*"
    #[serde(default = "default_anonymous_role")]
    pub anonymous_role: String,

    /// Human-readable name substituted for `anonymous_role` in denial messages.
    /// Default: "anonymous"
    #[serde(default = "default_anonymous_label")]
    pub anonymous_label: String,

    /// Let introspection fields (`__schema`, `__type`, `__typename`) through
    /// without authorization.
    /// Default: true
    #[serde(default = "default_skip_introspection")]
    pub skip_introspection: bool,
}

fn default_anonymous_role() -> String {
    "*".to_string()
}

fn default_anonymous_label() -> String {
    "anonymous".to_string()
}

fn default_skip_introspection() -> bool {
    true
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            anonymous_role: default_anonymous_role(),
            anonymous_label: default_anonymous_label(),
            skip_introspection: default_skip_introspection(),
        }
    }
}

impl AuthzConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration values are invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.anonymous_role.trim().is_empty() {
            return Err("authz.anonymous_role must not be empty".into());
        }
        if self.anonymous_label.trim().is_empty() {
            return Err("authz.anonymous_label must not be empty".into());
        }
        Ok(())
    }

    /// Returns the label to show for `role` in user-facing messages.
    #[must_use]
    pub fn display_role<'a>(&'a self, role: &'a str) -> &'a str {
        if role == self.anonymous_role {
            &self.anonymous_label
        } else {
            role
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AuthzConfig::default();
        assert_eq!(config.anonymous_role, "*");
        assert_eq!(config.anonymous_label, "anonymous");
        assert!(config.skip_introspection);
    }

    #[test]
    fn test_valid_config() {
        assert!(AuthzConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_anonymous_role() {
        let config = AuthzConfig {
            anonymous_role: " ".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_anonymous_label() {
        let config = AuthzConfig {
            anonymous_label: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_display_role() {
        let config = AuthzConfig::default();
        assert_eq!(config.display_role("*"), "anonymous");
        assert_eq!(config.display_role("user"), "user");
    }

    #[test]
    fn test_deserialize_from_toml() {
        let raw = r#"
            anonymous_role = "guest"
            skip_introspection = false
        "#;

        let config: AuthzConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.anonymous_role, "guest");
        assert_eq!(config.anonymous_label, "anonymous");
        assert!(!config.skip_introspection);
    }
}
