//! # pathguard-policy
//!
//! Policy engine boundary for pathguard.
//!
//! This crate defines the [`PolicyEngine`] trait that field authorization
//! delegates every allow/deny decision to, plus [`MemoryPolicyEngine`], a
//! role-based reference engine that keeps its rules in memory.
//!
//! ## Overview
//!
//! A policy engine stores `(subject, resource, action)` rules and answers three
//! questions:
//!
//! - `enforce` - may this role perform this action on this resource?
//! - `get_policy` - which rules exist right now?
//! - `add_policy` - persist a new rule (idempotently)
//!
//! ## Example
//!
//! ```ignore
//! use pathguard_policy::{MemoryPolicyEngine, PolicyEngine, PolicyRule};
//!
//! let engine = MemoryPolicyEngine::from_csv("p, user, project.id, query")?;
//! engine.add_policy(PolicyRule::new("admin", "project.name", "query")).await?;
//!
//! assert!(engine.enforce("user", "project.id", "query").await?);
//! ```
//!
//! ## Engine Backends
//!
//! To plug in another backend, implement [`PolicyEngine`]:
//!
//! ```ignore
//! use async_trait::async_trait;
//! use pathguard_policy::{PolicyEngine, PolicyResult, PolicyRule};
//!
//! struct RemoteEngine { /* ... */ }
//!
//! #[async_trait]
//! impl PolicyEngine for RemoteEngine {
//!     async fn enforce(&self, role: &str, resource: &str, action: &str) -> PolicyResult<bool> {
//!         // Implementation
//!     }
//!     // ... other methods
//! }
//! ```

mod error;
pub mod memory;
pub mod source;
mod traits;
mod types;

pub use error::{PolicyError, PolicyResult};
pub use memory::MemoryPolicyEngine;
pub use source::PolicySource;
pub use traits::{DynPolicyEngine, PolicyEngine};
pub use types::{PolicyRule, RoleGrouping};
