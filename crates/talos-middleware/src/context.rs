//! Per-exchange context.
//!
//! The [`ExchangeContext`] flows through the chain with the request. Stages
//! enrich it — spec-match seeds the audit context, the JWT stage records
//! claims — and later stages read what earlier ones wrote. One exchange is
//! handled by one worker from start to finish, so access needs no locking.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use talos_security::Claims;
use talos_spec::SpecOperation;

/// Derived facts about one exchange, shared between middleware stages.
///
/// Created by the spec-match stage (or by the first stage that needs it),
/// mutated only by upstream middleware, read by downstream ones, and
/// discarded with the exchange.
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
    /// `"<normalisedPath>@<method>"` of the matched operation.
    pub endpoint: Option<String>,
    /// The interned operation handle; a reference, never a copy.
    pub operation: Option<Arc<SpecOperation>>,
    /// `client_id` claim of the verified auth token.
    pub client_id: Option<String>,
    /// `user_id` claim of the verified auth token.
    pub user_id: Option<String>,
    /// All claims of the verified auth token.
    pub subject_claims: Option<Claims>,
    /// `client_id` claim of the secondary scope token, when one was present.
    pub scope_client_id: Option<String>,
    /// All claims of the secondary scope token, when one was present.
    pub access_claims: Option<Claims>,
}

/// Context that flows through the middleware chain for one exchange.
#[derive(Debug, Default)]
pub struct ExchangeContext {
    audit: Option<AuditContext>,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl ExchangeContext {
    /// Creates an empty exchange context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The audit context, if any stage has created it.
    #[must_use]
    pub fn audit(&self) -> Option<&AuditContext> {
        self.audit.as_ref()
    }

    /// The audit context, created empty if absent.
    pub fn audit_mut(&mut self) -> &mut AuditContext {
        self.audit.get_or_insert_with(AuditContext::default)
    }

    /// Whether an audit context exists.
    #[must_use]
    pub fn has_audit(&self) -> bool {
        self.audit.is_some()
    }

    /// Stores a typed extension value, replacing any prior value of the
    /// same type.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Removes and returns a typed extension value.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }
}
