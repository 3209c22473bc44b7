//! Security (authentication) handlers, keyed by their RFB security-type code.
//!
//! TightSecurity (code 16) is special: it wraps an inner handler chosen
//! during its own sub-negotiation, so it needs to look the inner handler up
//! by code without holding a reference back into the registry that owns it.
//! `SecurityRegistry::lookup_fn` hands out a `Fn(i32) -> Option<Arc<dyn
//! SecurityHandler>>` closure for exactly that purpose, avoiding a cyclic
//! `Arc`.

mod none;
mod tight_security;
mod vnc_auth;

pub use none::NoneHandler;
pub use tight_security::TightSecurityHandler;
pub use vnc_auth::VncAuthHandler;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::wire::{DynReadHalf, WireReader, WireWriter};

/// One negotiable RFB security type.
#[async_trait]
pub trait SecurityHandler: Send + Sync {
    fn code(&self) -> i32;

    /// Run the handler's challenge/response (if any) and report success.
    /// Callers send the RFB 3.8+ SecurityResult after this returns; RFB 3.3's
    /// lack of one is handled by the handshake, not here.
    async fn authenticate(
        &self,
        reader: &mut WireReader<DynReadHalf>,
        writer: &WireWriter,
    ) -> Result<bool>;
}

/// Server-level, immutable-after-construction ordered list of enabled
/// security handlers.
#[derive(Clone)]
pub struct SecurityRegistry {
    handlers: Vec<Arc<dyn SecurityHandler>>,
}

impl SecurityRegistry {
    pub fn new(handlers: Vec<Arc<dyn SecurityHandler>>) -> Self {
        Self { handlers }
    }

    pub fn enabled(&self) -> &[Arc<dyn SecurityHandler>] {
        &self.handlers
    }

    pub fn by_code(&self, code: i32) -> Option<Arc<dyn SecurityHandler>> {
        self.handlers.iter().find(|h| h.code() == code).cloned()
    }

    /// A cheaply-cloneable lookup closure, handed to `TightSecurityHandler`
    /// so it can resolve its negotiated inner auth without owning an `Arc`
    /// back to this registry.
    pub fn lookup_fn(&self) -> impl Fn(i32) -> Option<Arc<dyn SecurityHandler>> + Clone {
        let handlers = self.handlers.clone();
        move |code| handlers.iter().find(|h| h.code() == code).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_code_finds_registered_handlers_only() {
        let registry = SecurityRegistry::new(vec![Arc::new(NoneHandler) as Arc<dyn SecurityHandler>]);
        assert!(registry.by_code(1).is_some());
        assert!(registry.by_code(2).is_none());
    }
}
