use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

/// Path prefix ACME validation requests arrive on
pub const ACME_CHALLENGE_PREFIX: &str = "/.well-known/acme-challenge/";

/// In-memory HTTP-01 token store (`token -> key authorization`).
///
/// Shared between the ACME issuer, which registers tokens for the lifetime of
/// an order, and the plaintext listener, which consults it before any other
/// request handling.
#[derive(Debug, Default)]
pub struct ChallengeResponder {
    tokens: RwLock<HashMap<String, String>>,
}

impl ChallengeResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer an ACME validation request path.
    ///
    /// Paths outside `/.well-known/acme-challenge/` are rejected without
    /// looking at the token map.
    pub fn respond(&self, path: &str) -> Option<String> {
        let token = path.strip_prefix(ACME_CHALLENGE_PREFIX)?;
        if token.is_empty() {
            return None;
        }
        let tokens = self.tokens.read().ok()?;
        tokens.get(token).cloned()
    }

    pub fn insert(&self, token: &str, key_authorization: &str) {
        debug!(token = %token, "registering HTTP-01 challenge token");
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.insert(token.to_string(), key_authorization.to_string());
        }
    }

    pub fn remove(&self, token: &str) {
        debug!(token = %token, "removing HTTP-01 challenge token");
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.remove(token);
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.read().map(|t| t.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tokens registered for a single ACME order.
///
/// Every token is removed from the responder when the guard is dropped, so an
/// order that validates, fails, times out or is cancelled never leaves entries
/// behind.
pub struct ChallengeGuard {
    responder: Arc<ChallengeResponder>,
    tokens: Vec<String>,
}

impl ChallengeGuard {
    pub fn new(responder: Arc<ChallengeResponder>) -> Self {
        Self { responder, tokens: Vec::new() }
    }

    pub fn register(&mut self, token: &str, key_authorization: &str) {
        self.responder.insert(token, key_authorization);
        self.tokens.push(token.to_string());
    }
}

impl Drop for ChallengeGuard {
    fn drop(&mut self) {
        for token in self.tokens.drain(..) {
            self.responder.remove(&token);
        }
    }
}
