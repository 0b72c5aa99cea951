//! Token storage and management

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Stored bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: String,
    pub expires_at: Option<i64>,
}

impl StoredToken {
    pub fn new(token: String, expires_in_secs: Option<u64>) -> Self {
        let expires_at = expires_in_secs.map(|secs| Utc::now().timestamp() + secs as i64);
        Self { token, expires_at }
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            // Consider expired if less than 5 minutes remaining
            Some(exp) => Utc::now().timestamp() + 300 >= exp,
            None => false,
        }
    }
}

/// Opaque bearer credential handed to the view and the history client.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for blank tokens so they gate the view like a missing one.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn bearer(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Token store trait for different storage backends
pub trait TokenStore {
    fn get_token(&self) -> Option<StoredToken>;
    fn set_token(&mut self, token: String, expires_in: Option<u64>);
    fn clear_tokens(&mut self);

    /// The usable credential, if a non-expired token is stored.
    fn credential(&self) -> Option<Credential> {
        let token = self.get_token()?;
        if token.is_expired() {
            tracing::warn!("Stored token has expired");
            return None;
        }
        Credential::new(token.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MemoryStore(Option<StoredToken>);

    impl TokenStore for MemoryStore {
        fn get_token(&self) -> Option<StoredToken> {
            self.0.clone()
        }
        fn set_token(&mut self, token: String, expires_in: Option<u64>) {
            self.0 = Some(StoredToken::new(token, expires_in));
        }
        fn clear_tokens(&mut self) {
            self.0 = None;
        }
    }

    #[test]
    fn test_token_without_expiry_never_expires() {
        let tok = StoredToken::new("abc".to_string(), None);
        assert!(!tok.is_expired());
    }

    #[test]
    fn test_token_inside_grace_window_is_expired() {
        let tok = StoredToken::new("abc".to_string(), Some(60));
        assert!(tok.is_expired());
        let tok = StoredToken::new("abc".to_string(), Some(3600));
        assert!(!tok.is_expired());
    }

    #[test]
    fn test_credential_from_store() {
        let mut store = MemoryStore::default();
        assert!(store.credential().is_none());

        store.set_token("secret".to_string(), None);
        assert_eq!(store.credential().unwrap().bearer(), "secret");

        store.set_token("  ".to_string(), None);
        assert!(store.credential().is_none());

        store.clear_tokens();
        assert!(store.credential().is_none());
    }

    #[test]
    fn test_credential_debug_hides_token() {
        let cred = Credential::new("secret").unwrap();
        assert_eq!(format!("{:?}", cred), "Credential(***)");
    }
}
