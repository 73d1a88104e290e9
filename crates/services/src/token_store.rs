//! Username and access/refresh token persistence.

use crate::kv_store::KeyValueStore;
use shared::token::Token;
use shared::ClientError;
use std::sync::Arc;

const NAME_KEY: &str = "Name";
const ACCESS_TOKEN_KEY: &str = "AccessToken";
const REFRESH_TOKEN_KEY: &str = "RefreshToken";

#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn set_token(&self, token: &Token) -> Result<(), ClientError> {
        self.store.set(NAME_KEY, &token.name)?;
        self.store.set(ACCESS_TOKEN_KEY, &token.access_token)?;
        self.store.set(REFRESH_TOKEN_KEY, &token.refresh_token)
    }

    /// Drop both tokens. The username stays so per-user state can still be
    /// located after signing back in.
    pub fn clear(&self) -> Result<(), ClientError> {
        self.store.remove(ACCESS_TOKEN_KEY)?;
        self.store.remove(REFRESH_TOKEN_KEY)
    }

    pub fn name(&self) -> Option<String> {
        self.read(NAME_KEY)
    }

    pub fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY)
    }

    pub fn is_signed_in(&self) -> bool {
        self.access_token().is_some()
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read credential");
                None
            }
        }
    }
}
