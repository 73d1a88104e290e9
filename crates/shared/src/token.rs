//! Authentication credential issued by the backend.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Access/refresh token pair for the signed-in user.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
}

impl Token {
    pub fn new(
        name: impl Into<String>,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

// Never print secrets in logs.
impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("name", &self.name)
            .field("access_token", &"***")
            .field("refresh_token", &"***")
            .finish()
    }
}

impl Drop for Token {
    fn drop(&mut self) {
        self.access_token.zeroize();
        self.refresh_token.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_is_camel_case() {
        let token: Token = serde_json::from_str(
            r#"{"name":"alice","accessToken":"a1","refreshToken":"r1"}"#,
        )
        .unwrap();
        assert_eq!(token.access_token, "a1");
        assert_eq!(token.bearer(), "Bearer a1");
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let token: Token = serde_json::from_str(r#"{"name":"alice"}"#).unwrap();
        assert_eq!(token.name, "alice");
        assert!(token.access_token.is_empty());
        assert!(token.refresh_token.is_empty());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let token = Token::new("alice", "secret-access", "secret-refresh");
        let printed = format!("{:?}", token);
        assert!(!printed.contains("secret"));
        assert!(printed.contains("alice"));
    }
}
