//! API credentials and the per-request authentication token.

use md5::{Digest, Md5};
use std::fmt;

/// Username and password for the Fantastico API.
///
/// Immutable once built. The service never sees either value directly; every
/// request carries [`Credentials::auth_token`] instead.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Lowercase hex MD5 of `username ++ password`, as the service expects.
    ///
    /// Recomputed on every call rather than stored.
    pub fn auth_token(&self) -> String {
        let mut hasher = Md5::new();
        hasher.update(self.username.as_bytes());
        hasher.update(self.password.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_md5_of_concatenation() {
        // md5("abc")
        let creds = Credentials::new("ab", "c");
        assert_eq!(creds.auth_token(), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn empty_credentials_hash_to_md5_of_empty_string() {
        let creds = Credentials::new("", "");
        assert_eq!(creds.auth_token(), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn debug_output_redacts_password() {
        let creds = Credentials::new("reseller", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("reseller"));
        assert!(!debug.contains("hunter2"));
    }
}
