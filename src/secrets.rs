use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Supplies the key material a [`Signer`](crate::Signer) needs.
pub trait SecretsProvider {
    fn get_consumer_key_pair(&self) -> (&str, &str);

    fn get_token_pair_option(&self) -> Option<(&str, &str)>;

    fn get_token_option_pair(&self) -> (Option<&str>, Option<&str>) {
        self.get_token_pair_option()
            .map(|s| (Some(s.0), Some(s.1)))
            .unwrap_or((None, None))
    }
}

/// Key and secret the provider issued to this application.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerCredentials {
    key: String,
    secret: String,
}

impl ConsumerCredentials {
    /// Fails when either half is empty.
    pub fn new<K, S>(key: K, secret: S) -> Result<Self, ConfigError>
    where
        K: Into<String>,
        S: Into<String>,
    {
        let credentials = ConsumerCredentials {
            key: key.into(),
            secret: secret.into(),
        };
        credentials.check()?;
        Ok(credentials)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    // deserialized values bypass `new`
    pub(crate) fn check(&self) -> Result<(), ConfigError> {
        if self.key.is_empty() {
            return Err(ConfigError::Missing("consumer key"));
        }
        if self.secret.is_empty() {
            return Err(ConfigError::Missing("consumer secret"));
        }
        Ok(())
    }
}

impl fmt::Debug for ConsumerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerCredentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Borrowed view over consumer credentials and, optionally, a token pair.
#[derive(Debug, Clone, Copy)]
pub struct Secrets<'a> {
    consumer_key: &'a str,
    consumer_secret: &'a str,
    token: Option<(&'a str, &'a str)>,
}

impl<'a> Secrets<'a> {
    pub fn new(consumer: &'a ConsumerCredentials) -> Self {
        Secrets {
            consumer_key: &consumer.key,
            consumer_secret: &consumer.secret,
            token: None,
        }
    }

    pub fn token(self, token: &'a str, token_secret: &'a str) -> Self {
        Secrets {
            token: Some((token, token_secret)),
            ..self
        }
    }
}

impl SecretsProvider for Secrets<'_> {
    fn get_consumer_key_pair(&self) -> (&str, &str) {
        (self.consumer_key, self.consumer_secret)
    }

    fn get_token_pair_option(&self) -> Option<(&str, &str)> {
        self.token
    }
}
