use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ConsumerCredentials, Secrets};

/// The application's side of one authentication attempt.
///
/// This is plain data. The network calls that fill it in live on
/// [`Provider`](crate::Provider), so a `Consumer` can sit in any session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumer {
    credentials: ConsumerCredentials,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request_token: Option<RequestToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<AccessToken>,
}

impl Consumer {
    pub fn new(credentials: ConsumerCredentials) -> Self {
        Consumer {
            credentials,
            request_token: None,
            access_token: None,
        }
    }

    pub fn credentials(&self) -> &ConsumerCredentials {
        &self.credentials
    }

    pub fn request_token(&self) -> Option<&RequestToken> {
        self.request_token.as_ref()
    }

    pub fn access_token(&self) -> Option<&AccessToken> {
        self.access_token.as_ref()
    }

    /// Secrets for the next call to the provider: the access token once
    /// there is one, else the request token, else the consumer pair alone.
    pub fn secrets(&self) -> Secrets<'_> {
        let secrets = Secrets::new(&self.credentials);
        match (&self.access_token, &self.request_token) {
            (Some(access), _) => secrets.token(&access.access_token, &access.token_secret),
            (None, Some(request)) => secrets.token(&request.token, &request.secret),
            (None, None) => secrets,
        }
    }

    pub(crate) fn set_request_token(&mut self, token: RequestToken) {
        self.access_token = None;
        self.request_token = Some(token);
    }

    // a request token is single use
    pub(crate) fn set_access_token(&mut self, token: AccessToken) {
        self.request_token = None;
        self.access_token = Some(token);
    }
}

/// Temporary credentials handed out by the request-token endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestToken {
    pub token: String,
    pub secret: String,
    /// Whether the provider echoed `oauth_callback_confirmed=true`.
    #[serde(default)]
    pub callback_confirmed: bool,
}

impl fmt::Debug for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestToken")
            .field("token", &self.token)
            .field("secret", &"<redacted>")
            .field("callback_confirmed", &self.callback_confirmed)
            .finish()
    }
}

/// Long-lived credentials used to sign requests to protected resources.
///
/// The middleware inserts it into the request extensions of every
/// authorized request, so handlers can pick it up with `Extension<AccessToken>`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_secret: String,
    /// Extra values from the access-token response (`user_id`, `screen_name`, ...).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, String>,
}

impl AccessToken {
    pub fn new<T, S>(access_token: T, token_secret: S) -> Self
    where
        T: Into<String>,
        S: Into<String>,
    {
        AccessToken {
            access_token: access_token.into(),
            token_secret: token_secret.into(),
            extra: HashMap::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.access_token.is_empty() && !self.token_secret.is_empty()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &self.access_token)
            .field("token_secret", &"<redacted>")
            .field("extra", &self.extra)
            .finish()
    }
}
