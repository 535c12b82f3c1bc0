use std::time::Duration;

use http::header::AUTHORIZATION;
use http::{Method, StatusCode};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    AccessToken, ConfigError, Consumer, ConsumerCredentials, Error, IncomingRequest,
    OAuthParameters, OAuthRequestBuilderExt, RequestSigner, RequestToken, Result, Signer,
    TokenReaderFuture, OAUTH_TOKEN_KEY,
};

/// Query parameter carrying the originally requested path through the provider.
pub const DEFAULT_FORWARD_PARAM: &str = "xRingoForward";
/// Older name of the forward parameter, still accepted on callbacks.
pub const LEGACY_FORWARD_PARAM: &str = "xRingoOAuthForward";
/// Applied to both token requests unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// The three OAuth 1.0a endpoints of a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderUrls {
    pub request_token: Url,
    pub access_token: Url,
    pub authorize: Url,
}

impl ProviderUrls {
    pub fn parse(request_token: &str, access_token: &str, authorize: &str) -> Result<Self> {
        Ok(ProviderUrls {
            request_token: parse_url("request token url", request_token)?,
            access_token: parse_url("access token url", access_token)?,
            authorize: parse_url("authorize url", authorize)?,
        })
    }
}

fn parse_url(field: &'static str, value: &str) -> std::result::Result<Url, ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Missing(field));
    }
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl { field, source })
}

/// Where the provider sends the user back: `host` is scheme and authority,
/// `path` the route the middleware intercepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callback {
    host: String,
    path: String,
}

impl Callback {
    pub fn new<H, P>(host: H, path: P) -> Result<Self>
    where
        H: Into<String>,
        P: Into<String>,
    {
        let host = host.into();
        let path = path.into();
        if host.is_empty() {
            return Err(ConfigError::Missing("callback host").into());
        }
        if path.is_empty() {
            return Err(ConfigError::Missing("callback path").into());
        }
        if !path.starts_with('/') {
            return Err(ConfigError::InvalidPath(path).into());
        }
        Ok(Callback {
            host: host.trim_end_matches('/').to_string(),
            path,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// An OAuth 1.0a provider: endpoints plus callback configuration.
///
/// Holds no per-user data, so one `Provider` serves every [`Consumer`].
/// Methods prefixed `retrieve_` call the provider over HTTP; the others are local.
#[derive(Debug, Clone)]
pub struct Provider {
    urls: ProviderUrls,
    callback: Callback,
    callback_base: Url,
    forward_param: String,
    http: reqwest::Client,
}

impl Provider {
    /// Uses a client with [`DEFAULT_TIMEOUT`].
    pub fn new(urls: ProviderUrls, callback: Callback) -> Result<Self> {
        Self::with_timeout(urls, callback, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(urls: ProviderUrls, callback: Callback, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Self::with_client(urls, callback, http)
    }

    /// Timeouts and proxies are whatever `http` was built with.
    pub fn with_client(urls: ProviderUrls, callback: Callback, http: reqwest::Client) -> Result<Self> {
        let joined = format!("{}{}", callback.host, callback.path);
        let callback_base = Url::parse(&joined).map_err(|source| ConfigError::InvalidUrl {
            field: "callback host",
            source,
        })?;
        Ok(Provider {
            urls,
            callback,
            callback_base,
            forward_param: DEFAULT_FORWARD_PARAM.to_string(),
            http,
        })
    }

    /// Rename the forward query parameter.
    pub fn forward_param<T: Into<String>>(self, name: T) -> Self {
        Provider {
            forward_param: name.into(),
            ..self
        }
    }

    pub fn urls(&self) -> &ProviderUrls {
        &self.urls
    }

    pub fn callback(&self) -> &Callback {
        &self.callback
    }

    /// `true` if `path` starts with the configured callback path.
    pub fn is_callback_path(&self, path: &str) -> bool {
        path.starts_with(&self.callback.path)
    }

    /// Callback URL that brings the user back to `protected_path` afterwards.
    pub fn callback_url(&self, protected_path: &str) -> Url {
        let mut url = self.callback_base.clone();
        url.query_pairs_mut()
            .append_pair(&self.forward_param, protected_path);
        url
    }

    /// URL the user visits to authorize `request_token`.
    pub fn authorize_url(&self, request_token: &str) -> Url {
        let mut url = self.urls.authorize.clone();
        url.query_pairs_mut()
            .append_pair(OAUTH_TOKEN_KEY, request_token);
        url
    }

    /// The originally requested path carried by a callback request.
    ///
    /// Only local absolute paths are returned.
    pub fn protected_path(&self, request: &IncomingRequest) -> Option<String> {
        request
            .param(&self.forward_param)
            .or_else(|| request.param(LEGACY_FORWARD_PARAM))
            .filter(|path| is_local_path(path))
            .map(str::to_owned)
    }

    /// Fetches a request token for `consumer` and returns the sign-in URL.
    ///
    /// `protected_path` is folded into the callback so the user can be
    /// sent back to it once authorization completes.
    pub async fn retrieve_sign_in_url(
        &self,
        consumer: &mut Consumer,
        protected_path: &str,
    ) -> Result<Url> {
        let callback = self.callback_url(protected_path);
        let params = OAuthParameters::new().callback(callback.as_str());
        let authorization = Signer::new(&consumer.secrets(), params).authorization(
            &Method::POST,
            &self.urls.request_token,
            None,
        );

        debug!(url = %self.urls.request_token, "fetching request token");
        let resp = self
            .http
            .post(self.urls.request_token.clone())
            .header(AUTHORIZATION, authorization)
            .send()
            .parse_oauth_token()
            .await?;

        let callback_confirmed = resp.callback_confirmed();
        if !callback_confirmed {
            warn!("provider did not confirm the callback, it may not speak OAuth 1.0a");
        }
        let url = self.authorize_url(&resp.oauth_token);
        consumer.set_request_token(RequestToken {
            token: resp.oauth_token,
            secret: resp.oauth_token_secret,
            callback_confirmed,
        });
        Ok(url)
    }

    /// Exchanges `verifier` and the pending request token of `consumer`
    /// for an access token, which is also stored on `consumer`.
    pub async fn retrieve_access_token(
        &self,
        consumer: &mut Consumer,
        verifier: &str,
    ) -> Result<AccessToken> {
        if consumer.request_token().is_none() {
            return Err(Error::NoPendingAuthorization);
        }
        let params = OAuthParameters::new().verifier(verifier);
        let authorization = Signer::new(&consumer.secrets(), params).authorization(
            &Method::POST,
            &self.urls.access_token,
            None,
        );

        debug!(url = %self.urls.access_token, "fetching access token");
        let resp = self
            .http
            .post(self.urls.access_token.clone())
            .header(AUTHORIZATION, authorization)
            .send()
            .parse_oauth_token()
            .await?;

        let token = AccessToken {
            access_token: resp.oauth_token.clone(),
            token_secret: resp.oauth_token_secret.clone(),
            extra: resp.into_extras(),
        };
        consumer.set_access_token(token.clone());
        info!("access token acquired");
        Ok(token)
    }

    /// Checks that `token` is still honored, with a signed `GET` to `url`.
    ///
    /// `Ok(false)` means the provider answered 401 and the token should be dropped.
    pub async fn retrieve_access_check(
        &self,
        token: &AccessToken,
        credentials: &ConsumerCredentials,
        url: &Url,
    ) -> Result<bool> {
        let signer = RequestSigner::new(token, credentials)?;
        let resp = self.http.get(url.clone()).oauth1_sign(&signer)?.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(true);
        }
        if status == StatusCode::UNAUTHORIZED {
            info!(%url, "stored access token was rejected");
            return Ok(false);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(Error::Provider { status, body })
    }
}

/// Same-origin path fit for a `Location` header.
///
/// Browsers drop tabs and newlines from URLs, so `/\t/host` would become `//host`.
pub(crate) fn is_local_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.starts_with("//")
        && !path.contains('\\')
        && !path.chars().any(|c| c.is_control())
}
