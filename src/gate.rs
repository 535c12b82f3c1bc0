use std::fmt;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};
use url::Url;

use crate::incoming::normalize_path;
use crate::provider::is_local_path;
use crate::{
    page, AccessToken, Config, Consumer, ConsumerCredentials, Error, IncomingRequest,
    PendingAuthorization, Provider, Result, SessionState, SessionStore, DENIED_KEY,
    OAUTH_TOKEN_KEY, OAUTH_VERIFIER_KEY,
};

/// How long a started sign-in may wait for the provider's callback.
pub const DEFAULT_PENDING_TTL_SECS: i64 = 15 * 60;

/// What to do when an already authorized session comes back.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RevisitPolicy {
    /// Let it through on the stored token.
    #[default]
    Trust,
    /// Ask the provider first, with a signed `GET` to `url`. A 401 restarts sign-in.
    Verify { url: Url },
}

/// Result of looking at one inbound request.
#[derive(Debug)]
pub enum Outcome {
    /// Hand the request to the application. Carries the token on protected paths.
    Forward(Option<AccessToken>),
    /// Render the sign-in page.
    SignIn { authorize_url: Url, page: String },
    /// `303 See Other` back to the originally requested path.
    Redirect { location: String },
    /// The user declined at the provider.
    Denied { page: String },
}

/// Decides, per request, between the callback branch, the protected-path
/// branch and plain pass-through.
pub struct Gatekeeper {
    provider: Arc<Provider>,
    credentials: ConsumerCredentials,
    protected_paths: Vec<String>,
    provider_name: String,
    provider_image: Option<String>,
    revisit: RevisitPolicy,
    pending_ttl: Duration,
    store: Arc<dyn SessionStore>,
}

impl Gatekeeper {
    pub fn new(
        provider: Arc<Provider>,
        credentials: ConsumerCredentials,
        protected_paths: Vec<String>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Gatekeeper {
            provider,
            credentials,
            protected_paths: protected_paths.iter().map(|p| normalize_path(p)).collect(),
            provider_name: String::new(),
            provider_image: None,
            revisit: RevisitPolicy::default(),
            pending_ttl: Duration::seconds(DEFAULT_PENDING_TTL_SECS),
            store,
        }
    }

    pub fn from_config(config: &Config, store: Arc<dyn SessionStore>) -> Result<Self> {
        config.validate()?;
        let mut provider =
            Provider::with_timeout(config.provider_urls()?, config.callback()?, config.timeout())?;
        if let Some(ref param) = config.provider.forward_param {
            provider = provider.forward_param(param.as_str());
        }
        let gate = Gatekeeper::new(
            Arc::new(provider),
            config.credentials()?,
            config.protected_paths.clone(),
            store,
        )
        .branding(config.provider_name(), config.provider.image.clone())
        .revisit_policy(config.revisit_policy()?)
        .pending_ttl(config.pending_ttl());
        Ok(gate)
    }

    /// Name and image shown on the sign-in page.
    pub fn branding<N: Into<String>>(self, name: N, image: Option<String>) -> Self {
        Gatekeeper {
            provider_name: name.into(),
            provider_image: image,
            ..self
        }
    }

    pub fn revisit_policy(self, revisit: RevisitPolicy) -> Self {
        Gatekeeper { revisit, ..self }
    }

    pub fn pending_ttl(self, pending_ttl: Duration) -> Self {
        Gatekeeper {
            pending_ttl,
            ..self
        }
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Prefix match on whole path segments.
    pub fn is_protected(&self, path: &str) -> bool {
        self.protected_paths.iter().any(|prefix| {
            let prefix = prefix.trim_end_matches('/');
            path.strip_prefix(prefix)
                .map_or(false, |rest| rest.is_empty() || rest.starts_with('/'))
        })
    }

    pub async fn handle(&self, session_id: &str, request: &IncomingRequest) -> Result<Outcome> {
        let path = request.path();
        if self.provider.is_callback_path(path) {
            return self.handle_callback(session_id, request).await;
        }
        if self.is_protected(path) {
            return self.handle_protected(session_id, request).await;
        }
        Ok(Outcome::Forward(None))
    }

    async fn handle_protected(&self, session_id: &str, request: &IncomingRequest) -> Result<Outcome> {
        debug!(path = request.path(), "protected path");
        if let Some(SessionState::Authorized(token)) = self.store.load(session_id).await? {
            match self.revisit {
                RevisitPolicy::Trust => return Ok(Outcome::Forward(Some(token))),
                RevisitPolicy::Verify { ref url } => {
                    let honored = self
                        .provider
                        .retrieve_access_check(&token, &self.credentials, url)
                        .await?;
                    if honored {
                        return Ok(Outcome::Forward(Some(token)));
                    }
                    self.store.remove(session_id).await?;
                }
            }
        }
        self.start_authorization(session_id, request.path()).await
    }

    async fn start_authorization(&self, session_id: &str, path: &str) -> Result<Outcome> {
        let mut consumer = Consumer::new(self.credentials.clone());
        self.store
            .store(
                session_id,
                SessionState::Pending(PendingAuthorization::new(consumer.clone(), path)),
            )
            .await?;

        let authorize_url = self.provider.retrieve_sign_in_url(&mut consumer, path).await?;
        self.store
            .store(
                session_id,
                SessionState::Pending(PendingAuthorization::new(consumer, path)),
            )
            .await?;

        info!(provider = %self.provider_name, "sign-in started");
        let page = page::sign_in(
            &self.provider_name,
            self.provider_image.as_deref(),
            &authorize_url,
        );
        Ok(Outcome::SignIn {
            authorize_url,
            page,
        })
    }

    async fn handle_callback(&self, session_id: &str, request: &IncomingRequest) -> Result<Outcome> {
        debug!(path = request.path(), "provider called back");
        let pending = match self.store.load(session_id).await? {
            Some(SessionState::Pending(pending)) => pending,
            _ => return Err(Error::NoPendingAuthorization),
        };

        if let Some(denied) = request.param(DENIED_KEY) {
            // only the sign-in the provider is answering may be dropped
            if let Some(expected) = pending.consumer.request_token() {
                if denied != expected.token {
                    return Err(Error::TokenMismatch {
                        received: denied.to_string(),
                    });
                }
            }
            warn!(provider = %self.provider_name, "user denied authorization");
            self.store.remove(session_id).await?;
            return Ok(Outcome::Denied {
                page: page::denied(&self.provider_name),
            });
        }

        if pending.is_expired(self.pending_ttl, Utc::now()) {
            self.store.remove(session_id).await?;
            return Err(Error::AuthorizationExpired);
        }

        let verifier = request
            .param(OAUTH_VERIFIER_KEY)
            .filter(|v| !v.is_empty())
            .ok_or(Error::MissingVerifier)?;
        if let (Some(received), Some(expected)) = (
            request.param(OAUTH_TOKEN_KEY),
            pending.consumer.request_token(),
        ) {
            if received != expected.token {
                return Err(Error::TokenMismatch {
                    received: received.to_string(),
                });
            }
        }

        // resolved before the exchange, always a valid Location value
        let location = self
            .provider
            .protected_path(request)
            .or_else(|| Some(pending.forward_path.clone()).filter(|p| is_local_path(p)))
            .unwrap_or_else(|| "/".to_string());

        let mut consumer = pending.consumer;
        let token = match self
            .provider
            .retrieve_access_token(&mut consumer, verifier)
            .await
        {
            Ok(token) => token,
            Err(err) => {
                self.store.remove(session_id).await?;
                return Err(err);
            }
        };
        self.store
            .store(session_id, SessionState::Authorized(token))
            .await?;

        info!(%location, "authorization complete");
        Ok(Outcome::Redirect { location })
    }
}

impl fmt::Debug for Gatekeeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gatekeeper")
            .field("provider", &self.provider)
            .field("credentials", &self.credentials)
            .field("protected_paths", &self.protected_paths)
            .field("provider_name", &self.provider_name)
            .field("revisit", &self.revisit)
            .field("pending_ttl", &self.pending_ttl)
            .finish_non_exhaustive()
    }
}
