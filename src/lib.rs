/*!
oauth1-gatekeeper: three-legged OAuth 1.0a sign-in for axum, signing for reqwest.

# Overview

This library puts an OAuth 1.0a sign-in in front of an [axum](https://crates.io/crates/axum)
application and signs outbound [reqwest](https://crates.io/crates/reqwest) calls with the
token it obtained. Signatures are computed by [oauth1-request](https://crates.io/crates/oauth1-request);
this crate only orders the four round-trips of the dance:
request token, user redirect, callback, access token.

# How to use

## Basic usecase 1 - protecting an application

```ignore
use std::sync::Arc;
use axum::{extract::Request, routing::get, Extension, Router, ServiceExt};
use oauth1_gatekeeper::{AccessToken, Config, MemorySessionStore, OAuth1Layer};
use tower::Layer;

let config = Config::from_path("gatekeeper.toml")?;
let store = Arc::new(MemorySessionStore::new());

let router = Router::new()
    .route("/", get(|Extension(token): Extension<AccessToken>| async move {
        format!("signed in with token {}", token.access_token)
    }));
let app = OAuth1Layer::from_config(&config, store)?.layer(router);

axum::serve(listener, ServiceExt::<Request>::into_make_service(app)).await?;
```

An unauthenticated visit to a protected path renders a `Sign in with <provider>` page.
After the provider calls back, the user is redirected to the page they asked for and
handlers find the [`AccessToken`] in the request extensions.

## Basic usecase 2 - calling the provider's API

```ignore
use oauth1_gatekeeper::{OAuthRequestBuilderExt, RequestSigner};

let signer = RequestSigner::new(&token, &config.credentials()?)?;

let resp = reqwest::Client::new()
    .post("https://api.twitter.com/1.1/statuses/update.json")
    .form(&[("status", "Hello, Twitter!")])
    .oauth1_sign(&signer)?
    .send()
    .await?;
```

## Basic usecase 3 - driving the dance by hand

```ignore
use oauth1_gatekeeper::{Callback, Consumer, ConsumerCredentials, Provider, ProviderUrls};

let provider = Provider::new(
    ProviderUrls::parse(
        "https://api.twitter.com/oauth/request_token",
        "https://api.twitter.com/oauth/access_token",
        "https://api.twitter.com/oauth/authorize",
    )?,
    Callback::new("https://example.com", "/oauth/callback")?,
)?;

let mut consumer = Consumer::new(ConsumerCredentials::new("[CONSUMER_KEY]", "[CONSUMER_SECRET]")?);
let sign_in_url = provider.retrieve_sign_in_url(&mut consumer, "/").await?;
println!("please access to: {}", sign_in_url);

// ... the provider calls back with oauth_verifier ...
let token = provider.retrieve_access_token(&mut consumer, &verifier).await?;
```
*/
mod config;
mod consumer;
mod error;
mod gate;
mod incoming;
mod middleware;
pub mod page;
mod provider;
mod request;
mod secrets;
mod session;
mod signer;
mod token_reader;
#[cfg(test)]
mod test_support;
#[cfg(test)]
mod usage_test;

// exposed to external program
pub use config::{
    CallbackConfig, Config, ConsumerConfig, ProviderConfig, ProviderUrlsConfig, SessionConfig,
};
pub use consumer::{AccessToken, Consumer, RequestToken};
pub use error::{
    ConfigError, ConfigResult, Error, Result, SignError, TokenReaderError,
    TokenReaderResult,
};
pub use gate::{Gatekeeper, Outcome, RevisitPolicy, DEFAULT_PENDING_TTL_SECS};
pub use incoming::IncomingRequest;
pub use middleware::{OAuth1Layer, OAuth1Service, DEFAULT_SESSION_COOKIE};
pub use provider::{
    Callback, Provider, ProviderUrls, DEFAULT_FORWARD_PARAM, DEFAULT_TIMEOUT, LEGACY_FORWARD_PARAM,
};
pub use request::{OAuthRequestBuilderExt, RequestSigner};
pub use secrets::{ConsumerCredentials, Secrets, SecretsProvider};
pub use session::{MemorySessionStore, PendingAuthorization, SessionState, SessionStore};
pub use signer::{OAuthParameters, Signer};
pub use token_reader::{TokenReader, TokenReaderFuture, TokenResponse};

// exposed constant variables
/// Represents `oauth_token`.
pub const OAUTH_TOKEN_KEY: &str = "oauth_token";
/// Represents `oauth_verifier`.
pub const OAUTH_VERIFIER_KEY: &str = "oauth_verifier";
/// Sent by the provider instead of a verifier when the user declines.
pub const DENIED_KEY: &str = "denied";
/// Represents `realm`.
pub const REALM_KEY: &str = "realm";

// crate-private constant variables
pub(crate) const OAUTH_KEY_PREFIX: &str = "oauth_";
