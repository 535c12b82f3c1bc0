use std::sync::Arc;

use wiremock::{Match, Request};

use crate::{
    Callback, Consumer, ConsumerCredentials, Gatekeeper, MemorySessionStore, PendingAuthorization,
    Provider, ProviderUrls, RequestToken, SessionState,
};

/// Matches requests whose `Authorization` header contains the given text.
pub(crate) struct AuthorizationContains(pub &'static str);

impl Match for AuthorizationContains {
    fn matches(&self, request: &Request) -> bool {
        request
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map_or(false, |v| v.contains(self.0))
    }
}

/// Gatekeeper for a provider at `base`, calling back on `http://h/cb`.
pub(crate) fn gatekeeper(base: &str, store: &MemorySessionStore, protected: &[&str]) -> Gatekeeper {
    let urls = ProviderUrls::parse(
        &format!("{}/rt", base),
        &format!("{}/at", base),
        &format!("{}/auth", base),
    )
    .unwrap();
    let provider = Provider::new(urls, Callback::new("http://h", "/cb").unwrap()).unwrap();
    Gatekeeper::new(
        Arc::new(provider),
        ConsumerCredentials::new("K", "S").unwrap(),
        protected.iter().map(|p| p.to_string()).collect(),
        Arc::new(store.clone()),
    )
    .branding("Example", Some("/example.png".to_string()))
}

/// Sign-in waiting on the provider, holding request token `temp`.
pub(crate) fn pending(forward_path: &str) -> SessionState {
    let mut consumer = Consumer::new(ConsumerCredentials::new("K", "S").unwrap());
    consumer.set_request_token(RequestToken {
        token: "temp".into(),
        secret: "tsecret".into(),
        callback_confirmed: true,
    });
    SessionState::Pending(PendingAuthorization::new(consumer, forward_path))
}
