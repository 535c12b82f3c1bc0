use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::header::LOCATION;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tower::{Layer, Service};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{Config, Gatekeeper, IncomingRequest, Outcome, Result, SessionStore};

/// Cookie holding the session id unless configured otherwise.
pub const DEFAULT_SESSION_COOKIE: &str = "oauth1_session";

/// `tower` layer running the sign-in flow in front of an application.
///
/// ```ignore
/// let store = Arc::new(MemorySessionStore::new());
/// let router = Router::new().route("/", get(home));
/// let app = OAuth1Layer::from_config(&config, store)?.layer(router);
/// ```
///
/// Wrapping the whole router, rather than `Router::layer`, lets the callback
/// path through without a route of its own.
///
/// Handlers behind a protected path find the [`AccessToken`](crate::AccessToken)
/// in the request extensions.
#[derive(Debug, Clone)]
pub struct OAuth1Layer {
    gate: Arc<Gatekeeper>,
    cookie_name: Arc<str>,
    secure_cookie: bool,
}

impl OAuth1Layer {
    pub fn new(gate: Gatekeeper) -> Self {
        OAuth1Layer {
            gate: Arc::new(gate),
            cookie_name: Arc::from(DEFAULT_SESSION_COOKIE),
            secure_cookie: false,
        }
    }

    pub fn from_config(config: &Config, store: Arc<dyn SessionStore>) -> Result<Self> {
        let gate = Gatekeeper::from_config(config, store)?;
        Ok(OAuth1Layer::new(gate)
            .cookie_name(config.cookie_name())
            .secure_cookie(config.secure_cookie()))
    }

    pub fn cookie_name<T: AsRef<str>>(self, name: T) -> Self {
        OAuth1Layer {
            cookie_name: Arc::from(name.as_ref()),
            ..self
        }
    }

    /// Marks the session cookie `Secure`, for deployments served over HTTPS only.
    pub fn secure_cookie(self, secure_cookie: bool) -> Self {
        OAuth1Layer {
            secure_cookie,
            ..self
        }
    }

    pub fn gatekeeper(&self) -> &Gatekeeper {
        &self.gate
    }
}

impl<S> Layer<S> for OAuth1Layer {
    type Service = OAuth1Service<S>;

    fn layer(&self, inner: S) -> Self::Service {
        OAuth1Service {
            inner,
            gate: self.gate.clone(),
            cookie_name: self.cookie_name.clone(),
            secure_cookie: self.secure_cookie,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OAuth1Service<S> {
    inner: S,
    gate: Arc<Gatekeeper>,
    cookie_name: Arc<str>,
    secure_cookie: bool,
}

impl<S, ReqBody> Service<Request<ReqBody>> for OAuth1Service<S>
where
    S: Service<Request<ReqBody>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let inner = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, inner);
        let gate = self.gate.clone();
        let cookie_name = self.cookie_name.clone();
        let secure_cookie = self.secure_cookie;

        Box::pin(async move {
            let (mut parts, body) = request.into_parts();
            let incoming = IncomingRequest::from_parts(&parts);
            let (session_id, fresh) = match incoming.cookie(&cookie_name) {
                Some(id) if !id.is_empty() => (id, false),
                _ => (Uuid::new_v4().to_string(), true),
            };

            let outcome = gate.handle(&session_id, &incoming).await;
            let issue_cookie = fresh && matches!(outcome, Ok(Outcome::SignIn { .. }));
            let response = match outcome {
                Ok(Outcome::Forward(token)) => {
                    if let Some(token) = token {
                        parts.extensions.insert(token);
                    }
                    return inner.call(Request::from_parts(parts, body)).await;
                }
                Ok(Outcome::SignIn { page, .. }) => Html(page).into_response(),
                Ok(Outcome::Redirect { location }) => see_other(&location),
                Ok(Outcome::Denied { page }) => (StatusCode::FORBIDDEN, Html(page)).into_response(),
                Err(err) => {
                    warn!(path = incoming.path(), error = %err, "OAuth sign-in failed");
                    err.into_response()
                }
            };

            if !issue_cookie {
                return Ok(response);
            }
            debug!("issuing session cookie");
            let cookie = Cookie::build((cookie_name.to_string(), session_id))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .secure(secure_cookie);
            Ok((CookieJar::new().add(cookie), response).into_response())
        })
    }
}

fn see_other(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (
            StatusCode::SEE_OTHER,
            [(LOCATION, value)],
            format!("See other: {}", location),
        )
            .into_response(),
        Err(_) => (StatusCode::BAD_REQUEST, "invalid forward path").into_response(),
    }
}
