//! Serves a single page behind an OAuth 1.0a sign-in.
//!
//! ```text
//! CONSUMER_KEY=... CONSUMER_SECRET=... RUST_LOG=info \
//!     cargo run --example server -- demos/gatekeeper.toml
//! ```
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Router, ServiceExt};
use oauth1_gatekeeper::{
    AccessToken, Config, ConsumerCredentials, MemorySessionStore, OAuth1Layer,
    OAuthRequestBuilderExt, RequestSigner,
};
use tokio::net::TcpListener;
use tower::Layer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone)]
struct ApiAccess {
    credentials: ConsumerCredentials,
    verify_url: Option<String>,
}

async fn home(Extension(token): Extension<AccessToken>) -> String {
    let name = token
        .extra
        .get("screen_name")
        .map(String::as_str)
        .unwrap_or("unknown user");
    format!("Signed in as {}. Try /me for a signed API call.", name)
}

async fn me(
    Extension(token): Extension<AccessToken>,
    Extension(api): Extension<ApiAccess>,
) -> Result<String, (StatusCode, String)> {
    let url = api
        .verify_url
        .ok_or((StatusCode::NOT_FOUND, "no verifyUrl configured".to_string()))?;
    let signer = RequestSigner::new(&token, &api.credentials)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let resp = reqwest::Client::new()
        .get(url)
        .oauth1_sign(&signer)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .send()
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;
    resp.text()
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/gatekeeper.toml".to_string());
    let config = Config::from_path(&path)?;

    let ttl = config.pending_ttl();
    let store = MemorySessionStore::with_pending_ttl(ttl);
    let sweeper = store.clone();
    tokio::spawn(async move {
        // new sign-ins sweep too; this covers quiet periods
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        loop {
            tick.tick().await;
            let purged = sweeper.purge_expired(ttl).await;
            if purged > 0 {
                info!(purged, "dropped abandoned sign-ins");
            }
        }
    });

    let api = ApiAccess {
        credentials: config.credentials()?,
        verify_url: config.provider.verify_url.clone(),
    };
    let router = Router::new()
        .route("/", get(home))
        .route("/me", get(me))
        .layer(Extension(api));
    // wrap the whole router so the callback path needs no route of its own
    let app = OAuth1Layer::from_config(&config, Arc::new(store))?.layer(router);

    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    info!("listening on http://127.0.0.1:3000");
    axum::serve(listener, ServiceExt::<Request>::into_make_service(app)).await?;
    Ok(())
}
