use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::{Extension, Router};
use tower::{Layer, ServiceExt};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::test_support::AuthorizationContains;
use crate::{
    AccessToken, Config, MemorySessionStore, OAuth1Layer, OAuthRequestBuilderExt, RequestSigner,
    SessionState, SessionStore,
};

fn config(provider: &str) -> Config {
    let text = format!(
        r#"
protectedPaths = ["/"]

[consumer]
key = "[CONSUMER_KEY]"
secret = "[CONSUMER_SECRET]"
callback = {{ host = "http://h", path = "/cb" }}

[provider]
name = "Example"
image = "/example.png"
urls = {{ requestToken = "{p}/rt", accessToken = "{p}/at", authorize = "{p}/auth" }}
"#,
        p = provider
    );
    Config::from_toml_str(&text).unwrap()
}

fn get_with_cookie(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

async fn text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn usage_test() {
    // the provider
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rt"))
        .and(AuthorizationContains("oauth_consumer_key=\"%5BCONSUMER_KEY%5D\""))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "oauth_token=temp&oauth_token_secret=tsecret&oauth_callback_confirmed=true",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/at"))
        .and(AuthorizationContains("oauth_token=\"temp\""))
        .and(AuthorizationContains("oauth_verifier=\"V\""))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "oauth_token=perm&oauth_token_secret=psecret&screen_name=someone",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1.1/account/verify_credentials.json"))
        .and(AuthorizationContains("oauth_token=\"perm\""))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"screen_name\":\"someone\"}"))
        .expect(1)
        .mount(&server)
        .await;

    // the application
    let config = config(&server.uri());
    let store = MemorySessionStore::new();
    let layer = OAuth1Layer::from_config(&config, Arc::new(store.clone())).unwrap();
    let app = layer.layer(Router::new().route(
        "/",
        get(|Extension(token): Extension<AccessToken>| async move {
            format!("hello {}", token.extra["screen_name"])
        }),
    ));

    // step 1: unauthenticated visit renders the sign-in page
    let resp = app.clone().oneshot(get_with_cookie("/", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = resp.headers()[SET_COOKIE].to_str().unwrap().to_string();
    let cookie = set_cookie.split(';').next().unwrap().to_string();
    let page = text(resp).await;
    assert!(page.contains("<title>Sign in</title>"));
    assert!(page.contains("Sign in with Example"));
    assert!(page.contains(&format!("{}/auth?oauth_token=temp", server.uri())));

    // step 2: the provider calls back with the verifier
    let resp = app
        .clone()
        .oneshot(get_with_cookie(
            "/cb?oauth_verifier=V&xRingoForward=/",
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()[LOCATION], "/");
    assert_eq!(text(resp).await, "See other: /");

    let session_id = cookie.split_once('=').unwrap().1;
    let token = match store.load(session_id).await.unwrap() {
        Some(SessionState::Authorized(token)) => token,
        other => panic!("expected an authorized session, got {:?}", other),
    };
    assert_eq!(token.access_token, "perm");
    assert_eq!(token.token_secret, "psecret");

    // step 3: the application sees the token
    let resp = app.oneshot(get_with_cookie("/", Some(&cookie))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(text(resp).await, "hello someone");

    // step 4: and can call the provider's API with it
    let signer = RequestSigner::new(&token, &config.credentials().unwrap()).unwrap();
    let resp = reqwest::Client::new()
        .get(format!("{}/1.1/account/verify_credentials.json", server.uri()))
        .oauth1_sign(&signer)
        .unwrap()
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
}

#[tokio::test]
async fn minimal_json_config_runs_the_flow() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "oauth_token=temp&oauth_token_secret=tsecret&oauth_callback_confirmed=true",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/at"))
        .and(AuthorizationContains("oauth_verifier=\"V\""))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("oauth_token=perm&oauth_token_secret=psecret"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let json = r#"{"protectedPaths":["/"],"consumer":{"key":"K","secret":"S","callback":{"host":"http://h","path":"/cb"}},"provider":{"urls":{"requestToken":"http://p/rt","accessToken":"http://p/at","authorize":"http://p/auth"}}}"#
        .replace("http://p", &server.uri());
    let config = Config::from_json_str(&json).unwrap();
    let store = MemorySessionStore::new();
    let app = OAuth1Layer::from_config(&config, Arc::new(store.clone()))
        .unwrap()
        .layer(Router::new().route("/", get(|| async { "home" })));

    let resp = app.clone().oneshot(get_with_cookie("/", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = resp.headers()[SET_COOKIE].to_str().unwrap().to_string();
    let cookie = set_cookie.split(';').next().unwrap().to_string();
    let page = text(resp).await;
    assert!(page.contains(&format!("{}/auth?oauth_token=temp", server.uri())));

    let resp = app
        .oneshot(get_with_cookie(
            "/cb?oauth_verifier=V&xRingoForward=/",
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()[LOCATION], "/");

    let session_id = cookie.split_once('=').unwrap().1;
    assert!(matches!(
        store.load(session_id).await.unwrap(),
        Some(SessionState::Authorized(_))
    ));
}
