use std::collections::HashMap;
use std::future::Future;

use async_trait::async_trait;
use reqwest::Response;
use serde::Deserialize;

use crate::{Error, Result, TokenReaderError, TokenReaderResult, OAUTH_TOKEN_KEY};

const OAUTH_TOKEN_SECRET_KEY: &str = "oauth_token_secret";
const OAUTH_CALLBACK_CONFIRMED_KEY: &str = "oauth_callback_confirmed";

/// Body of a request-token or access-token response.
#[derive(Deserialize, Debug)]
pub struct TokenResponse {
    pub oauth_token: String,
    pub oauth_token_secret: String,
    /// Every other pair the provider sent.
    #[serde(flatten)]
    pub remain: HashMap<String, String>,
}

impl TokenResponse {
    /// `true` when the provider acknowledged the callback (OAuth 1.0a).
    pub fn callback_confirmed(&self) -> bool {
        self.remain
            .get(OAUTH_CALLBACK_CONFIRMED_KEY)
            .map_or(false, |v| v == "true")
    }

    /// Provider-specific extras, such as `user_id` or `screen_name`.
    pub fn into_extras(mut self) -> HashMap<String, String> {
        self.remain.remove(OAUTH_CALLBACK_CONFIRMED_KEY);
        self.remain
    }
}

/// Reads a token endpoint's `application/x-www-form-urlencoded` answer.
///
/// A non-2xx status becomes [`Error::Provider`] carrying the body.
// sealed
#[async_trait]
pub trait TokenReader: private::Sealed {
    async fn parse_oauth_token(self) -> Result<TokenResponse>;
}

#[async_trait]
impl TokenReader for Response {
    async fn parse_oauth_token(self) -> Result<TokenResponse> {
        let status = self.status();
        let body = self.text().await?;
        if !status.is_success() {
            return Err(Error::Provider { status, body });
        }
        Ok(parse_token_body(body)?)
    }
}

/// [`TokenReader`] for a pending `send()`, so the two chain.
// sealed as well
#[async_trait]
pub trait TokenReaderFuture: private::SealedWrapper {
    async fn parse_oauth_token(self) -> Result<TokenResponse>;
}

#[async_trait]
impl<T, E> TokenReaderFuture for T
where
    T: Future<Output = std::result::Result<Response, E>> + Send,
    E: Into<Error> + Send + 'static,
{
    async fn parse_oauth_token(self) -> Result<TokenResponse> {
        let resp = self.await.map_err(Into::<Error>::into)?;
        resp.parse_oauth_token().await
    }
}

fn parse_token_body(body: String) -> TokenReaderResult<TokenResponse> {
    let mut pairs: HashMap<String, String> = url::form_urlencoded::parse(body.as_bytes())
        .into_owned()
        .collect();
    let token = match pairs.remove(OAUTH_TOKEN_KEY) {
        Some(token) => token,
        None => return Err(TokenReaderError::TokenKeyNotFound(OAUTH_TOKEN_KEY, body)),
    };
    let secret = match pairs.remove(OAUTH_TOKEN_SECRET_KEY) {
        Some(secret) => secret,
        None => {
            return Err(TokenReaderError::TokenKeyNotFound(
                OAUTH_TOKEN_SECRET_KEY,
                body,
            ))
        }
    };
    Ok(TokenResponse {
        oauth_token: token,
        oauth_token_secret: secret,
        remain: pairs,
    })
}

mod private {
    use std::future::Future;

    use reqwest::Response;

    use crate::Error;

    pub trait Sealed {}
    impl Sealed for Response {}

    pub trait SealedWrapper {}
    impl<T, E> SealedWrapper for T
    where
        T: Future<Output = Result<Response, E>>,
        E: Into<Error>,
    {
    }
}
