use http::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use oauth1_request::HmacSha1;
use reqwest::{Request, RequestBuilder};

use crate::{
    AccessToken, ConfigError, ConsumerCredentials, OAuthParameters, Result, Secrets, SignError,
    Signer,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Signs outbound requests with a stored access token.
///
/// ```ignore
/// let signer = RequestSigner::new(&token, &credentials)?;
/// let resp = reqwest::Client::new()
///     .get("https://api.example.com/1.1/account/verify_credentials.json")
///     .oauth1_sign(&signer)?
///     .send()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: ConsumerCredentials,
    token: AccessToken,
    parameters: OAuthParameters<'static, HmacSha1>,
}

impl RequestSigner {
    /// Fails if either the access token or the consumer credentials are incomplete.
    pub fn new(token: &AccessToken, credentials: &ConsumerCredentials) -> Result<Self> {
        if token.access_token.is_empty() {
            return Err(ConfigError::Missing("access token").into());
        }
        if token.token_secret.is_empty() {
            return Err(ConfigError::Missing("access token secret").into());
        }
        credentials.check()?;
        Ok(RequestSigner {
            credentials: credentials.clone(),
            token: token.clone(),
            parameters: OAuthParameters::new(),
        })
    }

    /// Pin nonce, timestamp, realm or version. Mostly useful for reproducible signatures.
    pub fn with_parameters(self, parameters: OAuthParameters<'static, HmacSha1>) -> Self {
        RequestSigner { parameters, ..self }
    }

    /// Adds the `Authorization` header to `request` in place.
    ///
    /// Query parameters are always signed. The body is signed only when the
    /// request is `application/x-www-form-urlencoded`; other bodies are not
    /// part of an OAuth 1.0a signature.
    pub fn sign(&self, request: &mut Request) -> Result<()> {
        let form_body = if is_form(request.headers()) {
            match request.body() {
                Some(body) => {
                    let bytes = body.as_bytes().ok_or(SignError::UnreadableBody)?;
                    Some(std::str::from_utf8(bytes).map_err(|_| SignError::InvalidBodyEncoding)?)
                }
                None => None,
            }
        } else {
            None
        };

        let secrets = Secrets::new(&self.credentials)
            .token(&self.token.access_token, &self.token.token_secret);
        let authorization = Signer::new(&secrets, self.parameters.clone()).authorization(
            request.method(),
            request.url(),
            form_body,
        );
        let value = HeaderValue::from_str(&authorization)
            .map_err(|e| SignError::InvalidHeader(e.to_string()))?;

        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(())
    }
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v.starts_with(FORM_CONTENT_TYPE))
}

/// Adds [`RequestSigner`] signing to `reqwest::RequestBuilder`.
// this trait is sealed
pub trait OAuthRequestBuilderExt: private::Sealed {
    fn oauth1_sign(self, signer: &RequestSigner) -> Result<RequestBuilder>;
}

impl OAuthRequestBuilderExt for RequestBuilder {
    fn oauth1_sign(self, signer: &RequestSigner) -> Result<RequestBuilder> {
        let (client, request) = self.build_split();
        let mut request = request?;
        signer.sign(&mut request)?;
        Ok(RequestBuilder::from_parts(client, request))
    }
}

mod private {
    pub trait Sealed {}
    impl Sealed for reqwest::RequestBuilder {}
}
