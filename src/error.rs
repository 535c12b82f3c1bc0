use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;
pub type TokenReaderResult<T> = std::result::Result<T, TokenReaderError>;
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration : {0}")]
    Config(#[from] ConfigError),
    #[error("token acquisition failed : {0}")]
    TokenReader(#[from] TokenReaderError),
    #[error("OAuth sign failed : {0}")]
    Signer(#[from] SignError),
    #[error("request failed : {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("provider answered {status} : {body}")]
    Provider { status: StatusCode, body: String },
    #[error("callback request does not contain oauth_verifier")]
    MissingVerifier,
    #[error("no authorization is pending for this session")]
    NoPendingAuthorization,
    #[error("callback token {received} does not match the pending request token")]
    TokenMismatch { received: String },
    #[error("pending authorization expired")]
    AuthorizationExpired,
}

impl Error {
    /// Status code used when this error ends a middleware request.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MissingVerifier
            | Error::NoPendingAuthorization
            | Error::TokenMismatch { .. }
            | Error::AuthorizationExpired => StatusCode::BAD_REQUEST,
            Error::TokenReader(_) | Error::Reqwest(_) | Error::Provider { .. } => {
                StatusCode::BAD_GATEWAY
            }
            Error::Config(_) | Error::Signer(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match status {
            // provider responses may echo credentials, keep them out of the page
            StatusCode::BAD_GATEWAY => "the OAuth provider could not be reached".to_string(),
            _ => self.to_string(),
        };
        (status, body).into_response()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("invalid url for {field} : {source}")]
    InvalidUrl {
        field: &'static str,
        source: url::ParseError,
    },
    #[error("invalid path {0}, must start with '/'")]
    InvalidPath(String),
    #[error("environment variable {0} is not set")]
    UnresolvedEnv(String),
    #[error("could not parse configuration : {0}")]
    Parse(String),
    #[error("could not read configuration : {0}")]
    Io(String),
}

#[derive(Error, Debug, Clone)]
pub enum SignError {
    #[error("authorization header could not be built : {0}")]
    InvalidHeader(String),
    #[error("form body is streamed and cannot be included in the signature")]
    UnreadableBody,
    #[error("form body is not valid UTF-8")]
    InvalidBodyEncoding,
}

#[derive(Error, Debug, Clone)]
pub enum TokenReaderError {
    #[error("response has malformed format: not found {0} in {1}")]
    TokenKeyNotFound(&'static str, String),
}
