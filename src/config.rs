use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::gate::DEFAULT_PENDING_TTL_SECS;
use crate::middleware::DEFAULT_SESSION_COOKIE;
use crate::provider::DEFAULT_TIMEOUT;
use crate::{
    Callback, ConfigError, ConfigResult, ConsumerCredentials, ProviderUrls, Result, RevisitPolicy,
};

/// Everything the middleware needs, in the shape of a TOML or JSON document:
///
/// ```toml
/// protectedPaths = ["/"]
///
/// [consumer]
/// key = "${CONSUMER_KEY}"
/// secret = "${CONSUMER_SECRET}"
/// callback = { host = "http://localhost:3000", path = "/oauth/callback" }
///
/// [provider]
/// name = "Twitter"
/// image = "/img/sign-in-with-twitter.png"
/// urls = { requestToken = "...", accessToken = "...", authorize = "..." }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub protected_paths: Vec<String>,
    pub consumer: ConsumerConfig,
    pub provider: ProviderConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Literal value or a `${VAR}` reference.
    #[serde(default)]
    pub key: String,
    /// Literal value or a `${VAR}` reference.
    #[serde(default)]
    pub secret: String,
    pub callback: CallbackConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default)]
    pub name: String,
    pub image: Option<String>,
    pub urls: ProviderUrlsConfig,
    pub forward_param: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Switches revisits to [`RevisitPolicy::Verify`].
    pub verify_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderUrlsConfig {
    #[serde(default)]
    pub request_token: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub authorize: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub cookie_name: Option<String>,
    /// Sets `Secure` on the session cookie.
    pub secure_cookie: Option<bool>,
    pub pending_ttl_secs: Option<u64>,
}

impl Config {
    /// Parses, resolves `${VAR}` references and validates.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Config = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.prepared()
    }

    /// Same as [`Config::from_toml_str`] for JSON documents.
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        let config: Config =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.prepared()
    }

    /// Reads a `.json` file as JSON and anything else as TOML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&text)?,
            _ => Self::from_toml_str(&text)?,
        };
        info!(
            path = %path.display(),
            provider = %config.provider_name(),
            protected = config.protected_paths.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    fn prepared(mut self) -> ConfigResult<Self> {
        self.resolve_env()?;
        self.validate()?;
        Ok(self)
    }

    /// Replaces `${VAR}` consumer credentials with the environment's value.
    pub fn resolve_env(&mut self) -> ConfigResult<()> {
        self.consumer.key = resolve_env_value(&self.consumer.key)?;
        self.consumer.secret = resolve_env_value(&self.consumer.secret)?;
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.protected_paths.is_empty() {
            return Err(ConfigError::Missing("protected paths"));
        }
        if let Some(path) = self.protected_paths.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::InvalidPath(path.clone()));
        }
        self.credentials()?;
        into_config_error(self.callback())?;
        into_config_error(self.provider_urls())?;
        if let Some(ref url) = self.provider.verify_url {
            Url::parse(url).map_err(|source| ConfigError::InvalidUrl {
                field: "verify url",
                source,
            })?;
        }
        Ok(())
    }

    /// `provider.name`, or the authorize URL's host when no name is configured.
    pub fn provider_name(&self) -> String {
        if !self.provider.name.is_empty() {
            return self.provider.name.clone();
        }
        Url::parse(&self.provider.urls.authorize)
            .ok()
            .and_then(|url| url.host_str().map(str::to_owned))
            .unwrap_or_else(|| "the provider".to_string())
    }

    pub fn credentials(&self) -> ConfigResult<ConsumerCredentials> {
        ConsumerCredentials::new(self.consumer.key.as_str(), self.consumer.secret.as_str())
    }

    pub fn callback(&self) -> Result<Callback> {
        Callback::new(
            self.consumer.callback.host.as_str(),
            self.consumer.callback.path.as_str(),
        )
    }

    pub fn provider_urls(&self) -> Result<ProviderUrls> {
        let urls = &self.provider.urls;
        ProviderUrls::parse(&urls.request_token, &urls.access_token, &urls.authorize)
    }

    pub fn timeout(&self) -> Duration {
        self.provider
            .timeout_secs
            .map_or(DEFAULT_TIMEOUT, Duration::from_secs)
    }

    pub fn revisit_policy(&self) -> ConfigResult<RevisitPolicy> {
        match self.provider.verify_url {
            None => Ok(RevisitPolicy::Trust),
            Some(ref url) => {
                let url = Url::parse(url).map_err(|source| ConfigError::InvalidUrl {
                    field: "verify url",
                    source,
                })?;
                Ok(RevisitPolicy::Verify { url })
            }
        }
    }

    pub fn pending_ttl(&self) -> chrono::Duration {
        let secs = self
            .session
            .pending_ttl_secs
            .map_or(DEFAULT_PENDING_TTL_SECS, |secs| secs.min(u32::MAX.into()) as i64);
        chrono::Duration::seconds(secs)
    }

    pub fn cookie_name(&self) -> &str {
        self.session
            .cookie_name
            .as_deref()
            .unwrap_or(DEFAULT_SESSION_COOKIE)
    }

    pub fn secure_cookie(&self) -> bool {
        self.session.secure_cookie.unwrap_or(false)
    }
}

fn resolve_env_value(value: &str) -> ConfigResult<String> {
    match value
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
    {
        Some(name) => std::env::var(name).map_err(|_| ConfigError::UnresolvedEnv(name.to_string())),
        None => Ok(value.to_string()),
    }
}

fn into_config_error<T>(result: Result<T>) -> ConfigResult<T> {
    result.map_err(|err| match err {
        crate::Error::Config(err) => err,
        other => ConfigError::Parse(other.to_string()),
    })
}

impl fmt::Debug for ConsumerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerConfig")
            .field("key", &self.key)
            .field("secret", &"[redacted]")
            .field("callback", &self.callback)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML: &str = r#"
protectedPaths = ["/", "/admin"]

[consumer]
key = "K"
secret = "S"
callback = { host = "http://h", path = "/cb" }

[provider]
name = "Example"
image = "/example.png"
urls = { requestToken = "http://p/rt", accessToken = "http://p/at", authorize = "http://p/auth" }
"#;

    #[test]
    fn loads_toml() {
        let config = Config::from_toml_str(TOML).unwrap();
        assert_eq!(config.protected_paths, vec!["/", "/admin"]);
        assert_eq!(config.callback().unwrap().path(), "/cb");
        assert_eq!(config.provider_urls().unwrap().authorize.as_str(), "http://p/auth");
        assert_eq!(config.provider.image.as_deref(), Some("/example.png"));
        assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(config.revisit_policy().unwrap(), RevisitPolicy::Trust);
        assert_eq!(config.pending_ttl(), chrono::Duration::minutes(15));
        assert_eq!(config.cookie_name(), DEFAULT_SESSION_COOKIE);
        assert!(!config.secure_cookie());
    }

    #[test]
    fn loads_json_with_optional_keys() {
        let json = r#"{
            "protectedPaths": ["/private"],
            "consumer": {"key": "K", "secret": "S", "callback": {"host": "http://h", "path": "/cb"}},
            "provider": {
                "name": "Example",
                "urls": {"requestToken": "http://p/rt", "accessToken": "http://p/at", "authorize": "http://p/auth"},
                "forwardParam": "next",
                "timeoutSecs": 5,
                "verifyUrl": "http://p/verify"
            },
            "session": {"cookieName": "sid", "secureCookie": true, "pendingTtlSecs": 60}
        }"#;
        let config = Config::from_json_str(json).unwrap();
        assert_eq!(config.provider.forward_param.as_deref(), Some("next"));
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert!(matches!(
            config.revisit_policy().unwrap(),
            RevisitPolicy::Verify { url } if url.path() == "/verify"
        ));
        assert_eq!(config.cookie_name(), "sid");
        assert!(config.secure_cookie());
        assert_eq!(config.pending_ttl(), chrono::Duration::seconds(60));
    }

    #[test]
    fn name_and_image_are_optional() {
        let json = r#"{"protectedPaths":["/"],"consumer":{"key":"K","secret":"S","callback":{"host":"http://h","path":"/cb"}},"provider":{"urls":{"requestToken":"http://p/rt","accessToken":"http://p/at","authorize":"http://p/auth"}}}"#;
        let config = Config::from_json_str(json).unwrap();
        assert_eq!(config.provider.name, "");
        assert_eq!(config.provider.image, None);
        assert_eq!(config.provider_name(), "p");

        let named = Config::from_toml_str(TOML).unwrap();
        assert_eq!(named.provider_name(), "Example");
    }

    #[test]
    fn resolves_environment_references() {
        std::env::set_var("OAUTH1_GATEKEEPER_TEST_KEY", "from-env");
        let text = TOML
            .replace("key = \"K\"", "key = \"${OAUTH1_GATEKEEPER_TEST_KEY}\"");
        let config = Config::from_toml_str(&text).unwrap();
        assert_eq!(config.credentials().unwrap().key(), "from-env");

        let text = TOML.replace("secret = \"S\"", "secret = \"${OAUTH1_GATEKEEPER_TEST_UNSET}\"");
        assert_eq!(
            Config::from_toml_str(&text),
            Err(ConfigError::UnresolvedEnv("OAUTH1_GATEKEEPER_TEST_UNSET".into()))
        );
    }

    #[test]
    fn rejects_missing_fields() {
        let text = TOML.replace("key = \"K\"\n", "");
        assert!(matches!(
            Config::from_toml_str(&text),
            Err(ConfigError::Missing(_))
        ));

        let text = TOML.replace("authorize = \"http://p/auth\"", "authorize = \"\"");
        assert_eq!(
            Config::from_toml_str(&text),
            Err(ConfigError::Missing("authorize url"))
        );

        let text = TOML.replace("\"/admin\"", "\"admin\"");
        assert_eq!(
            Config::from_toml_str(&text),
            Err(ConfigError::InvalidPath("admin".into()))
        );

        assert!(matches!(
            Config::from_toml_str("protectedPaths = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn debug_hides_the_secret() {
        let config = Config::from_toml_str(TOML).unwrap();
        let printed = format!("{:?}", config);
        assert!(printed.contains("[redacted]"));
        assert!(!printed.contains("secret: \"S\""));
    }
}
