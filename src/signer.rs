use std::borrow::Cow;

use http::Method;
use oauth1_request::signature_method::SignatureMethod;
use oauth1_request::signer::Signer as OAuthSigner;
use oauth1_request::{HmacSha1, Options};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::{SecretsProvider, OAUTH_KEY_PREFIX, REALM_KEY};

/// Produces `Authorization: OAuth ...` header values with `oauth1-request`.
#[derive(Debug, Clone)]
pub struct Signer<'a, TSecretsProvider, TSignatureMethod>
where
    TSecretsProvider: SecretsProvider,
    TSignatureMethod: SignatureMethod + Clone,
{
    secrets: &'a TSecretsProvider,
    parameters: OAuthParameters<'a, TSignatureMethod>,
}

impl<'a, TSecretsProvider, TSignatureMethod> Signer<'a, TSecretsProvider, TSignatureMethod>
where
    TSecretsProvider: SecretsProvider,
    TSignatureMethod: SignatureMethod + Clone,
{
    pub fn new(
        secrets: &'a TSecretsProvider,
        parameters: OAuthParameters<'a, TSignatureMethod>,
    ) -> Self {
        Signer {
            secrets,
            parameters,
        }
    }

    /// Builds the header value for a request to `url`.
    ///
    /// The query of `url` and, when given, the pairs of an
    /// `application/x-www-form-urlencoded` body are part of the signature base string.
    pub fn authorization(self, method: &Method, url: &Url, form_body: Option<&str>) -> String {
        let query = url.query().filter(|q| !q.is_empty());
        let body = form_body.filter(|b| !b.is_empty());
        let payload = match (query, body) {
            (Some(q), Some(b)) => Cow::Owned(format!("{}&{}", q, b)),
            (Some(q), None) => Cow::Borrowed(q),
            (None, Some(b)) => Cow::Borrowed(b),
            (None, None) => Cow::Borrowed(""),
        };

        let mut endpoint = url.clone();
        endpoint.set_query(None);
        endpoint.set_fragment(None);

        self.generate_signature(method.clone(), endpoint, &payload, query.is_some())
    }

    /// `url` must not carry a query; its parameters belong in `payload`.
    pub fn generate_signature(
        self,
        method: Method,
        url: Url,
        payload: &str,
        is_url_query: bool,
    ) -> String {
        let (consumer_key, consumer_secret) = self.secrets.get_consumer_key_pair();
        let (token, token_secret) = self.secrets.get_token_option_pair();
        let options = self.parameters.build_options(token);

        // oauth_* pairs are produced by oauth1-request itself
        let mut pairs: Vec<(String, String)> = url::form_urlencoded::parse(payload.as_bytes())
            .filter(|(k, _)| !k.starts_with(OAUTH_KEY_PREFIX))
            .map(|(k, v)| (encode(&k), encode(&v)))
            .collect();
        // RFC 5849 3.4.1.3.2 orders on the encoded form, oauth_* go in between
        pairs.sort();
        let split = pairs.partition_point(|(k, _)| k.as_str() < OAUTH_KEY_PREFIX);
        let (before_oauth, after_oauth) = pairs.split_at(split);

        let sig_method = self.parameters.signature_method.clone();
        let mut signer = if is_url_query {
            OAuthSigner::with_signature_method(
                sig_method,
                method.as_str(),
                url,
                consumer_secret,
                token_secret,
            )
        } else {
            OAuthSigner::form_with_signature_method(
                sig_method,
                method.as_str(),
                url,
                consumer_secret,
                token_secret,
            )
        };

        // the key reaches the base string verbatim, so it is encoded a second time here
        for (key, value) in before_oauth {
            signer.parameter_encoded(&encode(key), value);
        }
        let mut signer = signer.oauth_parameters(consumer_key, &options);
        for (key, value) in after_oauth {
            signer.parameter_encoded(&encode(key), value);
        }

        let sign = signer.finish().authorization;

        match self.parameters.realm {
            Some(realm) => format!("{},{}=\"{}\"", sign, REALM_KEY, realm.as_ref()),
            None => sign,
        }
    }
}

/// Everything but RFC 3986 unreserved characters.
const RESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn encode(text: &str) -> String {
    utf8_percent_encode(text, RESERVED).to_string()
}

/// Optional `oauth_*` values that go into a signature.
#[derive(Debug, Clone)]
pub struct OAuthParameters<'a, TSignatureMethod>
where
    TSignatureMethod: SignatureMethod + Clone,
{
    callback: Option<Cow<'a, str>>,
    nonce: Option<Cow<'a, str>>,
    realm: Option<Cow<'a, str>>,
    signature_method: TSignatureMethod,
    timestamp: Option<u64>,
    verifier: Option<Cow<'a, str>>,
    version: bool,
}

impl Default for OAuthParameters<'static, HmacSha1> {
    fn default() -> Self {
        OAuthParameters {
            callback: None,
            nonce: None,
            realm: None,
            signature_method: HmacSha1,
            timestamp: None,
            verifier: None,
            version: false,
        }
    }
}

impl<'a> OAuthParameters<'a, HmacSha1> {
    pub fn new() -> Self {
        Default::default()
    }
}

impl<'a, T> OAuthParameters<'a, T>
where
    T: SignatureMethod + Clone,
{
    /// `oauth_callback`, only sent with the request-token call.
    pub fn callback<C>(self, callback: C) -> Self
    where
        C: Into<Cow<'a, str>>,
    {
        OAuthParameters {
            callback: Some(callback.into()),
            ..self
        }
    }

    /// Fixed `oauth_nonce`. Random when unset.
    pub fn nonce<N>(self, nonce: N) -> Self
    where
        N: Into<Cow<'a, str>>,
    {
        OAuthParameters {
            nonce: Some(nonce.into()),
            ..self
        }
    }

    /// Appended to the header, never signed.
    pub fn realm<R>(self, realm: R) -> Self
    where
        R: Into<Cow<'a, str>>,
    {
        OAuthParameters {
            realm: Some(realm.into()),
            ..self
        }
    }

    pub fn timestamp<U>(self, timestamp: U) -> Self
    where
        U: Into<u64>,
    {
        OAuthParameters {
            timestamp: Some(timestamp.into()),
            ..self
        }
    }

    /// `oauth_verifier` from the provider's callback.
    pub fn verifier<V>(self, verifier: V) -> Self
    where
        V: Into<Cow<'a, str>>,
    {
        OAuthParameters {
            verifier: Some(verifier.into()),
            ..self
        }
    }

    /// When `true`, `oauth_version="1.0"` is included in the signature.
    pub fn version(self, version: bool) -> Self {
        OAuthParameters { version, ..self }
    }

    pub fn signature_method<TSignatureMethod>(
        self,
        signature_method: TSignatureMethod,
    ) -> OAuthParameters<'a, TSignatureMethod>
    where
        TSignatureMethod: SignatureMethod + Clone,
    {
        OAuthParameters {
            signature_method,
            callback: self.callback,
            nonce: self.nonce,
            realm: self.realm,
            timestamp: self.timestamp,
            verifier: self.verifier,
            version: self.version,
        }
    }

    fn build_options<'b>(&'b self, token: Option<&'b str>) -> Options<'b> {
        let mut opt = Options::new();

        if let Some(ref callback) = self.callback {
            opt.callback(callback.as_ref());
        }
        if let Some(ref nonce) = self.nonce {
            opt.nonce(nonce.as_ref());
        }
        if let Some(timestamp) = self.timestamp {
            opt.timestamp(timestamp);
        }
        if let Some(token) = token {
            opt.token(token);
        }
        if let Some(ref verifier) = self.verifier {
            opt.verifier(verifier.as_ref());
        }
        opt.version(self.version);

        opt
    }
}
