//! OAuth 1.0a request signing (HMAC-SHA1, RFC 5849)

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Method;
use sha1::Sha1;
use url::Url;

use super::types::Credentials;

type HmacSha1 = Hmac<Sha1>;

/// Everything except the RFC 3986 unreserved characters gets escaped
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";
pub const OAUTH_VERSION: &str = "1.0";

/// Percent-encode a value the way OAuth requires
pub fn encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE_SET).to_string()
}

/// Signs requests for one consumer, optionally on behalf of a token
pub struct OAuthSigner<'a> {
    consumer: &'a Credentials,
    token: Option<(&'a str, &'a str)>,
}

impl<'a> OAuthSigner<'a> {
    /// Signer for the request-token leg (no token yet)
    pub fn consumer_only(consumer: &'a Credentials) -> Self {
        Self {
            consumer,
            token: None,
        }
    }

    /// Signer carrying a token and its secret
    pub fn with_token(consumer: &'a Credentials, token: &'a str, token_secret: &'a str) -> Self {
        Self {
            consumer,
            token: Some((token, token_secret)),
        }
    }

    /// Build the `Authorization` header value for a request
    ///
    /// `form_params` are the `application/x-www-form-urlencoded` body pairs, if
    /// any; query pairs are read from `url`. `extra_oauth` carries leg-specific
    /// protocol parameters such as `oauth_callback` or `oauth_verifier`.
    pub fn authorization_header(
        &self,
        method: &Method,
        url: &Url,
        form_params: &[(String, String)],
        extra_oauth: &[(&str, &str)],
    ) -> String {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.authorization_header_with(method, url, form_params, extra_oauth, &nonce, &timestamp)
    }

    fn authorization_header_with(
        &self,
        method: &Method,
        url: &Url,
        form_params: &[(String, String)],
        extra_oauth: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> String {
        let mut oauth: Vec<(String, String)> = vec![
            ("oauth_consumer_key".into(), self.consumer.key.clone()),
            ("oauth_nonce".into(), nonce.to_string()),
            ("oauth_signature_method".into(), SIGNATURE_METHOD.into()),
            ("oauth_timestamp".into(), timestamp.to_string()),
            ("oauth_version".into(), OAUTH_VERSION.into()),
        ];
        if let Some((token, _)) = self.token {
            oauth.push(("oauth_token".into(), token.to_string()));
        }
        oauth.extend(
            extra_oauth
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        );

        let mut all: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        all.extend(form_params.iter().cloned());
        all.extend(oauth.iter().cloned());

        let base = signature_base_string(method, url, &all);
        let token_secret = self.token.map(|(_, secret)| secret).unwrap_or("");
        oauth.push((
            "oauth_signature".into(),
            sign(&base, &self.consumer.secret, token_secret),
        ));
        oauth.sort();

        let fields: Vec<String> = oauth
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect();
        format!("OAuth {}", fields.join(", "))
    }
}

/// `METHOD&enc(base url)&enc(normalized params)`
pub fn signature_base_string(method: &Method, url: &Url, params: &[(String, String)]) -> String {
    format!(
        "{}&{}&{}",
        method.as_str().to_uppercase(),
        encode(&base_url(url)),
        encode(&normalize_params(params))
    )
}

/// Scheme and host lower-cased, default port dropped, query and fragment removed
fn base_url(url: &Url) -> String {
    let scheme = url.scheme().to_lowercase();
    let host = url.host_str().unwrap_or_default().to_lowercase();
    match url.port() {
        Some(port) if Some(port) != default_port(&scheme) => {
            format!("{}://{}:{}{}", scheme, host, port, url.path())
        }
        _ => format!("{}://{}{}", scheme, host, url.path()),
    }
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

/// Encode every pair, sort by name then value, join with `&`
fn normalize_params(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .filter(|(k, _)| k != "oauth_signature")
        .map(|(k, v)| (encode(k), encode(v)))
        .collect();
    encoded.sort();

    encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// HMAC-SHA1 over the base string, base64 encoded
pub fn sign(base_string: &str, consumer_secret: &str, token_secret: &str) -> String {
    let key = format!("{}&{}", encode(consumer_secret), encode(token_secret));
    let mut mac = HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any size");
    mac.update(base_string.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // Worked example published in Twitter's "Creating a signature" guide
    const CONSUMER_KEY: &str = "xvz1evFS4wEEPTGEFPHBog";
    const CONSUMER_SECRET: &str = "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw";
    const TOKEN: &str = "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb";
    const TOKEN_SECRET: &str = "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE";
    const NONCE: &str = "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg";
    const TIMESTAMP: &str = "1318622958";

    fn twitter_request() -> (Url, Vec<(String, String)>) {
        let url =
            Url::parse("https://api.twitter.com/1.1/statuses/update.json?include_entities=true")
                .unwrap();
        let form = vec![(
            "status".to_string(),
            "Hello Ladies + Gentlemen, a signed OAuth request!".to_string(),
        )];
        (url, form)
    }

    #[test]
    fn test_encode_unreserved_and_reserved() {
        assert_eq!(encode("Ladies + Gentlemen"), "Ladies%20%2B%20Gentlemen");
        assert_eq!(encode("An encoded string!"), "An%20encoded%20string%21");
        assert_eq!(encode("Dogs, Cats & Mice"), "Dogs%2C%20Cats%20%26%20Mice");
        assert_eq!(encode("-._~"), "-._~");
        assert_eq!(encode("☃"), "%E2%98%83");
    }

    #[test]
    fn test_base_url_normalization() {
        let url = Url::parse("HTTP://API.Cohuman.com:80/tasks?limit=0#frag").unwrap();
        assert_eq!(base_url(&url), "http://api.cohuman.com/tasks");

        let url = Url::parse("http://localhost:4567/api/token/request").unwrap();
        assert_eq!(base_url(&url), "http://localhost:4567/api/token/request");
    }

    #[test]
    fn test_params_sorted_by_key_then_value() {
        let params = vec![
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "z".to_string()),
            ("a".to_string(), "y".to_string()),
            ("oauth_signature".to_string(), "ignored".to_string()),
        ];
        assert_eq!(normalize_params(&params), "a=y&a=z&b=2");
    }

    #[test]
    fn test_twitter_signature_vector() {
        let (url, form) = twitter_request();
        let mut params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        params.extend(form);
        for (k, v) in [
            ("oauth_consumer_key", CONSUMER_KEY),
            ("oauth_nonce", NONCE),
            ("oauth_signature_method", SIGNATURE_METHOD),
            ("oauth_timestamp", TIMESTAMP),
            ("oauth_token", TOKEN),
            ("oauth_version", OAUTH_VERSION),
        ] {
            params.push((k.to_string(), v.to_string()));
        }

        let base = signature_base_string(&Method::POST, &url, &params);
        assert!(base.starts_with(
            "POST&https%3A%2F%2Fapi.twitter.com%2F1.1%2Fstatuses%2Fupdate.json&include_entities%3Dtrue%26oauth_consumer_key%3Dxvz1evFS4wEEPTGEFPHBog"
        ));
        assert!(base.ends_with(
            "status%3DHello%2520Ladies%2520%252B%2520Gentlemen%252C%2520a%2520signed%2520OAuth%2520request%2521"
        ));

        assert_eq!(
            sign(&base, CONSUMER_SECRET, TOKEN_SECRET),
            "hCtSmYh+iHYCEqBWrE7C7hYmtUk="
        );
    }

    #[test]
    fn test_authorization_header_with_token() {
        let consumer = Credentials::new(CONSUMER_KEY, CONSUMER_SECRET);
        let signer = OAuthSigner::with_token(&consumer, TOKEN, TOKEN_SECRET);
        let (url, form) = twitter_request();

        let header =
            signer.authorization_header_with(&Method::POST, &url, &form, &[], NONCE, TIMESTAMP);

        assert!(header.starts_with("OAuth oauth_consumer_key=\"xvz1evFS4wEEPTGEFPHBog\""));
        assert!(header.contains("oauth_signature=\"hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D\""));
        assert!(header.contains("oauth_token=\"370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb\""));
        assert!(header.contains("oauth_version=\"1.0\""));
    }

    #[test]
    fn test_request_token_header_has_callback_and_no_token() {
        let consumer = Credentials::new("key", "secret");
        let signer = OAuthSigner::consumer_only(&consumer);
        let url = Url::parse("http://api.cohuman.com/api/token/request").unwrap();

        let header = signer.authorization_header(
            &Method::POST,
            &url,
            &[],
            &[("oauth_callback", "http://localhost:4567/authorized")],
        );

        assert!(header.contains("oauth_callback=\"http%3A%2F%2Flocalhost%3A4567%2Fauthorized\""));
        assert!(!header.contains("oauth_token="));
        assert!(header.contains("oauth_signature_method=\"HMAC-SHA1\""));
    }

    #[test]
    fn test_nonce_changes_between_requests() {
        let consumer = Credentials::new("key", "secret");
        let signer = OAuthSigner::consumer_only(&consumer);
        let url = Url::parse("http://api.cohuman.com/tasks").unwrap();

        let first = signer.authorization_header(&Method::GET, &url, &[], &[]);
        let second = signer.authorization_header(&Method::GET, &url, &[], &[]);
        assert_ne!(first, second);
    }

    proptest! {
        #[test]
        fn prop_encoded_output_is_header_safe(value in ".*") {
            let encoded = encode(&value);
            prop_assert!(encoded
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "-._~%".contains(c)));
        }

        #[test]
        fn prop_unreserved_strings_pass_through(value in "[A-Za-z0-9._~-]*") {
            prop_assert_eq!(encode(&value), value);
        }
    }
}
