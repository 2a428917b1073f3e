//! Secret detection and redaction for logs and error messages.
//!
//! Cache connection strings routinely embed credentials
//! (`redis://:password@host:6379/0`), so anything that renders a store
//! address goes through [`redact_url_credentials`] first.

/// Placeholder written in place of secret values.
pub const REDACTED: &str = "[REDACTED]";

/// Returns true when a field or variable name likely holds a secret.
///
/// ```
/// use docrag_shared::is_secret_key;
///
/// assert!(is_secret_key("REDIS_PASSWORD"));
/// assert!(is_secret_key("apiKey"));
/// assert!(!is_secret_key("CACHE_TTL"));
/// ```
pub fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_uppercase();
    ["KEY", "TOKEN", "SECRET", "PASSWORD", "CREDENTIAL", "AUTH"]
        .iter()
        .any(|marker| key.contains(marker))
}

/// Returns [`REDACTED`] for secret keys, otherwise the value unchanged.
pub fn redact_if_secret(key: &str, value: &str) -> String {
    if is_secret_key(key) {
        REDACTED.to_string()
    } else {
        value.to_string()
    }
}

/// Replace the password portion of a URL's userinfo with [`REDACTED`].
///
/// Usernames are kept so operators can still tell accounts apart. Inputs
/// without credentials come back unchanged.
///
/// ```
/// use docrag_shared::redact_url_credentials;
///
/// assert_eq!(
///     redact_url_credentials("redis://:hunter2@cache:6379/0"),
///     "redis://:[REDACTED]@cache:6379/0"
/// );
/// assert_eq!(
///     redact_url_credentials("redis://cache:6379/0"),
///     "redis://cache:6379/0"
/// );
/// ```
pub fn redact_url_credentials(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let authority_start = scheme_end + 3;
    let rest = url.get(authority_start..).unwrap_or_default();
    let authority_len = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = rest.get(..authority_len).unwrap_or_default();

    let Some(at) = authority.rfind('@') else {
        return url.to_string();
    };
    let userinfo = authority.get(..at).unwrap_or_default();
    let host_and_tail = rest.get(at..).unwrap_or_default();
    let scheme = url.get(..authority_start).unwrap_or_default();

    let redacted_userinfo = match userinfo.split_once(':') {
        Some((user, _password)) => format!("{user}:{REDACTED}"),
        None => REDACTED.to_string(),
    };
    format!("{scheme}{redacted_userinfo}{host_and_tail}")
}

/// A string that never prints its content.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SecretString(Box<str>);

impl SecretString {
    /// Wrap a secret value.
    pub fn new(value: impl Into<Box<str>>) -> Self {
        Self(value.into())
    }

    /// Borrow the underlying secret.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(REDACTED)
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(REDACTED)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value.into_boxed_str())
    }
}
