//! Request classification
//!
//! Turns request metadata into a [`BucketKey`]: the tier the request belongs
//! to and the client identity it is counted against. Two policies are
//! supported, see [`Policy`].

use super::BucketKey;
use base64::{Engine as _, engine::general_purpose::STANDARD};

#[cfg(test)]
mod tests;

/// Credential header inspected by [`CredentialGate`]
pub const AUTHORIZATION: &str = "Authorization";
/// Proxy-supplied chain of client addresses, first entry is the origin
pub const X_FORWARDED_FOR: &str = "X-Forwarded-For";
/// Proxy-supplied client address
pub const X_REAL_IP: &str = "X-Real-Ip";
/// Header read by [`HeaderTier`] unless configured otherwise
pub const DEFAULT_TIER_HEADER: &str = "X-User-Category";
/// Tier used when the tier header is missing or blank
pub const DEFAULT_TIER: &str = "free";

const BASIC_PREFIX: &str = "Basic ";

/// Read access to request headers
///
/// Lookups are case-insensitive and return the first value of the header.
///
/// # Example
///
/// ```
/// use tiergate::HeaderSource;
///
/// let headers = vec![("x-real-ip".to_string(), "192.0.2.1".to_string())];
/// assert_eq!(headers.header("X-Real-Ip"), Some("192.0.2.1"));
/// ```
pub trait HeaderSource {
    /// First value of the named header
    fn header(&self, name: &str) -> Option<&str>;
}

impl<K: AsRef<str>, V: AsRef<str>> HeaderSource for [(K, V)] {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(key, _)| key.as_ref().eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_ref())
    }
}

impl<K: AsRef<str>, V: AsRef<str>> HeaderSource for Vec<(K, V)> {
    fn header(&self, name: &str) -> Option<&str> {
        self.as_slice().header(name)
    }
}

impl<K: AsRef<str>, V: AsRef<str>, const N: usize> HeaderSource for [(K, V); N] {
    fn header(&self, name: &str) -> Option<&str> {
        self.as_slice().header(name)
    }
}

#[cfg(feature = "http")]
impl HeaderSource for http::HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        // obs-text is kept as long as it is UTF-8; other bytes count as absent
        self.get(name)
            .and_then(|value| std::str::from_utf8(value.as_bytes()).ok())
    }
}

/// Derive the client identity from origin headers
///
/// Priority order:
/// 1. `X-Forwarded-For`: the first comma-separated entry, trimmed
/// 2. `X-Real-Ip`: verbatim
/// 3. `remote_addr` with a trailing `:port` removed (everything from the last colon)
///
/// The headers are trusted as given; stripping spoofed values is the job of
/// the proxy in front.
///
/// # Example
///
/// ```
/// use tiergate::client_identity;
///
/// let headers = [("X-Forwarded-For", " 203.0.113.9 , 10.0.0.2"), ("X-Real-Ip", "10.0.0.3")];
/// assert_eq!(client_identity(&headers[..], "10.0.0.1:4431"), "203.0.113.9");
///
/// let none: [(&str, &str); 0] = [];
/// assert_eq!(client_identity(&none[..], "10.0.0.1:4431"), "10.0.0.1");
/// ```
pub fn client_identity<'a, H: HeaderSource + ?Sized>(
    headers: &'a H,
    remote_addr: &'a str,
) -> &'a str {
    if let Some(chain) = headers.header(X_FORWARDED_FOR).filter(|v| !v.is_empty()) {
        return chain
            .split_once(',')
            .map_or(chain, |(first, _)| first)
            .trim();
    }

    if let Some(real_ip) = headers.header(X_REAL_IP).filter(|v| !v.is_empty()) {
        return real_ip;
    }

    remote_addr
        .rsplit_once(':')
        .map_or(remote_addr, |(host, _)| host)
}

/// Meters requests carrying one known basic-auth credential
///
/// A request whose `Authorization` header is `Basic <base64 of user:pass>`
/// with the expected pair is placed in the gate's tier; anything else is left
/// unmetered. This is a cheap marker for a shared free-tier credential, not
/// authentication.
///
/// # Example
///
/// ```
/// use tiergate::CredentialGate;
///
/// let gate = CredentialGate::default(); // free:free
/// assert!(gate.matches(&[("Authorization", "Basic ZnJlZTpmcmVl")][..]));
/// assert!(!gate.matches(&[("Authorization", "Bearer abc")][..]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialGate {
    expected: String,
    tier: String,
}

impl CredentialGate {
    pub fn new(username: &str, password: &str) -> Self {
        CredentialGate {
            expected: format!("{username}:{password}"),
            tier: DEFAULT_TIER.to_string(),
        }
    }

    /// Place matching requests in `tier` instead of `free`
    pub fn with_tier(mut self, tier: impl Into<String>) -> Self {
        self.tier = tier.into();
        self
    }

    pub fn tier(&self) -> &str {
        &self.tier
    }

    /// Whether the request carries the expected credential
    pub fn matches<H: HeaderSource + ?Sized>(&self, headers: &H) -> bool {
        let Some(encoded) = headers
            .header(AUTHORIZATION)
            .and_then(|auth| auth.strip_prefix(BASIC_PREFIX))
        else {
            return false;
        };

        STANDARD
            .decode(encoded)
            .is_ok_and(|decoded| decoded == self.expected.as_bytes())
    }
}

impl Default for CredentialGate {
    fn default() -> Self {
        CredentialGate::new("free", "free")
    }
}

/// Selects the tier from a request header
///
/// The header value is trimmed; a missing or blank header selects the
/// default tier. Whether the name is a configured tier is decided later
/// against the tier table.
///
/// # Example
///
/// ```
/// use tiergate::HeaderTier;
///
/// let selector = HeaderTier::default();
/// assert_eq!(selector.tier_name(&[("X-User-Category", " pro ")][..]), "pro");
/// assert_eq!(selector.tier_name(&[("X-User-Category", "  ")][..]), "free");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderTier {
    header: String,
    default_tier: String,
}

impl HeaderTier {
    pub fn new(header: impl Into<String>, default_tier: impl Into<String>) -> Self {
        HeaderTier {
            header: header.into(),
            default_tier: default_tier.into(),
        }
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn default_tier(&self) -> &str {
        &self.default_tier
    }

    /// Tier named by the request, or the default tier
    pub fn tier_name<'a, H: HeaderSource + ?Sized>(&'a self, headers: &'a H) -> &'a str {
        headers
            .header(&self.header)
            .map(str::trim)
            .filter(|tier| !tier.is_empty())
            .unwrap_or(self.default_tier.as_str())
    }
}

impl Default for HeaderTier {
    fn default() -> Self {
        HeaderTier::new(DEFAULT_TIER_HEADER, DEFAULT_TIER)
    }
}

/// How requests are sorted into tiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Policy {
    /// Binary free/unmetered split on a known basic-auth credential
    CredentialGate(CredentialGate),
    /// Tier named by a request header
    HeaderTier(HeaderTier),
}

impl Policy {
    /// Classify a request
    ///
    /// Returns `None` when the request is unmetered and must bypass the
    /// limiter altogether.
    pub fn classify<'a, H: HeaderSource + ?Sized>(
        &'a self,
        headers: &'a H,
        remote_addr: &'a str,
    ) -> Option<BucketKey<'a>> {
        let tier = match self {
            Policy::CredentialGate(gate) => {
                if !gate.matches(headers) {
                    return None;
                }
                gate.tier()
            }
            Policy::HeaderTier(selector) => selector.tier_name(headers),
        };

        Some(BucketKey::new(tier, client_identity(headers, remote_addr)))
    }

    /// Body of the 429 response for this policy
    pub fn rejection_message(&self) -> &'static str {
        match self {
            Policy::CredentialGate(_) => "Rate limit exceeded for free tier",
            Policy::HeaderTier(_) => "Rate limit exceeded",
        }
    }

    /// Short policy name for logs and configuration
    pub fn name(&self) -> &'static str {
        match self {
            Policy::CredentialGate(_) => "credential",
            Policy::HeaderTier(_) => "header",
        }
    }
}

impl From<CredentialGate> for Policy {
    fn from(gate: CredentialGate) -> Self {
        Policy::CredentialGate(gate)
    }
}

impl From<HeaderTier> for Policy {
    fn from(selector: HeaderTier) -> Self {
        Policy::HeaderTier(selector)
    }
}
