use std::fmt;

/// Composite key identifying one token bucket
///
/// Two requests share a bucket if and only if both the tier and the client
/// identity are equal. The parts are kept apart rather than joined into one
/// string, so no tier or client name can make two distinct pairs collide.
///
/// # Example
///
/// ```
/// use tiergate::BucketKey;
///
/// let key = BucketKey::new("pro", "203.0.113.7");
/// assert_eq!(key.to_string(), "pro:203.0.113.7");
/// assert_ne!(BucketKey::new("a:b", "c"), BucketKey::new("a", "b:c"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketKey<'a> {
    /// Tier the request was classified into
    pub tier: &'a str,
    /// Client identity derived from the request's origin
    pub client: &'a str,
}

impl<'a> BucketKey<'a> {
    pub fn new(tier: &'a str, client: &'a str) -> Self {
        BucketKey { tier, client }
    }
}

impl fmt::Display for BucketKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tier, self.client)
    }
}
