use super::*;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

const FREE_AUTH: &str = "Basic ZnJlZTpmcmVl"; // free:free

fn basic(credential: &str) -> String {
    format!("Basic {}", STANDARD.encode(credential))
}

#[test]
fn test_forwarded_for_wins_over_real_ip() {
    let headers = [
        ("X-Forwarded-For", "1.1.1.1, 2.2.2.2, 3.3.3.3"),
        ("X-Real-Ip", "4.4.4.4"),
    ];
    assert_eq!(client_identity(&headers[..], "5.5.5.5:80"), "1.1.1.1");
}

#[test]
fn test_forwarded_for_single_entry_is_trimmed() {
    let headers = [("x-forwarded-for", "  1.2.3.4  ")];
    assert_eq!(client_identity(&headers[..], "5.5.5.5:80"), "1.2.3.4");
}

#[test]
fn test_real_ip_used_verbatim() {
    let headers = [("X-Real-Ip", " 4.4.4.4 ")];
    assert_eq!(client_identity(&headers[..], "5.5.5.5:80"), " 4.4.4.4 ");
}

#[test]
fn test_empty_headers_fall_through() {
    let headers = [("X-Forwarded-For", ""), ("X-Real-Ip", "")];
    assert_eq!(client_identity(&headers[..], "5.5.5.5:8080"), "5.5.5.5");
}

#[test]
fn test_remote_addr_port_stripping() {
    let none: Vec<(String, String)> = Vec::new();
    assert_eq!(client_identity(&none, "192.0.2.10:443"), "192.0.2.10");
    assert_eq!(client_identity(&none, "[2001:db8::1]:443"), "[2001:db8::1]");
    assert_eq!(client_identity(&none, "192.0.2.10"), "192.0.2.10");
    assert_eq!(client_identity(&none, ""), "");
}

#[test]
fn test_credential_gate_matches_expected_pair_only() {
    let gate = CredentialGate::default();

    assert!(gate.matches(&[("Authorization", FREE_AUTH)][..]));
    assert!(gate.matches(&[("authorization", basic("free:free"))][..]));

    assert!(!gate.matches(&[("Authorization", basic("free:paid"))][..]));
    assert!(!gate.matches(&[("Authorization", basic("free"))][..]));
    assert!(!gate.matches(&[("Authorization", "basic ZnJlZTpmcmVl")][..]));
    assert!(!gate.matches(&[("Authorization", "Basic !!not-base64!!")][..]));
    assert!(!gate.matches(&[("Authorization", "Basic ZnJlZTpmcmVl=")][..]));
    assert!(!gate.matches(&[("Authorization", "")][..]));

    let none: [(&str, &str); 0] = [];
    assert!(!gate.matches(&none[..]));
}

#[test]
fn test_credential_gate_custom_credential_and_tier() {
    let gate = CredentialGate::new("trial", "s3cret").with_tier("trial");
    let policy = Policy::from(gate);

    let headers = vec![
        ("Authorization".to_string(), basic("trial:s3cret")),
        ("X-Real-Ip".to_string(), "9.9.9.9".to_string()),
    ];
    assert_eq!(
        policy.classify(&headers, "1.1.1.1:1"),
        Some(BucketKey::new("trial", "9.9.9.9"))
    );

    let free = vec![("Authorization".to_string(), FREE_AUTH.to_string())];
    assert_eq!(policy.classify(&free, "1.1.1.1:1"), None);
}

#[test]
fn test_credential_policy_leaves_others_unmetered() {
    let policy = Policy::CredentialGate(CredentialGate::default());

    let free = [("Authorization", FREE_AUTH), ("X-Forwarded-For", "1.2.3.4")];
    assert_eq!(
        policy.classify(&free[..], "10.0.0.1:5000"),
        Some(BucketKey::new("free", "1.2.3.4"))
    );

    let anonymous = [("X-Forwarded-For", "1.2.3.4")];
    assert_eq!(policy.classify(&anonymous[..], "10.0.0.1:5000"), None);
}

#[test]
fn test_header_tier_selection() {
    let policy = Policy::HeaderTier(HeaderTier::default());

    let pro = [("X-User-Category", "pro")];
    assert_eq!(
        policy.classify(&pro[..], "10.0.0.1:5000"),
        Some(BucketKey::new("pro", "10.0.0.1"))
    );

    let padded = [("x-user-category", "\t enterprise \n")];
    assert_eq!(
        policy.classify(&padded[..], "10.0.0.1:5000"),
        Some(BucketKey::new("enterprise", "10.0.0.1"))
    );

    let blank = [("X-User-Category", "   ")];
    assert_eq!(
        policy.classify(&blank[..], "10.0.0.1:5000"),
        Some(BucketKey::new("free", "10.0.0.1"))
    );

    let missing: [(&str, &str); 0] = [];
    assert_eq!(
        policy.classify(&missing[..], "10.0.0.1:5000"),
        Some(BucketKey::new("free", "10.0.0.1"))
    );
}

#[test]
fn test_header_tier_custom_header_and_default() {
    let selector = HeaderTier::new("X-Plan", "basic");
    assert_eq!(selector.header(), "X-Plan");
    assert_eq!(selector.default_tier(), "basic");

    let headers = [("X-User-Category", "pro")];
    assert_eq!(selector.tier_name(&headers[..]), "basic");

    let headers = [("x-plan", "gold")];
    assert_eq!(selector.tier_name(&headers[..]), "gold");
}

#[test]
fn test_classification_is_deterministic() {
    let policy = Policy::HeaderTier(HeaderTier::default());
    let headers = [
        ("X-User-Category", "pro"),
        ("X-Forwarded-For", "7.7.7.7, 8.8.8.8"),
    ];

    let first = policy.classify(&headers[..], "10.0.0.1:1");
    for _ in 0..10 {
        assert_eq!(policy.classify(&headers[..], "10.0.0.1:1"), first);
    }
}

#[test]
fn test_rejection_messages() {
    assert_eq!(
        Policy::CredentialGate(CredentialGate::default()).rejection_message(),
        "Rate limit exceeded for free tier"
    );
    assert_eq!(
        Policy::HeaderTier(HeaderTier::default()).rejection_message(),
        "Rate limit exceeded"
    );
}

#[test]
fn test_first_header_value_wins() {
    let headers = [("X-Real-Ip", "1.1.1.1"), ("X-Real-Ip", "2.2.2.2")];
    assert_eq!(headers.header("x-real-ip"), Some("1.1.1.1"));
}
