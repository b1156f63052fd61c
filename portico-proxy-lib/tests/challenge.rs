use portico_proxy_lib::acme::{ChallengeResponder, ACME_CHALLENGE_PREFIX};

#[test]
fn test_unknown_token_is_none() {
    let responder = ChallengeResponder::new();
    assert_eq!(responder.respond("/.well-known/acme-challenge/missing"), None);
}

#[test]
fn test_registered_token_returns_key_authorization() {
    let responder = ChallengeResponder::new();
    responder.insert("abc123", "abc123.thumbprint");
    assert_eq!(
        responder.respond(&format!("{ACME_CHALLENGE_PREFIX}abc123")),
        Some("abc123.thumbprint".to_string())
    );
    assert_eq!(responder.len(), 1);
}

#[test]
fn test_non_acme_paths_are_none() {
    let responder = ChallengeResponder::new();
    responder.insert("abc123", "abc123.thumbprint");
    assert_eq!(responder.respond("/"), None);
    assert_eq!(responder.respond("/abc123"), None);
    assert_eq!(responder.respond("/.well-known/acme-challenge"), None);
    assert_eq!(responder.respond("/.well-known/acme-challenge/"), None);
    assert_eq!(responder.respond("/prefix/.well-known/acme-challenge/abc123"), None);
}

#[test]
fn test_remove_token() {
    let responder = ChallengeResponder::new();
    responder.insert("abc123", "abc123.thumbprint");
    responder.remove("abc123");
    assert!(responder.is_empty());
    assert_eq!(responder.respond("/.well-known/acme-challenge/abc123"), None);
}
