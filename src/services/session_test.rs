use super::*;

// =============================================================================
// bytes_to_hex
// =============================================================================

#[test]
fn bytes_to_hex_empty() {
    assert_eq!(bytes_to_hex(&[]), "");
}

#[test]
fn bytes_to_hex_leading_zero() {
    assert_eq!(bytes_to_hex(&[0x0a]), "0a");
}

#[test]
fn bytes_to_hex_multi_byte() {
    assert_eq!(bytes_to_hex(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
}

// =============================================================================
// tokens and tickets
// =============================================================================

#[test]
fn generate_token_is_64_hex_chars() {
    let token = generate_token();
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn generate_token_two_calls_differ() {
    assert_ne!(generate_token(), generate_token());
}

#[test]
fn generate_ws_ticket_is_32_hex_chars() {
    let ticket = generate_ws_ticket();
    assert_eq!(ticket.len(), 32);
    assert!(ticket.chars().all(|c| c.is_ascii_hexdigit()));
}

// =============================================================================
// normalize_email
// =============================================================================

#[test]
fn normalize_email_lowercases_and_trims() {
    assert_eq!(normalize_email("  Alice@Example.COM "), Some("alice@example.com".to_owned()));
}

#[test]
fn normalize_email_rejects_malformed() {
    assert_eq!(normalize_email(""), None);
    assert_eq!(normalize_email("alice"), None);
    assert_eq!(normalize_email("@x.com"), None);
    assert_eq!(normalize_email("alice@"), None);
    assert_eq!(normalize_email("a@b@c"), None);
    assert_eq!(normalize_email("a b@x.com"), None);
}

// =============================================================================
// SessionUser
// =============================================================================

#[test]
fn session_user_serializes_optional_fields_as_null() {
    let user = SessionUser { email: "a@x.com".into(), name: None, avatar_url: None };
    let json = serde_json::to_value(&user).unwrap();
    assert_eq!(json["email"], "a@x.com");
    assert!(json["name"].is_null());
    assert!(json["avatar_url"].is_null());
}
