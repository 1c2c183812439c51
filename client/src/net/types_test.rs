use super::*;

#[test]
fn message_record_reads_float_timestamp_from_the_wire() {
    let record: MessageRecord = serde_json::from_value(serde_json::json!({
        "id": "m1",
        "sender": "a@x.com",
        "body": "hi",
        "avatar_url": null,
        "timestamp": 1_700_000_000_000.0
    }))
    .unwrap();
    assert_eq!(record.timestamp, Some(1_700_000_000_000));
}

#[test]
fn message_record_without_timestamp_is_pending() {
    let record: MessageRecord = serde_json::from_value(serde_json::json!({
        "id": "m1",
        "sender": "a@x.com",
        "body": "hi"
    }))
    .unwrap();
    assert_eq!(record.timestamp, None);
    assert_eq!(record.avatar_url, None);
}

#[test]
fn message_record_rejects_fractional_timestamp() {
    let result = serde_json::from_value::<MessageRecord>(serde_json::json!({
        "id": "m1",
        "sender": "a@x.com",
        "body": "hi",
        "timestamp": 1.5
    }));
    assert!(result.is_err());
}

#[test]
fn profile_with_null_last_seen() {
    let profile: UserProfile = serde_json::from_value(serde_json::json!({
        "email": "b@x.com",
        "name": "Bea",
        "last_seen": null
    }))
    .unwrap();
    assert_eq!(profile.name.as_deref(), Some("Bea"));
    assert_eq!(profile.last_seen, None);
}

#[test]
fn chat_meta_for_missing_conversation() {
    let meta: ChatMeta = serde_json::from_str(r#"{"id":"c1","users":[],"created_at":null}"#).unwrap();
    assert!(meta.users.is_empty());
    assert_eq!(meta.created_at, None);
}

#[test]
fn page_data_defaults_to_anonymous_without_conversation() {
    let data: PageData = serde_json::from_str(r#"{"viewer":null,"conversation":null}"#).unwrap();
    assert_eq!(data, PageData::default());
}
