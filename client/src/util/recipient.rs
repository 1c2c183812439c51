//! Recipient resolution for two-party conversations.

#[cfg(test)]
#[path = "recipient_test.rs"]
mod recipient_test;

/// The participant the signed-in user is talking to.
///
/// First participant whose handle differs (ASCII case-insensitive) from
/// `me`. Without a signed-in user, or when every participant is `me`, the
/// first participant stands in. `None` only for an empty participant list.
pub fn resolve_recipient(users: &[String], me: Option<&str>) -> Option<String> {
    let first = users.first()?;
    let Some(me) = me else {
        return Some(first.clone());
    };
    users
        .iter()
        .find(|u| !u.eq_ignore_ascii_case(me))
        .or(Some(first))
        .cloned()
}

/// Letter shown in place of a missing avatar image.
pub fn avatar_initial(handle: &str) -> String {
    handle
        .chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_else(|| "?".to_owned())
}
