use super::*;

fn pair() -> Vec<String> {
    vec!["a@x.com".to_owned(), "b@x.com".to_owned()]
}

#[test]
fn resolves_the_other_participant() {
    assert_eq!(resolve_recipient(&pair(), Some("a@x.com")).as_deref(), Some("b@x.com"));
    assert_eq!(resolve_recipient(&pair(), Some("b@x.com")).as_deref(), Some("a@x.com"));
}

#[test]
fn comparison_ignores_case() {
    assert_eq!(resolve_recipient(&pair(), Some("A@X.com")).as_deref(), Some("b@x.com"));
}

#[test]
fn anonymous_viewer_gets_first_participant() {
    assert_eq!(resolve_recipient(&pair(), None).as_deref(), Some("a@x.com"));
}

#[test]
fn self_only_conversation_falls_back_to_first() {
    let users = vec!["a@x.com".to_owned(), "a@x.com".to_owned()];
    assert_eq!(resolve_recipient(&users, Some("a@x.com")).as_deref(), Some("a@x.com"));
}

#[test]
fn empty_participants_resolve_to_none() {
    assert_eq!(resolve_recipient(&[], Some("a@x.com")), None);
}

#[test]
fn avatar_initial_uppercases_first_char() {
    assert_eq!(avatar_initial("bea@x.com"), "B");
    assert_eq!(avatar_initial(""), "?");
}
