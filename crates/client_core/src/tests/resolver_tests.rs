use super::*;

fn room(room_id: &str) -> Room {
    Room::new(room_id)
}

#[test]
fn admin_rooms_always_resolve_to_administrator() {
    let mut admin = room("admin_42");
    admin.roster_names = Some(vec!["alice".into(), "bob".into()]);
    admin.store_name = Some("Craft Shop".into());
    assert_eq!(resolve(&admin, &Identity::new(1, "alice")), "관리자");
    assert_eq!(resolve(&admin, &Identity::new(2, "anyone")), "관리자");
}

#[test]
fn personal_room_owner_sees_partner_segment() {
    let personal = room("personal_alice_bob");
    assert_eq!(resolve(&personal, &Identity::new(1, "alice")), "bob");
}

#[test]
fn personal_room_partner_falls_through_to_fallback_rules() {
    let mut personal = room("personal_alice_bob");
    assert_eq!(resolve(&personal, &Identity::new(2, "bob")), "채팅방");

    personal.roster_names = Some(vec!["bob".into(), "alice".into()]);
    assert_eq!(resolve(&personal, &Identity::new(2, "bob")), "alice");
}

#[test]
fn personal_room_with_ambiguous_segments_uses_roster() {
    let mut personal = room("personal_kim_min_bob");
    personal.roster_names = Some(vec!["kim_min".into(), "bob".into()]);
    assert_eq!(resolve(&personal, &Identity::new(1, "kim_min")), "bob");
}

#[test]
fn roster_returns_first_name_other_than_identity() {
    let mut generic = room("room_xyz");
    generic.roster_names = Some(vec!["alice".into(), "bob".into()]);
    assert_eq!(resolve(&generic, &Identity::new(1, "alice")), "bob");
}

#[test]
fn roster_with_only_identity_is_unknown_user() {
    let mut generic = room("room_xyz");
    generic.roster_names = Some(vec!["alice".into()]);
    generic.store_name = Some("ignored".into());
    assert_eq!(resolve(&generic, &Identity::new(1, "alice")), "알 수 없는 사용자");
}

#[test]
fn store_name_then_room_label_then_placeholder() {
    let mut generic = room("room_xyz");
    generic.store_name = Some("Craft Shop".into());
    generic.room_label = Some("label".into());
    assert_eq!(resolve(&generic, &Identity::new(1, "alice")), "Craft Shop");

    generic.store_name = None;
    assert_eq!(resolve(&generic, &Identity::new(1, "alice")), "label");

    generic.room_label = None;
    assert_eq!(resolve(&generic, &Identity::new(1, "alice")), "채팅방");
}

#[test]
fn last_message_does_not_change_resolution() {
    let mut personal = room("personal_alice_bob");
    let identity = Identity::new(1, "alice");
    let before = resolve(&personal, &identity);
    personal.last_message = Some("new preview".into());
    assert_eq!(resolve(&personal, &identity), before);
}
