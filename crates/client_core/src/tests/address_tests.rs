use super::*;

#[test]
fn round_trips_ascii_and_hangul_room_ids() {
    for raw in [
        "personal_alice_bob",
        "admin_42",
        "personal_김철수_도자기공방",
        "room with spaces/and?symbols",
        "personal_café_☕",
    ] {
        let room_id = RoomId::from(raw);
        let address = encode(&room_id);
        assert_eq!(decode(address.as_str()).expect("decode"), room_id, "{raw}");
    }
}

#[test]
fn encoded_address_is_a_single_path_segment() {
    // Bytes chosen so standard base64 would emit '+' and '/'.
    let address = encode(&RoomId::from("personal_>>>_???"));
    let text = address.as_str();
    assert!(!text.contains('/'));
    assert!(!text.contains('+'));
    assert!(!text.contains('='));
}

#[test]
fn decodes_padded_and_standard_alphabet_addresses() {
    let room_id = RoomId::from("personal_>>>_???");
    let padded_url_safe = URL_SAFE.encode(room_id.as_str());
    let standard = STANDARD.encode(room_id.as_str());
    assert_eq!(decode(&padded_url_safe).expect("url-safe padded"), room_id);
    assert_eq!(decode(&standard).expect("standard"), room_id);
}

#[test]
fn rejects_empty_and_garbage_addresses() {
    assert_eq!(decode("  "), Err(AddressError::Empty));
    assert!(matches!(decode("!!!"), Err(AddressError::NotBase64(_))));
    let not_utf8 = URL_SAFE_NO_PAD.encode([0xff_u8, 0xfe, 0xfd]);
    assert!(matches!(decode(&not_utf8), Err(AddressError::NotUtf8(_))));
}
