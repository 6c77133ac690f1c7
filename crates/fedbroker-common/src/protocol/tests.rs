use bytes::Bytes;

use super::*;

#[test]
fn test_ready_envelope_is_recognized() {
    assert!(is_ready(&ready_envelope()));
}

#[test]
fn test_payload_starting_with_sentinel_is_not_ready() {
    let env = Envelope::from_body(Bytes::from_static(&[READY_SENTINEL, b'x']));
    assert!(!is_ready(&env));
}

#[test]
fn test_multi_frame_message_is_not_ready() {
    let env = ready_envelope().push_address("worker-1");
    assert!(!is_ready(&env));
}

#[test]
fn test_state_message_encode_decode() {
    let original = StateMessage::new("broker-a", 7);
    let decoded = StateMessage::decode(&original.encode()).unwrap();
    assert_eq!(original, decoded);
}

#[test]
fn test_state_message_wire_format() {
    let env = StateMessage::new("broker-a", 12).encode();
    assert_eq!(env.frame_count(), 2);
    assert_eq!(env.frames()[0].as_ref(), b"broker-a");
    assert_eq!(env.frames()[1].as_ref(), b"12");
}

#[test]
fn test_state_message_zero_capacity() {
    let decoded = StateMessage::decode(&StateMessage::new("b", 0).encode()).unwrap();
    assert_eq!(decoded.capacity, 0);
}

#[test]
fn test_state_message_rejects_wrong_frame_count() {
    let env = Envelope::from_body("broker-a");
    assert!(StateMessage::decode(&env).is_err());
}

#[test]
fn test_state_message_rejects_non_numeric_capacity() {
    let env = Envelope::from_frames(vec![
        Bytes::from_static(b"broker-a"),
        Bytes::from_static(b"many"),
    ]);
    assert!(StateMessage::decode(&env).is_err());
}

#[test]
fn test_state_message_rejects_negative_capacity() {
    let env = Envelope::from_frames(vec![
        Bytes::from_static(b"broker-a"),
        Bytes::from_static(b"-3"),
    ]);
    assert!(StateMessage::decode(&env).is_err());
}
