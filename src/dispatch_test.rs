use super::*;
use serde_json::json;

fn text(frame: &str) -> WireFrame {
    WireFrame::Text(frame.to_owned())
}

fn one(frame: &str) -> Inbound {
    let mut inbound = decode_inbound(&text(frame)).expect("decode");
    assert_eq!(inbound.len(), 1);
    inbound.remove(0)
}

#[test]
fn handshake_channel_wins_over_everything() {
    let inbound = one(r#"[{"channel":"/meta/handshake","successful":true,"clientId":"c1","groupId":"g1","error":"ClientID_Expired"}]"#);
    assert_eq!(
        inbound,
        Inbound::HandshakeResponse {
            successful: true,
            client_id: Some("c1".to_owned()),
            error: Some("ClientID_Expired".to_owned()),
        }
    );
}

#[test]
fn subscribe_channel_carries_subscription() {
    let inbound = one(r#"[{"channel":"/meta/subscribe","successful":false,"subscription":"/group/g1","error":"403::denied"}]"#);
    assert_eq!(
        inbound,
        Inbound::SubscribeResponse {
            successful: false,
            subscription: Some("/group/g1".to_owned()),
            error: Some("403::denied".to_owned()),
        }
    );
}

#[test]
fn expired_client_id_beats_group_payload() {
    let inbound = one(r#"[{"channel":"/meta/connect","error":"ClientID_Expired","groupId":"g1"}]"#);
    assert_eq!(inbound, Inbound::SessionExpired);
}

#[test]
fn group_id_routes_to_group_payload() {
    let inbound = one(r#"[{"channel":"/other","groupId":"g1","text":"hi"}]"#);
    let (group_id, payload) = match inbound {
        Inbound::GroupPayload { group_id, payload } => (group_id, payload),
        other => panic!("expected group payload, got {other:?}"),
    };
    assert_eq!(group_id, "g1");
    assert_eq!(payload, json!({"channel": "/other", "groupId": "g1", "text": "hi"}));
}

#[test]
fn empty_group_id_is_generic() {
    let inbound = one(r#"[{"channel":"/other","groupId":""}]"#);
    assert_eq!(inbound.kind(), "generic_payload");
}

#[test]
fn other_errors_are_generic_payloads() {
    let inbound = one(r#"[{"channel":"/meta/connect","successful":false,"error":"402::Unknown"}]"#);
    assert!(matches!(inbound, Inbound::GenericPayload(_)));
}

#[test]
fn generic_payload_keeps_whole_message() {
    let inbound = one(r#"[{"channel":"/user/u1","data":{"type":"ping"},"id":"7"}]"#);
    assert_eq!(
        inbound,
        Inbound::GenericPayload(json!({"channel": "/user/u1", "data": {"type": "ping"}, "id": "7"}))
    );
}

#[test]
fn batch_order_is_preserved() {
    let inbound = decode_inbound(&text(
        r#"[{"channel":"/meta/handshake","successful":true,"clientId":"c1"},{"channel":"/x","groupId":"g2"},{"channel":"/y"}]"#,
    ))
    .expect("decode");
    let kinds = inbound.iter().map(Inbound::kind).collect::<Vec<_>>();
    assert_eq!(kinds, vec!["handshake_response", "group_payload", "generic_payload"]);
}

#[test]
fn binary_frames_are_rejected() {
    let err = decode_inbound(&WireFrame::Binary(vec![1, 2, 3])).expect_err("binary");
    assert!(matches!(err, DecodeError::NotText { len: 3 }));
}

#[test]
fn invalid_json_is_rejected_whole() {
    let err = decode_inbound(&text(r#"[{"channel":"/x"}"#)).expect_err("malformed");
    assert!(matches!(err, DecodeError::Codec(CodecError::Json(_))));
}

#[test]
fn bad_element_does_not_drop_its_neighbours() {
    let inbound = decode_inbound(&text(
        r#"[{"channel":"/meta/subscribe","successful":true,"subscription":"/user/u1"},5,{"channel":"/x","groupId":12},{"channel":"/y"}]"#,
    ))
    .expect("decode");

    let kinds = inbound.iter().map(Inbound::kind).collect::<Vec<_>>();
    assert_eq!(kinds, vec!["subscribe_response", "rejected", "rejected", "generic_payload"]);
}
