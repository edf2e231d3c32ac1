use super::*;
use serde_json::json;

use crate::{
    domain::GroupSummary,
    error::{ApiError, ApiException, ErrorCode},
};

#[test]
fn client_frames_use_event_envelope() {
    let frame = ClientFrame::JoinRoom(JoinRoom {
        user_id: UserId(3),
        room_id: RoomId::direct(UserId(8), UserId(3)),
    });
    assert_eq!(
        serde_json::to_value(&frame).expect("encode"),
        json!({"event": "join-room", "data": {"userId": 3, "roomId": "3_8"}})
    );

    let frame = ClientFrame::LeaveGroup(JoinGroup {
        group_id: GroupId(4),
        user_id: UserId(3),
    });
    let value = serde_json::to_value(&frame).expect("encode");
    assert_eq!(value["event"], frame.event_name());
    assert_eq!(value["data"], json!({"groupId": 4, "userId": 3}));
}

#[test]
fn private_message_keeps_snake_case_file_url() {
    let frame = ClientFrame::PrivateMessage(PrivateMessage {
        id: None,
        client_msg_id: Some("c-1".into()),
        from_user_id: UserId(3),
        to_user_id: Some(UserId(8)),
        room_id: Some(RoomId("3_8".into())),
        message: "http://x/a.png".into(),
        kind: MessageKind::File,
        file_url: Some("http://x/a.png".into()),
        sent_at: None,
    });
    let value = serde_json::to_value(&frame).expect("encode");
    assert_eq!(
        value["data"],
        json!({
            "clientMsgId": "c-1",
            "fromUserId": 3,
            "toUserId": 8,
            "roomId": "3_8",
            "message": "http://x/a.png",
            "type": "file",
            "file_url": "http://x/a.png",
        })
    );
}

#[test]
fn server_frames_accept_string_ids_and_missing_fields() {
    let frame: ServerFrame = serde_json::from_value(json!({
        "event": "group-message",
        "data": {"sender": "8", "groupId": "4", "message": "hi"}
    }))
    .expect("decode");
    let ServerFrame::GroupMessage(payload) = frame else {
        panic!("expected group message");
    };
    assert_eq!(payload.sender, UserId(8));
    assert_eq!(payload.group_id, Some(GroupId(4)));
    assert_eq!(payload.kind, MessageKind::Text);
    assert_eq!(payload.file_url, None);

    let frame: ServerFrame =
        serde_json::from_value(json!({"event": "error", "data": {"message": "nope"}}))
            .expect("decode");
    assert_eq!(
        frame,
        ServerFrame::Error(ServerNotice {
            message: "nope".into()
        })
    );

    assert!(serde_json::from_value::<UserId>(json!("abc")).is_err());
}

#[test]
fn history_records_accept_both_backend_shapes() {
    let direct: HistoryRecord = serde_json::from_value(json!({
        "_id": 11,
        "fromUserId": 3,
        "message": "hey",
        "createdAt": "2024-05-01T10:00:00Z"
    }))
    .expect("direct record");
    assert_eq!(direct.id, Some(MessageId(11)));
    assert_eq!(direct.sender, UserId(3));
    assert!(direct.sent_at.is_some());

    let group: HistoryRecord = serde_json::from_value(json!({
        "sender_id": "8",
        "senderName": "Bob",
        "text": "welcome",
        "type": "file",
        "file_url": "http://x/doc.pdf"
    }))
    .expect("group record");
    assert_eq!(group.id, None);
    assert_eq!(group.sender_name.as_deref(), Some("Bob"));
    assert_eq!(group.message, "welcome");
    assert_eq!(group.kind, MessageKind::File);
}

#[test]
fn group_summary_counts_member_lists() {
    let summary: GroupSummary =
        serde_json::from_value(json!({"_id": "2", "name": "Ops", "members": [1, 2]}))
            .expect("decode");
    assert_eq!(summary.members, Some(2));
    let summary: GroupSummary =
        serde_json::from_value(json!({"id": 2, "name": "Ops", "members": 7})).expect("decode");
    assert_eq!(summary.members, Some(7));
    let summary: GroupSummary =
        serde_json::from_value(json!({"id": 2, "name": "Ops"})).expect("decode");
    assert_eq!(summary.members, None);
}

#[test]
fn api_exception_falls_back_to_status_reason() {
    let exception = ApiException::from_response(404, None, "Not Found");
    assert_eq!(exception.code, ErrorCode::NotFound);
    assert_eq!(exception.message, "Not Found");

    let exception = ApiException::from_response(
        400,
        Some(ApiError {
            code: None,
            message: Some("Email taken".into()),
        }),
        "Bad Request",
    );
    assert_eq!(exception.code, ErrorCode::Validation);
    assert_eq!(exception.message, "Email taken");
}
