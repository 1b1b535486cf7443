use base64::Engine;
use voxqueue::engine::{
    DownloadProgress, EngineErrorKind, EngineReply, ModelInfo, TranscribeRequest,
    TranscribeResponse,
};

#[test]
fn test_transcribe_request_serialization() {
    let req = TranscribeRequest {
        audio: base64::engine::general_purpose::STANDARD.encode([0u8; 100]),
        model_id: "whisper-base".to_string(),
        timestamp: "2026-08-30T14:30:00Z".to_string(),
    };

    let json = serde_json::to_string(&req).unwrap();
    assert!(json.contains("whisper-base"));
    assert!(json.contains("\"audio\""));

    let deserialized: TranscribeRequest = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized.model_id, "whisper-base");
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(deserialized.audio)
        .unwrap();
    assert_eq!(decoded.len(), 100);
}

#[test]
fn test_reply_ok_round_trip() {
    let json = r#"{
        "outcome": "ok",
        "payload": { "text": "hello world" }
    }"#;

    let reply: EngineReply<TranscribeResponse> = serde_json::from_str(json).unwrap();
    match reply {
        EngineReply::Ok { payload } => assert_eq!(payload.text, "hello world"),
        EngineReply::Error { .. } => panic!("expected ok reply"),
    }
}

#[test]
fn test_reply_busy_error_is_structured() {
    // Busy is a discriminant on the wire; clients never match on wording.
    let json = r#"{
        "outcome": "error",
        "kind": "busy",
        "message": "still loading model"
    }"#;

    let reply: EngineReply<TranscribeResponse> = serde_json::from_str(json).unwrap();
    match reply {
        EngineReply::Error { kind, message } => {
            assert_eq!(kind, EngineErrorKind::Busy);
            assert_eq!(message, "still loading model");
        }
        EngineReply::Ok { .. } => panic!("expected error reply"),
    }
}

#[test]
fn test_reply_terminal_error() {
    let json = r#"{
        "outcome": "error",
        "kind": "failed",
        "message": "model crashed"
    }"#;

    let reply: EngineReply<TranscribeResponse> = serde_json::from_str(json).unwrap();
    match reply {
        EngineReply::Error { kind, .. } => assert_eq!(kind, EngineErrorKind::Failed),
        EngineReply::Ok { .. } => panic!("expected error reply"),
    }
}

#[test]
fn test_ping_reply_payload() {
    let json = r#"{ "outcome": "ok", "payload": true }"#;

    let reply: EngineReply<bool> = serde_json::from_str(json).unwrap();
    assert!(matches!(reply, EngineReply::Ok { payload: true }));
}

#[test]
fn test_download_progress_deserialization() {
    let json = r#"{
        "fraction": 0.42,
        "bytes_downloaded": 44040192,
        "bytes_total": 104857600
    }"#;

    let progress: DownloadProgress = serde_json::from_str(json).unwrap();
    assert!((progress.fraction - 0.42).abs() < f64::EPSILON);
    assert_eq!(progress.bytes_total, 104857600);
}

#[test]
fn test_model_list_deserialization() {
    let json = r#"[
        {
            "id": "whisper-base",
            "family": "whisper",
            "display_name": "Whisper Base",
            "size_description": "142 MB",
            "downloaded": true,
            "loaded": false
        },
        {
            "id": "whisper-large",
            "family": "whisper",
            "display_name": "Whisper Large v3",
            "size_description": "2.9 GB",
            "downloaded": false,
            "loaded": false
        }
    ]"#;

    let models: Vec<ModelInfo> = serde_json::from_str(json).unwrap();
    assert_eq!(models.len(), 2);
    assert!(models[0].downloaded);
    assert_eq!(models[1].display_name, "Whisper Large v3");
}
