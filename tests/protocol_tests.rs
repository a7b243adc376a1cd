use medscribe::{ControlMessage, Language, ServerMessage};
use std::str::FromStr;

#[test]
fn test_transcript_partial_deserialization() {
    let json = r#"{"type":"transcript","text":"hello","is_final":false}"#;

    let message: ServerMessage = serde_json::from_str(json).unwrap();
    match message {
        ServerMessage::Transcript { text, is_final } => {
            assert_eq!(text, "hello");
            assert!(!is_final);
        }
        other => panic!("Unexpected message: {:?}", other),
    }
}

#[test]
fn test_transcript_final_deserialization() {
    let json = r#"{"type":"transcript","text":"hello world","is_final":true}"#;

    let message: ServerMessage = serde_json::from_str(json).unwrap();
    match message {
        ServerMessage::Transcript { text, is_final } => {
            assert_eq!(text, "hello world");
            assert!(is_final);
        }
        other => panic!("Unexpected message: {:?}", other),
    }
}

#[test]
fn test_entities_full_payload() {
    let json = r#"{
        "type": "entities",
        "data": {
            "extracted_terms": {"symptoms": ["fever", "cough"], "medications": []},
            "final_english_text": "Patient reports fever and cough.",
            "source_language": "en"
        }
    }"#;

    let message: ServerMessage = serde_json::from_str(json).unwrap();
    match message {
        ServerMessage::Entities { data } => {
            assert_eq!(data.extracted_terms["symptoms"], vec!["fever", "cough"]);
            // Empty categories are valid and preserved.
            assert!(data.extracted_terms["medications"].is_empty());
            assert_eq!(
                data.final_english_text.as_deref(),
                Some("Patient reports fever and cough.")
            );
            assert_eq!(data.source_language.as_deref(), Some("en"));
            assert!(data.error.is_none());
        }
        other => panic!("Unexpected message: {:?}", other),
    }
}

#[test]
fn test_entities_minimal_payload() {
    // Every field of the payload tolerates absence.
    let json = r#"{"type":"entities","data":{}}"#;

    let message: ServerMessage = serde_json::from_str(json).unwrap();
    match message {
        ServerMessage::Entities { data } => {
            assert!(data.extracted_terms.is_empty());
            assert!(data.final_english_text.is_none());
            assert!(data.source_language.is_none());
            assert!(data.error.is_none());
        }
        other => panic!("Unexpected message: {:?}", other),
    }
}

#[test]
fn test_entities_error_payload() {
    let json = r#"{"type":"entities","data":{"error":"low confidence","extracted_terms":{"symptoms":["fever"]}}}"#;

    let message: ServerMessage = serde_json::from_str(json).unwrap();
    match message {
        ServerMessage::Entities { data } => {
            assert_eq!(data.error.as_deref(), Some("low confidence"));
            assert_eq!(data.extracted_terms["symptoms"], vec!["fever"]);
        }
        other => panic!("Unexpected message: {:?}", other),
    }
}

#[test]
fn test_error_message_deserialization() {
    let json = r#"{"type":"error","message":"model unavailable"}"#;

    let message: ServerMessage = serde_json::from_str(json).unwrap();
    match message {
        ServerMessage::Error { message } => assert_eq!(message, "model unavailable"),
        other => panic!("Unexpected message: {:?}", other),
    }
}

#[test]
fn test_unknown_type_is_rejected() {
    let json = r#"{"type":"heartbeat"}"#;
    assert!(serde_json::from_str::<ServerMessage>(json).is_err());
}

#[test]
fn test_end_stream_wire_format() {
    let json = serde_json::to_string(&ControlMessage::EndStream).unwrap();
    assert_eq!(json, r#"{"type":"end_stream"}"#);
}

#[test]
fn test_language_codes() {
    assert_eq!(Language::En.as_str(), "en");
    assert_eq!(Language::Ml.as_str(), "ml");
    assert_eq!(Language::from_str("en").unwrap(), Language::En);
    assert_eq!(Language::from_str("ml").unwrap(), Language::Ml);
    assert!(Language::from_str("fr").is_err());
}

#[test]
fn test_language_serde_roundtrip() {
    let json = serde_json::to_string(&Language::Ml).unwrap();
    assert_eq!(json, r#""ml""#);
    let parsed: Language = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, Language::Ml);
}
