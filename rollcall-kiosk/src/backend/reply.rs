//! Recognition reply translation
//!
//! The recognition endpoint answers with a loose `{message?, error?}` JSON
//! object. This is the only place that inspects those strings; the rest of
//! the kiosk works with [`RecognitionReply`].

use serde::Deserialize;

/// Message prefix of a successful match; the subject name follows `"for "`
const MATCHED_PREFIX: &str = "Attendance marked";
/// Message prefix when today's attendance already exists
const ALREADY_RECORDED_PREFIX: &str = "Attendance already marked";
/// Exact error text when the frame holds no detectable face
const NO_FACE_ERROR: &str = "No face detected in image";

/// Closed set of recognized reply shapes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionReply {
    /// Face matched the identity; attendance recorded
    Matched { name: Option<String> },
    /// Attendance already recorded for this period
    AlreadyRecorded { message: String },
    /// No face found in the frame
    NoFace,
    /// Any other application-level reply, including unrecognized shapes
    Rejected { reason: String },
}

/// Wire shape of a recognition reply
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RawReply {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Translate a parsed reply into a [`RecognitionReply`]
pub fn translate(raw: &RawReply, http_status: u16) -> RecognitionReply {
    if let Some(message) = raw.message.as_deref() {
        if message.starts_with(MATCHED_PREFIX) {
            return RecognitionReply::Matched {
                name: subject_name(message),
            };
        }
        if message.starts_with(ALREADY_RECORDED_PREFIX) {
            return RecognitionReply::AlreadyRecorded {
                message: message.to_string(),
            };
        }
    }

    if raw.error.as_deref() == Some(NO_FACE_ERROR) {
        return RecognitionReply::NoFace;
    }

    let reason = raw
        .error
        .as_deref()
        .or(raw.message.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| unrecognized(http_status));

    RecognitionReply::Rejected { reason }
}

/// Translate a raw response body; bodies that are not a JSON object become
/// a generic rejection
pub fn translate_body(body: &str, http_status: u16) -> RecognitionReply {
    match serde_json::from_str::<RawReply>(body) {
        Ok(raw) => translate(&raw, http_status),
        Err(_) => RecognitionReply::Rejected {
            reason: unrecognized(http_status),
        },
    }
}

fn subject_name(message: &str) -> Option<String> {
    message
        .split_once("for ")
        .map(|(_, name)| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

fn unrecognized(http_status: u16) -> String {
    format!("Unrecognized response (HTTP {})", http_status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(text: &str) -> RawReply {
        RawReply {
            message: Some(text.to_string()),
            error: None,
        }
    }

    fn error(text: &str) -> RawReply {
        RawReply {
            message: None,
            error: Some(text.to_string()),
        }
    }

    #[test]
    fn test_matched_extracts_name() {
        assert_eq!(
            translate(&message("Attendance marked for A. Sharma"), 200),
            RecognitionReply::Matched {
                name: Some("A. Sharma".to_string())
            }
        );
    }

    #[test]
    fn test_matched_without_name() {
        assert_eq!(
            translate(&message("Attendance marked"), 200),
            RecognitionReply::Matched { name: None }
        );
    }

    #[test]
    fn test_already_recorded_is_not_a_match() {
        let reply = translate(&message("Attendance already marked today"), 200);
        assert_eq!(
            reply,
            RecognitionReply::AlreadyRecorded {
                message: "Attendance already marked today".to_string()
            }
        );
    }

    #[test]
    fn test_no_face_detected() {
        assert_eq!(
            translate(&error("No face detected in image"), 400),
            RecognitionReply::NoFace
        );
    }

    #[test]
    fn test_other_errors_are_rejected() {
        assert_eq!(
            translate(&error("Face did not match"), 400),
            RecognitionReply::Rejected {
                reason: "Face did not match".to_string()
            }
        );
        assert_eq!(
            translate(&error("Student not found"), 404),
            RecognitionReply::Rejected {
                reason: "Student not found".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_message_is_rejected() {
        assert_eq!(
            translate(&message("Server busy"), 200),
            RecognitionReply::Rejected {
                reason: "Server busy".to_string()
            }
        );
    }

    #[test]
    fn test_error_takes_precedence_for_reason() {
        let raw = RawReply {
            message: Some("ignored".to_string()),
            error: Some("Roll number and image are required".to_string()),
        };
        assert_eq!(
            translate(&raw, 400),
            RecognitionReply::Rejected {
                reason: "Roll number and image are required".to_string()
            }
        );
    }

    #[test]
    fn test_empty_object_is_unrecognized() {
        assert_eq!(
            translate_body("{}", 500),
            RecognitionReply::Rejected {
                reason: "Unrecognized response (HTTP 500)".to_string()
            }
        );
    }

    #[test]
    fn test_non_json_body_is_unrecognized() {
        assert_eq!(
            translate_body("<html>Bad Gateway</html>", 502),
            RecognitionReply::Rejected {
                reason: "Unrecognized response (HTTP 502)".to_string()
            }
        );
    }
}
