use serde::Serialize;

use crate::camera::frame::png_data_url;

/// The "new session" payload attached to a match. The server encodes the
/// session's end link into the QR code; the session id is its last path
/// segment.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionArtifact {
    pub payload: String,
    pub session_id: String,
    pub qr_image: String,
    pub end_session_url: String,
}

impl SessionArtifact {
    pub fn from_payload(payload: &str, frontend_base_url: &str) -> Option<Self> {
        let session_id = session_id_from_payload(payload)?;
        Some(Self {
            payload: payload.to_string(),
            qr_image: png_data_url(payload),
            end_session_url: format!(
                "{}/end-session/{}",
                frontend_base_url.trim_end_matches('/'),
                session_id
            ),
            session_id: session_id.to_string(),
        })
    }
}

/// Final `/`-separated segment, ignoring trailing slashes.
pub fn session_id_from_payload(payload: &str) -> Option<&str> {
    payload
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_is_last_segment() {
        assert_eq!(session_id_from_payload("sess/42"), Some("42"));
        assert_eq!(
            session_id_from_payload("http://localhost:3000/end-session/7/"),
            Some("7")
        );
        assert_eq!(session_id_from_payload("99"), Some("99"));
        assert_eq!(session_id_from_payload(""), None);
        assert_eq!(session_id_from_payload("///"), None);
    }

    #[test]
    fn builds_navigable_end_session_url() {
        let artifact = SessionArtifact::from_payload("sess/42", "http://localhost:3000/").unwrap();
        assert_eq!(artifact.session_id, "42");
        assert_eq!(artifact.end_session_url, "http://localhost:3000/end-session/42");
        assert_eq!(artifact.qr_image, "data:image/png;base64,sess/42");
    }
}
