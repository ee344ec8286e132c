use serde::{Deserialize, Serialize};

use crate::models::optional_id_string;

#[derive(Debug, Serialize)]
pub(crate) struct LiveRecognitionRequest<'a> {
    pub image: &'a str,
}

/// Body of a `live-recognition` reply. Every field but `matched` is optional
/// and the server omits `matched` entirely on some error paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecognitionResponse {
    #[serde(default)]
    pub matched: bool,
    #[serde(default, deserialize_with = "optional_id_string")]
    pub student_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image_filename: Option<String>,
    /// Base64 PNG of the session QR code; only present when the match opened
    /// a new session.
    #[serde(default)]
    pub qr_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RecognitionResponse {
    pub fn no_match() -> Self {
        Self::default()
    }

    /// The image filename of a match that should freeze the display.
    pub fn matched_image(&self) -> Option<&str> {
        if !self.matched {
            return None;
        }
        self.image_filename
            .as_deref()
            .filter(|filename| !filename.is_empty())
    }
}

/// What the operator presents to close a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EndSessionProof {
    Credentials { username: String, password: String },
    Face { image: String },
}

impl EndSessionProof {
    pub fn credentials(username: impl Into<String>, password: impl Into<String>) -> Self {
        EndSessionProof::Credentials {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EndSessionResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl EndSessionResponse {
    /// Server-provided explanation, preferring `error` over `message`.
    pub fn reason(&self) -> Option<&str> {
        self.error.as_deref().or(self.message.as_deref())
    }
}
