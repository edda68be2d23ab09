//! Recording-uploaded notification: start a transcription job for each
//! call recording, named by the contact id carried in the filename.
//!
//! Object keys arrive percent-encoded with `+` for spaces. Only `.wav`
//! objects whose filename starts with `<uuid>_` are call recordings;
//! anything else is skipped, not an error.

use axum::extract::State;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::handlers::{ApiError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingNotification {
    pub records: Vec<ObjectRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRecord {
    pub bucket: String,
    pub key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingResponse {
    pub started: Vec<String>,
    pub skipped: usize,
}

/// Contact id from a recording key: the UUID filename prefix before the
/// first underscore.
fn contact_id_from_key(decoded_key: &str) -> Option<String> {
    if !decoded_key.ends_with(".wav") {
        return None;
    }
    let filename = decoded_key.rsplit('/').next()?;
    let stem = match filename.split_once('_') {
        Some((prefix, _)) => prefix,
        None => filename.strip_suffix(".wav")?,
    };
    uuid::Uuid::parse_str(stem).ok()?;
    Some(stem.to_owned())
}

pub async fn handle(
    State(state): State<AppState>,
    Json(notification): Json<RecordingNotification>,
) -> Result<Json<RecordingResponse>, ApiError> {
    let mut started = Vec::new();
    let mut skipped = 0usize;

    for record in &notification.records {
        let decoded = match urlencoding::decode(&record.key.replace('+', " ")) {
            Ok(decoded) => decoded.into_owned(),
            Err(error) => {
                warn!(
                    event_name = "event.recording.undecodable_key",
                    key = record.key.as_str(),
                    error = %error,
                    "skipping object with undecodable key"
                );
                skipped += 1;
                continue;
            }
        };

        let Some(contact_id) = contact_id_from_key(&decoded) else {
            skipped += 1;
            continue;
        };

        let media_uri =
            format!("{}/{}/{decoded}", state.config.storage.base_url.trim_end_matches('/'), record.bucket);
        state
            .transcription
            .start_job(&contact_id, &media_uri, "wav", &state.config.transcription.language_code)
            .await?;
        info!(
            event_name = "event.recording.job_started",
            contact_id = contact_id.as_str(),
            "transcription job started"
        );
        started.push(contact_id);
    }

    Ok(Json(RecordingResponse { started, skipped }))
}
