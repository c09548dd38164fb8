use axum::{
    extract::{Path, State},
    Json,
};
use kitchen::sync::SyncDocument;
use serde::Deserialize;

use crate::{
    http_server::{
        errors::{OrNotFound as _, ServerError},
        session::CurrentUser,
        ResponseResult,
    },
    AppState,
};

const MAX_KEY_LEN: usize = 64;

fn valid_key(key: &str) -> bool {
    (1..=MAX_KEY_LEN).contains(&key.len())
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

fn checked_key(key: &str) -> Result<&str, ServerError> {
    if valid_key(key) {
        Ok(key)
    } else {
        Err(ServerError::bad_request(
            "Sync keys are 1 to 64 lowercase letters, digits, '_' or '-'",
        ))
    }
}

pub(crate) async fn show(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(key): Path<String>,
) -> ResponseResult<Json<SyncDocument>> {
    let key = checked_key(&key)?;

    let doc = db::sync_documents::get(&state.db, current.user_id(), key)
        .await?
        .or_not_found("Sync document")?;

    Ok(Json(SyncDocument {
        payload: doc.payload,
        updated_at: doc.updated_at,
    }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct SyncUpload {
    payload: serde_json::Value,
}

pub(crate) async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(key): Path<String>,
    Json(upload): Json<SyncUpload>,
) -> ResponseResult<Json<SyncDocument>> {
    let key = checked_key(&key)?;

    let doc = db::sync_documents::put(&state.db, current.user_id(), key, &upload.payload).await?;
    tracing::debug!(user_id = %current.user_id(), key, "Stored sync document");

    Ok(Json(SyncDocument {
        payload: doc.payload,
        updated_at: doc.updated_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys() {
        assert!(valid_key("plans"));
        assert!(valid_key("week_2025-12"));
        assert!(!valid_key(""));
        assert!(!valid_key("Plans"));
        assert!(!valid_key("../etc"));
        assert!(!valid_key(&"a".repeat(65)));
        assert!(valid_key(&"a".repeat(64)));
    }
}
