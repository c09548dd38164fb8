use std::path::PathBuf;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use color_eyre::eyre::Context as _;
use db::{
    pantry::{NewPantryItem, PantryItem},
    scans::PantryScan,
};
use kitchen::{
    aisle::Aisle,
    pantry::{
        parse_detected_items, validate_scan_upload, DetectedItem, PantrySource, ScanStatus,
        ScanType, SUGGESTION_LIMIT,
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::pantry::pantry_suggestions;
use crate::{
    anthropic::detect_food,
    http_server::{
        errors::{OrNotFound as _, WithStatus as _},
        session::CurrentUser,
        ResponseResult, ServerError,
    },
    AppState,
};

const DEFAULT_HISTORY_LIMIT: i64 = 20;

struct Upload {
    image: Vec<u8>,
    mime: String,
    scan_type: ScanType,
}

async fn read_upload(mut multipart: Multipart) -> ResponseResult<Upload> {
    let mut image = None;
    let mut scan_type = ScanType::Fridge;

    while let Some(field) = multipart
        .next_field()
        .await
        .with_status(StatusCode::BAD_REQUEST)?
    {
        match field.name() {
            Some("image") => {
                let mime = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.with_status(StatusCode::BAD_REQUEST)?;
                image = Some((bytes.to_vec(), mime));
            }
            Some("scanType") => {
                let raw = field.text().await.with_status(StatusCode::BAD_REQUEST)?;
                scan_type = raw.trim().parse().map_err(ServerError::bad_request)?;
            }
            _ => {}
        }
    }

    let Some((image, mime)) = image else {
        return Err(ServerError::bad_request("An image field is required"));
    };
    validate_scan_upload(&mime, image.len()).with_status(StatusCode::BAD_REQUEST)?;

    Ok(Upload {
        image,
        mime,
        scan_type,
    })
}

fn extension(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

async fn store_image(state: &AppState, household_id: Uuid, upload: &Upload) -> ResponseResult<PathBuf> {
    let dir = state.app.scan_image_dir.join(household_id.to_string());
    tokio::fs::create_dir_all(&dir)
        .await
        .wrap_err("Failed to create scan image directory")?;

    let path = dir.join(format!("{}.{}", Uuid::new_v4(), extension(&upload.mime)));
    tokio::fs::write(&path, &upload.image)
        .await
        .wrap_err("Failed to store scan image")?;

    Ok(path)
}

/// Runs a photo through the vision model and records what it found.
#[tracing::instrument(skip_all, fields(user_id = %current.user_id()))]
pub(crate) async fn scan(
    State(state): State<AppState>,
    current: CurrentUser,
    multipart: Multipart,
) -> ResponseResult<impl IntoResponse> {
    let Some(anthropic) = state.anthropic.clone() else {
        return Err(ServerError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Photo scanning is not configured",
        ));
    };

    let upload = read_upload(multipart).await?;
    let image_path = store_image(&state, current.household_id(), &upload).await?;
    let image_ref = image_path.to_string_lossy().into_owned();

    let scan = PantryScan::start(
        &state.db,
        current.household_id(),
        current.user_id(),
        upload.scan_type,
        Some(image_ref.as_str()),
    )
    .await?;

    let detected = match detect_food(
        &state.http,
        &anthropic,
        &upload.image,
        &upload.mime,
        upload.scan_type,
    )
    .await
    .and_then(|reply| parse_detected_items(&reply).wrap_err("Model reply was not a JSON list"))
    {
        Ok(detected) => detected,
        Err(error) => {
            tracing::warn!(?error, scan_id = %scan.scan_id, "Scan failed");
            scan.fail(&state.db, &error.to_string()).await?;

            return Err(ServerError(
                error.wrap_err("Failed to analyze image"),
                StatusCode::BAD_GATEWAY,
            ));
        }
    };

    let on_hand: Vec<String> = detected.iter().map(|d| d.ingredient.clone()).collect();
    let suggestions = pantry_suggestions(&state, &current, &on_hand, SUGGESTION_LIMIT).await?;

    let scan = scan.complete(&state.db, detected, suggestions).await?;

    Ok((StatusCode::CREATED, Json(scan)))
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryQuery {
    limit: Option<i64>,
}

pub(crate) async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<HistoryQuery>,
) -> ResponseResult<Json<Vec<PantryScan>>> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 100);

    Ok(Json(
        PantryScan::list(&state.db, current.household_id(), limit).await?,
    ))
}

async fn household_scan(
    state: &AppState,
    current: &CurrentUser,
    scan_id: Uuid,
) -> ResponseResult<PantryScan> {
    PantryScan::get_for_household(&state.db, scan_id, current.household_id())
        .await?
        .or_not_found("Scan")
}

pub(crate) async fn show(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(scan_id): Path<Uuid>,
) -> ResponseResult<Json<PantryScan>> {
    Ok(Json(household_scan(&state, &current, scan_id).await?))
}

pub(crate) async fn destroy(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(scan_id): Path<Uuid>,
) -> ResponseResult<StatusCode> {
    let scan = household_scan(&state, &current, scan_id).await?;

    scan.delete(&state.db).await?;

    if let Some(image_ref) = &scan.image_ref {
        if let Err(error) = tokio::fs::remove_file(image_ref).await {
            tracing::warn!(?error, %image_ref, "Failed to remove scan image");
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConfirmedItem {
    ingredient: String,
    #[serde(default)]
    category: Option<Aisle>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ConfirmRequest {
    /// What the user kept from the detection. Everything detected when absent.
    items: Option<Vec<ConfirmedItem>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Confirmed {
    added: Vec<PantryItem>,
}

/// What a confirmation adds to the pantry: the request's items, or everything detected.
fn items_to_confirm(
    status: ScanStatus,
    detected: &[DetectedItem],
    request: ConfirmRequest,
) -> ResponseResult<Vec<NewPantryItem>> {
    if status != ScanStatus::Completed {
        return Err(ServerError::bad_request(format!(
            "Scan is {status}, only completed scans can be confirmed"
        )));
    }

    let items = match request.items {
        Some(items) => items
            .into_iter()
            .map(|i| NewPantryItem {
                ingredient: i.ingredient,
                category: i.category,
                source: Some(PantrySource::Scan),
            })
            .collect(),
        None => detected
            .iter()
            .map(|d| NewPantryItem {
                ingredient: d.ingredient.clone(),
                category: d.category.as_deref().and_then(|c| c.parse().ok()),
                source: Some(PantrySource::Scan),
            })
            .collect::<Vec<_>>(),
    };

    Ok(items
        .into_iter()
        .filter(|i| !i.ingredient.trim().is_empty())
        .collect())
}

pub(crate) async fn confirm(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(scan_id): Path<Uuid>,
    request: Option<Json<ConfirmRequest>>,
) -> ResponseResult<Json<Confirmed>> {
    let scan = household_scan(&state, &current, scan_id).await?;
    let items = items_to_confirm(
        scan.processing_status,
        &scan.detected_items,
        request.map(|Json(r)| r).unwrap_or_default(),
    )?;

    if items.is_empty() {
        return Ok(Json(Confirmed { added: Vec::new() }));
    }

    let added = PantryItem::upsert_many(&state.db, current.household_id(), &items).await?;

    Ok(Json(Confirmed { added }))
}
