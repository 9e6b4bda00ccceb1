use axum::{body::Bytes, extract::{Path, State}, http::{header, HeaderMap, StatusCode}, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::api::AppState;
use crate::domain::aggregates::{AttributeGroup, EditorCommand, GenerationMode, ProductVariation};
use crate::domain::events::DomainEvent;
use crate::service::{PlaceOrder, PlacedOrder, SessionView};
use crate::store::ImageUpload;
use crate::{CatalogError, Result};

pub async fn list_attributes(State(s): State<AppState>, Path(store_id): Path<Uuid>) -> Result<Json<Vec<AttributeGroup>>> {
    Ok(Json(s.service.load_catalog(store_id).await?.groups().to_vec()))
}

#[derive(Debug, Deserialize)] pub struct OpenSessionRequest { pub store_id: Uuid, pub product_id: Option<Uuid>, #[serde(default)] pub mode: GenerationMode }

pub async fn open_session(State(s): State<AppState>, Json(r): Json<OpenSessionRequest>) -> Result<(StatusCode, Json<SessionView>)> {
    let session = s.service.open_session(r.store_id, r.product_id, r.mode).await?;
    let session = s.sessions.insert(session).await;
    Ok((StatusCode::CREATED, Json(session.view().await)))
}

pub async fn get_session(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<SessionView>> {
    Ok(Json(s.sessions.get(id).await?.view().await))
}

pub async fn close_session(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    s.sessions.close(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)] pub struct CommandResponse { pub events: Vec<DomainEvent>, pub session: SessionView }

pub async fn apply_command(State(s): State<AppState>, Path(id): Path<Uuid>, Json(command): Json<EditorCommand>) -> Result<Json<CommandResponse>> {
    let session = s.sessions.get(id).await?;
    let events = s.service.apply(&session, command).await?;
    Ok(Json(CommandResponse { events, session: session.view().await }))
}

pub async fn refresh_session(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<SessionView>> {
    let session = s.sessions.get(id).await?;
    s.service.refresh(&session).await?;
    Ok(Json(session.view().await))
}

pub async fn save_session(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<SessionView>> {
    let session = s.sessions.get(id).await?;
    s.service.save(&session).await?;
    Ok(Json(session.view().await))
}

pub async fn delete_variation(State(s): State<AppState>, Path((id, variation_id)): Path<(Uuid, Uuid)>) -> Result<Json<CommandResponse>> {
    let session = s.sessions.get(id).await?;
    let events = s.service.delete_variation(&session, variation_id).await?;
    Ok(Json(CommandResponse { events, session: session.view().await }))
}

#[derive(Debug, Serialize)] pub struct ImageResponse { pub url: String }

/// Raw image body; the file name travels in `X-File-Name`.
pub async fn upload_image(State(s): State<AppState>, Path((id, variation_id)): Path<(Uuid, Uuid)>, headers: HeaderMap, body: Bytes) -> Result<(StatusCode, Json<ImageResponse>)> {
    let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or_default();
    let file_name = headers.get("x-file-name").and_then(|v| v.to_str().ok()).unwrap_or("upload");
    let upload = ImageUpload::new(file_name, content_type, body.to_vec())?;
    let session = s.sessions.get(id).await?;
    let url = s.service.upload_image(&session, variation_id, upload).await?;
    Ok((StatusCode::CREATED, Json(ImageResponse { url })))
}

pub async fn product_variations(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Vec<ProductVariation>>> {
    Ok(Json(s.service.product_variations(id).await?))
}

pub async fn get_image(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse> {
    let image = s.service.store().fetch_image(id).await?.ok_or_else(|| CatalogError::NotFound(format!("Image {id}")))?;
    Ok(([(header::CONTENT_TYPE, image.content_type)], image.bytes))
}

pub async fn place_order(State(s): State<AppState>, Json(r): Json<PlaceOrder>) -> Result<(StatusCode, Json<PlacedOrder>)> {
    Ok((StatusCode::CREATED, Json(s.service.place_order(r).await?)))
}
