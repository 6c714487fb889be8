//! # Part API
//!
//! Spare parts link to the equipment they fit and the vendors supplying
//! them. `last_updated` is stamped from the state clock on every write.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use cmms_core::{EquipmentId, Part, PartId, Vendor, VendorId};

use crate::error::AppError;
use crate::extractors::{check_text, extract_validated_json, nullable, Validate};
use crate::routes::persist_failed;
use crate::routes::vendors::require_vendor;
use crate::state::AppState;

fn default_true() -> bool {
    true
}

/// A part with its suppliers expanded.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PartView {
    #[serde(flatten)]
    pub part: Part,
    /// Supplier records for `part.suppliers`, in the same order.
    pub supplier_details: Vec<Vendor>,
}

impl PartView {
    pub(crate) fn build(state: &AppState, part: Part) -> Self {
        let supplier_details = part
            .suppliers
            .iter()
            .filter_map(|id| state.vendors.get(id))
            .collect();
        Self {
            part,
            supplier_details,
        }
    }
}

/// Request to create a part.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePartRequest {
    pub part_number: String,
    pub part_name: String,
    pub description: Option<String>,
    pub status: String,
    #[serde(default)]
    pub equipment: Vec<EquipmentId>,
    #[serde(default)]
    pub suppliers: Vec<VendorId>,
    pub vendor: Option<VendorId>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Validate for CreatePartRequest {
    fn validate(&self) -> Result<(), String> {
        check_text("part_number", Some(&self.part_number))?;
        check_text("part_name", Some(&self.part_name))?;
        check_text("status", Some(&self.status))
    }
}

/// Request to update a part. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdatePartRequest {
    pub part_number: Option<String>,
    pub part_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub status: Option<String>,
    pub equipment: Option<Vec<EquipmentId>>,
    pub suppliers: Option<Vec<VendorId>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<uuid::Uuid>)]
    pub vendor: Option<Option<VendorId>>,
    pub is_active: Option<bool>,
}

impl Validate for UpdatePartRequest {
    fn validate(&self) -> Result<(), String> {
        check_text("part_number", self.part_number.as_deref())?;
        check_text("part_name", self.part_name.as_deref())?;
        check_text("status", self.status.as_deref())
    }
}

/// Build the parts router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/parts", get(list_parts).post(create_part))
        .route(
            "/v1/parts/:id",
            get(get_part).put(update_part).delete(delete_part),
        )
}

fn check_links(
    state: &AppState,
    equipment: &[EquipmentId],
    suppliers: &[VendorId],
    vendor: Option<VendorId>,
) -> Result<(), AppError> {
    if let Some(missing) = equipment.iter().find(|id| !state.equipment.contains(id)) {
        return Err(AppError::Validation(format!(
            "equipment {missing} does not exist"
        )));
    }
    for id in suppliers.iter().copied().chain(vendor) {
        require_vendor(state, id)?;
    }
    Ok(())
}

fn dedup<T: PartialEq + Copy>(ids: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// GET /v1/parts — List active parts.
#[utoipa::path(
    get,
    path = "/v1/parts",
    responses(
        (status = 200, description = "Active parts, ordered by name", body = Vec<PartView>),
    ),
    tag = "parts"
)]
async fn list_parts(State(state): State<AppState>) -> Json<Vec<PartView>> {
    let mut parts = state.parts.filter(|p| p.is_active);
    parts.sort_by(|a, b| a.part_name.cmp(&b.part_name).then(a.id.cmp(&b.id)));
    Json(
        parts
            .into_iter()
            .map(|p| PartView::build(&state, p))
            .collect(),
    )
}

/// POST /v1/parts — Create a part.
#[utoipa::path(
    post,
    path = "/v1/parts",
    request_body = CreatePartRequest,
    responses(
        (status = 201, description = "Part created", body = PartView),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "parts"
)]
async fn create_part(
    State(state): State<AppState>,
    body: Result<Json<CreatePartRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PartView>), AppError> {
    let req = extract_validated_json(body)?;
    check_links(&state, &req.equipment, &req.suppliers, req.vendor)?;

    let record = Part {
        id: PartId::new(),
        part_number: req.part_number.trim().to_string(),
        part_name: req.part_name.trim().to_string(),
        description: req.description,
        status: req.status.trim().to_string(),
        last_updated: state.clock.now(),
        equipment: dedup(req.equipment),
        suppliers: dedup(req.suppliers),
        vendor: req.vendor,
        is_active: req.is_active,
    };

    state.parts.insert(record.id, record.clone());

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::parts::insert(pool, &record).await {
            state.parts.remove(&record.id);
            return Err(persist_failed("part", record.id, e));
        }
    }

    Ok((StatusCode::CREATED, Json(PartView::build(&state, record))))
}

/// GET /v1/parts/:id — Get a part.
#[utoipa::path(
    get,
    path = "/v1/parts/{id}",
    params(("id" = Uuid, Path, description = "Part ID")),
    responses(
        (status = 200, description = "Part found", body = PartView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "parts"
)]
async fn get_part(
    State(state): State<AppState>,
    Path(id): Path<PartId>,
) -> Result<Json<PartView>, AppError> {
    let part = state
        .parts
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("part {id} not found")))?;
    Ok(Json(PartView::build(&state, part)))
}

/// PUT /v1/parts/:id — Update a part.
#[utoipa::path(
    put,
    path = "/v1/parts/{id}",
    params(("id" = Uuid, Path, description = "Part ID")),
    request_body = UpdatePartRequest,
    responses(
        (status = 200, description = "Part updated", body = PartView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "parts"
)]
async fn update_part(
    State(state): State<AppState>,
    Path(id): Path<PartId>,
    body: Result<Json<UpdatePartRequest>, JsonRejection>,
) -> Result<Json<PartView>, AppError> {
    let req = extract_validated_json(body)?;
    let before = state
        .parts
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("part {id} not found")))?;
    check_links(
        &state,
        req.equipment.as_deref().unwrap_or_default(),
        req.suppliers.as_deref().unwrap_or_default(),
        req.vendor.flatten(),
    )?;

    let now = state.clock.now();
    let updated = state
        .parts
        .update(&id, |p| {
            if let Some(v) = req.part_number {
                p.part_number = v.trim().to_string();
            }
            if let Some(v) = req.part_name {
                p.part_name = v.trim().to_string();
            }
            if let Some(v) = req.description {
                p.description = v;
            }
            if let Some(v) = req.status {
                p.status = v.trim().to_string();
            }
            if let Some(v) = req.equipment {
                p.equipment = dedup(v);
            }
            if let Some(v) = req.suppliers {
                p.suppliers = dedup(v);
            }
            if let Some(v) = req.vendor {
                p.vendor = v;
            }
            if let Some(v) = req.is_active {
                p.is_active = v;
            }
            p.last_updated = now;
        })
        .ok_or_else(|| AppError::NotFound(format!("part {id} not found")))?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::parts::update(pool, &updated).await {
            state.parts.insert(id, before);
            return Err(persist_failed("part", id, e));
        }
    }

    Ok(Json(PartView::build(&state, updated)))
}

/// DELETE /v1/parts/:id — Delete a part.
#[utoipa::path(
    delete,
    path = "/v1/parts/{id}",
    params(("id" = Uuid, Path, description = "Part ID")),
    responses(
        (status = 204, description = "Part deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "parts"
)]
async fn delete_part(
    State(state): State<AppState>,
    Path(id): Path<PartId>,
) -> Result<StatusCode, AppError> {
    if !state.parts.contains(&id) {
        return Err(AppError::NotFound(format!("part {id} not found")));
    }
    if let Some(pool) = &state.db_pool {
        crate::db::parts::delete(pool, id)
            .await
            .map_err(|e| persist_failed("part", id, e))?;
    }
    state.parts.remove(&id);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        assert_eq!(dedup(vec![3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }

    #[test]
    fn create_request_requires_identifying_text() {
        let req: CreatePartRequest = serde_json::from_value(serde_json::json!({
            "part_number": "F-100",
            "part_name": "",
            "status": "in stock"
        }))
        .unwrap();
        let err = req.validate().unwrap_err();
        assert!(err.contains("part_name"), "got: {err}");
    }

    #[test]
    fn unknown_supplier_is_rejected() {
        let state = AppState::new();
        let err = check_links(&state, &[], &[VendorId::new()], None).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
