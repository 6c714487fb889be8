//! # Vendor API
//!
//! Vendors are servicing companies, manufacturers and part suppliers.
//! Deleting a vendor clears every reference to it: equipment `vendor` and
//! `manufacturer`, part `vendor`, and part supplier lists.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use cmms_core::{Vendor, VendorId};

use crate::error::AppError;
use crate::extractors::{check_text, extract_validated_json, nullable, Validate};
use crate::routes::persist_failed;
use crate::state::AppState;

fn default_true() -> bool {
    true
}

/// Request to create a vendor.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateVendorRequest {
    pub name: String,
    pub contact_info: Option<String>,
    pub address: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Validate for CreateVendorRequest {
    fn validate(&self) -> Result<(), String> {
        check_text("name", Some(&self.name))
    }
}

/// Request to update a vendor. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateVendorRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub contact_info: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub address: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl Validate for UpdateVendorRequest {
    fn validate(&self) -> Result<(), String> {
        check_text("name", self.name.as_deref())
    }
}

impl UpdateVendorRequest {
    fn apply(self, vendor: &mut Vendor) {
        if let Some(name) = self.name {
            vendor.name = name.trim().to_string();
        }
        if let Some(contact_info) = self.contact_info {
            vendor.contact_info = contact_info;
        }
        if let Some(address) = self.address {
            vendor.address = address;
        }
        if let Some(is_active) = self.is_active {
            vendor.is_active = is_active;
        }
    }
}

/// Build the vendors router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/vendors", get(list_vendors).post(create_vendor))
        .route(
            "/v1/vendors/:id",
            get(get_vendor).put(update_vendor).delete(delete_vendor),
        )
}

/// Resolve a vendor id to its record, or fail with 422.
pub(crate) fn require_vendor(state: &AppState, id: VendorId) -> Result<Vendor, AppError> {
    state
        .vendors
        .get(&id)
        .ok_or_else(|| AppError::Validation(format!("vendor {id} does not exist")))
}

/// GET /v1/vendors — List active vendors.
#[utoipa::path(
    get,
    path = "/v1/vendors",
    responses(
        (status = 200, description = "Active vendors, ordered by name", body = Vec<Vendor>),
    ),
    tag = "vendors"
)]
async fn list_vendors(State(state): State<AppState>) -> Json<Vec<Vendor>> {
    let mut vendors = state.vendors.filter(|v| v.is_active);
    vendors.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    Json(vendors)
}

/// POST /v1/vendors — Create a vendor.
#[utoipa::path(
    post,
    path = "/v1/vendors",
    request_body = CreateVendorRequest,
    responses(
        (status = 201, description = "Vendor created", body = Vendor),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "vendors"
)]
async fn create_vendor(
    State(state): State<AppState>,
    body: Result<Json<CreateVendorRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Vendor>), AppError> {
    let req = extract_validated_json(body)?;
    let record = Vendor {
        id: VendorId::new(),
        name: req.name.trim().to_string(),
        contact_info: req.contact_info,
        address: req.address,
        is_active: req.is_active,
    };

    state.vendors.insert(record.id, record.clone());

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::vendors::insert(pool, &record).await {
            state.vendors.remove(&record.id);
            return Err(persist_failed("vendor", record.id, e));
        }
    }

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /v1/vendors/:id — Get a vendor.
#[utoipa::path(
    get,
    path = "/v1/vendors/{id}",
    params(("id" = Uuid, Path, description = "Vendor ID")),
    responses(
        (status = 200, description = "Vendor found", body = Vendor),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "vendors"
)]
async fn get_vendor(
    State(state): State<AppState>,
    Path(id): Path<VendorId>,
) -> Result<Json<Vendor>, AppError> {
    state
        .vendors
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("vendor {id} not found")))
}

/// PUT /v1/vendors/:id — Update a vendor.
#[utoipa::path(
    put,
    path = "/v1/vendors/{id}",
    params(("id" = Uuid, Path, description = "Vendor ID")),
    request_body = UpdateVendorRequest,
    responses(
        (status = 200, description = "Vendor updated", body = Vendor),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "vendors"
)]
async fn update_vendor(
    State(state): State<AppState>,
    Path(id): Path<VendorId>,
    body: Result<Json<UpdateVendorRequest>, JsonRejection>,
) -> Result<Json<Vendor>, AppError> {
    let req = extract_validated_json(body)?;
    let before = state
        .vendors
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("vendor {id} not found")))?;

    let updated = state
        .vendors
        .update(&id, |v| req.apply(v))
        .ok_or_else(|| AppError::NotFound(format!("vendor {id} not found")))?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::vendors::update(pool, &updated).await {
            state.vendors.insert(id, before);
            return Err(persist_failed("vendor", id, e));
        }
    }

    Ok(Json(updated))
}

/// DELETE /v1/vendors/:id — Delete a vendor and clear references to it.
#[utoipa::path(
    delete,
    path = "/v1/vendors/{id}",
    params(("id" = Uuid, Path, description = "Vendor ID")),
    responses(
        (status = 204, description = "Vendor deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "vendors"
)]
async fn delete_vendor(
    State(state): State<AppState>,
    Path(id): Path<VendorId>,
) -> Result<StatusCode, AppError> {
    if !state.vendors.contains(&id) {
        return Err(AppError::NotFound(format!("vendor {id} not found")));
    }

    // The database clears references through its foreign keys; delete
    // there first so a failure leaves both sides untouched.
    if let Some(pool) = &state.db_pool {
        crate::db::vendors::delete(pool, id)
            .await
            .map_err(|e| persist_failed("vendor", id, e))?;
    }

    state.vendors.remove(&id);
    state.equipment.update_all(|e| {
        if e.vendor == Some(id) {
            e.vendor = None;
        }
        if e.manufacturer == Some(id) {
            e.manufacturer = None;
        }
    });
    state.parts.update_all(|p| {
        if p.vendor == Some(id) {
            p.vendor = None;
        }
        p.suppliers.retain(|s| *s != id);
    });

    tracing::info!(vendor_id = %id, "vendor deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_defaults_to_active() {
        let req: CreateVendorRequest =
            serde_json::from_value(serde_json::json!({ "name": "Acme" })).unwrap();
        assert!(req.is_active);
        assert!(req.contact_info.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn blank_name_is_rejected() {
        let req: CreateVendorRequest =
            serde_json::from_value(serde_json::json!({ "name": "  " })).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn update_clears_nullable_fields_only_when_null() {
        let mut vendor = Vendor {
            id: VendorId::new(),
            name: "Acme".into(),
            contact_info: Some("ops@acme.test".into()),
            address: Some("1 Main St".into()),
            is_active: true,
        };
        let req: UpdateVendorRequest =
            serde_json::from_value(serde_json::json!({ "contact_info": null })).unwrap();
        req.apply(&mut vendor);
        assert_eq!(vendor.contact_info, None);
        assert_eq!(vendor.address.as_deref(), Some("1 Main St"));
        assert_eq!(vendor.name, "Acme");
    }
}
