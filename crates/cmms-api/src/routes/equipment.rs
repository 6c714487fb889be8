//! # Equipment API
//!
//! Equipment records live in the equipment store; their structure lives in
//! the [`EquipmentTree`] next to it. Every write that touches structure
//! (create, move, rename, delete) runs under `equipment_writes`, changes
//! the tree and the store together, persists, and reverts both if the
//! database write fails.
//!
//! ## Views
//!
//! - `GET /v1/equipment` returns the roots, each with its whole subtree
//!   nested under `children` (siblings ordered by name).
//! - `GET /v1/equipment/:id` returns one active node with its subtree, its
//!   parts, and its parent and manufacturer expanded.
//!
//! A move that would place a node under itself or one of its descendants
//! is rejected with 422 and leaves everything unchanged.

use std::collections::{HashMap, HashSet};

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use cmms_core::{Equipment, EquipmentId, LocationStatus, Vendor, VendorId};
use cmms_state::{EquipmentTree, HierarchyError, TreePosition};

use crate::error::AppError;
use crate::extractors::{check_text, extract_validated_json, nullable, Validate};
use crate::routes::parts::PartView;
use crate::routes::persist_failed;
use crate::routes::vendors::require_vendor;
use crate::state::AppState;

fn default_true() -> bool {
    true
}

/// Short form of an equipment record, used for `parent_details`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EquipmentSummary {
    pub id: EquipmentId,
    pub name: String,
    pub model: String,
    pub serial: String,
    pub parent: Option<EquipmentId>,
}

/// An equipment node with its relations expanded and its subtree nested.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EquipmentView {
    pub id: EquipmentId,
    pub name: String,
    pub model: String,
    pub serial: String,
    pub description: Option<String>,
    pub parent: Option<EquipmentId>,
    pub parent_details: Option<EquipmentSummary>,
    pub location_status: LocationStatus,
    pub expected_return_date: Option<NaiveDate>,
    /// Servicing vendor, expanded.
    pub vendor: Option<Vendor>,
    pub manufacturer: Option<VendorId>,
    pub manufacturer_details: Option<Vendor>,
    pub is_active: bool,
    /// Nested-set coordinates in the equipment tree.
    #[schema(value_type = Option<Object>)]
    pub tree: Option<TreePosition>,
    /// Direct children, ordered by name, each with its own subtree.
    pub children: Vec<EquipmentView>,
    /// Parts that fit this equipment.
    pub parts: Vec<PartView>,
}

/// Request to create a piece of equipment.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateEquipmentRequest {
    pub name: String,
    pub model: String,
    pub serial: String,
    pub description: Option<String>,
    pub parent: Option<EquipmentId>,
    #[serde(default)]
    pub location_status: LocationStatus,
    pub expected_return_date: Option<NaiveDate>,
    pub vendor: Option<VendorId>,
    pub manufacturer: Option<VendorId>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Validate for CreateEquipmentRequest {
    fn validate(&self) -> Result<(), String> {
        check_text("name", Some(&self.name))?;
        check_text("model", Some(&self.model))?;
        check_text("serial", Some(&self.serial))
    }
}

/// Request to update a piece of equipment. Absent fields are left
/// unchanged; `"parent": null` makes the node a root.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateEquipmentRequest {
    pub name: Option<String>,
    pub model: Option<String>,
    pub serial: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<uuid::Uuid>)]
    pub parent: Option<Option<EquipmentId>>,
    pub location_status: Option<LocationStatus>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<NaiveDate>)]
    pub expected_return_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<uuid::Uuid>)]
    pub vendor: Option<Option<VendorId>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<uuid::Uuid>)]
    pub manufacturer: Option<Option<VendorId>>,
    pub is_active: Option<bool>,
}

impl Validate for UpdateEquipmentRequest {
    fn validate(&self) -> Result<(), String> {
        check_text("name", self.name.as_deref())?;
        check_text("model", self.model.as_deref())?;
        check_text("serial", self.serial.as_deref())
    }
}

impl UpdateEquipmentRequest {
    fn apply(self, e: &mut Equipment) {
        if let Some(v) = self.name {
            e.name = v.trim().to_string();
        }
        if let Some(v) = self.model {
            e.model = v.trim().to_string();
        }
        if let Some(v) = self.serial {
            e.serial = v.trim().to_string();
        }
        if let Some(v) = self.description {
            e.description = v;
        }
        if let Some(v) = self.parent {
            e.parent = v;
        }
        if let Some(v) = self.location_status {
            e.location_status = v;
        }
        if let Some(v) = self.expected_return_date {
            e.expected_return_date = v;
        }
        if let Some(v) = self.vendor {
            e.vendor = v;
        }
        if let Some(v) = self.manufacturer {
            e.manufacturer = v;
        }
        if let Some(v) = self.is_active {
            e.is_active = v;
        }
    }
}

/// Build the equipment router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/equipment", get(list_equipment).post(create_equipment))
        .route(
            "/v1/equipment/:id",
            get(get_equipment)
                .put(update_equipment)
                .delete(delete_equipment),
        )
}

// -- View assembly ------------------------------------------------------------

struct ViewContext<'a> {
    state: &'a AppState,
    tree: &'a EquipmentTree,
    parts: HashMap<EquipmentId, Vec<PartView>>,
}

impl<'a> ViewContext<'a> {
    fn new(state: &'a AppState, tree: &'a EquipmentTree) -> Self {
        let mut parts: HashMap<EquipmentId, Vec<PartView>> = HashMap::new();
        let mut all = state.parts.list();
        all.sort_by(|a, b| a.part_name.cmp(&b.part_name).then(a.id.cmp(&b.id)));
        for part in all {
            let view = PartView::build(state, part);
            for eq in &view.part.equipment {
                parts.entry(*eq).or_default().push(view.clone());
            }
        }
        Self { state, tree, parts }
    }

    fn vendor(&self, id: Option<VendorId>) -> Option<Vendor> {
        id.and_then(|id| self.state.vendors.get(&id))
    }

    fn build(&self, id: EquipmentId) -> Option<EquipmentView> {
        let record = self.state.equipment.get(&id)?;
        let parent_details = record
            .parent
            .and_then(|p| self.state.equipment.get(&p))
            .map(|p| EquipmentSummary {
                id: p.id,
                name: p.name,
                model: p.model,
                serial: p.serial,
                parent: p.parent,
            });
        let children = self
            .tree
            .children(id)
            .iter()
            .filter_map(|&child| self.build(child))
            .collect();
        Some(EquipmentView {
            id,
            vendor: self.vendor(record.vendor),
            manufacturer_details: self.vendor(record.manufacturer),
            name: record.name,
            model: record.model,
            serial: record.serial,
            description: record.description,
            parent: record.parent,
            parent_details,
            location_status: record.location_status,
            expected_return_date: record.expected_return_date,
            manufacturer: record.manufacturer,
            is_active: record.is_active,
            tree: self.tree.position(id),
            children,
            parts: self.parts.get(&id).cloned().unwrap_or_default(),
        })
    }
}

fn build_view(state: &AppState, id: EquipmentId) -> Result<EquipmentView, AppError> {
    let tree = state.equipment_tree.read();
    ViewContext::new(state, &tree)
        .build(id)
        .ok_or_else(|| AppError::NotFound(format!("equipment {id} not found")))
}

fn check_vendors(
    state: &AppState,
    vendor: Option<VendorId>,
    manufacturer: Option<VendorId>,
) -> Result<(), AppError> {
    for id in vendor.into_iter().chain(manufacturer) {
        require_vendor(state, id)?;
    }
    Ok(())
}

fn active_equipment(state: &AppState, id: EquipmentId) -> Result<Equipment, AppError> {
    state
        .equipment
        .get(&id)
        .filter(|e| e.is_active)
        .ok_or_else(|| AppError::NotFound(format!("equipment {id} not found")))
}

// -- Handlers -----------------------------------------------------------------

/// GET /v1/equipment — List root equipment with nested subtrees.
#[utoipa::path(
    get,
    path = "/v1/equipment",
    responses(
        (status = 200, description = "Root equipment, ordered by name", body = Vec<EquipmentView>),
    ),
    tag = "equipment"
)]
async fn list_equipment(State(state): State<AppState>) -> Json<Vec<EquipmentView>> {
    let tree = state.equipment_tree.read();
    let ctx = ViewContext::new(&state, &tree);
    Json(
        tree.roots()
            .iter()
            .filter_map(|&root| ctx.build(root))
            .collect(),
    )
}

/// POST /v1/equipment — Create a piece of equipment.
#[utoipa::path(
    post,
    path = "/v1/equipment",
    request_body = CreateEquipmentRequest,
    responses(
        (status = 201, description = "Equipment created", body = EquipmentView),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "equipment"
)]
async fn create_equipment(
    State(state): State<AppState>,
    body: Result<Json<CreateEquipmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<EquipmentView>), AppError> {
    let req = extract_validated_json(body)?;
    check_vendors(&state, req.vendor, req.manufacturer)?;

    let record = Equipment {
        id: EquipmentId::new(),
        name: req.name.trim().to_string(),
        model: req.model.trim().to_string(),
        serial: req.serial.trim().to_string(),
        description: req.description,
        parent: req.parent,
        location_status: req.location_status,
        expected_return_date: req.expected_return_date,
        vendor: req.vendor,
        manufacturer: req.manufacturer,
        is_active: req.is_active,
    };

    let _writes = state.equipment_writes.lock().await;

    state
        .equipment_tree
        .write()
        .insert(record.id, record.name.clone(), record.parent)?;
    state.equipment.insert(record.id, record.clone());

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::equipment::insert(pool, &record).await {
            if let Err(revert) = state.equipment_tree.write().remove(record.id) {
                tracing::error!(equipment_id = %record.id, error = %revert, "failed to revert equipment insert");
            }
            state.equipment.remove(&record.id);
            return Err(persist_failed("equipment", record.id, e));
        }
    }

    tracing::info!(equipment_id = %record.id, parent = ?record.parent, "equipment created");
    Ok((StatusCode::CREATED, Json(build_view(&state, record.id)?)))
}

/// GET /v1/equipment/:id — Get one active piece of equipment with its subtree.
#[utoipa::path(
    get,
    path = "/v1/equipment/{id}",
    params(("id" = Uuid, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Equipment found", body = EquipmentView),
        (status = 404, description = "Not found or inactive", body = crate::error::ErrorBody),
    ),
    tag = "equipment"
)]
async fn get_equipment(
    State(state): State<AppState>,
    Path(id): Path<EquipmentId>,
) -> Result<Json<EquipmentView>, AppError> {
    active_equipment(&state, id)?;
    Ok(Json(build_view(&state, id)?))
}

/// PUT /v1/equipment/:id — Update equipment, possibly moving it in the tree.
#[utoipa::path(
    put,
    path = "/v1/equipment/{id}",
    params(("id" = Uuid, Path, description = "Equipment ID")),
    request_body = UpdateEquipmentRequest,
    responses(
        (status = 200, description = "Equipment updated", body = EquipmentView),
        (status = 404, description = "Not found or inactive", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid move or validation error", body = crate::error::ErrorBody),
    ),
    tag = "equipment"
)]
async fn update_equipment(
    State(state): State<AppState>,
    Path(id): Path<EquipmentId>,
    body: Result<Json<UpdateEquipmentRequest>, JsonRejection>,
) -> Result<Json<EquipmentView>, AppError> {
    let req = extract_validated_json(body)?;

    let _writes = state.equipment_writes.lock().await;

    let before = active_equipment(&state, id)?;
    let mut updated = before.clone();
    req.apply(&mut updated);
    check_vendors(&state, updated.vendor, updated.manufacturer)?;

    {
        let mut tree = state.equipment_tree.write();
        if updated.parent != before.parent {
            if let Err(e) = tree.set_parent(id, updated.parent) {
                if matches!(e, HierarchyError::Cycle { .. }) {
                    tracing::warn!(
                        equipment_id = %id,
                        parent = ?updated.parent,
                        "rejected equipment move into its own subtree"
                    );
                }
                return Err(e.into());
            }
        }
        if updated.name != before.name {
            tree.rename(id, updated.name.clone())?;
        }
    }
    state.equipment.insert(id, updated.clone());

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::equipment::update(pool, &updated).await {
            {
                let mut tree = state.equipment_tree.write();
                let reverted = tree
                    .set_parent(id, before.parent)
                    .and_then(|()| tree.rename(id, before.name.clone()));
                if let Err(revert) = reverted {
                    tracing::error!(equipment_id = %id, error = %revert, "failed to revert equipment move");
                }
            }
            state.equipment.insert(id, before);
            return Err(persist_failed("equipment", id, e));
        }
    }

    if updated.parent != before.parent {
        tracing::info!(
            equipment_id = %id,
            from = ?before.parent,
            to = ?updated.parent,
            "equipment moved"
        );
    }
    Ok(Json(build_view(&state, id)?))
}

/// DELETE /v1/equipment/:id — Delete equipment and its whole subtree.
///
/// Tasks on the removed equipment are deleted with their schedules, and
/// the removed ids are dropped from part links.
#[utoipa::path(
    delete,
    path = "/v1/equipment/{id}",
    params(("id" = Uuid, Path, description = "Equipment ID")),
    responses(
        (status = 204, description = "Equipment and subtree deleted"),
        (status = 404, description = "Not found or inactive", body = crate::error::ErrorBody),
    ),
    tag = "equipment"
)]
async fn delete_equipment(
    State(state): State<AppState>,
    Path(id): Path<EquipmentId>,
) -> Result<StatusCode, AppError> {
    let _writes = state.equipment_writes.lock().await;

    active_equipment(&state, id)?;

    if let Some(pool) = &state.db_pool {
        crate::db::equipment::delete(pool, id)
            .await
            .map_err(|e| persist_failed("equipment", id, e))?;
    }

    let removed: HashSet<EquipmentId> = state
        .equipment_tree
        .write()
        .remove(id)?
        .into_iter()
        .collect();
    for eq in &removed {
        state.equipment.remove(eq);
    }
    let tasks: HashSet<_> = state
        .tasks
        .remove_where(|t| removed.contains(&t.equipment))
        .into_iter()
        .map(|t| t.id)
        .collect();
    let schedules = state.schedules.remove_where(|s| tasks.contains(&s.task));
    state
        .parts
        .update_all(|p| p.equipment.retain(|eq| !removed.contains(eq)));

    tracing::info!(
        equipment_id = %id,
        equipment = removed.len(),
        tasks = tasks.len(),
        schedules = schedules.len(),
        "equipment subtree deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, parent: Option<EquipmentId>) -> Equipment {
        Equipment {
            id: EquipmentId::new(),
            name: name.to_string(),
            model: "M-1".to_string(),
            serial: "SN".to_string(),
            description: None,
            parent,
            location_status: LocationStatus::InHouse,
            expected_return_date: None,
            vendor: None,
            manufacturer: None,
            is_active: true,
        }
    }

    #[test]
    fn view_nests_children_in_name_order() {
        let state = AppState::new();
        let root = record("plant", None);
        let b = record("zone b", Some(root.id));
        let a = record("zone a", Some(root.id));
        state
            .load_equipment(vec![root.clone(), b.clone(), a.clone()])
            .unwrap();

        let view = build_view(&state, root.id).unwrap();
        let names: Vec<_> = view.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["zone a", "zone b"]);
        assert_eq!(view.tree.unwrap().level, 0);
        let child = &view.children[0];
        assert_eq!(child.parent_details.as_ref().unwrap().id, root.id);
        assert_eq!(child.tree.unwrap().level, 1);
    }

    #[test]
    fn update_request_tells_null_parent_from_absent() {
        let mut e = record("pump", Some(EquipmentId::new()));
        let keep: UpdateEquipmentRequest =
            serde_json::from_value(serde_json::json!({ "name": "pump 2" })).unwrap();
        keep.apply(&mut e);
        assert!(e.parent.is_some());
        assert_eq!(e.name, "pump 2");

        let detach: UpdateEquipmentRequest =
            serde_json::from_value(serde_json::json!({ "parent": null })).unwrap();
        detach.apply(&mut e);
        assert!(e.parent.is_none());
    }

    #[test]
    fn inactive_equipment_is_not_found() {
        let state = AppState::new();
        let mut e = record("retired", None);
        e.is_active = false;
        state.load_equipment(vec![e.clone()]).unwrap();
        assert!(matches!(
            active_equipment(&state, e.id),
            Err(AppError::NotFound(_))
        ));
    }
}
