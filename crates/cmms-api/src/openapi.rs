//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "CMMS API",
        version = "0.1.0",
        description = "Maintenance management: vendors, the equipment hierarchy, spare parts, recurring tasks and their schedules."
    ),
    paths(
        // Vendors
        crate::routes::vendors::list_vendors,
        crate::routes::vendors::create_vendor,
        crate::routes::vendors::get_vendor,
        crate::routes::vendors::update_vendor,
        crate::routes::vendors::delete_vendor,
        // Equipment
        crate::routes::equipment::list_equipment,
        crate::routes::equipment::create_equipment,
        crate::routes::equipment::get_equipment,
        crate::routes::equipment::update_equipment,
        crate::routes::equipment::delete_equipment,
        // Parts
        crate::routes::parts::list_parts,
        crate::routes::parts::create_part,
        crate::routes::parts::get_part,
        crate::routes::parts::update_part,
        crate::routes::parts::delete_part,
        // Tasks
        crate::routes::tasks::list_tasks,
        crate::routes::tasks::create_task,
        crate::routes::tasks::get_task,
        crate::routes::tasks::update_task,
        crate::routes::tasks::delete_task,
        // Schedules
        crate::routes::schedules::list_schedules,
        crate::routes::schedules::create_schedule,
        crate::routes::schedules::get_schedule,
        crate::routes::schedules::update_schedule,
        crate::routes::schedules::complete_schedule,
        crate::routes::schedules::delete_schedule,
        // Users
        crate::routes::users::list_users,
        // Operations
        crate::middleware::metrics::metrics_report,
    ),
    components(schemas(
        // Records
        cmms_core::Vendor,
        cmms_core::Equipment,
        cmms_core::Part,
        cmms_core::Task,
        cmms_core::Schedule,
        cmms_core::User,
        // Identifiers
        cmms_core::VendorId,
        cmms_core::EquipmentId,
        cmms_core::PartId,
        cmms_core::TaskId,
        cmms_core::ScheduleId,
        cmms_core::UserId,
        // Enumerations
        cmms_core::Frequency,
        cmms_core::Priority,
        cmms_core::TaskType,
        cmms_core::LocationStatus,
        cmms_core::ScheduleStatus,
        // Views
        crate::routes::equipment::EquipmentView,
        crate::routes::equipment::EquipmentSummary,
        crate::routes::parts::PartView,
        crate::routes::schedules::ScheduleView,
        crate::routes::schedules::CompletionResponse,
        // Requests
        crate::routes::vendors::CreateVendorRequest,
        crate::routes::vendors::UpdateVendorRequest,
        crate::routes::equipment::CreateEquipmentRequest,
        crate::routes::equipment::UpdateEquipmentRequest,
        crate::routes::parts::CreatePartRequest,
        crate::routes::parts::UpdatePartRequest,
        crate::routes::tasks::CreateTaskRequest,
        crate::routes::tasks::UpdateTaskRequest,
        crate::routes::schedules::CreateScheduleRequest,
        crate::routes::schedules::UpdateScheduleRequest,
        // Errors and operations
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::middleware::metrics::MetricsSnapshot,
    )),
    tags(
        (name = "vendors", description = "Servicing companies, manufacturers and suppliers"),
        (name = "equipment", description = "Equipment hierarchy"),
        (name = "parts", description = "Spare parts"),
        (name = "tasks", description = "Maintenance and calibration tasks"),
        (name = "schedules", description = "Scheduled occurrences and completion"),
        (name = "users", description = "Assignable users"),
        (name = "operations", description = "Request metrics"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json — Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_documents_completion_and_tree_routes() {
        let spec = ApiDoc::openapi();
        let paths = &spec.paths.paths;
        assert!(paths.contains_key("/v1/schedules/{id}/complete"));
        assert!(paths.contains_key("/v1/equipment/{id}"));
        assert!(paths.contains_key("/v1/users"));
        assert!(paths.contains_key("/metrics"));
    }

    #[test]
    fn spec_registers_view_schemas() {
        let spec = ApiDoc::openapi();
        let schemas = &spec
            .components
            .as_ref()
            .expect("components present")
            .schemas;
        for name in ["EquipmentView", "ScheduleView", "CompletionResponse", "ErrorBody"] {
            assert!(schemas.contains_key(name), "missing schema {name}");
        }
    }
}
