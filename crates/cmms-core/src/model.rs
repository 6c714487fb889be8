//! # Record Types
//!
//! The persisted records of the CMMS data model. These are plain data:
//! the invariants that span records (schedule completion, the equipment
//! tree) are enforced by `cmms-state`, not here.
//!
//! Every record round-trips through JSON losslessly; optional fields
//! default when absent so older payloads still load.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Frequency, LocationStatus, Priority, ScheduleStatus, TaskType};
use crate::identity::{EquipmentId, PartId, ScheduleId, TaskId, UserId, VendorId};

fn default_true() -> bool {
    true
}

/// A servicing company, manufacturer or parts supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Vendor {
    /// Record identifier.
    pub id: VendorId,
    /// Display name.
    pub name: String,
    /// Free-text contact details.
    #[serde(default)]
    pub contact_info: Option<String>,
    /// Postal address.
    #[serde(default)]
    pub address: Option<String>,
    /// Inactive vendors are hidden from the vendor listing.
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// A piece of equipment. Equipment forms a tree through `parent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Equipment {
    /// Record identifier.
    pub id: EquipmentId,
    /// Display name; siblings are ordered by it.
    pub name: String,
    /// Model designation.
    pub model: String,
    /// Serial number.
    pub serial: String,
    /// Optional free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Parent equipment, `None` for a root.
    #[serde(default)]
    pub parent: Option<EquipmentId>,
    /// Where the equipment currently is.
    #[serde(default)]
    pub location_status: LocationStatus,
    /// When off-site equipment is expected back.
    #[serde(default)]
    pub expected_return_date: Option<NaiveDate>,
    /// Vendor that services this equipment.
    #[serde(default)]
    pub vendor: Option<VendorId>,
    /// Vendor that manufactured this equipment.
    #[serde(default)]
    pub manufacturer: Option<VendorId>,
    /// Inactive equipment is hidden from detail lookups.
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// A spare part, linked to the equipment it fits and the vendors supplying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Part {
    /// Record identifier.
    pub id: PartId,
    /// Manufacturer part number.
    pub part_number: String,
    /// Human-readable part name.
    pub part_name: String,
    /// Optional free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Free-text stock status.
    pub status: String,
    /// Stamped on every write.
    pub last_updated: DateTime<Utc>,
    /// Equipment this part fits.
    #[serde(default)]
    pub equipment: Vec<EquipmentId>,
    /// Vendors supplying this part.
    #[serde(default)]
    pub suppliers: Vec<VendorId>,
    /// Preferred vendor.
    #[serde(default)]
    pub vendor: Option<VendorId>,
    /// Inactive parts are hidden from the part listing.
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// A maintenance or calibration task on one piece of equipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Task {
    /// Record identifier.
    pub id: TaskId,
    /// What has to be done.
    pub description: String,
    /// Recurrence period; `None` for a one-time task.
    #[serde(default)]
    pub frequency: Option<Frequency>,
    /// Equipment the task applies to.
    pub equipment: EquipmentId,
    /// First day the task applies.
    pub start_date: NaiveDate,
    /// Kind of work.
    pub task_type: TaskType,
    /// Priority.
    #[serde(default)]
    pub priority: Priority,
    /// Assignee.
    #[serde(default)]
    pub assigned_to: Option<UserId>,
}

/// One scheduled occurrence of a task.
///
/// `completion_date` is set if and only if `status` is
/// [`ScheduleStatus::Completed`]. Only the recurrence engine sets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Schedule {
    /// Record identifier.
    pub id: ScheduleId,
    /// Owning task.
    pub task: TaskId,
    /// Day the occurrence is due.
    pub due_date: NaiveDate,
    /// Day the occurrence was completed.
    #[serde(default)]
    pub completion_date: Option<NaiveDate>,
    /// Lifecycle status.
    #[serde(default)]
    pub status: ScheduleStatus,
    /// Free-text history notes.
    #[serde(default)]
    pub history_log: String,
}

impl Schedule {
    /// A fresh pending occurrence of `task` due on `due_date`.
    pub fn pending(task: TaskId, due_date: NaiveDate) -> Self {
        Self {
            id: ScheduleId::new(),
            task,
            due_date,
            completion_date: None,
            status: ScheduleStatus::Pending,
            history_log: String::new(),
        }
    }

    /// Whether the completion stamp has already been applied.
    pub fn is_completed(&self) -> bool {
        self.completion_date.is_some()
    }
}

/// A user account tasks can be assigned to. Accounts are provisioned
/// outside this service; the API only lists them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct User {
    /// Record identifier.
    pub id: UserId,
    /// Login name.
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn pending_schedule_has_no_completion() {
        let s = Schedule::pending(TaskId::new(), date(2025, 1, 15));
        assert_eq!(s.status, ScheduleStatus::Pending);
        assert!(s.completion_date.is_none());
        assert!(s.history_log.is_empty());
        assert!(!s.is_completed());
    }

    #[test]
    fn schedule_round_trips_through_json() {
        let mut s = Schedule::pending(TaskId::new(), date(2025, 1, 15));
        s.status = ScheduleStatus::Completed;
        s.completion_date = Some(date(2025, 1, 16));
        s.history_log = "replaced filter".to_string();
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["due_date"], "2025-01-15");
        assert_eq!(json["status"], "completed");
        let back: Schedule = serde_json::from_value(json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn task_defaults_apply_when_fields_absent() {
        let json = serde_json::json!({
            "id": TaskId::new(),
            "description": "Inspect belts",
            "equipment": EquipmentId::new(),
            "start_date": "2025-03-01",
            "task_type": "maintenance"
        });
        let task: Task = serde_json::from_value(json).unwrap();
        assert_eq!(task.frequency, None);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.assigned_to, None);
    }

    #[test]
    fn equipment_defaults_apply_when_fields_absent() {
        let json = serde_json::json!({
            "id": EquipmentId::new(),
            "name": "Chiller",
            "model": "CH-100",
            "serial": "SN-1"
        });
        let eq: Equipment = serde_json::from_value(json).unwrap();
        assert!(eq.is_active);
        assert_eq!(eq.location_status, LocationStatus::InHouse);
        assert!(eq.parent.is_none());
    }

    #[test]
    fn vendor_round_trips_through_json() {
        let vendor = Vendor {
            id: VendorId::new(),
            name: "Acme Service".to_string(),
            contact_info: Some("ops@acme.test".to_string()),
            address: None,
            is_active: false,
        };
        let back: Vendor =
            serde_json::from_str(&serde_json::to_string(&vendor).unwrap()).unwrap();
        assert_eq!(back, vendor);
    }
}
