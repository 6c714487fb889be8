//! # Closed Enumerations
//!
//! Every choice field in the CMMS data model is a closed enum. Serde
//! rejects unknown strings at the API boundary, and `FromStr` rejects them
//! with a [`ValidationError`] for CLI and database input, so the recurrence
//! engine never sees an unrecognized frequency.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Recurrence period attached to a task.
///
/// A task without a frequency (`Option::None`) is a one-time task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// Every calendar day.
    Daily,
    /// Every seven days.
    Weekly,
    /// Same day of the next month, clamped to the month's last day.
    Monthly,
    /// Same day of the next year, clamped to February 28 off leap years.
    Yearly,
}

impl Frequency {
    /// All variants, in declaration order.
    pub const ALL: [Frequency; 4] = [Self::Daily, Self::Weekly, Self::Monthly, Self::Yearly];

    /// Return the wire representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority.
    Low,
    /// Medium priority (default).
    #[default]
    Medium,
    /// High priority.
    High,
}

impl Priority {
    /// Return the wire representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Kind of work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// Preventive or corrective maintenance.
    Maintenance,
    /// Instrument calibration.
    Calibration,
}

impl TaskType {
    /// Return the wire representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Maintenance => "maintenance",
            Self::Calibration => "calibration",
        }
    }
}

/// Where a piece of equipment currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum LocationStatus {
    /// On the premises (default).
    #[default]
    #[serde(rename = "in-house")]
    InHouse,
    /// Away for service or calibration; see `expected_return_date`.
    #[serde(rename = "off-site")]
    OffSite,
}

impl LocationStatus {
    /// Return the wire representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InHouse => "in-house",
            Self::OffSite => "off-site",
        }
    }
}

/// Lifecycle status of a scheduled occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    /// Not yet done (default).
    #[default]
    Pending,
    /// Done; the occurrence carries a completion date.
    Completed,
}

impl ScheduleStatus {
    /// Return the wire representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

macro_rules! str_enum_impls {
    ($ty:ident, $field:literal, [$($variant:ident),+ $(,)?]) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                const ALLOWED: &[&str] = &[$($ty::$variant.as_str()),+];
                let normalized = s.trim().to_ascii_lowercase();
                $(
                    if normalized == $ty::$variant.as_str() {
                        return Ok($ty::$variant);
                    }
                )+
                Err(ValidationError::InvalidChoice {
                    field: $field,
                    value: s.to_string(),
                    allowed: ALLOWED,
                })
            }
        }
    };
}

str_enum_impls!(Frequency, "frequency", [Daily, Weekly, Monthly, Yearly]);
str_enum_impls!(Priority, "priority", [Low, Medium, High]);
str_enum_impls!(TaskType, "task_type", [Maintenance, Calibration]);
str_enum_impls!(LocationStatus, "location_status", [InHouse, OffSite]);
str_enum_impls!(ScheduleStatus, "status", [Pending, Completed]);
