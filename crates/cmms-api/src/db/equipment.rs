//! Equipment persistence operations on the `equipment` table.
//!
//! Only parent pointers are stored. Sibling order and the nested-set
//! index are rebuilt in memory from these rows on startup.

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use cmms_core::{Equipment, EquipmentId, LocationStatus, VendorId};

use super::parse_stored;

/// Insert a new piece of equipment. Its parent must already exist.
pub async fn insert(pool: &PgPool, record: &Equipment) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO equipment (id, name, model, serial, description, parent_id,
                                location_status, expected_return_date, vendor_id,
                                manufacturer_id, is_active)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(record.id.as_uuid())
    .bind(&record.name)
    .bind(&record.model)
    .bind(&record.serial)
    .bind(&record.description)
    .bind(record.parent.map(|p| *p.as_uuid()))
    .bind(record.location_status.as_str())
    .bind(record.expected_return_date)
    .bind(record.vendor.map(|v| *v.as_uuid()))
    .bind(record.manufacturer.map(|v| *v.as_uuid()))
    .bind(record.is_active)
    .execute(pool)
    .await?;

    Ok(())
}

/// Overwrite every column of an existing piece of equipment.
pub async fn update(pool: &PgPool, record: &Equipment) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE equipment SET name = $1, model = $2, serial = $3, description = $4,
                parent_id = $5, location_status = $6, expected_return_date = $7,
                vendor_id = $8, manufacturer_id = $9, is_active = $10
         WHERE id = $11",
    )
    .bind(&record.name)
    .bind(&record.model)
    .bind(&record.serial)
    .bind(&record.description)
    .bind(record.parent.map(|p| *p.as_uuid()))
    .bind(record.location_status.as_str())
    .bind(record.expected_return_date)
    .bind(record.vendor.map(|v| *v.as_uuid()))
    .bind(record.manufacturer.map(|v| *v.as_uuid()))
    .bind(record.is_active)
    .bind(record.id.as_uuid())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a piece of equipment. Foreign keys remove its subtree, the tasks
/// on every removed node with their schedules, and part links.
pub async fn delete(pool: &PgPool, id: EquipmentId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM equipment WHERE id = $1")
        .bind(id.as_uuid())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Load all equipment on startup, in no particular tree order.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Equipment>, sqlx::Error> {
    let rows = sqlx::query_as::<_, EquipmentRow>(
        "SELECT id, name, model, serial, description, parent_id, location_status,
                expected_return_date, vendor_id, manufacturer_id, is_active
         FROM equipment",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(EquipmentRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct EquipmentRow {
    id: Uuid,
    name: String,
    model: String,
    serial: String,
    description: Option<String>,
    parent_id: Option<Uuid>,
    location_status: String,
    expected_return_date: Option<NaiveDate>,
    vendor_id: Option<Uuid>,
    manufacturer_id: Option<Uuid>,
    is_active: bool,
}

impl EquipmentRow {
    fn into_record(self) -> Equipment {
        let location_status = parse_stored(
            "equipment",
            self.id,
            "location_status",
            &self.location_status,
            LocationStatus::InHouse,
        );
        Equipment {
            id: EquipmentId::from_uuid(self.id),
            name: self.name,
            model: self.model,
            serial: self.serial,
            description: self.description,
            parent: self.parent_id.map(EquipmentId::from_uuid),
            location_status,
            expected_return_date: self.expected_return_date,
            vendor: self.vendor_id.map(VendorId::from_uuid),
            manufacturer: self.manufacturer_id.map(VendorId::from_uuid),
            is_active: self.is_active,
        }
    }
}
