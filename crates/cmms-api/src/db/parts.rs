//! Part persistence operations.
//!
//! A part row lives in `parts`; its equipment links and suppliers live in
//! the `part_equipment` and `part_suppliers` join tables, ordered by
//! `position`. Writes replace the link rows inside the same transaction
//! as the part row.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use cmms_core::{EquipmentId, Part, PartId, VendorId};

/// Insert a new part with its links.
pub async fn insert(pool: &PgPool, record: &Part) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO parts (id, part_number, part_name, description, status, last_updated,
                            vendor_id, is_active)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(record.id.as_uuid())
    .bind(&record.part_number)
    .bind(&record.part_name)
    .bind(&record.description)
    .bind(&record.status)
    .bind(record.last_updated)
    .bind(record.vendor.map(|v| *v.as_uuid()))
    .bind(record.is_active)
    .execute(&mut *tx)
    .await?;

    write_links(&mut tx, record).await?;
    tx.commit().await?;
    Ok(())
}

/// Overwrite a part and replace its links.
pub async fn update(pool: &PgPool, record: &Part) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE parts SET part_number = $1, part_name = $2, description = $3, status = $4,
                last_updated = $5, vendor_id = $6, is_active = $7
         WHERE id = $8",
    )
    .bind(&record.part_number)
    .bind(&record.part_name)
    .bind(&record.description)
    .bind(&record.status)
    .bind(record.last_updated)
    .bind(record.vendor.map(|v| *v.as_uuid()))
    .bind(record.is_active)
    .bind(record.id.as_uuid())
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query("DELETE FROM part_equipment WHERE part_id = $1")
        .bind(record.id.as_uuid())
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM part_suppliers WHERE part_id = $1")
        .bind(record.id.as_uuid())
        .execute(&mut *tx)
        .await?;
    write_links(&mut tx, record).await?;

    tx.commit().await?;
    Ok(true)
}

/// Delete a part; its link rows go with it.
pub async fn delete(pool: &PgPool, id: PartId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM parts WHERE id = $1")
        .bind(id.as_uuid())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Load all parts with their links on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Part>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PartRow>(
        "SELECT id, part_number, part_name, description, status, last_updated, vendor_id, is_active
         FROM parts ORDER BY part_name",
    )
    .fetch_all(pool)
    .await?;

    let mut equipment: HashMap<Uuid, Vec<EquipmentId>> = HashMap::new();
    for link in sqlx::query_as::<_, LinkRow>(
        "SELECT part_id, equipment_id AS target_id FROM part_equipment ORDER BY part_id, position",
    )
    .fetch_all(pool)
    .await?
    {
        equipment
            .entry(link.part_id)
            .or_default()
            .push(EquipmentId::from_uuid(link.target_id));
    }

    let mut suppliers: HashMap<Uuid, Vec<VendorId>> = HashMap::new();
    for link in sqlx::query_as::<_, LinkRow>(
        "SELECT part_id, vendor_id AS target_id FROM part_suppliers ORDER BY part_id, position",
    )
    .fetch_all(pool)
    .await?
    {
        suppliers
            .entry(link.part_id)
            .or_default()
            .push(VendorId::from_uuid(link.target_id));
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let equipment = equipment.remove(&row.id).unwrap_or_default();
            let suppliers = suppliers.remove(&row.id).unwrap_or_default();
            row.into_record(equipment, suppliers)
        })
        .collect())
}

async fn write_links(tx: &mut Transaction<'_, Postgres>, record: &Part) -> Result<(), sqlx::Error> {
    for (position, eq) in record.equipment.iter().enumerate() {
        sqlx::query(
            "INSERT INTO part_equipment (part_id, equipment_id, position) VALUES ($1, $2, $3)",
        )
        .bind(record.id.as_uuid())
        .bind(eq.as_uuid())
        .bind(position as i32)
        .execute(&mut **tx)
        .await?;
    }
    for (position, vendor) in record.suppliers.iter().enumerate() {
        sqlx::query(
            "INSERT INTO part_suppliers (part_id, vendor_id, position) VALUES ($1, $2, $3)",
        )
        .bind(record.id.as_uuid())
        .bind(vendor.as_uuid())
        .bind(position as i32)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[derive(sqlx::FromRow)]
struct PartRow {
    id: Uuid,
    part_number: String,
    part_name: String,
    description: Option<String>,
    status: String,
    last_updated: DateTime<Utc>,
    vendor_id: Option<Uuid>,
    is_active: bool,
}

#[derive(sqlx::FromRow)]
struct LinkRow {
    part_id: Uuid,
    target_id: Uuid,
}

impl PartRow {
    fn into_record(self, equipment: Vec<EquipmentId>, suppliers: Vec<VendorId>) -> Part {
        Part {
            id: PartId::from_uuid(self.id),
            part_number: self.part_number,
            part_name: self.part_name,
            description: self.description,
            status: self.status,
            last_updated: self.last_updated,
            equipment,
            suppliers,
            vendor: self.vendor_id.map(VendorId::from_uuid),
            is_active: self.is_active,
        }
    }
}
