//! Vendor persistence operations on the `vendors` table.

use sqlx::PgPool;
use uuid::Uuid;

use cmms_core::{Vendor, VendorId};

/// Insert a new vendor.
pub async fn insert(pool: &PgPool, record: &Vendor) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO vendors (id, name, contact_info, address, is_active)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(record.id.as_uuid())
    .bind(&record.name)
    .bind(&record.contact_info)
    .bind(&record.address)
    .bind(record.is_active)
    .execute(pool)
    .await?;

    Ok(())
}

/// Overwrite every column of an existing vendor.
pub async fn update(pool: &PgPool, record: &Vendor) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE vendors SET name = $1, contact_info = $2, address = $3, is_active = $4
         WHERE id = $5",
    )
    .bind(&record.name)
    .bind(&record.contact_info)
    .bind(&record.address)
    .bind(record.is_active)
    .bind(record.id.as_uuid())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a vendor. Foreign keys null out equipment and part references
/// and drop supplier links.
pub async fn delete(pool: &PgPool, id: VendorId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM vendors WHERE id = $1")
        .bind(id.as_uuid())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Load all vendors on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Vendor>, sqlx::Error> {
    let rows = sqlx::query_as::<_, VendorRow>(
        "SELECT id, name, contact_info, address, is_active FROM vendors ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(VendorRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct VendorRow {
    id: Uuid,
    name: String,
    contact_info: Option<String>,
    address: Option<String>,
    is_active: bool,
}

impl VendorRow {
    fn into_record(self) -> Vendor {
        Vendor {
            id: VendorId::from_uuid(self.id),
            name: self.name,
            contact_info: self.contact_info,
            address: self.address,
            is_active: self.is_active,
        }
    }
}
