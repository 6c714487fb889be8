//! Schedule persistence operations on the `schedules` table.
//!
//! Completion is the one multi-row write: the completed row and its
//! successor are written in a single transaction, after locking the row
//! and re-checking that nobody completed it first.

use chrono::NaiveDate;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use cmms_core::{Schedule, ScheduleId, ScheduleStatus, TaskId};

use super::parse_stored;

/// Insert a new schedule.
pub async fn insert(pool: &PgPool, record: &Schedule) -> Result<(), sqlx::Error> {
    insert_row(pool, record).await
}

async fn insert_row<'e>(executor: impl PgExecutor<'e>, record: &Schedule) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO schedules (id, task_id, due_date, completion_date, status, history_log)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(record.id.as_uuid())
    .bind(record.task.as_uuid())
    .bind(record.due_date)
    .bind(record.completion_date)
    .bind(record.status.as_str())
    .bind(&record.history_log)
    .execute(executor)
    .await?;

    Ok(())
}

/// Write the editable fields of a schedule without touching its status or
/// completion date.
pub async fn update_details(pool: &PgPool, record: &Schedule) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE schedules SET due_date = $1, history_log = $2 WHERE id = $3")
        .bind(record.due_date)
        .bind(&record.history_log)
        .bind(record.id.as_uuid())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Persist a completion and its successor atomically.
///
/// Returns `Ok(false)` without writing anything if the stored row is
/// already completed, and `RowNotFound` if it does not exist.
pub async fn complete(
    pool: &PgPool,
    record: &Schedule,
    successor: Option<&Schedule>,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let stored: Option<String> =
        sqlx::query_scalar("SELECT status FROM schedules WHERE id = $1 FOR UPDATE")
            .bind(record.id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;
    match stored.as_deref() {
        None => return Err(sqlx::Error::RowNotFound),
        Some(status) if status == ScheduleStatus::Completed.as_str() => {
            tx.rollback().await?;
            return Ok(false);
        }
        Some(_) => {}
    }

    sqlx::query(
        "UPDATE schedules SET due_date = $1, completion_date = $2, status = $3, history_log = $4
         WHERE id = $5",
    )
    .bind(record.due_date)
    .bind(record.completion_date)
    .bind(record.status.as_str())
    .bind(&record.history_log)
    .bind(record.id.as_uuid())
    .execute(&mut *tx)
    .await?;

    if let Some(next) = successor {
        insert_row(&mut *tx, next).await?;
    }

    tx.commit().await?;
    Ok(true)
}

/// Delete a schedule.
pub async fn delete(pool: &PgPool, id: ScheduleId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM schedules WHERE id = $1")
        .bind(id.as_uuid())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Fetch a schedule by ID.
pub async fn get_by_id(pool: &PgPool, id: ScheduleId) -> Result<Option<Schedule>, sqlx::Error> {
    let row = sqlx::query_as::<_, ScheduleRow>(
        "SELECT id, task_id, due_date, completion_date, status, history_log
         FROM schedules WHERE id = $1",
    )
    .bind(id.as_uuid())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(ScheduleRow::into_record))
}

/// Load all schedules on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Schedule>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ScheduleRow>(
        "SELECT id, task_id, due_date, completion_date, status, history_log
         FROM schedules ORDER BY due_date",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ScheduleRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct ScheduleRow {
    id: Uuid,
    task_id: Uuid,
    due_date: NaiveDate,
    completion_date: Option<NaiveDate>,
    status: String,
    history_log: String,
}

impl ScheduleRow {
    fn into_record(self) -> Schedule {
        let status = parse_stored(
            "schedules",
            self.id,
            "status",
            &self.status,
            ScheduleStatus::Pending,
        );
        Schedule {
            id: ScheduleId::from_uuid(self.id),
            task: TaskId::from_uuid(self.task_id),
            due_date: self.due_date,
            completion_date: self.completion_date,
            status,
            history_log: self.history_log,
        }
    }
}
