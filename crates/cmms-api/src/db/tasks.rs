//! Task persistence operations on the `tasks` table.

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use cmms_core::{EquipmentId, Frequency, Priority, Task, TaskId, TaskType, UserId};

use super::parse_stored;

/// Insert a new task.
pub async fn insert(pool: &PgPool, record: &Task) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO tasks (id, description, frequency, equipment_id, start_date, task_type,
                            priority, assigned_to)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(record.id.as_uuid())
    .bind(&record.description)
    .bind(record.frequency.map(|f| f.as_str()))
    .bind(record.equipment.as_uuid())
    .bind(record.start_date)
    .bind(record.task_type.as_str())
    .bind(record.priority.as_str())
    .bind(record.assigned_to.map(|u| *u.as_uuid()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Overwrite every column of an existing task.
pub async fn update(pool: &PgPool, record: &Task) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE tasks SET description = $1, frequency = $2, equipment_id = $3, start_date = $4,
                task_type = $5, priority = $6, assigned_to = $7
         WHERE id = $8",
    )
    .bind(&record.description)
    .bind(record.frequency.map(|f| f.as_str()))
    .bind(record.equipment.as_uuid())
    .bind(record.start_date)
    .bind(record.task_type.as_str())
    .bind(record.priority.as_str())
    .bind(record.assigned_to.map(|u| *u.as_uuid()))
    .bind(record.id.as_uuid())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a task; its schedules go with it.
pub async fn delete(pool: &PgPool, id: TaskId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(id.as_uuid())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Load all tasks on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Task>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TaskRow>(
        "SELECT id, description, frequency, equipment_id, start_date, task_type, priority,
                assigned_to
         FROM tasks ORDER BY start_date",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(TaskRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    description: String,
    frequency: Option<String>,
    equipment_id: Uuid,
    start_date: NaiveDate,
    task_type: String,
    priority: String,
    assigned_to: Option<Uuid>,
}

impl TaskRow {
    fn into_record(self) -> Task {
        // An unreadable frequency degrades to a one-time task rather than
        // guessing a period.
        let frequency = self.frequency.as_deref().and_then(|value| {
            value
                .parse::<Frequency>()
                .map_err(|_| {
                    tracing::warn!(
                        id = %self.id,
                        value,
                        "unknown task frequency in database, treating as one-time"
                    );
                })
                .ok()
        });
        let task_type = parse_stored(
            "tasks",
            self.id,
            "task_type",
            &self.task_type,
            TaskType::Maintenance,
        );
        let priority = parse_stored("tasks", self.id, "priority", &self.priority, Priority::Medium);
        Task {
            id: TaskId::from_uuid(self.id),
            description: self.description,
            frequency,
            equipment: EquipmentId::from_uuid(self.equipment_id),
            start_date: self.start_date,
            task_type,
            priority,
            assigned_to: self.assigned_to.map(UserId::from_uuid),
        }
    }
}
