//! # Task API
//!
//! A task is a recurring (or one-time) piece of maintenance or calibration
//! work on one piece of equipment. Its `frequency` drives the recurrence of
//! its schedules; changing it affects only successors spawned afterwards.
//! Deleting a task deletes its schedules.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;

use cmms_core::{EquipmentId, Frequency, Priority, Task, TaskId, TaskType, UserId};

use crate::error::AppError;
use crate::extractors::{extract_validated_json, nullable, Validate};
use crate::routes::persist_failed;
use crate::state::AppState;

/// Request to create a task.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTaskRequest {
    pub description: String,
    /// `null` or absent for a one-time task.
    pub frequency: Option<Frequency>,
    pub equipment: EquipmentId,
    pub start_date: NaiveDate,
    pub task_type: TaskType,
    #[serde(default)]
    pub priority: Priority,
    pub assigned_to: Option<UserId>,
}

impl Validate for CreateTaskRequest {
    fn validate(&self) -> Result<(), String> {
        if self.description.trim().is_empty() {
            return Err("description must not be empty".to_string());
        }
        Ok(())
    }
}

/// Request to update a task. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateTaskRequest {
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<Frequency>)]
    pub frequency: Option<Option<Frequency>>,
    pub equipment: Option<EquipmentId>,
    pub start_date: Option<NaiveDate>,
    pub task_type: Option<TaskType>,
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<uuid::Uuid>)]
    pub assigned_to: Option<Option<UserId>>,
}

impl Validate for UpdateTaskRequest {
    fn validate(&self) -> Result<(), String> {
        match &self.description {
            Some(d) if d.trim().is_empty() => Err("description must not be empty".to_string()),
            _ => Ok(()),
        }
    }
}

/// Build the tasks router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/tasks", get(list_tasks).post(create_task))
        .route(
            "/v1/tasks/:id",
            get(get_task).put(update_task).delete(delete_task),
        )
}

fn check_links(
    state: &AppState,
    equipment: Option<EquipmentId>,
    assigned_to: Option<UserId>,
) -> Result<(), AppError> {
    if let Some(id) = equipment {
        if !state.equipment.contains(&id) {
            return Err(AppError::Validation(format!("equipment {id} does not exist")));
        }
    }
    if let Some(id) = assigned_to {
        if !state.users.contains(&id) {
            return Err(AppError::Validation(format!("user {id} does not exist")));
        }
    }
    Ok(())
}

/// GET /v1/tasks — List tasks.
#[utoipa::path(
    get,
    path = "/v1/tasks",
    responses(
        (status = 200, description = "All tasks, ordered by start date", body = Vec<Task>),
    ),
    tag = "tasks"
)]
async fn list_tasks(State(state): State<AppState>) -> Json<Vec<Task>> {
    let mut tasks = state.tasks.list();
    tasks.sort_by(|a, b| a.start_date.cmp(&b.start_date).then(a.id.cmp(&b.id)));
    Json(tasks)
}

/// POST /v1/tasks — Create a task.
#[utoipa::path(
    post,
    path = "/v1/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = Task),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
async fn create_task(
    State(state): State<AppState>,
    body: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let req = extract_validated_json(body)?;
    check_links(&state, Some(req.equipment), req.assigned_to)?;

    let record = Task {
        id: TaskId::new(),
        description: req.description,
        frequency: req.frequency,
        equipment: req.equipment,
        start_date: req.start_date,
        task_type: req.task_type,
        priority: req.priority,
        assigned_to: req.assigned_to,
    };

    state.tasks.insert(record.id, record.clone());

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::tasks::insert(pool, &record).await {
            state.tasks.remove(&record.id);
            return Err(persist_failed("task", record.id, e));
        }
    }

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /v1/tasks/:id — Get a task.
#[utoipa::path(
    get,
    path = "/v1/tasks/{id}",
    params(("id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task found", body = Task),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> Result<Json<Task>, AppError> {
    state
        .tasks
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("task {id} not found")))
}

/// PUT /v1/tasks/:id — Update a task.
#[utoipa::path(
    put,
    path = "/v1/tasks/{id}",
    params(("id" = Uuid, Path, description = "Task ID")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Task updated", body = Task),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
    body: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> Result<Json<Task>, AppError> {
    let req = extract_validated_json(body)?;
    let before = state
        .tasks
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("task {id} not found")))?;
    check_links(&state, req.equipment, req.assigned_to.flatten())?;

    let updated = state
        .tasks
        .update(&id, |t| {
            if let Some(v) = req.description {
                t.description = v;
            }
            if let Some(v) = req.frequency {
                t.frequency = v;
            }
            if let Some(v) = req.equipment {
                t.equipment = v;
            }
            if let Some(v) = req.start_date {
                t.start_date = v;
            }
            if let Some(v) = req.task_type {
                t.task_type = v;
            }
            if let Some(v) = req.priority {
                t.priority = v;
            }
            if let Some(v) = req.assigned_to {
                t.assigned_to = v;
            }
        })
        .ok_or_else(|| AppError::NotFound(format!("task {id} not found")))?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::tasks::update(pool, &updated).await {
            state.tasks.insert(id, before);
            return Err(persist_failed("task", id, e));
        }
    }

    Ok(Json(updated))
}

/// DELETE /v1/tasks/:id — Delete a task and its schedules.
#[utoipa::path(
    delete,
    path = "/v1/tasks/{id}",
    params(("id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> Result<StatusCode, AppError> {
    if !state.tasks.contains(&id) {
        return Err(AppError::NotFound(format!("task {id} not found")));
    }
    if let Some(pool) = &state.db_pool {
        crate::db::tasks::delete(pool, id)
            .await
            .map_err(|e| persist_failed("task", id, e))?;
    }
    state.tasks.remove(&id);
    let removed = state.schedules.remove_where(|s| s.task == id);
    tracing::info!(task_id = %id, schedules = removed.len(), "task deleted");
    Ok(StatusCode::NO_CONTENT)
}
