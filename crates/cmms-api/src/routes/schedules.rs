//! # Schedule API
//!
//! Scheduled occurrences of tasks, and the completion transition.
//!
//! ## Completion
//!
//! `PUT /v1/schedules/:id` with a `status` field and
//! `POST /v1/schedules/:id/complete` share one code path, [`transition`],
//! which hands the status change to [`cmms_state::apply_status`]. The
//! read-check-write of the in-memory schedule and the insertion of the
//! successor happen under a single store write lock, so two concurrent
//! completions of the same occurrence produce exactly one successor.
//!
//! With a database configured, the completion is persisted in one SQL
//! transaction that locks the row first. If another writer completed the
//! row in the meantime, the transaction inserts nothing and the in-memory
//! copy is refreshed from the database instead.
//!
//! The in-memory completion is visible before the SQL transaction commits.
//! If the commit fails, only the fields this write changed are rolled back;
//! edits other requests made in that window are kept.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use cmms_core::{Schedule, ScheduleId, ScheduleStatus, Task, TaskId};
use cmms_state::{apply_status, is_overdue, StatusChange};

use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::routes::persist_failed;
use crate::state::AppState;

/// A schedule with its task embedded and the overdue flag computed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScheduleView {
    pub id: ScheduleId,
    pub task: Task,
    pub due_date: NaiveDate,
    pub completion_date: Option<NaiveDate>,
    pub status: ScheduleStatus,
    pub history_log: String,
    /// Pending and due before today.
    pub is_overdue: bool,
}

impl ScheduleView {
    fn build(state: &AppState, schedule: Schedule) -> Result<Self, AppError> {
        let task = state.tasks.get(&schedule.task).ok_or_else(|| {
            AppError::Internal(format!(
                "schedule {} references missing task {}",
                schedule.id, schedule.task
            ))
        })?;
        let overdue = is_overdue(&schedule, state.clock.today());
        Ok(Self {
            id: schedule.id,
            task,
            due_date: schedule.due_date,
            completion_date: schedule.completion_date,
            status: schedule.status,
            history_log: schedule.history_log,
            is_overdue: overdue,
        })
    }
}

/// Result of a write that may complete a schedule.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompletionResponse {
    /// The schedule after the write.
    pub schedule: ScheduleView,
    /// The occurrence spawned by this write, if it completed the schedule
    /// and the task recurs.
    pub successor: Option<ScheduleView>,
}

/// Request to create a schedule.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateScheduleRequest {
    pub task: TaskId,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub status: ScheduleStatus,
    #[serde(default)]
    pub history_log: String,
}

impl Validate for CreateScheduleRequest {
    fn validate(&self) -> Result<(), String> {
        if self.status != ScheduleStatus::Pending {
            return Err(
                "new schedules start pending; complete them with PUT or POST /complete"
                    .to_string(),
            );
        }
        Ok(())
    }
}

/// Request to update a schedule. Absent fields are left unchanged.
///
/// Setting `status` to `completed` runs the completion transition;
/// setting a completed schedule back to `pending` is rejected.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateScheduleRequest {
    pub due_date: Option<NaiveDate>,
    pub history_log: Option<String>,
    pub status: Option<ScheduleStatus>,
}

impl Validate for UpdateScheduleRequest {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Build the schedules router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/schedules", get(list_schedules).post(create_schedule))
        .route(
            "/v1/schedules/:id",
            get(get_schedule)
                .put(update_schedule)
                .delete(delete_schedule),
        )
        .route("/v1/schedules/:id/complete", post(complete_schedule))
}

/// Apply `req` to schedule `id`, running the completion rule when a status
/// is requested. Returns the updated schedule and the spawned successor.
pub(crate) async fn transition(
    state: &AppState,
    id: ScheduleId,
    req: UpdateScheduleRequest,
) -> Result<(Schedule, Option<Schedule>), AppError> {
    let current = state
        .schedules
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("schedule {id} not found")))?;
    let frequency = state
        .tasks
        .get(&current.task)
        .map(|t| t.frequency)
        .ok_or_else(|| {
            AppError::Internal(format!(
                "schedule {id} references missing task {}",
                current.task
            ))
        })?;
    let clock = Arc::clone(&state.clock);

    let (before, updated, change) = state.schedules.transact(
        |map| -> Result<(Schedule, Schedule, StatusChange), AppError> {
            let entry = map
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("schedule {id} not found")))?;
            let before = entry.clone();
            let mut next = entry.clone();
            if let Some(due_date) = req.due_date {
                next.due_date = due_date;
            }
            if let Some(history_log) = req.history_log {
                next.history_log = history_log;
            }
            let change = match req.status {
                Some(status) => apply_status(&mut next, status, frequency, clock.as_ref())?,
                None => StatusChange::Unchanged,
            };
            *entry = next.clone();
            if let Some(successor) = change.successor() {
                map.insert(successor.id, successor.clone());
            }
            Ok((before, next, change))
        },
    )?;

    let mut successor = change.successor().cloned();

    if let Some(pool) = &state.db_pool {
        let persisted = match &change {
            StatusChange::Completed(_) => {
                crate::db::schedules::complete(pool, &updated, successor.as_ref()).await
            }
            StatusChange::Unchanged => crate::db::schedules::update_details(pool, &updated)
                .await
                .map(|_| true),
        };
        match persisted {
            Ok(true) => {}
            Ok(false) => {
                // Completed by another writer first; the database wins.
                tracing::warn!(
                    schedule_id = %id,
                    "schedule already completed in database, no successor created"
                );
                if let Some(s) = successor.take() {
                    state.schedules.remove(&s.id);
                }
                let stored = crate::db::schedules::get_by_id(pool, id)
                    .await
                    .map_err(|e| persist_failed("schedule", id, e))?
                    .ok_or_else(|| AppError::NotFound(format!("schedule {id} not found")))?;
                state.schedules.insert(id, stored.clone());
                return Ok((stored, None));
            }
            Err(e) => {
                state.schedules.transact(|map| {
                    revert_transition(map, &before, &updated, successor.as_ref());
                });
                return Err(persist_failed("schedule", id, e));
            }
        }
    }

    if let StatusChange::Completed(completion) = &change {
        metrics::counter!("cmms_schedule_completions_total").increment(1);
        if successor.is_some() {
            metrics::counter!("cmms_schedule_successors_total").increment(1);
        }
        tracing::info!(
            schedule_id = %id,
            completion_date = %completion.completion_date,
            successor_id = ?successor.as_ref().map(|s| s.id),
            successor_due = ?successor.as_ref().map(|s| s.due_date),
            "schedule completed"
        );
    }

    Ok((updated, successor))
}

/// Undo an in-memory transition whose persistence failed.
///
/// The record is restored wholesale only if it still holds what this write
/// stored. If another request edited it in the meantime, only the
/// completion fields are rolled back so that edit survives.
fn revert_transition(
    map: &mut HashMap<ScheduleId, Schedule>,
    before: &Schedule,
    written: &Schedule,
    successor: Option<&Schedule>,
) {
    if let Some(entry) = map.get_mut(&before.id) {
        if entry == written {
            *entry = before.clone();
        } else {
            entry.status = before.status;
            entry.completion_date = before.completion_date;
        }
    }
    if let Some(s) = successor {
        map.remove(&s.id);
    }
}

fn completion_response(
    state: &AppState,
    schedule: Schedule,
    successor: Option<Schedule>,
) -> Result<CompletionResponse, AppError> {
    Ok(CompletionResponse {
        schedule: ScheduleView::build(state, schedule)?,
        successor: successor
            .map(|s| ScheduleView::build(state, s))
            .transpose()?,
    })
}

/// GET /v1/schedules — List schedules.
#[utoipa::path(
    get,
    path = "/v1/schedules",
    responses(
        (status = 200, description = "All schedules, ordered by due date", body = Vec<ScheduleView>),
    ),
    tag = "schedules"
)]
async fn list_schedules(
    State(state): State<AppState>,
) -> Result<Json<Vec<ScheduleView>>, AppError> {
    let mut schedules = state.schedules.list();
    schedules.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)));
    let views = schedules
        .into_iter()
        .map(|s| ScheduleView::build(&state, s))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(views))
}

/// POST /v1/schedules — Create a pending schedule.
#[utoipa::path(
    post,
    path = "/v1/schedules",
    request_body = CreateScheduleRequest,
    responses(
        (status = 201, description = "Schedule created", body = ScheduleView),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "schedules"
)]
async fn create_schedule(
    State(state): State<AppState>,
    body: Result<Json<CreateScheduleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ScheduleView>), AppError> {
    let req = extract_validated_json(body)?;
    if !state.tasks.contains(&req.task) {
        return Err(AppError::Validation(format!(
            "task {} does not exist",
            req.task
        )));
    }

    let mut record = Schedule::pending(req.task, req.due_date);
    record.history_log = req.history_log;

    state.schedules.insert(record.id, record.clone());

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::schedules::insert(pool, &record).await {
            state.schedules.remove(&record.id);
            return Err(persist_failed("schedule", record.id, e));
        }
    }

    Ok((StatusCode::CREATED, Json(ScheduleView::build(&state, record)?)))
}

/// GET /v1/schedules/:id — Get a schedule.
#[utoipa::path(
    get,
    path = "/v1/schedules/{id}",
    params(("id" = Uuid, Path, description = "Schedule ID")),
    responses(
        (status = 200, description = "Schedule found", body = ScheduleView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "schedules"
)]
async fn get_schedule(
    State(state): State<AppState>,
    Path(id): Path<ScheduleId>,
) -> Result<Json<ScheduleView>, AppError> {
    let schedule = state
        .schedules
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("schedule {id} not found")))?;
    Ok(Json(ScheduleView::build(&state, schedule)?))
}

/// PUT /v1/schedules/:id — Update a schedule, completing it if requested.
#[utoipa::path(
    put,
    path = "/v1/schedules/{id}",
    params(("id" = Uuid, Path, description = "Schedule ID")),
    request_body = UpdateScheduleRequest,
    responses(
        (status = 200, description = "Schedule updated", body = CompletionResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Completed schedules cannot be reopened", body = crate::error::ErrorBody),
    ),
    tag = "schedules"
)]
async fn update_schedule(
    State(state): State<AppState>,
    Path(id): Path<ScheduleId>,
    body: Result<Json<UpdateScheduleRequest>, JsonRejection>,
) -> Result<Json<CompletionResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let (schedule, successor) = transition(&state, id, req).await?;
    Ok(Json(completion_response(&state, schedule, successor)?))
}

/// POST /v1/schedules/:id/complete — Complete a schedule.
///
/// Completing an already-completed schedule succeeds without spawning
/// another successor.
#[utoipa::path(
    post,
    path = "/v1/schedules/{id}/complete",
    params(("id" = Uuid, Path, description = "Schedule ID")),
    responses(
        (status = 200, description = "Schedule completed", body = CompletionResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "schedules"
)]
async fn complete_schedule(
    State(state): State<AppState>,
    Path(id): Path<ScheduleId>,
) -> Result<Json<CompletionResponse>, AppError> {
    let req = UpdateScheduleRequest {
        status: Some(ScheduleStatus::Completed),
        ..UpdateScheduleRequest::default()
    };
    let (schedule, successor) = transition(&state, id, req).await?;
    Ok(Json(completion_response(&state, schedule, successor)?))
}

/// DELETE /v1/schedules/:id — Delete a schedule.
#[utoipa::path(
    delete,
    path = "/v1/schedules/{id}",
    params(("id" = Uuid, Path, description = "Schedule ID")),
    responses(
        (status = 204, description = "Schedule deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "schedules"
)]
async fn delete_schedule(
    State(state): State<AppState>,
    Path(id): Path<ScheduleId>,
) -> Result<StatusCode, AppError> {
    if !state.schedules.contains(&id) {
        return Err(AppError::NotFound(format!("schedule {id} not found")));
    }
    if let Some(pool) = &state.db_pool {
        crate::db::schedules::delete(pool, id)
            .await
            .map_err(|e| persist_failed("schedule", id, e))?;
    }
    state.schedules.remove(&id);
    Ok(StatusCode::NO_CONTENT)
}
