/// Task Routes
///
/// All task endpoints require an access token and only ever touch rows
/// owned by the authenticated subject. The unfiltered list is served from
/// the per-subject read cache; every successful write invalidates that
/// subject's entry before responding.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::Claims;
use crate::error::{AppError, ErrorContext};
use crate::startup::TaskCache;
use crate::store::tasks::{self, NewTask, Task, TaskPatch, TaskPriority, TaskStatus};
use crate::store::StorePool;
use crate::validators::{is_valid_module, is_valid_title};

#[derive(Deserialize)]
pub struct TaskQuery {
    pub q: Option<String>,
}

/// `id` and `userId` in the body are ignored; they are never client-owned
#[derive(Deserialize)]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub module: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub module: Option<String>,
}

#[derive(Serialize)]
pub struct DeletedResponse {
    pub ok: bool,
}

/// GET /api/tasks?q=
///
/// A non-blank `q` is a title substring search and bypasses the cache in
/// both directions.
pub async fn list_tasks(
    claims: web::ReqData<Claims>,
    query: web::Query<TaskQuery>,
    store: web::Data<StorePool>,
    task_cache: web::Data<TaskCache>,
) -> Result<HttpResponse, AppError> {
    let subject_id = claims.subject_id();
    let lease = store.acquire().await?;

    if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let mut conn = lease.lock().await;
        let found = tasks::search_for_user(&mut conn, subject_id, q).await?;
        return Ok(HttpResponse::Ok().json(found));
    }

    if let Some(cached) = task_cache.get(&subject_id) {
        tracing::debug!(subject_id = subject_id, "Task list served from cache");
        return Ok(HttpResponse::Ok().json(cached.as_slice()));
    }

    let mut conn = lease.lock().await;
    let all: Arc<Vec<Task>> = Arc::new(tasks::list_for_user(&mut conn, subject_id).await?);
    task_cache.set(subject_id, Arc::clone(&all));

    Ok(HttpResponse::Ok().json(all.as_slice()))
}

/// POST /api/tasks
///
/// # Errors
/// - 400: title missing or blank ("title required"), bad enum value
pub async fn create_task(
    claims: web::ReqData<Claims>,
    form: web::Json<CreateTaskRequest>,
    store: web::Data<StorePool>,
    task_cache: web::Data<TaskCache>,
) -> Result<HttpResponse, AppError> {
    let subject_id = claims.subject_id();
    let context = ErrorContext::new("task_create").with_subject(subject_id);
    let form = form.into_inner();

    let new_task = NewTask {
        title: is_valid_title(form.title.as_deref().unwrap_or_default())?,
        status: form.status.unwrap_or_default(),
        priority: form.priority.unwrap_or_default(),
        module: is_valid_module(form.module.as_deref())?,
    };

    let lease = store.acquire().await?;
    let mut conn = lease.lock().await;
    let task = tasks::insert(&mut conn, subject_id, &new_task)
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;
    task_cache.invalidate(&subject_id);

    tracing::info!(
        request_id = %context.request_id,
        subject_id = subject_id,
        task_id = task.id,
        "Task created"
    );

    Ok(HttpResponse::Created().json(task))
}

/// PUT /api/tasks/{id}
///
/// # Errors
/// - 403: the task does not exist or belongs to someone else
pub async fn update_task(
    claims: web::ReqData<Claims>,
    path: web::Path<i64>,
    form: web::Json<UpdateTaskRequest>,
    store: web::Data<StorePool>,
    task_cache: web::Data<TaskCache>,
) -> Result<HttpResponse, AppError> {
    let subject_id = claims.subject_id();
    let task_id = path.into_inner();
    let context = ErrorContext::new("task_update").with_subject(subject_id);
    let form = form.into_inner();

    let patch = TaskPatch {
        title: form.title.as_deref().map(is_valid_title).transpose()?,
        status: form.status,
        priority: form.priority,
        module: is_valid_module(form.module.as_deref())?,
    };

    let lease = store.acquire().await?;
    let mut conn = lease.lock().await;
    ensure_owner(&mut conn, task_id, subject_id).await.map_err(|e| {
        context.log_error(&e);
        e
    })?;

    let updated = tasks::update(&mut conn, task_id, &patch).await?;
    task_cache.invalidate(&subject_id);

    let task = updated.ok_or_else(|| AppError::NotFound("not found".to_string()))?;
    tracing::info!(
        request_id = %context.request_id,
        subject_id = subject_id,
        task_id = task.id,
        "Task updated"
    );

    Ok(HttpResponse::Ok().json(task))
}

/// DELETE /api/tasks/{id}
pub async fn delete_task(
    claims: web::ReqData<Claims>,
    path: web::Path<i64>,
    store: web::Data<StorePool>,
    task_cache: web::Data<TaskCache>,
) -> Result<HttpResponse, AppError> {
    let subject_id = claims.subject_id();
    let task_id = path.into_inner();
    let context = ErrorContext::new("task_delete").with_subject(subject_id);

    let lease = store.acquire().await?;
    let mut conn = lease.lock().await;
    ensure_owner(&mut conn, task_id, subject_id).await.map_err(|e| {
        context.log_error(&e);
        e
    })?;

    tasks::delete(&mut conn, task_id).await?;
    task_cache.invalidate(&subject_id);

    tracing::info!(
        request_id = %context.request_id,
        subject_id = subject_id,
        task_id = task_id,
        "Task deleted"
    );

    Ok(HttpResponse::Ok().json(DeletedResponse { ok: true }))
}

/// Missing and foreign tasks are indistinguishable to the caller.
async fn ensure_owner(
    conn: &mut sqlx::SqliteConnection,
    task_id: i64,
    subject_id: i64,
) -> Result<(), AppError> {
    match tasks::find(conn, task_id).await? {
        Some(task) if task.user_id == subject_id => Ok(()),
        _ => Err(AppError::Forbidden("not allowed".to_string())),
    }
}
