use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TaskStatus {
    Todo,
    Doing,
    Done,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Todo
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub module: Option<String>,
    pub user_id: i64,
    pub created_at: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub module: Option<String>,
}

/// Fields to change; `None` leaves the column as it is
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub module: Option<String>,
}

const TASK_COLUMNS: &str = "id, title, status, priority, module, user_id, created_at";

/// Every task owned by `user_id`
pub async fn list_for_user(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<Vec<Task>, AppError> {
    let tasks = sqlx::query_as::<_, Task>(&format!(
        "SELECT {} FROM tasks WHERE user_id = ? ORDER BY id",
        TASK_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(tasks)
}

/// Tasks owned by `user_id` whose title contains `query`
pub async fn search_for_user(
    conn: &mut SqliteConnection,
    user_id: i64,
    query: &str,
) -> Result<Vec<Task>, AppError> {
    let pattern = format!("%{}%", escape_like(query));
    let tasks = sqlx::query_as::<_, Task>(&format!(
        "SELECT {} FROM tasks WHERE user_id = ? AND title LIKE ? ESCAPE '\\' ORDER BY id",
        TASK_COLUMNS
    ))
    .bind(user_id)
    .bind(pattern)
    .fetch_all(&mut *conn)
    .await?;

    Ok(tasks)
}

pub async fn find(conn: &mut SqliteConnection, id: i64) -> Result<Option<Task>, AppError> {
    let task = sqlx::query_as::<_, Task>(&format!(
        "SELECT {} FROM tasks WHERE id = ?",
        TASK_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(task)
}

pub async fn insert(
    conn: &mut SqliteConnection,
    user_id: i64,
    task: &NewTask,
) -> Result<Task, AppError> {
    let id = sqlx::query(
        "INSERT INTO tasks (title, status, priority, module, user_id) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&task.title)
    .bind(task.status)
    .bind(task.priority)
    .bind(&task.module)
    .bind(user_id)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    find(conn, id)
        .await?
        .ok_or_else(|| AppError::Internal("Inserted task disappeared".to_string()))
}

/// Apply `patch` to task `id`. The id and owner never change.
pub async fn update(
    conn: &mut SqliteConnection,
    id: i64,
    patch: &TaskPatch,
) -> Result<Option<Task>, AppError> {
    sqlx::query(
        r#"
        UPDATE tasks
        SET title = COALESCE(?, title),
            status = COALESCE(?, status),
            priority = COALESCE(?, priority),
            module = COALESCE(?, module)
        WHERE id = ?
        "#,
    )
    .bind(&patch.title)
    .bind(patch.status)
    .bind(patch.priority)
    .bind(&patch.module)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    find(conn, id).await
}

/// Returns `true` if a row was deleted
pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
