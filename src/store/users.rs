use sqlx::SqliteConnection;

use crate::error::AppError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
}

/// Exact (case-sensitive) email lookup
pub async fn find_by_email(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, email, password_hash FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(user)
}

/// Insert a user and return its id
pub async fn insert(
    conn: &mut SqliteConnection,
    email: &str,
    password_hash: &str,
) -> Result<i64, AppError> {
    let result = sqlx::query("INSERT INTO users (email, password_hash) VALUES (?, ?)")
        .bind(email)
        .bind(password_hash)
        .execute(&mut *conn)
        .await?;

    Ok(result.last_insert_rowid())
}
