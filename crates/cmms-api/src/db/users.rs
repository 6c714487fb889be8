//! User lookups on the `users` table. Accounts are provisioned outside
//! this service, so there are no writes.

use sqlx::PgPool;
use uuid::Uuid;

use cmms_core::{User, UserId};

/// Load all users on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<User>, sqlx::Error> {
    let rows = sqlx::query_as::<_, UserRow>("SELECT id, username FROM users ORDER BY username")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| User {
            id: UserId::from_uuid(row.id),
            username: row.username,
        })
        .collect())
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
}
