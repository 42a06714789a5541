use sqlx::SqlitePool;

use super::{
    models::{Project, ProjectRow, User},
    projects::{self, PROJECT_COLUMNS},
};
use crate::error::Result;

const USER_COLUMNS: &str = "id, username, email, password_hash, role, description, created_at";

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let user =
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
            .bind(email)
            .fetch_optional(pool)
            .await?;
    Ok(user)
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, rowid ASC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(users)
}

pub async fn insert(pool: &SqlitePool, user: &User) -> Result<()> {
    sqlx::query(
        "INSERT INTO users (id, username, email, password_hash, role, description, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&user.id)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role)
    .bind(&user.description)
    .bind(user.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update(pool: &SqlitePool, user: &User) -> Result<()> {
    sqlx::query(
        "UPDATE users SET username = ?, email = ?, password_hash = ?, role = ?, description = ? WHERE id = ?",
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role)
    .bind(&user.description)
    .bind(&user.id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Keeps only the ids that belong to a stored user, preserving their order.
pub async fn existing_ids(pool: &SqlitePool, ids: &[String]) -> Result<Vec<String>> {
    let mut found = Vec::with_capacity(ids.len());
    for id in ids {
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await?;
        if exists > 0 {
            found.push(id.clone());
        }
    }
    Ok(found)
}

/// Ids of the projects a user owns and collaborates on, oldest first.
pub async fn project_ids(pool: &SqlitePool, user_id: &str) -> Result<(Vec<String>, Vec<String>)> {
    let owned = sqlx::query_scalar::<_, String>(
        "SELECT id FROM projects WHERE owner_id = ? ORDER BY seq ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let collaborated = sqlx::query_scalar::<_, String>(
        r#"
        SELECT p.id FROM projects p
        WHERE EXISTS (SELECT 1 FROM json_each(p.collaborators) c WHERE c.value = ?)
        ORDER BY p.seq ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok((owned, collaborated))
}

/// Deletes a user together with the projects they own and strips them from
/// every other project's membership lists. Returns false if no such user.
pub async fn delete_cascade(pool: &SqlitePool, user_id: &str) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let deleted = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Ok(false);
    }

    let owned = sqlx::query("DELETE FROM projects WHERE owner_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let memberships = sqlx::query_as::<_, ProjectRow>(&format!(
        r#"
        SELECT {PROJECT_COLUMNS} FROM projects p
        WHERE EXISTS (SELECT 1 FROM json_each(p.collaborators) c WHERE c.value = ?1)
           OR EXISTS (SELECT 1 FROM json_each(p.pending_requests) r WHERE r.value = ?1)
        "#
    ))
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await?;

    for row in memberships {
        let mut project = Project::from(row);
        if project.forget_member(user_id) {
            projects::save(&mut *tx, &project).await?;
        }
    }

    tx.commit().await?;

    tracing::info!(user_id, owned_projects_deleted = owned, "user deleted");
    Ok(true)
}
