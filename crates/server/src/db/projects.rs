use sqlx::{types::Json, Executor, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use super::models::{Project, ProjectRow};
use crate::error::Result;

pub const PROJECT_COLUMNS: &str = "id, name, description, owner_id, owner_name, collaborators, \
     pending_requests, comments, categories, status, created_at";

const PUBLIC_ID_LEN: usize = 10;
const BASE62: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Short URL-safe id used in routes, separate from the storage sequence.
pub fn new_public_id() -> String {
    let mut n = Uuid::new_v4().as_u128();
    (0..PUBLIC_ID_LEN)
        .map(|_| {
            let c = BASE62[(n % 62) as usize] as char;
            n /= 62;
            c
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct ProjectFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub owner: Option<String>,
    pub offset: i64,
    pub limit: i64,
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Text matched by `search`. SQLite's `lower`/`LIKE` only fold ASCII, so
/// folding happens here and the stored column is compared as-is.
fn search_text(project: &Project) -> String {
    let mut text = format!(
        "{}\n{}\n{}",
        project.name, project.description, project.owner_name
    );
    for category in &project.categories {
        text.push('\n');
        text.push_str(category);
    }
    text.to_lowercase()
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &ProjectFilter) {
    builder.push(" WHERE 1 = 1");

    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
        builder
            .push(" AND projects.search_text LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\'");
    }

    if let Some(category) = filter.category.as_deref().filter(|s| !s.is_empty()) {
        builder
            .push(" AND EXISTS (SELECT 1 FROM json_each(projects.categories) cat WHERE cat.value = ")
            .push_bind(category.to_string())
            .push(")");
    }

    if let Some(owner) = filter.owner.as_deref().filter(|s| !s.is_empty()) {
        builder
            .push(" AND projects.owner_id = ")
            .push_bind(owner.to_string());
    }
}

/// Returns the number of matching projects and the requested page, newest first.
pub async fn list(pool: &SqlitePool, filter: &ProjectFilter) -> Result<(i64, Vec<Project>)> {
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM projects");
    push_filters(&mut count, filter);
    let total = count.build_query_scalar::<i64>().fetch_one(pool).await?;

    let mut page = QueryBuilder::<Sqlite>::new(format!("SELECT {PROJECT_COLUMNS} FROM projects"));
    push_filters(&mut page, filter);
    page.push(" ORDER BY projects.seq DESC LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(filter.offset);

    let rows = page.build_query_as::<ProjectRow>().fetch_all(pool).await?;

    Ok((total, rows.into_iter().map(Project::from).collect()))
}

pub async fn find(pool: &SqlitePool, id: &str) -> Result<Option<Project>> {
    let row = sqlx::query_as::<_, ProjectRow>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Project::from))
}

pub async fn insert(pool: &SqlitePool, project: &Project) -> Result<()> {
    sqlx::query(&format!(
        "INSERT INTO projects ({PROJECT_COLUMNS}, search_text) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(&project.id)
    .bind(&project.name)
    .bind(&project.description)
    .bind(&project.owner_id)
    .bind(&project.owner_name)
    .bind(Json(&project.collaborators))
    .bind(Json(&project.pending_requests))
    .bind(Json(&project.comments))
    .bind(Json(&project.categories))
    .bind(project.status)
    .bind(project.created_at)
    .bind(search_text(project))
    .execute(pool)
    .await?;
    Ok(())
}

/// Writes back every mutable field of the document. Last write wins.
pub async fn save<'e, E>(executor: E, project: &Project) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        UPDATE projects
        SET name = ?, description = ?, collaborators = ?, pending_requests = ?,
            comments = ?, categories = ?, status = ?, search_text = ?
        WHERE id = ?
        "#,
    )
    .bind(&project.name)
    .bind(&project.description)
    .bind(Json(&project.collaborators))
    .bind(Json(&project.pending_requests))
    .bind(Json(&project.comments))
    .bind(Json(&project.categories))
    .bind(project.status)
    .bind(search_text(project))
    .bind(&project.id)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn delete(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
