use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::put,
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    db::{models::Comment, projects},
    error::{AppError, Result},
    extract::Json,
    middleware::auth::AuthUser,
    routes::{projects::load_project, MessageResponse},
    AppState,
};

/// Comment routes, nested under a project.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:id/comments", put(add_comment))
        .route(
            "/:id/comments/:comment_id",
            put(edit_comment).delete(delete_comment),
        )
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(default, alias = "contenido")]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub message: String,
    pub comment: Comment,
}

#[derive(Debug, Deserialize)]
pub struct CommentPathParams {
    pub id: String,
    pub comment_id: String,
}

fn comment_content(body: &CommentRequest) -> Result<String> {
    let content = body.content.trim();
    if content.is_empty() {
        return Err(AppError::Validation(
            "Comment content cannot be empty".to_string(),
        ));
    }
    Ok(content.to_string())
}

fn check_author(comment: &Comment, user: &AuthUser) -> Result<()> {
    if comment.author_id != user.id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only the author can change this comment".to_string(),
        ));
    }
    Ok(())
}

async fn add_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
    Json(body): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>)> {
    let mut project = load_project(&state, &project_id).await?;
    let content = comment_content(&body)?;

    let comment = Comment {
        id: projects::new_public_id(),
        author_id: user.id,
        author_name: user.username,
        content,
        created_at: Utc::now(),
    };
    project.comments.push(comment.clone());
    projects::save(&state.db.pool, &project).await?;

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            message: "Comment added".to_string(),
            comment,
        }),
    ))
}

async fn edit_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(params): Path<CommentPathParams>,
    Json(body): Json<CommentRequest>,
) -> Result<Json<CommentResponse>> {
    let mut project = load_project(&state, &params.id).await?;

    let comment = project
        .comment_mut(&params.comment_id)
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;
    check_author(comment, &user)?;

    comment.content = comment_content(&body)?;
    let comment = comment.clone();

    projects::save(&state.db.pool, &project).await?;

    Ok(Json(CommentResponse {
        message: "Comment updated".to_string(),
        comment,
    }))
}

async fn delete_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(params): Path<CommentPathParams>,
) -> Result<Json<MessageResponse>> {
    let mut project = load_project(&state, &params.id).await?;

    let comment = project
        .comments
        .iter()
        .find(|c| c.id == params.comment_id)
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;
    check_author(comment, &user)?;

    project.remove_comment(&params.comment_id);
    projects::save(&state.db.pool, &project).await?;

    Ok(Json(MessageResponse::new("Comment deleted")))
}
