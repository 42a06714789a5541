use std::collections::HashMap;

use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};

use crate::{
    db::projects,
    error::{AppError, Result},
    middleware::auth::AuthUser,
    AppState,
};

/// Loads the project named by the `id` path parameter and lets the request
/// through only for its owner or an administrator. The loaded project is
/// attached to the request as an extension.
pub async fn require_project_owner(
    State(state): State<AppState>,
    user: AuthUser,
    Path(params): Path<HashMap<String, String>>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let project_id = params
        .get("id")
        .ok_or_else(|| AppError::Validation("Missing project id".to_string()))?;

    let project = projects::find(&state.db.pool, project_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

    if !user.is_admin() && !project.is_owner(&user.id) {
        return Err(AppError::Forbidden(
            "Only the project owner can do this".to_string(),
        ));
    }

    request.extensions_mut().insert(project);

    Ok(next.run(request).await)
}
