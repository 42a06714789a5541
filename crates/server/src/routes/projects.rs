use axum::{
    extract::{Path, State},
    handler::Handler,
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post, put},
    Extension, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db::{
        models::{Comment, Project, ProjectStatus, RequestAction},
        projects::{self, ProjectFilter},
        users,
    },
    error::{AppError, Result},
    extract::{Json, Query},
    middleware::{auth::AuthUser, owner::require_project_owner},
    routes::{comments, MessageResponse},
    AppState,
};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

pub fn router(state: AppState) -> Router<AppState> {
    let owner_only = axum_middleware::from_fn_with_state(state, require_project_owner);

    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route(
            "/:id",
            get(get_project)
                .put(update_project.layer(owner_only.clone()))
                .delete(delete_project.layer(owner_only.clone())),
        )
        .route("/:id/join", post(request_to_join))
        .route(
            "/:id/requests/:user_id",
            put(resolve_request.layer(owner_only)),
        )
        .merge(comments::router())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "categorias")]
    pub categories: Vec<String>,
    #[serde(default, alias = "colaboradores")]
    pub collaborators: Vec<String>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    #[serde(default)]
    pub owner_id: Option<String>,
}

/// Fields an owner may change. Anything else in the body is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "categorias")]
    pub categories: Option<Vec<String>>,
    #[serde(alias = "colaboradores")]
    pub collaborators: Option<Vec<String>>,
    pub status: Option<ProjectStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    #[serde(alias = "categoria")]
    pub category: Option<String>,
    pub owner: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequestBody {
    #[serde(default)]
    pub action: String,
}

/// A project as seen by a particular viewer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    pub owner_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collaborators: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_requests: Option<Vec<String>>,
    pub comments: Vec<Comment>,
    pub categories: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visibility {
    Full,
    Member,
    Public,
}

impl Visibility {
    fn of(project: &Project, viewer: &AuthUser) -> Self {
        if viewer.is_admin() || project.is_owner(&viewer.id) {
            Visibility::Full
        } else if project.is_collaborator(&viewer.id) {
            Visibility::Member
        } else {
            Visibility::Public
        }
    }
}

impl ProjectView {
    pub fn for_viewer(project: Project, viewer: &AuthUser) -> Self {
        let visibility = Visibility::of(&project, viewer);
        let detailed = visibility != Visibility::Public;

        Self {
            id: project.id,
            name: project.name,
            description: project.description,
            owner_id: (visibility == Visibility::Full).then_some(project.owner_id),
            owner_name: project.owner_name,
            collaborators: detailed.then_some(project.collaborators),
            pending_requests: detailed.then_some(project.pending_requests),
            comments: project.comments,
            categories: project.categories,
            status: detailed.then_some(project.status),
            created_at: detailed.then_some(project.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub results: Vec<ProjectView>,
}

#[derive(Debug, Serialize)]
pub struct ProjectEnvelope {
    pub message: String,
    pub project: Project,
}

fn normalize_categories(categories: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(categories.len());
    for category in categories {
        let category = category.trim();
        if !category.is_empty() && !normalized.iter().any(|c| c == category) {
            normalized.push(category.to_string());
        }
    }
    normalized
}

fn required_text(value: &str, field: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("Project {field} is required")));
    }
    Ok(value.to_string())
}

pub(crate) async fn load_project(state: &AppState, id: &str) -> Result<Project> {
    projects::find(&state.db.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))
}

async fn list_projects(
    State(state): State<AppState>,
    viewer: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ProjectListResponse>> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if page < 1 {
        return Err(AppError::Validation("page must be at least 1".to_string()));
    }
    if limit < 1 {
        return Err(AppError::Validation("limit must be at least 1".to_string()));
    }
    let limit = limit.min(MAX_PAGE_SIZE);

    let filter = ProjectFilter {
        search: query.search.map(|s| s.trim().to_string()),
        category: query.category,
        owner: query.owner,
        offset: (page - 1).saturating_mul(limit),
        limit,
    };

    let (total, found) = projects::list(&state.db.pool, &filter).await?;

    Ok(Json(ProjectListResponse {
        total,
        page,
        limit,
        results: found
            .into_iter()
            .map(|p| ProjectView::for_viewer(p, &viewer))
            .collect(),
    }))
}

async fn create_project(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>)> {
    let name = required_text(&body.name, "name")?;
    let description = required_text(&body.description, "description")?;

    let owner_id = match body.owner_id.filter(|id| !id.is_empty()) {
        Some(id) if id != user.id && !user.is_admin() => {
            return Err(AppError::Forbidden(
                "You cannot create projects for other users".to_string(),
            ));
        }
        Some(id) => id,
        None => user.id.clone(),
    };

    let owner = users::find_by_id(&state.db.pool, &owner_id)
        .await?
        .ok_or_else(|| AppError::Validation("Project owner does not exist".to_string()))?;

    let mut project = Project {
        id: projects::new_public_id(),
        name,
        description,
        owner_id: owner.id,
        owner_name: owner.username,
        collaborators: Vec::new(),
        pending_requests: Vec::new(),
        comments: Vec::new(),
        categories: normalize_categories(body.categories),
        status: body.status.unwrap_or_default(),
        created_at: Utc::now(),
    };
    project.set_collaborators(users::existing_ids(&state.db.pool, &body.collaborators).await?);

    projects::insert(&state.db.pool, &project).await?;

    tracing::info!(project_id = %project.id, owner_id = %project.owner_id, "project created");

    Ok((StatusCode::CREATED, Json(project)))
}

async fn get_project(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ProjectView>> {
    let project = load_project(&state, &id).await?;
    Ok(Json(ProjectView::for_viewer(project, &viewer)))
}

async fn update_project(
    State(state): State<AppState>,
    Extension(mut project): Extension<Project>,
    Json(body): Json<UpdateProjectRequest>,
) -> Result<Json<ProjectEnvelope>> {
    if let Some(name) = body.name {
        project.name = required_text(&name, "name")?;
    }
    if let Some(description) = body.description {
        project.description = required_text(&description, "description")?;
    }
    if let Some(categories) = body.categories {
        project.categories = normalize_categories(categories);
    }
    if let Some(collaborators) = body.collaborators {
        project.set_collaborators(users::existing_ids(&state.db.pool, &collaborators).await?);
    }
    if let Some(status) = body.status {
        project.status = status;
    }

    projects::save(&state.db.pool, &project).await?;

    Ok(Json(ProjectEnvelope {
        message: "Project updated".to_string(),
        project,
    }))
}

async fn delete_project(
    State(state): State<AppState>,
    Extension(project): Extension<Project>,
) -> Result<Json<MessageResponse>> {
    projects::delete(&state.db.pool, &project.id).await?;

    tracing::info!(project_id = %project.id, "project deleted");

    Ok(Json(MessageResponse::new("Project deleted")))
}

async fn request_to_join(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let mut project = load_project(&state, &id).await?;

    project.request_to_join(&user.id)?;
    projects::save(&state.db.pool, &project).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Collaboration request sent")),
    ))
}

async fn resolve_request(
    State(state): State<AppState>,
    Extension(mut project): Extension<Project>,
    Path((_, user_id)): Path<(String, String)>,
    Json(body): Json<ResolveRequestBody>,
) -> Result<Json<MessageResponse>> {
    let action = RequestAction::parse(&body.action).ok_or_else(|| {
        AppError::Validation("Invalid action, expected 'accept' or 'reject'".to_string())
    })?;

    project.resolve_request(&user_id, action)?;
    projects::save(&state.db.pool, &project).await?;

    tracing::info!(project_id = %project.id, user_id = %user_id, ?action, "collaboration request resolved");

    let message = match action {
        RequestAction::Accept => "Request accepted",
        RequestAction::Reject => "Request rejected",
    };
    Ok(Json(MessageResponse::new(message)))
}
