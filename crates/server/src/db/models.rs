use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum Role {
    #[default]
    #[serde(alias = "Estudiante")]
    Student,
    #[serde(alias = "Docente")]
    Teacher,
    Admin,
}

impl Role {
    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum ProjectStatus {
    #[default]
    #[serde(rename = "Looking for members")]
    #[sqlx(rename = "Looking for members")]
    LookingForMembers,
    #[serde(rename = "Work in progress")]
    #[sqlx(rename = "Work in progress")]
    WorkInProgress,
    Closed,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub author_id: String,
    /// Author's username when the comment was written; not updated on rename.
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A project document with its embedded comments and membership lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner_id: String,
    /// Owner's username at creation time.
    pub owner_name: String,
    pub collaborators: Vec<String>,
    pub pending_requests: Vec<String>,
    pub comments: Vec<Comment>,
    pub categories: Vec<String>,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ProjectRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner_id: String,
    pub owner_name: String,
    pub collaborators: Json<Vec<String>>,
    pub pending_requests: Json<Vec<String>>,
    pub comments: Json<Vec<Comment>>,
    pub categories: Json<Vec<String>>,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            owner_id: row.owner_id,
            owner_name: row.owner_name,
            collaborators: row.collaborators.0,
            pending_requests: row.pending_requests.0,
            comments: row.comments.0,
            categories: row.categories.0,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    Accept,
    Reject,
}

impl RequestAction {
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "accept" => Some(Self::Accept),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}

impl Project {
    pub fn is_owner(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }

    pub fn is_collaborator(&self, user_id: &str) -> bool {
        self.collaborators.iter().any(|id| id == user_id)
    }

    pub fn has_pending_request(&self, user_id: &str) -> bool {
        self.pending_requests.iter().any(|id| id == user_id)
    }

    pub fn request_to_join(&mut self, user_id: &str) -> Result<()> {
        if self.is_owner(user_id) || self.is_collaborator(user_id) {
            return Err(AppError::Validation(
                "You are already part of this project".to_string(),
            ));
        }
        if self.has_pending_request(user_id) {
            return Err(AppError::Validation(
                "You already sent a request for this project".to_string(),
            ));
        }
        self.pending_requests.push(user_id.to_string());
        Ok(())
    }

    pub fn resolve_request(&mut self, user_id: &str, action: RequestAction) -> Result<()> {
        if !self.has_pending_request(user_id) {
            return Err(AppError::Validation(
                "There is no pending request from this user".to_string(),
            ));
        }
        if action == RequestAction::Accept && !self.is_collaborator(user_id) {
            self.collaborators.push(user_id.to_string());
        }
        self.pending_requests.retain(|id| id != user_id);
        Ok(())
    }

    /// Replaces the collaborator list, dropping the owner and duplicates and
    /// clearing pending requests of anyone who became a collaborator.
    pub fn set_collaborators(&mut self, collaborators: Vec<String>) {
        let mut unique: Vec<String> = Vec::with_capacity(collaborators.len());
        for id in collaborators {
            if id != self.owner_id && !unique.contains(&id) {
                unique.push(id);
            }
        }
        self.pending_requests.retain(|id| !unique.contains(id));
        self.collaborators = unique;
    }

    pub fn comment_mut(&mut self, comment_id: &str) -> Option<&mut Comment> {
        self.comments.iter_mut().find(|c| c.id == comment_id)
    }

    pub fn remove_comment(&mut self, comment_id: &str) -> Option<Comment> {
        let index = self.comments.iter().position(|c| c.id == comment_id)?;
        Some(self.comments.remove(index))
    }

    /// Drops a user from the membership lists. Returns whether anything changed.
    pub fn forget_member(&mut self, user_id: &str) -> bool {
        let before = self.collaborators.len() + self.pending_requests.len();
        self.collaborators.retain(|id| id != user_id);
        self.pending_requests.retain(|id| id != user_id);
        before != self.collaborators.len() + self.pending_requests.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn project() -> Project {
        Project {
            id: "abc123".to_string(),
            name: "Robot".to_string(),
            description: "Line follower".to_string(),
            owner_id: "owner".to_string(),
            owner_name: "Olivia".to_string(),
            collaborators: vec!["collab".to_string()],
            pending_requests: vec![],
            comments: vec![],
            categories: vec!["robotics".to_string()],
            status: ProjectStatus::default(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn join_rejects_members_and_duplicates() {
        let mut p = project();
        assert!(p.request_to_join("owner").is_err());
        assert!(p.request_to_join("collab").is_err());

        p.request_to_join("newbie").unwrap();
        assert_eq!(p.pending_requests, vec!["newbie".to_string()]);
        assert!(p.request_to_join("newbie").is_err());
        assert_eq!(p.pending_requests.len(), 1);
    }

    #[test]
    fn accept_moves_request_to_collaborators_once() {
        let mut p = project();
        p.request_to_join("newbie").unwrap();
        p.resolve_request("newbie", RequestAction::Accept).unwrap();

        assert!(p.pending_requests.is_empty());
        assert_eq!(p.collaborators, vec!["collab".to_string(), "newbie".to_string()]);
        assert!(p.resolve_request("newbie", RequestAction::Accept).is_err());
    }

    #[test]
    fn reject_only_clears_request() {
        let mut p = project();
        p.request_to_join("newbie").unwrap();
        p.resolve_request("newbie", RequestAction::Reject).unwrap();

        assert!(p.pending_requests.is_empty());
        assert_eq!(p.collaborators, vec!["collab".to_string()]);
    }

    #[test]
    fn set_collaborators_keeps_lists_disjoint() {
        let mut p = project();
        p.request_to_join("newbie").unwrap();
        p.request_to_join("other").unwrap();
        p.set_collaborators(vec![
            "owner".to_string(),
            "newbie".to_string(),
            "newbie".to_string(),
        ]);

        assert_eq!(p.collaborators, vec!["newbie".to_string()]);
        assert_eq!(p.pending_requests, vec!["other".to_string()]);
    }

    #[test]
    fn request_action_parsing() {
        assert_eq!(RequestAction::parse("accept"), Some(RequestAction::Accept));
        assert_eq!(RequestAction::parse("reject"), Some(RequestAction::Reject));
        assert_eq!(RequestAction::parse("ACCEPT"), None);
    }

    #[test]
    fn role_accepts_legacy_names() {
        let role: Role = serde_json::from_str("\"Docente\"").unwrap();
        assert_eq!(role, Role::Teacher);
        assert_eq!(serde_json::to_string(&Role::Student).unwrap(), "\"Student\"");
    }

    #[test]
    fn status_uses_display_names() {
        assert_eq!(
            serde_json::to_string(&ProjectStatus::WorkInProgress).unwrap(),
            "\"Work in progress\""
        );
    }
}
