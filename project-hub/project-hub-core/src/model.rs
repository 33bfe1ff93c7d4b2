//! Persisted entity records. Each type maps onto one named collection via
//! the [`Record`](crate::store::Record) impls at the bottom of this module.

use crate::policy::AccessRestriction;
use crate::store::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub tax_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Organizational or geographic unit within a company.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Area {
    pub id: String,
    pub company_id: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Position {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Worker {
    pub id: String,
    pub company_id: String,
    pub name: String,
    pub email: String,
    pub position_id: Option<String>,
    pub area_ids: Vec<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Open,
    Closed,
    Approved,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectRole {
    /// Privileged role: may write into final folders and import after closure.
    CentralOffice,
    Manager,
    Supervisor,
    Member,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectMember {
    pub user_id: String,
    pub role: ProjectRole,
    pub area_id: Option<String>,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub company_id: String,
    pub name: String,
    pub code: Option<String>,
    pub area_ids: Vec<String>,
    pub status: ProjectStatus,
    pub members: Vec<ProjectMember>,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn member(&self, user_id: &str) -> Option<&ProjectMember> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.member(user_id).is_some()
    }

    pub fn is_open(&self) -> bool {
        self.status == ProjectStatus::Open
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Folder {
    pub id: String,
    pub project_id: String,
    /// `None` means top level of the project. The tree is this flat
    /// collection plus these pointers; nothing nested is persisted.
    pub parent_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub order: u32,
    pub restriction: AccessRestriction,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    Active,
    Deleted,
    Obsolete,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    pub id: String,
    pub project_id: String,
    pub folder_id: String,
    pub name: String,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Lowercased suffix after the last `.` of the original name, or empty.
    pub extension: String,
    pub storage_url: String,
    pub version: u32,
    pub state: FileState,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn is_active(&self) -> bool {
        self.state == FileState::Active
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    ProjectCreated,
    ProjectClosed,
    ProjectApproved,
    MemberAdded,
    FolderCreated,
    FolderRenamed,
    FolderMoved,
    FolderDeleted,
    FileAdded,
    FileReplaced,
    FileMoved,
    FileDeleted,
    TreeImported,
}

/// Append-only audit record. Never updated or removed once written.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityEntry {
    pub id: String,
    pub project_id: String,
    pub actor_id: String,
    pub kind: ActivityKind,
    pub detail: String,
    pub at: DateTime<Utc>,
}

/// Lowercased extension of a file name, empty when it has no `.` suffix.
pub fn file_extension(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_lowercase(),
        _ => String::new(),
    }
}

/// File name base reduced to a URL-safe slug: lowercased, alphanumeric runs
/// kept, everything else collapsed into single dashes.
pub fn storage_slug(name: &str) -> String {
    let base = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };
    let mut slug = String::with_capacity(base.len());
    let mut dash_pending = false;
    for c in base.chars() {
        if c.is_ascii_alphanumeric() {
            if dash_pending && !slug.is_empty() {
                slug.push('-');
            }
            dash_pending = false;
            slug.extend(c.to_lowercase());
        } else {
            dash_pending = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("file");
    }
    slug
}

impl Record for Company {
    const COLLECTION: &'static str = "companies";
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Area {
    const COLLECTION: &'static str = "areas";
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Position {
    const COLLECTION: &'static str = "positions";
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Worker {
    const COLLECTION: &'static str = "workers";
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Project {
    const COLLECTION: &'static str = "projects";
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Folder {
    const COLLECTION: &'static str = "folders";
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for FileRecord {
    const COLLECTION: &'static str = "files";
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for ActivityEntry {
    const COLLECTION: &'static str = "activity-log";
    fn id(&self) -> &str {
        &self.id
    }
}
