//! HTTP API layer exposing the project catalog and folder tree.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        FromRequestParts, Path, Query, State,
    },
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use project_hub_core::error::StoreError;
use project_hub_core::events::{Event, EventBus};
use project_hub_core::import::{ImportReport, PendingFolder};
use project_hub_core::model::{ActivityEntry, FileRecord, Folder, Project, ProjectRole};
use project_hub_core::nav::Breadcrumbs;
use project_hub_core::policy::AccessRestriction;
use project_hub_core::tree::{Listing, ProjectStore};

/// Identity extracted from request headers. Session security is out of
/// scope; the `X-User-Id` header (or a bearer token carrying the user id)
/// is the seam a real session layer would fill.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub user_id: String,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;
        if let Some(user_id) = headers.get("X-User-Id").and_then(|v| v.to_str().ok()) {
            return Ok(Self {
                user_id: user_id.to_string(),
            });
        }
        if let Some(auth) = headers.get("Authorization").and_then(|v| v.to_str().ok()) {
            if let Some(user_id) = auth.strip_prefix("Bearer ") {
                return Ok(Self {
                    user_id: user_id.to_string(),
                });
            }
        }
        Err(StatusCode::UNAUTHORIZED)
    }
}

/// Shared application state: the store behind one writer lock plus the
/// event bus the websocket endpoint drains.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<ProjectStore>>,
    pub events: EventBus,
}

#[derive(Deserialize)]
struct ProjectCreateRequest {
    company_id: String,
    name: String,
    code: Option<String>,
    #[serde(default)]
    area_ids: Vec<String>,
    /// Role the creator takes on the new project, manager by default.
    role: Option<ProjectRole>,
}

#[derive(Deserialize)]
struct MemberRequest {
    user_id: String,
    role: ProjectRole,
    area_id: Option<String>,
}

#[derive(Deserialize)]
struct ChildrenParams {
    parent: Option<String>,
}

#[derive(Deserialize)]
struct FolderCreateRequest {
    parent_id: Option<String>,
    name: String,
    description: Option<String>,
    restriction: Option<AccessRestriction>,
}

#[derive(Deserialize)]
struct MoveFolderRequest {
    new_parent_id: Option<String>,
}

#[derive(Deserialize)]
struct RenameRequest {
    name: String,
}

#[derive(Deserialize)]
struct FileCreateRequest {
    name: String,
    mime_type: String,
    size_bytes: u64,
}

#[derive(Deserialize)]
struct FileMoveRequest {
    new_folder_id: String,
}

#[derive(Deserialize)]
struct ImportRequest {
    roots: Vec<PendingFolder>,
}

pub fn router(store: Arc<RwLock<ProjectStore>>, events: EventBus) -> Router {
    let app_state = AppState { store, events };
    Router::new()
        .route("/projects", post(create_project).get(list_projects))
        .route("/projects/{id}", get(get_project))
        .route("/projects/{id}/members", post(add_member))
        .route("/projects/{id}/close", post(close_project))
        .route("/projects/{id}/approve", post(approve_project))
        .route("/projects/{id}/children", get(list_children))
        .route("/projects/{id}/folders", post(create_folder))
        .route("/projects/{id}/import", post(import_tree))
        .route("/projects/{id}/activity", get(list_activity))
        .route("/folders/{id}/move", put(move_folder))
        .route("/folders/{id}/rename", put(rename_folder))
        .route("/folders/{id}/path", get(folder_path))
        .route("/folders/{id}", delete(delete_folder))
        .route("/folders/{id}/files", post(add_file))
        .route("/files/{id}/move", put(move_file))
        .route("/files/{id}/replace", post(replace_file))
        .route("/files/{id}", delete(delete_file))
        .route("/ws", get(events_ws))
        .with_state(app_state)
}

fn status_for(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::DuplicateId { .. } | StoreError::ProjectClosed(_) => StatusCode::CONFLICT,
        StoreError::Validation(_) | StoreError::Cycle { .. } | StoreError::CrossProject(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        StoreError::AccessDenied(_) => StatusCode::FORBIDDEN,
        StoreError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::Corrupt { .. } | StoreError::Encode { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn fail(op: &str, err: StoreError) -> StatusCode {
    warn!(error = %err, "{} failed", op);
    status_for(&err)
}

async fn create_project(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<ProjectCreateRequest>,
) -> Result<Json<Project>, StatusCode> {
    let mut store = state.store.write().await;
    let role = req.role.unwrap_or(ProjectRole::Manager);
    match store.create_project(
        &req.company_id,
        &req.name,
        req.code,
        req.area_ids,
        &auth.user_id,
        role,
    ) {
        Ok(project) => {
            drop(store);
            state.events.send(Event::ProjectCreated {
                id: project.id.clone(),
            });
            Ok(Json(project))
        }
        Err(err) => Err(fail("create project", err)),
    }
}

/// Projects the caller is a member of.
async fn list_projects(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<Project>>, StatusCode> {
    let store = state.store.read().await;
    match store
        .entities()
        .find::<Project>(|p| p.is_member(&auth.user_id))
    {
        Ok(projects) => Ok(Json(projects)),
        Err(err) => Err(fail("list projects", err)),
    }
}

async fn get_project(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<Project>, StatusCode> {
    let store = state.store.read().await;
    match store.entities().get::<Project>(&id) {
        Ok(Some(project)) => {
            if project.is_member(&auth.user_id) {
                Ok(Json(project))
            } else {
                Err(StatusCode::FORBIDDEN)
            }
        }
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(err) => Err(fail("get project", err)),
    }
}

async fn add_member(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(req): Json<MemberRequest>,
) -> Result<Json<Project>, StatusCode> {
    let mut store = state.store.write().await;
    let requester = match store.requester_for(&id, &auth.user_id) {
        Ok(r) => r,
        Err(err) => return Err(fail("add member", err)),
    };
    if !matches!(
        requester.role,
        ProjectRole::Manager | ProjectRole::CentralOffice
    ) {
        return Err(StatusCode::FORBIDDEN);
    }
    match store.add_member(&id, &req.user_id, req.role, req.area_id, &auth.user_id) {
        Ok(project) => Ok(Json(project)),
        Err(err) => Err(fail("add member", err)),
    }
}

async fn close_project(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<Project>, StatusCode> {
    let mut store = state.store.write().await;
    let requester = match store.requester_for(&id, &auth.user_id) {
        Ok(r) => r,
        Err(err) => return Err(fail("close project", err)),
    };
    match store.close_project(&id, &requester) {
        Ok(project) => {
            drop(store);
            state.events.send(Event::ProjectClosed { id });
            Ok(Json(project))
        }
        Err(err) => Err(fail("close project", err)),
    }
}

async fn approve_project(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<Project>, StatusCode> {
    let mut store = state.store.write().await;
    let requester = match store.requester_for(&id, &auth.user_id) {
        Ok(r) => r,
        Err(err) => return Err(fail("approve project", err)),
    };
    match store.approve_project(&id, &requester) {
        Ok(project) => {
            drop(store);
            state.events.send(Event::ProjectApproved { id });
            Ok(Json(project))
        }
        Err(err) => Err(fail("approve project", err)),
    }
}

/// Children of one tree level, filtered to what the caller may see.
/// `?parent=<folder id>` descends; omitting it lists the top level.
async fn list_children(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    Query(params): Query<ChildrenParams>,
) -> Result<Json<Listing>, StatusCode> {
    let store = state.store.read().await;
    let requester = match store.requester_for(&id, &auth.user_id) {
        Ok(r) => r,
        Err(err) => return Err(fail("list children", err)),
    };
    match store.visible_children(&id, params.parent.as_deref(), &requester) {
        Ok(listing) => Ok(Json(listing)),
        Err(err) => Err(fail("list children", err)),
    }
}

async fn create_folder(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(req): Json<FolderCreateRequest>,
) -> Result<Json<Folder>, StatusCode> {
    let mut store = state.store.write().await;
    let requester = match store.requester_for(&id, &auth.user_id) {
        Ok(r) => r,
        Err(err) => return Err(fail("create folder", err)),
    };
    let restriction = req.restriction.unwrap_or(AccessRestriction::Public);
    match store.create_folder(
        &id,
        req.parent_id.as_deref(),
        &req.name,
        req.description,
        restriction,
        &requester,
    ) {
        Ok(folder) => {
            drop(store);
            state.events.send(Event::FolderCreated {
                id: folder.id.clone(),
                project_id: id,
            });
            Ok(Json(folder))
        }
        Err(err) => Err(fail("create folder", err)),
    }
}

async fn import_tree(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(req): Json<ImportRequest>,
) -> Result<Json<ImportReport>, StatusCode> {
    let mut store = state.store.write().await;
    let requester = match store.requester_for(&id, &auth.user_id) {
        Ok(r) => r,
        Err(err) => return Err(fail("import tree", err)),
    };
    match store.import_tree(&id, &req.roots, &requester) {
        Ok(report) => {
            drop(store);
            state.events.send(Event::TreeImported {
                project_id: id,
                folders: report.folders_created,
                files: report.files_created,
            });
            Ok(Json(report))
        }
        Err(err) => Err(fail("import tree", err)),
    }
}

async fn list_activity(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<Vec<ActivityEntry>>, StatusCode> {
    let store = state.store.read().await;
    if let Err(err) = store.requester_for(&id, &auth.user_id) {
        return Err(fail("list activity", err));
    }
    match store.activity(&id) {
        Ok(entries) => Ok(Json(entries)),
        Err(err) => Err(fail("list activity", err)),
    }
}

async fn move_folder(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(req): Json<MoveFolderRequest>,
) -> Result<Json<Folder>, StatusCode> {
    let mut store = state.store.write().await;
    let folder = match store.entities().get::<Folder>(&id) {
        Ok(Some(f)) => f,
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(err) => return Err(fail("move folder", err)),
    };
    let requester = match store.requester_for(&folder.project_id, &auth.user_id) {
        Ok(r) => r,
        Err(err) => return Err(fail("move folder", err)),
    };
    match store.move_folder(&id, req.new_parent_id.as_deref(), &requester) {
        Ok(folder) => {
            drop(store);
            state.events.send(Event::FolderMoved {
                id,
                new_parent: folder.parent_id.clone(),
            });
            Ok(Json(folder))
        }
        Err(err) => Err(fail("move folder", err)),
    }
}

async fn rename_folder(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Result<Json<Folder>, StatusCode> {
    let mut store = state.store.write().await;
    let folder = match store.entities().get::<Folder>(&id) {
        Ok(Some(f)) => f,
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(err) => return Err(fail("rename folder", err)),
    };
    let requester = match store.requester_for(&folder.project_id, &auth.user_id) {
        Ok(r) => r,
        Err(err) => return Err(fail("rename folder", err)),
    };
    match store.rename_folder(&id, &req.name, &requester) {
        Ok(folder) => {
            drop(store);
            state.events.send(Event::FolderRenamed { id });
            Ok(Json(folder))
        }
        Err(err) => Err(fail("rename folder", err)),
    }
}

/// Breadcrumb trail from the project top level down to the folder.
async fn folder_path(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<Breadcrumbs>, StatusCode> {
    let store = state.store.read().await;
    let folder = match store.entities().get::<Folder>(&id) {
        Ok(Some(f)) => f,
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(err) => return Err(fail("folder path", err)),
    };
    let project = match store.entities().get::<Project>(&folder.project_id) {
        Ok(Some(p)) => p,
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(err) => return Err(fail("folder path", err)),
    };
    if !project.is_member(&auth.user_id) {
        return Err(StatusCode::FORBIDDEN);
    }
    match store.folder_path(&id) {
        Ok(path) => Ok(Json(Breadcrumbs::for_path(project.name, &path))),
        Err(err) => Err(fail("folder path", err)),
    }
}

async fn delete_folder(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> StatusCode {
    let mut store = state.store.write().await;
    let folder = match store.entities().get::<Folder>(&id) {
        Ok(Some(f)) => f,
        Ok(None) => return StatusCode::NOT_FOUND,
        Err(err) => return fail("delete folder", err),
    };
    let requester = match store.requester_for(&folder.project_id, &auth.user_id) {
        Ok(r) => r,
        Err(err) => return fail("delete folder", err),
    };
    match store.delete_folder(&id, &requester) {
        Ok(_) => {
            drop(store);
            state.events.send(Event::FolderDeleted { id });
            StatusCode::NO_CONTENT
        }
        Err(err) => fail("delete folder", err),
    }
}

async fn add_file(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(req): Json<FileCreateRequest>,
) -> Result<Json<FileRecord>, StatusCode> {
    let mut store = state.store.write().await;
    let folder = match store.entities().get::<Folder>(&id) {
        Ok(Some(f)) => f,
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(err) => return Err(fail("add file", err)),
    };
    let requester = match store.requester_for(&folder.project_id, &auth.user_id) {
        Ok(r) => r,
        Err(err) => return Err(fail("add file", err)),
    };
    match store.add_file(&id, &req.name, &req.mime_type, req.size_bytes, &requester) {
        Ok(file) => {
            drop(store);
            state.events.send(Event::FileAdded {
                id: file.id.clone(),
                folder_id: id,
            });
            Ok(Json(file))
        }
        Err(err) => Err(fail("add file", err)),
    }
}

async fn move_file(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(req): Json<FileMoveRequest>,
) -> Result<Json<FileRecord>, StatusCode> {
    let mut store = state.store.write().await;
    let file = match store.entities().get::<FileRecord>(&id) {
        Ok(Some(f)) => f,
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(err) => return Err(fail("move file", err)),
    };
    let requester = match store.requester_for(&file.project_id, &auth.user_id) {
        Ok(r) => r,
        Err(err) => return Err(fail("move file", err)),
    };
    match store.move_file(&id, &req.new_folder_id, &requester) {
        Ok(file) => {
            drop(store);
            state.events.send(Event::FileMoved {
                id,
                new_folder: file.folder_id.clone(),
            });
            Ok(Json(file))
        }
        Err(err) => Err(fail("move file", err)),
    }
}

async fn replace_file(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(req): Json<FileCreateRequest>,
) -> Result<Json<FileRecord>, StatusCode> {
    let mut store = state.store.write().await;
    let file = match store.entities().get::<FileRecord>(&id) {
        Ok(Some(f)) => f,
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(err) => return Err(fail("replace file", err)),
    };
    let requester = match store.requester_for(&file.project_id, &auth.user_id) {
        Ok(r) => r,
        Err(err) => return Err(fail("replace file", err)),
    };
    match store.replace_file(&id, &req.name, &req.mime_type, req.size_bytes, &requester) {
        Ok(file) => {
            drop(store);
            state.events.send(Event::FileReplaced {
                id: file.id.clone(),
                supersedes: id,
            });
            Ok(Json(file))
        }
        Err(err) => Err(fail("replace file", err)),
    }
}

async fn delete_file(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> StatusCode {
    let mut store = state.store.write().await;
    let file = match store.entities().get::<FileRecord>(&id) {
        Ok(Some(f)) => f,
        Ok(None) => return StatusCode::NOT_FOUND,
        Err(err) => return fail("delete file", err),
    };
    let requester = match store.requester_for(&file.project_id, &auth.user_id) {
        Ok(r) => r,
        Err(err) => return fail("delete file", err),
    };
    match store.delete_file(&id, &requester) {
        Ok(_) => {
            drop(store);
            state.events.send(Event::FileDeleted { id });
            StatusCode::NO_CONTENT
        }
        Err(err) => fail("delete file", err),
    }
}

/// Stream every domain event to the client as JSON text frames.
async fn events_ws(
    State(state): State<AppState>,
    _auth: AuthContext,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_events(socket, state))
}

async fn stream_events(mut socket: WebSocket, state: AppState) {
    let mut rx = state.events.subscribe();
    while let Ok(event) = rx.recv().await {
        let Ok(text) = serde_json::to_string(&event) else {
            continue;
        };
        if socket.send(Message::Text(text.into())).await.is_err() {
            break;
        }
    }
}
