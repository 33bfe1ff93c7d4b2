//! Reference data, project lifecycle and the folder/file tree. Folders are a
//! flat collection with parent pointers, so moving a subtree rewrites exactly
//! one pointer; every mutation checks its invariants before persisting.

use crate::error::{StoreError, StoreResult};
use crate::ids::{Clock, IdProvider, SystemClock, UuidIds};
use crate::model::{
    file_extension, storage_slug, ActivityEntry, ActivityKind, Area, Company, FileRecord,
    FileState, Folder, Position, Project, ProjectMember, ProjectRole, ProjectStatus, Worker,
};
use crate::policy::{AccessRestriction, Requester};
use crate::store::EntityStore;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};


/// Direct children of one tree level: folders in display order, files with
/// only the active version of each document.
#[derive(Clone, Debug, Serialize)]
pub struct Listing {
    pub folders: Vec<Folder>,
    pub files: Vec<FileRecord>,
}

/// The single logical actor for all catalog and tree mutation. Wrap it in a
/// lock when sharing across tasks; nothing here is async.
pub struct ProjectStore {
    entities: EntityStore,
    ids: Arc<dyn IdProvider>,
    clock: Arc<dyn Clock>,
}

pub(crate) fn valid_name(name: &str) -> StoreResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StoreError::validation("name must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// Synthetic locator for a stored file. No bytes ever move; the locator is
/// derived from the sanitized base name so collaborators get a stable handle.
pub(crate) fn file_locator(
    project_id: &str,
    folder_id: &str,
    original_name: &str,
    version: u32,
) -> String {
    let slug = storage_slug(original_name);
    let ext = file_extension(original_name);
    if ext.is_empty() {
        format!("storage://{}/{}/{}-v{}", project_id, folder_id, slug, version)
    } else {
        format!(
            "storage://{}/{}/{}-v{}.{}",
            project_id, folder_id, slug, version, ext
        )
    }
}

impl ProjectStore {
    pub fn new(entities: EntityStore, ids: Arc<dyn IdProvider>, clock: Arc<dyn Clock>) -> Self {
        Self {
            entities,
            ids,
            clock,
        }
    }

    /// Disk-backed store under `dir` with production id/clock sources.
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        Ok(Self::new(
            EntityStore::open(dir)?,
            Arc::new(UuidIds),
            Arc::new(SystemClock),
        ))
    }

    pub fn in_memory() -> Self {
        Self::new(
            EntityStore::in_memory(),
            Arc::new(UuidIds),
            Arc::new(SystemClock),
        )
    }

    /// Direct access to the underlying collections.
    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut EntityStore {
        &mut self.entities
    }

    pub(crate) fn fresh_id(&self, prefix: &str) -> String {
        self.ids.fresh(prefix)
    }

    pub(crate) fn derived_id(&self, prefix: &str, seed: &str) -> String {
        self.ids.derived(prefix, seed)
    }

    pub(crate) fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    // --- reference data ---

    pub fn create_company(&mut self, name: &str, tax_id: Option<String>) -> StoreResult<Company> {
        let name = valid_name(name)?;
        self.entities.insert(Company {
            id: self.ids.fresh("company"),
            name,
            tax_id,
            created_at: self.clock.now(),
        })
    }

    pub fn create_area(&mut self, company_id: &str, name: &str) -> StoreResult<Area> {
        let name = valid_name(name)?;
        self.entities.require::<Company>(company_id)?;
        self.entities.insert(Area {
            id: self.ids.fresh("area"),
            company_id: company_id.to_string(),
            name,
        })
    }

    pub fn create_position(&mut self, name: &str) -> StoreResult<Position> {
        let name = valid_name(name)?;
        self.entities.insert(Position {
            id: self.ids.fresh("position"),
            name,
        })
    }

    pub fn create_worker(
        &mut self,
        company_id: &str,
        name: &str,
        email: &str,
        position_id: Option<String>,
        area_ids: Vec<String>,
    ) -> StoreResult<Worker> {
        let name = valid_name(name)?;
        self.entities.require::<Company>(company_id)?;
        self.entities.insert(Worker {
            id: self.ids.fresh("worker"),
            company_id: company_id.to_string(),
            name,
            email: email.to_string(),
            position_id,
            area_ids,
        })
    }

    // --- project lifecycle ---

    pub fn create_project(
        &mut self,
        company_id: &str,
        name: &str,
        code: Option<String>,
        area_ids: Vec<String>,
        creator_id: &str,
        creator_role: ProjectRole,
    ) -> StoreResult<Project> {
        let name = valid_name(name)?;
        self.entities.require::<Company>(company_id)?;
        let project = self.entities.insert(Project {
            id: self.ids.fresh("project"),
            company_id: company_id.to_string(),
            name,
            code,
            area_ids,
            status: ProjectStatus::Open,
            members: vec![ProjectMember {
                user_id: creator_id.to_string(),
                role: creator_role,
                area_id: None,
                assigned_at: self.clock.now(),
            }],
            created_at: self.clock.now(),
        })?;
        self.log(
            &project.id,
            creator_id,
            ActivityKind::ProjectCreated,
            format!("created project '{}'", project.name),
        )?;
        info!(project = %project.id, "project created");
        Ok(project)
    }

    /// Add a member to the project. A user may appear in the member list at
    /// most once.
    pub fn add_member(
        &mut self,
        project_id: &str,
        user_id: &str,
        role: ProjectRole,
        area_id: Option<String>,
        actor_id: &str,
    ) -> StoreResult<Project> {
        let project = self.entities.require::<Project>(project_id)?;
        if project.is_member(user_id) {
            return Err(StoreError::validation(format!(
                "user {} is already a member of project {}",
                user_id, project_id
            )));
        }
        let member = ProjectMember {
            user_id: user_id.to_string(),
            role,
            area_id,
            assigned_at: self.clock.now(),
        };
        let updated = self
            .entities
            .update::<Project>(project_id, |p| p.members.push(member))?;
        self.log(
            project_id,
            actor_id,
            ActivityKind::MemberAdded,
            format!("added member {}", user_id),
        )?;
        Ok(updated)
    }

    /// Close an open project. Interactive uploads stop here; only the central
    /// office can still deliver material, through bulk import.
    pub fn close_project(&mut self, project_id: &str, actor: &Requester) -> StoreResult<Project> {
        if !matches!(
            actor.role,
            ProjectRole::Manager | ProjectRole::CentralOffice
        ) {
            return Err(StoreError::denied("only managers may close a project"));
        }
        let project = self.entities.require::<Project>(project_id)?;
        if project.status != ProjectStatus::Open {
            return Err(StoreError::validation("project is not open"));
        }
        let updated = self
            .entities
            .update::<Project>(project_id, |p| p.status = ProjectStatus::Closed)?;
        self.log(
            project_id,
            &actor.user_id,
            ActivityKind::ProjectClosed,
            "closed project".to_string(),
        )?;
        info!(project = %project_id, "project closed");
        Ok(updated)
    }

    /// Final lifecycle step, reserved to the central office.
    pub fn approve_project(&mut self, project_id: &str, actor: &Requester) -> StoreResult<Project> {
        if actor.role != ProjectRole::CentralOffice {
            return Err(StoreError::denied(
                "only the central office may approve a project",
            ));
        }
        let project = self.entities.require::<Project>(project_id)?;
        if project.status != ProjectStatus::Closed {
            return Err(StoreError::validation("only closed projects can be approved"));
        }
        let updated = self
            .entities
            .update::<Project>(project_id, |p| p.status = ProjectStatus::Approved)?;
        self.log(
            project_id,
            &actor.user_id,
            ActivityKind::ProjectApproved,
            "approved project".to_string(),
        )?;
        info!(project = %project_id, "project approved");
        Ok(updated)
    }

    /// Resolve the acting identity for one project: the member's role plus
    /// area memberships from both the member entry and the worker record.
    pub fn requester_for(&self, project_id: &str, user_id: &str) -> StoreResult<Requester> {
        let project = self.entities.require::<Project>(project_id)?;
        let member = project
            .member(user_id)
            .ok_or_else(|| StoreError::denied(format!("{} is not a project member", user_id)))?;
        let mut area_ids: Vec<String> = member.area_id.iter().cloned().collect();
        if let Some(worker) = self.entities.get::<Worker>(user_id)? {
            for area in worker.area_ids {
                if !area_ids.contains(&area) {
                    area_ids.push(area);
                }
            }
        }
        Ok(Requester::new(user_id, member.role, area_ids))
    }

    // --- folder tree ---

    /// Direct children of `parent_id` (`None` = project top level). Folders
    /// sort by `order` then name; only active files are returned.
    pub fn list_children(
        &self,
        project_id: &str,
        parent_id: Option<&str>,
    ) -> StoreResult<Listing> {
        self.entities.require::<Project>(project_id)?;
        if let Some(pid) = parent_id {
            let parent = self.entities.require::<Folder>(pid)?;
            if parent.project_id != project_id {
                return Err(StoreError::CrossProject(format!("folder {}", pid)));
            }
        }
        let mut folders = self
            .entities
            .find::<Folder>(|f| f.project_id == project_id && f.parent_id.as_deref() == parent_id)?;
        folders.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
        let files = match parent_id {
            Some(pid) => self
                .entities
                .find::<FileRecord>(|f| f.folder_id == pid && f.is_active())?,
            None => Vec::new(),
        };
        Ok(Listing { folders, files })
    }

    /// [`list_children`](Self::list_children) filtered to what `requester`
    /// may see. Listing inside a folder the requester cannot see is denied.
    pub fn visible_children(
        &self,
        project_id: &str,
        parent_id: Option<&str>,
        requester: &Requester,
    ) -> StoreResult<Listing> {
        if let Some(pid) = parent_id {
            let parent = self.entities.require::<Folder>(pid)?;
            if !parent.restriction.allows(requester) {
                return Err(StoreError::denied(format!("folder {} is restricted", pid)));
            }
        }
        let mut listing = self.list_children(project_id, parent_id)?;
        listing.folders.retain(|f| f.restriction.allows(requester));
        Ok(listing)
    }

    pub fn create_folder(
        &mut self,
        project_id: &str,
        parent_id: Option<&str>,
        name: &str,
        description: Option<String>,
        restriction: AccessRestriction,
        actor: &Requester,
    ) -> StoreResult<Folder> {
        // reject bad names before any id or order slot is spent
        let name = valid_name(name)?;
        self.entities.require::<Project>(project_id)?;
        if let Some(pid) = parent_id {
            let parent = self.entities.require::<Folder>(pid)?;
            if parent.project_id != project_id {
                return Err(StoreError::CrossProject(format!("folder {}", pid)));
            }
            if !parent.restriction.allows_write(actor) {
                return Err(StoreError::denied(format!("folder {} is restricted", pid)));
            }
        }
        let order = self
            .entities
            .find::<Folder>(|f| f.project_id == project_id && f.parent_id.as_deref() == parent_id)?
            .len() as u32;
        let folder = self.entities.insert(Folder {
            id: self.ids.fresh("folder"),
            project_id: project_id.to_string(),
            parent_id: parent_id.map(str::to_string),
            name,
            description,
            order,
            restriction,
            created_by: actor.user_id.clone(),
            created_at: self.clock.now(),
        })?;
        self.log(
            project_id,
            &actor.user_id,
            ActivityKind::FolderCreated,
            format!("created folder '{}'", folder.name),
        )?;
        debug!(folder = %folder.id, project = %project_id, "folder created");
        Ok(folder)
    }

    pub fn rename_folder(
        &mut self,
        folder_id: &str,
        new_name: &str,
        actor: &Requester,
    ) -> StoreResult<Folder> {
        let new_name = valid_name(new_name)?;
        let folder = self.entities.require::<Folder>(folder_id)?;
        if !folder.restriction.allows_write(actor) {
            return Err(StoreError::denied(format!(
                "folder {} is restricted",
                folder_id
            )));
        }
        let old_name = folder.name;
        let updated = self
            .entities
            .update::<Folder>(folder_id, |f| f.name = new_name)?;
        self.log(
            &updated.project_id,
            &actor.user_id,
            ActivityKind::FolderRenamed,
            format!("renamed folder '{}' to '{}'", old_name, updated.name),
        )?;
        Ok(updated)
    }

    /// Re-parent a folder. `new_parent = None` moves it to the project top
    /// level. The target must live in the same project and must not be the
    /// folder itself or any of its descendants.
    pub fn move_folder(
        &mut self,
        folder_id: &str,
        new_parent: Option<&str>,
        actor: &Requester,
    ) -> StoreResult<Folder> {
        let folder = self.entities.require::<Folder>(folder_id)?;
        if !folder.restriction.allows_write(actor) {
            return Err(StoreError::denied(format!(
                "folder {} is restricted",
                folder_id
            )));
        }
        // all invariant checks happen before anything is persisted
        if let Some(target_id) = new_parent {
            let target = self.entities.require::<Folder>(target_id)?;
            if target.project_id != folder.project_id {
                return Err(StoreError::CrossProject(format!("folder {}", target_id)));
            }
            let descendants = self.descendant_folder_ids(folder_id)?;
            if descendants.iter().any(|d| d == target_id) {
                return Err(StoreError::Cycle {
                    folder_id: folder_id.to_string(),
                    target_id: target_id.to_string(),
                });
            }
            if !target.restriction.allows_write(actor) {
                return Err(StoreError::denied(format!(
                    "folder {} is restricted",
                    target_id
                )));
            }
        }
        let updated = self
            .entities
            .update::<Folder>(folder_id, |f| f.parent_id = new_parent.map(str::to_string))?;
        self.log(
            &updated.project_id,
            &actor.user_id,
            ActivityKind::FolderMoved,
            format!("moved folder '{}'", updated.name),
        )?;
        debug!(folder = %folder_id, new_parent = ?new_parent, "folder moved");
        Ok(updated)
    }

    /// The folder itself plus every folder below it, pre-order.
    pub fn descendant_folder_ids(&self, folder_id: &str) -> StoreResult<Vec<String>> {
        let folders = self.entities.all::<Folder>()?;
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for f in &folders {
            if let Some(parent) = f.parent_id.as_deref() {
                children.entry(parent).or_default().push(&f.id);
            }
        }
        fn gather(children: &HashMap<&str, Vec<&str>>, id: &str, out: &mut Vec<String>) {
            out.push(id.to_string());
            if let Some(kids) = children.get(id) {
                for kid in kids {
                    gather(children, kid, out);
                }
            }
        }
        let mut ids = Vec::new();
        gather(&children, folder_id, &mut ids);
        Ok(ids)
    }

    /// Cascade delete: the folder, every descendant folder, and a soft
    /// delete of every file underneath. Returns how many folders went away.
    pub fn delete_folder(&mut self, folder_id: &str, actor: &Requester) -> StoreResult<usize> {
        let folder = self.entities.require::<Folder>(folder_id)?;
        if !folder.restriction.allows_write(actor) {
            return Err(StoreError::denied(format!(
                "folder {} is restricted",
                folder_id
            )));
        }
        let doomed = self.descendant_folder_ids(folder_id)?;
        let mut files = self.entities.all::<FileRecord>()?;
        for file in files.iter_mut() {
            if doomed.contains(&file.folder_id) && file.state != FileState::Deleted {
                file.state = FileState::Deleted;
            }
        }
        self.entities.replace_all(files)?;
        let mut folders = self.entities.all::<Folder>()?;
        folders.retain(|f| !doomed.contains(&f.id));
        self.entities.replace_all(folders)?;
        self.log(
            &folder.project_id,
            &actor.user_id,
            ActivityKind::FolderDeleted,
            format!(
                "deleted folder '{}' and {} nested folders",
                folder.name,
                doomed.len() - 1
            ),
        )?;
        info!(folder = %folder_id, removed = doomed.len(), "folder subtree deleted");
        Ok(doomed.len())
    }

    /// Root-to-folder chain, for breadcrumb seeding and path display.
    pub fn folder_path(&self, folder_id: &str) -> StoreResult<Vec<Folder>> {
        let mut chain = Vec::new();
        let mut current = Some(folder_id.to_string());
        while let Some(id) = current {
            let folder = self.entities.require::<Folder>(&id)?;
            current = folder.parent_id.clone();
            chain.push(folder);
        }
        chain.reverse();
        Ok(chain)
    }

    // --- files ---

    /// Register an uploaded document. Interactive uploads only land in open
    /// projects; the folder restriction decides who may write.
    pub fn add_file(
        &mut self,
        folder_id: &str,
        original_name: &str,
        mime_type: &str,
        size_bytes: u64,
        actor: &Requester,
    ) -> StoreResult<FileRecord> {
        let name = valid_name(original_name)?;
        let folder = self.entities.require::<Folder>(folder_id)?;
        let project = self.entities.require::<Project>(&folder.project_id)?;
        if !project.is_open() {
            return Err(StoreError::ProjectClosed(project.id));
        }
        if !folder.restriction.allows_write(actor) {
            return Err(StoreError::denied(format!(
                "folder {} is restricted",
                folder_id
            )));
        }
        let record = self.entities.insert(FileRecord {
            id: self.ids.fresh("file"),
            project_id: folder.project_id.clone(),
            folder_id: folder_id.to_string(),
            name,
            original_name: original_name.to_string(),
            mime_type: mime_type.to_string(),
            size_bytes,
            extension: file_extension(original_name),
            storage_url: file_locator(&folder.project_id, folder_id, original_name, 1),
            version: 1,
            state: FileState::Active,
            uploaded_by: actor.user_id.clone(),
            uploaded_at: self.clock.now(),
        })?;
        self.log(
            &folder.project_id,
            &actor.user_id,
            ActivityKind::FileAdded,
            format!("added file '{}'", record.name),
        )?;
        debug!(file = %record.id, folder = %folder_id, "file added");
        Ok(record)
    }

    /// Upload a new version: the old record flips to `Obsolete` and a fresh
    /// record with the next version number becomes the active one.
    pub fn replace_file(
        &mut self,
        file_id: &str,
        original_name: &str,
        mime_type: &str,
        size_bytes: u64,
        actor: &Requester,
    ) -> StoreResult<FileRecord> {
        let name = valid_name(original_name)?;
        let old = self.entities.require::<FileRecord>(file_id)?;
        if !old.is_active() {
            return Err(StoreError::validation("only the active version can be replaced"));
        }
        let folder = self.entities.require::<Folder>(&old.folder_id)?;
        let project = self.entities.require::<Project>(&old.project_id)?;
        if !project.is_open() {
            return Err(StoreError::ProjectClosed(project.id));
        }
        if !folder.restriction.allows_write(actor) {
            return Err(StoreError::denied(format!(
                "folder {} is restricted",
                old.folder_id
            )));
        }
        self.entities
            .update::<FileRecord>(file_id, |f| f.state = FileState::Obsolete)?;
        let record = self.entities.insert(FileRecord {
            id: self.ids.fresh("file"),
            project_id: old.project_id.clone(),
            folder_id: old.folder_id.clone(),
            name,
            original_name: original_name.to_string(),
            mime_type: mime_type.to_string(),
            size_bytes,
            extension: file_extension(original_name),
            storage_url: file_locator(
                &old.project_id,
                &old.folder_id,
                original_name,
                old.version + 1,
            ),
            version: old.version + 1,
            state: FileState::Active,
            uploaded_by: actor.user_id.clone(),
            uploaded_at: self.clock.now(),
        })?;
        self.log(
            &old.project_id,
            &actor.user_id,
            ActivityKind::FileReplaced,
            format!("replaced file '{}' with version {}", record.name, record.version),
        )?;
        Ok(record)
    }

    /// Move a file to another folder of the same project.
    pub fn move_file(
        &mut self,
        file_id: &str,
        new_folder_id: &str,
        actor: &Requester,
    ) -> StoreResult<FileRecord> {
        let file = self.entities.require::<FileRecord>(file_id)?;
        if !file.is_active() {
            return Err(StoreError::validation("only active files can be moved"));
        }
        let source = self.entities.require::<Folder>(&file.folder_id)?;
        let target = self.entities.require::<Folder>(new_folder_id)?;
        if target.project_id != file.project_id {
            return Err(StoreError::CrossProject(format!("folder {}", new_folder_id)));
        }
        if !source.restriction.allows_write(actor) || !target.restriction.allows_write(actor) {
            return Err(StoreError::denied("source or target folder is restricted"));
        }
        let updated = self
            .entities
            .update::<FileRecord>(file_id, |f| f.folder_id = new_folder_id.to_string())?;
        self.log(
            &updated.project_id,
            &actor.user_id,
            ActivityKind::FileMoved,
            format!("moved file '{}'", updated.name),
        )?;
        Ok(updated)
    }

    /// Soft delete. Repeating the call is a no-op.
    pub fn delete_file(&mut self, file_id: &str, actor: &Requester) -> StoreResult<FileRecord> {
        let file = self.entities.require::<FileRecord>(file_id)?;
        if file.state == FileState::Deleted {
            return Ok(file);
        }
        let folder = self.entities.require::<Folder>(&file.folder_id)?;
        if !folder.restriction.allows_write(actor) {
            return Err(StoreError::denied(format!(
                "folder {} is restricted",
                file.folder_id
            )));
        }
        let updated = self
            .entities
            .update::<FileRecord>(file_id, |f| f.state = FileState::Deleted)?;
        self.log(
            &updated.project_id,
            &actor.user_id,
            ActivityKind::FileDeleted,
            format!("deleted file '{}'", updated.name),
        )?;
        Ok(updated)
    }

    // --- activity log ---

    /// Append one audit entry. The log is never rewritten.
    pub(crate) fn log(
        &mut self,
        project_id: &str,
        actor_id: &str,
        kind: ActivityKind,
        detail: String,
    ) -> StoreResult<()> {
        self.entities.insert(ActivityEntry {
            id: self.ids.fresh("activity"),
            project_id: project_id.to_string(),
            actor_id: actor_id.to_string(),
            kind,
            detail,
            at: self.clock.now(),
        })?;
        Ok(())
    }

    /// Chronological activity for one project (append order).
    pub fn activity(&self, project_id: &str) -> StoreResult<Vec<ActivityEntry>> {
        self.entities
            .find::<ActivityEntry>(|e| e.project_id == project_id)
    }
}
