//! Bulk commit of a prepared folder/file tree, used to deliver certified
//! document sets in one shot. Traversal is depth-first pre-order so a folder
//! always exists before anything inside it; ids derive from tree position so
//! a retry after a partial failure completes instead of duplicating.

use crate::error::{StoreError, StoreResult};
use crate::model::{
    file_extension, ActivityKind, FileRecord, FileState, Folder, Project, ProjectRole,
};
use crate::policy::{AccessRestriction, Requester};
use crate::tree::{file_locator, valid_name, ProjectStore};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingFile {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingFolder {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub files: Vec<PendingFile>,
    #[serde(default)]
    pub children: Vec<PendingFolder>,
}

/// Reconstructed from actual inserts, so the caller can check the commit
/// against the tree it submitted.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportReport {
    pub folders_created: usize,
    pub files_created: usize,
}

fn validate(roots: &[PendingFolder]) -> StoreResult<()> {
    for folder in roots {
        valid_name(&folder.name)?;
        for file in &folder.files {
            valid_name(&file.name)?;
        }
        validate(&folder.children)?;
    }
    Ok(())
}

impl ProjectStore {
    /// Commit `roots` under the project top level. Every imported folder is
    /// tagged final: readable by all members, writable only by the central
    /// office afterwards. While the project is open any member may import;
    /// once closed only the central office still can.
    pub fn import_tree(
        &mut self,
        project_id: &str,
        roots: &[PendingFolder],
        actor: &Requester,
    ) -> StoreResult<ImportReport> {
        let project = self.entities().require::<Project>(project_id)?;
        if !project.is_open() && actor.role != ProjectRole::CentralOffice {
            return Err(StoreError::denied(
                "only the central office may import into a closed project",
            ));
        }
        // the whole tree is validated before anything is committed
        validate(roots)?;
        let mut report = ImportReport::default();
        for pending in roots {
            self.import_folder(project_id, None, pending, actor, &mut report)?;
        }
        self.log(
            project_id,
            &actor.user_id,
            ActivityKind::TreeImported,
            format!(
                "imported {} folders and {} files",
                report.folders_created, report.files_created
            ),
        )?;
        info!(
            project = %project_id,
            folders = report.folders_created,
            files = report.files_created,
            "tree imported"
        );
        Ok(report)
    }

    fn import_folder(
        &mut self,
        project_id: &str,
        parent_id: Option<&str>,
        pending: &PendingFolder,
        actor: &Requester,
        report: &mut ImportReport,
    ) -> StoreResult<()> {
        let name = valid_name(&pending.name)?;
        let seed = format!("{}/{}/{}", project_id, parent_id.unwrap_or("top"), name);
        let folder_id = self.derived_id("folder", &seed);
        if self.entities().get::<Folder>(&folder_id)?.is_none() {
            let order = self
                .entities()
                .find::<Folder>(|f| {
                    f.project_id == project_id && f.parent_id.as_deref() == parent_id
                })?
                .len() as u32;
            let now = self.now();
            self.entities_mut().insert(Folder {
                id: folder_id.clone(),
                project_id: project_id.to_string(),
                parent_id: parent_id.map(str::to_string),
                name,
                description: pending.description.clone(),
                order,
                restriction: AccessRestriction::Final,
                created_by: actor.user_id.clone(),
                created_at: now,
            })?;
            report.folders_created += 1;
        }
        for file in &pending.files {
            self.import_file(project_id, &folder_id, file, actor, report)?;
        }
        for child in &pending.children {
            self.import_folder(project_id, Some(&folder_id), child, actor, report)?;
        }
        Ok(())
    }

    fn import_file(
        &mut self,
        project_id: &str,
        folder_id: &str,
        pending: &PendingFile,
        actor: &Requester,
        report: &mut ImportReport,
    ) -> StoreResult<()> {
        let name = valid_name(&pending.name)?;
        let seed = format!("{}/{}/{}", project_id, folder_id, name);
        let file_id = self.derived_id("file", &seed);
        if self.entities().get::<FileRecord>(&file_id)?.is_some() {
            return Ok(());
        }
        let now = self.now();
        self.entities_mut().insert(FileRecord {
            id: file_id,
            project_id: project_id.to_string(),
            folder_id: folder_id.to_string(),
            name,
            original_name: pending.name.clone(),
            mime_type: pending.mime_type.clone(),
            size_bytes: pending.size_bytes,
            extension: file_extension(&pending.name),
            storage_url: file_locator(project_id, folder_id, &pending.name, 1),
            version: 1,
            state: FileState::Active,
            uploaded_by: actor.user_id.clone(),
            uploaded_at: now,
        })?;
        report.files_created += 1;
        Ok(())
    }
}
