use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    ProjectCreated { id: String },
    ProjectClosed { id: String },
    ProjectApproved { id: String },
    FolderCreated { id: String, project_id: String },
    FolderRenamed { id: String },
    FolderMoved { id: String, new_parent: Option<String> },
    FolderDeleted { id: String },
    FileAdded { id: String, folder_id: String },
    FileReplaced { id: String, supersedes: String },
    FileMoved { id: String, new_folder: String },
    FileDeleted { id: String },
    TreeImported { project_id: String, folders: usize, files: usize },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn send(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}
