//! Error taxonomy shared by every core module. The service layer maps these
//! onto HTTP statuses, so variants stay coarse and machine-matchable.

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{collection} record not found: {id}")]
    NotFound {
        collection: &'static str,
        id: String,
    },
    #[error("duplicate id in {collection}: {id}")]
    DuplicateId {
        collection: &'static str,
        id: String,
    },
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("moving folder {folder_id} under {target_id} would create a cycle")]
    Cycle { folder_id: String, target_id: String },
    #[error("{0} belongs to a different project")]
    CrossProject(String),
    #[error("project {0} no longer accepts uploads")]
    ProjectClosed(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("storage unavailable: {0}")]
    Storage(#[source] std::io::Error),
    #[error("collection {collection} is corrupt: {source}")]
    Corrupt {
        collection: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode collection {collection}: {source}")]
    Encode {
        collection: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn not_found(collection: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            collection,
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        StoreError::Validation(msg.into())
    }

    pub fn denied(msg: impl Into<String>) -> Self {
        StoreError::AccessDenied(msg.into())
    }
}
