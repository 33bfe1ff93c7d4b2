//! Access restrictions on folders and their evaluation. The tree manager
//! consults [`AccessRestriction::allows`] to filter listings and
//! [`AccessRestriction::allows_write`] before every mutation.

use crate::model::ProjectRole;
use serde::{Deserialize, Serialize};

/// Who is asking: project role plus area memberships resolved for one
/// project. Built by the caller from the member list and the worker record.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Requester {
    pub user_id: String,
    pub role: ProjectRole,
    pub area_ids: Vec<String>,
}

impl Requester {
    pub fn new(user_id: impl Into<String>, role: ProjectRole, area_ids: Vec<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            area_ids,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccessRestriction {
    /// Visible to everyone with access to the project.
    Public,
    ByRole { roles: Vec<ProjectRole> },
    ByArea { area_ids: Vec<String> },
    ByUser { user_ids: Vec<String> },
    /// Certified material: readable by all members, writable only by the
    /// central office.
    Final,
}

impl AccessRestriction {
    /// May `requester` see and use the restricted folder?
    ///
    /// An empty allowed-set means nobody passes, never everybody.
    pub fn allows(&self, requester: &Requester) -> bool {
        match self {
            AccessRestriction::Public | AccessRestriction::Final => true,
            AccessRestriction::ByRole { roles } => roles.contains(&requester.role),
            AccessRestriction::ByArea { area_ids } => requester
                .area_ids
                .iter()
                .any(|area| area_ids.contains(area)),
            AccessRestriction::ByUser { user_ids } => {
                user_ids.iter().any(|u| u == &requester.user_id)
            }
        }
    }

    /// May `requester` modify the folder or its contents? Same as
    /// [`allows`](Self::allows) except that final folders only accept writes
    /// from the central office.
    pub fn allows_write(&self, requester: &Requester) -> bool {
        match self {
            AccessRestriction::Final => requester.role == ProjectRole::CentralOffice,
            other => other.allows(requester),
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, AccessRestriction::Final)
    }
}
