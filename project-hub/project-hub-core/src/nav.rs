//! Breadcrumb trail for walking one project's tree. Purely in-memory; the
//! service keeps one per client view, never persisted.

use crate::model::Folder;
use serde::Serialize;

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Crumb {
    /// `None` is the project top level.
    pub folder_id: Option<String>,
    pub label: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct Breadcrumbs {
    trail: Vec<Crumb>,
}

impl Breadcrumbs {
    pub fn new(root_label: impl Into<String>) -> Self {
        Self {
            trail: vec![Crumb {
                folder_id: None,
                label: root_label.into(),
            }],
        }
    }

    /// Trail positioned at the last folder of `path`, usually built from
    /// [`folder_path`](crate::tree::ProjectStore::folder_path).
    pub fn for_path(root_label: impl Into<String>, path: &[Folder]) -> Self {
        let mut nav = Self::new(root_label);
        for folder in path {
            nav.descend(folder);
        }
        nav
    }

    pub fn descend(&mut self, folder: &Folder) {
        self.trail.push(Crumb {
            folder_id: Some(folder.id.clone()),
            label: folder.name.clone(),
        });
    }

    /// Up one level. The root crumb is never popped.
    pub fn ascend(&mut self) -> bool {
        if self.trail.len() > 1 {
            self.trail.pop();
            true
        } else {
            false
        }
    }

    /// Jump to a crumb already in the trail, discarding everything after
    /// it. An out-of-range index is a no-op.
    pub fn jump_to(&mut self, index: usize) -> bool {
        if index < self.trail.len() {
            self.trail.truncate(index + 1);
            true
        } else {
            false
        }
    }

    pub fn current(&self) -> &Crumb {
        // the trail always holds at least the root crumb
        &self.trail[self.trail.len() - 1]
    }

    pub fn trail(&self) -> &[Crumb] {
        &self.trail
    }

    /// How many levels below the top the trail currently points.
    pub fn depth(&self) -> usize {
        self.trail.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::AccessRestriction;
    use chrono::Utc;

    fn folder(id: &str, name: &str) -> Folder {
        Folder {
            id: id.to_string(),
            project_id: "project-1".to_string(),
            parent_id: None,
            name: name.to_string(),
            description: None,
            order: 0,
            restriction: AccessRestriction::Public,
            created_by: "worker-1".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn descend_and_ascend_walk_the_trail() {
        let mut nav = Breadcrumbs::new("Riverside Plant");
        nav.descend(&folder("folder-1", "Plans"));
        nav.descend(&folder("folder-2", "Drafts"));
        assert_eq!(nav.depth(), 2);
        assert_eq!(nav.current().label, "Drafts");

        assert!(nav.ascend());
        assert_eq!(nav.current().label, "Plans");
        assert!(nav.ascend());
        assert_eq!(nav.current().folder_id, None);
    }

    #[test]
    fn root_is_never_popped() {
        let mut nav = Breadcrumbs::new("Riverside Plant");
        assert!(!nav.ascend());
        assert!(!nav.ascend());
        assert_eq!(nav.depth(), 0);
        assert_eq!(nav.current().label, "Riverside Plant");
    }

    #[test]
    fn jump_truncates_to_a_visited_crumb() {
        let mut nav = Breadcrumbs::new("Riverside Plant");
        nav.descend(&folder("folder-1", "Plans"));
        nav.descend(&folder("folder-2", "Drafts"));
        nav.descend(&folder("folder-3", "Sketches"));

        assert!(nav.jump_to(1));
        assert_eq!(nav.current().label, "Plans");
        assert_eq!(nav.depth(), 1);
        // jumping past the end changes nothing
        assert!(!nav.jump_to(9));
        assert_eq!(nav.current().label, "Plans");
        assert!(nav.jump_to(0));
        assert_eq!(nav.current().folder_id, None);
    }

    #[test]
    fn for_path_seeds_a_full_trail() {
        let path = [folder("folder-1", "Plans"), folder("folder-2", "Drafts")];
        let nav = Breadcrumbs::for_path("Riverside Plant", &path);
        assert_eq!(nav.depth(), 2);
        let labels: Vec<&str> = nav.trail().iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, ["Riverside Plant", "Plans", "Drafts"]);
    }
}
