//! Explicit bootstrap of demo reference data. Seeding is a deliberate call
//! from the binary or a test, never a side effect of opening a store, and it
//! only runs when every collection is empty.

use crate::error::StoreResult;
use crate::model::{
    ActivityEntry, Area, Company, FileRecord, Folder, Position, Project, ProjectRole, Worker,
};
use crate::policy::AccessRestriction;
use crate::tree::ProjectStore;
use tracing::info;

/// Seed demo data if and only if every collection is empty. Returns whether
/// seeding ran, so re-running at startup never duplicates records.
pub fn initialize(hub: &mut ProjectStore) -> StoreResult<bool> {
    if !is_empty(hub)? {
        return Ok(false);
    }
    seed(hub)?;
    Ok(true)
}

/// Wipe every collection and reseed from scratch.
pub fn reset(hub: &mut ProjectStore) -> StoreResult<()> {
    hub.entities_mut().wipe()?;
    seed(hub)
}

fn is_empty(hub: &ProjectStore) -> StoreResult<bool> {
    let e = hub.entities();
    Ok(e.count::<Company>()? == 0
        && e.count::<Area>()? == 0
        && e.count::<Position>()? == 0
        && e.count::<Worker>()? == 0
        && e.count::<Project>()? == 0
        && e.count::<Folder>()? == 0
        && e.count::<FileRecord>()? == 0
        && e.count::<ActivityEntry>()? == 0)
}

fn seed(hub: &mut ProjectStore) -> StoreResult<()> {
    let company = hub.create_company("Delta Construction Group", Some("B-84213977".into()))?;
    let north = hub.create_area(&company.id, "North Region")?;
    let south = hub.create_area(&company.id, "South Region")?;
    let site_manager = hub.create_position("Site Manager")?;
    let quality_eng = hub.create_position("Quality Engineer")?;
    let doc_control = hub.create_position("Document Controller")?;

    let ana = hub.create_worker(
        &company.id,
        "Ana Serrano",
        "ana.serrano@delta.example",
        Some(site_manager.id),
        vec![north.id.clone()],
    )?;
    let luis = hub.create_worker(
        &company.id,
        "Luis Navarro",
        "luis.navarro@delta.example",
        Some(quality_eng.id),
        vec![south.id.clone()],
    )?;
    let marta = hub.create_worker(
        &company.id,
        "Marta Gil",
        "marta.gil@delta.example",
        Some(doc_control.id),
        vec![],
    )?;

    let project = hub.create_project(
        &company.id,
        "Riverside Water Treatment",
        Some("RWT-2024".into()),
        vec![north.id.clone()],
        &ana.id,
        ProjectRole::Manager,
    )?;
    hub.add_member(
        &project.id,
        &luis.id,
        ProjectRole::Supervisor,
        Some(south.id),
        &ana.id,
    )?;
    hub.add_member(&project.id, &marta.id, ProjectRole::CentralOffice, None, &ana.id)?;

    let manager = hub.requester_for(&project.id, &ana.id)?;
    hub.create_folder(
        &project.id,
        None,
        "Plans",
        Some("working drawings".into()),
        AccessRestriction::Public,
        &manager,
    )?;
    let quality = hub.create_folder(
        &project.id,
        None,
        "Quality",
        None,
        AccessRestriction::ByRole {
            roles: vec![
                ProjectRole::Manager,
                ProjectRole::Supervisor,
                ProjectRole::CentralOffice,
            ],
        },
        &manager,
    )?;
    hub.create_folder(
        &project.id,
        Some(&quality.id),
        "Inspections",
        None,
        AccessRestriction::Public,
        &manager,
    )?;

    info!(project = %project.id, "seeded demo catalog");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProjectStatus;

    #[test]
    fn initialize_seeds_an_empty_store_once() {
        let mut hub = ProjectStore::in_memory();
        assert!(initialize(&mut hub).unwrap());
        let projects = hub.entities().all::<Project>().unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].status, ProjectStatus::Open);
        assert_eq!(projects[0].members.len(), 3);
        assert_eq!(hub.entities().count::<Folder>().unwrap(), 3);
        assert_eq!(hub.entities().count::<Worker>().unwrap(), 3);

        // a second call sees data and backs off
        assert!(!initialize(&mut hub).unwrap());
        assert_eq!(hub.entities().count::<Project>().unwrap(), 1);
    }

    #[test]
    fn initialize_backs_off_when_any_collection_has_data() {
        let mut hub = ProjectStore::in_memory();
        hub.create_company("Lone Company", None).unwrap();
        assert!(!initialize(&mut hub).unwrap());
        assert_eq!(hub.entities().count::<Project>().unwrap(), 0);
    }

    #[test]
    fn reset_wipes_and_reseeds() {
        let mut hub = ProjectStore::in_memory();
        initialize(&mut hub).unwrap();
        let project = hub.entities().all::<Project>().unwrap().remove(0);
        let manager = hub.requester_for(&project.id, &project.members[0].user_id).unwrap();
        hub.create_folder(
            &project.id,
            None,
            "Extra",
            None,
            AccessRestriction::Public,
            &manager,
        )
        .unwrap();
        assert_eq!(hub.entities().count::<Folder>().unwrap(), 4);

        reset(&mut hub).unwrap();
        assert_eq!(hub.entities().count::<Folder>().unwrap(), 3);
        assert_eq!(hub.entities().count::<Project>().unwrap(), 1);
    }
}
