#[cfg(test)]
mod tests {
    use crate::error::StoreError;
    use crate::store::{EntityStore, Record};
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Gadget {
        id: String,
        name: String,
        tags: Vec<String>,
    }

    impl Record for Gadget {
        const COLLECTION: &'static str = "gadgets";
        fn id(&self) -> &str {
            &self.id
        }
    }

    fn gadget(id: &str, name: &str) -> Gadget {
        Gadget {
            id: id.to_string(),
            name: name.to_string(),
            tags: vec!["stock".to_string()],
        }
    }

    #[test]
    fn insert_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut store = EntityStore::open(dir.path()).unwrap();
        store.insert(gadget("g-1", "widget")).unwrap();
        let found: Gadget = store.get("g-1").unwrap().unwrap();
        assert_eq!(found.name, "widget");
        assert!(store.get::<Gadget>("g-2").unwrap().is_none());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut store = EntityStore::in_memory();
        store.insert(gadget("g-1", "widget")).unwrap();
        let err = store.insert(gadget("g-1", "again")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId { .. }));
        assert_eq!(store.count::<Gadget>().unwrap(), 1);
    }

    #[test]
    fn find_on_empty_collection_is_empty_not_error() {
        let store = EntityStore::in_memory();
        let hits = store.find::<Gadget>(|g| g.name == "widget").unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn find_preserves_insertion_order() {
        let mut store = EntityStore::in_memory();
        for (id, name) in [("g-1", "anchor"), ("g-2", "bolt"), ("g-3", "anchor")] {
            store.insert(gadget(id, name)).unwrap();
        }
        let hits = store.find::<Gadget>(|g| g.name == "anchor").unwrap();
        let ids: Vec<&str> = hits.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, ["g-1", "g-3"]);
    }

    #[test]
    fn update_touches_only_named_fields() {
        let mut store = EntityStore::in_memory();
        store.insert(gadget("g-1", "widget")).unwrap();
        let updated = store
            .update::<Gadget>("g-1", |g| g.name = "renamed".to_string())
            .unwrap();
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.tags, ["stock"]);
        let err = store.update::<Gadget>("g-9", |_| {}).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn data_survives_reopen_in_order() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = EntityStore::open(dir.path()).unwrap();
            store.insert(gadget("g-1", "first")).unwrap();
            store.insert(gadget("g-2", "second")).unwrap();
            store.insert(gadget("g-3", "third")).unwrap();
        }
        let store = EntityStore::open(dir.path()).unwrap();
        let all = store.all::<Gadget>().unwrap();
        let ids: Vec<&str> = all.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, ["g-1", "g-2", "g-3"]);
    }

    #[test]
    fn remove_keeps_survivors_in_place() {
        let mut store = EntityStore::in_memory();
        store.insert(gadget("g-1", "first")).unwrap();
        store.insert(gadget("g-2", "second")).unwrap();
        store.insert(gadget("g-3", "third")).unwrap();
        assert!(store.remove::<Gadget>("g-2").unwrap());
        assert!(!store.remove::<Gadget>("g-2").unwrap());
        let ids: Vec<String> = store
            .all::<Gadget>()
            .unwrap()
            .into_iter()
            .map(|g| g.id)
            .collect();
        assert_eq!(ids, ["g-1", "g-3"]);
    }

    #[test]
    fn missing_directory_is_a_storage_error_not_empty() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        let store = EntityStore::open(&data).unwrap();
        std::fs::remove_dir_all(&data).unwrap();
        let err = store.all::<Gadget>().unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));
    }

    #[test]
    fn unreadable_payload_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let mut store = EntityStore::open(dir.path()).unwrap();
        store.insert(gadget("g-1", "widget")).unwrap();
        std::fs::write(dir.path().join("gadgets.json"), "not json").unwrap();
        let err = store.all::<Gadget>().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn wipe_empties_every_collection() {
        let dir = TempDir::new().unwrap();
        let mut store = EntityStore::open(dir.path()).unwrap();
        store.insert(gadget("g-1", "widget")).unwrap();
        store.wipe().unwrap();
        assert_eq!(store.count::<Gadget>().unwrap(), 0);
    }
}
