/// Free-text search over the inventory
///
/// A full scan recomputed on every call, with no index. Inventories are
/// personal-sized (hundreds of containers), so this is a known scaling
/// limit rather than a defect.

use std::collections::HashSet;

use crate::error::Result;
use crate::state::{Container, RecordStore};

/// Containers matching `query`, most recently updated first.
///
/// A container matches if its id, label, location or notes contain the
/// query case-insensitively, or if one of its photos has a description
/// that does. A blank query returns the full home list unchanged.
pub fn search(store: &dyn RecordStore, query: &str) -> Result<Vec<Container>> {
    let containers = store.list_containers()?;
    if query.trim().is_empty() {
        return Ok(containers);
    }

    let term = query.to_lowercase().trim().to_string();
    let contains = |field: &str| field.to_lowercase().contains(&term);

    let mut matching: HashSet<String> = containers
        .iter()
        .filter(|c| {
            contains(&c.id)
                || contains(&c.label)
                || contains(&c.location)
                || c.notes.as_deref().is_some_and(|n| contains(n))
        })
        .map(|c| c.id.clone())
        .collect();

    for photo in store.list_photo_meta()? {
        if let Some(description) = photo.description.as_deref() {
            if !description.is_empty() && contains(description) {
                matching.insert(photo.container_id);
            }
        }
    }

    // list_containers is already ordered by updated_at descending
    Ok(containers
        .into_iter()
        .filter(|c| matching.contains(&c.id))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Photo, SqliteStore};

    fn container(id: &str, label: &str, updated_at: i64) -> Container {
        Container {
            id: id.into(),
            label: label.into(),
            location: String::new(),
            notes: None,
            created_at: 0,
            updated_at,
        }
    }

    fn seeded() -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.create_container(&container("C-AB12", "Tools", 10)).unwrap();
        let mut kitchen = container("C-KT01", "Kitchen", 20);
        kitchen.location = "Basement Shelf".into();
        kitchen.notes = Some("Spare Mugs".into());
        store.create_container(&kitchen).unwrap();
        store.create_container(&container("C-XM99", "Holiday", 30)).unwrap();
        store
            .create_photo(&Photo {
                id: "p1".into(),
                container_id: "C-AB12".into(),
                description: Some("red hammer".into()),
                image_blob: vec![0],
                thumbnail_blob: vec![0],
                created_at: 1,
            })
            .unwrap();
        store
            .create_photo(&Photo {
                id: "p2".into(),
                container_id: "C-AB12".into(),
                description: Some("claw hammer".into()),
                image_blob: vec![0],
                thumbnail_blob: vec![0],
                created_at: 2,
            })
            .unwrap();
        store
    }

    fn ids(containers: &[Container]) -> Vec<&str> {
        containers.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_blank_query_returns_home_list() {
        let store = seeded();
        let all = store.list_containers().unwrap();
        assert_eq!(search(&store, "").unwrap(), all);
        assert_eq!(search(&store, "   ").unwrap(), all);
    }

    #[test]
    fn test_photo_description_match() {
        let store = seeded();
        assert_eq!(ids(&search(&store, "hammer").unwrap()), vec!["C-AB12"]);
        assert!(search(&store, "screwdriver").unwrap().is_empty());
    }

    #[test]
    fn test_field_matches_are_case_insensitive() {
        let store = seeded();
        assert_eq!(ids(&search(&store, "  MUGS ").unwrap()), vec!["C-KT01"]);
        assert_eq!(ids(&search(&store, "basement").unwrap()), vec!["C-KT01"]);
        assert_eq!(ids(&search(&store, "c-xm").unwrap()), vec!["C-XM99"]);
    }

    #[test]
    fn test_results_deduplicated_and_ordered() {
        let store = seeded();
        // "c-" hits every id, "a" hits labels and the hammer photos
        assert_eq!(
            ids(&search(&store, "c-").unwrap()),
            vec!["C-XM99", "C-KT01", "C-AB12"]
        );
        let hits = search(&store, "a").unwrap();
        assert_eq!(ids(&hits), vec!["C-XM99", "C-KT01", "C-AB12"]);
    }

    #[test]
    fn test_results_are_a_subset_of_the_home_list() {
        let store = seeded();
        let all = store.list_containers().unwrap();
        for q in ["o", "tools", "shelf", "red", "zzz"] {
            for hit in search(&store, q).unwrap() {
                assert!(all.contains(&hit));
            }
        }
    }
}
