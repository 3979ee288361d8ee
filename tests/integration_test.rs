use kevents::{Event, EventFilters, EventType, EventTypeWire, FileIndex, FileReader, ResourceMeta, Storage, StoreConfig};
use serde_json::json;
use tempfile::TempDir;

fn event(uid: &str, ts_ns: i64, event_type: EventType, value: i64) -> Event {
    Event {
        id: format!("{uid}-{ts_ns}"),
        timestamp_ns: ts_ns,
        event_type: EventTypeWire::from(event_type),
        resource: ResourceMeta {
            uid: uid.to_string(),
            group: "apps".to_string(),
            version: "v1".to_string(),
            kind: "Deployment".to_string(),
            namespace: "default".to_string(),
            name: format!("dep-{uid}"),
        },
        data: json!({ "replicas": value }),
    }
}

const HOUR_NS: i64 = 3_600_000_000_000;

#[test]
fn final_resource_states_nonempty_after_close() {
    let dir = TempDir::new().unwrap();
    let storage = Storage::open(dir.path(), StoreConfig::default()).unwrap();

    storage.write_event(event("uid-1", 10 * HOUR_NS, EventType::Create, 1)).unwrap();
    storage.write_event(event("uid-1", 10 * HOUR_NS + 5_000_000_000, EventType::Update, 2)).unwrap();
    storage.close().unwrap();

    let files = storage.cataloged_files();
    assert_eq!(files.len(), 1);

    let reader = FileReader::open(&files[0].file_path).unwrap();
    assert_eq!(reader.index().final_states.len(), 1);
    let (_, state) = reader.index().final_states.iter().next().unwrap();
    assert_eq!(state.uid, "uid-1");
    assert_eq!(state.event_type, EventType::Update);
}

#[test]
fn cross_hour_snapshot_excludes_last_observed_delete() {
    let dir = TempDir::new().unwrap();
    let storage = Storage::open(dir.path(), StoreConfig::default()).unwrap();

    // Hour 10: uid-1 created then updated, uid-2 created then deleted.
    storage.write_event(event("uid-1", 10 * HOUR_NS, EventType::Create, 1)).unwrap();
    storage.write_event(event("uid-2", 10 * HOUR_NS + 1_000_000_000, EventType::Create, 1)).unwrap();
    storage.write_event(event("uid-2", 10 * HOUR_NS + 2_000_000_000, EventType::Delete, 0)).unwrap();

    // Hour 11: no events for either resource, but a third resource appears.
    storage.write_event(event("uid-3", 11 * HOUR_NS, EventType::Create, 9)).unwrap();
    storage.close().unwrap();

    let result = storage
        .query(11 * HOUR_NS, 11 * HOUR_NS + HOUR_NS - 1, &EventFilters::default(), None)
        .unwrap();

    let uids: Vec<&str> = result.events.iter().map(|e| e.event.resource.uid.as_str()).collect();
    assert!(uids.contains(&"uid-1"), "surviving resource should be synthesized into the new window");
    assert!(!uids.contains(&"uid-2"), "last-observed-deleted resource must not be resurrected");
    assert!(uids.contains(&"uid-3"));

    let uid1 = result.events.iter().find(|e| e.event.resource.uid == "uid-1").unwrap();
    assert!(uid1.pre_existing);
    let uid3 = result.events.iter().find(|e| e.event.resource.uid == "uid-3").unwrap();
    assert!(!uid3.pre_existing);
}

#[test]
fn strict_vs_non_strict_overlap() {
    let dir = TempDir::new().unwrap();
    let index = FileIndex::new(dir.path(), false, false);

    // A file nominally belonging to hour 5, but whose one late event landed
    // at the very start of hour 6.
    let meta = kevents::FileMetadata {
        file_path: dir.path().join("2024-01-01-05.bin"),
        hour_start: 5 * 3600,
        hour_end: 6 * 3600,
        timestamp_min: 5 * HOUR_NS + 59 * 60 * 1_000_000_000,
        timestamp_max: 6 * HOUR_NS + 30_000_000_000,
        event_count: 1,
        file_size: 128,
    };
    index.add_or_update(meta).unwrap();

    // Non-strict: query window is entirely within hour 6's wall-clock range,
    // but the file's actual observed extent reaches into it.
    let hits = index.get_files_by_time_range(6 * HOUR_NS + 10_000_000_000, 6 * HOUR_NS + 20_000_000_000);
    assert_eq!(hits.len(), 1);

    index.set_strict_hours(true);
    let hits = index.get_files_by_time_range(6 * HOUR_NS + 10_000_000_000, 6 * HOUR_NS + 20_000_000_000);
    assert!(hits.is_empty(), "strict mode must bound by the nominal hour, not the observed extent");
}

#[test]
fn file_index_round_trips_through_sidecar() {
    let dir = TempDir::new().unwrap();
    {
        let index = FileIndex::new(dir.path(), false, true);
        let meta = kevents::FileMetadata {
            file_path: dir.path().join("2024-01-01-05.bin"),
            hour_start: 5 * 3600,
            hour_end: 6 * 3600,
            timestamp_min: 5 * HOUR_NS,
            timestamp_max: 6 * HOUR_NS - 1,
            event_count: 3,
            file_size: 512,
        };
        std::fs::write(&meta.file_path, b"placeholder").unwrap();
        index.add_or_update(meta).unwrap();
    }

    let reloaded = FileIndex::load(dir.path(), false, true).unwrap();
    assert_eq!(reloaded.count(), 1);
    let got = reloaded.get(dir.path().join("2024-01-01-05.bin")).unwrap();
    assert_eq!(got.event_count, 3);
}

#[test]
fn load_drops_entries_for_files_removed_from_disk() {
    let dir = TempDir::new().unwrap();
    let ghost_path = dir.path().join("2024-01-01-05.bin");
    {
        let index = FileIndex::new(dir.path(), false, true);
        let meta = kevents::FileMetadata {
            file_path: ghost_path.clone(),
            hour_start: 5 * 3600,
            hour_end: 6 * 3600,
            timestamp_min: 5 * HOUR_NS,
            timestamp_max: 6 * HOUR_NS - 1,
            event_count: 1,
            file_size: 64,
        };
        std::fs::write(&ghost_path, b"placeholder").unwrap();
        index.add_or_update(meta).unwrap();
    }
    std::fs::remove_file(&ghost_path).unwrap();

    let reloaded = FileIndex::load(dir.path(), false, true).unwrap();
    assert_eq!(reloaded.count(), 0, "directory wins: a sidecar entry for a deleted file must not survive load");
}

#[test]
fn get_file_before_time_picks_the_nearest_preceding_hour() {
    let dir = TempDir::new().unwrap();
    let index = FileIndex::new(dir.path(), false, false);
    for hour in [3i64, 5, 8] {
        let meta = kevents::FileMetadata {
            file_path: dir.path().join(format!("hour-{hour}.bin")),
            hour_start: hour * 3600,
            hour_end: (hour + 1) * 3600,
            timestamp_min: hour * HOUR_NS,
            timestamp_max: (hour + 1) * HOUR_NS - 1,
            event_count: 1,
            file_size: 64,
        };
        index.add_or_update(meta).unwrap();
    }

    let before = index.get_file_before_time(7 * HOUR_NS).unwrap();
    assert_eq!(before.hour_start, 5 * 3600);

    assert!(index.get_file_before_time(3 * HOUR_NS).is_none());
}

#[test]
fn metadata_cache_invalidates_on_mtime_change() {
    let dir = TempDir::new().unwrap();
    let storage = Storage::open(dir.path(), StoreConfig::default()).unwrap();
    storage.write_event(event("uid-1", 10 * HOUR_NS, EventType::Create, 1)).unwrap();
    storage.close().unwrap();

    let files = storage.cataloged_files();
    let path = &files[0].file_path;

    let first = storage.file_metadata(path).unwrap();
    let second = storage.file_metadata(path).unwrap();
    let stats = storage.cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(first.index.blocks.len(), second.index.blocks.len());

    // Touch the file with a newer mtime; the next lookup must treat it as a
    // fresh miss rather than trusting stale cached metadata.
    let newer = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
    let f = std::fs::OpenOptions::new().write(true).open(path).unwrap();
    f.set_modified(newer).unwrap();

    storage.file_metadata(path).unwrap();
    let stats = storage.cache_stats();
    assert_eq!(stats.invalidations, 1);
    assert_eq!(stats.misses, 2);
}

#[test]
fn query_rejects_inverted_range() {
    let dir = TempDir::new().unwrap();
    let storage = Storage::open(dir.path(), StoreConfig::default()).unwrap();
    let result = storage.query(100, 0, &EventFilters::default(), None);
    assert!(result.is_err());
}
