//! Query executor (component F) — time-range + filter query across the
//! files a `FileIndex` knows about, with pre-existing-state synthesis for
//! resources that last changed before the query window began.
//!
//! # Algorithm
//!
//! 1. Select candidate files via `FileIndex::get_files_by_time_range`.
//! 2. Find the file immediately before the window (`get_file_before_time`)
//!    and synthesize one snapshot event per resource from its
//!    `FinalResourceStates`, skipping any resource last observed deleted.
//! 3. Scan every candidate file's overlapping blocks for real events in
//!    `[ts_min_ns, ts_max_ns]`, applying `EventFilters`.
//! 4. Drop a synthesized snapshot for any UID that also has a real event at
//!    or before `ts_min_ns` — a real event always takes precedence over a
//!    synthesized one for the same resource.
//! 5. Stable-sort the merged set by `(timestamp_ns, hour_start, block_index,
//!    position)` so output order is deterministic across runs.
//!
//! Every file a query touches is loaded through the metadata cache
//! (component D) rather than re-parsed from disk: steps 1 and 2 only need a
//! file's header + IndexSection, which is exactly what the cache holds.
//!
//! Reads are best-effort across files: a file that fails to open or decode
//! is logged and skipped rather than failing the whole query (§7).

use crate::cache::MetadataCache;
use crate::catalog::FileIndex;
use crate::error::{Result, StoreError};
use crate::reader::FileReader;
use crate::resource::{Event, EventFilters, EventType, EventTypeWire, ResourceMeta};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation, checked between file reads and block decodes.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(StoreError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// One event in a query result, tagged with whether it was synthesized from
/// a `FinalResourceStates` snapshot rather than observed within the window.
#[derive(Debug, Clone)]
pub struct QueryEvent {
    pub event:        Event,
    pub pre_existing: bool,
}

#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub events: Vec<QueryEvent>,
    pub count:  usize,
}

/// A candidate event paired with the sort key that fixes its position in the
/// deterministic merge: synthesized snapshots get `block_index = -1` so they
/// sort before any real event at the same timestamp.
struct Ranked {
    item:        QueryEvent,
    timestamp_ns: i64,
    hour_start:  i64,
    block_index: i64,
    position:    usize,
}

/// Run a time-range + filter query against every file `index` knows about,
/// loading each file's header + IndexSection through `cache`.
pub fn execute(
    index: &FileIndex,
    cache: &MetadataCache,
    ts_min_ns: i64,
    ts_max_ns: i64,
    filters: &EventFilters,
    cancel: Option<&CancellationToken>,
) -> Result<QueryResult> {
    if ts_min_ns > ts_max_ns {
        return Err(StoreError::InvalidArg(format!(
            "ts_min_ns ({ts_min_ns}) must be <= ts_max_ns ({ts_max_ns})"
        )));
    }
    log::debug!("query start: [{ts_min_ns}, {ts_max_ns}]");

    let mut ranked: Vec<Ranked> = Vec::new();
    let mut real_uids_at_or_before_min: HashSet<String> = HashSet::new();

    for file in index.get_files_by_time_range(ts_min_ns, ts_max_ns) {
        if let Some(c) = cancel {
            c.check()?;
        }
        let cached = match cache.get_or_load(&file.file_path) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("skipping unreadable file {:?}: {e}", file.file_path);
                continue;
            }
        };
        let mut reader = match FileReader::from_cached(&file.file_path, cached.header, cached.index) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("skipping unreadable file {:?}: {e}", file.file_path);
                continue;
            }
        };
        for (block_index, block) in reader.index().blocks.iter().enumerate() {
            if !block.overlaps(ts_min_ns, ts_max_ns) {
                continue;
            }
            if let Some(c) = cancel {
                c.check()?;
            }
            let events = match reader.read_block(block_index) {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("skipping unreadable block {block_index} in {:?}: {e}", file.file_path);
                    continue;
                }
            };
            for (position, event) in events.into_iter().enumerate() {
                if event.timestamp_ns < ts_min_ns || event.timestamp_ns > ts_max_ns {
                    continue;
                }
                if !filters.matches(&event.resource) {
                    continue;
                }
                if event.timestamp_ns <= ts_min_ns {
                    real_uids_at_or_before_min.insert(event.resource.uid.clone());
                }
                ranked.push(Ranked {
                    timestamp_ns: event.timestamp_ns,
                    hour_start: file.hour_start,
                    block_index: block_index as i64,
                    position,
                    item: QueryEvent { event, pre_existing: false },
                });
            }
        }
    }

    if let Some(before) = index.get_file_before_time(ts_min_ns) {
        if let Some(c) = cancel {
            c.check()?;
        }
        match synthesize_snapshot(cache, &before, ts_min_ns, filters, &real_uids_at_or_before_min) {
            Ok(mut snapshot) => ranked.append(&mut snapshot),
            Err(e) => log::warn!("skipping snapshot source {:?}: {e}", before.file_path),
        }
    }

    ranked.sort_by_key(|r| (r.timestamp_ns, r.hour_start, r.block_index, r.position));
    let events: Vec<QueryEvent> = ranked.into_iter().map(|r| r.item).collect();
    let count = events.len();
    log::debug!("query end: {count} event(s)");
    Ok(QueryResult { events, count })
}

/// Build one synthesized `Ranked` snapshot event per resource in `file`'s
/// `FinalResourceStates`, skipping resources last observed deleted and any
/// resource a real event already covers at or before `ts_min_ns`.
fn synthesize_snapshot(
    cache: &MetadataCache,
    file: &crate::catalog::FileMetadata,
    ts_min_ns: i64,
    filters: &EventFilters,
    exclude_uids: &HashSet<String>,
) -> Result<Vec<Ranked>> {
    let cached = cache.get_or_load(&file.file_path)?;
    let mut reader = FileReader::from_cached(&file.file_path, cached.header, cached.index)?;
    let mut out = Vec::new();

    let states: Vec<_> = reader.index().final_states.iter().map(|(k, s)| (k.clone(), s.clone())).collect();
    for (key, state) in states {
        if state.event_type == EventType::Delete {
            continue;
        }
        if exclude_uids.contains(&state.uid) {
            continue;
        }
        let resource = ResourceMeta {
            uid: key.uid.clone(),
            group: key.group.clone(),
            version: key.version.clone(),
            kind: key.kind.clone(),
            namespace: key.namespace.clone(),
            name: key.name.clone(),
        };
        if !filters.matches(&resource) {
            continue;
        }
        let data = reader.resolve_final_state_data(&state)?;
        let event = Event {
            id: Event::state_id(&key.uid, file.hour_start),
            timestamp_ns: ts_min_ns,
            event_type: EventTypeWire::from(state.event_type),
            resource,
            data,
        };
        out.push(Ranked {
            timestamp_ns: ts_min_ns,
            hour_start: file.hour_start,
            block_index: -1,
            position: 0,
            item: QueryEvent { event, pre_existing: true },
        });
    }
    Ok(out)
}
