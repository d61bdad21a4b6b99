//! Drives Walker → hasher pool → indexer → Grouper as bounded, cancellable
//! queues, per spec.md §4.6.
//!
//! ```text
//! Walker ──(cap=1024)──▶ Hasher pool (N workers) ──(cap=512)──▶ Indexer (single writer) ──▶ Grouper
//! ```

use super::config::{
    OrchestratorConfig, HASH_QUEUE_CAPACITY, PROGRESS_CHECKPOINT_ITEMS, PROGRESS_CHECKPOINT_SECS,
    WALK_QUEUE_CAPACITY,
};
use crate::core::comparator::{DuplicateGroup, FileSignature, Grouper};
use crate::core::hasher::{
    capture_date, content_hash, image_hashes, video_signature, ContentHash, PerceptualHash,
};
use crate::core::index::SimilarityIndex;
use crate::core::persistence::{FileRecord, Persistence};
use crate::core::scanner::{FileObservation, MediaType, ScanConfig, WalkDirScanner};
use crate::core::session::{DuplicateSummary, FolderStatus, Phase, SessionStatus, SessionStore};
use crate::error::DuplicateFinderError;
use crate::events::{
    CompareEvent, Event, EventSender, HashEvent, PipelineEvent, PipelinePhase, PipelineSummary,
    ScanEvent,
};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// A handle a caller can use to request cooperative cancellation.
/// Checked at every suspension point in the walker, hasher, and indexer
/// stages; cancellation unwinds in bounded time rather than aborting
/// mid-operation.
#[derive(Clone)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn raw(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminal output of one orchestrated scan.
#[derive(Debug)]
pub struct OrchestratorResult {
    pub groups: Vec<DuplicateGroup>,
    pub total_files: usize,
    pub cache_hits: usize,
    pub errors: Vec<String>,
    pub cancelled: bool,
}

/// One file's computed (or recalled) signatures, carried from the hasher
/// stage to the indexer stage.
struct HashedFile {
    record: FileRecord,
    content_hash: Option<ContentHash>,
    perceptual_hashes: Vec<PerceptualHash>,
    from_cache: bool,
}

pub struct ScanOrchestrator {
    persistence: Arc<dyn Persistence>,
    index: Arc<SimilarityIndex>,
}

impl ScanOrchestrator {
    pub fn new(persistence: Arc<dyn Persistence>, index: Arc<SimilarityIndex>) -> Self {
        Self { persistence, index }
    }

    /// Run one scan of `roots` to completion (or cancellation). `session`
    /// observes lifecycle events and owns checkpointing; `cancel` is
    /// shared with the caller so e.g. a `--cancel-after` timer thread can
    /// signal it.
    pub fn run(
        &self,
        roots: Vec<PathBuf>,
        config: &OrchestratorConfig,
        session: &SessionStore,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<OrchestratorResult, DuplicateFinderError> {
        let start = Instant::now();
        events.send(Event::Pipeline(PipelineEvent::Started));
        session.transition(SessionStatus::Scanning, events)?;
        session.set_phase(Phase::Preparing);
        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Preparing,
        }));

        let (walk_tx, walk_rx) = crossbeam_channel::bounded::<FileObservation>(WALK_QUEUE_CAPACITY);
        let (hash_tx, hash_rx) = crossbeam_channel::bounded::<HashedFile>(HASH_QUEUE_CAPACITY);

        let scan_errors = Arc::new(AtomicUsize::new(0));
        let cache_hits = Arc::new(AtomicUsize::new(0));

        // Walking, hashing, and indexing all run concurrently as one
        // pipeline stage rather than strict sequential sub-phases.
        session.set_phase(Phase::Indexing);
        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Indexing,
        }));
        events.send(Event::Scan(ScanEvent::Started {
            paths: roots.clone(),
        }));

        let signatures: Vec<FileSignature> = std::thread::scope(|scope| {
            // Walker: one thread enumerates every root in turn, applying
            // backpressure via the bounded channel when hashers fall behind.
            let walker_cancel = cancel.raw();
            let walker_events = events.clone();
            let walker_errors = Arc::clone(&scan_errors);
            let roots_for_walker = roots.clone();
            scope.spawn(move || {
                let walker = WalkDirScanner::new(ScanConfig::default());
                for root in &roots_for_walker {
                    if walker_cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    session.mark_folder(root, FolderStatus::Scanning);
                    let result =
                        walker.walk_streaming(root, &walk_tx, &walker_cancel, Some(&walker_events));
                    match result {
                        Ok(errors) => {
                            walker_errors.fetch_add(errors.len(), Ordering::Relaxed);
                            for _ in &errors {
                                session.record_error();
                            }
                            session.mark_folder(
                                root,
                                if errors.is_empty() {
                                    FolderStatus::Completed
                                } else {
                                    FolderStatus::Error
                                },
                            );
                        }
                        Err(_cancelled) => {
                            session.mark_folder(root, FolderStatus::Error);
                            break;
                        }
                    }
                }
                // Dropping walk_tx (end of scope) signals hashers to stop
                // once the queue drains.
            });

            // Hasher pool: N workers pull observations, compute or recall
            // signatures, and forward them to the single-writer indexer.
            for _ in 0..config.concurrency.max(1) {
                let rx = walk_rx.clone();
                let tx = hash_tx.clone();
                let persistence = Arc::clone(&self.persistence);
                let worker_cancel = cancel.raw();
                let worker_events = events.clone();
                let worker_cache_hits = Arc::clone(&cache_hits);
                scope.spawn(move || {
                    for observation in rx.iter() {
                        if worker_cancel.load(Ordering::Relaxed) {
                            break;
                        }
                        match hash_observation(&observation, persistence.as_ref()) {
                            Ok(hashed) => {
                                if hashed.from_cache {
                                    worker_cache_hits.fetch_add(1, Ordering::Relaxed);
                                    worker_events.send(Event::Hash(HashEvent::CacheHit {
                                        path: hashed.record.path.clone(),
                                    }));
                                } else {
                                    worker_events.send(Event::Hash(HashEvent::PhotoHashed {
                                        path: hashed.record.path.clone(),
                                    }));
                                }
                                if tx.send(hashed).is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                worker_events.send(Event::Hash(HashEvent::Error {
                                    path: observation.path.clone(),
                                    message: e.to_string(),
                                }));
                            }
                        }
                    }
                });
            }
            drop(walk_rx);
            drop(hash_tx);

            // Indexer: the only writer into `self.index`, accumulates the
            // FileSignature list the Grouper will run over once hashing
            // finishes.
            let mut signatures = Vec::new();
            let mut last_checkpoint_count = 0usize;
            let mut last_checkpoint_at = Instant::now();

            for hashed in hash_rx.iter() {
                self.index.add(
                    hashed.record.id,
                    hashed.content_hash,
                    &hashed.perceptual_hashes,
                );
                let _ = self.persistence.upsert_file_record(&hashed.record);
                if let Some(hash) = hashed.content_hash {
                    let _ = self.persistence.upsert_content_hash(hashed.record.id, hash);
                }
                for perceptual in &hashed.perceptual_hashes {
                    let _ = self
                        .persistence
                        .upsert_perceptual_hash(hashed.record.id, perceptual);
                }

                session.record_processed(false, 0);
                signatures.push(FileSignature {
                    id: hashed.record.id,
                    path: hashed.record.path.clone(),
                    size: hashed.record.size,
                    width: hashed.record.width,
                    height: hashed.record.height,
                    created_at: hashed.record.created_at,
                    content_hash: hashed.content_hash,
                    perceptual_hashes: hashed.perceptual_hashes,
                });

                if signatures.len() - last_checkpoint_count >= PROGRESS_CHECKPOINT_ITEMS
                    || last_checkpoint_at.elapsed().as_secs() >= PROGRESS_CHECKPOINT_SECS
                {
                    last_checkpoint_count = signatures.len();
                    last_checkpoint_at = Instant::now();
                    events.send(Event::Pipeline(PipelineEvent::Checkpoint));
                    let _ = session.maybe_checkpoint(events);
                }
            }

            signatures
        });

        events.send(Event::Scan(ScanEvent::Completed {
            total_files: signatures.len(),
        }));
        events.send(Event::Hash(HashEvent::Completed {
            total_hashed: signatures.len(),
            cache_hits: cache_hits.load(Ordering::Relaxed),
        }));

        if cancel.is_cancelled() {
            session.transition(SessionStatus::Cancelled, events)?;
            events.send(Event::Pipeline(PipelineEvent::Cancelled));
            return Ok(OrchestratorResult {
                groups: Vec::new(),
                total_files: signatures.len(),
                cache_hits: cache_hits.load(Ordering::Relaxed),
                errors: vec!["scan cancelled".to_string()],
                cancelled: true,
            });
        }

        session.set_phase(Phase::Grouping);
        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Grouping,
        }));
        events.send(Event::Compare(CompareEvent::Started {
            total_photos: signatures.len(),
        }));

        let grouper = Grouper::new();
        let grouper_config = config.grouper_config();
        let groups = grouper.group(&signatures, &self.index, &grouper_config)?;

        let duplicate_count: usize = groups.iter().map(|g| g.duplicate_count()).sum();
        events.send(Event::Compare(CompareEvent::Completed {
            total_groups: groups.len(),
            total_duplicates: duplicate_count,
        }));

        self.record_group_metrics(&groups, &signatures, session);
        self.persist_summaries(&groups, &signatures, session, events)?;

        session.set_phase(Phase::Reviewing);
        session.transition(SessionStatus::AwaitingReview, events)?;

        let duration_ms = start.elapsed().as_millis() as u64;
        events.send(Event::Pipeline(PipelineEvent::Completed {
            summary: PipelineSummary {
                total_photos: signatures.len(),
                duplicate_groups: groups.len(),
                duplicate_count,
                potential_savings_bytes: self.reclaimable_bytes(&groups, &signatures),
                duration_ms,
            },
        }));

        let errors = vec![format!("{} scan error(s)", scan_errors.load(Ordering::Relaxed))]
            .into_iter()
            .filter(|_| scan_errors.load(Ordering::Relaxed) > 0)
            .collect();

        Ok(OrchestratorResult {
            total_files: signatures.len(),
            cache_hits: cache_hits.load(Ordering::Relaxed),
            groups,
            errors,
            cancelled: false,
        })
    }

    fn reclaimable_bytes(&self, groups: &[DuplicateGroup], signatures: &[FileSignature]) -> u64 {
        let by_id: std::collections::HashMap<Uuid, &FileSignature> =
            signatures.iter().map(|s| (s.id, s)).collect();
        groups
            .iter()
            .flat_map(|g| g.members.iter().filter(|id| **id != g.representative))
            .filter_map(|id| by_id.get(id).map(|s| s.size))
            .sum()
    }

    fn record_group_metrics(
        &self,
        groups: &[DuplicateGroup],
        signatures: &[FileSignature],
        session: &SessionStore,
    ) {
        let by_id: std::collections::HashMap<Uuid, &FileSignature> =
            signatures.iter().map(|s| (s.id, s)).collect();
        for group in groups {
            for member in &group.members {
                if *member == group.representative {
                    continue;
                }
                let bytes = by_id.get(member).map(|s| s.size).unwrap_or(0);
                session.record_processed(true, bytes);
            }
        }
    }

    fn persist_summaries(
        &self,
        groups: &[DuplicateGroup],
        signatures: &[FileSignature],
        session: &SessionStore,
        events: &EventSender,
    ) -> Result<(), DuplicateFinderError> {
        let by_id: std::collections::HashMap<Uuid, &FileSignature> =
            signatures.iter().map(|s| (s.id, s)).collect();
        let mut current = session.session();
        current.duplicate_summaries = groups
            .iter()
            .map(|g| DuplicateSummary {
                id: g.id,
                item_count: g.members.len(),
                representative: by_id
                    .get(&g.representative)
                    .map(|s| s.path.clone())
                    .unwrap_or_default(),
                confidence: g.confidence,
            })
            .collect();
        self.persistence.save_session(&current)?;
        session.checkpoint_now(events)?;
        Ok(())
    }
}

/// Hash (or recall from a prior scan) one observed file. Resume safety:
/// when a `FileRecord` already exists for this path with a matching size
/// and mtime, and its signatures are already persisted, the file is
/// returned without recomputation — at-most-once hashing per file per
/// scan.
fn hash_observation(
    observation: &FileObservation,
    persistence: &dyn Persistence,
) -> Result<HashedFile, DuplicateFinderError> {
    let id = FileRecord::id_for_path(&observation.path);
    let modified_at: DateTime<Utc> = observation.mtime.into();

    if let Some(existing) = persistence.get_file_record_by_path(&observation.path)? {
        if existing.size == observation.size && existing.modified_at == modified_at {
            if let Some(hashed) = try_recall(&existing, persistence)? {
                return Ok(hashed);
            }
        }
    }

    let digest = content_hash(&observation.path)?;

    let (perceptual_hashes, width, height, capture_date, video_signature) =
        match observation.media_type {
            MediaType::Photo => {
                let hashes = image_hashes(&observation.path)?;
                let (w, h) = hashes
                    .first()
                    .map(|h| (Some(h.width), Some(h.height)))
                    .unwrap_or((None, None));
                (hashes, w, h, capture_date(&observation.path), None)
            }
            MediaType::Video => {
                let signature = video_signature(&observation.path)?;
                (Vec::new(), None, None, None, Some(signature))
            }
        };

    let record = FileRecord {
        id,
        path: observation.path.clone(),
        media_type: observation.media_type,
        size: observation.size,
        created_at: observation
            .ctime
            .map(Into::into)
            .unwrap_or_else(Utc::now),
        modified_at,
        width,
        height,
        capture_date,
    };

    if let Some(signature) = &video_signature {
        persistence.upsert_video_signature(id, signature)?;
    }

    Ok(HashedFile {
        record,
        content_hash: Some(digest),
        perceptual_hashes,
        from_cache: false,
    })
}

/// Attempt to reuse a previously persisted record's signatures without
/// rehashing. Returns `None` when the signatures a resumed scan expects
/// for this media type aren't fully present yet (e.g. interrupted
/// mid-hash), in which case the caller recomputes from scratch.
fn try_recall(
    record: &FileRecord,
    persistence: &dyn Persistence,
) -> Result<Option<HashedFile>, DuplicateFinderError> {
    let content_hash = persistence.get_content_hash(record.id)?;
    if content_hash.is_none() {
        return Ok(None);
    }

    match record.media_type {
        MediaType::Photo => {
            let perceptual_hashes = persistence.get_perceptual_hashes(record.id)?;
            if perceptual_hashes.len() < crate::core::persistence::HASH_ALGORITHMS.len() {
                return Ok(None);
            }
            Ok(Some(HashedFile {
                record: record.clone(),
                content_hash,
                perceptual_hashes,
                from_cache: true,
            }))
        }
        MediaType::Video => {
            if persistence.get_video_signature(record.id)?.is_none() {
                return Ok(None);
            }
            Ok(Some(HashedFile {
                record: record.clone(),
                content_hash,
                perceptual_hashes: Vec::new(),
                from_cache: true,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::persistence::MemoryPersistence;
    use crate::core::session::Session;
    use crate::events::EventChannel;
    use image::{ImageBuffer, Rgb};
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_test_photo(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        let img = ImageBuffer::from_fn(32, 32, |x, y| Rgb([(x * 7) as u8, (y * 7) as u8, 10]));
        image::DynamicImage::ImageRgb8(img)
            .save_with_format(&path, image::ImageFormat::Png)
            .unwrap();
        path
    }

    fn orchestrator() -> (ScanOrchestrator, SessionStore, TempDir) {
        let persistence: Arc<dyn Persistence> = Arc::new(MemoryPersistence::new());
        let index = Arc::new(SimilarityIndex::new());
        let checkpoint_dir = TempDir::new().unwrap();
        let session = Session::new(vec![]);
        let store = SessionStore::new(
            Arc::clone(&persistence),
            checkpoint_dir.path().to_path_buf(),
            session,
        );
        (
            ScanOrchestrator::new(persistence, index),
            store,
            checkpoint_dir,
        )
    }

    #[test]
    fn exact_duplicate_pair_forms_one_group() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.jpg");
        let b = temp_dir.path().join("b.jpg");
        File::create(&a).unwrap().write_all(&[1, 2, 3, 4, 5]).unwrap();
        File::create(&b).unwrap().write_all(&[1, 2, 3, 4, 5]).unwrap();

        let (orchestrator, session, _dir) = orchestrator();
        let (events, _rx) = EventChannel::new();
        let config = OrchestratorConfig::default();
        let cancel = CancellationToken::new();

        let result = orchestrator
            .run(
                vec![temp_dir.path().to_path_buf()],
                &config,
                &session,
                &events,
                &cancel,
            )
            .unwrap();

        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].confidence, 1.0);
    }

    #[test]
    fn unrelated_images_form_no_groups() {
        let temp_dir = TempDir::new().unwrap();
        write_test_photo(&temp_dir, "one.png");

        let (orchestrator, session, _dir) = orchestrator();
        let (events, _rx) = EventChannel::new();
        let config = OrchestratorConfig::default();
        let cancel = CancellationToken::new();

        let result = orchestrator
            .run(
                vec![temp_dir.path().to_path_buf()],
                &config,
                &session,
                &events,
                &cancel,
            )
            .unwrap();

        assert!(result.groups.is_empty());
    }

    #[test]
    fn empty_directory_completes_with_no_groups() {
        let temp_dir = TempDir::new().unwrap();
        let (orchestrator, session, _dir) = orchestrator();
        let (events, _rx) = EventChannel::new();
        let config = OrchestratorConfig::default();
        let cancel = CancellationToken::new();

        let result = orchestrator
            .run(
                vec![temp_dir.path().to_path_buf()],
                &config,
                &session,
                &events,
                &cancel,
            )
            .unwrap();

        assert!(result.groups.is_empty());
        assert_eq!(result.total_files, 0);
    }

    #[test]
    fn cancelling_before_run_yields_cancelled_result() {
        let temp_dir = TempDir::new().unwrap();
        write_test_photo(&temp_dir, "one.png");

        let (orchestrator, session, _dir) = orchestrator();
        let (events, _rx) = EventChannel::new();
        let config = OrchestratorConfig::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = orchestrator
            .run(
                vec![temp_dir.path().to_path_buf()],
                &config,
                &session,
                &events,
                &cancel,
            )
            .unwrap();

        assert!(result.cancelled);
    }
}
