use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use time::OffsetDateTime;

use super::column::build_column;
use super::config::Config;
use super::error::{IngestError, MonitorError};
use super::extractor::{ChannelExtractor, TdmsExtractor};
use super::merger::{MergeOutcome, TableMerger};
use super::naming::{local_now, TableId};
use super::source_file::{scan_directory, SourceFile};
use super::store::{open_store, TabularStore};
use super::tracker::ProcessedTracker;
use super::upload::{DriveUploader, Uploader};
use super::worker_status::{Phase, WorkerStatus};

/// Longest stretch the loop sleeps before checking for shutdown again
const SHUTDOWN_CHECK_INTERVAL: Duration = Duration::from_millis(100);

pub type Clock = Box<dyn Fn() -> OffsetDateTime + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorState {
    #[default]
    Idle,
    Processing,
}

/// Cooperative stop request shared between the loop and whoever controls it
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Summary of one poll cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,
    /// Recordings present in the watch directory
    pub discovered: usize,
    /// Recordings that were new or modified
    pub changed: usize,
    /// Recordings merged and committed, including ones found already present
    pub merged: usize,
    /// Recordings left for the next cycle, with the failure kind
    pub failed: Vec<(TableId, &'static str)>,
    /// Recordings not attempted because shutdown was requested
    pub skipped: usize,
}

#[derive(Debug, Default)]
struct SubsetReport {
    merged: usize,
    failed: Vec<(TableId, &'static str)>,
    skipped: usize,
}

/// The ingestion loop.
///
/// Each cycle lists the watch directory, asks the tracker which recordings are new or changed
/// and runs every one of them through extract, build, merge and commit. A failure at any stage
/// is logged and leaves that recording for the next cycle; it never stops the other recordings
/// or the loop. The processed record is committed only after its merge succeeded.
pub struct Monitor<E: ChannelExtractor, S: TabularStore> {
    config: Config,
    extractor: E,
    merger: TableMerger<S>,
    tracker: Mutex<ProcessedTracker>,
    clock: Clock,
    status: Option<Sender<WorkerStatus>>,
    uploader: Option<(Box<dyn Uploader>, String)>,
    state: MonitorState,
    cycle: u64,
}

impl Monitor<TdmsExtractor, Box<dyn TabularStore>> {
    /// Build the monitor described by a config: TDMS extraction, the configured store and
    /// the optional upload step. Fails if the config cannot work at all.
    pub fn from_config(config: &Config) -> Result<Self, MonitorError> {
        config.validate()?;
        config
            .watch_path
            .read_dir()
            .map_err(|e| MonitorError::BadWatchPath(config.watch_path.clone(), e))?;
        let store = open_store(config)?;
        let tracker = ProcessedTracker::load(&config.processed_log_path)?;
        let mut monitor = Self::new(config, TdmsExtractor::from_config(config), store, tracker)?;
        if let Some(upload) = &config.upload {
            let uploader = DriveUploader::from_config(upload)?;
            monitor = monitor.with_uploader(Box::new(uploader), &upload.drive_name);
        }
        Ok(monitor)
    }
}

impl<E: ChannelExtractor, S: TabularStore> Monitor<E, S> {
    pub fn new(
        config: &Config,
        extractor: E,
        store: S,
        tracker: ProcessedTracker,
    ) -> Result<Self, MonitorError> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            extractor,
            merger: TableMerger::new(store, config.duplicate_policy),
            tracker: Mutex::new(tracker),
            clock: Box::new(local_now),
            status: None,
            uploader: None,
            state: MonitorState::Idle,
            cycle: 0,
        })
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_status(mut self, tx: Sender<WorkerStatus>) -> Self {
        self.status = Some(tx);
        self
    }

    pub fn with_uploader(mut self, uploader: Box<dyn Uploader>, remote_name: &str) -> Self {
        self.uploader = Some((uploader, remote_name.to_string()));
        self
    }

    pub fn store(&self) -> &S {
        self.merger.store()
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn cycles_run(&self) -> u64 {
        self.cycle
    }

    pub fn n_workers(&self) -> usize {
        self.config.n_threads.max(1) as usize
    }

    /// Run one complete cycle
    pub fn run_cycle(&mut self) -> CycleReport {
        self.cycle_until(&ShutdownSignal::new())
    }

    /// Poll until shutdown is requested. Shutdown is honored between recordings and while
    /// waiting for the next cycle; a recording already in progress always finishes.
    pub fn run(&mut self, shutdown: &ShutdownSignal) {
        spdlog::info!(
            "Watching {} every {}s",
            self.config.watch_path.display(),
            self.config.poll_interval_secs
        );
        while !shutdown.is_requested() {
            self.cycle_until(shutdown);
            self.wait(self.config.poll_interval(), shutdown);
        }
        spdlog::info!("Monitor stopped after {} cycles", self.cycle);
    }

    fn wait(&self, interval: Duration, shutdown: &ShutdownSignal) {
        let start = Instant::now();
        while !shutdown.is_requested() {
            let elapsed = start.elapsed();
            if elapsed >= interval {
                break;
            }
            std::thread::sleep((interval - elapsed).min(SHUTDOWN_CHECK_INTERVAL));
        }
    }

    fn cycle_until(&mut self, shutdown: &ShutdownSignal) -> CycleReport {
        self.cycle += 1;
        self.state = MonitorState::Processing;
        let mut report = CycleReport {
            cycle: self.cycle,
            ..Default::default()
        };

        let config = &self.config;
        let current = match scan_directory(&config.watch_path, |p| config.matches_extension(p)) {
            Ok(files) => files,
            Err(e) => {
                spdlog::error!(
                    "Could not list watch directory {}: {}",
                    config.watch_path.display(),
                    e
                );
                self.state = MonitorState::Idle;
                return report;
            }
        };
        let changed: Vec<SourceFile> = self
            .tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .diff(&current)
            .into_iter()
            .cloned()
            .collect();
        report.discovered = current.len();
        report.changed = changed.len();

        if !changed.is_empty() {
            let total_bytes: u64 = changed.iter().map(|f| f.size_bytes).sum();
            spdlog::info!(
                "Cycle {}: {} of {} recordings are new or changed ({})",
                self.cycle,
                changed.len(),
                current.len(),
                human_bytes::human_bytes(total_bytes as f64)
            );
        }

        let subsets = create_subsets(&changed, self.n_workers());
        let this = &*self;
        let results: Vec<SubsetReport> = if subsets.len() <= 1 {
            subsets
                .iter()
                .map(|subset| this.process_subset(subset, 0, shutdown))
                .collect()
        } else {
            std::thread::scope(|s| {
                let handles: Vec<_> = subsets
                    .iter()
                    .enumerate()
                    .map(|(worker_id, subset)| {
                        s.spawn(move || this.process_subset(subset, worker_id, shutdown))
                    })
                    .collect();
                handles
                    .into_iter()
                    .zip(subsets.iter())
                    .map(|(handle, subset)| match handle.join() {
                        Ok(result) => result,
                        Err(_) => {
                            spdlog::error!("A worker panicked during cycle {}", this.cycle);
                            SubsetReport {
                                failed: subset.iter().map(|f| (f.id.clone(), "WorkerPanic")).collect(),
                                ..Default::default()
                            }
                        }
                    })
                    .collect()
            })
        };

        for result in results {
            report.merged += result.merged;
            report.skipped += result.skipped;
            report.failed.extend(result.failed);
        }

        if report.merged > 0 {
            self.upload_export();
        }
        if report.changed > 0 {
            spdlog::info!(
                "Cycle {} done: {} merged, {} failed, {} skipped",
                report.cycle,
                report.merged,
                report.failed.len(),
                report.skipped
            );
        }
        self.state = MonitorState::Idle;
        report
    }

    fn process_subset(
        &self,
        subset: &[SourceFile],
        worker_id: usize,
        shutdown: &ShutdownSignal,
    ) -> SubsetReport {
        let mut result = SubsetReport::default();
        self.send_status(0.0, worker_id, Phase::Processing);
        for (idx, file) in subset.iter().enumerate() {
            if shutdown.is_requested() {
                result.skipped = subset.len() - idx;
                spdlog::info!(
                    "Shutdown requested, leaving {} recordings for later",
                    result.skipped
                );
                break;
            }
            match self.ingest(file) {
                Ok(_) => result.merged += 1,
                Err(e) => {
                    spdlog::error!(
                        "Failed to ingest {} [{}]: {}",
                        file.path.display(),
                        e.kind(),
                        e
                    );
                    result.failed.push((file.id.clone(), e.kind()));
                }
            }
            self.send_status(
                (idx + 1) as f32 / subset.len() as f32,
                worker_id,
                Phase::Processing,
            );
        }
        self.send_status(1.0, worker_id, Phase::Idle);
        result
    }

    /// Extract, build, merge and commit one recording
    fn ingest(&self, file: &SourceFile) -> Result<MergeOutcome, IngestError> {
        let extracted = self.extractor.extract(&file.path)?;
        spdlog::info!(
            "Extracted {} samples from {}",
            extracted.samples.len(),
            file.path.display()
        );
        let column = build_column(extracted.samples, &self.config.column_prefix, (self.clock)());
        let outcome = self.merger.merge(&extracted.logical_name, column)?;
        self.tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .commit(&file.id, file.signature)?;
        Ok(outcome)
    }

    fn upload_export(&self) {
        let (uploader, remote_name) = match &self.uploader {
            Some(upload) => upload,
            None => return,
        };
        let export = match self.merger.store().export_path() {
            Some(path) => path,
            None => return,
        };
        self.send_status(0.0, 0, Phase::Uploading);
        if let Err(e) = uploader.upload(export, remote_name) {
            spdlog::error!(
                "Failed to upload {} as {}: {}",
                export.display(),
                remote_name,
                e
            );
        }
        self.send_status(1.0, 0, Phase::Idle);
    }

    /// Status is best effort; a receiver that went away is not an error
    fn send_status(&self, progress: f32, worker_id: usize, phase: Phase) {
        if let Some(tx) = &self.status {
            let _ = tx.send(WorkerStatus::new(progress, self.cycle, worker_id, phase));
        }
    }
}

/// Distribute items round-robin over at most `n_subsets` non-empty subsets
pub fn create_subsets<T: Clone>(items: &[T], n_subsets: usize) -> Vec<Vec<T>> {
    let n_subsets = n_subsets.clamp(1, items.len().max(1));
    let mut subsets: Vec<Vec<T>> = vec![Vec::new(); n_subsets];
    for (idx, item) in items.iter().enumerate() {
        subsets[idx % n_subsets].push(item.clone())
    }
    subsets.retain(|s| !s.is_empty());
    subsets
}

/// Recordings the watch directory would offer right now
pub fn pending_files(config: &Config, tracker: &ProcessedTracker) -> std::io::Result<Vec<SourceFile>> {
    let current = scan_directory(&config.watch_path, |p: &Path| config.matches_extension(p))?;
    Ok(tracker.diff(&current).into_iter().cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DuplicatePolicy, StoreConfig};
    use crate::error::UploadError;
    use crate::extractor::ChannelSelector;
    use crate::store::memory::MemoryStore;
    use crate::store::workbook::WorkbookStore;
    use crate::tdms::testing::{patch_value_count, segment_bytes, write_recording};
    use crate::upload::UploadOutcome;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicU64;
    use std::time::SystemTime;
    use time::macros::datetime;

    struct Fixture {
        dir: tempfile::TempDir,
        config: Config,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::create_dir(dir.path().join("watch")).unwrap();
            let config = Config {
                watch_path: dir.path().join("watch"),
                processed_log_path: dir.path().join("processed_files.log"),
                store: StoreConfig::Workbook {
                    path: dir.path().join("final_data.xlsx"),
                },
                ..Default::default()
            };
            Self { dir, config }
        }

        fn recording(&self, name: &str, samples: &[f64]) -> PathBuf {
            let path = self.config.watch_path.join(name);
            write_recording(&path, "Untitled", &[("accelerationgroup", samples)]);
            path
        }

        fn monitor<S: TabularStore>(&self, store: S) -> Monitor<TdmsExtractor, S> {
            let tracker = ProcessedTracker::load(&self.config.processed_log_path).unwrap();
            self.monitor_with(store, tracker)
        }

        fn monitor_with<S: TabularStore>(
            &self,
            store: S,
            tracker: ProcessedTracker,
        ) -> Monitor<TdmsExtractor, S> {
            let extractor = TdmsExtractor::new(
                None,
                ChannelSelector::Named(String::from("accelerationgroup")),
            );
            let minutes = AtomicU64::new(0);
            Monitor::new(&self.config, extractor, store, tracker)
                .unwrap()
                .with_clock(Box::new(move || {
                    let n = minutes.fetch_add(5, Ordering::SeqCst) as i64;
                    datetime!(2024-01-01 00:00:00 UTC) + time::Duration::minutes(n)
                }))
        }
    }

    fn touch(path: &Path, seconds: u64) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(seconds))
            .unwrap();
    }

    #[test]
    fn test_new_recording_then_quiet_cycle() {
        let fixture = Fixture::new();
        fixture.recording("10hz.tdms", &[0.1, 0.2, 0.3]);
        let mut monitor = fixture.monitor(MemoryStore::new());

        let report = monitor.run_cycle();
        assert_eq!(report.cycle, 1);
        assert_eq!((report.discovered, report.changed, report.merged), (1, 1, 1));
        let table = monitor.store().table("10hz").unwrap();
        assert_eq!(table.columns.len(), 1);
        assert_eq!(table.columns[0].name, "z-axis-2024-01-01_00-00-00");
        assert_eq!(table.columns[0].values, vec![0.1, 0.2, 0.3]);

        let report = monitor.run_cycle();
        assert_eq!((report.changed, report.merged), (0, 0));
        assert_eq!(monitor.store().table("10hz").unwrap().columns.len(), 1);
        assert_eq!(monitor.state(), MonitorState::Idle);
    }

    #[test]
    fn test_modified_recording_appends_column() {
        let fixture = Fixture::new();
        let path = fixture.recording("10hz.tdms", &[0.1, 0.2, 0.3]);
        touch(&path, 1_700_000_000);
        let mut monitor = fixture.monitor(MemoryStore::new());
        monitor.run_cycle();
        let first = monitor.store().table("10hz").unwrap().columns[0].clone();

        fixture.recording("10hz.tdms", &[1.0, 2.0, 3.0, 4.0]);
        touch(&path, 1_700_000_300);
        let report = monitor.run_cycle();
        assert_eq!(report.merged, 1);
        let table = monitor.store().table("10hz").unwrap();
        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.columns[0], first);
        assert_eq!(table.columns[1].name, "z-axis-2024-01-01_00-05-00");
        assert_eq!(table.columns[1].len(), 4);
    }

    #[test]
    fn test_bad_recording_is_isolated_and_retried() {
        let fixture = Fixture::new();
        fixture.recording("10hz.tdms", &[0.1]);
        fixture.recording("20hz.tdms", &[0.2]);
        let bad = fixture.config.watch_path.join("bad.tdms");
        std::fs::write(&bad, b"not a recording at all").unwrap();
        let mut monitor = fixture.monitor(MemoryStore::new());

        let report = monitor.run_cycle();
        assert_eq!(report.merged, 2);
        assert_eq!(
            report.failed,
            vec![(TableId::new("bad").unwrap(), "UnreadableFile")]
        );
        assert!(monitor.store().table("bad").is_none());
        assert!(monitor.store().table("20hz").is_some());

        let report = monitor.run_cycle();
        assert_eq!(report.changed, 1);
        assert_eq!(report.failed.len(), 1);

        fixture.recording("bad.tdms", &[9.0]);
        touch(&bad, 1_700_000_000);
        let report = monitor.run_cycle();
        assert_eq!((report.merged, report.failed.len()), (1, 0));
        assert_eq!(monitor.store().table("bad").unwrap().columns.len(), 1);
    }

    #[test]
    fn test_corrupt_value_count_does_not_stop_cycle() {
        let fixture = Fixture::new();
        fixture.recording("10hz.tdms", &[0.1, 0.2]);
        let mut bytes = segment_bytes("Untitled", &[("accelerationgroup", &[1.0, 2.0])]);
        patch_value_count(&mut bytes, "Untitled", "accelerationgroup", (1 << 61) + 1);
        std::fs::write(fixture.config.watch_path.join("huge.tdms"), bytes).unwrap();
        let mut monitor = fixture.monitor(MemoryStore::new());

        let report = monitor.run_cycle();
        assert_eq!(report.merged, 1);
        assert_eq!(
            report.failed,
            vec![(TableId::new("huge").unwrap(), "UnreadableFile")]
        );
        assert!(monitor.store().table("10hz").is_some());
        assert!(monitor.store().table("huge").is_none());
    }

    #[test]
    fn test_missing_channel_is_not_committed() {
        let fixture = Fixture::new();
        let path = fixture.config.watch_path.join("10hz.tdms");
        write_recording(&path, "Untitled", &[("other", &[1.0])]);
        let mut monitor = fixture.monitor(MemoryStore::new());
        let report = monitor.run_cycle();
        assert_eq!(
            report.failed,
            vec![(TableId::new("10hz").unwrap(), "ChannelNotFound")]
        );
        assert!(!fixture.config.processed_log_path.exists());
    }

    #[test]
    fn test_store_failure_leaves_file_for_next_cycle() {
        let fixture = Fixture::new();
        fixture.recording("10hz.tdms", &[0.1]);
        let mut monitor = fixture.monitor(MemoryStore::new());
        monitor.store().set_unavailable(true);
        let report = monitor.run_cycle();
        assert_eq!(report.failed[0].1, "MergeFailed");

        monitor.store().set_unavailable(false);
        let report = monitor.run_cycle();
        assert_eq!(report.merged, 1);
        assert_eq!(monitor.store().table("10hz").unwrap().columns.len(), 1);
    }

    #[test]
    fn test_commit_failure_reoffers_and_duplicates() {
        let fixture = Fixture::new();
        fixture.recording("10hz.tdms", &[0.1, 0.2]);
        let record_dir = fixture.dir.path().join("record");
        let tracker = ProcessedTracker::load(&record_dir.join("processed.log")).unwrap();
        let mut monitor = fixture.monitor_with(MemoryStore::new(), tracker);

        let report = monitor.run_cycle();
        assert_eq!(report.merged, 0);
        assert_eq!(report.failed[0].1, "TrackerPersistFailed");
        assert_eq!(monitor.store().table("10hz").unwrap().columns.len(), 1);

        std::fs::create_dir(&record_dir).unwrap();
        let report = monitor.run_cycle();
        assert_eq!(report.merged, 1);
        let table = monitor.store().table("10hz").unwrap();
        assert_eq!(table.columns.len(), 2);
        assert!(table.columns[0].same_values(&table.columns[1]));

        assert_eq!(monitor.run_cycle().changed, 0);
    }

    #[test]
    fn test_skip_identical_after_commit_failure() {
        let mut fixture = Fixture::new();
        fixture.config.duplicate_policy = DuplicatePolicy::SkipIdentical;
        fixture.recording("10hz.tdms", &[0.1, 0.2]);
        let record_dir = fixture.dir.path().join("record");
        let tracker = ProcessedTracker::load(&record_dir.join("processed.log")).unwrap();
        let mut monitor = fixture.monitor_with(MemoryStore::new(), tracker);
        monitor.run_cycle();

        std::fs::create_dir(&record_dir).unwrap();
        let report = monitor.run_cycle();
        assert_eq!(report.merged, 1);
        assert_eq!(monitor.store().table("10hz").unwrap().columns.len(), 1);
        assert_eq!(monitor.run_cycle().changed, 0);
    }

    #[test]
    fn test_parallel_workers() {
        let mut fixture = Fixture::new();
        fixture.config.n_threads = 3;
        for n in 0..7 {
            fixture.recording(&format!("{n}hz.tdms"), &[n as f64; 3]);
        }
        let (tx, rx) = std::sync::mpsc::channel();
        let mut monitor = fixture.monitor(MemoryStore::new()).with_status(tx);
        let report = monitor.run_cycle();
        assert_eq!(report.merged, 7);
        assert!(report.failed.is_empty());
        for n in 0..7 {
            let table = monitor.store().table(&format!("{n}hz")).unwrap();
            assert_eq!(table.columns[0].values, vec![n as f64; 3]);
        }
        let tracker = ProcessedTracker::load(&fixture.config.processed_log_path).unwrap();
        assert_eq!(tracker.len(), 7);

        let statuses: Vec<WorkerStatus> = rx.try_iter().collect();
        let mut workers: Vec<usize> = statuses.iter().map(|s| s.worker_id).collect();
        workers.sort();
        workers.dedup();
        assert_eq!(workers, vec![0, 1, 2]);
        assert!(statuses.iter().all(|s| s.cycle == 1));
    }

    #[test]
    fn test_shutdown() {
        let fixture = Fixture::new();
        fixture.recording("10hz.tdms", &[0.1]);
        let mut monitor = fixture.monitor(MemoryStore::new());
        let shutdown = ShutdownSignal::new();
        shutdown.request();
        let report = monitor.cycle_until(&shutdown);
        assert_eq!((report.changed, report.skipped, report.merged), (1, 1, 0));
        assert!(monitor.store().table("10hz").is_none());

        monitor.run(&shutdown);
        assert_eq!(monitor.cycles_run(), 1);
    }

    #[test]
    fn test_run_stops_on_request() {
        let mut fixture = Fixture::new();
        fixture.config.poll_interval_secs = 3600;
        fixture.recording("10hz.tdms", &[0.1]);
        let mut monitor = fixture.monitor(MemoryStore::new());
        let shutdown = ShutdownSignal::new();
        let stopper = shutdown.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(500));
            stopper.request();
        });
        monitor.run(&shutdown);
        handle.join().unwrap();
        assert_eq!(monitor.cycles_run(), 1);
        assert!(monitor.store().table("10hz").is_some());
    }

    struct RecordingUploader(Arc<Mutex<Vec<(PathBuf, String)>>>);

    impl Uploader for RecordingUploader {
        fn upload(&self, local_path: &Path, remote_name: &str) -> Result<UploadOutcome, UploadError> {
            self.0
                .lock()
                .unwrap()
                .push((local_path.to_path_buf(), remote_name.to_string()));
            Ok(UploadOutcome::Updated {
                file_id: String::from("id"),
            })
        }
    }

    #[test]
    fn test_upload_after_merging_cycle() {
        let fixture = Fixture::new();
        fixture.recording("10hz.tdms", &[0.1, 0.2]);
        let workbook = fixture.dir.path().join("final_data.xlsx");
        let uploads = Arc::new(Mutex::new(Vec::new()));
        let mut monitor = fixture
            .monitor(WorkbookStore::new(&workbook))
            .with_uploader(Box::new(RecordingUploader(uploads.clone())), "final_data.xlsx");

        monitor.run_cycle();
        monitor.run_cycle();
        let uploads = uploads.lock().unwrap();
        assert_eq!(
            *uploads,
            vec![(workbook.clone(), String::from("final_data.xlsx"))]
        );
        let columns = monitor
            .store()
            .read_columns(&TableId::new("10hz").unwrap())
            .unwrap();
        assert_eq!(columns[0].values, vec![0.1, 0.2]);
    }

    #[test]
    fn test_create_subsets() {
        let items: Vec<i32> = (0..5).collect();
        assert_eq!(
            create_subsets(&items, 2),
            vec![vec![0, 2, 4], vec![1, 3]]
        );
        assert_eq!(create_subsets(&items[..2], 4), vec![vec![0], vec![1]]);
        assert!(create_subsets::<i32>(&[], 3).is_empty());
    }

    #[test]
    fn test_pending_files() {
        let fixture = Fixture::new();
        fixture.recording("10hz.tdms", &[0.1]);
        std::fs::write(fixture.config.watch_path.join("notes.txt"), b"x").unwrap();
        let tracker = ProcessedTracker::load(&fixture.config.processed_log_path).unwrap();
        let pending = pending_files(&fixture.config, &tracker).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id.as_str(), "10hz");
    }
}
