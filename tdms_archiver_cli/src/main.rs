use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use libtdms_archiver::config::{Config, StoreConfig};
use libtdms_archiver::error::ConfigError;
use libtdms_archiver::monitor::{pending_files, Monitor, ShutdownSignal};
use libtdms_archiver::snapshot::{SnapshotCache, SnapshotView};
use libtdms_archiver::store::open_store;
use libtdms_archiver::tracker::ProcessedTracker;
use libtdms_archiver::worker_status::Phase;

fn make_template_config(path: &Path) -> Result<(), ConfigError> {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config)?;
    let mut file = File::create(path)?;
    file.write_all(yaml_str.as_bytes())?;
    Ok(())
}

/// Loggers that share one file sink. The terminal sink is left out while progress bars are
/// drawn, since its lines would tear through them.
struct Logging {
    file_only: Arc<spdlog::Logger>,
    with_terminal: Arc<spdlog::Logger>,
}

impl Logging {
    fn quiet(&self) {
        spdlog::set_default_logger(self.file_only.clone());
    }

    fn loud(&self) {
        spdlog::set_default_logger(self.with_terminal.clone());
    }
}

fn init_logging() -> Result<Logging, spdlog::Error> {
    let file_sink: Arc<dyn spdlog::sink::Sink> = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(PathBuf::from("./tdms_archiver.log"))
            .formatter(Box::new(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!(
                    "[{date_short} {time_short}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
                ),
            )))
            .truncate(false)
            .build()?,
    );
    let term_sink: Arc<dyn spdlog::sink::Sink> = Arc::new(
        spdlog::sink::StdStreamSink::builder()
            .std_stream(spdlog::sink::StdStream::Stderr)
            .build()?,
    );
    let file_only = Arc::new(
        spdlog::Logger::builder()
            .flush_level_filter(spdlog::LevelFilter::All)
            .sink(file_sink.clone())
            .build()?,
    );
    let with_terminal = Arc::new(
        spdlog::Logger::builder()
            .flush_level_filter(spdlog::LevelFilter::All)
            .sink(file_sink)
            .sink(term_sink)
            .build()?,
    );
    let logging = Logging {
        file_only,
        with_terminal,
    };
    logging.loud();
    Ok(logging)
}

fn bar_style(phase: Phase) -> ProgressStyle {
    let color = match phase {
        Phase::Idle => "white",
        Phase::Processing => "cyan",
        Phase::Uploading => "green",
    };
    ProgressStyle::with_template(&format!(
        "{{prefix}} [{{bar:40.{color}/blue}}] {{pos:>3}}% {{msg}}"
    ))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn log_config(config: &Config) {
    spdlog::info!("Watch Path: {}", config.watch_path.to_string_lossy());
    spdlog::info!("Extension: {}", config.extension);
    spdlog::info!(
        "Group: {} Channel: {}",
        config.group_name.as_deref().unwrap_or("<first>"),
        config.channel_name.as_deref().unwrap_or("<first>")
    );
    spdlog::info!(
        "Processed Record: {}",
        config.processed_log_path.to_string_lossy()
    );
    match &config.store {
        StoreConfig::Workbook { path } => {
            spdlog::info!("Workbook: {}", path.to_string_lossy())
        }
        StoreConfig::Sheets { spreadsheet_id, .. } => {
            spdlog::info!("Spreadsheet: {}", spreadsheet_id)
        }
    }
    if let Some(upload) = &config.upload {
        spdlog::info!("Upload As: {}", upload.drive_name);
    }
    spdlog::info!("Poll Interval: {}s", config.poll_interval_secs);
    spdlog::info!("Duplicate Policy: {:?}", config.duplicate_policy);
    spdlog::info!("Number of Workers: {}", config.n_threads);
}

/// Ingest whatever is pending once, then exit
fn run_once(config: &Config) {
    let mut monitor = match Monitor::from_config(config) {
        Ok(m) => m,
        Err(e) => {
            spdlog::error!("{e}");
            return;
        }
    };
    let report = monitor.run_cycle();
    spdlog::info!(
        "Found {} recordings, {} new or changed, {} archived, {} failed",
        report.discovered,
        report.changed,
        report.merged,
        report.failed.len()
    );
    for (id, kind) in report.failed.iter() {
        spdlog::warn!("{id} was not archived ({kind}), check the log file for details");
    }
}

/// Watch the directory until a 'q' line is read from stdin
fn run_watch(config: &Config, logging: &Logging) {
    let (tx, rx) = channel();
    let monitor = match Monitor::from_config(config) {
        Ok(m) => m.with_status(tx),
        Err(e) => {
            spdlog::error!("{e}");
            return;
        }
    };

    let pb_manager = MultiProgress::new();
    let bars: Vec<ProgressBar> = (0..monitor.n_workers())
        .map(|worker_id| {
            let pb = pb_manager.add(ProgressBar::new(100));
            pb.set_style(bar_style(Phase::Idle));
            pb.set_prefix(format!("Worker {worker_id}"));
            pb.set_message("waiting");
            pb
        })
        .collect();

    let shutdown = ShutdownSignal::new();
    let stdin_shutdown = shutdown.clone();
    let stdin_pb = pb_manager.clone();
    std::thread::spawn(move || {
        // Closed stdin (e.g. running detached) never stops the monitor
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(l) if l.trim() == "q" => {
                    spdlog::info!("Stopping at the next safe point...");
                    stdin_pb.println("Stopping at the next safe point...").ok();
                    stdin_shutdown.request();
                    return;
                }
                Ok(_) => (),
                Err(_) => return,
            }
        }
    });

    logging.quiet();
    let monitor_shutdown = shutdown.clone();
    let handle = std::thread::spawn(move || {
        let mut monitor = monitor;
        monitor.run(&monitor_shutdown);
    });
    pb_manager
        .println("Watching for recordings, details go to tdms_archiver.log. Enter q to stop.")
        .ok();

    loop {
        match rx.recv_timeout(Duration::from_millis(500)) {
            Ok(status) => {
                if let Some(pb) = bars.get(status.worker_id) {
                    pb.set_style(bar_style(status.phase));
                    pb.set_position((status.progress * 100.0) as u64);
                    pb.set_message(match status.phase {
                        Phase::Idle => format!("cycle {} done", status.cycle),
                        Phase::Processing => format!("cycle {}", status.cycle),
                        Phase::Uploading => String::from("uploading"),
                    });
                }
            }
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if handle.is_finished() {
            break;
        }
    }

    let joined = handle.join();
    for pb in bars {
        pb.finish();
    }
    logging.loud();
    if joined.is_err() {
        spdlog::error!("Failed to join monitoring task!");
    }
}

/// Print the tables currently in the store
fn show(config: &Config) {
    let store = match open_store(config) {
        Ok(s) => s,
        Err(e) => {
            spdlog::error!("{e}");
            return;
        }
    };
    let mut cache = SnapshotCache::new();
    let dataset = match cache.refresh(&store) {
        SnapshotView::Live(dataset) | SnapshotView::Stale(dataset, _) => dataset,
        SnapshotView::Unavailable(e) => {
            spdlog::error!("Could not read the store: {e}");
            return;
        }
    };
    for table in dataset.summaries() {
        println!(
            "{} ({} columns, {} rows)",
            table.id,
            table.columns.len(),
            table.n_rows
        );
        for column in table.columns {
            let range = match (column.min, column.max) {
                (Some(min), Some(max)) => format!("{min} .. {max}"),
                _ => String::from("-"),
            };
            println!("    {:<32} {:>8} samples  {}", column.name, column.count, range);
        }
    }

    match ProcessedTracker::load(&config.processed_log_path) {
        Ok(tracker) => match pending_files(config, &tracker) {
            Ok(pending) => println!("{} recordings waiting to be archived", pending.len()),
            Err(e) => spdlog::warn!("Could not list {}: {e}", config.watch_path.display()),
        },
        Err(e) => spdlog::warn!("{e}"),
    }
}

fn main() {
    // Create a cli
    let matches = Command::new("tdms_archiver_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(Command::new("once").about("Archive every new or changed recording once"))
        .subcommand(
            Command::new("run").about("Watch for recordings until q is entered (default)"),
        )
        .subcommand(Command::new("show").about("Summarize the tables in the store"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .required(true)
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Initialize feedback
    let logging = match init_logging() {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Could not create logging: {e}");
            return;
        }
    };

    // Parse the cli
    let config_path = match matches.get_one::<String>("path") {
        Some(p) => PathBuf::from(p),
        None => {
            spdlog::error!("A configuration path is required");
            return;
        }
    };

    if let Some(("new", _)) = matches.subcommand() {
        spdlog::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        match make_template_config(&config_path) {
            Ok(()) => spdlog::info!("Done."),
            Err(e) => spdlog::error!("{e}"),
        }
        return;
    }

    // Load our config
    spdlog::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            spdlog::error!("{e}");
            return;
        }
    };
    spdlog::info!("Config successfully loaded.");
    log_config(&config);

    match matches.subcommand() {
        Some(("once", _)) => run_once(&config),
        Some(("show", _)) => show(&config),
        _ => run_watch(&config, &logging),
    }

    spdlog::info!("Done.");
}
