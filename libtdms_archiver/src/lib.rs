//! # tdms_archiver
//!
//! tdms_archiver watches a directory of accelerometer recordings in the TDMS format and archives
//! them, incrementally, into wide tables. Every new or modified recording becomes one column of
//! samples appended to the table named after the recording (`10hz.tdms` goes to table `10hz`).
//! Tables live either in a local Excel workbook (one sheet per table) or in a remote
//! spreadsheet, and the local workbook can be copied to a remote drive after every cycle that
//! changed it.
//!
//! ## Installation
//!
//! Currently the only method of install is from source.
//!
//! ### Rust
//!
//! If you have not used Rust before, you will most likely need to install the Rust tool
//! chain. See the [Rust docs](https://www.rust-lang.org/tools/install) for installation
//! instructions.
//!
//! ### Building & Install
//!
//! To build and install the CLI use `cargo install --path ./tdms_archiver_cli` from the top
//! level tdms_archiver repository. The binary is installed to your cargo install location
//! (typically something like `~/.cargo/bin/`).
//!
//! ## Configuration
//!
//! Configurations are YAML files. Make a template with `tdms_archiver_cli -p config.yaml new`.
//! The format is as follows:
//!
//! ```yml
//! watch_path: None
//! extension: tdms
//! group_name: null
//! channel_name: accelerationgroup
//! column_prefix: z-axis
//! poll_interval_secs: 30
//! processed_log_path: processed_files.log
//! store:
//!   kind: Workbook
//!   path: final_data.xlsx
//! upload: null
//! duplicate_policy: Allow
//! n_threads: 1
//! ```
//!
//! - `watch_path`: directory holding the recordings. Must exist.
//! - `extension`: only files with this extension are considered (case-insensitive)
//! - `group_name`: group holding the samples. `null` selects the first group.
//! - `channel_name`: channel holding the samples. `null` selects the first channel.
//! - `column_prefix`: columns are named `<prefix>-YYYY-MM-DD_HH-MM-SS` after the ingestion time
//! - `poll_interval_secs`: time between two polls of the directory
//! - `processed_log_path`: the processed record (see below)
//! - `store`: either `kind: Workbook` with a `path`, or `kind: Sheets` with a
//! `spreadsheet_id`, the `token_env` environment variable holding an access token and the API
//! `endpoint` (e.g. `https://sheets.googleapis.com`)
//! - `upload`: optional; `drive_name`, `token_env` and `endpoint` of the remote drive the local
//! workbook is copied to. Only valid with a workbook store.
//! - `duplicate_policy`: `Allow` appends every ingested version; `SkipIdentical` does not append
//! a column whose samples already exist in the table
//! - `n_threads`: number of workers sharing the recordings of one cycle. Must be at least 1.
//!
//! ## Output
//!
//! Each table holds the column names in its first row and the samples below them. Columns are
//! never rewritten or reordered and may have different lengths. A workbook sheet holds at most
//! 1,048,575 samples per column and 16,384 columns; a recording that does not fit is reported
//! as a failed merge and stays pending. Other sheets in the workbook are kept, with their cell
//! values only.
//!
//! The processed record is a plain text file with one `identifier,signature` line per
//! recording, where the signature is the modification time (ns since the Unix epoch) of the
//! version last archived. Deleting a line makes the recording get archived again on the next
//! poll. A log file, `tdms_archiver.log`, is written next to where the CLI was started.
pub mod column;
pub mod config;
pub mod error;
pub mod extractor;
pub mod merger;
pub mod monitor;
pub mod naming;
pub mod snapshot;
pub mod source_file;
pub mod store;
pub mod tdms;
pub mod tracker;
pub mod upload;
pub mod worker_status;
