//! CLI parsing and orchestration. Parses args, fetches the directory, merges chapters to TXT. Maps errors to exit codes.

use crate::api::{
    ApiClient, ApiError, ChapterSource, Credentials, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS,
};
use crate::config::{self, Config};
use crate::merge::{clamp_batch_size, merge_book, MergeError, MergeOptions, DEFAULT_BATCH_SIZE};
use crate::model::{DirectoryEntry, RunState};
use crate::text::sanitize_filename;
use clap::Parser;
use log::info;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_OUTPUT_DIR: &str = "results/novels";

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("No chapters found in directory response")]
    EmptyDirectory,

    #[error("{0}")]
    Merge(#[from] MergeError),

    #[error("Cannot write output {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Api(_) | CliRunError::EmptyDirectory => 2,
            CliRunError::Merge(MergeError::Api(_)) => 2,
            CliRunError::Merge(MergeError::Write(_)) | CliRunError::Output { .. } => 3,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "fqmerge")]
#[command(about = "Download a book via the batch chapter API and merge it into one TXT file")]
#[command(
    after_help = "Config file keys (base_url, batch_size, timeout_secs, output_dir, user_agent, token, device_id, iid, no_titles) are read from ./fqmerge.toml or the user config dir. CLI flags override config."
)]
pub struct Args {
    /// Book id.
    pub book_id: String,

    /// Book name, used for the header and the output filename.
    pub book_name: String,

    /// Server base URL (default: http://127.0.0.1:9999).
    #[arg(long = "base")]
    pub base_url: Option<String>,

    /// Chapter ids per batch request, clamped to 1-50 (default: 30).
    #[arg(long = "batch", allow_negative_numbers = true)]
    pub batch_size: Option<i64>,

    /// Only download the first N chapters of the directory.
    #[arg(long = "max")]
    pub max_chapters: Option<usize>,

    /// HTTP timeout in seconds per request, at least 1 (default: 60).
    #[arg(long, allow_negative_numbers = true)]
    pub timeout: Option<i64>,

    /// User token for paid chapters.
    #[arg(long)]
    pub token: Option<String>,

    /// Override deviceId.
    #[arg(long)]
    pub device_id: Option<String>,

    /// Override install id (iid).
    #[arg(long)]
    pub iid: Option<String>,

    /// Explicit output TXT path. Default: results/novels/{sanitized-name}.txt
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Do not write chapter titles, only content.
    #[arg(long)]
    pub no_titles: bool,

    /// Fetch the directory, print chapter count and output path, write nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Suppress progress output (errors only).
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug logging and verbose error chain.
    #[arg(long)]
    pub verbose: bool,
}

/// Effective run settings after merging CLI flags, config and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub batch_size: usize,
    pub timeout_secs: u64,
    pub output_dir: PathBuf,
    pub user_agent: Option<String>,
    pub credentials: Credentials,
    pub include_titles: bool,
    pub max_chapters: Option<usize>,
}

/// CLI flag > config key > default. Batch size and timeout are clamped.
pub fn resolve_settings(args: &Args, config: Option<&Config>) -> Settings {
    let base_url = args
        .base_url
        .clone()
        .or_else(|| config.and_then(|c| c.base_url.clone()))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    // Zero and negative flag values clamp to 1 instead of failing to parse.
    let batch_size = args
        .batch_size
        .map(|n| n.max(1) as usize)
        .or_else(|| config.and_then(|c| c.batch_size))
        .unwrap_or(DEFAULT_BATCH_SIZE);
    let timeout_secs = args
        .timeout
        .map(|n| n.max(1) as u64)
        .or_else(|| config.and_then(|c| c.timeout_secs))
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let output_dir = config
        .and_then(|c| c.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    let no_titles = args.no_titles || config.and_then(|c| c.no_titles).unwrap_or(false);
    Settings {
        base_url: base_url.trim().trim_end_matches('/').to_string(),
        batch_size: clamp_batch_size(batch_size),
        timeout_secs: timeout_secs.max(1),
        output_dir,
        user_agent: config.and_then(|c| c.user_agent.clone()),
        credentials: Credentials {
            token: args
                .token
                .clone()
                .or_else(|| config.and_then(|c| c.token.clone())),
            device_id: args
                .device_id
                .clone()
                .or_else(|| config.and_then(|c| c.device_id.clone())),
            iid: args
                .iid
                .clone()
                .or_else(|| config.and_then(|c| c.iid.clone())),
        },
        include_titles: !no_titles,
        max_chapters: args.max_chapters,
    }
}

/// Default output path: {output_dir}/{sanitized-name}.txt
pub fn default_output_path(output_dir: &Path, book_name: &str) -> PathBuf {
    output_dir.join(format!("{}.txt", sanitize_filename(book_name)))
}

/// Fetch the directory, reject an empty one, then apply the --max limit.
pub fn fetch_directory(
    source: &mut dyn ChapterSource,
    book_id: &str,
    max_chapters: Option<usize>,
) -> Result<Vec<DirectoryEntry>, CliRunError> {
    info!("Fetching directory: bookId={}", book_id);
    let mut entries = source.fetch_directory(book_id)?;
    if entries.is_empty() {
        return Err(CliRunError::EmptyDirectory);
    }
    if let Some(max) = max_chapters {
        entries.truncate(max);
    }
    Ok(entries)
}

/// Create the output file (and its parent dirs) and merge every entry into it.
pub fn write_book(
    source: &mut dyn ChapterSource,
    book_id: &str,
    book_name: &str,
    entries: &[DirectoryEntry],
    output_path: &Path,
    options: &MergeOptions,
    progress: Option<&dyn Fn(&RunState)>,
) -> Result<RunState, CliRunError> {
    let output_err = |e: std::io::Error| CliRunError::Output {
        path: output_path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(output_err)?;
        }
    }
    let file = File::create(output_path).map_err(output_err)?;
    let mut out = BufWriter::new(file);
    let state = merge_book(
        source, book_id, book_name, entries, &mut out, options, progress,
    )?;
    Ok(state)
}

/// Progress line logged after each batch.
pub fn progress_line(state: &RunState) -> String {
    format!(
        "Progress: {}/{} (missing={})",
        state.done, state.total, state.missing
    )
}

/// Final summary printed to stdout.
pub fn summary_line(state: &RunState, output_path: &Path) -> String {
    format!(
        "OK: merged {}/{} chapters -> {}",
        state.done,
        state.total,
        output_path.display()
    )
}

fn new_progress_bar(total: usize, quiet: bool) -> indicatif::ProgressBar {
    if quiet {
        return indicatif::ProgressBar::hidden();
    }
    let bar = indicatif::ProgressBar::new(total as u64);
    let style = indicatif::ProgressStyle::default_bar()
        .template("{spinner} {msg} [{bar:40}] {pos}/{len} ({elapsed})")
        .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .progress_chars("█▉▊▋▌▍▎▏ ");
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let book_id = args.book_id.trim();
    let book_name = args.book_name.trim();
    if book_id.is_empty() {
        return Err(CliRunError::InvalidInput("book_id is empty".to_string()));
    }
    if book_name.is_empty() {
        return Err(CliRunError::InvalidInput("book_name is empty".to_string()));
    }

    let config = config::load_config().map_err(CliRunError::InvalidInput)?;
    let settings = resolve_settings(args, config.as_ref());

    let mut builder = ApiClient::builder()
        .base_url(settings.base_url.clone())
        .timeout_secs(settings.timeout_secs)
        .token(settings.credentials.token.clone())
        .device_id(settings.credentials.device_id.clone())
        .iid(settings.credentials.iid.clone());
    if let Some(ref ua) = settings.user_agent {
        builder = builder.user_agent(ua.clone());
    }
    let mut client = builder
        .build()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&settings.output_dir, book_name));

    let entries = fetch_directory(&mut client, book_id, settings.max_chapters)?;

    if args.dry_run {
        eprintln!("Chapters: {}", entries.len());
        eprintln!("Output: {}", output_path.display());
        return Ok(());
    }

    let bar = new_progress_bar(entries.len(), args.quiet);
    bar.set_message("Merging chapters");
    let progress_cb = |state: &RunState| {
        bar.set_position(state.processed() as u64);
        bar.suspend(|| info!("{}", progress_line(state)));
    };
    let progress: Option<&dyn Fn(&RunState)> = Some(&progress_cb);
    let options = MergeOptions {
        batch_size: settings.batch_size,
        include_titles: settings.include_titles,
    };
    let result = write_book(
        &mut client,
        book_id,
        book_name,
        &entries,
        &output_path,
        &options,
        progress,
    );
    bar.disable_steady_tick();
    bar.finish_and_clear();
    let state = result?;

    println!("{}", summary_line(&state, &output_path));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChapterRecord;
    use std::collections::HashMap;

    struct FakeSource {
        directory: Vec<DirectoryEntry>,
        /// Server (code, msg) returned instead of the directory.
        directory_error: Option<(String, String)>,
        records: HashMap<String, ChapterRecord>,
        batch_calls: usize,
    }

    impl FakeSource {
        fn three_chapters_missing_second() -> Self {
            let directory = vec![
                DirectoryEntry::new("1", "第一章"),
                DirectoryEntry::new("2", "第二章"),
                DirectoryEntry::new("3", "第三章"),
            ];
            let mut records = HashMap::new();
            for id in ["1", "3"] {
                records.insert(
                    id.to_string(),
                    ChapterRecord {
                        chapter_name: None,
                        text_content: Some(format!("正文{}", id)),
                        raw_content: None,
                    },
                );
            }
            FakeSource {
                directory,
                directory_error: None,
                records,
                batch_calls: 0,
            }
        }
    }

    impl ChapterSource for FakeSource {
        fn fetch_directory(&mut self, _book_id: &str) -> Result<Vec<DirectoryEntry>, ApiError> {
            match &self.directory_error {
                Some((code, msg)) => Err(ApiError::Server {
                    endpoint: "directory",
                    code: code.clone(),
                    msg: msg.clone(),
                }),
                None => Ok(self.directory.clone()),
            }
        }

        fn fetch_batch(
            &mut self,
            _book_id: &str,
            chapter_ids: &[String],
        ) -> Result<HashMap<String, ChapterRecord>, ApiError> {
            self.batch_calls += 1;
            Ok(chapter_ids
                .iter()
                .filter_map(|id| self.records.get(id).map(|r| (id.clone(), r.clone())))
                .collect())
        }
    }

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["fqmerge", "7001", "书名"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    fn temp_output(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join("fqmerge_cli_test")
            .join(format!("{}_{}.txt", name, std::process::id()))
    }

    #[test]
    fn parses_all_flags() {
        let a = args(&[
            "--base",
            "http://h:1/",
            "--batch",
            "10",
            "--max",
            "5",
            "--timeout",
            "9",
            "--token",
            "t",
            "--device-id",
            "d",
            "--iid",
            "i",
            "-o",
            "out.txt",
            "--no-titles",
        ]);
        assert_eq!(a.book_id, "7001");
        assert_eq!(a.book_name, "书名");
        assert_eq!(a.base_url.as_deref(), Some("http://h:1/"));
        assert_eq!(a.batch_size, Some(10));
        assert_eq!(a.max_chapters, Some(5));
        assert_eq!(a.timeout, Some(9));
        assert_eq!(a.token.as_deref(), Some("t"));
        assert_eq!(a.device_id.as_deref(), Some("d"));
        assert_eq!(a.iid.as_deref(), Some("i"));
        assert_eq!(a.output, Some(PathBuf::from("out.txt")));
        assert!(a.no_titles);
    }

    #[test]
    fn settings_defaults() {
        let s = resolve_settings(&args(&[]), None);
        assert_eq!(s.base_url, "http://127.0.0.1:9999");
        assert_eq!(s.batch_size, 30);
        assert_eq!(s.timeout_secs, 60);
        assert_eq!(s.output_dir, PathBuf::from("results/novels"));
        assert_eq!(s.credentials, Credentials::default());
        assert!(s.include_titles);
        assert_eq!(s.max_chapters, None);
    }

    #[test]
    fn settings_clamp_batch_and_timeout() {
        let s = resolve_settings(&args(&["--batch", "99", "--timeout", "0"]), None);
        assert_eq!(s.batch_size, 50);
        assert_eq!(s.timeout_secs, 1);
        let s = resolve_settings(&args(&["--batch", "0"]), None);
        assert_eq!(s.batch_size, 1);
    }

    #[test]
    fn negative_batch_and_timeout_clamp_to_one() {
        let a = args(&["--batch", "-3", "--timeout", "-10"]);
        assert_eq!(a.batch_size, Some(-3));
        assert_eq!(a.timeout, Some(-10));
        let s = resolve_settings(&a, None);
        assert_eq!(s.batch_size, 1);
        assert_eq!(s.timeout_secs, 1);
        let s = resolve_settings(&args(&["--batch=-1"]), None);
        assert_eq!(s.batch_size, 1);
    }

    #[test]
    fn settings_cli_overrides_config() {
        let config = Config {
            base_url: Some("http://config:1".to_string()),
            batch_size: Some(12),
            timeout_secs: Some(5),
            output_dir: Some(PathBuf::from("books")),
            token: Some("config-token".to_string()),
            no_titles: Some(true),
            ..Config::default()
        };
        let s = resolve_settings(&args(&["--batch", "20", "--token", "cli"]), Some(&config));
        assert_eq!(s.base_url, "http://config:1");
        assert_eq!(s.batch_size, 20);
        assert_eq!(s.timeout_secs, 5);
        assert_eq!(s.output_dir, PathBuf::from("books"));
        assert_eq!(s.credentials.token.as_deref(), Some("cli"));
        assert!(!s.include_titles);
    }

    #[test]
    fn default_output_path_sanitizes_name() {
        assert_eq!(
            default_output_path(Path::new("results/novels"), "a/b:c\"d?e"),
            PathBuf::from("results/novels/a_b_c_d_e.txt")
        );
    }

    #[test]
    fn empty_book_id_is_invalid_input() {
        let a = Args::parse_from(["fqmerge", "  ", "name"]);
        let err = run(&a).unwrap_err();
        assert_eq!(err.to_string(), "book_id is empty");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn empty_book_name_is_invalid_input() {
        let a = Args::parse_from(["fqmerge", "7001", ""]);
        let err = run(&a).unwrap_err();
        assert_eq!(err.to_string(), "book_name is empty");
    }

    #[test]
    fn directory_error_aborts_before_output() {
        let mut source = FakeSource::three_chapters_missing_second();
        source.directory_error = Some(("1".to_string(), "not found".to_string()));
        let err = fetch_directory(&mut source, "7001", None).unwrap_err();
        assert_eq!(err.to_string(), "directory failed: code=1 msg=not found");
        assert_eq!(err.exit_code(), 2);
        assert_eq!(source.batch_calls, 0);
    }

    #[test]
    fn empty_directory_is_an_error() {
        let mut source = FakeSource::three_chapters_missing_second();
        source.directory.clear();
        let err = fetch_directory(&mut source, "7001", None).unwrap_err();
        assert!(matches!(err, CliRunError::EmptyDirectory));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn max_truncates_directory() {
        let mut source = FakeSource::three_chapters_missing_second();
        let entries = fetch_directory(&mut source, "7001", Some(2)).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].chapter_id, "2");
    }

    #[test]
    fn write_book_skips_missing_chapter() {
        let mut source = FakeSource::three_chapters_missing_second();
        let entries = fetch_directory(&mut source, "7001", None).unwrap();
        let path = temp_output("missing");
        let state = write_book(
            &mut source,
            "7001",
            "书名",
            &entries,
            &path,
            &MergeOptions::default(),
            None,
        )
        .unwrap();
        let out = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(state.done, 2);
        assert_eq!(state.missing, 1);
        assert_eq!(state.total, 3);
        assert_eq!(
            out,
            "小说名：书名\n书籍ID：7001\n\n第一章\n\n正文1\n\n第三章\n\n正文3\n\n"
        );
    }

    #[test]
    fn write_book_without_titles() {
        let mut source = FakeSource::three_chapters_missing_second();
        let entries = fetch_directory(&mut source, "7001", None).unwrap();
        let path = temp_output("no_titles");
        let options = MergeOptions {
            batch_size: 1,
            include_titles: false,
        };
        write_book(&mut source, "7001", "书名", &entries, &path, &options, None).unwrap();
        let out = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert!(!out.contains("第一章"));
        assert!(!out.contains("第三章"));
        assert!(out.ends_with("正文1\n\n正文3\n\n"));
        assert_eq!(source.batch_calls, 3);
    }

    #[test]
    fn write_book_reports_unwritable_path() {
        let mut source = FakeSource::three_chapters_missing_second();
        let entries = fetch_directory(&mut source, "7001", None).unwrap();
        let dir = std::env::temp_dir().join("fqmerge_cli_test");
        std::fs::create_dir_all(&dir).unwrap();
        let err = write_book(
            &mut source,
            "7001",
            "书名",
            &entries,
            &dir,
            &MergeOptions::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, CliRunError::Output { .. }));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn progress_and_summary_wording() {
        let state = RunState {
            done: 58,
            missing: 2,
            total: 60,
        };
        assert_eq!(progress_line(&state), "Progress: 58/60 (missing=2)");
        assert_eq!(
            summary_line(&state, Path::new("results/novels/书名.txt")),
            "OK: merged 58/60 chapters -> results/novels/书名.txt"
        );
    }

    #[test]
    fn progress_lines_follow_each_batch() {
        let mut source = FakeSource::three_chapters_missing_second();
        let entries = fetch_directory(&mut source, "7001", None).unwrap();
        let path = temp_output("progress");
        let lines = std::cell::RefCell::new(Vec::new());
        let cb = |state: &RunState| lines.borrow_mut().push(progress_line(state));
        let progress: Option<&dyn Fn(&RunState)> = Some(&cb);
        let options = MergeOptions {
            batch_size: 2,
            include_titles: true,
        };
        let state =
            write_book(&mut source, "7001", "书名", &entries, &path, &options, progress).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(
            lines.into_inner(),
            vec![
                "Progress: 1/3 (missing=1)".to_string(),
                "Progress: 2/3 (missing=1)".to_string(),
            ]
        );
        assert_eq!(
            summary_line(&state, &path),
            format!("OK: merged 2/3 chapters -> {}", path.display())
        );
    }

    #[test]
    fn cli_run_error_exit_codes() {
        assert_eq!(CliRunError::InvalidInput("x".into()).exit_code(), 1);
        assert_eq!(
            CliRunError::Api(ApiError::InvalidJson {
                url: "u".into(),
                excerpt: "e".into()
            })
            .exit_code(),
            2
        );
        assert_eq!(
            CliRunError::Merge(MergeError::Write(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full"
            )))
            .exit_code(),
            3
        );
    }
}
