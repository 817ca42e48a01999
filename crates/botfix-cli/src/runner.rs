//! Concurrent analysis of a file tree
//!
//! Parsing and analysis are synchronous, so each file runs on tokio's
//! blocking pool with its own parser. At most `jobs` files are in flight.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use botfix_core::project::{FileReport, ProjectScanner, ProjectSummary};
use botfix_core::BotfixConfig;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Everything the command line decides
#[derive(Debug, Clone)]
pub struct CliOptions {
    pub path: PathBuf,
    pub config: BotfixConfig,
    pub snippet: bool,
    pub fix: bool,
    pub backup: bool,
    pub jobs: usize,
}

impl CliOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: BotfixConfig::default(),
            snippet: false,
            fix: false,
            backup: true,
            jobs: default_jobs(),
        }
    }
}

/// Worker count when `--jobs` is not given
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[derive(Debug)]
pub struct RunOutcome {
    /// Sorted by path
    pub reports: Vec<FileReport>,
    pub summary: ProjectSummary,
}

impl RunOutcome {
    /// 0 when clean, 1 when problems were found, 2 when files failed
    pub fn exit_code(&self) -> i32 {
        if !self.summary.success() {
            2
        } else if self.summary.diagnostics > 0 && self.summary.files_fixed == 0 {
            1
        } else {
            0
        }
    }
}

/// Analyze every file under `options.path`, writing fixes when asked
pub async fn run(options: &CliOptions) -> Result<RunOutcome> {
    let scanner = ProjectScanner::new(options.config.clone())
        .snippet_mode(options.snippet)
        .backup_originals(options.backup);
    let files = scanner.discover_files(&options.path)?;
    let jobs = options.jobs.max(1);
    debug!(files = files.len(), jobs, "Starting analysis");

    let mut reports = Vec::with_capacity(files.len());
    let mut summary = ProjectSummary::new();
    let mut in_flight: JoinSet<(PathBuf, Result<FileReport>)> = JoinSet::new();
    let mut pending = files.into_iter();

    loop {
        while in_flight.len() < jobs {
            let Some(path) = pending.next() else {
                break;
            };
            let scanner = scanner.clone();
            let fix = options.fix;
            in_flight.spawn_blocking(move || {
                let result = analyze(&scanner, &path, fix);
                (path, result)
            });
        }

        let Some(joined) = in_flight.join_next().await else {
            break;
        };
        let (path, result) = joined.map_err(|e| anyhow!("Analysis task failed: {e}"))?;
        match result {
            Ok(report) => {
                summary.record(&report);
                reports.push(report);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to analyze file");
                summary.record_error(&path, &e);
            }
        }
    }

    if options.fix {
        summary.files_fixed = reports.iter().filter(|r| r.fixed_source.is_some()).count() as u64;
    }
    reports.sort_by(|a, b| a.path.cmp(&b.path));
    summary.errors.sort();

    Ok(RunOutcome { reports, summary })
}

fn analyze(scanner: &ProjectScanner, path: &Path, fix: bool) -> Result<FileReport> {
    let mut report = scanner.analyze_file(path)?;
    // Only files actually rewritten keep their fixed source
    if fix && !scanner.write_fixes(&report)? {
        report.fixed_source = None;
    }
    Ok(report)
}
