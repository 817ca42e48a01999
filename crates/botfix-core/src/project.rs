/*!
# Project Scanner

Directory-level analysis. Finds Python sources, converts each one and turns
the borrowed per-unit results into owned, serializable [`FileReport`]s that
can outlive the source text. Repairs can be written back to disk.
*/

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::convert::{Anomaly, Conversion, ConversionError, Converter};
use crate::diagnostics::Diagnostic;
use crate::rules::RuleStats;
use crate::run_mode::RunMode;
use crate::syntax::{parse_source, SourceTree};
use crate::BotfixConfig;

/// Directory names never descended into
const SKIPPED_DIRECTORIES: &[&str] = &["__pycache__", "venv", "env", "node_modules", "site-packages"];

/// A diagnostic detached from its source tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticReport {
    pub rule: String,
    pub title: String,
    pub explanation: String,
    pub line: usize,
    pub column: usize,
    pub original: String,
    pub repaired: String,
}

impl DiagnosticReport {
    fn from_diagnostic(diagnostic: &Diagnostic<'_>, tree: &SourceTree) -> Self {
        let (line, column) = tree.line_col(diagnostic.original.span.start);
        Self {
            rule: diagnostic.rule.to_string(),
            title: diagnostic.title.clone(),
            explanation: diagnostic.explanation.clone(),
            line,
            column,
            original: diagnostic.original.text.to_string(),
            repaired: diagnostic.repaired.text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    pub name: String,
    /// Cog class defining the task, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub before_hook: Option<String>,
    pub after_hook: Option<String>,
}

/// Owned result of analyzing one file
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub run_mode: RunMode,
    pub framework: Option<String>,
    pub events: Vec<String>,
    pub commands: Vec<String>,
    pub tasks: Vec<TaskReport>,
    pub diagnostics: Vec<DiagnosticReport>,
    pub anomalies: Vec<Anomaly>,
    /// Source with every repair applied; only present when something changed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_source: Option<String>,
    /// Repairs left out because they overlapped another one
    pub skipped_fixes: usize,
    #[serde(skip)]
    pub rule_stats: Vec<RuleStats>,
}

impl FileReport {
    fn from_conversion(path: &Path, tree: &SourceTree, conversion: &Conversion<'_>) -> Self {
        let (fixed_source, skipped_fixes) = if conversion.diagnostics.is_empty() {
            (None, 0)
        } else {
            let outcome = conversion.fixed_source(tree);
            (Some(outcome.source), outcome.skipped.len())
        };

        Self {
            path: path.to_path_buf(),
            run_mode: conversion.run_mode.clone(),
            framework: conversion.framework().map(str::to_string),
            events: conversion
                .events
                .iter()
                .map(|d| d.identifier.clone())
                .collect(),
            commands: conversion
                .commands
                .iter()
                .map(|d| d.identifier.clone())
                .collect(),
            tasks: conversion
                .tasks
                .iter()
                .map(|task| TaskReport {
                    name: task.identifier().to_string(),
                    class: task.declaration.enclosing_class.clone(),
                    before_hook: task.before_hook.as_ref().map(|h| h.identifier.clone()),
                    after_hook: task.after_hook.as_ref().map(|h| h.identifier.clone()),
                })
                .collect(),
            diagnostics: conversion
                .diagnostics
                .iter()
                .map(|d| DiagnosticReport::from_diagnostic(d, tree))
                .collect(),
            anomalies: conversion.anomalies.clone(),
            fixed_source,
            skipped_fixes,
            rule_stats: conversion.rule_stats.clone(),
        }
    }

    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Totals over a set of analyzed files
#[derive(Debug, Default, Clone, Serialize)]
pub struct ProjectSummary {
    pub files_processed: u64,
    pub files_with_diagnostics: u64,
    pub diagnostics: u64,
    pub anomalies: u64,
    pub files_fixed: u64,
    pub errors: Vec<String>,
    pub rule_stats: Vec<RuleStats>,
}

impl ProjectSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one analyzed file
    pub fn record(&mut self, report: &FileReport) {
        self.files_processed += 1;
        if report.has_diagnostics() {
            self.files_with_diagnostics += 1;
        }
        self.diagnostics += report.diagnostics.len() as u64;
        self.anomalies += report.anomalies.len() as u64;
        self.merge_rule_stats(&report.rule_stats);
    }

    /// Count a file that could not be analyzed
    pub fn record_error(&mut self, path: &Path, error: &anyhow::Error) {
        self.files_processed += 1;
        self.errors.push(format!("{}: {:#}", path.display(), error));
    }

    pub fn merge(&mut self, other: ProjectSummary) {
        self.files_processed += other.files_processed;
        self.files_with_diagnostics += other.files_with_diagnostics;
        self.diagnostics += other.diagnostics;
        self.anomalies += other.anomalies;
        self.files_fixed += other.files_fixed;
        self.errors.extend(other.errors);
        self.merge_rule_stats(&other.rule_stats);
    }

    fn merge_rule_stats(&mut self, stats: &[RuleStats]) {
        for incoming in stats {
            match self
                .rule_stats
                .iter()
                .position(|s| s.rule_name == incoming.rule_name)
            {
                Some(index) => self.rule_stats[index].merge(incoming),
                None => self.rule_stats.push(incoming.clone()),
            }
        }
    }

    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Finds and analyzes Python files
#[derive(Debug, Clone)]
pub struct ProjectScanner {
    converter: Converter,
    snippet: bool,
    source_extensions: Vec<String>,
    backup_originals: bool,
}

impl ProjectScanner {
    pub fn new(config: BotfixConfig) -> Self {
        Self {
            converter: Converter::new(config),
            snippet: false,
            source_extensions: vec!["py".to_string()],
            backup_originals: true,
        }
    }

    /// Treat every file as a standalone snippet
    pub fn snippet_mode(mut self, snippet: bool) -> Self {
        self.snippet = snippet;
        self
    }

    /// Set the file extensions to process
    pub fn source_extensions(mut self, extensions: Vec<String>) -> Self {
        self.source_extensions = extensions;
        self
    }

    /// Whether to keep a `.orig` copy when writing fixes
    pub fn backup_originals(mut self, backup: bool) -> Self {
        self.backup_originals = backup;
        self
    }

    /// All source files under `root` in a stable order. A file root is
    /// returned as is, whatever its extension.
    pub fn discover_files<P: AsRef<Path>>(&self, root: P) -> Result<Vec<PathBuf>> {
        let root = root.as_ref();
        if !root.exists() {
            return Err(anyhow!("Path does not exist: {}", root.display()));
        }
        if root.is_file() {
            return Ok(vec![root.to_path_buf()]);
        }

        let mut files = Vec::new();
        self.discover_recursive(root, &mut files)?;
        files.sort();
        Ok(files)
    }

    fn discover_recursive(&self, current_dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
        for entry in fs::read_dir(current_dir)
            .with_context(|| format!("Failed to read directory {}", current_dir.display()))?
        {
            let path = entry?.path();

            if path.is_dir() {
                if should_descend(&path) {
                    self.discover_recursive(&path, files)?;
                } else {
                    debug!(path = %path.display(), "Skipping directory");
                }
            } else if self.should_process_file(&path) {
                files.push(path);
            }
        }
        Ok(())
    }

    /// Check if a file should be processed based on its extension
    fn should_process_file(&self, path: &Path) -> bool {
        if let Some(extension) = path.extension() {
            let ext_str = extension.to_string_lossy().to_lowercase();
            self.source_extensions
                .iter()
                .any(|ext| ext.to_lowercase() == ext_str)
        } else {
            false
        }
    }

    /// Analyze source text that came from `path`.
    ///
    /// A file without any startup code is an extension module of the
    /// program (a cog, a helper) and is analyzed as a snippet.
    pub fn analyze_source(&self, path: &Path, source: &str) -> crate::Result<FileReport> {
        let tree = parse_source(source)?;
        let conversion = if self.snippet {
            self.converter.convert_snippet(&tree)?
        } else {
            match self.converter.convert(&tree) {
                Err(ConversionError::UndeterminedRunMode) => {
                    debug!(path = %path.display(), "No startup code, analyzing as an extension module");
                    self.converter.convert_snippet(&tree)?
                }
                result => result?,
            }
        };
        Ok(FileReport::from_conversion(path, &tree, &conversion))
    }

    /// Read and analyze one file
    pub fn analyze_file<P: AsRef<Path>>(&self, path: P) -> Result<FileReport> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let report = self.analyze_source(path, &source)?;

        info!(
            path = %path.display(),
            diagnostics = report.diagnostics.len(),
            anomalies = report.anomalies.len(),
            "Analyzed file"
        );
        Ok(report)
    }

    /// Analyze every file under `root`, sequentially
    pub fn scan<P: AsRef<Path>>(&self, root: P) -> Result<(Vec<FileReport>, ProjectSummary)> {
        let mut reports = Vec::new();
        let mut summary = ProjectSummary::new();

        for path in self.discover_files(root)? {
            match self.analyze_file(&path) {
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
        Ok((reports, summary))
    }

    /// Write a report's repaired source over its file. Returns whether the
    /// file was changed.
    pub fn write_fixes(&self, report: &FileReport) -> Result<bool> {
        let Some(fixed) = &report.fixed_source else {
            return Ok(false);
        };

        let current = fs::read_to_string(&report.path)
            .with_context(|| format!("Failed to read {}", report.path.display()))?;
        if current == *fixed {
            return Ok(false);
        }

        if self.backup_originals {
            let mut backup = report.path.clone().into_os_string();
            backup.push(".orig");
            fs::copy(&report.path, &backup)
                .with_context(|| format!("Failed to back up {}", report.path.display()))?;
        }
        fs::write(&report.path, fixed)
            .with_context(|| format!("Failed to write {}", report.path.display()))?;

        info!(path = %report.path.display(), fixes = report.diagnostics.len(), "Wrote fixes");
        Ok(true)
    }
}

impl Default for ProjectScanner {
    fn default() -> Self {
        Self::new(BotfixConfig::default())
    }
}

fn should_descend(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
        return true;
    };
    !name.starts_with('.') && !SKIPPED_DIRECTORIES.contains(&&*name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const BOT_SOURCE: &str = "\
import nextcord
from nextcord.ext import commands

bot = commands.Bot(command_prefix='!')

@bot.event()
async def on_ready():
    pass

bot.run(TOKEN)
";

    #[test]
    fn test_discovery_skips_hidden_and_virtualenv_directories() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("cogs")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::create_dir_all(dir.path().join("venv/lib")).unwrap();
        fs::write(dir.path().join("main.py"), BOT_SOURCE).unwrap();
        fs::write(dir.path().join("cogs/admin.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("README.md"), "docs").unwrap();
        fs::write(dir.path().join(".git/hook.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("venv/lib/site.py"), "x = 1\n").unwrap();

        let files = ProjectScanner::default().discover_files(dir.path()).unwrap();

        assert_eq!(
            files,
            vec![dir.path().join("cogs/admin.py"), dir.path().join("main.py")]
        );
    }

    #[test]
    fn test_analyze_file_report() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("main.py");
        fs::write(&path, BOT_SOURCE).unwrap();

        let report = ProjectScanner::default().analyze_file(&path).unwrap();

        assert_eq!(report.run_mode, RunMode::DirectInvocation);
        assert_eq!(report.framework.as_deref(), Some("nextcord"));
        assert_eq!(report.events, vec!["on_ready".to_string()]);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].line, 6);
        assert_eq!(report.diagnostics[0].repaired, "@bot.event");
        assert!(report.fixed_source.as_deref().unwrap().contains("@bot.event\nasync def"));
    }

    #[test]
    fn test_scan_collects_errors_without_stopping() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a_main.py"), BOT_SOURCE).unwrap();
        fs::write(dir.path().join("b_helpers.py"), "def helper():\n    return 1\n").unwrap();
        fs::write(dir.path().join("c_broken.py"), "def broken(:\n").unwrap();
        fs::write(dir.path().join("d_bad_run.py"), "bot.run(TOKEN, reconnect=True)\n").unwrap();

        let (reports, summary) = ProjectScanner::default().scan(dir.path()).unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(summary.files_processed, 4);
        assert_eq!(summary.diagnostics, 1);
        assert_eq!(summary.errors.len(), 2);
        assert!(!summary.success());
    }

    #[test]
    fn test_scan_analyzes_cog_modules_next_to_main() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("cogs")).unwrap();
        fs::write(
            dir.path().join("main.py"),
            "from nextcord.ext import commands\n\nbot = commands.Bot()\nbot.load_extension('cogs.greet')\nbot.run(TOKEN)\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("cogs/greet.py"),
            "\
from nextcord.ext import commands

class Greet(commands.Cog):
    @commands.Cog.listener
    async def on_member_join(self, member):
        pass

def setup(bot):
    bot.add_cog(Greet(bot))
",
        )
        .unwrap();

        let (reports, summary) = ProjectScanner::default().scan(dir.path()).unwrap();

        assert!(summary.success(), "unexpected errors: {:?}", summary.errors);
        assert_eq!(reports.len(), 2);
        let cog = &reports[0];
        assert_eq!(cog.path, dir.path().join("cogs/greet.py"));
        assert_eq!(cog.events, vec!["on_member_join".to_string()]);
        assert_eq!(cog.diagnostics.len(), 1);
        assert_eq!(cog.diagnostics[0].rule, "listener-must-be-called");
        assert_eq!(cog.diagnostics[0].repaired, "@commands.Cog.listener()");
        assert_eq!(reports[1].run_mode, RunMode::DirectInvocation);
    }

    #[test]
    fn test_snippet_mode_accepts_files_without_startup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cog.py");
        fs::write(&path, "@bot.listen\nasync def on_ready():\n    pass\n").unwrap();

        let report = ProjectScanner::default()
            .snippet_mode(true)
            .analyze_file(&path)
            .unwrap();

        assert_eq!(report.diagnostics[0].rule, "listener-must-be-called");
    }

    #[test]
    fn test_write_fixes_with_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("main.py");
        fs::write(&path, BOT_SOURCE).unwrap();
        let scanner = ProjectScanner::default();

        let report = scanner.analyze_file(&path).unwrap();
        assert!(scanner.write_fixes(&report).unwrap());

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("@bot.event\n"));
        assert_eq!(fs::read_to_string(dir.path().join("main.py.orig")).unwrap(), BOT_SOURCE);

        // Nothing left to repair on a second pass
        let again = scanner.analyze_file(&path).unwrap();
        assert!(!scanner.write_fixes(&again).unwrap());
    }

    #[test]
    fn test_summary_merge() {
        let mut first = ProjectSummary::new();
        first.files_processed = 2;
        first.rule_stats.push(RuleStats {
            rule_name: "event-not-called",
            applications: 1,
            diagnostics: 1,
        });
        let mut second = ProjectSummary::new();
        second.files_processed = 1;
        second.errors.push("broken.py: parse error".to_string());
        second.rule_stats.push(RuleStats {
            rule_name: "event-not-called",
            applications: 2,
            diagnostics: 0,
        });

        first.merge(second);

        assert_eq!(first.files_processed, 3);
        assert_eq!(first.rule_stats.len(), 1);
        assert_eq!(first.rule_stats[0].applications, 3);
        assert!(!first.success());
    }
}
