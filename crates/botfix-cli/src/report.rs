//! Output of analysis results
//!
//! A trait-based system so the same run can be printed for people or emitted
//! as JSON for tooling.

use std::io::Write;

use anyhow::Result;
use botfix_core::project::{FileReport, ProjectSummary};
use serde::Serialize;

/// Trait for handling analysis output
pub trait Reporter {
    /// Write the complete output for a run
    fn write_run(
        &self,
        out: &mut dyn Write,
        reports: &[FileReport],
        summary: &ProjectSummary,
    ) -> Result<()>;
}

/// Console-oriented output
#[derive(Debug, Default)]
pub struct HumanReporter {
    /// Also list the roles found in each file
    pub verbose: bool,
}

impl HumanReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    fn write_report(&self, out: &mut dyn Write, report: &FileReport) -> Result<()> {
        let path = report.path.display();

        if self.verbose {
            writeln!(
                out,
                "{path}: {} event(s), {} command(s), {} task(s)",
                report.events.len(),
                report.commands.len(),
                report.tasks.len()
            )?;
        }

        for diagnostic in &report.diagnostics {
            writeln!(
                out,
                "{path}:{}:{}: [{}] {}",
                diagnostic.line, diagnostic.column, diagnostic.rule, diagnostic.title
            )?;
            writeln!(out, "    {}", diagnostic.explanation)?;
            for line in diagnostic.original.lines() {
                writeln!(out, "    - {line}")?;
            }
            for line in diagnostic.repaired.lines().filter(|l| !l.trim().is_empty()) {
                writeln!(out, "    + {line}")?;
            }
        }

        for anomaly in &report.anomalies {
            match anomaly.line {
                Some(line) => writeln!(out, "{path}:{line}: note: {}", anomaly.message)?,
                None => writeln!(out, "{path}: note: {}", anomaly.message)?,
            }
        }

        if report.skipped_fixes > 0 {
            writeln!(
                out,
                "{path}: {} overlapping fix(es) left out, run again to apply them",
                report.skipped_fixes
            )?;
        }
        Ok(())
    }
}

impl Reporter for HumanReporter {
    fn write_run(
        &self,
        out: &mut dyn Write,
        reports: &[FileReport],
        summary: &ProjectSummary,
    ) -> Result<()> {
        for report in reports {
            self.write_report(out, report)?;
        }
        for error in &summary.errors {
            writeln!(out, "error: {error}")?;
        }

        writeln!(
            out,
            "{} file(s) checked, {} problem(s) in {} file(s), {} note(s), {} error(s)",
            summary.files_processed,
            summary.diagnostics,
            summary.files_with_diagnostics,
            summary.anomalies,
            summary.errors.len()
        )?;
        if summary.files_fixed > 0 {
            writeln!(out, "{} file(s) fixed", summary.files_fixed)?;
        }
        Ok(())
    }
}

/// Machine-readable output
#[derive(Debug, Default)]
pub struct JsonReporter {
    pub pretty: bool,
}

#[derive(Serialize)]
struct JsonRun<'a> {
    version: &'static str,
    files: &'a [FileReport],
    summary: &'a ProjectSummary,
}

impl Reporter for JsonReporter {
    fn write_run(
        &self,
        out: &mut dyn Write,
        reports: &[FileReport],
        summary: &ProjectSummary,
    ) -> Result<()> {
        let run = JsonRun {
            version: botfix_core::VERSION,
            files: reports,
            summary,
        };
        if self.pretty {
            serde_json::to_writer_pretty(&mut *out, &run)?;
        } else {
            serde_json::to_writer(&mut *out, &run)?;
        }
        writeln!(out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use botfix_core::ProjectScanner;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn sample_report() -> FileReport {
        ProjectScanner::default()
            .analyze_source(
                Path::new("bot.py"),
                "@bot.event()\nasync def on_ready():\n    pass\n\nbot.run(TOKEN)\n",
            )
            .unwrap()
    }

    fn render(reporter: &dyn Reporter, reports: &[FileReport]) -> String {
        let mut summary = ProjectSummary::new();
        for report in reports {
            summary.record(report);
        }
        let mut out = Vec::new();
        reporter.write_run(&mut out, reports, &summary).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_human_output() {
        let output = render(&HumanReporter::new(false), &[sample_report()]);

        assert_eq!(
            output,
            "\
bot.py:1:1: [event-not-called] Events do not need to be called
    'on_ready' is an event; decorate it with `@bot.event` instead of calling the decorator.
    - @bot.event()
    + @bot.event
1 file(s) checked, 1 problem(s) in 1 file(s), 0 note(s), 0 error(s)
"
        );
    }

    #[test]
    fn test_verbose_human_output_lists_roles() {
        let output = render(&HumanReporter::new(true), &[sample_report()]);
        assert!(output.starts_with("bot.py: 1 event(s), 0 command(s), 0 task(s)\n"));
    }

    #[test]
    fn test_json_output() {
        let output = render(&JsonReporter::default(), &[sample_report()]);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["files"][0]["path"], "bot.py");
        assert_eq!(value["files"][0]["run_mode"]["mode"], "direct_invocation");
        assert_eq!(value["files"][0]["diagnostics"][0]["rule"], "event-not-called");
        assert_eq!(value["summary"]["diagnostics"], 1);
    }
}
