//! Botfix CLI - command line front end for the botfix analyzer
//!
//! Walks files or directories, analyzes them concurrently and prints human or
//! JSON reports; optionally writes the repairs back.

pub mod report;
pub mod runner;

// Re-export commonly used types for convenience
pub use report::{HumanReporter, JsonReporter, Reporter};
pub use runner::{run, CliOptions, RunOutcome};
