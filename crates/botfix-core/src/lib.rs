//! # Botfix Core
//!
//! Structural analysis and autofix engine for Python programs written in the
//! decorator-driven bot style (`@bot.event`, `@bot.command()`, `@tasks.loop`).
//!
//! - Formatting-preserving syntax tree built on tree-sitter
//! - Entry-point location (direct `bot.run` or a launcher such as `asyncio.run`)
//! - Declaration classification into events, listeners, commands and tasks
//! - Before/after hook binding for tasks
//! - A rule engine producing diagnostics with ready-to-apply fixes
//!
//! ```no_run
//! use botfix_core::{parse_source, BotfixConfig, Converter};
//!
//! let tree = parse_source("@bot.event()\nasync def on_ready():\n    pass\n")?;
//! let converter = Converter::new(BotfixConfig::default());
//! let conversion = converter.convert_snippet(&tree)?;
//! for diagnostic in &conversion.diagnostics {
//!     println!("{}: {}", diagnostic.title, diagnostic.repaired.text);
//! }
//! # Ok::<(), botfix_core::BotfixError>(())
//! ```

#![warn(clippy::all)]

pub mod classify;
pub mod convert;
pub mod diagnostics;
pub mod heuristics;
pub mod hooks;
pub mod imports;
pub mod names;
pub mod project;
pub mod rules;
pub mod run_mode;
pub mod syntax;

use std::path::Path;

use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use classify::{Declaration, Decorator, DecoratorKind, EnclosingContext, Role};
pub use convert::{Anomaly, AnomalyKind, Conversion, ConversionError, Converter};
pub use diagnostics::Diagnostic;
pub use hooks::{BoundDeclarations, HookBinder, Task};
pub use names::DottedName;
pub use project::{FileReport, ProjectScanner, ProjectSummary};
pub use rules::{Rule, RuleEngine};
pub use run_mode::{EntryPointLocator, RunMode};
pub use syntax::{parse_source, ParseError, SourceTree};

/// Botfix version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for botfix components
pub fn init_tracing() {
    init_tracing_with("botfix_core=info");
}

/// Initialize tracing with an explicit default directive, still honouring
/// `RUST_LOG` when it is set
pub fn init_tracing_with(default_directive: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    // A second initialization (tests, embedding) is not an error
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Analyzer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotfixConfig {
    /// Name of the variable holding the bot instance, if known
    pub bot_variable: Option<String>,
    /// Extra bot subclass whose instantiation marks the bot variable
    pub bot_subclass: Option<String>,
    /// Launcher calls that run an entry coroutine
    pub launchers: Vec<String>,
    /// Decorator turning a coroutine into a repeating task
    pub loop_decorator: String,
    /// Decorator namespaces holding checks rather than roles
    pub check_namespaces: Vec<String>,
    /// Method that forwards a message to command processing
    pub dispatch_method: String,
    /// Event whose handler must forward to `dispatch_method`
    pub message_event: String,
    /// Maximum nesting of undecorated coroutines rescanned for declarations
    pub max_scan_depth: usize,
}

impl Default for BotfixConfig {
    fn default() -> Self {
        Self {
            bot_variable: None,
            bot_subclass: None,
            launchers: vec!["asyncio.run".to_string()],
            loop_decorator: "tasks.loop".to_string(),
            check_namespaces: vec!["commands.".to_string(), "application_checks.".to_string()],
            dispatch_method: "process_commands".to_string(),
            message_event: "on_message".to_string(),
            max_scan_depth: 8,
        }
    }
}

impl BotfixConfig {
    pub fn with_bot_variable(mut self, name: impl Into<String>) -> Self {
        self.bot_variable = Some(name.into());
        self
    }

    pub fn with_bot_subclass(mut self, name: impl Into<String>) -> Self {
        self.bot_subclass = Some(name.into());
        self
    }

    pub fn with_max_scan_depth(mut self, depth: usize) -> Self {
        self.max_scan_depth = depth;
        self
    }

    /// Load configuration from a JSON file; missing fields keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| BotfixError::Config(format!("{}: {}", path.display(), e)))
    }
}

/// Error types for botfix operations
#[derive(thiserror::Error, Debug)]
pub enum BotfixError {
    /// The source could not be parsed
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The program's structure violated an expectation of the analyzer
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Reading or writing source files failed
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for botfix operations
pub type Result<T> = std::result::Result<T, BotfixError>;
