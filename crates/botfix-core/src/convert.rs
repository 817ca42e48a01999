//! Conversion of one source unit: locate the entry point, classify
//! declarations, bind hooks and run the rule table.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::classify::{Declaration, DeclarationClassifier, DeclarationScanner};
use crate::diagnostics::Diagnostic;
use crate::heuristics::BotVariables;
use crate::hooks::{HookBinder, HookKind, Task};
use crate::imports::{detect_framework, ImportRecord};
use crate::rules::{RuleContext, RuleEngine, RuleStats};
use crate::run_mode::{EntryPointLocator, RunMode};
use crate::syntax::ast::{FunctionDef, Stmt};
use crate::syntax::{FixOutcome, SourceTree};
use crate::BotfixConfig;

/// Structural problems that stop a conversion
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("could not determine how the program starts: no launcher or run call found")]
    UndeterminedRunMode,

    #[error("line {line}: `{callee}` expects exactly one argument, found {found}")]
    LauncherArity {
        callee: String,
        found: usize,
        line: usize,
    },

    #[error("line {line}: `{callee}` must be given a call to a function defined in this file")]
    LauncherArgument { callee: String, line: usize },

    #[error("line {line}: `{callee}` expects exactly one argument (the token), found {found}")]
    RunArity {
        callee: String,
        found: usize,
        line: usize,
    },

    #[error("line {line}: expected `__name__ == \"__main__\"`, found `{found}`")]
    MalformedMainGuard { line: usize, found: String },

    #[error("task `{task}` has more than one {kind} hook: `{existing}` and `{duplicate}`")]
    DuplicateHook {
        task: String,
        kind: HookKind,
        existing: String,
        duplicate: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AnomalyKind {
    UnclassifiedDeclaration,
    UnmatchedHook,
    DuplicateTask,
    EntryFunctionNotFound,
    ScanDepthExceeded,
}

/// A recoverable finding; conversion carries on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub message: String,
    /// 1-based line, when the finding has a location
    pub line: Option<usize>,
}

impl Anomaly {
    pub fn new(kind: AnomalyKind, message: impl Into<String>, line: Option<usize>) -> Self {
        Self {
            kind,
            message: message.into(),
            line,
        }
    }
}

/// Everything learned about one source unit
#[derive(Debug)]
pub struct Conversion<'a> {
    pub run_mode: RunMode,
    pub bot_variables: Vec<String>,
    pub imports: Vec<ImportRecord>,
    /// Events and listeners
    pub events: Vec<Declaration<'a>>,
    pub commands: Vec<Declaration<'a>>,
    pub tasks: Vec<Task<'a>>,
    pub unattached_hooks: Vec<Declaration<'a>>,
    pub unclassified: Vec<Declaration<'a>>,
    /// In declaration discovery order, then rule order
    pub diagnostics: Vec<Diagnostic<'a>>,
    pub anomalies: Vec<Anomaly>,
    pub rule_stats: Vec<RuleStats>,
}

impl<'a> Conversion<'a> {
    pub fn task(&self, identifier: &str) -> Option<&Task<'a>> {
        self.tasks.iter().find(|task| task.identifier() == identifier)
    }

    /// Number of classified declarations, hooks included
    pub fn declaration_count(&self) -> usize {
        self.events.len()
            + self.commands.len()
            + self.unattached_hooks.len()
            + self.unclassified.len()
            + self
                .tasks
                .iter()
                .map(|task| {
                    1 + usize::from(task.before_hook.is_some()) + usize::from(task.after_hook.is_some())
                })
                .sum::<usize>()
    }

    /// Bot framework package imported by the unit, if recognized
    pub fn framework(&self) -> Option<&str> {
        detect_framework(&self.imports)
    }

    /// Source with every repair applied
    pub fn fixed_source(&self, tree: &SourceTree) -> FixOutcome {
        tree.apply_fixes(self.diagnostics.iter().map(|diagnostic| &diagnostic.repaired))
    }
}

/// Runs the analysis pipeline over parsed units
#[derive(Debug, Clone, Default)]
pub struct Converter {
    config: BotfixConfig,
}

impl Converter {
    pub fn new(config: BotfixConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BotfixConfig {
        &self.config
    }

    /// Convert a complete program. A program without startup code is an error.
    pub fn convert<'a>(&self, tree: &'a SourceTree) -> Result<Conversion<'a>, ConversionError> {
        self.run(tree, false)
    }

    /// Convert a standalone fragment. Missing startup code means the
    /// declarations are taken as top level.
    pub fn convert_snippet<'a>(&self, tree: &'a SourceTree) -> Result<Conversion<'a>, ConversionError> {
        self.run(tree, true)
    }

    fn run<'a>(&self, tree: &'a SourceTree, snippet: bool) -> Result<Conversion<'a>, ConversionError> {
        let module = tree.module();
        let mut bots = self.discover_bots(&module.body, snippet);
        let mut run_mode = EntryPointLocator::new(tree, &self.config, &bots).locate(&module.body)?;
        if !run_mode.is_known() {
            if !snippet {
                return Err(ConversionError::UndeterminedRunMode);
            }
            debug!("No startup code in snippet, treating declarations as top level");
            run_mode = RunMode::DirectInvocation;
        }

        let mut anomalies = Vec::new();
        let entry_body: &'a [Stmt] = match run_mode.entry_function_name() {
            Some(entry) => match find_function(&module.body, entry) {
                Some(func) => {
                    debug!(entry, statements = func.body.stmts.len(), "Splicing entry function body");
                    &func.body.stmts
                }
                None => {
                    warn!(entry, "Entry function is not defined at the top level");
                    anomalies.push(Anomaly::new(
                        AnomalyKind::EntryFunctionNotFound,
                        format!("Entry function '{entry}' is not defined in this file"),
                        None,
                    ));
                    &[]
                }
            },
            None => &[],
        };
        if !entry_body.is_empty() {
            // The bot is often created inside the entry coroutine
            bots = self.discover_bots(module.body.iter().chain(entry_body), snippet);
        }

        let classifier = DeclarationClassifier::new(&self.config, &bots);
        let scan = DeclarationScanner::new(
            tree,
            classifier,
            run_mode.entry_function_name(),
            self.config.max_scan_depth,
        )
        .scan(module.body.iter().chain(entry_body))?;
        anomalies.extend(scan.anomalies);

        let mut engine = RuleEngine::with_default_rules();
        let context = RuleContext::new(tree, &self.config);
        let diagnostics: Vec<Diagnostic<'a>> = scan
            .declarations
            .iter()
            .flat_map(|declaration| engine.evaluate(declaration, &context))
            .collect();

        let bound = HookBinder::bind(scan.declarations)?;
        anomalies.extend(bound.anomalies);

        debug!(
            events = bound.events.len(),
            commands = bound.commands.len(),
            tasks = bound.tasks.len(),
            diagnostics = diagnostics.len(),
            "Conversion finished"
        );

        Ok(Conversion {
            run_mode,
            bot_variables: bots.names().to_vec(),
            imports: scan.imports,
            events: bound.events,
            commands: bound.commands,
            tasks: bound.tasks,
            unattached_hooks: bound.unattached_hooks,
            unclassified: bound.unclassified,
            diagnostics,
            anomalies,
            rule_stats: engine.stats().to_vec(),
        })
    }

    fn discover_bots<'a, I>(&self, stmts: I, snippet: bool) -> BotVariables
    where
        I: IntoIterator<Item = &'a Stmt>,
    {
        if snippet {
            BotVariables::discover_for_snippet(&self.config, stmts)
        } else {
            BotVariables::discover(&self.config, stmts)
        }
    }
}

fn find_function<'a>(stmts: &'a [Stmt], name: &str) -> Option<&'a FunctionDef> {
    stmts.iter().find_map(|stmt| match stmt {
        Stmt::FunctionDef(func) if func.name == name => Some(func),
        _ => None,
    })
}
