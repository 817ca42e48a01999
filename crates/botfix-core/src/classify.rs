//! Classification of decorated coroutines into bot roles.

use serde::Serialize;
use tracing::{debug, warn};

use crate::convert::{Anomaly, AnomalyKind, ConversionError};
use crate::heuristics::{is_cog_base, BotVariables};
use crate::imports::ImportRecord;
use crate::names::DottedName;
use crate::run_mode::main_guard;
use crate::syntax::ast::{self, ClassDef, Expr, FunctionDef, Stmt};
use crate::syntax::SourceTree;
use crate::BotfixConfig;

/// What a declaration does for the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Role {
    Event,
    Listener,
    Command,
    Task,
    BeforeHook,
    AfterHook,
    Unclassified,
}

/// What a single decorator was recognized as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DecoratorKind {
    Event,
    Listener,
    Command,
    Task,
    BeforeHook,
    AfterHook,
    Unknown,
}

impl DecoratorKind {
    fn role(self) -> Option<Role> {
        match self {
            DecoratorKind::Event => Some(Role::Event),
            DecoratorKind::Listener => Some(Role::Listener),
            DecoratorKind::Command => Some(Role::Command),
            DecoratorKind::Task => Some(Role::Task),
            DecoratorKind::BeforeHook => Some(Role::BeforeHook),
            DecoratorKind::AfterHook => Some(Role::AfterHook),
            DecoratorKind::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EnclosingContext {
    /// Module level, or spliced in from an entry coroutine
    Bare,
    /// Method of a cog class
    Class,
}

/// A resolved decorator
#[derive(Debug, Clone, PartialEq)]
pub struct Decorator<'a> {
    pub canonical_name: DottedName,
    /// `@x.event()` rather than `@x.event`
    pub was_invoked: bool,
    pub kind: DecoratorKind,
    pub source_node: &'a ast::Decorator,
}

impl<'a> Decorator<'a> {
    fn new(canonical_name: DottedName, kind: DecoratorKind, source_node: &'a ast::Decorator) -> Self {
        Self {
            canonical_name,
            was_invoked: matches!(source_node.expr, Expr::Call { .. }),
            kind,
            source_node,
        }
    }
}

/// A classified coroutine
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration<'a> {
    pub identifier: String,
    pub role: Role,
    /// The decorator that determined `role`; removed from `decorators`
    pub role_decorator: Option<Decorator<'a>>,
    /// Remaining decorators that are neither roles nor checks
    pub decorators: Vec<Decorator<'a>>,
    /// Task a before/after hook belongs to
    pub hook_target: Option<String>,
    pub source_node: &'a FunctionDef,
    pub enclosing_context: EnclosingContext,
    /// Name of the cog class for methods
    pub enclosing_class: Option<String>,
}

impl Declaration<'_> {
    pub fn is_hook(&self) -> bool {
        matches!(self.role, Role::BeforeHook | Role::AfterHook)
    }

    fn in_class(mut self, class_name: &str) -> Self {
        self.enclosing_class = Some(class_name.to_string());
        self
    }
}

/// Decides the role of a single coroutine from its decorators
pub struct DeclarationClassifier<'c> {
    config: &'c BotfixConfig,
    bots: &'c BotVariables,
}

impl<'c> DeclarationClassifier<'c> {
    pub fn new(config: &'c BotfixConfig, bots: &'c BotVariables) -> Self {
        Self { config, bots }
    }

    /// Classify an async function. Returns `None` for functions that are not
    /// declarations at all (sync, or without decorators).
    pub fn classify<'a>(
        &self,
        func: &'a FunctionDef,
        context: EnclosingContext,
    ) -> Option<Declaration<'a>> {
        if !func.is_async || func.decorators.is_empty() {
            return None;
        }

        let mut role_decorator = None;
        let mut hook_target = None;
        let mut decorators = Vec::new();

        for source_node in &func.decorators {
            let Some(name) = DottedName::resolve(&source_node.expr) else {
                debug!(function = %func.name, "Skipping decorator that is not a name chain");
                continue;
            };

            match self.decorator_kind(&name, context) {
                Some(DecoratorKind::Unknown) => {
                    decorators.push(Decorator::new(name, DecoratorKind::Unknown, source_node));
                }
                Some(kind) => {
                    if matches!(kind, DecoratorKind::BeforeHook | DecoratorKind::AfterHook) {
                        hook_target = Some(name.first_segment().to_string());
                    }
                    role_decorator = Some(Decorator::new(name, kind, source_node));
                    // A coroutine has exactly one role; the first one wins
                    break;
                }
                // Checks are dropped entirely
                None => {}
            }
        }

        let role = role_decorator
            .as_ref()
            .and_then(|d| d.kind.role())
            .unwrap_or(Role::Unclassified);

        if role == Role::Unclassified {
            warn!("Couldn't determine the role of '{}'", func.name);
        }

        Some(Declaration {
            identifier: func.name.clone(),
            role,
            role_decorator,
            decorators,
            hook_target,
            source_node: func,
            enclosing_context: context,
            enclosing_class: None,
        })
    }

    /// `None` means the decorator is a check and should be discarded
    fn decorator_kind(&self, name: &DottedName, context: EnclosingContext) -> Option<DecoratorKind> {
        if let Some(kind) = self.role_suffix_kind(name, context) {
            return Some(kind);
        }

        if name == self.config.loop_decorator.as_str() {
            return Some(DecoratorKind::Task);
        }

        if name.segment_count() == 2 {
            match name.last_segment() {
                "before_loop" => return Some(DecoratorKind::BeforeHook),
                "after_loop" => return Some(DecoratorKind::AfterHook),
                _ => {}
            }
        }

        if self
            .config
            .check_namespaces
            .iter()
            .any(|namespace| name.starts_with(namespace))
        {
            return None;
        }

        Some(DecoratorKind::Unknown)
    }

    fn role_suffix_kind(&self, name: &DottedName, context: EnclosingContext) -> Option<DecoratorKind> {
        let receiver_ok = match context {
            EnclosingContext::Bare => self.bots.accepts(name),
            // Cog decorators live on the commands module, not on the bot
            EnclosingContext::Class => self.bots.accepts(name) || name.first_segment() == "commands",
        };
        if !receiver_ok || name.segment_count() < 2 {
            return None;
        }

        match (name.last_segment(), context) {
            ("event", _) => Some(DecoratorKind::Event),
            ("command", _) => Some(DecoratorKind::Command),
            ("listen", _) => Some(DecoratorKind::Listener),
            ("listener", EnclosingContext::Class) => Some(DecoratorKind::Listener),
            _ => None,
        }
    }
}

/// Everything found while walking the effective top level
#[derive(Debug, Default)]
pub struct ScanOutput<'a> {
    pub declarations: Vec<Declaration<'a>>,
    pub imports: Vec<ImportRecord>,
    pub anomalies: Vec<Anomaly>,
}

/// Walks statement sequences as if they were top level, descending into
/// main guards, cog classes and undecorated coroutines
pub struct DeclarationScanner<'a, 'c> {
    tree: &'a SourceTree,
    classifier: DeclarationClassifier<'c>,
    entry_function: Option<&'c str>,
    max_depth: usize,
    output: ScanOutput<'a>,
}

impl<'a, 'c> DeclarationScanner<'a, 'c> {
    pub fn new(
        tree: &'a SourceTree,
        classifier: DeclarationClassifier<'c>,
        entry_function: Option<&'c str>,
        max_depth: usize,
    ) -> Self {
        Self {
            tree,
            classifier,
            entry_function,
            max_depth,
            output: ScanOutput::default(),
        }
    }

    /// Scan statements and return what was found, in discovery order
    pub fn scan<I>(mut self, stmts: I) -> Result<ScanOutput<'a>, ConversionError>
    where
        I: IntoIterator<Item = &'a Stmt>,
    {
        self.scan_statements(stmts, 0)?;
        Ok(self.output)
    }

    fn scan_statements<I>(&mut self, stmts: I, depth: usize) -> Result<(), ConversionError>
    where
        I: IntoIterator<Item = &'a Stmt>,
    {
        for stmt in stmts {
            match stmt {
                Stmt::FunctionDef(func) => self.scan_function(func, depth)?,

                Stmt::ClassDef(class) => self.scan_class(class),

                Stmt::If(guard) => {
                    if main_guard(guard, self.tree)? {
                        self.scan_statements(&guard.body.stmts, depth)?;
                    }
                }

                Stmt::Import(import) => self.output.imports.push(ImportRecord::from_import(import)),

                Stmt::ImportFrom(import) => {
                    self.output.imports.push(ImportRecord::from_import_from(import))
                }

                Stmt::Expr(_) | Stmt::Assign(_) | Stmt::Return(_) | Stmt::Other { .. } => {}
            }
        }
        Ok(())
    }

    fn scan_function(&mut self, func: &'a FunctionDef, depth: usize) -> Result<(), ConversionError> {
        if !func.is_async || Some(func.name.as_str()) == self.entry_function {
            return Ok(());
        }

        if !func.decorators.is_empty() {
            if let Some(declaration) = self.classifier.classify(func, EnclosingContext::Bare) {
                self.record(declaration);
            }
            return Ok(());
        }

        // An undecorated coroutine may itself hold the declarations
        if depth + 1 > self.max_depth {
            let (line, _) = self.tree.line_col(func.span.start);
            warn!(function = %func.name, depth, "Not descending further into nested coroutines");
            self.output.anomalies.push(Anomaly::new(
                AnomalyKind::ScanDepthExceeded,
                format!(
                    "Stopped scanning inside '{}': nesting exceeds {} levels",
                    func.name, self.max_depth
                ),
                Some(line),
            ));
            return Ok(());
        }
        debug!(function = %func.name, depth = depth + 1, "Rescanning undecorated coroutine body");
        self.scan_statements(&func.body.stmts, depth + 1)
    }

    fn scan_class(&mut self, class: &'a ClassDef) {
        if !class.bases.iter().any(|base| is_cog_base(&base.value)) {
            return;
        }

        for stmt in &class.body.stmts {
            if let Stmt::FunctionDef(method) = stmt {
                if let Some(declaration) = self.classifier.classify(method, EnclosingContext::Class) {
                    self.record(declaration.in_class(&class.name));
                }
            }
        }
    }

    fn record(&mut self, declaration: Declaration<'a>) {
        if declaration.role == Role::Unclassified {
            let (line, _) = self.tree.line_col(declaration.source_node.span.start);
            self.output.anomalies.push(Anomaly::new(
                AnomalyKind::UnclassifiedDeclaration,
                format!("Couldn't determine the role of '{}'", declaration.identifier),
                Some(line),
            ));
        }
        self.output.declarations.push(declaration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_source;

    fn classify_first(source: &str, context: EnclosingContext) -> Option<(Role, Option<bool>, usize)> {
        let tree = parse_source(source).unwrap();
        let config = BotfixConfig::default();
        let bots = BotVariables::discover(&config, &tree.module().body);
        let classifier = DeclarationClassifier::new(&config, &bots);
        let Stmt::FunctionDef(func) = &tree.module().body[0] else {
            panic!("Expected FunctionDef");
        };
        classifier.classify(func, context).map(|d| {
            (
                d.role,
                d.role_decorator.as_ref().map(|r| r.was_invoked),
                d.decorators.len(),
            )
        })
    }

    #[test]
    fn test_event_command_listener() {
        let bare = EnclosingContext::Bare;
        assert_eq!(
            classify_first("@bot.event\nasync def on_ready():\n    pass\n", bare),
            Some((Role::Event, Some(false), 0))
        );
        assert_eq!(
            classify_first("@bot.command()\nasync def ping(ctx):\n    pass\n", bare),
            Some((Role::Command, Some(true), 0))
        );
        assert_eq!(
            classify_first("@client.listen()\nasync def on_ready():\n    pass\n", bare),
            Some((Role::Listener, Some(true), 0))
        );
    }

    #[test]
    fn test_checks_are_discarded_and_unknowns_kept() {
        let source = "@commands.is_owner()\n@cache\n@bot.command()\nasync def reload(ctx):\n    pass\n";
        assert_eq!(
            classify_first(source, EnclosingContext::Bare),
            Some((Role::Command, Some(true), 1))
        );
    }

    #[test]
    fn test_first_role_wins() {
        let tree = parse_source("@bot.listen()\n@bot.event\nasync def on_ready():\n    pass\n").unwrap();
        let config = BotfixConfig::default();
        let bots = BotVariables::discover(&config, &tree.module().body);
        let classifier = DeclarationClassifier::new(&config, &bots);
        let Stmt::FunctionDef(func) = &tree.module().body[0] else {
            panic!("Expected FunctionDef");
        };

        let declaration = classifier.classify(func, EnclosingContext::Bare).unwrap();
        assert_eq!(declaration.role, Role::Listener);
        assert_eq!(
            declaration.role_decorator.unwrap().canonical_name,
            DottedName::new("bot.listen")
        );
    }

    #[test]
    fn test_tasks_and_hooks() {
        let tree = parse_source(
            "@tasks.loop(minutes=5)\nasync def refresh():\n    pass\n\n@refresh.after_loop\nasync def teardown():\n    pass\n",
        )
        .unwrap();
        let config = BotfixConfig::default();
        let bots = BotVariables::discover(&config, &tree.module().body);
        let classifier = DeclarationClassifier::new(&config, &bots);
        let roles: Vec<_> = tree
            .module()
            .body
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::FunctionDef(func) => classifier.classify(func, EnclosingContext::Bare),
                _ => None,
            })
            .map(|d| (d.role, d.hook_target))
            .collect();

        assert_eq!(
            roles,
            vec![
                (Role::Task, None),
                (Role::AfterHook, Some("refresh".to_string()))
            ]
        );
    }

    #[test]
    fn test_unknown_receiver_is_unclassified() {
        assert_eq!(
            classify_first("@router.event\nasync def on_ready():\n    pass\n", EnclosingContext::Bare),
            Some((Role::Unclassified, None, 1))
        );
    }

    #[test]
    fn test_cog_listener_only_in_class_context() {
        let source = "@commands.Cog.listener()\nasync def on_member_join(self, member):\n    pass\n";
        assert_eq!(
            classify_first(source, EnclosingContext::Class),
            Some((Role::Listener, Some(true), 0))
        );
        // Outside a cog the same decorator is just a check-namespace decorator
        assert_eq!(
            classify_first(source, EnclosingContext::Bare),
            Some((Role::Unclassified, None, 0))
        );
    }

    #[test]
    fn test_undecorated_and_sync_functions_are_skipped() {
        assert_eq!(
            classify_first("async def helper():\n    pass\n", EnclosingContext::Bare),
            None
        );
        assert_eq!(
            classify_first("@bot.event\ndef on_ready():\n    pass\n", EnclosingContext::Bare),
            None
        );
    }

    #[test]
    fn test_scanner_descends_into_undecorated_coroutines_up_to_the_limit() {
        let source = "\
async def outer():
    async def inner():
        @bot.event
        async def on_ready():
            pass
";
        let tree = parse_source(source).unwrap();
        let config = BotfixConfig::default();
        let bots = BotVariables::discover(&config, &tree.module().body);

        let deep = DeclarationScanner::new(&tree, DeclarationClassifier::new(&config, &bots), None, 8)
            .scan(&tree.module().body)
            .unwrap();
        assert_eq!(deep.declarations.len(), 1);
        assert!(deep.anomalies.is_empty());

        let shallow = DeclarationScanner::new(&tree, DeclarationClassifier::new(&config, &bots), None, 1)
            .scan(&tree.module().body)
            .unwrap();
        assert!(shallow.declarations.is_empty());
        assert_eq!(shallow.anomalies[0].kind, AnomalyKind::ScanDepthExceeded);
    }
}
