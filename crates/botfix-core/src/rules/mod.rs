/*!
# Diagnostic Rules

Each rule inspects one classified declaration and, when it finds a problem,
produces a [`Diagnostic`] whose repaired fragment replaces exactly the
offending node.

Rules are independent and pure: they read the declaration and the source
tree and never see each other's output.
*/

use serde::Serialize;
use tracing::debug;

use crate::classify::{Declaration, Role};
use crate::diagnostics::Diagnostic;
use crate::syntax::SourceTree;
use crate::BotfixConfig;

pub mod event_not_called;
pub mod listener_must_be_called;
pub mod missing_dispatch;
pub mod patterns;

pub use event_not_called::EventNotCalled;
pub use listener_must_be_called::ListenerMustBeCalled;
pub use missing_dispatch::MissingDispatchForward;
pub use patterns::{PatternMatcher, StmtPattern};

/// What a rule may look at besides the declaration itself
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a, 'c> {
    pub tree: &'a SourceTree,
    pub config: &'c BotfixConfig,
}

impl<'a, 'c> RuleContext<'a, 'c> {
    pub fn new(tree: &'a SourceTree, config: &'c BotfixConfig) -> Self {
        Self { tree, config }
    }
}

/// Core trait for diagnostic rules
pub trait Rule: Send + Sync {
    /// Stable identifier, reported with every diagnostic
    fn name(&self) -> &'static str;

    /// Detailed description of what this rule checks
    fn description(&self) -> &'static str;

    /// Check if this rule applies to the given declaration
    fn matches(&self, declaration: &Declaration<'_>, context: &RuleContext<'_, '_>) -> bool;

    /// Produce the diagnostic for a matching declaration
    fn check<'a>(
        &self,
        declaration: &Declaration<'a>,
        context: &RuleContext<'a, '_>,
    ) -> Option<Diagnostic<'a>>;
}

/// Rule execution statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleStats {
    pub rule_name: &'static str,
    /// Declarations the rule matched
    pub applications: u64,
    pub diagnostics: u64,
}

impl RuleStats {
    pub fn new(rule_name: &'static str) -> Self {
        Self {
            rule_name,
            applications: 0,
            diagnostics: 0,
        }
    }

    pub fn hit_rate(&self) -> f64 {
        if self.applications == 0 {
            0.0
        } else {
            (self.diagnostics as f64) / (self.applications as f64)
        }
    }

    pub fn merge(&mut self, other: &RuleStats) {
        self.applications += other.applications;
        self.diagnostics += other.diagnostics;
    }
}

/// Ordered rule table
pub struct RuleEngine {
    rules: Vec<Box<dyn Rule>>,
    stats: Vec<RuleStats>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            stats: Vec::new(),
        }
    }

    /// The built-in rules, in the order their diagnostics are reported
    pub fn with_default_rules() -> Self {
        let mut engine = Self::new();
        engine.add_rule(Box::new(EventNotCalled));
        engine.add_rule(Box::new(ListenerMustBeCalled));
        engine.add_rule(Box::new(MissingDispatchForward));
        engine
    }

    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.stats.push(RuleStats::new(rule.name()));
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    pub fn stats(&self) -> &[RuleStats] {
        &self.stats
    }

    /// Run every rule against an event, listener or command. Other roles
    /// produce nothing.
    pub fn evaluate<'a>(
        &mut self,
        declaration: &Declaration<'a>,
        context: &RuleContext<'a, '_>,
    ) -> Vec<Diagnostic<'a>> {
        if !matches!(declaration.role, Role::Event | Role::Listener | Role::Command) {
            return Vec::new();
        }

        let mut diagnostics = Vec::new();
        for (rule, stats) in self.rules.iter().zip(self.stats.iter_mut()) {
            if !rule.matches(declaration, context) {
                continue;
            }
            stats.applications += 1;

            if let Some(diagnostic) = rule.check(declaration, context) {
                debug!(
                    rule = rule.name(),
                    declaration = %declaration.identifier,
                    "Rule produced a diagnostic"
                );
                stats.diagnostics += 1;
                diagnostics.push(diagnostic);
            }
        }
        diagnostics
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::classify::{Declaration, DeclarationClassifier, EnclosingContext};
    use crate::heuristics::BotVariables;
    use crate::syntax::{SourceTree, Stmt};
    use crate::BotfixConfig;

    /// Classify every top-level coroutine and every cog method
    pub fn declarations<'a>(tree: &'a SourceTree, config: &BotfixConfig) -> Vec<Declaration<'a>> {
        let bots = BotVariables::discover(config, &tree.module().body);
        let classifier = DeclarationClassifier::new(config, &bots);
        let mut found = Vec::new();
        for stmt in &tree.module().body {
            match stmt {
                Stmt::FunctionDef(func) => {
                    found.extend(classifier.classify(func, EnclosingContext::Bare));
                }
                Stmt::ClassDef(class) => {
                    for method in &class.body.stmts {
                        if let Stmt::FunctionDef(func) = method {
                            found.extend(classifier.classify(func, EnclosingContext::Class));
                        }
                    }
                }
                _ => {}
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::declarations;
    use super::*;
    use crate::syntax::parse_source;

    #[test]
    fn test_default_rule_order() {
        let engine = RuleEngine::with_default_rules();
        assert_eq!(
            engine.rule_names(),
            vec![
                "event-not-called",
                "listener-must-be-called",
                "missing-dispatch-forward"
            ]
        );
    }

    #[test]
    fn test_diagnostics_follow_rule_order() {
        let tree = parse_source("@bot.event()\nasync def on_message(message):\n    pass\n").unwrap();
        let config = BotfixConfig::default();
        let context = RuleContext::new(&tree, &config);
        let mut engine = RuleEngine::with_default_rules();

        let found = declarations(&tree, &config);
        let diagnostics = engine.evaluate(&found[0], &context);

        let rules: Vec<_> = diagnostics.iter().map(|d| d.rule).collect();
        assert_eq!(rules, vec!["event-not-called", "missing-dispatch-forward"]);
        assert_eq!(engine.stats()[0].diagnostics, 1);
        assert_eq!(engine.stats()[1].applications, 0);
    }

    #[test]
    fn test_tasks_are_not_evaluated() {
        let tree = parse_source("@tasks.loop(seconds=1)\nasync def tick():\n    pass\n").unwrap();
        let config = BotfixConfig::default();
        let context = RuleContext::new(&tree, &config);
        let mut engine = RuleEngine::with_default_rules();

        let found = declarations(&tree, &config);
        assert!(engine.evaluate(&found[0], &context).is_empty());
        assert!(engine.stats().iter().all(|s| s.applications == 0));
    }

    #[test]
    fn test_stats_hit_rate() {
        let mut stats = RuleStats::new("event-not-called");
        assert_eq!(stats.hit_rate(), 0.0);

        stats.merge(&RuleStats {
            rule_name: "event-not-called",
            applications: 4,
            diagnostics: 1,
        });
        assert_eq!(stats.hit_rate(), 0.25);
    }
}
