//! `@bot.event()` registers the result of calling the decorator; events
//! take the bare decorator.

use crate::classify::{Declaration, Role};
use crate::diagnostics::Diagnostic;
use crate::syntax::ast::Expr;
use crate::syntax::{Edit, ToSource};

use super::{Rule, RuleContext};

pub struct EventNotCalled;

impl Rule for EventNotCalled {
    fn name(&self) -> &'static str {
        "event-not-called"
    }

    fn description(&self) -> &'static str {
        "Event decorators must not be called"
    }

    fn matches(&self, declaration: &Declaration<'_>, _context: &RuleContext<'_, '_>) -> bool {
        declaration.role == Role::Event
            && declaration
                .role_decorator
                .as_ref()
                .is_some_and(|decorator| decorator.was_invoked)
    }

    fn check<'a>(
        &self,
        declaration: &Declaration<'a>,
        context: &RuleContext<'a, '_>,
    ) -> Option<Diagnostic<'a>> {
        let role_decorator = declaration.role_decorator.as_ref()?;
        let decorator = role_decorator.source_node;
        let Expr::Call { func, span, .. } = &decorator.expr else {
            return None;
        };

        let tree = context.tree;
        let repaired = tree.with_changes(
            decorator.span,
            vec![Edit::replace(*span, func.to_source(tree))],
        );

        Some(Diagnostic::new(
            self.name(),
            "Events do not need to be called",
            format!(
                "'{}' is an event; decorate it with `@{}` instead of calling the decorator.",
                declaration.identifier, role_decorator.canonical_name
            ),
            tree.node_ref(decorator.span),
            repaired,
        ))
    }
}
