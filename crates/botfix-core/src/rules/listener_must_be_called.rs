//! Listener decorators are factories: `@bot.listen()`, not `@bot.listen`.

use crate::classify::{Declaration, Role};
use crate::diagnostics::Diagnostic;
use crate::syntax::source_gen::build;
use crate::syntax::{Edit, ToSource};

use super::{Rule, RuleContext};

pub struct ListenerMustBeCalled;

impl Rule for ListenerMustBeCalled {
    fn name(&self) -> &'static str {
        "listener-must-be-called"
    }

    fn description(&self) -> &'static str {
        "Listener decorators must be called"
    }

    fn matches(&self, declaration: &Declaration<'_>, _context: &RuleContext<'_, '_>) -> bool {
        declaration.role == Role::Listener
            && declaration
                .role_decorator
                .as_ref()
                .is_some_and(|decorator| !decorator.was_invoked)
    }

    fn check<'a>(
        &self,
        declaration: &Declaration<'a>,
        context: &RuleContext<'a, '_>,
    ) -> Option<Diagnostic<'a>> {
        let role_decorator = declaration.role_decorator.as_ref()?;
        let decorator = role_decorator.source_node;
        let callee = &decorator.expr;

        let tree = context.tree;
        let called = build::call(callee.clone(), Vec::new());
        let repaired = tree.with_changes(
            decorator.span,
            vec![Edit::replace(callee.span(), called.to_source(tree))],
        );

        Some(Diagnostic::new(
            self.name(),
            "Listeners must be called",
            format!(
                "'{}' is a listener; use `@{}()` so the decorator receives its arguments.",
                declaration.identifier, role_decorator.canonical_name
            ),
            tree.node_ref(decorator.span),
            repaired,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::declarations;
    use crate::syntax::parse_source;
    use crate::BotfixConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_uncalled_listener_is_repaired() {
        let tree = parse_source("@bot.listen\nasync def on_ready():\n    pass\n").unwrap();
        let config = BotfixConfig::default();
        let context = RuleContext::new(&tree, &config);
        let found = declarations(&tree, &config);

        assert!(ListenerMustBeCalled.matches(&found[0], &context));
        let diagnostic = ListenerMustBeCalled.check(&found[0], &context).unwrap();
        assert_eq!(diagnostic.original.text, "@bot.listen");
        assert_eq!(diagnostic.repaired.text, "@bot.listen()");
    }

    #[test]
    fn test_cog_listener() {
        let source = "\
class Greetings(commands.Cog):
    @commands.Cog.listener
    async def on_member_join(self, member):
        pass
";
        let tree = parse_source(source).unwrap();
        let config = BotfixConfig::default();
        let context = RuleContext::new(&tree, &config);
        let found = declarations(&tree, &config);

        let diagnostic = ListenerMustBeCalled.check(&found[0], &context).unwrap();
        assert_eq!(diagnostic.repaired.text, "@commands.Cog.listener()");
    }

    #[test]
    fn test_called_listener_is_fine() {
        let tree = parse_source("@bot.listen('on_ready')\nasync def ready():\n    pass\n").unwrap();
        let config = BotfixConfig::default();
        let context = RuleContext::new(&tree, &config);
        let found = declarations(&tree, &config);

        assert!(!ListenerMustBeCalled.matches(&found[0], &context));
    }
}
