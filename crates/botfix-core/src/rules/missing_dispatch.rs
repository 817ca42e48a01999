//! An `on_message` event replaces the framework's own handler, so commands
//! stop working unless the event forwards the message back.

use crate::classify::{Declaration, Role};
use crate::diagnostics::Diagnostic;
use crate::heuristics::{bot_variable_from_decorator, message_parameter};
use crate::syntax::ast::Span;
use crate::syntax::source_gen::build;
use crate::syntax::{Edit, ToSource};

use super::patterns::PatternMatcher;
use super::{Rule, RuleContext};

/// Extra indentation for a body moved off the `def` line
const BODY_INDENT: &str = "    ";

pub struct MissingDispatchForward;

impl Rule for MissingDispatchForward {
    fn name(&self) -> &'static str {
        "missing-dispatch-forward"
    }

    fn description(&self) -> &'static str {
        "Message events must forward to command processing"
    }

    fn matches(&self, declaration: &Declaration<'_>, context: &RuleContext<'_, '_>) -> bool {
        if declaration.role != Role::Event || declaration.identifier != context.config.message_event {
            return false;
        }
        let pattern = PatternMatcher::awaited_method_call(&context.config.dispatch_method);
        !PatternMatcher::find_in_branches(&pattern, &declaration.source_node.body.stmts)
    }

    fn check<'a>(
        &self,
        declaration: &Declaration<'a>,
        context: &RuleContext<'a, '_>,
    ) -> Option<Diagnostic<'a>> {
        let tree = context.tree;
        let role_decorator = declaration.role_decorator.as_ref()?;
        let body = &declaration.source_node.body;

        let bot = bot_variable_from_decorator(&role_decorator.canonical_name);
        let message = message_parameter(declaration.source_node, declaration.enclosing_context);
        let forward = build::expr_stmt(build::await_expr(build::call(
            build::dotted(&format!("{}.{}", bot, context.config.dispatch_method)),
            vec![build::name(&message)],
        )))
        .to_source(tree);

        // After any comment trailing the last statement
        let body_end = tree.line_end(body.span.end);
        let (node, edits) = if tree.starts_line(body.span.start) {
            let indent = tree.line_indent(body.span.start);
            (
                Span::new(body.span.start, body_end),
                vec![Edit::insert(body_end, format!("\n{indent}{forward}"))],
            )
        } else {
            // `async def on_message(m): pass` - move the body onto its own line,
            // swallowing the blank space after the colon
            let def_indent = tree.line_indent(body.span.start);
            let gap_start = tree.source()[..body.span.start]
                .trim_end_matches([' ', '\t'])
                .len();
            let node = Span::new(gap_start, body_end);
            (
                node,
                vec![
                    Edit::replace(
                        Span::new(gap_start, body.span.start),
                        format!("\n{def_indent}{BODY_INDENT}"),
                    ),
                    Edit::insert(body_end, format!("\n{def_indent}{BODY_INDENT}{forward}")),
                ],
            )
        };
        let repaired = tree.with_changes(node, edits);

        Some(Diagnostic::new(
            self.name(),
            "Message events must process commands",
            format!(
                "'{}' overrides the default message handler, so commands will never run. \
                 Added `{}` at the end of the event; it may not be in the right place, double-check.",
                declaration.identifier, forward
            ),
            tree.node_ref(node),
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

    fn repaired_source(source: &str) -> Option<String> {
        let tree = parse_source(source).unwrap();
        let config = BotfixConfig::default();
        let context = RuleContext::new(&tree, &config);
        let found = declarations(&tree, &config);

        if !MissingDispatchForward.matches(&found[0], &context) {
            return None;
        }
        let diagnostic = MissingDispatchForward.check(&found[0], &context)?;
        Some(tree.apply_fixes([&diagnostic.repaired]).source)
    }

    #[test]
    fn test_forward_is_appended() {
        let fixed = repaired_source("@bot.event\nasync def on_message(message):\n    pass\n").unwrap();
        assert_eq!(
            fixed,
            "@bot.event\nasync def on_message(message):\n    pass\n    await bot.process_commands(message)\n"
        );
    }

    #[test]
    fn test_inline_body_is_moved() {
        let fixed = repaired_source("@client.event\nasync def on_message(msg): pass\n").unwrap();
        assert_eq!(
            fixed,
            "@client.event\nasync def on_message(msg):\n    pass\n    await client.process_commands(msg)\n"
        );
    }

    #[test]
    fn test_trailing_comment_stays_on_its_line() {
        let fixed = repaired_source("@bot.event\nasync def on_message(message):\n    pass  # todo\n").unwrap();
        assert_eq!(
            fixed,
            "@bot.event\nasync def on_message(message):\n    pass  # todo\n    await bot.process_commands(message)\n"
        );

        let inline = repaired_source("@bot.event\nasync def on_message(m): pass  # todo\n").unwrap();
        assert_eq!(
            inline,
            "@bot.event\nasync def on_message(m):\n    pass  # todo\n    await bot.process_commands(m)\n"
        );
    }

    #[test]
    fn test_returned_forward_is_accepted() {
        let source = "\
@bot.event
async def on_message(message):
    return await bot.process_commands(message)
";
        assert_eq!(repaired_source(source), None);
    }

    #[test]
    fn test_method_uses_second_parameter() {
        let source = "\
class Handler:
    @bot.event
    async def on_message(self, msg):
        if msg.author.bot:
            return
";
        let fixed = repaired_source(source).unwrap();
        assert_eq!(
            fixed,
            "\
class Handler:
    @bot.event
    async def on_message(self, msg):
        if msg.author.bot:
            return
        await bot.process_commands(msg)
"
        );
    }

    #[test]
    fn test_forward_inside_branch_is_accepted() {
        let source = "\
@bot.event
async def on_message(message):
    if message.content:
        await bot.process_commands(message)
";
        assert_eq!(repaired_source(source), None);
    }

    #[test]
    fn test_other_events_are_ignored() {
        assert_eq!(
            repaired_source("@bot.event\nasync def on_ready():\n    pass\n"),
            None
        );
    }

    #[test]
    fn test_explanation_warns_about_placement() {
        let tree = parse_source("@bot.event\nasync def on_message(message):\n    pass\n").unwrap();
        let config = BotfixConfig::default();
        let context = RuleContext::new(&tree, &config);
        let found = declarations(&tree, &config);

        let diagnostic = MissingDispatchForward.check(&found[0], &context).unwrap();
        assert!(diagnostic.explanation.contains("may not be in the right place, double-check"));
        assert_eq!(diagnostic.original.text, "pass");
    }
}
