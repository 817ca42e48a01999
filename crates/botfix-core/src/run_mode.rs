//! Entry-point location.
//!
//! A program either starts the bot directly (`bot.run(TOKEN)`) or hands an
//! entry coroutine to a launcher (`asyncio.run(main())`). In the second case
//! the coroutine's body is where the declarations live.

use serde::Serialize;
use tracing::debug;

use crate::convert::ConversionError;
use crate::heuristics::BotVariables;
use crate::names::DottedName;
use crate::syntax::ast::{CmpOp, Expr, If, Stmt};
use crate::syntax::SourceTree;
use crate::BotfixConfig;

/// How the program starts the framework
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RunMode {
    Unknown,
    DirectInvocation,
    IndirectInvocation { entry_function: String },
}

impl RunMode {
    pub fn entry_function_name(&self) -> Option<&str> {
        match self {
            RunMode::IndirectInvocation { entry_function } => Some(entry_function),
            RunMode::Unknown | RunMode::DirectInvocation => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, RunMode::Unknown)
    }
}

pub struct EntryPointLocator<'c> {
    tree: &'c SourceTree,
    config: &'c BotfixConfig,
    bots: &'c BotVariables,
}

impl<'c> EntryPointLocator<'c> {
    pub fn new(tree: &'c SourceTree, config: &'c BotfixConfig, bots: &'c BotVariables) -> Self {
        Self { tree, config, bots }
    }

    /// Scan top-level statements in order. The first launcher or run call
    /// decides the mode; later ones are not looked at.
    pub fn locate<'a, I>(&self, stmts: I) -> Result<RunMode, ConversionError>
    where
        I: IntoIterator<Item = &'a Stmt>,
    {
        let mut mode = RunMode::Unknown;
        self.visit(stmts, &mut mode)?;
        Ok(mode)
    }

    fn visit<'a, I>(&self, stmts: I, mode: &mut RunMode) -> Result<(), ConversionError>
    where
        I: IntoIterator<Item = &'a Stmt>,
    {
        for stmt in stmts {
            if mode.is_known() {
                break;
            }
            match stmt {
                Stmt::If(guard) => {
                    if main_guard(guard, self.tree)? {
                        debug!("Unwrapping main guard");
                        self.visit(&guard.body.stmts, mode)?;
                    }
                }
                Stmt::Expr(stmt) => {
                    if let Some(found) = self.inspect_call(&stmt.expr)? {
                        debug!(?found, "Run mode determined");
                        *mode = found;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn inspect_call(&self, expr: &Expr) -> Result<Option<RunMode>, ConversionError> {
        let Some((func, args)) = expr.as_call() else {
            return Ok(None);
        };
        let Some(callee) = DottedName::resolve(func) else {
            return Ok(None);
        };
        let line = self.tree.line_col(expr.span().start).0;

        if self.config.launchers.iter().any(|l| callee == l.as_str()) {
            if args.len() != 1 {
                return Err(ConversionError::LauncherArity {
                    callee: callee.to_string(),
                    found: args.len(),
                    line,
                });
            }
            let entry_function = match &args[0].value {
                Expr::Call { func, .. } if args[0].keyword.is_none() => func.as_name(),
                _ => None,
            };
            return match entry_function {
                Some(name) => Ok(Some(RunMode::IndirectInvocation {
                    entry_function: name.to_string(),
                })),
                None => Err(ConversionError::LauncherArgument {
                    callee: callee.to_string(),
                    line,
                }),
            };
        }

        if self.bots.run_methods().iter().any(|m| callee == m.as_str()) {
            if args.len() != 1 {
                return Err(ConversionError::RunArity {
                    callee: callee.to_string(),
                    found: args.len(),
                    line,
                });
            }
            return Ok(Some(RunMode::DirectInvocation));
        }

        Ok(None)
    }
}

/// Whether `guard` is `if __name__ == "__main__":`.
///
/// Conditions that do not mention `__name__` are simply not guards. A
/// comparison that does mention it but is anything other than equality with
/// the `"__main__"` literal is rejected.
pub fn main_guard(guard: &If, tree: &SourceTree) -> Result<bool, ConversionError> {
    let Expr::Compare {
        left,
        ops,
        comparators,
        ..
    } = &guard.test
    else {
        return Ok(false);
    };

    let is_dunder_name = |e: &Expr| e.as_name() == Some("__name__");
    let is_main_literal = |e: &Expr| e.string_value() == Some("__main__");

    if !is_dunder_name(left) && !comparators.iter().any(is_dunder_name) {
        return Ok(false);
    }

    let well_formed = matches!(ops.as_slice(), [CmpOp::Eq])
        && comparators.len() == 1
        && ((is_dunder_name(left) && is_main_literal(&comparators[0]))
            || (is_main_literal(left) && is_dunder_name(&comparators[0])));

    if well_formed {
        Ok(true)
    } else {
        Err(ConversionError::MalformedMainGuard {
            line: tree.line_col(guard.span.start).0,
            found: tree.text(guard.test.span()).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_source;

    fn locate(source: &str) -> Result<RunMode, ConversionError> {
        let tree = parse_source(source).unwrap();
        let config = BotfixConfig::default();
        let bots = BotVariables::discover(&config, &tree.module().body);
        EntryPointLocator::new(&tree, &config, &bots).locate(&tree.module().body)
    }

    #[test]
    fn test_direct_invocation() {
        assert_eq!(locate("bot.run(TOKEN)\n").unwrap(), RunMode::DirectInvocation);
        assert_eq!(
            locate("client = discord.Client()\nclient.start(token)\n").unwrap(),
            RunMode::DirectInvocation
        );
    }

    #[test]
    fn test_indirect_invocation_inside_main_guard() {
        let source = "async def main():\n    pass\n\nif __name__ == '__main__':\n    asyncio.run(main())\n";
        assert_eq!(
            locate(source).unwrap(),
            RunMode::IndirectInvocation {
                entry_function: "main".to_string()
            }
        );
    }

    #[test]
    fn test_first_match_wins() {
        let source = "asyncio.run(main())\nbot.run(TOKEN)\n";
        assert_eq!(
            locate(source).unwrap().entry_function_name(),
            Some("main")
        );
    }

    #[test]
    fn test_unknown_without_startup_code() {
        assert_eq!(locate("x = 1\nprint(x)\n").unwrap(), RunMode::Unknown);
    }

    #[test]
    fn test_launcher_arity() {
        assert!(matches!(
            locate("asyncio.run(main(), debug=True)\n"),
            Err(ConversionError::LauncherArity { found: 2, line: 1, .. })
        ));
    }

    #[test]
    fn test_launcher_argument_must_be_call() {
        assert!(matches!(
            locate("asyncio.run(main)\n"),
            Err(ConversionError::LauncherArgument { .. })
        ));
    }

    #[test]
    fn test_run_arity() {
        assert!(matches!(
            locate("bot.run()\n"),
            Err(ConversionError::RunArity { found: 0, .. })
        ));
    }

    #[test]
    fn test_main_guard_forms() {
        assert!(locate("if \"__main__\" == __name__:\n    bot.run(t)\n").is_ok());
        assert!(matches!(
            locate("if __name__ != '__main__':\n    bot.run(t)\n"),
            Err(ConversionError::MalformedMainGuard { line: 1, .. })
        ));
        assert!(matches!(
            locate("if __name__ == 'main':\n    bot.run(t)\n"),
            Err(ConversionError::MalformedMainGuard { .. })
        ));
        // Unrelated conditionals are not scanned
        assert_eq!(locate("if DEBUG:\n    bot.run(t)\n").unwrap(), RunMode::Unknown);
    }
}
