/*!
# Statement Pattern Matching

Small matchers over statements, used by rules that look for (or for the
absence of) a particular statement inside a declaration's body.
*/

use crate::names::DottedName;
use crate::syntax::ast::{Block, Expr, Stmt};

/// Pattern matcher for statements
pub trait StmtPattern {
    /// Check if this pattern matches the given statement
    fn matches(&self, stmt: &Stmt) -> bool;
}

/// Pattern matcher utility
pub struct PatternMatcher;

impl PatternMatcher {
    /// Match `await <receiver>.<method>(...)`, as a statement or as the value
    /// of an assignment or `return`
    pub fn awaited_method_call(method: &str) -> AwaitedMethodCall {
        AwaitedMethodCall {
            method: method.to_string(),
        }
    }

    /// Search a statement sequence, descending into the branches of
    /// conditionals but not into loops, `with`, `try` or nested functions
    pub fn find_in_branches<P: StmtPattern>(pattern: &P, stmts: &[Stmt]) -> bool {
        stmts.iter().any(|stmt| match stmt {
            Stmt::If(conditional) => {
                Self::find_in_block(pattern, &conditional.body)
                    || conditional
                        .elifs
                        .iter()
                        .any(|elif| Self::find_in_block(pattern, &elif.body))
                    || conditional
                        .orelse
                        .as_ref()
                        .is_some_and(|block| Self::find_in_block(pattern, block))
            }
            other => pattern.matches(other),
        })
    }

    fn find_in_block<P: StmtPattern>(pattern: &P, block: &Block) -> bool {
        Self::find_in_branches(pattern, &block.stmts)
    }
}

pub struct AwaitedMethodCall {
    method: String,
}

impl AwaitedMethodCall {
    fn matches_expr(&self, expr: &Expr) -> bool {
        let Expr::Await { value, .. } = expr else {
            return false;
        };
        let Expr::Call { func, .. } = value.as_ref() else {
            return false;
        };
        DottedName::resolve(func)
            .is_some_and(|name| name.segment_count() > 1 && name.last_segment() == self.method)
    }
}

impl StmtPattern for AwaitedMethodCall {
    fn matches(&self, stmt: &Stmt) -> bool {
        match stmt {
            Stmt::Expr(stmt) => self.matches_expr(&stmt.expr),
            Stmt::Assign(assign) => assign
                .value
                .as_ref()
                .is_some_and(|value| self.matches_expr(value)),
            Stmt::Return(ret) => ret.value.as_ref().is_some_and(|value| self.matches_expr(value)),
            _ => false,
        }
    }
}
