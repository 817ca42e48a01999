// Source code generation for syntax nodes.
// Parsed nodes reproduce their original text byte for byte; nodes built by
// rules (synthetic span) are generated from their children.

use super::ast::{Arg, CmpOp, Expr, ExprStmt, Stmt};
use super::SourceTree;

/// Trait for nodes that can produce their source code representation
pub trait ToSource {
    fn to_source(&self, origin: &SourceTree) -> String;
}

impl ToSource for Expr {
    fn to_source(&self, origin: &SourceTree) -> String {
        let span = self.span();
        if !span.is_synthetic() {
            return origin.text(span).to_string();
        }

        match self {
            Expr::Name { id, .. } => id.clone(),
            Expr::Attribute { value, attr, .. } => {
                format!("{}.{}", value.to_source(origin), attr)
            }
            Expr::Call { func, args, .. } => {
                let args_str = args
                    .iter()
                    .map(|arg| arg.to_source(origin))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}({})", func.to_source(origin), args_str)
            }
            Expr::Await { value, .. } => format!("await {}", value.to_source(origin)),
            Expr::Compare {
                left,
                ops,
                comparators,
                ..
            } => {
                let mut result = left.to_source(origin);
                for (op, comparator) in ops.iter().zip(comparators) {
                    result.push_str(&format!(" {} {}", op.as_str(), comparator.to_source(origin)));
                }
                result
            }
            Expr::Str { raw, .. } => raw.clone(),
            Expr::Other { kind, .. } => kind.clone(),
        }
    }
}

impl ToSource for Arg {
    fn to_source(&self, origin: &SourceTree) -> String {
        if !self.span.is_synthetic() {
            return origin.text(self.span).to_string();
        }
        match &self.keyword {
            Some(keyword) => format!("{}={}", keyword, self.value.to_source(origin)),
            None => self.value.to_source(origin),
        }
    }
}

impl ToSource for Stmt {
    fn to_source(&self, origin: &SourceTree) -> String {
        let span = self.span();
        if !span.is_synthetic() {
            return origin.text(span).to_string();
        }

        match self {
            Stmt::Expr(ExprStmt { expr, .. }) => expr.to_source(origin),
            Stmt::Assign(assign) => match &assign.value {
                Some(value) => format!(
                    "{} = {}",
                    assign.target.to_source(origin),
                    value.to_source(origin)
                ),
                None => assign.target.to_source(origin),
            },
            Stmt::Return(ret) => match &ret.value {
                Some(value) => format!("return {}", value.to_source(origin)),
                None => "return".to_string(),
            },
            // Compound statements are only ever reused, never synthesized
            Stmt::FunctionDef(_)
            | Stmt::ClassDef(_)
            | Stmt::If(_)
            | Stmt::Import(_)
            | Stmt::ImportFrom(_)
            | Stmt::Other { .. } => String::new(),
        }
    }
}

impl CmpOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
        }
    }
}

/// Builders for synthetic nodes
pub mod build {
    use super::super::ast::{Arg, Expr, ExprStmt, Span, Stmt};

    pub fn name(id: &str) -> Expr {
        Expr::Name {
            id: id.to_string(),
            span: Span::synthetic(),
        }
    }

    /// `a.b.c` from a dotted string
    pub fn dotted(path: &str) -> Expr {
        let mut segments = path.split('.');
        let mut expr = name(segments.next().unwrap_or_default());
        for segment in segments {
            expr = Expr::Attribute {
                value: Box::new(expr),
                attr: segment.to_string(),
                span: Span::synthetic(),
            };
        }
        expr
    }

    pub fn call(func: Expr, args: Vec<Expr>) -> Expr {
        Expr::Call {
            func: Box::new(func),
            args: args
                .into_iter()
                .map(|value| Arg {
                    keyword: None,
                    value,
                    span: Span::synthetic(),
                })
                .collect(),
            span: Span::synthetic(),
        }
    }

    pub fn await_expr(value: Expr) -> Expr {
        Expr::Await {
            value: Box::new(value),
            span: Span::synthetic(),
        }
    }

    pub fn expr_stmt(expr: Expr) -> Stmt {
        Stmt::Expr(ExprStmt {
            expr,
            span: Span::synthetic(),
        })
    }
}
