// Python syntax tree as seen by the analyzer.
// Every node remembers the byte range it was parsed from, so the original
// text (whitespace and comments included) can always be recovered.

use serde::{Deserialize, Serialize};

/// Byte range into the original source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Span of a node built by a rule rather than parsed
    pub fn synthetic() -> Self {
        Self {
            start: usize::MAX,
            end: usize::MAX,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.start == usize::MAX
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True if `other` lies entirely within this span
    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    FunctionDef(FunctionDef),
    ClassDef(ClassDef),
    If(If),
    Expr(ExprStmt),
    Assign(Assign),
    Return(Return),
    Import(Import),
    ImportFrom(ImportFrom),
    /// Any statement the analyzer has no use for
    Other { kind: String, span: Span },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::FunctionDef(f) => f.span,
            Stmt::ClassDef(c) => c.span,
            Stmt::If(i) => i.span,
            Stmt::Expr(e) => e.span,
            Stmt::Assign(a) => a.span,
            Stmt::Return(r) => r.span,
            Stmt::Import(i) => i.span,
            Stmt::ImportFrom(i) => i.span,
            Stmt::Other { span, .. } => *span,
        }
    }
}

/// A `def` or `async def`, together with its decorators
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub is_async: bool,
    pub decorators: Vec<Decorator>,
    pub params: Vec<Param>,
    pub body: Block,
    /// Covers the decorators as well as the definition
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub bases: Vec<Arg>,
    pub decorators: Vec<Decorator>,
    pub body: Block,
    pub span: Span,
}

/// `@expr`; the span includes the `@`
#[derive(Debug, Clone, PartialEq)]
pub struct Decorator {
    pub expr: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Positional,
    /// `*args`
    VarPositional,
    /// `**kwargs`
    VarKeyword,
    /// bare `*` or `/`
    Separator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Option<String>,
    pub kind: ParamKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub test: Expr,
    pub body: Block,
    pub elifs: Vec<ElifClause>,
    pub orelse: Option<Block>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElifClause {
    pub test: Expr,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprStmt {
    pub expr: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub target: Expr,
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Return {
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportAlias {
    pub name: String,
    pub asname: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub names: Vec<ImportAlias>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportFrom {
    /// Module path including any leading dots of a relative import
    pub module: String,
    /// Empty for `from x import *`
    pub names: Vec<ImportAlias>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

impl CmpOp {
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "==" => CmpOp::Eq,
            "!=" | "<>" => CmpOp::NotEq,
            "<" => CmpOp::Lt,
            "<=" => CmpOp::LtE,
            ">" => CmpOp::Gt,
            ">=" => CmpOp::GtE,
            "in" => CmpOp::In,
            "not in" => CmpOp::NotIn,
            "is" => CmpOp::Is,
            "is not" => CmpOp::IsNot,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub keyword: Option<String>,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Name {
        id: String,
        span: Span,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
        span: Span,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Arg>,
        span: Span,
    },
    Await {
        value: Box<Expr>,
        span: Span,
    },
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOp>,
        comparators: Vec<Expr>,
        span: Span,
    },
    /// String literal; `raw` is the source text including prefix and quotes
    Str {
        raw: String,
        span: Span,
    },
    Other {
        kind: String,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Name { span, .. }
            | Expr::Attribute { span, .. }
            | Expr::Call { span, .. }
            | Expr::Await { span, .. }
            | Expr::Compare { span, .. }
            | Expr::Str { span, .. }
            | Expr::Other { span, .. } => *span,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Expr::Name { id, .. } => Some(id),
            _ => None,
        }
    }

    /// The call behind an optional `await`
    pub fn as_call(&self) -> Option<(&Expr, &[Arg])> {
        match self {
            Expr::Call { func, args, .. } => Some((func, args)),
            Expr::Await { value, .. } => match value.as_ref() {
                Expr::Call { func, args, .. } => Some((func, args)),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_await(&self) -> bool {
        matches!(self, Expr::Await { .. })
    }

    /// Unquoted content of a plain string literal
    pub fn string_value(&self) -> Option<&str> {
        let Expr::Str { raw, .. } = self else {
            return None;
        };
        let body = raw.trim_start_matches(|c: char| c.is_ascii_alphabetic());
        for quote in ["\"\"\"", "'''", "\"", "'"] {
            if body.len() >= 2 * quote.len() && body.starts_with(quote) && body.ends_with(quote) {
                return Some(&body[quote.len()..body.len() - quote.len()]);
            }
        }
        None
    }
}
