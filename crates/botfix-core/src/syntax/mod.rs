// Syntax layer: tree-sitter backed parsing into a span-carrying AST.
// The tree is never edited in place; see `edit` for producing replacements.

pub mod ast;
pub mod edit;
pub mod parser;
pub mod source_gen;

pub use ast::{Expr, FunctionDef, Module, Span, Stmt};
pub use edit::{Edit, FixOutcome, Fragment, NodeRef};
pub use parser::{create_parser, parse_source, ParseError, PythonParser, SyntaxParser};
pub use source_gen::ToSource;

/// Immutable, formatting-preserving parse of one source unit
#[derive(Debug, Clone)]
pub struct SourceTree {
    source: String,
    module: Module,
    line_starts: Vec<usize>,
}

impl SourceTree {
    pub fn new(source: String, module: Module) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            source,
            module,
            line_starts,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Original text of a node
    pub fn text(&self, span: Span) -> &str {
        self.source.get(span.start..span.end).unwrap_or("")
    }

    /// Borrowed view of the node at `span`
    pub fn node_ref(&self, span: Span) -> NodeRef<'_> {
        NodeRef {
            span,
            text: self.text(span),
        }
    }

    /// 1-based line and column of a byte offset
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next.saturating_sub(1),
        };
        let column = offset - self.line_starts[line];
        (line + 1, column + 1)
    }

    fn line_start(&self, offset: usize) -> usize {
        let (line, _) = self.line_col(offset);
        self.line_starts[line - 1]
    }

    /// Leading whitespace of the line containing `offset`
    pub fn line_indent(&self, offset: usize) -> &str {
        let start = self.line_start(offset);
        let line = &self.source[start..];
        let width = line
            .find(|c: char| c != ' ' && c != '\t')
            .unwrap_or(line.len());
        &line[..width]
    }

    /// Offset of the line break ending the line that contains `offset`, or
    /// the end of the source
    pub fn line_end(&self, offset: usize) -> usize {
        self.source[offset..]
            .find('\n')
            .map_or(self.source.len(), |at| offset + at)
    }

    /// True if `offset` is the first non-blank position on its line
    pub fn starts_line(&self, offset: usize) -> bool {
        let start = self.line_start(offset);
        self.source[start..offset]
            .chars()
            .all(|c| c == ' ' || c == '\t')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col_and_indent() {
        let tree = parse_source("async def f(m):\n    pass\n").unwrap();
        let pass_offset = tree.source().find("pass").unwrap();

        assert_eq!(tree.line_col(0), (1, 1));
        assert_eq!(tree.line_col(pass_offset), (2, 5));
        assert_eq!(tree.line_indent(pass_offset), "    ");
        assert_eq!(tree.line_end(pass_offset), pass_offset + 4);
        assert_eq!(tree.line_end(tree.source().len()), tree.source().len());
        assert!(tree.starts_line(pass_offset));
    }

    #[test]
    fn test_inline_body_does_not_start_line() {
        let tree = parse_source("async def f(m): pass\n").unwrap();
        let pass_offset = tree.source().find("pass").unwrap();

        assert!(!tree.starts_line(pass_offset));
        assert_eq!(tree.line_indent(pass_offset), "");
    }
}
