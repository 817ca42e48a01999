use std::path::Path;

use thiserror::Error;
use tree_sitter::Node;

use super::ast::{
    Arg, Assign, Block, ClassDef, CmpOp, Decorator, ElifClause, Expr, ExprStmt, FunctionDef, If,
    Import, ImportAlias, ImportFrom, Module, Param, ParamKind, Return, Span, Stmt,
};
use super::SourceTree;

/// Failures coming out of the syntax-tree collaborator
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to set Python language: {0}")]
    Language(String),

    #[error("Parser produced no tree")]
    NoTree,

    #[error("Syntax error at line {line}, column {column}: `{snippet}`")]
    Syntax {
        line: usize,
        column: usize,
        snippet: String,
    },

    #[error("Malformed `{kind}` at line {line}: missing {field}")]
    Malformed {
        kind: String,
        field: String,
        line: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Trait for anything able to produce a [`SourceTree`]
pub trait SyntaxParser: Send {
    /// Parse source code into a formatting-preserving tree
    fn parse(&mut self, source: &str) -> Result<SourceTree, ParseError>;

    /// Parse a file
    fn parse_file(&mut self, path: &Path) -> Result<SourceTree, ParseError> {
        let source = std::fs::read_to_string(path)?;
        self.parse(&source)
    }

    /// Get parser name for debugging
    fn name(&self) -> &'static str;
}

/// Create a parser for the given language name
pub fn create_parser(language: &str) -> anyhow::Result<Box<dyn SyntaxParser>> {
    match language {
        "python" | "py" => Ok(Box::new(PythonParser::new()?)),
        _ => anyhow::bail!("Unknown parser type: {}", language),
    }
}

/// Python parser backed by tree-sitter-python
pub struct PythonParser {
    parser: tree_sitter::Parser,
}

impl PythonParser {
    pub fn new() -> Result<Self, ParseError> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| ParseError::Language(e.to_string()))?;

        Ok(Self { parser })
    }
}

impl SyntaxParser for PythonParser {
    fn parse(&mut self, source: &str) -> Result<SourceTree, ParseError> {
        let tree = self.parser.parse(source, None).ok_or(ParseError::NoTree)?;
        let root = tree.root_node();

        if root.has_error() {
            return Err(first_error(root, source));
        }

        let module = NodeConverter { source }.convert_module(root)?;
        Ok(SourceTree::new(source.to_string(), module))
    }

    fn name(&self) -> &'static str {
        "python"
    }
}

/// Parse a single source text with a fresh parser
pub fn parse_source(source: &str) -> Result<SourceTree, ParseError> {
    PythonParser::new()?.parse(source)
}

fn first_error(root: Node, source: &str) -> ParseError {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let position = node.start_position();
            let snippet: String = source[node.byte_range()].chars().take(40).collect();
            return ParseError::Syntax {
                line: position.row + 1,
                column: position.column + 1,
                snippet,
            };
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        // Reverse so the leftmost error is reported first
        stack.extend(children.into_iter().rev());
    }

    let position = root.start_position();
    ParseError::Syntax {
        line: position.row + 1,
        column: position.column + 1,
        snippet: String::new(),
    }
}

fn span_of(node: Node) -> Span {
    Span::new(node.start_byte(), node.end_byte())
}

fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    let children = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect();
    children
}

fn children_by_field<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    let children = node.children_by_field_name(field, &mut cursor).collect();
    children
}

struct NodeConverter<'s> {
    source: &'s str,
}

impl<'s> NodeConverter<'s> {
    fn text(&self, node: Node) -> &'s str {
        &self.source[node.byte_range()]
    }

    fn field<'t>(&self, node: Node<'t>, field: &str) -> Result<Node<'t>, ParseError> {
        node.child_by_field_name(field)
            .ok_or_else(|| ParseError::Malformed {
                kind: node.kind().to_string(),
                field: field.to_string(),
                line: node.start_position().row + 1,
            })
    }

    fn convert_module(&self, node: Node) -> Result<Module, ParseError> {
        Ok(Module {
            body: self.convert_statements(node)?,
            span: span_of(node),
        })
    }

    fn convert_statements(&self, node: Node) -> Result<Vec<Stmt>, ParseError> {
        named_children(node)
            .into_iter()
            .map(|child| self.convert_statement(child))
            .collect()
    }

    fn convert_block(&self, node: Node) -> Result<Block, ParseError> {
        let stmts = self.convert_statements(node)?;
        // Trailing comments belong to the tree-sitter block; keep the span tight
        let span = match (stmts.first(), stmts.last()) {
            (Some(first), Some(last)) => Span::new(first.span().start, last.span().end),
            _ => span_of(node),
        };
        Ok(Block { stmts, span })
    }

    fn convert_statement(&self, node: Node) -> Result<Stmt, ParseError> {
        match node.kind() {
            "function_definition" => {
                let start = node.start_byte();
                Ok(Stmt::FunctionDef(self.convert_function(node, Vec::new(), start)?))
            }

            "class_definition" => {
                let start = node.start_byte();
                Ok(Stmt::ClassDef(self.convert_class(node, Vec::new(), start)?))
            }

            "decorated_definition" => {
                let mut decorators = Vec::new();
                for child in named_children(node) {
                    if child.kind() == "decorator" {
                        decorators.push(self.convert_decorator(child)?);
                    }
                }

                let definition = self.field(node, "definition")?;
                match definition.kind() {
                    "function_definition" => Ok(Stmt::FunctionDef(self.convert_function(
                        definition,
                        decorators,
                        node.start_byte(),
                    )?)),
                    "class_definition" => Ok(Stmt::ClassDef(self.convert_class(
                        definition,
                        decorators,
                        node.start_byte(),
                    )?)),
                    other => Ok(Stmt::Other {
                        kind: other.to_string(),
                        span: span_of(node),
                    }),
                }
            }

            "if_statement" => Ok(Stmt::If(self.convert_if(node)?)),

            "expression_statement" => self.convert_expression_statement(node),

            "return_statement" => {
                let value = match named_children(node).into_iter().next() {
                    Some(value) => Some(self.convert_expression(value)?),
                    None => None,
                };
                Ok(Stmt::Return(Return {
                    value,
                    span: span_of(node),
                }))
            }

            "import_statement" => Ok(Stmt::Import(Import {
                names: self.convert_import_names(node)?,
                span: span_of(node),
            })),

            "import_from_statement" => {
                let module = self.text(self.field(node, "module_name")?).to_string();
                Ok(Stmt::ImportFrom(ImportFrom {
                    module,
                    names: self.convert_import_names(node)?,
                    span: span_of(node),
                }))
            }

            other => Ok(Stmt::Other {
                kind: other.to_string(),
                span: span_of(node),
            }),
        }
    }

    fn convert_function(
        &self,
        node: Node,
        decorators: Vec<Decorator>,
        start: usize,
    ) -> Result<FunctionDef, ParseError> {
        let name = self.text(self.field(node, "name")?).to_string();
        let is_async = {
            let mut cursor = node.walk();
            let first = node.children(&mut cursor).next();
            first.map(|c| c.kind() == "async").unwrap_or(false)
        };
        let params = self.convert_parameters(self.field(node, "parameters")?)?;
        let body = self.convert_block(self.field(node, "body")?)?;
        let span = Span::new(start, body.span.end.max(node.start_byte()));

        Ok(FunctionDef {
            name,
            is_async,
            decorators,
            params,
            body,
            span,
        })
    }

    fn convert_class(
        &self,
        node: Node,
        decorators: Vec<Decorator>,
        start: usize,
    ) -> Result<ClassDef, ParseError> {
        let name = self.text(self.field(node, "name")?).to_string();
        let bases = match node.child_by_field_name("superclasses") {
            Some(list) => self.convert_arguments(list)?,
            None => Vec::new(),
        };
        let body = self.convert_block(self.field(node, "body")?)?;
        let span = Span::new(start, body.span.end.max(node.start_byte()));

        Ok(ClassDef {
            name,
            bases,
            decorators,
            body,
            span,
        })
    }

    fn convert_decorator(&self, node: Node) -> Result<Decorator, ParseError> {
        let expr_node = named_children(node)
            .into_iter()
            .next()
            .ok_or_else(|| ParseError::Malformed {
                kind: "decorator".to_string(),
                field: "expression".to_string(),
                line: node.start_position().row + 1,
            })?;
        let expr = self.convert_expression(expr_node)?;
        // The decorator node swallows its trailing newline; stop at the expression
        let span = Span::new(node.start_byte(), expr_node.end_byte());
        Ok(Decorator { expr, span })
    }

    fn convert_parameters(&self, node: Node) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();
        for child in named_children(node) {
            let (name, kind) = match child.kind() {
                "identifier" => (Some(self.text(child).to_string()), ParamKind::Positional),
                "typed_parameter" => match named_children(child).into_iter().next() {
                    Some(inner) if inner.kind() == "list_splat_pattern" => {
                        (self.splat_name(inner), ParamKind::VarPositional)
                    }
                    Some(inner) if inner.kind() == "dictionary_splat_pattern" => {
                        (self.splat_name(inner), ParamKind::VarKeyword)
                    }
                    Some(inner) => (Some(self.text(inner).to_string()), ParamKind::Positional),
                    None => (None, ParamKind::Positional),
                },
                "default_parameter" | "typed_default_parameter" => {
                    let name = child
                        .child_by_field_name("name")
                        .filter(|n| n.kind() == "identifier")
                        .map(|n| self.text(n).to_string());
                    (name, ParamKind::Positional)
                }
                "list_splat_pattern" => (self.splat_name(child), ParamKind::VarPositional),
                "dictionary_splat_pattern" => (self.splat_name(child), ParamKind::VarKeyword),
                "keyword_separator" | "positional_separator" => (None, ParamKind::Separator),
                _ => (None, ParamKind::Positional),
            };
            params.push(Param {
                name,
                kind,
                span: span_of(child),
            });
        }
        Ok(params)
    }

    fn splat_name(&self, node: Node) -> Option<String> {
        named_children(node)
            .into_iter()
            .find(|n| n.kind() == "identifier")
            .map(|n| self.text(n).to_string())
    }

    fn convert_if(&self, node: Node) -> Result<If, ParseError> {
        let test = self.convert_expression(self.field(node, "condition")?)?;
        let body = self.convert_block(self.field(node, "consequence")?)?;
        let mut end = body.span.end;

        let mut elifs = Vec::new();
        let mut orelse = None;
        for alternative in children_by_field(node, "alternative") {
            match alternative.kind() {
                "elif_clause" => {
                    let test = self.convert_expression(self.field(alternative, "condition")?)?;
                    let body = self.convert_block(self.field(alternative, "consequence")?)?;
                    end = end.max(body.span.end);
                    elifs.push(ElifClause {
                        test,
                        span: Span::new(alternative.start_byte(), body.span.end),
                        body,
                    });
                }
                "else_clause" => {
                    let body = self.convert_block(self.field(alternative, "body")?)?;
                    end = end.max(body.span.end);
                    orelse = Some(body);
                }
                _ => {}
            }
        }

        Ok(If {
            test,
            body,
            elifs,
            orelse,
            span: Span::new(node.start_byte(), end),
        })
    }

    fn convert_expression_statement(&self, node: Node) -> Result<Stmt, ParseError> {
        let children = named_children(node);
        match children.as_slice() {
            [single] if single.kind() == "assignment" => {
                let target = self.convert_expression(self.field(*single, "left")?)?;
                let value = match single.child_by_field_name("right") {
                    Some(right) => Some(self.convert_expression(right)?),
                    None => None,
                };
                Ok(Stmt::Assign(Assign {
                    target,
                    value,
                    span: span_of(node),
                }))
            }
            [single] => Ok(Stmt::Expr(ExprStmt {
                expr: self.convert_expression(*single)?,
                span: span_of(node),
            })),
            _ => Ok(Stmt::Other {
                kind: node.kind().to_string(),
                span: span_of(node),
            }),
        }
    }

    fn convert_import_names(&self, node: Node) -> Result<Vec<ImportAlias>, ParseError> {
        let mut names = Vec::new();
        for name in children_by_field(node, "name") {
            match name.kind() {
                "aliased_import" => names.push(ImportAlias {
                    name: self.text(self.field(name, "name")?).to_string(),
                    asname: Some(self.text(self.field(name, "alias")?).to_string()),
                }),
                _ => names.push(ImportAlias {
                    name: self.text(name).to_string(),
                    asname: None,
                }),
            }
        }
        Ok(names)
    }

    fn convert_arguments(&self, node: Node) -> Result<Vec<Arg>, ParseError> {
        if node.kind() != "argument_list" {
            // generator_expression passed as the sole argument
            return Ok(vec![Arg {
                keyword: None,
                value: self.convert_expression(node)?,
                span: span_of(node),
            }]);
        }

        let mut args = Vec::new();
        for child in named_children(node) {
            if child.kind() == "keyword_argument" {
                args.push(Arg {
                    keyword: Some(self.text(self.field(child, "name")?).to_string()),
                    value: self.convert_expression(self.field(child, "value")?)?,
                    span: span_of(child),
                });
            } else {
                args.push(Arg {
                    keyword: None,
                    value: self.convert_expression(child)?,
                    span: span_of(child),
                });
            }
        }
        Ok(args)
    }

    fn convert_expression(&self, node: Node) -> Result<Expr, ParseError> {
        match node.kind() {
            "identifier" => Ok(Expr::Name {
                id: self.text(node).to_string(),
                span: span_of(node),
            }),

            "attribute" => Ok(Expr::Attribute {
                value: Box::new(self.convert_expression(self.field(node, "object")?)?),
                attr: self.text(self.field(node, "attribute")?).to_string(),
                span: span_of(node),
            }),

            "call" => Ok(Expr::Call {
                func: Box::new(self.convert_expression(self.field(node, "function")?)?),
                args: self.convert_arguments(self.field(node, "arguments")?)?,
                span: span_of(node),
            }),

            "await" => {
                let inner = named_children(node)
                    .into_iter()
                    .next()
                    .ok_or_else(|| ParseError::Malformed {
                        kind: "await".to_string(),
                        field: "expression".to_string(),
                        line: node.start_position().row + 1,
                    })?;
                Ok(Expr::Await {
                    value: Box::new(self.convert_expression(inner)?),
                    span: span_of(node),
                })
            }

            "comparison_operator" => {
                let mut operands = Vec::new();
                let mut ops = Vec::new();
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    if child.is_named() {
                        if child.kind() != "comment" {
                            operands.push(child);
                        }
                    } else if let Some(op) = CmpOp::from_token(child.kind()) {
                        ops.push(op);
                    }
                }

                let mut operands = operands.into_iter();
                let left = match operands.next() {
                    Some(left) => self.convert_expression(left)?,
                    None => {
                        return Ok(Expr::Other {
                            kind: node.kind().to_string(),
                            span: span_of(node),
                        })
                    }
                };
                let comparators = operands
                    .map(|operand| self.convert_expression(operand))
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(Expr::Compare {
                    left: Box::new(left),
                    ops,
                    comparators,
                    span: span_of(node),
                })
            }

            "string" => Ok(Expr::Str {
                raw: self.text(node).to_string(),
                span: span_of(node),
            }),

            "parenthesized_expression" => match named_children(node).into_iter().next() {
                Some(inner) => self.convert_expression(inner),
                None => Ok(Expr::Other {
                    kind: node.kind().to_string(),
                    span: span_of(node),
                }),
            },

            other => Ok(Expr::Other {
                kind: other.to_string(),
                span: span_of(node),
            }),
        }
    }
}
