// Non-destructive edits over a SourceTree.
// `with_changes` re-renders a single node with some of its pieces replaced
// and leaves every other byte of the node untouched.

use serde::Serialize;
use tracing::warn;

use super::ast::Span;
use super::SourceTree;

/// A change inside a node, expressed against original byte offsets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Replace { span: Span, text: String },
    Insert { at: usize, text: String },
}

impl Edit {
    pub fn replace(span: Span, text: impl Into<String>) -> Self {
        Edit::Replace {
            span,
            text: text.into(),
        }
    }

    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Edit::Insert {
            at,
            text: text.into(),
        }
    }

    fn range(&self) -> Span {
        match self {
            Edit::Replace { span, .. } => *span,
            Edit::Insert { at, .. } => Span::new(*at, *at),
        }
    }

    fn text(&self) -> &str {
        match self {
            Edit::Replace { text, .. } | Edit::Insert { text, .. } => text,
        }
    }
}

/// Borrowed view of an original node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeRef<'a> {
    pub span: Span,
    pub text: &'a str,
}

/// Replacement text for exactly one original node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fragment {
    /// Span of the node this fragment replaces
    pub span: Span,
    pub text: String,
}

/// Result of applying fragments to a whole source unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixOutcome {
    pub source: String,
    pub applied: usize,
    /// Fragments left out because they overlapped an earlier one
    pub skipped: Vec<Span>,
}

impl SourceTree {
    /// Render the node at `node` with `edits` applied.
    ///
    /// Edits must fall inside the node and must not overlap each other;
    /// offending edits are dropped with a warning.
    pub fn with_changes(&self, node: Span, mut edits: Vec<Edit>) -> Fragment {
        edits.sort_by_key(|edit| edit.range().start);

        let mut text = String::with_capacity(node.len());
        let mut cursor = node.start;
        for edit in &edits {
            let range = edit.range();
            if !node.contains(range) || range.start < cursor {
                warn!(?range, ?node, "Dropping edit outside node or overlapping a previous edit");
                continue;
            }
            text.push_str(self.text(Span::new(cursor, range.start)));
            text.push_str(edit.text());
            cursor = range.end;
        }
        text.push_str(self.text(Span::new(cursor, node.end)));

        Fragment { span: node, text }
    }

    /// Apply fragments to the full source. Fragments are applied in source
    /// order; one that overlaps an already applied fragment is skipped.
    pub fn apply_fixes<'f, I>(&self, fragments: I) -> FixOutcome
    where
        I: IntoIterator<Item = &'f Fragment>,
    {
        let mut ordered: Vec<&Fragment> = fragments.into_iter().collect();
        ordered.sort_by_key(|fragment| (fragment.span.start, fragment.span.end));

        let mut source = String::with_capacity(self.source().len());
        let mut cursor = 0;
        let mut applied = 0;
        let mut skipped = Vec::new();
        for fragment in ordered {
            if fragment.span.start < cursor || fragment.span.end > self.source().len() {
                skipped.push(fragment.span);
                continue;
            }
            source.push_str(self.text(Span::new(cursor, fragment.span.start)));
            source.push_str(&fragment.text);
            cursor = fragment.span.end;
            applied += 1;
        }
        source.push_str(self.text(Span::new(cursor, self.source().len())));

        if !skipped.is_empty() {
            warn!(count = skipped.len(), "Skipped overlapping fixes");
        }

        FixOutcome {
            source,
            applied,
            skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_source;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_with_changes_preserves_untouched_text() {
        let source = "@bot.event()  \nasync def on_ready():\n    pass\n";
        let tree = parse_source(source).unwrap();
        let call_start = source.find("bot").unwrap();
        let call_end = source.find(")").unwrap() + 1;

        let fragment = tree.with_changes(
            Span::new(0, call_end),
            vec![Edit::replace(Span::new(call_start, call_end), "bot.event")],
        );

        assert_eq!(fragment.text, "@bot.event");
        assert_eq!(fragment.span, Span::new(0, call_end));
    }

    #[test]
    fn test_insert_and_replace_together() {
        let source = "x = f(a)\n";
        let tree = parse_source(source).unwrap();

        let fragment = tree.with_changes(
            Span::new(0, 8),
            vec![
                Edit::insert(8, "  # done"),
                Edit::replace(Span::new(4, 5), "g"),
            ],
        );

        assert_eq!(fragment.text, "x = g(a)  # done");
    }

    #[test]
    fn test_apply_fixes_skips_overlaps() {
        let source = "abc = 1\n";
        let tree = parse_source(source).unwrap();
        let fragments = vec![
            Fragment {
                span: Span::new(0, 3),
                text: "xyz".to_string(),
            },
            Fragment {
                span: Span::new(1, 2),
                text: "Q".to_string(),
            },
        ];

        let outcome = tree.apply_fixes(&fragments);

        assert_eq!(outcome.source, "xyz = 1\n");
        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.skipped, vec![Span::new(1, 2)]);
    }
}
