use serde::Serialize;

use crate::syntax::{Fragment, NodeRef};

/// A finding on one declaration with its ready-to-apply repair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic<'a> {
    /// Identifier of the rule that produced this diagnostic
    pub rule: &'static str,
    pub title: String,
    pub explanation: String,
    /// The offending node as it appears in the source
    pub original: NodeRef<'a>,
    /// Replacement for exactly `original.span`
    pub repaired: Fragment,
}

impl<'a> Diagnostic<'a> {
    pub fn new(
        rule: &'static str,
        title: impl Into<String>,
        explanation: impl Into<String>,
        original: NodeRef<'a>,
        repaired: Fragment,
    ) -> Self {
        debug_assert_eq!(original.span, repaired.span);
        Self {
            rule,
            title: title.into(),
            explanation: explanation.into(),
            original,
            repaired,
        }
    }
}
