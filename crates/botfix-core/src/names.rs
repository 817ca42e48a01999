//! Canonical dotted names for member-access chains.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::syntax::Expr;

/// One or more identifier segments joined by `.`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DottedName(String);

impl DottedName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Resolve a name, member-access or call chain into its dotted form.
    ///
    /// Calls contribute only their callee, so `a.b().c` resolves to `a.b.c`.
    /// Returns `None` for any other expression shape.
    pub fn resolve(expr: &Expr) -> Option<Self> {
        let mut segments = Vec::new();
        collect_segments(expr, &mut segments)?;
        Some(Self(segments.join(".")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    pub fn segment_count(&self) -> usize {
        self.segments().count()
    }

    /// Text before the first `.`
    pub fn first_segment(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }

    /// Text after the last `.`
    pub fn last_segment(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    pub fn ends_with(&self, suffix: &str) -> bool {
        self.0.ends_with(suffix)
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

fn collect_segments(expr: &Expr, segments: &mut Vec<String>) -> Option<()> {
    match expr {
        Expr::Name { id, .. } => {
            segments.push(id.clone());
            Some(())
        }
        Expr::Attribute { value, attr, .. } => {
            collect_segments(value, segments)?;
            segments.push(attr.clone());
            Some(())
        }
        Expr::Call { func, .. } => collect_segments(func, segments),
        Expr::Await { .. }
        | Expr::Compare { .. }
        | Expr::Str { .. }
        | Expr::Other { .. } => None,
    }
}

impl fmt::Display for DottedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for DottedName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for DottedName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
