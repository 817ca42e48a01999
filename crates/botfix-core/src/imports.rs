//! Import statements found in the effective top-level scope.

use serde::Serialize;

use crate::syntax::ast::{Import, ImportFrom, Span};

/// Packages that provide the decorator-driven bot API
const FRAMEWORK_PACKAGES: &[&str] = &["discord", "nextcord", "disnake", "interactions"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportedName {
    pub name: String,
    pub alias: Option<String>,
}

impl ImportedName {
    /// The name the import binds locally
    pub fn bound_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum ImportRecord {
    /// `import a.b as c`
    Module { names: Vec<ImportedName>, span: Span },
    /// `from a.b import c`; an empty `names` list is a star import
    From {
        module: String,
        names: Vec<ImportedName>,
        span: Span,
    },
}

impl ImportRecord {
    pub fn from_import(import: &Import) -> Self {
        ImportRecord::Module {
            names: import
                .names
                .iter()
                .map(|alias| ImportedName {
                    name: alias.name.clone(),
                    alias: alias.asname.clone(),
                })
                .collect(),
            span: import.span,
        }
    }

    pub fn from_import_from(import: &ImportFrom) -> Self {
        ImportRecord::From {
            module: import.module.clone(),
            names: import
                .names
                .iter()
                .map(|alias| ImportedName {
                    name: alias.name.clone(),
                    alias: alias.asname.clone(),
                })
                .collect(),
            span: import.span,
        }
    }

    /// Top-level packages this statement pulls from
    pub fn packages(&self) -> Vec<&str> {
        match self {
            ImportRecord::Module { names, .. } => names
                .iter()
                .map(|n| root_package(&n.name))
                .collect(),
            ImportRecord::From { module, .. } => vec![root_package(module)],
        }
    }

    pub fn is_star(&self) -> bool {
        matches!(self, ImportRecord::From { names, .. } if names.is_empty())
    }
}

fn root_package(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}

/// First bot framework package imported, if any
pub fn detect_framework(imports: &[ImportRecord]) -> Option<&str> {
    imports
        .iter()
        .flat_map(|record| record.packages())
        .find(|package| FRAMEWORK_PACKAGES.contains(package))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{parse_source, Stmt};

    fn records(source: &str) -> Vec<ImportRecord> {
        let tree = parse_source(source).unwrap();
        tree.module()
            .body
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::Import(import) => Some(ImportRecord::from_import(import)),
                Stmt::ImportFrom(import) => Some(ImportRecord::from_import_from(import)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_module_and_from_imports() {
        let imports = records("import asyncio\nfrom nextcord.ext import commands, tasks as t\n");

        assert_eq!(imports.len(), 2);
        assert_eq!(imports[0].packages(), vec!["asyncio"]);
        let ImportRecord::From { module, names, .. } = &imports[1] else {
            panic!("Expected from-import");
        };
        assert_eq!(module, "nextcord.ext");
        assert_eq!(names[1].bound_name(), "t");
        assert_eq!(detect_framework(&imports), Some("nextcord"));
    }

    #[test]
    fn test_star_import_and_no_framework() {
        let imports = records("from os import *\nimport json\n");

        assert!(imports[0].is_star());
        assert_eq!(detect_framework(&imports), None);
    }
}
