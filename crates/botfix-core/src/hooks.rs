//! Attaching `before_loop` / `after_loop` hooks to their tasks.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::classify::{Declaration, Role};
use crate::convert::{Anomaly, AnomalyKind, ConversionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HookKind {
    Before,
    After,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookKind::Before => f.write_str("before_loop"),
            HookKind::After => f.write_str("after_loop"),
        }
    }
}

/// Where a task name is bound: module level, or a cog class attribute
type TaskKey = (Option<String>, String);

/// A hook on its way to the task it names
#[derive(Debug, Clone)]
pub struct HookBinding<'a> {
    pub task_identifier: String,
    pub kind: HookKind,
    pub hook: Declaration<'a>,
}

impl<'a> HookBinding<'a> {
    /// Gives the declaration back if it is not a hook with a target
    fn from_declaration(hook: Declaration<'a>) -> Result<Self, Declaration<'a>> {
        let kind = match hook.role {
            Role::BeforeHook => HookKind::Before,
            Role::AfterHook => HookKind::After,
            _ => return Err(hook),
        };
        match hook.hook_target.clone() {
            Some(task_identifier) => Ok(Self {
                task_identifier,
                kind,
                hook,
            }),
            None => Err(hook),
        }
    }

    fn key(&self) -> TaskKey {
        (self.hook.enclosing_class.clone(), self.task_identifier.clone())
    }
}

/// A loop task and the hooks bound to it
#[derive(Debug, Clone)]
pub struct Task<'a> {
    pub declaration: Declaration<'a>,
    pub before_hook: Option<Declaration<'a>>,
    pub after_hook: Option<Declaration<'a>>,
}

impl<'a> Task<'a> {
    pub fn new(declaration: Declaration<'a>) -> Self {
        Self {
            declaration,
            before_hook: None,
            after_hook: None,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.declaration.identifier
    }

    fn attach(&mut self, binding: HookBinding<'a>) -> Result<(), ConversionError> {
        let slot = match binding.kind {
            HookKind::Before => &mut self.before_hook,
            HookKind::After => &mut self.after_hook,
        };
        if let Some(existing) = slot {
            return Err(ConversionError::DuplicateHook {
                task: binding.task_identifier,
                kind: binding.kind,
                existing: existing.identifier.clone(),
                duplicate: binding.hook.identifier,
            });
        }
        *slot = Some(binding.hook);
        Ok(())
    }
}

/// Declarations grouped by role, with hooks bound to tasks
#[derive(Debug, Default)]
pub struct BoundDeclarations<'a> {
    /// Events and listeners, in discovery order
    pub events: Vec<Declaration<'a>>,
    pub commands: Vec<Declaration<'a>>,
    pub tasks: Vec<Task<'a>>,
    pub unattached_hooks: Vec<Declaration<'a>>,
    pub unclassified: Vec<Declaration<'a>>,
    pub anomalies: Vec<Anomaly>,
}

impl<'a> BoundDeclarations<'a> {
    pub fn task(&self, identifier: &str) -> Option<&Task<'a>> {
        self.tasks.iter().find(|t| t.identifier() == identifier)
    }
}

pub struct HookBinder;

impl HookBinder {
    /// Partition declarations by role and attach every hook to the task it
    /// names. Hooks naming no task are kept unattached.
    pub fn bind<'a, I>(declarations: I) -> Result<BoundDeclarations<'a>, ConversionError>
    where
        I: IntoIterator<Item = Declaration<'a>>,
    {
        let mut bound = BoundDeclarations::default();
        let mut tasks: Vec<Task<'a>> = Vec::new();
        // Latest definition of each name; a redefinition shadows the earlier one
        let mut by_key: IndexMap<TaskKey, usize> = IndexMap::new();
        let mut bindings = Vec::new();

        for declaration in declarations {
            match declaration.role {
                Role::Event | Role::Listener => bound.events.push(declaration),
                Role::Command => bound.commands.push(declaration),
                Role::Task => {
                    let key = (declaration.enclosing_class.clone(), declaration.identifier.clone());
                    if by_key.contains_key(&key) {
                        warn!(task = %declaration.identifier, "Task is defined more than once");
                        bound.anomalies.push(Anomaly::new(
                            AnomalyKind::DuplicateTask,
                            format!(
                                "Task '{}' is defined more than once{}; hooks bind to the last definition",
                                declaration.identifier,
                                scope_suffix(key.0.as_deref())
                            ),
                            None,
                        ));
                    }
                    by_key.insert(key, tasks.len());
                    tasks.push(Task::new(declaration));
                }
                Role::BeforeHook | Role::AfterHook => match HookBinding::from_declaration(declaration) {
                    Ok(binding) => bindings.push(binding),
                    Err(declaration) => bound.unattached_hooks.push(declaration),
                },
                Role::Unclassified => bound.unclassified.push(declaration),
            }
        }

        // Hooks may precede their task in the source, so bind after collecting
        for binding in bindings {
            match by_key.get(&binding.key()).and_then(|&index| tasks.get_mut(index)) {
                Some(task) => {
                    debug!(
                        task = %binding.task_identifier,
                        hook = %binding.hook.identifier,
                        kind = %binding.kind,
                        "Bound hook to task"
                    );
                    task.attach(binding)?;
                }
                None => {
                    warn!(
                        hook = %binding.hook.identifier,
                        task = %binding.task_identifier,
                        "Hook refers to an unknown task"
                    );
                    bound.anomalies.push(Anomaly::new(
                        AnomalyKind::UnmatchedHook,
                        format!(
                            "'{}' is a {} hook for '{}', which is not a known task{}",
                            binding.hook.identifier,
                            binding.kind,
                            binding.task_identifier,
                            scope_suffix(binding.hook.enclosing_class.as_deref())
                        ),
                        None,
                    ));
                    bound.unattached_hooks.push(binding.hook);
                }
            }
        }

        bound.tasks = tasks;
        Ok(bound)
    }
}

fn scope_suffix(class: Option<&str>) -> String {
    match class {
        Some(name) => format!(" in class '{name}'"),
        None => String::new(),
    }
}
