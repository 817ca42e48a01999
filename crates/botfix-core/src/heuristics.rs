//! Best-effort guesses the analyzer relies on.
//!
//! None of these have semantic grounding; each is a small named policy with
//! a documented fallback so it can be swapped for real resolution later.

use crate::classify::EnclosingContext;
use crate::names::DottedName;
use crate::syntax::ast::{Expr, FunctionDef, ParamKind, Stmt};
use crate::BotfixConfig;

/// Conventional bot variable names, always accepted as receivers
pub const CONVENTIONAL_BOT_NAMES: &[&str] = &["bot", "client"];

/// Constructors whose result is a bot instance
const BOT_CONSTRUCTORS: &[&str] = &[
    "Bot",
    "AutoShardedBot",
    "Client",
    "AutoShardedClient",
    "InteractionBot",
];

/// Parameter name used when the positional guess finds nothing
pub const FALLBACK_MESSAGE_PARAMETER: &str = "message";

/// Variable names believed to hold the bot instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotVariables {
    names: Vec<String>,
    /// Accept any receiver; used for snippets with nothing to go on
    permissive: bool,
}

impl BotVariables {
    /// Candidates in priority order: configured hint, variables assigned
    /// from a bot constructor, then the conventional names.
    pub fn discover<'a, I>(config: &BotfixConfig, stmts: I) -> Self
    where
        I: IntoIterator<Item = &'a Stmt>,
    {
        Self::collect(config, stmts).0
    }

    /// Like [`BotVariables::discover`], but accepts any receiver when neither
    /// a hint nor a bot assignment was found. Used for standalone snippets.
    pub fn discover_for_snippet<'a, I>(config: &BotfixConfig, stmts: I) -> Self
    where
        I: IntoIterator<Item = &'a Stmt>,
    {
        let (mut variables, informed) = Self::collect(config, stmts);
        variables.permissive = !informed;
        variables
    }

    fn collect<'a, I>(config: &BotfixConfig, stmts: I) -> (Self, bool)
    where
        I: IntoIterator<Item = &'a Stmt>,
    {
        let mut names: Vec<String> = Vec::new();
        if let Some(hint) = config.bot_variable.as_deref().filter(|h| !h.is_empty()) {
            names.push(hint.to_string());
        }
        for stmt in stmts {
            if let Some(name) = bot_assignment_target(stmt, config) {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }

        let informed = !names.is_empty();
        for conventional in CONVENTIONAL_BOT_NAMES {
            if !names.iter().any(|n| n == conventional) {
                names.push(conventional.to_string());
            }
        }

        (
            Self {
                names,
                permissive: false,
            },
            informed,
        )
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_permissive(&self) -> bool {
        self.permissive
    }

    /// Whether a decorator or call is made on one of the bot variables
    pub fn accepts(&self, name: &DottedName) -> bool {
        self.permissive || self.names.iter().any(|n| n == name.first_segment())
    }

    /// Dotted names of the methods that start the bot directly
    pub fn run_methods(&self) -> Vec<String> {
        self.names
            .iter()
            .flat_map(|name| [format!("{name}.run"), format!("{name}.start")])
            .collect()
    }
}

/// `bot = commands.Bot(...)` style assignment target
fn bot_assignment_target<'a>(stmt: &'a Stmt, config: &BotfixConfig) -> Option<&'a str> {
    let Stmt::Assign(assign) = stmt else {
        return None;
    };
    let target = assign.target.as_name()?;
    let Some(Expr::Call { func, .. }) = &assign.value else {
        return None;
    };
    let constructor = DottedName::resolve(func)?;

    let is_bot = BOT_CONSTRUCTORS.contains(&constructor.last_segment())
        || config
            .bot_subclass
            .as_deref()
            .is_some_and(|sub| constructor == sub || constructor.last_segment() == sub);
    is_bot.then_some(target)
}

/// Receiver for the dispatch fix: text before the first `.` of the decorator
/// that made the declaration an event.
pub fn bot_variable_from_decorator(decorator_name: &DottedName) -> &str {
    decorator_name.first_segment()
}

/// Name of the parameter carrying the message.
///
/// Second positional parameter for class members (the first is the
/// receiver), first otherwise. Falls back to [`FALLBACK_MESSAGE_PARAMETER`].
pub fn message_parameter(func: &FunctionDef, context: EnclosingContext) -> String {
    let position = match context {
        EnclosingContext::Class => 1,
        EnclosingContext::Bare => 0,
    };
    func.params
        .iter()
        .filter(|p| p.kind == ParamKind::Positional)
        .nth(position)
        .and_then(|p| p.name.clone())
        .unwrap_or_else(|| FALLBACK_MESSAGE_PARAMETER.to_string())
}

/// Classes that group listeners and commands
pub fn is_cog_base(base: &Expr) -> bool {
    DottedName::resolve(base).is_some_and(|name| name.last_segment().ends_with("Cog"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_source;

    fn first_function(source: &str) -> FunctionDef {
        let tree = parse_source(source).unwrap();
        match &tree.module().body[0] {
            Stmt::FunctionDef(func) => func.clone(),
            other => panic!("Expected FunctionDef, got {:?}", other),
        }
    }

    #[test]
    fn test_discover_from_assignment() {
        let tree = parse_source("import nextcord\nmy_bot = commands.Bot(command_prefix=\"!\")\n").unwrap();
        let bots = BotVariables::discover(&BotfixConfig::default(), &tree.module().body);

        assert_eq!(bots.names(), &["my_bot", "bot", "client"]);
        assert!(bots.accepts(&DottedName::new("my_bot.event")));
        assert!(!bots.accepts(&DottedName::new("other.event")));
    }

    #[test]
    fn test_discover_with_subclass_and_hint() {
        let tree = parse_source("helper = MyBot()\n").unwrap();
        let config = BotfixConfig::default()
            .with_bot_variable("app")
            .with_bot_subclass("MyBot");
        let bots = BotVariables::discover(&config, &tree.module().body);

        assert_eq!(bots.names(), &["app", "helper", "bot", "client"]);
        assert!(bots.run_methods().contains(&"helper.start".to_string()));
    }

    #[test]
    fn test_permissive_only_without_information() {
        let tree = parse_source("x = 1\n").unwrap();
        let bots = BotVariables::discover_for_snippet(&BotfixConfig::default(), &tree.module().body);
        assert!(bots.accepts(&DottedName::new("anything.event")));

        let config = BotfixConfig::default().with_bot_variable("app");
        let bots = BotVariables::discover_for_snippet(&config, &tree.module().body);
        assert!(!bots.accepts(&DottedName::new("anything.event")));
    }

    #[test]
    fn test_message_parameter_positions() {
        let bare = first_function("async def on_message(msg):\n    pass\n");
        assert_eq!(message_parameter(&bare, EnclosingContext::Bare), "msg");

        let method = first_function("async def on_message(self, msg):\n    pass\n");
        assert_eq!(message_parameter(&method, EnclosingContext::Class), "msg");

        let empty = first_function("async def on_message():\n    pass\n");
        assert_eq!(message_parameter(&empty, EnclosingContext::Bare), "message");
    }

    #[test]
    fn test_bot_variable_from_decorator() {
        assert_eq!(bot_variable_from_decorator(&DottedName::new("client.event")), "client");
    }
}
