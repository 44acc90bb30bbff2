//! The command registry: maps a command name to a host-supplied
//! implementation. Keeps an `Arc<dyn Command>` map behind a struct rather
//! than a bare `HashMap` so a host can layer its own commands over (or
//! instead of) the demo set.

use std::collections::HashMap;
use std::sync::Arc;

use super::{Cat, Cd, Command, Echo, Grep, Pwd, Test, True, False};

/// A name → command-implementation map, consulted by the interpreter when
/// dispatching a simple command.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A small demo set, enough to exercise the interpreter end-to-end.
    /// A host is free to start from an empty registry instead.
    pub fn with_default_commands() -> Self {
        let mut reg = Self::new();
        reg.register("echo", Arc::new(Echo));
        reg.register("cat", Arc::new(Cat));
        reg.register("pwd", Arc::new(Pwd));
        reg.register("cd", Arc::new(Cd));
        reg.register("true", Arc::new(True));
        reg.register("false", Arc::new(False));
        reg.register("test", Arc::new(Test));
        reg.register("[", Arc::new(Test));
        reg.register("grep", Arc::new(Grep));
        reg
    }

    pub fn register(&mut self, name: impl Into<String>, command: Arc<dyn Command>) {
        self.commands.insert(name.into(), command);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_demo_commands() {
        let reg = CommandRegistry::with_default_commands();
        for name in ["echo", "cat", "pwd", "cd", "true", "false", "test", "grep"] {
            assert!(reg.contains(name), "missing {name}");
        }
        assert!(!reg.contains("sed"));
    }
}
