//! `cd` — no `CDPATH`, no `-L`/`-P`, no `cd -`: resolve a target
//! directory and request the interpreter adopt it as the new cwd via
//! `ctx.set_cwd`. Only cd-like commands get this callback, since a
//! `Command` otherwise has no way to mutate the interpreter's execution
//! context.

use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};
use crate::fs::FsError;

pub struct Cd;

#[async_trait]
impl Command for Cd {
    async fn run(&self, ctx: CommandContext) -> CommandResult {
        let target = match ctx.args.first() {
            Some(arg) if arg == "~" => ctx.env.get("HOME").cloned().unwrap_or_else(|| "/".to_string()),
            Some(arg) => arg.clone(),
            None => ctx.env.get("HOME").cloned().unwrap_or_else(|| "/".to_string()),
        };

        let resolved = ctx.fs.resolve_path(&ctx.cwd, &target);
        match ctx.fs.stat(&resolved).await {
            Ok(stat) if stat.is_directory => {
                if let Some(set_cwd) = &ctx.set_cwd {
                    set_cwd.set(resolved).await;
                }
                0
            }
            Ok(_) => {
                ctx.write_err(format!("cd: {target}: Not a directory\n")).await;
                1
            }
            Err(FsError::NotFound { .. }) => {
                ctx.write_err(format!("cd: {target}: No such file or directory\n")).await;
                1
            }
            Err(e) => {
                ctx.write_err(format!("cd: {target}: {e}\n")).await;
                1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CwdRequest;
    use crate::fs::{FileSystem, InMemoryFs, MkdirOptions};
    use crate::streams::{OutputCollector, Stderr, Stdin, Stdout};
    use std::collections::HashMap;
    use std::sync::Arc;

    #[tokio::test]
    async fn changes_to_existing_directory() {
        let fs = Arc::new(InMemoryFs::new());
        fs.mkdir("/tmp", &MkdirOptions { recursive: true }).await.unwrap();
        let set_cwd = CwdRequest::new();
        let ctx = CommandContext {
            args: vec!["/tmp".to_string()],
            env: HashMap::new(),
            cwd: "/".to_string(),
            stdin: Stdin::empty(),
            stdout: Stdout::collector(OutputCollector::new(), false),
            stderr: Stderr::null(),
            fs,
            exec: None,
            set_cwd: Some(set_cwd.clone()),
        };
        assert_eq!(Cd.run(ctx).await, 0);
        assert_eq!(set_cwd.take().await, Some("/tmp".to_string()));
    }

    #[tokio::test]
    async fn missing_directory_fails_without_mutating_cwd() {
        let set_cwd = CwdRequest::new();
        let err_collector = OutputCollector::new();
        let ctx = CommandContext {
            args: vec!["/nope".to_string()],
            env: HashMap::new(),
            cwd: "/".to_string(),
            stdin: Stdin::empty(),
            stdout: Stdout::collector(OutputCollector::new(), false),
            stderr: Stderr::collector(err_collector.clone(), false),
            fs: Arc::new(InMemoryFs::new()),
            exec: None,
            set_cwd: Some(set_cwd.clone()),
        };
        assert_eq!(Cd.run(ctx).await, 1);
        assert_eq!(set_cwd.take().await, None);
    }
}
