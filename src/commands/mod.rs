//! Command contract: the host-supplied coroutine interface the
//! interpreter dispatches simple commands against, plus a small demo
//! registry (`echo`, `cat`, `pwd`, `cd`, `true`/`false`, `test`, `grep`)
//! built against the streaming capability set in [`crate::streams`]
//! instead of pre-read strings.

mod cat;
mod cd;
mod echo;
mod grep;
mod pwd;
mod registry;
mod test_cmd;
mod true_false;

pub use registry::CommandRegistry;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::fs::FileSystem;
use crate::streams::{Stderr, Stdin, Stdout};

/// A command's exit code: `0` success, `1` generic failure, `2` usage
/// error, `127` command-not-found (assigned by the interpreter, not the
/// command itself).
pub type CommandResult = i32;

/// Callback a command can use to invoke a peer command by name (e.g.
/// `find -exec`). Optional — most commands never receive one wired up.
pub type ExecCallback =
    Arc<dyn Fn(String, Vec<String>) -> std::pin::Pin<Box<dyn std::future::Future<Output = (Vec<u8>, Vec<u8>, i32)> + Send>> + Send + Sync>;

/// Callback only `cd`-like commands receive: calling it requests that the
/// interpreter adopt a new working directory once this command returns.
/// Implemented as a shared cell rather than direct mutation because the
/// command runs behind `dyn Command` with no access to the interpreter's
/// execution context.
#[derive(Clone, Default)]
pub struct CwdRequest(Arc<tokio::sync::Mutex<Option<String>>>);

impl CwdRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, path: String) {
        *self.0.lock().await = Some(path);
    }

    pub async fn take(&self) -> Option<String> {
        self.0.lock().await.take()
    }
}

/// Everything a command function needs. Owned (no borrowed lifetime) so
/// it can be moved into a `tokio::spawn`ed pipeline-stage task.
pub struct CommandContext {
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub cwd: String,
    pub stdin: Stdin,
    pub stdout: Stdout,
    pub stderr: Stderr,
    pub fs: Arc<dyn FileSystem>,
    pub exec: Option<ExecCallback>,
    pub set_cwd: Option<CwdRequest>,
}

impl CommandContext {
    pub async fn write_out(&self, text: impl AsRef<str>) {
        self.stdout.write_str(text.as_ref()).await;
    }

    pub async fn write_err(&self, text: impl AsRef<str>) {
        self.stderr.write_str(text.as_ref()).await;
    }
}

/// A host-registered command: `command(ctx) -> exit_code`.
#[async_trait]
pub trait Command: Send + Sync {
    async fn run(&self, ctx: CommandContext) -> CommandResult;
}

pub use cat::Cat;
pub use cd::Cd;
pub use echo::Echo;
pub use grep::Grep;
pub use pwd::Pwd;
pub use test_cmd::Test;
pub use true_false::{False, True};
