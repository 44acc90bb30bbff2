//! The execution façade: the single entry point a host calls with shell
//! source and gets back an aggregate result, plus the separately-callable
//! lex/parse/run steps underneath it. No shell-option flags
//! (`-e`/`--errexit`) and no subprocess packaging — both out of scope.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::ast::{AstNode, Token};
use crate::errors::{LexError, ParseError};
use crate::fs::{FileSystem, InMemoryFs};
use crate::interpreter::{Engine, ExecutionContext, ExecutionLimits, InterpreterError};
use crate::lexer::lex;
use crate::parser::{parse, parse_source};
use crate::streams::{OutputCollector, Stderr, Stdin, Stdout};

use crate::commands::CommandRegistry;

/// Everything a lex/parse error or a blown execution limit can surface
/// as. The only error variants [`Shell::exec`] ever returns in its
/// default (throwing) mode — every other failure (unknown command, bad
/// redirect, non-zero command exit) is reported on stderr and folded
/// into `exit_code` instead.
#[derive(Error, Debug, Clone)]
pub enum ShellError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Interpreter(#[from] InterpreterError),
}

/// Configuration fixed for the lifetime of a [`Shell`]: the filesystem,
/// command registry, base environment/cwd, and execution limits.
pub struct ShellOptions {
    pub fs: Arc<dyn FileSystem>,
    pub commands: CommandRegistry,
    pub env: HashMap<String, String>,
    pub cwd: String,
    pub limits: ExecutionLimits,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            fs: Arc::new(InMemoryFs::new()),
            commands: CommandRegistry::with_default_commands(),
            env: HashMap::new(),
            cwd: "/".to_string(),
            limits: ExecutionLimits::default(),
        }
    }
}

/// Per-call overrides layered onto a [`Shell`]'s base environment/cwd for
/// one `exec`.
#[derive(Default, Clone)]
pub struct ExecOptions {
    /// Replaces the shell's base cwd for this call only.
    pub cwd: Option<String>,
    /// Merged over (not replacing) the shell's base environment.
    pub env: HashMap<String, String>,
    /// Discards captured stdout from the returned result (the run still
    /// executes and its exit code is still reported).
    pub quiet: bool,
    /// Flattens lex/parse errors and blown execution limits into an
    /// `ExecResult` (exit code 2 for the former, 1 for the latter)
    /// instead of returning `Err`.
    pub no_throw: bool,
}

/// The aggregate result of one run: captured stdout/stderr bytes and the
/// final exit code.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

impl ExecResult {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A value spliced into a host-assembled script by [`Shell::interpolate`]:
/// `Value` is escaped before splicing, `Raw` is spliced verbatim.
pub enum Interpolated {
    Value(String),
    Raw(String),
}

/// Shell metacharacters escaped for a host-interpolated `Value`.
const METACHARACTERS: &[char] =
    &['|', '&', ';', '<', '>', '(', ')', '$', '`', '\\', '"', '\'', ' ', '\t', '\n', '*', '?', '[', ']', '#', '~', '=', '%'];

fn escape_metacharacters(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if METACHARACTERS.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// The host entry point: an in-process interpreter bound to one
/// filesystem, command registry, and base environment/cwd.
pub struct Shell {
    fs: Arc<dyn FileSystem>,
    commands: Arc<CommandRegistry>,
    env: HashMap<String, String>,
    cwd: String,
    limits: ExecutionLimits,
}

impl Default for Shell {
    fn default() -> Self {
        Self::with_options(ShellOptions::default())
    }
}

impl Shell {
    /// A shell over an in-memory filesystem with the demo command set
    /// registered — the quickest way to get a runnable instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// An alias for [`Shell::new`] naming what it actually sets up, for
    /// call sites that want to be explicit about it.
    pub fn with_default_commands() -> Self {
        Self::default()
    }

    pub fn with_options(opts: ShellOptions) -> Self {
        Self {
            fs: opts.fs,
            commands: Arc::new(opts.commands),
            env: opts.env,
            cwd: opts.cwd,
            limits: opts.limits,
        }
    }

    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    /// Splices host values into a script template the way a tagged
    /// template literal would: `parts.len()` must be `values.len() + 1`.
    /// `Interpolated::Value` is escaped; `Interpolated::Raw` is spliced
    /// as-is.
    pub fn interpolate(parts: &[&str], values: &[Interpolated]) -> String {
        let mut out = String::new();
        for (i, part) in parts.iter().enumerate() {
            out.push_str(part);
            if let Some(value) = values.get(i) {
                match value {
                    Interpolated::Value(v) => out.push_str(&escape_metacharacters(v)),
                    Interpolated::Raw(v) => out.push_str(v),
                }
            }
        }
        out
    }

    /// Lexes `source` without parsing or executing it.
    pub fn lex(&self, source: &str) -> Result<Vec<Token>, LexError> {
        lex(source)
    }

    /// Lexes and parses `source` without executing it.
    pub fn parse(&self, source: &str) -> Result<AstNode, ParseError> {
        parse_source(source)
    }

    /// Lexes, parses, and executes `source` with no per-call overrides.
    pub async fn exec(&self, source: &str) -> Result<ExecResult, ShellError> {
        self.exec_with(source, ExecOptions::default()).await
    }

    /// Lexes, parses, and executes `source`, merging `opts` over this
    /// shell's base environment/cwd.
    pub async fn exec_with(&self, source: &str, opts: ExecOptions) -> Result<ExecResult, ShellError> {
        let ast = match parse(match lex(source) {
            Ok(tokens) => tokens,
            Err(e) => return self.flatten_lex_error(e, &opts),
        }) {
            Ok(ast) => ast,
            Err(e) => return self.flatten_parse_error(e, &opts),
        };
        self.run(&ast, opts).await
    }

    /// Executes an already-parsed AST — the staged counterpart to
    /// [`Shell::exec_with`] for hosts that lexed/parsed separately (e.g.
    /// to inspect or cache the tree).
    pub async fn run(&self, ast: &AstNode, opts: ExecOptions) -> Result<ExecResult, ShellError> {
        let mut env = self.env.clone();
        for (k, v) in &opts.env {
            env.insert(k.clone(), v.clone());
        }
        let cwd = opts.cwd.clone().unwrap_or_else(|| self.cwd.clone());
        let mut ctx = ExecutionContext::new(env, cwd);

        let engine = Engine::new(self.fs.clone(), self.commands.clone(), self.limits.clone());
        let stdout_collector = OutputCollector::with_limit(self.limits.max_output_bytes);
        let stderr_collector = OutputCollector::with_limit(self.limits.max_output_bytes);
        let stdout = Stdout::collector(stdout_collector.clone(), false);
        let stderr = Stderr::collector(stderr_collector.clone(), false);

        let outcome = engine.exec_node(&mut ctx, ast, Stdin::empty(), stdout, stderr).await;
        let exit_code = match outcome {
            Ok(code) => code,
            Err(e) => {
                if opts.no_throw {
                    1
                } else {
                    return Err(ShellError::Interpreter(e));
                }
            }
        };

        let stdout_bytes = if opts.quiet { Vec::new() } else { stdout_collector.bytes().await };
        let stderr_bytes = stderr_collector.bytes().await;
        Ok(ExecResult { stdout: stdout_bytes, stderr: stderr_bytes, exit_code })
    }

    fn flatten_lex_error(&self, e: LexError, opts: &ExecOptions) -> Result<ExecResult, ShellError> {
        if opts.no_throw {
            Ok(ExecResult { stdout: Vec::new(), stderr: format!("sh: {e}\n").into_bytes(), exit_code: 2 })
        } else {
            Err(ShellError::Lex(e))
        }
    }

    fn flatten_parse_error(&self, e: ParseError, opts: &ExecOptions) -> Result<ExecResult, ShellError> {
        if opts.no_throw {
            Ok(ExecResult { stdout: Vec::new(), stderr: format!("sh: {e}\n").into_bytes(), exit_code: 2 })
        } else {
            Err(ShellError::Parse(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_a_simple_pipeline() {
        let shell = Shell::new();
        let result = shell.exec("echo hello world | grep hello").await.unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout_text(), "hello world\n");
    }

    #[tokio::test]
    async fn reports_command_not_found() {
        let shell = Shell::new();
        let result = shell.exec("nonexistent-command").await.unwrap();
        assert_eq!(result.exit_code, 127);
        assert!(result.stderr_text().contains("command not found"));
    }

    #[tokio::test]
    async fn lex_error_flattened_in_no_throw_mode() {
        let shell = Shell::new();
        let result = shell.exec_with("echo 'unterminated", ExecOptions { no_throw: true, ..Default::default() }).await.unwrap();
        assert_eq!(result.exit_code, 2);
    }

    #[tokio::test]
    async fn lex_error_propagates_by_default() {
        let shell = Shell::new();
        let result = shell.exec("echo 'unterminated").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn exec_options_override_cwd_and_env() {
        let shell = Shell::new();
        let mut env = HashMap::new();
        env.insert("NAME".to_string(), "world".to_string());
        let result = shell
            .exec_with("echo hello $NAME", ExecOptions { env, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(result.stdout_text(), "hello world\n");
    }

    #[tokio::test]
    async fn quiet_discards_stdout_but_keeps_exit_code() {
        let shell = Shell::new();
        let result = shell.exec_with("echo hi", ExecOptions { quiet: true, ..Default::default() }).await.unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, Vec::<u8>::new());
    }

    #[test]
    fn interpolate_escapes_values_but_not_raw() {
        let script = Shell::interpolate(
            &["echo ", ""],
            &[Interpolated::Value("a b".to_string())],
        );
        assert_eq!(script, "echo a\\ b");

        let script = Shell::interpolate(&["echo ", ""], &[Interpolated::Raw("$HOME".to_string())]);
        assert_eq!(script, "echo $HOME");
    }
}
