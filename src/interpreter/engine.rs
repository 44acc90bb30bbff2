//! The AST walker: owns nothing itself (the registry, filesystem, and
//! limits are shared, immutable collaborators) and drives a fresh
//! [`ExecutionContext`] through one run, built around genuine `tokio`
//! concurrency for pipelines rather than a synchronous walk.

use std::pin::Pin;
use std::sync::Arc;

use regex_lite::Regex;
use tokio::sync::Mutex as AsyncMutex;

use crate::ast::{AstNode, Redirect, RedirectMode, RedirectTarget, WordNode};
use crate::commands::{CommandContext, CommandRegistry, CwdRequest};
use crate::fs::FileSystem;
use crate::streams::{pipe, OutputCollector, Stderr, Stdin, Stdout};

use super::errors::InterpreterError;
use super::types::{ExecutionContext, ExecutionLimits, LoopSignal};

type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Reserved path: reads as empty, writes are discarded. Handled at redirect
/// resolution so no `FileSystem` adapter needs to special-case it.
const DEV_NULL: &str = "/dev/null";

/// Shared, immutable collaborators for one or more runs. Cheap to clone
/// (everything is an `Arc`), which is what lets a pipeline spawn each
/// stage as its own `'static` `tokio::spawn`ed task.
#[derive(Clone)]
pub struct Engine {
    pub(crate) fs: Arc<dyn FileSystem>,
    pub(crate) registry: Arc<CommandRegistry>,
    pub(crate) limits: ExecutionLimits,
}

/// A single-consumer cell for the ambient stdin handed down the AST: only
/// simple commands ever draw from it, and only the first one to do so
/// gets real bytes — exactly mirroring two sequential commands sharing
/// one real file descriptor (`cat; cat` on a piped stdin: the second
/// `cat` sees EOF).
#[derive(Clone)]
struct AmbientStdin(Arc<AsyncMutex<Stdin>>);

impl AmbientStdin {
    fn new(stdin: Stdin) -> Self {
        Self(Arc::new(AsyncMutex::new(stdin)))
    }

    async fn take(&self) -> Stdin {
        let mut guard = self.0.lock().await;
        std::mem::replace(&mut *guard, Stdin::Empty)
    }
}

impl Engine {
    pub fn new(fs: Arc<dyn FileSystem>, registry: Arc<CommandRegistry>, limits: ExecutionLimits) -> Self {
        Self { fs, registry, limits }
    }

    /// Runs `node` to completion against `ctx`, with `stdin`/`stdout`/
    /// `stderr` as the ambient streams simple commands inherit absent a
    /// redirect. Returns the node's exit code.
    pub fn exec_node<'a>(
        &'a self,
        ctx: &'a mut ExecutionContext,
        node: &'a AstNode,
        stdin: Stdin,
        stdout: Stdout,
        stderr: Stderr,
    ) -> BoxFuture<'a, Result<i32, InterpreterError>> {
        let ambient = AmbientStdin::new(stdin);
        self.exec_with_ambient(ctx, node, ambient, stdout, stderr)
    }

    fn exec_with_ambient<'a>(
        &'a self,
        ctx: &'a mut ExecutionContext,
        node: &'a AstNode,
        stdin: AmbientStdin,
        stdout: Stdout,
        stderr: Stderr,
    ) -> BoxFuture<'a, Result<i32, InterpreterError>> {
        Box::pin(async move {
            let code = match node {
                AstNode::Empty => 0,

                AstNode::Command { words, assignments, redirects } => {
                    self.exec_simple_command(ctx, words, assignments, redirects, stdin, stdout, stderr).await?
                }

                AstNode::Pipeline { stages } => self.exec_pipeline(ctx, stages, stdin, stdout, stderr).await?,

                AstNode::And { left, right } => {
                    let lc = self.exec_with_ambient(ctx, left, stdin.clone(), stdout.clone(), stderr.clone()).await?;
                    if lc == 0 && ctx.loop_signal == LoopSignal::None {
                        self.exec_with_ambient(ctx, right, stdin, stdout, stderr).await?
                    } else {
                        lc
                    }
                }

                AstNode::Or { left, right } => {
                    let lc = self.exec_with_ambient(ctx, left, stdin.clone(), stdout.clone(), stderr.clone()).await?;
                    if lc != 0 && ctx.loop_signal == LoopSignal::None {
                        self.exec_with_ambient(ctx, right, stdin, stdout, stderr).await?
                    } else {
                        lc
                    }
                }

                AstNode::Sequence { left, right } => {
                    let lc = self.exec_with_ambient(ctx, left, stdin.clone(), stdout.clone(), stderr.clone()).await?;
                    if ctx.loop_signal != LoopSignal::None {
                        lc
                    } else {
                        self.exec_with_ambient(ctx, right, stdin, stdout, stderr).await?
                    }
                }

                AstNode::If { branches, else_body } => {
                    let mut result = 0;
                    let mut matched = false;
                    for (cond, body) in branches {
                        let cc = self
                            .exec_with_ambient(ctx, cond, stdin.clone(), stdout.clone(), stderr.clone())
                            .await?;
                        if cc == 0 {
                            result = self.exec_with_ambient(ctx, body, stdin.clone(), stdout.clone(), stderr.clone()).await?;
                            matched = true;
                            break;
                        }
                    }
                    if !matched {
                        if let Some(else_body) = else_body {
                            result = self.exec_with_ambient(ctx, else_body, stdin, stdout, stderr).await?;
                        }
                    }
                    result
                }

                AstNode::For { var_name, items, body } => {
                    let values = match self.expand_words(items, ctx).await {
                        Ok(v) => v,
                        Err(e) => {
                            stderr.write_str(&format!("sh: {e}\n")).await;
                            return Ok(1);
                        }
                    };
                    let mut result = 0;
                    for value in values {
                        ctx.set_var(var_name.clone(), value);
                        result = self
                            .exec_with_ambient(ctx, body, stdin.clone(), stdout.clone(), stderr.clone())
                            .await?;
                        if self.absorb_loop_signal(ctx) == LoopControl::Break {
                            break;
                        }
                    }
                    result
                }

                AstNode::While { condition, body } => {
                    let mut result = 0;
                    loop {
                        let cc = self
                            .exec_with_ambient(ctx, condition, stdin.clone(), stdout.clone(), stderr.clone())
                            .await?;
                        if cc != 0 {
                            break;
                        }
                        result = self
                            .exec_with_ambient(ctx, body, stdin.clone(), stdout.clone(), stderr.clone())
                            .await?;
                        if self.absorb_loop_signal(ctx) == LoopControl::Break {
                            break;
                        }
                    }
                    result
                }

                AstNode::Until { condition, body } => {
                    let mut result = 0;
                    loop {
                        let cc = self
                            .exec_with_ambient(ctx, condition, stdin.clone(), stdout.clone(), stderr.clone())
                            .await?;
                        if cc == 0 {
                            break;
                        }
                        result = self
                            .exec_with_ambient(ctx, body, stdin.clone(), stdout.clone(), stderr.clone())
                            .await?;
                        if self.absorb_loop_signal(ctx) == LoopControl::Break {
                            break;
                        }
                    }
                    result
                }

                AstNode::Case { subject, arms } => {
                    let subject_value = match self.expand_case_pattern(subject, ctx).await {
                        Ok(mut v) => v.drain(..).next().unwrap_or_default(),
                        Err(e) => {
                            stderr.write_str(&format!("sh: {e}\n")).await;
                            return Ok(1);
                        }
                    };
                    let mut result = 0;
                    for (patterns, body) in arms {
                        let mut matched = false;
                        for pattern in patterns {
                            let expanded = match self.expand_case_pattern(pattern, ctx).await {
                                Ok(v) => v,
                                Err(_) => continue,
                            };
                            if expanded.iter().any(|p| case_pattern_matches(p, &subject_value)) {
                                matched = true;
                                break;
                            }
                        }
                        if matched {
                            result = self.exec_with_ambient(ctx, body, stdin, stdout, stderr).await?;
                            break;
                        }
                    }
                    result
                }

                AstNode::Break { level } => {
                    match self.parse_loop_level(level, ctx).await {
                        Ok(n) => ctx.loop_signal = LoopSignal::Break(n),
                        Err(msg) => {
                            stderr.write_str(&format!("sh: break: {msg}\n")).await;
                            return Ok(1);
                        }
                    }
                    0
                }

                AstNode::Continue { level } => {
                    match self.parse_loop_level(level, ctx).await {
                        Ok(n) => ctx.loop_signal = LoopSignal::Continue(n),
                        Err(msg) => {
                            stderr.write_str(&format!("sh: continue: {msg}\n")).await;
                            return Ok(1);
                        }
                    }
                    0
                }
            };
            ctx.last_exit_code = code;
            Ok(code)
        })
    }

    async fn parse_loop_level(&self, level: &WordNode, ctx: &mut ExecutionContext) -> Result<u32, String> {
        let text = self
            .expand_word(level, ctx)
            .await
            .map_err(|e| e.to_string())?
            .into_iter()
            .next()
            .unwrap_or_default();
        match text.parse::<i64>() {
            Ok(n) if n > 0 => Ok(n as u32),
            _ => Err(format!("{text}: loop count out of range")),
        }
    }

    /// Applies the loop-control signal set by `break`/`continue` to the
    /// loop that just ran a body iteration: decrements a multi-level
    /// signal, clears it once it reaches this loop's level, and reports
    /// whether the loop should stop.
    fn absorb_loop_signal(&self, ctx: &mut ExecutionContext) -> LoopControl {
        match ctx.loop_signal {
            LoopSignal::None => LoopControl::Continue,
            LoopSignal::Break(n) => {
                if n <= 1 {
                    ctx.loop_signal = LoopSignal::None;
                } else {
                    ctx.loop_signal = LoopSignal::Break(n - 1);
                }
                LoopControl::Break
            }
            LoopSignal::Continue(n) => {
                if n <= 1 {
                    ctx.loop_signal = LoopSignal::None;
                    LoopControl::Continue
                } else {
                    ctx.loop_signal = LoopSignal::Continue(n - 1);
                    LoopControl::Break
                }
            }
        }
    }

    async fn exec_pipeline(
        &self,
        ctx: &mut ExecutionContext,
        stages: &[AstNode],
        stdin: AmbientStdin,
        stdout: Stdout,
        stderr: Stderr,
    ) -> Result<i32, InterpreterError> {
        if stages.len() > self.limits.max_pipeline_stages {
            return Err(InterpreterError::ExecutionLimit {
                message: format!("pipeline exceeds {} stages", self.limits.max_pipeline_stages),
            });
        }

        let mut readers = Vec::with_capacity(stages.len().saturating_sub(1));
        let mut writers = Vec::with_capacity(stages.len().saturating_sub(1));
        for _ in 1..stages.len() {
            let (w, r) = pipe();
            writers.push(w);
            readers.push(r);
        }
        let mut readers = readers.into_iter();
        let mut writers = writers.into_iter();

        let mut handles = Vec::with_capacity(stages.len());
        for (i, stage) in stages.iter().enumerate() {
            let stage_stdin = if i == 0 { stdin.take().await } else { Stdin::from_pipe(readers.next().unwrap()) };
            let stage_stdout =
                if i + 1 == stages.len() { stdout.clone() } else { Stdout::pipe(writers.next().unwrap()) };
            let stage_stderr = stderr.clone();
            let engine = self.clone();
            let stage_ast = stage.clone();
            let mut stage_ctx = ctx.fork();

            handles.push(tokio::spawn(async move {
                let result = engine
                    .exec_with_ambient(
                        &mut stage_ctx,
                        &stage_ast,
                        AmbientStdin::new(stage_stdin),
                        stage_stdout,
                        stage_stderr,
                    )
                    .await;
                result
            }));
        }

        let mut last_code = 0;
        let mut first_err = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(code)) => last_code = code,
                Ok(Err(e)) => first_err.get_or_insert(e),
                Err(_join_err) => first_err.get_or_insert(InterpreterError::ExecutionLimit {
                    message: "pipeline stage task panicked".to_string(),
                }),
            };
        }
        if let Some(e) = first_err {
            return Err(e);
        }
        Ok(last_code)
    }

    #[allow(clippy::too_many_arguments)]
    async fn exec_simple_command(
        &self,
        ctx: &mut ExecutionContext,
        words: &[WordNode],
        assignments: &[(String, WordNode)],
        redirects: &[Redirect],
        stdin: AmbientStdin,
        stdout: Stdout,
        stderr: Stderr,
    ) -> Result<i32, InterpreterError> {
        ctx.command_count += 1;
        if ctx.command_count > self.limits.max_command_count {
            return Err(InterpreterError::ExecutionLimit {
                message: format!(
                    "maximum command count ({}) exceeded (possible infinite loop)",
                    self.limits.max_command_count
                ),
            });
        }

        let mut expanded_assignments = Vec::with_capacity(assignments.len());
        for (name, value_word) in assignments {
            match self.expand_word_scalar(value_word, ctx).await {
                Ok(value) => expanded_assignments.push((name.clone(), value)),
                Err(e) => {
                    stderr.write_str(&format!("sh: {e}\n")).await;
                    return Ok(1);
                }
            }
        }

        let argv = match self.expand_words(words, ctx).await {
            Ok(v) => v,
            Err(e) => {
                stderr.write_str(&format!("sh: {e}\n")).await;
                return Ok(1);
            }
        };

        if argv.is_empty() {
            for (name, value) in expanded_assignments {
                ctx.set_var(name, value);
            }
            return Ok(0);
        }

        let name = &argv[0];
        let args = argv[1..].to_vec();

        let mut scoped_env = ctx.env.clone();
        for (k, v) in &expanded_assignments {
            scoped_env.insert(k.clone(), v.clone());
        }

        let redirect_plan = match self.resolve_redirects(redirects, ctx, stdin, stdout, stderr.clone()).await {
            Ok(plan) => plan,
            Err(RedirectFailure { path, message }) => {
                stderr.write_str(&format!("sh: {path}: {message}\n")).await;
                return Ok(1);
            }
        };

        let exit_code = if let Some(command) = self.registry.get(name) {
            let set_cwd = CwdRequest::new();
            let cmd_ctx = CommandContext {
                args,
                env: scoped_env,
                cwd: ctx.cwd.clone(),
                stdin: redirect_plan.stdin,
                stdout: redirect_plan.stdout,
                stderr: redirect_plan.stderr,
                fs: self.fs.clone(),
                exec: None,
                set_cwd: Some(set_cwd.clone()),
            };
            let code = command.run(cmd_ctx).await;
            if let Some(new_cwd) = set_cwd.take().await {
                ctx.set_var("OLDPWD", ctx.cwd.clone());
                ctx.cwd = new_cwd.clone();
                ctx.set_var("PWD", new_cwd);
            }
            code
        } else {
            redirect_plan.stderr.write_str(&format!("sh: {name}: command not found\n")).await;
            127
        };

        self.flush_redirect_files(redirect_plan.pending_files).await;
        Ok(exit_code)
    }

    async fn flush_redirect_files(&self, pending: Vec<PendingFileWrite>) {
        for PendingFileWrite { path, append, collector } in pending {
            let bytes = collector.bytes().await;
            let result =
                if append { self.fs.append_file(&path, &bytes).await } else { self.fs.write_file(&path, &bytes).await };
            let _ = result; // a failing redirect target is reported before the command runs; a
                             // failure discovered only at flush time (parent removed mid-run) is
                             // not surfaced further — there is no command left to attribute it to.
        }
    }

    async fn resolve_redirects(
        &self,
        redirects: &[Redirect],
        ctx: &mut ExecutionContext,
        stdin: AmbientStdin,
        ambient_stdout: Stdout,
        ambient_stderr: Stderr,
    ) -> Result<RedirectPlan, RedirectFailure> {
        let mut current_stdout = ambient_stdout;
        let mut current_stderr = ambient_stderr;
        let mut stdin_override: Option<Stdin> = None;
        let mut pending: Vec<PendingFileWrite> = Vec::new();

        for redirect in redirects {
            match (&redirect.mode, &redirect.target) {
                (RedirectMode::In, RedirectTarget::HeredocContent { content, expand }) => {
                    let text = if *expand { self.expand_heredoc(content, ctx).await } else { content.clone() };
                    stdin_override = Some(Stdin::from_text(text));
                }
                (RedirectMode::In, RedirectTarget::Word(word)) => {
                    let path = self.redirect_target_path(word, ctx).await;
                    let resolved = self.fs.resolve_path(&ctx.cwd, &path);
                    if resolved == DEV_NULL {
                        stdin_override = Some(Stdin::empty());
                        continue;
                    }
                    match self.fs.read_file_buffer(&resolved).await {
                        Ok(bytes) => stdin_override = Some(Stdin::from_bytes(bytes)),
                        Err(_) => {
                            return Err(RedirectFailure {
                                path,
                                message: "No such file or directory".to_string(),
                            })
                        }
                    }
                }
                (RedirectMode::Out, RedirectTarget::Word(word)) => {
                    let resolved = self.resolve_redirect_path(word, ctx).await;
                    if resolved == DEV_NULL {
                        current_stdout = Stdout::null();
                        continue;
                    }
                    let collector = self.output_collector();
                    current_stdout = Stdout::collector(collector.clone(), false);
                    pending.push(PendingFileWrite { path: resolved, append: false, collector });
                }
                (RedirectMode::Append, RedirectTarget::Word(word)) => {
                    let resolved = self.resolve_redirect_path(word, ctx).await;
                    if resolved == DEV_NULL {
                        current_stdout = Stdout::null();
                        continue;
                    }
                    let collector = self.output_collector();
                    current_stdout = Stdout::collector(collector.clone(), false);
                    pending.push(PendingFileWrite { path: resolved, append: true, collector });
                }
                (RedirectMode::ErrOut, RedirectTarget::Word(word)) => {
                    let resolved = self.resolve_redirect_path(word, ctx).await;
                    if resolved == DEV_NULL {
                        current_stderr = Stderr::null();
                        continue;
                    }
                    let collector = self.output_collector();
                    current_stderr = Stderr::collector(collector.clone(), false);
                    pending.push(PendingFileWrite { path: resolved, append: false, collector });
                }
                (RedirectMode::ErrAppend, RedirectTarget::Word(word)) => {
                    let resolved = self.resolve_redirect_path(word, ctx).await;
                    if resolved == DEV_NULL {
                        current_stderr = Stderr::null();
                        continue;
                    }
                    let collector = self.output_collector();
                    current_stderr = Stderr::collector(collector.clone(), false);
                    pending.push(PendingFileWrite { path: resolved, append: true, collector });
                }
                (RedirectMode::AllOut, RedirectTarget::Word(word)) => {
                    let resolved = self.resolve_redirect_path(word, ctx).await;
                    if resolved == DEV_NULL {
                        current_stdout = Stdout::null();
                        current_stderr = Stderr::null();
                        continue;
                    }
                    let collector = self.output_collector();
                    current_stdout = Stdout::collector(collector.clone(), false);
                    current_stderr = Stderr::collector(collector.clone(), false);
                    pending.push(PendingFileWrite { path: resolved, append: false, collector });
                }
                (RedirectMode::AllAppend, RedirectTarget::Word(word)) => {
                    let resolved = self.resolve_redirect_path(word, ctx).await;
                    if resolved == DEV_NULL {
                        current_stdout = Stdout::null();
                        current_stderr = Stderr::null();
                        continue;
                    }
                    let collector = self.output_collector();
                    current_stdout = Stdout::collector(collector.clone(), false);
                    current_stderr = Stderr::collector(collector.clone(), false);
                    pending.push(PendingFileWrite { path: resolved, append: true, collector });
                }
                (RedirectMode::ErrToOut, RedirectTarget::FdDup { .. }) => {
                    current_stderr = Stderr::from_sink(current_stdout.sink(), false);
                }
                (RedirectMode::OutToErr, RedirectTarget::FdDup { .. }) => {
                    current_stdout = Stdout::from_sink(current_stderr.sink(), false);
                }
                _ => {}
            }
        }

        let resolved_stdin = match stdin_override {
            Some(s) => s,
            None => stdin.take().await,
        };

        Ok(RedirectPlan { stdin: resolved_stdin, stdout: current_stdout, stderr: current_stderr, pending_files: pending })
    }

    async fn redirect_target_path(&self, word: &WordNode, ctx: &mut ExecutionContext) -> String {
        self.expand_word(word, ctx).await.ok().and_then(|mut v| v.drain(..).next()).unwrap_or_default()
    }

    async fn resolve_redirect_path(&self, word: &WordNode, ctx: &mut ExecutionContext) -> String {
        let path = self.redirect_target_path(word, ctx).await;
        self.fs.resolve_path(&ctx.cwd, &path)
    }

    /// A collector bounded by [`ExecutionLimits::max_output_bytes`], for a
    /// single redirect target's buffered output.
    fn output_collector(&self) -> OutputCollector {
        OutputCollector::with_limit(self.limits.max_output_bytes)
    }

    /// Expands `$VAR`/`${VAR}`/`$(...)`/`$((...))` inline inside a
    /// heredoc body captured verbatim at lex time — variable expansion
    /// happens at execution time, not lex time. No brace or glob
    /// expansion: a heredoc body is data, not a word list.
    async fn expand_heredoc(&self, content: &str, ctx: &mut ExecutionContext) -> String {
        let mut out = String::with_capacity(content.len());
        let mut chars = content.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.peek() {
                    Some('$') | Some('\\') | Some('`') => out.push(chars.next().unwrap()),
                    _ => out.push('\\'),
                },
                '$' => match chars.peek() {
                    Some('{') => {
                        chars.next();
                        let name: String = chars.by_ref().take_while(|&c| c != '}').collect();
                        out.push_str(ctx.get_var(&name).unwrap_or(""));
                    }
                    Some(c0) if c0.is_alphabetic() || *c0 == '_' => {
                        let mut name = String::new();
                        while let Some(&c) = chars.peek() {
                            if c.is_alphanumeric() || c == '_' {
                                name.push(c);
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        out.push_str(ctx.get_var(&name).unwrap_or(""));
                    }
                    Some('(') => {
                        chars.next();
                        let mut depth = 1;
                        let mut src = String::new();
                        for c in chars.by_ref() {
                            if c == '(' {
                                depth += 1;
                            } else if c == ')' {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            src.push(c);
                        }
                        if let Ok(ast) = crate::parser::parse_source(&src) {
                            if let Ok(text) = self.run_substitution(&ast, ctx).await {
                                out.push_str(&text);
                            }
                        }
                    }
                    _ => out.push('$'),
                },
                other => out.push(other),
            }
        }
        out
    }
}

#[derive(PartialEq, Eq)]
enum LoopControl {
    Continue,
    Break,
}

struct PendingFileWrite {
    path: String,
    append: bool,
    collector: OutputCollector,
}

struct RedirectPlan {
    stdin: Stdin,
    stdout: Stdout,
    stderr: Stderr,
    pending_files: Vec<PendingFileWrite>,
}

struct RedirectFailure {
    path: String,
    message: String,
}

/// `case` arm patterns use glob semantics against the whole subject
/// string: `*` matches anything (including what would be path separators
/// elsewhere — there is no path concept inside a `case` subject), `?`
/// matches one character, and `[!abc]` negation is supported.
fn case_pattern_matches(pattern: &str, subject: &str) -> bool {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                out.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    out.push('^');
                }
                for cc in chars.by_ref() {
                    out.push(cc);
                    if cc == ']' {
                        break;
                    }
                }
            }
            '.' | '+' | '^' | '$' | '(' | ')' | '|' | '\\' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');
    Regex::new(&out).map(|r| r.is_match(subject)).unwrap_or(false)
}
