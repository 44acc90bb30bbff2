//! `grep` — no `-A`/`-B` context lines, no recursive directory walk:
//! reads lines from stdin or named files and writes those matching a
//! pattern, enough to drive `echo hello | grep hello` style pipelines.

use async_trait::async_trait;
use regex_lite::RegexBuilder;

use super::{Command, CommandContext, CommandResult};

pub struct Grep;

#[async_trait]
impl Command for Grep {
    async fn run(&self, ctx: CommandContext) -> CommandResult {
        let mut invert = false;
        let mut ignore_case = false;
        let mut line_number = false;
        let mut positional = Vec::new();

        for arg in &ctx.args {
            match arg.as_str() {
                "-v" => invert = true,
                "-i" => ignore_case = true,
                "-n" => line_number = true,
                _ => positional.push(arg.clone()),
            }
        }

        let Some(pattern) = positional.first().cloned() else {
            ctx.write_err("usage: grep [-v] [-i] [-n] PATTERN [FILE...]\n").await;
            return 2;
        };

        let regex = match RegexBuilder::new(&pattern).case_insensitive(ignore_case).build() {
            Ok(r) => r,
            Err(e) => {
                ctx.write_err(format!("grep: {pattern}: {e}\n")).await;
                return 2;
            }
        };

        let files = &positional[1..];
        let mut any_match = false;
        let mut had_error = false;

        if files.is_empty() {
            let mut lines = ctx.stdin.lines();
            let mut n = 0usize;
            while let Some(line) = lines.next_line().await {
                n += 1;
                if regex.is_match(&line) != invert {
                    any_match = true;
                    write_line(&ctx, line_number, n, &line).await;
                }
            }
        } else {
            for path in files {
                let resolved = ctx.fs.resolve_path(&ctx.cwd, path);
                match ctx.fs.read_file(&resolved).await {
                    Ok(text) => {
                        for (i, line) in text.lines().enumerate() {
                            if regex.is_match(line) != invert {
                                any_match = true;
                                write_line(&ctx, line_number, i + 1, line).await;
                            }
                        }
                    }
                    Err(e) => {
                        ctx.write_err(format!("grep: {path}: {e}\n")).await;
                        had_error = true;
                    }
                }
            }
        }

        if had_error {
            2
        } else if any_match {
            0
        } else {
            1
        }
    }
}

async fn write_line(ctx: &CommandContext, line_number: bool, n: usize, line: &str) {
    if line_number {
        ctx.write_out(format!("{n}:{line}\n")).await;
    } else {
        ctx.write_out(format!("{line}\n")).await;
    }
}
