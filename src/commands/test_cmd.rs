//! `test` / `[` — covers the operators `if`/`while`/`until` conditions
//! actually need: string comparison, numeric comparison, `-z`/`-n`, file
//! tests, `!`/`-a`/`-o`.

use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

pub struct Test;

#[async_trait]
impl Command for Test {
    async fn run(&self, ctx: CommandContext) -> CommandResult {
        let raw = &ctx.args;
        let args: Vec<&str> = if raw.first().map(|s| s.as_str()) == Some("[") {
            if raw.last().map(|s| s.as_str()) != Some("]") {
                return 2;
            }
            raw[1..raw.len() - 1].iter().map(|s| s.as_str()).collect()
        } else {
            raw.iter().map(|s| s.as_str()).collect()
        };

        if args.is_empty() {
            return 1;
        }

        if evaluate(&args, &ctx).await {
            0
        } else {
            1
        }
    }
}

fn evaluate<'a>(
    args: &'a [&'a str],
    ctx: &'a CommandContext,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = bool> + Send + 'a>> {
    Box::pin(async move {
        if args.len() == 1 {
            return !args[0].is_empty();
        }

        if args[0] == "!" {
            return !evaluate(&args[1..], ctx).await;
        }

        for i in 1..args.len() {
            match args[i] {
                "-a" => return evaluate(&args[..i], ctx).await && evaluate(&args[i + 1..], ctx).await,
                "-o" => return evaluate(&args[..i], ctx).await || evaluate(&args[i + 1..], ctx).await,
                _ => {}
            }
        }

        if args.len() == 3 {
            let (left, op, right) = (args[0], args[1], args[2]);
            match op {
                "=" | "==" => return left == right,
                "!=" => return left != right,
                "-eq" => return parse_num(left) == parse_num(right),
                "-ne" => return parse_num(left) != parse_num(right),
                "-lt" => return parse_num(left) < parse_num(right),
                "-le" => return parse_num(left) <= parse_num(right),
                "-gt" => return parse_num(left) > parse_num(right),
                "-ge" => return parse_num(left) >= parse_num(right),
                _ => {}
            }
        }

        if args.len() == 2 {
            let (op, operand) = (args[0], args[1]);
            match op {
                "-z" => return operand.is_empty(),
                "-n" => return !operand.is_empty(),
                "-e" => {
                    let path = ctx.fs.resolve_path(&ctx.cwd, operand);
                    return ctx.fs.exists(&path).await;
                }
                "-f" => {
                    let path = ctx.fs.resolve_path(&ctx.cwd, operand);
                    return ctx.fs.stat(&path).await.map(|s| s.is_file).unwrap_or(false);
                }
                "-d" => {
                    let path = ctx.fs.resolve_path(&ctx.cwd, operand);
                    return ctx.fs.stat(&path).await.map(|s| s.is_directory).unwrap_or(false);
                }
                _ => {}
            }
        }

        false
    })
}

fn parse_num(s: &str) -> i64 {
    s.trim().parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;
    use crate::streams::{OutputCollector, Stderr, Stdin, Stdout};
    use std::collections::HashMap;
    use std::sync::Arc;

    async fn run(args: &[&str]) -> i32 {
        let ctx = CommandContext {
            args: args.iter().map(|s| s.to_string()).collect(),
            env: HashMap::new(),
            cwd: "/".to_string(),
            stdin: Stdin::empty(),
            stdout: Stdout::collector(OutputCollector::new(), false),
            stderr: Stderr::null(),
            fs: Arc::new(InMemoryFs::new()),
            exec: None,
            set_cwd: None,
        };
        Test.run(ctx).await
    }

    #[tokio::test]
    async fn numeric_lt() {
        assert_eq!(run(&["1", "-lt", "3"]).await, 0);
        assert_eq!(run(&["3", "-lt", "1"]).await, 1);
    }

    #[tokio::test]
    async fn string_equality() {
        assert_eq!(run(&["a", "=", "a"]).await, 0);
        assert_eq!(run(&["a", "=", "b"]).await, 1);
    }

    #[tokio::test]
    async fn bracket_form_requires_closing_bracket() {
        assert_eq!(run(&["[", "a", "=", "a", "]"]).await, 0);
        assert_eq!(run(&["[", "a", "=", "a"]).await, 2);
    }
}
