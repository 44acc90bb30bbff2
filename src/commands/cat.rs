//! `cat` — no args (or `-`) reads `ctx.stdin` to completion; each other
//! arg is read through `ctx.fs` and written in order.

use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};
use crate::fs::FsError;

pub struct Cat;

#[async_trait]
impl Command for Cat {
    async fn run(&self, ctx: CommandContext) -> CommandResult {
        let args: Vec<&String> = ctx.args.iter().filter(|a| !a.starts_with('-') || a.as_str() == "-").collect();

        if args.is_empty() {
            let bytes = ctx.stdin.read_all().await;
            ctx.stdout.write_bytes(&bytes).await;
            return 0;
        }

        let mut exit_code = 0;
        let mut stdin = Some(ctx.stdin);
        for path in args {
            if path == "-" {
                if let Some(stdin) = stdin.take() {
                    let bytes = stdin.read_all().await;
                    ctx.stdout.write_bytes(&bytes).await;
                }
                continue;
            }
            let resolved = ctx.fs.resolve_path(&ctx.cwd, path);
            match ctx.fs.read_file_buffer(&resolved).await {
                Ok(bytes) => ctx.stdout.write_bytes(&bytes).await,
                Err(e) => {
                    ctx.write_err(format!("cat: {path}: {}\n", describe(&e))).await;
                    exit_code = 1;
                }
            }
        }
        exit_code
    }
}

fn describe(err: &FsError) -> String {
    match err {
        FsError::NotFound { .. } => "No such file or directory".to_string(),
        FsError::IsDirectory { .. } => "Is a directory".to_string(),
        FsError::PermissionDenied { .. } => "Permission denied".to_string(),
        other => other.to_string(),
    }
}
