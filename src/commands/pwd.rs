//! `pwd` — prints the command's current working directory, which the
//! interpreter always populates as an absolute, normalized path.

use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

pub struct Pwd;

#[async_trait]
impl Command for Pwd {
    async fn run(&self, ctx: CommandContext) -> CommandResult {
        ctx.write_out(format!("{}\n", ctx.cwd)).await;
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;
    use crate::streams::{OutputCollector, Stderr, Stdin, Stdout};
    use std::collections::HashMap;
    use std::sync::Arc;

    #[tokio::test]
    async fn prints_cwd_with_trailing_newline() {
        let collector = OutputCollector::new();
        let ctx = CommandContext {
            args: vec![],
            env: HashMap::new(),
            cwd: "/tmp".to_string(),
            stdin: Stdin::empty(),
            stdout: Stdout::collector(collector.clone(), false),
            stderr: Stderr::null(),
            fs: Arc::new(InMemoryFs::new()),
            exec: None,
            set_cwd: None,
        };
        assert_eq!(Pwd.run(ctx).await, 0);
        assert_eq!(collector.bytes().await, b"/tmp\n");
    }
}
