//! `true` and `false` — the two constant-exit-code commands `&&`/`||`
//! chains are built from.

use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

pub struct True;

#[async_trait]
impl Command for True {
    async fn run(&self, _ctx: CommandContext) -> CommandResult {
        0
    }
}

pub struct False;

#[async_trait]
impl Command for False {
    async fn run(&self, _ctx: CommandContext) -> CommandResult {
        1
    }
}
