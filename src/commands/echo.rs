//! `echo` — writes straight to the streaming `ctx.stdout` rather than
//! building up a result string first.

use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

pub struct Echo;

#[async_trait]
impl Command for Echo {
    async fn run(&self, ctx: CommandContext) -> CommandResult {
        let args = &ctx.args;
        let mut no_newline = false;
        let mut interpret_escapes = false;
        let mut start = 0;

        while start < args.len() {
            match args[start].as_str() {
                "-n" => {
                    no_newline = true;
                    start += 1;
                }
                "-e" => {
                    interpret_escapes = true;
                    start += 1;
                }
                "-E" => {
                    interpret_escapes = false;
                    start += 1;
                }
                "-ne" | "-en" => {
                    no_newline = true;
                    interpret_escapes = true;
                    start += 1;
                }
                _ => break,
            }
        }

        let joined = args[start..].join(" ");
        let (mut output, suppress_newline) = if interpret_escapes {
            process_escapes(&joined)
        } else {
            (joined, false)
        };

        if !no_newline && !suppress_newline {
            output.push('\n');
        }

        ctx.write_out(&output).await;
        0
    }
}

/// Processes `\n \t \\ \c ...` escapes for `echo -e`. Returns the
/// processed text and whether `\c` was seen (which suppresses any
/// trailing newline and stops processing the rest of the string).
fn process_escapes(input: &str) -> (String, bool) {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('a') => out.push('\u{7}'),
            Some('b') => out.push('\u{8}'),
            Some('c') => return (out, true),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    (out, false)
}
