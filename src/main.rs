use std::io::Read;

use clap::Parser;
use just_bash::{ExecOptions, Shell, ShellOptions};

#[derive(Parser)]
#[command(name = "just-bash")]
#[command(about = "A secure bash environment for AI agents")]
#[command(version)]
struct Cli {
    /// Execute the script from command line argument
    #[arg(short = 'c')]
    script: Option<String>,

    /// Working directory within the sandbox
    #[arg(long = "cwd")]
    cwd: Option<String>,

    /// Output results as JSON (stdout, stderr, exitCode)
    #[arg(long = "json")]
    json: bool,

    /// Script file to execute
    #[arg()]
    script_file: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let script = if let Some(s) = cli.script {
        s
    } else if let Some(ref file) = cli.script_file {
        match std::fs::read_to_string(file) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("Error: Cannot read script file: {}: {}", file, e);
                std::process::exit(1);
            }
        }
    } else {
        use std::io::IsTerminal;
        if std::io::stdin().is_terminal() {
            eprintln!("Error: No script provided. Use -c 'script', provide a script file, or pipe via stdin.");
            std::process::exit(1);
        }
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).unwrap_or_default();
        buf
    };

    if script.trim().is_empty() {
        if cli.json {
            println!("{}", serde_json::json!({"stdout": "", "stderr": "", "exitCode": 0}));
        }
        std::process::exit(0);
    }

    let mut opts = ShellOptions::default();
    if let Some(cwd) = cli.cwd {
        opts.cwd = cwd;
    }
    let shell = Shell::with_options(opts);

    let result = shell
        .exec_with(&script, ExecOptions { no_throw: true, ..Default::default() })
        .await
        .expect("no_throw mode never returns Err");

    if cli.json {
        println!(
            "{}",
            serde_json::json!({
                "stdout": result.stdout_text(),
                "stderr": result.stderr_text(),
                "exitCode": result.exit_code,
            })
        );
    } else {
        use std::io::Write;
        if !result.stdout.is_empty() {
            std::io::stdout().write_all(&result.stdout).ok();
        }
        if !result.stderr.is_empty() {
            std::io::stderr().write_all(&result.stderr).ok();
        }
    }

    std::process::exit(result.exit_code);
}
