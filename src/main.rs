use std::io::Read;

use clap::Parser;

use sandbash::shell::{Shell, ShellConfig};
use sandbash::ExecutionLimits;

#[derive(Parser)]
#[command(name = "sandbash")]
#[command(about = "A sandboxed bash environment")]
#[command(version)]
struct Cli {
    /// Execute the script given on the command line
    #[arg(short = 'c')]
    script: Option<String>,

    /// Exit immediately on a command failure (set -e)
    #[arg(short = 'e')]
    errexit: bool,

    /// Treat unset variables as errors (set -u)
    #[arg(short = 'u')]
    nounset: bool,

    /// Trace commands as they execute (set -x)
    #[arg(short = 'x')]
    xtrace: bool,

    /// Parse the script but do not execute it (set -n)
    #[arg(short = 'n')]
    noexec: bool,

    /// Set a shell option by name (e.g. -o pipefail)
    #[arg(short = 'o', value_name = "OPTION")]
    options: Vec<String>,

    /// Working directory inside the sandbox
    #[arg(long = "cwd")]
    cwd: Option<String>,

    /// Print the result as JSON (stdout, stderr, exitCode)
    #[arg(long = "json")]
    json: bool,

    /// Script file to execute
    #[arg()]
    script_file: Option<String>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = Cli::parse();

    let script = if let Some(ref text) = cli.script {
        text.clone()
    } else if let Some(ref file) = cli.script_file {
        match std::fs::read_to_string(file) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("sandbash: {}: {}", file, e);
                std::process::exit(127);
            }
        }
    } else {
        use std::io::IsTerminal;
        if std::io::stdin().is_terminal() {
            eprintln!("sandbash: no script: use -c 'script', a script file, or pipe via stdin");
            std::process::exit(2);
        }
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer).unwrap_or_default();
        buffer
    };

    if script.trim().is_empty() {
        if cli.json {
            println!("{}", serde_json::json!({"stdout": "", "stderr": "", "exitCode": 0}));
        }
        return;
    }

    let mut shell = Shell::new(ShellConfig {
        cwd: cli.cwd,
        limits: Some(ExecutionLimits::default()),
        ..Default::default()
    })
    .await;

    // Option flags become a `set` prologue so they flow through the
    // normal option machinery.
    let mut prologue = String::new();
    if cli.errexit {
        prologue.push_str("set -e\n");
    }
    if cli.nounset {
        prologue.push_str("set -u\n");
    }
    if cli.xtrace {
        prologue.push_str("set -x\n");
    }
    if cli.noexec {
        prologue.push_str("set -n\n");
    }
    for option in &cli.options {
        prologue.push_str(&format!("set -o {}\n", option));
    }

    let full_script = format!("{}{}", prologue, script);
    let result = shell.exec(&full_script).await;

    if cli.json {
        println!(
            "{}",
            serde_json::json!({
                "stdout": result.stdout,
                "stderr": result.stderr,
                "exitCode": result.exit_code,
            })
        );
    } else {
        if !result.stdout.is_empty() {
            print!("{}", result.stdout);
        }
        if !result.stderr.is_empty() {
            eprint!("{}", result.stderr);
        }
    }

    std::process::exit(result.exit_code);
}
