//! Shell environment.
//!
//! `Shell` ties the parser, interpreter, filesystem and command registry
//! together behind one async `exec` entry point. The interpreter itself
//! is synchronous; async filesystem and command calls are bridged with
//! `block_in_place` on the runtime handle.

use std::collections::HashMap;
use std::sync::Arc;

use crate::command::{CommandContext, CommandRegistry, CommandResult};
use crate::fs::{FileSystem, FsBridge, FsError, MemFs, MkdirOptions, WriteOptions};
use crate::interp::engine::ExternalExec;
use crate::interp::error::CarriesOutput;
use crate::interp::{ExecResult, ExecutionLimits, Interp, Interrupt, ShellState};
use crate::interp::state::Variable;

/// Construction options.
#[derive(Default)]
pub struct ShellConfig {
    /// Extra environment variables, exported.
    pub env: Option<HashMap<String, String>>,
    /// Working directory (defaults to /home/user).
    pub cwd: Option<String>,
    /// Filesystem backend (defaults to `MemFs`).
    pub fs: Option<Arc<dyn FileSystem>>,
    /// Execution budgets.
    pub limits: Option<ExecutionLimits>,
    /// External command registry (defaults to the reference set).
    pub registry: Option<CommandRegistry>,
}

/// The embeddable shell.
pub struct Shell {
    pub fs: Arc<dyn FileSystem>,
    registry: Arc<CommandRegistry>,
    limits: ExecutionLimits,
    state: ShellState,
}

impl Shell {
    pub async fn new(config: ShellConfig) -> Self {
        let default_layout = config.cwd.is_none();
        let cwd = config.cwd.unwrap_or_else(|| "/home/user".to_string());
        let fs: Arc<dyn FileSystem> = config.fs.unwrap_or_else(|| Arc::new(MemFs::new()));
        let limits = config.limits.unwrap_or_default();
        let registry = Arc::new(config.registry.unwrap_or_else(CommandRegistry::with_defaults));

        init_filesystem(&*fs, default_layout).await;
        let _ = fs.mkdir(&cwd, &MkdirOptions { recursive: true, mode: None }).await;

        let mut state = ShellState::default();
        state.cwd = cwd.clone();
        state.previous_dir = cwd.clone();
        state.script_name = "sandbash".to_string();

        let home = if default_layout { "/home/user" } else { "/" };
        state.env.insert("HOME".to_string(), Variable::exported(home));
        state.env.insert("PATH".to_string(), Variable::exported("/usr/bin:/bin"));
        state.env.insert("PWD".to_string(), Variable::exported(cwd.clone()));
        state.env.insert("OLDPWD".to_string(), Variable::exported(cwd));
        state.env.insert("IFS".to_string(), Variable::scalar(" \t\n"));
        state.env.insert("OSTYPE".to_string(), Variable::scalar("linux-gnu"));
        state.env.insert("HOSTNAME".to_string(), Variable::scalar("localhost"));
        state.env.insert("PS4".to_string(), Variable::scalar("+ "));

        if let Some(extra) = config.env {
            for (name, value) in extra {
                state.env.insert(name, Variable::exported(value));
            }
        }

        Self { fs, registry, limits, state }
    }

    /// Execute a script against the environment. Limit counters reset
    /// on every call; state (variables, cwd, functions) persists.
    pub async fn exec(&mut self, script: &str) -> ExecResult {
        if script.trim().is_empty() {
            return ExecResult::ok();
        }

        let parsed = match crate::parser::parse_with_limit(script, self.limits.max_input_bytes) {
            Ok(parsed) => parsed,
            Err(e) => {
                return ExecResult::failure(format!("sandbash: syntax error: {}\n", e), 2);
            }
        };

        self.state.command_count = 0;

        let fs = self.fs.clone();
        let registry = self.registry.clone();
        let limits = self.limits.clone();
        let state = &mut self.state;

        tokio::task::block_in_place(move || {
            let handle = tokio::runtime::Handle::current();
            let bridge = FsBridge::new(fs.clone(), handle.clone());
            let external = RegistryExec { registry, fs, handle };
            let interp = Interp::new(&limits, &bridge, &external);

            match interp.execute_script(state, &parsed) {
                Ok(result) => result,
                Err(Interrupt::Exit(exit)) => {
                    state.set_exit_code(exit.code);
                    ExecResult::new(exit.stdout, exit.stderr, exit.code)
                }
                Err(mut interrupt) => {
                    let code = interrupt.exit_code();
                    state.set_exit_code(code);
                    let carried = interrupt.carried();
                    ExecResult::new(
                        carried.stdout().to_string(),
                        carried.stderr().to_string(),
                        code,
                    )
                }
            }
        })
    }

    pub fn register_command(&mut self, command: Arc<dyn crate::command::Command>) {
        let mut registry = CommandRegistry::new();
        for name in self.registry.names() {
            if let Some(existing) = self.registry.get(&name) {
                registry.register(existing);
            }
        }
        registry.register(command);
        self.registry = Arc::new(registry);
    }

    pub fn cwd(&self) -> &str {
        &self.state.cwd
    }

    pub fn last_exit_code(&self) -> i32 {
        self.state.last_exit_code
    }

    pub fn get_var(&self, name: &str) -> Option<String> {
        self.state.get_scalar(name)
    }

    pub async fn read_file(&self, path: &str) -> Result<String, FsError> {
        let resolved = self.fs.resolve_path(&self.state.cwd, path);
        self.fs.read_file(&resolved).await
    }

    pub async fn write_file(&self, path: &str, content: &str) -> Result<(), FsError> {
        let resolved = self.fs.resolve_path(&self.state.cwd, path);
        self.fs.write_file(&resolved, content.as_bytes(), &WriteOptions::default()).await
    }
}

/// Registry-backed external command execution for the engine.
struct RegistryExec {
    registry: Arc<CommandRegistry>,
    fs: Arc<dyn FileSystem>,
    handle: tokio::runtime::Handle,
}

impl ExternalExec for RegistryExec {
    fn contains(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    fn run(
        &self,
        name: &str,
        args: &[String],
        env: HashMap<String, String>,
        cwd: &str,
        stdin: &str,
    ) -> CommandResult {
        let command = match self.registry.get(name) {
            Some(command) => command,
            None => {
                return CommandResult::error(
                    format!("sandbash: {}: command not found\n", name),
                    127,
                )
            }
        };
        let ctx = CommandContext {
            args: args.to_vec(),
            stdin: stdin.to_string(),
            cwd: cwd.to_string(),
            env,
            fs: self.fs.clone(),
        };
        tokio::task::block_in_place(|| self.handle.block_on(command.execute(ctx)))
    }
}

/// Standard directory layout and device files.
async fn init_filesystem(fs: &dyn FileSystem, default_layout: bool) {
    let recursive = MkdirOptions { recursive: true, mode: None };
    let _ = fs.mkdir("/bin", &recursive).await;
    let _ = fs.mkdir("/usr/bin", &recursive).await;
    let _ = fs.mkdir("/tmp", &recursive).await;
    let _ = fs.mkdir("/dev/fd", &recursive).await;
    let _ = fs.write_file("/dev/null", b"", &WriteOptions::default()).await;
    if default_layout {
        let _ = fs.mkdir("/home/user", &recursive).await;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn defaults() {
        let shell = Shell::new(ShellConfig::default()).await;
        assert_eq!(shell.cwd(), "/home/user");
        assert_eq!(shell.get_var("HOME"), Some("/home/user".to_string()));
        assert!(shell.fs.exists("/tmp").await);
        assert!(shell.fs.exists("/dev/null").await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn exec_echo() {
        let mut shell = Shell::new(ShellConfig::default()).await;
        let result = shell.exec("echo hello").await;
        assert_eq!(result.stdout, "hello\n");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn state_persists_between_execs() {
        let mut shell = Shell::new(ShellConfig::default()).await;
        shell.exec("x=42").await;
        let result = shell.exec("echo $x").await;
        assert_eq!(result.stdout, "42\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cwd_persists() {
        let mut shell = Shell::new(ShellConfig::default()).await;
        shell.exec("cd /tmp").await;
        assert_eq!(shell.cwd(), "/tmp");
        let result = shell.exec("pwd").await;
        assert_eq!(result.stdout, "/tmp\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn syntax_error_is_exit_2() {
        let mut shell = Shell::new(ShellConfig::default()).await;
        let result = shell.exec("if then fi").await;
        assert_eq!(result.exit_code, 2);
        assert!(result.stderr.contains("syntax error"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn filesystem_roundtrip_through_redirections() {
        let mut shell = Shell::new(ShellConfig::default()).await;
        shell.exec("echo persisted > note.txt").await;
        let content = shell.read_file("note.txt").await.unwrap();
        assert_eq!(content, "persisted\n");
        let result = shell.exec("cat note.txt").await;
        assert_eq!(result.stdout, "persisted\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn exit_code_survives() {
        let mut shell = Shell::new(ShellConfig::default()).await;
        let result = shell.exec("exit 9").await;
        assert_eq!(result.exit_code, 9);
        assert_eq!(shell.last_exit_code(), 9);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn limit_breach_reports_137() {
        let mut shell = Shell::new(ShellConfig {
            limits: Some(ExecutionLimits { max_call_depth: 50, ..Default::default() }),
            ..Default::default()
        })
        .await;
        let result = shell.exec("f(){ f; }; f").await;
        assert_eq!(result.exit_code, 137);
        assert!(result.stderr.contains("call depth"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn custom_env() {
        let mut env = HashMap::new();
        env.insert("GREETING".to_string(), "hi".to_string());
        let mut shell = Shell::new(ShellConfig { env: Some(env), ..Default::default() }).await;
        let result = shell.exec("echo $GREETING").await;
        assert_eq!(result.stdout, "hi\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn scenario_table_examples() {
        let mut shell = Shell::new(ShellConfig::default()).await;

        let result = shell.exec("set -o pipefail; false | true; echo $?").await;
        assert_eq!(result.stdout, "1\n");

        let result = shell
            .exec("case hello.txt in *.md) echo md;; *.txt) echo txt;; *) echo other;; esac")
            .await;
        assert_eq!(result.stdout, "txt\n");

        let result = shell.exec("echo $(( 2#1010 + 16#FF ))").await;
        assert_eq!(result.stdout, "265\n");

        let result = shell.exec("arr=(a b c); echo \"${arr[@]:1:2}  ${#arr[@]}\"").await;
        assert_eq!(result.stdout, "b c  3\n");

        let result = shell.exec("v=HelloWorld; echo \"${v,,}  ${v^^}  ${#v}\"").await;
        assert_eq!(result.stdout, "helloworld  HELLOWORLD  10\n");
    }
}
