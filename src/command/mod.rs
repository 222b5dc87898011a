//! External-command contract.
//!
//! Commands beyond the interpreter-coupled builtins plug in here: each
//! receives its parsed argv plus a `CommandContext` (filesystem handle,
//! cwd, a read-only env view and piped stdin) and returns stdout/stderr
//! and an exit code. The shell ships a minimal reference set; hosts
//! register their own implementations on the registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::fs::{FileSystem, WriteOptions};

#[derive(Debug, Clone, Default)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(stdout: String) -> Self {
        Self { stdout, stderr: String::new(), exit_code: 0 }
    }

    pub fn error(stderr: impl Into<String>, exit_code: i32) -> Self {
        Self { stdout: String::new(), stderr: stderr.into(), exit_code }
    }
}

/// Everything a command may touch.
pub struct CommandContext {
    pub args: Vec<String>,
    pub stdin: String,
    pub cwd: String,
    /// Exported variables, flattened to strings.
    pub env: HashMap<String, String>,
    pub fs: Arc<dyn FileSystem>,
}

#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self, ctx: CommandContext) -> CommandResult;
}

/// Name → implementation table.
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the reference commands.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Cat));
        registry
    }

    pub fn register(&mut self, command: Arc<dyn Command>) {
        self.commands.insert(command.name().to_string(), command);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.keys().cloned().collect();
        names.sort();
        names
    }
}

// =============================================================================
// Reference command: cat
// =============================================================================

/// `cat [-n] [file…]` — concatenate files or stdin.
pub struct Cat;

#[async_trait]
impl Command for Cat {
    fn name(&self) -> &'static str {
        "cat"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut number_lines = false;
        let mut files = Vec::new();
        for arg in &ctx.args {
            match arg.as_str() {
                "-n" => number_lines = true,
                "-" => files.push("-".to_string()),
                _ => files.push(arg.clone()),
            }
        }

        let mut out = String::new();
        if files.is_empty() {
            out.push_str(&ctx.stdin);
        } else {
            for file in &files {
                if file == "-" {
                    out.push_str(&ctx.stdin);
                    continue;
                }
                let path = ctx.fs.resolve_path(&ctx.cwd, file);
                match ctx.fs.read_file(&path).await {
                    Ok(content) => out.push_str(&content),
                    Err(_) => {
                        return CommandResult::error(
                            format!("cat: {}: No such file or directory\n", file),
                            1,
                        )
                    }
                }
            }
        }

        if number_lines {
            let mut numbered = String::new();
            for (i, line) in out.lines().enumerate() {
                numbered.push_str(&format!("{:>6}\t{}\n", i + 1, line));
            }
            out = numbered;
        }
        CommandResult::success(out)
    }
}

/// Convenience used by tests: write `content` at `path`, creating parents.
pub async fn seed_file(fs: &dyn FileSystem, path: &str, content: &str) {
    let parent = match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    };
    let _ = fs
        .mkdir(&parent, &crate::fs::MkdirOptions { recursive: true, mode: None })
        .await;
    let _ = fs.write_file(path, content.as_bytes(), &WriteOptions::default()).await;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFs;

    fn ctx(fs: Arc<dyn FileSystem>, args: &[&str], stdin: &str) -> CommandContext {
        CommandContext {
            args: args.iter().map(|s| s.to_string()).collect(),
            stdin: stdin.to_string(),
            cwd: "/".to_string(),
            env: HashMap::new(),
            fs,
        }
    }

    #[tokio::test]
    async fn cat_reads_stdin_without_args() {
        let fs: Arc<dyn FileSystem> = Arc::new(MemFs::new());
        let result = Cat.execute(ctx(fs, &[], "piped\n")).await;
        assert_eq!(result.stdout, "piped\n");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn cat_reads_files() {
        let fs: Arc<dyn FileSystem> = Arc::new(MemFs::new());
        seed_file(&*fs, "/a.txt", "one\n").await;
        seed_file(&*fs, "/b.txt", "two\n").await;
        let result = Cat.execute(ctx(fs, &["a.txt", "b.txt"], "")).await;
        assert_eq!(result.stdout, "one\ntwo\n");
    }

    #[tokio::test]
    async fn cat_missing_file() {
        let fs: Arc<dyn FileSystem> = Arc::new(MemFs::new());
        let result = Cat.execute(ctx(fs, &["nope"], "")).await;
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("No such file"));
    }

    #[test]
    fn registry_lookup() {
        let registry = CommandRegistry::with_defaults();
        assert!(registry.contains("cat"));
        assert!(!registry.contains("awk"));
        assert_eq!(registry.names(), vec!["cat".to_string()]);
    }
}
