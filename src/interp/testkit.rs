//! Test support: a synchronous in-memory filesystem and a tiny external
//! command set, so interpreter tests run without an async runtime.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::command::CommandResult;
use crate::fs::types::{DirEntry, FsError, FsStat};
use crate::fs::{resolve_path, SyncFs};
use crate::interp::engine::{ExternalExec, Interp};
use crate::interp::limits::ExecutionLimits;
use crate::interp::error::CarriesOutput;
use crate::interp::state::{ExecResult, ShellState};

/// Plain synchronous in-memory store for interpreter tests.
pub struct TestFs {
    files: Mutex<HashMap<String, (String, SystemTime)>>,
    dirs: Mutex<HashSet<String>>,
}

impl TestFs {
    pub fn new() -> Self {
        let mut dirs = HashSet::new();
        dirs.insert("/".to_string());
        dirs.insert("/dev".to_string());
        dirs.insert("/dev/fd".to_string());
        dirs.insert("/tmp".to_string());
        Self { files: Mutex::new(HashMap::new()), dirs: Mutex::new(dirs) }
    }

    /// Contents of a file, empty if missing.
    pub fn file(&self, path: &str) -> String {
        self.files.lock().unwrap().get(path).map(|(c, _)| c.clone()).unwrap_or_default()
    }

    pub fn mkdir_all(&self, path: &str) {
        let normalized = resolve_path("/", path);
        let mut dirs = self.dirs.lock().unwrap();
        let parts: Vec<&str> = normalized.split('/').filter(|p| !p.is_empty()).collect();
        let mut built = String::new();
        for part in parts {
            built.push('/');
            built.push_str(part);
            dirs.insert(built.clone());
        }
    }
}

impl SyncFs for TestFs {
    fn resolve_path(&self, base: &str, path: &str) -> String {
        resolve_path(base, path)
    }

    fn exists(&self, path: &str) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    fn is_dir(&self, path: &str) -> bool {
        self.dirs.lock().unwrap().contains(path)
    }

    fn is_file(&self, path: &str) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn stat(&self, path: &str) -> Result<FsStat, FsError> {
        if let Some((content, mtime)) = self.files.lock().unwrap().get(path) {
            return Ok(FsStat {
                is_file: true,
                is_directory: false,
                is_symlink: false,
                mode: 0o644,
                size: content.len() as u64,
                mtime: *mtime,
            });
        }
        if self.is_dir(path) {
            return Ok(FsStat {
                is_file: false,
                is_directory: true,
                is_symlink: false,
                mode: 0o755,
                size: 0,
                mtime: SystemTime::UNIX_EPOCH,
            });
        }
        Err(FsError::not_found("stat", path))
    }

    fn lstat(&self, path: &str) -> Result<FsStat, FsError> {
        self.stat(path)
    }

    fn read_file(&self, path: &str) -> Result<String, FsError> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .map(|(c, _)| c.clone())
            .ok_or_else(|| FsError::not_found("open", path))
    }

    fn write_file(&self, path: &str, data: &str, append: bool) -> Result<(), FsError> {
        let parent = match path.rfind('/') {
            Some(0) | None => "/".to_string(),
            Some(idx) => path[..idx].to_string(),
        };
        if !self.is_dir(&parent) {
            return Err(FsError::not_found("open", path));
        }
        let mut files = self.files.lock().unwrap();
        let entry = files.entry(path.to_string());
        match entry {
            std::collections::hash_map::Entry::Occupied(mut slot) => {
                let (content, mtime) = slot.get_mut();
                if append {
                    content.push_str(data);
                } else {
                    *content = data.to_string();
                }
                *mtime = SystemTime::now();
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert((data.to_string(), SystemTime::now()));
            }
        }
        Ok(())
    }

    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        if !self.is_dir(path) {
            return Err(FsError::not_found("scandir", path));
        }
        let prefix = if path == "/" { "/".to_string() } else { format!("{}/", path) };
        let mut out: Vec<DirEntry> = Vec::new();
        for file in self.files.lock().unwrap().keys() {
            if let Some(rest) = file.strip_prefix(&prefix) {
                if !rest.is_empty() && !rest.contains('/') {
                    out.push(DirEntry {
                        name: rest.to_string(),
                        is_file: true,
                        is_directory: false,
                        is_symlink: false,
                    });
                }
            }
        }
        for dir in self.dirs.lock().unwrap().iter() {
            if let Some(rest) = dir.strip_prefix(&prefix) {
                if !rest.is_empty() && !rest.contains('/') {
                    out.push(DirEntry {
                        name: rest.to_string(),
                        is_file: false,
                        is_directory: true,
                        is_symlink: false,
                    });
                }
            }
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }
}

/// `cat` plus a `mkdirs` helper for seeding directories in tests.
pub struct TestCommands {
    fs: Arc<TestFs>,
}

impl ExternalExec for TestCommands {
    fn contains(&self, name: &str) -> bool {
        matches!(name, "cat" | "mkdirs")
    }

    fn run(
        &self,
        name: &str,
        args: &[String],
        _env: HashMap<String, String>,
        cwd: &str,
        stdin: &str,
    ) -> CommandResult {
        match name {
            "cat" => {
                if args.is_empty() {
                    return CommandResult::success(stdin.to_string());
                }
                let mut out = String::new();
                for arg in args {
                    if arg == "-" {
                        out.push_str(stdin);
                        continue;
                    }
                    let path = resolve_path(cwd, arg);
                    match self.fs.read_file(&path) {
                        Ok(content) => out.push_str(&content),
                        Err(_) => {
                            return CommandResult::error(
                                format!("cat: {}: No such file or directory\n", arg),
                                1,
                            )
                        }
                    }
                }
                CommandResult::success(out)
            }
            "mkdirs" => {
                for arg in args {
                    self.fs.mkdir_all(&resolve_path(cwd, arg));
                }
                CommandResult::success(String::new())
            }
            _ => CommandResult::error(format!("sandbash: {}: command not found\n", name), 127),
        }
    }
}

pub fn run(script: &str) -> ExecResult {
    run_full(script, ExecutionLimits::default()).0
}

pub fn run_with_limits(script: &str, limits: ExecutionLimits) -> ExecResult {
    run_full(script, limits).0
}

pub fn run_in(script: &str) -> (ExecResult, Arc<TestFs>) {
    run_full(script, ExecutionLimits::default())
}

fn run_full(script: &str, limits: ExecutionLimits) -> (ExecResult, Arc<TestFs>) {
    let fs = Arc::new(TestFs::new());
    let commands = TestCommands { fs: fs.clone() };
    let interp = Interp::new(&limits, fs.as_ref(), &commands);
    let mut state = ShellState::default();

    let result = match crate::parser::parse_with_limit(script, limits.max_input_bytes) {
        Ok(ast) => match interp.execute_script(&mut state, &ast) {
            Ok(result) => result,
            Err(mut interrupt) => {
                let code = interrupt.exit_code();
                let carried = interrupt.carried();
                ExecResult::new(carried.stdout().to_string(), carried.stderr().to_string(), code)
            }
        },
        Err(e) => ExecResult::failure(format!("sandbash: syntax error: {}\n", e), 2),
    };
    (result, fs)
}
