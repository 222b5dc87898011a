//! Filesystem interface types.

use std::time::SystemTime;

use async_trait::async_trait;
use thiserror::Error;

/// Filesystem errors, shaped like errno reports.
#[derive(Error, Debug, Clone)]
pub enum FsError {
    #[error("ENOENT: no such file or directory, {operation} '{path}'")]
    NotFound { path: String, operation: String },

    #[error("EEXIST: file already exists, {operation} '{path}'")]
    AlreadyExists { path: String, operation: String },

    #[error("EISDIR: illegal operation on a directory, {operation} '{path}'")]
    IsDirectory { path: String, operation: String },

    #[error("ENOTDIR: not a directory, {operation} '{path}'")]
    NotDirectory { path: String, operation: String },

    #[error("ENOTEMPTY: directory not empty, {operation} '{path}'")]
    NotEmpty { path: String, operation: String },

    #[error("ELOOP: too many levels of symbolic links, {operation} '{path}'")]
    SymlinkLoop { path: String, operation: String },

    #[error("EINVAL: invalid argument, {operation} '{path}'")]
    InvalidArgument { path: String, operation: String },

    #[error("{message}")]
    Other { message: String },
}

impl FsError {
    pub fn not_found(operation: &str, path: &str) -> Self {
        Self::NotFound { path: path.to_string(), operation: operation.to_string() }
    }
}

/// Metadata for a path.
#[derive(Debug, Clone)]
pub struct FsStat {
    pub is_file: bool,
    pub is_directory: bool,
    pub is_symlink: bool,
    pub mode: u32,
    pub size: u64,
    pub mtime: SystemTime,
}

/// One directory entry with type information.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub is_file: bool,
    pub is_directory: bool,
    pub is_symlink: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    pub append: bool,
    pub mode: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MkdirOptions {
    pub recursive: bool,
    pub mode: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RmOptions {
    pub recursive: bool,
    pub force: bool,
}

/// The pluggable filesystem backend the shell runs against.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Resolve `path` relative to `base` without touching the store.
    fn resolve_path(&self, base: &str, path: &str) -> String;

    async fn stat(&self, path: &str) -> Result<FsStat, FsError>;
    async fn lstat(&self, path: &str) -> Result<FsStat, FsError>;
    async fn exists(&self, path: &str) -> bool;

    async fn read_file(&self, path: &str) -> Result<String, FsError>;
    async fn read_file_bytes(&self, path: &str) -> Result<Vec<u8>, FsError>;
    async fn write_file(&self, path: &str, data: &[u8], options: &WriteOptions) -> Result<(), FsError>;

    async fn readdir(&self, path: &str) -> Result<Vec<String>, FsError>;
    async fn readdir_with_file_types(&self, path: &str) -> Result<Vec<DirEntry>, FsError>;

    async fn mkdir(&self, path: &str, options: &MkdirOptions) -> Result<(), FsError>;
    async fn rm(&self, path: &str, options: &RmOptions) -> Result<(), FsError>;

    async fn symlink(&self, target: &str, path: &str) -> Result<(), FsError>;
    async fn readlink(&self, path: &str) -> Result<String, FsError>;

    async fn chmod(&self, path: &str, mode: u32) -> Result<(), FsError>;
    async fn rename(&self, src: &str, dst: &str) -> Result<(), FsError>;
}
