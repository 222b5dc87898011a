//! Sync view of the async filesystem.
//!
//! The interpreter is a synchronous tree walker; this trait gives it the
//! handful of operations it needs, and `FsBridge` implements them over
//! the async `FileSystem` with `block_in_place` on a runtime handle.

use std::sync::Arc;

use crate::fs::types::{DirEntry, FileSystem, FsError, FsStat, WriteOptions};

/// The filesystem operations the interpreter itself performs:
/// redirections, globbing, `cd`, `[[ -f … ]]`, `source`.
pub trait SyncFs: Send + Sync {
    fn resolve_path(&self, base: &str, path: &str) -> String;
    fn exists(&self, path: &str) -> bool;
    fn is_dir(&self, path: &str) -> bool;
    fn is_file(&self, path: &str) -> bool;
    fn stat(&self, path: &str) -> Result<FsStat, FsError>;
    fn lstat(&self, path: &str) -> Result<FsStat, FsError>;
    fn read_file(&self, path: &str) -> Result<String, FsError>;
    fn write_file(&self, path: &str, data: &str, append: bool) -> Result<(), FsError>;
    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, FsError>;
}

/// Bridges async `FileSystem` calls into the sync interpreter.
pub struct FsBridge {
    inner: Arc<dyn FileSystem>,
    handle: tokio::runtime::Handle,
}

impl FsBridge {
    pub fn new(inner: Arc<dyn FileSystem>, handle: tokio::runtime::Handle) -> Self {
        Self { inner, handle }
    }

    fn wait<F, T>(&self, future: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        tokio::task::block_in_place(|| self.handle.block_on(future))
    }
}

impl SyncFs for FsBridge {
    fn resolve_path(&self, base: &str, path: &str) -> String {
        self.inner.resolve_path(base, path)
    }

    fn exists(&self, path: &str) -> bool {
        self.wait(self.inner.exists(path))
    }

    fn is_dir(&self, path: &str) -> bool {
        self.wait(self.inner.stat(path)).map(|s| s.is_directory).unwrap_or(false)
    }

    fn is_file(&self, path: &str) -> bool {
        self.wait(self.inner.stat(path)).map(|s| s.is_file).unwrap_or(false)
    }

    fn stat(&self, path: &str) -> Result<FsStat, FsError> {
        self.wait(self.inner.stat(path))
    }

    fn lstat(&self, path: &str) -> Result<FsStat, FsError> {
        self.wait(self.inner.lstat(path))
    }

    fn read_file(&self, path: &str) -> Result<String, FsError> {
        self.wait(self.inner.read_file(path))
    }

    fn write_file(&self, path: &str, data: &str, append: bool) -> Result<(), FsError> {
        let options = WriteOptions { append, mode: None };
        self.wait(self.inner.write_file(path, data.as_bytes(), &options))
    }

    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        self.wait(self.inner.readdir_with_file_types(path))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFs;

    #[tokio::test(flavor = "multi_thread")]
    async fn bridge_read_write() {
        let fs = Arc::new(MemFs::new());
        let bridge = FsBridge::new(fs, tokio::runtime::Handle::current());
        bridge.write_file("/f.txt", "hello", false).unwrap();
        assert_eq!(bridge.read_file("/f.txt").unwrap(), "hello");
        assert!(bridge.is_file("/f.txt"));
        assert!(!bridge.is_dir("/f.txt"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn bridge_read_dir() {
        let fs = Arc::new(MemFs::new());
        fs.write_file("/a.txt", b"", &WriteOptions::default()).await.unwrap();
        let bridge = FsBridge::new(fs, tokio::runtime::Handle::current());
        let entries = bridge.read_dir("/").unwrap();
        assert!(entries.iter().any(|e| e.name == "a.txt"));
    }
}
