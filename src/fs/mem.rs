//! In-memory filesystem backend.
//!
//! Entries are stored in a flat map keyed by normalized absolute path.
//! Symlinks resolve with a hop cap; directory listings scan the keyspace.

use std::collections::HashMap;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::fs::types::{
    DirEntry, FileSystem, FsError, FsStat, MkdirOptions, RmOptions, WriteOptions,
};
use crate::fs::resolve_path;

const MAX_SYMLINK_HOPS: usize = 40;

#[derive(Debug, Clone)]
enum Entry {
    File { content: Vec<u8>, mode: u32, mtime: SystemTime },
    Dir { mode: u32, mtime: SystemTime },
    Symlink { target: String, mode: u32, mtime: SystemTime },
}

impl Entry {
    fn stat(&self, size_override: Option<u64>) -> FsStat {
        match self {
            Entry::File { content, mode, mtime } => FsStat {
                is_file: true,
                is_directory: false,
                is_symlink: false,
                mode: *mode,
                size: size_override.unwrap_or(content.len() as u64),
                mtime: *mtime,
            },
            Entry::Dir { mode, mtime } => FsStat {
                is_file: false,
                is_directory: true,
                is_symlink: false,
                mode: *mode,
                size: 0,
                mtime: *mtime,
            },
            Entry::Symlink { target, mode, mtime } => FsStat {
                is_file: false,
                is_directory: false,
                is_symlink: true,
                mode: *mode,
                size: target.len() as u64,
                mtime: *mtime,
            },
        }
    }
}

/// The default in-memory store.
pub struct MemFs {
    entries: RwLock<HashMap<String, Entry>>,
}

impl Default for MemFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemFs {
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert("/".to_string(), Entry::Dir { mode: 0o755, mtime: SystemTime::now() });
        Self { entries: RwLock::new(entries) }
    }

    fn parent_of(path: &str) -> String {
        match path.rfind('/') {
            Some(0) => "/".to_string(),
            Some(idx) => path[..idx].to_string(),
            None => "/".to_string(),
        }
    }

    fn basename_of(path: &str) -> &str {
        path.rsplit('/').next().unwrap_or("")
    }

    /// Follow symlinks in every component (and, when `follow_last`, the
    /// final one) to a canonical path.
    fn canonicalize(
        entries: &HashMap<String, Entry>,
        path: &str,
        follow_last: bool,
    ) -> Result<String, FsError> {
        let mut hops = 0;
        let mut current = resolve_path("/", path);
        'outer: loop {
            let parts: Vec<String> =
                current.split('/').filter(|p| !p.is_empty()).map(str::to_string).collect();
            let mut built = String::new();
            for (i, part) in parts.iter().enumerate() {
                built.push('/');
                built.push_str(part);
                let is_last = i == parts.len() - 1;
                if let Some(Entry::Symlink { target, .. }) = entries.get(&built) {
                    if is_last && !follow_last {
                        continue;
                    }
                    hops += 1;
                    if hops > MAX_SYMLINK_HOPS {
                        return Err(FsError::SymlinkLoop {
                            path: path.to_string(),
                            operation: "stat".to_string(),
                        });
                    }
                    let parent = Self::parent_of(&built);
                    let resolved = resolve_path(&parent, target);
                    let rest: String = parts[i + 1..].join("/");
                    current = if rest.is_empty() {
                        resolved
                    } else {
                        format!("{}/{}", resolved.trim_end_matches('/'), rest)
                    };
                    continue 'outer;
                }
            }
            return Ok(if built.is_empty() { "/".to_string() } else { built });
        }
    }

    async fn resolved(&self, path: &str, follow_last: bool) -> Result<String, FsError> {
        let entries = self.entries.read().await;
        Self::canonicalize(&entries, path, follow_last)
    }

    fn require_parent_dir(
        entries: &HashMap<String, Entry>,
        path: &str,
        operation: &str,
    ) -> Result<(), FsError> {
        let parent = Self::parent_of(path);
        match entries.get(&parent) {
            Some(Entry::Dir { .. }) => Ok(()),
            Some(_) => {
                Err(FsError::NotDirectory { path: parent, operation: operation.to_string() })
            }
            None => Err(FsError::not_found(operation, path)),
        }
    }
}

#[async_trait]
impl FileSystem for MemFs {
    fn resolve_path(&self, base: &str, path: &str) -> String {
        resolve_path(base, path)
    }

    async fn stat(&self, path: &str) -> Result<FsStat, FsError> {
        let entries = self.entries.read().await;
        let canonical = Self::canonicalize(&entries, path, true)?;
        match entries.get(&canonical) {
            Some(entry) => Ok(entry.stat(None)),
            None => Err(FsError::not_found("stat", path)),
        }
    }

    async fn lstat(&self, path: &str) -> Result<FsStat, FsError> {
        let entries = self.entries.read().await;
        let canonical = Self::canonicalize(&entries, path, false)?;
        match entries.get(&canonical) {
            Some(entry) => Ok(entry.stat(None)),
            None => Err(FsError::not_found("lstat", path)),
        }
    }

    async fn exists(&self, path: &str) -> bool {
        self.stat(path).await.is_ok()
    }

    async fn read_file(&self, path: &str) -> Result<String, FsError> {
        let bytes = self.read_file_bytes(path).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn read_file_bytes(&self, path: &str) -> Result<Vec<u8>, FsError> {
        let entries = self.entries.read().await;
        let canonical = Self::canonicalize(&entries, path, true)?;
        match entries.get(&canonical) {
            Some(Entry::File { content, .. }) => Ok(content.clone()),
            Some(Entry::Dir { .. }) => {
                Err(FsError::IsDirectory { path: path.to_string(), operation: "read".to_string() })
            }
            _ => Err(FsError::not_found("open", path)),
        }
    }

    async fn write_file(&self, path: &str, data: &[u8], options: &WriteOptions) -> Result<(), FsError> {
        let mut entries = self.entries.write().await;
        let canonical = Self::canonicalize(&entries, path, true)?;
        Self::require_parent_dir(&entries, &canonical, "open")?;
        match entries.get_mut(&canonical) {
            Some(Entry::Dir { .. }) => {
                Err(FsError::IsDirectory { path: path.to_string(), operation: "open".to_string() })
            }
            Some(Entry::File { content, mtime, .. }) => {
                if options.append {
                    content.extend_from_slice(data);
                } else {
                    *content = data.to_vec();
                }
                *mtime = SystemTime::now();
                Ok(())
            }
            _ => {
                entries.insert(
                    canonical,
                    Entry::File {
                        content: data.to_vec(),
                        mode: options.mode.unwrap_or(0o644),
                        mtime: SystemTime::now(),
                    },
                );
                Ok(())
            }
        }
    }

    async fn readdir(&self, path: &str) -> Result<Vec<String>, FsError> {
        Ok(self.readdir_with_file_types(path).await?.into_iter().map(|e| e.name).collect())
    }

    async fn readdir_with_file_types(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        let entries = self.entries.read().await;
        let canonical = Self::canonicalize(&entries, path, true)?;
        match entries.get(&canonical) {
            Some(Entry::Dir { .. }) => {}
            Some(_) => {
                return Err(FsError::NotDirectory {
                    path: path.to_string(),
                    operation: "scandir".to_string(),
                })
            }
            None => return Err(FsError::not_found("scandir", path)),
        }

        let prefix = if canonical == "/" { "/".to_string() } else { format!("{}/", canonical) };
        let mut out = Vec::new();
        for (key, entry) in entries.iter() {
            if let Some(rest) = key.strip_prefix(&prefix) {
                if rest.is_empty() || rest.contains('/') {
                    continue;
                }
                out.push(DirEntry {
                    name: rest.to_string(),
                    is_file: matches!(entry, Entry::File { .. }),
                    is_directory: matches!(entry, Entry::Dir { .. }),
                    is_symlink: matches!(entry, Entry::Symlink { .. }),
                });
            }
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn mkdir(&self, path: &str, options: &MkdirOptions) -> Result<(), FsError> {
        let mut entries = self.entries.write().await;
        let canonical = Self::canonicalize(&entries, path, true)?;
        if entries.contains_key(&canonical) {
            if options.recursive {
                return Ok(());
            }
            return Err(FsError::AlreadyExists { path: path.to_string(), operation: "mkdir".to_string() });
        }

        let mode = options.mode.unwrap_or(0o755);
        if options.recursive {
            let parts: Vec<&str> = canonical.split('/').filter(|p| !p.is_empty()).collect();
            let mut built = String::new();
            for part in parts {
                built.push('/');
                built.push_str(part);
                match entries.get(&built) {
                    Some(Entry::Dir { .. }) => {}
                    Some(_) => {
                        return Err(FsError::NotDirectory {
                            path: built,
                            operation: "mkdir".to_string(),
                        })
                    }
                    None => {
                        entries.insert(
                            built.clone(),
                            Entry::Dir { mode, mtime: SystemTime::now() },
                        );
                    }
                }
            }
            return Ok(());
        }

        Self::require_parent_dir(&entries, &canonical, "mkdir")?;
        entries.insert(canonical, Entry::Dir { mode, mtime: SystemTime::now() });
        Ok(())
    }

    async fn rm(&self, path: &str, options: &RmOptions) -> Result<(), FsError> {
        let mut entries = self.entries.write().await;
        let canonical = Self::canonicalize(&entries, path, false)?;
        match entries.get(&canonical) {
            None => {
                if options.force {
                    Ok(())
                } else {
                    Err(FsError::not_found("unlink", path))
                }
            }
            Some(Entry::Dir { .. }) => {
                let prefix = format!("{}/", canonical);
                let has_children = entries.keys().any(|k| k.starts_with(&prefix));
                if has_children && !options.recursive {
                    return Err(FsError::NotEmpty {
                        path: path.to_string(),
                        operation: "rmdir".to_string(),
                    });
                }
                entries.retain(|k, _| k != &canonical && !k.starts_with(&prefix));
                Ok(())
            }
            Some(_) => {
                entries.remove(&canonical);
                Ok(())
            }
        }
    }

    async fn symlink(&self, target: &str, path: &str) -> Result<(), FsError> {
        let mut entries = self.entries.write().await;
        let canonical = resolve_path("/", path);
        if entries.contains_key(&canonical) {
            return Err(FsError::AlreadyExists {
                path: path.to_string(),
                operation: "symlink".to_string(),
            });
        }
        Self::require_parent_dir(&entries, &canonical, "symlink")?;
        entries.insert(
            canonical,
            Entry::Symlink { target: target.to_string(), mode: 0o777, mtime: SystemTime::now() },
        );
        Ok(())
    }

    async fn readlink(&self, path: &str) -> Result<String, FsError> {
        let entries = self.entries.read().await;
        let canonical = Self::canonicalize(&entries, path, false)?;
        match entries.get(&canonical) {
            Some(Entry::Symlink { target, .. }) => Ok(target.clone()),
            Some(_) => Err(FsError::InvalidArgument {
                path: path.to_string(),
                operation: "readlink".to_string(),
            }),
            None => Err(FsError::not_found("readlink", path)),
        }
    }

    async fn chmod(&self, path: &str, new_mode: u32) -> Result<(), FsError> {
        let mut entries = self.entries.write().await;
        let canonical = Self::canonicalize(&entries, path, true)?;
        match entries.get_mut(&canonical) {
            Some(Entry::File { mode, .. })
            | Some(Entry::Dir { mode, .. })
            | Some(Entry::Symlink { mode, .. }) => {
                *mode = new_mode;
                Ok(())
            }
            None => Err(FsError::not_found("chmod", path)),
        }
    }

    async fn rename(&self, src: &str, dst: &str) -> Result<(), FsError> {
        let mut entries = self.entries.write().await;
        let from = Self::canonicalize(&entries, src, false)?;
        let to = resolve_path("/", dst);
        if !entries.contains_key(&from) {
            return Err(FsError::not_found("rename", src));
        }
        Self::require_parent_dir(&entries, &to, "rename")?;

        let moved: Vec<(String, Entry)> = entries
            .iter()
            .filter(|(k, _)| *k == &from || k.starts_with(&format!("{}/", from)))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, entry) in moved {
            let new_key = format!("{}{}", to, &key[from.len()..]);
            entries.remove(&key);
            entries.insert(new_key, entry);
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_and_read() {
        let fs = MemFs::new();
        fs.write_file("/hello.txt", b"hi", &WriteOptions::default()).await.unwrap();
        assert_eq!(fs.read_file("/hello.txt").await.unwrap(), "hi");
    }

    #[tokio::test]
    async fn append() {
        let fs = MemFs::new();
        fs.write_file("/log", b"a", &WriteOptions::default()).await.unwrap();
        fs.write_file("/log", b"b", &WriteOptions { append: true, mode: None }).await.unwrap();
        assert_eq!(fs.read_file("/log").await.unwrap(), "ab");
    }

    #[tokio::test]
    async fn write_requires_parent() {
        let fs = MemFs::new();
        let err = fs.write_file("/no/such/file", b"x", &WriteOptions::default()).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn mkdir_recursive_and_readdir() {
        let fs = MemFs::new();
        fs.mkdir("/a/b/c", &MkdirOptions { recursive: true, mode: None }).await.unwrap();
        fs.write_file("/a/b/f.txt", b"x", &WriteOptions::default()).await.unwrap();
        let names = fs.readdir("/a/b").await.unwrap();
        assert_eq!(names, vec!["c".to_string(), "f.txt".to_string()]);
    }

    #[tokio::test]
    async fn readdir_is_sorted() {
        let fs = MemFs::new();
        fs.mkdir("/d", &MkdirOptions::default()).await.unwrap();
        for name in ["zeta", "alpha", "mid"] {
            fs.write_file(&format!("/d/{}", name), b"", &WriteOptions::default()).await.unwrap();
        }
        assert_eq!(fs.readdir("/d").await.unwrap(), vec!["alpha", "mid", "zeta"]);
    }

    #[tokio::test]
    async fn rm_recursive() {
        let fs = MemFs::new();
        fs.mkdir("/d/sub", &MkdirOptions { recursive: true, mode: None }).await.unwrap();
        fs.write_file("/d/sub/f", b"x", &WriteOptions::default()).await.unwrap();
        assert!(fs.rm("/d", &RmOptions::default()).await.is_err());
        fs.rm("/d", &RmOptions { recursive: true, force: false }).await.unwrap();
        assert!(!fs.exists("/d").await);
    }

    #[tokio::test]
    async fn symlink_follow_and_lstat() {
        let fs = MemFs::new();
        fs.write_file("/real.txt", b"data", &WriteOptions::default()).await.unwrap();
        fs.symlink("/real.txt", "/link.txt").await.unwrap();

        let followed = fs.stat("/link.txt").await.unwrap();
        assert!(followed.is_file);
        let not_followed = fs.lstat("/link.txt").await.unwrap();
        assert!(not_followed.is_symlink);
        assert_eq!(fs.read_file("/link.txt").await.unwrap(), "data");
        assert_eq!(fs.readlink("/link.txt").await.unwrap(), "/real.txt");
    }

    #[tokio::test]
    async fn symlink_loop_detected() {
        let fs = MemFs::new();
        fs.symlink("/b", "/a").await.unwrap();
        fs.symlink("/a", "/b").await.unwrap();
        assert!(matches!(fs.stat("/a").await, Err(FsError::SymlinkLoop { .. })));
    }

    #[tokio::test]
    async fn relative_symlink_target() {
        let fs = MemFs::new();
        fs.mkdir("/dir", &MkdirOptions::default()).await.unwrap();
        fs.write_file("/dir/file", b"x", &WriteOptions::default()).await.unwrap();
        fs.symlink("file", "/dir/link").await.unwrap();
        assert_eq!(fs.read_file("/dir/link").await.unwrap(), "x");
    }

    #[tokio::test]
    async fn rename_moves_subtree() {
        let fs = MemFs::new();
        fs.mkdir("/src/sub", &MkdirOptions { recursive: true, mode: None }).await.unwrap();
        fs.write_file("/src/sub/f", b"x", &WriteOptions::default()).await.unwrap();
        fs.rename("/src", "/dst").await.unwrap();
        assert!(!fs.exists("/src").await);
        assert_eq!(fs.read_file("/dst/sub/f").await.unwrap(), "x");
    }

    #[tokio::test]
    async fn chmod_updates_mode() {
        let fs = MemFs::new();
        fs.write_file("/f", b"", &WriteOptions::default()).await.unwrap();
        fs.chmod("/f", 0o755).await.unwrap();
        assert_eq!(fs.stat("/f").await.unwrap().mode, 0o755);
    }
}
