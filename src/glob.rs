//! Pathname expansion.
//!
//! Walks the virtual filesystem segment by segment, compiling each
//! pattern segment through the shared pattern compiler. Honors
//! `dotglob`, `nullglob`/`failglob` (decided by the caller), `globstar`,
//! `globskipdots` and `nocaseglob`. Results are sorted lexicographically.

use crate::expand::pattern::{has_glob_chars, matches_pattern, PatternOptions};
use crate::fs::SyncFs;
use crate::interp::engine::Interp;
use crate::interp::state::{ShellState, ShoptOptions};

impl<'a> Interp<'a> {
    /// Expand one pattern field against the filesystem. Empty result
    /// means no match; the caller decides between literal fallback,
    /// nullglob and failglob.
    pub fn glob_pattern(&self, state: &ShellState, pattern: &str) -> Vec<String> {
        let absolute = pattern.starts_with('/');
        let trimmed = pattern.trim_start_matches('/');
        let mut segments: Vec<&str> = trimmed.split('/').collect();

        // A trailing slash restricts matches to directories.
        let mut require_dir = false;
        if segments.last() == Some(&"") {
            segments.pop();
            require_dir = true;
        }

        let start_dir = if absolute { "/".to_string() } else { state.cwd.clone() };
        let display = if absolute { "/".to_string() } else { String::new() };

        let mut matches = Vec::new();
        walk(
            self.fs,
            &state.shopts,
            &start_dir,
            &display,
            &segments,
            require_dir,
            &mut matches,
        );
        matches.sort();
        matches
    }
}

fn walk(
    fs: &dyn SyncFs,
    shopts: &ShoptOptions,
    dir: &str,
    display: &str,
    segments: &[&str],
    require_dir: bool,
    out: &mut Vec<String>,
) {
    let segment = match segments.first() {
        Some(segment) => *segment,
        None => return,
    };
    let rest = &segments[1..];
    let is_last = rest.is_empty();

    // `**` under globstar matches zero or more directory levels.
    if segment == "**" && shopts.globstar {
        if is_last {
            collect_recursive(fs, shopts, dir, display, require_dir, out);
        } else {
            walk(fs, shopts, dir, display, rest, require_dir, out);
        }
        let entries = match fs.read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => return,
        };
        for entry in entries {
            if !entry.is_directory {
                continue;
            }
            if entry.name.starts_with('.') && !shopts.dotglob {
                continue;
            }
            let child_dir = join(dir, &entry.name);
            let child_display = join_display(display, &entry.name);
            walk(fs, shopts, &child_dir, &child_display, segments, require_dir, out);
        }
        return;
    }

    // Literal segments descend without listing the directory.
    if !has_glob_chars(segment, shopts.extglob) {
        let name = unescape(segment);
        if name.is_empty() {
            return;
        }
        let child = join(dir, &name);
        let child_display = join_display(display, &name);
        if is_last {
            if fs.exists(&child) && (!require_dir || fs.is_dir(&child)) {
                out.push(finish_display(&child_display, require_dir));
            }
        } else if fs.is_dir(&child) {
            walk(fs, shopts, &child, &child_display, rest, require_dir, out);
        }
        return;
    }

    let opts = PatternOptions {
        extglob: shopts.extglob,
        case_insensitive: shopts.nocaseglob,
        ..Default::default()
    };
    let literal_dot = segment.starts_with('.');

    let entries = match fs.read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries {
        if entry.name.starts_with('.') && !shopts.dotglob && !literal_dot {
            continue;
        }
        if shopts.globskipdots && (entry.name == "." || entry.name == "..") {
            continue;
        }
        // matches_pattern handles whole-segment `!(…)` negation, which
        // has no regex translation here.
        if !matches_pattern(&entry.name, segment, &opts) {
            continue;
        }
        let child = join(dir, &entry.name);
        let child_display = join_display(display, &entry.name);
        if is_last {
            if !require_dir || entry.is_directory {
                out.push(finish_display(&child_display, require_dir));
            }
        } else if entry.is_directory {
            walk(fs, shopts, &child, &child_display, rest, require_dir, out);
        }
    }
}

/// All files and directories beneath `dir`, for a trailing `**`.
fn collect_recursive(
    fs: &dyn SyncFs,
    shopts: &ShoptOptions,
    dir: &str,
    display: &str,
    require_dir: bool,
    out: &mut Vec<String>,
) {
    let entries = match fs.read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries {
        if entry.name.starts_with('.') && !shopts.dotglob {
            continue;
        }
        let child = join(dir, &entry.name);
        let child_display = join_display(display, &entry.name);
        if !require_dir || entry.is_directory {
            out.push(finish_display(&child_display, require_dir));
        }
        if entry.is_directory {
            collect_recursive(fs, shopts, &child, &child_display, require_dir, out);
        }
    }
}

fn join(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", dir, name)
    }
}

fn join_display(display: &str, name: &str) -> String {
    if display.is_empty() {
        name.to_string()
    } else if display == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", display, name)
    }
}

fn finish_display(display: &str, require_dir: bool) -> String {
    if require_dir {
        format!("{}/", display)
    } else {
        display.to_string()
    }
}

fn unescape(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::interp::testkit::run_in;

    #[test]
    fn star_matches_in_cwd() {
        let (out, _) = run_in("echo 1 >/a.txt; echo 1 >/b.txt; echo 1 >/c.md; cd /; echo *.txt");
        assert_eq!(out.stdout, "a.txt b.txt\n");
    }

    #[test]
    fn question_and_class() {
        let (out, _) = run_in("echo 1 >/f1; echo 1 >/f2; echo 1 >/f10; cd /; echo f?; echo f[2-9]");
        assert_eq!(out.stdout, "f1 f2\nf2\n");
    }

    #[test]
    fn directory_segments() {
        let (out, _) = run_in("mkdirs /x/sub; echo 1 >/x/sub/a.txt; echo 1 >/x/b.txt; echo /x/*/*.txt");
        assert_eq!(out.stdout, "/x/sub/a.txt\n");
    }

    #[test]
    fn star_in_middle_segment() {
        let (out, _) = run_in("mkdirs /p/one /p/two; echo 1 >/p/one/f; echo 1 >/p/two/f; echo /p/*/f");
        assert_eq!(out.stdout, "/p/one/f /p/two/f\n");
    }

    #[test]
    fn dotfiles_hidden_by_default() {
        let (out, _) = run_in("echo 1 >/.hidden; echo 1 >/shown; cd /; echo *");
        assert!(!out.stdout.contains(".hidden"));
        assert!(out.stdout.contains("shown"));
    }

    #[test]
    fn dotglob_reveals() {
        let (out, _) = run_in("echo 1 >/.hidden; cd /; shopt -s dotglob; echo *hidden*");
        assert!(out.stdout.contains(".hidden"));
    }

    #[test]
    fn explicit_dot_prefix_matches() {
        let (out, _) = run_in("echo 1 >/.conf; cd /; echo .c*");
        assert_eq!(out.stdout, ".conf\n");
    }

    #[test]
    fn globstar_recurses() {
        let (out, _) = run_in(
            "mkdirs /r/a/b; echo 1 >/r/top.rs; echo 1 >/r/a/mid.rs; echo 1 >/r/a/b/deep.rs; shopt -s globstar; echo /r/**/*.rs",
        );
        assert_eq!(out.stdout, "/r/a/b/deep.rs /r/a/mid.rs /r/top.rs\n");
    }

    #[test]
    fn trailing_slash_selects_directories() {
        let (out, _) = run_in("mkdirs /w/d1 /w/d2; echo 1 >/w/file; cd /w; echo */");
        assert_eq!(out.stdout, "d1/ d2/\n");
    }

    #[test]
    fn extglob_filename_match() {
        let (out, _) = run_in(
            "echo 1 >/keep.rs; echo 1 >/skip.txt; echo 1 >/skip.md; cd /; shopt -s extglob; echo !(*.txt|*.md)",
        );
        assert!(out.stdout.contains("keep.rs"));
        assert!(!out.stdout.contains("skip.txt"));
    }

    #[test]
    fn nocaseglob() {
        let (out, _) = run_in("echo 1 >/README.TXT; cd /; shopt -s nocaseglob; echo *.txt");
        assert_eq!(out.stdout, "README.TXT\n");
    }

    #[test]
    fn relative_results_stay_relative() {
        let (out, _) = run_in("mkdirs /work; echo 1 >/work/x.c; cd /work; echo *.c");
        assert_eq!(out.stdout, "x.c\n");
    }
}
