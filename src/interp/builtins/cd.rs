//! Directory state: `cd`, `pwd`, `umask`.

use crate::interp::engine::Interp;
use crate::interp::error::Interrupt;
use crate::interp::state::{ExecResult, ShellState};

pub fn run_cd(
    interp: &Interp<'_>,
    state: &mut ShellState,
    args: &[String],
) -> Result<ExecResult, Interrupt> {
    let target = match args.first().map(String::as_str) {
        None => match state.get_scalar("HOME") {
            Some(home) => home,
            None => return Ok(ExecResult::failure("sandbash: cd: HOME not set\n", 1)),
        },
        Some("-") => {
            if state.previous_dir.is_empty() {
                return Ok(ExecResult::failure("sandbash: cd: OLDPWD not set\n", 1));
            }
            state.previous_dir.clone()
        }
        Some(path) => path.to_string(),
    };

    let resolved = interp.fs.resolve_path(&state.cwd, &target);
    if !interp.fs.is_dir(&resolved) {
        let reason = if interp.fs.exists(&resolved) { "Not a directory" } else { "No such file or directory" };
        return Ok(ExecResult::failure(format!("sandbash: cd: {}: {}\n", target, reason), 1));
    }

    state.previous_dir = std::mem::replace(&mut state.cwd, resolved.clone());
    let _ = state.set_scalar("OLDPWD", state.previous_dir.clone());
    let _ = state.set_scalar("PWD", resolved);

    // `cd -` echoes the new directory.
    if args.first().map(String::as_str) == Some("-") {
        return Ok(ExecResult::new(format!("{}\n", state.cwd), String::new(), 0));
    }
    Ok(ExecResult::ok())
}

pub fn run_pwd(state: &mut ShellState) -> Result<ExecResult, Interrupt> {
    Ok(ExecResult::new(format!("{}\n", state.cwd), String::new(), 0))
}

pub fn run_umask(state: &mut ShellState, args: &[String]) -> Result<ExecResult, Interrupt> {
    match args.first() {
        None => Ok(ExecResult::new(format!("{:04o}\n", state.umask), String::new(), 0)),
        Some(text) => match u32::from_str_radix(text, 8) {
            Ok(mask) if mask <= 0o777 => {
                state.umask = mask;
                Ok(ExecResult::ok())
            }
            _ => Ok(ExecResult::failure(
                format!("sandbash: umask: {}: octal number out of range\n", text),
                1,
            )),
        },
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::interp::testkit::run;

    #[test]
    fn cd_and_pwd() {
        let out = run("mkdirs /work; cd /work; pwd");
        assert_eq!(out.stdout, "/work\n");
    }

    #[test]
    fn cd_relative() {
        let out = run("mkdirs /a/b; cd /a; cd b; pwd");
        assert_eq!(out.stdout, "/a/b\n");
    }

    #[test]
    fn cd_dash_returns_and_echoes() {
        let out = run("mkdirs /one /two; cd /one; cd /two; cd -; pwd");
        assert_eq!(out.stdout, "/one\n/one\n");
    }

    #[test]
    fn cd_missing_directory() {
        let out = run("cd /does/not/exist; echo $?");
        assert!(out.stderr.contains("No such file or directory"));
        assert_eq!(out.stdout, "1\n");
    }

    #[test]
    fn cd_home_default() {
        let out = run("mkdirs /home/user; HOME=/home/user; cd; pwd");
        assert_eq!(out.stdout, "/home/user\n");
    }

    #[test]
    fn cd_updates_pwd_vars() {
        let out = run("mkdirs /spot; cd /spot; echo $PWD; echo $OLDPWD");
        assert_eq!(out.stdout, "/spot\n/\n");
    }

    #[test]
    fn umask_print_and_set() {
        let out = run("umask 027; umask");
        assert_eq!(out.stdout, "0027\n");
    }
}
