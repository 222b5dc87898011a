//! `set`, `shopt`, `shift`.

use crate::expand::quote::declare_form;
use crate::interp::error::Interrupt;
use crate::interp::state::{ExecResult, ShellState, Value};

const SET_O_NAMES: &[(&str, char)] = &[
    ("allexport", 'a'),
    ("errexit", 'e'),
    ("monitor", 'm'),
    ("noclobber", 'C'),
    ("noexec", 'n'),
    ("noglob", 'f'),
    ("nounset", 'u'),
    ("pipefail", '\0'),
    ("posix", '\0'),
    ("verbose", 'v'),
    ("xtrace", 'x'),
];

fn apply_set_flag(state: &mut ShellState, flag: char, enable: bool) -> bool {
    match flag {
        'a' => state.options.allexport = enable,
        'e' => state.options.errexit = enable,
        'f' => state.options.noglob = enable,
        'm' => state.options.monitor = enable,
        'n' => state.options.noexec = enable,
        'u' => state.options.nounset = enable,
        'v' => state.options.verbose = enable,
        'x' => state.options.xtrace = enable,
        'C' => state.options.noclobber = enable,
        _ => return false,
    }
    true
}

fn apply_set_option(state: &mut ShellState, name: &str, enable: bool) -> bool {
    match name {
        "allexport" => state.options.allexport = enable,
        "errexit" => state.options.errexit = enable,
        "monitor" => state.options.monitor = enable,
        "noclobber" => state.options.noclobber = enable,
        "noexec" => state.options.noexec = enable,
        "noglob" => state.options.noglob = enable,
        "nounset" => state.options.nounset = enable,
        "pipefail" => state.options.pipefail = enable,
        "posix" => state.options.posix = enable,
        "verbose" => state.options.verbose = enable,
        "xtrace" => state.options.xtrace = enable,
        _ => return false,
    }
    true
}

fn option_value(state: &ShellState, name: &str) -> bool {
    match name {
        "allexport" => state.options.allexport,
        "errexit" => state.options.errexit,
        "monitor" => state.options.monitor,
        "noclobber" => state.options.noclobber,
        "noexec" => state.options.noexec,
        "noglob" => state.options.noglob,
        "nounset" => state.options.nounset,
        "pipefail" => state.options.pipefail,
        "posix" => state.options.posix,
        "verbose" => state.options.verbose,
        "xtrace" => state.options.xtrace,
        _ => false,
    }
}

pub fn run_set(state: &mut ShellState, args: &[String]) -> Result<ExecResult, Interrupt> {
    if args.is_empty() {
        return Ok(ExecResult::new(print_variables(state), String::new(), 0));
    }

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        match arg.as_str() {
            "--" => {
                state.positional = args[i + 1..].to_vec();
                return Ok(ExecResult::ok());
            }
            "-" => {
                state.positional = args[i + 1..].to_vec();
                return Ok(ExecResult::ok());
            }
            "-o" | "+o" => {
                let enable = arg.starts_with('-');
                match args.get(i + 1) {
                    None => {
                        let mut out = String::new();
                        for (name, _) in SET_O_NAMES {
                            let on = option_value(state, name);
                            out.push_str(&format!(
                                "{:<15} {}\n",
                                name,
                                if on { "on" } else { "off" }
                            ));
                        }
                        return Ok(ExecResult::new(out, String::new(), 0));
                    }
                    Some(name) => {
                        if !apply_set_option(state, name, enable) {
                            return Ok(ExecResult::failure(
                                format!("sandbash: set: {}: invalid option name\n", name),
                                2,
                            ));
                        }
                        i += 2;
                    }
                }
            }
            flags if flags.starts_with('-') || flags.starts_with('+') => {
                let enable = flags.starts_with('-');
                for flag in flags.chars().skip(1) {
                    if !apply_set_flag(state, flag, enable) {
                        return Ok(ExecResult::failure(
                            format!("sandbash: set: {}{}: invalid option", if enable { "-" } else { "+" }, flag)
                                + "\n",
                            2,
                        ));
                    }
                }
                i += 1;
            }
            _ => {
                // First non-option argument: everything becomes $1…
                state.positional = args[i..].to_vec();
                return Ok(ExecResult::ok());
            }
        }
    }
    Ok(ExecResult::ok())
}

fn print_variables(state: &ShellState) -> String {
    let mut names: Vec<&String> = state.env.keys().collect();
    names.sort();
    let mut out = String::new();
    for name in names {
        let var = &state.env[name.as_str()];
        match &var.value {
            Value::Scalar(s) => {
                out.push_str(&format!("{}={}\n", name, crate::expand::quote::shell_quote(s)));
            }
            value => {
                out.push_str(&declare_form(name, value, &var.flags));
                out.push('\n');
            }
        }
    }
    out
}

pub fn run_shopt(state: &mut ShellState, args: &[String]) -> Result<ExecResult, Interrupt> {
    let mut mode: Option<char> = None;
    let mut quiet = false;
    let mut names = Vec::new();

    for arg in args {
        match arg.as_str() {
            "-s" => mode = Some('s'),
            "-u" => mode = Some('u'),
            "-q" => quiet = true,
            "-p" => {}
            flag if flag.starts_with('-') => {
                return Ok(ExecResult::failure(
                    format!("sandbash: shopt: {}: invalid option\n", flag),
                    2,
                ))
            }
            name => names.push(name.to_string()),
        }
    }

    let all = [
        "dotglob",
        "extglob",
        "failglob",
        "globskipdots",
        "globstar",
        "lastpipe",
        "nocaseglob",
        "nocasematch",
        "nullglob",
    ];

    if names.is_empty() {
        let mut out = String::new();
        for name in all {
            let on = shopt_value(state, name).unwrap_or(false);
            out.push_str(&format!("{:<15}\t{}\n", name, if on { "on" } else { "off" }));
        }
        return Ok(ExecResult::new(out, String::new(), 0));
    }

    let mut out = String::new();
    let mut code = 0;
    for name in &names {
        match mode {
            Some(enable) => {
                if !set_shopt(state, name, enable == 's') {
                    return Ok(ExecResult::failure(
                        format!("sandbash: shopt: {}: invalid shell option name\n", name),
                        1,
                    ));
                }
            }
            None => match shopt_value(state, name) {
                Some(on) => {
                    if !on {
                        code = 1;
                    }
                    if !quiet {
                        out.push_str(&format!("{:<15}\t{}\n", name, if on { "on" } else { "off" }));
                    }
                }
                None => {
                    return Ok(ExecResult::failure(
                        format!("sandbash: shopt: {}: invalid shell option name\n", name),
                        1,
                    ))
                }
            },
        }
    }
    Ok(ExecResult::new(out, String::new(), code))
}

fn set_shopt(state: &mut ShellState, name: &str, enable: bool) -> bool {
    match name {
        "extglob" => state.shopts.extglob = enable,
        "dotglob" => state.shopts.dotglob = enable,
        "nullglob" => state.shopts.nullglob = enable,
        "failglob" => state.shopts.failglob = enable,
        "globstar" => state.shopts.globstar = enable,
        "globskipdots" => state.shopts.globskipdots = enable,
        "nocaseglob" => state.shopts.nocaseglob = enable,
        "nocasematch" => state.shopts.nocasematch = enable,
        "lastpipe" => state.shopts.lastpipe = enable,
        _ => return false,
    }
    true
}

fn shopt_value(state: &ShellState, name: &str) -> Option<bool> {
    Some(match name {
        "extglob" => state.shopts.extglob,
        "dotglob" => state.shopts.dotglob,
        "nullglob" => state.shopts.nullglob,
        "failglob" => state.shopts.failglob,
        "globstar" => state.shopts.globstar,
        "globskipdots" => state.shopts.globskipdots,
        "nocaseglob" => state.shopts.nocaseglob,
        "nocasematch" => state.shopts.nocasematch,
        "lastpipe" => state.shopts.lastpipe,
        _ => return None,
    })
}

pub fn run_shift(state: &mut ShellState, args: &[String]) -> Result<ExecResult, Interrupt> {
    let count = match args.first() {
        None => 1,
        Some(text) => match text.parse::<i64>() {
            Ok(n) if n >= 0 => n as usize,
            _ => {
                return Ok(ExecResult::failure(
                    format!("sandbash: shift: {}: numeric argument required\n", text),
                    1,
                ))
            }
        },
    };

    if count > state.positional.len() {
        return Ok(ExecResult::code(1));
    }
    state.positional.drain(..count);
    Ok(ExecResult::ok())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::interp::testkit::run;

    #[test]
    fn set_positional_params() {
        let out = run("set -- a b c; echo $1 $2 $3 $#");
        assert_eq!(out.stdout, "a b c 3\n");
    }

    #[test]
    fn set_options_toggle() {
        let out = run("set -e; set +e; false; echo survived");
        assert_eq!(out.stdout, "survived\n");
    }

    #[test]
    fn set_combined_flags() {
        let out = run("set -eu; [[ -o errexit && -o nounset ]]; echo $?");
        assert_eq!(out.stdout, "0\n");
    }

    #[test]
    fn set_o_pipefail() {
        let out = run("set -o pipefail; false | true; echo $?");
        assert_eq!(out.stdout, "1\n");
    }

    #[test]
    fn set_o_listing() {
        let out = run("set -o");
        assert!(out.stdout.contains("errexit"));
        assert!(out.stdout.contains("off"));
    }

    #[test]
    fn shopt_set_and_query() {
        let out = run("shopt -s extglob; shopt extglob");
        assert!(out.stdout.contains("on"));
        let out = run("shopt extglob; echo code=$?");
        assert!(out.stdout.contains("off"));
        assert!(out.stdout.contains("code=1"));
    }

    #[test]
    fn shopt_unknown_name() {
        let out = run("shopt -s nosuchopt");
        assert_eq!(out.exit_code, 1);
    }

    #[test]
    fn shift_moves_positionals() {
        let out = run("set -- a b c; shift; echo $1 $#");
        assert_eq!(out.stdout, "b 2\n");
        let out = run("set -- a b c; shift 2; echo $1");
        assert_eq!(out.stdout, "c\n");
    }

    #[test]
    fn shift_too_far_fails() {
        let out = run("set -- a; shift 5; echo $?");
        assert_eq!(out.stdout, "1\n");
    }

    #[test]
    fn set_prints_variables() {
        let out = run("zz_unique=value1; set | cat");
        assert!(out.stdout.contains("zz_unique=value1"));
    }
}
