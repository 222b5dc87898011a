//! `read` — line input from the piped stdin stream.

use std::collections::BTreeMap;

use crate::expand::split::split_by_ifs;
use crate::interp::error::Interrupt;
use crate::interp::state::{ExecResult, ShellState, Value, VarFlags, Variable};

pub fn run_read(state: &mut ShellState, args: &[String]) -> Result<ExecResult, Interrupt> {
    let mut raw = false;
    let mut array_name: Option<String> = None;
    let mut delimiter = '\n';
    let mut prompt: Option<String> = None;
    let mut names: Vec<String> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-r" => raw = true,
            "-a" => {
                i += 1;
                match args.get(i) {
                    Some(name) => array_name = Some(name.clone()),
                    None => {
                        return Ok(ExecResult::failure(
                            "sandbash: read: -a: option requires an argument\n",
                            2,
                        ))
                    }
                }
            }
            "-d" => {
                i += 1;
                delimiter = args.get(i).and_then(|d| d.chars().next()).unwrap_or('\0');
            }
            "-p" => {
                i += 1;
                prompt = args.get(i).cloned();
            }
            "-s" | "-e" => {}
            "--" => {
                names.extend(args[i + 1..].iter().cloned());
                break;
            }
            flag if flag.starts_with('-') => {
                return Ok(ExecResult::failure(
                    format!("sandbash: read: {}: invalid option\n", flag),
                    2,
                ))
            }
            name => names.push(name.to_string()),
        }
        i += 1;
    }

    let mut stderr = String::new();
    if let Some(p) = prompt {
        stderr.push_str(&p);
    }

    let (line, saw_delimiter) = match take_until(state, delimiter) {
        Some(pair) => pair,
        None => {
            // EOF: names still get cleared.
            for name in &names {
                let _ = state.set_scalar(name, "");
            }
            return Ok(ExecResult::new(String::new(), stderr, 1));
        }
    };

    let line = if raw { line } else { strip_backslashes(&line) };
    let exit_code = if saw_delimiter { 0 } else { 1 };

    if let Some(array) = array_name {
        let ifs = state.ifs();
        let mut map = BTreeMap::new();
        for (idx, field) in split_by_ifs(&line, &ifs).pieces.into_iter().enumerate() {
            map.insert(idx as i64, field);
        }
        state.write_binding(&array, Variable { value: Value::Indexed(map), flags: VarFlags::default() });
        return Ok(ExecResult::new(String::new(), stderr, exit_code));
    }

    if names.is_empty() {
        let _ = state.set_scalar("REPLY", line);
        return Ok(ExecResult::new(String::new(), stderr, exit_code));
    }

    let ifs = state.ifs();
    let assignments = split_for_read(&line, &ifs, names.len());
    for (name, value) in names.iter().zip(assignments.iter()) {
        if let Err(message) = state.set_scalar(name, value.clone()) {
            stderr.push_str(&format!("sandbash: read: {}\n", message));
            return Ok(ExecResult::new(String::new(), stderr, 1));
        }
    }
    for name in names.iter().skip(assignments.len()) {
        let _ = state.set_scalar(name, "");
    }

    Ok(ExecResult::new(String::new(), stderr, exit_code))
}

/// Consume input up to `delimiter`. Returns the chunk and whether the
/// delimiter was actually seen.
fn take_until(state: &mut ShellState, delimiter: char) -> Option<(String, bool)> {
    let stdin = state.current_stdin.as_mut()?;
    if stdin.is_empty() {
        return None;
    }
    match stdin.find(delimiter) {
        Some(idx) => {
            let line = stdin[..idx].to_string();
            *stdin = stdin[idx + delimiter.len_utf8()..].to_string();
            Some((line, true))
        }
        None => Some((std::mem::take(stdin), false)),
    }
}

/// Without `-r`, backslash escapes the next character and a trailing
/// backslash would continue the line (we only drop it here).
fn strip_backslashes(line: &str) -> String {
    let mut out = String::new();
    let mut chars = line.chars();
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

/// First `slots - 1` fields split normally; the final name takes the
/// remainder of the line with outer whitespace trimmed.
fn split_for_read(line: &str, ifs: &str, slots: usize) -> Vec<String> {
    if slots <= 1 {
        let trimmed = trim_ifs(line, ifs);
        return if trimmed.is_empty() && line.is_empty() { Vec::new() } else { vec![trimmed] };
    }

    let ws: Vec<char> = ifs.chars().filter(|c| c.is_whitespace()).collect();
    let mut rest = line.trim_start_matches(|c| ws.contains(&c)).to_string();
    let mut out = Vec::new();

    for _ in 0..slots - 1 {
        let split = split_by_ifs(&rest, ifs);
        if split.pieces.is_empty() {
            break;
        }
        let first = split.pieces[0].clone();
        // Drop the consumed field plus one delimiter run from the front.
        let after_field = &rest[first.len()..];
        let mut offset = 0;
        let chars: Vec<char> = after_field.chars().collect();
        let mut saw_hard = false;
        while offset < chars.len() {
            let c = chars[offset];
            if ifs.contains(c) {
                if !c.is_whitespace() {
                    if saw_hard {
                        break;
                    }
                    saw_hard = true;
                }
                offset += 1;
            } else {
                break;
            }
        }
        let byte_offset: usize = chars[..offset].iter().map(|c| c.len_utf8()).sum();
        rest = after_field[byte_offset..].to_string();
        out.push(first);
        if rest.is_empty() {
            break;
        }
    }

    if !rest.is_empty() || out.len() < slots {
        out.push(trim_ifs(&rest, ifs));
    }
    out
}

fn trim_ifs(text: &str, ifs: &str) -> String {
    let ws: Vec<char> = ifs.chars().filter(|c| c.is_whitespace()).collect();
    text.trim_matches(|c| ws.contains(&c)).to_string()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::interp::testkit::run;

    #[test]
    fn read_single_variable() {
        let out = run("echo 'hello world' | { read v; echo got:$v; }");
        assert_eq!(out.stdout, "got:hello world\n");
    }

    #[test]
    fn read_splits_across_names() {
        let out = run("echo 'a b c d' | { read x y; echo x=$x y=$y; }");
        assert_eq!(out.stdout, "x=a y=b c d\n");
    }

    #[test]
    fn read_reply_default() {
        let out = run("echo 'the line' | { read; echo $REPLY; }");
        assert_eq!(out.stdout, "the line\n");
    }

    #[test]
    fn read_eof_fails() {
        let out = run("printf '' | { read v; echo code=$?; }");
        assert_eq!(out.stdout, "code=1\n");
    }

    #[test]
    fn read_successive_lines() {
        let out = run("printf 'one\\ntwo\\n' | { read a; read b; echo $a-$b; }");
        assert_eq!(out.stdout, "one-two\n");
    }

    #[test]
    fn read_array() {
        let out = run("echo 'p q r' | { read -a arr; echo ${arr[1]}:${#arr[@]}; }");
        assert_eq!(out.stdout, "q:3\n");
    }

    #[test]
    fn read_custom_ifs() {
        let out = run("echo a:b:c | { IFS=: read x y z; echo $y; }");
        assert_eq!(out.stdout, "b\n");
    }

    #[test]
    fn read_raw_mode() {
        // Input holds a literal backslash; -r keeps it, default mode eats it.
        let out = run("printf 'a\\\\tb\\n' | { read -r v; echo \"$v\"; }");
        assert_eq!(out.stdout, "a\\tb\n");
        let out = run("printf 'a\\\\tb\\n' | { read v; echo \"$v\"; }");
        assert_eq!(out.stdout, "atb\n");
    }

    #[test]
    fn read_custom_delimiter() {
        let out = run("printf 'one;two' | { read -d ';' v; echo $v; }");
        assert_eq!(out.stdout, "one\n");
    }

    #[test]
    fn read_from_herestring() {
        let out = run("read v <<<'direct'; echo $v");
        assert_eq!(out.stdout, "direct\n");
    }
}
