//! `echo` and `printf`.

use crate::interp::error::Interrupt;
use crate::interp::state::{ExecResult, ShellState};

pub fn run_echo(_state: &mut ShellState, args: &[String]) -> Result<ExecResult, Interrupt> {
    let mut newline = true;
    let mut interpret = false;
    let mut i = 0;

    // Flag parsing stops at the first non-flag word.
    while i < args.len() {
        match args[i].as_str() {
            "-n" => newline = false,
            "-e" => interpret = true,
            "-E" => interpret = false,
            "-ne" | "-en" => {
                newline = false;
                interpret = true;
            }
            _ => break,
        }
        i += 1;
    }

    let joined = args[i..].join(" ");
    let (mut text, suppress) = if interpret { echo_escapes(&joined) } else { (joined, false) };
    if newline && !suppress {
        text.push('\n');
    }
    Ok(ExecResult::new(text, String::new(), 0))
}

/// `echo -e` escapes; `\c` stops output and suppresses the newline.
fn echo_escapes(input: &str) -> (String, bool) {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '\\' || i + 1 >= chars.len() {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        match chars[i + 1] {
            'n' => {
                out.push('\n');
                i += 2;
            }
            't' => {
                out.push('\t');
                i += 2;
            }
            'r' => {
                out.push('\r');
                i += 2;
            }
            'a' => {
                out.push('\x07');
                i += 2;
            }
            'b' => {
                out.push('\x08');
                i += 2;
            }
            'e' | 'E' => {
                out.push('\x1b');
                i += 2;
            }
            'f' => {
                out.push('\x0c');
                i += 2;
            }
            'v' => {
                out.push('\x0b');
                i += 2;
            }
            '\\' => {
                out.push('\\');
                i += 2;
            }
            'c' => return (out, true),
            '0' => {
                let octal: String =
                    chars[i + 2..].iter().take(3).take_while(|c| ('0'..='7').contains(*c)).collect();
                if let Ok(code) = u8::from_str_radix(&octal, 8) {
                    out.push(code as char);
                }
                i += 2 + octal.len();
            }
            'x' => {
                let hex: String =
                    chars[i + 2..].iter().take(2).take_while(|c| c.is_ascii_hexdigit()).collect();
                if hex.is_empty() {
                    out.push_str("\\x");
                    i += 2;
                } else {
                    if let Ok(code) = u8::from_str_radix(&hex, 16) {
                        out.push(code as char);
                    }
                    i += 2 + hex.len();
                }
            }
            other => {
                out.push('\\');
                out.push(other);
                i += 2;
            }
        }
    }
    (out, false)
}

pub fn run_printf(_state: &mut ShellState, args: &[String]) -> Result<ExecResult, Interrupt> {
    if args.is_empty() {
        return Ok(ExecResult::failure("sandbash: printf: usage: printf format [arguments]\n", 2));
    }
    let format = &args[0];
    let mut values = &args[1..];
    let mut out = String::new();
    let mut stderr = String::new();
    let mut code = 0;

    // The format string is reused until the arguments run out.
    loop {
        let consumed = render_once(format, values, &mut out, &mut stderr, &mut code);
        if consumed == 0 || consumed >= values.len() {
            break;
        }
        values = &values[consumed..];
    }

    Ok(ExecResult::new(out, stderr, code))
}

/// Render the format once; returns how many arguments were consumed.
fn render_once(
    format: &str,
    values: &[String],
    out: &mut String,
    stderr: &mut String,
    code: &mut i32,
) -> usize {
    let chars: Vec<char> = format.chars().collect();
    let mut used = 0;
    let mut i = 0;

    let mut next_value = |used: &mut usize| -> String {
        let v = values.get(*used).cloned().unwrap_or_default();
        *used += 1;
        v
    };

    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                let (text, _) = echo_escapes(&format!("\\{}", chars[i + 1]));
                out.push_str(&text);
                i += 2;
            }
            '%' => {
                if chars.get(i + 1) == Some(&'%') {
                    out.push('%');
                    i += 2;
                    continue;
                }
                // %[-+ 0]*[width][.precision]conv
                let mut j = i + 1;
                let mut spec = String::from("%");
                while matches!(chars.get(j), Some(&'-') | Some(&'+') | Some(&'0') | Some(&' ') | Some(&'#')) {
                    spec.push(chars[j]);
                    j += 1;
                }
                while matches!(chars.get(j), Some(c) if c.is_ascii_digit()) {
                    spec.push(chars[j]);
                    j += 1;
                }
                if chars.get(j) == Some(&'.') {
                    spec.push('.');
                    j += 1;
                    while matches!(chars.get(j), Some(c) if c.is_ascii_digit()) {
                        spec.push(chars[j]);
                        j += 1;
                    }
                }
                let conv = match chars.get(j) {
                    Some(&c) => c,
                    None => {
                        out.push_str(&spec);
                        break;
                    }
                };
                j += 1;

                match conv {
                    's' => {
                        let value = next_value(&mut used);
                        out.push_str(&pad(&spec, &value));
                    }
                    'q' => {
                        let value = next_value(&mut used);
                        out.push_str(&crate::expand::quote::shell_quote(&value));
                    }
                    'b' => {
                        let value = next_value(&mut used);
                        let (text, _) = echo_escapes(&value);
                        out.push_str(&text);
                    }
                    'c' => {
                        let value = next_value(&mut used);
                        if let Some(c) = value.chars().next() {
                            out.push(c);
                        }
                    }
                    'd' | 'i' => {
                        let value = next_value(&mut used);
                        match parse_int(&value) {
                            Ok(n) => out.push_str(&pad_number(&spec, &n.to_string())),
                            Err(()) => {
                                stderr.push_str(&format!(
                                    "sandbash: printf: {}: invalid number\n",
                                    value
                                ));
                                *code = 1;
                                out.push_str(&pad_number(&spec, "0"));
                            }
                        }
                    }
                    'u' => {
                        let value = next_value(&mut used);
                        let n = parse_int(&value).unwrap_or(0);
                        out.push_str(&pad_number(&spec, &(n as u64).to_string()));
                    }
                    'x' => {
                        let value = next_value(&mut used);
                        let n = parse_int(&value).unwrap_or(0);
                        out.push_str(&pad_number(&spec, &format!("{:x}", n)));
                    }
                    'X' => {
                        let value = next_value(&mut used);
                        let n = parse_int(&value).unwrap_or(0);
                        out.push_str(&pad_number(&spec, &format!("{:X}", n)));
                    }
                    'o' => {
                        let value = next_value(&mut used);
                        let n = parse_int(&value).unwrap_or(0);
                        out.push_str(&pad_number(&spec, &format!("{:o}", n)));
                    }
                    other => {
                        out.push_str(&spec);
                        out.push(other);
                    }
                }
                i = j;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    used
}

fn parse_int(text: &str) -> Result<i64, ()> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).map_err(|_| ());
    }
    // A leading quote yields the character code.
    if let Some(rest) = trimmed.strip_prefix('\'').or_else(|| trimmed.strip_prefix('"')) {
        return Ok(rest.chars().next().map(|c| c as i64).unwrap_or(0));
    }
    trimmed.parse::<i64>().map_err(|_| ())
}

/// Width/alignment handling for %s.
fn pad(spec: &str, value: &str) -> String {
    let (left, width, precision) = parse_spec(spec);
    let mut text = value.to_string();
    if let Some(p) = precision {
        text = text.chars().take(p).collect();
    }
    apply_width(&text, width, left, ' ')
}

/// Width handling for numeric conversions; `0` pads with zeros.
fn pad_number(spec: &str, digits: &str) -> String {
    let (left, width, _) = parse_spec(spec);
    let zero = spec.contains('0') && !left;
    let (sign, magnitude) =
        if let Some(rest) = digits.strip_prefix('-') { ("-", rest) } else { ("", digits) };
    if zero {
        if let Some(w) = width {
            let target = w.saturating_sub(sign.len());
            return format!("{}{:0>width$}", sign, magnitude, width = target);
        }
    }
    apply_width(digits, width, left, ' ')
}

fn parse_spec(spec: &str) -> (bool, Option<usize>, Option<usize>) {
    let left = spec.contains('-');
    let body: String = spec.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    let mut parts = body.splitn(2, '.');
    let width_digits = parts.next().unwrap_or("");
    // Skip a leading zero-pad flag when reading the width.
    let width_digits = width_digits.trim_start_matches('0');
    let width = width_digits.parse::<usize>().ok();
    let precision = parts.next().and_then(|p| p.parse::<usize>().ok());
    (left, width, precision)
}

fn apply_width(text: &str, width: Option<usize>, left: bool, fill: char) -> String {
    match width {
        Some(w) if text.chars().count() < w => {
            let padding: String = std::iter::repeat(fill).take(w - text.chars().count()).collect();
            if left {
                format!("{}{}", text, padding)
            } else {
                format!("{}{}", padding, text)
            }
        }
        _ => text.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::interp::testkit::run;

    #[test]
    fn echo_basics() {
        assert_eq!(run("echo hello world").stdout, "hello world\n");
        assert_eq!(run("echo -n no-newline").stdout, "no-newline");
        assert_eq!(run("echo").stdout, "\n");
    }

    #[test]
    fn echo_escape_flag() {
        assert_eq!(run("echo -e 'a\\tb'").stdout, "a\tb\n");
        assert_eq!(run("echo 'a\\tb'").stdout, "a\\tb\n");
        assert_eq!(run("echo -e 'stop\\cignored'").stdout, "stop");
    }

    #[test]
    fn printf_strings_and_numbers() {
        assert_eq!(run("printf '%s-%s' a b").stdout, "a-b");
        assert_eq!(run("printf '%d\\n' 42").stdout, "42\n");
        assert_eq!(run("printf '%x %o' 255 8").stdout, "ff 10");
    }

    #[test]
    fn printf_width_and_alignment() {
        assert_eq!(run("printf '[%5s]' ab").stdout, "[   ab]");
        assert_eq!(run("printf '[%-5s]' ab").stdout, "[ab   ]");
        assert_eq!(run("printf '[%05d]' 42").stdout, "[00042]");
        assert_eq!(run("printf '[%.2s]' abcdef").stdout, "[ab]");
    }

    #[test]
    fn printf_format_reuse() {
        assert_eq!(run("printf '%s\\n' one two three").stdout, "one\ntwo\nthree\n");
    }

    #[test]
    fn printf_percent_literal() {
        assert_eq!(run("printf '100%%\\n'").stdout, "100%\n");
    }

    #[test]
    fn printf_missing_args_are_empty() {
        assert_eq!(run("printf '[%s][%d]' onlyone").stdout, "[onlyone][0]");
    }

    #[test]
    fn printf_invalid_number() {
        let out = run("printf '%d' notanumber");
        assert_eq!(out.exit_code, 1);
        assert!(out.stderr.contains("invalid number"));
    }

    #[test]
    fn printf_q_quotes() {
        assert_eq!(run("printf '%q' 'two words'").stdout, "'two words'");
    }

    #[test]
    fn printf_char_code() {
        assert_eq!(run("printf '%d' \"'A\"").stdout, "65");
    }
}
