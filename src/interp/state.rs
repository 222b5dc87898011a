//! Shell state.
//!
//! The interpreter owns one mutable `ShellState`; subshells clone it and
//! throw the clone away, which is what makes `( … )` isolation hold.
//! Variables are a sum type over scalars, sparse indexed arrays and
//! insertion-ordered associative arrays, stored in an ordered map.

use std::collections::BTreeMap;
use std::collections::HashMap;

use indexmap::IndexMap;

use crate::ast::types::FunctionDef;

/// Attribute flags attached to a variable (`declare -i -l -u -n -r -x`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VarFlags {
    pub exported: bool,
    pub readonly: bool,
    pub integer: bool,
    pub lowercase: bool,
    pub uppercase: bool,
    pub nameref: bool,
}

/// A variable's payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(String),
    /// Sparse int-keyed array; iteration order follows the keys.
    Indexed(BTreeMap<i64, String>),
    /// String-keyed array preserving insertion order.
    Associative(IndexMap<String, String>),
}

impl Value {
    pub fn scalar(text: impl Into<String>) -> Self {
        Value::Scalar(text.into())
    }

    /// The value a scalar context sees: arrays read as their element 0
    /// (or first element for associative arrays' `[0]` miss → empty).
    pub fn as_scalar(&self) -> String {
        match self {
            Value::Scalar(s) => s.clone(),
            Value::Indexed(map) => map.get(&0).cloned().unwrap_or_default(),
            Value::Associative(map) => map.get("0").cloned().unwrap_or_default(),
        }
    }

    pub fn element_count(&self) -> usize {
        match self {
            Value::Scalar(_) => 1,
            Value::Indexed(map) => map.len(),
            Value::Associative(map) => map.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub value: Value,
    pub flags: VarFlags,
}

impl Variable {
    pub fn scalar(text: impl Into<String>) -> Self {
        Self { value: Value::scalar(text), flags: VarFlags::default() }
    }

    pub fn exported(text: impl Into<String>) -> Self {
        Self { value: Value::scalar(text), flags: VarFlags { exported: true, ..Default::default() } }
    }
}

/// One function-call frame: local bindings plus saved positionals.
/// A binding of `None` is `local x` without a value: it shadows the outer
/// variable but reads as unset.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub vars: IndexMap<String, Option<Variable>>,
    pub function_name: String,
    pub saved_positional: Vec<String>,
}

/// `set` options.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    pub errexit: bool,
    pub nounset: bool,
    pub pipefail: bool,
    pub xtrace: bool,
    pub verbose: bool,
    pub noexec: bool,
    pub noglob: bool,
    pub noclobber: bool,
    pub allexport: bool,
    pub posix: bool,
    pub monitor: bool,
}

/// `shopt` options.
#[derive(Debug, Clone, Copy)]
pub struct ShoptOptions {
    pub extglob: bool,
    pub dotglob: bool,
    pub nullglob: bool,
    pub failglob: bool,
    pub globstar: bool,
    pub globskipdots: bool,
    pub nocaseglob: bool,
    pub nocasematch: bool,
    pub lastpipe: bool,
}

impl Default for ShoptOptions {
    fn default() -> Self {
        Self {
            extglob: false,
            dotglob: false,
            nullglob: false,
            failglob: false,
            globstar: false,
            // On by default since bash 5.2.
            globskipdots: true,
            nocaseglob: false,
            nocasematch: false,
            lastpipe: false,
        }
    }
}

pub const DEFAULT_IFS: &str = " \t\n";

/// Result of executing a script, statement or command.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecResult {
    pub fn new(stdout: String, stderr: String, exit_code: i32) -> Self {
        Self { stdout, stderr, exit_code }
    }

    pub fn ok() -> Self {
        Self::default()
    }

    pub fn code(exit_code: i32) -> Self {
        Self { exit_code, ..Default::default() }
    }

    pub fn failure(stderr: impl Into<String>, exit_code: i32) -> Self {
        Self { stdout: String::new(), stderr: stderr.into(), exit_code }
    }
}

/// The complete mutable interpreter state.
#[derive(Debug, Clone)]
pub struct ShellState {
    /// Global variables, in definition order.
    pub env: IndexMap<String, Variable>,
    /// Function-call scopes, innermost last.
    pub scopes: Vec<Scope>,
    /// Current positional parameters (`$1`…).
    pub positional: Vec<String>,
    /// `$0`.
    pub script_name: String,

    pub cwd: String,
    pub previous_dir: String,
    pub umask: u32,

    pub last_exit_code: i32,
    pub last_arg: String,
    pub current_line: u32,

    pub options: SetOptions,
    pub shopts: ShoptOptions,

    pub functions: HashMap<String, FunctionDef>,

    pub call_depth: u32,
    pub loop_depth: u32,
    /// Condition context (if/while/until, `&&`/`||` non-final operands):
    /// errexit does not fire here.
    pub in_condition: bool,

    pub command_count: u64,

    /// `$$` — stable across subshells.
    pub shell_pid: u32,
    /// `BASHPID` — changes in subshells.
    pub bash_pid: u32,
    pub next_virtual_pid: u32,
    /// `$!`.
    pub last_bg_pid: u32,

    /// Stdin text available to the current command (piped input).
    pub current_stdin: Option<String>,

    /// Stderr accumulated by expansion-time command substitutions.
    pub expansion_stderr: String,
    /// Exit code of the most recent expansion-time substitution.
    pub expansion_exit_code: Option<i32>,

    /// `{name}>file` allocations: fd → target path.
    pub fd_table: HashMap<i32, String>,
    pub next_fd: i32,

    /// `>(…)` bodies queued to run after the consuming command, paired
    /// with the path the command wrote to.
    pub pending_procsubs: Vec<(String, crate::ast::Script)>,
    pub next_procsub: u32,
}

impl Default for ShellState {
    fn default() -> Self {
        Self {
            env: IndexMap::new(),
            scopes: Vec::new(),
            positional: Vec::new(),
            script_name: "sandbash".to_string(),
            cwd: "/".to_string(),
            previous_dir: String::new(),
            umask: 0o022,
            last_exit_code: 0,
            last_arg: String::new(),
            current_line: 1,
            options: SetOptions::default(),
            shopts: ShoptOptions::default(),
            functions: HashMap::new(),
            call_depth: 0,
            loop_depth: 0,
            in_condition: false,
            command_count: 0,
            shell_pid: 4200,
            bash_pid: 4200,
            next_virtual_pid: 4300,
            last_bg_pid: 0,
            current_stdin: None,
            expansion_stderr: String::new(),
            expansion_exit_code: None,
            fd_table: HashMap::new(),
            next_fd: 10,
            pending_procsubs: Vec::new(),
            next_procsub: 63,
        }
    }
}

impl ShellState {
    // =========================================================================
    // Variable access
    // =========================================================================

    /// Follow one nameref hop. Cycles and self-references error.
    pub fn resolve_name(&self, name: &str) -> Result<String, String> {
        let mut current = name.to_string();
        let mut hops = 0;
        loop {
            let var = self.lookup(&current);
            match var {
                Some(v) if v.flags.nameref => {
                    let target = v.value.as_scalar();
                    if target == current || hops > 16 {
                        return Err(format!("{}: circular name reference", name));
                    }
                    if target.is_empty() {
                        return Ok(current);
                    }
                    current = target;
                    hops += 1;
                }
                _ => return Ok(current),
            }
        }
    }

    fn lookup(&self, name: &str) -> Option<&Variable> {
        for scope in self.scopes.iter().rev() {
            if let Some(binding) = scope.vars.get(name) {
                return binding.as_ref();
            }
        }
        self.env.get(name)
    }

    /// Is the name bound anywhere (a valueless `local` counts as declared
    /// but reads as unset)?
    pub fn is_set(&self, name: &str) -> bool {
        let name = match self.resolve_name(name) {
            Ok(n) => n,
            Err(_) => return false,
        };
        for scope in self.scopes.iter().rev() {
            if let Some(binding) = scope.vars.get(&name) {
                return binding.is_some();
            }
        }
        self.env.contains_key(&name)
    }

    /// Variable lookup with nameref resolution.
    pub fn get_var(&self, name: &str) -> Option<&Variable> {
        let name = self.resolve_name(name).ok()?;
        for scope in self.scopes.iter().rev() {
            if let Some(binding) = scope.vars.get(&name) {
                return binding.as_ref();
            }
        }
        self.env.get(&name)
    }

    /// Scalar view of a variable.
    pub fn get_scalar(&self, name: &str) -> Option<String> {
        self.get_var(name).map(|v| v.value.as_scalar())
    }

    /// Where a write to `name` lands: the innermost scope that binds it,
    /// else the global map.
    pub fn get_var_mut(&mut self, name: &str) -> Option<&mut Variable> {
        let name = self.resolve_name(name).ok()?;
        let mut scope_idx = None;
        for (i, scope) in self.scopes.iter().enumerate().rev() {
            if scope.vars.contains_key(&name) {
                scope_idx = Some(i);
                break;
            }
        }
        if let Some(i) = scope_idx {
            return self.scopes[i].vars.get_mut(&name).and_then(|slot| slot.as_mut());
        }
        self.env.get_mut(&name)
    }

    /// Assign a scalar, honoring scoping, namerefs and case flags.
    /// Readonly violations report an error string.
    pub fn set_scalar(&mut self, name: &str, value: impl Into<String>) -> Result<(), String> {
        let target = self.resolve_name(name).map_err(|e| e)?;
        let mut text = value.into();

        if let Some(existing) = self.find_binding(&target) {
            if existing.flags.readonly {
                return Err(format!("{}: readonly variable", target));
            }
            if existing.flags.lowercase {
                text = text.to_lowercase();
            } else if existing.flags.uppercase {
                text = text.to_uppercase();
            }
            let flags = existing.flags;
            self.write_binding(&target, Variable { value: Value::Scalar(text), flags });
            return Ok(());
        }

        let exported = self.options.allexport;
        self.write_binding(
            &target,
            Variable {
                value: Value::Scalar(text),
                flags: VarFlags { exported, ..Default::default() },
            },
        );
        Ok(())
    }

    fn find_binding(&self, name: &str) -> Option<&Variable> {
        for scope in self.scopes.iter().rev() {
            if let Some(binding) = scope.vars.get(name) {
                return binding.as_ref();
            }
        }
        self.env.get(name)
    }

    /// Replace the variable wherever it is bound; unbound names land in
    /// the global map.
    pub fn write_binding(&mut self, name: &str, var: Variable) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.vars.get_mut(name) {
                *slot = Some(var);
                return;
            }
        }
        self.env.insert(name.to_string(), var);
    }

    /// Bind in the innermost scope (`local`).
    pub fn declare_local(&mut self, name: &str, var: Option<Variable>) -> Result<(), String> {
        match self.scopes.last_mut() {
            Some(scope) => {
                scope.vars.insert(name.to_string(), var);
                Ok(())
            }
            None => Err("local: can only be used in a function".to_string()),
        }
    }

    pub fn unset_var(&mut self, name: &str) -> Result<(), String> {
        let target = self.resolve_name(name).unwrap_or_else(|_| name.to_string());
        if let Some(v) = self.find_binding(&target) {
            if v.flags.readonly {
                return Err(format!("{}: cannot unset: readonly variable", target));
            }
        }
        for scope in self.scopes.iter_mut().rev() {
            if scope.vars.shift_remove(&target).is_some() {
                return Ok(());
            }
        }
        self.env.shift_remove(&target);
        Ok(())
    }

    pub fn in_function(&self) -> bool {
        !self.scopes.is_empty()
    }

    // =========================================================================
    // Derived views
    // =========================================================================

    pub fn ifs(&self) -> String {
        match self.get_var("IFS") {
            Some(v) => v.value.as_scalar(),
            None => DEFAULT_IFS.to_string(),
        }
    }

    pub fn ifs_is_default(&self) -> bool {
        self.get_var("IFS").is_none()
    }

    /// Exported variables flattened to strings, for external commands.
    pub fn exported_env(&self) -> HashMap<String, String> {
        let mut out = HashMap::new();
        for (name, var) in &self.env {
            if var.flags.exported {
                out.insert(name.clone(), var.value.as_scalar());
            }
        }
        for scope in &self.scopes {
            for (name, binding) in &scope.vars {
                if let Some(var) = binding {
                    if var.flags.exported {
                        out.insert(name.clone(), var.value.as_scalar());
                    }
                }
            }
        }
        out
    }

    /// `$-` — one letter per enabled single-letter option.
    pub fn option_flags(&self) -> String {
        let mut flags = String::new();
        if self.options.allexport {
            flags.push('a');
        }
        if self.options.noclobber {
            flags.push('C');
        }
        if self.options.errexit {
            flags.push('e');
        }
        if self.options.noglob {
            flags.push('f');
        }
        if self.options.monitor {
            flags.push('m');
        }
        if self.options.noexec {
            flags.push('n');
        }
        if self.options.nounset {
            flags.push('u');
        }
        if self.options.verbose {
            flags.push('v');
        }
        if self.options.xtrace {
            flags.push('x');
        }
        flags.push_str("hB");
        flags
    }

    pub fn set_exit_code(&mut self, code: i32) {
        self.last_exit_code = code;
    }

    /// Record a pipeline's per-stage exit codes as `PIPESTATUS`.
    pub fn set_pipestatus(&mut self, codes: &[i32]) {
        let mut map = BTreeMap::new();
        for (i, code) in codes.iter().enumerate() {
            map.insert(i as i64, code.to_string());
        }
        self.env.insert(
            "PIPESTATUS".to_string(),
            Variable { value: Value::Indexed(map), flags: VarFlags::default() },
        );
    }

    /// Allocate a virtual pid for a subshell or background statement.
    pub fn allocate_pid(&mut self) -> u32 {
        let pid = self.next_virtual_pid;
        self.next_virtual_pid += 1;
        pid
    }

    /// Enter a subshell: clone state, give the clone its own BASHPID.
    pub fn subshell(&mut self) -> ShellState {
        let pid = self.allocate_pid();
        let mut clone = self.clone();
        clone.bash_pid = pid;
        clone.pending_procsubs = Vec::new();
        clone
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_set_and_get() {
        let mut state = ShellState::default();
        state.set_scalar("FOO", "bar").unwrap();
        assert_eq!(state.get_scalar("FOO"), Some("bar".to_string()));
    }

    #[test]
    fn readonly_rejects_writes() {
        let mut state = ShellState::default();
        state.env.insert(
            "RO".to_string(),
            Variable {
                value: Value::scalar("x"),
                flags: VarFlags { readonly: true, ..Default::default() },
            },
        );
        assert!(state.set_scalar("RO", "y").is_err());
        assert!(state.unset_var("RO").is_err());
    }

    #[test]
    fn local_scope_shadows_global() {
        let mut state = ShellState::default();
        state.set_scalar("X", "global").unwrap();
        state.scopes.push(Scope::default());
        state.declare_local("X", Some(Variable::scalar("local"))).unwrap();
        assert_eq!(state.get_scalar("X"), Some("local".to_string()));
        state.scopes.pop();
        assert_eq!(state.get_scalar("X"), Some("global".to_string()));
    }

    #[test]
    fn valueless_local_reads_as_unset() {
        let mut state = ShellState::default();
        state.set_scalar("X", "global").unwrap();
        state.scopes.push(Scope::default());
        state.declare_local("X", None).unwrap();
        assert!(!state.is_set("X"));
        assert_eq!(state.get_scalar("X"), None);
    }

    #[test]
    fn write_through_scope() {
        let mut state = ShellState::default();
        state.scopes.push(Scope::default());
        state.declare_local("X", Some(Variable::scalar("a"))).unwrap();
        state.set_scalar("X", "b").unwrap();
        assert_eq!(state.get_scalar("X"), Some("b".to_string()));
        state.scopes.pop();
        assert!(state.get_scalar("X").is_none());
    }

    #[test]
    fn nameref_resolution() {
        let mut state = ShellState::default();
        state.set_scalar("target", "value").unwrap();
        state.env.insert(
            "ref".to_string(),
            Variable {
                value: Value::scalar("target"),
                flags: VarFlags { nameref: true, ..Default::default() },
            },
        );
        assert_eq!(state.get_scalar("ref"), Some("value".to_string()));
    }

    #[test]
    fn nameref_cycle_is_error() {
        let mut state = ShellState::default();
        state.env.insert(
            "a".to_string(),
            Variable {
                value: Value::scalar("a"),
                flags: VarFlags { nameref: true, ..Default::default() },
            },
        );
        assert!(state.resolve_name("a").is_err());
    }

    #[test]
    fn case_flags_apply_on_write() {
        let mut state = ShellState::default();
        state.env.insert(
            "L".to_string(),
            Variable {
                value: Value::scalar(""),
                flags: VarFlags { lowercase: true, ..Default::default() },
            },
        );
        state.set_scalar("L", "MiXeD").unwrap();
        assert_eq!(state.get_scalar("L"), Some("mixed".to_string()));
    }

    #[test]
    fn exported_env_is_flat_strings() {
        let mut state = ShellState::default();
        state.env.insert("A".to_string(), Variable::exported("1"));
        state.env.insert("B".to_string(), Variable::scalar("2"));
        let env = state.exported_env();
        assert_eq!(env.get("A"), Some(&"1".to_string()));
        assert!(!env.contains_key("B"));
    }

    #[test]
    fn subshell_clone_isolates() {
        let mut state = ShellState::default();
        state.set_scalar("X", "outer").unwrap();
        let mut sub = state.subshell();
        sub.set_scalar("X", "inner").unwrap();
        sub.cwd = "/tmp".to_string();
        assert_eq!(state.get_scalar("X"), Some("outer".to_string()));
        assert_eq!(state.cwd, "/");
        assert_ne!(sub.bash_pid, state.bash_pid);
    }

    #[test]
    fn ifs_default() {
        let state = ShellState::default();
        assert_eq!(state.ifs(), " \t\n");
    }

    #[test]
    fn array_scalar_view_is_element_zero() {
        let mut map = BTreeMap::new();
        map.insert(0, "first".to_string());
        map.insert(5, "later".to_string());
        let value = Value::Indexed(map);
        assert_eq!(value.as_scalar(), "first");
        assert_eq!(value.element_count(), 2);
    }

    #[test]
    fn pipestatus_recorded() {
        let mut state = ShellState::default();
        state.set_pipestatus(&[0, 1, 0]);
        match &state.env.get("PIPESTATUS").unwrap().value {
            Value::Indexed(map) => {
                assert_eq!(map.get(&1), Some(&"1".to_string()));
                assert_eq!(map.len(), 3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
