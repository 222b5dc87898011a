//! Tilde expansion.

use crate::interp::state::ShellState;

/// Expand `~` / `~user` / `~+` / `~-` to a directory path.
pub fn expand_tilde(state: &ShellState, user: Option<&str>) -> String {
    match user {
        None => state.get_scalar("HOME").unwrap_or_else(|| "/".to_string()),
        Some("+") => state.cwd.clone(),
        Some("-") => {
            if state.previous_dir.is_empty() {
                "~-".to_string()
            } else {
                state.previous_dir.clone()
            }
        }
        Some("root") => "/root".to_string(),
        Some(user) => format!("/home/{}", user),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_tilde_is_home() {
        let mut state = ShellState::default();
        state.set_scalar("HOME", "/home/me").unwrap();
        assert_eq!(expand_tilde(&state, None), "/home/me");
    }

    #[test]
    fn tilde_without_home_falls_back_to_root() {
        let state = ShellState::default();
        assert_eq!(expand_tilde(&state, None), "/");
    }

    #[test]
    fn named_users() {
        let state = ShellState::default();
        assert_eq!(expand_tilde(&state, Some("alice")), "/home/alice");
        assert_eq!(expand_tilde(&state, Some("root")), "/root");
    }

    #[test]
    fn pwd_and_oldpwd_forms() {
        let mut state = ShellState::default();
        state.cwd = "/work".to_string();
        state.previous_dir = "/old".to_string();
        assert_eq!(expand_tilde(&state, Some("+")), "/work");
        assert_eq!(expand_tilde(&state, Some("-")), "/old");
    }
}
