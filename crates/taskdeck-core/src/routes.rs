use crate::session::StoredUser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Tasks,
}

/// Pure function of session presence. Authenticated users asking for the
/// entry screen land on the task list; unauthenticated users asking for the
/// task list land on the login screen; unrecognized paths fall back to the
/// entry screen.
pub fn resolve(path: &str, user: Option<&StoredUser>) -> Screen {
    let authenticated = user.is_some();
    match path {
        "/" | "/tasks" => {
            if authenticated {
                Screen::Tasks
            } else {
                Screen::Login
            }
        }
        _ => resolve("/", user),
    }
}

#[cfg(test)]
mod tests {
    use super::{Screen, resolve};
    use crate::session::StoredUser;

    fn alice() -> StoredUser {
        StoredUser {
            user_id: 7,
            username: "alice".to_string(),
        }
    }

    #[test]
    fn authenticated_entry_redirects_to_tasks() {
        let user = alice();
        assert_eq!(resolve("/", Some(&user)), Screen::Tasks);
        assert_eq!(resolve("/tasks", Some(&user)), Screen::Tasks);
    }

    #[test]
    fn unauthenticated_tasks_redirects_to_login() {
        assert_eq!(resolve("/tasks", None), Screen::Login);
        assert_eq!(resolve("/", None), Screen::Login);
    }

    #[test]
    fn unknown_paths_fall_back_to_entry() {
        let user = alice();
        assert_eq!(resolve("/nope", Some(&user)), Screen::Tasks);
        assert_eq!(resolve("/nope", None), Screen::Login);
    }
}
