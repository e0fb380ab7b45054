use std::io::{self, Write};

use anyhow::anyhow;
use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::api::{ApiError, TaskService};
use crate::render::Renderer;
use crate::routes::{self, Screen};
use crate::session::{SessionController, SessionTokens, StoredUser};
use crate::task::{Priority, Status, StatusFilter, Task};
use crate::view_model::{FormMode, SaveOutcome, TaskViewModel};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Quit,
    List,
    Refresh,
    Whoami,
    Logout,
    Users,
    New,
    Form,
    Cancel,
    Save,
    Filter(StatusFilter),
    Edit(i64),
    Show(i64),
    Delete(i64),
    Set { field: String, value: String },
}

/// Parses one input line. Empty lines are not commands.
pub fn parse_command(line: &str) -> anyhow::Result<Option<Command>> {
    let mut parts = line.split_whitespace();
    let Some(word) = parts.next() else {
        return Ok(None);
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "list" | "ls" => Command::List,
        "refresh" => Command::Refresh,
        "whoami" => Command::Whoami,
        "logout" => Command::Logout,
        "users" => Command::Users,
        "new" => Command::New,
        "form" => Command::Form,
        "cancel" => Command::Cancel,
        "save" => Command::Save,
        "filter" => {
            let value = parts
                .next()
                .ok_or_else(|| anyhow!("usage: filter <all|pending|in_progress|completed>"))?;
            Command::Filter(StatusFilter::parse(value)?)
        }
        "edit" => Command::Edit(parse_id(parts.next())?),
        "show" => Command::Show(parse_id(parts.next())?),
        "delete" | "rm" => Command::Delete(parse_id(parts.next())?),
        "set" => {
            let field = parts
                .next()
                .ok_or_else(|| anyhow!("usage: set <field> <value>"))?
                .to_ascii_lowercase();
            let value = parts.collect::<Vec<_>>().join(" ");
            Command::Set { field, value }
        }
        other => return Err(anyhow!("unknown command: {other} (try 'help')")),
    };

    Ok(Some(command))
}

fn parse_id(token: Option<&str>) -> anyhow::Result<i64> {
    let token = token.ok_or_else(|| anyhow!("expected a task id"))?;
    token
        .parse::<i64>()
        .map_err(|_| anyhow!("invalid task id: {token}"))
}

/// Top-level screen loop: the route guard decides which screen runs, and a
/// screen hands back either the next screen or `None` to quit.
#[tracing::instrument(skip_all)]
pub async fn run<S: TaskService>(
    session: &mut SessionController,
    vm: &mut TaskViewModel<S>,
    renderer: &mut Renderer,
    start_path: &str,
) -> anyhow::Result<()> {
    let mut screen = routes::resolve(start_path, session.current_user());
    loop {
        let next = match screen {
            Screen::Login => login_screen(session, vm).await?,
            Screen::Tasks => task_screen(session, vm, renderer).await?,
        };
        match next {
            Some(next_screen) => screen = next_screen,
            None => return Ok(()),
        }
    }
}

async fn login_screen<S: TaskService>(
    session: &mut SessionController,
    vm: &mut TaskViewModel<S>,
) -> anyhow::Result<Option<Screen>> {
    println!("Log in to continue (EOF to quit).");
    let Some(username) = prompt("username")? else {
        return Ok(None);
    };
    if username.is_empty() {
        return Ok(Some(Screen::Login));
    }
    let Some(password) = prompt("password")? else {
        return Ok(None);
    };

    match vm.service().login(&username, &password).await {
        Ok(granted) => {
            info!(username = %granted.username, "login succeeded");
            session.login(
                StoredUser {
                    user_id: granted.user_id,
                    username: granted.username,
                },
                SessionTokens {
                    access_token: Some(granted.token),
                    refresh_token: None,
                },
            )?;
            Ok(Some(Screen::Tasks))
        }
        Err(ApiError::InvalidCredentials(message)) => {
            println!("{message}");
            Ok(Some(Screen::Login))
        }
        Err(error) => {
            warn!(%error, "login request failed");
            println!("Could not reach the server.");
            Ok(Some(Screen::Login))
        }
    }
}

async fn task_screen<S: TaskService>(
    session: &mut SessionController,
    vm: &mut TaskViewModel<S>,
    renderer: &mut Renderer,
) -> anyhow::Result<Option<Screen>> {
    if let Err(error) = vm.activate(session).await {
        warn!(%error, "failed activating task screen");
    }
    render_tasks(vm, renderer)?;
    let mut fingerprint = session.fingerprint()?;

    loop {
        let Some(line) = prompt("taskdeck")? else {
            return Ok(None);
        };

        // The store's change signal: another context logging in or out shows
        // up as a different fingerprint by the time the next command arrives.
        let current = session.fingerprint()?;
        if current != fingerprint {
            fingerprint = current;
            debug!("session store changed externally");
            session.sync_from_store()?;
            if session.current_user().is_none() {
                println!("Session ended in another context.");
                vm.reset_session();
                return Ok(Some(Screen::Login));
            }
        }

        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(error) => {
                println!("{error}");
                continue;
            }
        };

        match command {
            Command::Help => print_help(),
            Command::Quit => return Ok(None),
            Command::Logout => {
                session.logout()?;
                vm.reset_session();
                return Ok(Some(Screen::Login));
            }
            Command::Whoami => match session.current_user() {
                Some(user) => println!("{} (id {})", user.username, user.user_id),
                None => println!("not logged in"),
            },
            Command::List => render_tasks(vm, renderer)?,
            Command::Refresh => {
                if vm.load(session).await.is_ok() {
                    render_tasks(vm, renderer)?;
                }
            }
            Command::Filter(filter) => {
                if vm.set_filter(session, filter).await.is_ok() {
                    println!("filter: {}", filter.label());
                    render_tasks(vm, renderer)?;
                }
            }
            Command::New => {
                vm.start_create();
                print_form(vm);
            }
            Command::Edit(id) => match vm.start_edit(id) {
                Ok(()) => print_form(vm),
                Err(error) => println!("{error}"),
            },
            Command::Form => print_form(vm),
            Command::Set { field, value } => match apply_set(vm, &field, &value) {
                Ok(()) => print_form(vm),
                Err(error) => println!("{error}"),
            },
            Command::Cancel => {
                vm.cancel();
                println!("cancelled");
            }
            Command::Save => match vm.save(session).await {
                Ok(SaveOutcome::Saved) => {
                    println!("Saved.");
                    render_tasks(vm, renderer)?;
                }
                Ok(SaveOutcome::MissingOwner) => {
                    println!("Select an owner before saving (set owner <id>).");
                }
                Ok(SaveOutcome::NoActiveForm) => {
                    println!("No form is open (try 'new' or 'edit <id>').");
                }
                // Already logged; the form stays open for another attempt.
                Err(_) => {}
            },
            Command::Delete(id) => match vm.remove(session, id, confirm_delete).await {
                Ok(true) => {
                    println!("Deleted.");
                    render_tasks(vm, renderer)?;
                }
                Ok(false) => println!("Not deleted."),
                Err(error) => println!("{error}"),
            },
            Command::Show(id) => match vm.tasks().iter().find(|task| task.id == Some(id)) {
                Some(task) => {
                    renderer.print_task_info(task, |owner| vm.owner_name(owner).to_string())?;
                }
                None => println!("no task with id {id}"),
            },
            Command::Users => renderer.print_user_table(vm.users())?,
        }
    }
}

fn apply_set<S: TaskService>(
    vm: &mut TaskViewModel<S>,
    field: &str,
    value: &str,
) -> anyhow::Result<()> {
    if vm.mode() == FormMode::Idle {
        return Err(anyhow!("no form is open (try 'new' or 'edit <id>')"));
    }

    match field {
        "title" => vm.form_mut().title = value.to_string(),
        "description" | "desc" => vm.form_mut().description = value.to_string(),
        "status" => vm.form_mut().status = Status::parse(value)?,
        "priority" | "pri" => vm.form_mut().priority = Priority::parse(value)?,
        "due" => {
            if value.is_empty() || value == "none" || value == "-" {
                vm.form_mut().due_date.clear();
            } else {
                NaiveDate::parse_from_str(value, "%Y-%m-%d")
                    .map_err(|_| anyhow!("invalid due date (expected YYYY-MM-DD): {value}"))?;
                vm.form_mut().due_date = value.to_string();
            }
        }
        "owner" => {
            if value.is_empty() || value == "none" || value == "-" {
                vm.form_mut().owner = None;
            } else {
                let id = value
                    .parse::<i64>()
                    .map_err(|_| anyhow!("invalid owner id: {value}"))?;
                if !vm.users().iter().any(|user| user.id == id) {
                    return Err(anyhow!("unknown user id {id} (see 'users')"));
                }
                vm.form_mut().owner = Some(id);
            }
        }
        other => return Err(anyhow!("unknown field: {other}")),
    }

    Ok(())
}

fn render_tasks<S: TaskService>(
    vm: &TaskViewModel<S>,
    renderer: &mut Renderer,
) -> anyhow::Result<()> {
    renderer.print_task_table(vm.tasks(), |owner| vm.owner_name(owner).to_string())
}

fn print_form<S: TaskService>(vm: &TaskViewModel<S>) {
    let heading = match vm.mode() {
        FormMode::Idle => {
            println!("No form is open.");
            return;
        }
        FormMode::Creating => "creating".to_string(),
        FormMode::Editing(id) => format!("editing task {id}"),
    };

    let form = vm.form();
    println!("[{heading}]");
    println!("  title:       {}", form.title);
    println!("  description: {}", form.description);
    println!("  status:      {}", form.status.label());
    println!("  priority:    {}", form.priority.label());
    println!(
        "  due:         {}",
        if form.due_date.is_empty() {
            "-"
        } else {
            form.due_date.as_str()
        }
    );
    match form.owner {
        Some(id) => println!("  owner:       {} (id {id})", vm.owner_name(Some(id))),
        None => println!("  owner:       unassigned"),
    }
}

fn print_help() {
    println!("commands:");
    println!("  list | refresh | filter <all|pending|in_progress|completed>");
    println!("  show <id> | users | whoami");
    println!("  new | edit <id> | set <field> <value> | save | cancel | form");
    println!("    fields: title, description, status, priority, due, owner");
    println!("  delete <id>");
    println!("  logout | quit");
}

fn prompt(label: &str) -> anyhow::Result<Option<String>> {
    {
        let mut out = io::stdout().lock();
        write!(out, "{label}> ")?;
        out.flush()?;
    }

    let mut line = String::new();
    let read = io::stdin().read_line(&mut line)?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn confirm_delete(task: &Task) -> bool {
    match prompt(&format!("Delete task \"{}\"? [y/N]", task.title)) {
        Ok(Some(answer)) => matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{Command, parse_command};
    use crate::task::StatusFilter;

    #[test]
    fn bare_words_and_arguments_parse() {
        assert_eq!(
            parse_command("save").expect("parse"),
            Some(Command::Save)
        );
        assert_eq!(
            parse_command("filter in_progress").expect("parse"),
            Some(Command::Filter(StatusFilter::InProgress))
        );
        assert_eq!(
            parse_command("edit 5").expect("parse"),
            Some(Command::Edit(5))
        );
        assert_eq!(
            parse_command("set title Ship the release").expect("parse"),
            Some(Command::Set {
                field: "title".to_string(),
                value: "Ship the release".to_string(),
            })
        );
    }

    #[test]
    fn empty_lines_are_not_commands() {
        assert_eq!(parse_command("").expect("parse"), None);
        assert_eq!(parse_command("   ").expect("parse"), None);
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(parse_command("frobnicate").is_err());
        assert!(parse_command("edit five").is_err());
        assert!(parse_command("delete").is_err());
        assert!(parse_command("filter sideways").is_err());
    }
}
