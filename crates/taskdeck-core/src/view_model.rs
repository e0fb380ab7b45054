use anyhow::anyhow;
use tracing::{debug, info, warn};

use crate::api::TaskService;
use crate::session::SessionController;
use crate::task::{Priority, Status, StatusFilter, Task, TaskFields, TaskPayload, User};

/// The form region holds at most one draft at a time: either a brand-new
/// task or an edit of an existing one. Starting one mode forcibly exits the
/// other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormMode {
    #[default]
    Idle,
    Creating,
    Editing(i64),
}

/// Shared form buffer backing both create and edit.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub status: Status,
    pub priority: Priority,
    /// ISO date, empty when unset.
    pub due_date: String,
    pub owner: Option<i64>,
}

impl Default for TaskForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            status: Status::Pending,
            priority: Priority::Medium,
            due_date: String::new(),
            owner: None,
        }
    }
}

impl TaskForm {
    fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status,
            priority: task.priority,
            due_date: task.due_date.clone().unwrap_or_default(),
            owner: task.owner,
        }
    }

    fn to_fields(&self, owner: i64) -> TaskFields {
        TaskFields {
            title: self.title.clone(),
            description: self.description.clone(),
            status: self.status,
            priority: self.priority,
            due_date: if self.due_date.trim().is_empty() {
                None
            } else {
                Some(self.due_date.trim().to_string())
            },
            owner,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// Validation stopped the save before any network call.
    MissingOwner,
    /// Neither create nor edit mode is active.
    NoActiveForm,
}

/// In-memory state behind the task screen: the filtered task collection, the
/// form state machine, and the once-per-session user directory. All network
/// effects go through the injected [`TaskService`]; the auth token is read
/// back from the session store on every call.
#[derive(Debug)]
pub struct TaskViewModel<S> {
    service: S,
    tasks: Vec<Task>,
    users: Vec<User>,
    users_loaded: bool,
    filter: StatusFilter,
    mode: FormMode,
    form: TaskForm,
}

impl<S: TaskService> TaskViewModel<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            tasks: Vec::new(),
            users: Vec::new(),
            users_loaded: false,
            filter: StatusFilter::default(),
            mode: FormMode::default(),
            form: TaskForm::default(),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn filter(&self) -> StatusFilter {
        self.filter
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn form(&self) -> &TaskForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut TaskForm {
        &mut self.form
    }

    /// Resolves an owner id against the user directory, falling back to the
    /// "unassigned" label when there is no match.
    pub fn owner_name(&self, owner: Option<i64>) -> &str {
        owner
            .and_then(|id| self.users.iter().find(|user| user.id == id))
            .map(|user| user.username.as_str())
            .unwrap_or("unassigned")
    }

    /// Runs when the task screen becomes active: fetches the user directory
    /// once per session, then loads the current filter's collection.
    #[tracing::instrument(skip(self, session))]
    pub async fn activate(&mut self, session: &SessionController) -> anyhow::Result<()> {
        self.ensure_users(session).await?;
        self.load(session).await
    }

    async fn ensure_users(&mut self, session: &SessionController) -> anyhow::Result<()> {
        if self.users_loaded {
            return Ok(());
        }
        let token = self.auth_token(session)?;
        let users = self
            .service
            .list_users(&token)
            .await
            .map_err(|error| anyhow!(error).context("failed fetching user directory"))?;
        debug!(count = users.len(), "loaded user directory");
        self.users = users;
        self.users_loaded = true;
        Ok(())
    }

    /// Fetches the collection for the active filter. On failure the prior
    /// collection is left untouched; there is no retry.
    #[tracing::instrument(skip(self, session), fields(filter = self.filter.label()))]
    pub async fn load(&mut self, session: &SessionController) -> anyhow::Result<()> {
        let token = self.auth_token(session)?;
        match self.service.list_tasks(&token, self.filter).await {
            Ok(tasks) => {
                debug!(count = tasks.len(), "replaced task collection");
                self.tasks = tasks;
                Ok(())
            }
            Err(error) => {
                warn!(%error, "failed loading tasks");
                Err(anyhow!(error))
            }
        }
    }

    /// Changes the active filter; each change triggers exactly one reload
    /// scoped to the new value.
    #[tracing::instrument(skip(self, session))]
    pub async fn set_filter(
        &mut self,
        session: &SessionController,
        filter: StatusFilter,
    ) -> anyhow::Result<()> {
        self.filter = filter;
        self.load(session).await
    }

    pub fn start_create(&mut self) {
        self.mode = FormMode::Creating;
        self.form = TaskForm::default();
        debug!("entered create mode");
    }

    /// Copies the task's fields into the form buffer and exits any create
    /// mode in flight.
    pub fn start_edit(&mut self, id: i64) -> anyhow::Result<()> {
        let task = self
            .tasks
            .iter()
            .find(|task| task.id == Some(id))
            .ok_or_else(|| anyhow!("no task with id {id}"))?;

        self.form = TaskForm::from_task(task);
        self.mode = FormMode::Editing(id);
        debug!(id, "entered edit mode");
        Ok(())
    }

    /// Exits create/edit mode and restores the form defaults.
    pub fn cancel(&mut self) {
        self.reset_form();
    }

    fn reset_form(&mut self) {
        self.mode = FormMode::Idle;
        self.form = TaskForm::default();
    }

    /// Persists the form buffer: create mode issues a create, edit mode an
    /// update. A missing owner blocks the call entirely. Success resets the
    /// form and reloads the current filter; failure leaves the form open.
    #[tracing::instrument(skip(self, session))]
    pub async fn save(&mut self, session: &SessionController) -> anyhow::Result<SaveOutcome> {
        let payload = match self.mode {
            FormMode::Idle => return Ok(SaveOutcome::NoActiveForm),
            FormMode::Creating | FormMode::Editing(_) => {
                let Some(owner) = self.form.owner else {
                    debug!("save blocked: no owner selected");
                    return Ok(SaveOutcome::MissingOwner);
                };
                let fields = self.form.to_fields(owner);
                match self.mode {
                    FormMode::Editing(id) => TaskPayload::Persisted { id, fields },
                    _ => TaskPayload::Draft(fields),
                }
            }
        };

        let token = self.auth_token(session)?;
        let saved = self
            .service
            .save_task(&token, &payload)
            .await
            .map_err(|error| {
                warn!(%error, "failed saving task");
                anyhow!(error)
            })?;

        info!(id = ?saved.id, "saved task");
        self.reset_form();
        self.load(session).await?;
        Ok(SaveOutcome::Saved)
    }

    /// Deletes after interactive confirmation. A declined prompt issues no
    /// network call and leaves the collection unchanged. Returns whether the
    /// delete went through.
    #[tracing::instrument(skip(self, session, confirm))]
    pub async fn remove(
        &mut self,
        session: &SessionController,
        id: i64,
        confirm: impl FnOnce(&Task) -> bool,
    ) -> anyhow::Result<bool> {
        let task = self
            .tasks
            .iter()
            .find(|task| task.id == Some(id))
            .ok_or_else(|| anyhow!("no task with id {id}"))?;

        if !confirm(task) {
            debug!(id, "delete not confirmed");
            return Ok(false);
        }

        let token = self.auth_token(session)?;
        self.service.delete_task(&token, id).await.map_err(|error| {
            warn!(%error, id, "failed deleting task");
            anyhow!(error)
        })?;

        info!(id, "deleted task");
        self.load(session).await?;
        Ok(true)
    }

    /// Drops everything tied to the old session so the next one starts
    /// clean and refetches the user directory.
    pub fn reset_session(&mut self) {
        self.tasks.clear();
        self.users.clear();
        self.users_loaded = false;
        self.filter = StatusFilter::default();
        self.reset_form();
    }

    fn auth_token(&self, session: &SessionController) -> anyhow::Result<String> {
        session
            .access_token()?
            .ok_or_else(|| anyhow!("no access token in session store"))
    }
}
