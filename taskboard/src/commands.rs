//! CLI subcommands and their execution.
//!
//! Every command works on an explicitly passed [`CommandContext`]: the
//! resolved config, the session and a controller over the REST store.
//! Mutating commands load the board first so the controller sees what the
//! user sees, then print the resulting notice and the board.

use std::fmt::Write as _;
use std::time::Duration;

use chrono::NaiveDate;
use clap::Subcommand;

use taskboard_proto::{AuthGrant, Priority, Task, TaskDraft, TaskId, TaskStatus, User, UserId};

use crate::board::Column;
use crate::config::ClientConfig;
use crate::controller::{Notice, NoticeLevel, OperationError, TaskController};
use crate::drag::{self, DragEnd, DragOutcome};
use crate::notify::{NotifyClient, NotifyError};
use crate::session::{Session, SessionError};
use crate::store::StoreError;
use crate::store::http::HttpTaskStore;

/// How long a finishing command waits for queued hints to go out.
const HINT_FLUSH_GRACE: Duration = Duration::from_secs(2);

/// Subcommands of the `taskboard` binary.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Log in and store the session.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TASKBOARD_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and log in as it.
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "TASKBOARD_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session.
    Logout,
    /// Show the logged-in user.
    Whoami,
    /// Show the board.
    Board,
    /// Create a task in To Do.
    Create {
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, value_parser = parse_priority, default_value = "medium")]
        priority: Priority,
        /// Due date, YYYY-MM-DD.
        #[arg(long)]
        due: NaiveDate,
        /// User id, email or name. Repeatable.
        #[arg(long = "assignee")]
        assignees: Vec<String>,
    },
    /// Change fields of a task.
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_parser = parse_priority)]
        priority: Option<Priority>,
        #[arg(long, value_parser = parse_status)]
        status: Option<TaskStatus>,
        #[arg(long)]
        due: Option<NaiveDate>,
        /// Replaces the assignee list. Repeatable.
        #[arg(long = "assignee")]
        assignees: Vec<String>,
        /// Removes every assignee.
        #[arg(long, conflicts_with = "assignees")]
        unassign: bool,
    },
    /// Move a task to a column, or to the column of another task.
    Move {
        id: String,
        /// Column (`todo`, `in-progress`, `done`) or another task's id.
        target: String,
    },
    /// Delete a task.
    Delete { id: String },
    /// List users.
    Users,
    /// Show the board and refresh it whenever another client changes it.
    Watch,
}

/// Errors a command can end with.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{}", .0.notice())]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error("not logged in; run `taskboard login` first")]
    NotLoggedIn,

    #[error("{0}")]
    Input(String),
}

/// Everything a command needs.
pub struct CommandContext {
    pub config: ClientConfig,
    pub session: Session,
    pub controller: TaskController<HttpTaskStore>,
}

impl CommandContext {
    /// Builds the REST store with the session's token and wraps it in a
    /// controller with an empty board.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built for the configured API.
    pub fn new(config: ClientConfig, session: Session) -> Result<Self, CommandError> {
        let store =
            HttpTaskStore::new(&config.api)?.with_token(session.token().map(str::to_string));
        Ok(Self {
            config,
            session,
            controller: TaskController::new(store),
        })
    }
}

/// Runs one command to completion.
///
/// # Errors
///
/// Returns the first failure; for controller failures the board has
/// already been restored.
pub async fn execute(command: Command, ctx: &mut CommandContext) -> Result<(), CommandError> {
    tracing::debug!(?command, "executing command");
    match command {
        Command::Login { email, password } => {
            let grant = ctx.controller.store().login(&email, &password).await?;
            sign_in(ctx, grant).await
        }
        Command::Register {
            name,
            email,
            password,
        } => {
            let grant = ctx
                .controller
                .store()
                .register(&name, &email, &password)
                .await?;
            sign_in(ctx, grant).await
        }
        Command::Logout => {
            ctx.session.clear()?;
            ctx.controller.store().set_token(None);
            println!("Logged out");
            Ok(())
        }
        Command::Whoami => {
            match ctx.session.user() {
                Some(user) => println!("{} <{}> ({})", user.name, user.email, user.id),
                None => println!("Not logged in"),
            }
            Ok(())
        }
        Command::Board => {
            require_login(ctx)?;
            ctx.controller.load().await?;
            print!("{}", render_board(&ctx.controller.snapshot()));
            Ok(())
        }
        Command::Users => {
            require_login(ctx)?;
            let users = ctx.controller.list_users().await?;
            print!("{}", render_users(&users));
            Ok(())
        }
        Command::Watch => watch(ctx).await,
        mutation => mutate(ctx, mutation).await,
    }
}

async fn sign_in(ctx: &mut CommandContext, grant: AuthGrant) -> Result<(), CommandError> {
    ctx.controller
        .store()
        .set_token(Some(grant.token.clone()));
    let name = grant.user.name.clone();
    ctx.session.establish(grant)?;
    println!("Logged in as {name}");
    ctx.controller.load().await?;
    print!("{}", render_board(&ctx.controller.snapshot()));
    Ok(())
}

fn require_login(ctx: &CommandContext) -> Result<&User, CommandError> {
    ctx.session.user().ok_or(CommandError::NotLoggedIn)
}

/// Create, edit, move and delete: load, apply, announce, print.
async fn mutate(ctx: &mut CommandContext, command: Command) -> Result<(), CommandError> {
    let user_id = require_login(ctx)?.id.clone();
    let hints = match &ctx.config.notify {
        Some(notify) => match NotifyClient::connect(notify, &user_id).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "continuing without hint channel");
                None
            }
        },
        None => None,
    };
    ctx.controller
        .set_announcer(hints.as_ref().map(NotifyClient::announcer));

    ctx.controller.load().await?;
    let result = apply(&ctx.controller, command).await;
    if let Some(hints) = hints {
        hints.close(HINT_FLUSH_GRACE).await;
    }
    let notice = result?;
    if let Some(notice) = notice {
        println!("{}", render_notice(&notice));
    }
    print!("{}", render_board(&ctx.controller.snapshot()));
    Ok(())
}

async fn apply(
    controller: &TaskController<HttpTaskStore>,
    command: Command,
) -> Result<Option<Notice>, CommandError> {
    match command {
        Command::Create {
            title,
            description,
            priority,
            due,
            assignees,
        } => {
            let assignees = resolve_assignees_via(controller, &assignees).await?;
            let draft = TaskDraft::new(title, due)
                .with_description(description)
                .with_priority(priority)
                .with_assignees(assignees);
            if let Err(reason) = draft.validate() {
                return Err(CommandError::Input(reason));
            }
            controller.create(&draft).await?;
            Ok(Some(Notice::created()))
        }
        Command::Edit {
            id,
            title,
            description,
            priority,
            status,
            due,
            assignees,
            unassign,
        } => {
            let id = TaskId::new(id);
            let mut edited = controller
                .task(&id)
                .ok_or_else(|| CommandError::Input(format!("no task {id} on the board")))?;
            if let Some(title) = title {
                edited.title = title;
            }
            if let Some(description) = description {
                edited.description = description;
            }
            if let Some(priority) = priority {
                edited.priority = priority;
            }
            if let Some(status) = status {
                edited.status = status;
            }
            if due.is_some() {
                edited.due_date = due;
            }
            if unassign {
                edited.assignees.clear();
            } else if !assignees.is_empty() {
                edited.assignees = resolve_assignees_via(controller, &assignees)
                    .await?
                    .into_iter()
                    .map(taskboard_proto::AssigneeRef::bare)
                    .collect();
            }
            controller.update(&edited).await?;
            Ok(Some(Notice::updated()))
        }
        Command::Move { id, target } => {
            let over = TaskStatus::parse(&target).map_or(target, |s| s.key().to_string());
            let event = DragEnd::new(id, Some(over));
            match drag::handle_drag_end(controller, &event).await? {
                DragOutcome::Moved(task) => Ok(Some(Notice::moved(task.status))),
                DragOutcome::Unchanged => Ok(None),
                DragOutcome::Ignored(reason) => Err(CommandError::Input(reason.to_string())),
            }
        }
        Command::Delete { id } => {
            controller.delete(&TaskId::new(id)).await?;
            Ok(Some(Notice::deleted()))
        }
        other => Err(CommandError::Input(format!("{other:?} is not a task change"))),
    }
}

async fn watch(ctx: &CommandContext) -> Result<(), CommandError> {
    let user_id = require_login(ctx)?.id.clone();
    let notify = ctx
        .config
        .notify
        .as_ref()
        .ok_or_else(|| CommandError::Input("no hint channel configured (--notify-url)".into()))?;
    let mut hints = NotifyClient::connect(notify, &user_id).await?;

    ctx.controller.load().await?;
    print!("{}", render_board(&ctx.controller.snapshot()));
    while let Some(hint) = hints.next_hint().await {
        tracing::info!(origin = %hint.origin, "refreshing board");
        match ctx.controller.load().await {
            Ok(_) => print!("\n{}", render_board(&ctx.controller.snapshot())),
            Err(e) => eprintln!("{}", render_notice(&e.notice())),
        }
    }
    println!("Hint channel closed");
    Ok(())
}

async fn resolve_assignees_via(
    controller: &TaskController<HttpTaskStore>,
    wanted: &[String],
) -> Result<Vec<UserId>, CommandError> {
    if wanted.is_empty() {
        return Ok(Vec::new());
    }
    let users = controller.list_users().await?;
    resolve_assignees(&users, wanted)
}

/// Maps user-typed assignee references (id, email or name) to ids.
///
/// # Errors
///
/// [`CommandError::Input`] naming the first reference that matches no
/// user.
pub fn resolve_assignees(users: &[User], wanted: &[String]) -> Result<Vec<UserId>, CommandError> {
    wanted
        .iter()
        .map(|w| {
            users
                .iter()
                .find(|u| {
                    u.id.as_str() == w
                        || u.email.eq_ignore_ascii_case(w)
                        || u.name.eq_ignore_ascii_case(w)
                })
                .map(|u| u.id.clone())
                .ok_or_else(|| CommandError::Input(format!("unknown user {w:?}")))
        })
        .collect()
}

fn parse_priority(raw: &str) -> Result<Priority, String> {
    Priority::parse(raw).ok_or_else(|| format!("expected low, medium or high, got {raw:?}"))
}

fn parse_status(raw: &str) -> Result<TaskStatus, String> {
    TaskStatus::parse(raw).ok_or_else(|| format!("expected todo, in-progress or done, got {raw:?}"))
}

/// Plain-text board: one block per column, newest first.
#[must_use]
pub fn render_board(columns: &[Column]) -> String {
    let mut out = String::new();
    for column in columns {
        let _ = writeln!(out, "{} ({})", column.title, column.tasks.len());
        if column.tasks.is_empty() {
            out.push_str("  -\n");
        }
        for task in &column.tasks {
            let _ = writeln!(out, "  {}", render_task(task));
        }
    }
    out
}

fn render_task(task: &Task) -> String {
    let mut line = format!("{} [{}] {}", task.id, task.priority, task.title);
    if let Some(due) = task.due_date {
        let _ = write!(line, " (due {due})");
    }
    if !task.assignees.is_empty() {
        let names: Vec<&str> = task.assignees.iter().map(|a| a.label()).collect();
        let _ = write!(line, " @{}", names.join(", @"));
    }
    line
}

fn render_users(users: &[User]) -> String {
    let mut out = String::new();
    for user in users {
        let _ = write!(out, "{}  {} <{}>", user.id, user.name, user.email);
        if let Some(role) = &user.role {
            let _ = write!(out, "  {role}");
        }
        out.push('\n');
    }
    out
}

fn render_notice(notice: &Notice) -> String {
    match notice.level {
        NoticeLevel::Success => format!("ok: {notice}"),
        NoticeLevel::Error => format!("error: {notice}"),
    }
}
