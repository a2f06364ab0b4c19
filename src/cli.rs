//! Command line driver
//!
//! Each subcommand is one user action: it gets its own clock, its own
//! cancellation scope in the [`ActionRegistry`], and a tracing span.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use crate::api::auth::SignUpForm;
use crate::api::ApiClient;
use crate::assistant::history::HistoryCursor;
use crate::assistant::{
    Assistant, AssistantContext, AssistantStatus, Conversation, NextProblem, Origin, ReplyOutcome,
};
use crate::config::Config;
use crate::errors::TutorError;
use crate::executor::report;
use crate::executor::types::{ExecutionJob, ProblemRunEnvelope, SubmissionEnvelope};
use crate::executor::{ActionClock, ActionRegistry, JobExecutor, JobOutcome, JobTarget, PollResponse};
use crate::session::{SessionHandle, SessionStore};
use crate::telemetry::{init_tracing, init_tracing_verbose, track_action};

#[derive(Parser)]
#[command(name = "codetutor")]
#[command(about = "Terminal client for the code tutor: ask the AI tutor, run and submit code")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Quiet mode (results only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose mode (debug logging to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum Level {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Level {
    fn as_str(&self) -> &'static str {
        match self {
            Level::Beginner => "beginner",
            Level::Intermediate => "intermediate",
            Level::Advanced => "advanced",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and remember the session
    Signin {
        #[arg(short, long)]
        username: String,
        /// Read from stdin when omitted
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Create an account
    Signup {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
        #[arg(long, value_enum, default_value = "beginner")]
        level: Level,
    },

    /// Sign out and forget the session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Ask the AI tutor a question
    #[command(alias = "a")]
    Ask {
        question: String,
        /// Ask in the context of a lesson
        #[arg(long, conflicts_with = "problem")]
        lesson: Option<u64>,
        /// Lesson topic sent with --lesson
        #[arg(long, requires = "lesson")]
        topic: Option<String>,
        /// Ask about a problem
        #[arg(long)]
        problem: Option<u64>,
        /// Source file with your current code
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Output of your last run
        #[arg(long)]
        running_result: Option<String>,
    },

    /// Show chat history for a lesson
    History {
        #[arg(long)]
        lesson: u64,
        /// How many pages to load, newest first
        #[arg(long, default_value = "1")]
        pages: u32,
    },

    /// Run code in the playground or against a problem's test inputs
    #[command(alias = "r")]
    Run {
        /// Source file ("-" for stdin)
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Run against this problem's test inputs
        #[arg(long, conflicts_with = "example")]
        problem: Option<u64>,
        /// Start from a lesson example's code
        #[arg(long)]
        example: Option<u64>,
        /// Custom test input (repeatable); defaults to the problem's cases
        #[arg(short, long, requires = "problem")]
        input: Vec<String>,
    },

    /// Submit a solution for grading
    #[command(alias = "s")]
    Submit {
        #[arg(long)]
        problem: u64,
        /// Source file ("-" for stdin)
        #[arg(short, long)]
        file: PathBuf,
        /// Lesson the problem belongs to
        #[arg(long)]
        lesson: Option<u64>,
    },

    /// Ask the tutor for the next problem
    Next {
        /// Problem you just worked on
        #[arg(long)]
        problem: Option<u64>,
        #[arg(long, conflicts_with = "easier")]
        harder: bool,
        #[arg(long)]
        easier: bool,
    },
}

/// Everything a command needs for one invocation.
struct App {
    client: ApiClient,
    registry: ActionRegistry,
    cancel: CancellationToken,
    quiet: bool,
}

impl App {
    fn executor(&self) -> JobExecutor<ApiClient> {
        JobExecutor::new(self.client.clone(), self.client.config().polling.clone())
    }

    fn require_sign_in(&self) -> Result<()> {
        if !self.client.session().snapshot().is_signed_in() {
            return Err(TutorError::Auth(crate::errors::AuthError::NotSignedIn).into());
        }
        Ok(())
    }
}

pub async fn run(cancel: CancellationToken) -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        init_tracing_verbose();
    } else {
        init_tracing();
    }

    if cli.no_color || std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    let config_path: Option<String> = cli.config.map(|p| {
        let expanded = if let Some(rest) = p.strip_prefix("~/") {
            dirs::home_dir()
                .map(|h| h.join(rest).to_string_lossy().to_string())
                .unwrap_or(p.clone())
        } else {
            p.clone()
        };

        if Path::new(&expanded).is_absolute() {
            expanded
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&expanded).to_string_lossy().to_string())
                .unwrap_or(expanded)
        }
    });

    let config = Config::load(config_path.as_deref())?;
    let session = match config.session_path() {
        Some(path) => SessionHandle::open(SessionStore::new(path))?,
        None => SessionHandle::default(),
    };
    let app = App {
        client: ApiClient::new(&config, session)?,
        registry: ActionRegistry::new(),
        cancel,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Signin { username, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_line("Password: ")?,
            };
            track_action("signin", || cmd_signin(&app, &username, &password)).await
        }
        Commands::Signup {
            username,
            email,
            password,
            confirm_password,
            level,
        } => {
            let form = SignUpForm {
                username,
                email,
                password,
                confirm_password,
                level: level.as_str().to_string(),
            };
            track_action("signup", || cmd_signup(&app, &form)).await
        }
        Commands::Logout => track_action("logout", || cmd_logout(&app)).await,
        Commands::Whoami => cmd_whoami(&app),
        Commands::Ask {
            question,
            lesson,
            topic,
            problem,
            file,
            running_result,
        } => {
            let code = file.as_deref().map(read_code).transpose()?;
            track_action("ask", || {
                cmd_ask(&app, &question, lesson, topic, problem, code, running_result)
            })
            .await
        }
        Commands::History { lesson, pages } => {
            track_action("history", || cmd_history(&app, lesson, pages)).await
        }
        Commands::Run {
            file,
            problem,
            example,
            input,
        } => match problem {
            Some(problem_id) => {
                track_action("run-problem", || cmd_run_problem(&app, problem_id, file, input)).await
            }
            None => track_action("run-playground", || cmd_run_playground(&app, file, example)).await,
        },
        Commands::Submit {
            problem,
            file,
            lesson,
        } => track_action("submit", || cmd_submit(&app, problem, &file, lesson)).await,
        Commands::Next {
            problem,
            harder,
            easier,
        } => {
            let next = if harder {
                NextProblem::Harder
            } else if easier {
                NextProblem::Easier
            } else {
                NextProblem::Next
            };
            track_action("next", || cmd_next(&app, problem, next)).await
        }
    }
}

async fn cmd_signin(app: &App, username: &str, password: &str) -> Result<()> {
    let session = app.client.sign_in(username, password).await?;
    println!(
        "{} Signed in as {} ({})",
        "✓".green(),
        username.bold(),
        session.level.as_deref().unwrap_or("beginner")
    );
    Ok(())
}

async fn cmd_signup(app: &App, form: &SignUpForm) -> Result<()> {
    app.client.sign_up(form).await?;
    println!("{} Account created for {}", "✓".green(), form.username.bold());
    Ok(())
}

async fn cmd_logout(app: &App) -> Result<()> {
    if let Err(e) = app.client.logout().await {
        tracing::warn!("Server logout failed: {:#}", e);
    }
    println!("{} Signed out", "✓".green());
    Ok(())
}

fn cmd_whoami(app: &App) -> Result<()> {
    let session = app.client.session().snapshot();
    if !session.is_signed_in() {
        println!("{}", "Not signed in".dimmed());
        return Ok(());
    }
    println!(
        "{} (user {}, level {})",
        session.username.as_deref().unwrap_or("unknown").bold(),
        session.user_id.as_deref().unwrap_or("?"),
        session.level.as_deref().unwrap_or("beginner")
    );
    Ok(())
}

async fn cmd_ask(
    app: &App,
    question: &str,
    lesson: Option<u64>,
    topic: Option<String>,
    problem: Option<u64>,
    code: Option<String>,
    running_result: Option<String>,
) -> Result<()> {
    let session = app.client.session();
    let mut context = match (lesson, problem) {
        (Some(lesson_id), _) => {
            AssistantContext::for_lesson(lesson_id, topic.unwrap_or_default())
                .with_user(&session.snapshot())
        }
        (None, Some(problem_id)) => {
            let found = app.client.problem(problem_id).await?;
            AssistantContext::for_problem(problem_id)
                .with_testcases(serde_json::to_value(&found.test_cases)?)
                .with_problem_text(Some(found.title), found.description)
        }
        (None, None) => AssistantContext::for_playground(session.playground_session_id()),
    };
    if let Some(code) = code {
        context = context.with_code(code);
    }
    context = context.with_running_result(running_result);

    let ticket = app.registry.begin_child("ask", &app.cancel);
    let assistant = Assistant::new(app.client.clone());
    let mut conversation = Conversation::new();
    let mut shown_running = false;
    let mut stdout = io::stdout();

    let outcome = assistant
        .ask(&mut conversation, question, &context, ticket.token(), |update| {
            if update.status == AssistantStatus::RunningCode && !shown_running {
                shown_running = true;
                eprintln!("{}", "(running your code...)".dimmed());
            }
            print!("{}", update.delta);
            let _ = stdout.flush();
        })
        .await?;
    println!();

    match outcome {
        ReplyOutcome::Completed => {}
        ReplyOutcome::Empty => eprintln!("{}", "The tutor sent an empty reply.".yellow()),
        ReplyOutcome::Cancelled => eprintln!("{}", "Stopped.".yellow()),
    }
    if let Some(suggestion) = conversation.latest_suggestion() {
        println!("{} {}", "→".cyan(), suggestion.label().bold());
        println!("  {}", suggestion.link().dimmed());
    }
    Ok(())
}

async fn cmd_history(app: &App, lesson: u64, pages: u32) -> Result<()> {
    app.require_sign_in()?;
    let mut cursor = HistoryCursor::new(lesson, app.client.config().history_page_size);
    let mut conversation = Conversation::new();
    for _ in 0..pages.max(1) {
        if cursor.load_more(&app.client, &mut conversation).await? == 0 {
            break;
        }
    }

    if conversation.is_empty() {
        println!("{}", "No conversation yet for this lesson.".dimmed());
        return Ok(());
    }
    for message in conversation.messages() {
        match message.origin {
            Origin::User => println!("{} {}", "you:".bold().blue(), message.visible_text()),
            Origin::Assistant => println!("{} {}\n", "tutor:".bold().green(), message.visible_text()),
        }
    }
    if cursor.has_more() && !app.quiet {
        println!("{}", "(older messages available with --pages)".dimmed());
    }
    Ok(())
}

async fn cmd_run_playground(app: &App, file: Option<PathBuf>, example: Option<u64>) -> Result<()> {
    let code = match (file, example) {
        (Some(path), _) => read_code(&path)?,
        (None, Some(id)) => app.client.example(id).await?.code,
        (None, None) => bail!("Nothing to run: pass --file or --example"),
    };

    let mut clock = ActionClock::start();
    let ticket = app.registry.begin_child("playground", &app.cancel);
    if !app.quiet {
        eprintln!("{}", "Running...".dimmed());
    }
    let outcome: JobOutcome<ExecutionJob> = app
        .executor()
        .execute(&JobTarget::Playground { code }, &mut clock, ticket.token())
        .await?;

    println!("{}", report::render_playground(&outcome));
    finish_outcome(outcome)
}

async fn cmd_run_problem(app: &App, problem_id: u64, file: Option<PathBuf>, input: Vec<String>) -> Result<()> {
    let mut clock = ActionClock::start();
    let problem = app.client.problem(problem_id).await?;
    let code = match file {
        Some(path) => read_code(&path)?,
        None => problem
            .starter_code
            .clone()
            .context("Problem has no starter code; pass --file")?,
    };
    let inputs = if input.is_empty() {
        problem.inputs()
    } else {
        input
    };

    let ticket = app.registry.begin_child("problem-run", &app.cancel);
    if !app.quiet {
        eprintln!(
            "{} {} against {} test case(s)...",
            "Running".dimmed(),
            problem.title.bold(),
            inputs.len()
        );
    }
    let target = JobTarget::ProblemRun {
        problem_id,
        code,
        inputs,
    };
    let outcome: JobOutcome<ProblemRunEnvelope> =
        app.executor().execute(&target, &mut clock, ticket.token()).await?;

    println!("{}", report::render_problem_run(&outcome));

    let action = match &outcome {
        JobOutcome::Finished(env) | JobOutcome::Failed(env) => env.action.as_ref(),
        _ => None,
    };
    if let Some(action) = action {
        tracing::debug!(?action, "Tutor action");
        if let Some(message) = report::action_message(action) {
            println!("\n{}", message.cyan());
        }
        if action.offers_next_problem() {
            let flag = match NextProblem::from_action(Some(action)) {
                NextProblem::Harder => " --harder",
                NextProblem::Easier => " --easier",
                NextProblem::Next => "",
            };
            println!(
                "{}",
                format!("Run `codetutor next --problem {}{}`", problem_id, flag).dimmed()
            );
        }
    }
    finish_outcome(outcome)
}

async fn cmd_submit(app: &App, problem_id: u64, file: &Path, lesson: Option<u64>) -> Result<()> {
    app.require_sign_in()?;
    let mut clock = ActionClock::start();
    let code = read_code(file)?;
    let target = JobTarget::Submit {
        problem_id,
        code,
        user_id: app.client.session().snapshot().numeric_user_id(),
        lesson_id: lesson,
    };

    let ticket = app.registry.begin_child("submit", &app.cancel);
    if !app.quiet {
        eprintln!("{}", "Submitting...".dimmed());
    }
    let outcome: JobOutcome<SubmissionEnvelope> =
        app.executor().execute(&target, &mut clock, ticket.token()).await?;

    let Some(result) = outcome.into_result()?.result else {
        bail!("Submission finished without a result");
    };

    let text = report::render_submission(&result);
    if result.accepted() {
        println!("{}", text.green());
        println!(
            "\n{}",
            format!("Go to the next problem? Run `codetutor next --problem {}`", problem_id).dimmed()
        );
    } else {
        println!("{}", text);
    }
    Ok(())
}

async fn cmd_next(app: &App, problem: Option<u64>, next: NextProblem) -> Result<()> {
    let session = app.client.session().snapshot();
    let context = AssistantContext {
        problem_id: problem,
        ..AssistantContext::default()
    }
    .with_user(&session);

    let ticket = app.registry.begin_child("next", &app.cancel);
    let assistant = Assistant::new(app.client.clone());
    match assistant
        .request_next_problem(next, &context, ticket.token())
        .await?
    {
        Some(suggestion) => {
            println!("{} {}", "→".cyan(), suggestion.label().bold());
            println!("  {}", suggestion.link().dimmed());
            if !app.quiet {
                println!(
                    "{}",
                    format!("Run it with `codetutor run --problem {} --file <solution>`", suggestion.id)
                        .dimmed()
                );
            }
        }
        None => println!("{}", "The tutor did not suggest a problem.".yellow()),
    }
    Ok(())
}

/// Map non-success job outcomes onto the process result.
fn finish_outcome<T: PollResponse>(outcome: JobOutcome<T>) -> Result<()> {
    outcome.into_result().map(|_| ())
}

fn read_code(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut code = String::new();
        io::stdin()
            .read_to_string(&mut code)
            .context("Failed to read code from stdin")?;
        return Ok(code);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn prompt_line(prompt: &str) -> Result<String> {
    eprint!("{}", prompt);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    let line = line.trim_end_matches(['\r', '\n']).to_string();
    if line.is_empty() {
        bail!("Empty password");
    }
    Ok(line)
}
