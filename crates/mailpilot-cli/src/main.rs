mod commands;
mod state;
mod view;

use clap::{Parser, Subcommand};
use state::AppState;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "mailpilot", version, about = "AI-assisted mail client")]
struct Cli {
    /// Keep config and session data under this directory.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in to the mail agent backend.
    Login {
        #[arg(long)]
        email: String,
        /// Read from MAILPILOT_PASSWORD or prompted for when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Confirm an email address with its verification token.
    Verify { token: String },
    ResendVerification { email: String },
    Logout,
    /// Print the mail provider authorization page.
    Connect,
    /// Store the credential from the page the authorization redirected to.
    Callback { url: String },
    Disconnect,
    /// Show login and mail connection state.
    Status,
    /// Fetch and list the inbox.
    Inbox {
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// Show the last saved list without contacting the backend.
        #[arg(long)]
        offline: bool,
    },
    /// Show one message with a suggested reply.
    Show {
        id: String,
        #[arg(long)]
        no_ai: bool,
    },
    Send {
        #[arg(long)]
        to: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        body: String,
    },
    Draft {
        #[arg(long, default_value = "")]
        to: String,
        #[arg(long, default_value = "")]
        subject: String,
        #[arg(long)]
        body: String,
    },
    /// Revoke the mail tokens the backend holds for this account.
    ResetTokens,
    DeleteAccount {
        /// Your account email, repeated.
        #[arg(long)]
        confirm: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match commands::error_class(&err) {
                Some(class) => eprintln!("{}", view::error_line(class, &err.to_string())),
                None => eprintln!("Error: {err:#}"),
            }
            tracing::debug!(error = ?err, "command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::initialize(cli.root.as_deref())?;

    match cli.command {
        Command::Login { email, password } => {
            let password = commands::resolve_password(password)?;
            commands::login(&state, &email, &password).await
        }
        Command::Register { email, password } => {
            let password = commands::resolve_password(password)?;
            commands::register(&state, &email, &password).await
        }
        Command::Verify { token } => commands::verify(&state, &token).await,
        Command::ResendVerification { email } => {
            commands::resend_verification(&state, &email).await
        }
        Command::Logout => commands::logout(&state),
        Command::Connect => commands::connect(&state),
        Command::Callback { url } => commands::callback(&state, &url),
        Command::Disconnect => commands::disconnect(&state),
        Command::Status => commands::status(&state).await,
        Command::Inbox { page, offline } => commands::inbox(&state, page, offline).await,
        Command::Show { id, no_ai } => commands::show(&state, &id, !no_ai).await,
        Command::Send { to, subject, body } => commands::send(&state, &to, &subject, &body).await,
        Command::Draft { to, subject, body } => {
            commands::draft(&state, &to, &subject, &body).await
        }
        Command::ResetTokens => commands::reset_tokens(&state).await,
        Command::DeleteAccount { confirm } => commands::delete_account(&state, &confirm).await,
    }
}
