use crate::state::AppState;
use crate::view;
use anyhow::Context;
use mailpilot_ai::{quick_category, AiError};
use mailpilot_config::ConfigError;
use mailpilot_core::{paginate, DraftMail, ErrorClass, OutgoingMail, Pagination};
use mailpilot_email::{reply_compose_url, ApiError, ListOutcome};
use mailpilot_security::SecurityError;
use tokio::sync::broadcast::error::RecvError;
use url::Url;

pub const PASSWORD_ENV: &str = "MAILPILOT_PASSWORD";

/// Password from the flag, then the environment, then an unechoed prompt.
pub fn resolve_password(flag: Option<String>) -> anyhow::Result<String> {
    password_from(flag, std::env::var(PASSWORD_ENV).ok(), || {
        eprint!("Password: ");
        rpassword::read_password().context("read password")
    })
}

fn password_from(
    flag: Option<String>,
    env: Option<String>,
    prompt: impl FnOnce() -> anyhow::Result<String>,
) -> anyhow::Result<String> {
    match flag.or(env).filter(|password| !password.is_empty()) {
        Some(password) => Ok(password),
        None => prompt(),
    }
}

pub async fn login(state: &AppState, email: &str, password: &str) -> anyhow::Result<()> {
    let session = state.accounts.login(email, password).await?;
    println!("Logged in as {}", session.user_email);
    Ok(())
}

pub async fn register(state: &AppState, email: &str, password: &str) -> anyhow::Result<()> {
    let registration = state.accounts.register(email, password).await?;
    println!("{}", registration.msg);
    if let Some(token) = registration.verification_token {
        println!("Verify with: mailpilot verify {token}");
    }
    Ok(())
}

pub async fn verify(state: &AppState, token: &str) -> anyhow::Result<()> {
    println!("{}", state.accounts.verify(token).await?);
    Ok(())
}

pub async fn resend_verification(state: &AppState, email: &str) -> anyhow::Result<()> {
    println!("{}", state.accounts.resend_verification(email).await?);
    Ok(())
}

pub fn logout(state: &AppState) -> anyhow::Result<()> {
    state.accounts.logout()?;
    println!("Logged out");
    Ok(())
}

pub fn connect(state: &AppState) -> anyhow::Result<()> {
    state.sessions.require()?;
    println!("Open this page to link your mail account:");
    println!("{}", state.connection.authorize_url());
    println!("Then run `mailpilot callback <redirected url>`.");
    Ok(())
}

pub fn callback(state: &AppState, raw_url: &str) -> anyhow::Result<()> {
    state.sessions.require()?;
    let url = Url::parse(raw_url.trim()).context("parse callback url")?;
    match state.connection.accept_callback(&url)? {
        Some(stripped) => {
            println!("Mail account connected");
            tracing::debug!(%stripped, "callback parameters removed");
        }
        None => println!("No credential found in that url"),
    }
    Ok(())
}

pub fn disconnect(state: &AppState) -> anyhow::Result<()> {
    state.sessions.require()?;
    state.connection.disconnect()?;
    println!("Mail account disconnected");
    Ok(())
}

pub async fn status(state: &AppState) -> anyhow::Result<()> {
    let session = state.sessions.require()?;
    println!("Logged in as {}", session.user_email);
    println!("Config: {}", state.config_manager.config_path().display());
    let check = state.connection.check().await?;
    println!("{}", view::status(check.status, check.profile.as_ref()));
    Ok(())
}

pub async fn inbox(state: &AppState, page: usize, offline: bool) -> anyhow::Result<()> {
    state.sessions.require()?;
    if offline {
        print_cached(state, page);
        return Ok(());
    }

    let mut events = state.inbox.subscribe();
    let aggregator = state.inbox.clone();
    let mut refresh = tokio::spawn(async move { aggregator.refresh().await });

    let outcome = loop {
        tokio::select! {
            biased;
            event = events.recv() => match event {
                Ok(event) => eprintln!("{}", view::event_line(&event)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "inbox progress events dropped")
                }
                Err(RecvError::Closed) => {
                    break (&mut refresh).await.context("inbox refresh task")?
                }
            },
            joined = &mut refresh => break joined.context("inbox refresh task")?,
        }
    };
    while let Ok(event) = events.try_recv() {
        eprintln!("{}", view::event_line(&event));
    }

    match outcome {
        Some(ListOutcome::Success) => {
            let snapshot = state.inbox.snapshot();
            let window = Pagination::page(page, state.config.inbox.page_size);
            print!("{}", view::page(&paginate(&snapshot.messages, &window)));
        }
        Some(ListOutcome::Error { .. }) => print_cached(state, page),
        None => tracing::debug!("inbox refresh superseded"),
    }
    Ok(())
}

fn print_cached(state: &AppState, page: usize) {
    match state.inbox.cached() {
        Some(cached) => {
            println!(
                "Showing list saved {}",
                cached.saved_at.format("%Y-%m-%d %H:%M UTC")
            );
            let window = Pagination::page(page, state.config.inbox.page_size);
            print!("{}", view::page(&paginate(&cached.messages, &window)));
        }
        None => println!("No saved message list."),
    }
}

pub async fn show(state: &AppState, message_id: &str, with_ai: bool) -> anyhow::Result<()> {
    state.sessions.require()?;
    let detail = state.mail.message_detail(message_id).await?;
    print!("{}", view::detail(&detail, quick_category(&detail)));
    if !with_ai {
        return Ok(());
    }

    let outcome = state.ai.generate_reply(message_id, Some(&detail)).await?;
    println!();
    print!("{}", view::reply(&outcome));
    let compose = reply_compose_url(&state.compose_url, &detail, &outcome.reply.reply)?;
    println!("\nReply in your mail client:\n{compose}");
    Ok(())
}

pub async fn send(state: &AppState, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
    state.sessions.require()?;
    let mail = OutgoingMail {
        to: to.to_string(),
        subject: subject.to_string(),
        body: body.to_string(),
        in_reply_to: None,
    };
    state.compose.send(&mail).await?;
    println!("Email sent");
    Ok(())
}

pub async fn draft(state: &AppState, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
    state.sessions.require()?;
    let draft = DraftMail {
        to: to.to_string(),
        subject: subject.to_string(),
        body: body.to_string(),
    };
    state.compose.save_draft(&draft).await?;
    println!("Draft saved");
    Ok(())
}

pub async fn reset_tokens(state: &AppState) -> anyhow::Result<()> {
    state.accounts.reset_mail_tokens().await?;
    println!("Mail tokens reset. Run `mailpilot connect` to link your account again.");
    Ok(())
}

pub async fn delete_account(state: &AppState, confirmation: &str) -> anyhow::Result<()> {
    state.accounts.delete_account(confirmation).await?;
    println!("Account deleted");
    Ok(())
}

/// Class of the first typed error in the chain.
pub fn error_class(err: &anyhow::Error) -> Option<ErrorClass> {
    err.chain().find_map(|cause| {
        if let Some(err) = cause.downcast_ref::<ApiError>() {
            Some(err.class())
        } else if let Some(err) = cause.downcast_ref::<AiError>() {
            Some(err.class())
        } else if let Some(err) = cause.downcast_ref::<SecurityError>() {
            Some(err.class())
        } else {
            cause
                .downcast_ref::<ConfigError>()
                .map(|_| ErrorClass::Validation)
        }
    })
}
