//! Interactive chat application for conversing with LexaAI.
//!
//! This binary provides a streaming REPL interface backed by the Gemini
//! generative language API.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage with default settings
//! lexa-chat
//!
//! # Keep nothing on disk
//! lexa-chat --ephemeral
//!
//! # Read settings from a YAML file
//! lexa-chat --config ~/.lexa/config.yaml
//!
//! # Disable colors (useful for piping output)
//! lexa-chat --no-color
//! ```
//!
//! Set `LEXA_LOG` (for example `LEXA_LOG=lexa=debug`) to see diagnostics on
//! stderr.
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/login`, `/signup`, `/logout`, `/upgrade` - Manage the account
//! - `/attach <path>...`, `/detach <n>`, `/attachments` - Manage attachments
//! - `/new`, `/save`, `/load` - Manage the conversation
//! - `/stats` - Show session statistics
//! - `/quit` - Exit the application

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use lexa::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, LoadOutcome, SaveOutcome, SessionStats,
    help_text, parse_command,
};
use lexa::{
    Credentials, FileStore, Gemini, KeyValueStore, MemoryStore, PlainTextRenderer, Renderer,
};

type Session = ChatSession<Gemini, Box<dyn KeyValueStore>>;

/// Main entry point for the lexa-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("LEXA_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("lexa-chat [OPTIONS]");
    let config = ChatConfig::load(args)?;
    let use_color = config.use_color;

    let store: Box<dyn KeyValueStore> = match config.resolved_store_dir() {
        Some(dir) if !config.ephemeral => Box::new(FileStore::new(dir)),
        _ => Box::new(MemoryStore::new()),
    };
    let client = match Gemini::with_options(None, config.base_url.clone(), config.timeout) {
        Ok(client) => client,
        Err(err) if err.is_authentication() => {
            tracing::warn!(error = %err, "starting without a model API key; replies will fail");
            Gemini::unauthenticated(config.base_url.clone(), config.timeout)?
        }
        Err(err) => return Err(err.into()),
    };
    let mut session: Session = ChatSession::open(client, store, config).await;

    // Flag for interrupt handling during streaming
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    let mut renderer = PlainTextRenderer::with_color_and_interrupt(use_color, interrupted.clone());
    let mut rl = DefaultEditor::new()?;

    println!("LexaAI ({})", describe_user(&session.stats()));
    println!("Type /help for commands, /quit to exit\n");

    loop {
        // Reset interrupt flag before each input
        interrupted.store(false, Ordering::Relaxed);

        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() && session.attachments().is_empty() {
                    continue;
                }

                if !line.is_empty() {
                    let _ = rl.add_history_entry(line);
                }

                if let Some(cmd) = parse_command(line) {
                    if !run_command(cmd, &mut session, &mut renderer, &mut rl).await {
                        println!("Goodbye!");
                        break;
                    }
                    continue;
                }

                println!("Lexa:");
                if let Err(e) = session.send(line, &mut renderer).await {
                    renderer.print_error(&e.to_string());
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

/// Execute one slash command.  Returns false when the user asked to quit.
async fn run_command(
    cmd: ChatCommand,
    session: &mut Session,
    renderer: &mut PlainTextRenderer,
    rl: &mut DefaultEditor,
) -> bool {
    match cmd {
        ChatCommand::Quit => return false,
        ChatCommand::Help => {
            for line in help_text().lines() {
                println!("    {}", line);
            }
        }
        ChatCommand::Login | ChatCommand::SignUp => {
            let credentials = match prompt_credentials(rl, cmd == ChatCommand::SignUp) {
                Ok(credentials) => credentials,
                Err(err) => {
                    renderer.print_error(&format!("Input error: {}", err));
                    return true;
                }
            };
            match session.login(&credentials).await {
                Ok(user) => renderer.print_info(&format!(
                    "Welcome, {}! You are on the {} plan.",
                    credentials.email(),
                    user.tier
                )),
                Err(err) => renderer.print_error(&err.to_string()),
            }
        }
        ChatCommand::Logout => match session.logout() {
            Ok(()) => renderer.print_info("Logged out. The conversation was cleared."),
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::Upgrade => match session.upgrade().await {
            Ok(_) => renderer.print_info("Upgrade successful! Welcome to PRO."),
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::NewChat => match session.new_chat() {
            Ok(()) => renderer.print_info("Started a new chat."),
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::Save => match session.save_chat() {
            Ok(SaveOutcome::NothingToSave) => renderer.print_info("There's nothing to save!"),
            Ok(SaveOutcome::Saved { .. }) => renderer.print_info("Chat saved successfully!"),
            Err(err) if err.is_persistence() => {
                tracing::warn!(error = %err, "save failed");
                renderer.print_error("Could not save the chat. Storage might be full.");
            }
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::Load => match session.load_chat() {
            Ok(LoadOutcome::NothingSaved) => renderer.print_info("No saved chat found."),
            Ok(LoadOutcome::Loaded { .. }) => {
                renderer.print_info("Chat loaded successfully!");
                print_conversation(session);
            }
            Err(err) if err.is_persistence() => {
                tracing::warn!(error = %err, "load failed");
                renderer
                    .print_error("Could not load the chat. The saved data might be corrupted.");
            }
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::Attach(paths) => match session.add_attachments(&paths) {
            Ok(count) => renderer.print_info(&format!(
                "{count} attachment(s) will be sent with your next message."
            )),
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::Detach(index) => match session.remove_attachment(index) {
            Ok(attachment) => renderer.print_info(&format!("Removed {}.", attachment.name())),
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::Attachments => print_attachments(session),
        ChatCommand::WhoAmI => renderer.print_info(&describe_user(&session.stats())),
        ChatCommand::Stats => print_stats(&session.stats()),
        ChatCommand::Invalid(message) => renderer.print_error(&message),
    }
    true
}

fn prompt_credentials(rl: &mut DefaultEditor, sign_up: bool) -> Result<Credentials, ReadlineError> {
    if sign_up {
        let first_name = rl.readline("First name: ")?;
        let last_name = rl.readline("Last name: ")?;
        let date_of_birth = rl.readline("Date of birth (YYYY-MM-DD): ")?;
        let email = rl.readline("Email: ")?;
        let password = rl.readline("Password: ")?;
        Ok(Credentials::sign_up(
            first_name.trim(),
            last_name.trim(),
            date_of_birth.trim(),
            email.trim(),
            password,
        ))
    } else {
        let email = rl.readline("Email: ")?;
        let password = rl.readline("Password: ")?;
        Ok(Credentials::login(email.trim(), password))
    }
}

fn describe_user(stats: &SessionStats) -> String {
    if stats.user.is_logged_in {
        format!("logged in, {} plan, model {}", stats.user.tier, stats.model)
    } else {
        format!("guest, model {}", stats.model)
    }
}

fn print_attachments(session: &Session) {
    let attachments = session.attachments();
    if attachments.is_empty() {
        println!("    No pending attachments.");
        return;
    }
    println!("    Pending attachments:");
    for (index, attachment) in attachments.iter().enumerate() {
        println!("      {}. {}", index + 1, attachment);
    }
}

fn print_conversation(session: &Session) {
    for message in session.messages() {
        println!("    {}: {}", message.role, message.text);
        for image in &message.images {
            println!("      [image] {}", image);
        }
    }
}

fn print_stats(stats: &SessionStats) {
    println!("    Session Statistics:");
    println!(
        "      User: {}",
        if stats.user.is_logged_in {
            "logged in"
        } else {
            "guest"
        }
    );
    println!("      Tier: {}", stats.user.tier);
    println!("      Model: {}", stats.model);
    println!("      Messages: {}", stats.message_count);
    println!(
        "      Attachments: {} pending (limit: {})",
        stats.pending_attachments, stats.attachment_limit
    );
    println!(
        "      Turns: {} completed, {} failed, {} cancelled",
        stats.turns_completed, stats.turns_failed, stats.turns_cancelled
    );
    println!("      Chunks received: {}", stats.chunks_received);
}
