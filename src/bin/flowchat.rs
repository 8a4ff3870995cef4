//! Interactive chat application for conversing with a flow backend.
//!
//! This binary provides a streaming REPL interface for chatting with one flow,
//! resuming earlier sessions, and switching between flows.
//!
//! # Usage
//!
//! ```bash
//! # Chat with a flow by endpoint alias or name
//! flowchat --flow support-bot
//!
//! # Point at a remote backend and resume a session
//! flowchat --base-url https://flows.example.com/ --flow support-bot --session 5d1c...
//!
//! # Wait for complete replies instead of streaming
//! flowchat --flow support-bot --no-stream
//!
//! # Disable colors (useful for piping output)
//! flowchat --flow support-bot --no-color
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `warn`).
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/session [id]` - Resume a session, or show the current one
//! - `/new` - Start a new conversation
//! - `/stream on|off` - Toggle streaming
//! - `/flow <id>` - Switch flows
//! - `/status` - Show session status
//! - `/quit` - Exit the application

use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use flowchat::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, TurnOutcome, help_text, parse_command,
};
use flowchat::{
    ChatDisplay, FlowClient, FlowIdentifierResolver, PlainTextDisplay, Profile, Sender, Transport,
    is_canonical_id,
};

/// Moves the cursor up one line and erases it.
const ERASE_PREVIOUS_LINE: &str = "\x1b[1A\x1b[2K";

/// Main entry point for the flowchat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("flowchat [OPTIONS]");
    let base_url = args.base_url.clone();
    let resume = args.session.clone();
    let config = ChatConfig::from(args);
    let use_color = config.use_color;

    if config.flow_id.trim().is_empty() {
        eprintln!("flowchat: --flow is required (canonical ID, endpoint alias, or flow name)");
        std::process::exit(2);
    }

    let client = Arc::new(FlowClient::with_options(
        base_url,
        Some(config.request_timeout),
    )?);
    let mut display = PlainTextDisplay::with_color(use_color)
        .with_labels(config.user_label.clone(), config.bot_label.clone());

    let mut resolver = FlowIdentifierResolver::new().with_timeout(config.request_timeout);
    let mut profiles = vec![Profile::new("flowchat", config.flow_id.clone())];
    let report = resolver.initialize(client.as_ref(), &mut profiles).await;
    if let Some(err) = &report.error {
        display.print_info(&format!("Could not list flows ({err}); using --flow as given."));
    } else if !report.failed.is_empty() {
        display.print_info(&format!(
            "Flow {:?} not found; using it as given.",
            profiles[0].flow_id
        ));
    }
    let config = config.with_flow_id(profiles[0].flow_id.clone());

    let transport: Arc<dyn Transport> = client.clone();
    let mut session = ChatSession::new(transport, config);
    let mut rl = DefaultEditor::new()?;

    // Ctrl+C while a turn is in flight tears the session down.
    let teardown = session.teardown_handle();
    ctrlc::set_handler(move || {
        teardown.tear_down();
    })?;

    println!(
        "Flow Chat (flow: {}, backend: {})",
        session.flow_id(),
        client.base_url()
    );
    println!("Type /help for commands, /quit to exit\n");

    if resume.is_some() {
        session
            .set_session_id_and_load_history(resume.as_deref(), &mut display)
            .await;
    } else if let Some(welcome) = session.config().welcome_message.clone() {
        display.add_message(&Sender::System, &welcome, false, None);
    }

    loop {
        let readline = rl.readline("> ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                // Check for slash commands
                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::Session(None) => match session.session_id() {
                            Some(id) => display.print_info(&format!("Session: {id}")),
                            None => display.print_info("No session yet."),
                        },
                        ChatCommand::Session(Some(id)) => {
                            session
                                .set_session_id_and_load_history(Some(&id), &mut display)
                                .await;
                        }
                        ChatCommand::New => {
                            session
                                .set_session_id_and_load_history(None, &mut display)
                                .await;
                            display.print_info("Started a new conversation.");
                        }
                        ChatCommand::Stream(streaming) => {
                            session.set_streaming(streaming);
                            if streaming {
                                display.print_info("Streaming enabled.");
                            } else {
                                display.print_info("Streaming disabled.");
                            }
                        }
                        ChatCommand::Flow(identifier) => {
                            let flow_id = if is_canonical_id(identifier.trim()) {
                                identifier.trim().to_string()
                            } else if resolver.is_initialized() {
                                match resolver.resolve(&identifier) {
                                    Ok(flow_id) => flow_id,
                                    Err(err) => {
                                        display.print_info(&err.to_string());
                                        continue;
                                    }
                                }
                            } else {
                                identifier.trim().to_string()
                            };
                            session.set_flow_id(flow_id.clone());
                            display.print_info(&format!("Flow changed to: {flow_id}"));
                        }
                        ChatCommand::Status => {
                            print_status(&session);
                        }
                        ChatCommand::Invalid(message) => {
                            display.print_info(&message);
                        }
                    }
                    continue;
                }

                // Regular message; the display echoes it with the user's label.
                if use_color {
                    print!("{ERASE_PREVIOUS_LINE}");
                }
                let outcome = session.send(line, &mut display).await;
                if outcome == TurnOutcome::Aborted {
                    println!();
                    match session.session_id() {
                        Some(id) => println!("Interrupted. Resume with --session {id}"),
                        None => println!("Interrupted."),
                    }
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                display.print_info(&format!("Input error: {}", err));
                break;
            }
        }
    }

    session.teardown();
    Ok(())
}

fn print_status(session: &ChatSession) {
    let stats = session.stats();
    println!("    Session Status:");
    println!("      Flow: {}", stats.flow_id);
    match stats.session_id.as_deref() {
        Some(id) => println!("      Session: {id}"),
        None => println!("      Session: (none)"),
    }
    println!(
        "      History: {}",
        if stats.history_loaded {
            "loaded"
        } else {
            "not loaded"
        }
    );
    println!(
        "      Streaming: {}",
        if stats.streaming { "on" } else { "off" }
    );
    println!(
        "      Turns: {} ({} failed)",
        stats.turns, stats.failed_turns
    );
}
