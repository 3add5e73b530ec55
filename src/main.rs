// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Sage CLI
//!
//! A minimal line-based front end for the session engine: reads input,
//! consumes generation streams, and drives the agent loop. Richer UIs
//! embed the library the same way this loop does.

use std::io::{BufRead, Write};
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sage::commands::CommandRegistry;
use sage::config::{Mode, Settings};
use sage::generation::{self, HttpGenerationService};
use sage::message::Message;
use sage::session::{Event, Session};
use sage::tools::ToolRegistry;

#[derive(Parser, Debug)]
#[command(name = "sage", about = "Interactive AI assistant", version)]
struct Args {
    /// Generation service address (overrides configuration)
    #[arg(long)]
    server: Option<String>,

    /// Assistant mode to start in (Coding, Documenting, Chat, Agent)
    #[arg(long)]
    mode: Option<Mode>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let root = std::env::current_dir()?;

    let mut settings = Settings::load(&root)?;
    if let Some(server) = args.server {
        settings.server.addr = server;
    }
    if let Some(mode) = args.mode {
        settings.mode = mode;
    }

    let service = Arc::new(HttpGenerationService::new(&settings.server.addr));
    let registry = Arc::new(CommandRegistry::builtin());
    let tools = Arc::new(ToolRegistry::builtin(&root));

    let mut session = Session::builder(settings)
        .with_root(root)
        .with_service(service)
        .with_registry(registry)
        .with_tools(tools)
        .build()?;

    if let Err(e) = session.reload_context() {
        eprintln!("warning: could not load context: {}", e);
    }

    println!("sage - :help for commands, :q to quit");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim_end_matches('\n');

        let first_prompt = !session.is_title_generated() && !input.starts_with(':');
        let mut event = session.handle_input(input);

        loop {
            match event {
                Event::GenerationStarted(stream) => {
                    consume_stream(&mut session, stream).await;
                    if first_prompt {
                        session.generate_title(input).await;
                    }
                    // In agent mode the response may carry tool calls.
                    event = session.process_ai_response();
                }
                Event::MessagesUpdated => {
                    if let Some(last) = session.messages().last() {
                        println!("{}", last.content);
                    }
                    break;
                }
                Event::NewSessionStarted => {
                    println!("Started a new session.");
                    break;
                }
                Event::HistoryModeStarted => {
                    for info in session.history().list()? {
                        println!("{}  {}", info.filename, info.title);
                    }
                    break;
                }
                Event::VisualModeStarted
                | Event::GenerateModeStarted
                | Event::EditModeStarted
                | Event::BranchModeStarted => {
                    println!("(visual modes are available in the full UI)");
                    break;
                }
                Event::Quit => {
                    session.save_conversation()?;
                    return Ok(());
                }
                Event::NoOp => break,
            }
        }
    }

    session.save_conversation()?;
    Ok(())
}

/// Read the stream to closure, feeding fragments back into the session.
async fn consume_stream(session: &mut Session, mut stream: generation::GenerationStream) {
    while let Some(fragment) = stream.next_fragment().await {
        if generation::is_error_fragment(&fragment) {
            session.replace_last_message(Message::command_error(fragment));
            continue;
        }
        print!("{}", fragment);
        let _ = std::io::stdout().flush();
        session.append_to_last(&fragment);
    }
    println!();
    session.complete_generation();
}
