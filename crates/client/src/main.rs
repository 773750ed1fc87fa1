//! Terminal chat against an hrchat server.
//!
//! ```text
//! HRCHAT_URL=http://localhost:3000 HRCHAT_TOKEN=... hrchat
//! ```
//!
//! Commands: `/new`, `/sessions`, `/open <id>`, `/delete <id>`,
//! `/context <name>`, `/suggest`, `/quit`. Anything else is sent as a message.

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use hrchat_client::conversation::Outcome;
use hrchat_client::repl::{error_message, parse_command, Command};
use hrchat_client::{ClientError, HttpTransport, StreamConsumer};
use hrchat_core::context::ChatContext;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hrchat_client=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let base_url =
        std::env::var("HRCHAT_URL").unwrap_or_else(|_| "http://localhost:3000".into());
    let token = std::env::var("HRCHAT_TOKEN").context("HRCHAT_TOKEN must be set")?;
    let context = ChatContext::from_param(std::env::var("HRCHAT_CONTEXT").ok().as_deref());

    let transport = Arc::new(HttpTransport::new(base_url, token));
    let mut consumer = StreamConsumer::new(transport, context);

    println!("Contexto: {}. Digite /quit para sair.", context.label());
    for group in consumer.suggestions().await {
        println!("{}:", group.title);
        for action in group.actions {
            println!("  - {}", action.query);
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_command(line) {
            Command::Quit => break,
            Command::New => {
                consumer.new_chat();
                println!("(nova conversa)");
            }
            Command::Sessions => match consumer.refresh_sessions().await {
                Ok(sessions) => {
                    for session in sessions {
                        println!("{:>6}  [{}] {}", session.id, session.context, session.title);
                    }
                }
                Err(err) => report(&err),
            },
            Command::Open(id) => match consumer.open_session(id).await {
                Ok(()) => {
                    for entry in consumer.conversation().entries() {
                        println!("{}: {}", entry.role, entry.content);
                    }
                }
                Err(err) => report(&err),
            },
            Command::Delete(id) => match consumer.delete_session(id).await {
                Ok(()) => println!("(conversa removida)"),
                Err(err) => report(&err),
            },
            Command::Context(name) => match ChatContext::parse(name) {
                Some(context) => {
                    consumer.set_context(context);
                    println!("Contexto: {}", context.label());
                }
                None => println!("Contexto desconhecido: {name}"),
            },
            Command::Suggest => {
                for group in consumer.suggestions().await {
                    for action in group.actions {
                        println!("  - {}", action.query);
                    }
                }
            }
            Command::Invalid(message) => println!("{message}"),
            Command::Message(content) => chat(&mut consumer, content).await?,
        }
    }

    Ok(())
}

async fn chat(consumer: &mut StreamConsumer, content: &str) -> anyhow::Result<()> {
    if consumer.send(content).await.is_none() {
        println!("(aguarde a resposta anterior)");
        return Ok(());
    }

    let mut printed = 0;
    while let Some(outcome) = consumer.pump().await {
        let reply = last_entry(consumer);
        match outcome {
            Outcome::Applied => {
                print!("{}", &reply[printed..]);
                std::io::stdout().flush()?;
                printed = reply.len();
            }
            Outcome::Completed { .. } | Outcome::Failed(_) => {
                // The final text replaces whatever was streamed.
                if printed > 0 {
                    println!();
                }
                println!("{reply}");
                return Ok(());
            }
            Outcome::Stale => {}
        }
    }

    // Rejected before any stream was opened.
    println!("{}", last_entry(consumer));
    Ok(())
}

fn last_entry(consumer: &StreamConsumer) -> String {
    consumer
        .conversation()
        .entries()
        .last()
        .map(|e| e.content.clone())
        .unwrap_or_default()
}

fn report(err: &ClientError) {
    tracing::warn!(error = %err, "Command failed");
    println!("{}", error_message(err));
}
