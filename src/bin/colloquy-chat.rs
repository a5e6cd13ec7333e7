//! Interactive chat application for conversing with a completion model.
//!
//! This binary provides a streaming REPL interface for chatting with an
//! OpenAI-compatible completions API.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage with default settings
//! colloquy-chat
//!
//! # Specify a model
//! colloquy-chat --model gpt-4
//!
//! # Set a system prompt
//! colloquy-chat --system "You are a helpful coding assistant"
//!
//! # Talk to a self-hosted endpoint
//! colloquy-chat --base-url http://localhost:8080/v1/
//!
//! # Disable colors (useful for piping output)
//! colloquy-chat --no-color
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/clear` - Clear conversation history
//! - `/model <name>` - Change the model
//! - `/system [prompt]` - Set or clear system prompt
//! - `/tokens` - Show token count and estimated cost
//! - `/stats` - Show session statistics
//! - `/quit` - Exit the application
//!
//! Press Ctrl+C while a reply is streaming to cancel it; the partial reply
//! is kept with a truncation marker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use colloquy::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatHost, PlainTextRenderer, Renderer, help_text,
    parse_command,
};
use colloquy::{Model, OpenAi};

/// Main entry point for the colloquy-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("colloquy-chat [OPTIONS]");
    let config = ChatConfig::from(args);
    let use_color = config.use_color;

    let client = OpenAi::with_options(None, config.base_url.clone(), None)?;
    let mut host = ChatHost::new(client, config);
    let mut renderer = PlainTextRenderer::with_color(use_color);
    let mut rl = DefaultEditor::new()?;

    // Flag for interrupt handling during streaming
    let interrupted = Arc::new(AtomicBool::new(false));

    // Set up Ctrl+C handler
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    println!("Colloquy Chat (model: {})", host.model());
    println!("Type /help for commands, /quit to exit\n");

    loop {
        // Reset interrupt flag before each input
        interrupted.store(false, Ordering::Relaxed);

        let readline = rl.readline("You: ");

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
                        ChatCommand::Clear => {
                            host.clear();
                            renderer.print_info("Conversation cleared.");
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::Model(model_name) => {
                            host.set_model(Model::from(model_name.as_str()));
                            renderer.print_info(&format!("Model changed to: {}", model_name));
                        }
                        ChatCommand::System(prompt) => {
                            host.set_system_prompt(prompt.clone());
                            match prompt {
                                Some(p) => {
                                    renderer.print_info(&format!("System prompt set to: {}", p))
                                }
                                None => renderer.print_info("System prompt cleared."),
                            }
                        }
                        ChatCommand::MaxTokens(value) => {
                            host.set_max_tokens(Some(value));
                            renderer.print_info(&format!("max_tokens set to {value}"));
                        }
                        ChatCommand::ClearMaxTokens => {
                            host.set_max_tokens(None);
                            renderer.print_info("max_tokens reset to service default");
                        }
                        ChatCommand::Temperature(value) => {
                            host.set_temperature(Some(value));
                            renderer.print_info(&format!("temperature set to {:.2}", value));
                        }
                        ChatCommand::ClearTemperature => {
                            host.set_temperature(None);
                            renderer.print_info("temperature reset to service default");
                        }
                        ChatCommand::Tokens => {
                            print_token_info(&host);
                        }
                        ChatCommand::Stats => {
                            print_stats(&host);
                        }
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                // Regular message - send to API
                println!("Assistant:");
                // The host reports classified failures through the
                // renderer; nothing further to do here.
                let _ = host
                    .send_streaming(line, &mut renderer, interrupted.clone())
                    .await;
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
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

fn print_token_info(host: &ChatHost) {
    let estimate = host.token_info();
    println!("    Estimated tokens: {}", estimate.count);
    match estimate.cost {
        Some(cost) => println!("    Estimated cost: ${:.5}", cost),
        None => println!(
            "    Estimated cost: unknown (no pricing for {})",
            host.model()
        ),
    }
}

fn print_stats(host: &ChatHost) {
    let stats = host.stats();
    println!("    Session Statistics:");
    println!("      Model: {}", stats.model);
    println!("      Messages: {}", stats.message_count);
    println!("      Max tokens: {}", describe_u32(stats.max_tokens));
    println!("      Temperature: {}", describe_float(stats.temperature));
    if let Some(prompt) = stats.system_prompt.as_deref() {
        println!("      System prompt: {}", prompt);
    } else {
        println!("      System prompt: (none)");
    }
    println!("      Estimated tokens: {}", stats.estimated_tokens);
    match stats.estimated_cost {
        Some(cost) => println!("      Estimated cost: ${:.5}", cost),
        None => println!("      Estimated cost: (unknown pricing)"),
    }
    println!(
        "      Paused: {}",
        if host.is_paused() { "yes" } else { "no" }
    );
}

fn describe_float(value: Option<f32>) -> String {
    value
        .map(|v| format!("{v:.2}"))
        .unwrap_or_else(|| "default".to_string())
}

fn describe_u32(value: Option<u32>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "default".to_string())
}
