//! Line-oriented front end for terminals without full-screen support.

use crate::app::{AppEvent, ChatApp};
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(app: &mut ChatApp) -> anyhow::Result<()> {
    println!(
        "\u{001b}[94mChat with Captain Ticker ({}, temperature {:.1}) : {}\u{001b}[0m",
        app.model(),
        app.temperature(),
        app.topic()
    );
    println!("\u{001b}[90mType /help for commands.\u{001b}[0m");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\u{001b}[93mYou:\u{001b}[0m ");
        io::stdout().flush()?;

        let Some(input) = lines.next_line().await? else {
            break;
        };

        let mut quit = false;
        for event in app.handle_input(&input).await {
            match event {
                AppEvent::Reply(message) => {
                    println!("\u{001b}[96mTicker:\u{001b}[0m {}", message.content);
                }
                AppEvent::Notice(text) => println!("\u{001b}[90m{}\u{001b}[0m", text),
                AppEvent::Failure(text) => eprintln!("\u{001b}[91mError:\u{001b}[0m {}", text),
                AppEvent::Reset { topic, messages } => {
                    println!("\u{001b}[94m── {} ──\u{001b}[0m", topic);
                    for m in messages {
                        println!("\u{001b}[90m{}:\u{001b}[0m {}", m.role, m.content);
                    }
                }
                AppEvent::Topics(_) | AppEvent::ModelChanged(_) => {}
                AppEvent::Quit => quit = true,
            }
        }
        if quit {
            break;
        }
    }
    Ok(())
}
