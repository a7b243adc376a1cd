use anyhow::Result;
use clap::Parser;
use medscribe::{audio, Config, Language, Session, SessionSnapshot, SessionStatus};
use std::time::Duration;
use tracing::warn;

#[derive(Parser)]
#[command(name = "medscribe", about = "Real-time speech transcription client")]
struct Cli {
    /// Configuration file (without extension, config-crate style)
    #[arg(long, default_value = "config/medscribe")]
    config: String,

    /// Recording language
    #[arg(long, value_enum, default_value_t = Language::En)]
    language: Language,

    /// List available input devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Print saved session history and exit
    #[arg(long)]
    show_history: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if cli.list_devices {
        for name in audio::list_input_devices() {
            println!("{}", name);
        }
        return Ok(());
    }

    let config = Config::load(&cli.config)?;
    let session = Session::new(&config)?;

    if cli.show_history {
        for record in session.history_records().await {
            println!(
                "{}  [{}]  {}",
                record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                record.language,
                preview(&record.text, 60)
            );
        }
        return Ok(());
    }

    let mut snapshots = session.snapshots();

    session.start(cli.language).await?;

    println!("Recording ({}). Press Ctrl-C to stop.", cli.language);

    // Partial text is overwritten in place; committed text gets its own line.
    let mut render = tokio::spawn(async move {
        let mut last_committed = String::new();
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();

            if snapshot.committed_text != last_committed {
                println!("\r{}", snapshot.committed_text);
                last_committed = snapshot.committed_text.clone();
            } else if !snapshot.live_text.is_empty() {
                print!("\r{}", snapshot.live_text);
                let _ = std::io::Write::flush(&mut std::io::stdout());
            }

            if snapshot.status.is_terminal() {
                return snapshot;
            }
        }
        SessionSnapshot::default()
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            println!();
            session.stop().await?;
        }
        result = &mut render => {
            // Session ended on its own (server finalized or failed).
            let snapshot = result.unwrap_or_default();
            print_summary(&snapshot);
            return Ok(());
        }
    }

    let snapshot = match tokio::time::timeout(Duration::from_secs(30), render).await {
        Ok(Ok(snapshot)) => snapshot,
        _ => {
            warn!("Timed out waiting for final results");
            session.snapshots().borrow().clone()
        }
    };

    print_summary(&snapshot);

    Ok(())
}

fn print_summary(snapshot: &SessionSnapshot) {
    println!();

    match &snapshot.status {
        SessionStatus::Completed => {
            println!("Transcript: {}", snapshot.committed_text);
            if snapshot.entities.is_empty() {
                println!("No terms were extracted.");
            } else {
                println!("Extracted terms:");
                for (category, terms) in &snapshot.entities {
                    println!("  {}: {}", category.replace('_', " "), terms.join(", "));
                }
            }
        }
        SessionStatus::Failed(_) => {
            if !snapshot.committed_text.is_empty() {
                println!("Transcript (incomplete): {}", snapshot.committed_text);
            }
        }
        other => {
            println!("Session ended in state {:?}", other);
        }
    }

    if let Some(error) = &snapshot.error {
        eprintln!("Error: {}", error);
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{}...", truncated)
}
