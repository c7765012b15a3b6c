use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use super::connect;
use crate::ai::{SAMPLE_QUESTIONS, answer};
use crate::core::AppConfig;
use crate::search::{document_count, embedder_from_config};

pub async fn run(config: &AppConfig) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let db = connect(config).await?;
    let embedder = embedder_from_config(config)?;

    println!("{} emails indexed. Try asking:", document_count(&db).await?);
    for q in SAMPLE_QUESTIONS.iter().take(3) {
        println!("  {}", q);
    }

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;
                // A failed question shouldn't end the session
                match answer(&db, &embedder, config, line).await {
                    Ok(result) => {
                        println!("{}\n", result.answer);
                        for source in result.sources {
                            println!(
                                "  - {} | {} | {}",
                                source.sender, source.subject, source.received
                            );
                        }
                    }
                    Err(err) => println!("Error: {}", err),
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
