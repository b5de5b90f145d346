//! Interactive command-line chat with the engine.

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::engine::AuraEngine;

const GOODBYE: &str = "Aura: Goodbye!";

fn is_exit(line: &str) -> bool {
    matches!(line.trim().to_lowercase().as_str(), "exit" | "quit")
}

/// Read questions line by line from `input` and write answers to `output`
/// until `exit`, `quit` or end of input.
pub async fn run_repl<R, W>(engine: &AuraEngine, input: R, mut output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output
        .write_all(b"Engine ready. Type 'exit' or 'quit' to end the session.\n")
        .await?;
    output.write_all(format!("{}\n", "-".repeat(20)).as_bytes()).await?;

    let mut lines = input.lines();
    loop {
        output.write_all(b"You: ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            // Ctrl+D
            output.write_all(format!("\n{GOODBYE}\n").as_bytes()).await?;
            break;
        };

        if is_exit(&line) {
            output.write_all(format!("{GOODBYE}\n").as_bytes()).await?;
            break;
        }

        let response = engine.get_response(&line).await;
        output.write_all(format!("Aura: {response}\n").as_bytes()).await?;
    }

    output.flush().await?;
    Ok(())
}

/// Chat on stdin/stdout. Ctrl+C ends the session cleanly.
pub async fn run_chat(engine: AuraEngine) -> Result<()> {
    println!("Aura chat session (model answers from the knowledge base)");
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    tokio::select! {
        result = run_repl(&engine, stdin, stdout) => result,
        _ = tokio::signal::ctrl_c() => {
            println!("\n{GOODBYE}");
            Ok(())
        }
    }
}
