use log_tail::{Config, SeekPolicy, TailEvent, tail_file, tail_file_inspected};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tokio_stream::StreamExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Log Tail Comprehensive Example ===\n");

    let dir = tempfile::tempdir()?;

    // Example 1: Read what is there and stop
    println!("1. No-follow mode - reading the current contents once:");
    no_follow_usage(&dir.path().join("snapshot.log")).await?;

    println!("\n{}\n", "=".repeat(50));

    // Example 2: Truncation while tailing
    println!("2. Truncation - the file is emptied and written again:");
    truncation_usage(&dir.path().join("truncated.log")).await?;

    println!("\n{}\n", "=".repeat(50));

    // Example 3: Terminal errors
    println!("3. Error channel - tailing a file that does not exist:");
    error_usage(&dir.path().join("missing.log")).await?;

    Ok(())
}

async fn no_follow_usage(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::write(path, "first\nsecond\nunterminated")?;

    let config = Config::default()
        .with_seek(SeekPolicy::FromStart)
        .with_follow(false);
    let lines: Vec<String> = tail_file(path, config).await?.collect().await;

    for (i, line) in lines.iter().enumerate() {
        println!("  [{}]: {}", i + 1, line);
    }
    Ok(())
}

async fn truncation_usage(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::write(path, "before truncation 1\nbefore truncation 2\n")?;

    let config = Config::default()
        .with_poll_interval(Duration::from_millis(200))
        .with_seek(SeekPolicy::FromStart);
    let (mut stream, mut events) = tail_file_inspected(path, config).await?;

    let writer_path = path.to_path_buf();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(400)).await;
        if let Ok(mut file) = std::fs::File::create(&writer_path) {
            let _ = file.write_all(b"after truncation\n");
        }
    });

    let deadline = tokio::time::sleep(Duration::from_secs(2));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            Some(line) = stream.next() => println!("  line: {}", line),
            Some(event) = events.recv() => match event {
                TailEvent::TailRestarted => println!("  -- truncated, reopened"),
                TailEvent::EndOfCurrentData => println!("  -- caught up"),
            },
            _ = &mut deadline => break,
        }
    }

    stream.close();
    Ok(())
}

async fn error_usage(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = tail_file(path, Config::default()).await?;

    match tokio::time::timeout(Duration::from_secs(1), stream.terminal_error()).await {
        Ok(Some(e)) => println!("  Tail stopped: {}", e),
        Ok(None) => println!("  Tail stopped without an error"),
        Err(_) => println!("  Still running"),
    }
    Ok(())
}
