use log_tail::{Config, SeekPolicy, TailEvent, tail_file_inspected};
use std::io::Write;
use std::time::Duration;
use tokio_stream::StreamExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("demo.log");
    std::fs::write(&path, "2023-01-01 10:00:00 INFO Starting application\n")?;

    let config = Config::default()
        .with_poll_interval(Duration::from_millis(200))
        .with_seek(SeekPolicy::FromStart)
        .with_wait_for_file(true);
    let (mut stream, mut events) = tail_file_inspected(&path, config).await?;

    // Writer that appends, then rotates the file away
    let writer_path = path.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        if let Ok(mut file) = std::fs::OpenOptions::new().append(true).open(&writer_path) {
            let _ = file.write_all(b"2023-01-01 10:00:01 INFO Loading configuration\n");
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
        let _ = std::fs::remove_file(&writer_path);
        let _ = std::fs::write(&writer_path, "2023-01-01 10:00:02 INFO Rotated log\n");
    });

    let mut restarts = 0;
    let deadline = tokio::time::sleep(Duration::from_secs(3));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            Some(line) = stream.next() => println!("line: {}", line),
            Some(event) = events.recv() => {
                if event == TailEvent::TailRestarted {
                    restarts += 1;
                    println!("-- file rotated, reopened ({} so far)", restarts);
                }
            }
            _ = &mut deadline => break,
        }
    }

    stream.close();
    Ok(())
}
