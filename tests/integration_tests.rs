use log_tail::{Config, Error, SeekPolicy, TailEvent, TailStream, tail_file, tail_file_inspected};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;

const TIMEOUT: Duration = Duration::from_secs(10);

fn fast_config() -> Config {
    Config::default()
        .with_poll_interval(Duration::from_millis(100))
        .with_seek(SeekPolicy::FromStart)
}

fn scratch_file(dir: &tempfile::TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("app.log");
    std::fs::write(&path, content).unwrap();
    path
}

fn append(path: &Path, content: &str) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
}

/// Output observed from a tail, lines and inspection events interleaved
#[derive(Debug, PartialEq)]
enum Seen {
    Line(String),
    Event(TailEvent),
}

/// Next line or event, whichever comes first
async fn next_seen(stream: &mut TailStream, events: &mut mpsc::Receiver<TailEvent>) -> Seen {
    let seen = tokio::time::timeout(TIMEOUT, async {
        tokio::select! {
            biased;
            event = events.recv() => event.map(Seen::Event),
            line = stream.next() => line.map(Seen::Line),
        }
    })
    .await
    .expect("timed out waiting for tail output");
    seen.expect("tail ended unexpectedly")
}

/// Collects lines until the end of current data is reported
async fn lines_until_eof(
    stream: &mut TailStream,
    events: &mut mpsc::Receiver<TailEvent>,
) -> Vec<String> {
    let mut lines = Vec::new();
    loop {
        match next_seen(stream, events).await {
            Seen::Line(line) => lines.push(line),
            Seen::Event(TailEvent::EndOfCurrentData) => return lines,
            Seen::Event(TailEvent::TailRestarted) => {}
        }
    }
}

/// Collects lines until a restart happened, at least `expected` lines were
/// seen, and the reopened file has been read to its current end
async fn lines_across_restart(
    stream: &mut TailStream,
    events: &mut mpsc::Receiver<TailEvent>,
    expected: usize,
) -> Vec<String> {
    let mut restarted = false;
    let mut lines = Vec::new();
    loop {
        match next_seen(stream, events).await {
            Seen::Line(line) => lines.push(line),
            Seen::Event(TailEvent::TailRestarted) => restarted = true,
            Seen::Event(TailEvent::EndOfCurrentData) if restarted && lines.len() >= expected => {
                return lines;
            }
            Seen::Event(TailEvent::EndOfCurrentData) => {}
        }
    }
}

/// Reads what is left on the stream once it has been closed
async fn remaining_lines(
    stream: &mut TailStream,
    events: &mut mpsc::Receiver<TailEvent>,
) -> Vec<String> {
    let drain = async {
        let mut lines = Vec::new();
        loop {
            tokio::select! {
                line = stream.next() => match line {
                    Some(line) => lines.push(line),
                    None => return lines,
                },
                Some(_) = events.recv() => {}
            }
        }
    };
    tokio::time::timeout(TIMEOUT, drain)
        .await
        .expect("tail did not stop after close")
}

/// Replaces the file at `path` the way rotating loggers do
fn rotate(path: &Path, content: &str) {
    let staged = path.with_extension("new");
    std::fs::write(&staged, content).unwrap();
    std::fs::remove_file(path).unwrap();
    std::fs::rename(&staged, path).unwrap();
}

#[tokio::test]
async fn test_reads_existing_lines_then_reports_eof() {
    let dir = tempfile::tempdir().unwrap();
    let path = scratch_file(&dir, "a\nb\nc\n");
    let (mut stream, mut events) = tail_file_inspected(&path, fast_config()).await.unwrap();

    assert_eq!(next_seen(&mut stream, &mut events).await, Seen::Line("a".into()));
    assert_eq!(next_seen(&mut stream, &mut events).await, Seen::Line("b".into()));
    assert_eq!(next_seen(&mut stream, &mut events).await, Seen::Line("c".into()));
    assert_eq!(
        next_seen(&mut stream, &mut events).await,
        Seen::Event(TailEvent::EndOfCurrentData)
    );

    stream.close();
}

#[tokio::test]
async fn test_eof_event_waits_for_last_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = scratch_file(&dir, "a\nb\nc\n");
    let (mut stream, mut events) = tail_file_inspected(&path, fast_config()).await.unwrap();

    for expected in ["a", "b"] {
        let line = tokio::time::timeout(TIMEOUT, stream.next()).await.unwrap();
        assert_eq!(line.as_deref(), Some(expected));
    }

    // "c" is still unread, so the end of data must not be reported yet
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(events.try_recv().is_err());

    let line = tokio::time::timeout(TIMEOUT, stream.next()).await.unwrap();
    assert_eq!(line.as_deref(), Some("c"));
    let event = tokio::time::timeout(TIMEOUT, events.recv()).await.unwrap();
    assert_eq!(event, Some(TailEvent::EndOfCurrentData));

    stream.close();
}

#[tokio::test]
async fn test_invalid_config_rejected_up_front() {
    let dir = tempfile::tempdir().unwrap();
    let path = scratch_file(&dir, "a\n");
    let config = fast_config().with_poll_interval(Duration::ZERO);

    let result = TailStream::new(&path, config);
    assert!(matches!(result, Err(Error::InvalidConfig { .. })));
}

#[tokio::test]
async fn test_close_flushes_unterminated_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = scratch_file(&dir, "a\nb");
    let (mut stream, mut events) = tail_file_inspected(&path, fast_config()).await.unwrap();

    assert_eq!(lines_until_eof(&mut stream, &mut events).await, vec!["a"]);

    stream.close();
    assert_eq!(remaining_lines(&mut stream, &mut events).await, vec!["b"]);
    assert!(stream.terminal_error().await.is_none());
}

#[tokio::test]
async fn test_appended_lines_split_mid_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = scratch_file(&dir, "");
    let (mut stream, mut events) = tail_file_inspected(&path, fast_config()).await.unwrap();
    assert!(lines_until_eof(&mut stream, &mut events).await.is_empty());

    let writes = ["first li", "ne\nsecond line\nthi", "rd", " line\n"];
    let mut lines = Vec::new();
    for write in writes {
        append(&path, write);
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
    while lines.len() < 3 {
        if let Seen::Line(line) = next_seen(&mut stream, &mut events).await {
            lines.push(line);
        }
    }

    assert_eq!(lines, vec!["first line", "second line", "third line"]);
    assert_eq!(lines.concat(), writes.concat().replace('\n', ""));

    stream.close();
}

#[tokio::test]
async fn test_rotation_emits_only_new_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = scratch_file(&dir, "this is 1 line\nthis is 2 line\nthis is the 3 line\n");
    let config = fast_config().with_wait_for_file(true);
    let (mut stream, mut events) = tail_file_inspected(&path, config).await.unwrap();

    assert_eq!(lines_until_eof(&mut stream, &mut events).await.len(), 3);

    rotate(&path, "this is 11 line\nthis is 12 line\nthis is the 13 line\n");

    let lines = lines_across_restart(&mut stream, &mut events, 3).await;
    assert_eq!(
        lines,
        vec!["this is 11 line", "this is 12 line", "this is the 13 line"]
    );

    stream.close();
}

#[tokio::test]
async fn test_rotation_flushes_old_fragment_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = scratch_file(&dir, "complete\npartial");
    let config = fast_config().with_wait_for_file(true);
    let (mut stream, mut events) = tail_file_inspected(&path, config).await.unwrap();

    assert_eq!(lines_until_eof(&mut stream, &mut events).await, vec!["complete"]);

    rotate(&path, "fresh start with a longer first line\n");

    let lines = lines_across_restart(&mut stream, &mut events, 2).await;
    assert_eq!(lines, vec!["partial", "fresh start with a longer first line"]);

    stream.close();
}

#[tokio::test]
async fn test_truncation_emits_only_new_content() {
    let dir = tempfile::tempdir().unwrap();
    let mut content = String::from("\n1\n2\n3\n4\n");
    for i in 5..10 {
        content.push_str(&format!("{}{}\n", i, "x".repeat(79)));
    }
    content.push_str("10a\n10b\n10c\n11c\n");
    let path = scratch_file(&dir, &content);
    let (mut stream, mut events) = tail_file_inspected(&path, fast_config()).await.unwrap();

    assert_eq!(lines_until_eof(&mut stream, &mut events).await.len(), 14);

    std::fs::write(&path, "").unwrap();
    append(&path, "this is 11 line\nthis is 12 line\nthis is the 13 line\n");

    let lines = lines_across_restart(&mut stream, &mut events, 3).await;
    assert_eq!(
        lines,
        vec!["this is 11 line", "this is 12 line", "this is the 13 line"]
    );

    stream.close();
}

#[tokio::test]
async fn test_wait_for_file_existence() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("late.log");
    let config = fast_config().with_wait_for_file(true);
    let mut stream = tail_file(&path, config).await.unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;
    std::fs::write(&path, "finally here\n").unwrap();

    let line = tokio::time::timeout(TIMEOUT, stream.next()).await.unwrap();
    assert_eq!(line.as_deref(), Some("finally here"));

    stream.close();
}

#[tokio::test]
async fn test_missing_file_is_terminal_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.log");
    let mut stream = tail_file(&path, fast_config()).await.unwrap();

    let error = tokio::time::timeout(TIMEOUT, stream.terminal_error())
        .await
        .unwrap();
    match error {
        Some(Error::FileNotFound { path: reported }) => assert_eq!(reported, path),
        other => panic!("Expected FileNotFound, got {:?}", other),
    }
    assert_eq!(stream.next().await, None);
}

#[tokio::test]
async fn test_no_follow_reads_current_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = scratch_file(&dir, "one\ntwo\nthree");
    let stream = tail_file(&path, fast_config().with_follow(false)).await.unwrap();

    let lines: Vec<String> = tokio::time::timeout(TIMEOUT, stream.collect())
        .await
        .unwrap();
    assert_eq!(lines, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn test_stalled_consumer_released_by_close() {
    let dir = tempfile::tempdir().unwrap();
    let content: String = (0..500).map(|i| format!("Line number {}\n", i)).collect();
    let path = scratch_file(&dir, &content);
    let stream = tail_file(&path, fast_config()).await.unwrap();

    // Nobody reads; the tail is blocked handing over a line
    tokio::time::sleep(Duration::from_millis(200)).await;
    let closer = stream.close_handle();
    tokio::spawn(async move { closer.close() }).await.unwrap();

    tokio::time::timeout(TIMEOUT, stream.join())
        .await
        .expect("tail should stop even though nobody reads");
}

#[tokio::test]
async fn test_dropping_inspector_keeps_tailing() {
    let dir = tempfile::tempdir().unwrap();
    let path = scratch_file(&dir, "kept\n");
    let (mut stream, events) = tail_file_inspected(&path, fast_config()).await.unwrap();
    drop(events);

    let line = tokio::time::timeout(TIMEOUT, stream.next()).await.unwrap();
    assert_eq!(line.as_deref(), Some("kept"));

    append(&path, "still going\n");
    let line = tokio::time::timeout(TIMEOUT, stream.next()).await.unwrap();
    assert_eq!(line.as_deref(), Some("still going"));

    stream.close();
}
