use clap::Parser;
use log_tail::{Config, SeekOrigin, SeekPolicy, tail_file};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "log-tail", about = "Follow a log file across rotation and truncation", version)]
struct Cli {
    /// File to follow.
    path: PathBuf,

    /// Identity check, fallback read and restart cooldown interval.
    #[arg(long, default_value_t = 10_000)]
    poll_interval_ms: u64,

    /// Replay the whole file.
    #[arg(long, conflicts_with_all = ["from_end", "backlog", "offset"])]
    from_start: bool,

    /// Only print lines written after startup.
    #[arg(long, conflicts_with_all = ["backlog", "offset"])]
    from_end: bool,

    /// Replay at most this many trailing bytes.
    #[arg(long, value_name = "BYTES", conflicts_with = "offset")]
    backlog: Option<u64>,

    /// Start at this byte offset; negative values count back from the end.
    #[arg(long, value_name = "BYTES", allow_hyphen_values = true)]
    offset: Option<i64>,

    /// Wait for the file to appear instead of failing.
    #[arg(long)]
    wait: bool,

    /// Print the current contents and exit.
    #[arg(long)]
    no_follow: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn seek_policy(&self) -> SeekPolicy {
        if self.from_start {
            SeekPolicy::FromStart
        } else if self.from_end {
            SeekPolicy::FromEnd
        } else if let Some(max_backlog) = self.backlog {
            SeekPolicy::AutoTail { max_backlog }
        } else if let Some(offset) = self.offset {
            let origin = if offset < 0 {
                SeekOrigin::End
            } else {
                SeekOrigin::Start
            };
            SeekPolicy::FromOffset { offset, origin }
        } else {
            SeekPolicy::default()
        }
    }

    fn config(&self) -> Config {
        Config::default()
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_seek(self.seek_policy())
            .with_wait_for_file(self.wait)
            .with_follow(!self.no_follow)
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut stream = match tail_file(&cli.path, cli.config()).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("Error setting up tail: {}", e);
            process::exit(2);
        }
    };

    let closer = stream.close_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            closer.close();
        }
    });

    while let Some(line) = stream.next().await {
        println!("{}", line);
    }

    if let Some(e) = stream.terminal_error().await {
        eprintln!("Error tailing {}: {}", cli.path.display(), e);
        process::exit(1);
    }
}
