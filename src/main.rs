//! CLI entry point for `mimewalk`.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser, Subcommand};

use mimewalk::config::{self, Config};
use mimewalk::export::AttachmentExporter;
use mimewalk::parser::mime::parse_message_file;
use mimewalk::walker::{Event, EventLog, MessageWalker, WalkerOptions};

#[derive(Parser)]
#[command(
    name = "mimewalk",
    version,
    about = "Walk the MIME structure of e-mail messages",
    long_about = "Walk the MIME structure of e-mail messages.\n\n\
        Prints the envelope and every part (with its IMAP-style address) of an \
        .eml file, expanding TNEF containers and UU-encoded text, or extracts \
        the attachments to a directory."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: $MIMEWALK_CONFIG or the user config dir)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the events produced by walking a message
    Parse {
        /// Message file (.eml or single-message mbox)
        file: PathBuf,
        /// Print events as JSON
        #[arg(long)]
        json: bool,
        /// Also walk nested messages, addressed below their parent part
        #[arg(long)]
        nested: bool,
        /// Charset for text parts that do not declare one
        #[arg(long, value_name = "LABEL")]
        charset: Option<String>,
    },
    /// Extract attachments, images and nested messages
    Extract {
        /// Message file (.eml or single-message mbox)
        file: PathBuf,
        /// Output directory (default: [export] default_output_dir, else ".")
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    };

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Parse {
            file,
            json,
            nested,
            charset,
        } => cmd_parse(&file, json, nested, charset, &config),
        Commands::Extract { file, output } => cmd_extract(&file, output, &config),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_path = config::log_file_path(config);
    let log_dir = config::cache_dir(config);
    let file_name = log_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "mimewalk.log".into());
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn walker_for(config: &Config, charset: Option<String>) -> anyhow::Result<MessageWalker> {
    let mut options = WalkerOptions::from(&config.parser);
    if let Some(charset) = charset {
        if encoding_rs::Encoding::for_label(charset.as_bytes()).is_none() {
            bail!("Unknown charset: {charset}");
        }
        options.default_charset = charset;
    }
    Ok(MessageWalker::new(options))
}

/// Walk a message and print its events.
fn cmd_parse(
    path: &Path,
    json: bool,
    nested: bool,
    charset: Option<String>,
    config: &Config,
) -> anyhow::Result<()> {
    let walker = walker_for(config, charset)?;
    let start = Instant::now();
    let message = parse_message_file(path)
        .with_context(|| format!("Cannot read message {}", path.display()))?;

    let mut log = EventLog::new();
    if nested {
        log = log.keep_nested();
    }
    walker.parse(&message, &mut log)?;
    let mut queue: VecDeque<_> = log.take_nested().into();
    let mut sections: Vec<(String, Vec<Event>)> = vec![(String::new(), log.into_events())];

    while let Some((id, part)) = queue.pop_front() {
        let mut log = EventLog::new().keep_nested();
        walker.parse_with_prefix(&part, &id, &mut log)?;
        queue.extend(log.take_nested());
        sections.push((id, log.into_events()));
    }

    tracing::info!(
        file = %path.display(),
        messages = sections.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Walked message"
    );

    if json {
        let value: Vec<_> = sections
            .iter()
            .map(|(id, events)| {
                let message = (!id.is_empty()).then(|| id.clone());
                serde_json::json!({
                    "message": message,
                    "events": events,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        for (id, events) in &sections {
            if !id.is_empty() {
                println!();
                println!("── Nested message [{id}] ──");
            }
            for event in events {
                if event.is_body() || matches!(event, Event::MessageEnd) {
                    println!("{event}");
                } else {
                    println!("  {event}");
                }
            }
        }
    }

    Ok(())
}

/// Extract all attachments of a message.
fn cmd_extract(path: &Path, output: Option<PathBuf>, config: &Config) -> anyhow::Result<()> {
    let output = output
        .or_else(|| config.export.default_output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let walker = walker_for(config, None)?;
    let message = parse_message_file(path)
        .with_context(|| format!("Cannot read message {}", path.display()))?;

    let mut exporter = AttachmentExporter::with_config(&output, &config.export);
    walker.parse(&message, &mut exporter)?;

    for written in exporter.written() {
        println!("{}", written.display());
    }
    for (id, error) in exporter.failures() {
        eprintln!("Part {id}: {error}");
    }
    if exporter.written().is_empty() && !exporter.failures().is_empty() {
        bail!("No attachment could be written to {}", output.display());
    }
    eprintln!(
        "{} file(s) written to {}",
        exporter.written().len(),
        output.display()
    );
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mimewalk", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
