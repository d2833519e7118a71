use analyst::api::{AnalystClient, RawFile};
use analyst::chat::{ChatMessage, ChatRole};
use analyst::debug_log::{DebugPanelContent, PLACEHOLDER_TEXT};
use analyst::render::{self, Segment};
use analyst::session::{Effect, Intent, Session};
use analyst::upload::UploadStatus;
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "analyst")]
#[command(about = "Analyst CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: ANALYST_CONFIG_PATH or ~/.analyst/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Check that the analysis backend is reachable.
    Health {
        /// Config file path (default: ANALYST_CONFIG_PATH or ~/.analyst/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Upload statements and chat about them (interactive). Type /help inside for commands.
    Session {
        /// Config file path (default: ANALYST_CONFIG_PATH or ~/.analyst/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Password for protected PDFs, sent with every upload.
        #[arg(long, value_name = "PASSWORD")]
        password: Option<String>,

        /// Statement files (.csv / .pdf) to upload before the prompt opens.
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("analyst {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Health { config }) => {
            if let Err(e) = run_health(config).await {
                log::error!("health check failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Session {
            config,
            password,
            files,
        }) => {
            if let Err(e) = run_session(config, password, files).await {
                log::error!("session failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(analyst::config::default_config_path);
    let dir = analyst::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_health(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let (config, _) = analyst::config::load_config(config_path)?;
    let client = AnalystClient::from_config(&config).context("building http client")?;
    let status = client
        .health()
        .await
        .with_context(|| format!("GET {}/health", client.base_url()))?;
    println!("{}: {}", client.base_url(), status.status);
    Ok(())
}

const HELP: &str = "commands:
  /upload <file>...   upload .csv/.pdf statements (replaces the current set)
  /password [value]   set or clear the PDF password sent with uploads
  /files              list uploaded files and stats
  /remove <n>         remove file n locally (server data unchanged until re-upload)
  /quick [n]          list quick actions, or run quick action n
  /copy               print the last AI reply as plain text
  /debug              show/hide the diagnostic log of the last reply
  /exit               quit
anything else is sent to the analyst.";

async fn run_session(
    config_path: Option<PathBuf>,
    mut password: Option<String>,
    initial_files: Vec<PathBuf>,
) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let (config, _) = analyst::config::load_config(config_path)?;
    let client = AnalystClient::from_config(&config).context("building http client")?;
    log::info!("using backend {}", client.base_url());
    let mut session = Session::new(client, config.chat.quick_actions.clone());
    let mut printer = Printer::default();

    if !initial_files.is_empty() {
        upload_paths(&mut session, &initial_files, password.clone()).await;
        printer.flush(&mut session);
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let (cmd, rest) = input.split_once(' ').unwrap_or((input, ""));
        let rest = rest.trim();
        match cmd.to_ascii_lowercase().as_str() {
            "/exit" | "/quit" => break,
            "/help" => println!("{}", HELP),
            "/upload" => {
                let paths: Vec<PathBuf> = rest.split_whitespace().map(PathBuf::from).collect();
                upload_paths(&mut session, &paths, password.clone()).await;
            }
            "/password" => {
                password = Some(rest.to_string()).filter(|p| !p.is_empty());
                println!(
                    "{}",
                    if password.is_some() { "password set" } else { "password cleared" }
                );
            }
            "/files" => print_files(&session),
            "/remove" => match rest.parse::<usize>() {
                Ok(n) if n >= 1 => {
                    session.handle(Intent::RemoveFile(n - 1)).await;
                }
                _ => println!("usage: /remove <n>"),
            },
            "/quick" => {
                if rest.is_empty() {
                    for (i, qa) in session.state().quick_actions().iter().enumerate() {
                        println!("  {}. {} — {}", i + 1, qa.label, qa.query);
                    }
                } else {
                    match rest.parse::<usize>() {
                        Ok(n) if n >= 1 => {
                            if !session.state().can_chat() {
                                println!("upload statements first");
                            }
                            session.handle(Intent::QuickAction(n - 1)).await;
                        }
                        _ => println!("usage: /quick [n]"),
                    }
                }
            }
            "/copy" => {
                let last_ai = session
                    .state()
                    .chat
                    .messages()
                    .iter()
                    .rposition(|m| m.role == ChatRole::Ai);
                match last_ai {
                    Some(i) => {
                        if let Some(Effect::CopyToClipboard(text)) =
                            session.handle(Intent::Copy(i)).await
                        {
                            println!("{}", text);
                        }
                    }
                    None => println!("nothing to copy"),
                }
            }
            "/debug" => {
                session.handle(Intent::ToggleDebug).await;
                if !session.state().debug.is_visible() {
                    println!("debug log hidden");
                }
            }
            _ if cmd.starts_with('/') => println!("unknown command {}; try /help", cmd),
            _ => {
                if !session.state().can_chat() {
                    println!("upload statements first (/upload <file>...)");
                    continue;
                }
                session.handle(Intent::Send(input.to_string())).await;
            }
        }
        printer.flush(&mut session);
    }

    Ok(())
}

/// Read files from disk and hand them to the session as one upload.
async fn upload_paths(session: &mut Session<AnalystClient>, paths: &[PathBuf], password: Option<String>) {
    if paths.is_empty() {
        println!("usage: /upload <file>...");
        return;
    }
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        match tokio::fs::read(path).await {
            Ok(bytes) => files.push(RawFile::new(name, bytes)),
            Err(e) => {
                eprintln!("cannot read {}: {}", path.display(), e);
                return;
            }
        }
    }
    println!("Uploading...");
    session.handle(Intent::Upload { files, password }).await;
}

fn print_files(session: &Session<AnalystClient>) {
    let upload = &session.state().upload;
    if upload.files().is_empty() {
        println!("no files uploaded");
        return;
    }
    for (i, f) in upload.files().iter().enumerate() {
        println!("  {}. {} {} ({})", i + 1, f.kind.icon(), f.name, f.share_label());
    }
    if let Some(stats) = upload.stats() {
        let stale = match stats.trust {
            analyst::files::StatsTrust::Authoritative => "",
            analyst::files::StatsTrust::Stale => " (as of last upload)",
        };
        println!(
            "  {} transactions, {} files{}",
            stats.total_rows, stats.file_count, stale
        );
    }
}

/// Prints what changed in the session since the last flush.
#[derive(Default)]
struct Printer {
    printed_messages: usize,
    last_status: Option<UploadStatus>,
}

impl Printer {
    fn flush(&mut self, session: &mut Session<AnalystClient>) {
        let status = session.state().upload.status().clone();
        if self.last_status.as_ref() != Some(&status) && status != UploadStatus::InProgress {
            let text = status.text();
            if !text.is_empty() {
                println!("{}", text);
            }
            self.last_status = Some(status);
        }

        let messages = session.state().chat.messages();
        for m in messages.iter().skip(self.printed_messages) {
            if !m.is_pending && m.role != ChatRole::User {
                print_message(m);
            }
        }
        self.printed_messages = messages.len();

        let state = session.state_mut();
        if state.debug.take_scroll_request() && state.debug.is_visible() {
            match state.debug.content() {
                DebugPanelContent::Placeholder => println!("  {}", PLACEHOLDER_TEXT),
                DebugPanelContent::Entries(entries) => {
                    for e in entries {
                        println!("  {}", e.header);
                        println!("    {}", e.body);
                        if let Some(d) = &e.details {
                            println!("    {}", d);
                        }
                    }
                }
            }
        }
        state.chat.take_focus_request();
    }
}

fn print_message(m: &ChatMessage) {
    let prefix = m.role.as_str();
    let body: String = render::segments(&m.text)
        .into_iter()
        .map(|s| match s {
            Segment::Text(t) => t,
            Segment::Image { alt, url } => format!("🖼 {} <{}>", alt, url),
        })
        .collect();
    match &m.timestamp {
        Some(ts) => println!("< [{}] {}: {}", ts, prefix, body.trim()),
        None => println!("< {} {}", prefix, body.trim()),
    }
}
