use clap::{Parser, Subcommand};
use pppos::config;
use pppos::control::Engine;
use pppos::link::StreamLink;
use pppos::session::{Session, SessionEvent};
use pppos::telemetry::{init_logging, LinkStats};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "pppos")]
#[command(about = "PPP over serial links: LCP, PAP and IPCP over HDLC-like framing")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Bring up a PPP link over a TCP byte stream
    Run {
        /// Path to config.toml
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,

        /// Terminal server or serial bridge to connect to (host:port)
        #[arg(long)]
        connect: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate config.toml
    Validate {
        /// Path to config.toml
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// Print the effective configuration with all defaults filled in
    Show {
        /// Path to config.toml
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Config { action } => {
            // Initialize logging (RUST_LOG env var takes priority)
            init_logging(None);
            match action {
                ConfigAction::Validate {
                    config: config_path,
                } => cmd_config_validate(&config_path),
                ConfigAction::Show {
                    config: config_path,
                } => cmd_config_show(&config_path),
            }
        }
        Commands::Run {
            config: config_path,
            connect,
        } => cmd_run(&config_path, &connect),
    };

    if let Err(e) = result {
        eprintln!("[ERROR] {}", e);
        std::process::exit(1);
    }
}

fn cmd_run(config_path: &Path, connect: &str) -> Result<(), String> {
    use tokio::net::TcpStream;
    use tokio::runtime::Runtime;
    use tracing::warn;

    let cfg = config::load(config_path).map_err(|e| format!("Failed to parse config: {}", e))?;
    init_logging(Some(&cfg.log));

    let validation = config::validate(&cfg);
    for warning in &validation.warnings {
        warn!("{}", warning);
    }
    if validation.has_errors() {
        validation.print_diagnostics();
        return Err("Validation failed".to_string());
    }

    let rt = Runtime::new().map_err(|e| format!("Failed to create runtime: {}", e))?;

    rt.block_on(async move {
        info!("Connecting to {}...", connect);
        let stream = TcpStream::connect(connect)
            .await
            .map_err(|e| format!("Failed to connect to {}: {}", connect, e))?;

        let stats = Arc::new(LinkStats::new());
        let engine = Engine::new(&cfg, stats);
        let mut session = Session::new(engine, StreamLink::new(stream));
        let mut events = session.subscribe();

        // Ctrl+C terminates the link gracefully
        let handle = session.handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
                let _ = handle.close();
            }
        });

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    SessionEvent::NetworkUp { local, peer } => {
                        info!("IPv4 link up: local {} peer {}", local, peer);
                    }
                    SessionEvent::NetworkDown => info!("IPv4 link down"),
                    SessionEvent::Datagram(datagram) => {
                        tracing::debug!(len = datagram.len(), "Datagram received");
                    }
                }
            }
        });

        let report = session
            .run()
            .await
            .map_err(|e| format!("Session failed: {}", e))?;

        let stats = report.stats;
        info!(
            end = ?report.end,
            rx_frames = stats.rx_frames,
            tx_frames = stats.tx_frames,
            fcs_errors = stats.fcs_errors,
            malformed = stats.malformed,
            "Session finished"
        );
        Ok::<(), String>(())
    })
}

fn cmd_config_validate(config_path: &Path) -> Result<(), String> {
    println!("[INFO] Validating {}...", config_path.display());

    let cfg = config::load(config_path).map_err(|e| format!("Failed to parse config: {}", e))?;

    let validation = config::validate(&cfg);
    validation.print_diagnostics();

    if validation.has_errors() {
        Err("Validation failed".to_string())
    } else {
        println!("[INFO] Configuration is valid");
        Ok(())
    }
}

fn cmd_config_show(config_path: &Path) -> Result<(), String> {
    let cfg = config::load(config_path).map_err(|e| format!("Failed to parse config: {}", e))?;
    let rendered = config::render(&cfg).map_err(|e| format!("Failed to render config: {}", e))?;
    print!("{}", rendered);
    Ok(())
}
