//! hiho - browse and drive tmux sessions from a three-panel terminal UI
//!
//! # Quick Start
//!
//! ```text
//! hiho                   # Start with ~/.config/hiho/config.toml
//! hiho -c my.toml        # Use another config file
//! hiho --no-mouse        # Leave mouse handling to the terminal
//! ```
//!
//! # Commands
//!
//! | Command | Action |
//! |---------|--------|
//! | /new <cmd> | Run a command in a new tmux session |
//! | /list | List hiho sessions |
//! | /next, /prev | Cycle sessions |
//! | /closeall | Kill all hiho sessions |

use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use hiho::config::{self, Config};

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable holding the log filter
const LOG_ENV: &str = "HIHO_LOG";

/// Command line options
#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    config_path: Option<PathBuf>,
    no_alt_screen: bool,
    no_mouse: bool,
}

fn print_version() {
    eprintln!("hiho {}", VERSION);
}

fn print_help() {
    eprintln!("hiho {} - tmux session browser", VERSION);
    eprintln!();
    eprintln!("Usage: hiho [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <PATH>   Read configuration from PATH");
    eprintln!("  --no-alt-screen       Draw on the main screen buffer");
    eprintln!("  --no-mouse            Disable mouse reporting");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Default keybindings:");
    eprintln!("  Ctrl+C                Quit");
    eprintln!("  Tab                   Toggle Conversation / Tmux Window");
    eprintln!("  Ctrl+O                Cycle focus (sidebar, main, input)");
    eprintln!("  Alt+Right/Alt+Left    Next/previous session");
    eprintln!("  Up/Down, j/k          Move selection in the sidebar");
    eprintln!();
    eprintln!("Type /help inside hiho for the command list.");
    eprintln!();
    eprintln!("Configuration: ~/.config/hiho/config.toml");
    eprintln!("Log file:      ~/.config/hiho/hiho.log ({} sets the filter)", LOG_ENV);
}

fn parse_args<I>(args: I) -> Result<Args, String>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-c" | "--config" => {
                let path = args.next().ok_or_else(|| "Missing config path".to_string())?;
                parsed.config_path = Some(PathBuf::from(path));
            }
            "--no-alt-screen" => parsed.no_alt_screen = true,
            "--no-mouse" => parsed.no_mouse = true,
            other => {
                return Err(format!("Unknown argument: {}. Use -h for help.", other));
            }
        }
    }

    Ok(parsed)
}

/// Log to `~/.config/hiho/hiho.log`; the terminal belongs to the UI.
fn init_logging() {
    let log_path = config::config_dir()
        .map(|dir| dir.join("hiho.log"))
        .unwrap_or_else(|| PathBuf::from("hiho.log"));

    if let Some(parent) = log_path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let log_file = fs::OpenOptions::new().create(true).append(true).open(&log_path).ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

#[cfg(unix)]
fn run(args: Args, config: Config) -> anyhow::Result<()> {
    use hiho::app::App;
    use hiho::core::{Options, Program};
    use hiho::tmux::TmuxManager;

    let options = Options {
        alt_screen: config.ui.alt_screen && !args.no_alt_screen,
        mouse_cell_motion: config.ui.mouse && !args.no_mouse,
    };
    let app = App::new(TmuxManager::new(), config);

    let (_, result) = Program::new(app).with_options(options).run();
    match result {
        Ok(()) => Ok(()),
        Err(hiho::Error::Interrupted(signal)) => {
            info!("Stopped by signal {}", signal);
            Ok(())
        }
        Err(e) => Err(e).context("TUI exited with an error"),
    }
}

#[cfg(not(unix))]
fn run(_args: Args, _config: Config) -> anyhow::Result<()> {
    anyhow::bail!("hiho needs a Unix terminal and tmux")
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args(env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging();
    info!("hiho {} starting...", VERSION);

    let config = Config::load(args.config_path.as_deref());
    run(args, config)?;

    info!("hiho exited");
    Ok(())
}
