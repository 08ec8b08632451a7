use clap::Parser;
use firm_client::DEFAULT_BACKEND_URL;
use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, EnvFilter};

const DEFAULT_POLL_SECS: u64 = 5;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 4000;
const MIN_POLL_MS: u64 = 250;

#[derive(Parser, Debug)]
#[command(name = "firm-mission-control")]
#[command(about = "Live dashboard for the simulated company backend")]
pub struct Args {
    /// Base URL of the simulation backend.
    #[arg(long, env = "FIRM_BACKEND_URL", default_value = "")]
    pub backend_url: String,
    /// Seconds between background refreshes.
    #[arg(long, env = "FIRM_POLL_SECS", default_value_t = DEFAULT_POLL_SECS)]
    pub poll_secs: u64,
    #[arg(long, env = "FIRM_REQUEST_TIMEOUT_MS", default_value_t = DEFAULT_REQUEST_TIMEOUT_MS)]
    pub request_timeout_ms: u64,
    #[arg(long, env = "FIRM_LOG_DIR", default_value = "")]
    pub log_dir: String,
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub backend_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub log_dir: String,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_SECS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            log_dir: String::new(),
            debug: false,
        }
    }
}

pub fn load_config() -> Config {
    config_from_args(Args::parse())
}

pub fn config_from_args(args: Args) -> Config {
    Config {
        backend_url: resolve_backend_url(&args.backend_url),
        poll_interval: resolve_poll_interval(args.poll_secs),
        request_timeout: Duration::from_millis(args.request_timeout_ms.max(1)),
        log_dir: args.log_dir,
        debug: args.debug || env_true("FIRM_DEBUG"),
    }
}

fn resolve_backend_url(flag: &str) -> String {
    if !flag.trim().is_empty() {
        return flag.trim().to_string();
    }
    // BACKEND_URL is the name the simulation scripts already export.
    if let Ok(value) = std::env::var("BACKEND_URL") {
        if !value.trim().is_empty() {
            return value.trim().to_string();
        }
    }
    DEFAULT_BACKEND_URL.to_string()
}

fn resolve_poll_interval(secs: u64) -> Duration {
    Duration::from_secs(secs).max(Duration::from_millis(MIN_POLL_MS))
}

pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_true(key: &str) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|value| parse_bool_flag(&value))
        .unwrap_or(false)
}

pub struct LogGuard {
    file: Option<Arc<Mutex<std::fs::File>>>,
}

struct LogWriter {
    stdout: Option<io::Stdout>,
    file: Option<Arc<Mutex<std::fs::File>>>,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(stdout) = self.stdout.as_mut() {
            let _ = stdout.write_all(buf);
        }
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.write_all(buf);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(stdout) = self.stdout.as_mut() {
            let _ = stdout.flush();
        }
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
        Ok(())
    }
}

/// The terminal belongs to the dashboard, so logs only reach stdout when
/// FIRM_LOG_STDOUT is set; otherwise they go to `--log-dir` or nowhere.
pub fn init_logging(config: &Config) -> LogGuard {
    let level = if config.debug {
        "debug".to_string()
    } else if let Ok(level) = std::env::var("FIRM_LOG_LEVEL") {
        level
    } else {
        "info".to_string()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let guard = match open_log_file(&config.log_dir) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("log_file_error: {err}");
            LogGuard { file: None }
        }
    };
    let stdout_enabled = env_true("FIRM_LOG_STDOUT");
    let file = guard.file.clone();
    let make_writer = BoxMakeWriter::new(move || LogWriter {
        stdout: stdout_enabled.then(io::stdout),
        file: file.clone(),
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(make_writer)
        .try_init();
    guard
}

impl LogGuard {
    pub fn path_hint(&self) -> Option<&'static str> {
        self.file.as_ref().map(|_| "firm-mission-control.log")
    }
}

fn open_log_file(log_dir: &str) -> io::Result<LogGuard> {
    if log_dir.trim().is_empty() {
        return Ok(LogGuard { file: None });
    }
    let dir = PathBuf::from(log_dir);
    std::fs::create_dir_all(&dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("firm-mission-control.log"))?;
    Ok(LogGuard {
        file: Some(Arc::new(Mutex::new(file))),
    })
}
