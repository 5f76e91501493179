use std::fmt::Display;
use std::net::SocketAddr;
use std::process;

use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use yansi::Paint;

use euckr_form::config::{self, DEFAULT_HOST, DEFAULT_PORT};
use euckr_form::{charset, encode_form, parse_form, routes, AppState, ConfigError, FormData};

fn build_state_from_env(env_file: Option<&str>) -> Result<AppState, ConfigError> {
    config::load_env_file(env_file);
    let charset = charset::install(&config::get_charset_label())?;
    let max_body_size = config::get_max_body_size()?;
    Ok(AppState::new(charset, max_body_size))
}

fn exit_with(context: &str, err: impl Display) -> ! {
    tracing::error!(%err, "{}", context);
    eprintln!("{}: {}", context.red(), err);
    process::exit(1);
}

async fn start_server(state: AppState, host: &str, port: u16) {
    let addr: SocketAddr = match format!("{}:{}", host, port).parse() {
        Ok(a) => a,
        Err(e) => exit_with("Invalid host/port format", e),
    };
    tracing::info!(%addr, charset = state.charset.name(), max_body_size = state.max_body_size, "Starting form decoding server");
    println!("{} {}", "Server running on".green(), format!("http://{}", addr).cyan());

    let app = routes::build_router(state);
    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            if let Err(e) = axum::serve(listener, app).await {
                exit_with("Server error", e);
            }
        }
        Err(e) => {
            eprintln!("{}", "Stop the process using this port or pass a different --port value.".yellow());
            exit_with(&format!("Failed to bind to {}", addr), e);
        }
    }
}

async fn read_input(file: Option<&str>) -> std::io::Result<Vec<u8>> {
    match file {
        Some(path) => tokio::fs::read(path).await,
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin().read_to_end(&mut buf).await?;
            Ok(buf)
        }
    }
}

/// `NAME=VALUE` or a bare `NAME` (no value)
fn parse_field_arg(arg: &str) -> (String, Option<String>) {
    match arg.split_once('=') {
        Some((name, value)) => (name.to_string(), Some(value.to_string())),
        None => (arg.to_string(), None),
    }
}

#[derive(Parser)]
#[command(
    name = "euckr-form",
    author,
    version,
    about = "Decode form bodies sent in a legacy charset",
    long_about = r#"Serve and inspect application/x-www-form-urlencoded bodies that are encoded in a legacy charset (EUC-KR by default) without a charset parameter.

The pinned charset is read from FORM_CHARSET (or a .env file) and resolved once at startup.

Examples:
  1) Run the server:
      euckr-form serve --port 8080
  2) Build a request body and post it:
      euckr-form encode text_en='Hello World' text_kr=한글 > body.txt
      curl -X POST -H 'Content-Type: application/x-www-form-urlencoded' --data-binary @body.txt http://127.0.0.1:8080/euc-kr/form
  3) Decode a captured body:
      euckr-form decode --file body.txt
"#,
    after_help = "Use `euckr-form <subcommand> --help` to get subcommand specific options."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    /// Disable colorized output
    #[arg(long, global = true)]
    no_color: bool,
    /// Only log warnings and errors unless RUST_LOG says otherwise
    #[arg(long, global = true)]
    silent: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server
    Serve {
        /// Host to bind to
        #[arg(long, default_value_t = String::from(DEFAULT_HOST))]
        host: String,
        /// Port to bind to
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Path to .env file
        #[arg(long)]
        env_file: Option<String>,
    },
    /// Validate configuration
    #[command(long_about = "Resolve FORM_CHARSET and MAX_FORM_BODY_SIZE exactly as the server does at startup and report the result.")]
    CheckConfig {
        #[arg(long)]
        env_file: Option<String>,
    },
    /// Decode a form body with the pinned charset and print it as JSON
    Decode {
        /// File holding the raw body; stdin when omitted
        #[arg(long)]
        file: Option<String>,
        #[arg(long)]
        env_file: Option<String>,
    },
    /// Print a form body encoded with the pinned charset
    Encode {
        /// Fields as NAME=VALUE, or NAME for a field without a value
        #[arg(required = true)]
        fields: Vec<String>,
        #[arg(long)]
        env_file: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.silent { "warn" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    if cli.no_color {
        yansi::whenever(yansi::Condition::NEVER);
    }

    let command = cli.command.unwrap_or(Commands::Serve {
        host: DEFAULT_HOST.to_string(),
        port: DEFAULT_PORT,
        env_file: None,
    });

    match command {
        Commands::Serve { host, port, env_file } => {
            let state = build_state_from_env(env_file.as_deref()).unwrap_or_else(|e| exit_with("Invalid configuration", e));
            start_server(state, &host, port).await;
        }
        Commands::CheckConfig { env_file } => {
            let state = build_state_from_env(env_file.as_deref()).unwrap_or_else(|e| exit_with("Invalid configuration", e));
            println!("{} {}", "Charset:".bold(), state.charset.name());
            println!("{} {} bytes", "Max body size:".bold(), state.max_body_size);
            println!("{}", "Configuration OK".green());
        }
        Commands::Decode { file, env_file } => {
            let state = build_state_from_env(env_file.as_deref()).unwrap_or_else(|e| exit_with("Invalid configuration", e));
            let bytes = read_input(file.as_deref())
                .await
                .unwrap_or_else(|e| exit_with("Failed to read input", e));
            let form = charset::decode(&bytes, state.charset)
                .and_then(|text| parse_form(&text, state.charset))
                .unwrap_or_else(|e| exit_with("Failed to decode form", e));
            match serde_json::to_string_pretty(&form) {
                Ok(json) => println!("{}", json),
                Err(e) => exit_with("Failed to render JSON", e),
            }
        }
        Commands::Encode { fields, env_file } => {
            let state = build_state_from_env(env_file.as_deref()).unwrap_or_else(|e| exit_with("Invalid configuration", e));
            let form: FormData = fields.iter().map(|f| parse_field_arg(f)).collect();
            match encode_form(&form, state.charset) {
                Ok(body) => println!("{}", body),
                Err(e) => exit_with("Failed to encode form", e),
            }
        }
    }
}
