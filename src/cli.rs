use clap::{Args, Parser, Subcommand};

use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) enum RunOutcome {
    Serve(ServeConfig),
    Exit(i32),
}

pub(crate) struct ServeConfig {
    pub(crate) listen: SocketAddr,
    pub(crate) admins: Vec<String>,
    pub(crate) app: pushbox::config::AppConfig,
}

pub(crate) fn run() -> RunOutcome {
    let cli = Cli::parse();
    if let Some(Command::Init(args)) = cli.command {
        let code = run_init(args);
        return RunOutcome::Exit(code);
    }

    match resolve_serve_config(&cli) {
        Ok(serve) => RunOutcome::Serve(serve),
        Err(err) => {
            eprintln!("error: {err}");
            RunOutcome::Exit(2)
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "pushbox",
    version,
    about = "Web push subscription store and delivery service"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    /// Absolute base URI records are identified under.
    #[arg(long, env = "PUSHBOX_BASE_URI")]
    base_uri: Option<String>,
    #[arg(long, env = "PUSHBOX_LISTEN", default_value = "127.0.0.1:3000")]
    listen: SocketAddr,
    /// Identity granted every capability; repeatable.
    #[arg(long, env = "PUSHBOX_ADMIN")]
    admin: Vec<String>,
    /// Accept self-signed push-service certificates (test endpoints only).
    #[arg(long, env = "PUSHBOX_ALLOW_INVALID_CERTS")]
    allow_invalid_certs: bool,
    /// Outbound delivery timeout, `<number>[s|m|h]`.
    #[arg(long, env = "PUSHBOX_REQUEST_TIMEOUT")]
    request_timeout: Option<String>,
    /// Upper bound on concurrent deliveries within one fan-out.
    #[arg(long, env = "PUSHBOX_FANOUT_LIMIT", default_value_t = 8)]
    fanout_limit: usize,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate VAPID signing credentials and print them.
    Init(InitArgs),
}

#[derive(Args, Debug)]
struct InitArgs {
    /// Human-readable key name.
    #[arg(long, default_value = "default")]
    name: String,
    /// Contact address push services may use to reach the key's operator.
    #[arg(long)]
    email: Option<String>,
}

fn run_init(args: InitArgs) -> i32 {
    let credentials = pushbox::generate_credentials();
    let (email, show_contact_note) = match args.email {
        Some(email) => (email, false),
        None => ("you@example.com".to_string(), true),
    };

    println!("VAPID credentials generated for key \"{}\".", args.name);
    println!();
    println!("PUSHBOX_VAPID_PRIVATE_KEY=\"{}\"", credentials.private_key);
    println!("PUSHBOX_VAPID_PUBLIC_KEY=\"{}\"", credentials.public_key);
    println!("PUSHBOX_VAPID_CONTACT=\"{email}\"");
    if show_contact_note {
        println!();
        println!("Note: replace PUSHBOX_VAPID_CONTACT with an address you control.");
    }
    0
}

fn resolve_serve_config(cli: &Cli) -> Result<ServeConfig, String> {
    let base_uri = cli
        .base_uri
        .as_deref()
        .ok_or("--base-uri is required unless using a subcommand")?
        .trim()
        .trim_end_matches('/')
        .to_string();
    if base_uri.is_empty() {
        return Err("base uri cannot be empty".to_string());
    }

    let request_timeout = match cli.request_timeout.as_deref() {
        Some(raw) => parse_request_timeout(raw)?,
        None => DEFAULT_REQUEST_TIMEOUT,
    };
    if cli.fanout_limit == 0 {
        return Err("fanout limit must be greater than 0".to_string());
    }

    Ok(ServeConfig {
        listen: cli.listen,
        admins: cli.admin.clone(),
        app: pushbox::config::AppConfig {
            base_uri,
            routes: pushbox::config::Routes::default(),
            strict_tls: !cli.allow_invalid_certs,
            request_timeout,
            fanout_limit: cli.fanout_limit,
        },
    })
}

fn parse_request_timeout(raw: &str) -> Result<Duration, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err("request timeout cannot be empty".to_string());
    }

    let (amount, unit) = match value.chars().last() {
        Some(ch) if ch.is_ascii_alphabetic() => {
            (&value[..value.len() - 1], ch.to_ascii_lowercase())
        }
        _ => (value, 's'),
    };

    let amount: u64 = amount
        .parse()
        .map_err(|_| format!("invalid request timeout '{value}'; expected <number>[s|m|h]"))?;

    if amount == 0 {
        return Err("request timeout must be greater than 0".to_string());
    }

    match unit {
        's' => Ok(Duration::from_secs(amount)),
        'm' => Ok(Duration::from_secs(amount * 60)),
        'h' => Ok(Duration::from_secs(amount * 3600)),
        _ => Err(format!(
            "invalid request timeout '{value}'; expected <number>[s|m|h]"
        )),
    }
}
