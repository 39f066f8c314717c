//! CLI binary for license-scan.
//!
//! A thin shim over the library crate: `serve` runs the HTTP service,
//! `scan` reads one image file and prints the fields.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use license_scan::config::{MODEL_ENV, PROVIDER_ENV};
use license_scan::prompts::PHOTO_SUGGESTIONS;
use license_scan::{server, ExtractOptions, ExtractionResult, Extractor, ScanConfig, ScanError};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the web service on the default port
  license-scan serve

  # Listen on all interfaces, port 8080
  license-scan serve --bind 0.0.0.0:8080

  # Scan a photo from the command line
  license-scan scan front.jpg

  # JSON output, even if the model does not see a license
  license-scan scan --json --force blurry.png

  # Call the service
  curl -F image=@front.jpg http://127.0.0.1:5000/scan

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Log filter (overrides --verbose / --quiet)

  Variables may also be placed in a .env file in the working directory.
"#;

/// Read U.S. driver's license fields from photos using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "license-scan",
    version,
    about = "Read U.S. driver's license fields from photos using Vision LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// LLM model ID (e.g. gpt-4o, gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = MODEL_ENV, global = true)]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = PROVIDER_ENV, global = true)]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "LICENSE_SCAN_TEMPERATURE", default_value_t = 0.0, global = true)]
    temperature: f32,

    /// Max LLM output tokens per scan.
    #[arg(long, env = "LICENSE_SCAN_MAX_TOKENS", default_value_t = 500, global = true)]
    max_tokens: usize,

    /// Image detail hint sent to the provider.
    #[arg(long, env = "LICENSE_SCAN_DETAIL", value_enum, default_value = "high", global = true)]
    detail: DetailArg,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "LICENSE_SCAN_SYSTEM_PROMPT", global = true)]
    system_prompt: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "LICENSE_SCAN_VERBOSE", global = true)]
    verbose: bool,

    /// Suppress all logs except errors.
    #[arg(short, long, env = "LICENSE_SCAN_QUIET", global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service (GET /, POST /scan, POST /extract).
    Serve {
        /// Address to listen on.
        #[arg(long, env = "LICENSE_SCAN_BIND", default_value = "127.0.0.1:5000")]
        bind: SocketAddr,

        /// Largest accepted request body in bytes.
        #[arg(long, env = "LICENSE_SCAN_MAX_UPLOAD_BYTES", default_value_t = 10 * 1024 * 1024)]
        max_upload_bytes: usize,
    },

    /// Scan a single image file and print the extracted fields.
    Scan {
        /// Path to a JPEG, PNG, WebP or GIF photo of the license.
        image: PathBuf,

        /// Parse the reply even if the model reports no license.
        #[arg(long)]
        force: bool,

        /// Print the full result as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum DetailArg {
    Low,
    High,
    Auto,
}

impl DetailArg {
    fn as_str(self) -> &'static str {
        match self {
            DetailArg::Low => "low",
            DetailArg::High => "high",
            DetailArg::Auto => "auto",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // API keys may live in .env; a missing file is fine.
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli).await?;
    tracing::debug!("{:?}", config);
    let extractor = Arc::new(
        Extractor::from_config(&config).context("Failed to initialise the vision provider")?,
    );

    match cli.command {
        Command::Serve { bind, .. } => {
            tracing::info!("Scanning with {}", extractor.model());
            let app = server::router(extractor, config.max_upload_bytes);
            let listener = tokio::net::TcpListener::bind(bind)
                .await
                .with_context(|| format!("Failed to bind {bind}"))?;
            server::serve(listener, app, shutdown_signal())
                .await
                .context("HTTP server failed")?;
        }
        Command::Scan {
            ref image,
            force,
            json,
        } => {
            let options = ExtractOptions {
                force_extraction: force,
            };
            match extractor.extract_path(image, options).await {
                Ok(output) if json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&output).context("Failed to serialise output")?
                    );
                }
                Ok(output) => {
                    print_fields(&output.result);
                    if !cli.quiet {
                        eprintln!(
                            "{}",
                            dim(&format!(
                                "{}  ·  {} tokens in / {} out  ·  {}ms",
                                output.model,
                                output.stats.input_tokens,
                                output.stats.output_tokens,
                                output.stats.total_ms
                            ))
                        );
                    }
                }
                Err(ScanError::NoLicenseDetected) => {
                    eprintln!("{} {}", red("✘"), ScanError::NoLicenseDetected);
                    for tip in PHOTO_SUGGESTIONS {
                        eprintln!("  • {tip}");
                    }
                    eprintln!("{}", dim("Re-run with --force to parse the reply anyway."));
                    std::process::exit(2);
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to scan {}", image.display()));
                }
            }
        }
    }

    Ok(())
}

/// Map CLI args to `ScanConfig`.
async fn build_config(cli: &Cli) -> Result<ScanConfig> {
    let mut builder = ScanConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .image_detail(cli.detail.as_str());

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Command::Serve {
        max_upload_bytes, ..
    } = cli.command
    {
        builder = builder.max_upload_bytes(max_upload_bytes);
    }

    builder.build().context("Invalid configuration")
}

/// Print the populated fields as an aligned list.
fn print_fields(result: &ExtractionResult) {
    let rows = [
        ("Name", &result.name),
        ("Date of birth", &result.date_of_birth),
        ("License number", &result.license_number),
        ("Issue date", &result.issue_date),
        ("Expiration date", &result.expiration_date),
        ("Address", &result.address),
        ("Sex", &result.sex),
        ("Height", &result.height),
        ("Weight", &result.weight),
        ("Eyes", &result.eye_color),
        ("Restrictions", &result.restrictions),
        ("Class", &result.license_class),
        ("DD#", &result.document_discriminator),
        ("Donor", &result.organ_donor),
        ("Revision date", &result.revision_date),
    ];

    let mut any = false;
    for (label, value) in rows {
        if let Some(v) = value {
            println!("{} {:<16} {}", green("✓"), bold(label), v);
            any = true;
        }
    }
    if !any {
        println!("{} {}", red("✗"), bold("No structured fields found"));
    }
    if let Some(ref raw) = result.raw_text {
        println!();
        println!("{}", dim("Unmapped text:"));
        println!("{raw}");
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn env_of(id: &str) -> Option<String> {
        Cli::command()
            .get_arguments()
            .find(|a| a.get_id() == id)
            .and_then(|a| a.get_env())
            .map(|e| e.to_string_lossy().into_owned())
    }

    #[test]
    fn provider_and_model_read_the_library_variables() {
        assert_eq!(env_of("provider").as_deref(), Some(PROVIDER_ENV));
        assert_eq!(env_of("model").as_deref(), Some(MODEL_ENV));
        assert!(AFTER_HELP.contains(PROVIDER_ENV));
        assert!(AFTER_HELP.contains(MODEL_ENV));
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
        let cli = Cli::try_parse_from(["license-scan", "scan", "front.jpg", "--json"]).unwrap();
        assert!(matches!(cli.command, Command::Scan { json: true, .. }));
    }
}
