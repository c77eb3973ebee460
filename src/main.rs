//! Browser PDF Printer - Main Entry Point
//!
//! This is the main executable for the pdf-printer application.
//! It handles CLI argument parsing, configuration loading, and dispatches to
//! the `serve`, `print` and `check` commands.

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use browser_pdf_printer::{
    api::{ApiServer, AppState},
    browser::{BrowserManager, Cookie},
    config::{CliArgs, PrinterSettings},
    printer::{BrowserPdfPrinter, PdfArtifact, PrintRequest},
    VERSION,
};

/// ANSI color codes for terminal output
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GREEN: &str = "\x1b[32m";
    pub const RED: &str = "\x1b[31m";
    pub const BLUE: &str = "\x1b[34m";
}

/// Print the startup banner with version
fn print_banner() {
    println!(
        r#"
{cyan}{bold}  pdf-printer{reset}
{dim}  Server-side PDF printing through a remote browser{reset}
{dim}  Version: {version}{reset}
"#,
        cyan = colors::CYAN,
        bold = colors::BOLD,
        reset = colors::RESET,
        dim = colors::DIM,
        version = VERSION
    );
}

/// Print configuration summary
fn print_config_summary(settings: &PrinterSettings) {
    println!(
        "{bold}{blue}Configuration:{reset}",
        bold = colors::BOLD,
        blue = colors::BLUE,
        reset = colors::RESET
    );
    println!(
        "  {dim}Browser:{reset}        {}",
        settings.browser_endpoint(),
        dim = colors::DIM,
        reset = colors::RESET
    );
    println!(
        "  {dim}Render Host:{reset}    {}",
        settings.render_host,
        dim = colors::DIM,
        reset = colors::RESET
    );
    println!(
        "  {dim}Context Path:{reset}   {}",
        if settings.context_path.is_empty() {
            "/"
        } else {
            settings.context_path.as_str()
        },
        dim = colors::DIM,
        reset = colors::RESET
    );
    println!(
        "  {dim}Timeout:{reset}        {}ms",
        settings.default_timeout_ms,
        dim = colors::DIM,
        reset = colors::RESET
    );
    println!();
}

/// Build the CLI command parser
fn build_cli() -> Command {
    Command::new("pdf-printer")
        .bin_name("pdf-printer")
        .version(VERSION)
        .author("Browser PDF Printer Team")
        .about("Server-side PDF printing of web pages through a remote browser")
        .long_about(
            "pdf-printer connects to a running Chrome/Chromium (remote debugging port)\n\
             and prints print preview pages to PDF:\n\
             - one incognito tab per request\n\
             - fallback to a render host reachable from the browser\n\
             - caller cookies forwarded to the page\n\
             - REST API for remote use",
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to configuration file (TOML or JSON)")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("browser-host")
                .long("browser-host")
                .value_name("HOST")
                .help("Remote debugging host of the browser (default: 127.0.0.1)")
                .global(true),
        )
        .arg(
            Arg::new("browser-port")
                .long("browser-port")
                .value_name("PORT")
                .help("Remote debugging port of the browser (default: 9222)")
                .value_parser(clap::value_parser!(u16))
                .global(true),
        )
        .arg(
            Arg::new("render-host")
                .long("render-host")
                .value_name("HOST")
                .help("Host the browser uses when the caller's host is unreachable")
                .global(true),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("MS")
                .help("Timeout of each browser operation in milliseconds")
                .value_parser(clap::value_parser!(u64))
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::Count)
                .global(true),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Suppress output except errors")
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose")
                .global(true),
        )
        .subcommand(
            Command::new("serve").about("Run the REST API server").arg(
                Arg::new("port")
                    .short('p')
                    .long("port")
                    .value_name("PORT")
                    .help("API server port (default: 8080)")
                    .value_parser(clap::value_parser!(u16)),
            ),
        )
        .subcommand(
            Command::new("print")
                .about("Print one page to PDF")
                .arg(
                    Arg::new("url")
                        .value_name("URL")
                        .help("Address of the print preview")
                        .required(true),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Write the PDF to FILE instead of stdout")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("cookie")
                        .long("cookie")
                        .value_name("NAME=VALUE")
                        .help("Cookie sent with the print preview request (repeatable)")
                        .value_parser(parse_cookie)
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("context-path")
                        .long("context-path")
                        .value_name("PATH")
                        .help("Path prefix of the web application, e.g. /xwiki"),
                ),
        )
        .subcommand(Command::new("check").about("Check that the browser can be reached"))
}

fn parse_cookie(value: &str) -> Result<Cookie, String> {
    Cookie::parse_pair(value).ok_or_else(|| format!("expected NAME=VALUE, got {:?}", value))
}

/// Parse CLI arguments into CliArgs struct
fn parse_cli_args(matches: &ArgMatches) -> CliArgs {
    let mut args = CliArgs::default();

    args.config_file = matches.get_one::<PathBuf>("config").cloned();
    args.browser_host = matches.get_one::<String>("browser-host").cloned();
    args.browser_port = matches.get_one::<u16>("browser-port").copied();
    args.render_host = matches.get_one::<String>("render-host").cloned();
    args.timeout_ms = matches.get_one::<u64>("timeout").copied();

    match matches.subcommand() {
        Some(("serve", sub)) => {
            args.api_port = sub.get_one::<u16>("port").copied();
        }
        Some(("print", sub)) => {
            args.context_path = sub.get_one::<String>("context-path").cloned();
        }
        _ => {}
    }

    args
}

/// Initialize the tracing/logging subsystem
fn init_tracing(verbosity: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{},hyper=warn,chromiumoxide=warn,tower_http=info",
            level
        ))
    });

    // stdout may carry the PDF
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Connects to the browser described by the settings.
#[cfg(feature = "chromium-browser")]
async fn connect_browser(settings: &PrinterSettings) -> Result<Arc<dyn BrowserManager>> {
    use browser_pdf_printer::browser::{BrowserConfig, ChromiumBrowserManager};

    let manager = ChromiumBrowserManager::connect(BrowserConfig::from(settings))
        .await
        .with_context(|| format!("Failed to connect to browser at {}", settings.browser_endpoint()))?;
    Ok(Arc::new(manager))
}

#[cfg(not(feature = "chromium-browser"))]
async fn connect_browser(_settings: &PrinterSettings) -> Result<Arc<dyn BrowserManager>> {
    anyhow::bail!("pdf-printer was built without a browser implementation (enable the chromium-browser feature)")
}

/// `serve`: runs the API server until Ctrl+C.
async fn run_serve(settings: PrinterSettings, quiet: bool) -> Result<()> {
    if !settings.api_enabled {
        anyhow::bail!("API server is disabled in the configuration");
    }

    if !quiet {
        print_banner();
        print_config_summary(&settings);
    }

    let manager = connect_browser(&settings).await?;
    let printer = BrowserPdfPrinter::from_settings(manager, &settings);
    let port = settings.api_port;

    let mut server = ApiServer::new(port, AppState::new(printer, settings));
    server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start API server: {}", e))?;

    if !quiet {
        println!(
            "{green}{bold}API Server started:{reset} http://127.0.0.1:{}",
            port,
            green = colors::GREEN,
            bold = colors::BOLD,
            reset = colors::RESET
        );
        println!(
            "{dim}Press Ctrl+C to stop{reset}",
            dim = colors::DIM,
            reset = colors::RESET
        );
        println!();
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal, stopping gracefully..."),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    server.stop().await;
    Ok(())
}

/// `print`: prints one page to a file or stdout.
async fn run_print(settings: PrinterSettings, matches: &ArgMatches) -> Result<()> {
    let url = matches
        .get_one::<String>("url")
        .map(String::as_str)
        .unwrap_or_default();
    let cookies: Vec<Cookie> = matches
        .get_many::<Cookie>("cookie")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let output = matches.get_one::<PathBuf>("output").cloned();

    let request = PrintRequest::parse(url)
        .with_context(|| format!("Invalid print preview URL: {}", url))?
        .with_cookies(cookies)
        .with_context_path(settings.context_path.clone());

    let manager = connect_browser(&settings).await?;
    let printer = BrowserPdfPrinter::from_settings(manager, &settings);
    let mut artifact = printer.print(&request).await?;

    let written = match output {
        Some(ref path) => write_pdf_file(&mut artifact, path).await,
        None => write_pdf(&mut artifact, tokio::io::stdout()).await,
    };
    if written.is_err() {
        artifact.close().await;
    }
    written?;

    info!(bytes = artifact.bytes_read(), "PDF written");
    Ok(())
}

/// Writes the PDF to `path`; the file only appears once the PDF is complete.
async fn write_pdf_file(artifact: &mut PdfArtifact, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create a temporary file in {}", dir.display()))?;
    let file = temp
        .as_file()
        .try_clone()
        .with_context(|| format!("Failed to open {}", temp.path().display()))?;

    write_pdf(artifact, tokio::fs::File::from_std(file)).await?;

    temp.persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

async fn write_pdf<W: AsyncWrite + Unpin>(artifact: &mut PdfArtifact, mut writer: W) -> Result<()> {
    while let Some(chunk) = artifact.next().await {
        writer.write_all(&chunk?).await.context("Failed to write PDF")?;
    }
    writer.flush().await.context("Failed to write PDF")?;
    Ok(())
}

/// `check`: reports whether the browser can be reached.
async fn run_check(settings: PrinterSettings) -> Result<()> {
    let available = match connect_browser(&settings).await {
        Ok(manager) => BrowserPdfPrinter::from_settings(manager, &settings).is_available().await,
        Err(e) => {
            warn!("{:#}", e);
            false
        }
    };

    if available {
        println!(
            "{green}Browser available:{reset} {}",
            settings.browser_endpoint(),
            green = colors::GREEN,
            reset = colors::RESET
        );
        Ok(())
    } else {
        println!(
            "{red}Browser not available:{reset} {}",
            settings.browser_endpoint(),
            red = colors::RED,
            reset = colors::RESET
        );
        anyhow::bail!("Browser at {} is not available", settings.browser_endpoint())
    }
}

/// Main application entry point
#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    let verbosity = matches.get_count("verbose");
    let quiet = matches.get_flag("quiet");

    init_tracing(verbosity, quiet);

    let cli_args = parse_cli_args(&matches);

    let settings = cli_args
        .load_settings()
        .context("Failed to load configuration")?;

    match matches.subcommand() {
        Some(("serve", _)) => run_serve(settings, quiet).await,
        Some(("print", sub)) => run_print(settings, sub).await,
        Some(("check", _)) => run_check(settings).await,
        _ => unreachable!("subcommand is required"),
    }
}
