use anyhow::{Context, bail};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use netweave_core::data::{Database, SessionRecord};
use netweave_core::report::{
    ReportFormat, gather_report_data, generate_json_report, generate_result_summary,
    generate_text_report, save_report,
};
use netweave_core::{ExpansionLevel, NetworkAnalyzer, NetworkRequest, Outcome, RelationKind};
use netweave_scanner::http::HttpSource;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use url::Url;

const DATABASE_FILE: &str = "netweave.db";

// Helper functions for the network handler

/// Parse a comma-separated list of relation kinds, e.g. `contact,commenter`
pub fn parse_relation_kinds(value: &str) -> Result<Vec<RelationKind>, String> {
    let mut kinds = Vec::new();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match RelationKind::from_str(part) {
            Some(kind) => kinds.push(kind),
            None => {
                return Err(format!(
                    "Unknown relation kind '{}' (expected contact or commenter)",
                    part
                ));
            }
        }
    }

    if kinds.is_empty() {
        return Err("At least one relation kind is required".to_string());
    }

    Ok(kinds)
}

pub fn parse_level(value: &str) -> Result<ExpansionLevel, String> {
    ExpansionLevel::from_str(value)
        .ok_or_else(|| format!("Unknown expansion level '{}' (expected 1, 1.5 or 2)", value))
}

/// Expand `~` in a user supplied path
pub fn resolve_path(value: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(value).as_ref())
}

/// Assemble and validate a request from command line values
pub fn build_request(
    handle: &str,
    kinds: &str,
    level: &str,
    max_per_request: Option<usize>,
    enrich: bool,
) -> Result<NetworkRequest, String> {
    let request = NetworkRequest::new(handle.trim(), parse_level(level)?)
        .with_relation_kinds(parse_relation_kinds(kinds)?)
        .with_max_per_request(max_per_request)
        .with_enrichment(enrich);

    request.validate().map_err(|e| e.to_string())?;
    Ok(request)
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> String {
    print!("{} ", msg.bright_cyan().bold());
    let _ = io::stdout().flush();
    let mut response = String::new();
    if io::stdin().read_line(&mut response).is_err() {
        return String::new();
    }
    response.trim().to_lowercase()
}

fn fail(error: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "✗".red().bold(), error);
    std::process::exit(1);
}

fn open_database(value: &str) -> anyhow::Result<Database> {
    let db_path = resolve_path(value);
    if !Database::exists(&db_path) {
        bail!(
            "No database at {} (run `netweave init` first)",
            db_path.display()
        );
    }
    Database::new(&db_path).with_context(|| format!("Failed to open {}", db_path.display()))
}

fn colored_status(status: &str) -> colored::ColoredString {
    match status {
        "success" => status.green().bold(),
        "partial_success" => status.yellow().bold(),
        "cancelled" => status.bright_black().bold(),
        "failed" => status.red().bold(),
        _ => status.cyan(),
    }
}

pub fn handle_init(args: &ArgMatches) {
    print_divider();
    println!("{}", "  NETWEAVE INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let config_value = args
        .get_one::<String>("PATH")
        .map(String::as_str)
        .unwrap_or("~/.config/netweave/");
    let force = args.get_flag("force");
    let config_dir = resolve_path(config_value);
    let db_path = config_dir.join(DATABASE_FILE);

    println!("{} Parsed arguments", "✓".green().bold());
    println!(
        "{} Target: {}",
        "→".blue(),
        config_dir.display().to_string().bright_white()
    );
    println!();

    if let Err(e) = initialize(&config_dir, &db_path, force) {
        fail(e);
    }

    println!();
    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!();
    println!(
        "{} Config directory: {}",
        "✓".green().bold(),
        config_dir.display().to_string().bright_white()
    );
    println!(
        "{} Database: {}",
        "✓".green().bold(),
        db_path.display().to_string().bright_white()
    );
    println!();
}

fn initialize(config_dir: &Path, db_path: &Path, force: bool) -> anyhow::Result<()> {
    if !config_dir.exists() {
        println!("{} Creating directory structure...", "→".blue());
        fs::create_dir_all(config_dir)
            .with_context(|| format!("Failed to create {}", config_dir.display()))?;
        println!(
            "  {} {}",
            "✓".green(),
            config_dir.display().to_string().bright_white()
        );
    }

    if Database::exists(db_path) {
        let overwrite = if force {
            println!(
                "{} Deleting existing database (force mode)",
                "→".yellow().bold()
            );
            true
        } else {
            println!("{}", "⚠ WARNING".yellow().bold());
            println!("Database already exists at:");
            println!(
                "  {} {}",
                "•".yellow(),
                db_path.display().to_string().bright_white()
            );
            println!("{}", "Overwriting it removes every stored session.".yellow());
            println!();

            let response = print_prompt("Would you like to overwrite it? [y/N]:");
            println!();
            response == "y" || response == "yes"
        };

        if !overwrite {
            println!("{} Keeping existing database", "→".blue());
            return Ok(());
        }

        Database::drop(db_path)
            .with_context(|| format!("Failed to remove {}", db_path.display()))?;
        println!("{} Existing database removed", "✓".green().bold());
        println!();
    }

    println!("{} Creating database...", "→".blue());
    Database::new(db_path).with_context(|| format!("Failed to create {}", db_path.display()))?;
    println!(
        "{} Database initialized: {}",
        "✓".green().bold(),
        db_path.display().to_string().bright_white()
    );
    Ok(())
}

pub async fn handle_network(args: &ArgMatches) {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    match run_network(args).await {
        Ok(Outcome::Failed(_)) => std::process::exit(1),
        Ok(_) => {}
        Err(e) => fail(e),
    }
}

async fn run_network(args: &ArgMatches) -> anyhow::Result<Outcome> {
    let handle = args
        .get_one::<String>("user")
        .context("--user is required")?;
    let kinds = args
        .get_one::<String>("kinds")
        .map(String::as_str)
        .unwrap_or("contact,commenter");
    let level = args
        .get_one::<String>("level")
        .map(String::as_str)
        .unwrap_or("1");
    let max_per_request = args.get_one::<usize>("max-per-request").copied();
    let enrich = !args.get_flag("no-enrich");

    let request = build_request(handle, kinds, level, max_per_request, enrich)
        .map_err(anyhow::Error::msg)?;

    let api_key = args
        .get_one::<String>("api-key")
        .context("--api-key or NETWEAVE_API_KEY is required")?;
    let timeout = args.get_one::<u64>("timeout").copied().unwrap_or(30);
    let mut source = HttpSource::with_timeout(api_key.as_str(), timeout)?;
    if let Some(base_url) = args.get_one::<Url>("base-url") {
        source = source.with_base_url(base_url.as_str())?;
    }

    let database = if args.get_flag("no-save") {
        None
    } else {
        let db_value = args
            .get_one::<String>("db")
            .map(String::as_str)
            .unwrap_or("~/.config/netweave/netweave.db");
        match open_database(db_value) {
            Ok(db) => Some(db),
            Err(e) => {
                warn!("Session will not be stored: {:#}", e);
                None
            }
        }
    };
    let session_id = match &database {
        Some(db) => Some(db.create_session(&request)?),
        None => None,
    };

    println!(
        "\n🕸️  Expanding the network of {}",
        request.root_handle.bright_white().bold()
    );
    println!(
        "Relations: {}",
        request
            .kinds()
            .iter()
            .map(RelationKind::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("Level: {}", request.level);
    match request.max_per_request {
        Some(max) => println!("Max per request: {}", max),
        None => println!("Max per request: unlimited"),
    }
    println!("Enrichment: {}\n", if request.enrich { "on" } else { "off" });

    let analyzer = NetworkAnalyzer::new(Arc::new(source));
    let task = analyzer.spawn(request)?;

    let cancel = task.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = task.finish(|message| spinner.set_message(message)).await;
    spinner.finish_and_clear();

    let Some(result) = result else {
        bail!("Crawl ended without a result");
    };

    match &result.outcome {
        Outcome::Success => println!("{} Network complete!\n", "✓".green().bold()),
        Outcome::PartialSuccess => println!(
            "{} Network complete with missing pieces\n",
            "⚠".yellow().bold()
        ),
        Outcome::Cancelled => println!("{} Network cancelled\n", "→".yellow().bold()),
        Outcome::Failed(message) => eprintln!("{} {}\n", "✗".red().bold(), message),
    }

    print!("{}", generate_result_summary(&result));

    if let (Some(db), Some(session_id)) = (&database, &session_id) {
        db.record_result(session_id, &result)?;
        println!(
            "\n{} Session stored: {}",
            "✓".green().bold(),
            session_id.bright_white()
        );
    }

    if let Some(output) = args.get_one::<PathBuf>("output") {
        let json = result.graph.to_json()?;
        fs::write(output, json)
            .with_context(|| format!("Failed to write graph to {}", output.display()))?;
        println!(
            "{} Graph written to {}",
            "✓".green().bold(),
            output.display().to_string().bright_white()
        );
    }

    Ok(result.outcome)
}

pub fn handle_report(args: &ArgMatches) {
    if let Err(e) = run_report(args) {
        fail(e);
    }
}

fn run_report(args: &ArgMatches) -> anyhow::Result<()> {
    let session_id = args
        .get_one::<String>("session")
        .context("--session is required")?;
    let format_value = args
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("text");
    let format = ReportFormat::from_str(format_value)
        .with_context(|| format!("Unknown report format '{}'", format_value))?;
    let include_vertices = args.get_flag("include-vertices");
    let db_value = args
        .get_one::<String>("db")
        .map(String::as_str)
        .unwrap_or("~/.config/netweave/netweave.db");

    let db = open_database(db_value)?;
    let data = gather_report_data(&db, session_id, include_vertices)
        .with_context(|| format!("No session with ID {}", session_id))?;

    let report = match format {
        ReportFormat::Text => generate_text_report(&data),
        ReportFormat::Json => generate_json_report(&data)?,
    };

    match args.get_one::<PathBuf>("output") {
        Some(path) => {
            save_report(&report, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!(
                "{} Report saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print!("{}", report),
    }

    Ok(())
}

pub fn handle_sessions(args: &ArgMatches) {
    if let Err(e) = run_sessions(args) {
        fail(e);
    }
}

fn run_sessions(args: &ArgMatches) -> anyhow::Result<()> {
    let db_value = args
        .get_one::<String>("db")
        .map(String::as_str)
        .unwrap_or("~/.config/netweave/netweave.db");
    let db = open_database(db_value)?;
    let sessions = db.get_sessions()?;

    if sessions.is_empty() {
        println!("No stored sessions.");
        return Ok(());
    }

    print_divider();
    println!("{}", "  STORED SESSIONS".bright_white().bold());
    print_divider();
    for session in &sessions {
        print_session_line(session);
    }
    println!();
    Ok(())
}

fn print_session_line(session: &SessionRecord) {
    let started = chrono::DateTime::from_timestamp(session.start_time, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| session.start_time.to_string());

    println!(
        "{}  {}  {:<16} level {:<3}  {}",
        session.id.bright_white(),
        started.bright_black(),
        session.root_handle.cyan(),
        session.level,
        colored_status(&session.status)
    );
}
