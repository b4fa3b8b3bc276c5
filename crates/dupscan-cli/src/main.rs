use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dupscan::{ProviderKind, ScanConfig, Tokenizer};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dupscan")]
#[command(about = "Duplicate-content and web-plagiarism scanner for site page corpora", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a page corpus for internal duplicates and copies on the web (json).
    Scan(ScanCmd),
    /// Compare two documents (html or plain text) and print their similarity (json).
    Compare(CompareCmd),
    /// Diagnose configuration (json; no secrets).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct ScanCmd {
    /// JSON file: an array of pages or `{ "pages": [...] }`.
    #[arg(long)]
    pages: PathBuf,
    /// JSON config file (partial configs keep defaults for missing fields).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Search provider: auto|brave|duckduckgo|none
    #[arg(long, env = "DUPSCAN_PROVIDER", default_value = "auto")]
    provider: String,
    /// Max in-flight web searches.
    #[arg(long)]
    concurrency: Option<usize>,
    /// Max pages checked against the web.
    #[arg(long)]
    max_external_pages: Option<usize>,
    /// Minimum score (0-100) for a web hit to count as a copy.
    #[arg(long)]
    external_min_score: Option<u8>,
    /// Write the report here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct CompareCmd {
    #[arg(long)]
    a: PathBuf,
    #[arg(long)]
    b: PathBuf,
    /// Tokens per shingle (default from config).
    #[arg(long)]
    shingle_size: Option<usize>,
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

fn init_tracing() {
    // stdout carries JSON; logs go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn has_env(k: &str) -> bool {
    std::env::var(k).ok().is_some_and(|v| !v.trim().is_empty())
}

async fn run_scan(args: ScanCmd) -> Result<()> {
    let kind: ProviderKind = args.provider.parse()?;
    let mut cfg = dupscan_cli::load_config(args.config.as_deref())?;
    if let Some(n) = args.concurrency {
        cfg.external.concurrency = n;
    }
    if let Some(n) = args.max_external_pages {
        cfg.external.max_pages = n;
    }
    if let Some(n) = args.external_min_score {
        cfg.external.min_score = n;
    }
    cfg.validate().context("command line overrides")?;

    let pages = dupscan_cli::load_pages(&args.pages)?;
    tracing::info!(pages = pages.len(), provider = ?kind, "scan starting");

    let provider = if cfg.external.enabled {
        dupscan::provider_from_env(kind, dupscan::http_client()?)?
    } else {
        None
    };
    let report = dupscan::scan_site(&pages, provider.as_deref(), &cfg).await;
    let json = serde_json::to_string_pretty(&report)?;

    match args.out {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("create {}", dir.display()))?;
            }
            std::fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
            println!("{}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn run_compare(args: CompareCmd) -> Result<()> {
    let mut cfg = dupscan_cli::load_config(None)?;
    if let Some(k) = args.shingle_size {
        if k == 0 {
            anyhow::bail!("--shingle-size must be >= 1");
        }
        cfg.shingles.size = k;
    }
    let a = std::fs::read_to_string(&args.a)
        .with_context(|| format!("read {}", args.a.display()))?;
    let b = std::fs::read_to_string(&args.b)
        .with_context(|| format!("read {}", args.b.display()))?;
    let tokenizer = Tokenizer::new(&cfg.tokenizer);
    let r = dupscan::text_similarity(&a, &b, &tokenizer, &cfg.shingles);
    println!("{}", serde_json::to_string(&r)?);
    Ok(())
}

fn run_doctor(args: DoctorCmd) -> Result<()> {
    let t0 = std::time::Instant::now();

    // Env presence (booleans only; never print values).
    let brave = has_env("DUPSCAN_BRAVE_API_KEY") || has_env("BRAVE_SEARCH_API_KEY");
    let auto_provider = if brave { "brave" } else { "duckduckgo" };

    let (cfg, cfg_error) = match dupscan_cli::load_config(None) {
        Ok(c) => (c, None),
        Err(e) => (ScanConfig::default(), Some(format!("{e:#}"))),
    };
    let ok = cfg_error.is_none();

    let payload = serde_json::json!({
        "schema_version": 1,
        "kind": "doctor",
        "ok": ok,
        "name": "dupscan",
        "version": env!("CARGO_PKG_VERSION"),
        "platform": {
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        },
        "elapsed_ms": t0.elapsed().as_millis(),
        "configured": {
            "providers": {
                "brave": brave,
                "brave_endpoint_override": has_env("DUPSCAN_BRAVE_ENDPOINT"),
                "duckduckgo_endpoint_override": has_env("DUPSCAN_DDG_ENDPOINT"),
            },
            "auto_provider": auto_provider,
        },
        "config": cfg,
        "config_error": cfg_error,
    });
    match args.output.to_ascii_lowercase().as_str() {
        "text" => {
            println!("dupscan {} (ok={})", env!("CARGO_PKG_VERSION"), ok);
            println!("providers: brave={brave} auto={auto_provider}");
            if let Some(e) = payload["config_error"].as_str() {
                println!("config: error: {e}");
            } else {
                println!("config: ok");
            }
        }
        _ => println!("{payload}"),
    }
    Ok(())
}

fn run_version(args: VersionCmd) {
    let v = serde_json::json!({
        "schema_version": 1,
        "kind": "version",
        "ok": true,
        "name": "dupscan",
        "version": env!("CARGO_PKG_VERSION"),
    });
    match args.output.to_ascii_lowercase().as_str() {
        "text" => println!("dupscan {}", env!("CARGO_PKG_VERSION")),
        _ => println!("{v}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Scan(args) => run_scan(args).await?,
        Commands::Compare(args) => run_compare(args)?,
        Commands::Doctor(args) => run_doctor(args)?,
        Commands::Version(args) => run_version(args),
    }
    Ok(())
}
