use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use newsbadge_core::{Classification, SettingsStore};
use newsbadge_local::classifier::DEFAULT_API_URL;
use newsbadge_local::dom::Document;
use newsbadge_local::{
    site, FsSettingsStore, HttpClassifier, MemoryStore, PageAgent, PageFetcher, ScanReport,
    ScheduleConfig, Scanner, SiteProfile,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "newsbadge")]
#[command(about = "Headline sentiment badges for financial news pages", long_about = None)]
struct Cli {
    /// Sentiment API base URL.
    #[arg(long, global = true, env = "NEWSBADGE_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Annotate a page once and print a JSON report.
    Scan(ScanCmd),
    /// Keep a page annotated and answer control messages as JSON lines on stdio.
    Agent(AgentCmd),
    /// Classify free text through the sentiment API.
    Analyze(AnalyzeCmd),
    /// Check that the sentiment API is reachable and has a model loaded (json).
    Health,
    /// Print version info.
    Version(VersionCmd),
}

#[derive(Args, Debug)]
struct PageSource {
    /// Fetch the page over HTTP(S).
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    url: Option<String>,
    /// Read the page from a local HTML file.
    #[arg(long)]
    file: Option<PathBuf>,
    /// URL used for site detection when reading from a file.
    #[arg(long, requires = "file")]
    page_url: Option<String>,
}

#[derive(Args, Debug)]
struct StoreArgs {
    /// Settings file (defaults to `<config dir>/newsbadge/settings.json`).
    #[arg(long, env = "NEWSBADGE_SETTINGS")]
    settings: Option<PathBuf>,
    /// Keep settings and stats in memory only.
    #[arg(long, default_value_t = false)]
    ephemeral: bool,
}

#[derive(Args, Debug)]
struct ScanCmd {
    #[command(flatten)]
    source: PageSource,
    #[command(flatten)]
    store: StoreArgs,
    /// Write the annotated HTML here.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Run one pass immediately instead of the warm-up and retry burst.
    #[arg(long, default_value_t = false)]
    no_wait: bool,
}

#[derive(Args, Debug)]
struct AgentCmd {
    #[command(flatten)]
    source: PageSource,
    #[command(flatten)]
    store: StoreArgs,
    /// Write the annotated HTML here when stdin closes.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct AnalyzeCmd {
    /// Text to classify.
    #[arg(conflicts_with = "batch", required_unless_present = "batch")]
    text: Option<String>,
    /// File with one text per line (uses the batch endpoint).
    #[arg(long)]
    batch: Option<PathBuf>,
    /// Output format: text|json
    #[arg(long = "output", alias = "format", default_value = "text")]
    output: String,
}

#[derive(Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

/// Optional env-file loader (opt-in via `NEWSBADGE_ENV_FILE`). Never overrides variables
/// already set in the process environment and never logs values.
fn load_env_file() {
    let Ok(p) = std::env::var("NEWSBADGE_ENV_FILE") else {
        return;
    };
    let p = p.trim();
    if p.is_empty() {
        return;
    }
    let Ok(txt) = std::fs::read_to_string(p) else {
        return;
    };
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        let v = v.trim().trim_matches('"');
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v);
        }
    }
}

/// Logs go to stderr; stdout carries JSON reports and the message protocol.
fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}

fn settings_store(args: &StoreArgs) -> Arc<dyn SettingsStore> {
    if args.ephemeral {
        return Arc::new(MemoryStore::new());
    }
    let path = args.settings.clone().or_else(|| {
        dirs::config_dir().map(|d| d.join("newsbadge").join("settings.json"))
    });
    match path {
        Some(p) => {
            tracing::debug!(path = %p.display(), "settings file");
            Arc::new(FsSettingsStore::new(p))
        }
        None => {
            tracing::warn!("no config directory; settings will not persist");
            Arc::new(MemoryStore::new())
        }
    }
}

struct LoadedPage {
    url: Option<String>,
    profile: SiteProfile,
    doc: Document,
}

async fn load_page(src: &PageSource) -> Result<LoadedPage> {
    if let Some(url) = &src.url {
        let fetched = PageFetcher::new()?
            .fetch(url)
            .await
            .with_context(|| format!("fetch {url}"))?;
        let profile = site::classify_url(&fetched.final_url);
        return Ok(LoadedPage {
            url: Some(fetched.final_url),
            profile,
            doc: Document::parse(&fetched.html),
        });
    }
    let file = src
        .file
        .as_ref()
        .context("either --url or --file is required")?;
    let html = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("read {}", file.display()))?;
    let profile = src
        .page_url
        .as_deref()
        .map(site::classify_url)
        .unwrap_or(SiteProfile::Generic);
    Ok(LoadedPage {
        url: src.page_url.clone(),
        profile,
        doc: Document::parse(&html),
    })
}

async fn build_scanner(
    api_url: &str,
    src: &PageSource,
    store: &StoreArgs,
) -> Result<(Arc<Scanner>, Option<String>)> {
    let page = load_page(src).await?;
    tracing::info!(
        profile = %page.profile,
        url = page.url.as_deref().unwrap_or("-"),
        "page loaded"
    );
    let classifier = Arc::new(HttpClassifier::new(api_url)?);
    let scanner = Scanner::load(
        page.doc,
        page.profile,
        classifier,
        settings_store(store),
        ScheduleConfig::default(),
    )
    .await;
    Ok((Arc::new(scanner), page.url))
}

/// Warm-up then the profile's retry burst, or a single pass with `no_wait`.
async fn run_burst(scanner: &Scanner, no_wait: bool) -> Vec<ScanReport> {
    if no_wait {
        return vec![scanner.scan_once().await];
    }
    let cfg = scanner.schedule().clone();
    let (attempts, gap) = cfg.burst(scanner.profile());
    tokio::time::sleep(cfg.warmup).await;
    let mut reports = Vec::new();
    for i in 0..attempts {
        if i > 0 {
            tokio::time::sleep(gap).await;
        }
        reports.push(scanner.scan_once().await);
    }
    reports
}

async fn write_out(scanner: &Scanner, out: Option<&PathBuf>) -> Result<()> {
    if let Some(path) = out {
        tokio::fs::write(path, scanner.render_html())
            .await
            .with_context(|| format!("write {}", path.display()))?;
    }
    Ok(())
}

fn print_classification(r: &Classification) {
    println!("Sentiment: {}", r.sentiment);
    println!("Confidence: {:.2}", r.confidence);
    if let Some(probs) = &r.probabilities {
        println!("Probabilities:");
        for (label, p) in probs {
            println!("  {label}: {:.2}", p);
        }
    }
    if let Some(e) = &r.explanation {
        println!("Explanation: {e}");
    }
    if !r.stocks.is_empty() {
        println!("Stocks:");
        for s in &r.stocks {
            let mut line = format!("  {} ({})", s.symbol, s.name);
            if let Some(x) = &s.exchange {
                line.push_str(&format!(" {x}"));
            }
            if let Some(sector) = &s.sector {
                line.push_str(&format!(" [{sector}]"));
            }
            println!("{line}");
        }
    }
    if let Some(b) = &r.buy_recommendation {
        if b.recommended {
            println!(
                "Recommendation: {}",
                b.reason.as_deref().unwrap_or("consider buying")
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_file();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan(args) => {
            let (scanner, url) = build_scanner(&cli.api_url, &args.source, &args.store).await?;
            let reports = run_burst(&scanner, args.no_wait).await;
            write_out(&scanner, args.out.as_ref()).await?;
            let annotated = reports.iter().map(|r| r.annotated).sum::<usize>();
            let failed = reports.iter().map(|r| r.failed).sum::<usize>();
            let candidates = reports.iter().map(|r| r.candidates).max().unwrap_or(0);
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "scan",
                "ok": true,
                "url": url,
                "profile": scanner.profile(),
                "scans": reports.len(),
                "candidates": candidates,
                "annotated": annotated,
                "failed": failed,
                "badges": scanner.with_page(|p| p.badge_count()),
                "stats": scanner.stats(),
                "out": args.out.as_ref().map(|p| p.display().to_string()),
            });
            println!("{v}");
        }
        Commands::Agent(args) => {
            let (scanner, _) = build_scanner(&cli.api_url, &args.source, &args.store).await?;
            let agent = PageAgent::new(scanner.clone());
            agent.start();
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            agent.serve_lines(stdin, tokio::io::stdout()).await?;
            agent.scheduler().stop();
            write_out(&scanner, args.out.as_ref()).await?;
        }
        Commands::Analyze(args) => {
            let classifier = HttpClassifier::new(&cli.api_url)?;
            let json = args.output.eq_ignore_ascii_case("json");
            if let Some(path) = &args.batch {
                let txt = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("read {}", path.display()))?;
                let texts: Vec<String> = txt
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect();
                anyhow::ensure!(!texts.is_empty(), "batch file has no texts");
                let items = classifier.classify_batch(&texts).await?;
                if json {
                    let results: Vec<serde_json::Value> = items
                        .iter()
                        .map(|i| serde_json::json!({"text": i.text, "result": i.result}))
                        .collect();
                    println!(
                        "{}",
                        serde_json::json!({"count": results.len(), "results": results})
                    );
                } else {
                    for (n, item) in items.iter().enumerate() {
                        if n > 0 {
                            println!();
                        }
                        println!("Text: {}", item.text);
                        print_classification(&item.result);
                    }
                }
            } else {
                let text = args.text.as_deref().unwrap_or("").trim();
                anyhow::ensure!(!text.is_empty(), "text is empty");
                use newsbadge_core::Classifier as _;
                let r = classifier.classify(text).await?;
                if json {
                    println!("{}", serde_json::to_string(&r)?);
                } else {
                    print_classification(&r);
                }
            }
        }
        Commands::Health => {
            let classifier = HttpClassifier::new(&cli.api_url)?;
            let v = match classifier.health().await {
                Ok(h) => serde_json::json!({
                    "connected": true,
                    "model_loaded": h.model_loaded,
                    "status": h.status,
                }),
                Err(e) => serde_json::json!({
                    "connected": false,
                    "model_loaded": false,
                    "error": e.to_string(),
                }),
            };
            println!("{v}");
        }
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "newsbadge",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("newsbadge {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{}", v),
            }
        }
    }

    Ok(())
}
