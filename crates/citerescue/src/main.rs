use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use citerescue_core::accessdate::{extract_accessdate, find_raw_accessdate};
use citerescue_core::aliases::TemplateAliasResolver;
use citerescue_core::config::{DEFAULT_CONFIG_PATH, RescueConfig, load_config};
use citerescue_core::diff::unified_diff;
use citerescue_core::mediawiki::{MediaWikiClient, MediaWikiClientConfig, WikiMetadataApi};
use citerescue_core::rewrite::{CitationRewriter, ReferenceOutcome, RewriteOutcome};
use citerescue_core::wayback::{
    ArchiveLookupClient, SnapshotLookup, WaybackClient, WaybackClientConfig,
};
use clap::{Args, CommandFactory, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "citerescue",
    version,
    about = "Attach Wayback Machine snapshots to dead citation links in wikitext"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Rewrite a wikitext document, adding archive links to dead citations
    Rewrite(RewriteArgs),
    /// List every name a template is reachable under
    Aliases(AliasesArgs),
    /// Show the access date recovered from reference text
    Accessdate(AccessdateArgs),
    /// Query the archive for the closest acceptable snapshot of a URL
    Lookup(LookupArgs),
}

#[derive(Debug, Args)]
struct RewriteArgs {
    #[arg(value_name = "INPUT", help = "Wikitext file, or - for stdin")]
    input: String,
    #[arg(long, value_name = "PATH", help = "Write the rewritten document here")]
    output: Option<PathBuf>,
    #[arg(long, help = "Print a unified diff instead of the document")]
    diff: bool,
    #[arg(long, help = "Print the per-reference report as JSON")]
    json: bool,
}

#[derive(Debug, Args)]
struct AliasesArgs {
    name: String,
}

#[derive(Debug, Args)]
struct AccessdateArgs {
    text: String,
}

#[derive(Debug, Args)]
struct LookupArgs {
    url: String,
    #[arg(long, value_name = "TEXT", help = "Reference text to take the access date from")]
    accessdate: Option<String>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config_path = cli.config.as_deref();

    match cli.command {
        Some(Commands::Rewrite(args)) => run_rewrite(&load_runtime_config(config_path)?, args),
        Some(Commands::Aliases(args)) => run_aliases(&load_runtime_config(config_path)?, args),
        Some(Commands::Accessdate(args)) => run_accessdate(args),
        Some(Commands::Lookup(args)) => run_lookup(&load_runtime_config(config_path)?, args),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_runtime_config(path: Option<&Path>) -> Result<RescueConfig> {
    dotenvy::dotenv().ok();
    let path = path.unwrap_or(Path::new(DEFAULT_CONFIG_PATH));
    let config = load_config(path)?;
    info!(config = %normalize_path(path), api_url = %config.api_url(), "configuration loaded");
    Ok(config)
}

fn build_resolver(config: &RescueConfig) -> Result<TemplateAliasResolver<MediaWikiClient>> {
    let client = MediaWikiClient::new(MediaWikiClientConfig::from_config(config))?;
    Ok(TemplateAliasResolver::new(client))
}

fn build_lookup(config: &RescueConfig) -> Result<ArchiveLookupClient<WaybackClient>> {
    let client = WaybackClient::new(WaybackClientConfig::from_config(config))?;
    Ok(ArchiveLookupClient::new(client, config.max_window_secs()))
}

fn run_rewrite(config: &RescueConfig, args: RewriteArgs) -> Result<()> {
    let original = read_input(&args.input)?;
    let mut rewriter = CitationRewriter::new(
        build_resolver(config)?,
        build_lookup(config)?,
        config.citation_template(),
        config.dead_link_template(),
    );
    let outcome = rewriter.rewrite(&original)?;

    if let Some(path) = &args.output {
        fs::write(path, &outcome.text)
            .with_context(|| format!("failed to write {}", normalize_path(path)))?;
    }

    let mut stdout = io::stdout().lock();
    if args.json {
        writeln!(stdout, "{}", serde_json::to_string_pretty(&outcome)?)?;
    } else if args.diff {
        let label = if args.input == "-" {
            "stdin"
        } else {
            args.input.as_str()
        };
        write!(stdout, "{}", unified_diff(label, &original, &outcome.text))?;
    } else if args.output.is_none() {
        write!(stdout, "{}", outcome.text)?;
    }

    log_summary(&outcome, &rewriter);
    Ok(())
}

fn log_summary(
    outcome: &RewriteOutcome,
    rewriter: &CitationRewriter<MediaWikiClient, ArchiveLookupClient<WaybackClient>>,
) {
    let skipped = outcome
        .references
        .iter()
        .filter(|report| !matches!(report.outcome, ReferenceOutcome::Archived { .. }))
        .count();
    info!(
        references = outcome.references.len(),
        archived = outcome.archived_count(),
        skipped,
        wiki_requests = rewriter.resolver().api().request_count(),
        archive_requests = rewriter.lookup().api().request_count(),
        "document processed"
    );
}

fn run_aliases(config: &RescueConfig, args: AliasesArgs) -> Result<()> {
    let name = args.name.trim();
    if name.is_empty() {
        bail!("template name must not be empty");
    }
    let mut resolver = build_resolver(config)?;
    for alias in resolver.resolve_aliases(name)? {
        println!("{alias}");
    }
    Ok(())
}

fn run_accessdate(args: AccessdateArgs) -> Result<()> {
    let Some(raw) = find_raw_accessdate(&args.text) else {
        bail!("no access date found in text");
    };
    println!("raw: {raw}");
    match extract_accessdate(&args.text) {
        Some(date) => println!("date: {}", date.format("%Y-%m-%d")),
        None => println!("date: <unparseable>"),
    }
    Ok(())
}

fn run_lookup(config: &RescueConfig, args: LookupArgs) -> Result<()> {
    let reference = args.accessdate.as_deref().and_then(extract_accessdate);
    let mut lookup = build_lookup(config)?;
    let Some(snapshot) = lookup.lookup(&args.url, reference) else {
        bail!("no acceptable snapshot for {}", args.url.trim());
    };

    println!("url: {}", snapshot.url);
    println!("timestamp: {}", snapshot.timestamp);
    println!(
        "archivedate: {}",
        snapshot.archive_date().as_deref().unwrap_or("<unknown>")
    );
    Ok(())
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read document from stdin")?;
        return Ok(buffer);
    }
    let path = Path::new(input);
    fs::read_to_string(path).with_context(|| format!("failed to read {}", normalize_path(path)))
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
