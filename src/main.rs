//! # chatsweep CLI
//!
//! Command-line interface for the chatsweep library.

use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use chatsweep::cli::{Cli, Command, FilterArgs, build_spec};
use chatsweep::client::HttpTransport;
use chatsweep::config::AppConfig;
use chatsweep::core::{
    ChannelKind, FetchReport, FetchSpec, Fetcher, OutputConfig, SourceDescriptor, SourceStatus,
    sweep,
};
use chatsweep::format::{ExporterRegistry, OutputFormat};
use chatsweep::parsing::RawGuild;
use chatsweep::progress::stderr_progress;
use chatsweep::{ChatsweepError, Result, Snowflake};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("❌ Error: {}", e);
        process::exit(1);
    }
}

/// Everything a command needs once arguments and environment are resolved.
struct App {
    fetcher: Fetcher<HttpTransport>,
    registry: ExporterRegistry,
    format: OutputFormat,
    output_dir: PathBuf,
    output_config: OutputConfig,
    concurrency: usize,
    search_limit: usize,
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    debug!(?config, "Configuration loaded");

    let format = match cli.format {
        Some(format) => format,
        None => config.default_format()?,
    };
    let registry = ExporterRegistry::with_defaults();
    if !registry.supports(format) {
        return Err(ChatsweepError::invalid_format(
            "output",
            format!("{format} output is not available in this build"),
        ));
    }

    let transport = HttpTransport::new(config.credential()?)?.with_base_url(config.api_base.clone());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            return;
        }
        eprintln!("\n⏹️  Interrupted, stopping...");
        on_interrupt.cancel();
    });

    let app = App {
        fetcher: Fetcher::new(transport).with_cancellation(cancel),
        registry,
        format,
        output_dir: cli.output_dir.clone().unwrap_or_else(|| config.export_dir.clone()),
        output_config: cli.output_config(),
        concurrency: cli.concurrency.unwrap_or(config.sweep_concurrency).max(1),
        search_limit: config.search_limit,
    };

    match cli.command {
        Command::Whoami => whoami(&app).await,
        Command::Servers => list_servers(&app).await,
        Command::Dms => list_dms(&app).await,
        Command::Channels { guild_id } => list_channels(&app, guild_id).await,
        Command::Export {
            channel_id,
            guild,
            filters,
        } => export_channel(&app, channel_id, guild, &filters).await,
        Command::ExportDms { filters } => export_dms(&app, &filters).await,
        Command::Search {
            keyword,
            after,
            before,
            users,
            per_channel_limit,
        } => {
            let spec = build_spec(after.as_deref(), before.as_deref(), &users)?
                .with_keyword(keyword.clone())
                .with_limit(per_channel_limit.unwrap_or(app.search_limit));
            search(&app, &keyword, &spec).await
        }
    }
}

fn print_header(app: &App, title: &str) {
    println!("📦 chatsweep v{}", env!("CARGO_PKG_VERSION"));
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("🧭 Task:    {}", title);
    println!("💾 Output:  {}", app.output_dir.display());
    println!("📄 Format:  {}", app.format);
}

fn print_spec(spec: &FetchSpec) {
    if let Some(from) = spec.date_from {
        println!("📅 After:   {}", from.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(to) = spec.date_to {
        println!("📅 Before:  {}", to.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    for rule in &spec.user_rules {
        println!("👤 User:    {}", rule.label());
    }
    if let Some(keyword) = &spec.keyword {
        println!("🔍 Keyword: {}", keyword);
    }
    if !spec.include_bots {
        println!("🤖 Bots:    excluded");
    }
    if spec.pinned_only {
        println!("📌 Pinned only");
    }
    if let Some(limit) = spec.limit {
        println!("🔢 Limit:   {}", limit);
    }
    println!();
}

async fn whoami(app: &App) -> Result<()> {
    let user = app.fetcher.transport().current_user().await?;
    println!("👤 Logged in as {} ({})", user.tag(), user.id);
    Ok(())
}

async fn sorted_guilds(app: &App) -> Result<Vec<RawGuild>> {
    let mut guilds = app.fetcher.transport().guilds().await?;
    guilds.sort_by_key(|g| g.name.as_deref().unwrap_or("").to_lowercase());
    Ok(guilds)
}

async fn list_servers(app: &App) -> Result<()> {
    let guilds = sorted_guilds(app).await?;
    println!("🏠 {} servers", guilds.len());
    for guild in &guilds {
        println!("   {:>20}  {}", guild.id, guild.name.as_deref().unwrap_or("?"));
    }
    Ok(())
}

async fn list_dms(app: &App) -> Result<()> {
    let sources = app.fetcher.transport().dm_sources().await?;
    println!("💬 {} conversations", sources.len());
    for source in &sources {
        println!("   {:>20}  {}", source.channel_id, source.label());
    }
    Ok(())
}

async fn find_guild(app: &App, guild_id: Snowflake) -> Result<RawGuild> {
    let guild = sorted_guilds(app)
        .await?
        .into_iter()
        .find(|g| g.id == guild_id)
        .unwrap_or(RawGuild {
            id: guild_id,
            name: None,
        });
    Ok(guild)
}

async fn list_channels(app: &App, guild_id: Snowflake) -> Result<()> {
    let guild = find_guild(app, guild_id).await?;
    let sources = app.fetcher.transport().text_sources(&guild).await?;
    println!(
        "📚 {} text channels in {}",
        sources.len(),
        guild.name.as_deref().unwrap_or("server")
    );
    for source in &sources {
        println!("   {:>20}  #{}", source.channel_id, source.channel_name);
    }
    Ok(())
}

/// Names a channel from discovery, falling back to its bare id.
///
/// Discovery failures other than a rejected token only cost the nice name.
async fn resolve_source(
    app: &App,
    channel_id: Snowflake,
    guild_id: Option<Snowflake>,
) -> Result<SourceDescriptor> {
    let transport = app.fetcher.transport();
    let (candidates, guild) = match guild_id {
        Some(guild_id) => {
            let guild = find_guild(app, guild_id).await?;
            (transport.text_sources(&guild).await, Some(guild))
        }
        None => (transport.dm_sources().await, None),
    };

    let found = match candidates {
        Ok(sources) => sources.into_iter().find(|s| s.channel_id == channel_id),
        Err(err) if err.is_fatal() => return Err(err),
        Err(err) => {
            debug!(channel = %channel_id, error = %err, "Channel lookup failed");
            None
        }
    };

    Ok(found.unwrap_or_else(|| {
        let source = SourceDescriptor::new(channel_id, channel_id.to_string(), ChannelKind::Text);
        match guild {
            Some(g) => {
                let name = g.name.unwrap_or_else(|| g.id.to_string());
                source.with_guild(g.id, name)
            }
            None => source,
        }
    }))
}

fn write_export(app: &App, report: &FetchReport) -> Result<PathBuf> {
    app.registry.export(
        app.format,
        &report.messages,
        &report.metadata,
        &app.output_config,
        &app.output_dir,
    )
}

async fn export_channel(
    app: &App,
    channel_id: Snowflake,
    guild_id: Option<Snowflake>,
    filters: &FilterArgs,
) -> Result<()> {
    let total_start = Instant::now();
    let spec = filters.to_spec()?;
    let source = resolve_source(app, channel_id, guild_id).await?;

    print_header(app, &format!("Export {}", source.label()));
    print_spec(&spec);

    println!("⏳ Fetching messages...");
    let progress = stderr_progress();
    let report = app.fetcher.fetch(&source, &spec, Some(&progress)).await?;
    let stats = &report.stats;
    println!(
        "   Scanned {} messages in {} pages, kept {} ({})",
        stats.scanned, stats.pages, stats.accepted, stats.stop
    );
    if stats.skipped_records > 0 {
        println!("   ⚠️  Skipped {} unreadable records", stats.skipped_records);
    }

    if report.is_empty() {
        println!();
        println!("🤷 No messages matched.");
        return Ok(());
    }

    let path = write_export(app, &report)?;
    println!();
    println!("✅ Done! Output saved to {}", path.display());
    println!("   Total time:  {:.2}s", total_start.elapsed().as_secs_f64());
    Ok(())
}

async fn export_dms(app: &App, filters: &FilterArgs) -> Result<()> {
    let spec = filters.to_spec()?;
    let sources = app.fetcher.transport().dm_sources().await?;

    print_header(app, "Export all DMs");
    print_spec(&spec);

    if sources.is_empty() {
        println!("🤷 No DM conversations found.");
        return Ok(());
    }

    println!("⏳ Exporting {} DM conversations...", sources.len());
    let report = sweep(&app.fetcher, sources, &spec, app.concurrency).await?;

    let mut written = 0;
    for outcome in &report.outcomes {
        let name = outcome.source.label();
        match &outcome.status {
            SourceStatus::Fetched(fetched) if fetched.is_empty() => {
                println!("   ⏭️  Skipped {} (no messages match)", name);
            }
            SourceStatus::Fetched(fetched) => match write_export(app, fetched) {
                Ok(path) => {
                    written += 1;
                    println!("   ✓ {}: {} messages → {}", name, fetched.messages.len(), path.display());
                }
                Err(err) => println!("   ✗ {}: {}", name, err),
            },
            SourceStatus::Failed(err) if err.is_permission_denied() => {
                println!("   ✗ {}: Access denied", name);
            }
            SourceStatus::Failed(err) => println!("   ✗ {}: {}", name, err),
        }
    }

    println!();
    println!("✅ {} exports saved to {}", written, app.output_dir.display());
    Ok(())
}

async fn search(app: &App, keyword: &str, spec: &FetchSpec) -> Result<()> {
    print_header(app, &format!("Search for '{keyword}'"));
    print_spec(spec);

    let guilds = sorted_guilds(app).await?;
    println!("⏳ Searching {} servers...", guilds.len());

    let mut sources = Vec::new();
    for guild in &guilds {
        match app.fetcher.transport().text_sources(guild).await {
            Ok(found) => sources.extend(found),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) if err.is_permission_denied() => {}
            Err(err) => println!("   ✗ {}: {}", guild.name.as_deref().unwrap_or("?"), err),
        }
    }

    let report = sweep(&app.fetcher, sources, spec, app.concurrency).await?;
    for (source, fetched) in report.fetched() {
        if !fetched.is_empty() {
            println!("   ✓ {}: {} matches", source.label(), fetched.messages.len());
        }
    }
    for (source, err) in report.failed() {
        if !err.is_permission_denied() {
            println!("   ✗ {}: {}", source.label(), err);
        }
    }

    let (messages, metadata) = report.merged(keyword);
    if messages.is_empty() {
        println!();
        println!("🤷 No messages found matching your search.");
        return Ok(());
    }

    println!();
    println!("🔍 Found {} messages total", messages.len());
    let path = app
        .registry
        .export(app.format, &messages, &metadata, &app.output_config, &app.output_dir)?;
    println!("✅ Exported to {}", path.display());
    Ok(())
}
