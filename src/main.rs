use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use media_source_adapters::{
    build_source, ChannelRecord, CollectionRecord, Config, ConfigOverrides, ContentItem,
    MediaRecord, MediaSource, MissingTimestamp, Page, PageRequest, PagedQuery, Pager,
    SearchKind, SearchQuery, SourceContext, SourceKind,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "media-sources")]
#[command(about = "Browse Jamendo, Archive.org, Pluto TV and Suno through one record schema", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true, help = "Configuration file (TOML)")]
    config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "info", help = "Log level when RUST_LOG is unset")]
    log_level: String,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    json_logs: bool,

    #[arg(long, global = true, help = "HTTP request timeout in seconds")]
    timeout: Option<u64>,

    #[arg(long, global = true, help = "Attempts per upstream call, including the first")]
    max_attempts: Option<u32>,

    #[arg(long, global = true, help = "Timestamp for records without a date (now|epoch)")]
    missing_timestamp: Option<MissingTimestamp>,

    #[arg(long, global = true, help = "Pluto TV bearer token")]
    pluto_token: Option<String>,

    #[arg(long, global = true, help = "Pluto TV region, e.g. us")]
    region: Option<String>,

    #[arg(
        long,
        global = true,
        help = "File holding the saved session state; read before and written after the call"
    )]
    state: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Print the effective configuration as TOML")]
    Config,

    #[command(about = "Print the JSON Schema of the canonical records")]
    Schema,

    #[command(about = "List the available sources")]
    Sources,

    #[command(about = "Jamendo music catalog")]
    Jamendo(SourceArgs),

    #[command(about = "Archive.org video collections")]
    Archive(SourceArgs),

    #[command(about = "Pluto TV live channels and on-demand content")]
    Pluto(SourceArgs),

    #[command(about = "Suno AI-generated music")]
    Suno(SourceArgs),
}

#[derive(Args)]
struct SourceArgs {
    #[command(subcommand)]
    operation: Operation,
}

#[derive(Subcommand)]
enum Operation {
    #[command(about = "Home feed")]
    Home {
        #[arg(long, default_value_t = 1, help = "Number of pages to load")]
        pages: u32,
    },

    #[command(about = "Search for content")]
    Search {
        query: String,
        #[arg(long, default_value = "all", help = "all, media, channels or playlists")]
        kind: SearchKind,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 1, help = "Number of pages to load")]
        pages: u32,
    },

    #[command(about = "Search for channels, artists or users")]
    Channels {
        query: String,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long)]
        limit: Option<u32>,
    },

    #[command(about = "Search for playlists or albums")]
    Playlists {
        query: String,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long)]
        limit: Option<u32>,
    },

    #[command(about = "Channel details and its media")]
    Channel {
        id: String,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    #[command(about = "Playlist details and its media")]
    Playlist {
        id: String,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    #[command(about = "Resolve a content URL into a playable record")]
    Details { url: String },

    #[command(about = "Live streams only")]
    Live,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("invalid log level")?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_logs)?;

    let overrides = ConfigOverrides {
        timeout_secs: cli.timeout,
        max_attempts: cli.max_attempts,
        missing_timestamp: cli.missing_timestamp,
        pluto_auth_token: cli.pluto_token.clone(),
        pluto_region: cli.region.clone(),
    };
    let config = Config::load(cli.config.as_deref())
        .context("failed to load configuration")?
        .with_overrides(&overrides);
    config.validate().context("invalid configuration")?;

    let (kind, args) = match cli.command {
        Commands::Config => {
            print!("{}", config.to_toml()?);
            return Ok(());
        }
        Commands::Schema => return print_json(&record_schemas()),
        Commands::Sources => {
            for kind in SourceKind::ALL {
                let source = build_source(kind, &config)?;
                println!("{:<8} {}", kind, source.description());
            }
            return Ok(());
        }
        Commands::Jamendo(args) => (SourceKind::Jamendo, args),
        Commands::Archive(args) => (SourceKind::Archive, args),
        Commands::Pluto(args) => (SourceKind::Pluto, args),
        Commands::Suno(args) => (SourceKind::Suno, args),
    };

    let source = build_source(kind, &config)?;
    let mut ctx = load_state(cli.state.as_ref())?;
    info!("Running {} against {}", operation_name(&args.operation), source.name());

    run_operation(source, args.operation, &mut ctx).await?;
    save_state(cli.state.as_ref(), &ctx)
}

fn operation_name(operation: &Operation) -> &'static str {
    match operation {
        Operation::Home { .. } => "home",
        Operation::Search { .. } => "search",
        Operation::Channels { .. } => "channels",
        Operation::Playlists { .. } => "playlists",
        Operation::Channel { .. } => "channel",
        Operation::Playlist { .. } => "playlist",
        Operation::Details { .. } => "details",
        Operation::Live => "live",
    }
}

async fn run_operation(
    source: Arc<dyn MediaSource>,
    operation: Operation,
    ctx: &mut SourceContext,
) -> Result<()> {
    match operation {
        Operation::Home { pages } => {
            let pages = load_pages(Pager::new(source, PagedQuery::Home), pages, ctx).await;
            print_json(&pages)
        }
        Operation::Search {
            query,
            kind,
            offset,
            limit,
            pages,
        } => {
            let query = SearchQuery {
                text: query,
                kind,
                offset,
                limit,
            };
            let pages = load_pages(Pager::new(source, PagedQuery::Search(query)), pages, ctx).await;
            print_json(&pages)
        }
        Operation::Channels {
            query,
            offset,
            limit,
        } => {
            let query = SearchQuery {
                text: query,
                kind: SearchKind::Channels,
                offset,
                limit,
            };
            let page: Page<ChannelRecord> = source.search_channels(&query, ctx).await;
            print_json(&page)
        }
        Operation::Playlists {
            query,
            offset,
            limit,
        } => {
            let query = SearchQuery {
                text: query,
                kind: SearchKind::Playlists,
                offset,
                limit,
            };
            let page: Page<CollectionRecord> = source.search_playlists(&query, ctx).await;
            print_json(&page)
        }
        Operation::Channel { id, offset } => {
            let details = source.channel(&id, PageRequest::at(offset), ctx).await?;
            print_json(&details)
        }
        Operation::Playlist { id, offset } => {
            let details = source.playlist(&id, PageRequest::at(offset), ctx).await?;
            print_json(&details)
        }
        Operation::Details { url } => {
            let record: MediaRecord = source.content_details(&url, ctx).await?;
            print_json(&record)
        }
        Operation::Live => {
            let page = source.live_streams(PageRequest::first(), ctx).await;
            print_json(&page)
        }
    }
}

/// First page plus up to `count - 1` follow-ups while the source reports more
async fn load_pages(mut pager: Pager, count: u32, ctx: &mut SourceContext) -> Vec<Page<ContentItem>> {
    let mut pages = vec![pager.results(ctx).await];
    for _ in 1..count {
        if !pager.has_more() {
            debug!("No more pages after offset {}", pager.offset());
            break;
        }
        pages.push(pager.next_page(ctx).await);
    }
    pages
}

fn load_state(path: Option<&PathBuf>) -> Result<SourceContext> {
    let Some(path) = path else {
        return Ok(SourceContext::new());
    };
    let saved = match std::fs::read_to_string(path) {
        Ok(saved) => Some(saved),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
    };
    Ok(SourceContext::restore(saved.as_deref())?)
}

fn save_state(path: Option<&PathBuf>, ctx: &SourceContext) -> Result<()> {
    if let Some(path) = path {
        std::fs::write(path, ctx.save()?)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordSchemas {
    media_record: schemars::Schema,
    channel_record: schemars::Schema,
    collection_record: schemars::Schema,
    page: schemars::Schema,
}

fn record_schemas() -> RecordSchemas {
    RecordSchemas {
        media_record: schemars::schema_for!(MediaRecord),
        channel_record: schemars::schema_for!(ChannelRecord),
        collection_record: schemars::schema_for!(CollectionRecord),
        page: schemars::schema_for!(Page<ContentItem>),
    }
}
