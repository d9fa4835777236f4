//! Opsdesk background daemon
//!
//! Wires the inbox core into a running service: source feeds, the stream
//! merger, and the operator-facing inbox service. Storage adapters push
//! full snapshots into the feeds; without any attached, an optional JSON
//! seed file provides the initial collections so the daemon has something
//! to merge.

mod adapters;
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use opsdesk_core::{
    ContactProfile, ConversationRecord, FilterContext, InMemoryMessageSource, InboxService,
    SourceFeed, StreamMerger, ThreadNormalizer, WorkItemRecord,
};

use adapters::{EchoDelivery, LoggingPersistence};
use config::Config;

#[derive(Parser, Debug)]
#[command(name = "opsdesk-daemon", about = "Opsdesk inbox background daemon")]
struct Cli {
    /// Configuration file path (defaults to the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON file with initial source snapshots
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Override the log filter from the config file
    #[arg(long)]
    log_filter: Option<String>,
}

/// Initial snapshots for the three source collections
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SeedState {
    conversations: Vec<ConversationRecord>,
    work_items: Vec<WorkItemRecord>,
    profiles: Vec<ContactProfile>,
}

impl SeedState {
    fn load(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse seed file {}", path.display()))
    }
}

fn log_queue(service: &InboxService, ctx: &FilterContext) {
    let counts = service.counts(ctx);
    let visible = service.visible(ctx);
    info!(
        threads = service.threads().len(),
        visible = visible.len(),
        bot = counts.bot,
        waiting = counts.waiting,
        chats = counts.chats,
        groups = counts.groups,
        tasks = counts.tasks,
        "inbox updated"
    );
    for thread in &visible {
        debug!(
            id = %thread.id,
            name = %thread.display_name,
            status = %thread.status,
            assignee = %thread.assignee,
            unread = thread.unread_count,
            activity = %thread.last_activity_label,
            "visible thread"
        );
    }
}

// The whole core is event/callback-driven; a single-threaded runtime is all
// the scheduling it needs.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_path()?,
    };
    let config = Config::load(&config_path)?;

    let filter_directive = cli
        .log_filter
        .clone()
        .unwrap_or_else(|| config.log.filter.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directive)),
        )
        .init();

    info!(
        config = %config_path.display(),
        operator = %config.operator.identity,
        channel = %config.delivery.channel,
        "starting opsdesk daemon"
    );

    let conversations: SourceFeed<ConversationRecord> = SourceFeed::new();
    let work_items: SourceFeed<WorkItemRecord> = SourceFeed::new();
    let profiles: SourceFeed<ContactProfile> = SourceFeed::new();

    if let Some(seed_path) = &cli.seed {
        let seed = SeedState::load(seed_path)?;
        info!(
            conversations = seed.conversations.len(),
            work_items = seed.work_items.len(),
            profiles = seed.profiles.len(),
            "seeding source feeds"
        );
        conversations.publish(seed.conversations);
        work_items.publish(seed.work_items);
        profiles.publish(seed.profiles);
    }

    let normalizer = ThreadNormalizer::new(config.inbox.week_start_day());
    let merger = StreamMerger::new(
        normalizer,
        conversations.subscribe(),
        work_items.subscribe(),
        profiles.subscribe(),
    );
    let mut unified = merger.subscribe();
    tokio::spawn(merger.run());

    let service = InboxService::new(
        unified.clone(),
        Arc::new(EchoDelivery),
        Arc::new(LoggingPersistence),
        Arc::new(InMemoryMessageSource::new()),
    );

    let ctx = FilterContext {
        identity: config.operator.identity.clone(),
        is_privileged: config.operator.privileged,
        show_resolved: config.inbox.show_resolved,
        ..Default::default()
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
            changed = unified.changed() => {
                if changed.is_err() {
                    warn!("merger stopped, shutting down");
                    break;
                }
                unified.borrow_and_update();
                log_queue(&service, &ctx);
            }
        }
    }

    Ok(())
}
