//! Command implementations for the waymark binary.
//!
//! Handles:
//! - candidates: Resolve and print the searchable collections
//! - search: Run one fetch pass over a catalog file, then query it

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use waymark_index::{
    Catalog, CatalogStore, CollectionSwitcher, NavigationNotice, Notifier, SearchHit,
    SearchSession, SelectionSink,
};
use waymark_types::{Collection, Place, Settings, User};

use crate::cli::ViewerArgs;

/// Collaborators for a non-interactive run: everything is logged.
#[derive(Debug, Default)]
pub struct LoggingCollaborators;

impl CollectionSwitcher for LoggingCollaborators {
    fn set_active_collection(&self, collection: &Collection) {
        info!(collection_id = %collection.id, "Switch collection requested");
    }
}

impl Notifier for LoggingCollaborators {
    fn notify(&self, notice: NavigationNotice) {
        info!(
            visibility = %notice.visibility,
            name = %notice.name,
            owner = %notice.owner,
            "Navigation notice"
        );
    }
}

impl SelectionSink for LoggingCollaborators {
    fn on_resolved(&self, place: &Place, collection: &Collection) {
        info!(place_id = %place.id, collection_id = %collection.id, "Selection resolved");
    }
}

/// Load configuration and apply CLI overrides (highest precedence).
pub fn load_settings(
    config_path: Option<&str>,
    log_level_override: Option<&str>,
    limit_override: Option<usize>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;

    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }
    if let Some(limit) = limit_override {
        settings.index.result_limit = Some(limit);
    }
    Ok(settings)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the config.
pub fn init_logging(settings: &Settings) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Build a session for the viewer and run its first fetch pass to completion.
pub async fn open_session(
    settings: &Settings,
    viewer: &ViewerArgs,
) -> Result<SearchSession<CatalogStore>> {
    let catalog = Catalog::load(&viewer.catalog)
        .await
        .with_context(|| format!("Failed to load catalog {}", viewer.catalog))?;
    info!(
        catalog = %viewer.catalog,
        collections = catalog.collections.len(),
        user = %viewer.user,
        role = %viewer.role,
        "Opening search session"
    );

    let store = Arc::new(CatalogStore::new(catalog.clone()).with_viewer(viewer.user.clone()));
    let collaborators = Arc::new(LoggingCollaborators);
    let mut session = SearchSession::new(
        store,
        settings.index.clone(),
        collaborators.clone(),
        collaborators.clone(),
        collaborators,
    )
    .context("Invalid index settings")?;

    session.set_catalogs(
        catalog.collections.clone(),
        catalog.own_collections(&viewer.user),
        catalog.joined_collections(&viewer.user),
    );
    if let Some(active) = &viewer.active {
        session.set_active_collection(Some(active.clone()));
        let live = catalog.places.get(active).cloned().unwrap_or_default();
        session.update_active_places(active, live);
    }

    if let Some(pass) = session.set_viewer(Some(User::new(viewer.user.clone())), viewer.role) {
        let report = pass.await.context("Fetch pass panicked")?;
        info!(
            fetched = report.fetched.len(),
            failed = report.failed.len(),
            orphans_dropped = report.orphans_dropped,
            "Catalog fetched"
        );
    }

    Ok(session)
}

/// Print the ordered candidate list.
pub async fn run_candidates(settings: &Settings, viewer: &ViewerArgs) -> Result<()> {
    let session = open_session(settings, viewer).await?;
    print!("{}", format_candidates(session.candidates()));
    Ok(())
}

/// Search and print ranked hits.
pub async fn run_search(
    settings: &Settings,
    viewer: &ViewerArgs,
    query: &str,
    json: bool,
) -> Result<()> {
    let session = open_session(settings, viewer).await?;
    let hits = session.search(query);

    if json {
        let out = serde_json::to_string_pretty(&hits_to_json(&hits))
            .context("Failed to serialize results")?;
        println!("{}", out);
    } else if hits.is_empty() {
        println!("No places found");
    } else {
        print!("{}", format_hits(&hits));
    }
    Ok(())
}

/// One line per candidate: rank, id, visibility, name.
pub fn format_candidates(candidates: &[Collection]) -> String {
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let default = if c.is_default { " (default)" } else { "" };
            format!("{:>3}. {} [{}] {}{}\n", i + 1, c.id, c.visibility, c.name, default)
        })
        .collect()
}

pub fn format_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|h| {
            let address = if h.place.address.is_empty() {
                String::new()
            } else {
                format!(" - {}", h.place.address)
            };
            format!("{} / {}{}\n", h.collection.name, h.place.name, address)
        })
        .collect()
}

pub fn hits_to_json(hits: &[SearchHit]) -> serde_json::Value {
    serde_json::Value::Array(
        hits.iter()
            .map(|h| {
                serde_json::json!({
                    "collection_id": h.collection.id,
                    "collection": h.collection.name,
                    "place_id": h.place.id,
                    "name": h.place.name,
                    "address": h.place.address,
                    "match": h.match_kind,
                })
            })
            .collect(),
    )
}
