use axum::Router;
use clap::Parser;
use plagiarism_engine::api::{self, AppState};
use plagiarism_engine::auth::AuthConfig;
use plagiarism_engine::config::{BLOCKING_THRESHOLD, DEFAULT_FETCH_TIMEOUT_SECS, REPORTING_THRESHOLD};
use plagiarism_engine::extraction::Extractor;
use plagiarism_engine::persistence::{self, PersistenceManager, SNAPSHOT_FILE};
use plagiarism_engine::plagiarism::PolicyConfig;
use plagiarism_engine::store::SubmissionStore;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn, Level};

#[derive(Parser, Debug)]
#[command(name = "plagiarism-engine")]
#[command(about = "Submission plagiarism scoring service")]
struct Args {
    /// Server port
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Data directory for persistence
    #[arg(short, long, default_value = "./data")]
    data_dir: String,

    /// Snapshot interval in seconds
    #[arg(short, long, default_value = "60")]
    snapshot_interval: u64,

    /// Load a static snapshot directory (read-only mode, disables persistence)
    #[arg(long)]
    load_static: Option<String>,

    /// Minimum pairwise score recorded as a match
    #[arg(long, default_value_t = REPORTING_THRESHOLD)]
    reporting_threshold: f64,

    /// Scores strictly above this block grading
    #[arg(long, default_value_t = BLOCKING_THRESHOLD)]
    blocking_threshold: f64,

    /// Directory that non-http file references are resolved in (disabled when unset)
    #[arg(long)]
    uploads_dir: Option<String>,

    /// Timeout in seconds for fetching submitted files
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_SECS)]
    fetch_timeout: u64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("Plagiarism Engine starting");

    let auth_config = AuthConfig::from_env();
    let policy = PolicyConfig {
        reporting_threshold: args.reporting_threshold,
        blocking_threshold: args.blocking_threshold,
    };
    info!(
        "Reporting threshold: {:.2}, blocking threshold: {:.2}",
        policy.reporting_threshold, policy.blocking_threshold
    );

    let read_only = args.load_static.is_some();

    let (store, persistence) = if let Some(ref static_dir) = args.load_static {
        info!("Static loading mode enabled (read-only)");
        let snapshot_path = Path::new(static_dir).join(SNAPSHOT_FILE);
        let store = match PersistenceManager::load_from_path(&snapshot_path) {
            Ok(submissions) => SubmissionStore::from_state(submissions, policy),
            Err(e) => {
                warn!("Failed to load static snapshot {:?}: {}, starting fresh", snapshot_path, e);
                SubmissionStore::with_policy(policy)
            }
        };
        (Arc::new(store), None)
    } else {
        info!("Data directory: {}", args.data_dir);
        info!("Snapshot interval: {}s", args.snapshot_interval);
        let pm = PersistenceManager::new(&args.data_dir, args.snapshot_interval);
        (Arc::new(pm.restore(policy)), Some(pm))
    };
    info!("Loaded {} submissions", store.len());

    if let Some(ref pm) = persistence {
        let _snapshot_handle = pm.start_background_snapshots(store.clone()).await;
        persistence::setup_shutdown_handler(pm.clone(), store.clone()).await;
    }

    let mut extractor = Extractor::with_timeout(Duration::from_secs(args.fetch_timeout));
    match args.uploads_dir {
        Some(ref dir) => {
            info!("Local file references resolved under {}", dir);
            extractor = extractor.with_uploads_root(dir);
        }
        None => info!("Local file references disabled, only http(s) URLs are fetched"),
    }

    let state = AppState {
        store,
        extractor,
        read_only,
    };

    let app = Router::new()
        .merge(api::routes(state, auth_config))
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!("Server listening on {}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
    }
}
