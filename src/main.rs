//! Image Relay - authenticated image transformation backend.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_relay::{
    config::{CheckConfig, Cli, Command, ServeConfig},
    server::{create_router, AppState, RouterConfig},
    storage::ObjectStore,
    ArtifactPublisher, GeminiProvider, GenerationAdapter, GoogleOAuth, PhotosClient,
    ReplicateProvider, RestStorage, TransformPipeline,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Check(config) => run_check(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Image Relay v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Storage: {}", config.storage_url);
    info!("  Bucket: {}", config.storage_bucket);
    info!("  Transform model: {}", config.replicate_model);
    info!("  Generation model: {}", config.gemini_model);
    info!(
        "  Timeouts: probe {}s, generation {}s, publish {}s",
        config.probe_timeout, config.generation_timeout, config.publish_timeout
    );

    let http = match build_http_client(config.connect_timeout) {
        Ok(http) => http,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let storage = RestStorage::new(
        http.clone(),
        &config.storage_url,
        config.storage_api_key.clone(),
        config.storage_bucket.clone(),
    );

    // Startup connectivity check with the project key. Per-request probes
    // still run with each caller's own token.
    info!("");
    info!("Connecting to storage...");
    match storage.service_client().probe().await {
        Ok(()) => info!("  Connected successfully"),
        Err(e) => {
            error!("  Failed to reach storage: {}", e);
            error!("");
            error!("  Please check:");
            error!("    - The storage URL is correct and reachable");
            error!("    - The API key is valid");
            error!("    - The bucket '{}' exists", config.storage_bucket);
            return ExitCode::FAILURE;
        }
    }

    let transformer = ReplicateProvider::new(
        http.clone(),
        &config.replicate_base_url,
        config.replicate_model.clone(),
        config.replicate_api_token.clone().unwrap_or_default(),
    );
    let generator = GeminiProvider::new(
        http.clone(),
        &config.gemini_base_url,
        config.gemini_model.clone(),
        config.gemini_api_key.clone().unwrap_or_default(),
    );
    let adapter = GenerationAdapter::new(Arc::new(transformer), Arc::new(generator));

    let pipeline = TransformPipeline::new(storage, Arc::new(adapter))
        .with_publisher(ArtifactPublisher::new(config.upload_cache_max_age))
        .with_timeouts(config.stage_timeouts());

    let mut state = AppState::new(pipeline)
        .with_photos(PhotosClient::new(http.clone(), &config.photos_base_url));

    match config.google_credentials() {
        Some((client_id, client_secret)) => match GoogleOAuth::new(
            http.clone(),
            client_id,
            client_secret,
            &config.backend_url,
            config.frontend_url.clone(),
        ) {
            Ok(oauth) => {
                info!("  Google OAuth: enabled");
                state = state.with_oauth(oauth);
            }
            Err(e) => {
                error!("Failed to configure Google OAuth: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => warn!("  Google OAuth: disabled (no client id/secret)"),
    }

    let router = create_router(state, build_router_config(&config));
    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try:");
    info!("    curl http://{}/health", addr);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Shared outbound HTTP client.
fn build_http_client(connect_timeout: u64) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout))
        .user_agent(concat!("image-relay/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "image_relay=debug,tower_http=debug"
    } else {
        "image_relay=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new().with_body_limit(config.body_limit);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("Image Relay Configuration Check");
    println!("═══════════════════════════════");
    println!();
    println!("✓ Storage: {}", config.storage_url);
    println!("✓ Bucket: {}", config.storage_bucket);
    println!();

    let http = match build_http_client(10) {
        Ok(http) => http,
        Err(e) => {
            println!("✗ HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let storage = RestStorage::new(
        http,
        &config.storage_url,
        config.storage_api_key,
        config.storage_bucket.clone(),
    );

    print!("Testing storage connection... ");
    match storage.service_client().probe().await {
        Ok(()) => println!("✓ success"),
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            println!();
            println!("Please check:");
            println!("  - The storage URL is correct and reachable");
            println!("  - The API key is valid");
            println!("  - The bucket '{}' exists", config.storage_bucket);
            return ExitCode::FAILURE;
        }
    }

    println!();
    println!("═══════════════════════════════");
    println!("✓ All checks passed!");

    ExitCode::SUCCESS
}
