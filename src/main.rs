//! ComfyUI front-end server.
//!
//! This binary loads the configuration, wires the components together and
//! starts the HTTP server.

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use comfy_frontend::{
    config::{AppConfig, CheckConfig, Cli, Command, ConfigSource, ServeConfig},
    preview::{PreviewService, StorageClass, StorageRoots},
    server::{create_router, AppState, RouterConfig},
    upstream::UpstreamClient,
    workflow::WorkflowCatalog,
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

    let loaded = AppConfig::load(&config.config, &config.config_template);
    let app = loaded.config;

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    print_banner();

    info!("Configuration:");
    info!("  Config: {}", describe_source(&loaded.source));
    info!("  ComfyUI endpoint: {}", app.comfyui_endpoint);
    info!("  UI directory: {}", config.dist.display());
    info!("  Preview quality: {}", config.quality);
    info!(
        "  Max concurrent transcodes: {}",
        config.max_concurrent_transcodes
    );

    if let Some(reason) = config.endpoint_warning(&app) {
        warn!(
            endpoint = %app.comfyui_endpoint,
            "  ComfyUI endpoint is unusable ({}) - /api/object_info will fail",
            reason
        );
    }

    let roots = app.storage_roots();
    log_storage_roots(&roots);

    let upstream = match UpstreamClient::new(app.comfyui_endpoint.clone(), config.upstream_timeout())
    {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create upstream client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let state = AppState::new(
        PreviewService::with_quality(roots, config.quality)
            .with_max_concurrent_transcodes(config.max_concurrent_transcodes),
        upstream,
        WorkflowCatalog::in_dist(&config.dist),
    );

    let router = create_router(state, build_router_config(&config));

    let addr = config.bind_address(&app);

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/api/comfyui_endpoint", addr);
    info!("    curl http://{}/api/workflows", addr);
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

/// Print the startup banner.
fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    info!("");
    info!(" ██████╗ ██████╗ ███╗   ███╗███████╗██╗   ██╗");
    info!("██╔════╝██╔═══██╗████╗ ████║██╔════╝╚██╗ ██╔╝");
    info!("██║     ██║   ██║██╔████╔██║█████╗   ╚████╔╝ ");
    info!("██║     ██║   ██║██║╚██╔╝██║██╔══╝    ╚██╔╝  ");
    info!("╚██████╗╚██████╔╝██║ ╚═╝ ██║██║        ██║   ");
    info!(" ╚═════╝ ╚═════╝ ╚═╝     ╚═╝╚═╝        ╚═╝   ");
    info!("                 front-end v{}", version);
    info!("");
}

fn describe_source(source: &ConfigSource) -> String {
    match source {
        ConfigSource::File(path) => path.display().to_string(),
        ConfigSource::Template(path) => format!("copied from template {}", path.display()),
        ConfigSource::Defaults { reason } => format!("built-in defaults ({})", reason),
    }
}

fn log_storage_roots(roots: &StorageRoots) {
    for class in [StorageClass::Temp, StorageClass::Output] {
        match roots.base_dir(class) {
            Some(dir) => info!("  {} folder: {}", class, dir.display()),
            None => warn!(
                "  {} folder: NOT CONFIGURED - image requests will fail",
                class
            ),
        }
    }
    if roots.temp.is_some() {
        info!("  Previews are cached in the temp folder and never evicted");
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "comfy_frontend=debug,tower_http=debug"
    } else {
        "comfy_frontend=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the serve options.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new(config.dist.clone())
        .with_compression(!config.no_compression)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("ComfyUI Front-end Configuration Check");
    println!("═════════════════════════════════════");
    println!();

    let loaded = AppConfig::load(&config.config, &config.config_template);
    let app = loaded.config;
    let mut ok = true;

    match &loaded.source {
        ConfigSource::Defaults { reason } => {
            println!("✗ Config: using built-in defaults");
            println!("    {}", reason);
            ok = false;
        }
        source => println!("✓ Config: {}", describe_source(source)),
    }
    println!("✓ Port: {}", app.bun_port);
    println!("✓ Endpoint: {}", app.comfyui_endpoint);
    println!();

    let roots = app.storage_roots();
    for class in [StorageClass::Temp, StorageClass::Output] {
        match roots.base_dir(class) {
            Some(dir) if dir.is_dir() => println!("✓ {} folder: {}", class, dir.display()),
            Some(dir) => {
                println!("✗ {} folder: {} (does not exist)", class, dir.display());
                ok = false;
            }
            None => {
                println!("✗ {} folder: not configured", class);
                ok = false;
            }
        }
    }

    match WorkflowCatalog::in_dist(&config.dist).list().await {
        Ok(workflows) => println!("✓ Workflows: {} found", workflows.len()),
        Err(e) => {
            println!("✗ Workflows: {}", e);
            ok = false;
        }
    }
    check_index(&config.dist);

    if !config.skip_upstream {
        println!();
        print!("Testing upstream connection... ");

        let timeout = Duration::from_secs(config.upstream_timeout.max(1));
        let result = match UpstreamClient::new(app.comfyui_endpoint.clone(), timeout) {
            Ok(client) => client.object_info().await.map(|body| body.len()),
            Err(e) => Err(e),
        };

        match result {
            Ok(size) => println!("✓ success ({} bytes of object_info)", size),
            Err(e) => {
                println!("✗ failed");
                println!();
                println!("Error: {}", e);
                println!();
                println!("Please check:");
                println!("  - ComfyUI is running");
                println!("  - comfyui_endpoint points at it");
                ok = false;
            }
        }
    }

    println!();
    println!("═════════════════════════════════════");
    if ok {
        println!("✓ All checks passed!");
        ExitCode::SUCCESS
    } else {
        println!("✗ Some checks failed");
        ExitCode::FAILURE
    }
}

/// Warn when the UI build is missing; the API still works without it.
fn check_index(dist: &Path) {
    let index = dist.join("index.html");
    if index.is_file() {
        println!("✓ Web UI: {}", index.display());
    } else {
        println!("! Web UI: {} not found (API only)", index.display());
    }
}
