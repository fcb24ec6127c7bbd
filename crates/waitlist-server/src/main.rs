//! Waitlist server - Entry point.

use recaptcha_client::RecaptchaClient;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use waitlist_server::{
    api::{create_router, AppState},
    config::{Config, LogConfig},
    BotVerifier, FileStore, MemoryStore, MemoryThrottle, SignupStore, Throttle, UpstashThrottle,
    WaitlistService,
};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.log);

    info!("Starting waitlist server");

    // Bot verification; without a secret every signup fails closed
    let verifier: Option<Arc<dyn BotVerifier>> = match config.recaptcha_secret() {
        Some(secret) => match RecaptchaClient::new(
            secret,
            config.recaptcha.verify_url.clone(),
            config.recaptcha.timeout,
        ) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                error!("Failed to create reCAPTCHA client: {}", e);
                std::process::exit(1);
            }
        },
        None => {
            error!("RECAPTCHA_SECRET_KEY is not set, signups will be rejected");
            None
        }
    };

    // Per-client throttle
    let throttle: Arc<dyn Throttle> = match config.upstash_credentials() {
        Some((url, token)) => match UpstashThrottle::new(
            url,
            token,
            config.throttle.limit,
            config.throttle.window,
            config.throttle.prefix.clone(),
            config.throttle.timeout,
        ) {
            Ok(t) => {
                info!("Using Upstash throttle at {}", url);
                Arc::new(t)
            }
            Err(e) => {
                error!("Failed to create Upstash throttle: {}", e);
                std::process::exit(1);
            }
        },
        None => {
            warn!("Upstash credentials not set, using in-memory throttle");
            Arc::new(MemoryThrottle::new(
                config.throttle.limit,
                config.throttle.window,
            ))
        }
    };

    // Signup storage
    let store: Arc<dyn SignupStore> = if config.store.persist {
        match FileStore::open(config.store.path.clone()).await {
            Ok(s) => Arc::new(s),
            Err(e) => {
                error!(
                    "Failed to open signup store at {}: {}",
                    config.store.path.display(),
                    e
                );
                std::process::exit(1);
            }
        }
    } else {
        info!("Persistence disabled, using in-memory storage");
        Arc::new(MemoryStore::new())
    };

    match store.count().await {
        Ok(count) => info!("Loaded waitlist with {} signups", count),
        Err(e) => warn!("Could not count existing signups: {}", e),
    }

    let state = AppState::new(WaitlistService::new(verifier, throttle, store));
    let app = create_router(state);

    // Bind to address
    let addr = SocketAddr::new(
        config
            .server
            .listen_addr
            .parse()
            .unwrap_or([0, 0, 0, 0].into()),
        config.server.port,
    );

    info!("Listening on {}", addr);

    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Waitlist server stopped");
}

fn init_logging(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));

    let registry = tracing_subscriber::registry().with(filter);
    if log.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
