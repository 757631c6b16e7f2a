//! Position Sizer
//!
//! Terminal front end for the position-size calculator.
//!
//! # Usage
//!
//! ```bash
//! # Start with default configuration
//! cargo run -p sizer-app
//!
//! # Keep state in memory only, with a snappier graph
//! SIZER_STORE_PATH=:memory: SIZER_COMPUTE_DEBOUNCE_MS=50 cargo run -p sizer-app
//! ```
//!
//! # Environment Variables
//!
//! - `SIZER_ENV`: Environment (test, development, production)
//! - `SIZER_STORE_PATH`: State file (default: sizer-state.json, `:memory:` for none)
//! - `SIZER_COMPUTE_DEBOUNCE_MS`: Quiet period before recomputation (default: 200)
//! - `SIZER_PERSIST_DEBOUNCE_MS`: Quiet period before saving (default: 250)
//! - `SIZER_EVENT_CAPACITY`: Event bus buffer (default: 256)

use std::sync::Arc;

use sizer_app::console::{run_session, spawn_renderer, HELP, RENDER_QUIET};
use sizer_app::{render_derived, App, Config};
use sizer_store::{FileStore, KeyValueStore, MemoryStore};
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr, stdout belongs to the console
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("sizer_app=info".parse()?))
        .init();

    let config = Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        store = ?config.store.path,
        "Position Sizer"
    );

    let store: Arc<dyn KeyValueStore> = match &config.store.path {
        Some(path) => match FileStore::open(path).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "State file unusable, keeping state in memory");
                Arc::new(MemoryStore::new())
            },
        },
        None => Arc::new(MemoryStore::new()),
    };

    let app = App::start(config, store).await?;

    // Print derived values once the graph settles after a burst of edits
    let renderer = spawn_renderer(&app, RENDER_QUIET, |text| println!("{}\n", text));

    println!("{}\n", HELP);
    println!("{}\n", render_derived(&app.derived()));

    let mut stdout = std::io::stdout();
    tokio::select! {
        _ = run_session(&app, BufReader::new(tokio::io::stdin()), &mut stdout) => {},

        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        },
    }

    app.shutdown().await?;
    renderer.await?;

    Ok(())
}
