use std::io;
use std::sync::Arc;

use session_dispatch::cli::{print_error, run_repl, Console};
use session_dispatch::core::AppConfig;
use session_dispatch::llm::GeminiRuntime;
use session_dispatch::logging;
use session_dispatch::memory::InMemoryMemoryService;
use session_dispatch::session::{FileSessionService, InMemorySessionService, SessionService};
use session_dispatch::SessionDispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // The credential is checked before anything else is built
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            print_error(&e.to_string());
            std::process::exit(1);
        }
    };

    let _log_guard = logging::init_logging(&config.log)?;
    tracing::info!("=== Session Dispatcher Starting ===");

    let sessions: Arc<dyn SessionService> = match &config.sessions_dir {
        Some(dir) => {
            tracing::info!("Persisting sessions under {:?}", dir);
            Arc::new(FileSessionService::with_dir(dir))
        }
        None => Arc::new(InMemorySessionService::new()),
    };

    let runtime = Arc::new(GeminiRuntime::from_config(&config, sessions.clone()));

    let mut dispatcher = SessionDispatcher::new(runtime, sessions, &config.user_id)
        .with_initial_state(config.initial_state.clone());
    if config.enable_memory {
        dispatcher = dispatcher.with_memory(Arc::new(InMemoryMemoryService::new()));
    }

    let mut console = Console::new();
    console.print_banner(&config.app_name, &config.session_id)?;

    let summary = run_repl(
        io::stdin().lock(),
        &mut console,
        &dispatcher,
        &config.session_id,
    )
    .await?;

    tracing::info!(
        "=== Session Dispatcher Shutting Down ({} turns) ===",
        summary.turns
    );

    Ok(())
}
