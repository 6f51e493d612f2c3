use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use console::Term;

/// Exit status for a forced quit (128 + SIGINT).
const FORCE_QUIT_EXIT_CODE: i32 = 130;

/// Spawn the Ctrl+C watcher and return the flag it raises.
///
/// The first Ctrl+C stops dispatching new files; the second exits at once.
pub(crate) fn setup_shutdown_handler() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    tokio::spawn(watch_interrupts(Arc::clone(&flag)));
    flag
}

async fn watch_interrupts(flag: Arc<AtomicBool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Could not listen for Ctrl+C");
        return;
    }

    let on_terminal = Term::stderr().is_term();
    flag.store(true, Ordering::SeqCst);
    if on_terminal {
        eprintln!("\nStopping: files in flight will finish. Press Ctrl+C again to quit now.");
    } else {
        tracing::warn!("Interrupt received, letting in-flight files finish");
    }

    if tokio::signal::ctrl_c().await.is_ok() {
        if on_terminal {
            eprintln!("Quitting.");
        }
        std::process::exit(FORCE_QUIT_EXIT_CODE);
    }
}
