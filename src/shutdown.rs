// src/shutdown.rs
// SIGINT/SIGTERM handling: first signal drains, second one (or a timeout) exits

use actix_web::dev::ServerHandle;
use futures_util::{Stream, StreamExt};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::{Handle, Signals};
use std::io;
use std::time::Duration;

use crate::logger::get_logger;

/// How long a graceful stop may take before the process exits anyway.
pub const FORCE_EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Listen for termination signals and stop `server` when one arrives.
///
/// Actix's own signal handling must be disabled on the server, otherwise both
/// react to the same signal. The returned handle closes the signal stream.
pub fn install_signal_handlers(server: ServerHandle) -> io::Result<Handle> {
    let signals = Signals::new([SIGINT, SIGTERM])?;
    let handle = signals.handle();
    tokio::spawn(drive_shutdown(signals, server, force_exit));
    Ok(handle)
}

fn force_exit() {
    std::process::exit(0);
}

pub(crate) async fn drive_shutdown<S>(mut signals: S, server: ServerHandle, exit: fn())
where
    S: Stream<Item = i32> + Unpin,
{
    let logger = get_logger();
    let mut stopping = false;

    while let Some(signal) = signals.next().await {
        if signal != SIGINT && signal != SIGTERM {
            continue;
        }

        if stopping {
            logger.force_shutdown_message();
            exit();
            return;
        }

        stopping = true;
        logger.shutdown_message();

        let server = server.clone();
        tokio::spawn(async move {
            server.stop(true).await;
        });
        tokio::spawn(async move {
            tokio::time::sleep(FORCE_EXIT_TIMEOUT).await;
            logger.force_shutdown_message();
            exit();
        });
    }
}
