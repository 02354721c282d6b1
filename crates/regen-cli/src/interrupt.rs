use std::future::Future;
use std::io;
use std::thread::{self, JoinHandle};

use regen_core::reconstruct::CancelToken;
use tracing::warn;

/// Cancel token that trips on the first Ctrl-C.
///
/// The running job stops at its next chunk or frame boundary and removes
/// its scratch volume and partial output before the command returns.
pub fn ctrl_c_token() -> io::Result<CancelToken> {
    let token = CancelToken::new();
    spawn_watcher(token.clone(), tokio::signal::ctrl_c())?;
    Ok(token)
}

/// Drive `signal` on a background thread and cancel `token` once it fires.
fn spawn_watcher<F>(token: CancelToken, signal: F) -> io::Result<JoinHandle<()>>
where
    F: Future<Output = io::Result<()>> + Send + 'static,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name("regen-interrupt".into())
        .spawn(move || match runtime.block_on(signal) {
            Ok(()) => {
                warn!("Interrupted, cleaning up before exit");
                token.cancel();
            }
            Err(e) => warn!(error = %e, "Could not listen for Ctrl-C"),
        })
}
