//! Native messaging host loop for the warmtab daemon.
//!
//! The browser starts the host when the extension connects and closes its
//! stdin when the extension goes away. In between, the host owns one warm
//! pool and one dispatcher and reacts to whatever the extension forwards.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use warmtab_core::config::Config;
use warmtab_core::{Dispatcher, IdsStore, StorageSettingsStore, WarmPool};
use warmtab_rpc::protocol::{Message, Response, RpcError};
use warmtab_rpc::BridgeClient;

use crate::bridge::{BridgeHost, BridgeStorage, StorageKind, probe_capabilities};
use crate::error::{DaemonError, Result};
use crate::handlers::Router;

/// Serve the extension over stdin/stdout until it disconnects.
///
/// # Errors
///
/// Returns an error if the bridge fails in a way that ends the session.
pub async fn run(config: Config) -> Result<()> {
    let (client, incoming) = BridgeClient::stdio();
    serve(client, incoming, &config).await
}

/// Serve the extension over an arbitrary pipe.
///
/// # Errors
///
/// Returns an error if answering the extension fails.
pub async fn serve_pipe<R, W>(reader: R, writer: W, config: &Config) -> Result<()>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let (client, incoming) = BridgeClient::new(reader, writer);
    serve(client, incoming, config).await
}

async fn serve(
    client: BridgeClient,
    mut incoming: mpsc::Receiver<Message>,
    config: &Config,
) -> Result<()> {
    let client = Arc::new(client);

    let capabilities = probe_capabilities(&client).await;
    info!(
        "Extension connected (offscreen windows: {})",
        capabilities.offscreen_windows
    );

    let host = Arc::new(BridgeHost::new(client.clone()));
    let ids = IdsStore::new(
        Arc::new(BridgeStorage::new(client.clone(), StorageKind::Session)),
        Arc::new(BridgeStorage::new(client.clone(), StorageKind::Local)),
    );
    let pool = WarmPool::new(host.clone(), ids, config.pool_settings(), capabilities);
    let rules = Arc::new(StorageSettingsStore::new(Arc::new(BridgeStorage::new(
        client.clone(),
        StorageKind::Sync,
    ))));
    let dispatcher = Arc::new(Dispatcher::new(
        host,
        pool.clone(),
        rules,
        config.dispatch_settings(),
    ));

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let event_loop = pool.spawn_event_loop(events_rx);
    let router = Router {
        dispatcher,
        events: events_tx,
    };

    tokio::spawn({
        let pool = pool.clone();
        async move { pool.fill().await }
    });

    while let Some(message) = incoming.recv().await {
        if let Some((method, params)) = message.as_notification() {
            router.handle_notification(method, params);
            continue;
        }
        match message {
            Message::Request(request) => {
                let Some(id) = request.id else { continue };
                warn!("Extension called unknown method {}", request.method);
                let error: RpcError = DaemonError::MethodNotFound(request.method).into();
                client
                    .respond(Response::error(id, error))
                    .await
                    .map_err(warmtab_rpc::Error::from)?;
            }
            other => debug!("Ignoring unexpected message: {other:?}"),
        }
    }

    info!("Extension disconnected");
    drop(router);
    if let Err(e) = event_loop.await {
        debug!("Pool event loop ended abnormally: {e}");
    }
    Ok(())
}
