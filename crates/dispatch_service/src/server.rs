//! Transports: a TCP listener (one task per connection) and a stdin/stdout
//! session. Core work runs on the blocking pool.

use std::future::Future;
use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::ServiceContext;
use crate::protocol::{handle_line, internal_error_line};

/// Accept connections until `shutdown` resolves.
pub async fn serve_tcp<F>(
    listener: TcpListener,
    ctx: Arc<ServiceContext>,
    shutdown: F,
) -> io::Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutting down listener");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        warn!(%err, "failed to accept connection");
                        continue;
                    }
                };
                debug!(%peer, "accepted connection");
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    let (reader, writer) = stream.into_split();
                    if let Err(err) = serve_lines(reader, writer, ctx).await {
                        warn!(%peer, %err, "connection closed with error");
                    }
                });
            }
        }
    }
}

/// Single session over the process's stdin and stdout.
pub async fn serve_stdio(ctx: Arc<ServiceContext>) -> io::Result<()> {
    serve_lines(tokio::io::stdin(), tokio::io::stdout(), ctx).await
}

/// Answer each non-empty line of `reader` with one line on `writer`.
pub async fn serve_lines<R, W>(reader: R, mut writer: W, ctx: Arc<ServiceContext>) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let ctx = Arc::clone(&ctx);
        let response = match tokio::task::spawn_blocking(move || handle_line(&ctx, &line)).await {
            Ok(response) => response,
            Err(err) => {
                error!(%err, "request handler panicked");
                internal_error_line()
            }
        };
        writer.write_all(response.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}
