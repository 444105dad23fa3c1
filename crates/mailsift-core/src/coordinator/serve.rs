//! Line protocol loop between the host and a [`Coordinator`].

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::Coordinator;
use crate::archive::ArchiveOpener;
use crate::protocol::{Command, Outbound, Reply, Request, WorkerEvent, parse_request};
use crate::traversal::CancelFlag;
use crate::Result;

/// A line read from the host, in arrival order.
enum Incoming {
    Request(Request),
    Rejected(Reply),
}

/// Serves requests read from `input` until it is closed.
///
/// Requests run one at a time in arrival order. Every event a command
/// produces is written before that command's reply. `cancel` is acknowledged
/// as soon as it is read, even while an extraction is running.
///
/// # Errors
///
/// Returns an error if writing to `output` fails, or the first fatal command
/// error after its rejection has been written.
pub async fn serve<R, W, O>(
    input: R,
    mut output: W,
    mut coordinator: Coordinator<O>,
    mut events: mpsc::UnboundedReceiver<WorkerEvent>,
) -> Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
    O: ArchiveOpener,
{
    let (requests_tx, mut requests) = mpsc::unbounded_channel();
    let (acks_tx, mut acks) = mpsc::unbounded_channel();
    let reader = tokio::spawn(read_requests(
        input,
        requests_tx,
        acks_tx,
        coordinator.cancel_handle(),
    ));

    loop {
        let incoming = tokio::select! {
            biased;
            Some(ack) = acks.recv() => {
                write_line(&mut output, ack).await?;
                continue;
            }
            incoming = requests.recv() => incoming,
        };

        let request = match incoming {
            Some(Incoming::Request(request)) => request,
            Some(Incoming::Rejected(reply)) => {
                write_line(&mut output, reply).await?;
                continue;
            }
            None => break,
        };

        let id = request.id;
        debug!(id, command = request.command.name(), "Handling request");

        let result = {
            let command = coordinator.handle(request.command);
            tokio::pin!(command);
            loop {
                tokio::select! {
                    biased;
                    Some(event) = events.recv() => {
                        write_line(&mut output, event).await?;
                    }
                    Some(ack) = acks.recv() => {
                        write_line(&mut output, ack).await?;
                    }
                    result = &mut command => break result,
                }
            }
        };

        while let Ok(event) = events.try_recv() {
            write_line(&mut output, event).await?;
        }

        match result {
            Ok(()) => write_line(&mut output, Reply::success(id)).await?,
            Err(e) => {
                write_line(&mut output, Reply::failure(id, &e)).await?;
                if e.is_fatal() {
                    reader.abort();
                    return Err(e);
                }
            }
        }
    }

    while let Ok(ack) = acks.try_recv() {
        write_line(&mut output, ack).await?;
    }

    match reader.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Reading requests failed"),
        Err(e) => error!(error = %e, "Request reader task failed"),
    }
    debug!("Input closed, worker stopping");
    Ok(())
}

async fn read_requests<R: AsyncRead + Unpin>(
    input: R,
    requests: mpsc::UnboundedSender<Incoming>,
    acks: mpsc::UnboundedSender<Reply>,
    cancel: CancelFlag,
) -> std::io::Result<()> {
    let mut lines = BufReader::new(input).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let incoming = match parse_request(&line) {
            Ok(Request {
                id,
                command: Command::Cancel,
            }) => {
                debug!(id, "Cancellation requested");
                cancel.cancel();
                if acks.send(Reply::success(id)).is_err() {
                    break;
                }
                continue;
            }
            Ok(request) => Incoming::Request(request),
            Err(reply) => {
                warn!(id = reply.id, "Rejected malformed request");
                Incoming::Rejected(reply)
            }
        };

        if requests.send(incoming).is_err() {
            break;
        }
    }

    Ok(())
}

async fn write_line<W: AsyncWrite + Unpin>(
    output: &mut W,
    message: impl Into<Outbound>,
) -> Result<()> {
    let mut line = serde_json::to_vec(&message.into())?;
    line.push(b'\n');
    output.write_all(&line).await?;
    output.flush().await?;
    Ok(())
}
