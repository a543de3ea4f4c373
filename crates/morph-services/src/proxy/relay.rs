use bytes::Bytes;
use futures::Stream;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Instant, Sleep};

type SourceStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Chunk-by-chunk relay of a source body.
///
/// Ends with an error when the source fails or sends nothing for `idle_timeout`. Once headers
/// are flushed the only remedy is to abort the response, so failures are logged here with the
/// byte count. Dropping the stream early (client disconnect) is logged too.
pub struct RelayStream {
    inner: SourceStream,
    idle: Pin<Box<Sleep>>,
    idle_timeout: Duration,
    source_host: String,
    bytes_sent: u64,
    finished: bool,
}

impl RelayStream {
    pub(crate) fn new(inner: SourceStream, idle_timeout: Duration, source_host: String) -> Self {
        Self {
            inner,
            idle: Box::pin(tokio::time::sleep(idle_timeout)),
            idle_timeout,
            source_host,
            bytes_sent: 0,
            finished: false,
        }
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    fn fail(&mut self, err: io::Error) -> Poll<Option<io::Result<Bytes>>> {
        self.finished = true;
        tracing::error!(
            source_host = %self.source_host,
            bytes_sent = self.bytes_sent,
            error = %err,
            "Relay aborted after headers were sent"
        );
        Poll::Ready(Some(Err(err)))
    }
}

impl Stream for RelayStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.bytes_sent += chunk.len() as u64;
                let deadline = Instant::now() + this.idle_timeout;
                this.idle.as_mut().reset(deadline);
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => this.fail(io::Error::other(e)),
            Poll::Ready(None) => {
                this.finished = true;
                tracing::info!(
                    source_host = %this.source_host,
                    bytes_sent = this.bytes_sent,
                    "Relay completed"
                );
                Poll::Ready(None)
            }
            Poll::Pending => match this.idle.as_mut().poll(cx) {
                Poll::Ready(()) => this.fail(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("source idle for {}s", this.idle_timeout.as_secs()),
                )),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

impl Drop for RelayStream {
    fn drop(&mut self) {
        if !self.finished {
            tracing::info!(
                source_host = %self.source_host,
                bytes_sent = self.bytes_sent,
                "Client went away before relay completed"
            );
        }
    }
}
