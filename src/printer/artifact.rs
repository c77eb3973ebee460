//! The PDF handed back to the caller.

use crate::browser::engine::PdfStream;
use crate::browser::tab::{ReleaseReason, RenderSession};
use crate::printer::PrintError;
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, Stream, StreamExt};
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tracing::debug;

enum State {
    Streaming,
    /// Releasing the session; the item is yielded once the release is done.
    Releasing(BoxFuture<'static, bool>, Option<Result<Bytes, PrintError>>),
    Done,
}

/// PDF bytes read lazily from the browser tab that rendered them.
///
/// The artifact owns the render session. The session is released when the
/// stream is read to the end (before the final `None` is yielded), when a
/// chunk fails, when [`PdfArtifact::close`] is called, or when the artifact
/// is dropped, whichever comes first.
pub struct PdfArtifact {
    session: RenderSession,
    stream: PdfStream,
    state: State,
    bytes_read: u64,
}

impl PdfArtifact {
    pub fn new(session: RenderSession, stream: PdfStream) -> Self {
        Self {
            session,
            stream,
            state: State::Streaming,
            bytes_read: 0,
        }
    }

    /// Identifier of the render session producing this PDF.
    pub fn session_id(&self) -> &str {
        self.session.id()
    }

    /// Number of PDF bytes yielded so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Stops reading and releases the render session.
    ///
    /// Closing an already closed or fully read artifact does nothing.
    pub async fn close(&mut self) {
        self.stream = stream::empty().boxed();
        match std::mem::replace(&mut self.state, State::Done) {
            State::Releasing(release, _) => {
                release.await;
            }
            State::Streaming | State::Done => {
                self.session.close(ReleaseReason::Closed).await;
            }
        }
    }

    /// Reads the whole PDF into memory.
    pub async fn read_to_end(mut self) -> Result<Vec<u8>, PrintError> {
        let mut pdf = Vec::new();
        while let Some(chunk) = self.next().await {
            pdf.extend_from_slice(&chunk?);
        }
        Ok(pdf)
    }

    fn start_release(&mut self, reason: ReleaseReason, item: Option<Result<Bytes, PrintError>>) {
        debug!(session = %self.session.id(), bytes = self.bytes_read, %reason, "PDF stream finished");
        self.state = State::Releasing(self.session.release_hook(reason), item);
    }
}

impl Stream for PdfArtifact {
    type Item = Result<Bytes, PrintError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let State::Releasing(release, item) = &mut this.state {
                ready!(release.poll_unpin(cx));
                let item = item.take();
                this.state = State::Done;
                return Poll::Ready(item);
            }
            if matches!(this.state, State::Done) {
                return Poll::Ready(None);
            }

            match ready!(this.stream.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => {
                    this.bytes_read += chunk.len() as u64;
                    return Poll::Ready(Some(Ok(chunk)));
                }
                Some(Err(e)) => {
                    this.start_release(ReleaseReason::Failed, Some(Err(PrintError::Render(e))));
                }
                None => this.start_release(ReleaseReason::Drained, None),
            }
        }
    }
}

impl Drop for PdfArtifact {
    fn drop(&mut self) {
        // An interrupted release must still run to completion.
        if let State::Releasing(release, _) = std::mem::replace(&mut self.state, State::Done) {
            self.session.spawn_release(release);
        }
    }
}

impl std::fmt::Debug for PdfArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfArtifact")
            .field("session", &self.session)
            .field("bytes_read", &self.bytes_read)
            .finish()
    }
}
