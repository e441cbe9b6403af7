//! Streaming Session
//!
//! Runs one streaming chat completion on its own task and hands the parsed
//! chunks to the caller through [`ChatCompletionStream`].

use crate::api::chat::CHAT_COMPLETIONS_PATH;
use crate::api::{ChatCompletionChunk, ChatCompletionRequest, ChatMessage, StreamAccumulator};
use crate::client::{HttpClient, RequestBody, EVENT_STREAM_CONTENT_TYPE};
use crate::error::{MistralError, Result};
use crate::stream::parser::EventStreamParser;
use crate::MistralClient;
use futures::{Stream, StreamExt};
use reqwest::{Method, StatusCode};
use std::future::Future;
use std::pin::{pin, Pin};
use std::task::{ready, Context, Poll};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

// One chunk in flight: the producer waits for the consumer before parsing on.
const CHANNEL_CAPACITY: usize = 1;

type ChunkSender = mpsc::Sender<Result<ChatCompletionChunk>>;

/// Chunks of one streaming chat completion.
///
/// Yields chunks in the order the server sent them, then either ends or
/// yields exactly one error. Once the session's token is cancelled no further
/// chunk is yielded: the stream ends with [`MistralError::Cancelled`] unless
/// the session had already finished, in which case its own outcome (clean end
/// or error) is kept. Dropping the stream cancels the session and releases
/// the connection.
pub struct ChatCompletionStream {
    rx: mpsc::Receiver<Result<ChatCompletionChunk>>,
    cancel: CancellationToken,
    _guard: DropGuard,
    done: bool,
}

impl ChatCompletionStream {
    fn new(rx: mpsc::Receiver<Result<ChatCompletionChunk>>, cancel: CancellationToken) -> Self {
        Self {
            rx,
            _guard: cancel.clone().drop_guard(),
            cancel,
            done: false,
        }
    }

    /// Stop the session. The next poll yields [`MistralError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the session has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drain the stream into an accumulator
    pub async fn accumulate(mut self) -> Result<StreamAccumulator> {
        let mut acc = StreamAccumulator::new();
        while let Some(chunk) = self.next().await {
            acc.process_chunk(&chunk?);
        }
        Ok(acc)
    }

    /// Drain the stream into the final assistant message
    pub async fn collect_message(self) -> Result<ChatMessage> {
        Ok(self.accumulate().await?.into_message())
    }
}

impl Stream for ChatCompletionStream {
    type Item = Result<ChatCompletionChunk>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        if self.cancel.is_cancelled() {
            self.done = true;
            // A verdict the producer already delivered outranks the cancel;
            // an undelivered chunk does not.
            let outcome = match self.rx.try_recv() {
                Ok(Err(e)) => Some(Err(e)),
                Err(TryRecvError::Disconnected) => None,
                Ok(Ok(_)) | Err(TryRecvError::Empty) => Some(Err(MistralError::Cancelled)),
            };
            self.rx.close();
            return Poll::Ready(outcome);
        }

        let item = ready!(self.rx.poll_recv(cx));
        match item {
            Some(Ok(chunk)) => Poll::Ready(Some(Ok(chunk))),
            Some(Err(e)) => {
                self.done = true;
                Poll::Ready(Some(Err(e)))
            }
            None => {
                self.done = true;
                Poll::Ready(None)
            }
        }
    }
}

impl std::fmt::Debug for ChatCompletionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionStream")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("done", &self.done)
            .finish()
    }
}

impl MistralClient {
    /// Start a streaming chat completion.
    ///
    /// The request is copied with `stream` set; the caller's value is left
    /// as is. Cancelling `cancel` (or any parent it was derived from) ends the
    /// session with [`MistralError::Cancelled`]. Any status other than 200
    /// ends it with [`MistralError::Api`] before any chunk is yielded.
    ///
    /// The session runs on a spawned task, so this must be called from
    /// within a Tokio runtime.
    pub fn chat_stream(
        &self,
        request: &ChatCompletionRequest,
        cancel: CancellationToken,
    ) -> ChatCompletionStream {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let session = cancel.child_token();

        tokio::spawn(run_session(
            self.http.clone(),
            request.to_streaming(),
            tx,
            session.clone(),
        ));

        ChatCompletionStream::new(rx, session)
    }
}

async fn run_session(
    http: HttpClient,
    request: ChatCompletionRequest,
    tx: ChunkSender,
    cancel: CancellationToken,
) {
    match produce(&http, &request, &tx, &cancel).await {
        Ok(()) => debug!(model = %request.model, "Stream finished"),
        Err(MistralError::Cancelled) => {
            debug!(model = %request.model, "Stream cancelled");
            let _ = tx.try_send(Err(MistralError::Cancelled));
        }
        Err(e) => {
            warn!(model = %request.model, error = %e, "Stream failed");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let _ = tx.try_send(Err(MistralError::Cancelled));
                }
                sent = tx.send(Err(e)) => {
                    if sent.is_err() {
                        debug!("Stream receiver dropped before the error was delivered");
                    }
                }
            }
        }
    }
}

async fn produce(
    http: &HttpClient,
    request: &ChatCompletionRequest,
    tx: &ChunkSender,
    cancel: &CancellationToken,
) -> Result<()> {
    let body = RequestBody::json(request)?;

    let response = until_cancelled(
        cancel,
        http.send(
            Method::POST,
            CHAT_COMPLETIONS_PATH,
            &[],
            body,
            Some(EVENT_STREAM_CONTENT_TYPE),
        ),
    )
    .await??;

    if response.status() != StatusCode::OK {
        return Err(until_cancelled(cancel, HttpClient::error_from_response(response)).await?);
    }

    debug!(model = %request.model, "Stream opened");

    let mut chunks = pin!(EventStreamParser::new(response.bytes_stream()));
    while let Some(item) = until_cancelled(cancel, chunks.next()).await? {
        let chunk = item?;
        if until_cancelled(cancel, tx.send(Ok(chunk))).await?.is_err() {
            debug!("Stream receiver dropped");
            return Ok(());
        }
    }

    Ok(())
}

/// Run `fut` unless the token fires first
async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(MistralError::Cancelled),
        out = fut => Ok(out),
    }
}
