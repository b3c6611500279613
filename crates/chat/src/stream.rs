//! Outbound chunk stream for streamed answers.
//!
//! The stream is pull-driven: each upstream delta is received only when the
//! consumer asks for the next chunk. Dropping the stream drops the upstream
//! receiver, which stops the transport task on its next send.

use crate::chunk::{ChatChunk, ExtraInfo};
use crate::error::ChatError;
use crate::followup::StreamReassembler;
use futures::Stream;
use ragchat_core::provider::StreamReceiver;
use std::pin::Pin;
use tracing::debug;

/// Chunks of one streamed answer. An `Err` item is always the last item.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatChunk, ChatError>> + Send>>;

enum Phase {
    Opening(ExtraInfo, serde_json::Value),
    Deltas,
    Done,
}

struct State {
    phase: Phase,
    upstream: StreamReceiver,
    /// `None` when follow-ups are disabled or after the stream finished
    reassembler: Option<StreamReassembler>,
}

/// Wrap an upstream delta receiver into the client-facing chunk sequence:
/// the opening chunk, then model deltas, then (follow-ups enabled and
/// non-empty) one follow-up chunk.
pub fn chunk_stream(
    extra: ExtraInfo,
    session_state: serde_json::Value,
    upstream: StreamReceiver,
    followup_enabled: bool,
) -> ChunkStream {
    let state = State {
        phase: Phase::Opening(extra, session_state),
        upstream,
        reassembler: followup_enabled.then(StreamReassembler::new),
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            match std::mem::replace(&mut state.phase, Phase::Done) {
                Phase::Opening(extra, session_state) => {
                    state.phase = Phase::Deltas;
                    return Some((Ok(ChatChunk::opening(extra, session_state)), state));
                }
                Phase::Deltas => match state.upstream.recv().await {
                    Some(Ok(delta)) => {
                        state.phase = Phase::Deltas;
                        if delta.is_terminal_marker() {
                            continue;
                        }
                        let forwarded = match state.reassembler.as_mut() {
                            Some(reassembler) => reassembler.push(delta),
                            None => Some(delta),
                        };
                        if let Some(delta) = forwarded {
                            return Some((Ok(ChatChunk::delta(delta)), state));
                        }
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "Upstream stream failed");
                        return Some((Err(e.into()), state));
                    }
                    None => {
                        let questions = state.reassembler.take().and_then(StreamReassembler::finish);
                        return questions
                            .map(|questions| (Ok(ChatChunk::followups(questions)), state));
                    }
                },
                Phase::Done => return None,
            }
        }
    }))
}
