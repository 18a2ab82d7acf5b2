//! Decoding of streamed Messages API events into [`StreamChunk`]s.

use async_stream::stream;
use futures::{Stream, StreamExt};

use super::envelope::StreamEvent;
use super::{FrameStream, ModelKind, StreamChunk};
use crate::{Error, Result};

/// Turn raw event frames into chunks.
///
/// Content deltas become non-terminal chunks in arrival order. The stop reason
/// reported by `message_delta` is carried on the single terminal chunk, which
/// is emitted on `message_stop` or when upstream runs out of frames. A frame
/// that fails to decode ends the stream with one error item.
pub(crate) fn decode_chunks(mut frames: FrameStream) -> impl Stream<Item = Result<StreamChunk>> + Send + 'static {
    stream! {
        let mut stop_reason: Option<String> = None;

        while let Some(frame) = frames.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    yield Err(Error::invocation(ModelKind::Chat, e));
                    return;
                }
            };

            match serde_json::from_slice::<StreamEvent>(&frame) {
                Ok(StreamEvent::ContentBlockDelta { delta }) => {
                    if let Some(text) = delta.text.filter(|text| !text.is_empty()) {
                        yield Ok(StreamChunk::delta(text));
                    }
                }
                Ok(StreamEvent::MessageDelta { delta }) => {
                    if delta.stop_reason.is_some() {
                        stop_reason = delta.stop_reason;
                    }
                }
                Ok(StreamEvent::MessageStop {}) => {
                    yield Ok(StreamChunk::terminal(stop_reason.take()));
                    return;
                }
                Ok(StreamEvent::Other) => {}
                Err(e) => {
                    yield Err(Error::invocation(
                        ModelKind::Chat,
                        format!("undecodable stream event: {}", e),
                    ));
                    return;
                }
            }
        }

        yield Ok(StreamChunk::terminal(stop_reason));
    }
}
