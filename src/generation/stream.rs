use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::StreamExt;

use crate::error::GenerationError;

/// A lazy, finite stream of provider output bytes.
pub type ByteStream = BoxStream<'static, Result<Bytes, GenerationError>>;

/// Drain a byte stream into one contiguous buffer.
///
/// Reads until the stream signals its end. The stream is taken by value, so
/// it is dropped (and its underlying connection released) on every exit
/// path, including the first failed read.
pub async fn drain_byte_stream(mut stream: ByteStream) -> Result<Bytes, GenerationError> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    Ok(buffer.freeze())
}
