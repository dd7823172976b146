// ABOUTME: Frame-level reading over any async byte stream for the CMPP protocol
// ABOUTME: Buffers partial reads and yields whole raw frames without decoding them

use crate::frame;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Reads whole CMPP frames from a byte stream
///
/// The client only needs the raw bytes of each frame: the sequence id is
/// read at a fixed offset and the frame is then handed, undecoded, to
/// whoever is waiting for it. Decoding happens at the receiver.
#[derive(Debug)]
pub struct FrameReader<R> {
    stream: R,

    // The buffer for reading frames.
    buffer: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a new `FrameReader`, backed by `stream`.
    pub fn new(stream: R) -> FrameReader<R> {
        Self::with_capacity(stream, 4 * 1024)
    }

    pub fn with_capacity(stream: R, capacity: usize) -> FrameReader<R> {
        FrameReader {
            stream,
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Read a single frame from the underlying stream.
    ///
    /// The function waits until it has retrieved enough data to hold a whole
    /// frame. Any data remaining in the read buffer after the frame has been
    /// split off is kept there for the next call.
    ///
    /// # Returns
    ///
    /// On success, the received frame is returned. If the stream is closed
    /// in a way that doesn't break a frame in half, it returns `None`.
    /// Otherwise, an error is returned.
    pub async fn read_frame(&mut self) -> crate::Result<Option<Bytes>> {
        loop {
            if let Some(frame) = self.parse_frame()? {
                return Ok(Some(frame));
            }

            // `0` indicates "end of stream".
            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                // The remote closed the connection. For this to be a clean
                // shutdown, there should be no data in the read buffer.
                return self
                    .buffer
                    .is_empty()
                    .then_some(None)
                    .ok_or_else(|| "connection reset by peer".into());
            }
        }
    }

    fn parse_frame(&mut self) -> crate::Result<Option<Bytes>> {
        match frame::check(&self.buffer) {
            Ok(len) => Ok(Some(self.buffer.split_to(len).freeze())),
            // Expected while a frame is still arriving.
            Err(frame::Error::Incomplete) => Ok(None),
            // The stream is now unusable; the caller closes the connection.
            Err(e) => Err(e.into()),
        }
    }

    /// Give back the underlying stream
    pub fn into_inner(self) -> R {
        self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{peek_sequence_id, Encodable};
    use crate::datatypes::{ActiveTest, SubmitResponse};
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn reads_frames_split_across_writes() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut reader = FrameReader::new(client);

        let first = ActiveTest::new(1).to_bytes().unwrap();
        let second = SubmitResponse::new(2, 77, 0).to_bytes().unwrap();

        let mut wire = first.to_vec();
        wire.extend_from_slice(&second);
        tokio::spawn(async move {
            for piece in wire.chunks(5) {
                server.write_all(piece).await.unwrap();
                tokio::task::yield_now().await;
            }
        });

        let frame = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(frame, first);
        let frame = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(peek_sequence_id(&frame), 2);
        assert!(reader.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn truncated_frame_is_an_error() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut reader = FrameReader::new(client);

        server.write_all(&[0, 0, 0, 21, 0x80, 0, 0, 4]).await.unwrap();
        drop(server);

        assert!(reader.read_frame().await.is_err());
    }

    #[tokio::test]
    async fn garbage_length_is_an_error() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut reader = FrameReader::new(client);

        server.write_all(&[0, 0, 0, 3, 1, 2, 3, 4]).await.unwrap();
        assert!(reader.read_frame().await.is_err());
    }
}
