// ABOUTME: Long-message segmentation with a concatenation header (UDHI) and destination batching
// ABOUTME: Produces the cross product of destination batches and content segments for one submit

use crate::client::error::{SmsError, SmsResult};
use crate::client::sequence::SequenceAllocator;
use crate::client::traits::Protocol;
use crate::client::types::Segment;
use bytes::{BufMut, Bytes, BytesMut};

/// Bytes of the concatenation header written before each long-message segment
pub const CONCAT_HEADER_LEN: usize = 6;

/// Number of segments needed for `len` bytes of content
pub fn segment_count(len: usize, limit: usize, header_len: usize) -> usize {
    if len <= limit {
        1
    } else {
        len.div_ceil(limit - header_len)
    }
}

/// Split `content` into segments of at most `limit` bytes
///
/// Content that fits is returned as a single segment without a header.
/// Otherwise every segment is `[0x05, 0x00, 0x03, id, total, index]`
/// followed by `limit - header_len` bytes of content (less for the last).
pub fn split(content: &Bytes, limit: usize, header_len: usize, id: u8) -> SmsResult<Vec<Segment>> {
    if header_len < CONCAT_HEADER_LEN || limit <= header_len {
        return Err(SmsError::InvalidData(format!(
            "segment limit {limit} cannot hold a {header_len} byte header"
        )));
    }

    let total = segment_count(content.len(), limit, header_len);
    if total == 1 {
        return Ok(vec![Segment::single(content.clone())]);
    }
    let total = u8::try_from(total)
        .map_err(|_| SmsError::InvalidData(format!("content needs {total} segments, max 255")))?;

    let chunk = limit - header_len;
    let segments = content
        .chunks(chunk)
        .zip(1..=total)
        .map(|(piece, index)| {
            let mut payload = BytesMut::with_capacity(header_len + piece.len());
            payload.put_slice(&[0x05, 0x00, 0x03, id, total, index]);
            payload.put_bytes(0, header_len - CONCAT_HEADER_LEN);
            payload.put_slice(piece);

            Segment {
                payload: payload.freeze(),
                udhi: true,
                index,
                total,
            }
        })
        .collect();

    Ok(segments)
}

/// Build every submit needed to send `content` to `destinations`
///
/// Destinations are grouped in batches of `max_destinations()`; each batch
/// gets its own concatenation id and every message its own sequence id.
pub fn package<P: Protocol>(
    protocol: &P,
    credentials: &P::Credentials,
    destinations: &[String],
    content: &str,
    sequence: &SequenceAllocator,
) -> SmsResult<Vec<P::Message>> {
    if destinations.is_empty() {
        return Err(SmsError::InvalidData("no destinations".to_string()));
    }

    let payload = protocol.encode_content(content);
    let batch_size = protocol.max_destinations().max(1);

    let mut messages = Vec::new();
    for batch in destinations.chunks(batch_size) {
        let id: u8 = rand::random();
        for segment in split(
            &payload,
            protocol.segment_limit(),
            protocol.udhi_header_len(),
            id,
        )? {
            messages.push(protocol.submit_request(credentials, batch, &segment, sequence.next())?);
        }
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(len: usize) -> Bytes {
        (0..len).map(|i| i as u8).collect::<Vec<u8>>().into()
    }

    #[test]
    fn short_content_is_sent_verbatim() {
        let data = content(140);
        let segments = split(&data, 140, 6, 9).unwrap();

        assert_eq!(segments, vec![Segment::single(data)]);
    }

    #[test]
    fn empty_content_is_one_segment() {
        let segments = split(&Bytes::new(), 140, 6, 1).unwrap();
        assert_eq!(segments.len(), 1);
        assert!(segments[0].payload.is_empty());
        assert!(!segments[0].udhi);
    }

    #[test]
    fn splits_150_bytes_in_two() {
        let data = content(150);
        let segments = split(&data, 140, 6, 0xAB).unwrap();

        assert_eq!(segments.len(), 2);
        assert_eq!(&segments[0].payload[..6], &[0x05, 0x00, 0x03, 0xAB, 2, 1]);
        assert_eq!(&segments[0].payload[6..], &data[0..134]);
        assert_eq!(&segments[1].payload[..6], &[0x05, 0x00, 0x03, 0xAB, 2, 2]);
        assert_eq!(&segments[1].payload[6..], &data[134..150]);
        assert!(segments.iter().all(|s| s.udhi && s.total == 2));
    }

    #[test]
    fn segments_reassemble_without_drift() {
        for len in [141, 268, 269, 500, 1000] {
            let data = content(len);
            let segments = split(&data, 140, 6, 7).unwrap();

            assert_eq!(segments.len(), len.div_ceil(134));
            let mut joined = Vec::new();
            for (i, segment) in segments.iter().enumerate() {
                assert_eq!(segment.index as usize, i + 1);
                assert_eq!(segment.payload[3], 7);
                assert!(segment.payload.len() <= 140);
                joined.extend_from_slice(&segment.payload[6..]);
            }
            assert_eq!(joined, data.to_vec());
        }
    }

    #[test]
    fn too_many_segments_is_rejected() {
        let data = content(134 * 256);
        assert!(matches!(
            split(&data, 140, 6, 0),
            Err(SmsError::InvalidData(_))
        ));
    }

    #[test]
    fn counts_segments() {
        assert_eq!(segment_count(0, 140, 6), 1);
        assert_eq!(segment_count(140, 140, 6), 1);
        assert_eq!(segment_count(141, 140, 6), 2);
        assert_eq!(segment_count(268, 140, 6), 2);
        assert_eq!(segment_count(269, 140, 6), 3);
    }
}
