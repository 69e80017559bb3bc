//! Incremental record decoder.
//!
//! Transports hand arbitrary chunks of bytes to [`LineDecoder::feed`]; the
//! decoder keeps whatever follows the last delimiter for the next call, so
//! the produced events do not depend on where the chunks were split.

use tracing::trace;
use virtual_pen_types::AccessoryEvent;

use crate::error::ProtocolError;
use crate::wire::{self, DELIMITER};

/// Largest unterminated tail tolerated before the peer is considered broken.
pub const MAX_PENDING_BYTES: usize = 4096;

/// Stateful decoder for one connection.
#[derive(Debug)]
pub struct LineDecoder {
    pending: Vec<u8>,
    /// Start of the first byte not yet handed out as part of a record.
    cursor: usize,
    limit: usize,
    decoded: u64,
    dropped: u64,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::with_limit(MAX_PENDING_BYTES)
    }

    /// Create a decoder with a custom unterminated-tail limit.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            pending: Vec::with_capacity(1024),
            cursor: 0,
            limit,
            decoded: 0,
            dropped: 0,
        }
    }

    /// Append `bytes` and iterate over the records they complete.
    ///
    /// Records are parsed lazily. Any records left unconsumed when the
    /// iterator is dropped are yielded by the next call. Malformed records
    /// are skipped.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Records<'_>, ProtocolError> {
        self.pending.extend_from_slice(bytes);

        let unterminated = match self.pending[self.cursor..]
            .iter()
            .rposition(|&b| b == DELIMITER)
        {
            Some(last) => self.pending.len() - (self.cursor + last + 1),
            None => self.pending.len() - self.cursor,
        };
        if unterminated > self.limit {
            return Err(ProtocolError::FramingOverflow {
                pending: unterminated,
                limit: self.limit,
            });
        }

        Ok(Records { decoder: self })
    }

    /// Bytes buffered but not yet decoded.
    pub fn pending_len(&self) -> usize {
        self.pending.len() - self.cursor
    }

    /// Records decoded successfully so far.
    pub fn decoded(&self) -> u64 {
        self.decoded
    }

    /// Malformed records dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn next_event(&mut self) -> Option<AccessoryEvent> {
        loop {
            let rest = &self.pending[self.cursor..];
            let end = rest.iter().position(|&b| b == DELIMITER)?;
            let line = &rest[..end];
            // Advance before parsing so no record is ever seen twice.
            let parsed = wire::parse_record(line);
            self.cursor += end + 1;
            match parsed {
                Ok(event) => {
                    self.decoded += 1;
                    return Some(event);
                }
                Err(e) => {
                    self.dropped += 1;
                    trace!(error = %e, "dropped malformed record");
                }
            }
        }
    }

    fn compact(&mut self) {
        if self.cursor > 0 {
            self.pending.drain(..self.cursor);
            self.cursor = 0;
        }
    }
}

/// Events completed by one [`LineDecoder::feed`] call.
#[derive(Debug)]
pub struct Records<'a> {
    decoder: &'a mut LineDecoder,
}

impl Iterator for Records<'_> {
    type Item = AccessoryEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.decoder.next_event()
    }
}

impl Drop for Records<'_> {
    fn drop(&mut self) {
        self.decoder.compact();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use virtual_pen_types::{MotionAction, ToolType};

    const STREAM: &[u8] = b"2,9,10,20,0.0,\n\
2,0,11,21,0.400000000,\n\
2,2,12,22,0.500000000,\n\
2,1,13,23,0.0,\n\
2,10,13,23,0.0,\n";

    fn decode_all(decoder: &mut LineDecoder, bytes: &[u8]) -> Vec<AccessoryEvent> {
        decoder.feed(bytes).unwrap().collect()
    }

    #[test]
    fn decodes_whole_stream() {
        let mut decoder = LineDecoder::new();
        let events = decode_all(&mut decoder, STREAM);
        assert_eq!(events.len(), 5);
        assert_eq!(events[0].action, MotionAction::HoverEnter);
        assert_eq!(events[4].action, MotionAction::HoverExit);
        assert_eq!(decoder.pending_len(), 0);
        assert_eq!(decoder.decoded(), 5);
    }

    #[test]
    fn split_points_do_not_change_output() {
        let expected = decode_all(&mut LineDecoder::new(), STREAM);

        for split in 0..=STREAM.len() {
            let mut decoder = LineDecoder::new();
            let mut events = decode_all(&mut decoder, &STREAM[..split]);
            events.extend(decode_all(&mut decoder, &STREAM[split..]));
            assert_eq!(events, expected, "split at {split}");
        }
    }

    #[test]
    fn byte_at_a_time() {
        let expected = decode_all(&mut LineDecoder::new(), STREAM);
        let mut decoder = LineDecoder::new();
        let events: Vec<_> = STREAM
            .chunks(1)
            .flat_map(|byte| decode_all(&mut decoder, byte))
            .collect();
        assert_eq!(events, expected);
    }

    #[test]
    fn partial_record_waits_for_delimiter() {
        let mut decoder = LineDecoder::new();
        assert!(decode_all(&mut decoder, b"2,2,1,2,0.5").is_empty());
        assert_eq!(decoder.pending_len(), 11);
        let events = decode_all(&mut decoder, b",\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tool, ToolType::Stylus);
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn malformed_records_do_not_disturb_neighbours() {
        let mut decoder = LineDecoder::new();
        let events = decode_all(
            &mut decoder,
            b"2,0,1,1,0.5,\n2,0,1,\n2,2,x,1,0.5,\n2,2,2,2,0.5,\n\n2,1,3,3,0.0,\n",
        );
        let xs: Vec<f64> = events.iter().map(|e| e.raw_x).collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0]);
        assert_eq!(decoder.dropped(), 3);
    }

    #[test]
    fn unconsumed_records_resume_on_next_feed() {
        let mut decoder = LineDecoder::new();
        {
            let mut records = decoder.feed(b"2,0,1,1,0.5,\n2,2,2,2,0.5,\n").unwrap();
            assert_eq!(records.next().map(|e| e.raw_x), Some(1.0));
        }
        let rest = decode_all(&mut decoder, b"2,1,3,3,0.0,\n");
        let xs: Vec<f64> = rest.iter().map(|e| e.raw_x).collect();
        assert_eq!(xs, vec![2.0, 3.0]);
    }

    #[test]
    fn unterminated_flood_is_an_error() {
        let mut decoder = LineDecoder::with_limit(16);
        assert!(decoder.feed(b"0123456789").is_ok());
        let err = decoder.feed(b"0123456789").unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::FramingOverflow {
                pending: 20,
                limit: 16
            }
        ));
    }

    #[test]
    fn long_terminated_chunk_is_not_an_overflow() {
        let mut decoder = LineDecoder::with_limit(16);
        let events = decode_all(&mut decoder, STREAM);
        assert_eq!(events.len(), 5);
    }
}
