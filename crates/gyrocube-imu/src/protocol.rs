use crate::types::{SensorEvent, SensorKind, SensorSample};
use std::collections::VecDeque;
use thiserror::Error;

/// Frame start marker ("GC").
const MAGIC: [u8; 2] = [0x47, 0x43];

const KIND_ACCELEROMETER: u8 = 1;
const KIND_GYROSCOPE: u8 = 2;

/// MAGIC (2) + kind (1) + 3 x f32 (12) + i64 timestamp (8).
pub const FRAME_LEN: usize = 23;

const KIND_OFFSET: usize = 2;
const VALUES_OFFSET: usize = 3;
const TIMESTAMP_OFFSET: usize = 15;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unknown sensor kind {0:#04x}")]
    UnknownSensor(u8),
}

/// Streaming parser for the multiplexed accelerometer/gyroscope feed.
///
/// Feed raw bytes via `push_data`, then drain events via `next_event`.
///
/// Frames carry no checksum. Line noise containing `"GC"` followed by a
/// valid kind byte decodes as one bogus event and costs the real frame it
/// overlaps; the parser is back in sync at the next frame boundary.
pub struct FrameParser {
    buffer: VecDeque<u8>,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(4096),
        }
    }

    /// Append received bytes to the internal buffer.
    pub fn push_data(&mut self, data: &[u8]) {
        self.buffer.extend(data);
    }

    /// Try to extract the next complete frame from the buffer.
    /// Returns `None` if no complete frame is available yet.
    pub fn next_event(&mut self) -> Option<Result<SensorEvent, ProtocolError>> {
        let (start, frame) = {
            let buf = self.buffer.make_contiguous();

            let Some(start) = find_pattern(buf, &MAGIC) else {
                // Keep a trailing byte that may be the first half of MAGIC.
                let keep = usize::from(buf.last() == Some(&MAGIC[0]));
                let discard = buf.len() - keep;
                self.buffer.drain(..discard);
                return None;
            };

            if buf.len() - start < FRAME_LEN {
                self.buffer.drain(..start);
                return None;
            }

            let mut frame = [0u8; FRAME_LEN];
            frame.copy_from_slice(&buf[start..start + FRAME_LEN]);
            (start, frame)
        };

        let result = decode_frame(&frame);
        // A bad kind byte means a false MAGIC: skip only the marker so a real
        // frame starting inside those 23 bytes is still found.
        let consumed = if result.is_ok() { FRAME_LEN } else { MAGIC.len() };
        self.buffer.drain(..start + consumed);
        Some(result)
    }
}

fn decode_frame(frame: &[u8; FRAME_LEN]) -> Result<SensorEvent, ProtocolError> {
    let kind = match frame[KIND_OFFSET] {
        KIND_ACCELEROMETER => SensorKind::Accelerometer,
        KIND_GYROSCOPE => SensorKind::Gyroscope,
        other => return Err(ProtocolError::UnknownSensor(other)),
    };

    let f = |offset: usize| {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&frame[offset..offset + 4]);
        f32::from_le_bytes(bytes)
    };
    let mut ts = [0u8; 8];
    ts.copy_from_slice(&frame[TIMESTAMP_OFFSET..]);

    Ok(SensorEvent {
        kind,
        sample: SensorSample::new(
            f(VALUES_OFFSET),
            f(VALUES_OFFSET + 4),
            f(VALUES_OFFSET + 8),
            i64::from_le_bytes(ts),
        ),
    })
}

/// Serialize an event into a single frame.
pub fn encode_event(event: &SensorEvent) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[..MAGIC.len()].copy_from_slice(&MAGIC);
    frame[KIND_OFFSET] = match event.kind {
        SensorKind::Accelerometer => KIND_ACCELEROMETER,
        SensorKind::Gyroscope => KIND_GYROSCOPE,
    };
    let v = event.sample.value;
    for (i, component) in [v.x, v.y, v.z].into_iter().enumerate() {
        let offset = VALUES_OFFSET + i * 4;
        frame[offset..offset + 4].copy_from_slice(&component.to_le_bytes());
    }
    frame[TIMESTAMP_OFFSET..].copy_from_slice(&event.sample.timestamp.to_le_bytes());
    frame
}

/// Find the first occurrence of `pattern` in `data`.
fn find_pattern(data: &[u8], pattern: &[u8]) -> Option<usize> {
    data.windows(pattern.len())
        .position(|window| window == pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gyro_frame(x: f32, y: f32, z: f32, timestamp: i64) -> [u8; FRAME_LEN] {
        encode_event(&SensorEvent {
            kind: SensorKind::Gyroscope,
            sample: SensorSample::new(x, y, z, timestamp),
        })
    }

    #[test]
    fn parse_single_frame() {
        let frame = encode_event(&SensorEvent {
            kind: SensorKind::Accelerometer,
            sample: SensorSample::new(0.1, -0.2, 9.81, 123_456_789),
        });
        let mut parser = FrameParser::new();
        parser.push_data(&frame);

        let event = parser.next_event().unwrap().unwrap();
        assert_eq!(event.kind, SensorKind::Accelerometer);
        assert!((event.sample.value.x - 0.1).abs() < 1e-6);
        assert!((event.sample.value.y + 0.2).abs() < 1e-6);
        assert!((event.sample.value.z - 9.81).abs() < 1e-6);
        assert_eq!(event.sample.timestamp, 123_456_789);

        // No more frames.
        assert!(parser.next_event().is_none());
    }

    #[test]
    fn parse_fragmented_data() {
        let frame = gyro_frame(0.5, -0.5, 0.1, 42);
        let mid = frame.len() / 2;

        let mut parser = FrameParser::new();

        // Feed first half — no complete frame yet.
        parser.push_data(&frame[..mid]);
        assert!(parser.next_event().is_none());

        // Feed second half — now we can parse.
        parser.push_data(&frame[mid..]);
        let event = parser.next_event().unwrap().unwrap();
        assert_eq!(event.kind, SensorKind::Gyroscope);
        assert_eq!(event.sample.timestamp, 42);
    }

    #[test]
    fn parse_multiple_frames() {
        let mut parser = FrameParser::new();
        parser.push_data(&gyro_frame(1.0, 0.0, 0.0, 1));
        parser.push_data(&gyro_frame(2.0, 0.0, 0.0, 2));

        let e1 = parser.next_event().unwrap().unwrap();
        assert!((e1.sample.value.x - 1.0).abs() < 1e-6);

        let e2 = parser.next_event().unwrap().unwrap();
        assert!((e2.sample.value.x - 2.0).abs() < 1e-6);

        assert!(parser.next_event().is_none());
    }

    #[test]
    fn resyncs_after_garbage() {
        let mut parser = FrameParser::new();
        parser.push_data(&[0xff, 0x00, 0x47, 0x13]);
        parser.push_data(&gyro_frame(3.0, 0.0, 0.0, 7));

        let event = parser.next_event().unwrap().unwrap();
        assert_eq!(event.sample.timestamp, 7);
        assert!(parser.next_event().is_none());
    }

    #[test]
    fn magic_split_across_pushes() {
        let frame = gyro_frame(0.0, 0.0, 1.0, 9);
        let mut parser = FrameParser::new();
        parser.push_data(&[0xaa, frame[0]]);
        assert!(parser.next_event().is_none());

        parser.push_data(&frame[1..]);
        let event = parser.next_event().unwrap().unwrap();
        assert_eq!(event.sample.timestamp, 9);
    }

    #[test]
    fn false_magic_with_unknown_kind_keeps_following_frame() {
        let mut parser = FrameParser::new();
        parser.push_data(&[0x47, 0x43, 0x09]);
        parser.push_data(&gyro_frame(1.0, 0.0, 0.0, 11));

        assert_eq!(
            parser.next_event().unwrap().unwrap_err(),
            ProtocolError::UnknownSensor(0x09)
        );
        let event = parser.next_event().unwrap().unwrap();
        assert_eq!(event.sample.timestamp, 11);
        assert!(parser.next_event().is_none());
    }

    #[test]
    fn false_magic_with_valid_kind_recovers_within_one_frame() {
        let mut parser = FrameParser::new();
        parser.push_data(&[0x47, 0x43, KIND_GYROSCOPE]);
        parser.push_data(&gyro_frame(1.0, 0.0, 0.0, 11));
        parser.push_data(&gyro_frame(2.0, 0.0, 0.0, 12));

        let mut events = Vec::new();
        while let Some(result) = parser.next_event() {
            events.push(result);
        }

        // One bogus event swallows the first real frame; the next is intact.
        assert!(events.len() <= 2, "{events:?}");
        let last = events.last().unwrap().as_ref().unwrap();
        assert_eq!(last.sample.timestamp, 12);
        assert!((last.sample.value.x - 2.0).abs() < 1e-6);
    }

    #[test]
    fn unknown_kind_is_reported_and_skipped() {
        let mut bad = gyro_frame(0.0, 0.0, 0.0, 0);
        bad[KIND_OFFSET] = 0x07;

        let mut parser = FrameParser::new();
        parser.push_data(&bad);
        parser.push_data(&gyro_frame(0.0, 0.0, 0.0, 5));

        assert_eq!(
            parser.next_event().unwrap().unwrap_err(),
            ProtocolError::UnknownSensor(0x07)
        );
        let event = parser.next_event().unwrap().unwrap();
        assert_eq!(event.sample.timestamp, 5);
    }
}
