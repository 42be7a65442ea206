//! Audio frame types.
//!
//! The gateway does not transcode audio: frames are passed through to the
//! STT bridge exactly as the client sent them. This module only carries the
//! metadata needed to pick the right recognizer configuration and to buffer
//! frames for retry.

use serde::{Deserialize, Serialize};

/// Encoding of the client's audio stream, selected from the `start_stream`
/// message (or the stream's MIME type for browser uploads).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioEncoding {
    /// Little-endian 16-bit PCM, mono, 48kHz.
    #[default]
    Pcm16Le,
    /// Opus inside a WebM container.
    OpusWebm,
    /// Opus inside an Ogg container.
    OpusOgg,
}

impl AudioEncoding {
    pub fn from_mime(mime: &str) -> Self {
        match mime {
            m if m.contains("webm") => Self::OpusWebm,
            m if m.contains("ogg") => Self::OpusOgg,
            _ => Self::Pcm16Le,
        }
    }

    /// The `Content-Type` the recognizer request carries for this encoding
    /// (the inverse of [`Self::from_mime`]).
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Pcm16Le => "audio/pcm",
            Self::OpusWebm => "audio/webm;codecs=opus",
            Self::OpusOgg => "audio/ogg;codecs=opus",
        }
    }
}

/// One binary audio frame pushed by the client into the STT bridge.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub bytes: Vec<u8>,
    pub sequence: u64,
}

impl AudioFrame {
    pub fn new(bytes: Vec<u8>, sequence: u64) -> Self {
        Self { bytes, sequence }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Accumulates audio frames for the STT bridge's single-retry-by-replay path.
///
/// Bounded: once `max_bytes` is exceeded, retry is disabled for the session
/// rather than letting the buffer grow unbounded (§4.2).
#[derive(Debug)]
pub struct AudioReplayBuffer {
    bytes: Vec<u8>,
    max_bytes: usize,
    overflowed: bool,
}

impl AudioReplayBuffer {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            bytes: Vec::new(),
            max_bytes,
            overflowed: false,
        }
    }

    pub fn push(&mut self, frame: &AudioFrame) {
        if self.overflowed {
            return;
        }
        if self.bytes.len() + frame.len() > self.max_bytes {
            self.overflowed = true;
            self.bytes.clear();
            return;
        }
        self.bytes.extend_from_slice(&frame.bytes);
    }

    /// Whether a retry replay is still possible (buffer never overflowed).
    pub fn can_retry(&self) -> bool {
        !self.overflowed
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
        self.overflowed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_selects_encoding() {
        assert_eq!(AudioEncoding::from_mime("audio/webm;codecs=opus"), AudioEncoding::OpusWebm);
        assert_eq!(AudioEncoding::from_mime("audio/ogg"), AudioEncoding::OpusOgg);
        assert_eq!(AudioEncoding::from_mime("audio/pcm"), AudioEncoding::Pcm16Le);
    }

    #[test]
    fn content_type_round_trips_through_from_mime() {
        for encoding in [AudioEncoding::Pcm16Le, AudioEncoding::OpusWebm, AudioEncoding::OpusOgg] {
            assert_eq!(AudioEncoding::from_mime(encoding.content_type()), encoding);
        }
    }

    #[test]
    fn replay_buffer_disables_retry_past_cap() {
        let mut buf = AudioReplayBuffer::new(10);
        buf.push(&AudioFrame::new(vec![0u8; 6], 0));
        assert!(buf.can_retry());
        buf.push(&AudioFrame::new(vec![0u8; 6], 1));
        assert!(!buf.can_retry());
        assert!(buf.bytes().is_empty());
    }

    #[test]
    fn replay_buffer_accumulates_in_order() {
        let mut buf = AudioReplayBuffer::new(1024);
        buf.push(&AudioFrame::new(vec![1, 2], 0));
        buf.push(&AudioFrame::new(vec![3, 4], 1));
        assert_eq!(buf.bytes(), &[1, 2, 3, 4]);
    }
}
