//! Frame-gap driven Wiegand decoder.
//!
//! The decoder collects edges into a [`BitFrame`] and closes the frame once
//! the data lines have been silent for the configured gap. Every completed
//! frame yields exactly one [`DecodeEvent`]; the accumulator is always reset
//! afterwards, so no bits carry over into the next presentation.

use crate::{
    edge_queue::{EdgeQueue, EdgeReceiver, EdgeSender},
    error::DecodeError,
    frame::{BitFrame, Edge},
};
use doorman_core::{
    Credential, DataLine, WiegandMode,
    constants::{EDGE_QUEUE_CAPACITY, FRAME_GAP_MS},
};
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Decoder tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Which frame lengths are decoded.
    pub mode: WiegandMode,

    /// Line silence that completes a frame.
    pub frame_gap: Duration,

    /// Reject frames with wrong parity bits.
    pub check_parity: bool,

    /// Capacity of the edge queue.
    pub queue_capacity: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            mode: WiegandMode::Auto,
            frame_gap: Duration::from_millis(FRAME_GAP_MS),
            check_parity: true,
            queue_capacity: EDGE_QUEUE_CAPACITY,
        }
    }
}

impl DecoderConfig {
    pub fn with_mode(mut self, mode: WiegandMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_frame_gap(mut self, gap: Duration) -> Self {
        self.frame_gap = gap;
        self
    }

    pub fn with_parity_check(mut self, enabled: bool) -> Self {
        self.check_parity = enabled;
        self
    }
}

/// Outcome of one completed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    /// A valid frame accepted by the current mode.
    Decoded(Credential),

    /// A valid-length frame the fixed mode does not accept.
    Ignored { bits: usize, mode: WiegandMode },

    /// A frame that could not be decoded.
    Failed(DecodeError),
}

impl fmt::Display for DecodeEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeEvent::Decoded(credential) => {
                write!(f, "Wiegand({}): {}", credential.frame_length, credential.code)
            }
            DecodeEvent::Ignored { bits, mode } => {
                write!(f, "Wiegand({bits}) ignored (mode {mode})")
            }
            DecodeEvent::Failed(error) => write!(f, "Wiegand decode failed: {error}"),
        }
    }
}

/// Wiegand decoder owned by the poll loop.
///
/// # Examples
///
/// ```
/// use doorman_wiegand::{BitFrame, DecodeEvent, DecoderConfig, WiegandDecoder};
/// use std::time::{Duration, Instant};
///
/// let (mut decoder, edges) = WiegandDecoder::new(DecoderConfig::default());
/// let start = Instant::now();
///
/// for edge in BitFrame::encode(12345, 26).unwrap().edges(start, Duration::from_millis(2)) {
///     edges.send(edge.line, edge.at);
/// }
///
/// let later = start + Duration::from_millis(100);
/// match decoder.poll(later) {
///     Some(DecodeEvent::Decoded(credential)) => assert_eq!(credential.code, 12345),
///     other => panic!("unexpected outcome: {other:?}"),
/// }
/// ```
#[derive(Debug)]
pub struct WiegandDecoder {
    config: DecoderConfig,
    edges: EdgeReceiver,
    frame: BitFrame,
    /// Edges seen for the open frame, including those past capacity.
    seen: usize,
    last_edge: Option<Instant>,
    /// Queue drop counter at the start of the open frame.
    dropped_mark: u64,
    completed: VecDeque<DecodeEvent>,
}

impl WiegandDecoder {
    /// Create a decoder together with the sender for its edge queue.
    pub fn new(config: DecoderConfig) -> (Self, EdgeSender) {
        let (sender, edges) = EdgeQueue::bounded(config.queue_capacity);
        let dropped_mark = edges.dropped();
        let decoder = Self {
            config,
            edges,
            frame: BitFrame::new(),
            seen: 0,
            last_edge: None,
            dropped_mark,
            completed: VecDeque::new(),
        };
        (decoder, sender)
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn mode(&self) -> WiegandMode {
        self.config.mode
    }

    /// Switch the accepted frame lengths. Takes effect for the next frame.
    pub fn set_mode(&mut self, mode: WiegandMode) {
        self.config.mode = mode;
    }

    /// Number of bits accumulated for the open frame.
    pub fn pending_bits(&self) -> usize {
        self.seen
    }

    /// Record one falling edge.
    ///
    /// An edge arriving after the frame gap first completes the open frame.
    pub fn on_edge(&mut self, line: DataLine, at: Instant) {
        if let Some(last) = self.last_edge
            && at.saturating_duration_since(last) >= self.config.frame_gap
        {
            self.complete_frame();
        }

        self.frame.push(line.bit());
        self.seen += 1;
        self.last_edge = Some(at);
    }

    /// Drain queued edges and complete the open frame if the gap has elapsed.
    ///
    /// Returns the oldest completed frame outcome. Call repeatedly until it
    /// returns `None` to observe every frame.
    pub fn poll(&mut self, now: Instant) -> Option<DecodeEvent> {
        while let Some(Edge { line, at }) = self.edges.try_recv() {
            self.on_edge(line, at);
        }

        if let Some(last) = self.last_edge
            && now.saturating_duration_since(last) >= self.config.frame_gap
        {
            self.complete_frame();
        }

        self.completed.pop_front()
    }

    fn complete_frame(&mut self) {
        let event = self.classify();
        match &event {
            DecodeEvent::Decoded(credential) => {
                debug!(bits = credential.frame_length, code = credential.code, "Frame decoded");
            }
            DecodeEvent::Ignored { bits, mode } => {
                debug!(bits, %mode, "Frame ignored by mode");
            }
            DecodeEvent::Failed(error) => {
                warn!(bits = self.seen, %error, "Frame rejected");
            }
        }
        self.completed.push_back(event);

        self.frame.clear();
        self.seen = 0;
        self.last_edge = None;
        self.dropped_mark = self.edges.dropped();
    }

    fn classify(&self) -> DecodeEvent {
        let bits = self.seen;
        let dropped = self.edges.dropped().saturating_sub(self.dropped_mark);

        if dropped > 0 {
            return DecodeEvent::Failed(DecodeError::EdgesDropped { dropped });
        }
        if bits > self.frame.len() {
            return DecodeEvent::Failed(DecodeError::Overflow { bits });
        }
        if !doorman_core::constants::SUPPORTED_FRAME_LENGTHS.contains(&bits) {
            return DecodeEvent::Failed(DecodeError::UnsupportedLength { bits });
        }
        if !self.config.mode.accepts(bits) {
            return DecodeEvent::Ignored {
                bits,
                mode: self.config.mode,
            };
        }
        if self.config.check_parity && !self.frame.parity_ok() {
            return DecodeEvent::Failed(DecodeError::Parity { bits });
        }

        DecodeEvent::Decoded(Credential::new(self.frame.code(), bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const BIT: Duration = Duration::from_millis(2);

    fn feed(decoder: &mut WiegandDecoder, frame: &BitFrame, start: Instant) -> Instant {
        let edges = frame.edges(start, BIT);
        let last = edges.last().map_or(start, |e| e.at);
        for edge in edges {
            decoder.on_edge(edge.line, edge.at);
        }
        last
    }

    fn decoder() -> WiegandDecoder {
        WiegandDecoder::new(DecoderConfig::default()).0
    }

    #[rstest]
    #[case(26, 12345)]
    #[case(34, 0x1234_5678)]
    #[case(36, 0x2_0000_0001)]
    fn test_decodes_supported_lengths(#[case] bits: usize, #[case] code: u64) {
        let mut decoder = decoder();
        let start = Instant::now();
        let last = feed(&mut decoder, &BitFrame::encode(code, bits).unwrap(), start);

        assert_eq!(
            decoder.poll(last + Duration::from_millis(25)),
            Some(DecodeEvent::Decoded(Credential::new(code, bits)))
        );
        assert_eq!(decoder.poll(last + Duration::from_millis(100)), None);
        assert_eq!(decoder.pending_bits(), 0);
    }

    #[test]
    fn test_waits_for_gap() {
        let mut decoder = decoder();
        let start = Instant::now();
        let last = feed(&mut decoder, &BitFrame::encode(1, 26).unwrap(), start);

        assert_eq!(decoder.poll(last + Duration::from_millis(24)), None);
        assert_eq!(decoder.pending_bits(), 26);
        assert!(decoder.poll(last + Duration::from_millis(25)).is_some());
    }

    #[test]
    fn test_unsupported_length_fails() {
        let mut decoder = decoder();
        let start = Instant::now();
        for i in 0..32u32 {
            decoder.on_edge(DataLine::D0, start + BIT * i);
        }
        let event = decoder.poll(start + Duration::from_secs(1));
        assert_eq!(
            event,
            Some(DecodeEvent::Failed(DecodeError::UnsupportedLength { bits: 32 }))
        );
    }

    #[test]
    fn test_fixed_mode_ignores_other_lengths() {
        let config = DecoderConfig::default().with_mode(WiegandMode::Fixed(26));
        let (mut decoder, _tx) = WiegandDecoder::new(config);
        let start = Instant::now();
        let last = feed(&mut decoder, &BitFrame::encode(99, 34).unwrap(), start);

        let event = decoder.poll(last + Duration::from_millis(30)).unwrap();
        assert_eq!(
            event,
            DecodeEvent::Ignored {
                bits: 34,
                mode: WiegandMode::Fixed(26)
            }
        );
        assert_eq!(event.to_string(), "Wiegand(34) ignored (mode 26)");
    }

    #[test]
    fn test_parity_failure_and_disable() {
        let frame = BitFrame::encode(12345, 26).unwrap();
        let mut corrupted = BitFrame::new();
        for (i, bit) in frame.bits().enumerate() {
            corrupted.push(if i == 0 { !bit } else { bit });
        }

        let mut strict = decoder();
        let start = Instant::now();
        let last = feed(&mut strict, &corrupted, start);
        assert_eq!(
            strict.poll(last + Duration::from_millis(30)),
            Some(DecodeEvent::Failed(DecodeError::Parity { bits: 26 }))
        );

        let config = DecoderConfig::default().with_parity_check(false);
        let (mut lenient, _tx) = WiegandDecoder::new(config);
        let last = feed(&mut lenient, &corrupted, start);
        assert_eq!(
            lenient.poll(last + Duration::from_millis(30)),
            Some(DecodeEvent::Decoded(Credential::new(12345, 26)))
        );
    }

    #[test]
    fn test_overflow_fails() {
        let mut decoder = decoder();
        let start = Instant::now();
        for i in 0..70u32 {
            decoder.on_edge(DataLine::D1, start + Duration::from_micros(100) * i);
        }
        assert_eq!(
            decoder.poll(start + Duration::from_secs(1)),
            Some(DecodeEvent::Failed(DecodeError::Overflow { bits: 70 }))
        );
    }

    #[test]
    fn test_late_edge_completes_previous_frame() {
        let mut decoder = decoder();
        let start = Instant::now();
        let last = feed(&mut decoder, &BitFrame::encode(1, 26).unwrap(), start);
        let second_start = last + Duration::from_millis(40);
        let second_last = feed(&mut decoder, &BitFrame::encode(2, 26).unwrap(), second_start);

        let now = second_last + Duration::from_millis(30);
        assert_eq!(
            decoder.poll(now),
            Some(DecodeEvent::Decoded(Credential::new(1, 26)))
        );
        assert_eq!(
            decoder.poll(now),
            Some(DecodeEvent::Decoded(Credential::new(2, 26)))
        );
        assert_eq!(decoder.poll(now), None);
    }

    #[test]
    fn test_queue_drops_fail_frame() {
        let config = DecoderConfig {
            queue_capacity: 8,
            ..DecoderConfig::default()
        };
        let (mut decoder, tx) = WiegandDecoder::new(config);
        let start = Instant::now();
        for edge in BitFrame::encode(3, 26).unwrap().edges(start, BIT) {
            tx.send(edge.line, edge.at);
        }

        let event = decoder.poll(start + Duration::from_secs(1));
        assert_eq!(
            event,
            Some(DecodeEvent::Failed(DecodeError::EdgesDropped { dropped: 18 }))
        );
    }

    #[test]
    fn test_display_for_log() {
        let event = DecodeEvent::Decoded(Credential::new(12345, 26));
        assert_eq!(event.to_string(), "Wiegand(26): 12345");
    }
}
