//! Shared door harness for the controller integration tests.
//!
//! Wires a [`DoorController`] to mock pins and a [`MemoryStore`], and keeps
//! the pin handles and a manual clock for driving it.

#![allow(dead_code)]

use doorman_controller::{ControllerConfig, DoorController, Pins, SystemRequest};
use doorman_hardware::mock::{MockInput, MockInputHandle, MockOutput, MockOutputHandle};
use doorman_storage::{MemoryStore, SettingsDocument};
use doorman_wiegand::{BitFrame, EdgeSender};
use std::time::{Duration, Instant};

pub const TICK: Duration = Duration::from_millis(10);
pub const BIT_INTERVAL: Duration = Duration::from_millis(2);

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

pub struct TestDoor {
    pub controller: DoorController,
    pub edges: EdgeSender,
    pub relay: MockOutputHandle,
    pub led: MockOutputHandle,
    pub door: MockInputHandle,
    pub aux: MockInputHandle,
    pub reset: MockInputHandle,
    pub store: MemoryStore,
    pub now: Instant,
}

impl TestDoor {
    /// Door with default settings and no debounce.
    pub fn new() -> Self {
        Self::with_document(SettingsDocument::default())
    }

    pub fn with_document(document: SettingsDocument) -> Self {
        let config = ControllerConfig {
            debounce: Duration::ZERO,
            ..ControllerConfig::default()
        };
        Self::build(config, MemoryStore::with_document(document))
    }

    /// Door closed, exit switch and reset button released (inputs are
    /// active low).
    pub fn build(config: ControllerConfig, store: MemoryStore) -> Self {
        let (relay_pin, relay) = MockOutput::new("relay");
        let (led_pin, led) = MockOutput::new("led");
        let (door_pin, door) = MockInput::new("door", false);
        let (aux_pin, aux) = MockInput::new("aux", true);
        let (reset_pin, reset) = MockInput::new("reset", true);

        let pins = Pins {
            relay: Box::new(relay_pin),
            led: Box::new(led_pin),
            door: Box::new(door_pin),
            aux: Box::new(aux_pin),
            reset: Box::new(reset_pin),
        };

        let now = Instant::now();
        let (controller, edges) = DoorController::new(config, pins, Box::new(store.clone()), now);

        Self {
            controller,
            edges,
            relay,
            led,
            door,
            aux,
            reset,
            store,
            now,
        }
    }

    /// Tick once at the current instant.
    pub fn tick(&mut self) -> Option<SystemRequest> {
        self.controller.tick(self.now)
    }

    /// Tick every 10 ms until `duration` has passed, collecting requests.
    pub fn advance(&mut self, duration: Duration) -> Vec<SystemRequest> {
        let end = self.now + duration;
        let mut requests = Vec::new();
        while self.now < end {
            self.now = (self.now + TICK).min(end);
            if let Some(request) = self.controller.tick(self.now) {
                requests.push(request);
            }
        }
        requests
    }

    /// Clock `frame` onto the data lines starting now.
    pub fn send_frame(&mut self, frame: &BitFrame) {
        for edge in frame.edges(self.now, BIT_INTERVAL) {
            assert!(self.edges.send(edge.line, edge.at));
        }
    }

    /// Present a card and let the frame complete.
    pub fn present(&mut self, code: u64, bits: usize) {
        let frame = BitFrame::encode(code, bits).unwrap();
        self.send_frame(&frame);
        self.advance(ms(100));
    }

    pub fn log(&self) -> Vec<String> {
        self.controller.snapshot_log()
    }

    /// Number of log entries whose message equals `message`.
    pub fn count(&self, message: &str) -> usize {
        self.controller
            .log()
            .iter()
            .filter(|line| message_of(line) == message)
            .count()
    }

    pub fn logged(&self, message: &str) -> bool {
        self.count(message) > 0
    }
}

/// Log line without its `[<n>s] ` prefix.
pub fn message_of(line: &str) -> &str {
    line.split_once("] ").map(|(_, message)| message).unwrap_or(line)
}
