//! The door controller: all application state and the tick that drives it.
//!
//! [`DoorController`] owns the settings, access table, rule table, event log,
//! Wiegand decoder, input classifiers, relay and scheduler. Nothing else
//! mutates them. Time only advances through the `now` passed to
//! [`tick`](DoorController::tick) and [`execute`](DoorController::execute),
//! so a whole door can be driven deterministically from a test.
//!
//! # Tick order
//!
//! ```text
//! reset button → Wiegand decoder → aux switch → door contact
//!              → schedules → relay deadline → status LED
//! ```
//!
//! # Examples
//!
//! ```
//! use doorman_controller::{Command, ControllerConfig, DoorController, Pins};
//! use doorman_core::{AuthorizedUser, Origin};
//! use doorman_hardware::mock::{MockInput, MockOutput};
//! use doorman_storage::MemoryStore;
//! use doorman_wiegand::BitFrame;
//! use std::time::{Duration, Instant};
//!
//! let (relay, relay_pin) = MockOutput::new("relay");
//! let (led, _) = MockOutput::new("led");
//! let (door, _) = MockInput::new("door", false);
//! let (aux, _) = MockInput::new("aux", true);
//! let (reset, _) = MockInput::new("reset", true);
//! let pins = Pins {
//!     relay: Box::new(relay),
//!     led: Box::new(led),
//!     door: Box::new(door),
//!     aux: Box::new(aux),
//!     reset: Box::new(reset),
//! };
//!
//! let t0 = Instant::now();
//! let store = Box::new(MemoryStore::new());
//! let (mut door_ctl, edges) = DoorController::new(ControllerConfig::default(), pins, store, t0);
//!
//! let alice = AuthorizedUser::new("alice", "12345");
//! door_ctl.execute(Command::AddUser(alice), Origin::Web, t0).unwrap();
//!
//! for edge in BitFrame::encode(12345, 26).unwrap().edges(t0, Duration::from_millis(2)) {
//!     edges.send(edge.line, edge.at);
//! }
//! door_ctl.tick(t0 + Duration::from_millis(100));
//!
//! assert!(relay_pin.level());
//! assert_eq!(door_ctl.log().last(), Some("[0s] Access granted for alice"));
//! ```

use crate::{
    commands::{Command, CommandReply, TopicRouter},
    dispatcher::{Notification, RuleOutcome, dispatch},
    error::{ControllerError, Result},
    event_log::EventLog,
    schedule::Scheduler,
};
use doorman_core::{
    AuthorizedUser, Credential, Event, Origin, Rule, VERSION,
    constants::{
        DEFAULT_DEBOUNCE_MS, DEFAULT_TICK_MS, FRAME_GAP_MS, GPIO_AUX, GPIO_DOOR_CLOSED,
        GPIO_DOOR_OPEN,
    },
};
use doorman_hardware::{
    ActiveInput, BusyPolicy, DigitalInput, DigitalOutput, EdgeDetector, HoldClassifier,
    HoldEvent, HoldState, HoldThresholds, InputEdge, Polarity, PulseOutcome, RelayActuator,
    RelayConfig, RelayTransition,
};
use doorman_storage::{
    AccessTable, DeviceSettings, RuleTable, SettingsDocument, SettingsStore, load_or_default,
};
use doorman_wiegand::{DecodeEvent, DecoderConfig, EdgeSender, WiegandDecoder};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Controller tuning. The defaults carry the documented constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Line silence that completes a Wiegand frame.
    pub frame_gap: Duration,

    /// Whether Wiegand parity bits are verified.
    pub check_parity: bool,

    /// Debounce window for the door, aux and reset inputs.
    pub debounce: Duration,

    /// Reset button hold thresholds.
    pub reset: HoldThresholds,

    /// Relay behavior while a pulse is active.
    pub busy_policy: BusyPolicy,

    /// Electrical level that energizes the relay.
    pub relay_polarity: Polarity,

    /// Electrical level at which the door, aux and reset inputs are active.
    pub input_polarity: Polarity,

    /// Period of the runtime tick.
    pub tick_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            frame_gap: Duration::from_millis(FRAME_GAP_MS),
            check_parity: true,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            reset: HoldThresholds::default(),
            busy_policy: BusyPolicy::Reject,
            relay_polarity: Polarity::ActiveHigh,
            input_polarity: Polarity::ActiveLow,
            tick_interval: Duration::from_millis(DEFAULT_TICK_MS),
        }
    }
}

/// The physical pins of one door.
pub struct Pins {
    pub relay: Box<dyn DigitalOutput>,
    pub led: Box<dyn DigitalOutput>,
    /// Door contact; active means closed.
    pub door: Box<dyn DigitalInput>,
    /// Exit switch.
    pub aux: Box<dyn DigitalInput>,
    pub reset: Box<dyn DigitalInput>,
}

/// Process-level action requested by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemRequest {
    /// Reset button released after the short hold.
    Reboot,

    /// Reset button held past the long threshold; the store is already
    /// cleared.
    FactoryReset,

    /// Settings were changed and saved.
    Restart,

    /// The controller was asked to stop.
    Shutdown,
}

/// Live I/O state, as served by `GET /status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DoorStatus {
    /// Exit switch pressed.
    #[serde(rename = "albue")]
    pub aux: bool,

    /// Door contact closed.
    pub door: bool,

    /// Relay energized.
    pub relay: bool,
}

/// An input pin read through its polarity, with its classifier.
struct Watched<C> {
    pin: ActiveInput<Box<dyn DigitalInput>>,
    classifier: C,
    faulted: bool,
}

impl Watched<EdgeDetector> {
    /// Edge detector seeded with the pin's current level.
    fn detector(pin: Box<dyn DigitalInput>, polarity: Polarity, debounce: Duration) -> Self {
        let mut watched = Self::new(pin, polarity, EdgeDetector::new(debounce, false));
        if let Some(active) = watched.read() {
            watched.classifier = EdgeDetector::new(debounce, active);
        }
        watched
    }
}

impl<C> Watched<C> {
    fn new(pin: Box<dyn DigitalInput>, polarity: Polarity, classifier: C) -> Self {
        Self {
            pin: ActiveInput::new(pin, polarity),
            classifier,
            faulted: false,
        }
    }

    /// Logical level, or `None` if the pin cannot be read. A failure is
    /// reported once until the pin recovers.
    fn read(&mut self) -> Option<bool> {
        match self.pin.is_active() {
            Ok(active) => {
                if self.faulted {
                    self.faulted = false;
                    info!(pin = self.pin.name(), "Input readable again");
                }
                Some(active)
            }
            Err(e) => {
                if !self.faulted {
                    self.faulted = true;
                    warn!(pin = self.pin.name(), error = %e, "Input read failed");
                }
                None
            }
        }
    }
}

/// Single owner of all door state.
pub struct DoorController {
    config: ControllerConfig,
    store: Box<dyn SettingsStore>,
    settings: DeviceSettings,
    access: AccessTable,
    rules: RuleTable,
    log: EventLog,
    decoder: WiegandDecoder,
    relay: RelayActuator<Box<dyn DigitalOutput>>,
    relay_fault: bool,
    led: Box<dyn DigitalOutput>,
    led_level: Option<bool>,
    led_fault: bool,
    door: Watched<EdgeDetector>,
    aux: Watched<EdgeDetector>,
    reset: Watched<HoldClassifier>,
    scheduler: Scheduler,
    router: TopicRouter,
    outbox: Vec<Notification>,
    pending: Option<SystemRequest>,
}

impl DoorController {
    /// Build a controller from the stored settings.
    ///
    /// A missing or unreadable settings document yields defaults. The relay
    /// is driven off, and the door and aux classifiers start from the
    /// current pin levels so boot does not report an edge.
    ///
    /// Returns the controller and the sender the edge-capture context uses.
    pub fn new(
        config: ControllerConfig,
        pins: Pins,
        store: Box<dyn SettingsStore>,
        now: Instant,
    ) -> (Self, EdgeSender) {
        let document = load_or_default(store.as_ref());
        let SettingsDocument {
            device: settings,
            access,
            rules,
        } = document;

        let decoder_config = DecoderConfig::default()
            .with_mode(settings.wiegand_mode)
            .with_frame_gap(config.frame_gap)
            .with_parity_check(config.check_parity);
        let (decoder, edges) = WiegandDecoder::new(decoder_config);

        let mut relay = RelayActuator::new(
            pins.relay,
            RelayConfig {
                policy: config.busy_policy,
                polarity: config.relay_polarity,
                ..RelayConfig::default()
            },
        );
        relay.set_default_pulse(settings.relay_pulse());
        let relay_fault = match relay.force_off() {
            Ok(()) => false,
            Err(e) => {
                warn!(error = %e, "Could not drive relay off at startup");
                true
            }
        };

        let door = Watched::detector(pins.door, config.input_polarity, config.debounce);
        let aux = Watched::detector(pins.aux, config.input_polarity, config.debounce);
        let reset = Watched::new(
            pins.reset,
            config.input_polarity,
            HoldClassifier::new(config.debounce, config.reset),
        );

        let router = TopicRouter::new(&settings.device_id());
        let rules = RuleTable::from(rules);

        let mut controller = Self {
            config,
            store,
            settings,
            access: AccessTable::from(access),
            rules,
            log: EventLog::new(now),
            decoder,
            relay,
            relay_fault,
            led: pins.led,
            led_level: None,
            led_fault: false,
            door,
            aux,
            reset,
            scheduler: Scheduler::new(now),
            router,
            outbox: Vec::new(),
            pending: None,
        };

        controller.sync_schedules(now);
        controller.mirror_led();
        info!(
            device_id = %controller.settings.device_id(),
            mode = %controller.settings.wiegand_mode,
            users = controller.access.len(),
            rules = controller.rules.len(),
            "Door controller started"
        );
        controller
            .log
            .append(format!("Door Controller Ready. FW {VERSION}"), now);

        (controller, edges)
    }

    /// Advance the controller to `now`.
    ///
    /// Returns a [`SystemRequest`] when the host should reboot, restart or
    /// wipe state.
    pub fn tick(&mut self, now: Instant) -> Option<SystemRequest> {
        self.service_reset(now);
        self.service_decoder(now);
        self.service_aux(now);
        self.service_door(now);
        self.service_schedules(now);
        self.service_relay(now);
        self.mirror_led();
        self.pending.take()
    }

    /// Apply a command from a collaborator.
    ///
    /// Every mutation of users, rules or settings saves the full document;
    /// a failed save is logged and does not fail the command.
    ///
    /// # Errors
    ///
    /// - [`ControllerError::Validation`] for unusable command contents
    /// - [`ControllerError::NotFound`] for a missing rule index or user
    /// - [`ControllerError::RelayBusy`] if the relay refused a pulse
    /// - [`ControllerError::Hardware`] if the relay could not be driven
    pub fn execute(&mut self, command: Command, origin: Origin, now: Instant) -> Result<CommandReply> {
        debug!(?command, %origin, "Executing command");

        match command {
            Command::Open { pulse_ms } => {
                let duration = pulse_ms.map(Duration::from_millis);
                match self.pulse_relay(duration, now)? {
                    PulseOutcome::Rejected => Err(ControllerError::RelayBusy),
                    outcome => Ok(CommandReply::Pulse(outcome)),
                }
            }
            Command::Lock => match self.relay.lock(now) {
                Ok(_) => {
                    self.log.append("Locked", now);
                    self.mirror_led();
                    Ok(CommandReply::Done)
                }
                Err(e) => {
                    self.log.append(format!("Relay fault: {e}"), now);
                    Err(e.into())
                }
            },
            Command::AddUser(user) => {
                validate_user(&user)?;
                self.log
                    .append(format!("User {} added ({origin})", user.name), now);
                self.access.insert(user);
                self.persist(now);
                Ok(CommandReply::Done)
            }
            Command::DeleteUser { name } => {
                let removed = self.access.remove(&name);
                if removed == 0 {
                    return Err(ControllerError::NotFound(format!("user {name}")));
                }
                self.log.append(format!("User {name} deleted ({origin})"), now);
                self.persist(now);
                Ok(CommandReply::Removed(removed))
            }
            Command::AddRule(rule) => {
                self.log.append(format!("Rule {} added ({origin})", rule.name), now);
                let index = self.rules.push(rule);
                self.rules_changed(now);
                Ok(CommandReply::RuleIndex(index))
            }
            Command::UpdateRule { index, rule } => {
                self.rules.update(index, rule)?;
                self.log.append(format!("Rule {index} updated ({origin})"), now);
                self.rules_changed(now);
                Ok(CommandReply::Done)
            }
            Command::DeleteRule { index } => {
                let removed = self.rules.remove(index)?;
                self.log
                    .append(format!("Rule {} deleted ({origin})", removed.name), now);
                self.rules_changed(now);
                Ok(CommandReply::Done)
            }
            Command::UpdateSettings(patch) => {
                patch.apply(&mut self.settings)?;
                self.decoder.set_mode(self.settings.wiegand_mode);
                self.relay.set_default_pulse(self.settings.relay_pulse());
                self.router = TopicRouter::new(&self.settings.device_id());
                self.persist(now);
                self.log.append("Settings updated", now);
                self.request(SystemRequest::Restart);
                Ok(CommandReply::Restarting)
            }
            Command::Event { name } => {
                if name.is_empty() {
                    return Err(ControllerError::validation("event name must not be empty"));
                }
                self.run_rules(&Event::http(name), now);
                Ok(CommandReply::Done)
            }
        }
    }

    /// Handle an inbound MQTT message.
    ///
    /// Every message is logged. Topics outside this door's namespace, or
    /// without a command, yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns the error of the routed command.
    pub fn mqtt(&mut self, topic: &str, payload: &str, now: Instant) -> Result<Option<CommandReply>> {
        self.log.append(format!("MQTT [{topic}]: {payload}"), now);

        let Some(command) = self.router.route(topic, payload) else {
            debug!(topic, "No command for topic");
            return Ok(None);
        };
        match self.execute(command, Origin::Mqtt, now) {
            Ok(reply) => Ok(Some(reply)),
            Err(e) => {
                warn!(topic, error = %e, "MQTT command failed");
                Err(e)
            }
        }
    }

    /// Record an external lifecycle line (e.g. a broker connection).
    pub fn note(&mut self, message: impl AsRef<str>, now: Instant) {
        self.log.append(message, now);
    }

    /// Current pin-derived state.
    pub fn status(&self) -> DoorStatus {
        DoorStatus {
            aux: self.aux.classifier.is_active(),
            door: self.door.classifier.is_active(),
            relay: self.relay.is_active(),
        }
    }

    /// Drain the outbound notifications queued by rules.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.outbox)
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn snapshot_log(&self) -> Vec<String> {
        self.log.snapshot()
    }

    pub fn users(&self) -> &[AuthorizedUser] {
        self.access.users()
    }

    pub fn rules(&self) -> &[Rule] {
        self.rules.rules()
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn router(&self) -> &TopicRouter {
        &self.router
    }

    /// The full document as it would be persisted.
    pub fn document(&self) -> SettingsDocument {
        SettingsDocument {
            device: self.settings.clone(),
            access: self.access.users().to_vec(),
            rules: self.rules.rules().to_vec(),
        }
    }

    // ------------------------------------------------------------------
    // Tick stages
    // ------------------------------------------------------------------

    fn service_reset(&mut self, now: Instant) {
        let Some(active) = self.reset.read() else {
            return;
        };
        match self.reset.classifier.poll(active, now) {
            Some(HoldEvent::Pressed) => debug!("Reset button pressed"),
            Some(HoldEvent::ShortHeld) => self.log.append("Manual reboot", now),
            Some(HoldEvent::LongHeld) => {
                self.log.append("Factory reset (settings cleared)", now);
                if let Err(e) = self.store.clear() {
                    warn!(error = %e, "Clearing stored settings failed");
                    self.log.append(format!("Settings clear failed: {e}"), now);
                }
                self.request(SystemRequest::FactoryReset);
            }
            Some(HoldEvent::Released { reached }) => {
                debug!(?reached, "Reset button released");
                if reached == HoldState::ShortHeld {
                    self.request(SystemRequest::Reboot);
                }
            }
            None => {}
        }
    }

    fn service_decoder(&mut self, now: Instant) {
        while let Some(event) = self.decoder.poll(now) {
            match event {
                DecodeEvent::Decoded(credential) => self.on_credential(&credential, now),
                other => self.log.append(other.to_string(), now),
            }
        }
    }

    fn on_credential(&mut self, credential: &Credential, now: Instant) {
        let code = credential.code_string();
        self.log
            .append(format!("Wiegand({}): {code}", credential.frame_length), now);

        match self.access.lookup(&code).map(|user| user.name.clone()) {
            Some(name) => {
                let _ = self.pulse_relay(None, now);
                self.log.append(format!("Access granted for {name}"), now);
            }
            None => self.log.append(format!("Unknown Wiegand tag {code}"), now),
        }

        self.run_rules(&Event::credential(credential), now);
    }

    fn service_aux(&mut self, now: Instant) {
        let Some(active) = self.aux.read() else {
            return;
        };
        if self.aux.classifier.poll(active, now) == Some(InputEdge::Pressed) {
            let _ = self.pulse_relay(None, now);
            self.log.append("Exit switch pressed", now);
            self.run_rules(&Event::gpio(GPIO_AUX), now);
        }
    }

    fn service_door(&mut self, now: Instant) {
        let Some(active) = self.door.read() else {
            return;
        };
        let (label, param) = match self.door.classifier.poll(active, now) {
            Some(InputEdge::Pressed) => ("closed", GPIO_DOOR_CLOSED),
            Some(InputEdge::Released) => ("open", GPIO_DOOR_OPEN),
            None => return,
        };
        self.log.append(format!("Door contact: {label}"), now);
        self.run_rules(&Event::gpio(param), now);
    }

    fn service_schedules(&mut self, now: Instant) {
        for event in self.scheduler.due(now) {
            self.run_rules(&event, now);
        }
    }

    fn service_relay(&mut self, now: Instant) {
        match self.relay.tick(now) {
            Ok(Some(RelayTransition::Deactivated)) => {
                self.relay_fault = false;
                self.log.append("Relay OFF", now);
            }
            Ok(Some(RelayTransition::Activated { duration })) => {
                debug!(?duration, "Queued pulse started");
                self.log.append("Relay ON", now);
            }
            Ok(Some(RelayTransition::Locked)) | Ok(None) => {}
            Err(e) => {
                if !self.relay_fault {
                    self.relay_fault = true;
                    self.log.append(format!("Relay fault: {e}"), now);
                }
            }
        }
    }

    /// Drive the status LED to the relay state.
    fn mirror_led(&mut self) {
        let lit = self.relay.is_active();
        if self.led_level == Some(lit) {
            return;
        }
        match self.led.write(lit) {
            Ok(()) => {
                self.led_level = Some(lit);
                self.led_fault = false;
            }
            Err(e) => {
                if !self.led_fault {
                    self.led_fault = true;
                    warn!(pin = self.led.name(), error = %e, "Status LED write failed");
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn pulse_relay(
        &mut self,
        duration: Option<Duration>,
        now: Instant,
    ) -> doorman_hardware::Result<PulseOutcome> {
        let result = self.relay.pulse(duration, now);
        match &result {
            Ok(PulseOutcome::Started { duration, .. }) => {
                debug!(?duration, "Relay pulse started");
                self.log.append("Relay ON", now);
            }
            Ok(PulseOutcome::Queued { duration }) => {
                self.log.append(
                    format!("Relay busy, pulse queued ({} ms)", duration.as_millis()),
                    now,
                );
            }
            Ok(PulseOutcome::Rejected) => self.log.append("Relay busy, pulse rejected", now),
            Err(e) => self.log.append(format!("Relay fault: {e}"), now),
        }
        result
    }

    fn run_rules(&mut self, event: &Event, now: Instant) {
        let Some(hit) = dispatch(event, self.rules.rules()) else {
            return;
        };
        debug!(%event, index = hit.index, rule = %hit.rule, "Rule matched");

        match hit.outcome {
            Ok(RuleOutcome::Pulse(duration)) => {
                let _ = self.pulse_relay(duration, now);
            }
            Ok(RuleOutcome::Log(message)) => self.log.append(message, now),
            Ok(RuleOutcome::Notify(notification)) => {
                debug!(?notification, "Notification queued");
                self.outbox.push(notification);
            }
            Err(e) => self.log.append(format!("Rule {}: {e}", hit.rule), now),
        }
    }

    fn rules_changed(&mut self, now: Instant) {
        self.persist(now);
        self.sync_schedules(now);
    }

    fn sync_schedules(&mut self, now: Instant) {
        for param in self.scheduler.sync(self.rules.rules(), now) {
            self.log
                .append(format!("Schedule '{param}': invalid interval"), now);
        }
    }

    fn persist(&mut self, now: Instant) {
        let document = self.document();
        match self.store.save(&document) {
            Ok(()) => debug!("Settings saved"),
            Err(e) => {
                warn!(error = %e, "Settings save failed");
                self.log.append(format!("Settings save failed: {e}"), now);
            }
        }
    }

    /// Queue a system request. An earlier request in the same tick wins.
    fn request(&mut self, request: SystemRequest) {
        if self.pending.is_none() {
            self.pending = Some(request);
        }
    }
}

fn validate_user(user: &AuthorizedUser) -> Result<()> {
    if user.name.is_empty() {
        return Err(ControllerError::validation("username must not be empty"));
    }
    if user.credential_code.is_empty() {
        return Err(ControllerError::validation("tag must not be empty"));
    }
    Ok(())
}
