//! Line-oriented console for driving a simulated door.
//!
//! Each line is parsed into a [`ConsoleCommand`] and applied to the running
//! controller: hardware commands poke the mock pins and the Wiegand edge
//! queue, transport commands go through the [`ControllerHandle`] as the HTTP
//! and MQTT layers would.

use anyhow::{Context, bail};
use doorman_controller::{
    Command, ControllerHandle, Notification, Pins,
    api::{ApiRequest, Method},
    runtime,
};
use doorman_core::Origin;
use doorman_hardware::mock::{MockInput, MockInputHandle, MockOutput};
use doorman_wiegand::{BitFrame, EdgeSender};
use std::time::Duration;
use tracing::warn;

/// Spacing between simulated Wiegand pulses.
const BIT_INTERVAL: Duration = Duration::from_millis(2);

/// How long the `aux` command holds the exit switch.
const AUX_PRESS: Duration = Duration::from_millis(200);

/// Default frame length for the `card` command.
const DEFAULT_CARD_BITS: usize = 26;

const HELP: &str = "\
commands:
  card <code> [bits]                  present a Wiegand credential (26, 34 or 36 bits)
  door open|closed                    set the door contact
  aux                                 press the exit switch
  reset <secs>                        hold the reset button
  open [ms]                           pulse the relay
  lock                                release the relay
  mqtt <topic> [payload]              deliver an MQTT message
  api <METHOD> <path> [code|-] [body] send an HTTP request
  log | status | help | quit
";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Card { code: u64, bits: usize },
    Door { open: bool },
    Aux,
    Reset { hold: Duration },
    Open { pulse_ms: Option<u64> },
    Lock,
    Mqtt { topic: String, payload: String },
    Api {
        method: Method,
        path: String,
        admin_code: Option<String>,
        body: String,
    },
    Log,
    Status,
    Help,
    Quit,
}

impl ConsoleCommand {
    /// Parse a console line. Blank lines yield `None`.
    pub fn parse(line: &str) -> anyhow::Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };

        let command = match verb {
            "card" => {
                let code = words
                    .next()
                    .context("usage: card <code> [bits]")?
                    .parse()
                    .context("card code must be a number")?;
                let bits = words
                    .next()
                    .map(str::parse)
                    .transpose()
                    .context("frame length must be a number")?
                    .unwrap_or(DEFAULT_CARD_BITS);
                Self::Card { code, bits }
            }
            "door" => match words.next() {
                Some("open") => Self::Door { open: true },
                Some("closed" | "close") => Self::Door { open: false },
                _ => bail!("usage: door open|closed"),
            },
            "aux" => Self::Aux,
            "reset" => {
                let secs: f64 = words
                    .next()
                    .context("usage: reset <secs>")?
                    .parse()
                    .context("hold time must be a number of seconds")?;
                if !secs.is_finite() || secs < 0.0 {
                    bail!("hold time must be a non-negative number of seconds");
                }
                Self::Reset {
                    hold: Duration::from_secs_f64(secs),
                }
            }
            "open" => Self::Open {
                pulse_ms: words
                    .next()
                    .map(str::parse)
                    .transpose()
                    .context("pulse length must be a number of milliseconds")?,
            },
            "lock" => Self::Lock,
            "mqtt" => Self::Mqtt {
                topic: words.next().context("usage: mqtt <topic> [payload]")?.to_string(),
                payload: rest(words),
            },
            "api" => {
                let method = words
                    .next()
                    .context("usage: api <METHOD> <path> [code|-] [body]")?
                    .parse()?;
                let path = words.next().context("missing request path")?.to_string();
                let admin_code = words.next().filter(|code| *code != "-").map(String::from);
                Self::Api {
                    method,
                    path,
                    admin_code,
                    body: rest(words),
                }
            }
            "log" => Self::Log,
            "status" => Self::Status,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => bail!("unknown command '{other}', try 'help'"),
        };
        Ok(Some(command))
    }
}

fn rest<'a>(words: impl Iterator<Item = &'a str>) -> String {
    words.collect::<Vec<_>>().join(" ")
}

/// Whether the console should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Handles for the simulated input pins.
#[derive(Debug, Clone)]
pub struct SimulatedInputs {
    pub door: MockInputHandle,
    pub aux: MockInputHandle,
    pub reset: MockInputHandle,
}

/// Mock pins at rest: door closed, exit switch and reset button released.
pub fn simulated_pins() -> (Pins, SimulatedInputs) {
    let (door, door_handle) = MockInput::new("door", false);
    let (aux, aux_handle) = MockInput::new("aux", true);
    let (reset, reset_handle) = MockInput::new("reset", true);

    let pins = Pins {
        relay: Box::new(MockOutput::new("relay").0),
        led: Box::new(MockOutput::new("led").0),
        door: Box::new(door),
        aux: Box::new(aux),
        reset: Box::new(reset),
    };
    let inputs = SimulatedInputs {
        door: door_handle,
        aux: aux_handle,
        reset: reset_handle,
    };
    (pins, inputs)
}

/// Applies console commands to one running controller.
pub struct Console {
    handle: ControllerHandle,
    edges: EdgeSender,
    inputs: SimulatedInputs,
}

impl Console {
    pub fn new(handle: ControllerHandle, edges: EdgeSender, inputs: SimulatedInputs) -> Self {
        Self {
            handle,
            edges,
            inputs,
        }
    }

    pub fn handle(&self) -> &ControllerHandle {
        &self.handle
    }

    pub async fn run(&self, command: ConsoleCommand) -> anyhow::Result<Flow> {
        match command {
            ConsoleCommand::Card { code, bits } => self.present(code, bits)?,
            // Inputs are active low; a closed door pulls the contact low.
            ConsoleCommand::Door { open } => self.inputs.door.set_level(open),
            ConsoleCommand::Aux => press(self.inputs.aux.clone(), AUX_PRESS),
            ConsoleCommand::Reset { hold } => press(self.inputs.reset.clone(), hold),
            ConsoleCommand::Open { pulse_ms } => {
                let reply = self
                    .handle
                    .execute(Command::Open { pulse_ms }, Origin::Local)
                    .await?;
                println!("{reply:?}");
            }
            ConsoleCommand::Lock => {
                self.handle.execute(Command::Lock, Origin::Local).await?;
            }
            ConsoleCommand::Mqtt { topic, payload } => {
                match self.handle.mqtt(topic, payload).await? {
                    Some(reply) => println!("{reply:?}"),
                    None => println!("(topic not routed)"),
                }
            }
            ConsoleCommand::Api {
                method,
                path,
                admin_code,
                body,
            } => {
                let mut request = ApiRequest::new(method, path).with_body(body);
                if let Some(code) = admin_code {
                    request = request.with_admin_code(code);
                }
                let response = self.handle.api(request).await?;
                println!("{} {}", response.status, response.body);
            }
            ConsoleCommand::Log => {
                for line in self.handle.snapshot_log().await? {
                    println!("{line}");
                }
            }
            ConsoleCommand::Status => {
                let status = self.handle.status().await?;
                println!("{}", serde_json::to_string(&status)?);
            }
            ConsoleCommand::Help => print!("{HELP}"),
            ConsoleCommand::Quit => return Ok(Flow::Quit),
        }

        self.flush_notifications().await?;
        Ok(Flow::Continue)
    }

    /// Print outbound MQTT and HTTP notifications queued by rules.
    pub async fn flush_notifications(&self) -> anyhow::Result<()> {
        for notification in self.handle.take_notifications().await? {
            match notification {
                Notification::Mqtt { topic, payload } => println!("-> mqtt {topic} {payload}"),
                Notification::Http { url } => println!("-> http {url}"),
            }
        }
        Ok(())
    }

    fn present(&self, code: u64, bits: usize) -> anyhow::Result<()> {
        let frame = BitFrame::encode(code, bits)?;
        for edge in frame.edges(runtime::now(), BIT_INTERVAL) {
            if !self.edges.send(edge.line, edge.at) {
                warn!(code, bits, "Edge queue full, frame truncated");
                break;
            }
        }
        Ok(())
    }
}

fn press(pin: MockInputHandle, hold: Duration) {
    pin.set_level(false);
    tokio::spawn(async move {
        tokio::time::sleep(hold).await;
        pin.set_level(true);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorman_controller::{ControllerConfig, DoorController, SystemRequest};
    use doorman_storage::MemoryStore;
    use rstest::rstest;

    #[rstest]
    #[case("card 12345", ConsoleCommand::Card { code: 12345, bits: 26 })]
    #[case("card 777 36", ConsoleCommand::Card { code: 777, bits: 36 })]
    #[case("door open", ConsoleCommand::Door { open: true })]
    #[case("door closed", ConsoleCommand::Door { open: false })]
    #[case("reset 5.5", ConsoleCommand::Reset { hold: Duration::from_millis(5500) })]
    #[case("open", ConsoleCommand::Open { pulse_ms: None })]
    #[case("open 2000", ConsoleCommand::Open { pulse_ms: Some(2000) })]
    #[case("mqtt doors/door/open", ConsoleCommand::Mqtt { topic: "doors/door/open".into(), payload: String::new() })]
    #[case("  quit  ", ConsoleCommand::Quit)]
    fn test_parse_commands(#[case] line: &str, #[case] expected: ConsoleCommand) {
        assert_eq!(ConsoleCommand::parse(line).unwrap(), Some(expected));
    }

    #[test]
    fn test_parse_api_request() {
        let command = ConsoleCommand::parse(r#"api post /users 9792 {"username": "a", "tag": "1"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            command,
            ConsoleCommand::Api {
                method: Method::Post,
                path: "/users".to_string(),
                admin_code: Some("9792".to_string()),
                body: r#"{"username": "a", "tag": "1"}"#.to_string(),
            }
        );

        let anonymous = ConsoleCommand::parse("api GET /status -").unwrap().unwrap();
        assert!(matches!(anonymous, ConsoleCommand::Api { admin_code: None, .. }));
    }

    #[rstest]
    #[case("card")]
    #[case("card abc")]
    #[case("door ajar")]
    #[case("reset -1")]
    #[case("open soon")]
    #[case("api FETCH /log")]
    #[case("dance")]
    fn test_parse_rejects_bad_lines(#[case] line: &str) {
        assert!(ConsoleCommand::parse(line).is_err());
    }

    #[test]
    fn test_blank_line_is_ignored() {
        assert_eq!(ConsoleCommand::parse("   ").unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_console_drives_running_controller() {
        let (pins, inputs) = simulated_pins();
        let (controller, edges) = DoorController::new(
            ControllerConfig::default(),
            pins,
            Box::new(MemoryStore::new()),
            runtime::now(),
        );
        let (handle, task) = runtime::spawn_controller(controller, Duration::from_millis(10));
        let console = Console::new(handle, edges, inputs);

        let add = ConsoleCommand::parse(r#"api POST /users 9792 {"username": "alice", "tag": "12345"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(console.run(add).await.unwrap(), Flow::Continue);

        console.run(ConsoleCommand::Card { code: 12345, bits: 26 }).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(console.handle().status().await.unwrap().relay);

        console.run(ConsoleCommand::Door { open: true }).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!console.handle().status().await.unwrap().door);

        let log = console.handle().snapshot_log().await.unwrap();
        assert!(log.iter().any(|line| line.ends_with("Access granted for alice")));
        assert!(log.iter().any(|line| line.ends_with("Door contact: open")));

        assert_eq!(console.run(ConsoleCommand::Quit).await.unwrap(), Flow::Quit);
        console.handle().shutdown().await.unwrap();
        assert_eq!(task.await.unwrap(), SystemRequest::Shutdown);
    }
}
