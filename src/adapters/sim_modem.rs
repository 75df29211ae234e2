//! Simulated Wi-Fi/MQTT AT modem.
//!
//! Implements the modem [`Transport`]: every complete command line written
//! to it is answered immediately by feeding reply lines through a
//! line-mode [`FrameReceiver`] into the modem response queue, exactly
//! where the UART interrupt would put them.
//!
//! | Command            | Reply                                        |
//! |--------------------|----------------------------------------------|
//! | `AT`, `AT+WFMODE`  | `OK`                                         |
//! | `AT+WFJAPA=s,p`    | `OK` then `+WFJAP:1,...` or `+WFJAP:0,...`   |
//! | `AT+WFSTA`         | `+WFSTA:1` or `+WFSTA:0`, then `OK`          |
//! | `AT+WFQAP`         | `OK`                                         |
//! | `AT+AWS=...`       | `OK` (publishes need an association)         |
//! | anything else      | `ERROR`                                      |

use log::{debug, info};

use crate::link::channels::FrameQueue;
use crate::link::receiver::{FrameReceiver, Framing};
use crate::link::transport::Transport;

const PUBLISH_PREFIX: &str = "AT+AWS=CMD MCU_DATA ";
const SHADOW_INIT: &str = "latshad init";

/// How the simulated modem answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimModemMode {
    /// Behave like a healthy modem.
    Normal,
    /// Swallow every command.
    Silent,
    /// Answer every command with `ERROR`.
    Rejecting,
}

pub struct SimModem<'q> {
    rx: FrameReceiver<'q>,
    mode: SimModemMode,
    /// Access points in range, as `(ssid, password)`.
    networks: Vec<(String, String)>,
    associated: Option<String>,
    pending: Vec<u8>,
    sent: Vec<String>,
    published: Vec<String>,
}

impl<'q> SimModem<'q> {
    pub fn new(responses: &'q FrameQueue) -> Self {
        Self {
            rx: FrameReceiver::new(Framing::modem_lines(), responses),
            mode: SimModemMode::Normal,
            networks: Vec::new(),
            associated: None,
            pending: Vec::new(),
            sent: Vec::new(),
            published: Vec::new(),
        }
    }

    /// Put an access point in range.
    pub fn with_network(mut self, ssid: &str, password: &str) -> Self {
        self.add_network(ssid, password);
        self
    }

    pub fn add_network(&mut self, ssid: &str, password: &str) {
        self.networks.push((ssid.into(), password.into()));
    }

    pub fn set_mode(&mut self, mode: SimModemMode) {
        self.mode = mode;
    }

    pub fn associated(&self) -> Option<&str> {
        self.associated.as_deref()
    }

    /// The access point goes away; the modem reports it unsolicited.
    pub fn drop_association(&mut self) {
        if let Some(ssid) = self.associated.take() {
            info!("SIM-MODEM: lost association with '{}'", ssid);
            self.reply("+WFDAP:0,DISCONNECTED");
        }
    }

    /// Every command line received, in order.
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    /// Telemetry payloads the modem accepted for publication.
    pub fn published(&self) -> &[String] {
        &self.published
    }

    fn reply(&mut self, line: &str) {
        self.rx.feed(line.as_bytes());
        self.rx.feed(b"\r\n");
    }

    fn handle_line(&mut self, line: &str) {
        debug!("SIM-MODEM: << {}", line);
        self.sent.push(line.into());
        match self.mode {
            SimModemMode::Silent => return,
            SimModemMode::Rejecting => {
                self.reply("ERROR");
                return;
            }
            SimModemMode::Normal => {}
        }

        if line == "AT" || line.starts_with("AT+WFMODE=") || line == "AT+WFQAP" {
            if line == "AT+WFQAP" {
                self.associated = None;
            }
            self.reply("OK");
        } else if let Some(args) = line.strip_prefix("AT+WFJAPA=") {
            self.join(args);
        } else if line == "AT+WFSTA" {
            let status = if self.associated.is_some() {
                "+WFSTA:1"
            } else {
                "+WFSTA:0"
            };
            self.reply(status);
            self.reply("OK");
        } else if let Some(rest) = line.strip_prefix(PUBLISH_PREFIX) {
            if rest.ends_with(SHADOW_INIT) {
                self.reply("OK");
            } else if self.associated.is_some() {
                let payload = rest.rsplit(' ').next().unwrap_or(rest);
                self.published.push(payload.into());
                self.reply("OK");
            } else {
                self.reply("ERROR");
            }
        } else if line.starts_with("AT+AWS=") {
            self.reply("OK");
        } else {
            self.reply("ERROR");
        }
    }

    fn join(&mut self, args: &str) {
        self.reply("OK");
        let Some((ssid, password)) = args.split_once(',') else {
            self.reply("+WFJAP:0,INVALID");
            return;
        };
        let known = self
            .networks
            .iter()
            .any(|(s, p)| s == ssid && p == password);
        if known {
            info!("SIM-MODEM: joined '{}'", ssid);
            self.associated = Some(ssid.into());
            let joined = format!("+WFJAP:1,'{ssid}',192.168.4.2");
            self.reply(&joined);
        } else {
            self.associated = None;
            self.reply("+WFJAP:0,WRONG_PASSWORD");
        }
    }
}

impl Transport for SimModem<'_> {
    type Error = core::convert::Infallible;

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        for &byte in data {
            if byte == b'\r' || byte == b'\n' {
                if !self.pending.is_empty() {
                    let raw = core::mem::take(&mut self.pending);
                    let line = String::from_utf8_lossy(&raw).into_owned();
                    self.handle_line(&line);
                }
            } else {
                self.pending.push(byte);
            }
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
