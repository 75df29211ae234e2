//! AT command descriptors and the configuration table.
//!
//! A descriptor is plain data: a template with `{}` placeholders, how it is
//! sent, how a response line is judged, and the arguments bound to it. The
//! configuration sequence is an ordered [`CommandTable`] of descriptors, so
//! adding a step means adding a row, not a code path.

use core::fmt::Write;

use embassy_time::Duration;
use heapless::{String, Vec};
use log::warn;

use super::{JOIN_FAILED, JOINED, NEGATIVE, OK, STATION_DOWN, STATION_UP};
use crate::config::TrackerConfig;
use crate::error::AtError;

/// Maximum bound arguments per descriptor.
pub const MAX_ARGS: usize = 5;

/// Capacity of one bound argument.
pub const ARG_CAPACITY: usize = 100;

/// Capacity of one rendered command line, terminator included.
pub const LINE_CAPACITY: usize = 256;

/// Maximum steps in a configuration table.
pub const TABLE_CAPACITY: usize = 8;

const PLACEHOLDER: &str = "{}";

pub type Arg = String<ARG_CAPACITY>;
pub type Line = String<LINE_CAPACITY>;

/// Identity of a descriptor, used to rebind arguments by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandId {
    Probe,
    StationMode,
    JoinAp,
    PublishTopic,
    ShadowConfig,
    ShadowInit,
    DataConfig,
    StatusQuery,
    Disconnect,
    Publish,
}

/// How the template becomes a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    /// Sent verbatim.
    Plain,
    /// Placeholders are replaced by the bound arguments, in order.
    Formatted,
}

/// Which response line counts as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classifier {
    /// A line containing `OK`.
    Ok,
    /// A line containing the given token.
    Contains(&'static str),
    /// A line containing any of the given tokens.
    AnyOf(&'static [&'static str]),
}

impl Classifier {
    pub fn accepts(&self, line: &str) -> bool {
        match self {
            Self::Ok => line.contains(OK),
            Self::Contains(token) => line.contains(token),
            Self::AnyOf(tokens) => tokens.iter().any(|t| line.contains(t)),
        }
    }
}

/// Judgement of a single response line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected,
    /// Not an answer to this command; kept for the unsolicited path.
    Unrelated,
}

/// One AT command descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct AtCommand {
    pub id: CommandId,
    pub template: &'static str,
    pub sender: Sender,
    pub classifier: Classifier,
    /// Extra failure token besides `ERROR`.
    pub reject: Option<&'static str>,
    pub expected_args: usize,
    args: [Option<Arg>; MAX_ARGS],
    /// A failing optional step does not abort `configure_all`.
    pub optional: bool,
    /// Overrides the engine's default response window.
    pub timeout: Option<Duration>,
}

impl AtCommand {
    pub fn plain(id: CommandId, template: &'static str) -> Self {
        Self {
            id,
            template,
            sender: Sender::Plain,
            classifier: Classifier::Ok,
            reject: None,
            expected_args: 0,
            args: Default::default(),
            optional: false,
            timeout: None,
        }
    }

    pub fn formatted(id: CommandId, template: &'static str) -> Self {
        Self {
            sender: Sender::Formatted,
            expected_args: template.matches(PLACEHOLDER).count(),
            ..Self::plain(id, template)
        }
    }

    pub fn accepting(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn rejecting(mut self, token: &'static str) -> Self {
        self.reject = Some(token);
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replace the bound arguments. The count must match the template.
    pub fn bind(&mut self, args: &[&str]) -> Result<(), AtError> {
        if args.len() != self.expected_args || args.len() > MAX_ARGS {
            warn!(
                "AT: {:?} expects {} argument(s), got {}",
                self.id,
                self.expected_args,
                args.len()
            );
            return Err(AtError::BadArguments);
        }
        let mut bound: [Option<Arg>; MAX_ARGS] = Default::default();
        for (slot, value) in bound.iter_mut().zip(args) {
            let mut arg = Arg::new();
            arg.push_str(value).map_err(|()| AtError::BadArguments)?;
            *slot = Some(arg);
        }
        self.args = bound;
        Ok(())
    }

    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map_while(|a| a.as_deref())
    }

    /// Render the command line without its terminator.
    pub fn render(&self, out: &mut Line) -> Result<(), AtError> {
        out.clear();
        match self.sender {
            Sender::Plain => out
                .push_str(self.template)
                .map_err(|()| AtError::LineTooLong),
            Sender::Formatted => {
                if self.args().count() != self.expected_args {
                    return Err(AtError::BadArguments);
                }
                let mut args = self.args();
                let mut pieces = self.template.split(PLACEHOLDER);
                if let Some(first) = pieces.next() {
                    out.push_str(first).map_err(|()| AtError::LineTooLong)?;
                }
                for piece in pieces {
                    let arg = args.next().ok_or(AtError::BadArguments)?;
                    out.push_str(arg).map_err(|()| AtError::LineTooLong)?;
                    out.push_str(piece).map_err(|()| AtError::LineTooLong)?;
                }
                Ok(())
            }
        }
    }

    pub fn classify(&self, line: &str) -> Verdict {
        if self.classifier.accepts(line) {
            Verdict::Accepted
        } else if line.contains(NEGATIVE) || self.reject.is_some_and(|t| line.contains(t)) {
            Verdict::Rejected
        } else {
            Verdict::Unrelated
        }
    }
}

// ---------------------------------------------------------------------------
// Standalone descriptors
// ---------------------------------------------------------------------------

/// Association status query.
pub fn status_query() -> AtCommand {
    AtCommand::plain(CommandId::StatusQuery, "AT+WFSTA")
        .accepting(Classifier::Contains(STATION_UP))
        .rejecting(STATION_DOWN)
}

/// Leave the access point.
pub fn disconnect() -> AtCommand {
    AtCommand::plain(CommandId::Disconnect, "AT+WFQAP")
}

/// Publish one telemetry payload through the modem's MQTT client.
pub fn publish(cfg_num: u8, cfg_name: &str, payload: &str) -> Result<AtCommand, AtError> {
    let mut num: String<4> = String::new();
    write!(num, "{cfg_num}").map_err(|_| AtError::BadArguments)?;
    let mut cmd = AtCommand::formatted(CommandId::Publish, "AT+AWS=CMD MCU_DATA {} {} {}");
    cmd.bind(&[num.as_str(), cfg_name, payload])?;
    Ok(cmd)
}

// ---------------------------------------------------------------------------
// Command table
// ---------------------------------------------------------------------------

/// Ordered configuration sequence.
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    steps: Vec<AtCommand, TABLE_CAPACITY>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cmd: AtCommand) -> Result<(), AtError> {
        self.steps.push(cmd).map_err(|_| AtError::TableFull)
    }

    /// Rebind the arguments of the step identified by `id`.
    pub fn bind(&mut self, id: CommandId, args: &[&str]) -> Result<(), AtError> {
        let cmd = self
            .steps
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(AtError::BadArguments)?;
        cmd.bind(args)
    }

    pub fn get(&self, id: CommandId) -> Option<&AtCommand> {
        self.steps.iter().find(|c| c.id == id)
    }

    pub fn position(&self, id: CommandId) -> Option<usize> {
        self.steps.iter().position(|c| c.id == id)
    }

    pub fn steps(&self) -> &[AtCommand] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Build the Wi-Fi + cloud configuration sequence for `cfg`.
///
/// The join step is left unbound; the caller binds the chosen credential
/// right before running the table.
pub fn build_command_table(cfg: &TrackerConfig) -> Result<CommandTable, AtError> {
    let join_timeout = Duration::from_millis(u64::from(cfg.join_timeout_ms));

    let mut topic = AtCommand::formatted(CommandId::PublishTopic, "AT+AWS=SET APP_PUBTOPIC {}");
    topic.bind(&[cfg.aws_topic.as_str()])?;

    let mut num: String<4> = String::new();
    write!(num, "{}", cfg.shadow_cfg_num).map_err(|_| AtError::BadArguments)?;
    let mut data_cfg = AtCommand::formatted(CommandId::DataConfig, "AT+AWS=CFG {} {} 1 0");
    data_cfg.bind(&[num.as_str(), cfg.shadow_cfg_name.as_str()])?;

    let mut table = CommandTable::new();
    table.push(AtCommand::plain(CommandId::Probe, "AT"))?;
    table.push(AtCommand::plain(CommandId::StationMode, "AT+WFMODE=0"))?;
    table.push(
        AtCommand::formatted(CommandId::JoinAp, "AT+WFJAPA={}")
            .accepting(Classifier::Contains(JOINED))
            .rejecting(JOIN_FAILED)
            .with_timeout(join_timeout),
    )?;
    table.push(topic)?;
    table.push(AtCommand::plain(CommandId::ShadowConfig, "AT+AWS=CFG 0 latshad 1 1"))?;
    table.push(AtCommand::plain(CommandId::ShadowInit, "AT+AWS=CMD MCU_DATA 0 latshad init").optional())?;
    table.push(data_cfg)?;
    Ok(table)
}
