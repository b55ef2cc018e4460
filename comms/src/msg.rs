use std::{borrow::Cow, io};

type Kind = u32;
const KIND_SIZE: usize = size_of::<Kind>();

const ERR_KIND: Kind = 0;
const CONTROL_KIND: Kind = 1;
const BUFFER_KIND: Kind = 2;

/// The payload data for the `Data` variant of the `Msg` enum.
#[derive(Debug)]
pub enum Payload<'a> {
    /// One parameter or telemetry buffer taking part in a collective round.
    Buffer(&'a [f32]),
}

/// The command for the `Control` variant of the `Msg` enum.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// A worker asks to be admitted into the process group.
    Join { rank: usize, world_size: usize },
    /// The master admits a worker once every member has joined.
    Welcome { world_size: usize },
    /// A worker arrived at the barrier number `seq`.
    Barrier { seq: u64 },
    /// The master releases every member waiting on barrier number `seq`.
    Release { seq: u64 },
    Disconnect,
}

/// Everything the members of a group say to each other.
#[derive(Debug)]
pub enum Msg<'a> {
    Control(Command),
    Data(Payload<'a>),
    Err(Cow<'a, str>),
}

impl Msg<'_> {
    /// A short name of this message's kind, used for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Msg::Control(Command::Join { .. }) => "control/join",
            Msg::Control(Command::Welcome { .. }) => "control/welcome",
            Msg::Control(Command::Barrier { .. }) => "control/barrier",
            Msg::Control(Command::Release { .. }) => "control/release",
            Msg::Control(Command::Disconnect) => "control/disconnect",
            Msg::Data(Payload::Buffer(_)) => "data/buffer",
            Msg::Err(_) => "err",
        }
    }
}

impl<'a> Msg<'a> {
    /// Appends the kind and any inline body of `self` to `head`.
    ///
    /// # Returns
    /// The payload to write right after `head`, borrowed rather than copied.
    pub(crate) fn encode(&self, head: &mut Vec<u8>) -> io::Result<Option<&[u8]>> {
        match self {
            Msg::Err(detail) => {
                head.extend_from_slice(&ERR_KIND.to_be_bytes());
                Ok(Some(detail.as_bytes()))
            }
            Msg::Control(cmd) => {
                head.extend_from_slice(&CONTROL_KIND.to_be_bytes());
                serde_json::to_writer(head, cmd)?;
                Ok(None)
            }
            Msg::Data(Payload::Buffer(nums)) => {
                head.extend_from_slice(&BUFFER_KIND.to_be_bytes());
                Ok(Some(bytemuck::cast_slice(nums)))
            }
        }
    }

    /// Reads a message out of a frame body, viewing any data buffer in place.
    ///
    /// `body` must start 4 byte aligned for a buffer to be viewed as `f32`s.
    pub(crate) fn decode(body: &'a [u8]) -> io::Result<Self> {
        let Some((kind, rest)) = body.split_first_chunk::<KIND_SIZE>() else {
            return Err(invalid(format!(
                "frame body of {} bytes has no kind",
                body.len()
            )));
        };

        match Kind::from_be_bytes(*kind) {
            ERR_KIND => {
                let detail = std::str::from_utf8(rest).map_err(|e| invalid(e.to_string()))?;
                Ok(Self::Err(Cow::Borrowed(detail)))
            }
            CONTROL_KIND => Ok(Self::Control(serde_json::from_slice(rest)?)),
            BUFFER_KIND => {
                let nums = bytemuck::try_cast_slice(rest)
                    .map_err(|e| invalid(format!("malformed buffer: {e}")))?;

                Ok(Self::Data(Payload::Buffer(nums)))
            }
            other => Err(invalid(format!("unknown message kind {other}"))),
        }
    }
}

fn invalid(detail: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, detail)
}
