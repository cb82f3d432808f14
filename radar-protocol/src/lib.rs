//! FMCW radar message protocol
//!
//! # Design
//! The radar reports heartbeats, log records, command replies and acquired pulses to the host as
//! self-describing binary messages. Messages are handed to a transport sink as complete frames;
//! the transport is responsible for any byte-level framing on the wire (e.g. COBS over USB serial).
//! There is no flow control or acknowledgement.
//!
//! ## Message Header
//! Every message starts with a common header, all fields little-endian:
//!
//! * **Magic word 0xF1F2F3F4** (u32): identifies radar messages.
//! * **Payload Size** (u16): the number of payload bytes following the header.
//! * **Message Type** (u16): the payload format, see [MessageType].
//!
//! ## Pulse Payload
//! A pulse payload starts with a 32-byte pulse header:
//!
//! * Header size (u16), always 32.
//! * Data size (u16), the number of sample bytes following the pulse header.
//! * Pulse sequence number (u32).
//! * Cycle count timestamp of the acquisition-complete interrupt (u32).
//! * Status (u32), see [PulseStatus].
//! * Receive gain (u16).
//! * Pulse duration in milliseconds (u16).
//! * Start, stop and return frequencies in MHz (f32 each).
//!
//! The header is followed by `data_size / 2` raw 16-bit sampler codes.
#![cfg_attr(not(test), no_std)]

use arbitrary_int::u31;
use bitbybit::bitfield;
use num_enum::{IntoPrimitive, TryFromPrimitive};

mod messenger;
pub use messenger::{Messenger, Sink};

/// Magic word identifying a radar message.
pub const MAGIC: u32 = 0xF1F2F3F4;

/// The size of the common message header in bytes.
pub const HEADER_SIZE: usize = 8;

/// The size of the pulse header at the start of a pulse payload.
pub const PULSE_HEADER_SIZE: usize = 32;

/// The default scratch capacity: the header, 100 bytes of fixed payload fields, and up to 2048
/// sample codes.
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + 100 + 2 * 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Message of {required} bytes exceeds {capacity} byte capacity")]
    OutOfSpace { required: usize, capacity: usize },
    #[error("Frame shorter than its headers")]
    Truncated,
    #[error("Invalid magic word {0:#010x}")]
    Magic(u32),
    #[error("Declared payload size {declared} does not match {actual}")]
    Size { declared: usize, actual: usize },
    #[error("Unknown message type {0}")]
    Type(u16),
    #[error("Unknown log category {0}")]
    Category(u8),
    #[error("Message text is not UTF-8")]
    Text,
}

/// Specifies the payload format of a message.
#[repr(u16)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum MessageType {
    Heartbeat = 0,
    Log = 1,
    Reply = 2,
    Pulse = 3,
}

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum LogCategory {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

#[bitfield(u32, default = 0)]
#[derive(Debug, PartialEq)]
pub struct PulseStatus {
    /// The transmit trigger output level during this pulse.
    #[bit(0, rw)]
    pub transmit_trigger: bool,
    #[bits(1..=31, r)]
    reserved: u31,
}

/// Per-pulse metadata carried ahead of the sample codes.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PulseHeader {
    pub sequence: u32,
    pub timestamp: u32,
    pub status: PulseStatus,
    pub gain: u16,
    pub duration_ms: u16,
    pub freq_start: f32,
    pub freq_stop: f32,
    pub freq_return: f32,
}

/// Sampler codes of a pulse.
///
/// Outgoing pulses reference the sample buffer directly. Decoded pulses reference the
/// little-endian bytes of the received frame.
#[derive(Debug, Copy, Clone)]
pub enum Samples<'a> {
    Codes(&'a [u16]),
    Raw(&'a [u8]),
}

impl<'a> Samples<'a> {
    /// The number of sample codes.
    pub fn len(&self) -> usize {
        match self {
            Self::Codes(codes) => codes.len(),
            Self::Raw(bytes) => bytes.len() / 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + 'a {
        let (codes, bytes): (&'a [u16], &'a [u8]) = match *self {
            Self::Codes(codes) => (codes, &[]),
            Self::Raw(bytes) => (&[], bytes),
        };
        codes.iter().copied().chain(
            bytes
                .chunks_exact(2)
                .map(|b| u16::from_le_bytes([b[0], b[1]])),
        )
    }
}

/// The payload of a radar message.
#[derive(Debug, Copy, Clone)]
pub enum Payload<'a> {
    Heartbeat {
        timestamp: u32,
    },
    Log {
        category: LogCategory,
        severity: u8,
        text: &'a str,
    },
    Reply {
        status: i16,
        text: &'a str,
    },
    Pulse {
        header: PulseHeader,
        samples: Samples<'a>,
    },
}

/// Sequential little-endian writer into a byte slice that is known to be large enough.
struct Writer<'a> {
    buf: &'a mut [u8],
    offset: usize,
}

impl<'a> Writer<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.offset..self.offset + bytes.len()].copy_from_slice(bytes);
        self.offset += bytes.len();
    }
}

/// Sequential little-endian reader over a received payload.
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        if self.buf.len() < len {
            return Err(ProtocolError::Truncated);
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, ProtocolError> {
        self.array().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, ProtocolError> {
        self.array().map(u32::from_le_bytes)
    }

    fn f32(&mut self) -> Result<f32, ProtocolError> {
        self.array().map(f32::from_le_bytes)
    }

    fn text(self) -> Result<&'a str, ProtocolError> {
        core::str::from_utf8(self.buf).map_err(|_| ProtocolError::Text)
    }
}

impl<'a> Payload<'a> {
    pub fn kind(&self) -> MessageType {
        match self {
            Self::Heartbeat { .. } => MessageType::Heartbeat,
            Self::Log { .. } => MessageType::Log,
            Self::Reply { .. } => MessageType::Reply,
            Self::Pulse { .. } => MessageType::Pulse,
        }
    }

    /// The number of bytes the payload occupies after the common header.
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Heartbeat { .. } => 4,
            Self::Log { text, .. } => 2 + text.len(),
            Self::Reply { text, .. } => 2 + text.len(),
            Self::Pulse { samples, .. } => PULSE_HEADER_SIZE + 2 * samples.len(),
        }
    }

    /// Serialize the payload into `buf`, which must hold at least [Payload::encoded_len] bytes.
    fn encode(&self, buf: &mut [u8]) {
        let mut w = Writer::new(buf);
        match self {
            Self::Heartbeat { timestamp } => w.put(&timestamp.to_le_bytes()),
            Self::Log {
                category,
                severity,
                text,
            } => {
                w.put(&[(*category).into(), *severity]);
                w.put(text.as_bytes());
            }
            Self::Reply { status, text } => {
                w.put(&status.to_le_bytes());
                w.put(text.as_bytes());
            }
            Self::Pulse { header, samples } => {
                w.put(&(PULSE_HEADER_SIZE as u16).to_le_bytes());
                w.put(&((2 * samples.len()) as u16).to_le_bytes());
                w.put(&header.sequence.to_le_bytes());
                w.put(&header.timestamp.to_le_bytes());
                w.put(&header.status.raw_value().to_le_bytes());
                w.put(&header.gain.to_le_bytes());
                w.put(&header.duration_ms.to_le_bytes());
                w.put(&header.freq_start.to_le_bytes());
                w.put(&header.freq_stop.to_le_bytes());
                w.put(&header.freq_return.to_le_bytes());
                for code in samples.iter() {
                    w.put(&code.to_le_bytes());
                }
            }
        }
    }

    fn decode(kind: MessageType, buf: &'a [u8]) -> Result<Self, ProtocolError> {
        let mut r = Reader { buf };
        let payload = match kind {
            MessageType::Heartbeat => Self::Heartbeat { timestamp: r.u32()? },
            MessageType::Log => {
                let category = r.u8()?;
                let category = LogCategory::try_from(category)
                    .map_err(|_| ProtocolError::Category(category))?;
                let severity = r.u8()?;
                Self::Log {
                    category,
                    severity,
                    text: r.text()?,
                }
            }
            MessageType::Reply => Self::Reply {
                status: i16::from_le_bytes(r.array()?),
                text: r.text()?,
            },
            MessageType::Pulse => {
                let header_size = r.u16()? as usize;
                let data_size = r.u16()? as usize;
                if header_size != PULSE_HEADER_SIZE
                    || buf.len() != header_size + data_size
                    || data_size % 2 != 0
                {
                    return Err(ProtocolError::Size {
                        declared: header_size + data_size,
                        actual: buf.len(),
                    });
                }
                let header = PulseHeader {
                    sequence: r.u32()?,
                    timestamp: r.u32()?,
                    status: PulseStatus::new_with_raw_value(r.u32()?),
                    gain: r.u16()?,
                    duration_ms: r.u16()?,
                    freq_start: r.f32()?,
                    freq_stop: r.f32()?,
                    freq_return: r.f32()?,
                };
                Self::Pulse {
                    header,
                    samples: Samples::Raw(r.take(data_size)?),
                }
            }
        };
        Ok(payload)
    }
}

/// Parse a complete received frame into its payload.
///
/// # Args
/// * `frame` - The message bytes, common header included.
pub fn parse(frame: &[u8]) -> Result<Payload<'_>, ProtocolError> {
    let mut r = Reader { buf: frame };
    let magic = r.u32()?;
    if magic != MAGIC {
        return Err(ProtocolError::Magic(magic));
    }
    let size = r.u16()? as usize;
    let kind = r.u16()?;
    let kind = MessageType::try_from(kind).map_err(|_| ProtocolError::Type(kind))?;

    let payload = &frame[HEADER_SIZE..];
    if payload.len() != size {
        return Err(ProtocolError::Size {
            declared: size,
            actual: payload.len(),
        });
    }

    Payload::decode(kind, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_header_layout() {
        let header = PulseHeader {
            sequence: 0x0403_0201,
            timestamp: 0x0807_0605,
            status: PulseStatus::DEFAULT.with_transmit_trigger(true),
            gain: 0x0a09,
            duration_ms: 0x0c0b,
            freq_start: 1.0,
            freq_stop: 2.0,
            freq_return: 0.0,
        };
        let payload = Payload::Pulse {
            header,
            samples: Samples::Codes(&[0xbbaa]),
        };
        let mut buf = [0u8; 34];
        assert_eq!(payload.encoded_len(), buf.len());
        payload.encode(&mut buf);

        assert_eq!(&buf[..4], &[32, 0, 2, 0]);
        assert_eq!(&buf[4..12], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&buf[12..16], &[1, 0, 0, 0]);
        assert_eq!(&buf[16..20], &[9, 10, 11, 12]);
        assert_eq!(&buf[20..24], &1.0f32.to_le_bytes());
        assert_eq!(&buf[32..], &[0xaa, 0xbb]);
    }

    #[test]
    fn reply_layout() {
        let payload = Payload::Reply {
            status: -3,
            text: "bad",
        };
        let mut buf = [0u8; 5];
        payload.encode(&mut buf);
        assert_eq!(buf, [0xfd, 0xff, b'b', b'a', b'd']);
    }

    #[test]
    fn rejects_bad_frames() {
        assert_eq!(parse(&[0xf4, 0xf3]).err(), Some(ProtocolError::Truncated));
        assert_eq!(
            parse(&[0, 0, 0, 0, 4, 0, 0, 0, 1, 2, 3, 4]).err(),
            Some(ProtocolError::Magic(0))
        );
        assert_eq!(
            parse(&[0xf4, 0xf3, 0xf2, 0xf1, 4, 0, 9, 0, 1, 2, 3, 4]).err(),
            Some(ProtocolError::Type(9))
        );
        assert_eq!(
            parse(&[0xf4, 0xf3, 0xf2, 0xf1, 5, 0, 0, 0, 1, 2, 3, 4]).err(),
            Some(ProtocolError::Size {
                declared: 5,
                actual: 4
            })
        );
    }

    #[test]
    fn raw_samples_iterate_little_endian() {
        let samples = Samples::Raw(&[0x34, 0x12, 0xff, 0x00, 0x01]);
        assert_eq!(samples.len(), 2);
        let codes: Vec<u16> = samples.iter().collect();
        assert_eq!(codes, [0x1234, 0x00ff]);
    }
}
