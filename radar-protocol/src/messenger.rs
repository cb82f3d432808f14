use super::{Payload, ProtocolError, HEADER_SIZE, MAGIC, MAX_FRAME_SIZE};

/// The transport that outgoing frames are handed to.
pub trait Sink {
    /// Transmit a complete frame. Delivery is best-effort.
    fn transmit(&mut self, frame: &[u8]);
}

impl<F: FnMut(&[u8])> Sink for F {
    fn transmit(&mut self, frame: &[u8]) {
        self(frame)
    }
}

/// Encodes messages into a fixed scratch buffer and hands them to the transport.
///
/// # Note
/// A single scratch region backs every message. The header is written directly in front of the
/// payload, so a frame is never copied before transmission.
pub struct Messenger<S, const N: usize = MAX_FRAME_SIZE> {
    buffer: [u8; N],
    sink: S,
}

impl<S: Sink, const N: usize> Messenger<S, N> {
    /// Construct a messenger sending through the provided sink.
    pub fn new(sink: S) -> Self {
        Self {
            buffer: [0; N],
            sink,
        }
    }

    /// The largest payload that fits the scratch buffer.
    pub const fn payload_capacity(&self) -> usize {
        N - HEADER_SIZE
    }

    /// Encode and transmit a message.
    ///
    /// # Returns
    /// The number of bytes transmitted. If the message does not fit the scratch buffer, nothing
    /// is written or transmitted and [ProtocolError::OutOfSpace] is returned.
    pub fn send(&mut self, payload: &Payload) -> Result<usize, ProtocolError> {
        let size = payload.encoded_len();
        let required = HEADER_SIZE + size;
        if required > N || size > u16::MAX as usize {
            log::warn!("Dropping {:?} message of {required} bytes", payload.kind());
            return Err(ProtocolError::OutOfSpace {
                required,
                capacity: N,
            });
        }

        let kind: u16 = payload.kind().into();
        for (byte, buf) in MAGIC
            .to_le_bytes()
            .iter()
            .chain((size as u16).to_le_bytes().iter())
            .chain(kind.to_le_bytes().iter())
            .zip(self.buffer.iter_mut())
        {
            *buf = *byte;
        }
        payload.encode(&mut self.buffer[HEADER_SIZE..required]);

        self.sink.transmit(&self.buffer[..required]);
        Ok(required)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}
