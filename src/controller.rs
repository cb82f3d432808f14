//! Main-loop service
//!
//! The controller connects the radar to the host link. It executes host commands and answers each
//! with a reply, sends periodic heartbeats and reports acquired pulses.
use core::fmt::Write;

use fugit::{MillisDurationU32, TimerInstantU32};
use radar_protocol::{
    LogCategory, Messenger, Payload, ProtocolError, PulseHeader, PulseStatus, Samples, Sink,
};

use crate::{
    buffers::BufferAllocator,
    command::Command,
    hardware::Hardware,
    radar::{Error, Radar},
    settings::{Settings, WaveformRequest},
};

/// Millisecond time base of the main loop.
pub type Instant = TimerInstantU32<1000>;

const VERSION: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

/// Format a displayable value into reply text, truncating if needed.
fn text(value: &impl core::fmt::Display) -> heapless::String<96> {
    let mut text = heapless::String::new();
    write!(&mut text, "{value}").ok();
    text
}

pub struct Controller<'a, H: Hardware, A: BufferAllocator, S: Sink> {
    radar: Radar<'a, H, A>,
    messenger: Messenger<S>,
    heartbeat_interval: MillisDurationU32,
    last_heartbeat: Option<Instant>,
}

impl<'a, H: Hardware, A: BufferAllocator, S: Sink> Controller<'a, H, A, S> {
    /// Construct the controller and announce readiness to the host.
    ///
    /// # Args
    /// * `radar` - The calibrated radar.
    /// * `sink` - The host link transport.
    /// * `settings` - Startup settings.
    pub fn new(
        radar: Radar<'a, H, A>,
        sink: S,
        settings: &Settings,
    ) -> Result<Self, ProtocolError> {
        radar.pulses().set_transmit(settings.transmit_trigger);

        let mut controller = Self {
            radar,
            messenger: Messenger::new(sink),
            heartbeat_interval: MillisDurationU32::millis(settings.heartbeat_interval_ms),
            last_heartbeat: None,
        };
        controller.log(LogCategory::Info, 0, VERSION)?;

        if settings.autostart {
            if let Err(e) = controller.start(settings.waveform) {
                controller.log(LogCategory::Error, 1, &text(&e))?;
            }
        }

        Ok(controller)
    }

    pub fn radar(&self) -> &Radar<'a, H, A> {
        &self.radar
    }

    pub fn radar_mut(&mut self) -> &mut Radar<'a, H, A> {
        &mut self.radar
    }

    pub fn sink(&self) -> &S {
        self.messenger.sink()
    }

    fn start(&mut self, request: WaveformRequest) -> Result<(), Error> {
        self.radar.configure(request)?;
        self.radar.start()
    }

    fn log(
        &mut self,
        category: LogCategory,
        severity: u8,
        text: &str,
    ) -> Result<(), ProtocolError> {
        self.messenger.send(&Payload::Log {
            category,
            severity,
            text,
        })?;
        Ok(())
    }

    fn reply(&mut self, status: i16, text: &str) -> Result<(), ProtocolError> {
        self.messenger.send(&Payload::Reply { status, text })?;
        Ok(())
    }

    /// Execute a deframed host command and reply to it.
    pub fn handle_command(&mut self, frame: &[u8]) -> Result<(), ProtocolError> {
        let command = match Command::parse(frame) {
            Ok(command) => command,
            Err(e) => {
                log::warn!("Rejected command: {e}");
                let text = text(&e);
                self.log(LogCategory::Warn, 1, &text)?;
                return self.reply(e.code(), &text);
            }
        };

        log::debug!("Command {command:?}");
        match command {
            Command::Version => self.reply(0, VERSION),
            Command::Start(request) => match self.start(request) {
                Ok(()) => self.reply(0, "Running"),
                Err(e) => self.reply(e.code(), &text(&e)),
            },
            Command::Stop => {
                self.radar.stop();
                self.reply(0, "Stopped")
            }
            Command::TransmitOn => {
                self.radar.pulses().set_transmit(true);
                self.reply(0, "Transmit enabled")
            }
            Command::TransmitOff => {
                self.radar.pulses().set_transmit(false);
                self.reply(0, "Transmit disabled")
            }
        }
    }

    /// Service the host link.
    ///
    /// # Note
    /// Sends a heartbeat once the interval has elapsed and reports at most one pulse per call.
    ///
    /// # Args
    /// * `now` - The current time.
    pub fn poll(&mut self, now: Instant) -> Result<(), ProtocolError> {
        let due = self
            .last_heartbeat
            .map(|last| now - last >= self.heartbeat_interval)
            .unwrap_or(true);
        if due {
            self.last_heartbeat = Some(now);
            self.messenger.send(&Payload::Heartbeat {
                timestamp: now.ticks(),
            })?;
        }

        if let Some(pulse) = self.radar.next_pulse() {
            let header = PulseHeader {
                sequence: pulse.record.sequence,
                timestamp: pulse.record.timestamp,
                status: PulseStatus::DEFAULT
                    .with_transmit_trigger(pulse.record.transmit_trigger),
                gain: pulse.request.gain,
                duration_ms: pulse.request.duration_ms,
                freq_start: pulse.request.freq_start,
                freq_stop: pulse.request.freq_stop,
                freq_return: pulse.request.freq_return,
            };
            self.messenger.send(&Payload::Pulse {
                header,
                samples: Samples::Codes(pulse.samples),
            })?;
        }

        Ok(())
    }
}
