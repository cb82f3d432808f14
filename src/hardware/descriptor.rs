use super::design_parameters::SAMPLE_BYTES;

/// How a transfer engine walks its buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Wrap {
    /// Restart at the base address after the last sample.
    Circular,
    /// Restart at the base address after the last sample, interrupting once the first half and
    /// once the second half has been filled.
    PingPong,
}

/// A buffer as seen by a transfer engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BufferDescriptor {
    /// Address of the first sample.
    pub base: usize,
    /// Bytes per transfer.
    pub stride: usize,
    /// Number of samples.
    pub len: usize,
    pub wrap: Wrap,
}

impl BufferDescriptor {
    /// Describe a sample buffer.
    ///
    /// # Args
    /// * `samples` - The buffer the transfer engine reads from or writes to.
    /// * `wrap` - The wrap policy of the transfer.
    pub fn new(samples: &[u16], wrap: Wrap) -> Self {
        Self {
            base: samples.as_ptr() as usize,
            stride: SAMPLE_BYTES,
            len: samples.len(),
            wrap,
        }
    }

    /// The size of the described buffer in bytes.
    pub fn bytes(&self) -> usize {
        self.len * self.stride
    }
}

/// Counts loaded into the timing master and the trigger channels.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TimingDescriptor {
    /// The timing master modulus, one less than the sampler period.
    pub modulus: u16,
    /// Delay from the start of a period to the sampler conversion trigger.
    pub channel_delay: u16,
    /// Interval trigger of the output driver, one less than the output hold count.
    pub output_interval: u16,
}
