//! Sample buffer ownership
//!
//! # Design
//! Two buffers are handed to transfer engines: the output ramp table, read circularly by the
//! output driver, and the input ping-pong buffer written by the sampler. Their sizes depend on the
//! pulse duration, so they are released and allocated again on every reconfiguration. Both are
//! replaced as a pair: if either allocation fails, both buffers are left empty.
//!
//! Storage comes from a [BufferAllocator]. On the device this is a [SlabAllocator] over
//! statically reserved, transfer-aligned memory.
use core::ops::{Deref, DerefMut};

use crate::hardware::{
    design_parameters::{DMA_ALIGNMENT, SAMPLE_BYTES},
    BufferDescriptor, Wrap,
};
use crate::timing::TimingProfile;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    #[error("No free storage for {0} samples")]
    Exhausted(usize),
    #[error("Storage is not aligned for transfers")]
    Misaligned,
}

/// A source of sample storage.
pub trait BufferAllocator {
    type Block: DerefMut<Target = [u16]>;

    /// Allocate storage for exactly `len` samples.
    fn allocate(&mut self, len: usize) -> Result<Self::Block, AllocationError>;

    /// Return storage to the allocator.
    fn release(&mut self, block: Self::Block);
}

/// Backing memory of a single slab, aligned for the transfer engines.
#[repr(C, align(16))]
pub struct AlignedSlab<const N: usize>(pub [u16; N]);

const _: () = assert!(core::mem::align_of::<AlignedSlab<1>>() >= DMA_ALIGNMENT);

impl<const N: usize> AlignedSlab<N> {
    pub const fn new() -> Self {
        Self([0; N])
    }
}

impl<const N: usize> Default for AlignedSlab<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Storage handed out by a [SlabAllocator].
#[derive(Debug)]
pub struct Slab {
    index: usize,
    len: usize,
    storage: &'static mut [u16],
}

impl Deref for Slab {
    type Target = [u16];

    fn deref(&self) -> &[u16] {
        &self.storage[..self.len]
    }
}

impl DerefMut for Slab {
    fn deref_mut(&mut self) -> &mut [u16] {
        &mut self.storage[..self.len]
    }
}

/// Hands out whole slabs of static memory, at most one block per slab.
pub struct SlabAllocator<const SLOTS: usize> {
    slots: [Option<&'static mut [u16]>; SLOTS],
}

impl<const SLOTS: usize> SlabAllocator<SLOTS> {
    /// Construct the allocator.
    ///
    /// # Args
    /// * `slabs` - The memory to allocate from. Each slab must start on a transfer-aligned address.
    pub fn new(slabs: [&'static mut [u16]; SLOTS]) -> Result<Self, AllocationError> {
        if slabs
            .iter()
            .any(|slab| slab.as_ptr() as usize % DMA_ALIGNMENT != 0)
        {
            return Err(AllocationError::Misaligned);
        }

        Ok(Self {
            slots: slabs.map(Some),
        })
    }

    /// Number of slabs not currently handed out.
    pub fn available(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

impl<const SLOTS: usize> BufferAllocator for SlabAllocator<SLOTS> {
    type Block = Slab;

    fn allocate(&mut self, len: usize) -> Result<Slab, AllocationError> {
        // Best fit keeps the large slabs for the large buffers.
        let index = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|s| (i, s.len())))
            .filter(|&(_, size)| size >= len)
            .min_by_key(|&(_, size)| size)
            .map(|(i, _)| i)
            .ok_or(AllocationError::Exhausted(len))?;

        let storage = self.slots[index]
            .take()
            .ok_or(AllocationError::Exhausted(len))?;
        storage[..len].fill(0);

        Ok(Slab {
            index,
            len,
            storage,
        })
    }

    fn release(&mut self, block: Slab) {
        self.slots[block.index] = Some(block.storage);
    }
}

/// One transfer buffer and its storage.
pub struct SampleBuffer<B> {
    block: Option<B>,
}

impl<B: DerefMut<Target = [u16]>> SampleBuffer<B> {
    const fn empty() -> Self {
        Self { block: None }
    }

    /// Number of samples. Zero while no storage is bound.
    pub fn len(&self) -> usize {
        self.block.as_ref().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the buffer in bytes.
    pub fn bytes(&self) -> usize {
        self.len() * SAMPLE_BYTES
    }

    pub fn as_slice(&self) -> &[u16] {
        match &self.block {
            Some(block) => &block[..],
            None => &[],
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u16] {
        match &mut self.block {
            Some(block) => &mut block[..],
            None => &mut [],
        }
    }

    /// Describe the buffer to a transfer engine.
    pub fn descriptor(&self, wrap: Wrap) -> BufferDescriptor {
        BufferDescriptor::new(self.as_slice(), wrap)
    }
}

/// Owner of the output ramp table and the input ping-pong buffer.
pub struct BufferManager<A: BufferAllocator> {
    allocator: A,
    output: SampleBuffer<A::Block>,
    input: SampleBuffer<A::Block>,
}

impl<A: BufferAllocator> BufferManager<A> {
    pub fn new(allocator: A) -> Self {
        Self {
            allocator,
            output: SampleBuffer::empty(),
            input: SampleBuffer::empty(),
        }
    }

    /// Replace both buffers with storage sized for a profile.
    ///
    /// # Note
    /// The previous storage is always released first. On failure both buffers are empty.
    ///
    /// # Args
    /// * `profile` - The timing profile whose geometry the buffers must match.
    pub fn allocate(&mut self, profile: &TimingProfile) -> Result<(), AllocationError> {
        self.release();

        let output = self.allocator.allocate(profile.output_len)?;
        let input = match self.allocator.allocate(profile.input_len) {
            Ok(input) => input,
            Err(e) => {
                self.allocator.release(output);
                return Err(e);
            }
        };

        self.output.block = Some(output);
        self.input.block = Some(input);
        Ok(())
    }

    /// Return the storage of both buffers to the allocator.
    pub fn release(&mut self) {
        for buffer in [&mut self.output, &mut self.input] {
            if let Some(block) = buffer.block.take() {
                self.allocator.release(block);
            }
        }
    }

    pub fn output(&self) -> &SampleBuffer<A::Block> {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut SampleBuffer<A::Block> {
        &mut self.output
    }

    pub fn input(&self) -> &SampleBuffer<A::Block> {
        &self.input
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }
}
