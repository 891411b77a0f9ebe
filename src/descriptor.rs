//! Transfer descriptors, the fixed descriptor pool, and the copy-chain
//! builder.
//!
//! A transfer descriptor is a hardware-visible record describing one
//! bounded DMA transfer: byte count, source, destination, a flag byte, and
//! a link to the next descriptor. Descriptors live in ordinary RAM, in
//! caller-provided static storage, and the DMA engine reads them in place;
//! a null link is the sentinel that disables the channel when the transfer
//! completes.
//!
//! Descriptors are drawn from a [`TdPool`], a bump arena whose slots are
//! handed out in order and never freed — a descriptor's identity is its
//! pool index for the lifetime of the firmware. [`CopyChain::build`]
//! covers an arbitrary buffer with the minimum number of bounded
//! descriptors and links them into a null-terminated chain, allocating
//! every slot before linking any: a link may only name a slot that already
//! exists.
//!
//! # Memory Layout
//! The record is `#[repr(C)]` so a board port can hand its address
//! straight to the channel hardware. The count field is 12 bits wide on
//! the target class of hardware, which bounds a single descriptor to
//! [`MAX_CHUNK_SIZE`](crate::MAX_CHUNK_SIZE) bytes.

use core::ptr::addr_of_mut;

use bitfield::bitfield;

use crate::{compute_descriptor_count, MAX_CHUNK_SIZE};

bitfield! {
    /// Flag byte of a transfer descriptor.
    ///
    /// The bit layout is as follows:
    /// - Bit 2: raise the completion interrupt when this descriptor's
    ///   transfer finishes
    /// - Bit 1: advance the destination address after every byte
    /// - Bit 0: advance the source address after every byte
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct TdFlags(u8);
    impl Debug;
    /// Raise the completion interrupt when the transfer finishes.
    pub term_out, set_term_out: 2;
    /// Advance the destination address after every byte.
    pub inc_dst, set_inc_dst: 1;
    /// Advance the source address after every byte.
    pub inc_src, set_inc_src: 0;
}

impl TdFlags {
    /// Create a flag byte with no flags set.
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }
}

/// A hardware-visible transfer descriptor.
///
/// One bounded transfer: `count` bytes from `src` to `dst`, address
/// increment and completion-interrupt behavior per `flags`, then on to
/// `next` (null = disable the channel).
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct TransferDescriptor {
    pub(crate) count: u16,
    pub(crate) flags: TdFlags,
    pub(crate) next: *mut TransferDescriptor,
    pub(crate) src: *const u8,
    pub(crate) dst: *mut u8,
}

impl TransferDescriptor {
    /// An empty descriptor used to initialize pool storage.
    pub const EMPTY: Self = Self {
        count: 0,
        flags: TdFlags::new(),
        next: core::ptr::null_mut(),
        src: core::ptr::null(),
        dst: core::ptr::null_mut(),
    };

    /// Transfer size in bytes.
    #[must_use]
    pub fn count(&self) -> usize {
        usize::from(self.count)
    }

    /// Flag byte.
    #[must_use]
    pub fn flags(&self) -> TdFlags {
        self.flags
    }

    /// Link to the next descriptor, null when this is the last.
    #[must_use]
    pub fn next(&self) -> *const TransferDescriptor {
        self.next
    }

    /// Source address.
    #[must_use]
    pub fn src(&self) -> *const u8 {
        self.src
    }

    /// Destination address.
    #[must_use]
    pub fn dst(&self) -> *const u8 {
        self.dst
    }
}

/// Errors raised while configuring descriptors and chains.
///
/// All of these indicate a misconfigured build rather than a runtime
/// condition; firmware is expected to treat them as fatal at startup and
/// halt rather than run with a partially configured chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaError {
    /// More descriptors are needed than the pool can supply.
    OutOfDescriptors,
    /// Chunk size is zero or exceeds the descriptor count field.
    InvalidChunkSize,
    /// The transfer covers no bytes.
    BufferTooSmall,
    /// Buffer shape and display timing disagree.
    ShapeMismatch,
}

/// Handle to a pool slot.
///
/// A descriptor's identity is its pool index; handles are only minted by
/// [`TdPool::allocate`], so a handle always names an allocated slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Td(u8);

impl Td {
    /// Pool index of this descriptor.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Fixed-capacity arena of transfer descriptors.
///
/// Slots are allocated once at startup and live for the process lifetime;
/// there is no free. The storage is borrowed for `'static` because the
/// channel hardware keeps reading the records for as long as the firmware
/// runs.
#[derive(Debug)]
pub struct TdPool {
    slots: &'static mut [TransferDescriptor],
    allocated: usize,
}

impl TdPool {
    /// Create a pool over the given slot storage, resetting every slot.
    #[must_use]
    pub fn new(slots: &'static mut [TransferDescriptor]) -> Self {
        slots.fill(TransferDescriptor::EMPTY);
        Self {
            slots,
            allocated: 0,
        }
    }

    /// Allocate the next slot.
    ///
    /// # Errors
    ///
    /// [`DmaError::OutOfDescriptors`] when every slot has been handed out.
    pub fn allocate(&mut self) -> Result<Td, DmaError> {
        if self.allocated == self.slots.len() || self.allocated > usize::from(u8::MAX) {
            return Err(DmaError::OutOfDescriptors);
        }
        let td = Td(self.allocated as u8);
        self.allocated += 1;
        Ok(td)
    }

    /// Number of slots handed out so far.
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    /// Total number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Configure a descriptor's count, link and flags.
    ///
    /// `next` is resolved to the target slot's address; `None` writes the
    /// null sentinel that disables the channel after this transfer.
    pub fn configure(&mut self, td: Td, count: u16, next: Option<Td>, flags: TdFlags) {
        debug_assert!(usize::from(count) <= MAX_CHUNK_SIZE);
        let next = match next {
            Some(n) => addr_of_mut!(self.slots[n.index()]),
            None => core::ptr::null_mut(),
        };
        let slot = &mut self.slots[td.index()];
        slot.count = count;
        slot.flags = flags;
        slot.next = next;
    }

    /// Set a descriptor's source and destination addresses.
    pub fn set_address(&mut self, td: Td, src: *const u8, dst: *mut u8) {
        let slot = &mut self.slots[td.index()];
        slot.src = src;
        slot.dst = dst;
    }

    /// Address of a descriptor record, suitable for arming a channel.
    #[must_use]
    pub fn entry(&self, td: Td) -> *const TransferDescriptor {
        &self.slots[td.index()]
    }

    /// Read access to a descriptor record.
    #[must_use]
    pub fn descriptor(&self, td: Td) -> &TransferDescriptor {
        &self.slots[td.index()]
    }

    pub(crate) fn descriptor_mut(&mut self, td: Td) -> &mut TransferDescriptor {
        &mut self.slots[td.index()]
    }
}

/// A built memory-to-memory copy chain: entry handle plus length.
///
/// The chain occupies consecutive pool slots starting at
/// [`first`](Self::first) and terminates in the null sentinel, so the
/// channel disables itself when the last descriptor completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyChain {
    first: Td,
    len: usize,
}

impl CopyChain {
    /// Build a chain covering `len` bytes from `src` to `dst`.
    ///
    /// Descriptor `i` transfers `min(chunk_size, len - i * chunk_size)`
    /// bytes from `src + i * chunk_size` to the matching destination
    /// offset, with both address increments enabled. The remainder burst,
    /// if any, is fixed here at build time. Every descriptor raises the
    /// completion interrupt: the refresh engine handshakes once per
    /// descriptor, not once per chain.
    ///
    /// `src` and `dst` must address buffers of at least `len` bytes that
    /// stay valid (and in place) for as long as the chain may run.
    ///
    /// # Errors
    ///
    /// - [`DmaError::InvalidChunkSize`] if `chunk_size` is zero or larger
    ///   than the descriptor count field allows
    /// - [`DmaError::BufferTooSmall`] if `len` is zero
    /// - [`DmaError::OutOfDescriptors`] if the pool cannot supply
    ///   `ceil(len / chunk_size)` slots
    pub fn build(
        pool: &mut TdPool,
        src: *const u8,
        dst: *mut u8,
        len: usize,
        chunk_size: usize,
    ) -> Result<Self, DmaError> {
        if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
            return Err(DmaError::InvalidChunkSize);
        }
        if len == 0 {
            return Err(DmaError::BufferTooSmall);
        }
        let count = compute_descriptor_count(len, chunk_size);

        // Allocate every slot first; links below name only existing slots.
        let first = pool.allocate()?;
        for _ in 1..count {
            pool.allocate()?;
        }

        let mut flags = TdFlags::new();
        flags.set_inc_src(true);
        flags.set_inc_dst(true);
        flags.set_term_out(true);

        let mut processed = 0;
        for i in 0..count {
            let td = Td(first.0 + i as u8);
            let burst = usize::min(chunk_size, len - processed);
            let next = if i + 1 < count {
                Some(Td(td.0 + 1))
            } else {
                None
            };
            pool.configure(td, burst as u16, next, flags);
            pool.set_address(td, unsafe { src.add(processed) }, unsafe {
                dst.add(processed)
            });
            processed += burst;
        }
        debug_assert_eq!(processed, len);

        Ok(Self { first, len: count })
    }

    /// Entry descriptor of the chain.
    #[must_use]
    pub fn first(&self) -> Td {
        self.first
    }

    /// Number of descriptors in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// A built chain always holds at least one descriptor.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate the chain's handles in transfer order.
    pub fn handles(&self) -> impl Iterator<Item = Td> {
        let first = self.first.0;
        (0..self.len).map(move |i| Td(first + i as u8))
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::boxed::Box;
    use std::vec::Vec;

    use super::*;

    fn pool(capacity: usize) -> TdPool {
        let slots = Box::leak(
            std::vec![TransferDescriptor::EMPTY; capacity].into_boxed_slice(),
        );
        TdPool::new(slots)
    }

    #[test]
    fn test_flags_bit_layout() {
        let mut flags = TdFlags::new();
        assert_eq!(flags.0, 0);

        flags.set_inc_src(true);
        assert_eq!(flags.0, 0b001);
        assert!(flags.inc_src());

        flags.set_inc_dst(true);
        assert_eq!(flags.0, 0b011);
        assert!(flags.inc_dst());

        flags.set_term_out(true);
        assert_eq!(flags.0, 0b111);
        assert!(flags.term_out());

        flags.set_inc_src(false);
        assert_eq!(flags.0, 0b110);
        assert!(!flags.inc_src());
        assert!(flags.inc_dst());
        assert!(flags.term_out());
    }

    #[test]
    fn test_empty_descriptor() {
        let td = TransferDescriptor::EMPTY;
        assert_eq!(td.count(), 0);
        assert_eq!(td.flags(), TdFlags::new());
        assert!(td.next().is_null());
        assert!(td.src().is_null());
        assert!(td.dst().is_null());
    }

    #[test]
    fn test_pool_allocates_sequential_indices() {
        let mut pool = pool(4);
        assert_eq!(pool.capacity(), 4);
        for i in 0..4 {
            let td = pool.allocate().unwrap();
            assert_eq!(td.index(), i);
            assert_eq!(pool.allocated(), i + 1);
        }
    }

    #[test]
    fn test_pool_exhaustion_is_an_error() {
        let mut pool = pool(2);
        pool.allocate().unwrap();
        pool.allocate().unwrap();
        assert_eq!(pool.allocate(), Err(DmaError::OutOfDescriptors));
    }

    #[test]
    fn test_pool_configure_links_to_slot_address() {
        let mut pool = pool(3);
        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();

        pool.configure(a, 16, Some(b), TdFlags::new());
        assert_eq!(pool.descriptor(a).next(), pool.entry(b));

        pool.configure(b, 16, None, TdFlags::new());
        assert!(pool.descriptor(b).next().is_null());
    }

    #[test]
    fn test_chain_descriptor_count_and_sizes() {
        // 800x600 at factor 2: 30000 bytes at the default chunk
        let mut pool = pool(8);
        let src = std::vec![0u8; 30_000];
        let mut dst = std::vec![0u8; 30_000];
        let chain =
            CopyChain::build(&mut pool, src.as_ptr(), dst.as_mut_ptr(), 30_000, 4092).unwrap();

        assert_eq!(chain.len(), 8);
        assert!(!chain.is_empty());

        let counts: Vec<usize> = chain.handles().map(|td| pool.descriptor(td).count()).collect();
        assert_eq!(&counts[..7], &[4092; 7]);
        assert_eq!(counts[7], 1356);
        assert_eq!(counts.iter().sum::<usize>(), 30_000);
    }

    #[test]
    fn test_chain_counts_sum_for_arbitrary_sizes() {
        for len in [1, 63, 64, 100, 4091, 4092, 4093, 10_000, 30_000] {
            for chunk in [64, 1000, 4092] {
                let mut pool = pool(compute_descriptor_count(len, chunk));
                let src = std::vec![0u8; len];
                let mut dst = std::vec![0u8; len];
                let chain =
                    CopyChain::build(&mut pool, src.as_ptr(), dst.as_mut_ptr(), len, chunk)
                        .unwrap();

                assert_eq!(chain.len(), compute_descriptor_count(len, chunk));
                let counts: Vec<usize> =
                    chain.handles().map(|td| pool.descriptor(td).count()).collect();
                assert_eq!(counts.iter().sum::<usize>(), len);
                // Every burst but the last is exactly one chunk
                for count in &counts[..counts.len() - 1] {
                    assert_eq!(*count, chunk);
                }
                assert!(counts[counts.len() - 1] <= chunk);
            }
        }
    }

    #[test]
    fn test_chain_exact_multiple_has_no_remainder_descriptor() {
        let mut pool = pool(2);
        let src = std::vec![0u8; 8184];
        let mut dst = std::vec![0u8; 8184];
        let chain =
            CopyChain::build(&mut pool, src.as_ptr(), dst.as_mut_ptr(), 8184, 4092).unwrap();

        assert_eq!(chain.len(), 2);
        for td in chain.handles() {
            assert_eq!(pool.descriptor(td).count(), 4092);
        }
    }

    #[test]
    fn test_chain_one_byte_over_gets_a_one_byte_tail() {
        let mut pool = pool(2);
        let src = std::vec![0u8; 4093];
        let mut dst = std::vec![0u8; 4093];
        let chain =
            CopyChain::build(&mut pool, src.as_ptr(), dst.as_mut_ptr(), 4093, 4092).unwrap();

        let counts: Vec<usize> = chain.handles().map(|td| pool.descriptor(td).count()).collect();
        assert_eq!(counts, [4092, 1]);
    }

    #[test]
    fn test_chain_is_null_terminated_and_acyclic() {
        let mut pool = pool(8);
        let src = std::vec![0u8; 30_000];
        let mut dst = std::vec![0u8; 30_000];
        let chain =
            CopyChain::build(&mut pool, src.as_ptr(), dst.as_mut_ptr(), 30_000, 4092).unwrap();

        // Walk the links: each descriptor points at the next slot, the
        // last at null, and the walk visits every descriptor exactly once.
        let mut cursor = pool.entry(chain.first());
        let mut visited = 0;
        while !cursor.is_null() {
            assert!(visited < chain.len(), "chain must not cycle");
            let td = chain.handles().nth(visited).unwrap();
            assert_eq!(cursor, pool.entry(td));
            cursor = pool.descriptor(td).next();
            visited += 1;
        }
        assert_eq!(visited, chain.len());
    }

    #[test]
    fn test_chain_flags_on_every_descriptor() {
        let mut pool = pool(3);
        let src = std::vec![0u8; 10_000];
        let mut dst = std::vec![0u8; 10_000];
        let chain =
            CopyChain::build(&mut pool, src.as_ptr(), dst.as_mut_ptr(), 10_000, 4092).unwrap();

        for td in chain.handles() {
            let flags = pool.descriptor(td).flags();
            assert!(flags.inc_src());
            assert!(flags.inc_dst());
            // Completion fires per descriptor, not only at the chain tail
            assert!(flags.term_out());
        }
    }

    #[test]
    fn test_chain_addresses_step_by_chunk() {
        let mut pool = pool(8);
        let src = std::vec![0u8; 30_000];
        let mut dst = std::vec![0u8; 30_000];
        let chain =
            CopyChain::build(&mut pool, src.as_ptr(), dst.as_mut_ptr(), 30_000, 4092).unwrap();

        for (i, td) in chain.handles().enumerate() {
            let record = pool.descriptor(td);
            assert_eq!(record.src(), unsafe { src.as_ptr().add(i * 4092) });
            assert_eq!(record.dst(), unsafe { dst.as_ptr().add(i * 4092) });
        }
    }

    #[test]
    fn test_chain_single_descriptor() {
        let mut pool = pool(1);
        let src = [0u8; 100];
        let mut dst = [0u8; 100];
        let chain =
            CopyChain::build(&mut pool, src.as_ptr(), dst.as_mut_ptr(), 100, 4092).unwrap();

        assert_eq!(chain.len(), 1);
        let record = pool.descriptor(chain.first());
        assert_eq!(record.count(), 100);
        assert!(record.next().is_null());
    }

    #[test]
    fn test_chain_rejects_bad_chunk_sizes() {
        let src = [0u8; 100];
        let mut dst = [0u8; 100];

        let mut p = pool(1);
        assert_eq!(
            CopyChain::build(&mut p, src.as_ptr(), dst.as_mut_ptr(), 100, 0),
            Err(DmaError::InvalidChunkSize)
        );
        let mut p = pool(1);
        assert_eq!(
            CopyChain::build(&mut p, src.as_ptr(), dst.as_mut_ptr(), 100, MAX_CHUNK_SIZE + 1),
            Err(DmaError::InvalidChunkSize)
        );
        // The hardware bound itself is fine
        let mut p = pool(1);
        assert!(
            CopyChain::build(&mut p, src.as_ptr(), dst.as_mut_ptr(), 100, MAX_CHUNK_SIZE).is_ok()
        );
    }

    #[test]
    fn test_chain_rejects_empty_transfer() {
        let mut pool = pool(1);
        let src = [0u8; 1];
        let mut dst = [0u8; 1];
        assert_eq!(
            CopyChain::build(&mut pool, src.as_ptr(), dst.as_mut_ptr(), 0, 4092),
            Err(DmaError::BufferTooSmall)
        );
    }

    #[test]
    fn test_chain_rejects_undersized_pool() {
        // 30000 bytes needs 8 descriptors; 7 slots is a misconfiguration
        let mut pool = pool(7);
        let src = [0u8; 1];
        let mut dst = [0u8; 1];
        assert_eq!(
            CopyChain::build(&mut pool, src.as_ptr(), dst.as_mut_ptr(), 30_000, 4092),
            Err(DmaError::OutOfDescriptors)
        );
    }
}
