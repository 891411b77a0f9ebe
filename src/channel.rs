//! DMA channel capability and the interrupt/main-loop handshake primitives.
//!
//! The vendor-specific register bindings for a DMA channel are out of this
//! crate's scope; [`DmaChannel`] is the narrow capability the drivers need
//! from them. A board port implements it with a handful of register pokes
//! and hands one instance per hardware channel to the drivers.
//!
//! The two primitives below are the *only* state shared between interrupt
//! context and the main loop:
//!
//! - [`CompletionFlag`] — raised by the transfer-completion interrupt,
//!   consumed by the refresh engine's per-descriptor wait;
//! - [`RefreshSignal`] — incremented by the line interrupt at the vertical
//!   sync edge, decremented by the main loop once per completed refresh.
//!
//! Both are single atomics. The target class of hardware has no blocking
//! primitive, so the completion wait is a polling loop; the ordering
//! guarantee that matters (the flag is cleared before the next burst
//! request is issued) is preserved by consuming the flag with a swap.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::descriptor::TransferDescriptor;

/// Capability to drive one hardware DMA channel.
///
/// Descriptor records live in RAM and are read by the hardware in place;
/// the channel only needs to know where a transfer starts. Mapping for a
/// typical vendor API: `set_entry` programs the channel's initial
/// descriptor register, `request` issues a CPU-sourced burst trigger for
/// channels that have no hardware request source.
///
/// A channel must not be re-armed with a new entry while a transfer on it
/// is still in flight; the drivers in this crate uphold that by disabling
/// a channel before re-arming it.
pub trait DmaChannel {
    /// Program the channel's entry descriptor. Takes effect on the next
    /// [`enable`](Self::enable).
    fn set_entry(&mut self, entry: *const TransferDescriptor);

    /// Enable the channel. Execution begins at the armed entry descriptor
    /// on the next request.
    fn enable(&mut self);

    /// Disable the channel, ending per-request servicing immediately.
    fn disable(&mut self);

    /// Issue one CPU-sourced burst request.
    fn request(&mut self);
}

/// One-shot completion flag set by the transfer-completion interrupt.
///
/// Single writer (the completion ISR), single reader (the refresh
/// engine). A one-byte flag is wide enough on the target hardware; the
/// atomic here preserves the same contract without relying on `volatile`.
#[derive(Debug, Default)]
pub struct CompletionFlag(AtomicBool);

impl CompletionFlag {
    /// Create a lowered flag.
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Raise the flag. Called from the completion interrupt handler.
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Consume the flag if raised, lowering it.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    /// Spin until the flag is raised, then lower it.
    ///
    /// There is no timeout: if the completion interrupt never fires the
    /// caller blocks forever. Interrupts must be enabled before any wait.
    pub fn wait(&self) {
        while !self.take() {
            core::hint::spin_loop();
        }
    }
}

/// Saturating count of outstanding refresh requests.
///
/// The line interrupt posts one request per vertical-sync edge; the main
/// loop consumes one per completed refresh. A counter rather than a flag,
/// so an edge that lands while a refresh is still executing queues up
/// instead of being silently dropped. Saturates at 255, which only bounds
/// a backlog the consumer could never clear anyway.
#[derive(Debug, Default)]
pub struct RefreshSignal(AtomicU8);

impl RefreshSignal {
    /// Create a signal with no pending requests.
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    /// Post one refresh request. Called from the line interrupt handler.
    pub fn post(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                n.checked_add(1)
            });
    }

    /// Returns true if at least one request is pending.
    #[must_use]
    pub fn pending(&self) -> bool {
        self.0.load(Ordering::Acquire) > 0
    }

    /// Consume one pending request, if any.
    ///
    /// Decrements rather than clears, so a request posted mid-refresh is
    /// serviced on the next main-loop pass.
    pub fn consume(&self) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}
