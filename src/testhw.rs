//! Test-only software stand-in for a hardware DMA channel.
//!
//! Interprets [`TransferDescriptor`] records the way the engine would: a
//! burst request executes the current descriptor's transfer, raises the
//! completion flag when the descriptor asks for it, and follows the link,
//! disabling on the null sentinel. This lets the drivers' full
//! request/interrupt choreography run on the host.

use crate::channel::{CompletionFlag, DmaChannel};
use crate::descriptor::TransferDescriptor;

pub(crate) struct SoftChannel {
    entry: *const TransferDescriptor,
    current: *const TransferDescriptor,
    enabled: bool,
    done: Option<&'static CompletionFlag>,
    requests: usize,
}

impl SoftChannel {
    pub(crate) fn new() -> Self {
        Self {
            entry: core::ptr::null(),
            current: core::ptr::null(),
            enabled: false,
            done: None,
            requests: 0,
        }
    }

    /// A channel whose terminal interrupts raise `done`, standing in for
    /// the completion interrupt vector.
    pub(crate) fn with_completion(done: &'static CompletionFlag) -> Self {
        Self {
            done: Some(done),
            ..Self::new()
        }
    }

    pub(crate) fn enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn requests(&self) -> usize {
        self.requests
    }
}

impl DmaChannel for SoftChannel {
    fn set_entry(&mut self, entry: *const TransferDescriptor) {
        self.entry = entry;
    }

    fn enable(&mut self) {
        self.enabled = true;
        self.current = self.entry;
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn request(&mut self) {
        if !self.enabled || self.current.is_null() {
            return;
        }
        self.requests += 1;

        let td = unsafe { &*self.current };
        unsafe {
            for i in 0..usize::from(td.count) {
                let src = if td.flags.inc_src() {
                    td.src.add(i)
                } else {
                    td.src
                };
                let dst = if td.flags.inc_dst() { td.dst.add(i) } else { td.dst };
                *dst = *src;
            }
        }
        if td.flags.term_out() {
            if let Some(done) = self.done {
                done.raise();
            }
        }

        // Null link is the disable sentinel
        let next = td.next;
        if next.is_null() {
            self.enabled = false;
        }
        self.current = next;
    }
}
