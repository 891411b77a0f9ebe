//! Refreshing the display buffer from the CPU buffer during vertical
//! blanking.
//!
//! Two implementations of the same contract. [`RefreshEngine`] drives the
//! descriptor chain across a second DMA channel: the copy channel has no
//! hardware request source, so the engine issues one CPU burst request
//! per descriptor and waits for that descriptor's completion interrupt
//! before the next. [`StagedRefresh`] is the fallback for platforms
//! without a memory-to-memory DMA path: it copies a fixed fraction of
//! the buffer per vertical-sync edge, bounding the time spent per call
//! at the cost of a multi-frame full refresh.
//!
//! Both pause the scanout channel for the duration of their writes —
//! that pause is the entire tearing-avoidance story — and both consume
//! exactly one pending refresh request per call, so an edge that lands
//! mid-refresh stays queued.

use crate::channel::{CompletionFlag, DmaChannel, RefreshSignal};
use crate::descriptor::{CopyChain, DmaError, TdPool, TransferDescriptor};
use crate::framebuffer::FramePair;
use crate::scanout::ScanoutDriver;

/// Descriptor-chain bulk copy from the CPU buffer to the display buffer.
#[derive(Debug)]
pub struct RefreshEngine<C: DmaChannel> {
    channel: C,
    pool: TdPool,
    chain: CopyChain,
}

impl<C: DmaChannel> RefreshEngine<C> {
    /// Build the copy chain over a frame pair.
    ///
    /// The chain is built once, remainder burst included; nothing about
    /// it is recomputed per frame. The pair must stay in place (in
    /// practice: in a static) for as long as the engine may run.
    ///
    /// # Errors
    ///
    /// Propagates [`CopyChain::build`] errors; all of them mean the
    /// firmware is misconfigured and should not start.
    pub fn new<const ROWS: usize, const ROW_BYTES: usize>(
        channel: C,
        slots: &'static mut [TransferDescriptor],
        pair: &mut FramePair<ROWS, ROW_BYTES>,
        chunk_size: usize,
    ) -> Result<Self, DmaError> {
        let (src, dst) = pair.copy_ptrs();
        let mut pool = TdPool::new(slots);
        let chain = CopyChain::build(&mut pool, src, dst, ROWS * ROW_BYTES, chunk_size)?;
        Ok(Self {
            channel,
            pool,
            chain,
        })
    }

    /// Service one pending refresh request, if any.
    ///
    /// Returns `false` without touching anything when no request is
    /// pending. Otherwise: pause the scanout channel, arm and enable the
    /// copy channel at the chain head, then for each descriptor issue a
    /// CPU burst request and wait for its completion signal, clearing it
    /// before the next request. The last descriptor's null link disables
    /// the copy channel in hardware, so no explicit disable is issued.
    /// Finally consume one refresh request and resume scanout at row 0.
    ///
    /// The completion wait has no timeout: if the completion interrupt
    /// is lost, this blocks forever.
    pub fn service<S: DmaChannel>(
        &mut self,
        scanout: &mut ScanoutDriver<S>,
        signal: &RefreshSignal,
        done: &CompletionFlag,
    ) -> bool {
        if !signal.pending() {
            return false;
        }

        scanout.pause();

        self.channel.set_entry(self.pool.entry(self.chain.first()));
        self.channel.enable();
        for _ in 0..self.chain.len() {
            self.channel.request();
            done.wait();
        }

        signal.consume();
        scanout.resume();
        true
    }

    /// The built copy chain, for inspection.
    #[must_use]
    pub fn chain(&self) -> &CopyChain {
        &self.chain
    }
}

/// Software-copy refresh that spreads one frame over several calls.
///
/// Copying the whole buffer can take longer than the vertical retrace,
/// so each call moves `ROWS / stages` rows and a full refresh completes
/// after `stages` calls. At a 60 Hz vsync and 10 stages that is a 6 Hz
/// full-frame update rate.
#[derive(Debug)]
pub struct StagedRefresh {
    stages: usize,
    cursor: usize,
}

impl StagedRefresh {
    /// Create a staged refresh for a frame pair's shape.
    ///
    /// # Errors
    ///
    /// [`DmaError::ShapeMismatch`] unless `stages` divides the row count
    /// evenly — when the resolution changes, the stage count has to be
    /// revisited.
    pub fn new<const ROWS: usize, const ROW_BYTES: usize>(
        _pair: &FramePair<ROWS, ROW_BYTES>,
        stages: usize,
    ) -> Result<Self, DmaError> {
        if stages == 0 || ROWS % stages != 0 {
            return Err(DmaError::ShapeMismatch);
        }
        Ok(Self { stages, cursor: 0 })
    }

    /// Service one pending refresh request, copying one stage of rows.
    ///
    /// Returns `false` when no request is pending. The scanout channel
    /// is paused around the copy, exactly as for the DMA engine.
    pub fn service<S: DmaChannel, const ROWS: usize, const ROW_BYTES: usize>(
        &mut self,
        scanout: &mut ScanoutDriver<S>,
        pair: &mut FramePair<ROWS, ROW_BYTES>,
        signal: &RefreshSignal,
    ) -> bool {
        if !signal.pending() {
            return false;
        }
        debug_assert_eq!(ROWS % self.stages, 0);

        scanout.pause();

        let rows_per_stage = ROWS / self.stages;
        pair.copy_rows(self.cursor * rows_per_stage, rows_per_stage);
        self.cursor += 1;
        if self.cursor == self.stages {
            self.cursor = 0;
        }

        signal.consume();
        scanout.resume();
        true
    }

    /// True when the last service call completed a full frame.
    #[must_use]
    pub fn frame_complete(&self) -> bool {
        self.cursor == 0
    }
}
