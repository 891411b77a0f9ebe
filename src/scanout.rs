//! Per-line scanout driver and the line-rate decision logic.
//!
//! The scanout channel streams one display-buffer row into the pixel
//! register per hardware request, and the timing generator issues one
//! request per display line. The driver's single descriptor chains to
//! itself, so the hardware replays the same-shaped transfer forever; all
//! the line interrupt does is re-aim the descriptor's source address at
//! the right buffer row between requests.
//!
//! The repoint decision is a pure function of the externally supplied
//! line index ([`plan_line`]), kept separate from the hardware pokes so
//! it can be tested without an interrupt controller. The interrupt entry
//! point ([`ScanoutDriver::on_line`]) applies the decision: at most one
//! pointer-field store and one saturating counter increment, no blocking.
//! The store must land before the hardware's next per-line request — one
//! line period — which is the single hard real-time deadline in the
//! system.

use crate::channel::{DmaChannel, RefreshSignal};
use crate::descriptor::{DmaError, Td, TdFlags, TdPool, TransferDescriptor};
use crate::framebuffer::FrameBuffer;
use crate::MAX_CHUNK_SIZE;

/// What the line interrupt must do for one line index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineAction {
    /// Re-aim the scanout descriptor at this buffer row before the next
    /// per-line request.
    pub repoint: Option<usize>,
    /// The last visible line is on the wire; post a refresh request.
    pub enters_vblank: bool,
}

impl LineAction {
    /// No repoint, no refresh request.
    pub const NONE: Self = Self {
        repoint: None,
        enters_vblank: false,
    };
}

/// Decide the line interrupt's work for one line index.
///
/// Driven entirely by the external line counter, not by internal state:
///
/// - line 0: nothing — the descriptor was aimed at row 0 when scanout
///   (re)started;
/// - a visible line that starts a new duplicated group: repoint to row
///   `line / y_factor`;
/// - the last visible line: report vertical-blanking entry;
/// - blanking lines: nothing.
///
/// A repoint and the vblank report can coincide on one line (they do
/// whenever `y_factor` is 1).
#[must_use]
pub const fn plan_line(line: u16, visible_lines: usize, y_factor: usize) -> LineAction {
    let line = line as usize;
    let mut action = LineAction::NONE;
    if line == 0 {
        return action;
    }
    if line < visible_lines && line % y_factor == 0 {
        action.repoint = Some(line / y_factor);
    }
    if line + 1 == visible_lines {
        action.enters_vblank = true;
    }
    action
}

/// Driver for the per-line scanout channel.
///
/// Owns one channel and one descriptor, configured once: one row of
/// packed pixels per request, source advancing through the row, the
/// destination pinned on the peripheral pixel register. The descriptor's
/// completion interrupt is what invokes the line handler after every row.
///
/// The driver never retriggers transfers itself — the timing generator's
/// per-line request signal does — so its normal-operation surface is just
/// [`on_line`](Self::on_line), [`pause`](Self::pause) and
/// [`resume`](Self::resume).
#[derive(Debug)]
pub struct ScanoutDriver<C: DmaChannel> {
    channel: C,
    pool: TdPool,
    td: Td,
    row0: *const u8,
    row_bytes: usize,
    rows: usize,
    visible_lines: usize,
    y_factor: usize,
}

impl<C: DmaChannel> ScanoutDriver<C> {
    /// Configure the scanout descriptor for a display buffer.
    ///
    /// `pixel_reg` is the peripheral output data register the display
    /// controller drains; `visible_lines` and `y_factor` describe the
    /// display timing the buffer shape was derived from.
    ///
    /// # Errors
    ///
    /// - [`DmaError::BufferTooSmall`] for an empty buffer shape
    /// - [`DmaError::InvalidChunkSize`] if a row exceeds one descriptor's
    ///   transfer bound
    /// - [`DmaError::ShapeMismatch`] if the buffer shape does not match
    ///   the display timing
    /// - [`DmaError::OutOfDescriptors`] if `slots` is empty
    pub fn new<const ROWS: usize, const ROW_BYTES: usize>(
        channel: C,
        slots: &'static mut [TransferDescriptor],
        display: &FrameBuffer<ROWS, ROW_BYTES>,
        pixel_reg: *mut u8,
        visible_lines: usize,
        y_factor: usize,
    ) -> Result<Self, DmaError> {
        if ROWS == 0 || ROW_BYTES == 0 {
            return Err(DmaError::BufferTooSmall);
        }
        if ROW_BYTES > MAX_CHUNK_SIZE {
            return Err(DmaError::InvalidChunkSize);
        }
        if y_factor == 0 || visible_lines % y_factor != 0 || visible_lines / y_factor != ROWS {
            return Err(DmaError::ShapeMismatch);
        }

        let mut pool = TdPool::new(slots);
        let td = pool.allocate()?;
        // Self-chaining: finishing one row queues the next identical
        // transfer, so only the source address ever changes at runtime.
        let mut flags = TdFlags::new();
        flags.set_inc_src(true);
        flags.set_term_out(true);
        pool.configure(td, ROW_BYTES as u16, Some(td), flags);
        pool.set_address(td, display.row_ptr(0), pixel_reg);

        Ok(Self {
            channel,
            pool,
            td,
            row0: display.row_ptr(0),
            row_bytes: ROW_BYTES,
            rows: ROWS,
            visible_lines,
            y_factor,
        })
    }

    /// Arm the entry descriptor and enable the channel.
    ///
    /// Streaming then runs continuously, one row per external per-line
    /// request. Global interrupts must already be enabled.
    pub fn start(&mut self) {
        self.channel.set_entry(self.pool.entry(self.td));
        self.channel.enable();
    }

    /// Disable the channel for the duration of a display-buffer refresh.
    pub fn pause(&mut self) {
        self.channel.disable();
    }

    /// Re-aim the descriptor at row 0 and re-enable the channel.
    ///
    /// The line-0 no-repoint rule in [`on_line`](Self::on_line) relies on
    /// the row-0 binding happening here.
    pub fn resume(&mut self) {
        self.repoint(0);
        self.start();
    }

    /// Aim the descriptor's source at a buffer row.
    ///
    /// A single address-field store; when called from the line interrupt
    /// it must land within one line period.
    pub fn repoint(&mut self, row: usize) {
        debug_assert!(row < self.rows);
        self.pool.descriptor_mut(self.td).src = unsafe { self.row0.add(row * self.row_bytes) };
    }

    /// Line interrupt entry point.
    ///
    /// Reads nothing but the supplied line index and writes at most one
    /// descriptor address field and the refresh counter, so it is safe
    /// against re-invocation at a line boundary and cannot miss its
    /// deadline doing incidental work.
    pub fn on_line(&mut self, line: u16, refresh: &RefreshSignal) {
        let action = plan_line(line, self.visible_lines, self.y_factor);
        if let Some(row) = action.repoint {
            self.repoint(row);
        }
        if action.enters_vblank {
            refresh.post();
        }
    }

    /// The scanout descriptor record, for inspection.
    #[must_use]
    pub fn descriptor(&self) -> &TransferDescriptor {
        self.pool.descriptor(self.td)
    }
}
