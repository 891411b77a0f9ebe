//! DMA descriptor-chained scanout engine for 1-bpp pixel-clocked displays.
//!
//! ## How pixel-clocked scanout works
//!
//! A VGA-style display is not a random-access device: the monitor expects a
//! continuous stream of pixels, one visible line at a time, with horizontal
//! and vertical blanking intervals in between. The timing generator (an
//! external collaborator of this crate) produces the sync pulses and a
//! monotonic *line counter*; the pixel shifter consumes one byte of packed
//! pixels at a time from a peripheral data register.
//!
//! Feeding that register from the CPU would consume the whole core, so the
//! work is split across two DMA channels:
//!
//! 1. **Scanout channel** — owns a single transfer descriptor that moves one
//!    row of the *display buffer* into the pixel register. The descriptor
//!    chains to itself, so every hardware request (one per display line)
//!    replays the same-shaped transfer. A line-rate interrupt re-aims the
//!    descriptor's source address at the next buffer row between requests.
//! 2. **Copy channel** — owns a chain of descriptors that bulk-copies the
//!    CPU-writable *frame buffer* into the display buffer. The chain runs
//!    only during vertical blanking, while the scanout channel is disabled,
//!    so a partially copied frame is never scanned out.
//!
//! The CPU composes frames into the CPU-side buffer at its leisure; the
//! line interrupt raises a refresh request when the last visible line has
//! been scanned, and the main loop services it. This double-buffered
//! hand-off is what keeps the output tear-free.
//!
//! ## Memory layout
//!
//! Pixels are packed 8 per byte, most significant bit leftmost. A display
//! of `visible_cols` columns needs `visible_cols / 8` bytes per row, and a
//! display of `visible_lines` lines scanned with a vertical duplication
//! factor of `y_factor` needs `visible_lines / y_factor` buffer rows (each
//! buffer row is shown `y_factor` times). For 800x600 at factor 2 that is
//! 100 x 300 bytes = 30000 bytes per buffer, which a chain of eight
//! descriptors covers at the default chunk size.
//!
//! All buffer shapes and descriptor counts are compile-time constants; the
//! [`compute_row_bytes`], [`compute_buffer_rows`] and
//! [`compute_descriptor_count`] helpers are `const fn` for exactly that
//! reason.
//!
//! ## Wiring contract
//!
//! The vendor side of the DMA engine is deliberately opaque: this crate
//! only asks for the [`channel::DmaChannel`] capability (arm an entry
//! descriptor, enable, disable, issue a CPU burst request). Descriptor
//! records live in ordinary RAM, in caller-provided static storage, and
//! are read by the hardware in place — so a board port programs its
//! channel registers once and points them at the records.
//!
//! Interrupt vectors are likewise board glue:
//!
//! - the line-rate interrupt reads the split line counter, combines it
//!   with [`combine_line_count`], and calls
//!   [`scanout::ScanoutDriver::on_line`] (on bare metal that usually means
//!   the driver sits in a critical-section-protected static);
//! - the copy-completion interrupt calls
//!   [`channel::CompletionFlag::raise`].
//!
//! Global interrupts must be enabled before either channel is enabled;
//! the refresh engine's per-descriptor handshake blocks forever otherwise.
//!
//! ## Example
//!
//! ```rust,no_run
//! use vga_scanout::channel::{CompletionFlag, DmaChannel, RefreshSignal};
//! use vga_scanout::descriptor::TransferDescriptor;
//! use vga_scanout::framebuffer::FramePair;
//! use vga_scanout::refresh::RefreshEngine;
//! use vga_scanout::scanout::ScanoutDriver;
//! use vga_scanout::{
//!     compute_buffer_rows, compute_descriptor_count, compute_row_bytes, CHUNK_SIZE,
//! };
//!
//! const VISIBLE_LINES: usize = 600;
//! const VISIBLE_COLS: usize = 800;
//! const Y_FACTOR: usize = 2;
//! const ROWS: usize = compute_buffer_rows(VISIBLE_LINES, Y_FACTOR);
//! const ROW_BYTES: usize = compute_row_bytes(VISIBLE_COLS);
//! const COPY_TDS: usize = compute_descriptor_count(ROWS * ROW_BYTES, CHUNK_SIZE);
//!
//! // Vendor bindings for the two DMA channels (register pokes elided).
//! struct Channel;
//! impl DmaChannel for Channel {
//!     fn set_entry(&mut self, _entry: *const TransferDescriptor) {}
//!     fn enable(&mut self) {}
//!     fn disable(&mut self) {}
//!     fn request(&mut self) {}
//! }
//!
//! // Shared with the interrupt handlers.
//! static REFRESH: RefreshSignal = RefreshSignal::new();
//! static COPY_DONE: CompletionFlag = CompletionFlag::new();
//!
//! let pair = Box::leak(Box::new(FramePair::<ROWS, ROW_BYTES>::new()));
//! let scan_slots = Box::leak(Box::new([TransferDescriptor::EMPTY; 1]));
//! let copy_slots = Box::leak(Box::new([TransferDescriptor::EMPTY; COPY_TDS]));
//!
//! let pixel_reg = 0x4000_6000usize as *mut u8;
//! let mut scanout = ScanoutDriver::new(
//!     Channel,
//!     scan_slots,
//!     pair.display(),
//!     pixel_reg,
//!     VISIBLE_LINES,
//!     Y_FACTOR,
//! )
//! .unwrap();
//! let mut refresh = RefreshEngine::new(Channel, copy_slots, pair, CHUNK_SIZE).unwrap();
//!
//! scanout.start();
//! loop {
//!     if !refresh.service(&mut scanout, &REFRESH, &COPY_DONE) {
//!         // Nothing to refresh: compose the next frame into pair.cpu_mut().
//!     }
//! }
//! ```
//!
//! ## Available Feature Flags
//!
//! ### `defmt` Feature
//! Implements `defmt::Format` for the public types so they can be emitted
//! with the `defmt` logging framework. No functional changes; purely adds
//! trait impls.
#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use embedded_graphics::pixelcolor::BinaryColor;

pub mod channel;
pub mod descriptor;
pub mod framebuffer;
pub mod pattern;
pub mod refresh;
pub mod scanout;
#[cfg(test)]
pub(crate) mod testhw;

/// Pixel type used by the framebuffers (1 bit per pixel).
pub type Color = BinaryColor;

/// Number of pixels packed into one framebuffer byte.
pub const PIXELS_PER_BYTE: usize = 8;

/// Default per-descriptor transfer size in bytes.
///
/// Chosen as the largest multiple of the 4-byte memory bus width that
/// still fits the descriptor's 12-bit transfer count.
pub const CHUNK_SIZE: usize = 4092;

/// Largest transfer a single descriptor can carry (12-bit count field).
pub const MAX_CHUNK_SIZE: usize = 4095;

/// Computes the bytes needed per buffer row for a display width.
///
/// # Arguments
///
/// * `visible_cols` - Number of visible pixel columns (must be a multiple
///   of 8)
///
/// # Returns
///
/// Bytes per row at 1 bit per pixel
#[must_use]
pub const fn compute_row_bytes(visible_cols: usize) -> usize {
    visible_cols / PIXELS_PER_BYTE
}

/// Computes the number of buffer rows for a display height.
///
/// Each buffer row is scanned out `y_factor` times, trading vertical
/// resolution for memory.
///
/// # Arguments
///
/// * `visible_lines` - Number of visible display lines
/// * `y_factor` - Vertical duplication factor (must divide `visible_lines`)
///
/// # Returns
///
/// Number of rows the frame buffers need to hold
#[must_use]
pub const fn compute_buffer_rows(visible_lines: usize, y_factor: usize) -> usize {
    visible_lines / y_factor
}

/// Computes the number of transfer descriptors needed to cover a buffer.
///
/// # Arguments
///
/// * `buffer_size` - Total transfer size in bytes
/// * `chunk_size` - Per-descriptor transfer size in bytes
///
/// # Returns
///
/// Descriptor count `ceil(buffer_size / chunk_size)`
#[must_use]
pub const fn compute_descriptor_count(buffer_size: usize, chunk_size: usize) -> usize {
    (buffer_size + chunk_size - 1) / chunk_size
}

/// Combines the split line-counter status bytes into one line index.
///
/// The timing generator exposes the current line as two status fields:
/// `hi` holds the upper bits, `lo` the lower eight.
#[must_use]
pub const fn combine_line_count(hi: u8, lo: u8) -> u16 {
    ((hi as u16) << 8) | lo as u16
}
