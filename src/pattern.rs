//! Test-content fills for the CPU buffer.
//!
//! None of this is part of the scanout contract — it exists to put
//! recognizable pixels on the wire while bringing a board up. The glyph
//! set lives in an external byte-addressable ROM (an EEPROM on typical
//! hardware); [`GlyphRom`] is the seam for it.

use crate::framebuffer::FrameBuffer;

/// Byte-addressable source of 8x8 glyphs.
///
/// One byte is one packed row of a glyph, most significant bit leftmost,
/// same as the framebuffer layout. On real hardware this is a single
/// indexed EEPROM read per byte.
pub trait GlyphRom {
    /// Packed pixel row `row` (0..8) of glyph `glyph`.
    fn glyph_row(&self, glyph: u8, row: usize) -> u8;
}

// Box-drawing glyphs used for the grid rules.
const RULE_H: u8 = 0xC4;
const RULE_V: u8 = 0xB3;
const RULE_CROSS: u8 = 0xC5;

/// Frame the buffer: solid top and bottom rows, single-pixel side
/// borders.
///
/// Handy as a first test image — if the border lands on all four screen
/// edges, the buffer shape and the scanout timing agree.
pub fn draw_border<const ROWS: usize, const ROW_BYTES: usize>(
    fb: &mut FrameBuffer<ROWS, ROW_BYTES>,
) {
    for y in 0..ROWS {
        let row = fb.row_mut(y);
        if y == 0 || y == ROWS - 1 {
            row.fill(0xFF);
        } else {
            row.fill(0x00);
            row[0] = 0x80;
            row[ROW_BYTES - 1] = 0x01;
        }
    }
}

/// Fill the buffer with a glyph grid.
///
/// Cells are one byte wide and 8 rows tall. Glyph cells sit on even byte
/// columns and count through the glyph set; the columns between them
/// carry vertical rules, and every other cell row is a horizontal rule
/// with crosses where the rules meet. The grid shows glyph rendering and
/// cell alignment in one image.
pub fn draw_glyph_grid<const ROWS: usize, const ROW_BYTES: usize, R: GlyphRom>(
    fb: &mut FrameBuffer<ROWS, ROW_BYTES>,
    rom: &R,
) {
    for y in 0..ROWS {
        for x in 0..ROW_BYTES {
            let glyph = if (y % 16) / 8 == 0 {
                // Rule row: crosses over the vertical rules
                if x % 2 == 1 {
                    RULE_CROSS
                } else {
                    RULE_H
                }
            } else if x % 2 == 1 {
                RULE_V
            } else {
                (((y / 16) * (ROW_BYTES / 2) + x / 2) % 256) as u8
            };
            fb.row_mut(y)[x] = rom.glyph_row(glyph, y % 8);
        }
    }
}

/// Invert one 8-row glyph cell in place.
///
/// `col` is the byte column, `top_row` the cell's first buffer row. Used
/// to animate a cursor through a glyph grid without redrawing it.
pub fn invert_cell<const ROWS: usize, const ROW_BYTES: usize>(
    fb: &mut FrameBuffer<ROWS, ROW_BYTES>,
    col: usize,
    top_row: usize,
) {
    for row in top_row..(top_row + 8).min(ROWS) {
        fb.row_mut(row)[col] ^= 0xFF;
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    const ROWS: usize = 32;
    const ROW_BYTES: usize = 10;

    type TestBuffer = FrameBuffer<ROWS, ROW_BYTES>;

    /// Deterministic stand-in for the EEPROM glyph set.
    struct TestRom;

    impl GlyphRom for TestRom {
        fn glyph_row(&self, glyph: u8, row: usize) -> u8 {
            glyph.wrapping_add(row as u8)
        }
    }

    #[test]
    fn test_border_edges() {
        let mut fb = TestBuffer::new();
        draw_border(&mut fb);

        assert_eq!(fb.row(0), &[0xFF; ROW_BYTES]);
        assert_eq!(fb.row(ROWS - 1), &[0xFF; ROW_BYTES]);

        for y in 1..ROWS - 1 {
            let row = fb.row(y);
            assert_eq!(row[0], 0x80, "left border in row {y}");
            assert_eq!(row[ROW_BYTES - 1], 0x01, "right border in row {y}");
            for byte in &row[1..ROW_BYTES - 1] {
                assert_eq!(*byte, 0x00);
            }
        }
    }

    #[test]
    fn test_glyph_grid_rule_rows() {
        let mut fb = TestBuffer::new();
        let rom = TestRom;
        draw_glyph_grid(&mut fb, &rom);

        // Rows 0..8 are a rule row: dashes on glyph columns, crosses on
        // rule columns
        for y in 0..8 {
            assert_eq!(fb.row(y)[0], rom.glyph_row(RULE_H, y));
            assert_eq!(fb.row(y)[1], rom.glyph_row(RULE_CROSS, y));
        }
    }

    #[test]
    fn test_glyph_grid_glyph_rows() {
        let mut fb = TestBuffer::new();
        let rom = TestRom;
        draw_glyph_grid(&mut fb, &rom);

        // Rows 8..16 carry the first glyph strip
        for y in 8..16 {
            // First glyph cell counts from 0
            assert_eq!(fb.row(y)[0], rom.glyph_row(0, y % 8));
            // Vertical rule between glyph cells
            assert_eq!(fb.row(y)[1], rom.glyph_row(RULE_V, y % 8));
            // Second glyph cell
            assert_eq!(fb.row(y)[2], rom.glyph_row(1, y % 8));
        }

        // The next strip continues the count: 10 bytes / 2 = 5 cells
        for y in 24..32 {
            assert_eq!(fb.row(y)[0], rom.glyph_row(5, y % 8));
        }
    }

    #[test]
    fn test_invert_cell_is_an_involution() {
        let mut fb = TestBuffer::new();
        let rom = TestRom;
        draw_glyph_grid(&mut fb, &rom);

        let before = *fb.row(8);
        invert_cell(&mut fb, 0, 8);
        assert_eq!(fb.row(8)[0], !before[0]);
        // Only the addressed column changes
        assert_eq!(fb.row(8)[1], before[1]);

        invert_cell(&mut fb, 0, 8);
        assert_eq!(*fb.row(8), before);
    }

    #[test]
    fn test_invert_cell_clips_at_bottom() {
        let mut fb = TestBuffer::new();
        // A cell starting 4 rows from the end must not run off the buffer
        invert_cell(&mut fb, 3, ROWS - 4);
        for row in ROWS - 4..ROWS {
            assert_eq!(fb.row(row)[3], 0xFF);
        }
    }
}
