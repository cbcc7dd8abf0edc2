//! Fallback mark positioning for fonts without usable GPOS data, driven
//! by combining classes and glyph extents.

use crate::buffer::Buffer;
use crate::font::{Font, GlyphExtents};
use crate::plan::ShapePlan;

// Combining classes the positioning heuristics care about.
mod ccc {
    pub const ATTACHED_BELOW_LEFT: u8 = 200;
    pub const ATTACHED_BELOW: u8 = 202;
    pub const ATTACHED_ABOVE: u8 = 214;
    pub const ATTACHED_ABOVE_RIGHT: u8 = 216;
    pub const BELOW_LEFT: u8 = 218;
    pub const BELOW: u8 = 220;
    pub const BELOW_RIGHT: u8 = 222;
    pub const LEFT: u8 = 224;
    pub const RIGHT: u8 = 226;
    pub const ABOVE_LEFT: u8 = 228;
    pub const ABOVE: u8 = 230;
    pub const ABOVE_RIGHT: u8 = 232;
    pub const DOUBLE_BELOW: u8 = 233;
    pub const DOUBLE_ABOVE: u8 = 234;
}

/// Maps characters whose combining class is unhelpful for positioning to
/// a class the heuristics understand.
fn recategorize_combining_class(u: u32, klass: u8) -> u8 {
    if klass >= 225 {
        return klass;
    }

    // Thai and Lao vowels and tone marks position above/below regardless
    // of their numeric class.
    match u {
        0x0E31 | 0x0E34..=0x0E37 | 0x0E47..=0x0E4E => return ccc::ABOVE_RIGHT,
        0x0E38 | 0x0E39 => return ccc::ATTACHED_BELOW,
        0x0E3A => return ccc::BELOW_RIGHT,
        0x0EB1 | 0x0EB4..=0x0EB7 | 0x0EC8..=0x0ECD => return ccc::ABOVE,
        0x0EB8 | 0x0EB9 => return ccc::BELOW,
        _ => {}
    }

    match klass {
        // Hebrew
        10..=22 => ccc::BELOW,         // sheva..meteg
        23 => ccc::ATTACHED_ABOVE,     // rafe
        24 | 25 => ccc::ABOVE_RIGHT,   // shin/sin dot
        // Arabic and Syriac
        27..=29 | 30..=32 | 35 | 36 => ccc::ABOVE, // tanween, superscript alef, alaph
        33 | 34 => ccc::BELOW,                     // kasra forms
        // Telugu length marks behave like spacing, not stacking.
        84 | 91 => 0,
        // Tibetan
        129 | 132 => ccc::BELOW,
        130 => ccc::ABOVE,
        _ => klass,
    }
}

pub(crate) fn recategorize_marks(buffer: &mut Buffer) {
    for info in buffer.info_mut() {
        if info.is_unicode_mark() {
            let klass = info.modified_combining_class();
            let new_class = recategorize_combining_class(info.codepoint, klass);
            if new_class != klass {
                info.set_modified_combining_class(new_class);
            }
        }
    }
}

fn zero_mark_advances(buffer: &mut Buffer, start: usize, end: usize, adjust_offsets: bool) {
    for i in start..end {
        if buffer.info[i].general_category()
            == crate::unicode::GeneralCategory::NonspacingMark
        {
            if adjust_offsets {
                buffer.pos[i].x_offset -= buffer.pos[i].x_advance / 2;
            }
            buffer.pos[i].x_advance = 0;
            buffer.pos[i].y_advance = 0;
        }
    }
}

fn position_mark(
    font: &Font,
    buffer: &mut Buffer,
    base_extents: &mut GlyphExtents,
    i: usize,
    combining_class: u8,
) {
    let Some(mark_extents) = font.glyph_extents(buffer.info[i].codepoint) else {
        return;
    };

    let y_gap = font.scale().1 / 16;
    let pos = &mut buffer.pos[i];
    pos.x_offset = 0;
    pos.y_offset = 0;

    // Horizontal alignment.
    match combining_class {
        ccc::DOUBLE_BELOW | ccc::DOUBLE_ABOVE => {
            // Halfway off the trailing edge, straddling two bases.
            if buffer.direction == crate::Direction::LeftToRight {
                pos.x_offset += base_extents.x_bearing + base_extents.width
                    - mark_extents.width / 2
                    - mark_extents.x_bearing;
            } else {
                pos.x_offset +=
                    base_extents.x_bearing - mark_extents.width / 2 - mark_extents.x_bearing;
            }
        }
        ccc::ATTACHED_BELOW_LEFT | ccc::BELOW_LEFT | ccc::ABOVE_LEFT => {
            pos.x_offset += base_extents.x_bearing - mark_extents.x_bearing;
        }
        ccc::ATTACHED_ABOVE_RIGHT | ccc::BELOW_RIGHT | ccc::ABOVE_RIGHT => {
            pos.x_offset += base_extents.x_bearing + base_extents.width
                - mark_extents.width
                - mark_extents.x_bearing;
        }
        _ => {
            pos.x_offset += base_extents.x_bearing
                + (base_extents.width - mark_extents.width) / 2
                - mark_extents.x_bearing;
        }
    }

    // Vertical placement and box growth for stacking.
    match combining_class {
        ccc::ATTACHED_BELOW_LEFT | ccc::ATTACHED_BELOW | ccc::BELOW_LEFT | ccc::BELOW
        | ccc::BELOW_RIGHT | ccc::DOUBLE_BELOW => {
            let attached =
                matches!(combining_class, ccc::ATTACHED_BELOW_LEFT | ccc::ATTACHED_BELOW);
            if !attached {
                base_extents.height -= y_gap;
            }
            pos.y_offset =
                base_extents.y_bearing + base_extents.height - mark_extents.y_bearing;
            if !attached {
                base_extents.height += mark_extents.height;
            }
        }
        ccc::ATTACHED_ABOVE | ccc::ATTACHED_ABOVE_RIGHT | ccc::ABOVE_LEFT | ccc::ABOVE
        | ccc::ABOVE_RIGHT | ccc::DOUBLE_ABOVE => {
            let attached =
                matches!(combining_class, ccc::ATTACHED_ABOVE | ccc::ATTACHED_ABOVE_RIGHT);
            if !attached {
                base_extents.y_bearing += y_gap;
                base_extents.height -= y_gap;
            }
            pos.y_offset = base_extents.y_bearing
                - (mark_extents.y_bearing + mark_extents.height);
            if !attached {
                let grow = mark_extents.height;
                base_extents.y_bearing -= grow.abs();
                base_extents.height += grow.abs();
            }
        }
        _ => {}
    }
}

fn position_around_base(
    font: &Font,
    buffer: &mut Buffer,
    base: usize,
    end: usize,
    adjust_offsets_when_zeroing: bool,
) {
    buffer.unsafe_to_break(base, end);

    let base_glyph = buffer.info[base].codepoint;
    let Some(mut base_extents) = font.glyph_extents(base_glyph) else {
        zero_mark_advances(buffer, base + 1, end, adjust_offsets_when_zeroing);
        return;
    };

    base_extents.x_bearing += buffer.pos[base].x_offset;
    base_extents.y_bearing += buffer.pos[base].y_offset;

    let forward = buffer.direction.is_forward();
    let mut x_offset = 0i32;
    let mut y_offset = 0i32;
    if forward {
        x_offset -= buffer.pos[base].x_advance;
        y_offset -= buffer.pos[base].y_advance;
    }

    let mut last_combining_class = 255u8;
    let mut component_extents = base_extents;
    for i in base + 1..end {
        let info = buffer.info[i];
        if info.modified_combining_class() != 0 {
            let klass = info.modified_combining_class();
            if klass != last_combining_class {
                last_combining_class = klass;
            }
            position_mark(font, buffer, &mut component_extents, i, klass);
            buffer.pos[i].x_advance = 0;
            buffer.pos[i].y_advance = 0;
            buffer.pos[i].x_offset += x_offset;
            buffer.pos[i].y_offset += y_offset;
        } else if forward {
            x_offset -= buffer.pos[i].x_advance;
            y_offset -= buffer.pos[i].y_advance;
        } else {
            x_offset += buffer.pos[i].x_advance;
            y_offset += buffer.pos[i].y_advance;
        }
    }
}

/// Positions marks against their bases when GPOS contributed nothing.
pub(crate) fn position_marks(
    _plan: &ShapePlan,
    font: &Font,
    buffer: &mut Buffer,
    adjust_offsets_when_zeroing: bool,
) {
    let len = buffer.len;
    if len == 0 {
        return;
    }

    let mut start = 0;
    for i in 1..len {
        if buffer.info[i].modified_combining_class() == 0 {
            position_around_base(font, buffer, start, i, adjust_offsets_when_zeroing);
            start = i;
        }
    }
    position_around_base(font, buffer, start, len, adjust_offsets_when_zeroing);
}
