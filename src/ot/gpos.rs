//! Glyph positioning subtables.

use crate::buffer::{attach_type, Buffer, BufferScratchFlags, GlyphPosition};
use crate::common::Direction;
use crate::parser::{read_at, Offset16, Offset32, Stream};

use super::apply::{ApplyCtx, SkippyIter};
use super::context;
use super::layout::{lookup_flags, ClassDef, Coverage, Device, Lookup};

pub(crate) mod lookup_kind {
    pub const SINGLE: u16 = 1;
    pub const PAIR: u16 = 2;
    pub const CURSIVE: u16 = 3;
    pub const MARK_TO_BASE: u16 = 4;
    pub const MARK_TO_LIGATURE: u16 = 5;
    pub const MARK_TO_MARK: u16 = 6;
    pub const CONTEXT: u16 = 7;
    pub const CHAIN_CONTEXT: u16 = 8;
    pub const EXTENSION: u16 = 9;
}

mod value_format {
    pub const X_PLACEMENT: u16 = 0x01;
    pub const Y_PLACEMENT: u16 = 0x02;
    pub const X_ADVANCE: u16 = 0x04;
    pub const Y_ADVANCE: u16 = 0x08;
    pub const X_PLACEMENT_DEVICE: u16 = 0x10;
    pub const Y_PLACEMENT_DEVICE: u16 = 0x20;
    pub const X_ADVANCE_DEVICE: u16 = 0x40;
    pub const Y_ADVANCE_DEVICE: u16 = 0x80;
}

fn value_record_size(format: u16) -> usize {
    usize::from((format & 0xFF).count_ones() as u16) * 2
}

/// Applies one value record to `pos`. Device offsets resolve against
/// `table` (the enclosing subtable); variation deltas against the GDEF
/// store.
fn apply_value(
    ctx: &ApplyCtx,
    table: &[u8],
    format: u16,
    record: &[u8],
    pos: &mut GlyphPosition,
) {
    let font = ctx.font;
    let horizontal = ctx.buffer.direction.is_horizontal();
    let mut s = Stream::new(record);

    if format & value_format::X_PLACEMENT != 0 {
        if let Some(v) = s.read::<i16>() {
            pos.x_offset += font.em_scale_x(i32::from(v));
        }
    }
    if format & value_format::Y_PLACEMENT != 0 {
        if let Some(v) = s.read::<i16>() {
            pos.y_offset += font.em_scale_y(i32::from(v));
        }
    }
    if format & value_format::X_ADVANCE != 0 {
        if let Some(v) = s.read::<i16>() {
            if horizontal {
                pos.x_advance += font.em_scale_x(i32::from(v));
            }
        }
    }
    if format & value_format::Y_ADVANCE != 0 {
        if let Some(v) = s.read::<i16>() {
            if !horizontal {
                // y grows down.
                pos.y_advance -= font.em_scale_y(i32::from(v));
            }
        }
    }

    if format & 0xF0 == 0 {
        return;
    }

    let var_store = ctx.face().gdef().and_then(|g| g.var_store());

    if format & value_format::X_PLACEMENT_DEVICE != 0 {
        if let Some(d) = read_device(&mut s, table) {
            pos.x_offset += d.x_delta(font, var_store);
        }
    }
    if format & value_format::Y_PLACEMENT_DEVICE != 0 {
        if let Some(d) = read_device(&mut s, table) {
            pos.y_offset += d.y_delta(font, var_store);
        }
    }
    if format & value_format::X_ADVANCE_DEVICE != 0 {
        if let Some(d) = read_device(&mut s, table) {
            if horizontal {
                pos.x_advance += d.x_delta(font, var_store);
            }
        }
    }
    if format & value_format::Y_ADVANCE_DEVICE != 0 {
        if let Some(d) = read_device(&mut s, table) {
            if !horizontal {
                pos.y_advance -= d.y_delta(font, var_store);
            }
        }
    }
}

fn read_device<'t>(s: &mut Stream, table: &'t [u8]) -> Option<Device<'t>> {
    let offset = s.read::<Offset16>()?;
    offset.resolve(table).and_then(Device::parse)
}

/// Resolves an anchor table to scaled coordinates.
fn anchor(ctx: &ApplyCtx, data: &[u8], glyph: u32) -> Option<(i32, i32)> {
    let format = read_at::<u16>(data, 0)?;
    let x = read_at::<i16>(data, 2)?;
    let y = read_at::<i16>(data, 4)?;

    let mut x = ctx.font.em_scale_x(i32::from(x));
    let mut y = ctx.font.em_scale_y(i32::from(y));

    match format {
        2 => {
            // A contour-point override, honored when the font funcs can
            // answer it; the design coordinates otherwise.
            if let Some(point) = read_at::<u16>(data, 6) {
                if let Some((px, py)) = ctx.font.glyph_contour_point(glyph, u32::from(point)) {
                    x = px;
                    y = py;
                }
            }
        }
        3 => {
            let var_store = ctx.face().gdef().and_then(|g| g.var_store());
            if let Some(d) = read_at::<Offset16>(data, 6)
                .and_then(|o| o.resolve(data))
                .and_then(Device::parse)
            {
                x += d.x_delta(ctx.font, var_store);
            }
            if let Some(d) = read_at::<Offset16>(data, 8)
                .and_then(|o| o.resolve(data))
                .and_then(Device::parse)
            {
                y += d.y_delta(ctx.font, var_store);
            }
        }
        _ => {}
    }

    Some((x, y))
}

pub(crate) fn apply_lookup_subtables(ctx: &mut ApplyCtx, lookup: &Lookup) -> bool {
    for i in 0..lookup.subtable_count() {
        let Some(data) = lookup.subtable_data(i) else {
            continue;
        };
        if apply_subtable(ctx, lookup.kind, data).is_some() {
            return true;
        }
    }
    false
}

fn apply_subtable(ctx: &mut ApplyCtx, kind: u16, data: &[u8]) -> Option<()> {
    match kind {
        lookup_kind::SINGLE => apply_single(ctx, data),
        lookup_kind::PAIR => apply_pair(ctx, data),
        lookup_kind::CURSIVE => apply_cursive(ctx, data),
        lookup_kind::MARK_TO_BASE => apply_mark_to_base(ctx, data),
        lookup_kind::MARK_TO_LIGATURE => apply_mark_to_ligature(ctx, data),
        lookup_kind::MARK_TO_MARK => apply_mark_to_mark(ctx, data),
        lookup_kind::CONTEXT => context::apply_context(ctx, data),
        lookup_kind::CHAIN_CONTEXT => context::apply_chain_context(ctx, data),
        lookup_kind::EXTENSION => {
            let format = read_at::<u16>(data, 0)?;
            if format != 1 {
                return None;
            }
            let inner_kind = read_at::<u16>(data, 2)?;
            if inner_kind == lookup_kind::EXTENSION {
                return None;
            }
            let inner = read_at::<Offset32>(data, 4)?.resolve(data)?;
            apply_subtable(ctx, inner_kind, inner)
        }
        _ => None,
    }
}

fn apply_single(ctx: &mut ApplyCtx, data: &[u8]) -> Option<()> {
    let glyph = ctx.buffer.cur(0).codepoint;
    let coverage = Coverage::parse(read_at::<Offset16>(data, 2)?.resolve(data)?)?;
    let format = read_at::<u16>(data, 0)?;
    let value_format = read_at::<u16>(data, 4)?;
    let size = value_record_size(value_format);

    let record = match format {
        1 => {
            coverage.get(glyph as u16)?;
            data.get(6..6 + size)?
        }
        2 => {
            let index = coverage.get(glyph as u16)?;
            let count = read_at::<u16>(data, 6)?;
            if index >= count {
                return None;
            }
            let start = 8 + usize::from(index) * size;
            data.get(start..start + size)?
        }
        _ => return None,
    };

    let idx = ctx.buffer.idx;
    let mut pos = ctx.buffer.pos[idx];
    apply_value(ctx, data, value_format, record, &mut pos);
    ctx.buffer.pos[idx] = pos;

    ctx.buffer.idx += 1;
    Some(())
}

fn apply_pair(ctx: &mut ApplyCtx, data: &[u8]) -> Option<()> {
    let first_glyph = ctx.buffer.cur(0).codepoint;
    let coverage = Coverage::parse(read_at::<Offset16>(data, 2)?.resolve(data)?)?;
    let coverage_index = coverage.get(first_glyph as u16)?;

    // Find the second glyph of the pair.
    let mut iter = SkippyIter::new(ctx, ctx.buffer.idx, 1, false);
    let second_pos = match iter.next(ctx, None) {
        Ok(()) => iter.idx,
        Err(unsafe_to) => {
            ctx.buffer
                .unsafe_to_concat(ctx.buffer.idx, unsafe_to);
            return None;
        }
    };
    let second_glyph = ctx.buffer.info[second_pos].codepoint;

    let format = read_at::<u16>(data, 0)?;
    let format1 = read_at::<u16>(data, 4)?;
    let format2 = read_at::<u16>(data, 6)?;
    let size1 = value_record_size(format1);
    let size2 = value_record_size(format2);

    let (rec1, rec2) = match format {
        1 => {
            let set_count = read_at::<u16>(data, 8)?;
            if coverage_index >= set_count {
                return None;
            }
            let set = read_at::<Offset16>(data, 10 + usize::from(coverage_index) * 2)?
                .resolve(data)?;
            let pair_count = read_at::<u16>(set, 0)?;
            let record_size = 2 + size1 + size2;

            let mut found = None;
            // Binary search over records sorted by second glyph id.
            let mut lo = 0usize;
            let mut hi = usize::from(pair_count);
            while lo < hi {
                let mid = (lo + hi) / 2;
                let base = 2 + mid * record_size;
                let g = read_at::<u16>(set, base)?;
                match u32::from(g).cmp(&second_glyph) {
                    std::cmp::Ordering::Less => lo = mid + 1,
                    std::cmp::Ordering::Greater => hi = mid,
                    std::cmp::Ordering::Equal => {
                        found = Some(base);
                        break;
                    }
                }
            }
            let base = found?;
            (
                set.get(base + 2..base + 2 + size1)?,
                set.get(base + 2 + size1..base + 2 + size1 + size2)?,
            )
        }
        2 => {
            let class1_def = read_at::<Offset16>(data, 8)?
                .resolve(data)
                .and_then(ClassDef::parse)
                .unwrap_or(ClassDef::Empty);
            let class2_def = read_at::<Offset16>(data, 10)?
                .resolve(data)
                .and_then(ClassDef::parse)
                .unwrap_or(ClassDef::Empty);
            let class1_count = read_at::<u16>(data, 12)?;
            let class2_count = read_at::<u16>(data, 14)?;

            let class1 = class1_def.get(first_glyph as u16);
            let class2 = class2_def.get(second_glyph as u16);
            if class1 >= class1_count || class2 >= class2_count {
                return None;
            }

            let record_size = size1 + size2;
            let row_size = usize::from(class2_count) * record_size;
            let base = 16 + usize::from(class1) * row_size + usize::from(class2) * record_size;
            (
                data.get(base..base + size1)?,
                data.get(base + size1..base + size1 + size2)?,
            )
        }
        _ => return None,
    };

    let idx = ctx.buffer.idx;
    if size1 > 0 {
        let mut pos = ctx.buffer.pos[idx];
        apply_value(ctx, data, format1, rec1, &mut pos);
        ctx.buffer.pos[idx] = pos;
    }
    if size2 > 0 {
        let mut pos = ctx.buffer.pos[second_pos];
        apply_value(ctx, data, format2, rec2, &mut pos);
        ctx.buffer.pos[second_pos] = pos;
    }

    ctx.buffer.idx = if size2 > 0 { second_pos + 1 } else { second_pos };
    Some(())
}

fn apply_cursive(ctx: &mut ApplyCtx, data: &[u8]) -> Option<()> {
    if read_at::<u16>(data, 0)? != 1 {
        return None;
    }
    let coverage = Coverage::parse(read_at::<Offset16>(data, 2)?.resolve(data)?)?;

    let this_index = coverage.get(ctx.buffer.cur(0).codepoint as u16)?;
    let entry_off = read_at::<Offset16>(data, 6 + usize::from(this_index) * 4)?;
    let entry_anchor_data = entry_off.resolve(data)?;

    let mut iter = SkippyIter::new(ctx, ctx.buffer.idx, 1, false);
    let i = match iter.prev(ctx, None) {
        Ok(()) => iter.idx,
        Err(unsafe_from) => {
            ctx.buffer
                .unsafe_to_concat_from_outbuffer(unsafe_from, ctx.buffer.idx + 1);
            return None;
        }
    };

    let prev_glyph = ctx.buffer.prev_item(i).codepoint;
    let prev_index = coverage.get(prev_glyph as u16)?;
    let exit_off = read_at::<Offset16>(data, 6 + usize::from(prev_index) * 4 + 2)?;
    let exit_anchor_data = exit_off.resolve(data)?;

    let j = ctx.buffer.idx;
    ctx.buffer.unsafe_to_break(i, j + 1);

    let (exit_x, exit_y) = anchor(ctx, exit_anchor_data, prev_glyph)?;
    let (entry_x, entry_y) = anchor(ctx, entry_anchor_data, ctx.buffer.cur(0).codepoint)?;

    let direction = ctx.buffer.direction;
    match direction {
        Direction::LeftToRight => {
            ctx.buffer.pos[i].x_advance = exit_x + ctx.buffer.pos[i].x_offset;
            let d = entry_x + ctx.buffer.pos[j].x_offset;
            ctx.buffer.pos[j].x_advance -= d;
            ctx.buffer.pos[j].x_offset -= d;
        }
        Direction::RightToLeft => {
            let d = exit_x + ctx.buffer.pos[i].x_offset;
            ctx.buffer.pos[i].x_advance -= d;
            ctx.buffer.pos[i].x_offset -= d;
            ctx.buffer.pos[j].x_advance = entry_x + ctx.buffer.pos[j].x_offset;
        }
        Direction::TopToBottom => {
            ctx.buffer.pos[i].y_advance = exit_y + ctx.buffer.pos[i].y_offset;
            let d = entry_y + ctx.buffer.pos[j].y_offset;
            ctx.buffer.pos[j].y_advance -= d;
            ctx.buffer.pos[j].y_offset -= d;
        }
        Direction::BottomToTop | Direction::Invalid => {
            let d = exit_y + ctx.buffer.pos[i].y_offset;
            ctx.buffer.pos[i].y_advance -= d;
            ctx.buffer.pos[i].y_offset -= d;
            ctx.buffer.pos[j].y_advance = entry_y + ctx.buffer.pos[j].y_offset;
        }
    }

    // Cross-stream offsets ride along an attachment chain. The effective
    // child is the glyph typographically after the join.
    let (child, parent, x_offset, y_offset) =
        if ctx.lookup_props as u16 & lookup_flags::RIGHT_TO_LEFT != 0 {
            (i, j, entry_x - exit_x, entry_y - exit_y)
        } else {
            (j, i, exit_x - entry_x, exit_y - entry_y)
        };

    // If the child was previously attached elsewhere, reverse that chain
    // so attachment offsets still propagate root-first.
    reverse_cursive_minor_offset(&mut ctx.buffer.pos, child, direction, parent);

    ctx.buffer.pos[child].set_attach_type(attach_type::CURSIVE);
    ctx.buffer.pos[child].set_attach_chain((parent as i64 - child as i64) as i16);
    ctx.buffer.scratch_flags |= BufferScratchFlags::HAS_GPOS_ATTACHMENT;

    if direction.is_horizontal() {
        ctx.buffer.pos[child].y_offset = y_offset;
    } else {
        ctx.buffer.pos[child].x_offset = x_offset;
    }

    ctx.buffer.idx = j + 1;
    Some(())
}

fn reverse_cursive_minor_offset(
    pos: &mut [GlyphPosition],
    i: usize,
    direction: Direction,
    new_parent: usize,
) {
    let chain = pos[i].attach_chain();
    if chain == 0 || pos[i].attach_type() != attach_type::CURSIVE {
        return;
    }
    pos[i].set_attach_chain(0);

    let j = (i as i64 + i64::from(chain)) as usize;
    if j == new_parent || j >= pos.len() {
        return;
    }
    reverse_cursive_minor_offset(pos, j, direction, new_parent);

    if direction.is_horizontal() {
        pos[j].y_offset = -pos[i].y_offset;
    } else {
        pos[j].x_offset = -pos[i].x_offset;
    }
    pos[j].set_attach_chain(-chain);
    pos[j].set_attach_type(attach_type::CURSIVE);
}

/// Positions the mark at the cursor against the anchor matrix entry for
/// `(anchored_index, mark_class)`, attaching it to `glyph_pos`.
fn mark_array_apply(
    ctx: &mut ApplyCtx,
    mark_array: &[u8],
    mark_index: u16,
    anchor_matrix: &[u8],
    class_count: u16,
    matrix_row: u16,
    glyph_pos: usize,
) -> Option<()> {
    let mark_count = read_at::<u16>(mark_array, 0)?;
    if mark_index >= mark_count {
        return None;
    }
    let record = 2 + usize::from(mark_index) * 4;
    let mark_class = read_at::<u16>(mark_array, record)?;
    let mark_anchor_data =
        read_at::<Offset16>(mark_array, record + 2)?.resolve(mark_array)?;
    if mark_class >= class_count {
        return None;
    }

    // Row-major anchor matrix with a leading row count.
    let cell = 2 + (usize::from(matrix_row) * usize::from(class_count) + usize::from(mark_class)) * 2;
    let base_anchor_data = read_at::<Offset16>(anchor_matrix, cell)?.resolve(anchor_matrix)?;

    let base_glyph = ctx.buffer.prev_item(glyph_pos).codepoint;
    let mark_glyph = ctx.buffer.cur(0).codepoint;
    let (base_x, base_y) = anchor(ctx, base_anchor_data, base_glyph)?;
    let (mark_x, mark_y) = anchor(ctx, mark_anchor_data, mark_glyph)?;

    let idx = ctx.buffer.idx;
    ctx.buffer.unsafe_to_break(glyph_pos, idx + 1);

    let pos = &mut ctx.buffer.pos[idx];
    pos.x_offset = base_x - mark_x;
    pos.y_offset = base_y - mark_y;
    pos.set_attach_type(attach_type::MARK);
    pos.set_attach_chain((glyph_pos as i64 - idx as i64) as i16);
    ctx.buffer.scratch_flags |= BufferScratchFlags::HAS_GPOS_ATTACHMENT;

    ctx.buffer.idx += 1;
    Some(())
}

fn apply_mark_to_base(ctx: &mut ApplyCtx, data: &[u8]) -> Option<()> {
    if read_at::<u16>(data, 0)? != 1 {
        return None;
    }
    let mark_coverage = Coverage::parse(read_at::<Offset16>(data, 2)?.resolve(data)?)?;
    let mark_index = mark_coverage.get(ctx.buffer.cur(0).codepoint as u16)?;

    // Search backward for a base glyph, skipping marks.
    let mut iter = SkippyIter::new(ctx, ctx.buffer.idx, 1, false);
    iter.set_lookup_props(u32::from(lookup_flags::IGNORE_MARKS));
    let base_pos = match iter.prev(ctx, None) {
        Ok(()) => iter.idx,
        Err(unsafe_from) => {
            ctx.buffer
                .unsafe_to_concat_from_outbuffer(unsafe_from, ctx.buffer.idx + 1);
            return None;
        }
    };

    let base_glyph = ctx.buffer.prev_item(base_pos).codepoint;
    let base_coverage = Coverage::parse(read_at::<Offset16>(data, 4)?.resolve(data)?)?;
    let Some(base_index) = base_coverage.get(base_glyph as u16) else {
        ctx.buffer
            .unsafe_to_concat_from_outbuffer(base_pos, ctx.buffer.idx + 1);
        return None;
    };

    let class_count = read_at::<u16>(data, 6)?;
    let mark_array = read_at::<Offset16>(data, 8)?.resolve(data)?;
    let base_array = read_at::<Offset16>(data, 10)?.resolve(data)?;

    mark_array_apply(ctx, mark_array, mark_index, base_array, class_count, base_index, base_pos)
}

fn apply_mark_to_ligature(ctx: &mut ApplyCtx, data: &[u8]) -> Option<()> {
    if read_at::<u16>(data, 0)? != 1 {
        return None;
    }
    let mark_coverage = Coverage::parse(read_at::<Offset16>(data, 2)?.resolve(data)?)?;
    let mark_index = mark_coverage.get(ctx.buffer.cur(0).codepoint as u16)?;

    let mut iter = SkippyIter::new(ctx, ctx.buffer.idx, 1, false);
    iter.set_lookup_props(u32::from(lookup_flags::IGNORE_MARKS));
    let lig_pos = match iter.prev(ctx, None) {
        Ok(()) => iter.idx,
        Err(unsafe_from) => {
            ctx.buffer
                .unsafe_to_concat_from_outbuffer(unsafe_from, ctx.buffer.idx + 1);
            return None;
        }
    };

    let lig_glyph = ctx.buffer.prev_item(lig_pos).codepoint;
    let lig_coverage = Coverage::parse(read_at::<Offset16>(data, 4)?.resolve(data)?)?;
    let Some(lig_index) = lig_coverage.get(lig_glyph as u16) else {
        ctx.buffer
            .unsafe_to_concat_from_outbuffer(lig_pos, ctx.buffer.idx + 1);
        return None;
    };

    let class_count = read_at::<u16>(data, 6)?;
    let mark_array = read_at::<Offset16>(data, 8)?.resolve(data)?;
    let lig_array = read_at::<Offset16>(data, 10)?.resolve(data)?;

    let lig_count = read_at::<u16>(lig_array, 0)?;
    if lig_index >= lig_count {
        return None;
    }
    let lig_attach =
        read_at::<Offset16>(lig_array, 2 + usize::from(lig_index) * 2)?.resolve(lig_array)?;
    let comp_count = read_at::<u16>(lig_attach, 0)?;
    if comp_count == 0 {
        return None;
    }

    // Select the component the mark originated from, tracked through
    // ligature substitutions.
    let lig_info = *ctx.buffer.prev_item(lig_pos);
    let mark_info = *ctx.buffer.cur(0);
    let comp_index = if lig_info.lig_id() != 0
        && lig_info.lig_id() == mark_info.lig_id()
        && mark_info.lig_comp() > 0
    {
        u16::from(mark_info.lig_comp()).min(comp_count) - 1
    } else {
        comp_count - 1
    };

    mark_array_apply(ctx, mark_array, mark_index, lig_attach, class_count, comp_index, lig_pos)
}

fn apply_mark_to_mark(ctx: &mut ApplyCtx, data: &[u8]) -> Option<()> {
    if read_at::<u16>(data, 0)? != 1 {
        return None;
    }
    let mark1_coverage = Coverage::parse(read_at::<Offset16>(data, 2)?.resolve(data)?)?;
    let mark1_index = mark1_coverage.get(ctx.buffer.cur(0).codepoint as u16)?;

    // Search backward for a suitable mark, not skipping anything the
    // lookup's class filter would: only the mark-filtering machinery
    // stays in effect.
    let mut iter = SkippyIter::new(ctx, ctx.buffer.idx, 1, false);
    iter.set_lookup_props(ctx.lookup_props & !u32::from(lookup_flags::IGNORE_FLAGS));
    let mark2_pos = match iter.prev(ctx, None) {
        Ok(()) => iter.idx,
        Err(unsafe_from) => {
            ctx.buffer
                .unsafe_to_concat_from_outbuffer(unsafe_from, ctx.buffer.idx + 1);
            return None;
        }
    };

    let mark2_info = *ctx.buffer.prev_item(mark2_pos);
    if !mark2_info.is_mark() {
        ctx.buffer
            .unsafe_to_concat_from_outbuffer(mark2_pos, ctx.buffer.idx + 1);
        return None;
    }

    let mark1_info = *ctx.buffer.cur(0);
    let id1 = mark1_info.lig_id();
    let id2 = mark2_info.lig_id();
    let comp1 = mark1_info.lig_comp();
    let comp2 = mark2_info.lig_comp();

    let good = if id1 == id2 {
        // Marks on the same base, or on the same ligature component.
        id1 == 0 || comp1 == comp2
    } else {
        // If ligature ids don't match, it may be that one of the marks is
        // itself a ligature, in which case match.
        (id1 > 0 && comp1 == 0) || (id2 > 0 && comp2 == 0)
    };
    if !good {
        ctx.buffer
            .unsafe_to_concat_from_outbuffer(mark2_pos, ctx.buffer.idx + 1);
        return None;
    }

    let mark2_coverage = Coverage::parse(read_at::<Offset16>(data, 4)?.resolve(data)?)?;
    let Some(mark2_index) = mark2_coverage.get(mark2_info.codepoint as u16) else {
        ctx.buffer
            .unsafe_to_concat_from_outbuffer(mark2_pos, ctx.buffer.idx + 1);
        return None;
    };

    let class_count = read_at::<u16>(data, 6)?;
    let mark1_array = read_at::<Offset16>(data, 8)?.resolve(data)?;
    let mark2_array = read_at::<Offset16>(data, 10)?.resolve(data)?;

    mark_array_apply(ctx, mark1_array, mark1_index, mark2_array, class_count, mark2_index, mark2_pos)
}

/// Zeroes the attachment scratch before GPOS runs.
pub(crate) fn position_start(buffer: &mut Buffer) {
    for pos in buffer.pos.iter_mut() {
        pos.var = 0;
    }
}

/// Propagates attachment offsets along mark and cursive chains.
pub(crate) fn position_finish_offsets(buffer: &mut Buffer) {
    if !buffer
        .scratch_flags
        .contains(BufferScratchFlags::HAS_GPOS_ATTACHMENT)
    {
        return;
    }

    let direction = buffer.direction;
    let len = buffer.len;
    for i in 0..len {
        propagate_attachment_offsets(&mut buffer.pos, len, i, direction);
    }
}

fn propagate_attachment_offsets(
    pos: &mut [GlyphPosition],
    len: usize,
    i: usize,
    direction: Direction,
) {
    // Walk the chain up to its root first, consuming each link so every
    // node is processed at most once, then apply offsets root-first.
    // Iterative, so adversarial chain lengths stay on the heap.
    let mut links: smallvec::SmallVec<[(usize, usize, u8); 8]> = smallvec::SmallVec::new();
    let mut cur = i;
    loop {
        let chain = pos[cur].attach_chain();
        if chain == 0 {
            break;
        }
        let kind = pos[cur].attach_type();
        pos[cur].set_attach_chain(0);

        let parent = cur as i64 + i64::from(chain);
        if parent < 0 || parent as usize >= len {
            break;
        }
        links.push((cur, parent as usize, kind));
        cur = parent as usize;
    }

    for &(node, parent, kind) in links.iter().rev() {
        if kind == attach_type::CURSIVE {
            // Cursive chains carry only the cross-stream offset.
            if direction.is_horizontal() {
                pos[node].y_offset += pos[parent].y_offset;
            } else {
                pos[node].x_offset += pos[parent].x_offset;
            }
        } else {
            pos[node].x_offset += pos[parent].x_offset;
            pos[node].y_offset += pos[parent].y_offset;

            if direction.is_forward() {
                for k in parent..node {
                    pos[node].x_offset -= pos[k].x_advance;
                    pos[node].y_offset -= pos[k].y_advance;
                }
            } else {
                for k in parent + 1..node + 1 {
                    pos[node].x_offset += pos[k].x_advance;
                    pos[node].y_offset += pos[k].y_advance;
                }
            }
        }
    }
}
