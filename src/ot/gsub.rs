//! Glyph substitution subtables.

use crate::parser::{read_at, Offset16, Offset32, Stream};

use super::apply::{match_backtrack, match_input, match_lookahead, ligate_input, ApplyCtx};
use super::context;
use super::layout::{Coverage, Lookup};

pub(crate) mod lookup_kind {
    pub const SINGLE: u16 = 1;
    pub const MULTIPLE: u16 = 2;
    pub const ALTERNATE: u16 = 3;
    pub const LIGATURE: u16 = 4;
    pub const CONTEXT: u16 = 5;
    pub const CHAIN_CONTEXT: u16 = 6;
    pub const EXTENSION: u16 = 7;
    pub const REVERSE_CHAIN_SINGLE: u16 = 8;
}

/// Whether a lookup is applied backwards, in place.
pub(crate) fn is_reverse(lookup: &Lookup) -> bool {
    if lookup.kind == lookup_kind::REVERSE_CHAIN_SINGLE {
        return true;
    }
    if lookup.kind == lookup_kind::EXTENSION {
        // Peek through the extension indirection of the first subtable.
        if let Some((kind, _)) = lookup
            .subtable_data(0)
            .and_then(resolve_extension)
        {
            return kind == lookup_kind::REVERSE_CHAIN_SINGLE;
        }
    }
    false
}

fn resolve_extension(data: &[u8]) -> Option<(u16, &[u8])> {
    let format = read_at::<u16>(data, 0)?;
    if format != 1 {
        return None;
    }
    let kind = read_at::<u16>(data, 2)?;
    if kind == lookup_kind::EXTENSION {
        // An extension may not point at another extension.
        return None;
    }
    let inner = read_at::<Offset32>(data, 4)?.resolve(data)?;
    Some((kind, inner))
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
        lookup_kind::MULTIPLE => apply_multiple(ctx, data),
        lookup_kind::ALTERNATE => apply_alternate(ctx, data),
        lookup_kind::LIGATURE => apply_ligature(ctx, data),
        lookup_kind::CONTEXT => context::apply_context(ctx, data),
        lookup_kind::CHAIN_CONTEXT => context::apply_chain_context(ctx, data),
        lookup_kind::EXTENSION => {
            let (inner_kind, inner) = resolve_extension(data)?;
            apply_subtable(ctx, inner_kind, inner)
        }
        lookup_kind::REVERSE_CHAIN_SINGLE => apply_reverse_chain(ctx, data),
        _ => None,
    }
}

fn apply_single(ctx: &mut ApplyCtx, data: &[u8]) -> Option<()> {
    let glyph = ctx.buffer.cur(0).codepoint;
    let coverage = Coverage::parse(read_at::<Offset16>(data, 2)?.resolve(data)?)?;

    match read_at::<u16>(data, 0)? {
        1 => {
            coverage.get(glyph as u16)?;
            let delta = read_at::<i16>(data, 4)?;
            // Substitution wraps in the 16-bit glyph space.
            let substitute = (glyph as u16).wrapping_add(delta as u16);
            ctx.replace_glyph(u32::from(substitute));
            Some(())
        }
        2 => {
            let index = coverage.get(glyph as u16)?;
            let count = read_at::<u16>(data, 4)?;
            if index >= count {
                return None;
            }
            let substitute = read_at::<u16>(data, 6 + usize::from(index) * 2)?;
            ctx.replace_glyph(u32::from(substitute));
            Some(())
        }
        _ => None,
    }
}

fn apply_multiple(ctx: &mut ApplyCtx, data: &[u8]) -> Option<()> {
    if read_at::<u16>(data, 0)? != 1 {
        return None;
    }
    let glyph = ctx.buffer.cur(0).codepoint;
    let coverage = Coverage::parse(read_at::<Offset16>(data, 2)?.resolve(data)?)?;
    let index = coverage.get(glyph as u16)?;

    let seq_count = read_at::<u16>(data, 4)?;
    if index >= seq_count {
        return None;
    }
    let seq = read_at::<Offset16>(data, 6 + usize::from(index) * 2)?.resolve(data)?;
    let mut s = Stream::new(seq);
    let glyph_count = s.read::<u16>()?;
    let glyphs = s.read_array16::<u16>(glyph_count)?;

    match glyph_count {
        0 => {
            // A zero-length sequence deletes the glyph.
            ctx.buffer.delete_glyph();
            Some(())
        }
        1 => {
            ctx.replace_glyph(u32::from(glyphs.get(0)?));
            Some(())
        }
        _ => {
            for (i, substitute) in glyphs.iter().enumerate() {
                ctx.buffer
                    .cur_mut(0)
                    .set_lig_props_for_component(i as u8);
                ctx.output_glyph_for_component(u32::from(substitute), 0);
            }
            ctx.buffer.skip_glyph();
            Some(())
        }
    }
}

fn apply_alternate(ctx: &mut ApplyCtx, data: &[u8]) -> Option<()> {
    if read_at::<u16>(data, 0)? != 1 {
        return None;
    }
    let glyph = ctx.buffer.cur(0).codepoint;
    let coverage = Coverage::parse(read_at::<Offset16>(data, 2)?.resolve(data)?)?;
    let index = coverage.get(glyph as u16)?;

    let set_count = read_at::<u16>(data, 4)?;
    if index >= set_count {
        return None;
    }
    let set = read_at::<Offset16>(data, 6 + usize::from(index) * 2)?.resolve(data)?;
    let mut s = Stream::new(set);
    let alt_count = s.read::<u16>()?;
    let alternates = s.read_array16::<u16>(alt_count)?;
    if alt_count == 0 {
        return None;
    }

    // The feature value, encoded in the lookup's mask bits, selects the
    // alternate, 1-based.
    let shift = ctx.lookup_mask.trailing_zeros();
    let alt_index = (ctx.lookup_mask & ctx.buffer.cur(0).mask) >> shift;
    if alt_index == 0 || alt_index > u32::from(alt_count) {
        return None;
    }

    let substitute = alternates.get((alt_index - 1) as u16)?;
    ctx.replace_glyph(u32::from(substitute));
    Some(())
}

fn apply_ligature(ctx: &mut ApplyCtx, data: &[u8]) -> Option<()> {
    if read_at::<u16>(data, 0)? != 1 {
        return None;
    }
    let glyph = ctx.buffer.cur(0).codepoint;
    let coverage = Coverage::parse(read_at::<Offset16>(data, 2)?.resolve(data)?)?;
    let index = coverage.get(glyph as u16)?;

    let set_count = read_at::<u16>(data, 4)?;
    if index >= set_count {
        return None;
    }
    let set = read_at::<Offset16>(data, 6 + usize::from(index) * 2)?.resolve(data)?;

    let lig_count = read_at::<u16>(set, 0)?;
    for i in 0..usize::from(lig_count) {
        let Some(lig) = read_at::<Offset16>(set, 2 + i * 2).and_then(|o| o.resolve(set)) else {
            continue;
        };
        if apply_one_ligature(ctx, lig).is_some() {
            return Some(());
        }
    }
    None
}

fn apply_one_ligature(ctx: &mut ApplyCtx, lig: &[u8]) -> Option<()> {
    let mut s = Stream::new(lig);
    let lig_glyph = s.read::<u16>()?;
    let comp_count = s.read::<u16>()?;
    if comp_count == 0 {
        return None;
    }
    let components = s.read_array16::<u16>(comp_count - 1)?;

    if comp_count == 1 {
        ctx.replace_glyph(u32::from(lig_glyph));
        return Some(());
    }

    let matcher = |i: usize, g: u32| -> bool {
        components
            .get((i - 1) as u16)
            .map_or(false, |v| u32::from(v) == g)
    };

    match match_input(ctx, usize::from(comp_count), &matcher) {
        Ok(m) => {
            ligate_input(ctx, &m, u32::from(lig_glyph));
            Some(())
        }
        Err(unsafe_to) => {
            let start = ctx.buffer.backtrack_len().saturating_sub(1);
            ctx.buffer.unsafe_to_concat_from_outbuffer(start, unsafe_to);
            None
        }
    }
}

fn apply_reverse_chain(ctx: &mut ApplyCtx, data: &[u8]) -> Option<()> {
    if read_at::<u16>(data, 0)? != 1 {
        return None;
    }
    // Reverse chaining applies backward and in place; the driver guarantees
    // no output side is active.
    debug_assert!(!ctx.buffer.have_output);

    let glyph = ctx.buffer.cur(0).codepoint;
    let coverage = Coverage::parse(read_at::<Offset16>(data, 2)?.resolve(data)?)?;
    let index = coverage.get(glyph as u16)?;

    let mut s = Stream::new_at(data, 4)?;
    let backtrack_count = s.read::<u16>()?;
    let backtrack = s.read_array16::<Offset16>(backtrack_count)?;
    let lookahead_count = s.read::<u16>()?;
    let lookahead = s.read_array16::<Offset16>(lookahead_count)?;
    let glyph_count = s.read::<u16>()?;
    let substitutes = s.read_array16::<u16>(glyph_count)?;

    if index >= glyph_count {
        return None;
    }

    let backtrack_match = |i: usize, g: u32| -> bool {
        backtrack
            .get(i as u16)
            .and_then(|o| o.resolve(data))
            .and_then(Coverage::parse)
            .map_or(false, |c| c.contains(g as u16))
    };
    if match_backtrack(ctx, usize::from(backtrack_count), &backtrack_match).is_err() {
        return None;
    }

    let lookahead_match = |i: usize, g: u32| -> bool {
        lookahead
            .get(i as u16)
            .and_then(|o| o.resolve(data))
            .and_then(Coverage::parse)
            .map_or(false, |c| c.contains(g as u16))
    };
    if match_lookahead(ctx, usize::from(lookahead_count), &lookahead_match, ctx.buffer.idx + 1)
        .is_err()
    {
        return None;
    }

    let substitute = substitutes.get(index)?;
    ctx.replace_glyph_inplace(u32::from(substitute));
    Some(())
}
