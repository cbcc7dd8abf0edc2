//! Lookup application state: the apply context and the skip iterator.

use crate::buffer::{Buffer, GlyphInfo, Mask};
use crate::font::Font;
use crate::ot::glyph_props;
use crate::ot::layout::lookup_flags;

pub(crate) const MAX_NESTING_LEVEL: usize = 6;
pub(crate) const MAX_CONTEXT_LENGTH: usize = 64;

/// Packed skip configuration: lookup flags in the low half, the mark
/// filtering set index in the high half.
pub(crate) fn lookup_props(flags: u16, mark_filtering_set: Option<u16>) -> u32 {
    u32::from(flags) | mark_filtering_set.map_or(0, |s| u32::from(s) << 16)
}

pub(crate) struct ApplyCtx<'a, 'f, 'b> {
    pub table_index: usize,
    pub font: &'f Font<'a>,
    pub buffer: &'b mut Buffer,
    pub lookup_mask: Mask,
    pub lookup_index: u16,
    pub lookup_props: u32,
    pub nesting_level_left: usize,
    pub auto_zwnj: bool,
    pub auto_zwj: bool,
    pub per_syllable: bool,
}

impl<'a, 'f, 'b> ApplyCtx<'a, 'f, 'b> {
    pub fn face(&self) -> &'f crate::Face<'a> {
        self.font.face
    }

    pub fn has_glyph_classes(&self) -> bool {
        self.face().has_glyph_classes()
    }

    /// Whether `info` passes the skip filter `match_props` (a
    /// [`lookup_props`] word). The glyph-class bits of the props word line
    /// up with the ignore flags, so one mask test covers base, ligature
    /// and mark skipping.
    pub fn check_glyph_property(&self, info: &GlyphInfo, match_props: u32) -> bool {
        let props = info.glyph_props();

        if props & glyph_props::MARK != 0 {
            if match_props & u32::from(lookup_flags::USE_MARK_FILTERING_SET) != 0 {
                let set_index = (match_props >> 16) as u16;
                return self
                    .face()
                    .gdef()
                    .map_or(false, |g| g.mark_set_covers(set_index, info.codepoint as u16));
            }
            let attach_filter = match_props as u16 & lookup_flags::MARK_ATTACHMENT_TYPE_MASK;
            if attach_filter != 0 {
                return attach_filter == u16::from(info.mark_attachment_type()) << 8;
            }
        }

        props & (match_props as u16) & glyph_props::CLASS_MASK == 0
    }

    fn glyph_props_for(&self, glyph: u32, class_guess: u16, preserve: u16) -> u16 {
        let mut add_in = preserve & glyph_props::PRESERVE;
        add_in |= glyph_props::SUBSTITUTED;
        if self.has_glyph_classes() {
            add_in
                | self
                    .face()
                    .gdef()
                    .map_or(0, |g| g.glyph_props(glyph as u16))
        } else {
            add_in | class_guess
        }
    }

    pub fn replace_glyph(&mut self, glyph: u32) {
        let props = self.glyph_props_for(glyph, 0, self.buffer.cur(0).glyph_props());
        self.buffer.cur_mut(0).set_glyph_props(props);
        self.buffer.replace_glyph(glyph);
    }

    pub fn replace_glyph_inplace(&mut self, glyph: u32) {
        let props = self.glyph_props_for(glyph, 0, self.buffer.cur(0).glyph_props());
        let cur = self.buffer.cur_mut(0);
        cur.codepoint = glyph;
        cur.set_glyph_props(props);
    }

    pub fn replace_glyph_with_ligature(&mut self, glyph: u32, class_guess: u16) {
        let mut props =
            self.glyph_props_for(glyph, class_guess, self.buffer.cur(0).glyph_props());
        props |= glyph_props::LIGATED;
        self.buffer.cur_mut(0).set_glyph_props(props);
        self.buffer.replace_glyph(glyph);
    }

    pub fn output_glyph_for_component(&mut self, glyph: u32, class_guess: u16) {
        let mut props =
            self.glyph_props_for(glyph, class_guess, self.buffer.cur(0).glyph_props());
        props |= glyph_props::MULTIPLIED;
        self.buffer.cur_mut(0).set_glyph_props(props);
        self.buffer.output_glyph(glyph);
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Skip {
    Yes,
    No,
    Maybe,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum MayMatch {
    Yes,
    No,
    Maybe,
}

/// A cursor stepping over items the current lookup ignores.
///
/// Forward iteration reads the input side; backward iteration reads the
/// already-output side, which during substitution holds the glyphs behind
/// the cursor.
pub(crate) struct SkippyIter {
    pub idx: usize,
    num_items: usize,
    lookup_props: u32,
    ignore_zwnj: bool,
    ignore_zwj: bool,
    mask: Mask,
    syllable: u8,
}

impl SkippyIter {
    pub fn new(ctx: &ApplyCtx, start_buf_index: usize, num_items: usize, context_match: bool) -> Self {
        SkippyIter {
            idx: start_buf_index,
            num_items,
            lookup_props: ctx.lookup_props,
            // GPOS lookups never skip over ZWNJ; context matching ignores
            // both joiners.
            ignore_zwnj: ctx.table_index == 1 || context_match || ctx.auto_zwnj,
            ignore_zwj: context_match || ctx.auto_zwj,
            mask: if context_match { Mask::MAX } else { ctx.lookup_mask },
            syllable: if ctx.per_syllable && ctx.buffer.idx == start_buf_index {
                ctx.buffer.cur(0).syllable()
            } else {
                0
            },
        }
    }

    pub fn set_lookup_props(&mut self, props: u32) {
        self.lookup_props = props;
    }

    pub fn may_skip(&self, ctx: &ApplyCtx, info: &GlyphInfo) -> Skip {
        if !ctx.check_glyph_property(info, self.lookup_props) {
            return Skip::Yes;
        }

        if info.is_default_ignorable()
            && (self.ignore_zwnj || !info.is_zwnj())
            && (self.ignore_zwj || !info.is_zwj())
        {
            return Skip::Maybe;
        }

        Skip::No
    }

    fn may_match(&self, info: &GlyphInfo, match_fn: Option<&dyn Fn(u32) -> bool>) -> MayMatch {
        if info.mask & self.mask == 0 {
            return MayMatch::No;
        }
        if self.syllable != 0 && self.syllable != info.syllable() {
            return MayMatch::No;
        }
        match match_fn {
            Some(f) => {
                if f(info.codepoint) {
                    MayMatch::Yes
                } else {
                    MayMatch::No
                }
            }
            None => MayMatch::Maybe,
        }
    }

    /// Advances to the next non-ignored item, optionally requiring it to
    /// match. On failure, the error value is the farthest examined
    /// position plus one, for unsafe-to-concat flagging.
    pub fn next(&mut self, ctx: &ApplyCtx, match_fn: Option<&dyn Fn(u32) -> bool>) -> Result<(), usize> {
        debug_assert!(self.num_items > 0);
        let end = ctx.buffer.len;
        while self.idx + self.num_items < end {
            self.idx += 1;
            let info = ctx.buffer.info[self.idx];

            let skip = self.may_skip(ctx, &info);
            if skip == Skip::Yes {
                continue;
            }

            let matched = self.may_match(&info, match_fn);
            if matched == MayMatch::Yes || (matched == MayMatch::Maybe && skip == Skip::No) {
                self.num_items -= 1;
                return Ok(());
            }

            if skip == Skip::No {
                return Err(self.idx + 1);
            }
        }
        Err(end)
    }

    /// Steps back to the previous non-ignored item, reading the output
    /// side. On failure, the error value is the earliest examined
    /// position.
    pub fn prev(&mut self, ctx: &ApplyCtx, match_fn: Option<&dyn Fn(u32) -> bool>) -> Result<(), usize> {
        debug_assert!(self.num_items > 0);
        while self.idx >= self.num_items {
            self.idx -= 1;
            let info = *ctx.buffer.prev_item(self.idx);

            let skip = self.may_skip(ctx, &info);
            if skip == Skip::Yes {
                continue;
            }

            let matched = self.may_match(&info, match_fn);
            if matched == MayMatch::Yes || (matched == MayMatch::Maybe && skip == Skip::No) {
                self.num_items -= 1;
                return Ok(());
            }

            if skip == Skip::No {
                return Err(self.idx);
            }
        }
        Err(0)
    }
}

/// The result of matching a lookup's input sequence.
pub(crate) struct MatchedInput {
    pub positions: [usize; MAX_CONTEXT_LENGTH],
    pub count: usize,
    pub end: usize,
    pub total_component_count: u8,
}

/// Matches `count` input items starting at the cursor. `matches(i, glyph)`
/// is consulted for positions `1..count`; position 0 is the already-matched
/// current glyph.
pub(crate) fn match_input(
    ctx: &ApplyCtx,
    count: usize,
    matches: &dyn Fn(usize, u32) -> bool,
) -> Result<MatchedInput, usize> {
    if count > MAX_CONTEXT_LENGTH {
        return Err(ctx.buffer.idx + 1);
    }

    let mut positions = [0usize; MAX_CONTEXT_LENGTH];
    positions[0] = ctx.buffer.idx;

    // Whether a mismatching ligature id means failure depends on whether
    // the base ligature is itself skippable.
    #[derive(PartialEq)]
    enum LigBase {
        NotChecked,
        MayNotSkip,
        MaySkip,
    }

    let cur = *ctx.buffer.cur(0);
    let mut total_component_count = cur.lig_num_comps();
    let first_lig_id = cur.lig_id();
    let first_lig_comp = cur.lig_comp();
    let mut ligbase = LigBase::NotChecked;

    let mut iter = SkippyIter::new(ctx, ctx.buffer.idx, count - 1, false);

    for i in 1..count {
        let f: &dyn Fn(u32) -> bool = &|g| matches(i, g);
        iter.next(ctx, Some(f))?;
        positions[i] = iter.idx;

        let info = ctx.buffer.info[iter.idx];
        let this_lig_id = info.lig_id();
        let this_lig_comp = info.lig_comp();

        if first_lig_id != 0 && first_lig_comp != 0 {
            // The first component was part of a ligature; subsequent ones
            // must belong to the same component, unless the base ligature
            // is skippable here.
            if first_lig_id != this_lig_id || first_lig_comp != this_lig_comp {
                if ligbase == LigBase::NotChecked {
                    let mut found = false;
                    let out = ctx.buffer.out_info();
                    let mut j = out.len();
                    while j > 0 && out[j - 1].lig_id() == first_lig_id {
                        if out[j - 1].lig_comp() == 0 {
                            found = true;
                            break;
                        }
                        j -= 1;
                    }

                    ligbase = if found
                        && j > 0
                        && iter.may_skip(ctx, &ctx.buffer.out_info()[j - 1]) == Skip::Yes
                    {
                        LigBase::MaySkip
                    } else {
                        LigBase::MayNotSkip
                    };
                }

                if ligbase == LigBase::MayNotSkip {
                    return Err(ctx.buffer.idx + 1);
                }
            }
        } else {
            // The first component was free-standing; subsequent components
            // may not belong to some other ligature.
            if this_lig_id != 0 && this_lig_comp != 0 && this_lig_id != first_lig_id {
                return Err(ctx.buffer.idx + 1);
            }
        }

        total_component_count = total_component_count.saturating_add(info.lig_num_comps());
    }

    Ok(MatchedInput {
        positions,
        count,
        end: iter.idx + 1,
        total_component_count,
    })
}

/// Matches the backtrack sequence walking backward over the output side.
/// Returns the matched start position, for unsafe-to-concat bookkeeping.
pub(crate) fn match_backtrack(
    ctx: &ApplyCtx,
    count: usize,
    matches: &dyn Fn(usize, u32) -> bool,
) -> Result<usize, usize> {
    let mut iter = SkippyIter::new(ctx, ctx.buffer.backtrack_len(), count, true);

    for i in 0..count {
        let f: &dyn Fn(u32) -> bool = &|g| matches(i, g);
        iter.prev(ctx, Some(f))?;
    }

    Ok(iter.idx)
}

/// Matches the lookahead sequence starting after the matched input.
/// Returns the position one past the last matched item.
pub(crate) fn match_lookahead(
    ctx: &ApplyCtx,
    count: usize,
    matches: &dyn Fn(usize, u32) -> bool,
    start_index: usize,
) -> Result<usize, usize> {
    // start_index is the first position to look at; the iterator
    // pre-increments.
    let mut iter = SkippyIter::new(ctx, start_index.saturating_sub(1), count, true);

    for i in 0..count {
        let f: &dyn Fn(u32) -> bool = &|g| matches(i, g);
        iter.next(ctx, Some(f))?;
    }

    Ok(iter.idx + 1)
}

/// Turns the matched input run into one ligature glyph, reassigning
/// ligature ids and components on the glyphs that ride along.
pub(crate) fn ligate_input(ctx: &mut ApplyCtx, m: &MatchedInput, lig_glyph: u32) {
    let count = m.count;
    let match_end = m.end;

    ctx.buffer.merge_clusters(ctx.buffer.idx, match_end);

    let first = ctx.buffer.info[m.positions[0]];
    let is_base_ligature = first.is_base_glyph();
    let mut is_mark_ligature = first.is_mark();
    for i in 1..count {
        if !ctx.buffer.info[m.positions[i]].is_mark() {
            is_mark_ligature = false;
            break;
        }
    }
    let is_ligature = !is_base_ligature && !is_mark_ligature;

    let class_guess = if is_ligature { glyph_props::LIGATURE } else { 0 };
    let lig_id = if is_ligature { ctx.buffer.allocate_lig_id() } else { 0 };

    let mut last_lig_id = ctx.buffer.cur(0).lig_id();
    let mut last_num_comps = ctx.buffer.cur(0).lig_num_comps();
    let mut comps_so_far = last_num_comps;

    if is_ligature {
        ctx.buffer
            .cur_mut(0)
            .set_lig_props_for_ligature(lig_id, m.total_component_count);
    }
    ctx.buffer.cur_mut(0).clear_ligated_and_multiplied();
    ctx.replace_glyph_with_ligature(lig_glyph, class_guess);

    for i in 1..count {
        while ctx.buffer.idx < m.positions[i] && ctx.buffer.successful {
            if is_ligature {
                let cur = ctx.buffer.cur(0);
                let mut this_comp = cur.lig_comp();
                if this_comp == 0 {
                    this_comp = last_num_comps;
                }
                let new_lig_comp = comps_so_far - last_num_comps + this_comp.min(last_num_comps);
                ctx.buffer
                    .cur_mut(0)
                    .set_lig_props_for_mark(lig_id, new_lig_comp);
            }
            ctx.buffer.next_glyph();
        }

        let cur = ctx.buffer.cur(0);
        last_lig_id = cur.lig_id();
        last_num_comps = cur.lig_num_comps();
        comps_so_far = comps_so_far.saturating_add(last_num_comps);

        // The matched component merges into the ligature glyph.
        ctx.buffer.skip_glyph();
    }

    // Re-adjust components for any marks following the ligature.
    if !is_mark_ligature && last_lig_id != 0 {
        for i in ctx.buffer.idx..ctx.buffer.len {
            let info = ctx.buffer.info[i];
            if info.lig_id() != last_lig_id {
                break;
            }
            let this_comp = info.lig_comp();
            if this_comp == 0 {
                break;
            }
            let new_lig_comp = comps_so_far - last_num_comps + this_comp.min(last_num_comps);
            ctx.buffer.info[i].set_lig_props_for_mark(lig_id, new_lig_comp);
        }
    }
}

/// Assigns GDEF-derived glyph props (or Unicode-derived guesses) to every
/// item, run before the first substitution pass.
pub(crate) fn set_glyph_props(buffer: &mut Buffer, face: &crate::Face) {
    match face.gdef() {
        Some(gdef) if gdef.has_glyph_classes() => {
            for info in buffer.info_mut() {
                let props = gdef.glyph_props(info.codepoint as u16);
                info.set_glyph_props(props);
                info.set_lig_props(0);
            }
        }
        _ => {
            for info in buffer.info_mut() {
                let props = if info.is_unicode_mark() {
                    glyph_props::MARK
                } else {
                    glyph_props::BASE
                };
                info.set_glyph_props(props);
                info.set_lig_props(0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_props_packing() {
        let p = lookup_props(lookup_flags::IGNORE_MARKS | lookup_flags::USE_MARK_FILTERING_SET, Some(3));
        assert_eq!(p & 0xFFFF, 0x0018);
        assert_eq!(p >> 16, 3);
    }
}
