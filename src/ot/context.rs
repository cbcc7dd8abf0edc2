//! Contextual and chained-contextual lookups, formats 1–3, plus the
//! nested-lookup dispatch they drive.

use crate::parser::{read_at, LazyArray16, Offset16, Stream};

use super::apply::{
    lookup_props, match_backtrack, match_input, match_lookahead, ApplyCtx, MatchedInput,
};
use super::layout::{ClassDef, Coverage};
use super::{gpos, gsub};

/// A `(sequence_index, lookup_index)` dispatch record.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LookupRecord {
    pub sequence_index: u16,
    pub lookup_index: u16,
}

impl crate::parser::FromData for LookupRecord {
    const SIZE: usize = 4;
    fn parse(data: &[u8]) -> Option<Self> {
        let mut s = Stream::new(data);
        Some(LookupRecord {
            sequence_index: s.read::<u16>()?,
            lookup_index: s.read::<u16>()?,
        })
    }
}

/// Applies a nested lookup at the current cursor position, restoring the
/// outer lookup's skip state afterwards.
pub(crate) fn recurse(ctx: &mut ApplyCtx, lookup_index: u16) -> bool {
    if ctx.nesting_level_left == 0 {
        return false;
    }
    if !ctx.buffer.decrement_max_ops() {
        return false;
    }

    let Some(table) = ctx.face().layout_table(ctx.table_index) else {
        return false;
    };
    let Some(lookup) = table.lookup(lookup_index) else {
        return false;
    };

    let saved_props = ctx.lookup_props;
    let saved_index = ctx.lookup_index;
    ctx.lookup_index = lookup_index;
    ctx.lookup_props = lookup_props(lookup.flags, lookup.mark_filtering_set);
    ctx.nesting_level_left -= 1;

    let applied = if ctx.table_index == 0 {
        gsub::apply_lookup_subtables(ctx, &lookup)
    } else {
        gpos::apply_lookup_subtables(ctx, &lookup)
    };

    ctx.nesting_level_left += 1;
    ctx.lookup_props = saved_props;
    ctx.lookup_index = saved_index;
    applied
}

/// Dispatches the matched context's lookup records.
///
/// Positions are input-side indices; a nested substitution only moves the
/// cursor, so later positions stay valid unless a nested lookup consumed
/// them, in which case they are skipped.
pub(crate) fn apply_lookup_records(
    ctx: &mut ApplyCtx,
    m: &MatchedInput,
    records: LazyArray16<LookupRecord>,
) -> bool {
    let start = ctx.buffer.idx;
    ctx.buffer.unsafe_to_break(start, m.end);

    for record in records.iter() {
        let seq_index = usize::from(record.sequence_index);
        if seq_index >= m.count {
            continue;
        }
        let pos = m.positions[seq_index];
        if pos < ctx.buffer.idx || pos >= ctx.buffer.len {
            continue;
        }
        if !ctx.buffer.move_to(pos) {
            break;
        }
        recurse(ctx, record.lookup_index);
    }

    let end = m.end.max(ctx.buffer.idx).min(ctx.buffer.len);
    ctx.buffer.move_to(end);
    true
}

fn fail_unsafe(ctx: &mut ApplyCtx, unsafe_to: usize) -> Option<()> {
    ctx.buffer
        .unsafe_to_concat_from_outbuffer(ctx.buffer.backtrack_len().saturating_sub(1), unsafe_to);
    None
}

/// Sequence Context formats 1–3 (GSUB type 5, GPOS type 7).
pub(crate) fn apply_context(ctx: &mut ApplyCtx, data: &[u8]) -> Option<()> {
    let glyph = ctx.buffer.cur(0).codepoint;
    let format = read_at::<u16>(data, 0)?;

    match format {
        1 => {
            let coverage = Coverage::parse(read_at::<Offset16>(data, 2)?.resolve(data)?)?;
            let index = coverage.get(glyph as u16)?;

            let set_count = read_at::<u16>(data, 4)?;
            if index >= set_count {
                return None;
            }
            let set = read_at::<Offset16>(data, 6 + usize::from(index) * 2)?.resolve(data)?;
            apply_rule_set(ctx, set, &RuleMatcher::Glyphs)
        }
        2 => {
            let coverage = Coverage::parse(read_at::<Offset16>(data, 2)?.resolve(data)?)?;
            coverage.get(glyph as u16)?;

            let class_def = ClassDef::parse(read_at::<Offset16>(data, 4)?.resolve(data)?)?;
            let class = class_def.get(glyph as u16);

            let set_count = read_at::<u16>(data, 6)?;
            if class >= set_count {
                return None;
            }
            let set = read_at::<Offset16>(data, 8 + usize::from(class) * 2)?.resolve(data)?;
            apply_rule_set(ctx, set, &RuleMatcher::Classes(class_def))
        }
        3 => {
            let glyph_count = usize::from(read_at::<u16>(data, 2)?);
            let record_count = read_at::<u16>(data, 4)?;
            if glyph_count == 0 {
                return None;
            }

            let first = Coverage::parse(read_at::<Offset16>(data, 6)?.resolve(data)?)?;
            first.get(glyph as u16)?;

            let matcher = |i: usize, g: u32| -> bool {
                read_at::<Offset16>(data, 6 + i * 2)
                    .and_then(|o| o.resolve(data))
                    .and_then(Coverage::parse)
                    .map_or(false, |c| c.contains(g as u16))
            };

            let m = match match_input(ctx, glyph_count, &matcher) {
                Ok(m) => m,
                Err(unsafe_to) => return fail_unsafe(ctx, unsafe_to),
            };

            let mut s = Stream::new_at(data, 6 + glyph_count * 2)?;
            let records = s.read_array16::<LookupRecord>(record_count)?;
            apply_lookup_records(ctx, &m, records).then_some(())
        }
        _ => None,
    }
}

/// Chained Sequence Context formats 1–3 (GSUB type 6, GPOS type 8).
pub(crate) fn apply_chain_context(ctx: &mut ApplyCtx, data: &[u8]) -> Option<()> {
    let glyph = ctx.buffer.cur(0).codepoint;
    let format = read_at::<u16>(data, 0)?;

    match format {
        1 => {
            let coverage = Coverage::parse(read_at::<Offset16>(data, 2)?.resolve(data)?)?;
            let index = coverage.get(glyph as u16)?;

            let set_count = read_at::<u16>(data, 4)?;
            if index >= set_count {
                return None;
            }
            let set = read_at::<Offset16>(data, 6 + usize::from(index) * 2)?.resolve(data)?;
            apply_chain_rule_set(ctx, set, &RuleMatcher::Glyphs, &RuleMatcher::Glyphs, &RuleMatcher::Glyphs)
        }
        2 => {
            let coverage = Coverage::parse(read_at::<Offset16>(data, 2)?.resolve(data)?)?;
            coverage.get(glyph as u16)?;

            let backtrack_classes = read_at::<Offset16>(data, 4)?
                .resolve(data)
                .and_then(ClassDef::parse)
                .unwrap_or(ClassDef::Empty);
            let input_classes = read_at::<Offset16>(data, 6)?
                .resolve(data)
                .and_then(ClassDef::parse)?;
            let lookahead_classes = read_at::<Offset16>(data, 8)?
                .resolve(data)
                .and_then(ClassDef::parse)
                .unwrap_or(ClassDef::Empty);

            let class = input_classes.get(glyph as u16);
            let set_count = read_at::<u16>(data, 10)?;
            if class >= set_count {
                return None;
            }
            let set = read_at::<Offset16>(data, 12 + usize::from(class) * 2)?.resolve(data)?;
            apply_chain_rule_set(
                ctx,
                set,
                &RuleMatcher::Classes(backtrack_classes),
                &RuleMatcher::Classes(input_classes),
                &RuleMatcher::Classes(lookahead_classes),
            )
        }
        3 => {
            let mut s = Stream::new_at(data, 2)?;

            let backtrack_count = s.read::<u16>()?;
            let backtrack = s.read_array16::<Offset16>(backtrack_count)?;

            let input_count = s.read::<u16>()?;
            let input = s.read_array16::<Offset16>(input_count)?;
            if input_count == 0 {
                return None;
            }

            let lookahead_count = s.read::<u16>()?;
            let lookahead = s.read_array16::<Offset16>(lookahead_count)?;

            let record_count = s.read::<u16>()?;
            let records = s.read_array16::<LookupRecord>(record_count)?;

            let first = Coverage::parse(input.get(0)?.resolve(data)?)?;
            first.get(glyph as u16)?;

            fn cov_match<'a>(
                data: &'a [u8],
                offsets: LazyArray16<'a, Offset16>,
            ) -> impl Fn(usize, u32) -> bool + 'a {
                move |i: usize, g: u32| -> bool {
                    offsets
                        .get(i as u16)
                        .and_then(|o| o.resolve(data))
                        .and_then(Coverage::parse)
                        .map_or(false, |c| c.contains(g as u16))
                }
            }

            let input_match = cov_match(data, input);
            let m = match match_input(ctx, usize::from(input_count), &input_match) {
                Ok(m) => m,
                Err(unsafe_to) => return fail_unsafe(ctx, unsafe_to),
            };

            let backtrack_match = cov_match(data, backtrack);
            if match_backtrack(ctx, usize::from(backtrack_count), &backtrack_match).is_err() {
                return fail_unsafe(ctx, m.end);
            }

            let lookahead_match = cov_match(data, lookahead);
            match match_lookahead(ctx, usize::from(lookahead_count), &lookahead_match, m.end) {
                Ok(_) => {}
                Err(unsafe_to) => return fail_unsafe(ctx, unsafe_to),
            }

            apply_lookup_records(ctx, &m, records).then_some(())
        }
        _ => None,
    }
}

/// How rule sequence values are matched against glyphs.
enum RuleMatcher<'a> {
    Glyphs,
    Classes(ClassDef<'a>),
}

impl RuleMatcher<'_> {
    fn matches(&self, value: u16, glyph: u32) -> bool {
        match self {
            RuleMatcher::Glyphs => u32::from(value) == glyph,
            RuleMatcher::Classes(classes) => classes.get(glyph as u16) == value,
        }
    }
}

fn apply_rule_set(ctx: &mut ApplyCtx, set: &[u8], matcher: &RuleMatcher) -> Option<()> {
    let rule_count = read_at::<u16>(set, 0)?;
    for i in 0..usize::from(rule_count) {
        let Some(rule) = read_at::<Offset16>(set, 2 + i * 2).and_then(|o| o.resolve(set)) else {
            continue;
        };
        if apply_rule(ctx, rule, matcher).is_some() {
            return Some(());
        }
    }
    None
}

fn apply_rule(ctx: &mut ApplyCtx, rule: &[u8], matcher: &RuleMatcher) -> Option<()> {
    let mut s = Stream::new(rule);
    let glyph_count = s.read::<u16>()?;
    let record_count = s.read::<u16>()?;
    if glyph_count == 0 {
        return None;
    }
    let input = s.read_array16::<u16>(glyph_count - 1)?;
    let records = s.read_array16::<LookupRecord>(record_count)?;

    let input_match = |i: usize, g: u32| -> bool {
        input.get((i - 1) as u16).map_or(false, |v| matcher.matches(v, g))
    };

    let m = match match_input(ctx, usize::from(glyph_count), &input_match) {
        Ok(m) => m,
        Err(unsafe_to) => return fail_unsafe(ctx, unsafe_to),
    };
    apply_lookup_records(ctx, &m, records).then_some(())
}

fn apply_chain_rule_set(
    ctx: &mut ApplyCtx,
    set: &[u8],
    backtrack_matcher: &RuleMatcher,
    input_matcher: &RuleMatcher,
    lookahead_matcher: &RuleMatcher,
) -> Option<()> {
    let rule_count = read_at::<u16>(set, 0)?;
    for i in 0..usize::from(rule_count) {
        let Some(rule) = read_at::<Offset16>(set, 2 + i * 2).and_then(|o| o.resolve(set)) else {
            continue;
        };
        if apply_chain_rule(ctx, rule, backtrack_matcher, input_matcher, lookahead_matcher)
            .is_some()
        {
            return Some(());
        }
    }
    None
}

fn apply_chain_rule(
    ctx: &mut ApplyCtx,
    rule: &[u8],
    backtrack_matcher: &RuleMatcher,
    input_matcher: &RuleMatcher,
    lookahead_matcher: &RuleMatcher,
) -> Option<()> {
    let mut s = Stream::new(rule);

    let backtrack_count = s.read::<u16>()?;
    let backtrack = s.read_array16::<u16>(backtrack_count)?;

    let input_count = s.read::<u16>()?;
    if input_count == 0 {
        return None;
    }
    let input = s.read_array16::<u16>(input_count - 1)?;

    let lookahead_count = s.read::<u16>()?;
    let lookahead = s.read_array16::<u16>(lookahead_count)?;

    let record_count = s.read::<u16>()?;
    let records = s.read_array16::<LookupRecord>(record_count)?;

    let input_match = |i: usize, g: u32| -> bool {
        input
            .get((i - 1) as u16)
            .map_or(false, |v| input_matcher.matches(v, g))
    };
    let m = match match_input(ctx, usize::from(input_count), &input_match) {
        Ok(m) => m,
        Err(unsafe_to) => return fail_unsafe(ctx, unsafe_to),
    };

    let backtrack_match = |i: usize, g: u32| -> bool {
        backtrack
            .get(i as u16)
            .map_or(false, |v| backtrack_matcher.matches(v, g))
    };
    if match_backtrack(ctx, usize::from(backtrack_count), &backtrack_match).is_err() {
        return fail_unsafe(ctx, m.end);
    }

    let lookahead_match = |i: usize, g: u32| -> bool {
        lookahead
            .get(i as u16)
            .map_or(false, |v| lookahead_matcher.matches(v, g))
    };
    match match_lookahead(ctx, usize::from(lookahead_count), &lookahead_match, m.end) {
        Ok(_) => {}
        Err(unsafe_to) => return fail_unsafe(ctx, unsafe_to),
    }

    apply_lookup_records(ctx, &m, records).then_some(())
}
