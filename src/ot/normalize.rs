//! Unicode normalization against the font's character coverage.
//!
//! The shaper prefers the form of each cluster the font can actually
//! render: decompose unless the composed form has a glyph, sort marks by
//! modified combining class, then re-compose what the font supports.

use crate::buffer::{Buffer, BufferScratchFlags};
use crate::font::Font;
use crate::plan::ShapePlan;
use crate::complex::ShapeNormalizationMode;
use crate::unicode::{space_fallback, Space, UnicodeFuncs};

pub(crate) struct NormalizeContext<'a, 'b> {
    pub plan: &'a ShapePlan,
    pub font: &'a Font<'b>,
    pub unicode: &'a dyn UnicodeFuncs,
}

impl NormalizeContext<'_, '_> {
    fn decompose_unicode(&self, ab: char) -> Option<(char, char)> {
        if let Some(hook) = self.plan.shaper.decompose {
            if let Some(result) = hook(self, ab) {
                return Some(result);
            }
        }
        self.unicode.decompose(ab)
    }

    fn compose_unicode(&self, a: char, b: char) -> Option<char> {
        if let Some(hook) = self.plan.shaper.compose {
            return hook(self, a, b);
        }
        self.unicode.compose(a, b)
    }
}

fn output_char(buffer: &mut Buffer, unichar: char) {
    buffer.output_glyph(unichar as u32);
    if !buffer.successful || buffer.out_len == 0 {
        return;
    }
    let mut scratch = buffer.scratch_flags;
    let i = buffer.out_len - 1;
    buffer.out_info_mut()[i].init_unicode_props(&mut scratch);
    buffer.scratch_flags = scratch;
}

/// Recursively decomposes `ab`, outputting the shortest sequence the font
/// covers. Returns the number of characters emitted; zero means the font
/// covers nothing useful and nothing was written.
fn decompose(ctx: &NormalizeContext, buffer: &mut Buffer, shortest: bool, ab: char) -> usize {
    let Some((a, b)) = ctx.decompose_unicode(ab) else {
        return 0;
    };

    let has_b_glyph = b == '\0' || ctx.font.has_glyph(b);
    if !has_b_glyph {
        return 0;
    }
    let has_a_glyph = ctx.font.has_glyph(a);

    if shortest && has_a_glyph {
        // Output both a and b.
        output_char(buffer, a);
        if b == '\0' {
            return 1;
        }
        output_char(buffer, b);
        return 2;
    }

    let ret = decompose(ctx, buffer, shortest, a);
    if ret > 0 {
        if b != '\0' {
            output_char(buffer, b);
            return ret + 1;
        }
        return ret;
    }

    if has_a_glyph {
        output_char(buffer, a);
        if b == '\0' {
            return 1;
        }
        output_char(buffer, b);
        return 2;
    }

    0
}

fn decompose_current_character(ctx: &NormalizeContext, buffer: &mut Buffer, shortest: bool) {
    let u = buffer.cur(0).as_char();

    if shortest && ctx.font.has_glyph(u) {
        buffer.next_glyph();
        return;
    }

    if decompose(ctx, buffer, shortest, u) > 0 {
        buffer.skip_glyph();
        return;
    }

    if !shortest && ctx.font.has_glyph(u) {
        buffer.next_glyph();
        return;
    }

    // Handle spaces the font doesn't cover by falling back to the plain
    // space glyph; the width is corrected during positioning.
    if buffer.cur(0).general_category() == crate::unicode::GeneralCategory::SpaceSeparator {
        let space_type = space_fallback(u);
        if space_type != Space::NotSpace && ctx.font.has_glyph(' ') {
            buffer.cur_mut(0).set_space_fallback(space_type);
            buffer.next_glyph();
            buffer.prev_mut().codepoint = ' ' as u32;
            buffer.scratch_flags |= BufferScratchFlags::HAS_SPACE_FALLBACK;
            return;
        }
    }

    // U+2011 is the non-breaking version of U+2010.
    if u == '\u{2011}' && ctx.font.has_glyph('\u{2010}') {
        buffer.next_glyph();
        buffer.prev_mut().codepoint = 0x2010;
        return;
    }

    buffer.next_glyph();
}

fn decompose_multi_char_cluster(ctx: &NormalizeContext, buffer: &mut Buffer, end: usize) {
    // If any character is a variation selector, leave the cluster intact:
    // the variation-glyph mapping handles it.
    for i in buffer.idx..end {
        if crate::unicode::is_variation_selector(buffer.info[i].as_char()) {
            while buffer.idx < end && buffer.successful {
                buffer.next_glyph();
            }
            return;
        }
    }

    while buffer.idx < end && buffer.successful {
        decompose_current_character(ctx, buffer, false);
    }
}

pub(crate) fn normalize(plan: &ShapePlan, font: &Font, buffer: &mut Buffer) {
    if buffer.is_empty() {
        return;
    }

    let mut mode = plan.shaper.normalization_mode;
    if mode == ShapeNormalizationMode::None {
        return;
    }
    if mode == ShapeNormalizationMode::Auto {
        mode = if plan.has_gpos_mark {
            ShapeNormalizationMode::ComposedDiacritics
        } else {
            ShapeNormalizationMode::ComposedDiacriticsNoShortCircuit
        };
    }

    let might_short_circuit = mode == ShapeNormalizationMode::ComposedDiacritics;
    let ctx = NormalizeContext { plan, font, unicode: buffer.unicode };

    // First round: decompose.
    let mut all_simple = true;
    buffer.clear_output();
    let mut count = buffer.len;
    while buffer.idx < count && buffer.successful {
        // Find the run up to the next mark.
        let mut end = buffer.idx + 1;
        while end < count && !buffer.info[end].is_unicode_mark() {
            end += 1;
        }

        if end < count {
            end -= 1; // leave one base for the mark's cluster
        }

        // Simple run: no marks.
        while buffer.idx < end && buffer.successful {
            decompose_current_character(&ctx, buffer, might_short_circuit);
        }

        if buffer.idx == count || !buffer.successful {
            break;
        }

        all_simple = false;

        // A cluster with marks: decompose it fully.
        let mut cluster_end = buffer.idx + 1;
        while cluster_end < count && buffer.info[cluster_end].is_unicode_mark() {
            cluster_end += 1;
        }
        decompose_multi_char_cluster(&ctx, buffer, cluster_end);
    }
    buffer.sync();
    count = buffer.len;

    // Second round: reorder marks by modified combining class.
    if !all_simple {
        let mut i = 0;
        while i < count {
            if buffer.info[i].modified_combining_class() == 0 {
                i += 1;
                continue;
            }

            let start = i;
            let mut end = i + 1;
            while end < count && buffer.info[end].modified_combining_class() != 0 {
                end += 1;
            }

            if end - start > 1 {
                sort_marks(buffer, start, end);
                if let Some(reorder) = plan.shaper.reorder_marks {
                    reorder(plan, buffer, start, end);
                }
            }

            i = end + 1;
        }
    }

    // Third round: recompose.
    if !all_simple
        && matches!(
            mode,
            ShapeNormalizationMode::ComposedDiacritics
                | ShapeNormalizationMode::ComposedDiacriticsNoShortCircuit
        )
    {
        buffer.clear_output();
        let count = buffer.len;
        let mut starter = 0;
        buffer.next_glyph();

        while buffer.idx < count && buffer.successful {
            // A non-mark never composes with the preceding starter; marks
            // compose when adjacent to it or when classes strictly rise.
            if buffer.cur(0).modified_combining_class() != 0 && buffer.out_len > 0 {
                let adjacent = starter == buffer.out_len - 1;
                let rising = buffer.prev().modified_combining_class()
                    < buffer.cur(0).modified_combining_class();
                if adjacent || rising {
                    let a = buffer.out_info()[starter].as_char();
                    let b = buffer.cur(0).as_char();
                    if let Some(composed) = ctx.compose_unicode(a, b) {
                        if ctx.font.has_glyph(composed) {
                            buffer.next_glyph();
                            buffer.merge_out_clusters(starter, buffer.out_len);
                            buffer.out_len -= 1;
                            let mut scratch = buffer.scratch_flags;
                            let info = &mut buffer.out_info_mut()[starter];
                            info.codepoint = composed as u32;
                            info.init_unicode_props(&mut scratch);
                            buffer.scratch_flags = scratch;
                            continue;
                        }
                    }
                }
            }

            buffer.next_glyph();
            if buffer.out_len > 0 && buffer.prev().modified_combining_class() == 0 {
                starter = buffer.out_len - 1;
            }
        }
        buffer.sync();
    }
}

/// An insertion sort, matching the stable small-run sorter the original
/// uses for combining marks.
fn sort_marks(buffer: &mut Buffer, start: usize, end: usize) {
    for i in start + 1..end {
        let key = buffer.info[i];
        let kcc = key.modified_combining_class();
        let mut j = i;
        while j > start && buffer.info[j - 1].modified_combining_class() > kcc {
            buffer.info[j] = buffer.info[j - 1];
            j -= 1;
        }
        buffer.info[j] = key;
    }
}
