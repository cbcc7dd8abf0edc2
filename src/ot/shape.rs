//! The OpenType shaping pipeline.

use crate::buffer::{Buffer, BufferClusterLevel, BufferFlags, BufferScratchFlags, ContentType};
use crate::common::{Direction, Feature};
use crate::complex::ZeroWidthMarksMode;
use crate::font::Font;
use crate::plan::ShapePlan;
use crate::unicode::{CharExt, GeneralCategory, Space, DOTTED_CIRCLE};

use super::map::{TABLE_GPOS, TABLE_GSUB};
use super::{apply, fallback, gpos, normalize};

/// Runs the full pipeline over a buffer of Unicode content.
pub(crate) fn shape_internal(
    plan: &ShapePlan,
    font: &Font,
    buffer: &mut Buffer,
    user_features: &[Feature],
) {
    buffer.scratch_flags = BufferScratchFlags::empty();

    initialize_masks(plan, buffer);
    set_unicode_props(buffer);
    insert_dotted_circle(font, buffer);
    form_clusters(buffer);
    ensure_native_direction(buffer);

    if let Some(preprocess) = plan.shaper.preprocess_text {
        preprocess(plan, font, buffer);
    }

    substitute_pre(plan, font, buffer, user_features);
    position(plan, font, buffer);
    substitute_post(plan, font, buffer);

    buffer.content_type = ContentType::Glyphs;
}

fn initialize_masks(plan: &ShapePlan, buffer: &mut Buffer) {
    buffer.reset_masks(plan.ot_map.global_mask());
}

fn set_unicode_props(buffer: &mut Buffer) {
    let mut scratch = buffer.scratch_flags;
    for i in 0..buffer.len {
        buffer.info[i].init_unicode_props(&mut scratch);
    }
    buffer.scratch_flags = scratch;

    // Mark ZWJ-adjacent emoji-ish pieces as continuations, so clusters
    // stay whole; the simple rule groups anything joined with ZWJ.
    for i in 1..buffer.len {
        if buffer.info[i].is_zwj() || buffer.info[i - 1].is_zwj() {
            buffer.info[i].set_continuation();
        }
    }
}

fn insert_dotted_circle(font: &Font, buffer: &mut Buffer) {
    if !buffer.flags.contains(BufferFlags::BEGINNING_OF_TEXT)
        || buffer.flags.contains(BufferFlags::DO_NOT_INSERT_DOTTED_CIRCLE)
        || buffer.context_len(0) != 0
        || buffer.is_empty()
    {
        return;
    }

    if !buffer.info[0].is_unicode_mark() {
        return;
    }

    if !font.has_glyph(DOTTED_CIRCLE) {
        return;
    }

    let cluster = buffer.info[0].cluster;
    let mask = buffer.info[0].mask;
    buffer.clear_output();
    buffer.idx = 0;
    let mut info = crate::buffer::GlyphInfo {
        codepoint: DOTTED_CIRCLE as u32,
        mask,
        cluster,
        var1: 0,
        var2: 0,
    };
    let mut scratch = buffer.scratch_flags;
    info.init_unicode_props(&mut scratch);
    buffer.scratch_flags = scratch;
    buffer.output_info(info);
    buffer.sync();
}

fn form_clusters(buffer: &mut Buffer) {
    if !buffer
        .scratch_flags
        .contains(BufferScratchFlags::HAS_NON_ASCII)
    {
        return;
    }

    let merge = buffer.cluster_level == BufferClusterLevel::MonotoneGraphemes;
    let len = buffer.len;
    let mut start = 0;
    for i in 1..len + 1 {
        if i < len && buffer.info[i].is_continuation() {
            continue;
        }
        if merge {
            buffer.merge_clusters(start, i);
        } else {
            buffer.unsafe_to_break(start, i);
        }
        start = i;
    }
}

fn ensure_native_direction(buffer: &mut Buffer) {
    let direction = buffer.direction;
    let horizontal_direction = buffer
        .script
        .map(Direction::from_script)
        .unwrap_or(Direction::LeftToRight);

    let needs_flip = (direction.is_horizontal() && direction != horizontal_direction)
        || (direction.is_vertical() && direction != Direction::TopToBottom);
    if !needs_flip {
        return;
    }

    reverse_graphemes(buffer);
    buffer.direction = direction.reverse();
}

fn reverse_graphemes(buffer: &mut Buffer) {
    let len = buffer.len;
    let mut start = 0;
    for i in 1..len + 1 {
        if i < len && buffer.info[i].is_continuation() {
            continue;
        }
        buffer.reverse_range(start, i);
        start = i;
    }
    buffer.reverse();
}

fn substitute_pre(plan: &ShapePlan, font: &Font, buffer: &mut Buffer, user_features: &[Feature]) {
    mirror_chars(plan, buffer);
    normalize::normalize(plan, font, buffer);
    setup_masks(plan, font, buffer, user_features);
    map_glyphs(font, buffer);

    // GSUB.
    apply::set_glyph_props(buffer, font.face);
    plan.ot_map.apply(TABLE_GSUB, plan, font, buffer);
}

fn mirror_chars(plan: &ShapePlan, buffer: &mut Buffer) {
    if buffer.direction != Direction::RightToLeft {
        return;
    }

    let rtlm_mask = plan.rtlm_mask;
    for info in buffer.info_mut() {
        match info.as_char().mirrored() {
            Some(mirrored) => info.codepoint = mirrored as u32,
            None => info.mask |= rtlm_mask,
        }
    }
}

fn setup_masks(plan: &ShapePlan, font: &Font, buffer: &mut Buffer, user_features: &[Feature]) {
    if plan.has_frac {
        setup_masks_fraction(plan, buffer);
    }

    if let Some(setup) = plan.shaper.setup_masks {
        setup(plan, font, buffer);
    }

    for feature in user_features {
        if !feature.is_global() {
            let (mask, shift) = plan.ot_map.mask(feature.tag);
            buffer.set_masks(feature.value << shift, mask, feature.start, feature.end);
        }
    }
}

fn setup_masks_fraction(plan: &ShapePlan, buffer: &mut Buffer) {
    if !buffer
        .scratch_flags
        .contains(BufferScratchFlags::HAS_NON_ASCII)
    {
        return;
    }

    let pre_mask = plan.numr_mask | plan.frac_mask;
    let post_mask = plan.frac_mask | plan.dnom_mask;

    let count = buffer.len;
    let mut i = 0;
    while i < count {
        if buffer.info[i].codepoint != 0x2044 {
            i += 1;
            continue;
        }

        // Grow the fraction over adjacent decimal digits.
        let mut start = i;
        while start > 0
            && buffer.info[start - 1].general_category() == GeneralCategory::DecimalNumber
        {
            start -= 1;
        }
        let mut end = i + 1;
        while end < count
            && buffer.info[end].general_category() == GeneralCategory::DecimalNumber
        {
            end += 1;
        }

        if start < i || end > i + 1 {
            buffer.unsafe_to_break(start, end);
            for j in start..i {
                buffer.info[j].mask |= pre_mask;
            }
            buffer.info[i].mask |= plan.frac_mask;
            for j in i + 1..end {
                buffer.info[j].mask |= post_mask;
            }
        }

        i = end;
    }
}

fn map_glyphs(font: &Font, buffer: &mut Buffer) {
    if buffer.is_empty() {
        return;
    }

    buffer.clear_output();
    while buffer.idx < buffer.len && buffer.successful {
        let c = buffer.cur(0).as_char();

        // A variation selector following a base steers the mapping.
        if buffer.idx + 1 < buffer.len {
            let next = buffer.cur(1).as_char();
            if crate::unicode::is_variation_selector(next) {
                if let Some(glyph) = font.variation_glyph(c, next) {
                    buffer.replace_glyph(glyph);
                    // The selector itself maps to an invisible placeholder.
                    let space = font.nominal_glyph(' ').unwrap_or(0);
                    buffer.cur_mut(0).set_hidden();
                    buffer.replace_glyph(space);
                    continue;
                }
                // Selector unusable: map the base normally and keep the
                // selector as default-ignorable.
                let glyph = font.nominal_glyph(c).unwrap_or(not_found(buffer));
                buffer.replace_glyph(glyph);
                let space = font.nominal_glyph(' ').unwrap_or(0);
                buffer.cur_mut(0).set_hidden();
                buffer.replace_glyph(space);
                continue;
            }
        }

        let glyph = font.nominal_glyph(c).unwrap_or(not_found(buffer));
        buffer.replace_glyph(glyph);
    }
    buffer.sync();
}

fn not_found(buffer: &Buffer) -> u32 {
    buffer.not_found_glyph.unwrap_or(0)
}

fn position(plan: &ShapePlan, font: &Font, buffer: &mut Buffer) {
    buffer.clear_positions();

    position_default(font, buffer);
    position_complex(plan, font, buffer);

    if buffer.direction.is_backward() {
        buffer.reverse();
    }
}

fn position_default(font: &Font, buffer: &mut Buffer) {
    let len = buffer.len;

    if buffer.direction.is_vertical() {
        for i in 0..len {
            let glyph = buffer.info[i].codepoint;
            buffer.pos[i].y_advance = font.glyph_v_advance(glyph);
            let (ox, oy) = font.glyph_v_origin(glyph);
            buffer.pos[i].x_offset -= ox;
            buffer.pos[i].y_offset -= oy;
        }
    } else {
        for i in 0..len {
            let glyph = buffer.info[i].codepoint;
            buffer.pos[i].x_advance = font.glyph_h_advance(glyph);
            let (ox, oy) = font.glyph_h_origin(glyph);
            buffer.pos[i].x_offset -= ox;
            buffer.pos[i].y_offset -= oy;
        }
    }

    if buffer
        .scratch_flags
        .contains(BufferScratchFlags::HAS_SPACE_FALLBACK)
    {
        adjust_space_fallbacks(font, buffer);
    }
}

fn adjust_space_fallbacks(font: &Font, buffer: &mut Buffer) {
    let (x_scale, _) = font.scale();
    for i in 0..buffer.len {
        match buffer.info[i].space_fallback() {
            Space::NotSpace | Space::Regular => {}
            Space::EmSpace(n) => {
                buffer.pos[i].x_advance = (x_scale + i32::from(n) / 2) / i32::from(n);
            }
            Space::Em4Per18 => {
                buffer.pos[i].x_advance = x_scale * 4 / 18;
            }
            Space::Figure => {
                if let Some(g) = font.nominal_glyph('0') {
                    buffer.pos[i].x_advance = font.glyph_h_advance(g);
                }
            }
            Space::Punctuation => {
                if let Some(g) = font.nominal_glyph('.').or_else(|| font.nominal_glyph(',')) {
                    buffer.pos[i].x_advance = font.glyph_h_advance(g);
                }
            }
            Space::Narrow => {
                buffer.pos[i].x_advance = x_scale / 5;
            }
        }
    }
}

fn position_complex(plan: &ShapePlan, font: &Font, buffer: &mut Buffer) {
    // When zeroing mark widths without GPOS, shift the mark so it hangs
    // over the previous glyph; backward buffers leave it over the next.
    let adjust_offsets_when_zeroing =
        plan.adjust_mark_positioning_when_zeroing && buffer.direction.is_forward();

    if plan.shaper.zero_width_marks == ZeroWidthMarksMode::ByGdefEarly {
        zero_mark_widths_by_gdef(buffer, adjust_offsets_when_zeroing);
    }

    gpos::position_start(buffer);
    if plan.apply_gpos {
        plan.ot_map.apply(TABLE_GPOS, plan, font, buffer);
    }

    if plan.shaper.zero_width_marks == ZeroWidthMarksMode::ByGdefLate {
        zero_mark_widths_by_gdef(buffer, adjust_offsets_when_zeroing);
    }

    zero_width_default_ignorables(buffer);
    gpos::position_finish_offsets(buffer);

    if plan.fallback_mark_positioning {
        fallback::recategorize_marks(buffer);
        fallback::position_marks(plan, font, buffer, adjust_offsets_when_zeroing);
    }
}

fn zero_mark_widths_by_gdef(buffer: &mut Buffer, adjust_offsets: bool) {
    for i in 0..buffer.len {
        if buffer.info[i].is_mark() {
            if adjust_offsets {
                buffer.pos[i].x_offset -= buffer.pos[i].x_advance;
                buffer.pos[i].y_offset -= buffer.pos[i].y_advance;
            }
            buffer.pos[i].x_advance = 0;
            buffer.pos[i].y_advance = 0;
        }
    }
}

fn zero_width_default_ignorables(buffer: &mut Buffer) {
    if !buffer
        .scratch_flags
        .contains(BufferScratchFlags::HAS_DEFAULT_IGNORABLES)
        || buffer
            .flags
            .contains(BufferFlags::PRESERVE_DEFAULT_IGNORABLES)
    {
        return;
    }

    for i in 0..buffer.len {
        if buffer.info[i].is_default_ignorable() || buffer.info[i].is_hidden() {
            buffer.pos[i].x_advance = 0;
            buffer.pos[i].y_advance = 0;
            buffer.pos[i].x_offset = 0;
            buffer.pos[i].y_offset = 0;
        }
    }
}

fn substitute_post(plan: &ShapePlan, font: &Font, buffer: &mut Buffer) {
    hide_default_ignorables(font, buffer);

    if let Some(postprocess) = plan.shaper.postprocess_glyphs {
        postprocess(plan, font, buffer);
    }
}

fn hide_default_ignorables(font: &Font, buffer: &mut Buffer) {
    if !buffer
        .scratch_flags
        .contains(BufferScratchFlags::HAS_DEFAULT_IGNORABLES)
        || buffer
            .flags
            .contains(BufferFlags::PRESERVE_DEFAULT_IGNORABLES)
    {
        return;
    }

    let invisible = buffer
        .invisible_glyph
        .or_else(|| font.nominal_glyph(' '));

    if !buffer.flags.contains(BufferFlags::REMOVE_DEFAULT_IGNORABLES) {
        if let Some(invisible) = invisible {
            // Replace with the invisible glyph; advances were zeroed
            // during positioning.
            for info in buffer.info_mut() {
                if info.is_default_ignorable() || info.is_hidden() {
                    info.codepoint = invisible;
                }
            }
            return;
        }
    }

    // Remove them entirely. Positions are live, so rebuild both arrays.
    let mut write = 0;
    for read in 0..buffer.len {
        if buffer.info[read].is_default_ignorable() {
            continue;
        }
        if write != read {
            buffer.info[write] = buffer.info[read];
            buffer.pos[write] = buffer.pos[read];
        }
        write += 1;
    }
    buffer.len = write;
}
