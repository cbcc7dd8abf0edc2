//! Thai and Lao: SARA AM decomposition and nikhahit reordering. The rest
//! of the script shapes with the generic machinery, marks ordered by
//! their combining classes.

use crate::buffer::Buffer;
use crate::font::Font;
use crate::plan::ShapePlan;
use crate::unicode::GeneralCategory;

use super::{ComplexShaper, ShapeNormalizationMode, ZeroWidthMarksMode, DEFAULT_SHAPER};

pub(crate) const THAI_SHAPER: ComplexShaper = ComplexShaper {
    preprocess_text: Some(preprocess_text),
    normalization_mode: ShapeNormalizationMode::ComposedDiacritics,
    zero_width_marks: ZeroWidthMarksMode::ByGdefLate,
    fallback_position: false,
    ..DEFAULT_SHAPER
};

fn is_sara_am(u: u32) -> bool {
    u == 0x0E33 || u == 0x0EB3
}

fn nikhahit_from_sara_am(u: u32) -> u32 {
    // Thai SARA AM -> NIKHAHIT, Lao AM -> NIGGAHITA.
    u - 0x0E33 + 0x0E4D
}

fn sara_aa_from_sara_am(u: u32) -> u32 {
    u - 1
}

fn is_above_base_mark(u: u32) -> bool {
    matches!(
        u,
        0x0E31 | 0x0E34..=0x0E37 | 0x0E47..=0x0E4E | 0x0EB1 | 0x0EB4..=0x0EB7 | 0x0EC8..=0x0ECD
    )
}

fn preprocess_text(_plan: &ShapePlan, _font: &Font, buffer: &mut Buffer) {
    decompose_sara_am(buffer);
}

// SARA AM is decomposed into NIKHAHIT + SARA AA, and the NIKHAHIT is
// moved over any tone marks between it and the base consonant.
fn decompose_sara_am(buffer: &mut Buffer) {
    let count = buffer.len;
    buffer.clear_output();

    while buffer.idx < count && buffer.successful {
        let u = buffer.cur(0).codepoint;
        if !is_sara_am(u) {
            buffer.next_glyph();
            continue;
        }

        // Is SARA AM. Decompose and reorder.
        buffer.output_glyph(nikhahit_from_sara_am(u));
        {
            let i = buffer.out_len - 1;
            let mut scratch = buffer.scratch_flags;
            let info = &mut buffer.out_info_mut()[i];
            info.init_unicode_props(&mut scratch);
            info.set_general_category(GeneralCategory::NonspacingMark);
            buffer.scratch_flags = scratch;
        }
        buffer.replace_glyph(sara_aa_from_sara_am(u));

        // Jump the NIKHAHIT over any preceding tone marks so it lands
        // right after the base.
        let end = buffer.out_len;
        let mut start = end - 2;
        while start > 0 && is_above_base_mark(buffer.out_info()[start - 1].codepoint) {
            start -= 1;
        }

        if start < end - 2 {
            let nikhahit = buffer.out_info()[end - 2];
            let out = buffer.out_info_mut();
            for i in (start..end - 2).rev() {
                out[i + 1] = out[i];
            }
            out[start] = nikhahit;
        }

        // The whole sequence is one cluster now.
        buffer.merge_out_clusters(start, end);
    }
    buffer.sync();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sara_am_decomposes_and_reorders() {
        // base + tone mark + SARA AM: the nikhahit moves before the tone.
        let mut buffer = Buffer::new();
        buffer.push_str("\u{0E19}\u{0E49}\u{0E33}");
        let mut scratch = crate::buffer::BufferScratchFlags::empty();
        for i in 0..buffer.len {
            buffer.info[i].init_unicode_props(&mut scratch);
        }

        decompose_sara_am(&mut buffer);

        let cps: Vec<u32> = buffer.info().iter().map(|i| i.codepoint).collect();
        assert_eq!(cps, [0x0E19, 0x0E4D, 0x0E49, 0x0E32]);
        // One cluster.
        let clusters: Vec<u32> = buffer.info().iter().map(|i| i.cluster).collect();
        assert!(clusters.windows(2).all(|w| w[0] == w[1] || w[0] == 0));
    }

    #[test]
    fn plain_thai_text_is_untouched() {
        let mut buffer = Buffer::new();
        buffer.push_str("\u{0E01}\u{0E02}");
        decompose_sara_am(&mut buffer);
        let cps: Vec<u32> = buffer.info().iter().map(|i| i.codepoint).collect();
        assert_eq!(cps, [0x0E01, 0x0E02]);
    }
}
