//! Khmer: coeng-stacked consonants, pre-base vowels, and the pre-base
//! reordering Ro.

use crate::buffer::{Buffer, GlyphInfo, Mask};
use crate::font::Font;
use crate::ot::feature;
use crate::ot::map::FeatureFlags;
use crate::plan::{ShapePlan, ShapePlanner};

use super::{ComplexShaper, ShapeNormalizationMode, ShaperData, ZeroWidthMarksMode, DEFAULT_SHAPER};

pub(crate) const KHMER_SHAPER: ComplexShaper = ComplexShaper {
    collect_features: Some(collect_features),
    override_features: Some(override_features),
    create_data: Some(data_create),
    setup_masks: Some(setup_masks),
    normalization_mode: ShapeNormalizationMode::ComposedDiacriticsNoShortCircuit,
    zero_width_marks: ZeroWidthMarksMode::None,
    fallback_position: false,
    ..DEFAULT_SHAPER
};

const RO: u32 = 0x179A;
const COENG: u32 = 0x17D2;

mod cat {
    pub const OTHER: u8 = 0;
    pub const C: u8 = 1;
    pub const V: u8 = 2;
    pub const COENG: u8 = 3;
    pub const VPRE: u8 = 4;
    pub const VOTHER: u8 = 5;
    pub const RS: u8 = 6;
    pub const SIGN: u8 = 7;
    pub const JOINER: u8 = 8;
}

fn categorize(u: u32) -> u8 {
    match u {
        0x1780..=0x17A2 => cat::C,
        0x17A3..=0x17B3 => cat::V,
        COENG => cat::COENG,
        0x17BE | 0x17C1..=0x17C5 => cat::VPRE,
        0x17B6..=0x17BD | 0x17C0 | 0x17BF => cat::VOTHER,
        0x17C9 | 0x17CA => cat::RS,
        0x17C6..=0x17C8 | 0x17CB..=0x17D1 | 0x17DD => cat::SIGN,
        0x200C | 0x200D => cat::JOINER,
        0x25CC => cat::C,
        _ => cat::OTHER,
    }
}

pub(crate) struct KhmerShapePlan {
    pref_mask: Mask,
    blwf_mask: Mask,
    abvf_mask: Mask,
    pstf_mask: Mask,
}

fn collect_features(planner: &mut ShapePlanner) {
    let map = &mut planner.ot_map;

    map.add_gsub_pause(Some(reorder));

    map.enable_feature(feature::LOCALIZED_FORMS, FeatureFlags::PER_SYLLABLE, 1);
    map.enable_feature(
        feature::GLYPH_COMPOSITION_DECOMPOSITION,
        FeatureFlags::PER_SYLLABLE,
        1,
    );

    for tag in [
        feature::PRE_BASE_FORMS,
        feature::BELOW_BASE_FORMS,
        feature::ABOVE_BASE_FORMS,
        feature::POST_BASE_FORMS,
    ] {
        map.add_feature(tag, FeatureFlags::MANUAL_JOINERS | FeatureFlags::PER_SYLLABLE, 1);
    }
    map.add_gsub_pause(None);

    for tag in [
        feature::PRE_BASE_SUBSTITUTIONS,
        feature::ABOVE_BASE_SUBSTITUTIONS,
        feature::BELOW_BASE_SUBSTITUTIONS,
        feature::POST_BASE_SUBSTITUTIONS,
    ] {
        map.enable_feature(tag, FeatureFlags::MANUAL_JOINERS | FeatureFlags::PER_SYLLABLE, 1);
    }
}

fn override_features(planner: &mut ShapePlanner) {
    // Khmer spec has 'clig' as part of required shaping features:
    // "Apply feature 'clig' to form ligatures that are desired for
    // typographical correctness.", hence in overrides.
    planner.ot_map.enable_feature(feature::CONTEXTUAL_LIGATURES, FeatureFlags::NONE, 1);
    planner.ot_map.disable_feature(feature::STANDARD_LIGATURES);
}

fn data_create(plan: &ShapePlan) -> ShaperData {
    ShaperData::Khmer(KhmerShapePlan {
        pref_mask: plan.ot_map.get_1_mask(feature::PRE_BASE_FORMS),
        blwf_mask: plan.ot_map.get_1_mask(feature::BELOW_BASE_FORMS),
        abvf_mask: plan.ot_map.get_1_mask(feature::ABOVE_BASE_FORMS),
        pstf_mask: plan.ot_map.get_1_mask(feature::POST_BASE_FORMS),
    })
}

fn setup_masks(_plan: &ShapePlan, _font: &Font, buffer: &mut Buffer) {
    let mut serial = 1u8;
    let len = buffer.len;
    let mut i = 0;
    while i < len {
        let end = syllable_end(buffer, i);
        for info in &mut buffer.info_mut()[i..end] {
            info.set_complex_category(categorize(info.codepoint));
            info.set_syllable(serial);
        }
        serial = serial.wrapping_add(1).max(1);
        i = end;
    }
}

/// One syllable: a base, its coeng-stacked consonants, then vowels and
/// signs.
fn syllable_end(buffer: &Buffer, start: usize) -> usize {
    let len = buffer.len;
    let mut i = start;

    let first = categorize(buffer.info[i].codepoint);
    i += 1;
    if !matches!(first, cat::C | cat::V) {
        return i;
    }

    while i < len {
        match categorize(buffer.info[i].codepoint) {
            cat::COENG => {
                // Coeng + consonant extends the stack.
                if i + 1 < len && matches!(categorize(buffer.info[i + 1].codepoint), cat::C | cat::V)
                {
                    i += 2;
                } else {
                    i += 1;
                    break;
                }
            }
            cat::VPRE | cat::VOTHER | cat::RS | cat::SIGN | cat::JOINER => i += 1,
            _ => break,
        }
    }
    i
}

fn reorder(plan: &ShapePlan, _font: &Font, buffer: &mut Buffer) {
    let ShaperData::Khmer(khmer_plan) = &plan.data else {
        return;
    };

    let len = buffer.len;
    let mut start = 0;
    while start < len {
        let syllable = buffer.info[start].syllable();
        let mut end = start + 1;
        while end < len && buffer.info[end].syllable() == syllable {
            end += 1;
        }
        reorder_syllable(khmer_plan, buffer, start, end);
        start = end;
    }
}

fn reorder_syllable(plan: &KhmerShapePlan, buffer: &mut Buffer, start: usize, end: usize) {
    // Mask coeng stacks: below-base by default, the pre-base-reordering
    // Ro takes 'pref'.
    let mut i = start;
    while i + 1 < end {
        if buffer.info[i].complex_category() == cat::COENG {
            let mask = if buffer.info[i + 1].codepoint == RO {
                plan.pref_mask
            } else {
                plan.blwf_mask
            };
            buffer.info[i].mask |= mask;
            buffer.info[i + 1].mask |= mask;
            i += 2;
        } else {
            if buffer.info[i].complex_category() == cat::VOTHER {
                buffer.info[i].mask |= plan.abvf_mask | plan.pstf_mask;
            }
            i += 1;
        }
    }

    // Move a coeng+Ro pair to the front, then pre-base vowels before it:
    // final visual order is VPre, coeng-Ro, base.
    let mut front = start;
    let mut k = start;
    while k + 1 < end {
        if buffer.info[k].complex_category() == cat::COENG && buffer.info[k + 1].codepoint == RO {
            move_range_to(buffer, k, k + 2, front);
            front += 2;
            break;
        }
        k += 1;
    }

    let mut k = front;
    while k < end {
        if buffer.info[k].complex_category() == cat::VPRE {
            move_range_to(buffer, k, k + 1, start);
            break;
        }
        k += 1;
    }

    if front != start {
        buffer.merge_clusters(start, end);
    }
}

/// Moves `[from, to)` so it starts at `dest` (dest <= from), shifting the
/// glyphs in between rightward.
fn move_range_to(buffer: &mut Buffer, from: usize, to: usize, dest: usize) {
    if dest >= from {
        return;
    }
    let moved: Vec<GlyphInfo> = buffer.info[from..to].to_vec();
    let count = to - from;
    buffer.info.copy_within(dest..from, dest + count);
    buffer.info[dest..dest + count].copy_from_slice(&moved);
    buffer.merge_clusters(dest, to);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coeng_ro_moves_to_front() {
        // KA + COENG + RO: the subscript Ro renders before the base.
        let mut buffer = Buffer::new();
        buffer.push_str("\u{1780}\u{17D2}\u{179A}");
        let plan = KhmerShapePlan { pref_mask: 0, blwf_mask: 0, abvf_mask: 0, pstf_mask: 0 };
        for info in buffer.info_mut() {
            let c = categorize(info.codepoint);
            info.set_complex_category(c);
        }
        reorder_syllable(&plan, &mut buffer, 0, 3);
        let cps: Vec<u32> = buffer.info().iter().map(|i| i.codepoint).collect();
        assert_eq!(cps, [0x17D2, 0x179A, 0x1780]);
    }

    #[test]
    fn pre_vowel_moves_before_coeng_ro() {
        // KA + COENG RO + E-vowel: visual order E, coeng-Ro, KA.
        let mut buffer = Buffer::new();
        buffer.push_str("\u{1780}\u{17D2}\u{179A}\u{17C1}");
        let plan = KhmerShapePlan { pref_mask: 0, blwf_mask: 0, abvf_mask: 0, pstf_mask: 0 };
        for info in buffer.info_mut() {
            let c = categorize(info.codepoint);
            info.set_complex_category(c);
        }
        reorder_syllable(&plan, &mut buffer, 0, 4);
        let cps: Vec<u32> = buffer.info().iter().map(|i| i.codepoint).collect();
        assert_eq!(cps, [0x17C1, 0x17D2, 0x179A, 0x1780]);
    }
}
