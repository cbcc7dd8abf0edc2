//! The Universal Shaping Engine: a generic cluster model for the many
//! lesser-spread complex scripts (Javanese, Balinese, Tibetan, ...).
//!
//! Classification leans on derivable Unicode properties (viramas are
//! combining class 9, nuktas 7) plus a table of left-positioned vowels;
//! the published USE specification is the authority for the reorder
//! rules.

use crate::buffer::{Buffer, GlyphInfo, Mask};
use crate::font::Font;
use crate::ot::feature;
use crate::ot::map::FeatureFlags;
use crate::plan::{ShapePlan, ShapePlanner};
use crate::unicode::{CharExt, GeneralCategory, GeneralCategoryExt};

use super::{ComplexShaper, ShapeNormalizationMode, ShaperData, ZeroWidthMarksMode, DEFAULT_SHAPER};

pub(crate) const UNIVERSAL_SHAPER: ComplexShaper = ComplexShaper {
    collect_features: Some(collect_features),
    create_data: Some(data_create),
    setup_masks: Some(setup_masks),
    normalization_mode: ShapeNormalizationMode::ComposedDiacriticsNoShortCircuit,
    zero_width_marks: ZeroWidthMarksMode::ByGdefEarly,
    fallback_position: false,
    ..DEFAULT_SHAPER
};

mod cat {
    pub const OTHER: u8 = 0;
    /// Base letter.
    pub const B: u8 = 1;
    /// Halant / virama.
    pub const H: u8 = 2;
    /// Nukta-like modifier.
    pub const N: u8 = 3;
    /// Left-positioned (pre-base) vowel.
    pub const VPRE: u8 = 4;
    /// Any other dependent vowel or mark.
    pub const VM: u8 = 5;
    /// Joiner.
    pub const J: u8 = 6;
    /// Subjoined consonant (Tibetan).
    pub const SUB: u8 = 7;
    /// Number/placeholder base.
    pub const GB: u8 = 8;
}

/// Left-side dependent vowels across the USE scripts. Two-part vowels
/// decompose canonically before this is consulted.
fn is_pre_base_vowel(u: u32) -> bool {
    matches!(
        u,
        0x0DD9                   // Sinhala kombuva
        | 0x1A19                 // Buginese e
        | 0x1A6E..=0x1A72        // Tai Tham e, ae, oo, ai, tall aa
        | 0x1B3E..=0x1B3F        // Balinese taling, taling repa
        | 0x1BA6                 // Sundanese panaelaeng
        | 0x1C27..=0x1C28        // Lepcha e, o
        | 0xA9BA..=0xA9BB        // Javanese taling, dirga mure
    )
}

fn categorize(c: char) -> u8 {
    let u = c as u32;

    if matches!(u, 0x200C | 0x200D) {
        return cat::J;
    }
    if u == 0x25CC {
        return cat::B;
    }

    let ccc = c.combining_class();
    if ccc == 9 {
        return cat::H;
    }
    if ccc == 7 {
        return cat::N;
    }

    // Tibetan subjoined consonants.
    if (0x0F90..=0x0FBC).contains(&u) {
        return cat::SUB;
    }

    if is_pre_base_vowel(u) {
        return cat::VPRE;
    }

    let gc = c.general_category();
    if gc.is_mark() {
        return cat::VM;
    }
    if gc.is_letter() {
        return cat::B;
    }
    if matches!(gc, GeneralCategory::DecimalNumber | GeneralCategory::OtherNumber) {
        return cat::GB;
    }

    cat::OTHER
}

pub(crate) struct UniversalShapePlan {
    rphf_mask: Mask,
}

fn collect_features(planner: &mut ShapePlanner) {
    let map = &mut planner.ot_map;

    map.add_gsub_pause(Some(setup_syllables));

    map.enable_feature(feature::LOCALIZED_FORMS, FeatureFlags::PER_SYLLABLE, 1);
    map.enable_feature(
        feature::GLYPH_COMPOSITION_DECOMPOSITION,
        FeatureFlags::PER_SYLLABLE,
        1,
    );
    map.enable_feature(feature::NUKTA_FORMS, FeatureFlags::PER_SYLLABLE, 1);
    map.enable_feature(feature::AKHAND, FeatureFlags::PER_SYLLABLE, 1);

    map.add_gsub_pause(Some(reorder));

    map.add_feature(
        feature::REPH_FORMS,
        FeatureFlags::MANUAL_JOINERS | FeatureFlags::PER_SYLLABLE,
        1,
    );

    for tag in [
        feature::RAKAR_FORMS,
        feature::ABOVE_BASE_FORMS,
        feature::BELOW_BASE_FORMS,
        feature::HALF_FORMS,
        feature::POST_BASE_FORMS,
        feature::CONJUNCT_FORMS,
    ] {
        map.enable_feature(tag, FeatureFlags::MANUAL_JOINERS | FeatureFlags::PER_SYLLABLE, 1);
    }

    for tag in [
        feature::HALANT_FORMS,
        feature::PRE_BASE_SUBSTITUTIONS,
        feature::ABOVE_BASE_SUBSTITUTIONS,
        feature::BELOW_BASE_SUBSTITUTIONS,
        feature::POST_BASE_SUBSTITUTIONS,
    ] {
        map.enable_feature(tag, FeatureFlags::GLOBAL | FeatureFlags::PER_SYLLABLE, 1);
    }
}

fn data_create(plan: &ShapePlan) -> ShaperData {
    ShaperData::Universal(UniversalShapePlan {
        rphf_mask: plan.ot_map.get_1_mask(feature::REPH_FORMS),
    })
}

fn setup_masks(_plan: &ShapePlan, _font: &Font, buffer: &mut Buffer) {
    for info in buffer.info_mut() {
        let category = categorize(info.as_char());
        info.set_complex_category(category);
    }
}

fn setup_syllables(_plan: &ShapePlan, _font: &Font, buffer: &mut Buffer) {
    // cluster = base (H base | SUB)* (VPre | VM | N | J)*
    let len = buffer.len;
    let mut serial = 1u8;
    let mut i = 0;
    while i < len {
        let end = cluster_end(buffer, i);
        for info in &mut buffer.info_mut()[i..end] {
            info.set_syllable(serial);
        }
        serial = serial.wrapping_add(1).max(1);
        i = end;
    }
}

fn cluster_end(buffer: &Buffer, start: usize) -> usize {
    let len = buffer.len;
    let mut i = start;
    let first = buffer.info[i].complex_category();
    i += 1;
    if !matches!(first, cat::B | cat::GB) {
        return i;
    }

    while i < len {
        match buffer.info[i].complex_category() {
            cat::H => {
                // Halant + base continues the stack; a trailing halant
                // ends the cluster.
                if i + 1 < len && buffer.info[i + 1].complex_category() == cat::B {
                    i += 2;
                } else {
                    i += 1;
                    break;
                }
            }
            cat::SUB | cat::N | cat::VM | cat::VPRE | cat::J => i += 1,
            _ => break,
        }
    }
    i
}

fn reorder(plan: &ShapePlan, _font: &Font, buffer: &mut Buffer) {
    let ShaperData::Universal(use_plan) = &plan.data else {
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
        reorder_cluster(use_plan, buffer, start, end);
        start = end;
    }
}

fn reorder_cluster(plan: &UniversalShapePlan, buffer: &mut Buffer, start: usize, end: usize) {
    // Initial base+halant pair forms a repha when the font implements
    // rphf; flag it so the feature can fire.
    if plan.rphf_mask != 0
        && end - start > 2
        && buffer.info[start].complex_category() == cat::B
        && buffer.info[start + 1].complex_category() == cat::H
    {
        buffer.info[start].mask |= plan.rphf_mask;
        buffer.info[start + 1].mask |= plan.rphf_mask;
    }

    // Rearrange: pre-base vowels move to the front of the cluster.
    let mut k = start;
    while k < end {
        if buffer.info[k].complex_category() == cat::VPRE {
            let moved: GlyphInfo = buffer.info[k];
            buffer.info.copy_within(start..k, start + 1);
            buffer.info[start] = moved;
            buffer.merge_clusters(start, k + 1);
            break;
        }
        k += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sinhala_kombuva_reorders() {
        // Sinhala KA + KOMBUVA (E vowel): visual order vowel first.
        let mut buffer = Buffer::new();
        buffer.push_str("\u{0D9A}\u{0DD9}");
        for info in buffer.info_mut() {
            let c = categorize(info.as_char());
            info.set_complex_category(c);
        }
        let plan = UniversalShapePlan { rphf_mask: 0 };
        reorder_cluster(&plan, &mut buffer, 0, 2);
        let cps: Vec<u32> = buffer.info().iter().map(|i| i.codepoint).collect();
        assert_eq!(cps, [0x0DD9, 0x0D9A]);
    }

    #[test]
    fn tibetan_subjoined_is_part_of_cluster() {
        let mut buffer = Buffer::new();
        // Tibetan KA + subjoined YA + vowel u.
        buffer.push_str("\u{0F40}\u{0FB1}\u{0F74}");
        for info in buffer.info_mut() {
            let c = categorize(info.as_char());
            info.set_complex_category(c);
        }
        assert_eq!(cluster_end(&buffer, 0), 3);
    }
}
