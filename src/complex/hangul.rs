//! Hangul: jamo composition/decomposition against font coverage, plus
//! the ljmo/vjmo/tjmo feature assignment.

use crate::buffer::{Buffer, Mask};
use crate::font::Font;
use crate::ot::feature;
use crate::ot::map::FeatureFlags;
use crate::plan::{ShapePlan, ShapePlanner};
use crate::unicode::GeneralCategory;

use super::{ComplexShaper, ShapeNormalizationMode, ShaperData, ZeroWidthMarksMode, DEFAULT_SHAPER};

pub(crate) const HANGUL_SHAPER: ComplexShaper = ComplexShaper {
    collect_features: Some(collect_features),
    override_features: Some(override_features),
    create_data: Some(data_create),
    preprocess_text: Some(preprocess_text),
    setup_masks: Some(setup_masks),
    normalization_mode: ShapeNormalizationMode::None,
    zero_width_marks: ZeroWidthMarksMode::None,
    fallback_position: false,
    ..DEFAULT_SHAPER
};

const L_BASE: u32 = 0x1100;
const V_BASE: u32 = 0x1161;
const T_BASE: u32 = 0x11A7;
const L_COUNT: u32 = 19;
const V_COUNT: u32 = 21;
const T_COUNT: u32 = 28;
const S_BASE: u32 = 0xAC00;
const S_COUNT: u32 = L_COUNT * V_COUNT * T_COUNT;
const N_COUNT: u32 = V_COUNT * T_COUNT;

fn is_combining_l(u: u32) -> bool {
    (L_BASE..L_BASE + L_COUNT).contains(&u)
}
fn is_combining_v(u: u32) -> bool {
    (V_BASE..V_BASE + V_COUNT).contains(&u)
}
fn is_combining_t(u: u32) -> bool {
    (T_BASE + 1..T_BASE + T_COUNT).contains(&u)
}
fn is_combined_s(u: u32) -> bool {
    (S_BASE..S_BASE + S_COUNT).contains(&u)
}

fn is_l(u: u32) -> bool {
    is_combining_l(u) || (0xA960..=0xA97C).contains(&u)
}
fn is_v(u: u32) -> bool {
    is_combining_v(u) || (0xD7B0..=0xD7C6).contains(&u)
}
fn is_t(u: u32) -> bool {
    is_combining_t(u) || (0xD7CB..=0xD7FB).contains(&u)
}

fn is_hangul_tone(u: u32) -> bool {
    (0x302E..=0x302F).contains(&u)
}

// Jamo classes stashed in the complex-category scratch.
const NONE: u8 = 0;
const LJMO: u8 = 1;
const VJMO: u8 = 2;
const TJMO: u8 = 3;

pub(crate) struct HangulShapePlan {
    mask_array: [Mask; 4],
}

fn collect_features(planner: &mut ShapePlanner) {
    planner.ot_map.add_feature(feature::LEADING_JAMO_FORMS, FeatureFlags::NONE, 1);
    planner.ot_map.add_feature(feature::VOWEL_JAMO_FORMS, FeatureFlags::NONE, 1);
    planner.ot_map.add_feature(feature::TRAILING_JAMO_FORMS, FeatureFlags::NONE, 1);
}

fn override_features(planner: &mut ShapePlanner) {
    // Uniscribe does not apply calt for Hangul, and certain fonts have
    // broken calt productions.
    planner.ot_map.disable_feature(crate::Tag::from_bytes(b"calt"));
}

fn data_create(plan: &ShapePlan) -> ShaperData {
    ShaperData::Hangul(HangulShapePlan {
        mask_array: [
            0,
            plan.ot_map.get_1_mask(feature::LEADING_JAMO_FORMS),
            plan.ot_map.get_1_mask(feature::VOWEL_JAMO_FORMS),
            plan.ot_map.get_1_mask(feature::TRAILING_JAMO_FORMS),
        ],
    })
}

fn preprocess_text(_plan: &ShapePlan, font: &Font, buffer: &mut Buffer) {
    // Compose jamo runs into precomposed syllables the font covers, and
    // decompose precomposed syllables it does not.

    let count = buffer.len;
    buffer.clear_output();
    while buffer.idx < count && buffer.successful {
        let u = buffer.cur(0).codepoint;

        if is_hangul_tone(u) {
            // A tone mark must follow a syllable; keep it and mark it as a
            // non-spacing mark so zeroing treats it right.
            buffer.cur_mut(0).set_general_category(GeneralCategory::NonspacingMark);
            buffer.next_glyph();
            continue;
        }

        let start = buffer.out_len;

        if is_combined_s(u) {
            // Decompose if the font has no glyph for the syllable.
            if font.has_glyph(char::from_u32(u).unwrap_or('\u{FFFD}')) {
                buffer.next_glyph();
                continue;
            }

            let s_index = u - S_BASE;
            let l = L_BASE + s_index / N_COUNT;
            let v = V_BASE + (s_index % N_COUNT) / T_COUNT;
            let t = T_BASE + s_index % T_COUNT;

            let has_jamo = |g: u32| {
                char::from_u32(g).map_or(false, |c| font.has_glyph(c))
            };
            if has_jamo(l) && has_jamo(v) && (t == T_BASE || has_jamo(t)) {
                buffer.output_glyph(l);
                set_jamo(buffer, LJMO);
                buffer.output_glyph(v);
                set_jamo(buffer, VJMO);
                if t != T_BASE {
                    buffer.output_glyph(t);
                    set_jamo(buffer, TJMO);
                }
                buffer.skip_glyph();
                buffer.merge_out_clusters(start, buffer.out_len);
                continue;
            }

            // Neither form is renderable; keep the original.
            buffer.next_glyph();
            continue;
        }

        if is_l(u) && buffer.idx + 1 < count {
            let v = buffer.cur(1).codepoint;
            if is_combining_l(u) && is_combining_v(v) {
                // Maybe compose LV or LVT.
                let mut t = 0;
                if buffer.idx + 2 < count {
                    let t2 = buffer.cur(2).codepoint;
                    if is_combining_t(t2) {
                        t = t2;
                    }
                }

                let s = S_BASE
                    + (u - L_BASE) * N_COUNT
                    + (v - V_BASE) * T_COUNT
                    + if t != 0 { t - T_BASE } else { 0 };
                if let Some(sc) = char::from_u32(s) {
                    if font.has_glyph(sc) {
                        let n_in = if t != 0 { 3 } else { 2 };
                        buffer.replace_glyphs(n_in, &[s]);
                        continue;
                    }
                }
            }
        }

        // A lone jamo: tag it for the jamo features.
        let jamo = if is_l(u) {
            LJMO
        } else if is_v(u) {
            VJMO
        } else if is_t(u) {
            TJMO
        } else {
            NONE
        };
        buffer.cur_mut(0).set_complex_category(jamo);
        buffer.next_glyph();
    }
    buffer.sync();
}

fn set_jamo(buffer: &mut Buffer, jamo: u8) {
    let i = buffer.out_len - 1;
    buffer.out_info_mut()[i].set_complex_category(jamo);
}

fn setup_masks(plan: &ShapePlan, _font: &Font, buffer: &mut Buffer) {
    let ShaperData::Hangul(hangul_plan) = &plan.data else {
        return;
    };

    for info in buffer.info_mut() {
        let jamo = info.complex_category().min(3);
        info.mask |= hangul_plan.mask_array[usize::from(jamo)];
    }
}
