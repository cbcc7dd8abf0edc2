//! Myanmar (new-spec `mym2`): kinzi, medial consonants and the pre-base
//! vowel E.

use crate::buffer::{Buffer, GlyphInfo} ;
use crate::font::Font;
use crate::ot::feature;
use crate::ot::map::FeatureFlags;
use crate::plan::{ShapePlan, ShapePlanner};

use super::{ComplexShaper, ShapeNormalizationMode, ZeroWidthMarksMode, DEFAULT_SHAPER};

pub(crate) const MYANMAR_SHAPER: ComplexShaper = ComplexShaper {
    collect_features: Some(collect_features),
    setup_masks: Some(setup_masks),
    normalization_mode: ShapeNormalizationMode::ComposedDiacriticsNoShortCircuit,
    zero_width_marks: ZeroWidthMarksMode::ByGdefEarly,
    fallback_position: false,
    ..DEFAULT_SHAPER
};

const ASAT: u32 = 0x103A;
const STACKER: u32 = 0x1039;
const MEDIAL_RA: u32 = 0x103C;
const VOWEL_E: u32 = 0x1031;
const NGA: u32 = 0x1004;

fn is_consonant(u: u32) -> bool {
    matches!(u, 0x1000..=0x1020 | 0x103F | 0x104E | 0x25CC)
}

fn is_medial(u: u32) -> bool {
    matches!(u, 0x103B..=0x103E | 0x105E..=0x1060 | 0x1082)
}

fn is_vowel_or_sign(u: u32) -> bool {
    matches!(
        u,
        0x102B..=0x1038 | 0x103A | 0x1056..=0x1059 | 0x1062..=0x1064 | 0x1067..=0x106D
            | 0x1071..=0x1074 | 0x1083..=0x108D | 0x108F | 0x109A..=0x109D
    )
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
        feature::REPH_FORMS, // kinzi rides the reph feature in mym2 fonts
        feature::PRE_BASE_FORMS,
        feature::BELOW_BASE_FORMS,
        feature::POST_BASE_FORMS,
    ] {
        map.enable_feature(tag, FeatureFlags::MANUAL_JOINERS | FeatureFlags::PER_SYLLABLE, 1);
        map.add_gsub_pause(None);
    }

    for tag in [
        feature::PRE_BASE_SUBSTITUTIONS,
        feature::ABOVE_BASE_SUBSTITUTIONS,
        feature::BELOW_BASE_SUBSTITUTIONS,
        feature::POST_BASE_SUBSTITUTIONS,
    ] {
        map.enable_feature(tag, FeatureFlags::MANUAL_JOINERS | FeatureFlags::PER_SYLLABLE, 1);
    }
}

fn setup_masks(_plan: &ShapePlan, _font: &Font, buffer: &mut Buffer) {
    // Syllable serials; the reorder pause does the actual work.
    let len = buffer.len;
    let mut serial = 1u8;
    let mut i = 0;
    while i < len {
        let end = syllable_end(buffer, i);
        for info in &mut buffer.info_mut()[i..end] {
            info.set_syllable(serial);
        }
        serial = serial.wrapping_add(1).max(1);
        i = end;
    }
}

fn syllable_end(buffer: &Buffer, start: usize) -> usize {
    let len = buffer.len;
    let mut i = start;
    let u = buffer.info[i].codepoint;
    i += 1;
    if !is_consonant(u) {
        return i;
    }

    // kinzi: NGA + asat + stacker prefixes the next consonant.
    while i < len {
        let u = buffer.info[i].codepoint;
        if u == STACKER {
            if i + 1 < len && is_consonant(buffer.info[i + 1].codepoint) {
                i += 2;
                continue;
            }
            i += 1;
            break;
        }
        if is_medial(u) || is_vowel_or_sign(u) || matches!(u, 0x200C | 0x200D) {
            i += 1;
            continue;
        }
        break;
    }
    i
}

fn reorder(_plan: &ShapePlan, _font: &Font, buffer: &mut Buffer) {
    let len = buffer.len;
    let mut start = 0;
    while start < len {
        let syllable = buffer.info[start].syllable();
        let mut end = start + 1;
        while end < len && buffer.info[end].syllable() == syllable {
            end += 1;
        }
        reorder_syllable(buffer, start, end);
        start = end;
    }
}

fn reorder_syllable(buffer: &mut Buffer, start: usize, end: usize) {
    let mut base = start;

    // Kinzi: NGA + ASAT + STACKER at syllable start belongs after the
    // real base; skip it while locating the base.
    let mut i = start;
    if i + 2 < end
        && buffer.info[i].codepoint == NGA
        && buffer.info[i + 1].codepoint == ASAT
        && buffer.info[i + 2].codepoint == STACKER
    {
        i += 3;
    }
    if i < end && is_consonant(buffer.info[i].codepoint) {
        base = i;
    }

    // The pre-base vowel E and the medial Ra render before the whole
    // cluster; move them, E leftmost.
    let mut moved_front = start;
    for k in (base..end).rev() {
        if buffer.info[k].codepoint == MEDIAL_RA {
            move_to_front(buffer, k, moved_front);
            moved_front += 1;
            break;
        }
    }
    for k in (moved_front..end).rev() {
        if buffer.info[k].codepoint == VOWEL_E {
            move_to_front(buffer, k, start);
            break;
        }
    }

    if moved_front != start {
        buffer.merge_clusters(start, end);
    }
}

fn move_to_front(buffer: &mut Buffer, from: usize, dest: usize) {
    if dest >= from {
        return;
    }
    let moved: GlyphInfo = buffer.info[from];
    buffer.info.copy_within(dest..from, dest + 1);
    buffer.info[dest] = moved;
    buffer.merge_clusters(dest, from + 1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vowel_e_moves_before_base() {
        // KA + E: visual order E, KA.
        let mut buffer = Buffer::new();
        buffer.push_str("\u{1000}\u{1031}");
        reorder_syllable(&mut buffer, 0, 2);
        let cps: Vec<u32> = buffer.info().iter().map(|i| i.codepoint).collect();
        assert_eq!(cps, [0x1031, 0x1000]);
    }

    #[test]
    fn medial_ra_precedes_base_after_vowel_e() {
        // KA + MEDIAL RA + E: visual order E, RA, KA.
        let mut buffer = Buffer::new();
        buffer.push_str("\u{1000}\u{103C}\u{1031}");
        reorder_syllable(&mut buffer, 0, 3);
        let cps: Vec<u32> = buffer.info().iter().map(|i| i.codepoint).collect();
        assert_eq!(cps, [0x1031, 0x103C, 0x1000]);
    }
}
