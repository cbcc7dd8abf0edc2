//! Character classification for the Indic shaper.
//!
//! Categories are derived from Unicode properties where they are reliable
//! (viramas carry combining class 9, nuktas class 7) and from per-block
//! data where they are not (matra positions, consonant ranges).

use crate::common::Script;
use crate::unicode::{CharExt, GeneralCategory, GeneralCategoryExt};

/// Syllabic categories, stored in the complex-category scratch byte.
pub(crate) mod category {
    pub const X: u8 = 0;
    pub const C: u8 = 1; // consonant
    pub const V: u8 = 2; // independent vowel
    pub const N: u8 = 3; // nukta
    pub const H: u8 = 4; // virama
    pub const ZWNJ: u8 = 5;
    pub const ZWJ: u8 = 6;
    pub const M: u8 = 7; // dependent vowel (matra)
    pub const SM: u8 = 8; // syllable modifier
    pub const A: u8 = 10; // vedic accent
    pub const PLACEHOLDER: u8 = 11;
    pub const DOTTED_CIRCLE: u8 = 12;
    pub const RS: u8 = 13; // register shifter (Khmer)
    pub const REPHA: u8 = 15; // atomic repha
    pub const RA: u8 = 16;
    pub const CM: u8 = 17; // consonant medial
    pub const SYMBOL: u8 = 18;
    pub const CS: u8 = 19; // consonant with stacker
}

/// Positions within a syllable, stored in the complex-aux scratch byte.
/// The ordering is what the reordering sort relies on.
pub(crate) mod position {
    pub const RA_TO_BECOME_REPH: u8 = 1;
    pub const PRE_M: u8 = 2;
    pub const PRE_C: u8 = 3;
    pub const BASE_C: u8 = 4;
    pub const AFTER_MAIN: u8 = 5;
    pub const ABOVE_C: u8 = 6;
    pub const BELOW_C: u8 = 8;
    pub const AFTER_SUB: u8 = 9;
    pub const POST_C: u8 = 11;
    pub const AFTER_POST: u8 = 12;
    pub const SMVD: u8 = 14;
    pub const END: u8 = 15;
}

/// The Ra of each Indic script; Ra starts reph formation.
pub(crate) fn is_ra(u: u32) -> bool {
    matches!(
        u,
        0x0930 | // Devanagari
        0x09B0 | // Bengali
        0x09F0 | // Bengali Ra with middle diagonal
        0x0A30 | // Gurmukhi
        0x0AB0 | // Gujarati
        0x0B30 | // Oriya
        0x0BB0 | // Tamil
        0x0C30 | // Telugu
        0x0CB0 | // Kannada
        0x0D30   // Malayalam
    )
}

/// Pre-base (left-side) matras. Two-part matras decompose canonically
/// before this is consulted, so only the simple left matras are listed.
fn is_pre_base_matra(u: u32) -> bool {
    matches!(
        u,
        0x093F          // Devanagari I
        | 0x094E        // Devanagari prishthamatra E
        | 0x09BF        // Bengali I
        | 0x09C7 | 0x09C8 // Bengali E, AI
        | 0x0A3F        // Gurmukhi I
        | 0x0ABF        // Gujarati I
        | 0x0B47        // Oriya E
        | 0x0BC6..=0x0BC8 // Tamil E, EE, AI
        | 0x0D46..=0x0D48 // Malayalam E, EE, AI
    )
}

/// Below-base matras, used for base determination and mask assignment.
fn is_below_base_matra(u: u32) -> bool {
    matches!(
        u,
        0x0941..=0x0944 | 0x0962 | 0x0963            // Devanagari
        | 0x09C1..=0x09C4 | 0x09E2 | 0x09E3          // Bengali
        | 0x0A41 | 0x0A42                            // Gurmukhi U, UU
        | 0x0AC1..=0x0AC4 | 0x0AE2 | 0x0AE3          // Gujarati
        | 0x0B41..=0x0B44 | 0x0B62 | 0x0B63          // Oriya
        | 0x0C62 | 0x0C63                            // Telugu
        | 0x0CC4 | 0x0CE2 | 0x0CE3                   // Kannada
        | 0x0D43 | 0x0D44 | 0x0D62 | 0x0D63          // Malayalam
    )
}

/// Consonant medials (Gurmukhi yakash etc. fall back to CM).
fn is_consonant_medial(u: u32) -> bool {
    matches!(u, 0x0A75 | 0x0A71)
}

fn block_offset(u: u32) -> u32 {
    u & 0x7F
}

fn in_indic_block(u: u32) -> bool {
    (0x0900..=0x0D7F).contains(&u)
}

/// Classifies one character for a given script run.
pub(crate) fn categorize(_script: Option<Script>, c: char) -> (u8, u8) {
    use category as cat;
    use position as pos;

    let u = c as u32;

    match u {
        0x200C => return (cat::ZWNJ, pos::END),
        0x200D => return (cat::ZWJ, pos::END),
        0x25CC => return (cat::DOTTED_CIRCLE, pos::BASE_C),
        0x00A0 | 0x00D7 | 0x2012..=0x2015 | 0x2022 | 0x0964 | 0x0965 => {
            return (cat::PLACEHOLDER, pos::BASE_C)
        }
        _ => {}
    }

    if !in_indic_block(u) {
        return (cat::X, pos::END);
    }

    let gc = c.general_category();
    let ccc = c.combining_class();

    // Viramas are combining class 9, nuktas class 7, across every block.
    if ccc == 9 {
        return (cat::H, pos::BASE_C);
    }
    if ccc == 7 {
        return (cat::N, pos::BASE_C);
    }

    if is_consonant_medial(u) {
        return (cat::CM, pos::AFTER_MAIN);
    }

    let off = block_offset(u);

    // Syllable modifiers: candrabindu, anusvara, visarga occupy the head
    // of every block; vedic signs follow OM.
    if gc.is_mark() && (off <= 0x03 || (0x51..=0x54).contains(&off)) {
        let category = if (0x51..=0x54).contains(&off) { cat::A } else { cat::SM };
        return (category, pos::SMVD);
    }

    // Dependent vowels.
    if matches!(gc, GeneralCategory::NonspacingMark | GeneralCategory::SpacingMark) {
        let position = if is_pre_base_matra(u) {
            pos::PRE_M
        } else if is_below_base_matra(u) {
            pos::BELOW_C
        } else if ccc == 230 {
            pos::ABOVE_C
        } else {
            pos::POST_C
        };
        return (cat::M, position);
    }

    if gc.is_letter() {
        // Independent vowels sit at 0x04..=0x14 and 0x60..=0x61;
        // avagraha at 0x3D; everything else lettered is a consonant.
        if (0x04..=0x14).contains(&off) || matches!(off, 0x60 | 0x61) {
            return (cat::V, pos::BASE_C);
        }
        if off == 0x3D || off == 0x50 {
            return (cat::SYMBOL, pos::BASE_C);
        }
        if is_ra(u) {
            return (cat::RA, pos::BASE_C);
        }
        return (cat::C, pos::BASE_C);
    }

    (cat::X, pos::END)
}
