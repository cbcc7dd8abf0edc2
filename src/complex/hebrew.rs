//! Hebrew: standard shaping plus presentation-form composition for fonts
//! without mark positioning.

use crate::ot::normalize::NormalizeContext;

use super::{ComplexShaper, ShapeNormalizationMode, ZeroWidthMarksMode, DEFAULT_SHAPER};

pub(crate) const HEBREW_SHAPER: ComplexShaper = ComplexShaper {
    compose: Some(compose),
    normalization_mode: ShapeNormalizationMode::Auto,
    zero_width_marks: ZeroWidthMarksMode::ByGdefLate,
    fallback_position: true,
    ..DEFAULT_SHAPER
};

fn compose(ctx: &NormalizeContext, a: char, b: char) -> Option<char> {
    // Standard Unicode composition first.
    if let Some(ab) = ctx.unicode.compose(a, b) {
        return Some(ab);
    }

    // Hebrew presentation forms are excluded from standard normalization
    // but wanted for shaping when the font cannot position marks itself.
    if ctx.plan.has_gpos_mark {
        return None;
    }

    let composed = match b {
        '\u{05B4}' => match a {
            // HIRIQ
            '\u{05D9}' => 0xFB1D, // YOD
            _ => 0,
        },
        '\u{05B7}' => match a {
            // PATAH
            '\u{05F2}' => 0xFB1F, // YIDDISH YOD YOD
            '\u{05D0}' => 0xFB2E, // ALEF
            _ => 0,
        },
        '\u{05B8}' => match a {
            // QAMATS
            '\u{05D0}' => 0xFB2F,
            _ => 0,
        },
        '\u{05B9}' => match a {
            // HOLAM
            '\u{05D5}' => 0xFB4B, // VAV
            _ => 0,
        },
        '\u{05BC}' => match a {
            // DAGESH
            '\u{05D0}'..='\u{05EA}' => 0xFB30 + (a as u32 - 0x05D0),
            '\u{FB2A}' => 0xFB2C,
            '\u{FB2B}' => 0xFB2D,
            _ => 0,
        },
        '\u{05BF}' => match a {
            // RAFE
            '\u{05D1}' => 0xFB4C, // BET
            '\u{05DB}' => 0xFB4D, // KAF
            '\u{05E4}' => 0xFB4E, // PE
            _ => 0,
        },
        '\u{05C1}' => match a {
            // SHIN DOT
            '\u{05E9}' => 0xFB2A,
            '\u{FB49}' => 0xFB2C,
            _ => 0,
        },
        '\u{05C2}' => match a {
            // SIN DOT
            '\u{05E9}' => 0xFB2B,
            '\u{FB49}' => 0xFB2D,
            _ => 0,
        },
        _ => 0,
    };

    char::from_u32(composed).filter(|_| composed != 0)
}
