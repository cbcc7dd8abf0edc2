//! Script-specific (complex) shapers.

use crate::buffer::Buffer;
use crate::common::{script, Script, Tag};
use crate::font::Font;
use crate::ot::normalize::NormalizeContext;
use crate::plan::{ShapePlan, ShapePlanner};

pub(crate) mod arabic;
pub(crate) mod arabic_table;
pub(crate) mod hangul;
pub(crate) mod hebrew;
pub(crate) mod indic;
pub(crate) mod indic_table;
pub(crate) mod khmer;
pub(crate) mod myanmar;
pub(crate) mod thai;
pub(crate) mod universal;

#[inline]
pub(crate) const fn hb_flag(v: u32) -> u32 {
    1 << v
}

#[inline]
pub(crate) fn hb_flag_unsafe(v: u32) -> u32 {
    if v < 32 {
        1 << v
    } else {
        0
    }
}

/// How the normalizer should prepare text for this shaper.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum ShapeNormalizationMode {
    /// Skip normalization; the shaper's preprocess pass owns the text.
    None,
    /// Decompose everything the font supports decomposed.
    Decomposed,
    /// Recompose diacritics the font can render composed.
    ComposedDiacritics,
    /// Same, but never skip over the base even if unchanged.
    ComposedDiacriticsNoShortCircuit,
    /// Composed unless the buffer carries combining marks that reorder.
    Auto,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum ZeroWidthMarksMode {
    None,
    ByGdefEarly,
    ByGdefLate,
}

/// Per-shaper plan data, created once per shape plan.
pub(crate) enum ShaperData {
    None,
    Arabic(arabic::ArabicShapePlan),
    Indic(indic::IndicShapePlan),
    Khmer(khmer::KhmerShapePlan),
    Universal(universal::UniversalShapePlan),
    Hangul(hangul::HangulShapePlan),
}

/// The hook table a script-specific shaper fills in. Every hook is
/// optional; the default shaper leaves them all empty.
pub(crate) struct ComplexShaper {
    pub collect_features: Option<fn(&mut ShapePlanner)>,
    pub override_features: Option<fn(&mut ShapePlanner)>,
    pub create_data: Option<fn(&ShapePlan) -> ShaperData>,
    pub preprocess_text: Option<fn(&ShapePlan, &Font, &mut Buffer)>,
    pub postprocess_glyphs: Option<fn(&ShapePlan, &Font, &mut Buffer)>,
    pub normalization_mode: ShapeNormalizationMode,
    pub decompose: Option<fn(&NormalizeContext, char) -> Option<(char, char)>>,
    pub compose: Option<fn(&NormalizeContext, char, char) -> Option<char>>,
    pub setup_masks: Option<fn(&ShapePlan, &Font, &mut Buffer)>,
    pub reorder_marks: Option<fn(&ShapePlan, &mut Buffer, usize, usize)>,
    pub zero_width_marks: ZeroWidthMarksMode,
    pub fallback_position: bool,
}

pub(crate) const DEFAULT_SHAPER: ComplexShaper = ComplexShaper {
    collect_features: None,
    override_features: None,
    create_data: None,
    preprocess_text: None,
    postprocess_glyphs: None,
    normalization_mode: ShapeNormalizationMode::Auto,
    decompose: None,
    compose: None,
    setup_masks: None,
    reorder_marks: None,
    zero_width_marks: ZeroWidthMarksMode::ByGdefLate,
    fallback_position: true,
};

/// Picks the complex shaper for a segment.
pub(crate) fn categorize(script: Option<Script>, chosen_gsub_script: Option<Tag>) -> &'static ComplexShaper {
    let Some(script) = script else {
        return &DEFAULT_SHAPER;
    };

    match script {
        // Joining scripts: one machine handles them all.
        script::ARABIC
        | script::SYRIAC
        | script::MONGOLIAN
        | script::NKO
        | script::PHAGS_PA
        | script::MANDAIC
        | script::MANICHAEAN
        | script::PSALTER_PAHLAVI
        | script::ADLAM
        | script::HANIFI_ROHINGYA
        | script::SOGDIAN
        | script::OLD_SOGDIAN
        | script::CHORASMIAN => &arabic::ARABIC_SHAPER,

        script::THAI | script::LAO => &thai::THAI_SHAPER,

        script::HANGUL => &hangul::HANGUL_SHAPER,

        script::HEBREW => &hebrew::HEBREW_SHAPER,

        script::BENGALI
        | script::DEVANAGARI
        | script::GUJARATI
        | script::GURMUKHI
        | script::KANNADA
        | script::MALAYALAM
        | script::ORIYA
        | script::TAMIL
        | script::TELUGU => &indic::INDIC_SHAPER,

        script::KHMER => &khmer::KHMER_SHAPER,

        script::MYANMAR => {
            // Only the new-spec script activates the Myanmar machine; old
            // fonts shape with the generic shaper, as the originals did.
            if chosen_gsub_script == Some(Tag::from_bytes(b"mym2")) {
                &myanmar::MYANMAR_SHAPER
            } else {
                &DEFAULT_SHAPER
            }
        }

        // Scripts shaped by the Universal Shaping Engine.
        script::BALINESE
        | script::BATAK
        | script::BRAHMI
        | script::BUGINESE
        | script::BUHID
        | script::CHAKMA
        | script::CHAM
        | script::GRANTHA
        | script::HANUNOO
        | script::JAVANESE
        | script::KAITHI
        | script::KAYAH_LI
        | script::KHAROSHTHI
        | script::KHOJKI
        | script::KHUDAWADI
        | script::LEPCHA
        | script::LIMBU
        | script::MAHAJANI
        | script::MEETEI_MAYEK
        | script::MODI
        | script::MULTANI
        | script::NEWA
        | script::REJANG
        | script::SAURASHTRA
        | script::SHARADA
        | script::SIDDHAM
        | script::SINHALA
        | script::SUNDANESE
        | script::SYLOTI_NAGRI
        | script::TAGALOG
        | script::TAGBANWA
        | script::TAI_LE
        | script::TAI_THAM
        | script::TAI_VIET
        | script::TAKRI
        | script::TIBETAN
        | script::TIRHUTA => &universal::UNIVERSAL_SHAPER,

        _ => &DEFAULT_SHAPER,
    }
}
