//! OpenType layout: table views and the shaper that drives them.

pub(crate) mod apply;
pub(crate) mod context;
pub(crate) mod fallback;
pub(crate) mod gdef;
pub(crate) mod gpos;
pub(crate) mod gsub;
pub(crate) mod layout;
pub(crate) mod map;
pub(crate) mod normalize;
pub(crate) mod shape;
pub(crate) mod var;
pub(crate) mod varc;

/// Per-glyph properties derived from GDEF, with substitution markers.
/// Stored in the low 16 bits of `GlyphInfo::var1`; the mark attachment
/// class rides in the high byte.
pub(crate) mod glyph_props {
    pub const BASE: u16 = 0x02;
    pub const LIGATURE: u16 = 0x04;
    pub const MARK: u16 = 0x08;
    pub const CLASS_MASK: u16 = BASE | LIGATURE | MARK;

    pub const SUBSTITUTED: u16 = 0x10;
    pub const LIGATED: u16 = 0x20;
    pub const MULTIPLIED: u16 = 0x40;
    pub const PRESERVE: u16 = SUBSTITUTED | LIGATED | MULTIPLIED;
}

/// Common feature tags referenced by the planner and the complex shapers.
pub(crate) mod feature {
    use crate::common::Tag;

    pub const ABOVE_BASE_FORMS: Tag = Tag::from_bytes(b"abvf");
    pub const ABOVE_BASE_MARK_POSITIONING: Tag = Tag::from_bytes(b"abvm");
    pub const ABOVE_BASE_SUBSTITUTIONS: Tag = Tag::from_bytes(b"abvs");
    pub const AKHAND: Tag = Tag::from_bytes(b"akhn");
    pub const BELOW_BASE_FORMS: Tag = Tag::from_bytes(b"blwf");
    pub const BELOW_BASE_MARK_POSITIONING: Tag = Tag::from_bytes(b"blwm");
    pub const BELOW_BASE_SUBSTITUTIONS: Tag = Tag::from_bytes(b"blws");
    pub const CONJUNCT_FORMS: Tag = Tag::from_bytes(b"cjct");
    pub const CONTEXTUAL_ALTERNATES: Tag = Tag::from_bytes(b"calt");
    pub const CONTEXTUAL_LIGATURES: Tag = Tag::from_bytes(b"clig");
    pub const CURSIVE_POSITIONING: Tag = Tag::from_bytes(b"curs");
    pub const DISTANCES: Tag = Tag::from_bytes(b"dist");
    pub const FRACTIONS: Tag = Tag::from_bytes(b"frac");
    pub const GLYPH_COMPOSITION_DECOMPOSITION: Tag = Tag::from_bytes(b"ccmp");
    pub const HALANT_FORMS: Tag = Tag::from_bytes(b"haln");
    pub const HALF_FORMS: Tag = Tag::from_bytes(b"half");
    pub const INITIAL_FORMS: Tag = Tag::from_bytes(b"init");
    pub const ISOLATED_FORMS: Tag = Tag::from_bytes(b"isol");
    pub const KERNING: Tag = Tag::from_bytes(b"kern");
    pub const LEADING_JAMO_FORMS: Tag = Tag::from_bytes(b"ljmo");
    pub const LOCALIZED_FORMS: Tag = Tag::from_bytes(b"locl");
    pub const MARK_POSITIONING: Tag = Tag::from_bytes(b"mark");
    pub const MARK_POSITIONING_VIA_SUBSTITUTION: Tag = Tag::from_bytes(b"mset");
    pub const MARK_TO_MARK_POSITIONING: Tag = Tag::from_bytes(b"mkmk");
    pub const MEDIAL_FORMS_1: Tag = Tag::from_bytes(b"medi");
    pub const MEDIAL_FORMS_2: Tag = Tag::from_bytes(b"med2");
    pub const NUKTA_FORMS: Tag = Tag::from_bytes(b"nukt");
    pub const NUMERATORS: Tag = Tag::from_bytes(b"numr");
    pub const DENOMINATORS: Tag = Tag::from_bytes(b"dnom");
    pub const PRE_BASE_FORMS: Tag = Tag::from_bytes(b"pref");
    pub const PRE_BASE_SUBSTITUTIONS: Tag = Tag::from_bytes(b"pres");
    pub const POST_BASE_FORMS: Tag = Tag::from_bytes(b"pstf");
    pub const POST_BASE_SUBSTITUTIONS: Tag = Tag::from_bytes(b"psts");
    pub const RAKAR_FORMS: Tag = Tag::from_bytes(b"rkrf");
    pub const REPH_FORMS: Tag = Tag::from_bytes(b"rphf");
    pub const REQUIRED_CONTEXTUAL_ALTERNATES: Tag = Tag::from_bytes(b"rclt");
    pub const REQUIRED_LIGATURES: Tag = Tag::from_bytes(b"rlig");
    pub const STANDARD_LIGATURES: Tag = Tag::from_bytes(b"liga");
    pub const STRETCHING_GLYPH_DECOMPOSITION: Tag = Tag::from_bytes(b"stch");
    pub const TERMINAL_FORMS_1: Tag = Tag::from_bytes(b"fina");
    pub const TERMINAL_FORMS_2: Tag = Tag::from_bytes(b"fin2");
    pub const TERMINAL_FORMS_3: Tag = Tag::from_bytes(b"fin3");
    pub const TRAILING_JAMO_FORMS: Tag = Tag::from_bytes(b"tjmo");
    pub const VOWEL_JAMO_FORMS: Tag = Tag::from_bytes(b"vjmo");
    pub const RIGHT_TO_LEFT_ALTERNATES: Tag = Tag::from_bytes(b"rtla");
    pub const RIGHT_TO_LEFT_MIRRORED_FORMS: Tag = Tag::from_bytes(b"rtlm");
    pub const LEFT_TO_RIGHT_ALTERNATES: Tag = Tag::from_bytes(b"ltra");
    pub const LEFT_TO_RIGHT_MIRRORED_FORMS: Tag = Tag::from_bytes(b"ltrm");
    pub const VERTICAL_WRITING: Tag = Tag::from_bytes(b"vert");
}
