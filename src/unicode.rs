//! Unicode property access.
//!
//! Shaping consults a pluggable [`UnicodeFuncs`] provider; the built-in one
//! answers from the unicode-* crates. Complex shapers additionally use the
//! crate-internal tables below (modified combining classes, default
//! ignorables, space fallbacks) which are not provider-overridable, matching
//! the behavior of the original engine.

use crate::common::{script, Script, Tag};

pub use unicode_general_category::GeneralCategory;

/// Pluggable Unicode property provider.
pub trait UnicodeFuncs {
    fn general_category(&self, c: char) -> GeneralCategory;

    /// Canonical combining class, 0..=254.
    fn combining_class(&self, c: char) -> u8;

    /// The bidi-mirrored counterpart, if any.
    fn mirroring(&self, c: char) -> Option<char>;

    fn script(&self, c: char) -> Script;

    /// Canonical composition.
    fn compose(&self, a: char, b: char) -> Option<char>;

    /// Single-step canonical decomposition. The second character is `'\0'`
    /// for singleton decompositions.
    fn decompose(&self, c: char) -> Option<(char, char)>;
}

/// The built-in provider.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuiltinUnicodeFuncs;

impl UnicodeFuncs for BuiltinUnicodeFuncs {
    fn general_category(&self, c: char) -> GeneralCategory {
        unicode_general_category::get_general_category(c)
    }

    fn combining_class(&self, c: char) -> u8 {
        unicode_normalization::char::canonical_combining_class(c)
    }

    fn mirroring(&self, c: char) -> Option<char> {
        unicode_bidi_mirroring::get_mirrored(c)
    }

    fn script(&self, c: char) -> Script {
        use unicode_script::UnicodeScript;
        let s = UnicodeScript::script(&c);
        match s {
            unicode_script::Script::Common => script::COMMON,
            unicode_script::Script::Inherited => script::INHERITED,
            unicode_script::Script::Unknown => script::UNKNOWN,
            _ => Script::from_iso15924_tag(Tag::from_bytes_lossy(s.short_name().as_bytes()))
                .unwrap_or(script::UNKNOWN),
        }
    }

    fn compose(&self, a: char, b: char) -> Option<char> {
        unicode_normalization::char::compose(a, b)
    }

    fn decompose(&self, c: char) -> Option<(char, char)> {
        let mut full = smallvec::SmallVec::<[char; 4]>::new();
        unicode_normalization::char::decompose_canonical(c, |x| full.push(x));

        match full.as_slice() {
            [] => None,
            [single] => {
                if *single == c {
                    None
                } else {
                    Some((*single, '\0'))
                }
            }
            [a, b] => Some((*a, *b)),
            _ => {
                // Fold the fully recursive expansion back into the one-step
                // pair (intermediate, last).
                let last = *full.last().unwrap();
                let mut a = full[0];
                for x in &full[1..full.len() - 1] {
                    a = self.compose(a, *x)?;
                }
                Some((a, last))
            }
        }
    }
}

pub(crate) static BUILTIN_UNICODE_FUNCS: BuiltinUnicodeFuncs = BuiltinUnicodeFuncs;

/// The combining-class renumbering applied before mark reordering, so that
/// sequences sort into the order fonts expect (Hebrew points, Arabic vowel
/// marks, Thai/Lao and Tibetan vowel signs).
#[rustfmt::skip]
const MODIFIED_COMBINING_CLASS: [u8; 256] = {
    let mut t = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        t[i] = i as u8;
        i += 1;
    }

    // Hebrew
    t[10] = 22; // sheva
    t[11] = 15; // hataf segol
    t[12] = 16; // hataf patah
    t[13] = 17; // hataf qamats
    t[14] = 23; // hiriq
    t[15] = 18; // tsere
    t[16] = 19; // segol
    t[17] = 20; // patah
    t[18] = 21; // qamats
    t[19] = 14; // holam
    t[20] = 24; // qubuts
    t[21] = 12; // dagesh
    t[22] = 25; // meteg
    t[23] = 13; // rafe
    t[24] = 10; // shin dot
    t[25] = 11; // sin dot

    // Arabic
    t[27] = 28; // fathatan
    t[28] = 29; // dammatan
    t[29] = 30; // kasratan
    t[30] = 31; // fatha
    t[31] = 32; // damma
    t[32] = 33; // kasra
    t[33] = 27; // shadda
    t[34] = 34; // sukun
    t[35] = 35; // superscript alef

    // Telugu length marks
    t[84] = 88;
    t[91] = 91;

    // Thai sara u / sara uu go below everything else
    t[103] = 3;

    // Tibetan
    t[130] = 132;
    t[132] = 131;

    t
};

pub(crate) mod modified_combining_class {
    pub const CCC10: u8 = 22;
    pub const CCC11: u8 = 15;
    pub const CCC12: u8 = 16;
    pub const CCC13: u8 = 17;
    pub const CCC14: u8 = 23;
    pub const CCC15: u8 = 18;
    pub const CCC16: u8 = 19;
    pub const CCC17: u8 = 20;
    pub const CCC18: u8 = 21;
    pub const CCC19: u8 = 14;
    pub const CCC20: u8 = 24;
    pub const CCC21: u8 = 12;
    pub const CCC22: u8 = 25;
    pub const CCC23: u8 = 13;
    pub const CCC24: u8 = 10;
    pub const CCC25: u8 = 11;
    pub const CCC26: u8 = 26;
    pub const CCC27: u8 = 28;
    pub const CCC28: u8 = 29;
    pub const CCC29: u8 = 30;
    pub const CCC30: u8 = 31;
    pub const CCC31: u8 = 32;
    pub const CCC32: u8 = 33;
    pub const CCC33: u8 = 27;
    pub const CCC34: u8 = 34;
    pub const CCC35: u8 = 35;
}

pub(crate) fn modified_combining_class_of(ccc: u8) -> u8 {
    MODIFIED_COMBINING_CLASS[usize::from(ccc)]
}

/// Space widths used when substituting invisible characters.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Space {
    NotSpace,
    EmSpace(u8),
    Em4Per18,
    Regular,
    Figure,
    Punctuation,
    Narrow,
}

impl Space {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Space::NotSpace => 0,
            Space::EmSpace(n) => n.clamp(1, 16),
            Space::Em4Per18 => 17,
            Space::Regular => 18,
            Space::Figure => 19,
            Space::Punctuation => 20,
            Space::Narrow => 21,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Space {
        match v {
            0 => Space::NotSpace,
            1..=16 => Space::EmSpace(v),
            17 => Space::Em4Per18,
            19 => Space::Figure,
            20 => Space::Punctuation,
            21 => Space::Narrow,
            _ => Space::Regular,
        }
    }
}

pub(crate) fn space_fallback(c: char) -> Space {
    match c {
        '\u{2000}' | '\u{2001}' => Space::EmSpace(1), // en quad, em quad
        '\u{2002}' => Space::EmSpace(2),              // en space
        '\u{2003}' => Space::EmSpace(1),              // em space
        '\u{2004}' => Space::EmSpace(3),
        '\u{2005}' => Space::EmSpace(4),
        '\u{2006}' => Space::EmSpace(6),
        '\u{2009}' => Space::EmSpace(5),  // thin space
        '\u{200A}' => Space::EmSpace(10), // hair space
        '\u{2008}' => Space::Punctuation,
        '\u{2007}' => Space::Figure,
        '\u{202F}' => Space::Narrow,
        '\u{205F}' => Space::Em4Per18, // medium mathematical space
        '\u{0020}' | '\u{00A0}' => Space::Regular,
        '\u{3000}' => Space::EmSpace(1), // ideographic space
        _ => Space::NotSpace,
    }
}

pub(crate) fn is_default_ignorable(c: char) -> bool {
    let u = c as u32;
    match u {
        0x00AD | 0x034F | 0x061C | 0x3164 | 0xFEFF | 0xFFA0 => true,
        0x115F | 0x1160 => true,
        0x17B4 | 0x17B5 => true,
        0x180B..=0x180E => true,
        0x200B..=0x200F => true,
        0x202A..=0x202E => true,
        0x2060..=0x206F => true,
        0xFE00..=0xFE0F => true,
        0xFFF0..=0xFFF8 => true,
        0x1BCA0..=0x1BCA3 => true,
        0x1D173..=0x1D17A => true,
        0xE0000..=0xE0FFF => true,
        _ => false,
    }
}

pub(crate) fn is_variation_selector(c: char) -> bool {
    matches!(
        c as u32,
        0x180B..=0x180D | 0xFE00..=0xFE0F | 0xE0100..=0xE01EF
    )
}

pub(crate) const ZWNJ: char = '\u{200C}';
pub(crate) const ZWJ: char = '\u{200D}';
pub(crate) const CGJ: char = '\u{034F}';
pub(crate) const DOTTED_CIRCLE: char = '\u{25CC}';
pub(crate) const REPLACEMENT: char = '\u{FFFD}';

pub(crate) trait GeneralCategoryExt {
    fn to_u8(&self) -> u8;
    fn from_u8(v: u8) -> Self;
    fn is_mark(&self) -> bool;
    fn is_letter(&self) -> bool;
}

impl GeneralCategoryExt for GeneralCategory {
    fn to_u8(&self) -> u8 {
        use GeneralCategory::*;
        match self {
            Control => 0,
            Format => 1,
            Unassigned => 2,
            PrivateUse => 3,
            Surrogate => 4,
            LowercaseLetter => 5,
            ModifierLetter => 6,
            OtherLetter => 7,
            TitlecaseLetter => 8,
            UppercaseLetter => 9,
            SpacingMark => 10,
            EnclosingMark => 11,
            NonspacingMark => 12,
            DecimalNumber => 13,
            LetterNumber => 14,
            OtherNumber => 15,
            ConnectorPunctuation => 16,
            DashPunctuation => 17,
            ClosePunctuation => 18,
            FinalPunctuation => 19,
            InitialPunctuation => 20,
            OtherPunctuation => 21,
            OpenPunctuation => 22,
            CurrencySymbol => 23,
            ModifierSymbol => 24,
            MathSymbol => 25,
            OtherSymbol => 26,
            LineSeparator => 27,
            ParagraphSeparator => 28,
            SpaceSeparator => 29,
        }
    }

    fn from_u8(v: u8) -> Self {
        use GeneralCategory::*;
        match v {
            0 => Control,
            1 => Format,
            2 => Unassigned,
            3 => PrivateUse,
            4 => Surrogate,
            5 => LowercaseLetter,
            6 => ModifierLetter,
            7 => OtherLetter,
            8 => TitlecaseLetter,
            9 => UppercaseLetter,
            10 => SpacingMark,
            11 => EnclosingMark,
            12 => NonspacingMark,
            13 => DecimalNumber,
            14 => LetterNumber,
            15 => OtherNumber,
            16 => ConnectorPunctuation,
            17 => DashPunctuation,
            18 => ClosePunctuation,
            19 => FinalPunctuation,
            20 => InitialPunctuation,
            21 => OtherPunctuation,
            22 => OpenPunctuation,
            23 => CurrencySymbol,
            24 => ModifierSymbol,
            25 => MathSymbol,
            26 => OtherSymbol,
            27 => LineSeparator,
            28 => ParagraphSeparator,
            _ => SpaceSeparator,
        }
    }

    fn is_mark(&self) -> bool {
        matches!(
            self,
            GeneralCategory::SpacingMark
                | GeneralCategory::EnclosingMark
                | GeneralCategory::NonspacingMark
        )
    }

    fn is_letter(&self) -> bool {
        matches!(
            self,
            GeneralCategory::LowercaseLetter
                | GeneralCategory::ModifierLetter
                | GeneralCategory::OtherLetter
                | GeneralCategory::TitlecaseLetter
                | GeneralCategory::UppercaseLetter
        )
    }
}

/// Convenience property access for `char`, answering from the builtin
/// provider.
pub(crate) trait CharExt {
    fn general_category(self) -> GeneralCategory;
    fn combining_class(self) -> u8;
    fn modified_combining_class(self) -> u8;
    fn mirrored(self) -> Option<char>;
    fn script(self) -> Script;
    fn is_default_ignorable(self) -> bool;
}

impl CharExt for char {
    fn general_category(self) -> GeneralCategory {
        BUILTIN_UNICODE_FUNCS.general_category(self)
    }

    fn combining_class(self) -> u8 {
        BUILTIN_UNICODE_FUNCS.combining_class(self)
    }

    fn modified_combining_class(self) -> u8 {
        modified_combining_class_of(self.combining_class())
    }

    fn mirrored(self) -> Option<char> {
        BUILTIN_UNICODE_FUNCS.mirroring(self)
    }

    fn script(self) -> Script {
        BUILTIN_UNICODE_FUNCS.script(self)
    }

    fn is_default_ignorable(self) -> bool {
        is_default_ignorable(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decompose_single_step() {
        let f = BuiltinUnicodeFuncs;
        // é -> e + combining acute
        assert_eq!(f.decompose('\u{00E9}'), Some(('e', '\u{0301}')));
        // Plain letters don't decompose.
        assert_eq!(f.decompose('e'), None);
        // Recursive decompositions fold back to one step:
        // U+01D5 (Ü + macron) -> (U+00DC, U+0304).
        assert_eq!(f.decompose('\u{01D5}'), Some(('\u{00DC}', '\u{0304}')));
    }

    #[test]
    fn decompose_hangul() {
        let f = BuiltinUnicodeFuncs;
        // An LVT syllable steps to (LV, T).
        let (a, b) = f.decompose('\u{AC01}').unwrap();
        assert_eq!(a, '\u{AC00}');
        assert_eq!(b, '\u{11A8}');
    }

    #[test]
    fn compose_roundtrip() {
        let f = BuiltinUnicodeFuncs;
        assert_eq!(f.compose('e', '\u{0301}'), Some('\u{00E9}'));
        assert_eq!(f.compose('e', 'x'), None);
    }

    #[test]
    fn modified_ccc_renumbering() {
        // Hebrew shin dot sorts before sheva after renumbering.
        assert!(modified_combining_class_of(24) < modified_combining_class_of(10));
        // Identity outside the remapped ranges.
        assert_eq!(modified_combining_class_of(230), 230);
    }

    #[test]
    fn default_ignorables() {
        assert!(is_default_ignorable('\u{200D}'));
        assert!(is_default_ignorable('\u{FE0F}'));
        assert!(!is_default_ignorable('a'));
    }

    #[test]
    fn scripts() {
        let f = BuiltinUnicodeFuncs;
        assert_eq!(f.script('a'), script::LATIN);
        assert_eq!(f.script('\u{0627}'), script::ARABIC);
        assert_eq!(f.script('1'), script::COMMON);
    }
}
