use std::fmt;
use std::str::FromStr;

/// A 4-byte OpenType tag.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Tag(pub u32);

impl Tag {
    pub const fn from_bytes(bytes: &[u8; 4]) -> Self {
        Tag(((bytes[0] as u32) << 24)
            | ((bytes[1] as u32) << 16)
            | ((bytes[2] as u32) << 8)
            | (bytes[3] as u32))
    }

    /// Creates a tag from a possibly short slice, padding with spaces.
    pub fn from_bytes_lossy(bytes: &[u8]) -> Self {
        let mut array = [b' '; 4];
        for (i, b) in bytes.iter().take(4).enumerate() {
            array[i] = *b;
        }
        Tag::from_bytes(&array)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub fn to_bytes(self) -> [u8; 4] {
        [
            ((self.0 >> 24) & 0xff) as u8,
            ((self.0 >> 16) & 0xff) as u8,
            ((self.0 >> 8) & 0xff) as u8,
            (self.0 & 0xff) as u8,
        ]
    }

    pub(crate) fn to_lowercase(self) -> Self {
        let b = self.to_bytes();
        Tag::from_bytes(&[
            b[0].to_ascii_lowercase(),
            b[1].to_ascii_lowercase(),
            b[2].to_ascii_lowercase(),
            b[3].to_ascii_lowercase(),
        ])
    }

    pub(crate) fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.to_bytes();
        for c in &b {
            let c = if c.is_ascii_graphic() || *c == b' ' {
                *c as char
            } else {
                '.'
            };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl FromStr for Tag {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > 4 || !s.bytes().all(|c| c.is_ascii()) {
            return Err("invalid tag");
        }
        Ok(Tag::from_bytes_lossy(s.as_bytes()))
    }
}

impl From<ttf_parser::Tag> for Tag {
    fn from(tag: ttf_parser::Tag) -> Self {
        Tag(tag.0)
    }
}

impl From<Tag> for ttf_parser::Tag {
    fn from(tag: Tag) -> Self {
        ttf_parser::Tag(tag.0)
    }
}

/// Direction of a text segment.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Direction {
    #[default]
    Invalid,
    LeftToRight,
    RightToLeft,
    TopToBottom,
    BottomToTop,
}

impl Direction {
    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::LeftToRight | Direction::RightToLeft)
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Direction::TopToBottom | Direction::BottomToTop)
    }

    pub fn is_forward(self) -> bool {
        matches!(self, Direction::LeftToRight | Direction::TopToBottom)
    }

    pub fn is_backward(self) -> bool {
        matches!(self, Direction::RightToLeft | Direction::BottomToTop)
    }

    pub fn reverse(self) -> Self {
        match self {
            Direction::Invalid => Direction::Invalid,
            Direction::LeftToRight => Direction::RightToLeft,
            Direction::RightToLeft => Direction::LeftToRight,
            Direction::TopToBottom => Direction::BottomToTop,
            Direction::BottomToTop => Direction::TopToBottom,
        }
    }

    /// The natural horizontal direction of a script.
    pub fn from_script(script: Script) -> Self {
        if script::is_right_to_left(script) {
            Direction::RightToLeft
        } else {
            Direction::LeftToRight
        }
    }
}

impl FromStr for Direction {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.as_bytes().first().map(u8::to_ascii_lowercase) {
            Some(b'l') => Ok(Direction::LeftToRight),
            Some(b'r') => Ok(Direction::RightToLeft),
            Some(b't') => Ok(Direction::TopToBottom),
            Some(b'b') => Ok(Direction::BottomToTop),
            _ => Err("invalid direction"),
        }
    }
}

/// A writing system, identified by its ISO 15924 tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Script(pub(crate) Tag);

impl Script {
    /// Canonicalizes an ISO 15924 tag: first letter upper case, the rest lower.
    pub fn from_iso15924_tag(tag: Tag) -> Option<Self> {
        if tag.is_null() {
            return None;
        }

        let b = tag.to_bytes();
        let tag = Tag::from_bytes(&[
            b[0].to_ascii_uppercase(),
            b[1].to_ascii_lowercase(),
            b[2].to_ascii_lowercase(),
            b[3].to_ascii_lowercase(),
        ]);

        // Any spaces at the end of the tag are replaced by repeating the last
        // letter, so e.g. "la  " becomes "Laaa".
        match &tag.to_bytes() {
            [b'Q', b'a', b'a', b'i'] => Some(script::INHERITED),
            [b'Q', b'a', b'a', b'c'] => Some(script::COPTIC),
            _ => Some(Script(tag)),
        }
    }

    pub fn tag(self) -> Tag {
        self.0
    }
}

impl FromStr for Script {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = Tag::from_str(s)?;
        Script::from_iso15924_tag(tag).ok_or("invalid script")
    }
}

/// Predefined scripts.
pub mod script {
    #![allow(missing_docs)]

    use super::{Script, Tag};

    macro_rules! scripts {
        ($($name:ident => $tag:expr,)+) => {
            $(pub const $name: Script = Script(Tag::from_bytes($tag));)+
        };
    }

    scripts! {
        COMMON => b"Zyyy",
        INHERITED => b"Zinh",
        UNKNOWN => b"Zzzz",

        ARABIC => b"Arab",
        ARMENIAN => b"Armn",
        BENGALI => b"Beng",
        CYRILLIC => b"Cyrl",
        DEVANAGARI => b"Deva",
        GEORGIAN => b"Geor",
        GREEK => b"Grek",
        GUJARATI => b"Gujr",
        GURMUKHI => b"Guru",
        HANGUL => b"Hang",
        HAN => b"Hani",
        HEBREW => b"Hebr",
        HIRAGANA => b"Hira",
        KANNADA => b"Knda",
        KATAKANA => b"Kana",
        LAO => b"Laoo",
        LATIN => b"Latn",
        MALAYALAM => b"Mlym",
        ORIYA => b"Orya",
        TAMIL => b"Taml",
        TELUGU => b"Telu",
        THAI => b"Thai",

        TIBETAN => b"Tibt",

        BOPOMOFO => b"Bopo",
        BRAILLE => b"Brai",
        CANADIAN_SYLLABICS => b"Cans",
        CHEROKEE => b"Cher",
        ETHIOPIC => b"Ethi",
        KHMER => b"Khmr",
        MONGOLIAN => b"Mong",
        MYANMAR => b"Mymr",
        OGHAM => b"Ogam",
        RUNIC => b"Runr",
        SINHALA => b"Sinh",
        SYRIAC => b"Syrc",
        THAANA => b"Thaa",
        YI => b"Yiii",

        DESERET => b"Dsrt",
        GOTHIC => b"Goth",
        OLD_ITALIC => b"Ital",

        BUHID => b"Buhd",
        HANUNOO => b"Hano",
        TAGALOG => b"Tglg",
        TAGBANWA => b"Tagb",

        CYPRIOT => b"Cprt",
        LIMBU => b"Limb",
        LINEAR_B => b"Linb",
        OSMANYA => b"Osma",
        SHAVIAN => b"Shaw",
        TAI_LE => b"Tale",
        UGARITIC => b"Ugar",

        BUGINESE => b"Bugi",
        COPTIC => b"Copt",
        GLAGOLITIC => b"Glag",
        KHAROSHTHI => b"Khar",
        NEW_TAI_LUE => b"Talu",
        OLD_PERSIAN => b"Xpeo",
        SYLOTI_NAGRI => b"Sylo",
        TIFINAGH => b"Tfng",

        BALINESE => b"Bali",
        CUNEIFORM => b"Xsux",
        NKO => b"Nkoo",
        PHAGS_PA => b"Phag",
        PHOENICIAN => b"Phnx",

        CARIAN => b"Cari",
        CHAM => b"Cham",
        KAYAH_LI => b"Kali",
        LEPCHA => b"Lepc",
        LYCIAN => b"Lyci",
        LYDIAN => b"Lydi",
        OL_CHIKI => b"Olck",
        REJANG => b"Rjng",
        SAURASHTRA => b"Saur",
        SUNDANESE => b"Sund",
        VAI => b"Vaii",

        AVESTAN => b"Avst",
        BAMUM => b"Bamu",
        EGYPTIAN_HIEROGLYPHS => b"Egyp",
        IMPERIAL_ARAMAIC => b"Armi",
        INSCRIPTIONAL_PAHLAVI => b"Phli",
        INSCRIPTIONAL_PARTHIAN => b"Prti",
        JAVANESE => b"Java",
        KAITHI => b"Kthi",
        LISU => b"Lisu",
        MEETEI_MAYEK => b"Mtei",
        OLD_SOUTH_ARABIAN => b"Sarb",
        OLD_TURKIC => b"Orkh",
        SAMARITAN => b"Samr",
        TAI_THAM => b"Lana",
        TAI_VIET => b"Tavt",

        BATAK => b"Batk",
        BRAHMI => b"Brah",
        MANDAIC => b"Mand",

        CHAKMA => b"Cakm",
        MEROITIC_CURSIVE => b"Merc",
        MEROITIC_HIEROGLYPHS => b"Mero",
        MIAO => b"Plrd",
        SHARADA => b"Shrd",
        SORA_SOMPENG => b"Sora",
        TAKRI => b"Takr",

        BASSA_VAH => b"Bass",
        CAUCASIAN_ALBANIAN => b"Aghb",
        DUPLOYAN => b"Dupl",
        ELBASAN => b"Elba",
        GRANTHA => b"Gran",
        KHOJKI => b"Khoj",
        KHUDAWADI => b"Sind",
        LINEAR_A => b"Lina",
        MAHAJANI => b"Mahj",
        MANICHAEAN => b"Mani",
        MENDE_KIKAKUI => b"Mend",
        MODI => b"Modi",
        MRO => b"Mroo",
        NABATAEAN => b"Nbat",
        OLD_NORTH_ARABIAN => b"Narb",
        OLD_PERMIC => b"Perm",
        PAHAWH_HMONG => b"Hmng",
        PALMYRENE => b"Palm",
        PAU_CIN_HAU => b"Pauc",
        PSALTER_PAHLAVI => b"Phlp",
        SIDDHAM => b"Sidd",
        TIRHUTA => b"Tirh",
        WARANG_CITI => b"Wara",

        AHOM => b"Ahom",
        ANATOLIAN_HIEROGLYPHS => b"Hluw",
        HATRAN => b"Hatr",
        MULTANI => b"Mult",
        OLD_HUNGARIAN => b"Hung",
        SIGNWRITING => b"Sgnw",

        ADLAM => b"Adlm",
        BHAIKSUKI => b"Bhks",
        MARCHEN => b"Marc",
        NEWA => b"Newa",
        OSAGE => b"Osge",
        TANGUT => b"Tang",

        MASARAM_GONDI => b"Gonm",
        NUSHU => b"Nshu",
        SOYOMBO => b"Soyo",
        ZANABAZAR_SQUARE => b"Zanb",

        DOGRA => b"Dogr",
        GUNJALA_GONDI => b"Gong",
        HANIFI_ROHINGYA => b"Rohg",
        MAKASAR => b"Maka",
        MEDEFAIDRIN => b"Medf",
        OLD_SOGDIAN => b"Sogo",
        SOGDIAN => b"Sogd",

        ELYMAIC => b"Elym",
        NANDINAGARI => b"Nand",
        NYIAKENG_PUACHUE_HMONG => b"Hmnp",
        WANCHO => b"Wcho",

        CHORASMIAN => b"Chrs",
        DIVES_AKURU => b"Diak",
        KHITAN_SMALL_SCRIPT => b"Kits",
        YEZIDI => b"Yezi",
    }

    pub(crate) fn is_right_to_left(script: Script) -> bool {
        matches!(
            script,
            ARABIC
                | HEBREW
                | SYRIAC
                | THAANA
                | CYPRIOT
                | KHAROSHTHI
                | PHOENICIAN
                | LYDIAN
                | NKO
                | AVESTAN
                | IMPERIAL_ARAMAIC
                | INSCRIPTIONAL_PAHLAVI
                | INSCRIPTIONAL_PARTHIAN
                | OLD_SOUTH_ARABIAN
                | OLD_TURKIC
                | SAMARITAN
                | MANDAIC
                | MEROITIC_CURSIVE
                | MEROITIC_HIEROGLYPHS
                | MANICHAEAN
                | MENDE_KIKAKUI
                | NABATAEAN
                | OLD_NORTH_ARABIAN
                | PALMYRENE
                | PSALTER_PAHLAVI
                | HATRAN
                | OLD_HUNGARIAN
                | ADLAM
                | HANIFI_ROHINGYA
                | OLD_SOGDIAN
                | SOGDIAN
                | ELYMAIC
                | CHORASMIAN
                | YEZIDI
        )
    }
}

/// A BCP 47 language tag, lower-cased.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct Language(String);

impl Language {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The language of the process locale, from `LC_ALL`/`LC_CTYPE`/`LANG`.
    pub fn process_default() -> Option<Self> {
        let var = std::env::var("LC_ALL")
            .or_else(|_| std::env::var("LC_CTYPE"))
            .or_else(|_| std::env::var("LANG"))
            .ok()?;
        let lang = var.split(['.', '@']).next()?.replace('_', "-");
        if lang.is_empty() || lang == "C" || lang == "POSIX" {
            return None;
        }
        Some(Language(lang.to_ascii_lowercase()))
    }
}

impl FromStr for Language {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("invalid language");
        }
        Ok(Language(s.to_ascii_lowercase()))
    }
}

/// The direction, script and language of a text segment.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct SegmentProperties {
    pub direction: Direction,
    pub script: Option<Script>,
    pub language: Option<Language>,
}

/// Start index selecting the whole buffer in a [`Feature`] range.
pub const FEATURE_GLOBAL_START: u32 = 0;
/// End index selecting the whole buffer in a [`Feature`] range.
pub const FEATURE_GLOBAL_END: u32 = u32::MAX;

/// A font feature applied over a cluster range.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Feature {
    pub tag: Tag,
    pub value: u32,
    pub start: u32,
    pub end: u32,
}

impl Feature {
    pub fn new(tag: Tag, value: u32, range: impl std::ops::RangeBounds<u32>) -> Self {
        use std::ops::Bound;
        let start = match range.start_bound() {
            Bound::Included(&v) => v,
            Bound::Excluded(&v) => v.saturating_add(1),
            Bound::Unbounded => FEATURE_GLOBAL_START,
        };
        let end = match range.end_bound() {
            Bound::Included(&v) => v.saturating_add(1),
            Bound::Excluded(&v) => v,
            Bound::Unbounded => FEATURE_GLOBAL_END,
        };
        Feature { tag, value, start, end }
    }

    pub(crate) fn is_global(&self) -> bool {
        self.start == FEATURE_GLOBAL_START && self.end == FEATURE_GLOBAL_END
    }
}

impl FromStr for Feature {
    type Err = &'static str;

    // Accepts the `[+-]?tag([start:end])?(=value)?` syntax, e.g.
    // `kern`, `+liga`, `-clig`, `aalt=2`, `kern[3:5]`, `dlig[3]=1`, `smcp=on`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        fn parse(s: &str) -> Option<Feature> {
            let mut p = TextParser::new(s);
            p.skip_spaces();

            let mut value = 1u32;
            let mut value_forced = false;
            match p.peek() {
                Some(b'+') => {
                    p.advance();
                    value = 1;
                    value_forced = true;
                }
                Some(b'-') => {
                    p.advance();
                    value = 0;
                    value_forced = true;
                }
                _ => {}
            }

            let quoted = p.consume_byte(b'"') || p.consume_byte(b'\'');
            let tag = p.consume_tag()?;
            if quoted {
                if !(p.consume_byte(b'"') || p.consume_byte(b'\'')) {
                    return None;
                }
            }

            let mut start = FEATURE_GLOBAL_START;
            let mut end = FEATURE_GLOBAL_END;
            if p.consume_byte(b'[') {
                let explicit_start = p.consume_u32();
                start = explicit_start.unwrap_or(FEATURE_GLOBAL_START);
                if p.consume_byte(b':') {
                    end = p.consume_u32().unwrap_or(FEATURE_GLOBAL_END);
                } else {
                    end = match explicit_start {
                        Some(v) => v.checked_add(1)?,
                        None => FEATURE_GLOBAL_END,
                    };
                }
                if !p.consume_byte(b']') {
                    return None;
                }
            }

            if p.consume_byte(b'=') {
                if let Some(v) = p.consume_u32() {
                    value = v;
                } else if p.consume_keyword("on") {
                    value = 1;
                } else if p.consume_keyword("off") {
                    value = 0;
                } else {
                    return None;
                }
            } else if !value_forced {
                value = 1;
            }

            p.skip_spaces();
            if !p.at_end() {
                return None;
            }

            Some(Feature { tag, value, start, end })
        }

        parse(s).ok_or("invalid feature")
    }
}

/// A variation-axis setting.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Variation {
    pub tag: Tag,
    pub value: f32,
}

impl FromStr for Variation {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        fn parse(s: &str) -> Option<Variation> {
            let mut p = TextParser::new(s);
            p.skip_spaces();
            let tag = p.consume_tag()?;
            if !p.consume_byte(b'=') {
                p.skip_spaces();
            }
            let value = p.consume_f32()?;
            p.skip_spaces();
            if !p.at_end() {
                return None;
            }
            Some(Variation { tag, value })
        }

        parse(s).ok_or("invalid variation")
    }
}

struct TextParser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> TextParser<'a> {
    fn new(s: &'a str) -> Self {
        TextParser { data: s.as_bytes(), pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_ascii_whitespace()) {
            self.advance();
        }
    }

    fn consume_byte(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume_keyword(&mut self, word: &str) -> bool {
        let end = self.pos + word.len();
        if self.data.get(self.pos..end) == Some(word.as_bytes()) {
            self.pos = end;
            true
        } else {
            false
        }
    }

    fn consume_tag(&mut self) -> Option<Tag> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
            self.advance();
        }
        let len = self.pos - start;
        if len == 0 || len > 4 {
            return None;
        }
        Some(Tag::from_bytes_lossy(&self.data[start..self.pos]))
    }

    fn consume_u32(&mut self) -> Option<u32> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        if self.pos == start {
            return None;
        }
        std::str::from_utf8(&self.data[start..self.pos]).ok()?.parse().ok()
    }

    fn consume_f32(&mut self) -> Option<f32> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.advance();
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == b'.') {
            self.advance();
        }
        if self.pos == start {
            return None;
        }
        std::str::from_utf8(&self.data[start..self.pos]).ok()?.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feat(s: &str) -> Feature {
        s.parse().unwrap()
    }

    #[test]
    fn parse_feature_plain() {
        assert_eq!(
            feat("kern"),
            Feature {
                tag: Tag::from_bytes(b"kern"),
                value: 1,
                start: FEATURE_GLOBAL_START,
                end: FEATURE_GLOBAL_END,
            }
        );
    }

    #[test]
    fn parse_feature_signs() {
        assert_eq!(feat("+liga").value, 1);
        assert_eq!(feat("-liga").value, 0);
        assert_eq!(feat("liga=0").value, 0);
        assert_eq!(feat("liga=on").value, 1);
        assert_eq!(feat("liga=off").value, 0);
        assert_eq!(feat("aalt=2").value, 2);
    }

    #[test]
    fn parse_feature_ranges() {
        let f = feat("kern[3:5]");
        assert_eq!((f.start, f.end), (3, 5));

        let f = feat("kern[3]");
        assert_eq!((f.start, f.end), (3, 4));

        let f = feat("kern[3:]");
        assert_eq!((f.start, f.end), (3, FEATURE_GLOBAL_END));

        let f = feat("kern[:5]");
        assert_eq!((f.start, f.end), (0, 5));

        let f = feat("kern[:]");
        assert_eq!((f.start, f.end), (FEATURE_GLOBAL_START, FEATURE_GLOBAL_END));
    }

    #[test]
    fn parse_feature_invalid() {
        assert!("".parse::<Feature>().is_err());
        assert!("kern[".parse::<Feature>().is_err());
        assert!("toolong".parse::<Feature>().is_err());
        assert!("kern=x".parse::<Feature>().is_err());
    }

    #[test]
    fn parse_variation() {
        let v: Variation = "wght=700".parse().unwrap();
        assert_eq!(v.tag, Tag::from_bytes(b"wght"));
        assert_eq!(v.value, 700.0);

        let v: Variation = "wdth 80.5".parse().unwrap();
        assert_eq!(v.value, 80.5);
    }

    #[test]
    fn script_canonicalization() {
        let s = Script::from_iso15924_tag(Tag::from_bytes(b"arab")).unwrap();
        assert_eq!(s, script::ARABIC);
    }

    #[test]
    fn tag_display() {
        assert_eq!(Tag::from_bytes(b"GSUB").to_string(), "GSUB");
    }
}
