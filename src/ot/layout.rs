//! Structures shared by GSUB and GPOS: coverage, class definitions,
//! script/feature/lookup lists and feature variations.

use crate::common::Tag;
use crate::parser::{read_at, F2Dot14, FromData, LazyArray16, Offset16, Offset32, Stream};
use crate::sanitize::Sanitizer;

pub(crate) const NO_REQUIRED_FEATURE: u16 = 0xFFFF;
pub(crate) const NO_VARIATIONS_INDEX: u32 = 0xFFFF_FFFF;

pub(crate) mod lookup_flags {
    pub const RIGHT_TO_LEFT: u16 = 0x0001;
    pub const IGNORE_BASE_GLYPHS: u16 = 0x0002;
    pub const IGNORE_LIGATURES: u16 = 0x0004;
    pub const IGNORE_MARKS: u16 = 0x0008;
    pub const IGNORE_FLAGS: u16 = 0x000E;
    pub const USE_MARK_FILTERING_SET: u16 = 0x0010;
    pub const MARK_ATTACHMENT_TYPE_MASK: u16 = 0xFF00;
}

/// A glyph range with an associated value, as used by coverage and class
/// tables.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RangeRecord {
    pub start: u16,
    pub end: u16,
    pub value: u16,
}

impl FromData for RangeRecord {
    const SIZE: usize = 6;
    fn parse(data: &[u8]) -> Option<Self> {
        let mut s = Stream::new(data);
        Some(RangeRecord {
            start: s.read::<u16>()?,
            end: s.read::<u16>()?,
            value: s.read::<u16>()?,
        })
    }
}

/// Answers "is this glyph covered, and at what index?" in O(log n).
#[derive(Clone, Copy, Debug)]
pub(crate) enum Coverage<'a> {
    Format1 { glyphs: LazyArray16<'a, u16> },
    Format2 { ranges: LazyArray16<'a, RangeRecord> },
}

impl<'a> Coverage<'a> {
    pub fn parse(data: &'a [u8]) -> Option<Self> {
        let mut s = Stream::new(data);
        match s.read::<u16>()? {
            1 => {
                let count = s.read::<u16>()?;
                Some(Coverage::Format1 { glyphs: s.read_array16::<u16>(count)? })
            }
            2 => {
                let count = s.read::<u16>()?;
                Some(Coverage::Format2 { ranges: s.read_array16::<RangeRecord>(count)? })
            }
            _ => None,
        }
    }

    pub fn get(&self, glyph: u16) -> Option<u16> {
        match self {
            Coverage::Format1 { glyphs } => {
                glyphs.binary_search_by(|g| g.cmp(&glyph)).map(|(i, _)| i)
            }
            Coverage::Format2 { ranges } => {
                let (_, range) = ranges.binary_search_by(|r| {
                    if r.start > glyph {
                        std::cmp::Ordering::Greater
                    } else if r.end < glyph {
                        std::cmp::Ordering::Less
                    } else {
                        std::cmp::Ordering::Equal
                    }
                })?;
                range.value.checked_add(glyph - range.start)
            }
        }
    }

    pub fn contains(&self, glyph: u16) -> bool {
        self.get(glyph).is_some()
    }

    /// An upper bound of the covered-set size, charged against sanitizer
    /// budgets because small range tables can cover huge glyph sets.
    pub fn population(&self) -> u64 {
        match self {
            Coverage::Format1 { glyphs } => u64::from(glyphs.len()),
            Coverage::Format2 { ranges } => {
                let mut n = 0u64;
                for r in ranges.iter() {
                    n += u64::from(r.end.saturating_sub(r.start)) + 1;
                }
                n
            }
        }
    }
}

/// Maps glyphs to class values; unlisted glyphs are class 0.
#[derive(Clone, Copy, Debug)]
pub(crate) enum ClassDef<'a> {
    Format1 {
        start: u16,
        classes: LazyArray16<'a, u16>,
    },
    Format2 {
        ranges: LazyArray16<'a, RangeRecord>,
    },
    Empty,
}

impl<'a> ClassDef<'a> {
    pub fn parse(data: &'a [u8]) -> Option<Self> {
        let mut s = Stream::new(data);
        match s.read::<u16>()? {
            1 => {
                let start = s.read::<u16>()?;
                let count = s.read::<u16>()?;
                Some(ClassDef::Format1 { start, classes: s.read_array16::<u16>(count)? })
            }
            2 => {
                let count = s.read::<u16>()?;
                Some(ClassDef::Format2 { ranges: s.read_array16::<RangeRecord>(count)? })
            }
            _ => None,
        }
    }

    pub fn get(&self, glyph: u16) -> u16 {
        match self {
            ClassDef::Format1 { start, classes } => glyph
                .checked_sub(*start)
                .and_then(|i| classes.get(i))
                .unwrap_or(0),
            ClassDef::Format2 { ranges } => ranges
                .binary_search_by(|r| {
                    if r.start > glyph {
                        std::cmp::Ordering::Greater
                    } else if r.end < glyph {
                        std::cmp::Ordering::Less
                    } else {
                        std::cmp::Ordering::Equal
                    }
                })
                .map_or(0, |(_, r)| r.value),
            ClassDef::Empty => 0,
        }
    }
}

/// A hinting or variation delta table attached to a value record or anchor.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Device<'a> {
    Hinting {
        start_size: u16,
        end_size: u16,
        format: u16,
        values: &'a [u8],
    },
    Variation {
        outer: u16,
        inner: u16,
    },
}

impl<'a> Device<'a> {
    pub fn parse(data: &'a [u8]) -> Option<Self> {
        let first = read_at::<u16>(data, 0)?;
        let second = read_at::<u16>(data, 2)?;
        let format = read_at::<u16>(data, 4)?;
        match format {
            1..=3 => Some(Device::Hinting {
                start_size: first,
                end_size: second,
                format,
                values: data.get(6..)?,
            }),
            0x8000 => Some(Device::Variation { outer: first, inner: second }),
            _ => None,
        }
    }

    fn hinting_delta(&self, ppem: u16) -> i32 {
        let Device::Hinting { start_size, end_size, format, values } = self else {
            return 0;
        };
        if ppem == 0 || ppem < *start_size || ppem > *end_size {
            return 0;
        }

        let index = u32::from(ppem - start_size);
        let bits = 1u32 << format; // 2, 4 or 8 bits per value
        let per_word = 16 / bits;
        let word = match read_at::<u16>(values, (index / per_word) as usize * 2) {
            Some(w) => u32::from(w),
            None => return 0,
        };

        let shift = 16 - bits * (index % per_word + 1);
        let mask = (1 << bits) - 1;
        let value = (word >> shift) & mask;

        // Sign-extend.
        let sign_bit = 1 << (bits - 1);
        if value & sign_bit != 0 {
            value as i32 - (mask as i32 + 1)
        } else {
            value as i32
        }
    }

    pub fn x_delta(&self, font: &crate::Font, var_store: Option<&super::var::ItemVariationStore>) -> i32 {
        match self {
            Device::Hinting { .. } => self.hinting_delta(font.ppem().0),
            Device::Variation { outer, inner } => var_store.map_or(0, |s| {
                (s.delta(*outer, *inner, font.coords()) * font.x_mult()).round() as i32
            }),
        }
    }

    pub fn y_delta(&self, font: &crate::Font, var_store: Option<&super::var::ItemVariationStore>) -> i32 {
        match self {
            Device::Hinting { .. } => self.hinting_delta(font.ppem().1),
            Device::Variation { outer, inner } => var_store.map_or(0, |s| {
                (s.delta(*outer, *inner, font.coords()) * font.y_mult()).round() as i32
            }),
        }
    }
}

/// A GSUB or GPOS root: script list, feature list, lookup list, and
/// optional feature variations.
pub(crate) struct LayoutTable<'a> {
    scripts: &'a [u8],
    features: &'a [u8],
    lookups: &'a [u8],
    variations: Option<&'a [u8]>,
}

impl<'a> LayoutTable<'a> {
    pub fn parse(data: &'a [u8], s: &mut Sanitizer) -> Option<Self> {
        let major = read_at::<u16>(data, 0)?;
        let minor = read_at::<u16>(data, 2)?;
        if major != 1 {
            return None;
        }

        let scripts = read_at::<Offset16>(data, 4)?.resolve(data)?;
        let features = read_at::<Offset16>(data, 6)?.resolve(data)?;
        let lookups = read_at::<Offset16>(data, 8)?.resolve(data)?;
        let variations = if minor >= 1 {
            read_at::<Offset32>(data, 10).and_then(|o| o.resolve(data))
        } else {
            None
        };

        let table = LayoutTable { scripts, features, lookups, variations };
        table.sanitize(s).then_some(table)
    }

    fn sanitize(&self, s: &mut Sanitizer) -> bool {
        // Script list: tag/offset records, each script a langsys list.
        let Some(script_count) = read_at::<u16>(self.scripts, 0) else {
            return false;
        };
        for i in 0..usize::from(script_count) {
            if !s.check_ops(4) {
                return false;
            }
            let Some(off) = read_at::<Offset16>(self.scripts, 2 + i * 6 + 4) else {
                return false;
            };
            let Some(script) = off.resolve(self.scripts) else {
                return false;
            };
            let ok = s.recurse(|s| {
                let Some(lang_count) = read_at::<u16>(script, 2) else {
                    return false;
                };
                s.check_array(0, 6, usize::from(lang_count))
            });
            if !ok {
                return false;
            }
        }

        // Feature list.
        let Some(feature_count) = read_at::<u16>(self.features, 0) else {
            return false;
        };
        if !s.check_array(2, 6, usize::from(feature_count)) {
            return false;
        }

        // Lookup list: every lookup header and its subtable offsets must
        // resolve.
        let Some(lookup_count) = read_at::<u16>(self.lookups, 0) else {
            return false;
        };
        for i in 0..lookup_count {
            if !s.check_ops(4) {
                return false;
            }
            let Some(lookup) = self.lookup(i) else {
                return false;
            };
            for k in 0..lookup.subtable_count() {
                if !s.check_ops(1) {
                    return false;
                }
                if lookup.subtable_data(k).is_none() {
                    return false;
                }
            }
        }

        true
    }

    // Scripts.

    pub fn script_count(&self) -> u16 {
        read_at::<u16>(self.scripts, 0).unwrap_or(0)
    }

    pub fn script_tag(&self, index: u16) -> Option<Tag> {
        if index >= self.script_count() {
            return None;
        }
        read_at::<Tag>(self.scripts, 2 + usize::from(index) * 6)
    }

    pub fn find_script(&self, tag: Tag) -> Option<u16> {
        (0..self.script_count()).find(|&i| self.script_tag(i) == Some(tag))
    }

    fn script_data(&self, index: u16) -> Option<&'a [u8]> {
        read_at::<Offset16>(self.scripts, 2 + usize::from(index) * 6 + 4)?
            .resolve(self.scripts)
    }

    /// Selects a langsys: an exact language-tag match or the script's
    /// default.
    pub fn langsys(&self, script_index: u16, lang_tag: Option<Tag>) -> Option<LangSys<'a>> {
        let script = self.script_data(script_index)?;
        if let Some(tag) = lang_tag {
            let count = read_at::<u16>(script, 2)?;
            for i in 0..usize::from(count) {
                let rec_tag = read_at::<Tag>(script, 4 + i * 6)?;
                if rec_tag == tag {
                    let data = read_at::<Offset16>(script, 4 + i * 6 + 4)?.resolve(script)?;
                    return LangSys::parse(data);
                }
            }
        }
        let default = read_at::<Offset16>(script, 0)?.resolve(script)?;
        LangSys::parse(default)
    }

    // Features.

    pub fn feature_count(&self) -> u16 {
        read_at::<u16>(self.features, 0).unwrap_or(0)
    }

    pub fn feature_tag(&self, index: u16) -> Option<Tag> {
        if index >= self.feature_count() {
            return None;
        }
        read_at::<Tag>(self.features, 2 + usize::from(index) * 6)
    }

    pub fn feature(&self, index: u16) -> Option<FeatureTable<'a>> {
        if index >= self.feature_count() {
            return None;
        }
        let data = read_at::<Offset16>(self.features, 2 + usize::from(index) * 6 + 4)?
            .resolve(self.features)?;
        FeatureTable::parse(data)
    }

    /// The feature at `index`, after applying a feature-variation
    /// substitution if one is active.
    pub fn feature_with_variations(&self, index: u16, variations_index: u32) -> Option<FeatureTable<'a>> {
        if variations_index != NO_VARIATIONS_INDEX {
            if let Some(sub) = self.variation_substitute(variations_index, index) {
                return Some(sub);
            }
        }
        self.feature(index)
    }

    // Lookups.

    pub fn lookup_count(&self) -> u16 {
        read_at::<u16>(self.lookups, 0).unwrap_or(0)
    }

    pub fn lookup(&self, index: u16) -> Option<Lookup<'a>> {
        if index >= self.lookup_count() {
            return None;
        }
        let data = read_at::<Offset16>(self.lookups, 2 + usize::from(index) * 2)?
            .resolve(self.lookups)?;
        Lookup::parse(data)
    }

    // Feature variations.

    /// Finds the first condition set matching the coordinates.
    pub fn variations_index(&self, coords: &[i16]) -> u32 {
        let Some(data) = self.variations else {
            return NO_VARIATIONS_INDEX;
        };
        let Some(count) = read_at::<u32>(data, 8) else {
            return NO_VARIATIONS_INDEX;
        };
        for i in 0..count as usize {
            let base = 12 + i * 8;
            let Some(cond_off) = read_at::<Offset32>(data, base) else {
                return NO_VARIATIONS_INDEX;
            };
            let matches = match cond_off.resolve(data) {
                Some(cond_set) => condition_set_matches(cond_set, coords),
                None => true,
            };
            if matches {
                return i as u32;
            }
        }
        NO_VARIATIONS_INDEX
    }

    fn variation_substitute(&self, variations_index: u32, feature_index: u16) -> Option<FeatureTable<'a>> {
        let data = self.variations?;
        let base = 12 + variations_index as usize * 8;
        let subst = read_at::<Offset32>(data, base + 4)?.resolve(data)?;

        let count = read_at::<u16>(subst, 2)?;
        for i in 0..usize::from(count) {
            let rec = 4 + i * 6;
            let index = read_at::<u16>(subst, rec)?;
            if index == feature_index {
                let alt = read_at::<Offset32>(subst, rec + 2)?.resolve(subst)?;
                return FeatureTable::parse(alt);
            }
        }
        None
    }
}

fn condition_set_matches(cond_set: &[u8], coords: &[i16]) -> bool {
    let Some(count) = read_at::<u16>(cond_set, 0) else {
        return false;
    };
    for i in 0..usize::from(count) {
        let Some(off) = read_at::<Offset32>(cond_set, 2 + i * 4) else {
            return false;
        };
        let Some(cond) = off.resolve(cond_set) else {
            return false;
        };
        // Condition format 1: an axis range.
        let Some(format) = read_at::<u16>(cond, 0) else {
            return false;
        };
        if format != 1 {
            return false;
        }
        let Some(axis_index) = read_at::<u16>(cond, 2) else {
            return false;
        };
        let Some(min) = read_at::<F2Dot14>(cond, 4) else {
            return false;
        };
        let Some(max) = read_at::<F2Dot14>(cond, 6) else {
            return false;
        };
        let coord = coords.get(usize::from(axis_index)).copied().unwrap_or(0);
        if coord < min.0 || coord > max.0 {
            return false;
        }
    }
    true
}

#[derive(Clone, Copy)]
pub(crate) struct LangSys<'a> {
    pub required_feature_index: u16,
    pub feature_indexes: LazyArray16<'a, u16>,
}

impl<'a> LangSys<'a> {
    fn parse(data: &'a [u8]) -> Option<Self> {
        let mut s = Stream::new(data);
        s.skip::<u16>(); // lookupOrderOffset, reserved
        let required_feature_index = s.read::<u16>()?;
        let count = s.read::<u16>()?;
        Some(LangSys {
            required_feature_index,
            feature_indexes: s.read_array16::<u16>(count)?,
        })
    }
}

#[derive(Clone, Copy)]
pub(crate) struct FeatureTable<'a> {
    pub lookup_indexes: LazyArray16<'a, u16>,
}

impl<'a> FeatureTable<'a> {
    fn parse(data: &'a [u8]) -> Option<Self> {
        let mut s = Stream::new(data);
        s.skip::<u16>(); // featureParamsOffset
        let count = s.read::<u16>()?;
        Some(FeatureTable { lookup_indexes: s.read_array16::<u16>(count)? })
    }
}

/// A lookup header: kind, skip flags and subtables.
#[derive(Clone, Copy)]
pub(crate) struct Lookup<'a> {
    pub data: &'a [u8],
    pub kind: u16,
    pub flags: u16,
    pub mark_filtering_set: Option<u16>,
    subtable_count: u16,
}

impl<'a> Lookup<'a> {
    fn parse(data: &'a [u8]) -> Option<Self> {
        let mut s = Stream::new(data);
        let kind = s.read::<u16>()?;
        let flags = s.read::<u16>()?;
        let subtable_count = s.read::<u16>()?;
        let mark_filtering_set = if flags & lookup_flags::USE_MARK_FILTERING_SET != 0 {
            Some(read_at::<u16>(data, 6 + usize::from(subtable_count) * 2)?)
        } else {
            None
        };
        Some(Lookup { data, kind, flags, mark_filtering_set, subtable_count })
    }

    pub fn subtable_count(&self) -> u16 {
        self.subtable_count
    }

    pub fn subtable_data(&self, index: u16) -> Option<&'a [u8]> {
        if index >= self.subtable_count {
            return None;
        }
        read_at::<Offset16>(self.data, 6 + usize::from(index) * 2)?.resolve(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn be16(v: u16) -> [u8; 2] {
        v.to_be_bytes()
    }

    #[test]
    fn coverage_format1() {
        let mut d = Vec::new();
        d.extend_from_slice(&be16(1));
        d.extend_from_slice(&be16(3));
        for g in [2u16, 5, 9] {
            d.extend_from_slice(&be16(g));
        }
        let c = Coverage::parse(&d).unwrap();
        assert_eq!(c.get(2), Some(0));
        assert_eq!(c.get(5), Some(1));
        assert_eq!(c.get(9), Some(2));
        assert_eq!(c.get(3), None);
    }

    #[test]
    fn coverage_format2() {
        let mut d = Vec::new();
        d.extend_from_slice(&be16(2));
        d.extend_from_slice(&be16(2));
        // 10..=12 -> indexes 0.., 20..=20 -> index 3
        for (s, e, v) in [(10u16, 12u16, 0u16), (20, 20, 3)] {
            d.extend_from_slice(&be16(s));
            d.extend_from_slice(&be16(e));
            d.extend_from_slice(&be16(v));
        }
        let c = Coverage::parse(&d).unwrap();
        assert_eq!(c.get(11), Some(1));
        assert_eq!(c.get(20), Some(3));
        assert_eq!(c.get(13), None);
        assert_eq!(c.population(), 4);
    }

    #[test]
    fn classdef_formats() {
        let mut d = Vec::new();
        d.extend_from_slice(&be16(1));
        d.extend_from_slice(&be16(10)); // start glyph
        d.extend_from_slice(&be16(2));
        d.extend_from_slice(&be16(7));
        d.extend_from_slice(&be16(8));
        let c = ClassDef::parse(&d).unwrap();
        assert_eq!(c.get(10), 7);
        assert_eq!(c.get(11), 8);
        assert_eq!(c.get(12), 0);
        assert_eq!(c.get(9), 0);
    }

    #[test]
    fn unknown_coverage_format_rejected() {
        let d = [0u8, 3, 0, 0];
        assert!(Coverage::parse(&d).is_none());
    }

    #[test]
    fn device_hinting_deltas() {
        // Format 2 (4 bits per value), sizes 10..=12, values +1, -1, +2.
        let mut d = Vec::new();
        d.extend_from_slice(&be16(10));
        d.extend_from_slice(&be16(12));
        d.extend_from_slice(&be16(2));
        d.extend_from_slice(&0x1F20u16.to_be_bytes());
        let dev = Device::parse(&d).unwrap();
        let Device::Hinting { .. } = dev else { panic!() };
        assert_eq!(dev.hinting_delta(10), 1);
        assert_eq!(dev.hinting_delta(11), -1);
        assert_eq!(dev.hinting_delta(12), 2);
        assert_eq!(dev.hinting_delta(13), 0);
        assert_eq!(dev.hinting_delta(0), 0);
    }
}
