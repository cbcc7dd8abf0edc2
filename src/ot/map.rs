//! The feature planner: maps requested features to mask bits and
//! per-stage lookup lists.

use smallvec::SmallVec;

use crate::buffer::{Buffer, Mask, GLOBAL_BIT, GLOBAL_MASK};
use crate::common::{script, Script, SegmentProperties, Tag};
use crate::face::Face;
use crate::font::Font;
use crate::plan::ShapePlan;

use super::apply::{lookup_props, ApplyCtx, MAX_NESTING_LEVEL};
use super::layout::{LayoutTable, NO_REQUIRED_FEATURE, NO_VARIATIONS_INDEX};
use super::{gpos, gsub};

pub(crate) const TABLE_GSUB: usize = 0;
pub(crate) const TABLE_GPOS: usize = 1;

pub(crate) type PauseFn = fn(&ShapePlan, &Font, &mut Buffer);

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub(crate) struct FeatureFlags: u32 {
        /// The feature applies to the whole buffer.
        const GLOBAL = 0x01;
        /// A crate-side fallback exists if the font has no support.
        const HAS_FALLBACK = 0x02;
        /// Do not skip over ZWNJ when matching.
        const MANUAL_ZWNJ = 0x04;
        /// Do not skip over ZWJ when matching.
        const MANUAL_ZWJ = 0x08;
        const MANUAL_JOINERS = Self::MANUAL_ZWNJ.bits() | Self::MANUAL_ZWJ.bits();
        const GLOBAL_MANUAL_JOINERS = Self::GLOBAL.bits() | Self::MANUAL_JOINERS.bits();
        /// Match only within one syllable.
        const PER_SYLLABLE = 0x10;
        /// Also look for the feature under the default script.
        const GLOBAL_SEARCH = 0x20;
    }
}

impl FeatureFlags {
    pub(crate) const NONE: FeatureFlags = FeatureFlags::empty();
    pub(crate) const GLOBAL_HAS_FALLBACK: FeatureFlags = FeatureFlags::from_bits_truncate(
        FeatureFlags::GLOBAL.bits() | FeatureFlags::HAS_FALLBACK.bits(),
    );
}

#[derive(Clone)]
struct FeatureInfo {
    tag: Tag,
    seq: usize,
    max_value: u32,
    flags: FeatureFlags,
    default_value: u32,
    stage: [usize; 2],
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct MapFeature {
    pub tag: Tag,
    pub index: [Option<u16>; 2],
    pub stage: [usize; 2],
    pub shift: u32,
    pub mask: Mask,
    /// The mask covering value 1 only, for simple on/off checks.
    pub mask1: Mask,
    pub auto_zwnj: bool,
    pub auto_zwj: bool,
    pub per_syllable: bool,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct MapLookup {
    pub index: u16,
    pub auto_zwnj: bool,
    pub auto_zwj: bool,
    pub per_syllable: bool,
    pub mask: Mask,
}

pub(crate) struct MapStage {
    pub last_lookup: usize,
    pub pause: Option<PauseFn>,
}

/// The compiled map: global mask, features sorted by tag, and per-table
/// lookup lists segmented into stages.
pub(crate) struct Map {
    pub chosen_script: [Option<Tag>; 2],
    pub global_mask: Mask,
    features: Vec<MapFeature>,
    lookups: [Vec<MapLookup>; 2],
    stages: [Vec<MapStage>; 2],
}

impl Map {
    pub fn global_mask(&self) -> Mask {
        self.global_mask
    }

    fn find_feature(&self, tag: Tag) -> Option<&MapFeature> {
        self.features
            .binary_search_by(|f| f.tag.cmp(&tag))
            .ok()
            .map(|i| &self.features[i])
    }

    pub fn mask(&self, tag: Tag) -> (Mask, u32) {
        self.find_feature(tag).map_or((0, 0), |f| (f.mask, f.shift))
    }

    pub fn get_1_mask(&self, tag: Tag) -> Mask {
        self.find_feature(tag).map_or(0, |f| f.mask1)
    }

    /// Runs every stage of one table: lookups, then the stage's pause.
    pub fn apply(&self, table_index: usize, plan: &ShapePlan, font: &Font, buffer: &mut Buffer) {
        let mut last = 0;
        for stage in &self.stages[table_index] {
            for lookup in &self.lookups[table_index][last..stage.last_lookup] {
                if buffer.shaping_failed {
                    break;
                }
                apply_string(table_index, font, buffer, lookup);
            }
            last = stage.last_lookup;

            if let Some(pause) = stage.pause {
                pause(plan, font, buffer);
            }
        }
    }
}

fn apply_string(table_index: usize, font: &Font, buffer: &mut Buffer, map_lookup: &MapLookup) {
    let Some(table) = font.face.layout_table(table_index) else {
        return;
    };
    let Some(lookup) = table.lookup(map_lookup.index) else {
        return;
    };
    if buffer.is_empty() || lookup.subtable_count() == 0 {
        return;
    }

    let mut ctx = ApplyCtx {
        table_index,
        font,
        buffer,
        lookup_mask: map_lookup.mask,
        lookup_index: map_lookup.index,
        lookup_props: lookup_props(lookup.flags, lookup.mark_filtering_set),
        nesting_level_left: MAX_NESTING_LEVEL,
        auto_zwnj: map_lookup.auto_zwnj,
        auto_zwj: map_lookup.auto_zwj,
        per_syllable: map_lookup.per_syllable,
    };

    if table_index == TABLE_GSUB && gsub::is_reverse(&lookup) {
        // Reverse lookups run backward, in place.
        debug_assert!(!ctx.buffer.have_output);
        apply_backward(&mut ctx, &lookup);
    } else if table_index == TABLE_GSUB {
        ctx.buffer.clear_output();
        apply_forward(&mut ctx, &lookup);
        ctx.buffer.sync();
    } else {
        apply_forward(&mut ctx, &lookup);
    }
}

fn apply_forward(ctx: &mut ApplyCtx, lookup: &super::layout::Lookup) {
    ctx.buffer.idx = 0;
    while ctx.buffer.idx < ctx.buffer.len && ctx.buffer.successful {
        let cur = *ctx.buffer.cur(0);
        let mut applied = false;
        if cur.mask & ctx.lookup_mask != 0
            && ctx.check_glyph_property(&cur, ctx.lookup_props)
        {
            if !ctx.buffer.decrement_max_ops() {
                break;
            }
            applied = if ctx.table_index == TABLE_GSUB {
                gsub::apply_lookup_subtables(ctx, lookup)
            } else {
                gpos::apply_lookup_subtables(ctx, lookup)
            };
        }

        if !applied {
            ctx.buffer.next_glyph();
        }
    }
}

fn apply_backward(ctx: &mut ApplyCtx, lookup: &super::layout::Lookup) {
    if ctx.buffer.len == 0 {
        return;
    }
    ctx.buffer.idx = ctx.buffer.len - 1;
    loop {
        let cur = *ctx.buffer.cur(0);
        if cur.mask & ctx.lookup_mask != 0
            && ctx.check_glyph_property(&cur, ctx.lookup_props)
        {
            if !ctx.buffer.decrement_max_ops() {
                break;
            }
            gsub::apply_lookup_subtables(ctx, lookup);
        }
        // The reverse lookup never advances the cursor on success, for
        // good reason.
        if ctx.buffer.idx == 0 {
            break;
        }
        ctx.buffer.idx -= 1;
    }
    ctx.buffer.idx = 0;
}

/// Builds a [`Map`]: features are registered by the shapers and the
/// caller, then compiled against the face's layout tables.
pub(crate) struct MapBuilder<'a> {
    face: &'a Face<'a>,
    pub chosen_script: [Option<Tag>; 2],
    script_index: [Option<u16>; 2],
    lang_tag: Option<Tag>,
    current_stage: [usize; 2],
    feature_infos: Vec<FeatureInfo>,
    stage_pauses: [Vec<(usize, Option<PauseFn>)>; 2],
    script: Option<Script>,
}

impl<'a> MapBuilder<'a> {
    pub fn new(face: &'a Face<'a>, props: &SegmentProperties) -> Self {
        let script_tags = script_tags_for(props.script);
        let lang_tag = language_tag_for(props);

        let mut chosen_script = [None, None];
        let mut script_index = [None, None];

        for table_index in 0..2 {
            if let Some(table) = face.layout_table(table_index) {
                let (index, tag) = select_script(table, &script_tags);
                chosen_script[table_index] = tag;
                script_index[table_index] = index;
            }
        }

        MapBuilder {
            face,
            chosen_script,
            script_index,
            lang_tag,
            current_stage: [0, 0],
            feature_infos: Vec::new(),
            stage_pauses: [Vec::new(), Vec::new()],
            script: props.script,
        }
    }

    pub fn script(&self) -> Option<Script> {
        self.script
    }

    pub fn chosen_script(&self, table_index: usize) -> Option<Tag> {
        self.chosen_script[table_index]
    }

    pub fn add_feature(&mut self, tag: Tag, flags: FeatureFlags, value: u32) {
        if tag.is_null() {
            return;
        }
        let seq = self.feature_infos.len();
        self.feature_infos.push(FeatureInfo {
            tag,
            seq,
            max_value: value,
            flags,
            default_value: if flags.contains(FeatureFlags::GLOBAL) { value } else { 0 },
            stage: self.current_stage,
        });
    }

    pub fn enable_feature(&mut self, tag: Tag, flags: FeatureFlags, value: u32) {
        self.add_feature(tag, flags | FeatureFlags::GLOBAL, value);
    }

    pub fn disable_feature(&mut self, tag: Tag) {
        self.add_feature(tag, FeatureFlags::GLOBAL, 0);
    }

    pub fn add_gsub_pause(&mut self, pause: Option<PauseFn>) {
        self.add_pause(TABLE_GSUB, pause);
    }

    pub fn add_gpos_pause(&mut self, pause: Option<PauseFn>) {
        self.add_pause(TABLE_GPOS, pause);
    }

    fn add_pause(&mut self, table_index: usize, pause: Option<PauseFn>) {
        self.stage_pauses[table_index].push((self.current_stage[table_index], pause));
        self.current_stage[table_index] += 1;
    }

    pub fn compile(mut self, coords: &[i16]) -> Map {
        let global_bit_mask = GLOBAL_MASK;
        let mut next_bit = GLOBAL_BIT + 1;

        // Sort and merge duplicate features.
        self.feature_infos.sort_by(|a, b| (a.tag, a.seq).cmp(&(b.tag, b.seq)));
        let mut merged: Vec<FeatureInfo> = Vec::with_capacity(self.feature_infos.len());
        for info in self.feature_infos.drain(..) {
            match merged.last_mut() {
                Some(last) if last.tag == info.tag => {
                    if info.flags.contains(FeatureFlags::GLOBAL) {
                        last.flags |= FeatureFlags::GLOBAL;
                        last.max_value = info.max_value;
                        last.default_value = info.default_value;
                    } else {
                        last.flags.remove(FeatureFlags::GLOBAL);
                        last.max_value = last.max_value.max(info.max_value);
                        // default_value inherited from the earlier entry
                    }
                    let extra = info.flags
                        & (FeatureFlags::HAS_FALLBACK
                            | FeatureFlags::MANUAL_JOINERS
                            | FeatureFlags::PER_SYLLABLE);
                    last.flags |= extra;
                    last.stage[0] = last.stage[0].min(info.stage[0]);
                    last.stage[1] = last.stage[1].min(info.stage[1]);
                }
                _ => merged.push(info),
            }
        }

        let variations_index = [
            self.face
                .layout_table(TABLE_GSUB)
                .map_or(NO_VARIATIONS_INDEX, |t| t.variations_index(coords)),
            self.face
                .layout_table(TABLE_GPOS)
                .map_or(NO_VARIATIONS_INDEX, |t| t.variations_index(coords)),
        ];

        let mut map = Map {
            chosen_script: self.chosen_script,
            global_mask: global_bit_mask,
            features: Vec::with_capacity(merged.len()),
            lookups: [Vec::new(), Vec::new()],
            stages: [Vec::new(), Vec::new()],
        };

        // Allocate mask bits and resolve feature indexes.
        for info in &merged {
            let bits_needed =
                if info.flags.contains(FeatureFlags::GLOBAL) && info.max_value == 1 {
                    0
                } else {
                    32 - info.max_value.leading_zeros()
                };
            if info.max_value == 0 || next_bit + bits_needed >= 32 {
                continue; // feature disabled or out of bits
            }

            let mut found = false;
            let mut index = [None, None];
            for table_index in 0..2 {
                index[table_index] = self.find_feature_index(table_index, info.tag);
                found |= index[table_index].is_some();
            }
            if !found && info.flags.contains(FeatureFlags::GLOBAL_SEARCH) {
                for table_index in 0..2 {
                    if index[table_index].is_none() {
                        index[table_index] = self
                            .face
                            .layout_table(table_index)
                            .and_then(|t| find_feature_anywhere(t, info.tag));
                        found |= index[table_index].is_some();
                    }
                }
            }
            if !found && !info.flags.contains(FeatureFlags::HAS_FALLBACK) {
                continue;
            }

            let (shift, mask) = if bits_needed == 0 {
                // The feature is on, global and binary: it can use the
                // global bit.
                (GLOBAL_BIT, global_bit_mask)
            } else {
                let shift = next_bit;
                let mask = (1u32 << (next_bit + bits_needed)) - (1u32 << next_bit);
                next_bit += bits_needed;
                map.global_mask |= (info.default_value << shift) & mask;
                (shift, mask)
            };

            map.features.push(MapFeature {
                tag: info.tag,
                index,
                stage: info.stage,
                shift,
                mask,
                mask1: (1 << shift) & mask,
                auto_zwnj: !info.flags.contains(FeatureFlags::MANUAL_ZWNJ),
                auto_zwj: !info.flags.contains(FeatureFlags::MANUAL_ZWJ),
                per_syllable: info.flags.contains(FeatureFlags::PER_SYLLABLE),
            });
        }

        // Collect lookups per stage.
        for table_index in 0..2 {
            // Sealing pause for the last stage.
            self.stage_pauses[table_index].push((self.current_stage[table_index], None));

            let required_index = self.required_feature_index(table_index);

            let n_stages = self.current_stage[table_index] + 1;
            let mut pending: Vec<MapLookup> = Vec::new();
            for stage in 0..n_stages {
                if stage == 0 {
                    if let Some(req) = required_index {
                        self.add_lookups(
                            table_index,
                            req,
                            variations_index[table_index],
                            global_bit_mask,
                            true,
                            true,
                            false,
                            &mut pending,
                        );
                    }
                }

                for feature in &map.features {
                    if feature.stage[table_index] == stage {
                        if let Some(feature_index) = feature.index[table_index] {
                            self.add_lookups(
                                table_index,
                                feature_index,
                                variations_index[table_index],
                                feature.mask,
                                feature.auto_zwnj,
                                feature.auto_zwj,
                                feature.per_syllable,
                                &mut pending,
                            );
                        }
                    }
                }

                // Sort the stage's lookups and merge duplicates, OR-ing
                // their masks.
                let start = map.lookups[table_index].len();
                pending.sort_by_key(|l| l.index);
                pending.dedup_by(|b, a| {
                    if a.index == b.index {
                        a.mask |= b.mask;
                        a.auto_zwnj &= b.auto_zwnj;
                        a.auto_zwj &= b.auto_zwj;
                        true
                    } else {
                        false
                    }
                });
                map.lookups[table_index].append(&mut pending);
                debug_assert!(map.lookups[table_index].len() >= start);

                let pause = self.stage_pauses[table_index]
                    .iter()
                    .find(|(s, p)| *s == stage && p.is_some())
                    .and_then(|(_, p)| *p);
                map.stages[table_index].push(MapStage {
                    last_lookup: map.lookups[table_index].len(),
                    pause,
                });
            }
        }

        map
    }

    fn langsys(&self, table_index: usize) -> Option<super::layout::LangSys<'a>> {
        let table = self.face.layout_table(table_index)?;
        let script_index = self.script_index[table_index]?;
        table.langsys(script_index, self.lang_tag)
    }

    fn required_feature_index(&self, table_index: usize) -> Option<u16> {
        let langsys = self.langsys(table_index)?;
        (langsys.required_feature_index != NO_REQUIRED_FEATURE)
            .then_some(langsys.required_feature_index)
    }

    fn find_feature_index(&self, table_index: usize, tag: Tag) -> Option<u16> {
        let table = self.face.layout_table(table_index)?;
        let langsys = self.langsys(table_index)?;
        langsys
            .feature_indexes
            .iter()
            .find(|&i| table.feature_tag(i) == Some(tag))
    }

    #[allow(clippy::too_many_arguments)]
    fn add_lookups(
        &self,
        table_index: usize,
        feature_index: u16,
        variations_index: u32,
        mask: Mask,
        auto_zwnj: bool,
        auto_zwj: bool,
        per_syllable: bool,
        out: &mut Vec<MapLookup>,
    ) {
        let Some(table) = self.face.layout_table(table_index) else {
            return;
        };
        let Some(feature) = table.feature_with_variations(feature_index, variations_index)
        else {
            return;
        };
        let lookup_count = table.lookup_count();
        for index in feature.lookup_indexes.iter() {
            if index < lookup_count {
                out.push(MapLookup { index, auto_zwnj, auto_zwj, per_syllable, mask });
            }
        }
    }
}

/// Finds a feature index under any script, used by the GLOBAL_SEARCH
/// fallback.
fn find_feature_anywhere(table: &LayoutTable, tag: Tag) -> Option<u16> {
    (0..table.feature_count()).find(|&i| table.feature_tag(i) == Some(tag))
}

fn select_script(
    table: &LayoutTable,
    script_tags: &[Tag],
) -> (Option<u16>, Option<Tag>) {
    for &tag in script_tags {
        if let Some(index) = table.find_script(tag) {
            return (Some(index), Some(tag));
        }
    }

    // Fall back to the default script, then plain Latin.
    for tag in [
        Tag::from_bytes(b"DFLT"),
        Tag::from_bytes(b"dflt"),
        Tag::from_bytes(b"latn"),
    ] {
        if let Some(index) = table.find_script(tag) {
            return (Some(index), Some(tag));
        }
    }

    (None, None)
}

/// The OpenType script tags to try for a Unicode script, newest spec
/// first.
pub(crate) fn script_tags_for(s: Option<Script>) -> SmallVec<[Tag; 3]> {
    let mut tags = SmallVec::new();
    let Some(s) = s else {
        return tags;
    };

    let new_tag = |t: &[u8; 4]| Tag::from_bytes(t);

    match s {
        script::BENGALI => tags.extend_from_slice(&[new_tag(b"bng2"), new_tag(b"beng")]),
        script::DEVANAGARI => tags.extend_from_slice(&[new_tag(b"dev2"), new_tag(b"deva")]),
        script::GUJARATI => tags.extend_from_slice(&[new_tag(b"gjr2"), new_tag(b"gujr")]),
        script::GURMUKHI => tags.extend_from_slice(&[new_tag(b"gur2"), new_tag(b"guru")]),
        script::KANNADA => tags.extend_from_slice(&[new_tag(b"knd2"), new_tag(b"knda")]),
        script::MALAYALAM => tags.extend_from_slice(&[new_tag(b"mlm2"), new_tag(b"mlym")]),
        script::ORIYA => tags.extend_from_slice(&[new_tag(b"ory2"), new_tag(b"orya")]),
        script::TAMIL => tags.extend_from_slice(&[new_tag(b"tml2"), new_tag(b"taml")]),
        script::TELUGU => tags.extend_from_slice(&[new_tag(b"tel2"), new_tag(b"telu")]),
        script::MYANMAR => tags.extend_from_slice(&[new_tag(b"mym2"), new_tag(b"mymr")]),
        _ => tags.push(s.tag().to_lowercase()),
    }

    tags
}

/// A best-effort OpenType language tag: the first subtag, upper-cased and
/// space-padded, which covers the common three-letter registrations.
fn language_tag_for(props: &SegmentProperties) -> Option<Tag> {
    let lang = props.language.as_ref()?;
    let subtag = lang.as_str().split('-').next()?;
    if subtag.is_empty() || subtag.len() > 4 {
        return None;
    }
    Some(Tag::from_bytes_lossy(subtag.to_ascii_uppercase().as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_tag_fallback_chain() {
        let tags = script_tags_for(Some(script::DEVANAGARI));
        assert_eq!(tags.as_slice(), &[Tag::from_bytes(b"dev2"), Tag::from_bytes(b"deva")]);

        let tags = script_tags_for(Some(script::LATIN));
        assert_eq!(tags.as_slice(), &[Tag::from_bytes(b"latn")]);
    }
}
