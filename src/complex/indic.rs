//! The Indic shaper: syllable segmentation, base determination, and the
//! pre/post-base reordering dance, for the nine classical Indic scripts.
//!
//! The published Unicode Indic shaping specifications are the reference
//! for the reorder rules; pathological inputs may shape differently from
//! other engines, which the rules leave implementation-defined.

use crate::buffer::{Buffer, BufferScratchFlags, Mask};
use crate::common::{script, Script, Tag};
use crate::font::Font;
use crate::ot::feature;
use crate::ot::map::FeatureFlags;
use crate::plan::{ShapePlan, ShapePlanner};
use crate::unicode::DOTTED_CIRCLE;

use super::indic_table::{categorize, category as cat, position as pos};
use super::{ComplexShaper, ShapeNormalizationMode, ShaperData, ZeroWidthMarksMode, DEFAULT_SHAPER};

pub(crate) const INDIC_SHAPER: ComplexShaper = ComplexShaper {
    collect_features: Some(collect_features),
    override_features: Some(override_features),
    create_data: Some(data_create),
    preprocess_text: None,
    setup_masks: Some(setup_masks),
    normalization_mode: ShapeNormalizationMode::ComposedDiacriticsNoShortCircuit,
    zero_width_marks: ZeroWidthMarksMode::None,
    fallback_position: false,
    ..DEFAULT_SHAPER
};

/// Where a reph ends up after reordering.
#[derive(Clone, Copy, PartialEq, Debug)]
enum RephPosition {
    AfterMain,
    BeforeSub,
    AfterSub,
    BeforePost,
    AfterPost,
}

/// Where the base is searched from.
#[derive(Clone, Copy, PartialEq, Debug)]
enum BasePosition {
    Last,
    LastSinhala,
}

struct IndicConfig {
    script: Script,
    base_pos: BasePosition,
    reph_pos: RephPosition,
}

const INDIC_CONFIGS: &[IndicConfig] = &[
    IndicConfig {
        script: script::DEVANAGARI,
        base_pos: BasePosition::Last,
        reph_pos: RephPosition::BeforePost,
    },
    IndicConfig {
        script: script::BENGALI,
        base_pos: BasePosition::Last,
        reph_pos: RephPosition::AfterSub,
    },
    IndicConfig {
        script: script::GURMUKHI,
        base_pos: BasePosition::Last,
        reph_pos: RephPosition::BeforeSub,
    },
    IndicConfig {
        script: script::GUJARATI,
        base_pos: BasePosition::Last,
        reph_pos: RephPosition::BeforePost,
    },
    IndicConfig {
        script: script::ORIYA,
        base_pos: BasePosition::Last,
        reph_pos: RephPosition::AfterMain,
    },
    IndicConfig {
        script: script::TAMIL,
        base_pos: BasePosition::Last,
        reph_pos: RephPosition::AfterPost,
    },
    IndicConfig {
        script: script::TELUGU,
        base_pos: BasePosition::Last,
        reph_pos: RephPosition::AfterPost,
    },
    IndicConfig {
        script: script::KANNADA,
        base_pos: BasePosition::Last,
        reph_pos: RephPosition::AfterPost,
    },
    IndicConfig {
        script: script::MALAYALAM,
        base_pos: BasePosition::LastSinhala,
        reph_pos: RephPosition::AfterMain,
    },
];

fn config_for(script: Option<Script>) -> &'static IndicConfig {
    script
        .and_then(|s| INDIC_CONFIGS.iter().find(|c| c.script == s))
        .unwrap_or(&INDIC_CONFIGS[0])
}

// Features applied to specific syllable positions, in application order.
const BASIC_FEATURES: &[(Tag, bool)] = &[
    // (tag, global)
    (feature::NUKTA_FORMS, true),
    (feature::AKHAND, true),
    (feature::REPH_FORMS, false),
    (feature::RAKAR_FORMS, true),
    (feature::PRE_BASE_FORMS, false),
    (feature::BELOW_BASE_FORMS, false),
    (feature::ABOVE_BASE_FORMS, false),
    (feature::HALF_FORMS, false),
    (feature::POST_BASE_FORMS, false),
    (feature::CONJUNCT_FORMS, true),
];

const OTHER_FEATURES: &[Tag] = &[
    feature::INITIAL_FORMS,
    feature::PRE_BASE_SUBSTITUTIONS,
    feature::ABOVE_BASE_SUBSTITUTIONS,
    feature::BELOW_BASE_SUBSTITUTIONS,
    feature::POST_BASE_SUBSTITUTIONS,
    feature::HALANT_FORMS,
];

pub(crate) struct IndicShapePlan {
    config: &'static IndicConfig,
    rphf_mask: Mask,
    pref_mask: Mask,
    blwf_mask: Mask,
    half_mask: Mask,
    pstf_mask: Mask,
    init_mask: Mask,
}

fn collect_features(planner: &mut ShapePlanner) {
    let map = &mut planner.ot_map;

    // Buffer gets chopped into syllables first; every later feature
    // matches within one syllable only.
    map.add_gsub_pause(Some(setup_syllables));

    map.enable_feature(feature::LOCALIZED_FORMS, FeatureFlags::PER_SYLLABLE, 1);
    map.enable_feature(
        feature::GLYPH_COMPOSITION_DECOMPOSITION,
        FeatureFlags::PER_SYLLABLE,
        1,
    );

    map.add_gsub_pause(Some(initial_reordering));

    for &(tag, global) in BASIC_FEATURES {
        let mut flags = FeatureFlags::MANUAL_JOINERS | FeatureFlags::PER_SYLLABLE;
        if global {
            flags |= FeatureFlags::GLOBAL;
        }
        map.add_feature(tag, flags, 1);
        map.add_gsub_pause(None);
    }

    map.add_gsub_pause(Some(final_reordering));

    for &tag in OTHER_FEATURES {
        map.add_feature(
            tag,
            FeatureFlags::GLOBAL | FeatureFlags::MANUAL_JOINERS | FeatureFlags::PER_SYLLABLE,
            1,
        );
    }
}

fn override_features(planner: &mut ShapePlanner) {
    planner.ot_map.disable_feature(feature::STANDARD_LIGATURES);
}

fn data_create(plan: &ShapePlan) -> ShaperData {
    ShaperData::Indic(IndicShapePlan {
        config: config_for(plan.script()),
        rphf_mask: plan.ot_map.get_1_mask(feature::REPH_FORMS),
        pref_mask: plan.ot_map.get_1_mask(feature::PRE_BASE_FORMS),
        blwf_mask: plan.ot_map.get_1_mask(feature::BELOW_BASE_FORMS),
        half_mask: plan.ot_map.get_1_mask(feature::HALF_FORMS),
        pstf_mask: plan.ot_map.get_1_mask(feature::POST_BASE_FORMS),
        init_mask: plan.ot_map.get_1_mask(feature::INITIAL_FORMS),
    })
}

fn setup_masks(plan: &ShapePlan, _font: &Font, buffer: &mut Buffer) {
    // Only categorization happens here; masks are assigned after the
    // syllable machine has run.
    let script = plan.script();
    for info in buffer.info_mut() {
        let (category, position) = categorize(script, info.as_char());
        info.set_complex_category(category);
        info.set_complex_aux(position);
    }
}

// Syllable types, stored in the low bits of the syllable serial.
const CONSONANT_SYLLABLE: u8 = 0;
const VOWEL_SYLLABLE: u8 = 1;
const STANDALONE_CLUSTER: u8 = 2;
const SYMBOL_CLUSTER: u8 = 3;
const BROKEN_CLUSTER: u8 = 4;
const NON_INDIC_CLUSTER: u8 = 5;

pub(crate) fn syllable_type(info: &crate::buffer::GlyphInfo) -> u8 {
    info.syllable() & 0x0F
}

/// A cursor over the category array implementing the syllable grammar.
struct Matcher<'a> {
    cats: &'a [u8],
    pos: usize,
}

impl<'a> Matcher<'a> {
    fn peek(&self) -> u8 {
        self.cats.get(self.pos).copied().unwrap_or(cat::X)
    }

    fn eat(&mut self, category: u8) -> bool {
        if self.peek() == category {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_any(&mut self, categories: &[u8]) -> bool {
        if categories.contains(&self.peek()) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    // c = C | Ra
    fn eat_consonant(&mut self) -> bool {
        self.eat_any(&[cat::C, cat::RA, cat::CS, cat::V])
            && {
                // cn = c ZWJ? N?
                self.eat(cat::ZWJ);
                self.eat(cat::N);
                true
            }
    }

    // halant_group = (ZWJ|ZWNJ)? H (ZWJ N?)?
    fn eat_halant_group(&mut self) -> bool {
        let save = self.pos;
        self.eat_any(&[cat::ZWJ, cat::ZWNJ]);
        if !self.eat(cat::H) {
            self.pos = save;
            return false;
        }
        if self.eat(cat::ZWJ) {
            self.eat(cat::N);
        }
        true
    }

    // matra_group = (ZWJ|ZWNJ)* M N? H?
    fn eat_matra_group(&mut self) -> bool {
        let save = self.pos;
        while self.eat_any(&[cat::ZWJ, cat::ZWNJ]) {}
        if !self.eat(cat::M) {
            self.pos = save;
            return false;
        }
        self.eat(cat::N);
        self.eat(cat::H);
        true
    }

    // syllable_tail = SM* A* (VD handled as A)
    fn eat_tail(&mut self) {
        while self.eat_any(&[cat::SM, cat::A]) {}
    }

    // (cn halant_group){0,4} cn
    fn eat_consonant_chain(&mut self) -> bool {
        if !self.eat_consonant() {
            return false;
        }
        for _ in 0..4 {
            let save = self.pos;
            if !self.eat_halant_group() {
                break;
            }
            if !self.eat_consonant() {
                self.pos = save;
                break;
            }
        }
        true
    }

    fn eat_matras_or_halant(&mut self) {
        if self.eat_halant_group() {
            self.eat(cat::ZWNJ);
            return;
        }
        for _ in 0..4 {
            if !self.eat_matra_group() {
                break;
            }
        }
    }
}

/// Matches one syllable starting at `start`; returns (type, length).
fn match_syllable(cats: &[u8]) -> (u8, usize) {
    let mut m = Matcher { cats, pos: 0 };

    // consonant_syllable = (Repha|CS)? consonant_chain CM? matras tail
    let lead_repha = m.eat(cat::REPHA);
    if m.eat_consonant_chain() {
        m.eat(cat::CM);
        m.eat_matras_or_halant();
        m.eat_tail();
        return (CONSONANT_SYLLABLE, m.pos);
    }
    m.pos = 0;

    // vowel_syllable = Repha? V N? (consonant_chain)? matras tail
    let _ = lead_repha;
    m.eat(cat::REPHA);
    if m.eat(cat::V) {
        m.eat(cat::N);
        if m.eat_halant_group() {
            m.eat_consonant_chain();
        }
        m.eat_matras_or_halant();
        m.eat_tail();
        return (VOWEL_SYLLABLE, m.pos);
    }
    m.pos = 0;

    // standalone = (Repha|CS)? (PLACEHOLDER|DOTTED_CIRCLE) N? matras tail
    m.eat(cat::REPHA);
    if m.eat_any(&[cat::PLACEHOLDER, cat::DOTTED_CIRCLE]) {
        m.eat(cat::N);
        m.eat_matras_or_halant();
        m.eat_tail();
        return (STANDALONE_CLUSTER, m.pos);
    }
    m.pos = 0;

    // symbol_cluster = SYMBOL N? tail
    if m.eat(cat::SYMBOL) {
        m.eat(cat::N);
        m.eat_tail();
        return (SYMBOL_CLUSTER, m.pos);
    }
    m.pos = 0;

    // broken_cluster: marks with no base.
    if matches!(m.peek(), cat::N | cat::M | cat::SM | cat::A | cat::H | cat::RS) {
        while matches!(
            m.peek(),
            cat::N | cat::M | cat::SM | cat::A | cat::H | cat::RS | cat::ZWJ | cat::ZWNJ
        ) {
            m.pos += 1;
        }
        return (BROKEN_CLUSTER, m.pos);
    }

    (NON_INDIC_CLUSTER, 1)
}

fn setup_syllables(_plan: &ShapePlan, _font: &Font, buffer: &mut Buffer) {
    let cats: Vec<u8> = buffer.info().iter().map(|i| i.complex_category()).collect();

    let mut start = 0;
    let mut serial = 1u8;
    let mut has_broken = false;
    while start < cats.len() {
        let (kind, len) = match_syllable(&cats[start..]);
        let len = len.max(1);
        if kind == BROKEN_CLUSTER {
            has_broken = true;
        }
        let syllable = (serial << 4) | kind;
        for info in &mut buffer.info_mut()[start..start + len] {
            info.set_syllable(syllable);
        }
        serial = serial.wrapping_add(1);
        if serial == 16 {
            serial = 1;
        }
        start += len;
    }

    if has_broken {
        buffer.scratch_flags |= BufferScratchFlags::HAS_BROKEN_SYLLABLE;
    }
}

/// Inserts a dotted circle into broken syllables, giving the marks a base
/// to attach to.
fn insert_dotted_circles(font: &Font, buffer: &mut Buffer) {
    if !buffer
        .scratch_flags
        .contains(BufferScratchFlags::HAS_BROKEN_SYLLABLE)
        || buffer
            .flags
            .contains(crate::buffer::BufferFlags::DO_NOT_INSERT_DOTTED_CIRCLE)
    {
        return;
    }
    let Some(dotted_circle) = font.nominal_glyph(DOTTED_CIRCLE) else {
        return;
    };

    let count = buffer.len;
    buffer.clear_output();
    let mut last_syllable = 0;
    while buffer.idx < count && buffer.successful {
        let syllable = buffer.cur(0).syllable();
        if syllable_type(buffer.cur(0)) == BROKEN_CLUSTER && last_syllable != syllable {
            last_syllable = syllable;

            let mut info = *buffer.cur(0);
            info.codepoint = dotted_circle;
            info.set_complex_category(cat::DOTTED_CIRCLE);
            info.set_complex_aux(pos::BASE_C);
            buffer.output_info(info);
        } else {
            last_syllable = syllable;
        }
        buffer.next_glyph();
    }
    buffer.sync();
}

fn initial_reordering(plan: &ShapePlan, font: &Font, buffer: &mut Buffer) {
    let ShaperData::Indic(indic_plan) = &plan.data else {
        return;
    };

    insert_dotted_circles(font, buffer);

    let mut start = 0;
    while start < buffer.len {
        let syllable = buffer.info[start].syllable();
        let mut end = start + 1;
        while end < buffer.len && buffer.info[end].syllable() == syllable {
            end += 1;
        }
        match syllable_type(&buffer.info[start]) {
            CONSONANT_SYLLABLE | BROKEN_CLUSTER | STANDALONE_CLUSTER => {
                reorder_syllable(indic_plan, buffer, start, end);
            }
            VOWEL_SYLLABLE => {
                reorder_syllable(indic_plan, buffer, start, end);
            }
            _ => {}
        }
        start = end;
    }
}

fn is_consonantish(category: u8) -> bool {
    matches!(category, cat::C | cat::RA | cat::CS | cat::V | cat::DOTTED_CIRCLE | cat::PLACEHOLDER)
}

fn reorder_syllable(plan: &IndicShapePlan, buffer: &mut Buffer, start: usize, end: usize) {
    // 1. Reph: an initial Ra + H followed by more material becomes a reph.
    let mut base = end;
    let mut has_reph = false;

    let mut i = start;
    if plan.rphf_mask != 0
        && i + 2 < end
        && buffer.info[i].complex_category() == cat::RA
        && buffer.info[i + 1].complex_category() == cat::H
        && is_consonantish(buffer.info[i + 2].complex_category())
    {
        has_reph = true;
        buffer.info[i].set_complex_aux(pos::RA_TO_BECOME_REPH);
        buffer.info[i + 1].set_complex_aux(pos::RA_TO_BECOME_REPH);
        i += 2;
    } else if buffer.info[i].complex_category() == cat::REPHA {
        has_reph = true;
        buffer.info[i].set_complex_aux(pos::RA_TO_BECOME_REPH);
        i += 1;
    }

    // 2. Base: the last consonant, except post-base forms (a consonant
    //    preceded by a halant that will take blwf/pstf) stay post-base.
    match plan.config.base_pos {
        BasePosition::Last | BasePosition::LastSinhala => {
            let mut k = end;
            while k > i {
                k -= 1;
                if is_consonantish(buffer.info[k].complex_category()) {
                    base = k;
                    break;
                }
            }
        }
    }
    if base == end && i < end {
        base = i;
    }

    for k in start..base {
        let info = &mut buffer.info[k];
        if is_consonantish(info.complex_category()) && info.complex_aux() != pos::RA_TO_BECOME_REPH
        {
            info.set_complex_aux(pos::PRE_C);
        }
    }
    buffer.info[base].set_complex_aux(pos::BASE_C);
    for k in base + 1..end {
        let info = &mut buffer.info[k];
        if is_consonantish(info.complex_category()) {
            info.set_complex_aux(pos::BELOW_C);
        }
    }

    // Halants attach to the position of what precedes them.
    for k in start + 1..end {
        if buffer.info[k].complex_category() == cat::H {
            let prev_pos = buffer.info[k - 1].complex_aux();
            buffer.info[k].set_complex_aux(prev_pos);
        }
    }

    // 3. Masks.
    for k in start..end {
        let info = &mut buffer.info[k];
        let mask = match info.complex_aux() {
            pos::RA_TO_BECOME_REPH => plan.rphf_mask,
            pos::PRE_C => plan.half_mask,
            pos::BELOW_C => plan.blwf_mask | plan.pstf_mask | plan.pref_mask,
            _ => 0,
        };
        info.mask |= mask;
    }

    // 4. Sort by position, stable, so pre-base matras land before the
    //    base. The reph pair sorts to the front, where the rphf pass
    //    expects it; final reordering moves it into place.
    let sorted: Vec<crate::buffer::GlyphInfo> = {
        let mut v = buffer.info[start..end].to_vec();
        v.sort_by_key(|info| info.complex_aux());
        v
    };
    buffer.info[start..end].copy_from_slice(&sorted);
    if has_reph || base != end {
        buffer.merge_clusters(start, end);
    }
}

fn final_reordering(plan: &ShapePlan, _font: &Font, buffer: &mut Buffer) {
    let ShaperData::Indic(indic_plan) = &plan.data else {
        return;
    };

    let len = buffer.len;
    let mut start = 0;
    while start < len {
        let syllable = buffer.info[start].syllable();
        let mut end = start + 1;
        while end < len && buffer.info[end].syllable() == syllable {
            end += 1;
        }

        final_reorder_syllable(indic_plan, buffer, start, end);
        start = end;
    }
}

fn final_reorder_syllable(plan: &IndicShapePlan, buffer: &mut Buffer, start: usize, end: usize) {
    // Move a formed reph to its script's position. The reph glyph still
    // carries the RA_TO_BECOME_REPH position.
    let reph = (start..end)
        .find(|&i| buffer.info[i].complex_aux() == pos::RA_TO_BECOME_REPH);
    if let Some(reph_index) = reph {
        // Locate the base.
        let base = (start..end)
            .find(|&i| buffer.info[i].complex_aux() == pos::BASE_C)
            .unwrap_or(end.saturating_sub(1));

        let target = match plan.config.reph_pos {
            RephPosition::AfterMain => base + 1,
            RephPosition::BeforeSub | RephPosition::AfterSub | RephPosition::BeforePost => {
                // After the below-base forms.
                let mut t = base + 1;
                while t < end && buffer.info[t].complex_aux() <= pos::AFTER_SUB {
                    t += 1;
                }
                t
            }
            RephPosition::AfterPost => {
                // Before trailing syllable modifiers.
                let mut t = end;
                while t > base + 1 && buffer.info[t - 1].complex_aux() == pos::SMVD {
                    t -= 1;
                }
                t
            }
        }
        .min(end);

        if reph_index + 1 < target {
            // Rotate the reph (and its halant, if unligated) rightwards.
            let reph_len = if reph_index + 1 < end
                && buffer.info[reph_index + 1].complex_aux() == pos::RA_TO_BECOME_REPH
            {
                2
            } else {
                1
            };
            if reph_index + reph_len <= target {
                buffer.merge_clusters(start, end);
                let moved: Vec<crate::buffer::GlyphInfo> =
                    buffer.info[reph_index..reph_index + reph_len].to_vec();
                buffer
                    .info
                    .copy_within(reph_index + reph_len..target, reph_index);
                let dst = target - reph_len;
                buffer.info[dst..target].copy_from_slice(&moved);
                for k in reph_index..target {
                    buffer.info[k].set_complex_aux(pos::AFTER_POST);
                }
            }
        }
    }

    // Initial forms: a pre-base matra at the very start of the syllable
    // takes 'init' in scripts that have it (Bengali).
    if plan.init_mask != 0
        && buffer.info[start].complex_aux() == pos::PRE_M
        && (start == 0
            || !matches!(
                buffer.info[start - 1].general_category(),
                crate::unicode::GeneralCategory::Format
                    | crate::unicode::GeneralCategory::NonspacingMark
                    | crate::unicode::GeneralCategory::LowercaseLetter
                    | crate::unicode::GeneralCategory::OtherLetter
            ))
    {
        buffer.info[start].mask |= plan.init_mask;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cats_of(text: &str) -> Vec<u8> {
        text.chars()
            .map(|c| categorize(Some(script::DEVANAGARI), c).0)
            .collect()
    }

    #[test]
    fn basic_categories() {
        // ka, virama, ssa (conjunct "ksha")
        let cats = cats_of("\u{0915}\u{094D}\u{0937}");
        assert_eq!(cats, [cat::C, cat::H, cat::C]);
    }

    #[test]
    fn ra_is_special() {
        assert_eq!(cats_of("\u{0930}"), [cat::RA]);
    }

    #[test]
    fn simple_consonant_syllable() {
        // ka + virama + ka + i-matra
        let cats = cats_of("\u{0915}\u{094D}\u{0915}\u{093F}");
        let (kind, len) = match_syllable(&cats);
        assert_eq!(kind, CONSONANT_SYLLABLE);
        assert_eq!(len, 4);
    }

    #[test]
    fn vowel_syllable() {
        let cats = cats_of("\u{0905}\u{0902}"); // A + anusvara
        let (kind, len) = match_syllable(&cats);
        assert_eq!(kind, VOWEL_SYLLABLE);
        assert_eq!(len, 2);
    }

    #[test]
    fn broken_cluster() {
        let cats = cats_of("\u{093F}"); // lone matra
        let (kind, len) = match_syllable(&cats);
        assert_eq!(kind, BROKEN_CLUSTER);
        assert_eq!(len, 1);
    }

    #[test]
    fn pre_base_matra_sorts_before_base() {
        // ka + i-matra: the matra must precede the consonant after
        // reordering, mirroring the visual order.
        let mut buffer = Buffer::new();
        buffer.push_str("\u{0915}\u{093F}");
        for i in 0..buffer.len {
            let (c, p) = categorize(Some(script::DEVANAGARI), buffer.info[i].as_char());
            buffer.info[i].set_complex_category(c);
            buffer.info[i].set_complex_aux(p);
        }

        let plan = IndicShapePlan {
            config: config_for(Some(script::DEVANAGARI)),
            rphf_mask: 0,
            pref_mask: 0,
            blwf_mask: 0,
            half_mask: 0,
            pstf_mask: 0,
            init_mask: 0,
        };
        reorder_syllable(&plan, &mut buffer, 0, 2);

        let cps: Vec<u32> = buffer.info().iter().map(|i| i.codepoint).collect();
        assert_eq!(cps, [0x093F, 0x0915]);
    }
}
