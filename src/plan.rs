//! Shape plans: precomputed per-(face, properties, features, coords)
//! execution state, and the per-face plan cache.

use std::sync::Arc;

use crate::common::{Direction, Feature, SegmentProperties, Tag};
use crate::complex::{ComplexShaper, ShaperData};
use crate::face::Face;
use crate::font::Font;
use crate::ot::map::{FeatureFlags, Map, MapBuilder, TABLE_GSUB};
use crate::ot::feature;
use crate::{Mask, FEATURE_GLOBAL_END, FEATURE_GLOBAL_START};

/// The planning-time view handed to complex shapers.
pub(crate) struct ShapePlanner<'a> {
    pub props: SegmentProperties,
    pub ot_map: MapBuilder<'a>,
    pub shaper: &'static ComplexShaper,
}

impl<'a> ShapePlanner<'a> {
    pub fn script(&self) -> Option<crate::Script> {
        self.props.script
    }
}

/// The value-equality key of a plan.
#[derive(PartialEq, Clone)]
pub(crate) struct ShapePlanKey {
    props: SegmentProperties,
    user_features: Vec<Feature>,
    coords: Vec<i16>,
}

impl ShapePlanKey {
    fn new(props: &SegmentProperties, user_features: &[Feature], coords: &[i16]) -> Self {
        let mut user_features = user_features.to_vec();
        // Fold equivalent ranges so differing spans hash the same: any
        // non-global range behaves identically for planning purposes.
        for f in &mut user_features {
            if !(f.start == FEATURE_GLOBAL_START && f.end == FEATURE_GLOBAL_END) {
                f.start = 1;
                f.end = 2;
            }
        }
        ShapePlanKey {
            props: props.clone(),
            user_features,
            coords: coords.to_vec(),
        }
    }
}

/// A compiled shaping plan. Immutable once built; cheap to reuse across
/// buffers with the same segment properties.
pub struct ShapePlan {
    pub(crate) props: SegmentProperties,
    pub(crate) shaper: &'static ComplexShaper,
    pub(crate) ot_map: Map,
    pub(crate) data: ShaperData,

    pub(crate) frac_mask: Mask,
    pub(crate) numr_mask: Mask,
    pub(crate) dnom_mask: Mask,
    pub(crate) rtlm_mask: Mask,

    pub(crate) has_frac: bool,
    pub(crate) has_gpos_mark: bool,
    pub(crate) apply_gpos: bool,
    pub(crate) adjust_mark_positioning_when_zeroing: bool,
    pub(crate) fallback_mark_positioning: bool,

    key: ShapePlanKey,
}

impl ShapePlan {
    /// Plans shaping for the font's face, variation coords included.
    pub fn new<'a>(font: &'a Font<'a>, props: &SegmentProperties, user_features: &[Feature]) -> Self {
        Self::new_internal(font.face(), props, user_features, font.coords())
    }

    pub(crate) fn new_internal<'a>(
        face: &'a Face<'a>,
        props: &SegmentProperties,
        user_features: &[Feature],
        coords: &[i16],
    ) -> Self {
        let ot_map = MapBuilder::new(face, props);
        let shaper = crate::complex::categorize(props.script, ot_map.chosen_script(TABLE_GSUB));

        log::debug!(
            "planning shape: script={:?} shaper chosen, {} user features",
            props.script,
            user_features.len()
        );

        let mut planner = ShapePlanner {
            props: props.clone(),
            ot_map,
            shaper,
        };
        collect_features(&mut planner, user_features);

        let ot_map = planner.ot_map.compile(coords);

        let frac_mask = ot_map.get_1_mask(feature::FRACTIONS);
        let numr_mask = ot_map.get_1_mask(feature::NUMERATORS);
        let dnom_mask = ot_map.get_1_mask(feature::DENOMINATORS);
        let rtlm_mask = ot_map.get_1_mask(feature::RIGHT_TO_LEFT_MIRRORED_FORMS);

        let apply_gpos = face.gpos().is_some();
        let has_gpos_mark = ot_map.get_1_mask(feature::MARK_POSITIONING) != 0;
        let adjust_mark_positioning_when_zeroing = !apply_gpos;
        let fallback_mark_positioning =
            adjust_mark_positioning_when_zeroing && shaper.fallback_position;

        let mut plan = ShapePlan {
            props: props.clone(),
            shaper,
            ot_map,
            data: ShaperData::None,
            frac_mask,
            numr_mask,
            dnom_mask,
            rtlm_mask,
            has_frac: frac_mask != 0 || (numr_mask != 0 && dnom_mask != 0),
            has_gpos_mark,
            apply_gpos,
            adjust_mark_positioning_when_zeroing,
            fallback_mark_positioning,
            key: ShapePlanKey::new(props, user_features, coords),
        };

        if let Some(create) = shaper.create_data {
            let data = create(&plan);
            plan.data = data;
        }

        plan
    }

    /// The cached variant: reuses a structurally equal plan from the
    /// face's plan list, inserting on miss. Races lose gracefully: the
    /// loser reuses the winner's identical plan.
    pub fn cached<'a>(
        font: &'a Font<'a>,
        props: &SegmentProperties,
        user_features: &[Feature],
    ) -> Arc<ShapePlan> {
        Self::new_cached(font.face(), props, user_features, font.coords())
    }

    pub(crate) fn new_cached<'a>(
        face: &'a Face<'a>,
        props: &SegmentProperties,
        user_features: &[Feature],
        coords: &[i16],
    ) -> Arc<ShapePlan> {
        let key = ShapePlanKey::new(props, user_features, coords);

        {
            let cache = face
                .plan_cache
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(plan) = cache.find(&key) {
                return plan;
            }
        }

        // Built outside the lock; construction is idempotent, so a racing
        // creator merely does redundant work.
        let plan = Arc::new(ShapePlan::new_internal(face, props, user_features, coords));

        let mut cache = face
            .plan_cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(existing) = cache.find(&key) {
            return existing;
        }
        cache.insert(plan.clone());
        plan
    }

    pub fn direction(&self) -> Direction {
        self.props.direction
    }

    pub fn script(&self) -> Option<crate::Script> {
        self.props.script
    }

    /// The OpenType script tag shaping resolved to, per table.
    pub fn chosen_script(&self, table_index: usize) -> Option<Tag> {
        self.ot_map.chosen_script[table_index.min(1)]
    }

    pub(crate) fn matches(&self, key: &ShapePlanKey) -> bool {
        self.key == *key
    }
}

/// The per-face list of cached plans; the distinct-plan count per face is
/// small, so a linear scan wins.
pub(crate) struct PlanCache {
    plans: Vec<Arc<ShapePlan>>,
}

impl PlanCache {
    pub fn new() -> Self {
        PlanCache { plans: Vec::new() }
    }

    fn find(&self, key: &ShapePlanKey) -> Option<Arc<ShapePlan>> {
        self.plans.iter().find(|p| p.matches(key)).cloned()
    }

    fn insert(&mut self, plan: Arc<ShapePlan>) {
        self.plans.push(plan);
    }
}

static COMMON_FEATURES: &[(Tag, FeatureFlags)] = &[
    (feature::ABOVE_BASE_MARK_POSITIONING, FeatureFlags::GLOBAL),
    (feature::BELOW_BASE_MARK_POSITIONING, FeatureFlags::GLOBAL),
    (feature::GLYPH_COMPOSITION_DECOMPOSITION, FeatureFlags::GLOBAL),
    (feature::LOCALIZED_FORMS, FeatureFlags::GLOBAL),
    (feature::MARK_POSITIONING, FeatureFlags::GLOBAL_MANUAL_JOINERS),
    (feature::MARK_TO_MARK_POSITIONING, FeatureFlags::GLOBAL_MANUAL_JOINERS),
    (feature::REQUIRED_LIGATURES, FeatureFlags::GLOBAL),
];

static HORIZONTAL_FEATURES: &[(Tag, FeatureFlags)] = &[
    (feature::CONTEXTUAL_ALTERNATES, FeatureFlags::GLOBAL),
    (feature::CONTEXTUAL_LIGATURES, FeatureFlags::GLOBAL),
    (feature::CURSIVE_POSITIONING, FeatureFlags::GLOBAL),
    (feature::DISTANCES, FeatureFlags::GLOBAL),
    (feature::KERNING, FeatureFlags::GLOBAL_HAS_FALLBACK),
    (feature::STANDARD_LIGATURES, FeatureFlags::GLOBAL),
    (feature::REQUIRED_CONTEXTUAL_ALTERNATES, FeatureFlags::GLOBAL),
];

fn collect_features(planner: &mut ShapePlanner, user_features: &[Feature]) {
    let map = &mut planner.ot_map;

    map.enable_feature(Tag::from_bytes(b"rvrn"), FeatureFlags::empty(), 1);
    map.add_gsub_pause(None);

    match planner.props.direction {
        Direction::LeftToRight => {
            map.enable_feature(feature::LEFT_TO_RIGHT_ALTERNATES, FeatureFlags::empty(), 1);
            map.enable_feature(feature::LEFT_TO_RIGHT_MIRRORED_FORMS, FeatureFlags::empty(), 1);
        }
        Direction::RightToLeft => {
            map.enable_feature(feature::RIGHT_TO_LEFT_ALTERNATES, FeatureFlags::empty(), 1);
            map.add_feature(feature::RIGHT_TO_LEFT_MIRRORED_FORMS, FeatureFlags::empty(), 1);
        }
        _ => {}
    }

    // Automatic fractions.
    map.add_feature(feature::FRACTIONS, FeatureFlags::empty(), 1);
    map.add_feature(feature::NUMERATORS, FeatureFlags::empty(), 1);
    map.add_feature(feature::DENOMINATORS, FeatureFlags::empty(), 1);

    if let Some(collect) = planner.shaper.collect_features {
        collect(planner);
    }

    let map = &mut planner.ot_map;
    for &(tag, flags) in COMMON_FEATURES {
        map.enable_feature(tag, flags, 1);
    }

    if planner.props.direction.is_horizontal() {
        for &(tag, flags) in HORIZONTAL_FEATURES {
            map.add_feature(tag, flags, 1);
        }
    } else {
        // "vert" is searched globally: even fonts that misdeclare their
        // script tables want vertical forms applied.
        map.enable_feature(
            feature::VERTICAL_WRITING,
            FeatureFlags::GLOBAL_SEARCH,
            1,
        );
    }

    for f in user_features {
        let flags = if f.is_global() {
            FeatureFlags::GLOBAL
        } else {
            FeatureFlags::empty()
        };
        map.add_feature(f.tag, flags, f.value);
    }

    if let Some(override_fn) = planner.shaper.override_features {
        override_fn(planner);
    }
}
