//! The public shaping entry points.

use crate::buffer::{GlyphBuffer, UnicodeBuffer};
use crate::common::{Feature, SegmentProperties};
use crate::font::Font;
use crate::plan::ShapePlan;

/// Shapes the buffer's content and turns it into positioned glyphs.
///
/// Missing segment properties are guessed from the content. The shape
/// plan is pulled from (or inserted into) the face's plan cache.
pub fn shape<'a>(font: &'a Font<'a>, features: &[Feature], buffer: UnicodeBuffer) -> GlyphBuffer {
    let mut buffer = buffer;
    buffer.guess_segment_properties();

    let props = SegmentProperties {
        direction: buffer.0.direction,
        script: buffer.0.script,
        language: buffer.0.language.clone(),
    };
    let plan = ShapePlan::new_cached(font.face(), &props, features, font.coords());
    shape_with_plan(font, &plan, features, buffer)
}

/// Shapes with a precomputed plan. The plan's segment properties must
/// match the buffer's.
pub fn shape_with_plan(
    font: &Font,
    plan: &ShapePlan,
    features: &[Feature],
    buffer: UnicodeBuffer,
) -> GlyphBuffer {
    let mut inner = buffer.0;
    debug_assert_eq!(plan.direction(), inner.direction);

    if !inner.is_empty() {
        inner.enter();
        crate::ot::shape::shape_internal(plan, font, &mut inner, features);
        if inner.max_ops <= 0 {
            inner.shaping_failed = true;
            log::debug!("shaping op budget exhausted; output may be partial");
        }
        inner.leave();
    }

    GlyphBuffer(inner)
}
