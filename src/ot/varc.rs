//! The variable-composite glyph table (`VARC`) and its recursive
//! composition engine.
//!
//! Each covered glyph is a sequence of component records in a compact
//! variable-length encoding: flags, a 16- or 24-bit glyph id, an optional
//! visibility condition, optional per-axis coordinate overrides, and up
//! to nine optional transform components with per-field fixed-point
//! divisors. Drawing composes the affine transforms and recurses, bounded
//! by a visited set plus edge and depth budgets.

use crate::draw::{DecomposedTransform, DrawSession, Transform};
use crate::font::Font;
use crate::parser::{read_at, Offset32, Stream, U24};
use crate::sanitize::Sanitizer;

use super::layout::Coverage;
use super::var::{decode_tuple_values, NormalizedCoord};

const MAX_DEPTH: u32 = 6;
const MAX_EDGES: i32 = 64;

mod flags {
    pub const RESET_UNSPECIFIED_AXES: u32 = 0x0000_0001;
    pub const HAVE_AXES: u32 = 0x0000_0002;
    pub const AXIS_VALUES_HAVE_VARIATION: u32 = 0x0000_0004;
    pub const TRANSFORM_HAS_VARIATION: u32 = 0x0000_0008;
    pub const HAVE_TRANSLATE_X: u32 = 0x0000_0010;
    pub const HAVE_TRANSLATE_Y: u32 = 0x0000_0020;
    pub const HAVE_ROTATION: u32 = 0x0000_0040;
    pub const HAVE_CONDITION: u32 = 0x0000_0080;
    pub const HAVE_SCALE_X: u32 = 0x0000_0100;
    pub const HAVE_SCALE_Y: u32 = 0x0000_0200;
    pub const HAVE_TCENTER_X: u32 = 0x0000_0400;
    pub const HAVE_TCENTER_Y: u32 = 0x0000_0800;
    pub const GID_IS_24BIT: u32 = 0x0000_1000;
    pub const HAVE_SKEW_X: u32 = 0x0000_2000;
    pub const HAVE_SKEW_Y: u32 = 0x0000_4000;
    pub const RESERVED_MASK: u32 = 0xFFFF_8000;
}

pub(crate) struct VarcTable<'a> {
    coverage: Coverage<'a>,
    condition_list: Option<&'a [u8]>,
    axis_indices_list: Option<&'a [u8]>,
    glyph_records: Index32<'a>,
}

impl<'a> VarcTable<'a> {
    pub fn parse(data: &'a [u8], s: &mut Sanitizer) -> Option<Self> {
        let major = read_at::<u16>(data, 0)?;
        if major != 1 {
            return None;
        }
        if !s.check_range(0, 24) {
            return None;
        }

        let coverage = Coverage::parse(read_at::<Offset32>(data, 4)?.resolve(data)?)?;
        // multiVarStore at offset 8: deltas on axis values and transforms
        // are not evaluated; the records still decode fully.
        let condition_list = read_at::<Offset32>(data, 12).and_then(|o| o.resolve(data));
        let axis_indices_list = read_at::<Offset32>(data, 16).and_then(|o| o.resolve(data));
        let glyph_records = Index32::parse(read_at::<Offset32>(data, 20)?.resolve(data)?)?;

        if !s.check_ops(coverage.population()) {
            return None;
        }

        Some(VarcTable { coverage, condition_list, axis_indices_list, glyph_records })
    }

    pub fn covers(&self, glyph: u32) -> bool {
        self.coverage.contains(glyph as u16)
    }

    fn glyph_record(&self, glyph: u32) -> Option<&'a [u8]> {
        let index = self.coverage.get(glyph as u16)?;
        self.glyph_records.get(u32::from(index))
    }

    fn condition_holds(&self, condition_index: u32, coords: &[NormalizedCoord]) -> bool {
        let Some(list) = self.condition_list else {
            return true;
        };
        let Some(count) = read_at::<u32>(list, 0) else {
            return true;
        };
        if condition_index >= count {
            return true;
        }
        let Some(cond) = read_at::<Offset32>(list, 4 + condition_index as usize * 4)
            .and_then(|o| o.resolve(list))
        else {
            return true;
        };

        evaluate_condition(cond, coords)
    }

    fn axis_indices(&self, index: u32) -> Option<Vec<u32>> {
        let list = Index32::parse(self.axis_indices_list?)?;
        let entry = list.get(index)?;
        let mut s = Stream::new(entry);
        let count = s.read_u32_var()? as usize;
        let values = decode_tuple_values(&mut s, count)?;
        Some(values.into_iter().map(|v| v as u32).collect())
    }

}

fn evaluate_condition(cond: &[u8], coords: &[NormalizedCoord]) -> bool {
    let Some(format) = read_at::<u16>(cond, 0) else {
        return true;
    };
    match format {
        // Axis range.
        1 => {
            let Some(axis_index) = read_at::<u16>(cond, 2) else { return true };
            let Some(min) = read_at::<i16>(cond, 4) else { return true };
            let Some(max) = read_at::<i16>(cond, 6) else { return true };
            let coord = coords.get(usize::from(axis_index)).copied().unwrap_or(0);
            min <= coord && coord <= max
        }
        // Conjunction / disjunction of sub-conditions.
        3 | 4 => {
            let Some(count) = read_at::<u16>(cond, 2) else { return true };
            let mut result = format == 3;
            for i in 0..usize::from(count) {
                let sub = read_at::<Offset32>(cond, 4 + i * 4)
                    .and_then(|o| o.resolve(cond))
                    .map_or(true, |c| evaluate_condition(c, coords));
                if format == 3 {
                    result &= sub;
                } else {
                    result |= sub;
                }
            }
            result
        }
        // Negation.
        5 => {
            read_at::<Offset32>(cond, 2)
                .and_then(|o| o.resolve(cond))
                .map_or(true, |c| !evaluate_condition(c, coords))
        }
        _ => true,
    }
}

/// A CFF2-style index: 32-bit count, variable-size offsets, packed data.
#[derive(Clone, Copy)]
struct Index32<'a> {
    count: u32,
    off_size: u8,
    offsets: &'a [u8],
    data: &'a [u8],
}

impl<'a> Index32<'a> {
    fn parse(data: &'a [u8]) -> Option<Self> {
        let count = read_at::<u32>(data, 0)?;
        if count == 0 {
            return Some(Index32 { count: 0, off_size: 1, offsets: &[], data: &[] });
        }
        let off_size = read_at::<u8>(data, 4)?;
        if !(1..=4).contains(&off_size) {
            return None;
        }
        let offsets_len = (count as usize + 1) * usize::from(off_size);
        let offsets = data.get(5..5 + offsets_len)?;
        let data = data.get(5 + offsets_len..)?;
        Some(Index32 { count, off_size, offsets, data })
    }

    fn offset_at(&self, index: usize) -> Option<usize> {
        let size = usize::from(self.off_size);
        let start = index * size;
        let bytes = self.offsets.get(start..start + size)?;
        let mut v = 0usize;
        for b in bytes {
            v = (v << 8) | usize::from(*b);
        }
        // CFF offsets are 1-based.
        v.checked_sub(1)
    }

    fn get(&self, index: u32) -> Option<&'a [u8]> {
        if index >= self.count {
            return None;
        }
        let start = self.offset_at(index as usize)?;
        let end = self.offset_at(index as usize + 1)?;
        if end < start {
            return None;
        }
        self.data.get(start..end)
    }
}

/// Draws a VARC glyph through the session. Returns false when the glyph
/// is not a composite after all or decoding failed; the caller falls
/// back to plain outlines.
pub(crate) fn draw_glyph(
    font: &Font,
    varc: &VarcTable,
    glyph: u32,
    session: &mut DrawSession,
) -> bool {
    let mut visited = Vec::new();
    let mut edges_left = MAX_EDGES;
    draw_glyph_at(
        font,
        varc,
        glyph,
        font.coords(),
        &Transform::default(),
        session,
        &mut visited,
        &mut edges_left,
        MAX_DEPTH,
    )
    .is_some()
}

#[allow(clippy::too_many_arguments)]
fn draw_glyph_at(
    font: &Font,
    varc: &VarcTable,
    glyph: u32,
    coords: &[NormalizedCoord],
    transform: &Transform,
    session: &mut DrawSession,
    visited: &mut Vec<u32>,
    edges_left: &mut i32,
    depth_left: u32,
) -> Option<()> {
    if depth_left == 0 || *edges_left <= 0 {
        return None;
    }
    *edges_left -= 1;

    if visited.contains(&glyph) {
        return None;
    }

    let Some(record) = varc.glyph_record(glyph) else {
        // Not a composite: draw the plain outline under the accumulated
        // transform.
        font.draw_outline(glyph, transform, session);
        return Some(());
    };

    visited.push(glyph);

    let mut s = Stream::new(record);
    while !s.at_end() {
        if draw_component(
            font, varc, &mut s, coords, transform, session, visited, edges_left, depth_left,
        )
        .is_none()
        {
            break;
        }
    }

    visited.pop();
    Some(())
}

#[allow(clippy::too_many_arguments)]
fn draw_component(
    font: &Font,
    varc: &VarcTable,
    s: &mut Stream,
    coords: &[NormalizedCoord],
    parent_transform: &Transform,
    session: &mut DrawSession,
    visited: &mut Vec<u32>,
    edges_left: &mut i32,
    depth_left: u32,
) -> Option<()> {
    let component_flags = s.read_u32_var()?;

    let gid = if component_flags & flags::GID_IS_24BIT != 0 {
        s.read::<U24>()?.0
    } else {
        u32::from(s.read::<u16>()?)
    };

    // Condition.
    let mut show = true;
    if component_flags & flags::HAVE_CONDITION != 0 {
        let condition_index = s.read_u32_var()?;
        show = varc.condition_holds(condition_index, coords);
    }

    // Axis value overrides.
    let mut axis_indices = Vec::new();
    let mut axis_values = Vec::new();
    if component_flags & flags::HAVE_AXES != 0 {
        let axis_indices_index = s.read_u32_var()?;
        axis_indices = varc.axis_indices(axis_indices_index).unwrap_or_default();
        axis_values = decode_tuple_values(s, axis_indices.len())?;
    }

    // Variation deltas on the axis values: decoded, not applied (see the
    // design ledger).
    if component_flags & flags::AXIS_VALUES_HAVE_VARIATION != 0 {
        let _axis_values_var_index = s.read_u32_var()?;
    }
    if component_flags & flags::TRANSFORM_HAS_VARIATION != 0 {
        let _transform_var_index = s.read_u32_var()?;
    }

    // Transform components, each an i16 with its own divisor.
    let mut t = DecomposedTransform::default();
    let mut read_part = |s: &mut Stream, flag: u32, divisor: f32| -> Option<Option<f32>> {
        if component_flags & flag != 0 {
            let raw = s.read::<i16>()?;
            Some(Some(f32::from(raw) / divisor))
        } else {
            Some(None)
        }
    };

    if let Some(v) = read_part(s, flags::HAVE_TRANSLATE_X, 1.0)? {
        t.translate_x = v;
    }
    if let Some(v) = read_part(s, flags::HAVE_TRANSLATE_Y, 1.0)? {
        t.translate_y = v;
    }
    if let Some(v) = read_part(s, flags::HAVE_ROTATION, 4096.0)? {
        t.rotation = v;
    }
    if let Some(v) = read_part(s, flags::HAVE_SCALE_X, 1024.0)? {
        t.scale_x = v;
    }
    let mut have_scale_y = false;
    if let Some(v) = read_part(s, flags::HAVE_SCALE_Y, 1024.0)? {
        t.scale_y = v;
        have_scale_y = true;
    }
    if let Some(v) = read_part(s, flags::HAVE_SKEW_X, 4096.0)? {
        t.skew_x = v;
    }
    if let Some(v) = read_part(s, flags::HAVE_SKEW_Y, 4096.0)? {
        t.skew_y = v;
    }
    if let Some(v) = read_part(s, flags::HAVE_TCENTER_X, 1.0)? {
        t.t_center_x = v;
    }
    if let Some(v) = read_part(s, flags::HAVE_TCENTER_Y, 1.0)? {
        t.t_center_y = v;
    }

    // Skip reserved extension records.
    let mut reserved = component_flags & flags::RESERVED_MASK;
    while reserved != 0 {
        let _ = s.read_u32_var()?;
        reserved &= reserved - 1;
    }

    // Parsing is over now.

    if !show {
        return Some(());
    }

    if !have_scale_y {
        t.scale_y = t.scale_x;
    }

    // Component coordinates: overlay the overrides onto the parent's
    // coords, or onto zeros when the component resets unspecified axes.
    let mut component_coords: Vec<NormalizedCoord> =
        if component_flags & flags::RESET_UNSPECIFIED_AXES != 0 {
            vec![0; coords.len().max(axis_indices.len())]
        } else {
            coords.to_vec()
        };
    for (axis, value) in axis_indices.iter().zip(axis_values.iter()) {
        let axis = *axis as usize;
        if axis >= component_coords.len() {
            component_coords.resize(axis + 1, 0);
        }
        component_coords[axis] = (*value as i32).clamp(-16384, 16384) as i16;
    }

    // Translation terms scale with the font.
    t.translate_x *= font.x_mult();
    t.translate_y *= font.y_mult();
    t.t_center_x *= font.x_mult();
    t.t_center_y *= font.y_mult();

    let composed = parent_transform.multiply(&t.to_transform());

    // Recurse through a transforming pen so nested components compose.
    if varc.covers(gid) {
        draw_glyph_at(
            font,
            varc,
            gid,
            &component_coords,
            &composed,
            session,
            visited,
            edges_left,
            depth_left - 1,
        );
    } else {
        if *edges_left <= 0 {
            return None;
        }
        *edges_left -= 1;
        font.draw_outline(gid, &composed, session);
    }

    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_record_decode_minimal() {
        // flags = HAVE_TRANSLATE_X | HAVE_SCALE_X (0x110, two-byte
        // varint), gid16 = 7, translateX = 100, scaleX = 2.0 in F6Dot10.
        let mut record = Vec::new();
        record.extend([0x81u8, 0x10]);
        record.extend(7u16.to_be_bytes());
        record.extend(100i16.to_be_bytes());
        record.extend(2048i16.to_be_bytes());

        let mut s = Stream::new(&record);
        let component_flags = s.read_u32_var().unwrap();
        assert_eq!(component_flags, flags::HAVE_TRANSLATE_X | flags::HAVE_SCALE_X);
        let gid = u32::from(s.read::<u16>().unwrap());
        assert_eq!(gid, 7);
        let tx = s.read::<i16>().unwrap();
        assert_eq!(tx, 100);
        let sx = f32::from(s.read::<i16>().unwrap()) / 1024.0;
        assert!((sx - 2.0).abs() < 1e-6);
        assert!(s.at_end());
    }

    #[test]
    fn condition_axis_range() {
        // format 1, axis 0, range [0.5, 1.0] in F2Dot14.
        let mut cond = Vec::new();
        cond.extend(1u16.to_be_bytes());
        cond.extend(0u16.to_be_bytes());
        cond.extend(8192i16.to_be_bytes());
        cond.extend(16384i16.to_be_bytes());

        assert!(evaluate_condition(&cond, &[16384]));
        assert!(evaluate_condition(&cond, &[8192]));
        assert!(!evaluate_condition(&cond, &[0]));
        assert!(!evaluate_condition(&cond, &[]));
    }

    #[test]
    fn index32_roundtrip() {
        // Two entries: [0xAA], [0xBB, 0xCC], offSize 1.
        let data = [
            0x00, 0x00, 0x00, 0x02, // count
            0x01, // offSize
            0x01, 0x02, 0x04, // offsets (1-based)
            0xAA, 0xBB, 0xCC,
        ];
        let index = Index32::parse(&data).unwrap();
        assert_eq!(index.get(0), Some(&[0xAA][..]));
        assert_eq!(index.get(1), Some(&[0xBB, 0xCC][..]));
        assert_eq!(index.get(2), None);
    }
}
