//! Font variations: axis normalization and variation stores.

use crate::common::{Tag, Variation};
use crate::parser::{read_at, F2Dot14, Fixed, Stream};
use crate::sanitize::Sanitizer;

/// A normalized coordinate: F2Dot14 in [-1, 1].
pub(crate) type NormalizedCoord = i16;

#[derive(Clone, Copy, Debug)]
pub struct AxisRecord {
    pub tag: Tag,
    pub min_value: f32,
    pub default_value: f32,
    pub max_value: f32,
}

pub(crate) struct FvarTable<'a> {
    data: &'a [u8],
    axes_offset: u16,
    axis_count: u16,
    axis_size: u16,
    instance_count: u16,
    instance_size: u16,
}

impl<'a> FvarTable<'a> {
    pub fn parse(data: &'a [u8], s: &mut Sanitizer) -> Option<Self> {
        let version = read_at::<u32>(data, 0)?;
        if version != 0x0001_0000 {
            return None;
        }
        let axes_offset = read_at::<u16>(data, 4)?;
        let axis_count = read_at::<u16>(data, 8)?;
        let axis_size = read_at::<u16>(data, 10)?;
        let instance_count = read_at::<u16>(data, 12)?;
        let instance_size = read_at::<u16>(data, 14)?;

        if axis_size < 20 {
            return None;
        }
        if !s.check_array(
            usize::from(axes_offset),
            usize::from(axis_size),
            usize::from(axis_count),
        ) {
            return None;
        }

        Some(FvarTable {
            data,
            axes_offset,
            axis_count,
            axis_size,
            instance_count,
            instance_size,
        })
    }

    pub fn axis_count(&self) -> u16 {
        self.axis_count
    }

    pub fn axis(&self, index: u16) -> Option<AxisRecord> {
        if index >= self.axis_count {
            return None;
        }
        let base =
            usize::from(self.axes_offset) + usize::from(index) * usize::from(self.axis_size);
        Some(AxisRecord {
            tag: read_at::<Tag>(self.data, base)?,
            min_value: read_at::<Fixed>(self.data, base + 4)?.to_f32(),
            default_value: read_at::<Fixed>(self.data, base + 8)?.to_f32(),
            max_value: read_at::<Fixed>(self.data, base + 12)?.to_f32(),
        })
    }

    pub fn find_axis(&self, tag: Tag) -> Option<(u16, AxisRecord)> {
        (0..self.axis_count).find_map(|i| {
            let axis = self.axis(i)?;
            (axis.tag == tag).then_some((i, axis))
        })
    }

    /// The design-space coordinates of a named instance.
    pub fn instance_coords(&self, index: u16) -> Option<Vec<Variation>> {
        if index >= self.instance_count || self.instance_size < 4 {
            return None;
        }
        let instances_start = usize::from(self.axes_offset)
            + usize::from(self.axis_count) * usize::from(self.axis_size);
        let base = instances_start + usize::from(index) * usize::from(self.instance_size);

        // subfamilyNameID u16, flags u16, then one Fixed per axis.
        let mut coords = Vec::with_capacity(usize::from(self.axis_count));
        for i in 0..self.axis_count {
            let axis = self.axis(i)?;
            let value = read_at::<Fixed>(self.data, base + 4 + usize::from(i) * 4)?.to_f32();
            coords.push(Variation { tag: axis.tag, value });
        }
        Some(coords)
    }

    /// Normalizes one design-space value against its axis.
    pub fn normalize(&self, axis: &AxisRecord, value: f32) -> f32 {
        let value = value.clamp(axis.min_value, axis.max_value);
        if value == axis.default_value {
            0.0
        } else if value < axis.default_value {
            if axis.default_value == axis.min_value {
                0.0
            } else {
                -(axis.default_value - value) / (axis.default_value - axis.min_value)
            }
        } else if axis.default_value == axis.max_value {
            0.0
        } else {
            (value - axis.default_value) / (axis.max_value - axis.default_value)
        }
    }
}

pub(crate) struct AvarTable<'a> {
    data: &'a [u8],
    /// Byte offset of each axis's segment map.
    map_offsets: Vec<usize>,
}

impl<'a> AvarTable<'a> {
    pub fn parse(data: &'a [u8], s: &mut Sanitizer) -> Option<Self> {
        let version = read_at::<u32>(data, 0)?;
        if version != 0x0001_0000 {
            return None;
        }
        let axis_count = read_at::<u16>(data, 6)?;

        let mut map_offsets = Vec::with_capacity(usize::from(axis_count));
        let mut offset = 8usize;
        for _ in 0..axis_count {
            if !s.check_range(offset, 2) {
                return None;
            }
            map_offsets.push(offset);
            let pair_count = read_at::<u16>(data, offset)?;
            if !s.check_array(offset + 2, 4, usize::from(pair_count)) {
                return None;
            }
            offset += 2 + usize::from(pair_count) * 4;
        }

        Some(AvarTable { data, map_offsets })
    }

    /// Piecewise-linear remap of a normalized coordinate.
    pub fn map(&self, axis_index: u16, coord: f32) -> f32 {
        let Some(&offset) = self.map_offsets.get(usize::from(axis_index)) else {
            return coord;
        };
        let Some(pair_count) = read_at::<u16>(self.data, offset) else {
            return coord;
        };
        if pair_count == 0 {
            return coord;
        }

        let pair = |i: usize| -> Option<(f32, f32)> {
            let base = offset + 2 + i * 4;
            let from = read_at::<F2Dot14>(self.data, base)?.to_f32();
            let to = read_at::<F2Dot14>(self.data, base + 2)?.to_f32();
            Some((from, to))
        };

        let mut prev = match pair(0) {
            Some(p) => p,
            None => return coord,
        };
        if coord <= prev.0 {
            return prev.1;
        }
        for i in 1..usize::from(pair_count) {
            let cur = match pair(i) {
                Some(p) => p,
                None => return coord,
            };
            if coord < cur.0 {
                let t = (coord - prev.0) / (cur.0 - prev.0);
                return prev.1 + t * (cur.1 - prev.1);
            }
            prev = cur;
        }
        prev.1
    }
}

/// Computes normalized coordinates from design-space variations.
pub(crate) fn normalize_variations(
    face: &crate::Face,
    variations: &[Variation],
) -> Vec<NormalizedCoord> {
    let Some(fvar) = face.fvar() else {
        return Vec::new();
    };

    let mut coords = vec![0i16; usize::from(fvar.axis_count())];
    for v in variations {
        if let Some((index, axis)) = fvar.find_axis(v.tag) {
            let mut n = fvar.normalize(&axis, v.value);
            if let Some(avar) = face.avar() {
                n = avar.map(index, n);
            }
            coords[usize::from(index)] = F2Dot14::from_f32(n.clamp(-1.0, 1.0)).0;
        }
    }
    coords
}

/// An item variation store, as referenced by GPOS variation devices.
pub(crate) struct ItemVariationStore<'a> {
    data: &'a [u8],
    region_list_offset: u32,
    data_offsets: Vec<u32>,
}

impl<'a> ItemVariationStore<'a> {
    /// `data` starts at the store itself.
    pub fn parse(data: &'a [u8]) -> Option<Self> {
        let format = read_at::<u16>(data, 0)?;
        if format != 1 {
            return None;
        }
        let region_list_offset = read_at::<u32>(data, 2)?;
        let count = read_at::<u16>(data, 6)?;
        let mut data_offsets = Vec::with_capacity(usize::from(count));
        for i in 0..usize::from(count) {
            data_offsets.push(read_at::<u32>(data, 8 + i * 4)?);
        }
        Some(ItemVariationStore { data, region_list_offset, data_offsets })
    }

    fn region_scalar(&self, region_index: u16, coords: &[NormalizedCoord]) -> f32 {
        let base = self.region_list_offset as usize;
        let Some(axis_count) = read_at::<u16>(self.data, base) else {
            return 0.0;
        };
        let Some(region_count) = read_at::<u16>(self.data, base + 2) else {
            return 0.0;
        };
        if region_index >= region_count {
            return 0.0;
        }

        let region_size = usize::from(axis_count) * 6;
        let region_base = base + 4 + usize::from(region_index) * region_size;

        let mut scalar = 1.0f32;
        for a in 0..usize::from(axis_count) {
            let rec = region_base + a * 6;
            let Some(start) = read_at::<F2Dot14>(self.data, rec) else { return 0.0 };
            let Some(peak) = read_at::<F2Dot14>(self.data, rec + 2) else { return 0.0 };
            let Some(end) = read_at::<F2Dot14>(self.data, rec + 4) else { return 0.0 };

            let coord = coords.get(a).copied().unwrap_or(0);
            let (start, peak, end) = (start.0, peak.0, end.0);
            if peak == 0 {
                continue;
            }
            if coord == peak {
                continue;
            }
            if coord <= start || end <= coord {
                return 0.0;
            }
            if coord < peak {
                scalar *= f32::from(coord - start) / f32::from(peak - start);
            } else {
                scalar *= f32::from(end - coord) / f32::from(end - peak);
            }
        }
        scalar
    }

    /// The interpolated delta for `(outer, inner)` at the given coords.
    pub fn delta(&self, outer: u16, inner: u16, coords: &[NormalizedCoord]) -> f32 {
        let Some(&offset) = self.data_offsets.get(usize::from(outer)) else {
            return 0.0;
        };
        let base = offset as usize;
        let Some(item_count) = read_at::<u16>(self.data, base) else { return 0.0 };
        let Some(word_delta_count) = read_at::<u16>(self.data, base + 2) else {
            return 0.0;
        };
        let Some(region_index_count) = read_at::<u16>(self.data, base + 4) else {
            return 0.0;
        };
        if inner >= item_count {
            return 0.0;
        }

        let long_words = word_delta_count & 0x8000 != 0;
        let word_count = usize::from(word_delta_count & 0x7FFF);
        let region_count = usize::from(region_index_count);
        let (word_size, small_size) = if long_words { (4, 2) } else { (2, 1) };

        let row_size = word_count * word_size + (region_count - word_count.min(region_count)) * small_size;
        let rows_base = base + 6 + region_count * 2;
        let row_base = rows_base + usize::from(inner) * row_size;

        let mut delta = 0.0f32;
        let mut cursor = row_base;
        for r in 0..region_count {
            let value: f32 = if r < word_count {
                if long_words {
                    let v = read_at::<i32>(self.data, cursor).unwrap_or(0);
                    cursor += 4;
                    v as f32
                } else {
                    let v = read_at::<i16>(self.data, cursor).unwrap_or(0);
                    cursor += 2;
                    f32::from(v)
                }
            } else if long_words {
                let v = read_at::<i16>(self.data, cursor).unwrap_or(0);
                cursor += 2;
                f32::from(v)
            } else {
                let v = read_at::<i8>(self.data, cursor).unwrap_or(0);
                cursor += 1;
                f32::from(v)
            };

            if value != 0.0 {
                let Some(region_index) = read_at::<u16>(self.data, base + 6 + r * 2) else {
                    return delta;
                };
                let scalar = self.region_scalar(region_index, coords);
                delta += scalar * value;
            }
        }
        delta
    }
}

/// Decodes packed tuple values (the gvar run-length encoding): a control
/// byte holds a zero/word flag and a count.
pub(crate) fn decode_tuple_values(s: &mut Stream, count: usize) -> Option<Vec<f32>> {
    const DELTAS_ARE_ZERO: u8 = 0x80;
    const DELTAS_ARE_WORDS: u8 = 0x40;
    const DELTA_RUN_COUNT_MASK: u8 = 0x3F;

    let mut values = Vec::with_capacity(count);
    while values.len() < count {
        let control = s.read::<u8>()?;
        let run_count = usize::from(control & DELTA_RUN_COUNT_MASK) + 1;
        if control & DELTAS_ARE_ZERO != 0 {
            for _ in 0..run_count {
                values.push(0.0);
            }
        } else if control & DELTAS_ARE_WORDS != 0 {
            for _ in 0..run_count {
                values.push(f32::from(s.read::<i16>()?));
            }
        } else {
            for _ in 0..run_count {
                values.push(f32::from(s.read::<i8>()?));
            }
        }
    }
    values.truncate(count);
    Some(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fvar_one_axis() -> Vec<u8> {
        let mut d = Vec::new();
        d.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // version
        d.extend_from_slice(&16u16.to_be_bytes()); // axes offset
        d.extend_from_slice(&2u16.to_be_bytes()); // reserved
        d.extend_from_slice(&1u16.to_be_bytes()); // axis count
        d.extend_from_slice(&20u16.to_be_bytes()); // axis size
        d.extend_from_slice(&0u16.to_be_bytes()); // instance count
        d.extend_from_slice(&4u16.to_be_bytes()); // instance size
        // wght 100..400..900
        d.extend_from_slice(b"wght");
        d.extend_from_slice(&(100i32 << 16).to_be_bytes());
        d.extend_from_slice(&(400i32 << 16).to_be_bytes());
        d.extend_from_slice(&(900i32 << 16).to_be_bytes());
        d.extend_from_slice(&0u16.to_be_bytes());
        d.extend_from_slice(&256u16.to_be_bytes());
        d
    }

    #[test]
    fn fvar_normalization() {
        let data = fvar_one_axis();
        let mut s = Sanitizer::new(&data);
        let fvar = FvarTable::parse(&data, &mut s).unwrap();
        let (i, axis) = fvar.find_axis(Tag::from_bytes(b"wght")).unwrap();
        assert_eq!(i, 0);
        assert_eq!(fvar.normalize(&axis, 400.0), 0.0);
        assert_eq!(fvar.normalize(&axis, 900.0), 1.0);
        assert_eq!(fvar.normalize(&axis, 100.0), -1.0);
        assert!((fvar.normalize(&axis, 650.0) - 0.5).abs() < 1e-6);
        // Out-of-range clamps.
        assert_eq!(fvar.normalize(&axis, 1200.0), 1.0);
    }

    #[test]
    fn tuple_value_runs() {
        // 3 zeros, then two bytes, then one word.
        let data = [0x82u8, 0x01, 5, 0xFB, 0x40, 0x01, 0x00];
        let mut s = Stream::new(&data);
        let v = decode_tuple_values(&mut s, 6).unwrap();
        assert_eq!(v, [0.0, 0.0, 0.0, 5.0, -5.0, 256.0]);
    }
}
