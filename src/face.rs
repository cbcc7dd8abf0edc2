//! A parsed font file at a given index.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use once_cell::sync::OnceCell;

use crate::blob::Blob;
use crate::common::Tag;
use crate::parser::{read_at, Stream};
use crate::sanitize::Sanitizer;
use crate::{ot, plan};

#[derive(Debug, thiserror::Error)]
pub enum FaceError {
    #[error("failed to parse the font file: {0}")]
    Parse(#[from] ttf_parser::FaceParsingError),
}

/// A font face: one font in an sfnt file, with lazily installed,
/// sanitized layout-table views.
pub struct Face<'a> {
    pub(crate) data: &'a [u8],
    pub(crate) ttfp: ttf_parser::Face<'a>,
    index: u32,
    upem_override: Option<u16>,
    glyph_count_override: Option<u16>,
    immutable: bool,

    gdef: OnceCell<Option<ot::gdef::GdefTable<'a>>>,
    gsub: OnceCell<Option<ot::layout::LayoutTable<'a>>>,
    gpos: OnceCell<Option<ot::layout::LayoutTable<'a>>>,
    fvar: OnceCell<Option<ot::var::FvarTable<'a>>>,
    avar: OnceCell<Option<ot::var::AvarTable<'a>>>,
    varc: OnceCell<Option<ot::varc::VarcTable<'a>>>,

    pub(crate) plan_cache: Mutex<plan::PlanCache>,
}

impl<'a> Face<'a> {
    /// Parses the face at `index` in an sfnt file or collection.
    pub fn from_slice(data: &'a [u8], index: u32) -> Result<Self, FaceError> {
        let ttfp = ttf_parser::Face::parse(data, index)?;
        Ok(Face {
            data,
            ttfp,
            index,
            upem_override: None,
            glyph_count_override: None,
            immutable: false,
            gdef: OnceCell::new(),
            gsub: OnceCell::new(),
            gpos: OnceCell::new(),
            fvar: OnceCell::new(),
            avar: OnceCell::new(),
            varc: OnceCell::new(),
            plan_cache: Mutex::new(plan::PlanCache::new()),
        })
    }

    pub fn from_blob(blob: &'a Blob<'a>, index: u32) -> Result<Self, FaceError> {
        Face::from_slice(blob.data(), index)
    }

    /// The number of faces in a font collection, or 1 for a plain font.
    pub fn collection_size(data: &[u8]) -> u32 {
        ttf_parser::fonts_in_collection(data).unwrap_or(1)
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn set_index(&mut self, index: u32) {
        if !self.immutable {
            self.index = index;
        }
    }

    pub fn units_per_em(&self) -> u16 {
        self.upem_override.unwrap_or_else(|| self.ttfp.units_per_em())
    }

    pub fn set_units_per_em(&mut self, upem: u16) {
        if !self.immutable {
            self.upem_override = Some(upem);
        }
    }

    pub fn glyph_count(&self) -> u16 {
        self.glyph_count_override
            .unwrap_or_else(|| self.ttfp.number_of_glyphs())
    }

    pub fn set_glyph_count(&mut self, count: u16) {
        if !self.immutable {
            self.glyph_count_override = Some(count);
        }
    }

    /// One-way latch; setters no-op afterwards.
    pub fn make_immutable(&mut self) {
        self.immutable = true;
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    /// Raw bytes of any table, color/bitmap payloads included.
    pub fn table_data(&self, tag: Tag) -> Option<&'a [u8]> {
        self.ttfp.raw_face().table(tag.into())
    }

    pub fn glyph_name(&self, glyph: u16) -> Option<&str> {
        self.ttfp.glyph_name(ttf_parser::GlyphId(glyph))
    }

    // Sanitized layout-table views, installed on first access. A table
    // that fails sanitization is treated as absent.

    pub(crate) fn gdef(&self) -> Option<&ot::gdef::GdefTable<'a>> {
        self.gdef
            .get_or_init(|| {
                let data = self.table_data(Tag::from_bytes(b"GDEF"))?;
                let mut s = Sanitizer::new(data);
                let table = ot::gdef::GdefTable::parse(data, &mut s);
                if table.is_none() {
                    log::debug!("GDEF failed sanitization; ignoring the table");
                }
                table
            })
            .as_ref()
    }

    pub(crate) fn gsub(&self) -> Option<&ot::layout::LayoutTable<'a>> {
        self.gsub
            .get_or_init(|| {
                let data = self.table_data(Tag::from_bytes(b"GSUB"))?;
                let mut s = Sanitizer::new(data);
                let table = ot::layout::LayoutTable::parse(data, &mut s);
                if table.is_none() {
                    log::debug!("GSUB failed sanitization; ignoring the table");
                }
                table
            })
            .as_ref()
    }

    pub(crate) fn gpos(&self) -> Option<&ot::layout::LayoutTable<'a>> {
        self.gpos
            .get_or_init(|| {
                let data = self.table_data(Tag::from_bytes(b"GPOS"))?;
                let mut s = Sanitizer::new(data);
                let table = ot::layout::LayoutTable::parse(data, &mut s);
                if table.is_none() {
                    log::debug!("GPOS failed sanitization; ignoring the table");
                }
                table
            })
            .as_ref()
    }

    pub(crate) fn layout_table(&self, table_index: usize) -> Option<&ot::layout::LayoutTable<'a>> {
        match table_index {
            0 => self.gsub(),
            _ => self.gpos(),
        }
    }

    pub(crate) fn fvar(&self) -> Option<&ot::var::FvarTable<'a>> {
        self.fvar
            .get_or_init(|| {
                let data = self.table_data(Tag::from_bytes(b"fvar"))?;
                let mut s = Sanitizer::new(data);
                ot::var::FvarTable::parse(data, &mut s)
            })
            .as_ref()
    }

    pub(crate) fn avar(&self) -> Option<&ot::var::AvarTable<'a>> {
        self.avar
            .get_or_init(|| {
                let data = self.table_data(Tag::from_bytes(b"avar"))?;
                let mut s = Sanitizer::new(data);
                ot::var::AvarTable::parse(data, &mut s)
            })
            .as_ref()
    }

    pub(crate) fn varc(&self) -> Option<&ot::varc::VarcTable<'a>> {
        self.varc
            .get_or_init(|| {
                let data = self.table_data(Tag::from_bytes(b"VARC"))?;
                let mut s = Sanitizer::new(data);
                let table = ot::varc::VarcTable::parse(data, &mut s);
                if table.is_none() {
                    log::debug!("VARC failed sanitization; ignoring the table");
                }
                table
            })
            .as_ref()
    }

    pub(crate) fn has_glyph_classes(&self) -> bool {
        self.gdef().map_or(false, |g| g.has_glyph_classes())
    }

    // Character-set collection over the raw cmap, covering the subtable
    // formats the shaper consumes.

    /// Collects every Unicode code point the font maps.
    pub fn collect_unicodes(&self, out: &mut BTreeSet<u32>) {
        self.collect_mapping_impl(&mut |u, _| {
            out.insert(u);
        });
    }

    /// Collects the nominal (non-variation) code point to glyph mapping.
    pub fn collect_nominal_glyph_mapping(
        &self,
        mapping: &mut BTreeMap<u32, u16>,
        unicodes: Option<&mut BTreeSet<u32>>,
    ) {
        let mut unicodes = unicodes;
        self.collect_mapping_impl(&mut |u, g| {
            mapping.entry(u).or_insert(g);
            if let Some(set) = unicodes.as_deref_mut() {
                set.insert(u);
            }
        });
    }

    /// Collects the variation selectors the font's cmap covers.
    pub fn collect_variation_selectors(&self, out: &mut BTreeSet<u32>) {
        self.with_format14(|vs, _, _| {
            out.insert(vs);
        });
    }

    /// Collects the code points that form a pair with the given variation
    /// selector.
    pub fn collect_variation_unicodes(&self, variation_selector: u32, out: &mut BTreeSet<u32>) {
        self.with_format14(|vs, unicode, _| {
            if vs == variation_selector {
                out.insert(unicode);
            }
        });
    }

    fn unicode_subtables(&self, f: &mut dyn FnMut(&'a [u8], u16)) {
        let Some(cmap) = self.table_data(Tag::from_bytes(b"cmap")) else {
            return;
        };
        let mut s = Stream::new(cmap);
        s.skip::<u16>(); // version
        let Some(num_tables) = s.read::<u16>() else {
            return;
        };
        for _ in 0..num_tables {
            let Some(platform_id) = s.read::<u16>() else { return };
            let Some(encoding_id) = s.read::<u16>() else { return };
            let Some(offset) = s.read::<u32>() else { return };

            let is_unicode = platform_id == 0
                || (platform_id == 3 && matches!(encoding_id, 1 | 10));
            if !is_unicode {
                continue;
            }

            let Some(sub) = cmap.get(offset as usize..) else {
                continue;
            };
            let Some(format) = read_at::<u16>(sub, 0) else {
                continue;
            };
            f(sub, format);
        }
    }

    fn collect_mapping_impl(&self, visit: &mut dyn FnMut(u32, u16)) {
        self.unicode_subtables(&mut |sub, format| match format {
            0 => {
                for code in 0u32..256 {
                    if let Some(gid) = read_at::<u8>(sub, 6 + code as usize) {
                        if gid != 0 {
                            visit(code, u16::from(gid));
                        }
                    }
                }
            }
            4 => collect_format4(sub, visit),
            6 => {
                let mut s = Stream::new_at(sub, 6).unwrap_or_default();
                let first = s.read::<u16>().unwrap_or(0);
                let count = s.read::<u16>().unwrap_or(0);
                for i in 0..count {
                    if let Some(gid) = read_at::<u16>(sub, 10 + usize::from(i) * 2) {
                        if gid != 0 {
                            visit(u32::from(first) + u32::from(i), gid);
                        }
                    }
                }
            }
            10 => {
                let start = read_at::<u32>(sub, 12).unwrap_or(0);
                let count = read_at::<u32>(sub, 16).unwrap_or(0).min(0x10_FFFF);
                for i in 0..count {
                    if let Some(gid) = read_at::<u16>(sub, 20 + i as usize * 2) {
                        if gid != 0 {
                            visit(start + i, gid);
                        }
                    }
                }
            }
            12 | 13 => {
                let count = read_at::<u32>(sub, 12).unwrap_or(0);
                for i in 0..count as usize {
                    let base = 16 + i * 12;
                    let Some(start) = read_at::<u32>(sub, base) else { break };
                    let Some(end) = read_at::<u32>(sub, base + 4) else { break };
                    let Some(gid) = read_at::<u32>(sub, base + 8) else { break };
                    if end < start || end > 0x10_FFFF {
                        continue;
                    }
                    for (k, code) in (start..=end).enumerate() {
                        let g = if format == 12 {
                            gid.wrapping_add(k as u32)
                        } else {
                            gid
                        };
                        if g != 0 && g <= u32::from(u16::MAX) {
                            visit(code, g as u16);
                        }
                    }
                }
            }
            _ => {}
        });
    }

    /// Visits `(variation_selector, unicode, glyph)` triplets of format-14
    /// subtables. Default-UVS entries report glyph 0.
    fn with_format14(&self, mut visit: impl FnMut(u32, u32, u16)) {
        self.unicode_subtables(&mut |sub, format| {
            if format != 14 {
                return;
            }
            let count = read_at::<u32>(sub, 6).unwrap_or(0);
            for i in 0..count as usize {
                let base = 10 + i * 11;
                let Some(vs) = crate::parser::read_at::<crate::parser::U24>(sub, base) else {
                    break;
                };
                let default_off = read_at::<u32>(sub, base + 3).unwrap_or(0);
                let non_default_off = read_at::<u32>(sub, base + 7).unwrap_or(0);

                if default_off != 0 {
                    let base = default_off as usize;
                    let n = read_at::<u32>(sub, base).unwrap_or(0);
                    for k in 0..n as usize {
                        let rec = base + 4 + k * 4;
                        let Some(start) = crate::parser::read_at::<crate::parser::U24>(sub, rec)
                        else {
                            break;
                        };
                        let extra = read_at::<u8>(sub, rec + 3).unwrap_or(0);
                        for code in start.0..=start.0 + u32::from(extra) {
                            visit(vs.0, code, 0);
                        }
                    }
                }

                if non_default_off != 0 {
                    let base = non_default_off as usize;
                    let n = read_at::<u32>(sub, base).unwrap_or(0);
                    for k in 0..n as usize {
                        let rec = base + 4 + k * 5;
                        let Some(unicode) = crate::parser::read_at::<crate::parser::U24>(sub, rec)
                        else {
                            break;
                        };
                        let gid = read_at::<u16>(sub, rec + 3).unwrap_or(0);
                        visit(vs.0, unicode.0, gid);
                    }
                }
            }
        });
    }
}

fn collect_format4(sub: &[u8], visit: &mut dyn FnMut(u32, u16)) {
    let Some(seg_count_x2) = read_at::<u16>(sub, 6) else {
        return;
    };
    let seg_count = usize::from(seg_count_x2 / 2);
    let end_codes = 14;
    let start_codes = end_codes + seg_count * 2 + 2; // +2 reserved pad
    let id_deltas = start_codes + seg_count * 2;
    let id_range_offsets = id_deltas + seg_count * 2;

    for seg in 0..seg_count {
        let Some(end) = read_at::<u16>(sub, end_codes + seg * 2) else { return };
        let Some(start) = read_at::<u16>(sub, start_codes + seg * 2) else { return };
        let Some(delta) = read_at::<i16>(sub, id_deltas + seg * 2) else { return };
        let Some(range_offset) = read_at::<u16>(sub, id_range_offsets + seg * 2) else {
            return;
        };
        if start > end || (start, end) == (0xFFFF, 0xFFFF) {
            continue;
        }

        for code in start..=end {
            let gid = if range_offset == 0 {
                code.wrapping_add(delta as u16)
            } else {
                let pos = id_range_offsets
                    + seg * 2
                    + usize::from(range_offset)
                    + usize::from(code - start) * 2;
                match read_at::<u16>(sub, pos) {
                    Some(0) | None => continue,
                    Some(g) => g.wrapping_add(delta as u16),
                }
            };
            if gid != 0 {
                visit(u32::from(code), gid);
            }
            if code == 0xFFFF {
                break;
            }
        }
    }
}

impl std::fmt::Debug for Face<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Face")
            .field("index", &self.index)
            .field("units_per_em", &self.units_per_em())
            .field("glyph_count", &self.glyph_count())
            .finish()
    }
}
