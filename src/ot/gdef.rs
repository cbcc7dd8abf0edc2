//! Glyph definitions: classes, mark attachment classes, mark glyph sets.

use crate::parser::{read_at, Offset16, Offset32};
use crate::sanitize::Sanitizer;

use super::layout::{ClassDef, Coverage};
use super::var::ItemVariationStore;

pub(crate) mod glyph_class {
    pub const BASE: u16 = 1;
    pub const LIGATURE: u16 = 2;
    pub const MARK: u16 = 3;
    pub const COMPONENT: u16 = 4;
}

pub(crate) struct GdefTable<'a> {
    glyph_classes: Option<ClassDef<'a>>,
    mark_attach_classes: Option<ClassDef<'a>>,
    mark_glyph_sets: Option<&'a [u8]>,
    var_store: Option<ItemVariationStore<'a>>,
}

impl<'a> GdefTable<'a> {
    pub fn parse(data: &'a [u8], s: &mut Sanitizer) -> Option<Self> {
        let major = read_at::<u16>(data, 0)?;
        let minor = read_at::<u16>(data, 2)?;
        if major != 1 {
            return None;
        }
        if !s.check_range(0, 12) {
            return None;
        }

        let glyph_classes = read_at::<Offset16>(data, 4)?
            .resolve(data)
            .and_then(ClassDef::parse);
        let mark_attach_classes = read_at::<Offset16>(data, 10)?
            .resolve(data)
            .and_then(ClassDef::parse);

        // Version 1.2 adds mark glyph sets, 1.3 the variation store.
        let mark_glyph_sets = if minor >= 2 {
            read_at::<Offset16>(data, 12).and_then(|o| o.resolve(data))
        } else {
            None
        };
        let var_store = if minor >= 3 {
            read_at::<Offset32>(data, 14)
                .and_then(|o| o.resolve(data))
                .and_then(ItemVariationStore::parse)
        } else {
            None
        };

        Some(GdefTable { glyph_classes, mark_attach_classes, mark_glyph_sets, var_store })
    }

    pub fn has_glyph_classes(&self) -> bool {
        self.glyph_classes.is_some()
    }

    pub fn glyph_class(&self, glyph: u16) -> u16 {
        self.glyph_classes.as_ref().map_or(0, |c| c.get(glyph))
    }

    pub fn mark_attachment_class(&self, glyph: u16) -> u16 {
        self.mark_attach_classes.as_ref().map_or(0, |c| c.get(glyph))
    }

    pub fn mark_set_covers(&self, set_index: u16, glyph: u16) -> bool {
        let Some(sets) = self.mark_glyph_sets else {
            return false;
        };
        let Some(count) = read_at::<u16>(sets, 2) else {
            return false;
        };
        if set_index >= count {
            return false;
        }
        let Some(coverage) = read_at::<Offset32>(sets, 4 + usize::from(set_index) * 4)
            .and_then(|o| o.resolve(sets))
            .and_then(Coverage::parse)
        else {
            return false;
        };
        coverage.contains(glyph)
    }

    pub fn var_store(&self) -> Option<&ItemVariationStore<'a>> {
        self.var_store.as_ref()
    }

    /// The glyph props word the apply machinery stores per item: the GDEF
    /// class folded into skip-flag-aligned bits, with the mark attachment
    /// class in the high byte.
    pub fn glyph_props(&self, glyph: u16) -> u16 {
        match self.glyph_class(glyph) {
            c if c == glyph_class::BASE => super::glyph_props::BASE,
            c if c == glyph_class::LIGATURE => super::glyph_props::LIGATURE,
            c if c == glyph_class::MARK => {
                let attach = self.mark_attachment_class(glyph) & 0xFF;
                super::glyph_props::MARK | (attach << 8)
            }
            _ => 0,
        }
    }

}
