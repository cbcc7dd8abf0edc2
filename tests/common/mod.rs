//! Synthesizes minimal sfnt fonts in memory, so shaping scenarios run
//! without binary fixtures.

#![allow(dead_code)]

fn be16(v: u16) -> [u8; 2] {
    v.to_be_bytes()
}

fn be32(v: u32) -> [u8; 4] {
    v.to_be_bytes()
}

pub struct FontBuilder {
    pub upem: u16,
    pub num_glyphs: u16,
    /// (code point, glyph id) pairs; sorted during build.
    pub cmap: Vec<(u32, u16)>,
    /// Advance per glyph id; missing entries default to 500.
    pub advances: Vec<u16>,
    pub gsub: Option<Vec<u8>>,
    pub gpos: Option<Vec<u8>>,
    /// Give every glyph a simple square outline.
    pub square_outlines: bool,
}

impl FontBuilder {
    pub fn new(num_glyphs: u16) -> Self {
        FontBuilder {
            upem: 1000,
            num_glyphs,
            cmap: Vec::new(),
            advances: Vec::new(),
            gsub: None,
            gpos: None,
            square_outlines: false,
        }
    }

    pub fn map(mut self, c: char, glyph: u16) -> Self {
        self.cmap.push((c as u32, glyph));
        self
    }

    pub fn advance(mut self, glyph: u16, advance: u16) -> Self {
        if self.advances.len() <= usize::from(glyph) {
            self.advances.resize(usize::from(glyph) + 1, 500);
        }
        self.advances[usize::from(glyph)] = advance;
        self
    }

    pub fn gsub(mut self, table: Vec<u8>) -> Self {
        self.gsub = Some(table);
        self
    }

    pub fn gpos(mut self, table: Vec<u8>) -> Self {
        self.gpos = Some(table);
        self
    }

    pub fn square_outlines(mut self) -> Self {
        self.square_outlines = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut tables: Vec<([u8; 4], Vec<u8>)> = Vec::new();

        tables.push((*b"head", self.build_head()));
        tables.push((*b"hhea", self.build_hhea()));
        tables.push((*b"maxp", self.build_maxp()));
        tables.push((*b"hmtx", self.build_hmtx()));
        tables.push((*b"cmap", self.build_cmap()));

        let (glyf, loca) = self.build_glyf_loca();
        tables.push((*b"glyf", glyf));
        tables.push((*b"loca", loca));

        if let Some(gsub) = &self.gsub {
            tables.push((*b"GSUB", gsub.clone()));
        }
        if let Some(gpos) = &self.gpos {
            tables.push((*b"GPOS", gpos.clone()));
        }

        // The table directory is binary-searched by tag.
        tables.sort_by_key(|(tag, _)| *tag);

        let num_tables = tables.len() as u16;
        let mut font = Vec::new();
        font.extend(be32(0x0001_0000));
        font.extend(be16(num_tables));
        font.extend(be16(0)); // searchRange
        font.extend(be16(0)); // entrySelector
        font.extend(be16(0)); // rangeShift

        let mut offset = 12 + 16 * tables.len();
        let mut records = Vec::new();
        let mut data = Vec::new();
        for (tag, table) in &tables {
            records.extend(tag);
            records.extend(be32(0)); // checksum
            records.extend(be32(offset as u32));
            records.extend(be32(table.len() as u32));
            data.extend(table);
            // 4-byte align.
            let pad = (4 - table.len() % 4) % 4;
            data.extend(std::iter::repeat(0u8).take(pad));
            offset += table.len() + pad;
        }

        font.extend(records);
        font.extend(data);
        font
    }

    fn build_head(&self) -> Vec<u8> {
        let mut t = Vec::new();
        t.extend(be32(0x0001_0000)); // version
        t.extend(be32(0)); // fontRevision
        t.extend(be32(0)); // checkSumAdjustment
        t.extend(be32(0x5F0F_3CF5)); // magicNumber
        t.extend(be16(0)); // flags
        t.extend(be16(self.upem));
        t.extend([0u8; 8]); // created
        t.extend([0u8; 8]); // modified
        t.extend(be16(0)); // xMin
        t.extend(be16(0)); // yMin
        t.extend(be16(1000)); // xMax
        t.extend(be16(1000)); // yMax
        t.extend(be16(0)); // macStyle
        t.extend(be16(8)); // lowestRecPPEM
        t.extend(be16(2)); // fontDirectionHint
        t.extend(be16(0)); // indexToLocFormat: short
        t.extend(be16(0)); // glyphDataFormat
        t
    }

    fn build_hhea(&self) -> Vec<u8> {
        let mut t = Vec::new();
        t.extend(be32(0x0001_0000));
        t.extend(be16(800)); // ascender
        t.extend((-200i16).to_be_bytes()); // descender
        t.extend(be16(90)); // lineGap
        t.extend(be16(1000)); // advanceWidthMax
        t.extend(be16(0)); // minLeftSideBearing
        t.extend(be16(0)); // minRightSideBearing
        t.extend(be16(1000)); // xMaxExtent
        t.extend(be16(1)); // caretSlopeRise
        t.extend(be16(0)); // caretSlopeRun
        t.extend(be16(0)); // caretOffset
        t.extend([0u8; 8]); // reserved
        t.extend(be16(0)); // metricDataFormat
        t.extend(be16(self.num_glyphs)); // numberOfHMetrics
        t
    }

    fn build_maxp(&self) -> Vec<u8> {
        let mut t = Vec::new();
        t.extend(be32(0x0001_0000));
        t.extend(be16(self.num_glyphs));
        t.extend([0u8; 26]); // maxima, unused
        t
    }

    fn build_hmtx(&self) -> Vec<u8> {
        let mut t = Vec::new();
        for g in 0..self.num_glyphs {
            let advance = self
                .advances
                .get(usize::from(g))
                .copied()
                .unwrap_or(500);
            t.extend(be16(advance));
            t.extend(be16(0)); // lsb
        }
        t
    }

    fn build_cmap(&self) -> Vec<u8> {
        let mut mapping = self.cmap.clone();
        mapping.sort();

        let mut sub = Vec::new();
        sub.extend(be16(12)); // format
        sub.extend(be16(0)); // reserved
        sub.extend(be32(16 + 12 * mapping.len() as u32)); // length
        sub.extend(be32(0)); // language
        sub.extend(be32(mapping.len() as u32)); // numGroups
        for (code, glyph) in &mapping {
            sub.extend(be32(*code)); // startCharCode
            sub.extend(be32(*code)); // endCharCode
            sub.extend(be32(u32::from(*glyph))); // startGlyphID
        }

        let mut t = Vec::new();
        t.extend(be16(0)); // version
        t.extend(be16(1)); // numTables
        t.extend(be16(3)); // platformID: Windows
        t.extend(be16(10)); // encodingID: full Unicode
        t.extend(be32(12)); // offset
        t.extend(sub);
        t
    }

    fn build_glyf_loca(&self) -> (Vec<u8>, Vec<u8>) {
        if !self.square_outlines {
            // All glyphs empty: every short-loca entry is zero.
            let loca = vec![0u8; (usize::from(self.num_glyphs) + 1) * 2];
            return (vec![0u8; 4], loca);
        }

        // Every glyph from gid 1 up is its own copy of a simple square.
        let square = square_glyph();
        let mut glyf = Vec::new();
        let mut loca = Vec::new();
        loca.extend(be16(0)); // gid 0 starts at 0 ...
        loca.extend(be16(0)); // ... and is empty
        for _ in 1..self.num_glyphs {
            glyf.extend(&square);
            loca.extend(be16((glyf.len() / 2) as u16));
        }
        (glyf, loca)
    }
}

fn square_glyph() -> Vec<u8> {
    let mut g = Vec::new();
    g.extend(be16(1)); // numberOfContours
    g.extend(be16(0)); // xMin
    g.extend(be16(0)); // yMin
    g.extend(be16(100)); // xMax
    g.extend(be16(100)); // yMax
    g.extend(be16(3)); // endPtsOfContours[0]
    g.extend(be16(0)); // instructionLength
    for _ in 0..4 {
        g.push(0x01); // on-curve, 16-bit deltas
    }
    for dx in [0i16, 100, 0, -100] {
        g.extend(dx.to_be_bytes());
    }
    for dy in [0i16, 0, 100, 0] {
        g.extend(dy.to_be_bytes());
    }
    g
}

/// Builds a GSUB or GPOS table: one script (DFLT), one feature, and the
/// given lookups all referenced from it.
pub fn build_layout_table(feature_tag: &[u8; 4], lookups: &[(u16, Vec<u8>)]) -> Vec<u8> {
    build_layout_table_versioned(0x0001_0000, feature_tag, lookups)
}

pub fn build_layout_table_versioned(
    version: u32,
    feature_tag: &[u8; 4],
    lookups: &[(u16, Vec<u8>)],
) -> Vec<u8> {
    let n = lookups.len();

    let mut t = Vec::new();
    t.extend(be32(version));
    t.extend(be16(10)); // scriptListOffset
    t.extend(be16(30)); // featureListOffset
    t.extend(be16((42 + 2 * n) as u16)); // lookupListOffset

    // ScriptList at 10 (20 bytes).
    t.extend(be16(1)); // scriptCount
    t.extend(b"DFLT");
    t.extend(be16(8)); // script offset (from script list)
    // Script table at script list + 8.
    t.extend(be16(4)); // defaultLangSysOffset (from script table)
    t.extend(be16(0)); // langSysCount
    // LangSys at script table + 4.
    t.extend(be16(0)); // lookupOrderOffset
    t.extend(be16(0xFFFF)); // requiredFeatureIndex
    t.extend(be16(1)); // featureIndexCount
    t.extend(be16(0)); // featureIndexes[0]

    // FeatureList at 30 (12 + 2n bytes).
    debug_assert_eq!(t.len(), 30);
    t.extend(be16(1)); // featureCount
    t.extend(feature_tag);
    t.extend(be16(8)); // feature offset (from feature list)
    // Feature table at feature list + 8.
    t.extend(be16(0)); // featureParamsOffset
    t.extend(be16(n as u16)); // lookupIndexCount
    for i in 0..n {
        t.extend(be16(i as u16));
    }

    // LookupList at 42 + 2n.
    debug_assert_eq!(t.len(), 42 + 2 * n);
    t.extend(be16(n as u16));
    // Lookup offsets, from the lookup list start.
    let mut lookup_offset = 2 + 2 * n; // past count and offset array
    for (_, subtable) in lookups {
        t.extend(be16(lookup_offset as u16));
        // type(2) flags(2) count(2) offset(2) + subtable
        lookup_offset += 8 + subtable.len();
    }
    for (kind, subtable) in lookups {
        t.extend(be16(*kind));
        t.extend(be16(0)); // lookupFlag
        t.extend(be16(1)); // subTableCount
        t.extend(be16(8)); // subtable offset, from lookup start
        t.extend(subtable);
    }

    t
}

/// SingleSubst format 1: adds `delta` to every glyph in `glyphs`.
pub fn single_subst_delta(glyphs: &[u16], delta: i16) -> Vec<u8> {
    let mut sub = Vec::new();
    sub.extend(be16(1)); // format
    sub.extend(be16(6)); // coverageOffset
    sub.extend(delta.to_be_bytes());
    sub.extend(coverage(glyphs));
    sub
}

/// LigatureSubst format 1: one ligature set for `first`, substituting the
/// component sequence `first + rest` with `lig_glyph`.
pub fn ligature_subst(first: u16, rest: &[u16], lig_glyph: u16) -> Vec<u8> {
    let mut sub = Vec::new();
    sub.extend(be16(1)); // format
    // Coverage comes after: header (6) + set offset array (2) + set (4) +
    // ligature (4 + 2 * rest).
    let lig_size = 4 + 2 * rest.len();
    let set_size = 4;
    let coverage_offset = 6 + 2 + set_size + lig_size;
    sub.extend(be16(coverage_offset as u16));
    sub.extend(be16(1)); // ligSetCount
    sub.extend(be16(8)); // ligatureSetOffsets[0]
    // LigatureSet at 8.
    sub.extend(be16(1)); // ligatureCount
    sub.extend(be16(4)); // ligatureOffsets[0], from set
    // Ligature.
    sub.extend(be16(lig_glyph));
    sub.extend(be16((rest.len() + 1) as u16)); // componentCount
    for g in rest {
        sub.extend(be16(*g));
    }
    sub.extend(coverage(&[first]));
    sub
}

/// Context format 3 with a single input position dispatching one nested
/// lookup at sequence index 0.
pub fn context_format3_single(input_glyph: u16, nested_lookup: u16) -> Vec<u8> {
    let mut sub = Vec::new();
    sub.extend(be16(3)); // format
    sub.extend(be16(1)); // glyphCount
    sub.extend(be16(1)); // seqLookupCount
    sub.extend(be16(12)); // coverageOffsets[0]: past the records
    sub.extend(be16(0)); // seqLookupRecord.sequenceIndex
    sub.extend(be16(nested_lookup)); // seqLookupRecord.lookupListIndex
    sub.extend(coverage(&[input_glyph]));
    sub
}

/// MarkBasePos format 1 with one mark class: attaches `mark_glyph` to
/// `base_glyph`, base anchor at (bx, by), mark anchor at (mx, my).
pub fn mark_base_pos(
    mark_glyph: u16,
    base_glyph: u16,
    base_anchor: (i16, i16),
    mark_anchor: (i16, i16),
) -> Vec<u8> {
    let mut sub = Vec::new();
    sub.extend(be16(1)); // format
    // Layout, offsets from subtable start:
    //  12: markCoverage (6 bytes)
    //  18: baseCoverage (6 bytes)
    //  24: markArray (count 2 + record 4 + anchor 6 = 12)
    //  36: baseArray (count 2 + row 2 + anchor 6 = 10)
    sub.extend(be16(12)); // markCoverageOffset
    sub.extend(be16(18)); // baseCoverageOffset
    sub.extend(be16(1)); // markClassCount
    sub.extend(be16(24)); // markArrayOffset
    sub.extend(be16(36)); // baseArrayOffset
    sub.extend(coverage(&[mark_glyph]));
    sub.extend(coverage(&[base_glyph]));
    // MarkArray.
    sub.extend(be16(1)); // markCount
    sub.extend(be16(0)); // class
    sub.extend(be16(6)); // anchor offset, from mark array
    sub.extend(anchor(mark_anchor));
    // BaseArray.
    sub.extend(be16(1)); // baseCount
    sub.extend(be16(4)); // anchor offset, from base array
    sub.extend(anchor(base_anchor));
    sub
}

fn anchor((x, y): (i16, i16)) -> Vec<u8> {
    let mut a = Vec::new();
    a.extend(be16(1)); // format
    a.extend(x.to_be_bytes());
    a.extend(y.to_be_bytes());
    a
}

pub fn coverage(glyphs: &[u16]) -> Vec<u8> {
    let mut c = Vec::new();
    c.extend(be16(1)); // format
    c.extend(be16(glyphs.len() as u16));
    for g in glyphs {
        c.extend(be16(*g));
    }
    c
}
