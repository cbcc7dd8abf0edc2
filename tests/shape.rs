//! End-to-end shaping tests over synthesized fonts.

mod common;

use common::*;
use textshape::{
    shape, Direction, Face, Font, FontFuncs, GlyphBuffer, SerializeFlags, UnicodeBuffer,
};

fn shape_str(font_data: &[u8], text: &str) -> GlyphBuffer {
    let face = Face::from_slice(font_data, 0).unwrap();
    let font = Font::new(&face);
    let mut buffer = UnicodeBuffer::new();
    buffer.push_str(text);
    shape(&font, &[], buffer)
}

fn glyphs(buffer: &GlyphBuffer) -> Vec<u32> {
    buffer.glyph_infos().iter().map(|i| i.glyph_id()).collect()
}

fn clusters(buffer: &GlyphBuffer) -> Vec<u32> {
    buffer.glyph_infos().iter().map(|i| i.cluster).collect()
}

fn advances(buffer: &GlyphBuffer) -> Vec<i32> {
    buffer.glyph_positions().iter().map(|p| p.x_advance).collect()
}

fn latin_font() -> Vec<u8> {
    FontBuilder::new(4)
        .map('T', 1)
        .map('e', 2)
        .map('s', 3)
        .advance(1, 10)
        .advance(2, 6)
        .advance(3, 5)
        .build()
}

#[test]
fn ascii_noop_shape() {
    let data = latin_font();
    let result = shape_str(&data, "TesT");

    assert_eq!(glyphs(&result), [1, 2, 3, 1]);
    assert_eq!(clusters(&result), [0, 1, 2, 3]);
    assert_eq!(advances(&result), [10, 6, 5, 10]);
    for pos in result.glyph_positions() {
        assert_eq!(pos.x_offset, 0);
        assert_eq!(pos.y_offset, 0);
        assert_eq!(pos.y_advance, 0);
    }
    assert!(!result.shaping_failed());
}

struct TestFuncs;

impl FontFuncs for TestFuncs {
    fn nominal_glyph(&self, _font: &Font, unicode: char) -> Option<u32> {
        match unicode {
            'T' => Some(1),
            'e' => Some(2),
            's' => Some(3),
            _ => None,
        }
    }

    fn glyph_h_advance(&self, _font: &Font, glyph: u32) -> Option<i32> {
        match glyph {
            1 => Some(10),
            2 => Some(6),
            3 => Some(5),
            _ => Some(0),
        }
    }
}

#[test]
fn custom_font_funcs_drive_shaping() {
    // The font itself maps nothing; the function table answers instead.
    let data = FontBuilder::new(4).build();
    let face = Face::from_slice(&data, 0).unwrap();
    let mut font = Font::new(&face);
    let funcs = TestFuncs;
    font.set_funcs(&funcs);

    let mut buffer = UnicodeBuffer::new();
    buffer.push_str("TesT");
    buffer.set_direction(Direction::LeftToRight);
    let result = shape(&font, &[], buffer);

    assert_eq!(glyphs(&result), [1, 2, 3, 1]);
    assert_eq!(clusters(&result), [0, 1, 2, 3]);
    assert_eq!(advances(&result), [10, 6, 5, 10]);
}

#[test]
fn single_substitution_by_delta() {
    let gsub = build_layout_table(b"ccmp", &[(1, single_subst_delta(&[5], 1))]);
    let data = FontBuilder::new(8).map('f', 5).gsub(gsub).build();

    let result = shape_str(&data, "f");
    assert_eq!(glyphs(&result), [6]);
}

#[test]
fn single_substitution_delta_wraps() {
    let gsub = build_layout_table(b"ccmp", &[(1, single_subst_delta(&[5], -6))]);
    let data = FontBuilder::new(8).map('f', 5).gsub(gsub).build();

    let result = shape_str(&data, "f");
    // 5 - 6 wraps in the 16-bit glyph space.
    assert_eq!(glyphs(&result), [0xFFFF]);
}

#[test]
fn ligature_merges_clusters() {
    let gsub = build_layout_table(b"liga", &[(4, ligature_subst(5, &[5, 7], 8))]);
    let data = FontBuilder::new(9)
        .map('f', 5)
        .map('i', 7)
        .gsub(gsub)
        .build();

    let result = shape_str(&data, "ffi");
    assert_eq!(glyphs(&result), [8]);
    assert_eq!(clusters(&result), [0]);
}

#[test]
fn ligature_in_running_text() {
    let gsub = build_layout_table(b"liga", &[(4, ligature_subst(5, &[7], 8))]);
    let data = FontBuilder::new(9)
        .map('f', 5)
        .map('i', 7)
        .map('x', 2)
        .gsub(gsub)
        .build();

    // "xfix": the ligature forms in the middle.
    let result = shape_str(&data, "xfix");
    assert_eq!(glyphs(&result), [2, 8, 2]);
    assert_eq!(clusters(&result), [0, 1, 3]);
}

#[test]
fn bad_gsub_version_is_ignored() {
    let gsub =
        build_layout_table_versioned(0x0002_0000, b"ccmp", &[(1, single_subst_delta(&[5], 1))]);
    let data = FontBuilder::new(8).map('f', 5).gsub(gsub).build();

    // The table is treated as absent; no substitution, no panic.
    let result = shape_str(&data, "f");
    assert_eq!(glyphs(&result), [5]);
}

#[test]
fn truncated_tables_do_not_panic() {
    let gsub = build_layout_table(b"ccmp", &[(1, single_subst_delta(&[5], 1))]);
    for cut in [1, 5, 11, 20, gsub.len() / 2] {
        let truncated = gsub[..gsub.len().min(cut)].to_vec();
        let data = FontBuilder::new(8).map('f', 5).gsub(truncated).build();
        let result = shape_str(&data, "f");
        assert_eq!(result.len(), 1);
    }
}

#[test]
fn mark_attaches_to_base() {
    let gpos = build_layout_table(b"mark", &[(4, mark_base_pos(11, 10, (80, 200), (10, 0)))]);
    let data = FontBuilder::new(12)
        .map('a', 10)
        .map('\u{0301}', 11)
        .advance(10, 100)
        .advance(11, 50)
        .gpos(gpos)
        .build();

    let result = shape_str(&data, "a\u{0301}");
    assert_eq!(glyphs(&result), [10, 11]);
    // One cluster: the mark belongs to its base.
    assert_eq!(clusters(&result), [0, 0]);

    let pos = result.glyph_positions();
    assert_eq!(pos[0].x_advance, 100);
    // The mark's advance is zeroed and its offset aligns the anchors,
    // compensating for the base's advance already taken.
    assert_eq!(pos[1].x_advance, 0);
    assert_eq!(pos[1].x_offset, 70 - 100);
    assert_eq!(pos[1].y_offset, 200);
}

#[test]
fn mutually_recursive_contexts_terminate() {
    // Two contextual lookups dispatching each other; recursion depth and
    // op budgets must keep this bounded.
    let gsub = build_layout_table(
        b"ccmp",
        &[
            (5, context_format3_single(5, 1)),
            (5, context_format3_single(5, 0)),
        ],
    );
    let data = FontBuilder::new(8).map('f', 5).gsub(gsub).build();

    let result = shape_str(&data, "ffff");
    assert_eq!(result.len(), 4);
    assert_eq!(glyphs(&result), [5, 5, 5, 5]);
}

#[test]
fn rtl_output_is_reversed() {
    let data = FontBuilder::new(4)
        .map('\u{05D0}', 1) // alef
        .map('\u{05D1}', 2) // bet
        .build();

    let result = shape_str(&data, "\u{05D0}\u{05D1}");
    // Visual order: last character first.
    assert_eq!(glyphs(&result), [2, 1]);
    assert_eq!(clusters(&result), [1, 0]);
}

#[test]
fn cluster_values_monotone() {
    let data = latin_font();
    let result = shape_str(&data, "TesTes");
    let c = clusters(&result);
    assert!(c.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn unmapped_characters_become_notdef() {
    let data = latin_font();
    let result = shape_str(&data, "T!T");
    assert_eq!(glyphs(&result), [1, 0, 1]);
}

#[test]
fn serialization_format() {
    let data = latin_font();
    let face = Face::from_slice(&data, 0).unwrap();
    let font = Font::new(&face);
    let mut buffer = UnicodeBuffer::new();
    buffer.push_str("Te");
    let result = shape(&font, &[], buffer);

    let s = result.serialize(&face, SerializeFlags::default());
    assert_eq!(s, "[gid1=0+10|gid2=1+6]");

    let s = result.serialize(
        &face,
        SerializeFlags::NO_CLUSTERS | SerializeFlags::NO_GLYPH_NAMES,
    );
    assert_eq!(s, "[1+10|2+6]");
}

#[test]
fn feature_disables_ligature() {
    let gsub = build_layout_table(b"liga", &[(4, ligature_subst(5, &[7], 8))]);
    let data = FontBuilder::new(9)
        .map('f', 5)
        .map('i', 7)
        .gsub(gsub)
        .build();

    let face = Face::from_slice(&data, 0).unwrap();
    let font = Font::new(&face);

    let mut buffer = UnicodeBuffer::new();
    buffer.push_str("fi");
    let off: textshape::Feature = "-liga".parse().unwrap();
    let result = shape(&font, &[off], buffer);
    assert_eq!(glyphs(&result), [5, 7]);

    let mut buffer = UnicodeBuffer::new();
    buffer.push_str("fi");
    let result = shape(&font, &[], buffer);
    assert_eq!(glyphs(&result), [8]);
}

#[test]
fn shape_with_cached_plan_matches_fresh_plan() {
    let data = latin_font();
    let face = Face::from_slice(&data, 0).unwrap();
    let font = Font::new(&face);

    let shape_once = || {
        let mut buffer = UnicodeBuffer::new();
        buffer.push_str("TesT");
        let result = shape(&font, &[], buffer);
        (glyphs(&result), advances(&result))
    };

    // The second run hits the face's plan cache.
    let first = shape_once();
    let second = shape_once();
    assert_eq!(first, second);
}

#[test]
fn empty_buffer_shapes_to_empty() {
    let data = latin_font();
    let result = shape_str(&data, "");
    assert!(result.is_empty());
}

#[test]
fn zwj_is_invisible_by_default() {
    let data = FontBuilder::new(4)
        .map('T', 1)
        .map(' ', 3)
        .advance(1, 10)
        .advance(3, 4)
        .build();

    let result = shape_str(&data, "T\u{200D}T");
    // The joiner maps to the invisible (space) glyph with zero advance.
    assert_eq!(result.len(), 3);
    let pos = result.glyph_positions();
    assert_eq!(pos[1].x_advance, 0);
    assert_eq!(result.glyph_infos()[1].glyph_id(), 3);
}

#[test]
fn adversarial_font_bytes_never_panic() {
    // Random-ish corruptions of a valid font must parse-or-reject without
    // panicking, and shaping must stay bounded.
    let base = latin_font();
    for step in 1..64usize {
        let mut data = base.clone();
        let mut i = step * 7 % data.len();
        while i < data.len() {
            data[i] = data[i].wrapping_add(step as u8).wrapping_mul(31);
            i += step;
        }
        if let Ok(face) = Face::from_slice(&data, 0) {
            let font = Font::new(&face);
            let mut buffer = UnicodeBuffer::new();
            buffer.push_str("TesT");
            let result = shape(&font, &[], buffer);
            let _ = result.len();
        }
    }
}
