//! Outline extraction tests.

mod common;

use common::FontBuilder;
use textshape::{DrawFuncs, Face, Font};

#[derive(Default)]
struct Recorder {
    moves: usize,
    lines: usize,
    quads: usize,
    cubics: usize,
    closes: usize,
    points: Vec<(f32, f32)>,
    open: bool,
    balanced: bool,
}

impl Recorder {
    fn new() -> Self {
        Recorder { balanced: true, ..Recorder::default() }
    }
}

impl DrawFuncs for Recorder {
    fn move_to(&mut self, x: f32, y: f32) {
        if self.open {
            self.balanced = false;
        }
        self.open = true;
        self.moves += 1;
        self.points.push((x, y));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        if !self.open {
            self.balanced = false;
        }
        self.lines += 1;
        self.points.push((x, y));
    }

    fn quad_to(&mut self, _fx: f32, _fy: f32, cx: f32, cy: f32, x: f32, y: f32) {
        if !self.open {
            self.balanced = false;
        }
        self.quads += 1;
        self.points.push((cx, cy));
        self.points.push((x, y));
    }

    fn cubic_to(&mut self, _c1x: f32, _c1y: f32, _c2x: f32, _c2y: f32, x: f32, y: f32) {
        if !self.open {
            self.balanced = false;
        }
        self.cubics += 1;
        self.points.push((x, y));
    }

    fn close_path(&mut self) {
        if !self.open {
            self.balanced = false;
        }
        self.open = false;
        self.closes += 1;
    }
}

#[test]
fn square_outline_is_closed() {
    let data = FontBuilder::new(3).square_outlines().build();
    let face = Face::from_slice(&data, 0).unwrap();
    let font = Font::new(&face);

    let mut rec = Recorder::new();
    assert!(font.draw_glyph(1, &mut rec));

    assert_eq!(rec.moves, 1);
    assert_eq!(rec.closes, 1);
    assert!(rec.balanced);
    assert!(!rec.open);
    assert!(rec.lines >= 3);
}

#[test]
fn empty_glyph_draws_nothing() {
    let data = FontBuilder::new(3).square_outlines().build();
    let face = Face::from_slice(&data, 0).unwrap();
    let font = Font::new(&face);

    let mut rec = Recorder::new();
    // .notdef has no outline in the synthesized font.
    font.draw_glyph(0, &mut rec);
    assert_eq!(rec.moves, 0);
    assert_eq!(rec.closes, 0);
}

#[test]
fn scaling_applies_to_outline() {
    let data = FontBuilder::new(3).square_outlines().build();
    let face = Face::from_slice(&data, 0).unwrap();
    let mut font = Font::new(&face);
    font.set_scale(2000, 2000); // 2x the 1000 upem

    let mut rec = Recorder::new();
    assert!(font.draw_glyph(1, &mut rec));

    let max_x = rec.points.iter().map(|p| p.0).fold(0.0f32, f32::max);
    assert!((max_x - 200.0).abs() < 0.01);
}

#[test]
fn synthetic_slant_shears_outline() {
    let data = FontBuilder::new(3).square_outlines().build();
    let face = Face::from_slice(&data, 0).unwrap();
    let mut font = Font::new(&face);
    font.set_synthetic_slant(0.5);

    let mut rec = Recorder::new();
    assert!(font.draw_glyph(1, &mut rec));

    // The top edge (y=100) shifts right by slant * y.
    let top_max_x = rec
        .points
        .iter()
        .filter(|p| (p.1 - 100.0).abs() < 0.01)
        .map(|p| p.0)
        .fold(0.0f32, f32::max);
    assert!((top_max_x - 150.0).abs() < 0.01);
}
