//! A face instanced with scale, ppem and variation coordinates.

use crate::common::Variation;
use crate::draw::{DrawFuncs, DrawSession, Transform, TransformingPen};
use crate::face::Face;
use crate::ot;

/// Scaled glyph extents. `height` is negative for upright glyphs, mirroring
/// the font-space y-down bearing convention.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct GlyphExtents {
    pub x_bearing: i32,
    pub y_bearing: i32,
    pub width: i32,
    pub height: i32,
}

/// Overridable metric and outline queries, the seam for non-OpenType
/// backends. Every method has a composing default, so an implementation
/// only supplies what it can answer; unanswered queries fall back to the
/// built-in OpenType data.
pub trait FontFuncs {
    fn nominal_glyph(&self, _font: &Font, _unicode: char) -> Option<u32> {
        None
    }

    /// Batched nominal lookup; the default composes the scalar op and
    /// returns the number of leading code points that mapped.
    fn nominal_glyphs(&self, font: &Font, unicodes: &[u32], glyphs: &mut [u32]) -> usize {
        let mut count = 0;
        for (u, g) in unicodes.iter().zip(glyphs.iter_mut()) {
            match char::from_u32(*u).and_then(|c| self.nominal_glyph(font, c)) {
                Some(glyph) => *g = glyph,
                None => break,
            }
            count += 1;
        }
        count
    }

    fn variation_glyph(&self, _font: &Font, _unicode: char, _variation: char) -> Option<u32> {
        None
    }

    fn glyph_h_advance(&self, _font: &Font, _glyph: u32) -> Option<i32> {
        None
    }

    fn glyph_v_advance(&self, _font: &Font, _glyph: u32) -> Option<i32> {
        None
    }

    fn glyph_h_advances(&self, font: &Font, glyphs: &[u32], advances: &mut [i32]) {
        for (g, adv) in glyphs.iter().zip(advances.iter_mut()) {
            *adv = self
                .glyph_h_advance(font, *g)
                .unwrap_or_else(|| font.builtin_h_advance(*g));
        }
    }

    fn glyph_h_origin(&self, _font: &Font, _glyph: u32) -> Option<(i32, i32)> {
        None
    }

    /// The default composes the h-origin with the vertical metrics.
    fn glyph_v_origin(&self, _font: &Font, _glyph: u32) -> Option<(i32, i32)> {
        None
    }

    fn glyph_extents(&self, _font: &Font, _glyph: u32) -> Option<GlyphExtents> {
        None
    }

    fn glyph_contour_point(&self, _font: &Font, _glyph: u32, _point: u32) -> Option<(i32, i32)> {
        None
    }

    fn glyph_name(&self, _font: &Font, _glyph: u32) -> Option<String> {
        None
    }

    fn glyph_from_name(&self, _font: &Font, _name: &str) -> Option<u32> {
        None
    }

    /// Draws a glyph through the callbacks; the default uses the built-in
    /// outline tables.
    fn draw_glyph(&self, font: &Font, glyph: u32, pen: &mut dyn DrawFuncs) -> bool {
        font.builtin_draw_glyph(glyph, pen)
    }
}

/// A [`Face`] plus scale, ppem, synthetic styling and variation state.
pub struct Font<'a> {
    pub(crate) face: &'a Face<'a>,
    // An owned view carrying this font's variation coordinates, so the
    // shared face stays untouched.
    pub(crate) ttfp: ttf_parser::Face<'a>,
    x_scale: i32,
    y_scale: i32,
    x_ppem: u16,
    y_ppem: u16,
    ptem: f32,
    slant: f32,
    embolden_x: f32,
    embolden_y: f32,
    coords: Vec<ot::var::NormalizedCoord>,
    funcs: Option<&'a dyn FontFuncs>,
}

impl<'a> Font<'a> {
    pub fn new(face: &'a Face<'a>) -> Self {
        let upem = i32::from(face.units_per_em());
        Font {
            face,
            ttfp: face.ttfp.clone(),
            x_scale: upem,
            y_scale: upem,
            x_ppem: 0,
            y_ppem: 0,
            ptem: 0.0,
            slant: 0.0,
            embolden_x: 0.0,
            embolden_y: 0.0,
            coords: Vec::new(),
            funcs: None,
        }
    }

    pub fn face(&self) -> &Face<'a> {
        self.face
    }

    pub fn units_per_em(&self) -> u16 {
        self.face.units_per_em()
    }

    pub fn scale(&self) -> (i32, i32) {
        (self.x_scale, self.y_scale)
    }

    pub fn set_scale(&mut self, x_scale: i32, y_scale: i32) {
        self.x_scale = x_scale;
        self.y_scale = y_scale;
    }

    pub fn ppem(&self) -> (u16, u16) {
        (self.x_ppem, self.y_ppem)
    }

    pub fn set_ppem(&mut self, x_ppem: u16, y_ppem: u16) {
        self.x_ppem = x_ppem;
        self.y_ppem = y_ppem;
    }

    pub fn ptem(&self) -> f32 {
        self.ptem
    }

    pub fn set_ptem(&mut self, ptem: f32) {
        self.ptem = ptem;
    }

    /// Synthetic slant as a horizontal shear ratio, applied to outlines
    /// after positioning.
    pub fn set_synthetic_slant(&mut self, slant: f32) {
        self.slant = slant;
    }

    pub fn synthetic_slant(&self) -> f32 {
        self.slant
    }

    /// Synthetic emboldening, as fractions of an em added to advances.
    pub fn set_synthetic_embolden(&mut self, x: f32, y: f32) {
        self.embolden_x = x;
        self.embolden_y = y;
    }

    /// Replaces the full function table. Only possible while the caller
    /// still holds the font exclusively, which is the one-way latch the
    /// original expresses with reference counts.
    pub fn set_funcs(&mut self, funcs: &'a dyn FontFuncs) {
        self.funcs = Some(funcs);
    }

    pub fn set_variations(&mut self, variations: &[Variation]) {
        self.coords = ot::var::normalize_variations(self.face, variations);
        for v in variations {
            let _ = self.ttfp.set_variation(v.tag.into(), v.value);
        }
    }

    /// Applies the design-space coordinates of an fvar named instance.
    pub fn set_named_instance(&mut self, index: u16) -> bool {
        let Some(coords) = self.face.fvar().and_then(|f| f.instance_coords(index)) else {
            return false;
        };
        self.set_variations(&coords);
        true
    }

    pub(crate) fn coords(&self) -> &[ot::var::NormalizedCoord] {
        &self.coords
    }

    pub fn has_variations(&self) -> bool {
        self.coords.iter().any(|&c| c != 0)
    }

    // Scaling.

    fn em_scale(v: i64, scale: i32, upem: i32) -> i32 {
        if upem == 0 {
            return 0;
        }
        ((v * i64::from(scale)) as f64 / f64::from(upem)).round() as i32
    }

    pub(crate) fn em_scale_x(&self, v: i32) -> i32 {
        Self::em_scale(i64::from(v), self.x_scale, i32::from(self.units_per_em()))
    }

    pub(crate) fn em_scale_y(&self, v: i32) -> i32 {
        Self::em_scale(i64::from(v), self.y_scale, i32::from(self.units_per_em()))
    }

    pub(crate) fn x_mult(&self) -> f32 {
        let upem = f32::from(self.units_per_em().max(1));
        self.x_scale as f32 / upem
    }

    pub(crate) fn y_mult(&self) -> f32 {
        let upem = f32::from(self.units_per_em().max(1));
        self.y_scale as f32 / upem
    }

    // Character mapping.

    pub fn nominal_glyph(&self, c: char) -> Option<u32> {
        if let Some(funcs) = self.funcs {
            if let Some(g) = funcs.nominal_glyph(self, c) {
                return Some(g);
            }
        }
        self.ttfp.glyph_index(c).map(|g| u32::from(g.0))
    }

    pub fn variation_glyph(&self, c: char, variation: char) -> Option<u32> {
        if let Some(funcs) = self.funcs {
            if let Some(g) = funcs.variation_glyph(self, c, variation) {
                return Some(g);
            }
        }
        self.ttfp
            .glyph_variation_index(c, variation)
            .map(|g| u32::from(g.0))
    }

    pub fn has_glyph(&self, c: char) -> bool {
        self.nominal_glyph(c).is_some()
    }

    // Metrics. All results are scaled.

    pub(crate) fn builtin_h_advance(&self, glyph: u32) -> i32 {
        let advance = self
            .ttfp
            .glyph_hor_advance(ttf_parser::GlyphId(glyph as u16))
            .map_or(0, i32::from);
        let embolden = (self.embolden_x * f32::from(self.units_per_em())) as i32;
        self.em_scale_x(advance + embolden)
    }

    pub fn glyph_h_advance(&self, glyph: u32) -> i32 {
        if let Some(funcs) = self.funcs {
            if let Some(adv) = funcs.glyph_h_advance(self, glyph) {
                return adv;
            }
        }
        self.builtin_h_advance(glyph)
    }

    pub fn glyph_v_advance(&self, glyph: u32) -> i32 {
        if let Some(funcs) = self.funcs {
            if let Some(adv) = funcs.glyph_v_advance(self, glyph) {
                return adv;
            }
        }
        let advance = match self.ttfp.glyph_ver_advance(ttf_parser::GlyphId(glyph as u16)) {
            Some(a) => i32::from(a),
            None => i32::from(self.ttfp.ascender()) - i32::from(self.ttfp.descender()),
        };
        let embolden = (self.embolden_y * f32::from(self.units_per_em())) as i32;
        -self.em_scale_y(advance + embolden)
    }

    pub fn glyph_h_origin(&self, glyph: u32) -> (i32, i32) {
        if let Some(funcs) = self.funcs {
            if let Some(o) = funcs.glyph_h_origin(self, glyph) {
                return o;
            }
        }
        (0, 0)
    }

    pub fn glyph_v_origin(&self, glyph: u32) -> (i32, i32) {
        if let Some(funcs) = self.funcs {
            if let Some(o) = funcs.glyph_v_origin(self, glyph) {
                return o;
            }
        }
        // Composed from the horizontal origin plus vertical metrics.
        let x = self.glyph_h_advance(glyph) / 2;
        let y = self.em_scale_y(i32::from(self.ttfp.ascender()));
        (x, y)
    }

    pub fn glyph_extents(&self, glyph: u32) -> Option<GlyphExtents> {
        if let Some(funcs) = self.funcs {
            if let Some(e) = funcs.glyph_extents(self, glyph) {
                return Some(e);
            }
        }
        let bbox = self.ttfp.glyph_bounding_box(ttf_parser::GlyphId(glyph as u16))?;
        Some(GlyphExtents {
            x_bearing: self.em_scale_x(i32::from(bbox.x_min)),
            y_bearing: self.em_scale_y(i32::from(bbox.y_max)),
            width: self.em_scale_x(i32::from(bbox.x_max) - i32::from(bbox.x_min)),
            height: self.em_scale_y(i32::from(bbox.y_min) - i32::from(bbox.y_max)),
        })
    }

    pub fn glyph_contour_point(&self, glyph: u32, point: u32) -> Option<(i32, i32)> {
        self.funcs?.glyph_contour_point(self, glyph, point)
    }

    pub fn glyph_name(&self, glyph: u32) -> Option<String> {
        if let Some(funcs) = self.funcs {
            if let Some(n) = funcs.glyph_name(self, glyph) {
                return Some(n);
            }
        }
        self.face.glyph_name(glyph as u16).map(str::to_owned)
    }

    pub fn glyph_from_name(&self, name: &str) -> Option<u32> {
        if let Some(funcs) = self.funcs {
            if let Some(g) = funcs.glyph_from_name(self, name) {
                return Some(g);
            }
        }
        (0..self.face.glyph_count())
            .find(|&g| self.face.glyph_name(g) == Some(name))
            .map(u32::from)
    }

    // Drawing.

    /// Extracts a glyph outline through the draw callbacks.
    pub fn draw_glyph(&self, glyph: u32, pen: &mut dyn DrawFuncs) -> bool {
        if let Some(funcs) = self.funcs {
            return funcs.draw_glyph(self, glyph, pen);
        }
        self.builtin_draw_glyph(glyph, pen)
    }

    pub(crate) fn builtin_draw_glyph(&self, glyph: u32, pen: &mut dyn DrawFuncs) -> bool {
        let mut session = DrawSession::new(pen);

        // Variable composites take priority over plain outlines.
        if let Some(varc) = self.face.varc() {
            if varc.covers(glyph) {
                let ok = ot::varc::draw_glyph(self, varc, glyph, &mut session);
                session.finish();
                return ok;
            }
        }

        let ok = self.draw_outline(glyph, &Transform::default(), &mut session);
        session.finish();
        ok
    }

    /// Draws the plain (glyf/CFF) outline with the font scale, synthetic
    /// slant and `transform` applied.
    pub(crate) fn draw_outline(
        &self,
        glyph: u32,
        transform: &Transform,
        session: &mut DrawSession,
    ) -> bool {
        let scale = Transform {
            xx: self.x_mult(),
            yx: 0.0,
            xy: self.slant * self.x_mult(),
            yy: self.y_mult(),
            dx: 0.0,
            dy: 0.0,
        };
        let full = transform.multiply(&scale);

        let mut bridge = OutlineBridge { pen: TransformingPen { inner: session, transform: full } };
        self.ttfp
            .outline_glyph(ttf_parser::GlyphId(glyph as u16), &mut bridge)
            .is_some()
    }
}

impl std::fmt::Debug for Font<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Font")
            .field("x_scale", &self.x_scale)
            .field("y_scale", &self.y_scale)
            .field("coords", &self.coords)
            .finish()
    }
}

/// Adapts ttf-parser's outline callbacks onto the draw session.
struct OutlineBridge<'a, 'b> {
    pen: TransformingPen<'a, 'b>,
}

impl ttf_parser::OutlineBuilder for OutlineBridge<'_, '_> {
    fn move_to(&mut self, x: f32, y: f32) {
        DrawFuncs::move_to(&mut self.pen, x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        DrawFuncs::line_to(&mut self.pen, x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (cx, cy) = self.pen.transform.transform_point(x1, y1);
        let (tx, ty) = self.pen.transform.transform_point(x, y);
        self.pen.inner.quad_to(cx, cy, tx, ty);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        DrawFuncs::cubic_to(&mut self.pen, x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        DrawFuncs::close_path(&mut self.pen);
    }
}
