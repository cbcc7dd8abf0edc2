//! Glyph outline extraction callbacks.

/// Receives a glyph outline as path segments.
///
/// Coordinates are in font units scaled by the font's x/y scale.
pub trait DrawFuncs {
    fn move_to(&mut self, x: f32, y: f32);
    fn line_to(&mut self, x: f32, y: f32);

    /// Override when quadratic curves are consumed natively. The default
    /// emits the exact cubic equivalent of the quadratic: control points at
    /// (start + 2·control)/3 and (end + 2·control)/3.
    fn quad_to(&mut self, from_x: f32, from_y: f32, control_x: f32, control_y: f32, to_x: f32, to_y: f32) {
        const ONE_THIRD: f32 = 1.0 / 3.0;
        self.cubic_to(
            (from_x + 2.0 * control_x) * ONE_THIRD,
            (from_y + 2.0 * control_y) * ONE_THIRD,
            (to_x + 2.0 * control_x) * ONE_THIRD,
            (to_y + 2.0 * control_y) * ONE_THIRD,
            to_x,
            to_y,
        );
    }

    fn cubic_to(
        &mut self,
        control1_x: f32,
        control1_y: f32,
        control2_x: f32,
        control2_y: f32,
        to_x: f32,
        to_y: f32,
    );

    fn close_path(&mut self);
}

/// Pen state threaded through a draw pass.
#[derive(Clone, Copy, Debug, Default)]
pub struct DrawState {
    pub current_x: f32,
    pub current_y: f32,
    pub path_start_x: f32,
    pub path_start_y: f32,
    pub path_open: bool,
}

/// Mediates between outline producers and a [`DrawFuncs`] consumer,
/// guaranteeing every `move_to` is paired with a `close_path` and that
/// segments are only emitted inside an open path.
pub(crate) struct DrawSession<'a> {
    pub funcs: &'a mut dyn DrawFuncs,
    pub st: DrawState,
}

impl<'a> DrawSession<'a> {
    pub fn new(funcs: &'a mut dyn DrawFuncs) -> Self {
        DrawSession { funcs, st: DrawState::default() }
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        if self.st.path_open {
            self.close_path();
        }
        self.st.current_x = x;
        self.st.current_y = y;
        self.st.path_start_x = x;
        self.st.path_start_y = y;
    }

    fn start_path(&mut self) {
        debug_assert!(!self.st.path_open);
        self.st.path_open = true;
        self.funcs.move_to(self.st.path_start_x, self.st.path_start_y);
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        if !self.st.path_open {
            self.start_path();
        }
        self.funcs.line_to(x, y);
        self.st.current_x = x;
        self.st.current_y = y;
    }

    pub fn quad_to(&mut self, control_x: f32, control_y: f32, x: f32, y: f32) {
        if !self.st.path_open {
            self.start_path();
        }
        let (fx, fy) = (self.st.current_x, self.st.current_y);
        self.funcs.quad_to(fx, fy, control_x, control_y, x, y);
        self.st.current_x = x;
        self.st.current_y = y;
    }

    pub fn cubic_to(&mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) {
        if !self.st.path_open {
            self.start_path();
        }
        self.funcs.cubic_to(c1x, c1y, c2x, c2y, x, y);
        self.st.current_x = x;
        self.st.current_y = y;
    }

    pub fn close_path(&mut self) {
        if self.st.path_open {
            self.funcs.close_path();
            self.st.path_open = false;
        }
        self.st.current_x = self.st.path_start_x;
        self.st.current_y = self.st.path_start_y;
    }

    pub fn finish(&mut self) {
        if self.st.path_open {
            self.close_path();
        }
    }
}

/// A 2×3 affine transform in column-major order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Transform {
    pub xx: f32,
    pub yx: f32,
    pub xy: f32,
    pub yy: f32,
    pub dx: f32,
    pub dy: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Transform { xx: 1.0, yx: 0.0, xy: 0.0, yy: 1.0, dx: 0.0, dy: 0.0 }
    }
}

impl Transform {
    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.xx * x + self.xy * y + self.dx,
            self.yx * x + self.yy * y + self.dy,
        )
    }

    /// `self` applied after `other` (i.e. `self ∘ other`).
    pub fn multiply(&self, other: &Transform) -> Transform {
        Transform {
            xx: self.xx * other.xx + self.xy * other.yx,
            yx: self.yx * other.xx + self.yy * other.yx,
            xy: self.xx * other.xy + self.xy * other.yy,
            yy: self.yx * other.xy + self.yy * other.yy,
            dx: self.xx * other.dx + self.xy * other.dy + self.dx,
            dy: self.yx * other.dx + self.yy * other.dy + self.dy,
        }
    }
}

/// The decomposed transform of a variable-composite component.
#[derive(Clone, Copy, Debug)]
pub(crate) struct DecomposedTransform {
    pub translate_x: f32,
    pub translate_y: f32,
    /// Counter-clockwise rotation, in fractions of a half turn.
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub skew_x: f32,
    pub skew_y: f32,
    pub t_center_x: f32,
    pub t_center_y: f32,
}

impl Default for DecomposedTransform {
    fn default() -> Self {
        DecomposedTransform {
            translate_x: 0.0,
            translate_y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            skew_x: 0.0,
            skew_y: 0.0,
            t_center_x: 0.0,
            t_center_y: 0.0,
        }
    }
}

impl DecomposedTransform {
    /// Composes translate → rotate (about the center) → skew → scale.
    pub fn to_transform(&self) -> Transform {
        let mut t = Transform {
            xx: 1.0,
            yx: 0.0,
            xy: 0.0,
            yy: 1.0,
            dx: self.translate_x + self.t_center_x,
            dy: self.translate_y + self.t_center_y,
        };

        let angle = self.rotation * std::f32::consts::PI;
        if angle != 0.0 {
            let (s, c) = angle.sin_cos();
            t = t.multiply(&Transform { xx: c, yx: s, xy: -s, yy: c, dx: 0.0, dy: 0.0 });
        }

        let sx = (self.skew_x * std::f32::consts::PI).tan();
        let sy = (self.skew_y * std::f32::consts::PI).tan();
        if sx != 0.0 || sy != 0.0 {
            t = t.multiply(&Transform { xx: 1.0, yx: sy, xy: sx, yy: 1.0, dx: 0.0, dy: 0.0 });
        }

        t = t.multiply(&Transform {
            xx: self.scale_x,
            yx: 0.0,
            xy: 0.0,
            yy: self.scale_y,
            dx: 0.0,
            dy: 0.0,
        });

        t.multiply(&Transform {
            xx: 1.0,
            yx: 0.0,
            xy: 0.0,
            yy: 1.0,
            dx: -self.t_center_x,
            dy: -self.t_center_y,
        })
    }
}

/// A pen applying an affine transform before forwarding to the consumer.
pub(crate) struct TransformingPen<'a, 'b> {
    pub inner: &'a mut DrawSession<'b>,
    pub transform: Transform,
}

impl DrawFuncs for TransformingPen<'_, '_> {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.transform.transform_point(x, y);
        self.inner.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.transform.transform_point(x, y);
        self.inner.line_to(x, y);
    }

    fn quad_to(&mut self, _fx: f32, _fy: f32, cx: f32, cy: f32, x: f32, y: f32) {
        let (cx, cy) = self.transform.transform_point(cx, cy);
        let (x, y) = self.transform.transform_point(x, y);
        self.inner.quad_to(cx, cy, x, y);
    }

    fn cubic_to(&mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) {
        let (c1x, c1y) = self.transform.transform_point(c1x, c1y);
        let (c2x, c2y) = self.transform.transform_point(c2x, c2y);
        let (x, y) = self.transform.transform_point(x, y);
        self.inner.cubic_to(c1x, c1y, c2x, c2y, x, y);
    }

    fn close_path(&mut self) {
        self.inner.close_path();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl DrawFuncs for Recorder {
        fn move_to(&mut self, x: f32, y: f32) {
            self.events.push(format!("M {} {}", x, y));
        }
        fn line_to(&mut self, x: f32, y: f32) {
            self.events.push(format!("L {} {}", x, y));
        }
        fn cubic_to(&mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) {
            self.events
                .push(format!("C {} {} {} {} {} {}", c1x, c1y, c2x, c2y, x, y));
        }
        fn close_path(&mut self) {
            self.events.push("Z".into());
        }
    }

    #[test]
    fn quad_synthesis_is_exact_thirds() {
        let mut rec = Recorder::default();
        let mut session = DrawSession::new(&mut rec);
        session.move_to(0.0, 0.0);
        session.quad_to(30.0, 60.0, 90.0, 0.0);
        session.finish();
        assert_eq!(
            rec.events,
            ["M 0 0", "C 20 40 50 40 90 0", "Z"]
        );
    }

    #[test]
    fn every_move_gets_a_close() {
        let mut rec = Recorder::default();
        let mut session = DrawSession::new(&mut rec);
        session.move_to(0.0, 0.0);
        session.line_to(10.0, 0.0);
        session.move_to(20.0, 0.0);
        session.line_to(30.0, 0.0);
        session.finish();

        let moves = rec.events.iter().filter(|e| e.starts_with('M')).count();
        let closes = rec.events.iter().filter(|e| *e == "Z").count();
        assert_eq!(moves, closes);
    }

    #[test]
    fn empty_paths_are_dropped() {
        let mut rec = Recorder::default();
        let mut session = DrawSession::new(&mut rec);
        session.move_to(0.0, 0.0);
        session.move_to(5.0, 5.0);
        session.finish();
        assert!(rec.events.is_empty());
    }

    #[test]
    fn transform_composition() {
        let scale2 = Transform { xx: 2.0, yx: 0.0, xy: 0.0, yy: 2.0, dx: 0.0, dy: 0.0 };
        let shift = Transform { xx: 1.0, yx: 0.0, xy: 0.0, yy: 1.0, dx: 10.0, dy: 0.0 };
        let t = scale2.multiply(&shift);
        assert_eq!(t.transform_point(1.0, 1.0), (22.0, 2.0));
    }

    #[test]
    fn decomposed_scale_about_center() {
        let d = DecomposedTransform {
            scale_x: 2.0,
            scale_y: 2.0,
            t_center_x: 10.0,
            t_center_y: 0.0,
            ..DecomposedTransform::default()
        };
        let t = d.to_transform();
        // The center stays fixed.
        let (x, y) = t.transform_point(10.0, 0.0);
        assert!((x - 10.0).abs() < 1e-4 && y.abs() < 1e-4);
        let (x, _) = t.transform_point(11.0, 0.0);
        assert!((x - 12.0).abs() < 1e-4);
    }
}
