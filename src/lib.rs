/*!
A pure-Rust OpenType text shaping engine.

The crate converts a run of Unicode code points plus a parsed font into a
sequence of positioned glyphs: it parses adversarial binary font tables
safely, evaluates GSUB/GPOS layout rules, runs script-specific shapers for
complex scripts, and produces deterministic output.

```no_run
let data = std::fs::read("font.ttf").unwrap();
let face = textshape::Face::from_slice(&data, 0).unwrap();
let font = textshape::Font::new(&face);

let mut buffer = textshape::UnicodeBuffer::new();
buffer.push_str("Hello");
let glyphs = textshape::shape(&font, &[], buffer);

for (info, pos) in glyphs.glyph_infos().iter().zip(glyphs.glyph_positions()) {
    println!("gid {} advance {}", info.glyph_id(), pos.x_advance);
}
```
*/

#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_else_if)]

mod blob;
mod buffer;
mod common;
mod complex;
mod draw;
mod face;
mod font;
mod ot;
mod parser;
mod plan;
mod sanitize;
mod shape;
mod unicode;

pub use blob::{Blob, BlobError, MemoryMode};
pub use buffer::{
    glyph_flag, BufferClusterLevel, BufferFlags, GlyphBuffer, GlyphInfo, GlyphPosition,
    SerializeFlags, UnicodeBuffer,
};
pub use common::{
    script, Direction, Feature, Language, Script, SegmentProperties, Tag, Variation,
    FEATURE_GLOBAL_END, FEATURE_GLOBAL_START,
};
pub use draw::{DrawFuncs, DrawState};
pub use face::{Face, FaceError};
pub use font::{Font, FontFuncs, GlyphExtents};
pub use plan::ShapePlan;
pub use shape::{shape, shape_with_plan};
pub use unicode::{BuiltinUnicodeFuncs, GeneralCategory, UnicodeFuncs};

pub(crate) use buffer::Mask;
