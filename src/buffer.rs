//! The shape buffer: code points in, positioned glyphs out.

use crate::common::{script, Direction, Language, Script};
use crate::unicode::{CharExt, GeneralCategory, GeneralCategoryExt, REPLACEMENT};

pub(crate) type Mask = u32;

/// Glyph flags exposed in the output mask.
pub mod glyph_flag {
    /// Breaking the text here and re-shaping the parts may give different
    /// results.
    pub const UNSAFE_TO_BREAK: u32 = 0x0000_0001;
    /// Concatenating shaped runs at this boundary may give different results.
    pub const UNSAFE_TO_CONCAT: u32 = 0x0000_0002;
    pub const DEFINED: u32 = 0x0000_0003;
}

/// The bit reserved for features enabled over the whole buffer.
pub(crate) const GLOBAL_BIT: u32 = 2;
pub(crate) const GLOBAL_MASK: Mask = 1 << GLOBAL_BIT;

const CONTEXT_LENGTH: usize = 5;

const MAX_LEN_FACTOR: usize = 32;
const MAX_LEN_MIN: usize = 4096;
const MAX_OPS_FACTOR: i32 = 64;
const MAX_OPS_MIN: i32 = 1024;

/// A glyph plus its source cluster and scratch state.
///
/// Before shaping `codepoint` is a Unicode scalar value; after shaping it is
/// a glyph index in the font.
#[repr(C)]
#[derive(Clone, Copy, Default, PartialEq)]
pub struct GlyphInfo {
    pub codepoint: u32,
    pub(crate) mask: Mask,
    pub cluster: u32,
    pub(crate) var1: u32,
    pub(crate) var2: u32,
}

impl std::fmt::Debug for GlyphInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlyphInfo")
            .field("codepoint", &self.codepoint)
            .field("cluster", &self.cluster)
            .finish()
    }
}

impl GlyphInfo {
    pub fn glyph_id(&self) -> u32 {
        self.codepoint
    }

    pub fn unsafe_to_break(&self) -> bool {
        self.mask & glyph_flag::UNSAFE_TO_BREAK != 0
    }

    pub fn unsafe_to_concat(&self) -> bool {
        self.mask & glyph_flag::UNSAFE_TO_CONCAT != 0
    }

    pub(crate) fn as_char(&self) -> char {
        char::from_u32(self.codepoint).unwrap_or(REPLACEMENT)
    }

    // var2 bits 0..16: unicode props.
    //   bits 0..5   general category
    //   bit  5      default ignorable
    //   bit  6      hidden (removed from output but still present)
    //   bit  7      continuation (non-initial part of a grapheme)
    //   bits 8..16  modified combining class, or Cf subflags for Format
    const UPROPS_MASK_GC: u32 = 0x1F;
    const UPROPS_MASK_IGNORABLE: u32 = 0x20;
    const UPROPS_MASK_HIDDEN: u32 = 0x40;
    const UPROPS_MASK_CONTINUATION: u32 = 0x80;
    const UPROPS_MASK_CF_ZWJ: u32 = 0x100;
    const UPROPS_MASK_CF_ZWNJ: u32 = 0x200;

    pub(crate) fn unicode_props(&self) -> u16 {
        (self.var2 & 0xFFFF) as u16
    }

    pub(crate) fn set_unicode_props(&mut self, props: u16) {
        self.var2 = (self.var2 & 0xFFFF_0000) | u32::from(props);
    }

    pub(crate) fn init_unicode_props(&mut self, scratch: &mut BufferScratchFlags) {
        let u = self.as_char();
        let gc = u.general_category();
        let mut props = u32::from(gc.to_u8());

        if u as u32 >= 0x80 {
            *scratch |= BufferScratchFlags::HAS_NON_ASCII;

            if u.is_default_ignorable() {
                props |= Self::UPROPS_MASK_IGNORABLE;
                *scratch |= BufferScratchFlags::HAS_DEFAULT_IGNORABLES;

                match u {
                    crate::unicode::ZWJ => props |= Self::UPROPS_MASK_CF_ZWJ,
                    crate::unicode::ZWNJ => props |= Self::UPROPS_MASK_CF_ZWNJ,
                    crate::unicode::CGJ => *scratch |= BufferScratchFlags::HAS_CGJ,
                    _ => {}
                }
            }

            if gc.is_mark() {
                props |= Self::UPROPS_MASK_CONTINUATION;
                props |= u32::from(u.modified_combining_class()) << 8;
            }
        }

        self.set_unicode_props(props as u16);
    }

    pub(crate) fn general_category(&self) -> GeneralCategory {
        GeneralCategory::from_u8((self.unicode_props() as u32 & Self::UPROPS_MASK_GC) as u8)
    }

    pub(crate) fn set_general_category(&mut self, gc: GeneralCategory) {
        let props =
            (u32::from(self.unicode_props()) & !Self::UPROPS_MASK_GC) | u32::from(gc.to_u8());
        self.set_unicode_props(props as u16);
    }

    pub(crate) fn is_unicode_mark(&self) -> bool {
        self.general_category().is_mark()
    }

    pub(crate) fn modified_combining_class(&self) -> u8 {
        if self.is_unicode_mark() {
            (self.unicode_props() >> 8) as u8
        } else {
            0
        }
    }

    pub(crate) fn set_modified_combining_class(&mut self, mcc: u8) {
        if self.is_unicode_mark() {
            let props = (u32::from(mcc) << 8) | (u32::from(self.unicode_props()) & 0xFF);
            self.set_unicode_props(props as u16);
        }
    }

    /// Space-fallback type, stashed in the combining-class byte; only
    /// meaningful for space separators, which are never marks.
    pub(crate) fn space_fallback(&self) -> crate::unicode::Space {
        if self.general_category() == GeneralCategory::SpaceSeparator {
            crate::unicode::Space::from_u8((self.unicode_props() >> 8) as u8)
        } else {
            crate::unicode::Space::NotSpace
        }
    }

    pub(crate) fn set_space_fallback(&mut self, space: crate::unicode::Space) {
        if self.general_category() == GeneralCategory::SpaceSeparator {
            let props = (u32::from(space.to_u8()) << 8)
                | (u32::from(self.unicode_props()) & 0xFF);
            self.set_unicode_props(props as u16);
        }
    }

    pub(crate) fn is_default_ignorable(&self) -> bool {
        u32::from(self.unicode_props()) & Self::UPROPS_MASK_IGNORABLE != 0 && !self.substituted()
    }

    pub(crate) fn is_hidden(&self) -> bool {
        u32::from(self.unicode_props()) & Self::UPROPS_MASK_HIDDEN != 0
    }

    pub(crate) fn set_hidden(&mut self) {
        let props = u32::from(self.unicode_props()) | Self::UPROPS_MASK_HIDDEN;
        self.set_unicode_props(props as u16);
    }

    pub(crate) fn is_continuation(&self) -> bool {
        u32::from(self.unicode_props()) & Self::UPROPS_MASK_CONTINUATION != 0
    }

    pub(crate) fn set_continuation(&mut self) {
        let props = u32::from(self.unicode_props()) | Self::UPROPS_MASK_CONTINUATION;
        self.set_unicode_props(props as u16);
    }

    fn is_format(&self) -> bool {
        self.general_category() == GeneralCategory::Format
    }

    pub(crate) fn is_zwnj(&self) -> bool {
        self.is_format() && u32::from(self.unicode_props()) & Self::UPROPS_MASK_CF_ZWNJ != 0
    }

    pub(crate) fn is_zwj(&self) -> bool {
        self.is_format() && u32::from(self.unicode_props()) & Self::UPROPS_MASK_CF_ZWJ != 0
    }

    // var1 bits 0..16: glyph props (GDEF class and substitution markers).
    pub(crate) fn glyph_props(&self) -> u16 {
        (self.var1 & 0xFFFF) as u16
    }

    pub(crate) fn set_glyph_props(&mut self, props: u16) {
        self.var1 = (self.var1 & 0xFFFF_0000) | u32::from(props);
    }

    pub(crate) fn is_base_glyph(&self) -> bool {
        self.glyph_props() & crate::ot::glyph_props::BASE != 0
    }

    pub(crate) fn is_mark(&self) -> bool {
        self.glyph_props() & crate::ot::glyph_props::MARK != 0
    }

    pub(crate) fn substituted(&self) -> bool {
        self.glyph_props() & crate::ot::glyph_props::SUBSTITUTED != 0
    }

    pub(crate) fn multiplied(&self) -> bool {
        self.glyph_props() & crate::ot::glyph_props::MULTIPLIED != 0
    }

    pub(crate) fn clear_ligated_and_multiplied(&mut self) {
        let props = self.glyph_props()
            & !(crate::ot::glyph_props::LIGATED | crate::ot::glyph_props::MULTIPLIED);
        self.set_glyph_props(props);
    }

    pub(crate) fn mark_attachment_type(&self) -> u8 {
        (self.glyph_props() >> 8) as u8
    }

    // var1 bits 16..24: ligature id and component.
    const IS_LIG_BASE: u8 = 0x10;

    pub(crate) fn lig_props(&self) -> u8 {
        ((self.var1 >> 16) & 0xFF) as u8
    }

    pub(crate) fn set_lig_props(&mut self, props: u8) {
        self.var1 = (self.var1 & 0xFF00_FFFF) | (u32::from(props) << 16);
    }

    pub(crate) fn set_lig_props_for_ligature(&mut self, lig_id: u8, lig_num_comps: u8) {
        self.set_lig_props((lig_id << 5) | Self::IS_LIG_BASE | lig_num_comps.min(0x0F));
    }

    pub(crate) fn set_lig_props_for_mark(&mut self, lig_id: u8, lig_comp: u8) {
        self.set_lig_props((lig_id << 5) | lig_comp.min(0x0F));
    }

    pub(crate) fn set_lig_props_for_component(&mut self, lig_comp: u8) {
        self.set_lig_props_for_mark(0, lig_comp);
    }

    pub(crate) fn lig_id(&self) -> u8 {
        self.lig_props() >> 5
    }

    pub(crate) fn is_ligated_internal(&self) -> bool {
        self.lig_props() & Self::IS_LIG_BASE != 0
    }

    pub(crate) fn lig_comp(&self) -> u8 {
        if self.is_ligated_internal() {
            0
        } else {
            self.lig_props() & 0x0F
        }
    }

    pub(crate) fn lig_num_comps(&self) -> u8 {
        if self.glyph_props() & crate::ot::glyph_props::LIGATURE != 0
            && self.is_ligated_internal()
        {
            self.lig_props() & 0x0F
        } else {
            1
        }
    }

    // var1 bits 24..32: syllable serial for complex shapers.
    pub(crate) fn syllable(&self) -> u8 {
        (self.var1 >> 24) as u8
    }

    pub(crate) fn set_syllable(&mut self, syllable: u8) {
        self.var1 = (self.var1 & 0x00FF_FFFF) | (u32::from(syllable) << 24);
    }

    // var2 bits 16..24 and 24..32: complex-shaper category and position.
    pub(crate) fn complex_category(&self) -> u8 {
        ((self.var2 >> 16) & 0xFF) as u8
    }

    pub(crate) fn set_complex_category(&mut self, v: u8) {
        self.var2 = (self.var2 & 0xFF00_FFFF) | (u32::from(v) << 16);
    }

    pub(crate) fn complex_aux(&self) -> u8 {
        (self.var2 >> 24) as u8
    }

    pub(crate) fn set_complex_aux(&mut self, v: u8) {
        self.var2 = (self.var2 & 0x00FF_FFFF) | (u32::from(v) << 24);
    }
}

/// The position of a shaped glyph, in scaled font units.
#[repr(C)]
#[derive(Clone, Copy, Default, PartialEq, Debug)]
pub struct GlyphPosition {
    pub x_advance: i32,
    pub y_advance: i32,
    pub x_offset: i32,
    pub y_offset: i32,
    pub(crate) var: u32,
}

impl GlyphPosition {
    // Attachment chain: signed offset to the glyph this one attaches to.
    pub(crate) fn attach_chain(&self) -> i16 {
        (self.var & 0xFFFF) as i16
    }

    pub(crate) fn set_attach_chain(&mut self, chain: i16) {
        self.var = (self.var & 0xFFFF_0000) | u32::from(chain as u16);
    }

    pub(crate) fn attach_type(&self) -> u8 {
        ((self.var >> 16) & 0xFF) as u8
    }

    pub(crate) fn set_attach_type(&mut self, t: u8) {
        self.var = (self.var & 0xFF00_FFFF) | (u32::from(t) << 16);
    }
}

pub(crate) mod attach_type {
    pub const MARK: u8 = 1;
    pub const CURSIVE: u8 = 2;
}

bitflags::bitflags! {
    /// Flags controlling buffer shaping behavior.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct BufferFlags: u32 {
        /// The buffer begins the paragraph.
        const BEGINNING_OF_TEXT = 0x01;
        /// The buffer ends the paragraph.
        const END_OF_TEXT = 0x02;
        /// Keep default-ignorable glyphs instead of replacing them with
        /// invisible ones.
        const PRESERVE_DEFAULT_IGNORABLES = 0x04;
        /// Remove default-ignorable glyphs entirely.
        const REMOVE_DEFAULT_IGNORABLES = 0x08;
        /// Do not insert a dotted circle for broken syllables.
        const DO_NOT_INSERT_DOTTED_CIRCLE = 0x10;
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub(crate) struct BufferScratchFlags: u32 {
        const HAS_NON_ASCII = 0x01;
        const HAS_DEFAULT_IGNORABLES = 0x02;
        const HAS_SPACE_FALLBACK = 0x04;
        const HAS_GPOS_ATTACHMENT = 0x08;
        const HAS_CGJ = 0x10;
        const HAS_BROKEN_SYLLABLE = 0x20;

        // Reserved for the running complex shaper.
        const COMPLEX0 = 0x0100_0000;
        const COMPLEX1 = 0x0200_0000;
        const COMPLEX2 = 0x0400_0000;
        const COMPLEX3 = 0x0800_0000;
    }
}

bitflags::bitflags! {
    /// Flags for [`GlyphBuffer::serialize`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct SerializeFlags: u32 {
        const NO_CLUSTERS = 0x01;
        const NO_POSITIONS = 0x02;
        const NO_GLYPH_NAMES = 0x04;
        const GLYPH_FLAGS = 0x08;
    }
}

/// Granularity of cluster merging.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum BufferClusterLevel {
    /// Clusters are monotone and never finer than a grapheme.
    #[default]
    MonotoneGraphemes,
    /// Clusters are monotone, one per original character where possible.
    MonotoneCharacters,
    /// One cluster per character; no merging.
    Characters,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub(crate) enum ContentType {
    #[default]
    Invalid,
    Unicode,
    Glyphs,
}

pub(crate) struct Buffer {
    pub flags: BufferFlags,
    pub cluster_level: BufferClusterLevel,
    pub invisible_glyph: Option<u32>,
    pub not_found_glyph: Option<u32>,

    pub direction: Direction,
    pub script: Option<Script>,
    pub language: Option<Language>,

    pub content_type: ContentType,
    pub successful: bool,
    pub shaping_failed: bool,
    pub have_output: bool,
    pub have_positions: bool,

    pub idx: usize,
    pub len: usize,
    pub info: Vec<GlyphInfo>,
    pub pos: Vec<GlyphPosition>,

    out_info: Vec<GlyphInfo>,
    pub out_len: usize,

    pub serial: u8,
    pub scratch_flags: BufferScratchFlags,
    pub max_len: usize,
    pub max_ops: i32,

    context: [[char; CONTEXT_LENGTH]; 2],
    context_len: [usize; 2],

    pub unicode: &'static dyn crate::unicode::UnicodeFuncs,
}

impl Buffer {
    pub fn new() -> Self {
        Buffer {
            flags: BufferFlags::empty(),
            cluster_level: BufferClusterLevel::default(),
            invisible_glyph: None,
            not_found_glyph: None,
            direction: Direction::Invalid,
            script: None,
            language: None,
            content_type: ContentType::Invalid,
            successful: true,
            shaping_failed: false,
            have_output: false,
            have_positions: false,
            idx: 0,
            len: 0,
            info: Vec::new(),
            pos: Vec::new(),
            out_info: Vec::new(),
            out_len: 0,
            serial: 0,
            scratch_flags: BufferScratchFlags::empty(),
            // Unbounded while the caller fills the buffer; enter() arms
            // the real budgets.
            max_len: usize::MAX,
            max_ops: MAX_OPS_MIN,
            context: [['\0'; CONTEXT_LENGTH]; 2],
            context_len: [0; 2],
            unicode: &crate::unicode::BUILTIN_UNICODE_FUNCS,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn info(&self) -> &[GlyphInfo] {
        &self.info[..self.len]
    }

    pub fn info_mut(&mut self) -> &mut [GlyphInfo] {
        &mut self.info[..self.len]
    }

    pub fn pos(&self) -> &[GlyphPosition] {
        &self.pos[..self.len]
    }

    pub fn pos_mut(&mut self) -> &mut [GlyphPosition] {
        &mut self.pos[..self.len]
    }

    pub fn cur(&self, delta: usize) -> &GlyphInfo {
        &self.info[self.idx + delta]
    }

    pub fn cur_mut(&mut self, delta: usize) -> &mut GlyphInfo {
        &mut self.info[self.idx + delta]
    }

    pub fn prev(&self) -> &GlyphInfo {
        &self.out_info[self.out_len.saturating_sub(1)]
    }

    pub fn prev_mut(&mut self) -> &mut GlyphInfo {
        let i = self.out_len.saturating_sub(1);
        &mut self.out_info[i]
    }

    pub fn out_info(&self) -> &[GlyphInfo] {
        &self.out_info[..self.out_len]
    }

    pub fn out_info_mut(&mut self) -> &mut [GlyphInfo] {
        &mut self.out_info[..self.out_len]
    }

    pub fn backtrack_len(&self) -> usize {
        if self.have_output {
            self.out_len
        } else {
            self.idx
        }
    }

    /// The item at `index` on the backtrack side: the output buffer while
    /// one is active, the input otherwise.
    pub fn prev_item(&self, index: usize) -> &GlyphInfo {
        if self.have_output {
            &self.out_info[index]
        } else {
            &self.info[index]
        }
    }

    pub fn scratch_flags(&self) -> BufferScratchFlags {
        self.scratch_flags
    }

    pub fn set_scratch_flags(&mut self, flags: BufferScratchFlags) {
        self.scratch_flags = flags;
    }

    pub fn context(&self, side: usize, i: usize) -> char {
        self.context[side][i]
    }

    pub fn context_len(&self, side: usize) -> usize {
        self.context_len[side]
    }

    pub fn set_pre_context(&mut self, text: &str) {
        self.context_len[0] = 0;
        for c in text.chars().rev().take(CONTEXT_LENGTH) {
            let i = self.context_len[0];
            self.context[0][i] = c;
            self.context_len[0] += 1;
        }
    }

    pub fn set_post_context(&mut self, text: &str) {
        self.context_len[1] = 0;
        for c in text.chars().take(CONTEXT_LENGTH) {
            let i = self.context_len[1];
            self.context[1][i] = c;
            self.context_len[1] += 1;
        }
    }

    pub fn clear(&mut self) {
        self.direction = Direction::Invalid;
        self.script = None;
        self.language = None;
        self.content_type = ContentType::Invalid;
        self.successful = true;
        self.shaping_failed = false;
        self.have_output = false;
        self.have_positions = false;
        self.idx = 0;
        self.len = 0;
        self.out_len = 0;
        self.serial = 0;
        self.scratch_flags = BufferScratchFlags::empty();
        self.context = [['\0'; CONTEXT_LENGTH]; 2];
        self.context_len = [0; 2];
    }

    pub fn ensure(&mut self, size: usize) -> bool {
        if size > self.max_len {
            self.successful = false;
            return false;
        }
        if self.info.len() < size {
            self.info.resize(size, GlyphInfo::default());
        }
        if self.pos.len() < size {
            self.pos.resize(size, GlyphPosition::default());
        }
        true
    }

    pub fn set_len(&mut self, len: usize) {
        self.ensure(len);
        self.len = len;
    }

    pub fn add(&mut self, codepoint: u32, cluster: u32) {
        if !self.ensure(self.len + 1) {
            return;
        }
        self.info[self.len] = GlyphInfo {
            codepoint,
            mask: 0,
            cluster,
            var1: 0,
            var2: 0,
        };
        self.len += 1;
    }

    pub fn push_str(&mut self, text: &str) {
        for (offset, c) in text.char_indices() {
            self.add(c as u32, offset as u32);
        }
        self.content_type = ContentType::Unicode;
    }

    pub fn add_utf8(&mut self, bytes: &[u8]) {
        let mut offset = 0;
        while offset < bytes.len() {
            match std::str::from_utf8(&bytes[offset..]) {
                Ok(rest) => {
                    for (o, c) in rest.char_indices() {
                        self.add(c as u32, (offset + o) as u32);
                    }
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    if let Ok(chunk) = std::str::from_utf8(&bytes[offset..offset + valid]) {
                        for (o, c) in chunk.char_indices() {
                            self.add(c as u32, (offset + o) as u32);
                        }
                    }
                    self.add(REPLACEMENT as u32, (offset + valid) as u32);
                    offset += valid + e.error_len().unwrap_or(bytes.len() - offset - valid).max(1);
                }
            }
        }
        self.content_type = ContentType::Unicode;
    }

    pub fn add_utf16(&mut self, units: &[u16]) {
        let mut i = 0;
        while i < units.len() {
            let cluster = i as u32;
            let u = units[i];
            if (0xD800..0xDC00).contains(&u) {
                if let Some(&lo) = units.get(i + 1) {
                    if (0xDC00..0xE000).contains(&lo) {
                        let c = 0x10000 + ((u32::from(u) - 0xD800) << 10) + (u32::from(lo) - 0xDC00);
                        self.add(c, cluster);
                        i += 2;
                        continue;
                    }
                }
                self.add(REPLACEMENT as u32, cluster);
            } else if (0xDC00..0xE000).contains(&u) {
                self.add(REPLACEMENT as u32, cluster);
            } else {
                self.add(u32::from(u), cluster);
            }
            i += 1;
        }
        self.content_type = ContentType::Unicode;
    }

    pub fn add_utf32(&mut self, chars: &[u32]) {
        for (i, &u) in chars.iter().enumerate() {
            let c = char::from_u32(u).map_or(REPLACEMENT as u32, |c| c as u32);
            self.add(c, i as u32);
        }
        self.content_type = ContentType::Unicode;
    }

    pub fn append(&mut self, other: &Buffer, start: usize, end: usize) {
        let end = end.min(other.len);
        if start >= end {
            return;
        }
        let count = end - start;
        if !self.ensure(self.len + count) {
            return;
        }
        for i in 0..count {
            self.info[self.len + i] = other.info[start + i];
        }
        if self.have_positions && other.have_positions {
            for i in 0..count {
                self.pos[self.len + i] = other.pos[start + i];
            }
        }
        self.len += count;
    }

    pub fn guess_segment_properties(&mut self) {
        if self.script.is_none() {
            for i in 0..self.len {
                let s = self.info[i].as_char().script();
                if s != script::COMMON && s != script::INHERITED && s != script::UNKNOWN {
                    self.script = Some(s);
                    break;
                }
            }
        }

        if self.direction == Direction::Invalid {
            self.direction = match self.script {
                Some(s) => Direction::from_script(s),
                None => Direction::LeftToRight,
            };
        }

        if self.language.is_none() {
            self.language = Language::process_default();
        }
    }

    // Output-side machinery, used during substitution passes.

    pub fn clear_output(&mut self) {
        self.have_output = true;
        self.have_positions = false;
        self.idx = 0;
        self.out_len = 0;
        self.out_info.clear();
    }

    pub fn clear_positions(&mut self) {
        self.have_output = false;
        self.have_positions = true;
        for p in self.pos.iter_mut().take(self.len) {
            *p = GlyphPosition::default();
        }
    }

    fn push_out(&mut self, info: GlyphInfo) -> bool {
        if self.out_len >= self.max_len {
            self.successful = false;
            return false;
        }
        if self.out_len < self.out_info.len() {
            self.out_info[self.out_len] = info;
        } else {
            self.out_info.push(info);
        }
        self.out_len += 1;
        true
    }

    /// Copies the current item to the output unchanged.
    pub fn next_glyph(&mut self) {
        if self.have_output {
            let info = self.info[self.idx];
            if !self.push_out(info) {
                return;
            }
        }
        self.idx += 1;
    }

    /// Advances past the current item without copying it to the output.
    pub fn skip_glyph(&mut self) {
        self.idx += 1;
    }

    /// Copies the current item to the output with a new glyph id.
    pub fn replace_glyph(&mut self, glyph: u32) {
        let mut info = self.info[self.idx];
        info.codepoint = glyph;
        if self.push_out(info) {
            self.idx += 1;
        }
    }

    /// Outputs a glyph without consuming the current item.
    pub fn output_glyph(&mut self, glyph: u32) {
        let mut info = if self.idx < self.len {
            self.info[self.idx]
        } else if self.out_len > 0 {
            self.out_info[self.out_len - 1]
        } else {
            GlyphInfo::default()
        };
        info.codepoint = glyph;
        self.push_out(info);
    }

    pub fn output_info(&mut self, info: GlyphInfo) {
        self.push_out(info);
    }

    /// Replaces `num_in` items with the given glyph sequence, merging
    /// clusters.
    pub fn replace_glyphs(&mut self, num_in: usize, glyphs: &[u32]) {
        if glyphs.len() != 1 || num_in != 1 {
            self.merge_clusters(self.idx, self.idx + num_in);
        }

        let info = self.info[self.idx];
        for &g in glyphs {
            let mut i = info;
            i.codepoint = g;
            if !self.push_out(i) {
                return;
            }
        }
        self.idx += num_in;
    }

    /// Drops the current item, keeping its cluster alive in a neighbor.
    pub fn delete_glyph(&mut self) {
        let cluster = self.info[self.idx].cluster;
        let mask = self.info[self.idx].mask;

        if self.idx + 1 < self.len && cluster == self.info[self.idx + 1].cluster {
            // The cluster survives in the next glyph.
            self.skip_glyph();
            return;
        }

        if self.cluster_level != BufferClusterLevel::Characters && self.out_len > 0 {
            // Merge the cluster backward into the previous output glyphs.
            let old_cluster = self.out_info[self.out_len - 1].cluster;
            if cluster < old_cluster {
                let mut i = self.out_len;
                while i > 0 && self.out_info[i - 1].cluster == old_cluster {
                    Self::set_cluster(&mut self.out_info[i - 1], cluster, mask);
                    i -= 1;
                }
            }
        }

        self.skip_glyph();
    }

    /// Moves the cursor, copying or rewinding output as needed.
    pub fn move_to(&mut self, pos: usize) -> bool {
        if !self.have_output {
            self.idx = pos;
            return true;
        }
        if !self.successful {
            return false;
        }

        if pos >= self.idx {
            let count = pos - self.idx;
            for _ in 0..count {
                let info = self.info[self.idx];
                if !self.push_out(info) {
                    return false;
                }
                self.idx += 1;
            }
        } else {
            // Tricky: rewind as many items as we are moving back. The
            // rewound items must not have been modified since output.
            let count = self.idx - pos;
            if count > self.out_len {
                self.successful = false;
                return false;
            }
            self.out_len -= count;
            self.idx = pos;
        }
        true
    }

    /// Swaps the output side back into place after a rewrite pass.
    pub fn sync(&mut self) {
        debug_assert!(self.have_output);
        if self.successful {
            debug_assert!(self.idx <= self.len);
            // Carry over any unconsumed tail.
            while self.idx < self.len {
                let info = self.info[self.idx];
                if !self.push_out(info) {
                    break;
                }
                self.idx += 1;
            }
            std::mem::swap(&mut self.info, &mut self.out_info);
            self.len = self.out_len;
            self.ensure(self.len);
        }
        self.have_output = false;
        self.out_len = 0;
        self.idx = 0;
    }

    // Clusters.

    fn set_cluster(info: &mut GlyphInfo, cluster: u32, mask: Mask) {
        if info.cluster != cluster {
            info.mask = (info.mask & !glyph_flag::DEFINED) | (mask & glyph_flag::DEFINED);
            info.cluster = cluster;
        }
    }

    pub fn merge_clusters(&mut self, start: usize, end: usize) {
        if end - start < 2 {
            return;
        }
        if self.cluster_level == BufferClusterLevel::Characters {
            self.unsafe_to_break(start, end);
            return;
        }
        self.merge_clusters_impl(start, end);
    }

    fn merge_clusters_impl(&mut self, mut start: usize, mut end: usize) {
        let mut cluster = self.info[start].cluster;
        let mut mask = 0;
        for i in start..end {
            cluster = cluster.min(self.info[i].cluster);
            mask |= self.info[i].mask;
        }

        // Extend start and end to cover whole clusters.
        while start > self.idx && self.info[start - 1].cluster == self.info[start].cluster {
            start -= 1;
        }
        while end < self.len && self.info[end - 1].cluster == self.info[end].cluster {
            end += 1;
        }

        // If the start of the merge touches the cursor, the out buffer may
        // hold earlier parts of the same cluster.
        if start == self.idx && self.have_output {
            let target = self.info[start].cluster;
            let mut i = self.out_len;
            while i > 0 && self.out_info[i - 1].cluster == target {
                Self::set_cluster(&mut self.out_info[i - 1], cluster, mask);
                i -= 1;
            }
        }

        for i in start..end {
            Self::set_cluster(&mut self.info[i], cluster, mask);
        }
    }

    pub fn merge_out_clusters(&mut self, mut start: usize, mut end: usize) {
        if self.cluster_level == BufferClusterLevel::Characters {
            return;
        }
        if end - start < 2 {
            return;
        }

        let mut cluster = self.out_info[start].cluster;
        let mut mask = 0;
        for i in start..end {
            cluster = cluster.min(self.out_info[i].cluster);
            mask |= self.out_info[i].mask;
        }

        while start > 0 && self.out_info[start - 1].cluster == self.out_info[start].cluster {
            start -= 1;
        }
        while end < self.out_len && self.out_info[end - 1].cluster == self.out_info[end].cluster {
            end += 1;
        }

        for i in start..end {
            Self::set_cluster(&mut self.out_info[i], cluster, mask);
        }

        // Continue to the in-buffer side of the same cluster.
        if end == self.out_len {
            let target = self.out_info[end - 1].cluster;
            let mut i = self.idx;
            while i < self.len && self.info[i].cluster == target {
                Self::set_cluster(&mut self.info[i], cluster, mask);
                i += 1;
            }
        }
    }

    fn set_glyph_flags_range(&mut self, mask: Mask, mut start: usize, mut end: usize) {
        // Extend to whole clusters.
        while start > 0 && self.info[start - 1].cluster == self.info[start].cluster {
            start -= 1;
        }
        while end < self.len && end > 0 && self.info[end - 1].cluster == self.info[end].cluster {
            end += 1;
        }
        for i in start..end.min(self.len) {
            self.info[i].mask |= mask;
        }
    }

    pub fn unsafe_to_break(&mut self, start: usize, end: usize) {
        if end.saturating_sub(start) < 2 {
            return;
        }
        self.set_glyph_flags_range(
            glyph_flag::UNSAFE_TO_BREAK | glyph_flag::UNSAFE_TO_CONCAT,
            start,
            end,
        );
    }

    pub fn unsafe_to_concat(&mut self, start: usize, end: usize) {
        self.set_glyph_flags_range(glyph_flag::UNSAFE_TO_CONCAT, start, end);
    }

    /// Flags a span reaching from the output side into the input side, as
    /// recorded by a failed match: `start` indexes the output buffer, `end`
    /// the input buffer.
    pub fn unsafe_to_concat_from_outbuffer(&mut self, start: usize, end: usize) {
        if !self.have_output {
            self.unsafe_to_concat(start, end);
            return;
        }
        for i in start..self.out_len {
            self.out_info[i].mask |= glyph_flag::UNSAFE_TO_CONCAT;
        }
        for i in self.idx..end.min(self.len) {
            self.info[i].mask |= glyph_flag::UNSAFE_TO_CONCAT;
        }
    }

    // Masks.

    pub fn reset_masks(&mut self, mask: Mask) {
        for info in self.info.iter_mut().take(self.len) {
            info.mask = mask;
        }
    }

    pub fn set_masks(&mut self, value: Mask, mask: Mask, cluster_start: u32, cluster_end: u32) {
        let not_mask = !mask;
        let value = value & mask;

        if mask == 0 {
            return;
        }

        if cluster_start == 0 && cluster_end == u32::MAX {
            for info in self.info.iter_mut().take(self.len) {
                info.mask = (info.mask & not_mask) | value;
            }
            return;
        }

        for info in self.info.iter_mut().take(self.len) {
            if cluster_start <= info.cluster && info.cluster < cluster_end {
                info.mask = (info.mask & not_mask) | value;
            }
        }
    }

    // Reversal.

    pub fn reverse(&mut self) {
        if self.len == 0 {
            return;
        }
        self.reverse_range(0, self.len);
    }

    pub fn reverse_range(&mut self, start: usize, end: usize) {
        self.info[start..end].reverse();
        if self.have_positions {
            self.pos[start..end].reverse();
        }
    }

    pub fn reverse_clusters(&mut self) {
        if self.len == 0 {
            return;
        }
        let mut start = 0;
        for i in 1..self.len {
            if self.info[i - 1].cluster != self.info[i].cluster {
                self.reverse_range(start, i);
                start = i;
            }
        }
        self.reverse_range(start, self.len);
        self.reverse();
    }

    // Budgets.

    pub fn enter(&mut self) {
        self.serial = 0;
        self.shaping_failed = false;
        self.scratch_flags = BufferScratchFlags::empty();
        self.max_len = (self.len * MAX_LEN_FACTOR).max(MAX_LEN_MIN);
        self.max_ops = (self.len as i32)
            .saturating_mul(MAX_OPS_FACTOR)
            .max(MAX_OPS_MIN);
    }

    pub fn leave(&mut self) {
        self.max_len = usize::MAX;
        self.max_ops = MAX_OPS_MIN;
        self.serial = 0;
    }

    /// Charges one lookup-application op; `false` once the budget is gone.
    pub fn decrement_max_ops(&mut self) -> bool {
        self.max_ops -= 1;
        if self.max_ops <= 0 {
            self.shaping_failed = true;
            return false;
        }
        true
    }

    pub fn next_serial(&mut self) -> u8 {
        self.serial = self.serial.wrapping_add(1);
        if self.serial == 0 {
            self.serial = 1;
        }
        self.serial
    }

    pub fn allocate_lig_id(&mut self) -> u8 {
        let lig_id = self.next_serial() & 0x07;
        if lig_id == 0 {
            // Zero means no ligature; skip it.
            self.allocate_lig_id()
        } else {
            lig_id
        }
    }

    /// Reorders a sorted-by-cluster buffer so marks stay after their bases
    /// within each cluster, then renumbers positions canonically.
    pub fn normalize_glyphs(&mut self) {
        assert!(self.have_positions);

        let backward = self.direction.is_backward();

        let mut start = 0;
        for i in 1..=self.len {
            if i == self.len || self.info[i].cluster != self.info[start].cluster {
                self.normalize_glyphs_cluster(start, i, backward);
                start = i;
            }
        }
    }

    fn normalize_glyphs_cluster(&mut self, start: usize, end: usize, backward: bool) {
        // Make offsets absolute within the cluster.
        let mut total_x = 0i32;
        let mut total_y = 0i32;
        for i in start..end {
            self.pos[i].x_offset += total_x;
            self.pos[i].y_offset += total_y;
            total_x += self.pos[i].x_advance;
            total_y += self.pos[i].y_advance;
        }

        // Stable-sort glyphs by their absolute offset.
        let mut items: Vec<(GlyphInfo, GlyphPosition)> = (start..end)
            .map(|i| (self.info[i], self.pos[i]))
            .collect();
        items.sort_by_key(|(_, p)| (p.x_offset, p.y_offset));
        for (k, (info, pos)) in items.into_iter().enumerate() {
            self.info[start + k] = info;
            self.pos[start + k] = pos;
        }

        // The cluster advance rides on one edge glyph.
        for i in start..end {
            self.pos[i].x_advance = 0;
            self.pos[i].y_advance = 0;
        }
        if backward {
            self.pos[start].x_advance = total_x;
            self.pos[start].y_advance = total_y;
        } else if end > start {
            self.pos[end - 1].x_advance = total_x;
            self.pos[end - 1].y_advance = total_y;
        }
    }
}

/// A buffer of Unicode code points ready for shaping.
pub struct UnicodeBuffer(pub(crate) Buffer);

impl UnicodeBuffer {
    pub fn new() -> Self {
        UnicodeBuffer(Buffer::new())
    }

    pub fn len(&self) -> usize {
        self.0.len
    }

    pub fn is_empty(&self) -> bool {
        self.0.len == 0
    }

    /// Appends a string, setting each character's cluster to its byte offset.
    pub fn push_str(&mut self, text: &str) {
        self.0.push_str(text);
    }

    /// Appends UTF-8 bytes; invalid sequences become U+FFFD.
    pub fn add_utf8(&mut self, bytes: &[u8]) {
        self.0.add_utf8(bytes);
    }

    /// Appends UTF-16 units; lone surrogates become U+FFFD.
    pub fn add_utf16(&mut self, units: &[u16]) {
        self.0.add_utf16(units);
    }

    /// Appends scalar values; invalid ones become U+FFFD.
    pub fn add_utf32(&mut self, chars: &[u32]) {
        self.0.add_utf32(chars);
    }

    pub fn add(&mut self, c: char, cluster: u32) {
        self.0.add(c as u32, cluster);
        self.0.content_type = ContentType::Unicode;
    }

    pub fn set_pre_context(&mut self, text: &str) {
        self.0.set_pre_context(text)
    }

    pub fn set_post_context(&mut self, text: &str) {
        self.0.set_post_context(text)
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.0.direction = direction;
    }

    pub fn direction(&self) -> Direction {
        self.0.direction
    }

    pub fn set_script(&mut self, script: Script) {
        self.0.script = Some(script);
    }

    pub fn script(&self) -> Script {
        self.0.script.unwrap_or(script::UNKNOWN)
    }

    pub fn set_language(&mut self, language: Language) {
        self.0.language = Some(language);
    }

    pub fn language(&self) -> Option<&Language> {
        self.0.language.as_ref()
    }

    pub fn set_flags(&mut self, flags: BufferFlags) {
        self.0.flags = flags;
    }

    pub fn flags(&self) -> BufferFlags {
        self.0.flags
    }

    pub fn set_cluster_level(&mut self, level: BufferClusterLevel) {
        self.0.cluster_level = level;
    }

    pub fn cluster_level(&self) -> BufferClusterLevel {
        self.0.cluster_level
    }

    /// The glyph substituted for default-ignorable characters.
    pub fn set_invisible_glyph(&mut self, glyph: Option<u32>) {
        self.0.invisible_glyph = glyph;
    }

    /// The glyph used for unmapped characters instead of `.notdef`.
    pub fn set_not_found_glyph(&mut self, glyph: Option<u32>) {
        self.0.not_found_glyph = glyph;
    }

    /// Fills in unset direction, script and language from the content.
    pub fn guess_segment_properties(&mut self) {
        self.0.guess_segment_properties()
    }

    pub fn set_unicode_funcs(&mut self, funcs: &'static dyn crate::unicode::UnicodeFuncs) {
        self.0.unicode = funcs;
    }

    /// Appends `[start, end)` of another buffer's content.
    pub fn append(&mut self, other: &UnicodeBuffer, start: usize, end: usize) {
        self.0.append(&other.0, start, end);
        self.0.content_type = ContentType::Unicode;
    }

    pub fn reverse(&mut self) {
        self.0.reverse()
    }

    pub fn reverse_range(&mut self, start: usize, end: usize) {
        if start < end && end <= self.0.len {
            self.0.reverse_range(start, end)
        }
    }

    /// Reverses the buffer while keeping the items of each cluster in
    /// order.
    pub fn reverse_clusters(&mut self) {
        self.0.reverse_clusters()
    }

    pub fn clear(&mut self) {
        self.0.clear()
    }
}

impl Default for UnicodeBuffer {
    fn default() -> Self {
        UnicodeBuffer::new()
    }
}

impl std::fmt::Debug for UnicodeBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnicodeBuffer")
            .field("len", &self.0.len)
            .field("direction", &self.0.direction)
            .field("script", &self.0.script)
            .finish()
    }
}

/// The result of shaping: parallel glyph infos and positions.
pub struct GlyphBuffer(pub(crate) Buffer);

impl GlyphBuffer {
    pub fn len(&self) -> usize {
        self.0.len
    }

    pub fn is_empty(&self) -> bool {
        self.0.len == 0
    }

    pub fn glyph_infos(&self) -> &[GlyphInfo] {
        &self.0.info[..self.0.len]
    }

    pub fn glyph_positions(&self) -> &[GlyphPosition] {
        &self.0.pos[..self.0.len]
    }

    /// Whether shaping ran out of its op budget and output may be partial.
    pub fn shaping_failed(&self) -> bool {
        self.0.shaping_failed
    }

    /// Converts the buffer back for reuse, discarding the glyph content.
    pub fn clear(mut self) -> UnicodeBuffer {
        self.0.clear();
        UnicodeBuffer(self.0)
    }

    pub fn normalize_glyphs(&mut self) {
        self.0.normalize_glyphs()
    }

    /// Serializes in the `[gid=cluster@x_offset,y_offset+x_advance|...]`
    /// text format.
    pub fn serialize(&self, face: &crate::Face, flags: SerializeFlags) -> String {
        use std::fmt::Write;

        let mut s = String::with_capacity(64);
        s.push('[');
        for (i, (info, pos)) in self
            .glyph_infos()
            .iter()
            .zip(self.glyph_positions())
            .enumerate()
        {
            if i != 0 {
                s.push('|');
            }

            if !flags.contains(SerializeFlags::NO_GLYPH_NAMES) {
                match face.glyph_name(info.codepoint as u16) {
                    Some(name) => s.push_str(name),
                    None => {
                        let _ = write!(s, "gid{}", info.codepoint);
                    }
                }
            } else {
                let _ = write!(s, "{}", info.codepoint);
            }

            if !flags.contains(SerializeFlags::NO_CLUSTERS) {
                let _ = write!(s, "={}", info.cluster);
            }

            if !flags.contains(SerializeFlags::NO_POSITIONS) {
                if pos.x_offset != 0 || pos.y_offset != 0 {
                    let _ = write!(s, "@{},{}", pos.x_offset, pos.y_offset);
                }
                let _ = write!(s, "+{}", pos.x_advance);
                if pos.y_advance != 0 {
                    let _ = write!(s, ",{}", pos.y_advance);
                }
            }

            if flags.contains(SerializeFlags::GLYPH_FLAGS)
                && info.mask & glyph_flag::DEFINED != 0
            {
                let _ = write!(s, "#{:X}", info.mask & glyph_flag::DEFINED);
            }
        }
        s.push(']');
        s
    }
}

impl std::fmt::Debug for GlyphBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlyphBuffer")
            .field("len", &self.0.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_with(text: &str) -> Buffer {
        let mut b = Buffer::new();
        b.push_str(text);
        b
    }

    #[test]
    fn utf8_clusters_are_byte_offsets() {
        let b = buffer_with("a\u{00E9}b");
        let clusters: Vec<u32> = b.info().iter().map(|i| i.cluster).collect();
        assert_eq!(clusters, [0, 1, 3]);
    }

    #[test]
    fn invalid_utf8_becomes_replacement() {
        let mut b = Buffer::new();
        b.add_utf8(&[b'a', 0xFF, b'b']);
        let cps: Vec<u32> = b.info().iter().map(|i| i.codepoint).collect();
        assert_eq!(cps, ['a' as u32, 0xFFFD, 'b' as u32]);
        assert_eq!(b.info()[1].cluster, 1);
    }

    #[test]
    fn lone_surrogate_becomes_replacement() {
        let mut b = Buffer::new();
        b.add_utf16(&[0x0041, 0xD800, 0x0042]);
        let cps: Vec<u32> = b.info().iter().map(|i| i.codepoint).collect();
        assert_eq!(cps, [0x41, 0xFFFD, 0x42]);

        let mut b = Buffer::new();
        b.add_utf16(&[0xD83D, 0xDE00]);
        assert_eq!(b.info()[0].codepoint, 0x1F600);
    }

    #[test]
    fn reverse_involution() {
        let mut b = buffer_with("abc");
        let before: Vec<GlyphInfo> = b.info().to_vec();
        b.reverse();
        b.reverse();
        assert_eq!(b.info(), before.as_slice());
    }

    #[test]
    fn reverse_clusters_keeps_intra_cluster_order() {
        let mut b = Buffer::new();
        b.add('a' as u32, 0);
        b.add('b' as u32, 0);
        b.add('c' as u32, 1);
        b.reverse_clusters();
        let v: Vec<(u32, u32)> = b.info().iter().map(|i| (i.codepoint, i.cluster)).collect();
        assert_eq!(v, [('c' as u32, 1), ('a' as u32, 0), ('b' as u32, 0)]);
    }

    #[test]
    fn merge_clusters_takes_min() {
        let mut b = buffer_with("abcd");
        b.merge_clusters(1, 3);
        let clusters: Vec<u32> = b.info().iter().map(|i| i.cluster).collect();
        assert_eq!(clusters, [0, 1, 1, 3]);
    }

    #[test]
    fn characters_level_never_merges() {
        let mut b = buffer_with("abcd");
        b.cluster_level = BufferClusterLevel::Characters;
        b.merge_clusters(1, 3);
        let clusters: Vec<u32> = b.info().iter().map(|i| i.cluster).collect();
        assert_eq!(clusters, [0, 1, 2, 3]);
    }

    #[test]
    fn unsafe_to_break_extends_to_cluster() {
        let mut b = Buffer::new();
        b.add('a' as u32, 0);
        b.add('b' as u32, 0);
        b.add('c' as u32, 2);
        b.unsafe_to_break(1, 3);
        assert!(b.info()[0].unsafe_to_break());
        assert!(b.info()[1].unsafe_to_break());
        assert!(b.info()[2].unsafe_to_break());
    }

    #[test]
    fn output_rewrite_roundtrip() {
        let mut b = buffer_with("abc");
        b.clear_output();
        b.next_glyph();
        b.replace_glyph(42);
        b.next_glyph();
        b.sync();
        let cps: Vec<u32> = b.info().iter().map(|i| i.codepoint).collect();
        assert_eq!(cps, ['a' as u32, 42, 'c' as u32]);
    }

    #[test]
    fn replace_many_merges_clusters() {
        let mut b = buffer_with("abc");
        b.clear_output();
        b.replace_glyphs(3, &[9]);
        b.sync();
        assert_eq!(b.len(), 1);
        assert_eq!(b.info()[0].codepoint, 9);
        assert_eq!(b.info()[0].cluster, 0);
    }

    #[test]
    fn move_to_rewinds() {
        let mut b = buffer_with("abcd");
        b.clear_output();
        b.move_to(3).then_some(()).unwrap();
        assert_eq!(b.out_len, 3);
        b.move_to(1);
        assert_eq!(b.out_len, 1);
        assert_eq!(b.idx, 1);
        b.sync();
        assert_eq!(b.len(), 4);
    }

    #[test]
    fn ops_budget() {
        let mut b = buffer_with("ab");
        b.enter();
        assert_eq!(b.max_ops, MAX_OPS_MIN);
        b.max_ops = 1;
        assert!(!b.decrement_max_ops());
        assert!(b.shaping_failed);
    }

    #[test]
    fn guess_properties() {
        let mut b = buffer_with("\u{05D0}");
        b.guess_segment_properties();
        assert_eq!(b.script, Some(script::HEBREW));
        assert_eq!(b.direction, Direction::RightToLeft);
    }

    #[test]
    fn lig_props_roundtrip() {
        let mut info = GlyphInfo::default();
        info.set_lig_props_for_ligature(3, 4);
        assert_eq!(info.lig_id(), 3);
        assert_eq!(info.lig_comp(), 0);

        info.set_lig_props_for_mark(3, 2);
        assert_eq!(info.lig_id(), 3);
        assert_eq!(info.lig_comp(), 2);
    }

    #[test]
    fn syllable_and_category_scratch() {
        let mut info = GlyphInfo::default();
        info.set_syllable(7);
        info.set_complex_category(13);
        info.set_complex_aux(2);
        assert_eq!(info.syllable(), 7);
        assert_eq!(info.complex_category(), 13);
        assert_eq!(info.complex_aux(), 2);
    }
}
