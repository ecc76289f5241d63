//! Character, block and list formats.
//!
//! Formats are open property maps: `u16` property id to typed value. The
//! typed wrappers below expose accessors for the properties the editor
//! actually understands, but unknown properties survive decode → re-encode
//! untouched, so an older server can relay formats minted by a newer client.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A typed property value.
///
/// The wire tag for each variant is fixed (see `scrivo-protocol`); adding a
/// variant is a protocol version bump.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PropValue {
    Bool(bool),
    Uint(u32),
    Int(i64),
    Float(f64),
    Text(String),
}

impl PropValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u32> {
        match self {
            PropValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Ordered property map. BTreeMap so encoding order is deterministic.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatMap(BTreeMap<u16, PropValue>);

impl FormatMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: u16) -> Option<&PropValue> {
        self.0.get(&id)
    }

    pub fn set(&mut self, id: u16, value: PropValue) {
        self.0.insert(id, value);
    }

    pub fn unset(&mut self, id: u16) {
        self.0.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in property-id order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &PropValue)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }
}

// ── Character format ────────────────────────────────────────────────────────

/// Inline format of a single symbol.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharFormat {
    pub props: FormatMap,
}

impl CharFormat {
    pub const BOLD: u16 = 1;
    pub const ITALIC: u16 = 2;
    pub const UNDERLINE: u16 = 3;
    pub const FONT_FAMILY: u16 = 4;
    pub const FONT_SIZE: u16 = 5;
    /// Foreground color, packed 0xRRGGBBAA.
    pub const FOREGROUND: u16 = 6;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn bold(&self) -> bool {
        self.props.get(Self::BOLD).and_then(PropValue::as_bool).unwrap_or(false)
    }

    pub fn set_bold(&mut self, on: bool) {
        self.props.set(Self::BOLD, PropValue::Bool(on));
    }

    pub fn italic(&self) -> bool {
        self.props.get(Self::ITALIC).and_then(PropValue::as_bool).unwrap_or(false)
    }

    pub fn set_italic(&mut self, on: bool) {
        self.props.set(Self::ITALIC, PropValue::Bool(on));
    }

    pub fn underline(&self) -> bool {
        self.props.get(Self::UNDERLINE).and_then(PropValue::as_bool).unwrap_or(false)
    }

    pub fn set_underline(&mut self, on: bool) {
        self.props.set(Self::UNDERLINE, PropValue::Bool(on));
    }

    pub fn font_family(&self) -> Option<&str> {
        self.props.get(Self::FONT_FAMILY).and_then(PropValue::as_text)
    }

    pub fn set_font_family(&mut self, family: impl Into<String>) {
        self.props.set(Self::FONT_FAMILY, PropValue::Text(family.into()));
    }

    pub fn font_size(&self) -> Option<f64> {
        self.props.get(Self::FONT_SIZE).and_then(PropValue::as_float)
    }

    pub fn set_font_size(&mut self, points: f64) {
        self.props.set(Self::FONT_SIZE, PropValue::Float(points));
    }

    pub fn foreground(&self) -> Option<u32> {
        self.props.get(Self::FOREGROUND).and_then(PropValue::as_uint)
    }

    pub fn set_foreground(&mut self, rgba: u32) {
        self.props.set(Self::FOREGROUND, PropValue::Uint(rgba));
    }
}

// ── Block format ────────────────────────────────────────────────────────────

/// Paragraph alignment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[derive(strum::Display, strum::FromRepr)]
#[repr(u32)]
pub enum Alignment {
    #[default]
    Left = 0,
    Right = 1,
    Center = 2,
    Justify = 3,
}

/// Paragraph-level format of a block.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockFormat {
    pub props: FormatMap,
}

impl BlockFormat {
    pub const ALIGNMENT: u16 = 1;
    pub const LINE_HEIGHT: u16 = 2;
    /// Interpretation of LINE_HEIGHT (proportional, fixed, minimum...),
    /// opaque to the core.
    pub const LINE_HEIGHT_MODE: u16 = 3;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn alignment(&self) -> Alignment {
        self.props
            .get(Self::ALIGNMENT)
            .and_then(PropValue::as_uint)
            .and_then(Alignment::from_repr)
            .unwrap_or_default()
    }

    pub fn set_alignment(&mut self, alignment: Alignment) {
        self.props.set(Self::ALIGNMENT, PropValue::Uint(alignment as u32));
    }

    pub fn line_height(&self) -> Option<(f64, u32)> {
        let height = self.props.get(Self::LINE_HEIGHT).and_then(PropValue::as_float)?;
        let mode = self
            .props
            .get(Self::LINE_HEIGHT_MODE)
            .and_then(PropValue::as_uint)
            .unwrap_or(0);
        Some((height, mode))
    }

    pub fn set_line_height(&mut self, height: f64, mode: u32) {
        self.props.set(Self::LINE_HEIGHT, PropValue::Float(height));
        self.props.set(Self::LINE_HEIGHT_MODE, PropValue::Uint(mode));
    }
}

// ── List format ─────────────────────────────────────────────────────────────

/// List bullet / numbering style.
///
/// `Undefined` doubles as the remove-from-list marker in `toggle_list`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[derive(strum::Display, strum::FromRepr)]
#[repr(u32)]
pub enum ListStyle {
    #[default]
    Undefined = 0,
    Disc = 1,
    Circle = 2,
    Square = 3,
    Decimal = 4,
    LowerAlpha = 5,
    UpperAlpha = 6,
    LowerRoman = 7,
    UpperRoman = 8,
}

/// Format shared by all blocks of a list.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListFormat {
    pub props: FormatMap,
}

impl ListFormat {
    pub const STYLE: u16 = 1;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_style(style: ListStyle) -> Self {
        let mut fmt = Self::default();
        fmt.set_style(style);
        fmt
    }

    pub fn style(&self) -> ListStyle {
        self.props
            .get(Self::STYLE)
            .and_then(PropValue::as_uint)
            .and_then(ListStyle::from_repr)
            .unwrap_or_default()
    }

    pub fn set_style(&mut self, style: ListStyle) {
        self.props.set(Self::STYLE, PropValue::Uint(style as u32));
    }

    /// True when this format means "remove from list".
    pub fn is_undefined(&self) -> bool {
        self.style() == ListStyle::Undefined
    }
}

// ============================================================================
// Tests
// ============================================================================
