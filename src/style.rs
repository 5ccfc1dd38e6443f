//! Capture and restore text formatting independently of text content.
//!
//! Frame and paragraph styles are written back unconditionally: a value
//! that was absent when captured is removed again. Run styles only write
//! the fields that were captured, and fill in unmodeled run properties
//! where the target does not define them.

use tracing::{debug, warn};

use crate::error::{DeckError, Result};
use crate::pptx::text::{BODY_PROPERTIES_ORDER, PARAGRAPH_PROPERTIES_ORDER, RUN_PROPERTIES_ORDER};
use crate::pptx::xml::XmlElement;
use crate::pptx::{Paragraph, Run, TextFrame};

const AUTOFIT_ELEMENTS: &[&str] = &["noAutofit", "normAutofit", "spAutoFit"];
const FILL_ELEMENTS: &[&str] = &["noFill", "solidFill", "gradFill", "blipFill", "pattFill", "grpFill"];
const MODELED_RUN_ATTRIBUTES: &[&str] = &["sz", "b", "i", "u", "lang"];

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalAnchor {
    Top,
    Middle,
    Bottom,
    Justified,
    Distributed,
}

impl VerticalAnchor {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "t" => Some(Self::Top),
            "ctr" => Some(Self::Middle),
            "b" => Some(Self::Bottom),
            "just" => Some(Self::Justified),
            "dist" => Some(Self::Distributed),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Self::Top => "t",
            Self::Middle => "ctr",
            Self::Bottom => "b",
            Self::Justified => "just",
            Self::Distributed => "dist",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoSize {
    /// `a:noAutofit`
    None,
    /// `a:spAutoFit`: the shape grows to fit its text.
    ShapeToFitText,
    /// `a:normAutofit`: the text shrinks to fit the shape. Values are kept as written.
    TextToFitShape {
        font_scale: Option<String>,
        line_spacing_reduction: Option<String>,
    },
}

/// Insets in EMU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Margins {
    pub left: Option<i64>,
    pub right: Option<i64>,
    pub top: Option<i64>,
    pub bottom: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameStyle {
    pub margins: Margins,
    pub vertical_anchor: Option<VerticalAnchor>,
    pub word_wrap: Option<bool>,
    pub auto_size: Option<AutoSize>,
}

pub fn capture_frame(frame: &TextFrame) -> FrameStyle {
    let Some(body) = frame.body_properties() else {
        return FrameStyle::default();
    };

    let auto_size = body.elements().find_map(|child| match child.local_name() {
        "noAutofit" => Some(AutoSize::None),
        "spAutoFit" => Some(AutoSize::ShapeToFitText),
        "normAutofit" => Some(AutoSize::TextToFitShape {
            font_scale: child.attr("fontScale"),
            line_spacing_reduction: child.attr("lnSpcReduction"),
        }),
        _ => None,
    });

    FrameStyle {
        margins: Margins {
            left: parse_attr(body, "lIns"),
            right: parse_attr(body, "rIns"),
            top: parse_attr(body, "tIns"),
            bottom: parse_attr(body, "bIns"),
        },
        vertical_anchor: body.attr("anchor").and_then(|token| VerticalAnchor::from_token(&token)),
        word_wrap: match body.attr("wrap").as_deref() {
            Some("square") => Some(true),
            Some("none") => Some(false),
            _ => None,
        },
        auto_size,
    }
}

pub fn apply_frame(frame: &mut TextFrame, style: &FrameStyle) {
    if frame.body_properties().is_none() && *style == FrameStyle::default() {
        return;
    }
    let body = frame.body_properties_mut();

    set_number(body, "lIns", style.margins.left);
    set_number(body, "rIns", style.margins.right);
    set_number(body, "tIns", style.margins.top);
    set_number(body, "bIns", style.margins.bottom);
    body.set_or_remove_attr("anchor", style.vertical_anchor.map(|anchor| anchor.token()));
    body.set_or_remove_attr(
        "wrap",
        style.word_wrap.map(|wrap| if wrap { "square" } else { "none" }),
    );

    body.remove_children(AUTOFIT_ELEMENTS);
    if let Some(auto_size) = &style.auto_size {
        let element = match auto_size {
            AutoSize::None => XmlElement::new(body.qualify("noAutofit")),
            AutoSize::ShapeToFitText => XmlElement::new(body.qualify("spAutoFit")),
            AutoSize::TextToFitShape {
                font_scale,
                line_spacing_reduction,
            } => {
                let mut element = XmlElement::new(body.qualify("normAutofit"));
                element.set_or_remove_attr("fontScale", font_scale.as_deref());
                element.set_or_remove_attr("lnSpcReduction", line_spacing_reduction.as_deref());
                element
            }
        };
        body.insert_ordered(element, BODY_PROPERTIES_ORDER);
    }
}

// ---------------------------------------------------------------------------
// Paragraph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
    JustifyLow,
    Distributed,
    ThaiDistributed,
}

impl Alignment {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "l" => Some(Self::Left),
            "ctr" => Some(Self::Center),
            "r" => Some(Self::Right),
            "just" => Some(Self::Justify),
            "justLow" => Some(Self::JustifyLow),
            "dist" => Some(Self::Distributed),
            "thaiDist" => Some(Self::ThaiDistributed),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Self::Left => "l",
            Self::Center => "ctr",
            Self::Right => "r",
            Self::Justify => "just",
            Self::JustifyLow => "justLow",
            Self::Distributed => "dist",
            Self::ThaiDistributed => "thaiDist",
        }
    }
}

/// Line or paragraph spacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spacing {
    /// Thousandths of a percent of the line height (`100000` is single spacing).
    Percent(i32),
    /// Hundredths of a point.
    Points(i32),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParagraphStyle {
    pub alignment: Option<Alignment>,
    pub level: u8,
    pub line_spacing: Option<Spacing>,
    pub space_before: Option<Spacing>,
    pub space_after: Option<Spacing>,
}

pub fn capture_paragraph(paragraph: &Paragraph) -> ParagraphStyle {
    let Some(properties) = paragraph.properties() else {
        return ParagraphStyle::default();
    };

    ParagraphStyle {
        alignment: properties.attr("algn").and_then(|token| Alignment::from_token(&token)),
        level: parse_attr(properties, "lvl").unwrap_or(0),
        line_spacing: properties.child("lnSpc").and_then(read_spacing),
        space_before: properties.child("spcBef").and_then(read_spacing),
        space_after: properties.child("spcAft").and_then(read_spacing),
    }
}

pub fn apply_paragraph(paragraph: &mut Paragraph, style: &ParagraphStyle) {
    if paragraph.properties().is_none() && *style == ParagraphStyle::default() {
        return;
    }
    let properties = paragraph.properties_mut();

    properties.set_or_remove_attr("algn", style.alignment.map(|alignment| alignment.token()));
    if style.level != 0 || properties.raw_attr("lvl").is_some() {
        properties.set_attr("lvl", &style.level.to_string());
    }

    for (name, spacing) in [
        ("lnSpc", style.line_spacing),
        ("spcBef", style.space_before),
        ("spcAft", style.space_after),
    ] {
        properties.remove_children(&[name]);
        if let Some(spacing) = spacing {
            let element = spacing_element(properties, name, spacing);
            properties.insert_ordered(element, PARAGRAPH_PROPERTIES_ORDER);
        }
    }
}

fn read_spacing(element: &XmlElement) -> Option<Spacing> {
    if let Some(percent) = element.child("spcPct") {
        let value = percent.attr("val")?;
        // The string form ("90%") is allowed alongside thousandths of a percent.
        return match value.strip_suffix('%') {
            Some(number) => number
                .trim()
                .parse::<f64>()
                .ok()
                .map(|p| Spacing::Percent((p * 1000.0).round() as i32)),
            None => value.parse().ok().map(Spacing::Percent),
        };
    }
    element
        .child("spcPts")
        .and_then(|points| points.attr("val"))
        .and_then(|value| value.parse().ok())
        .map(Spacing::Points)
}

fn spacing_element(parent: &XmlElement, name: &str, spacing: Spacing) -> XmlElement {
    let (kind, value) = match spacing {
        Spacing::Percent(value) => ("spcPct", value),
        Spacing::Points(value) => ("spcPts", value),
    };
    XmlElement::new(parent.qualify(name))
        .with_child(XmlElement::new(parent.qualify(kind)).with_attr("val", &value.to_string()))
}

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Theme color slots (`ST_SchemeColorVal`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeColor {
    Accent1,
    Accent2,
    Accent3,
    Accent4,
    Accent5,
    Accent6,
    Background1,
    Background2,
    Dark1,
    Dark2,
    FollowedHyperlink,
    Hyperlink,
    Light1,
    Light2,
    Text1,
    Text2,
    Placeholder,
    /// Sentinel for "no theme color"; never written.
    NotThemeColor,
}

impl ThemeColor {
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "accent1" => Self::Accent1,
            "accent2" => Self::Accent2,
            "accent3" => Self::Accent3,
            "accent4" => Self::Accent4,
            "accent5" => Self::Accent5,
            "accent6" => Self::Accent6,
            "bg1" => Self::Background1,
            "bg2" => Self::Background2,
            "dk1" => Self::Dark1,
            "dk2" => Self::Dark2,
            "folHlink" => Self::FollowedHyperlink,
            "hlink" => Self::Hyperlink,
            "lt1" => Self::Light1,
            "lt2" => Self::Light2,
            "tx1" => Self::Text1,
            "tx2" => Self::Text2,
            "phClr" => Self::Placeholder,
            _ => return None,
        })
    }

    pub fn token(&self) -> Option<&'static str> {
        Some(match self {
            Self::Accent1 => "accent1",
            Self::Accent2 => "accent2",
            Self::Accent3 => "accent3",
            Self::Accent4 => "accent4",
            Self::Accent5 => "accent5",
            Self::Accent6 => "accent6",
            Self::Background1 => "bg1",
            Self::Background2 => "bg2",
            Self::Dark1 => "dk1",
            Self::Dark2 => "dk2",
            Self::FollowedHyperlink => "folHlink",
            Self::Hyperlink => "hlink",
            Self::Light1 => "lt1",
            Self::Light2 => "lt2",
            Self::Text1 => "tx1",
            Self::Text2 => "tx2",
            Self::Placeholder => "phClr",
            Self::NotThemeColor => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColorSpec {
    Rgb(RgbColor),
    /// `brightness` in -1.0..=1.0, expressed in the file as lumMod/lumOff.
    Theme {
        color: ThemeColor,
        brightness: Option<f64>,
    },
}

/// Color of a solid fill under `properties`, if any.
pub fn capture_color(properties: &XmlElement) -> Option<ColorSpec> {
    let fill = properties.child("solidFill")?;
    let color = fill.elements().next()?;

    match color.local_name() {
        "srgbClr" => {
            let value = color.attr("val")?;
            let rgb = RgbColor::from_hex(&value);
            if rgb.is_none() {
                debug!("Ignoring unreadable RGB value {:?}", value);
            }
            rgb.map(ColorSpec::Rgb)
        }
        "schemeClr" => {
            let theme = ThemeColor::from_token(&color.attr("val")?)?;
            let lum_mod: Option<f64> = color.child("lumMod").and_then(|e| parse_attr(e, "val"));
            let lum_off: Option<f64> = color.child("lumOff").and_then(|e| parse_attr(e, "val"));
            let brightness = match (lum_mod, lum_off) {
                (_, Some(offset)) => Some(offset / 100_000.0),
                (Some(modulation), None) => Some(modulation / 100_000.0 - 1.0),
                (None, None) => None,
            };
            Some(ColorSpec::Theme {
                color: theme,
                brightness,
            })
        }
        _ => None,
    }
}

/// Replace the fill of `properties` with `color`.
///
/// An RGB value wins; otherwise a theme color other than the sentinel is
/// written, followed by its brightness. Nothing is changed on error.
pub fn apply_color(properties: &mut XmlElement, color: &ColorSpec) -> Result<()> {
    if capture_color(properties).as_ref() == Some(color) {
        return Ok(());
    }
    let Some(fill) = color_fill(properties, color)? else {
        return Ok(());
    };

    properties.remove_children(FILL_ELEMENTS);
    properties.insert_ordered(fill, RUN_PROPERTIES_ORDER);
    Ok(())
}

/// The `solidFill` element `apply_color` writes for `color`, or `None` for the sentinel.
fn color_fill(properties: &XmlElement, color: &ColorSpec) -> Result<Option<XmlElement>> {
    let color_element = match color {
        ColorSpec::Rgb(rgb) => {
            XmlElement::new(properties.qualify("srgbClr")).with_attr("val", &rgb.to_hex())
        }
        ColorSpec::Theme { color, brightness } => {
            let Some(token) = color.token() else {
                return Ok(None);
            };
            let mut element = XmlElement::new(properties.qualify("schemeClr")).with_attr("val", token);
            if let Some(brightness) = brightness {
                for (name, value) in brightness_transforms(*brightness)? {
                    element = element.with_child(
                        XmlElement::new(properties.qualify(name)).with_attr("val", &value.to_string()),
                    );
                }
            }
            element
        }
    };
    Ok(Some(XmlElement::new(properties.qualify("solidFill")).with_child(color_element)))
}

/// Whether `fill` is exactly what `apply_color` writes back for its captured color.
fn fill_round_trips(properties: &XmlElement, fill: &XmlElement) -> bool {
    match capture_color(properties).map(|color| color_fill(properties, &color)) {
        Some(Ok(Some(rebuilt))) => same_markup(&rebuilt, fill),
        _ => false,
    }
}

/// Structural equality ignoring attribute order and text between elements.
fn same_markup(a: &XmlElement, b: &XmlElement) -> bool {
    let mut a_attributes: Vec<_> = a.attributes.iter().collect();
    let mut b_attributes: Vec<_> = b.attributes.iter().collect();
    a_attributes.sort();
    b_attributes.sort();

    a.local_name() == b.local_name()
        && a_attributes == b_attributes
        && a.elements().count() == b.elements().count()
        && a.elements().zip(b.elements()).all(|(a, b)| same_markup(a, b))
}

fn brightness_transforms(brightness: f64) -> Result<Vec<(&'static str, i64)>> {
    if !(-1.0..=1.0).contains(&brightness) {
        return Err(DeckError::Style(format!(
            "brightness must be between -1.0 and 1.0, got {}",
            brightness
        )));
    }
    let transforms = if brightness > 0.0 {
        vec![
            ("lumMod", ((1.0 - brightness) * 100_000.0).round() as i64),
            ("lumOff", (brightness * 100_000.0).round() as i64),
        ]
    } else if brightness < 0.0 {
        vec![("lumMod", ((1.0 + brightness) * 100_000.0).round() as i64)]
    } else {
        Vec::new()
    };
    Ok(transforms)
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Underline {
    None,
    Words,
    Single,
    Double,
    Heavy,
    Dotted,
    Dashed,
    Wavy,
    /// Any other `ST_TextUnderlineType` token, kept verbatim.
    Other(String),
}

impl Underline {
    pub fn from_token(token: &str) -> Self {
        match token {
            "none" => Self::None,
            "words" => Self::Words,
            "sng" => Self::Single,
            "dbl" => Self::Double,
            "heavy" => Self::Heavy,
            "dotted" => Self::Dotted,
            "dash" => Self::Dashed,
            "wavy" => Self::Wavy,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn token(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Words => "words",
            Self::Single => "sng",
            Self::Double => "dbl",
            Self::Heavy => "heavy",
            Self::Dotted => "dotted",
            Self::Dashed => "dash",
            Self::Wavy => "wavy",
            Self::Other(token) => token,
        }
    }
}

/// Run properties that are not modeled individually (hyperlinks, highlight,
/// baseline, kerning, east-asian and complex-script fonts, effects).
///
/// The `latin` font element is always kept whole. A `solidFill` is kept raw
/// when the captured color does not reproduce it exactly (system and preset
/// colors, alpha and other transforms).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunResidual {
    /// Raw escaped attribute values.
    pub attributes: Vec<(String, String)>,
    pub elements: Vec<XmlElement>,
}

impl RunResidual {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.elements.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStyle {
    /// Hundredths of a point.
    pub size: Option<u32>,
    pub font_name: Option<String>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<Underline>,
    pub language: Option<String>,
    pub color: Option<ColorSpec>,
    pub residual: RunResidual,
}

pub fn capture_run(run: &Run) -> RunStyle {
    let Some(properties) = run.properties() else {
        return RunStyle::default();
    };

    RunStyle {
        size: parse_attr(properties, "sz"),
        font_name: properties.child("latin").and_then(|latin| latin.attr("typeface")),
        bold: parse_flag(properties, "b"),
        italic: parse_flag(properties, "i"),
        underline: properties.attr("u").map(|token| Underline::from_token(&token)),
        language: properties.attr("lang"),
        color: capture_color(properties),
        residual: RunResidual {
            attributes: properties
                .attributes
                .iter()
                .filter(|(key, _)| !MODELED_RUN_ATTRIBUTES.contains(&key.as_str()))
                .cloned()
                .collect(),
            elements: properties
                .elements()
                .filter(|element| !element.is("solidFill") || !fill_round_trips(properties, element))
                .cloned()
                .collect(),
        },
    }
}

/// Write the captured fields of `style` onto `run`. Color failures are logged and leave the prior color.
pub fn apply_run(run: &mut Run, style: &RunStyle) {
    if run.properties().is_none() && *style == RunStyle::default() {
        return;
    }
    let properties = run.properties_mut();

    for (key, raw) in &style.residual.attributes {
        if properties.raw_attr(key).is_none() {
            properties.set_raw_attr(key, raw.clone());
        }
    }
    let mut raw_fill = None;
    for element in &style.residual.elements {
        if element.is("solidFill") {
            raw_fill = Some(element);
        } else if !properties.has_child(element.local_name()) {
            properties.insert_ordered(element.clone(), RUN_PROPERTIES_ORDER);
        }
    }
    if let Some(size) = style.size {
        properties.set_attr("sz", &size.to_string());
    }
    if let Some(bold) = style.bold {
        properties.set_attr("b", flag(bold));
    }
    if let Some(italic) = style.italic {
        properties.set_attr("i", flag(italic));
    }
    if let Some(underline) = &style.underline {
        properties.set_attr("u", underline.token());
    }
    if let Some(language) = &style.language {
        properties.set_attr("lang", language);
    }
    if let Some(font_name) = &style.font_name {
        properties
            .get_or_insert("latin", RUN_PROPERTIES_ORDER)
            .set_attr("typeface", font_name);
    }
    match (raw_fill, &style.color) {
        (Some(fill), _) => {
            let unchanged = properties.child("solidFill").is_some_and(|current| same_markup(current, fill));
            if !unchanged {
                properties.remove_children(FILL_ELEMENTS);
                properties.insert_ordered(fill.clone(), RUN_PROPERTIES_ORDER);
            }
        }
        (None, Some(color)) => {
            if let Err(e) = apply_color(properties, color) {
                warn!("Could not apply run color {:?}: {}", color, e);
            }
        }
        (None, None) => {}
    }
}

// ---------------------------------------------------------------------------

fn parse_attr<T: std::str::FromStr>(element: &XmlElement, name: &str) -> Option<T> {
    element.attr(name).and_then(|value| value.trim().parse().ok())
}

fn parse_flag(element: &XmlElement, name: &str) -> Option<bool> {
    match element.attr(name).as_deref() {
        Some("1") | Some("true") | Some("on") => Some(true),
        Some("0") | Some("false") | Some("off") => Some(false),
        _ => None,
    }
}

fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

fn set_number(element: &mut XmlElement, name: &str, value: Option<i64>) {
    match value {
        Some(value) => element.set_attr(name, &value.to_string()),
        None => element.remove_attr(name),
    }
}
