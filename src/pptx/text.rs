//! Text frames, paragraphs and runs.
//!
//! Each level keeps its own element with the lifted children replaced by
//! slots, so anything we do not model (list styles, line breaks, fields,
//! end-of-paragraph properties) stays exactly where it was.

use super::xml::{XmlElement, XmlNode};
use crate::error::Result;

/// Child order of `a:rPr` (CT_TextCharacterProperties).
pub const RUN_PROPERTIES_ORDER: &[&str] = &[
    "ln", "noFill", "solidFill", "gradFill", "blipFill", "pattFill", "grpFill", "effectLst",
    "effectDag", "highlight", "uLnTx", "uLn", "uFillTx", "uFill", "latin", "ea", "cs", "sym",
    "hlinkClick", "hlinkMouseOver", "rtl", "extLst",
];

/// Child order of `a:pPr` (CT_TextParagraphProperties).
pub const PARAGRAPH_PROPERTIES_ORDER: &[&str] = &[
    "lnSpc", "spcBef", "spcAft", "buClrTx", "buClr", "buSzTx", "buSzPct", "buSzPts", "buFontTx",
    "buFont", "buNone", "buAutoNum", "buChar", "buBlip", "tabLst", "defRPr", "extLst",
];

/// Child order of `a:bodyPr` (CT_TextBodyProperties).
pub const BODY_PROPERTIES_ORDER: &[&str] = &[
    "prstTxWarp", "noAutofit", "normAutofit", "spAutoFit", "scene3d", "sp3d", "flatTx", "extLst",
];

const RUN_ORDER: &[&str] = &["rPr", "t"];

/// `p:txBody` (or `a:txBody` inside tables).
#[derive(Debug, Clone, PartialEq)]
pub struct TextFrame {
    element: XmlElement,
    paragraphs: Vec<Paragraph>,
}

impl TextFrame {
    pub fn from_element(mut element: XmlElement) -> Self {
        let paragraphs = element
            .lift_children(|child| child.is("p"))
            .into_iter()
            .map(Paragraph::from_element)
            .collect();
        Self { element, paragraphs }
    }

    pub fn body_properties(&self) -> Option<&XmlElement> {
        self.element.child("bodyPr")
    }

    /// `a:bodyPr`, created on demand.
    pub fn body_properties_mut(&mut self) -> &mut XmlElement {
        // Always the first child; paragraphs are slots here so ordering by name cannot place it.
        if !self.element.has_child("bodyPr") {
            self.element.children.insert(0, XmlNode::Element(XmlElement::new("a:bodyPr")));
        }
        self.element.get_or_insert_as("a:bodyPr", &[])
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    pub fn paragraphs_mut(&mut self) -> &mut [Paragraph] {
        &mut self.paragraphs
    }

    /// Paragraph texts joined by newlines.
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn write(&self, out: &mut String) -> Result<()> {
        let mut paragraphs = self.paragraphs.iter();
        self.element.write_with(out, &mut |out: &mut String| {
            if let Some(paragraph) = paragraphs.next() {
                paragraph.write(out);
            }
            Ok(())
        })
    }
}

/// `a:p`.
#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    element: XmlElement,
    runs: Vec<Run>,
}

impl Paragraph {
    pub fn from_element(mut element: XmlElement) -> Self {
        let runs = element
            .lift_children(|child| child.is("r"))
            .into_iter()
            .map(Run::from_element)
            .collect();
        Self { element, runs }
    }

    pub fn properties(&self) -> Option<&XmlElement> {
        self.element.child("pPr")
    }

    /// `a:pPr`, created on demand.
    pub fn properties_mut(&mut self) -> &mut XmlElement {
        if !self.element.has_child("pPr") {
            let name = self.element.qualify("pPr");
            self.element.children.insert(0, XmlNode::Element(XmlElement::new(name)));
        }
        self.element.get_or_insert("pPr", &[])
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub fn runs_mut(&mut self) -> &mut [Run] {
        &mut self.runs
    }

    /// Drop every run. Their positions stay reserved for the runs added next.
    pub fn clear_runs(&mut self) {
        self.runs.clear();
    }

    /// Append an empty run in the paragraph's namespace.
    pub fn add_run(&mut self) -> &mut Run {
        let run = Run::new(&self.element.qualify("r"));
        self.runs.push(run);
        let last = self.runs.len() - 1;
        &mut self.runs[last]
    }

    /// Text of runs, fields and line breaks (as vertical tab) in order.
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut runs = self.runs.iter();
        for node in &self.element.children {
            match node {
                XmlNode::Slot => {
                    if let Some(run) = runs.next() {
                        out.push_str(&run.text());
                    }
                }
                XmlNode::Element(element) if element.is("br") => out.push('\u{b}'),
                XmlNode::Element(element) if element.is("fld") => {
                    if let Some(t) = element.child("t") {
                        out.push_str(&t.text());
                    }
                }
                _ => {}
            }
        }
        for run in runs {
            out.push_str(&run.text());
        }
        out
    }

    /// Runs fill the reserved positions in order; any extra runs go before
    /// `a:endParaRPr`, and unused positions write nothing.
    pub fn write(&self, out: &mut String) {
        let slots = self.element.slot_count();
        let mut runs = self.runs.iter();
        let mut extra = self.runs.iter().skip(slots);
        let mut extra_written = self.runs.len() <= slots;

        self.element.write_open(out);
        if self.element.children.is_empty() && self.runs.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for node in &self.element.children {
            match node {
                XmlNode::Slot => {
                    if let Some(run) = runs.next() {
                        run.write(out);
                    }
                }
                XmlNode::Element(element) => {
                    if element.is("endParaRPr") && !extra_written {
                        extra.by_ref().for_each(|run| run.write(out));
                        extra_written = true;
                    }
                    element.write(out);
                }
                XmlNode::Text(raw) => out.push_str(raw),
                XmlNode::CData(data) => {
                    out.push_str("<![CDATA[");
                    out.push_str(data);
                    out.push_str("]]>");
                }
            }
        }
        if !extra_written {
            extra.for_each(|run| run.write(out));
        }
        self.element.write_close(out);
    }
}

/// `a:r`.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    element: XmlElement,
}

impl Run {
    pub fn new(name: &str) -> Self {
        let element = XmlElement::new(name);
        let t = XmlElement::new(element.qualify("t"));
        Self {
            element: element.with_child(t),
        }
    }

    pub fn from_element(element: XmlElement) -> Self {
        Self { element }
    }

    pub fn properties(&self) -> Option<&XmlElement> {
        self.element.child("rPr")
    }

    /// `a:rPr`, created on demand.
    pub fn properties_mut(&mut self) -> &mut XmlElement {
        self.element.get_or_insert("rPr", RUN_ORDER)
    }

    pub fn text(&self) -> String {
        self.element.child("t").map(XmlElement::text).unwrap_or_default()
    }

    pub fn set_text(&mut self, text: &str) {
        self.element.get_or_insert("t", RUN_ORDER).set_text(text);
    }

    pub fn element(&self) -> &XmlElement {
        &self.element
    }

    pub fn write(&self, out: &mut String) {
        self.element.write(out);
    }
}
