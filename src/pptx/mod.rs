// Presentation document model
//
// This module reads and writes .pptx packages:
// - xml: owned XML tree that writes untouched markup back verbatim
// - package: the zip container and slide discovery through relationships
// - shapes: the per-slide shape tree (groups, text shapes, everything else)
// - text: text frames, paragraphs and runs
// - convert: legacy .ppt conversion through an external office suite

pub mod convert;
pub mod package;
pub mod shapes;
pub mod text;
pub mod xml;

#[cfg(test)]
pub(crate) mod fixture;

use std::path::Path;

use tracing::debug;

pub use convert::LegacyConverter;
pub use package::Package;
pub use shapes::{GroupShape, OpaqueShape, Shape, TextShape, MAX_GROUP_DEPTH};
pub use text::{Paragraph, Run, TextFrame};

use crate::error::{DeckError, Result};
use shapes::is_shape_element;
use xml::{XmlDocument, XmlElement};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Office Open XML presentation.
    Pptx,
    /// Legacy binary presentation.
    Ppt,
}

impl DocumentFormat {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let extension = path.as_ref().extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "pptx" => Some(Self::Pptx),
            "ppt" => Some(Self::Ppt),
            _ => None,
        }
    }

    /// Identify a file by its leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(ZIP_MAGIC) {
            Some(Self::Pptx)
        } else if bytes.starts_with(OLE_MAGIC) {
            Some(Self::Ppt)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pptx => "pptx",
            Self::Ppt => "ppt",
        }
    }
}

/// One slide part with its shape tree lifted out of `p:spTree`.
#[derive(Debug, Clone)]
pub struct Slide {
    part_name: String,
    prolog: String,
    root: XmlElement,
    shapes: Vec<Shape>,
}

impl Slide {
    pub fn parse(part_name: &str, bytes: &[u8]) -> Result<Self> {
        let XmlDocument { prolog, mut root } = XmlDocument::parse(bytes)?;

        let tree = root
            .child_mut("cSld")
            .and_then(|common| common.child_mut("spTree"));
        let shapes = match tree {
            Some(tree) => tree
                .lift_children(is_shape_element)
                .into_iter()
                .map(|element| Shape::from_element(element, 0))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            part_name: part_name.to_string(),
            prolog,
            root,
            shapes,
        })
    }

    pub fn part_name(&self) -> &str {
        &self.part_name
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn shapes_mut(&mut self) -> &mut [Shape] {
        &mut self.shapes
    }

    pub fn to_xml(&self) -> Result<String> {
        let mut out = String::with_capacity(8192);
        out.push_str(&self.prolog);
        let mut shapes = self.shapes.iter();
        self.root.write_with(&mut out, &mut |out: &mut String| match shapes.next() {
            Some(shape) => shape.write(out),
            None => Ok(()),
        })?;
        Ok(out)
    }
}

/// An opened presentation: the package plus its slides in presentation order.
#[derive(Debug, Clone)]
pub struct Document {
    package: Package,
    slides: Vec<Slide>,
}

impl Document {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DeckError::FileNotFound(path.display().to_string()));
        }
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match DocumentFormat::sniff(bytes) {
            Some(DocumentFormat::Pptx) => {}
            Some(DocumentFormat::Ppt) => {
                return Err(DeckError::UnsupportedFormat(
                    "legacy .ppt must be converted before opening".to_string(),
                ));
            }
            None => return Err(DeckError::UnsupportedFormat("not a presentation file".to_string())),
        }

        let package = Package::from_bytes(bytes)?;
        let slides = package
            .slide_part_names()?
            .iter()
            .map(|name| {
                let data = package
                    .part(name)
                    .ok_or_else(|| DeckError::Document(format!("missing slide part {}", name)))?;
                Slide::parse(name, data)
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Opened presentation with {} slides", slides.len());
        Ok(Self { package, slides })
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn slides_mut(&mut self) -> &mut [Slide] {
        &mut self.slides
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    /// Serialize the package with every slide part regenerated.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut package = self.package.clone();
        for slide in &self.slides {
            package.set_part(slide.part_name(), slide.to_xml()?.into_bytes());
        }
        package.to_bytes()
    }
}
