use super::text::TextFrame;
use super::xml::XmlElement;
use crate::error::{DeckError, Result};

/// Deepest group nesting accepted when loading or walking a shape tree.
pub const MAX_GROUP_DEPTH: usize = 64;

/// Children of `p:spTree` / `p:grpSp` that are shapes.
const SHAPE_ELEMENTS: &[&str] = &[
    "sp",
    "grpSp",
    "pic",
    "graphicFrame",
    "cxnSp",
    "contentPart",
    "AlternateContent",
];

pub fn is_shape_element(element: &XmlElement) -> bool {
    SHAPE_ELEMENTS.contains(&element.local_name())
}

/// A slide shape, classified once when the slide is loaded.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Group(GroupShape),
    Text(TextShape),
    /// Pictures, connectors, tables, charts and shapes without a text body.
    Other(OpaqueShape),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupShape {
    element: XmlElement,
    shapes: Vec<Shape>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextShape {
    element: XmlElement,
    text_frame: TextFrame,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueShape {
    element: XmlElement,
}

impl Shape {
    /// Classify `element`, lifting group children and text bodies into typed values.
    pub fn from_element(mut element: XmlElement, depth: usize) -> Result<Self> {
        if element.is("grpSp") {
            if depth >= MAX_GROUP_DEPTH {
                return Err(DeckError::ShapeDepthExceeded(MAX_GROUP_DEPTH));
            }
            let shapes = element
                .lift_children(is_shape_element)
                .into_iter()
                .map(|child| Shape::from_element(child, depth + 1))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Shape::Group(GroupShape { element, shapes }));
        }

        if element.is("sp") && element.has_child("txBody") {
            let mut bodies = element.lift_children(|child| child.is("txBody"));
            if let Some(body) = bodies.pop() {
                return Ok(Shape::Text(TextShape {
                    element,
                    text_frame: TextFrame::from_element(body),
                }));
            }
        }

        Ok(Shape::Other(OpaqueShape { element }))
    }

    pub fn parse(xml: &str) -> Result<Self> {
        Shape::from_element(XmlElement::parse_fragment(xml)?, 0)
    }

    fn element(&self) -> &XmlElement {
        match self {
            Shape::Group(group) => &group.element,
            Shape::Text(text) => &text.element,
            Shape::Other(other) => &other.element,
        }
    }

    /// `name` of the shape's `cNvPr`, if it has one.
    pub fn name(&self) -> Option<String> {
        self.element()
            .elements()
            .next()
            .and_then(|non_visual| non_visual.child("cNvPr"))
            .and_then(|properties| properties.attr("name"))
    }

    pub fn text_frame(&self) -> Option<&TextFrame> {
        match self {
            Shape::Text(text) => Some(&text.text_frame),
            _ => None,
        }
    }

    pub fn write(&self, out: &mut String) -> Result<()> {
        match self {
            Shape::Group(group) => {
                let mut shapes = group.shapes.iter();
                group.element.write_with(out, &mut |out: &mut String| match shapes.next() {
                    Some(shape) => shape.write(out),
                    None => Ok(()),
                })
            }
            Shape::Text(text) => {
                let frame = &text.text_frame;
                text.element.write_with(out, &mut |out: &mut String| frame.write(out))
            }
            Shape::Other(other) => {
                other.element.write(out);
                Ok(())
            }
        }
    }

    pub fn to_xml(&self) -> Result<String> {
        let mut out = String::new();
        self.write(&mut out)?;
        Ok(out)
    }
}

impl GroupShape {
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn shapes_mut(&mut self) -> &mut [Shape] {
        &mut self.shapes
    }
}

impl TextShape {
    pub fn text_frame(&self) -> &TextFrame {
        &self.text_frame
    }

    pub fn text_frame_mut(&mut self) -> &mut TextFrame {
        &mut self.text_frame
    }
}

impl OpaqueShape {
    pub fn element(&self) -> &XmlElement {
        &self.element
    }
}
