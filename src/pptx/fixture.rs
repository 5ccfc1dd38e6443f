//! In-memory presentation packages for tests.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const NS: &str = "xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" \
    xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\" \
    xmlns:p=\"http://schemas.openxmlformats.org/presentationml/2006/main\"";

pub fn slide_xml(shapes: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
         <p:sld {NS}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id=\"1\" name=\"\"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>\
         <p:grpSpPr/>{shapes}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"
    )
}

/// A text shape whose body holds the given `<a:p>` markup.
pub fn text_shape(id: u32, name: &str, paragraphs: &str) -> String {
    format!(
        "<p:sp><p:nvSpPr><p:cNvPr id=\"{id}\" name=\"{name}\"/><p:cNvSpPr txBox=\"1\"/><p:nvPr/></p:nvSpPr>\
         <p:spPr><a:xfrm><a:off x=\"0\" y=\"0\"/><a:ext cx=\"100\" cy=\"100\"/></a:xfrm></p:spPr>\
         <p:txBody><a:bodyPr wrap=\"square\" lIns=\"91440\" anchor=\"ctr\"><a:spAutoFit/></a:bodyPr><a:lstStyle/>{paragraphs}</p:txBody></p:sp>"
    )
}

pub fn run(text: &str) -> String {
    format!("<a:r><a:rPr lang=\"en-US\" sz=\"1800\" b=\"1\" dirty=\"0\"/><a:t>{text}</a:t></a:r>")
}

pub fn simple_text_shape(id: u32, name: &str, text: &str) -> String {
    text_shape(id, name, &format!("<a:p>{}</a:p>", run(text)))
}

pub fn group_shape(id: u32, name: &str, children: &str) -> String {
    format!(
        "<p:grpSp><p:nvGrpSpPr><p:cNvPr id=\"{id}\" name=\"{name}\"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>\
         <p:grpSpPr/>{children}</p:grpSp>"
    )
}

pub fn picture_shape(id: u32) -> String {
    format!(
        "<p:pic><p:nvPicPr><p:cNvPr id=\"{id}\" name=\"Picture {id}\"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr>\
         <p:blipFill><a:blip r:embed=\"rId9\"/></p:blipFill><p:spPr/></p:pic>"
    )
}

pub fn build_pptx(slides: &[String]) -> Vec<u8> {
    let order: Vec<usize> = (1..=slides.len()).collect();
    build_pptx_with_order(slides, &order)
}

/// `order` lists 1-based slide part numbers in presentation order.
pub fn build_pptx_with_order(slides: &[String], order: &[usize]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    let mut content_types = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
         <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
         <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
         <Override PartName=\"/ppt/presentation.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml\"/>",
    );
    for number in 1..=slides.len() {
        content_types.push_str(&format!(
            "<Override PartName=\"/ppt/slides/slide{number}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slide+xml\"/>"
        ));
    }
    content_types.push_str("</Types>");

    let root_rels = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
        <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
        <Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"ppt/presentation.xml\"/>\
        </Relationships>";

    let mut slide_ids = String::new();
    for (position, number) in order.iter().enumerate() {
        slide_ids.push_str(&format!("<p:sldId id=\"{}\" r:id=\"rId{}\"/>", 256 + position, 100 + number));
    }
    let presentation = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <p:presentation {NS}><p:sldIdLst>{slide_ids}</p:sldIdLst><p:sldSz cx=\"12192000\" cy=\"6858000\"/></p:presentation>"
    );

    let mut presentation_rels = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
    );
    for number in 1..=slides.len() {
        presentation_rels.push_str(&format!(
            "<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide\" Target=\"slides/slide{}.xml\"/>",
            100 + number,
            number
        ));
    }
    presentation_rels.push_str("</Relationships>");

    let mut add = |name: &str, data: &[u8], options: SimpleFileOptions| {
        writer.start_file(name, options).unwrap();
        writer.write_all(data).unwrap();
    };
    add("[Content_Types].xml", content_types.as_bytes(), deflated);
    add("_rels/.rels", root_rels.as_bytes(), deflated);
    add("ppt/presentation.xml", presentation.as_bytes(), deflated);
    add("ppt/_rels/presentation.xml.rels", presentation_rels.as_bytes(), deflated);
    for (index, slide) in slides.iter().enumerate() {
        add(&format!("ppt/slides/slide{}.xml", index + 1), slide.as_bytes(), deflated);
    }
    add("ppt/media/image1.png", &[0x89, b'P', b'N', b'G', 0, 1, 2, 3], stored);

    writer.finish().unwrap().into_inner()
}
