use std::io::{Cursor, Read, Write};

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{DeckError, Result};
use super::xml::XmlDocument;

const ROOT_RELATIONSHIPS: &str = "_rels/.rels";
const OFFICE_DOCUMENT_TYPE: &str = "/officeDocument";
const DEFAULT_PRESENTATION_PART: &str = "ppt/presentation.xml";

/// One archive member, kept as stored so unchanged parts are written back verbatim.
#[derive(Debug, Clone)]
pub struct PackageEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: CompressionMethod,
    pub is_dir: bool,
}

/// The zip container of a presentation.
#[derive(Debug, Clone, Default)]
pub struct Package {
    entries: Vec<PackageEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

impl Package {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push(PackageEntry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                is_dir: file.is_dir(),
            });
        }

        debug!("Read package with {} entries", entries.len());
        Ok(Self { entries })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for entry in &self.entries {
            // Only stored and deflated members can be written back with the enabled codecs.
            let method = match entry.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let options = SimpleFileOptions::default().compression_method(method);

            if entry.is_dir {
                writer.add_directory(entry.name.as_str(), options)?;
            } else {
                writer.start_file(entry.name.as_str(), options)?;
                writer.write_all(&entry.data)?;
            }
        }

        let cursor = writer.finish()?;
        Ok(cursor.into_inner())
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.data.as_slice())
    }

    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.data = data,
            None => self.entries.push(PackageEntry {
                name: name.to_string(),
                data,
                compression: CompressionMethod::Deflated,
                is_dir: false,
            }),
        }
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    fn xml_part(&self, name: &str) -> Result<XmlDocument> {
        let data = self
            .part(name)
            .ok_or_else(|| DeckError::Document(format!("missing part {}", name)))?;
        XmlDocument::parse(data)
    }

    /// Relationships of `part_name`, or an empty list when it has no rels part.
    pub fn relationships(&self, part_name: &str) -> Result<Vec<Relationship>> {
        let rels_name = rels_part_name(part_name);
        if self.part(&rels_name).is_none() {
            return Ok(Vec::new());
        }

        let doc = self.xml_part(&rels_name)?;
        Ok(doc
            .root
            .elements()
            .filter(|element| element.is("Relationship"))
            .filter_map(|element| {
                Some(Relationship {
                    id: element.attr("Id")?,
                    rel_type: element.attr("Type").unwrap_or_default(),
                    target: element.attr("Target")?,
                    external: element.attr("TargetMode").as_deref() == Some("External"),
                })
            })
            .collect())
    }

    /// Name of the main presentation part, found through the package relationships.
    pub fn presentation_part_name(&self) -> Result<String> {
        let found = self
            .relationships("")?
            .into_iter()
            .find(|rel| rel.rel_type.ends_with(OFFICE_DOCUMENT_TYPE) && !rel.external)
            .map(|rel| resolve_target("", &rel.target));

        match found {
            Some(name) if self.part(&name).is_some() => Ok(name),
            _ if self.part(DEFAULT_PRESENTATION_PART).is_some() => Ok(DEFAULT_PRESENTATION_PART.to_string()),
            _ => Err(DeckError::Document("no presentation part in package".to_string())),
        }
    }

    /// Slide part names in presentation order (`p:sldIdLst`).
    pub fn slide_part_names(&self) -> Result<Vec<String>> {
        let presentation = self.presentation_part_name()?;
        let doc = self.xml_part(&presentation)?;
        let relationships = self.relationships(&presentation)?;

        let Some(list) = doc.root.child("sldIdLst") else {
            return Ok(Vec::new());
        };

        let mut names = Vec::new();
        for slide_id in list.elements().filter(|element| element.is("sldId")) {
            // The relationship id is the namespaced `id`; the bare `id` is the numeric slide id.
            let rel_id = slide_id
                .attributes
                .iter()
                .find(|(key, _)| key.ends_with(":id"))
                .and_then(|(key, _)| slide_id.attr(key))
                .ok_or_else(|| DeckError::Document("slide id without relationship".to_string()))?;

            let rel = relationships
                .iter()
                .find(|rel| rel.id == rel_id)
                .ok_or_else(|| DeckError::Document(format!("dangling slide relationship {}", rel_id)))?;

            let name = resolve_target(&presentation, &rel.target);
            if self.part(&name).is_none() {
                return Err(DeckError::Document(format!("missing slide part {}", name)));
            }
            names.push(name);
        }
        Ok(names)
    }
}

/// `ppt/presentation.xml` -> `ppt/_rels/presentation.xml.rels`; the package itself -> `_rels/.rels`.
pub fn rels_part_name(part_name: &str) -> String {
    if part_name.is_empty() {
        return ROOT_RELATIONSHIPS.to_string();
    }
    match part_name.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part_name),
    }
}

/// Resolve a relationship target relative to the part that owns it.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    let joined = if let Some(absolute) = target.strip_prefix('/') {
        absolute.to_string()
    } else {
        match source_part.rsplit_once('/') {
            Some((dir, _)) => format!("{}/{}", dir, target),
            None => target.to_string(),
        }
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}
