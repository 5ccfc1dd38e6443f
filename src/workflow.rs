use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::{NamedTempFile, TempDir};
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{Config, OutputConfig};
use crate::error::{DeckError, Result};
use crate::language::Language;
use crate::notify::{Notification, Notifier};
use crate::pptx::{Document, DocumentFormat, LegacyConverter};
use crate::translate::TextTranslator;
use crate::walker::ShapeWalker;

/// Persist attempts before giving up on finding a free output name
const MAX_PERSIST_ATTEMPTS: usize = 8;

/// Translates whole presentation files and owns their temporary inputs.
pub struct DocumentWorkflow {
    walker: ShapeWalker,
    notifier: Arc<dyn Notifier>,
    output: OutputConfig,
    converter: LegacyConverter,
}

impl DocumentWorkflow {
    pub fn new(
        translator: Arc<dyn TextTranslator>,
        notifier: Arc<dyn Notifier>,
        output: OutputConfig,
        converter: LegacyConverter,
    ) -> Self {
        Self {
            walker: ShapeWalker::new(translator),
            notifier,
            output,
            converter,
        }
    }

    pub fn from_config(config: &Config, translator: Arc<dyn TextTranslator>, notifier: Arc<dyn Notifier>) -> Self {
        Self::new(
            translator,
            notifier,
            config.output.clone(),
            LegacyConverter::new(config.converter.clone()),
        )
    }

    pub fn output_dir(&self) -> &Path {
        &self.output.directory
    }

    /// `translated_<stem>.<ext>`; legacy input is saved as `.pptx`.
    pub fn output_file_name(&self, input: &Path) -> Result<String> {
        let stem = input
            .file_stem()
            .ok_or_else(|| DeckError::FileNotFound(input.display().to_string()))?
            .to_string_lossy();
        let extension = match DocumentFormat::from_path(input) {
            Some(DocumentFormat::Ppt) | None => DocumentFormat::Pptx.extension().to_string(),
            Some(DocumentFormat::Pptx) => input
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_else(|| DocumentFormat::Pptx.extension().to_string()),
        };
        Ok(format!("{}{}.{}", self.output.filename_prefix, stem, extension))
    }

    /// Translate `input` and return the path of the new file.
    ///
    /// `input` is treated as a temporary file: it is removed on every exit path.
    /// Nothing is written to the output directory unless the whole document
    /// translated successfully.
    pub async fn translate_document(&self, input: &Path, source: Language, target: Language) -> Result<PathBuf> {
        let result = {
            let _input = TemporaryInput(input);
            self.run(input, source, target).await
        };

        match result {
            Ok(path) => {
                info!("Translated presentation saved to {}", path.display());
                self.notifier.notify(Notification::Completed { path: path.clone() });
                Ok(path)
            }
            Err(e) => {
                warn!("Translation of {} failed: {}", input.display(), e);
                self.notifier.notify(Notification::Failed);
                Err(e)
            }
        }
    }

    /// Translate a copy of `input`, leaving the original in place.
    pub async fn translate_copy(&self, input: &Path, source: Language, target: Language) -> Result<PathBuf> {
        let (_staging, staged) = stage_copy(input).await?;
        self.translate_document(&staged, source, target).await
    }

    /// Translate every presentation under `input_dir`; failures are logged and skipped.
    pub async fn translate_directory(&self, input_dir: &Path, source: Language, target: Language) -> Result<Vec<PathBuf>> {
        info!("Processing directory: {}", input_dir.display());
        if !input_dir.is_dir() {
            return Err(DeckError::Config(format!("{} is not a directory", input_dir.display())));
        }

        let presentations: Vec<PathBuf> = WalkDir::new(input_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|entry| entry.file_type().is_file() && DocumentFormat::from_path(entry.path()).is_some())
            .map(|entry| entry.path().to_path_buf())
            .collect();
        info!("Found {} presentations to translate", presentations.len());

        let mut outputs = Vec::new();
        for path in presentations {
            match self.translate_copy(&path, source, target).await {
                Ok(output) => {
                    info!("Successfully translated: {}", path.display());
                    outputs.push(output);
                }
                Err(e) => warn!("Failed to translate {}: {}", path.display(), e),
            }
        }
        Ok(outputs)
    }

    async fn run(&self, input: &Path, source: Language, target: Language) -> Result<PathBuf> {
        if !input.exists() {
            return Err(DeckError::FileNotFound(input.display().to_string()));
        }
        fs::create_dir_all(&self.output.directory).await?;
        let file_name = self.output_file_name(input)?;

        self.notifier.notify(Notification::TranslationStarted { source, target });

        let bytes = fs::read(input).await?;
        let format = DocumentFormat::from_path(input)
            .or_else(|| DocumentFormat::sniff(&bytes))
            .ok_or_else(|| DeckError::UnsupportedFormat(input.display().to_string()))?;

        let mut document = match format {
            DocumentFormat::Pptx => Document::from_bytes(&bytes)?,
            DocumentFormat::Ppt => {
                let converted_dir = tempfile::tempdir()?;
                let converted = self.converter.convert_to_pptx(input, converted_dir.path()).await?;
                Document::from_bytes(&fs::read(&converted).await?)?
            }
        };

        let total = document.slide_count();
        info!("Translating {} slides from {} to {}", total, source, target);
        for (index, slide) in document.slides_mut().iter_mut().enumerate() {
            self.notifier.notify(Notification::SlideProgress { index: index + 1, total });
            let stats = self.walker.walk_all(slide.shapes_mut(), source, target).await?;
            debug!(
                "Slide {}/{} ({}): {} runs translated",
                index + 1,
                total,
                slide.part_name(),
                stats.runs_translated
            );
        }

        self.notifier.notify(Notification::Saving);
        let bytes = document.to_bytes()?;
        let directory = self.output.directory.clone();
        tokio::task::spawn_blocking(move || persist_noclobber(&bytes, &directory, &file_name))
            .await
            .map_err(|e| DeckError::Io(std::io::Error::other(e.to_string())))?
    }
}

/// Removes the input file when dropped, including when the translation is cancelled.
struct TemporaryInput<'a>(&'a Path);

impl Drop for TemporaryInput<'_> {
    fn drop(&mut self) {
        if self.0.exists() {
            if let Err(e) = std::fs::remove_file(self.0) {
                warn!("Failed to remove temporary input {}: {}", self.0.display(), e);
            }
        }
    }
}

/// Copy `input` into a fresh temporary directory.
pub async fn stage_copy(input: &Path) -> Result<(TempDir, PathBuf)> {
    let name = input
        .file_name()
        .ok_or_else(|| DeckError::FileNotFound(input.display().to_string()))?;
    if !input.exists() {
        return Err(DeckError::FileNotFound(input.display().to_string()));
    }
    let staging = tempfile::tempdir()?;
    let staged = staging.path().join(name);
    fs::copy(input, &staged).await?;
    Ok((staging, staged))
}

/// Write `bytes` through a temporary file in `dir`, then link it to `file_name`
/// without replacing an existing file. Taken names get a short unique suffix.
fn persist_noclobber(bytes: &[u8], dir: &Path, file_name: &str) -> Result<PathBuf> {
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;

    let mut candidate = dir.join(file_name);
    for _ in 0..MAX_PERSIST_ATTEMPTS {
        match temp.persist_noclobber(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                debug!("{} already exists, picking another name", candidate.display());
                temp = e.file;
                candidate = dir.join(unique_name(file_name));
            }
            Err(e) => return Err(e.error.into()),
        }
    }
    Err(DeckError::Io(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free output name for {}", file_name),
    )))
}

fn unique_name(file_name: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let suffix = &suffix[..8];
    match file_name.rsplit_once('.') {
        Some((stem, extension)) => format!("{}_{}.{}", stem, suffix, extension),
        None => format!("{}_{}", file_name, suffix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConverterConfig;
    use crate::notify::testing::RecordingNotifier;
    use crate::pptx::fixture::{build_pptx, group_shape, picture_shape, simple_text_shape, slide_xml};
    use crate::pptx::{Package, Shape};
    use crate::translate::testing::{StalledTranslator, SuffixTranslator};
    use tokio_test::{assert_err, assert_ok};

    struct Harness {
        _temp: TempDir,
        input: PathBuf,
        output_dir: PathBuf,
        notifier: Arc<RecordingNotifier>,
        translator: Arc<SuffixTranslator>,
        workflow: DocumentWorkflow,
    }

    fn harness(translator: SuffixTranslator, input_name: &str, input_bytes: &[u8]) -> Harness {
        let temp = tempfile::tempdir().unwrap();
        let input = temp.path().join(input_name);
        std::fs::write(&input, input_bytes).unwrap();
        let output_dir = temp.path().join("output");

        let notifier = Arc::new(RecordingNotifier::default());
        let translator = Arc::new(translator);
        let workflow = DocumentWorkflow::new(
            translator.clone(),
            notifier.clone(),
            OutputConfig {
                directory: output_dir.clone(),
                filename_prefix: "translated_".to_string(),
            },
            LegacyConverter::new(ConverterConfig::default()),
        );
        Harness { _temp: temp, input, output_dir, notifier, translator, workflow }
    }

    fn two_slide_deck() -> Vec<u8> {
        build_pptx(&[
            slide_xml(&format!("{}{}", simple_text_shape(2, "Title", "Hello"), picture_shape(3))),
            slide_xml(&group_shape(4, "Group", &simple_text_shape(5, "Inner", "World"))),
        ])
    }

    fn frame_text(shape: &Shape) -> String {
        shape.text_frame().unwrap().text()
    }

    #[tokio::test]
    async fn test_end_to_end_translation() {
        let h = harness(SuffixTranslator::new("(ja)"), "deck.pptx", &two_slide_deck());

        let output = assert_ok!(
            h.workflow
                .translate_document(&h.input, Language::English, Language::Japanese)
                .await
        );

        assert_eq!(output, h.output_dir.join("translated_deck.pptx"));
        assert!(!h.input.exists());

        let document = Document::open(&output).unwrap();
        assert_eq!(document.slide_count(), 2);
        let first = document.slides()[0].shapes();
        assert_eq!(first.len(), 2);
        assert_eq!(frame_text(&first[0]), "Hello(ja)");
        assert!(matches!(first[1], Shape::Other(_)));
        let Shape::Group(group) = &document.slides()[1].shapes()[0] else {
            panic!("expected group shape");
        };
        assert_eq!(frame_text(&group.shapes()[0]), "World(ja)");

        assert_eq!(
            h.notifier.events(),
            vec![
                Notification::TranslationStarted { source: Language::English, target: Language::Japanese },
                Notification::SlideProgress { index: 1, total: 2 },
                Notification::SlideProgress { index: 2, total: 2 },
                Notification::Saving,
                Notification::Completed { path: output.clone() },
            ]
        );
    }

    #[tokio::test]
    async fn test_non_slide_parts_carried_over() {
        let deck = two_slide_deck();
        let h = harness(SuffixTranslator::new("(ja)"), "deck.pptx", &deck);

        let output = h
            .workflow
            .translate_document(&h.input, Language::English, Language::Japanese)
            .await
            .unwrap();

        let original = Package::from_bytes(&deck).unwrap();
        let translated = Package::from_bytes(&std::fs::read(output).unwrap()).unwrap();
        for name in ["ppt/media/image1.png", "ppt/presentation.xml", "[Content_Types].xml"] {
            assert_eq!(translated.part(name), original.part(name), "{}", name);
        }
    }

    #[tokio::test]
    async fn test_empty_document() {
        let h = harness(SuffixTranslator::new("(ja)"), "empty.pptx", &build_pptx(&[]));

        let output = h
            .workflow
            .translate_document(&h.input, Language::English, Language::Japanese)
            .await
            .unwrap();

        assert_eq!(Document::open(&output).unwrap().slide_count(), 0);
        assert_eq!(h.translator.calls(), 0);
        assert_eq!(h.notifier.events().len(), 3);
    }

    #[tokio::test]
    async fn test_failure_cleans_up_and_writes_nothing() {
        let h = harness(SuffixTranslator::failing_after("(ja)", 1), "deck.pptx", &two_slide_deck());

        let result = h
            .workflow
            .translate_document(&h.input, Language::English, Language::Japanese)
            .await;

        assert!(matches!(result, Err(DeckError::Translation(_))));
        assert!(!h.input.exists());
        assert_eq!(std::fs::read_dir(&h.output_dir).unwrap().count(), 0);

        let events = h.notifier.events();
        assert_eq!(events.last(), Some(&Notification::Failed));
        assert!(!events.contains(&Notification::Saving));
    }

    #[tokio::test]
    async fn test_cancelled_translation_removes_input() {
        let temp = tempfile::tempdir().unwrap();
        let input = temp.path().join("deck.pptx");
        std::fs::write(&input, two_slide_deck()).unwrap();
        let output_dir = temp.path().join("output");
        let workflow = DocumentWorkflow::new(
            Arc::new(StalledTranslator),
            Arc::new(RecordingNotifier::default()),
            OutputConfig {
                directory: output_dir.clone(),
                filename_prefix: "translated_".to_string(),
            },
            LegacyConverter::new(ConverterConfig::default()),
        );

        let cancelled = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            workflow.translate_document(&input, Language::English, Language::Japanese),
        )
        .await;

        assert!(cancelled.is_err());
        assert!(!input.exists());
        assert_eq!(std::fs::read_dir(&output_dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_existing_output_is_not_overwritten() {
        let h = harness(SuffixTranslator::new("(ja)"), "deck.pptx", &two_slide_deck());
        std::fs::create_dir_all(&h.output_dir).unwrap();
        let taken = h.output_dir.join("translated_deck.pptx");
        std::fs::write(&taken, b"earlier result").unwrap();

        let output = h
            .workflow
            .translate_document(&h.input, Language::English, Language::Japanese)
            .await
            .unwrap();

        assert_ne!(output, taken);
        let name = output.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("translated_deck_") && name.ends_with(".pptx"));
        assert_eq!(std::fs::read(&taken).unwrap(), b"earlier result");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_saves_pick_distinct_names() {
        let h = harness(SuffixTranslator::new("(ja)"), "deck.pptx", &two_slide_deck());
        let again = h.input.parent().unwrap().join("again").join("deck.pptx");
        std::fs::create_dir_all(again.parent().unwrap()).unwrap();
        std::fs::write(&again, two_slide_deck()).unwrap();

        let (first, second) = tokio::join!(
            h.workflow.translate_document(&h.input, Language::English, Language::Japanese),
            h.workflow.translate_document(&again, Language::English, Language::Japanese),
        );
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_ne!(first, second);
        for output in [first, second] {
            let document = Document::open(&output).unwrap();
            assert_eq!(frame_text(&document.slides()[0].shapes()[0]), "Hello(ja)");
        }
        assert_eq!(std::fs::read_dir(&h.output_dir).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_unsupported_input() {
        let h = harness(SuffixTranslator::new("(ja)"), "notes.txt", b"just some notes");

        let error = assert_err!(
            h.workflow
                .translate_document(&h.input, Language::English, Language::Japanese)
                .await
        );

        assert!(matches!(error, DeckError::UnsupportedFormat(_)));
        assert!(!h.input.exists());
        assert_eq!(h.notifier.events().last(), Some(&Notification::Failed));
    }

    #[test]
    fn test_output_file_names() {
        let h = harness(SuffixTranslator::new("(ja)"), "deck.pptx", b"");
        assert_eq!(h.workflow.output_file_name(Path::new("/in/Q3 Review.pptx")).unwrap(), "translated_Q3 Review.pptx");
        assert_eq!(h.workflow.output_file_name(Path::new("/in/legacy.ppt")).unwrap(), "translated_legacy.pptx");
    }

    #[tokio::test]
    async fn test_directory_keeps_originals() {
        let h = harness(SuffixTranslator::new("(ja)"), "unused.txt", b"");
        let decks = h._temp.path().join("decks");
        std::fs::create_dir_all(decks.join("nested")).unwrap();
        std::fs::write(decks.join("a.pptx"), two_slide_deck()).unwrap();
        std::fs::write(decks.join("nested/b.pptx"), two_slide_deck()).unwrap();
        std::fs::write(decks.join("readme.md"), b"# decks").unwrap();

        let outputs = h
            .workflow
            .translate_directory(&decks, Language::English, Language::Japanese)
            .await
            .unwrap();

        assert_eq!(outputs.len(), 2);
        assert!(decks.join("a.pptx").exists());
        assert!(decks.join("nested/b.pptx").exists());
    }
}
