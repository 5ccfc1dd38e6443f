use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use crate::error::{DeckError, Result};
use crate::language::Language;
use crate::pptx::{Shape, TextFrame, MAX_GROUP_DEPTH};
use crate::style::{apply_frame, apply_paragraph, apply_run, capture_frame, capture_paragraph, capture_run};
use crate::translate::TextTranslator;

type WalkFuture<'a> = Pin<Box<dyn Future<Output = Result<WalkStats>> + Send + 'a>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Text frames that went through a rebuild
    pub frames: usize,
    pub runs_translated: usize,
    pub runs_skipped: usize,
}

impl WalkStats {
    fn merge(&mut self, other: WalkStats) {
        self.frames += other.frames;
        self.runs_translated += other.runs_translated;
        self.runs_skipped += other.runs_skipped;
    }
}

/// Translates the text of a shape tree in place, run by run, keeping formatting.
pub struct ShapeWalker {
    translator: Arc<dyn TextTranslator>,
}

impl ShapeWalker {
    pub fn new(translator: Arc<dyn TextTranslator>) -> Self {
        Self { translator }
    }

    pub async fn walk_all(&self, shapes: &mut [Shape], source: Language, target: Language) -> Result<WalkStats> {
        let mut stats = WalkStats::default();
        for shape in shapes.iter_mut() {
            stats.merge(self.walk(shape, source, target, 0).await?);
        }
        Ok(stats)
    }

    /// Groups recurse in child order; the group itself carries no text.
    pub fn walk<'a>(&'a self, shape: &'a mut Shape, source: Language, target: Language, depth: usize) -> WalkFuture<'a> {
        Box::pin(async move {
            match shape {
                Shape::Group(group) => {
                    if depth >= MAX_GROUP_DEPTH {
                        return Err(DeckError::ShapeDepthExceeded(MAX_GROUP_DEPTH));
                    }
                    let mut stats = WalkStats::default();
                    for child in group.shapes_mut() {
                        stats.merge(self.walk(child, source, target, depth + 1).await?);
                    }
                    Ok(stats)
                }
                Shape::Text(text) => self.translate_frame(text.text_frame_mut(), source, target).await,
                Shape::Other(_) => Ok(WalkStats::default()),
            }
        })
    }

    async fn translate_frame(&self, frame: &mut TextFrame, source: Language, target: Language) -> Result<WalkStats> {
        let mut stats = WalkStats::default();
        if frame.text().trim().is_empty() {
            return Ok(stats);
        }
        stats.frames = 1;

        let frame_style = capture_frame(frame);
        for paragraph in frame.paragraphs_mut() {
            let paragraph_style = capture_paragraph(paragraph);
            let captured: Vec<_> = paragraph.runs().iter().map(|run| (capture_run(run), run.text())).collect();

            let mut rebuilt = Vec::with_capacity(captured.len());
            for (style, text) in captured {
                let translated = if text.trim().is_empty() {
                    stats.runs_skipped += 1;
                    text
                } else {
                    stats.runs_translated += 1;
                    self.translator.translate(&text, source, target).await?
                };
                rebuilt.push((style, translated));
            }

            paragraph.clear_runs();
            for (style, text) in &rebuilt {
                let run = paragraph.add_run();
                run.set_text(text);
                apply_run(run, style);
            }
            apply_paragraph(paragraph, &paragraph_style);
        }
        apply_frame(frame, &frame_style);

        debug!(
            "Rebuilt text frame: {} runs translated, {} passed through",
            stats.runs_translated, stats.runs_skipped
        );
        Ok(stats)
    }
}
