// Request pipeline: load -> transform -> assemble -> (compress) -> deliver

use std::fmt;

use crate::compress::{Compressor, GhostscriptCompressor};
use crate::config::request::{CompressionProfile, ResizeRequest};
use crate::config::settings::Settings;
use crate::pdf::reader;
use crate::pdf::writer::PageWriter;
use crate::pipeline::page_processor::{TransformOptions, transform_document};
use crate::render::{self, PageRasterizer};

/// Stages a request moves through, strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Loaded,
    Transformed,
    Assembled,
    Compressed,
    Delivered,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Loaded => "loaded",
            Stage::Transformed => "transformed",
            Stage::Assembled => "assembled",
            Stage::Compressed => "compressed",
            Stage::Delivered => "delivered",
        };
        f.write_str(name)
    }
}

/// Result of a successful request.
#[derive(Debug, Clone)]
pub struct ResizeOutput {
    pub pdf: Vec<u8>,
    pub page_count: usize,
    /// Whether the compression stage ran.
    pub compressed: bool,
}

/// File name used when a document is delivered into a directory.
pub const OUTPUT_FILE_NAME: &str = "resized.pdf";

/// Runs resize requests. Holds configuration only; nothing is kept between
/// calls, so one instance can serve concurrent requests.
pub struct Pipeline {
    settings: Settings,
    rasterizer: Box<dyn PageRasterizer>,
    compressor: Box<dyn Compressor>,
}

impl Pipeline {
    /// Pipeline with the pdfium rasterizer and the Ghostscript compressor.
    pub fn new(settings: Settings) -> Self {
        let rasterizer = render::default_rasterizer(&settings);
        let compressor = Box::new(GhostscriptCompressor::from_settings(&settings.compression));
        Self {
            settings,
            rasterizer,
            compressor,
        }
    }

    pub fn with_rasterizer(mut self, rasterizer: Box<dyn PageRasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn with_compressor(mut self, compressor: Box<dyn Compressor>) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Runs one request through every stage.
    ///
    /// The first failure ends the request; its error is returned unchanged
    /// and no partial document is produced.
    pub fn run(&self, request: &ResizeRequest) -> crate::error::Result<ResizeOutput> {
        let mut stage = Stage::Received;
        let result = self.run_stages(request, &mut stage);

        match &result {
            Ok(output) => tracing::info!(
                pages = output.page_count,
                bytes = output.pdf.len(),
                compressed = output.compressed,
                "request delivered"
            ),
            Err(e) => tracing::warn!(
                stage = %stage,
                kind = ?e.kind(),
                error = %e,
                "request failed"
            ),
        }
        result
    }

    fn run_stages(
        &self,
        request: &ResizeRequest,
        stage: &mut Stage,
    ) -> crate::error::Result<ResizeOutput> {
        tracing::debug!(
            bytes = request.pdf.len(),
            scale = %request.scale,
            compression = %request.compression,
            strategy = %self.settings.strategy,
            "request received"
        );

        let document = reader::load(&request.pdf, self.settings.max_input_bytes)?;
        let page_count = document.page_count();
        advance(stage, Stage::Loaded);

        let options = TransformOptions {
            strategy: self.settings.strategy,
            max_raster_pixels: self.settings.max_raster_pixels,
        };
        let transformed =
            transform_document(document, request.scale, &options, self.rasterizer.as_ref())?;
        advance(stage, Stage::Transformed);

        let writer = PageWriter::assemble(&transformed)?;
        let assembled = writer.save_to_bytes()?;
        advance(stage, Stage::Assembled);

        let (pdf, compressed) = match request.compression {
            CompressionProfile::None => (assembled, false),
            profile => {
                let pdf = self.compressor.compress(&assembled, profile)?;
                advance(stage, Stage::Compressed);
                (pdf, true)
            }
        };

        advance(stage, Stage::Delivered);
        Ok(ResizeOutput {
            pdf,
            page_count,
            compressed,
        })
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    tracing::debug!(from = %stage, to = %next, "pipeline stage");
    *stage = next;
}
