//! PDF optimization
//!
//! The document is loaded (and decrypted) by lopdf, run through a chain of
//! passes and serialized again by [`crate::writer`]:
//!
//! 1. unreachable objects and stale xref containers are pruned
//! 2. placed images are downsampled/recompressed (only when asked for)
//! 3. unfiltered streams are Flate-compressed
//! 4. identical streams are merged
//! 5. identical indirect objects are merged
//! 6. repeated direct dictionaries become shared indirect objects
//! 7. small objects are packed into object streams on write

mod dedup;
mod images;
mod placement;

use std::path::Path;
use std::time::Instant;

use lopdf::{Document, Object};
use serde::Serialize;

use crate::document::{file_len, open_document, open_document_bytes};
use crate::error::PdfOpsError;
use crate::safe_write::{same_file, write_bytes_atomic};
use crate::writer::{serialize_document, WriteOptions};

/// Image tunables of the optimizer
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeOpts {
    /// JPEG quality of recompressed images, 1-100. 100 leaves images alone.
    pub image_quality: u8,
    /// Maximum pixels per inch; denser images are downsampled
    pub image_ppi: Option<f64>,
}

impl Default for OptimizeOpts {
    fn default() -> Self {
        Self {
            image_quality: 100,
            image_ppi: None,
        }
    }
}

/// Full optimizer configuration
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeOptions {
    pub combine_duplicate_direct_objects: bool,
    pub combine_identical_indirect_objects: bool,
    pub combine_duplicate_streams: bool,
    pub compress_streams: bool,
    pub use_object_streams: bool,
    pub objects_per_stream: usize,
    pub image_quality: u8,
    pub image_ppi: Option<f64>,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            combine_duplicate_direct_objects: true,
            combine_identical_indirect_objects: true,
            combine_duplicate_streams: true,
            compress_streams: true,
            use_object_streams: true,
            objects_per_stream: WriteOptions::default().objects_per_stream,
            image_quality: 100,
            image_ppi: None,
        }
    }
}

impl From<&OptimizeOpts> for OptimizeOptions {
    fn from(opts: &OptimizeOpts) -> Self {
        Self {
            image_quality: opts.image_quality,
            image_ppi: opts.image_ppi,
            ..Self::default()
        }
    }
}

impl OptimizeOptions {
    pub fn validate(&self) -> Result<(), PdfOpsError> {
        if !(1..=100).contains(&self.image_quality) {
            return Err(PdfOpsError::InvalidOption(format!(
                "image quality must be between 1 and 100, got {}",
                self.image_quality
            )));
        }
        if let Some(ppi) = self.image_ppi {
            if !ppi.is_finite() || ppi <= 0.0 {
                return Err(PdfOpsError::InvalidOption(format!(
                    "image PPI must be a positive number, got {}",
                    ppi
                )));
            }
        }
        if self.objects_per_stream == 0 {
            return Err(PdfOpsError::InvalidOption(
                "objects per stream must be at least 1".into(),
            ));
        }
        Ok(())
    }

    fn touches_images(&self) -> bool {
        self.image_quality < 100 || self.image_ppi.is_some()
    }

    fn write_options(&self) -> WriteOptions {
        WriteOptions {
            use_object_streams: self.use_object_streams,
            objects_per_stream: self.objects_per_stream,
        }
    }
}

/// What an optimization run did
#[derive(Debug, Clone, Default, Serialize)]
pub struct OptimizeReport {
    pub input_size_bytes: u64,
    pub output_size_bytes: u64,
    pub objects_before: usize,
    pub objects_after: usize,
    pub images_recompressed: usize,
    pub duplicates_removed: usize,
    pub shared_dictionaries: usize,
    pub processing_time_ms: u64,
}

impl OptimizeReport {
    /// Output size relative to input size, in percent
    pub fn ratio_percent(&self) -> f64 {
        if self.input_size_bytes == 0 {
            return 100.0;
        }
        self.output_size_bytes as f64 * 100.0 / self.input_size_bytes as f64
    }
}

/// Optimize the PDF at `input` and write the result to `output`.
///
/// `password` unlocks an encrypted input; the optimized file is written
/// unencrypted. `None` options mean image quality 100 and no PPI limit.
pub fn optimize(
    input: &Path,
    output: &Path,
    password: &str,
    opts: Option<&OptimizeOpts>,
) -> Result<OptimizeReport, PdfOpsError> {
    let options = opts.map(OptimizeOptions::from).unwrap_or_default();
    optimize_with_options(input, output, password, &options)
}

/// [`optimize`] with every pass configurable
pub fn optimize_with_options(
    input: &Path,
    output: &Path,
    password: &str,
    options: &OptimizeOptions,
) -> Result<OptimizeReport, PdfOpsError> {
    options.validate()?;
    let started = Instant::now();
    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        in_place = same_file(input, output),
        "optimizing"
    );

    let (mut doc, original) = open_document(input, password)?;
    let mut report = run_passes(&mut doc, options);
    let optimized = serialize_document(&doc, &options.write_options())?;

    write_bytes_atomic(output, &optimized)?;

    report.input_size_bytes = original.len() as u64;
    report.output_size_bytes = file_len(output);
    report.processing_time_ms = started.elapsed().as_millis() as u64;
    Ok(report)
}

/// In-memory optimization, returning the new file and the report
pub fn optimize_bytes(
    bytes: &[u8],
    password: &str,
    options: &OptimizeOptions,
) -> Result<(Vec<u8>, OptimizeReport), PdfOpsError> {
    options.validate()?;
    let started = Instant::now();

    let mut doc = open_document_bytes(bytes, password)?;
    let mut report = run_passes(&mut doc, options);
    let optimized = serialize_document(&doc, &options.write_options())?;

    report.input_size_bytes = bytes.len() as u64;
    report.output_size_bytes = optimized.len() as u64;
    report.processing_time_ms = started.elapsed().as_millis() as u64;
    Ok((optimized, report))
}

fn run_passes(doc: &mut Document, options: &OptimizeOptions) -> OptimizeReport {
    let mut report = OptimizeReport {
        objects_before: doc.objects.len(),
        ..OptimizeReport::default()
    };

    inline_stream_lengths(doc);
    doc.prune_objects();
    tracing::debug!(objects = doc.objects.len(), "pruned unreachable objects");

    if options.touches_images() {
        let placements = placement::scan_image_ppi(doc);
        report.images_recompressed = images::optimize_images(
            doc,
            &placements,
            options.image_quality,
            options.image_ppi,
        );
        tracing::debug!(
            placed = placements.len(),
            recompressed = report.images_recompressed,
            "image pass done"
        );
    }

    if options.compress_streams {
        doc.compress();
    }

    if options.combine_duplicate_streams {
        let removed = dedup::combine_duplicate_streams(doc);
        tracing::debug!(removed, "duplicate streams merged");
        report.duplicates_removed += removed;
    }

    if options.combine_identical_indirect_objects {
        let removed = dedup::combine_identical_indirect_objects(doc);
        tracing::debug!(removed, "identical objects merged");
        report.duplicates_removed += removed;
    }

    if options.combine_duplicate_direct_objects {
        report.shared_dictionaries = dedup::combine_duplicate_direct_objects(doc);
        tracing::debug!(shared = report.shared_dictionaries, "direct dictionaries shared");
    }

    report.objects_after = doc.objects.len();
    report
}

/// Indirect `/Length` values would otherwise survive as orphaned integers;
/// the writer recomputes lengths from the data anyway
fn inline_stream_lengths(doc: &mut Document) {
    for object in doc.objects.values_mut() {
        if let Object::Stream(stream) = object {
            if let Ok(Object::Reference(_)) = stream.dict.get(b"Length") {
                let length = stream.content.len() as i64;
                stream.dict.set("Length", Object::Integer(length));
            }
        }
    }
}
