//! Image recompression and downsampling

use std::collections::BTreeMap;
use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, GrayImage, ImageEncoder, ImageFormat, RgbImage};
use lopdf::{Document, Object, ObjectId, Stream};

use super::placement::number;

/// How the samples of an eligible image are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Jpeg,
    Flate,
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Components {
    Gray,
    Rgb,
}

impl Components {
    fn count(self) -> usize {
        match self {
            Components::Gray => 1,
            Components::Rgb => 3,
        }
    }

    fn color_type(self) -> ExtendedColorType {
        match self {
            Components::Gray => ExtendedColorType::L8,
            Components::Rgb => ExtendedColorType::Rgb8,
        }
    }
}

/// An image XObject we know how to decode
#[derive(Debug)]
struct Candidate {
    width: u32,
    height: u32,
    components: Components,
    encoding: Encoding,
}

/// Recompress every placed image according to `quality` and `max_ppi`.
///
/// `placements` maps image ids to their highest effective PPI. Only images in
/// that map are touched, and only when the result is smaller than the
/// original. Returns the number of replaced images.
pub(crate) fn optimize_images(
    doc: &mut Document,
    placements: &BTreeMap<ObjectId, f64>,
    quality: u8,
    max_ppi: Option<f64>,
) -> usize {
    let mut replaced = 0;

    for (id, ppi) in placements {
        let Some(Object::Stream(stream)) = doc.objects.get_mut(id) else {
            continue;
        };
        let Some(candidate) = inspect(stream) else {
            tracing::debug!(?id, "image not eligible for recompression");
            continue;
        };

        let scale = match max_ppi {
            Some(max_ppi) if *ppi > max_ppi => max_ppi / ppi,
            _ => 1.0,
        };
        if scale >= 1.0 && quality >= 100 {
            continue;
        }

        match recompress(stream, &candidate, scale, quality) {
            Ok(true) => {
                tracing::debug!(?id, ppi, scale, "image recompressed");
                replaced += 1;
            }
            Ok(false) => tracing::debug!(?id, "recompressed image not smaller, kept original"),
            Err(reason) => tracing::warn!(?id, "skipping image: {}", reason),
        }
    }

    replaced
}

/// Decide whether the samples of `stream` can be decoded and re-encoded
/// without changing their meaning
fn inspect(stream: &Stream) -> Option<Candidate> {
    let dict = &stream.dict;

    if !matches!(dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Image") {
        return None;
    }
    if matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)))
        || dict.has(b"Decode")
        || matches!(dict.get(b"Mask"), Ok(Object::Array(_)))
    {
        return None;
    }
    if dict.get(b"BitsPerComponent").ok().and_then(number) != Some(8.0) {
        return None;
    }

    let components = match dict.get(b"ColorSpace") {
        Ok(Object::Name(name)) if name == b"DeviceGray" => Components::Gray,
        Ok(Object::Name(name)) if name == b"DeviceRGB" => Components::Rgb,
        _ => return None,
    };

    let filter = match dict.get(b"Filter") {
        Err(_) => None,
        Ok(Object::Name(name)) => Some(name.as_slice()),
        Ok(Object::Array(filters)) if filters.len() == 1 => match &filters[0] {
            Object::Name(name) => Some(name.as_slice()),
            _ => return None,
        },
        Ok(_) => return None,
    };
    let encoding = match filter {
        None => Encoding::Raw,
        Some(b"DCTDecode") => Encoding::Jpeg,
        Some(b"FlateDecode") if !has_predictor(stream) => Encoding::Flate,
        Some(_) => return None,
    };

    let width = dict.get(b"Width").ok().and_then(number)?;
    let height = dict.get(b"Height").ok().and_then(number)?;
    if width < 1.0 || height < 1.0 {
        return None;
    }

    Some(Candidate {
        width: width as u32,
        height: height as u32,
        components,
        encoding,
    })
}

fn has_predictor(stream: &Stream) -> bool {
    let params = match stream.dict.get(b"DecodeParms") {
        Ok(Object::Dictionary(params)) => params,
        Ok(Object::Array(params)) => match params.first() {
            Some(Object::Dictionary(params)) => params,
            _ => return false,
        },
        _ => return false,
    };
    params
        .get(b"Predictor")
        .ok()
        .and_then(number)
        .is_some_and(|predictor| predictor > 1.0)
}

/// Replace the samples of `stream` when the new encoding is smaller
fn recompress(
    stream: &mut Stream,
    candidate: &Candidate,
    scale: f64,
    quality: u8,
) -> Result<bool, String> {
    let decoded = decode(stream, candidate)?;

    let resized = if scale < 1.0 {
        let width = ((candidate.width as f64 * scale).round() as u32).max(1);
        let height = ((candidate.height as f64 * scale).round() as u32).max(1);
        decoded.resize_exact(width, height, FilterType::Lanczos3)
    } else {
        decoded
    };
    let (width, height) = (resized.width(), resized.height());

    // Lossless sources stay lossless unless a lower quality was asked for
    let use_jpeg = quality < 100 || candidate.encoding == Encoding::Jpeg;
    let (data, filter) = if use_jpeg {
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, quality)
            .write_image(
                resized.as_bytes(),
                width,
                height,
                candidate.components.color_type(),
            )
            .map_err(|e| format!("JPEG encoding failed: {}", e))?;
        (buffer, "DCTDecode")
    } else {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder
            .write_all(resized.as_bytes())
            .map_err(|e| e.to_string())?;
        (encoder.finish().map_err(|e| e.to_string())?, "FlateDecode")
    };

    if data.len() >= stream.content.len() {
        return Ok(false);
    }

    stream.dict.set("Width", Object::Integer(width as i64));
    stream.dict.set("Height", Object::Integer(height as i64));
    stream.dict.set("BitsPerComponent", Object::Integer(8));
    stream.dict.set("Filter", Object::Name(filter.as_bytes().to_vec()));
    stream.dict.remove(b"DecodeParms");
    stream.set_content(data);
    Ok(true)
}

fn decode(stream: &Stream, candidate: &Candidate) -> Result<DynamicImage, String> {
    let image = match candidate.encoding {
        Encoding::Jpeg => {
            let image = image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
                .map_err(|e| format!("JPEG decoding failed: {}", e))?;
            match (candidate.components, image) {
                (Components::Gray, image @ DynamicImage::ImageLuma8(_)) => image,
                (Components::Rgb, image @ DynamicImage::ImageRgb8(_)) => image,
                _ => return Err("JPEG color type does not match its color space".into()),
            }
        }
        Encoding::Flate | Encoding::Raw => {
            let samples = if candidate.encoding == Encoding::Flate {
                let mut samples = Vec::new();
                ZlibDecoder::new(stream.content.as_slice())
                    .read_to_end(&mut samples)
                    .map_err(|e| format!("Flate decoding failed: {}", e))?;
                samples
            } else {
                stream.content.clone()
            };

            let expected = (candidate.width as usize)
                .checked_mul(candidate.height as usize)
                .and_then(|pixels| pixels.checked_mul(candidate.components.count()))
                .ok_or_else(|| "image too large".to_string())?;
            if samples.len() < expected {
                return Err(format!(
                    "expected {} sample bytes, found {}",
                    expected,
                    samples.len()
                ));
            }
            let mut samples = samples;
            samples.truncate(expected);

            match candidate.components {
                Components::Gray => GrayImage::from_raw(candidate.width, candidate.height, samples)
                    .map(DynamicImage::ImageLuma8),
                Components::Rgb => RgbImage::from_raw(candidate.width, candidate.height, samples)
                    .map(DynamicImage::ImageRgb8),
            }
            .ok_or_else(|| "sample buffer does not match image size".to_string())?
        }
    };

    if image.width() != candidate.width || image.height() != candidate.height {
        return Err("decoded size does not match /Width and /Height".into());
    }
    Ok(image)
}
