//! Image copy with raster optimization in production.
//!
//! PNGs go through oxipng with every chunk kept. GIF frames are re-encoded
//! from their palette indices. JPEGs are re-encoded as progressive with
//! optimized Huffman tables, carrying over their APPn segments (EXIF, ICC).
//! An optimized file is only written when it is smaller than the source.

use super::{copy_output, write_output, Task, TaskError, TaskOutput};
use crate::build::context::BuildMode;
use crate::build::discovery::{DiscoveryError, GlobGroup};
use image::DynamicImage;
use std::fs;
use std::path::{Path, PathBuf};

const JPEG_QUALITY: u8 = 100;
const SOS: u8 = 0xDA;

/// Raster formats optimized in production.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Raster {
    Png,
    Jpeg,
    Gif,
}

impl Raster {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(Raster::Png),
            "jpg" | "jpeg" => Some(Raster::Jpeg),
            "gif" => Some(Raster::Gif),
            _ => None,
        }
    }

    fn optimize(self, original: &[u8]) -> Result<Vec<u8>, String> {
        match self {
            Raster::Png => optimize_png(original),
            Raster::Jpeg => optimize_jpeg(original),
            Raster::Gif => optimize_gif(original),
        }
    }
}

/// Copies images into the output, optimizing rasters in production.
#[derive(Debug, Clone)]
pub struct ImagePipeline {
    root: PathBuf,
    sources: GlobGroup,
    out_dir: PathBuf,
    mode: BuildMode,
}

impl ImagePipeline {
    pub fn new<S: AsRef<str>>(
        root: PathBuf,
        globs: &[S],
        out_dir: PathBuf,
        mode: BuildMode,
    ) -> Result<Self, DiscoveryError> {
        Ok(Self { root, sources: GlobGroup::new(globs)?, out_dir, mode })
    }
}

fn optimize_png(original: &[u8]) -> Result<Vec<u8>, String> {
    let mut options = oxipng::Options::from_preset(4);
    options.strip = oxipng::StripChunks::None;
    oxipng::optimize_from_memory(original, &options).map_err(|e| e.to_string())
}

/// Re-encode every frame from its palette indices, keeping palettes,
/// delays, disposal and the loop count.
fn optimize_gif(original: &[u8]) -> Result<Vec<u8>, String> {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::Indexed);
    let mut decoder = options.read_info(original).map_err(|e| e.to_string())?;

    let global = decoder.global_palette().map(<[u8]>::to_vec).unwrap_or_default();
    let (width, height) = (decoder.width(), decoder.height());
    let repeat = decoder.repeat();

    let mut out = Vec::new();
    {
        let mut encoder =
            gif::Encoder::new(&mut out, width, height, &global).map_err(|e| e.to_string())?;
        encoder.set_repeat(repeat).map_err(|e| e.to_string())?;
        while let Some(frame) = decoder.read_next_frame().map_err(|e| e.to_string())? {
            encoder.write_frame(frame).map_err(|e| e.to_string())?;
        }
    }
    Ok(out)
}

/// APPn segments (other than the JFIF header) before the first scan.
fn app_segments(jpeg: &[u8]) -> Vec<(u8, &[u8])> {
    let mut segments = Vec::new();
    if !jpeg.starts_with(&[0xFF, 0xD8]) {
        return segments;
    }

    let mut pos = 2;
    while pos + 4 <= jpeg.len() && jpeg[pos] == 0xFF {
        let marker = jpeg[pos + 1];
        if marker == SOS {
            break;
        }
        let len = u16::from_be_bytes([jpeg[pos + 2], jpeg[pos + 3]]) as usize;
        let end = pos + 2 + len;
        if len < 2 || end > jpeg.len() {
            break;
        }
        if (0xE1..=0xEF).contains(&marker) {
            segments.push((marker - 0xE0, &jpeg[pos + 4..end]));
        }
        pos = end;
    }
    segments
}

fn optimize_jpeg(original: &[u8]) -> Result<Vec<u8>, String> {
    let img = image::load_from_memory_with_format(original, image::ImageFormat::Jpeg)
        .map_err(|e| e.to_string())?;
    let width = u16::try_from(img.width()).map_err(|_| "image too wide".to_string())?;
    let height = u16::try_from(img.height()).map_err(|_| "image too tall".to_string())?;

    let mut out = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut out, JPEG_QUALITY);
    encoder.set_progressive(true);
    encoder.set_optimized_huffman_tables(true);
    for (number, data) in app_segments(original) {
        encoder.add_app_segment(number, data).map_err(|e| e.to_string())?;
    }

    let encoded = match img {
        DynamicImage::ImageLuma8(gray) => {
            encoder.encode(gray.as_raw(), width, height, jpeg_encoder::ColorType::Luma)
        }
        other => {
            encoder.encode(other.to_rgb8().as_raw(), width, height, jpeg_encoder::ColorType::Rgb)
        }
    };
    encoded.map_err(|e| e.to_string())?;
    Ok(out)
}

impl Task for ImagePipeline {
    fn name(&self) -> &str {
        "images"
    }

    fn run(&self) -> Result<TaskOutput, TaskError> {
        let mut outputs = Vec::new();
        let mut warnings = Vec::new();

        for file in self.sources.discover(&self.root)? {
            let target = self.out_dir.join(&file.relative);
            let raster = Raster::from_path(&file.path).filter(|_| self.mode.is_production());

            let Some(raster) = raster else {
                copy_output(&file.path, &target)?;
                outputs.push(target);
                continue;
            };

            let original = fs::read(&file.path).map_err(TaskError::io(&file.path))?;
            match raster.optimize(&original) {
                Ok(smaller) if smaller.len() < original.len() => {
                    tracing::trace!(
                        file = %file.relative.display(),
                        before = original.len(),
                        after = smaller.len(),
                        "optimized image"
                    );
                    write_output(&target, smaller)?;
                }
                Ok(_) => write_output(&target, &original)?,
                Err(e) => {
                    let message = format!("{}: {}", file.relative.display(), e);
                    tracing::warn!("could not optimize image, copying as-is: {}", message);
                    warnings.push(message);
                    write_output(&target, &original)?;
                }
            }
            outputs.push(target);
        }

        tracing::debug!(files = outputs.len(), mode = %self.mode, "processed images");
        Ok(TaskOutput { outputs, warnings })
    }
}
