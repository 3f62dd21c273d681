//! Chart raster surfaces.
//!
//! The detector only needs random pixel access, expressed by
//! [`RasterSurface`]. [`ChartRaster`] is the owned surface the session works
//! with: RGB pixels plus a [`RasterId`] so classification results can be tied
//! to the exact raster they were computed against.
//!
//! With the `decode` feature, PNG and JPEG chart files are decoded through the
//! `image` crate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use imgref::{ImgRef, ImgVec};
use rgb::{RGB8, RGBA8};
use serde::{Deserialize, Serialize};

use crate::chart::ChartId;
use crate::error::{Error, Result};

/// Random-access RGB pixel surface.
pub trait RasterSurface {
    fn width(&self) -> usize;
    fn height(&self) -> usize;

    /// Pixel at column `x`, row `y`. Callers stay within bounds.
    fn pixel_at(&self, x: usize, y: usize) -> RGB8;
}

impl RasterSurface for ImgVec<RGB8> {
    fn width(&self) -> usize {
        ImgVec::width(self)
    }

    fn height(&self) -> usize {
        ImgVec::height(self)
    }

    fn pixel_at(&self, x: usize, y: usize) -> RGB8 {
        self.buf()[y * self.stride() + x]
    }
}

impl RasterSurface for ImgRef<'_, RGB8> {
    fn width(&self) -> usize {
        ImgRef::width(self)
    }

    fn height(&self) -> usize {
        ImgRef::height(self)
    }

    fn pixel_at(&self, x: usize, y: usize) -> RGB8 {
        self.buf()[y * self.stride() + x]
    }
}

/// Identity of a loaded raster.
///
/// FNV-1a digest of the chart id, dimensions and pixels, so reloading the
/// same file yields the same id and any change to the pixels yields another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RasterId(u64);

impl RasterId {
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RasterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a(mut hash: u64, bytes: &[u8]) -> u64 {
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn raster_id(chart: &ChartId, pixels: &ImgVec<RGB8>) -> RasterId {
    let mut hash = fnv1a(FNV_OFFSET, chart.as_str().as_bytes());
    hash = fnv1a(hash, &(pixels.width() as u64).to_le_bytes());
    hash = fnv1a(hash, &(pixels.height() as u64).to_le_bytes());
    for row in pixels.rows() {
        for p in row {
            hash = fnv1a(hash, &[p.r, p.g, p.b]);
        }
    }
    RasterId(hash)
}

/// A decoded chart page.
#[derive(Debug, Clone)]
pub struct ChartRaster {
    id: RasterId,
    chart: ChartId,
    pixels: ImgVec<RGB8>,
}

impl ChartRaster {
    /// Wrap decoded RGB pixels.
    #[must_use]
    pub fn new(chart: ChartId, pixels: ImgVec<RGB8>) -> Self {
        let id = raster_id(&chart, &pixels);
        Self { id, chart, pixels }
    }

    /// Build from tightly packed RGB8 bytes in row-major order.
    pub fn from_rgb_slice(chart: ChartId, data: &[u8], width: usize, height: usize) -> Result<Self> {
        check_len(data.len(), width, height, 3)?;
        let pixels: Vec<RGB8> = data
            .chunks_exact(3)
            .map(|c| RGB8::new(c[0], c[1], c[2]))
            .collect();
        Ok(Self::new(chart, ImgVec::new(pixels, width, height)))
    }

    /// Build from tightly packed RGBA8 bytes, dropping alpha.
    pub fn from_rgba_slice(chart: ChartId, data: &[u8], width: usize, height: usize) -> Result<Self> {
        check_len(data.len(), width, height, 4)?;
        let pixels: Vec<RGB8> = data
            .chunks_exact(4)
            .map(|c| RGBA8::new(c[0], c[1], c[2], c[3]).rgb())
            .collect();
        Ok(Self::new(chart, ImgVec::new(pixels, width, height)))
    }

    #[must_use]
    pub fn id(&self) -> RasterId {
        self.id
    }

    #[must_use]
    pub fn chart(&self) -> &ChartId {
        &self.chart
    }

    #[must_use]
    pub fn pixels(&self) -> ImgRef<'_, RGB8> {
        self.pixels.as_ref()
    }

    /// Decode PNG or JPEG bytes.
    #[cfg(feature = "decode")]
    pub fn decode(chart: ChartId, bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes).map_err(|e| Error::RasterLoad {
            path: PathBuf::from(chart.as_str()),
            reason: e.to_string(),
        })?;
        Ok(Self::from_dynamic(chart, &image))
    }

    /// Decode a PNG or JPEG file.
    #[cfg(feature = "decode")]
    pub fn open(path: impl AsRef<Path>, chart: ChartId) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|e| Error::RasterLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_dynamic(chart, &image))
    }

    #[cfg(feature = "decode")]
    fn from_dynamic(chart: ChartId, image: &image::DynamicImage) -> Self {
        let rgb = image.to_rgb8();
        let width = rgb.width() as usize;
        let height = rgb.height() as usize;
        let pixels: Vec<RGB8> = rgb
            .into_raw()
            .chunks_exact(3)
            .map(|c| RGB8::new(c[0], c[1], c[2]))
            .collect();
        Self::new(chart, ImgVec::new(pixels, width, height))
    }
}

fn check_len(len: usize, width: usize, height: usize, channels: usize) -> Result<()> {
    let expected = width * height * channels;
    if len != expected {
        return Err(Error::DimensionMismatch {
            expected: (width, height, expected),
            actual: len,
        });
    }
    Ok(())
}

impl RasterSurface for ChartRaster {
    fn width(&self) -> usize {
        self.pixels.width()
    }

    fn height(&self) -> usize {
        self.pixels.height()
    }

    fn pixel_at(&self, x: usize, y: usize) -> RGB8 {
        self.pixels.pixel_at(x, y)
    }
}

/// Supplies the raster for a chart.
pub trait RasterSource {
    fn load(&self, chart: &ChartId) -> Result<ChartRaster>;
}

/// Rasters held in memory, keyed by chart.
#[derive(Debug, Clone, Default)]
pub struct MemoryRasterSource {
    rasters: HashMap<ChartId, ChartRaster>,
}

impl MemoryRasterSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, raster: ChartRaster) {
        self.rasters.insert(raster.chart().clone(), raster);
    }
}

impl RasterSource for MemoryRasterSource {
    fn load(&self, chart: &ChartId) -> Result<ChartRaster> {
        self.rasters.get(chart).cloned().ok_or_else(|| Error::RasterLoad {
            path: PathBuf::from(chart.as_str()),
            reason: "no raster registered for chart".to_string(),
        })
    }
}

/// Loads chart rasters from files in a directory.
///
/// Chart documents with a raster alias load the aliased image, and the
/// returned raster carries the alias id so calibrations keyed on the raster
/// apply.
#[cfg(feature = "decode")]
#[derive(Debug, Clone)]
pub struct DirectoryRasterSource {
    root: PathBuf,
}

#[cfg(feature = "decode")]
impl DirectoryRasterSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(feature = "decode")]
impl RasterSource for DirectoryRasterSource {
    fn load(&self, chart: &ChartId) -> Result<ChartRaster> {
        let target = crate::chart::resolve_raster_alias(chart);
        if !target.is_raster() {
            return Err(Error::UnsupportedFormat(format!(
                "{chart} has no raster rendering"
            )));
        }
        let path = self.root.join(target.as_str());
        tracing::debug!(chart = %chart, path = %path.display(), "loading chart raster");
        ChartRaster::open(&path, target)
    }
}
