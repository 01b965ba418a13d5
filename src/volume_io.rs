//! Volume loading and saving.
//!
//! Supported inputs:
//! - NIfTI-1 single files (`.nii`, `.nii.gz`)
//! - multi-page TIFF stacks (`.tif`, `.tiff`)
//! - single 2D images (`.png`, `.bmp`, `.jpg`, `.jpeg`)
//! - directories of 2D slices (image series)
//!
//! Raw voxel values are decoded to `u32` so that ID annotation volumes keep
//! their region ids. Analysis volumes go through [`binary_check`] and are
//! reduced to a 0/1 [`Volume`].

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use image::GenericImageView;
use tiff::decoder::{Decoder, DecodingResult};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::volume::{Grid, Resolution, Volume};

/// File extensions accepted as analysis volumes.
pub const VOLUME_EXTENSIONS: &[&str] = &["nii", "gz", "tif", "tiff", "png", "bmp", "jpg", "jpeg"];

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Load a volume with its raw voxel values.
pub fn load_raw(path: &Path) -> Result<Grid<u32>> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let grid = if name.ends_with(".nii") || name.ends_with(".nii.gz") {
        read_nifti(path)?
    } else if name.ends_with(".tif") || name.ends_with(".tiff") {
        read_tiff_stack(path)?
    } else if [".png", ".bmp", ".jpg", ".jpeg"]
        .iter()
        .any(|ext| name.ends_with(ext))
    {
        read_image_plane(path)?
    } else {
        return Err(Error::UnsupportedFormat(path.display().to_string()));
    };
    debug!(
        "Loaded '{}' with shape {:?}",
        path.display(),
        grid.image_shape()
    );
    Ok(grid)
}

/// Load an analysis volume. The file must be binary, and the returned volume
/// holds 1 wherever the input was nonzero.
pub fn load_volume(path: &Path) -> Result<Volume> {
    let raw = load_raw(path)?;
    binary_check(&raw)?;
    Ok(raw.map(|v| u8::from(v != 0)))
}

/// Every voxel must be zero or share a single nonzero value.
pub fn binary_check(grid: &Grid<u32>) -> Result<()> {
    let mut seen: Option<u32> = None;
    for &v in &grid.data {
        if v == 0 {
            continue;
        }
        match seen {
            None => seen = Some(v),
            Some(s) if s != v => return Err(Error::NonBinary(s as u64, v as u64)),
            _ => {}
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// NIfTI-1
// ---------------------------------------------------------------------------

const NIFTI_HEADER_SIZE: usize = 348;
const NIFTI_VOX_OFFSET: usize = 352;

fn read_all(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut bytes = Vec::new();
    let is_gz = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    if is_gz {
        GzDecoder::new(BufReader::new(file)).read_to_end(&mut bytes)?;
    } else {
        BufReader::new(file).read_to_end(&mut bytes)?;
    }
    Ok(bytes)
}

struct NiftiHeader {
    big_endian: bool,
    ndim: usize,
    dims: [usize; 3],
    datatype: i16,
    vox_offset: usize,
}

impl NiftiHeader {
    fn parse(path: &Path, bytes: &[u8]) -> Result<Self> {
        if bytes.len() < NIFTI_HEADER_SIZE {
            return Err(Error::volume_load(path, "truncated NIfTI header"));
        }
        let sizeof_hdr = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let big_endian = match sizeof_hdr {
            348 => false,
            v if v.swap_bytes() == 348 => true,
            _ => return Err(Error::volume_load(path, "not a NIfTI-1 file")),
        };
        if &bytes[344..347] != b"n+1" {
            return Err(Error::volume_load(
                path,
                "only single-file NIfTI (n+1) volumes are supported",
            ));
        }

        let i16_at = |off: usize| {
            let b = [bytes[off], bytes[off + 1]];
            if big_endian {
                i16::from_be_bytes(b)
            } else {
                i16::from_le_bytes(b)
            }
        };
        let f32_at = |off: usize| {
            let b = [bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]];
            if big_endian {
                f32::from_be_bytes(b)
            } else {
                f32::from_le_bytes(b)
            }
        };

        let ndim = i16_at(40).max(0) as usize;
        if !(2..=7).contains(&ndim) {
            return Err(Error::volume_load(path, format!("unsupported rank {}", ndim)));
        }
        let dim = |i: usize| -> usize {
            if i <= ndim {
                i16_at(40 + 2 * i).max(1) as usize
            } else {
                1
            }
        };
        Ok(Self {
            big_endian,
            ndim,
            dims: [dim(1), dim(2), dim(3)],
            datatype: i16_at(70),
            vox_offset: f32_at(108).max(NIFTI_HEADER_SIZE as f32) as usize,
        })
    }

    fn bytes_per_voxel(&self) -> Option<usize> {
        match self.datatype {
            2 | 256 => Some(1),
            4 | 512 => Some(2),
            8 | 16 | 768 => Some(4),
            64 => Some(8),
            _ => None,
        }
    }
}

/// Read a single-file NIfTI-1 volume. 4D volumes yield their first 3D frame.
pub fn read_nifti(path: &Path) -> Result<Grid<u32>> {
    let bytes = read_all(path)?;
    let hdr = NiftiHeader::parse(path, &bytes)?;
    let bpv = hdr
        .bytes_per_voxel()
        .ok_or_else(|| Error::volume_load(path, format!("unsupported datatype {}", hdr.datatype)))?;

    let [nx, ny, nz] = hdr.dims;
    let count = nx * ny * nz;
    let end = hdr.vox_offset + count * bpv;
    if bytes.len() < end {
        return Err(Error::volume_load(path, "voxel data shorter than header dimensions"));
    }
    let raw = &bytes[hdr.vox_offset..end];

    let be = hdr.big_endian;
    let data: Vec<u32> = raw
        .chunks_exact(bpv)
        .map(|c| decode_nifti_value(hdr.datatype, c, be))
        .collect();

    // x is the fastest axis on disk, which is exactly (z, y, x) row-major.
    let grid = Grid::from_vec(nz, ny, nx, data).with_planar(hdr.ndim == 2);
    Ok(grid)
}

fn decode_nifti_value(datatype: i16, c: &[u8], be: bool) -> u32 {
    macro_rules! num {
        ($t:ty, $n:expr) => {{
            let mut b = [0u8; $n];
            b.copy_from_slice(c);
            if be {
                <$t>::from_be_bytes(b)
            } else {
                <$t>::from_le_bytes(b)
            }
        }};
    }
    match datatype {
        2 => c[0] as u32,
        256 => (c[0] as i8).max(0) as u32,
        4 => num!(i16, 2).max(0) as u32,
        512 => num!(u16, 2) as u32,
        8 => num!(i32, 4).max(0) as u32,
        768 => num!(u32, 4),
        16 => float_to_u32(num!(f32, 4) as f64),
        64 => float_to_u32(num!(f64, 8)),
        _ => 0,
    }
}

fn float_to_u32(v: f64) -> u32 {
    if v.is_nan() || v <= 0.0 {
        0
    } else {
        v.round().min(u32::MAX as f64) as u32
    }
}

/// Write a u8 NIfTI-1 volume. A `.gz` extension compresses the output.
pub fn save_nifti(path: &Path, volume: &Volume) -> Result<()> {
    let mut header = vec![0u8; NIFTI_VOX_OFFSET];
    header[0..4].copy_from_slice(&(NIFTI_HEADER_SIZE as i32).to_le_bytes());

    let mut dims = [1i16; 8];
    dims[0] = if volume.planar { 2 } else { 3 };
    for (slot, len) in dims[1..4].iter_mut().zip([volume.width, volume.height, volume.depth]) {
        *slot = i16::try_from(len).map_err(|_| {
            Error::UnsupportedFormat(format!(
                "NIfTI-1 axes hold at most {} voxels, got shape {:?}",
                i16::MAX,
                volume.shape()
            ))
        })?;
    }
    for (i, d) in dims.iter().enumerate() {
        header[40 + 2 * i..42 + 2 * i].copy_from_slice(&d.to_le_bytes());
    }
    header[70..72].copy_from_slice(&2i16.to_le_bytes()); // uint8
    header[72..74].copy_from_slice(&8i16.to_le_bytes()); // bitpix
    for i in 0..4 {
        header[76 + 4 * i..80 + 4 * i].copy_from_slice(&1.0f32.to_le_bytes());
    }
    header[108..112].copy_from_slice(&(NIFTI_VOX_OFFSET as f32).to_le_bytes());
    header[112..116].copy_from_slice(&1.0f32.to_le_bytes()); // scl_slope
    header[344..348].copy_from_slice(b"n+1\0");

    let file = File::create(path)?;
    let is_gz = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    if is_gz {
        let mut enc = GzEncoder::new(BufWriter::new(file), Compression::default());
        enc.write_all(&header)?;
        enc.write_all(&volume.data)?;
        enc.finish()?.flush()?;
    } else {
        let mut w = BufWriter::new(file);
        w.write_all(&header)?;
        w.write_all(&volume.data)?;
        w.flush()?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// TIFF stacks
// ---------------------------------------------------------------------------

/// Reduce a decoded page to one value per pixel. Multi-sample pages keep
/// their first channel; pages that do not hold whole pixels (packed
/// sub-byte samples) are rejected.
fn page_plane(path: &Path, page: Vec<u32>, pixels: usize) -> Result<Vec<u32>> {
    if pixels == 0 || page.len() < pixels || page.len() % pixels != 0 {
        return Err(Error::volume_load(
            path,
            format!("page holds {} samples for {} pixels", page.len(), pixels),
        ));
    }
    let samples = page.len() / pixels;
    if samples == 1 {
        return Ok(page);
    }
    Ok((0..pixels).map(|px| page[px * samples]).collect())
}

/// Read every page of a TIFF file as one z-slice.
pub fn read_tiff_stack(path: &Path) -> Result<Grid<u32>> {
    let file = File::open(path)?;
    let mut decoder =
        Decoder::new(BufReader::new(file)).map_err(|e| Error::volume_load(path, e))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::volume_load(path, e))?;
    let (ncol, nrow) = (width as usize, height as usize);
    let mut data: Vec<u32> = Vec::new();
    let mut pages = 0usize;

    loop {
        let (w, h) = decoder
            .dimensions()
            .map_err(|e| Error::volume_load(path, e))?;
        if w as usize != ncol || h as usize != nrow {
            return Err(Error::DimensionMismatch {
                expected: vec![nrow, ncol],
                found: vec![h as usize, w as usize],
            });
        }
        let result = decoder
            .read_image()
            .map_err(|e| Error::volume_load(path, e))?;
        let page: Vec<u32> = match result {
            DecodingResult::U8(v) => v.into_iter().map(u32::from).collect(),
            DecodingResult::U16(v) => v.into_iter().map(u32::from).collect(),
            DecodingResult::U32(v) => v,
            DecodingResult::U64(v) => v.into_iter().map(|x| x.min(u32::MAX as u64) as u32).collect(),
            DecodingResult::I8(v) => v.into_iter().map(|x| x.max(0) as u32).collect(),
            DecodingResult::I16(v) => v.into_iter().map(|x| x.max(0) as u32).collect(),
            DecodingResult::I32(v) => v.into_iter().map(|x| x.max(0) as u32).collect(),
            DecodingResult::I64(v) => v.into_iter().map(|x| x.clamp(0, u32::MAX as i64) as u32).collect(),
            DecodingResult::F32(v) => v.into_iter().map(|x| float_to_u32(x as f64)).collect(),
            DecodingResult::F64(v) => v.into_iter().map(float_to_u32).collect(),
        };

        data.extend(page_plane(path, page, nrow * ncol)?);
        pages += 1;

        if !decoder.more_images() {
            break;
        }
        decoder
            .next_image()
            .map_err(|e| Error::volume_load(path, e))?;
    }

    Ok(Grid::from_vec(pages, nrow, ncol, data).with_planar(pages == 1))
}

// ---------------------------------------------------------------------------
// 2D images and image series
// ---------------------------------------------------------------------------

/// Decode a single 2D image as grayscale.
pub fn read_image_plane(path: &Path) -> Result<Grid<u32>> {
    let (h, w, data) = decode_gray(path)?;
    Ok(Grid::from_vec(1, h, w, data).with_planar(true))
}

fn decode_gray(path: &Path) -> Result<(usize, usize, Vec<u32>)> {
    let img = image::open(path).map_err(|e| Error::volume_load(path, e))?;
    let (w, h) = (img.width() as usize, img.height() as usize);
    let data: Vec<u32> = match img {
        image::DynamicImage::ImageLuma16(buf) => buf.into_raw().into_iter().map(u32::from).collect(),
        other => other.to_luma8().into_raw().into_iter().map(u32::from).collect(),
    };
    Ok((h, w, data))
}

/// Decode a 2D image into packed `r << 16 | g << 8 | b` values.
pub fn read_rgb_plane(path: &Path) -> Result<(usize, usize, Vec<u32>)> {
    let img = image::open(path).map_err(|e| Error::volume_load(path, e))?;
    let rgb = img.to_rgb8();
    let (w, h) = (rgb.width() as usize, rgb.height() as usize);
    let data = rgb
        .pixels()
        .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32)
        .collect();
    Ok((h, w, data))
}

/// Sorted image files of a directory. When `ext` is `None`, the extension of
/// the first file (by name) is used.
pub fn dir_files(dir: &Path, ext: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.file_name()
                .map(|n| !n.to_string_lossy().starts_with('.'))
                .unwrap_or(false)
        })
        .collect();

    let wanted = match ext {
        Some(e) => Some(e.trim_start_matches('.').to_lowercase()),
        None => files
            .first()
            .and_then(|p| p.extension())
            .map(|e| e.to_string_lossy().to_lowercase()),
    };
    if let Some(wanted) = wanted {
        files.retain(|p| {
            p.extension()
                .map(|e| e.to_string_lossy().to_lowercase() == wanted)
                .unwrap_or(false)
        });
    }
    Ok(files)
}

/// Stack a directory of 2D slices into a 3D grid.
///
/// With `rgb` set, each voxel holds the packed RGB value of its pixel;
/// otherwise the grayscale value.
pub fn read_series(dir: &Path, ext: Option<&str>, rgb: bool) -> Result<Grid<u32>> {
    let files = dir_files(dir, ext)?;
    if files.is_empty() {
        return Err(Error::volume_load(dir, "no image files found in directory"));
    }

    let mut shape: Option<(usize, usize)> = None;
    let mut data = Vec::new();
    for file in &files {
        let (h, w, slice) = if rgb {
            read_rgb_plane(file)?
        } else {
            decode_gray(file)?
        };
        match shape {
            None => shape = Some((h, w)),
            Some((sh, sw)) if sh != h || sw != w => {
                return Err(Error::DimensionMismatch {
                    expected: vec![sh, sw],
                    found: vec![h, w],
                })
            }
            _ => {}
        }
        data.extend(slice);
    }
    let (h, w) = shape.unwrap_or((0, 0));
    Ok(Grid::from_vec(files.len(), h, w, data))
}

/// Stack an image series into a binary volume (nonzero pixels become 1).
pub fn stack_series(dir: &Path, ext: Option<&str>) -> Result<Volume> {
    let grid = read_series(dir, ext, false)?;
    Ok(grid.map(|v| u8::from(v != 0)))
}

/// Stack every subfolder of `input_dir` and write `<folder>.nii` into
/// `output_dir`. Returns the written files.
pub fn sequence_directories(
    input_dir: &Path,
    output_dir: &Path,
    sub_dir: Option<&str>,
    ext: Option<&str>,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;
    let mut written = Vec::new();
    let folders = WalkDir::new(input_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir());

    for folder in folders {
        let name = folder.file_name().to_string_lossy().to_string();
        let series_dir = match sub_dir {
            Some(sub) => folder.path().join(sub),
            None => folder.path().to_path_buf(),
        };
        if !series_dir.is_dir() {
            continue;
        }
        match stack_series(&series_dir, ext) {
            Ok(volume) => {
                let out = output_dir.join(format!("{}.nii", name));
                save_nifti(&out, &volume)?;
                info!("Stacked {} slices from '{}'", volume.depth, series_dir.display());
                written.push(out);
            }
            Err(e) => debug!("No image series in '{}': {}", series_dir.display(), e),
        }
    }
    Ok(written)
}

// ---------------------------------------------------------------------------
// ROI volumes
// ---------------------------------------------------------------------------

/// Physical volume of the nonzero region of a file.
pub fn roi_volume(path: &Path, resolution: &Resolution) -> Result<f64> {
    let raw = load_raw(path)?;
    Ok(raw.count_nonzero() as f64 * resolution.voxel_volume())
}

/// `(file stem, volume)` for every file with the given extension in `dir`.
pub fn roi_volumes(dir: &Path, ext: &str, resolution: &Resolution) -> Result<Vec<(String, f64)>> {
    let mut rows = Vec::new();
    for file in dir_files(dir, Some(ext))? {
        let name = file_stem(&file);
        let volume = roi_volume(&file, resolution)?;
        debug!("ROI volume of '{}': {}", name, volume);
        rows.push((name, volume));
    }
    Ok(rows)
}

/// File name without any volume extension (`a.nii.gz` → `a`).
pub fn file_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let lower = name.to_lowercase();
    if lower.ends_with(".nii.gz") {
        return name[..name.len() - 7].to_string();
    }
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn cube_volume() -> Volume {
        let mut v: Volume = Grid::new(3, 4, 5);
        v[(1, 2, 3)] = 1;
        v[(2, 3, 4)] = 1;
        v
    }

    #[test]
    fn test_nifti_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vol.nii");
        let v = cube_volume();
        save_nifti(&path, &v).unwrap();
        let loaded = load_volume(&path).unwrap();
        assert_eq!(loaded.shape(), [3, 4, 5]);
        assert_eq!(loaded.data, v.data);
        assert!(!loaded.planar);
    }

    #[test]
    fn test_nifti_gz_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vol.nii.gz");
        let v = cube_volume();
        save_nifti(&path, &v).unwrap();
        let loaded = load_volume(&path).unwrap();
        assert_eq!(loaded.data, v.data);
        assert_eq!(file_stem(&path), "vol");
    }

    #[test]
    fn test_binary_check_rejects_labels() {
        let mut g: Grid<u32> = Grid::new(1, 2, 2);
        g.data = vec![0, 5, 5, 0];
        assert!(binary_check(&g).is_ok());
        g.data = vec![0, 5, 6, 0];
        assert!(matches!(binary_check(&g), Err(Error::NonBinary(5, 6))));
    }

    #[test]
    fn test_unsupported_extension() {
        let res = load_raw(Path::new("volume.xyz"));
        assert!(matches!(res, Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_series_stacking_and_roi_volume() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3u8 {
            let mut img = image::GrayImage::new(4, 2);
            img.put_pixel(i as u32, 1, image::Luma([255]));
            img.save(dir.path().join(format!("slice_{i}.png"))).unwrap();
        }
        let v = stack_series(dir.path(), None).unwrap();
        assert_eq!(v.shape(), [3, 2, 4]);
        assert_eq!(v.count_nonzero(), 3);
        assert_eq!(v[(2, 1, 2)], 1);

        let out = tempfile::tempdir().unwrap();
        let nii = out.path().join("stack.nii");
        save_nifti(&nii, &v).unwrap();
        let vol = roi_volume(&nii, &Resolution::isotropic(2.0)).unwrap();
        assert_eq!(vol, 24.0);
    }

    #[test]
    fn test_page_plane_rejects_partial_pages() {
        let path = Path::new("packed.tif");
        // A 10x10 bilevel page packed into 2 bytes per row.
        let packed = vec![0u32; 20];
        assert!(matches!(page_plane(path, packed, 100), Err(Error::VolumeLoad { .. })));
        assert!(page_plane(path, vec![0; 150], 100).is_err());

        let rgb = vec![1, 2, 3, 4, 5, 6];
        assert_eq!(page_plane(path, rgb, 2).unwrap(), vec![1, 4]);
    }

    #[test]
    fn test_nifti_rejects_oversized_axis() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.nii");
        let v: Volume = Grid::new(1, 1, 40_000);
        assert!(matches!(save_nifti(&path, &v), Err(Error::UnsupportedFormat(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_multi_page_tiff() {
        use tiff::encoder::{colortype, TiffEncoder};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.tif");
        {
            let mut enc = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
            for z in 0..3u8 {
                let mut page = vec![0u8; 4 * 2];
                page[z as usize] = 255;
                enc.write_image::<colortype::Gray8>(4, 2, &page).unwrap();
            }
        }

        let v = load_volume(&path).unwrap();
        assert_eq!(v.shape(), [3, 2, 4]);
        assert!(!v.planar);
        for z in 0..3 {
            assert_eq!(v[(z, 0, z)], 1);
        }
        assert_eq!(v.count_nonzero(), 3);
    }

    #[test]
    fn test_sequence_directories_order() {
        let input = tempfile::tempdir().unwrap();
        for name in ["vessels_b", "vessels_a"] {
            let series = input.path().join(name).join("slices");
            fs::create_dir_all(&series).unwrap();
            for z in 0..2u32 {
                let mut img = image::GrayImage::new(3, 3);
                img.put_pixel(z, z, image::Luma([255]));
                img.save(series.join(format!("img_{z}.png"))).unwrap();
            }
        }
        fs::write(input.path().join("notes.txt"), "not a series").unwrap();

        let output = tempfile::tempdir().unwrap();
        let written = sequence_directories(input.path(), output.path(), Some("slices"), Some("png")).unwrap();
        let names: Vec<String> = written.iter().map(|p| file_stem(p)).collect();
        assert_eq!(names, vec!["vessels_a", "vessels_b"]);

        let v = load_volume(&written[0]).unwrap();
        assert_eq!(v.shape(), [2, 3, 3]);
        assert_eq!(v[(0, 0, 0)], 1);
        assert_eq!(v[(1, 1, 1)], 1);
        assert_eq!(v.count_nonzero(), 2);
    }

    #[test]
    fn test_rgb_plane_packs_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.png");
        let mut img = image::RgbImage::new(2, 1);
        img.put_pixel(1, 0, image::Rgb([0x12, 0x34, 0x56]));
        img.save(&path).unwrap();

        let (h, w, data) = read_rgb_plane(&path).unwrap();
        assert_eq!((h, w), (1, 2));
        assert_eq!(data, vec![0, 0x123456]);
    }
}
