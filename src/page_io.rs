//! # Page Input and Output
//!
//! Decoding input pages into grayscale rasters, and the on-disk layout of a
//! page's artifacts:
//!
//! ```text
//! <output>/preprocessed/<stem>_processed.png
//! <output>/preprocessed/<stem>_lines.png
//! <output>/lines/<stem>/line_001.png ...
//! <output>/ocr/<stem>.txt | <stem>.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use image::{GrayImage, ImageReader};
use tracing::debug;

use crate::errors::{PipelineError, PipelineResult};
use crate::segmentation::LineCrop;

/// Extensions accepted as input pages, compared case-insensitively.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Returns true when `path` has a supported page extension.
pub fn is_supported_page(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

/// Decodes a PNG or JPEG page into an 8-bit grayscale raster.
///
/// The format is detected from the file contents, not the extension. Color
/// pages are converted with the `image` crate's luma conversion.
///
/// # Errors
///
/// Returns `PipelineError::Decode` naming the path when the file cannot be
/// opened or is not a decodable image
pub fn load_page(path: &Path) -> PipelineResult<GrayImage> {
    let decode_error = |message: String| PipelineError::Decode {
        path: path.to_path_buf(),
        message,
    };

    let reader = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| decode_error(e.to_string()))?;
    let image = reader.decode().map_err(|e| decode_error(e.to_string()))?;

    let gray = image.to_luma8();
    debug!(
        page = %path.display(),
        width = gray.width(),
        height = gray.height(),
        "Decoded page"
    );
    Ok(gray)
}

/// Writes a grayscale image, creating parent directories as needed.
pub fn save_gray_image(path: &Path, image: &GrayImage) -> PipelineResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| PipelineError::io("create directory", parent, e))?;
    }

    image.save(path).map_err(|e| PipelineError::Encode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Writes every crop as `line_NNN.png` into `dir`.
///
/// Line files from an earlier run of the same page are removed first, so
/// the directory always holds exactly the current crop sequence.
///
/// # Returns
///
/// The written paths, in crop order
pub fn write_line_crops(dir: &Path, lines: &[LineCrop]) -> PipelineResult<Vec<PathBuf>> {
    fs::create_dir_all(dir).map_err(|e| PipelineError::io("create directory", dir, e))?;
    remove_stale_lines(dir)?;

    let mut written = Vec::with_capacity(lines.len());
    for line in lines {
        let path = dir.join(line.file_name());
        save_gray_image(&path, &line.image)?;
        written.push(path);
    }

    debug!(dir = %dir.display(), count = written.len(), "Wrote line crops");
    Ok(written)
}

fn remove_stale_lines(dir: &Path) -> PipelineResult<()> {
    let entries = fs::read_dir(dir).map_err(|e| PipelineError::io("read directory", dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::io("read directory", dir, e))?;
        let path = entry.path();
        let is_line_file = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("line_") && name.ends_with(".png"));

        if is_line_file && path.is_file() {
            fs::remove_file(&path).map_err(|e| PipelineError::io("remove file", &path, e))?;
        }
    }

    Ok(())
}

/// Artifact paths for one page under an output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
    stem: String,
}

impl OutputLayout {
    /// Layout for `page` under `root`; the page's file stem names its artifacts.
    pub fn new(root: &Path, page: &Path) -> Self {
        let stem = page
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "page".to_string());

        Self {
            root: root.to_path_buf(),
            stem,
        }
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn processed_mask_path(&self) -> PathBuf {
        self.root
            .join("preprocessed")
            .join(format!("{}_processed.png", self.stem))
    }

    pub fn overlay_path(&self) -> PathBuf {
        self.root
            .join("preprocessed")
            .join(format!("{}_lines.png", self.stem))
    }

    pub fn lines_dir(&self) -> PathBuf {
        self.root.join("lines").join(&self.stem)
    }

    /// Transcript path with the given extension (`txt` or `json`).
    pub fn transcript_path(&self, extension: &str) -> PathBuf {
        self.root
            .join("ocr")
            .join(format!("{}.{}", self.stem, extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::BoundingBox;

    fn crop(index: usize) -> LineCrop {
        let bbox = BoundingBox {
            y0: 0,
            x0: 0,
            y1: 4,
            x1: 6,
        };
        LineCrop {
            index,
            image: GrayImage::from_pixel(6, 4, image::Luma([index as u8 * 10])),
            bbox,
            raw_bbox: bbox,
        }
    }

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_page(Path::new("a/folio.png")));
        assert!(is_supported_page(Path::new("folio.JPG")));
        assert!(is_supported_page(Path::new("folio.Jpeg")));
        assert!(!is_supported_page(Path::new("folio.tiff")));
        assert!(!is_supported_page(Path::new("folio")));
    }

    #[test]
    fn test_load_page_converts_to_grayscale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("color.png");
        image::RgbImage::from_pixel(8, 5, image::Rgb([255, 255, 255]))
            .save(&path)
            .unwrap();

        let page = load_page(&path).unwrap();
        assert_eq!(page.dimensions(), (8, 5));
        assert_eq!(page.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn test_load_page_detects_format_from_content() {
        let dir = tempfile::tempdir().unwrap();
        let png_path = dir.path().join("page.png");
        GrayImage::from_pixel(3, 3, image::Luma([7])).save(&png_path).unwrap();
        let renamed = dir.path().join("page.jpg");
        fs::rename(&png_path, &renamed).unwrap();

        assert_eq!(load_page(&renamed).unwrap().get_pixel(1, 1)[0], 7);
    }

    #[test]
    fn test_load_page_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        fs::write(&path, b"definitely not an image").unwrap();

        let err = load_page(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
        assert!(err.to_string().contains("broken.png"));
    }

    #[test]
    fn test_load_page_missing_file() {
        let err = load_page(Path::new("/nonexistent/folio.png")).unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    #[test]
    fn test_write_line_crops_replaces_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        let lines_dir = dir.path().join("lines").join("folio");

        write_line_crops(&lines_dir, &[crop(1), crop(2), crop(3)]).unwrap();
        fs::write(lines_dir.join("notes.txt"), "keep me").unwrap();

        let written = write_line_crops(&lines_dir, &[crop(1)]).unwrap();

        assert_eq!(written, vec![lines_dir.join("line_001.png")]);
        assert!(!lines_dir.join("line_002.png").exists());
        assert!(!lines_dir.join("line_003.png").exists());
        assert!(lines_dir.join("notes.txt").exists());
    }

    #[test]
    fn test_output_layout_paths() {
        let layout = OutputLayout::new(Path::new("out"), Path::new("pages/folio_07.jpg"));

        assert_eq!(layout.stem(), "folio_07");
        assert_eq!(
            layout.processed_mask_path(),
            Path::new("out/preprocessed/folio_07_processed.png")
        );
        assert_eq!(
            layout.overlay_path(),
            Path::new("out/preprocessed/folio_07_lines.png")
        );
        assert_eq!(layout.lines_dir(), Path::new("out/lines/folio_07"));
        assert_eq!(
            layout.transcript_path("json"),
            Path::new("out/ocr/folio_07.json")
        );
    }
}
