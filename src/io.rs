use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tga::TgaEncoder;
use image::{DynamicImage, ImageEncoder, ImageError, ImageOutputFormat, RgbaImage};
use rfd::FileDialog;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Default JPEG quality when the caller doesn't pick one.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum CanvasError {
    /// A zero-sized image was handed in where pixels were expected.
    EmptyImage,
    /// The canvas has no raster loaded yet.
    NoImage,
    Io(String),
    Encode(String),
    UnsupportedFormat(String),
}

impl std::fmt::Display for CanvasError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CanvasError::EmptyImage => write!(f, "image is empty"),
            CanvasError::NoImage => write!(f, "no image loaded"),
            CanvasError::Io(e) => write!(f, "IO error: {}", e),
            CanvasError::Encode(e) => write!(f, "Image error: {}", e),
            CanvasError::UnsupportedFormat(ext) => write!(f, "Unsupported image format: {}", ext),
        }
    }
}

impl std::error::Error for CanvasError {}

impl From<std::io::Error> for CanvasError {
    fn from(e: std::io::Error) -> Self {
        CanvasError::Io(e.to_string())
    }
}

impl From<ImageError> for CanvasError {
    fn from(e: ImageError) -> Self {
        match e {
            ImageError::IoError(io) => CanvasError::Io(io.to_string()),
            other => CanvasError::Encode(other.to_string()),
        }
    }
}

// ============================================================================
// FORMATS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SaveFormat {
    #[default]
    Png,
    Jpeg,
    Bmp,
    Tga,
    Tiff,
    Ico,
    Gif,
    Pnm,
}

impl SaveFormat {
    pub fn all() -> &'static [SaveFormat] {
        &[
            SaveFormat::Png,
            SaveFormat::Jpeg,
            SaveFormat::Bmp,
            SaveFormat::Tga,
            SaveFormat::Tiff,
            SaveFormat::Ico,
            SaveFormat::Gif,
            SaveFormat::Pnm,
        ]
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::Bmp => "bmp",
            SaveFormat::Tga => "tga",
            SaveFormat::Tiff => "tiff",
            SaveFormat::Ico => "ico",
            SaveFormat::Gif => "gif",
            SaveFormat::Pnm => "ppm",
        }
    }

    /// Every extension this format is recognised by.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            SaveFormat::Png => &["png"],
            SaveFormat::Jpeg => &["jpg", "jpeg"],
            SaveFormat::Bmp => &["bmp"],
            SaveFormat::Tga => &["tga"],
            SaveFormat::Tiff => &["tiff", "tif"],
            SaveFormat::Ico => &["ico"],
            SaveFormat::Gif => &["gif"],
            SaveFormat::Pnm => &["ppm", "pgm", "pnm"],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SaveFormat::Png => "PNG",
            SaveFormat::Jpeg => "JPEG",
            SaveFormat::Bmp => "BMP",
            SaveFormat::Tga => "TGA",
            SaveFormat::Tiff => "TIFF",
            SaveFormat::Ico => "ICO",
            SaveFormat::Gif => "GIF",
            SaveFormat::Pnm => "PNM",
        }
    }

    pub fn from_extension(ext: &str) -> Option<SaveFormat> {
        let ext = ext.to_lowercase();
        SaveFormat::all()
            .iter()
            .copied()
            .find(|f| f.extensions().contains(&ext.as_str()))
    }

    pub fn from_path(path: &Path) -> Result<SaveFormat, CanvasError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        SaveFormat::from_extension(&ext).ok_or(CanvasError::UnsupportedFormat(ext))
    }
}

/// Give an extension-less path the default format's extension.  Native
/// dialogs on some desktops hand back exactly what the user typed.
pub fn with_default_extension(mut path: PathBuf) -> PathBuf {
    if path.extension().is_none() {
        path.set_extension(SaveFormat::default().extension());
    }
    path
}

// ============================================================================
// LOADING / ENCODING
// ============================================================================

/// Load any image the `image` crate can decode as straight RGBA8.
pub fn load_image(path: &Path) -> Result<RgbaImage, CanvasError> {
    let img = image::open(path)?.to_rgba8();
    if img.width() == 0 || img.height() == 0 {
        return Err(CanvasError::EmptyImage);
    }
    Ok(img)
}

/// Encode and write an image, picking the format from the file extension.
pub fn save_image(image: &RgbaImage, path: &Path) -> Result<(), CanvasError> {
    let format = SaveFormat::from_path(path)?;
    encode_and_write(image, path, format, DEFAULT_JPEG_QUALITY)
}

/// Encode and write an image to a file in an explicit format.
pub fn encode_and_write(
    image: &RgbaImage,
    path: &Path,
    format: SaveFormat,
    quality: u8,
) -> Result<(), CanvasError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(CanvasError::EmptyImage);
    }
    // ICO entries are limited to 256×256
    if format == SaveFormat::Ico && (image.width() > 256 || image.height() > 256) {
        return Err(CanvasError::Encode(format!(
            "ICO images are limited to 256x256, got {}x{}",
            image.width(),
            image.height()
        )));
    }
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        SaveFormat::Png => {
            PngEncoder::new(&mut writer).write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        SaveFormat::Jpeg => {
            // JPEG doesn't support alpha, convert to RGB
            let rgb_image = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100));
            encoder.encode(
                rgb_image.as_raw(),
                rgb_image.width(),
                rgb_image.height(),
                image::ColorType::Rgb8,
            )?;
        }
        SaveFormat::Bmp => {
            let mut encoder = BmpEncoder::new(&mut writer);
            encoder.encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        SaveFormat::Tga => {
            TgaEncoder::new(&mut writer).encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        SaveFormat::Tiff => {
            DynamicImage::ImageRgba8(image.clone())
                .write_to(&mut writer, ImageOutputFormat::Tiff)?;
        }
        SaveFormat::Ico => {
            DynamicImage::ImageRgba8(image.clone()).write_to(&mut writer, ImageOutputFormat::Ico)?;
        }
        SaveFormat::Gif => {
            DynamicImage::ImageRgba8(image.clone()).write_to(&mut writer, ImageOutputFormat::Gif)?;
        }
        SaveFormat::Pnm => {
            // PNM has no alpha channel
            use image::codecs::pnm::{PnmSubtype, SampleEncoding};
            let dyn_img = DynamicImage::ImageRgba8(image.clone());
            let is_graymap = path
                .extension()
                .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case("pgm"));
            if is_graymap {
                DynamicImage::ImageLuma8(dyn_img.to_luma8()).write_to(
                    &mut writer,
                    ImageOutputFormat::Pnm(PnmSubtype::Graymap(SampleEncoding::Binary)),
                )?;
            } else {
                DynamicImage::ImageRgb8(dyn_img.to_rgb8()).write_to(
                    &mut writer,
                    ImageOutputFormat::Pnm(PnmSubtype::Pixmap(SampleEncoding::Binary)),
                )?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}

// ============================================================================
// FILE COLLABORATOR
// ============================================================================

/// Where canvases persist their pixels and ask for destinations.
pub trait FileStore {
    fn write_image(&mut self, image: &RgbaImage, path: &Path) -> Result<(), CanvasError>;

    /// Ask for a destination.  `None` means the user cancelled.
    fn prompt_save_path(&mut self, suggested_name: &str) -> Option<PathBuf>;

    /// Tell the user a save failed.
    fn report_error(&mut self, err: &CanvasError);
}

/// Desktop implementation: native "Save As" dialog, errors on stderr.
pub struct NativeFileStore {
    /// Directory the dialog opens in.
    pub start_dir: PathBuf,
}

impl Default for NativeFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeFileStore {
    pub fn new() -> Self {
        Self::in_dir(".")
    }

    pub fn in_dir(start_dir: impl Into<PathBuf>) -> Self {
        Self {
            start_dir: start_dir.into(),
        }
    }
}

impl FileStore for NativeFileStore {
    fn write_image(&mut self, image: &RgbaImage, path: &Path) -> Result<(), CanvasError> {
        save_image(image, path)
    }

    fn prompt_save_path(&mut self, suggested_name: &str) -> Option<PathBuf> {
        let mut dialog = FileDialog::new()
            .set_title("Save image file as...")
            .set_directory(&self.start_dir)
            .set_file_name(suggested_name);
        for format in SaveFormat::all() {
            dialog = dialog.add_filter(format.label(), format.extensions());
        }
        let path = with_default_extension(dialog.save_file()?);
        if let Some(parent) = path.parent() {
            self.start_dir = parent.to_path_buf();
        }
        Some(path)
    }

    fn report_error(&mut self, err: &CanvasError) {
        eprintln!("Failed to save image: {}", err);
    }
}

/// Batch implementation: never prompts, so untitled canvases are skipped.
#[derive(Debug, Default)]
pub struct HeadlessFileStore {
    pub errors: Vec<CanvasError>,
    pub verbose: bool,
}

impl FileStore for HeadlessFileStore {
    fn write_image(&mut self, image: &RgbaImage, path: &Path) -> Result<(), CanvasError> {
        save_image(image, path)
    }

    fn prompt_save_path(&mut self, suggested_name: &str) -> Option<PathBuf> {
        if self.verbose {
            println!("  skipped {}: no output path", suggested_name);
        }
        None
    }

    fn report_error(&mut self, err: &CanvasError) {
        eprintln!("error: {}", err);
        self.errors.push(err.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn temp_path(ext: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tilesnap-io-{}.{}", uuid::Uuid::new_v4(), ext))
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(SaveFormat::from_extension("PNG"), Some(SaveFormat::Png));
        assert_eq!(SaveFormat::from_extension("jpeg"), Some(SaveFormat::Jpeg));
        assert_eq!(SaveFormat::from_extension("tif"), Some(SaveFormat::Tiff));
        assert_eq!(SaveFormat::from_extension("pgm"), Some(SaveFormat::Pnm));
        assert_eq!(SaveFormat::from_extension("psd"), None);
        assert_eq!(
            SaveFormat::from_path(Path::new("a/b.xcf")),
            Err(CanvasError::UnsupportedFormat("xcf".into()))
        );
    }

    #[test]
    fn bare_names_get_png_extension() {
        assert_eq!(
            with_default_extension(PathBuf::from("out/tile")),
            PathBuf::from("out/tile.png")
        );
        assert_eq!(with_default_extension(PathBuf::from("a.bmp")), PathBuf::from("a.bmp"));
        assert_eq!(with_default_extension(PathBuf::from("a.xcf")), PathBuf::from("a.xcf"));
    }

    #[test]
    fn png_keeps_alpha() {
        let path = temp_path("png");
        let mut img = RgbaImage::from_pixel(4, 3, Rgba([9, 8, 7, 255]));
        img.put_pixel(1, 1, Rgba([1, 2, 3, 0]));
        save_image(&img, &path).unwrap();

        let back = load_image(&path).unwrap();
        assert_eq!(back, img);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn bmp_and_tga_are_writable() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([100, 0, 0, 255]));
        for ext in ["bmp", "tga", "jpg"] {
            let path = temp_path(ext);
            save_image(&img, &path).unwrap();
            let back = load_image(&path).unwrap();
            assert_eq!(back.dimensions(), (2, 2));
            let _ = std::fs::remove_file(path);
        }
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let img = RgbaImage::new(2, 2);
        let path = std::env::temp_dir()
            .join(format!("tilesnap-no-such-dir-{}", uuid::Uuid::new_v4()))
            .join("x.png");
        assert!(matches!(save_image(&img, &path), Err(CanvasError::Io(_))));
    }

    #[test]
    fn empty_image_is_rejected() {
        let path = temp_path("png");
        assert_eq!(save_image(&RgbaImage::new(0, 0), &path), Err(CanvasError::EmptyImage));
        assert!(!path.exists());
    }

    #[test]
    fn headless_store_never_prompts() {
        let mut store = HeadlessFileStore::default();
        assert_eq!(store.prompt_save_path("Untitled-1.png"), None);
        store.report_error(&CanvasError::NoImage);
        assert_eq!(store.errors, vec![CanvasError::NoImage]);
    }
}
