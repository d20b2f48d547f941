// ============================================================================
// TILE EXCHANGE: where extracted tiles go and replacement tiles come from
// ============================================================================

use image::RgbaImage;

use crate::grid::TileRect;
use crate::io::load_image;

/// The swatch/clipboard side of a selection round trip.
///
/// `receive` gets the copy taken on secondary release, `supply` is asked for
/// a replacement on primary release.  Returning `None` from `supply` means
/// the user cancelled (or there is nothing to paste) and the canvas pixels
/// stay as they are.
pub trait TileExchange {
    fn receive(&mut self, tile: RgbaImage);
    fn supply(&mut self, target: TileRect) -> Option<RgbaImage>;
}

// ---------------------------------------------------------------------------
//  In-app clipboard (keeps full transparency)
// ---------------------------------------------------------------------------

/// In-memory clipboard holding the most recently received tile.
#[derive(Clone, Debug, Default)]
pub struct AppClipboard {
    tile: Option<RgbaImage>,
}

impl AppClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clipboard pre-loaded with `tile`, e.g. a stamp read from disk.
    pub fn with_tile(tile: RgbaImage) -> Self {
        Self { tile: Some(tile) }
    }

    pub fn tile(&self) -> Option<&RgbaImage> {
        self.tile.as_ref()
    }

    pub fn has_tile(&self) -> bool {
        self.tile.is_some()
    }

    pub fn clear(&mut self) {
        self.tile = None;
    }
}

impl TileExchange for AppClipboard {
    fn receive(&mut self, tile: RgbaImage) {
        log_info!("Clipboard: received {}x{} tile", tile.width(), tile.height());
        self.tile = Some(tile);
    }

    fn supply(&mut self, _target: TileRect) -> Option<RgbaImage> {
        self.tile.clone()
    }
}

// ---------------------------------------------------------------------------
//  System clipboard (OS-level copy/paste via arboard)
// ---------------------------------------------------------------------------

/// Mirrors tiles to the OS clipboard so they can be pasted into other
/// programs.  Falls back to the in-app copy when the OS clipboard is
/// unavailable or holds no image.
pub struct SystemClipboard {
    os: Option<arboard::Clipboard>,
    local: AppClipboard,
}

impl Default for SystemClipboard {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClipboard {
    /// Connect to the OS clipboard.  Without a display session this logs a
    /// warning and behaves like [`SystemClipboard::detached`].
    pub fn new() -> Self {
        let os = match arboard::Clipboard::new() {
            Ok(clip) => Some(clip),
            Err(e) => {
                log_warn!("System clipboard unavailable: {}", e);
                None
            }
        };
        Self { os, local: AppClipboard::new() }
    }

    /// Never touches the OS clipboard, only the in-app copy.
    pub fn detached() -> Self {
        Self { os: None, local: AppClipboard::new() }
    }

    pub fn is_attached(&self) -> bool {
        self.os.is_some()
    }

    /// The in-app copy of the last received tile.
    pub fn local(&self) -> &AppClipboard {
        &self.local
    }
}

impl std::fmt::Debug for SystemClipboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemClipboard")
            .field("attached", &self.os.is_some())
            .field("local", &self.local)
            .finish()
    }
}

impl TileExchange for SystemClipboard {
    fn receive(&mut self, tile: RgbaImage) {
        if let Some(clip) = self.os.as_mut() {
            copy_to_system_clipboard(clip, &tile);
        }
        self.local.receive(tile);
    }

    fn supply(&mut self, target: TileRect) -> Option<RgbaImage> {
        self.os
            .as_mut()
            .and_then(get_from_system_clipboard)
            .or_else(|| self.local.supply(target))
    }
}

/// Write an RGBA image to the system clipboard.
fn copy_to_system_clipboard(clip: &mut arboard::Clipboard, img: &RgbaImage) {
    // arboard wants ImageData { width, height, bytes } in RGBA order.
    let data = arboard::ImageData {
        width: img.width() as usize,
        height: img.height() as usize,
        bytes: std::borrow::Cow::Borrowed(img.as_raw()),
    };
    if let Err(e) = clip.set_image(data) {
        log_warn!("System clipboard rejected image: {}", e);
    }
}

/// Read an image from the system clipboard: raw image data first, then a
/// copied file path pointing at an image.
fn get_from_system_clipboard(clip: &mut arboard::Clipboard) -> Option<RgbaImage> {
    if let Ok(data) = clip.get_image()
        && let Some(img) =
            RgbaImage::from_raw(data.width as u32, data.height as u32, data.bytes.into_owned())
    {
        return Some(img);
    }

    let text = clip.get_text().ok()?;
    let path = std::path::Path::new(text.trim());
    if !path.is_file() {
        return None;
    }
    match load_image(path) {
        Ok(img) => Some(img),
        Err(e) => {
            log_warn!("Clipboard path {} is not an image: {}", path.display(), e);
            None
        }
    }
}
