use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use uuid::Uuid;

use crate::events::{CanvasEvent, EventHub, SubscriptionId};
use crate::grid::{self, Point, TileRect, TileSize};
use crate::io::{CanvasError, FileStore};
use crate::ops::clipboard::TileExchange;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

// ============================================================================
// BLENDING
// ============================================================================

/// Straight (non-premultiplied) alpha-over of `top` onto `base`.
pub fn blend_over(base: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    // Fast path: fully transparent top pixel, nothing to blend
    if top[3] == 0 {
        return base;
    }
    // Fast path: opaque top or empty base, top wins outright
    if top[3] == 255 || base[3] == 0 {
        return top;
    }

    let top_a = top[3] as f32 / 255.0;
    let base_a = base[3] as f32 / 255.0;
    let out_a = top_a + base_a * (1.0 - top_a);

    let channel = |t: u8, b: u8| -> u8 {
        let t = t as f32 / 255.0;
        let b = b as f32 / 255.0;
        let c = (t * top_a + b * base_a * (1.0 - top_a)) / out_a;
        (c * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(top[0], base[0]),
        channel(top[1], base[1]),
        channel(top[2], base[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// Copy of `rect` out of `image`.  Parts of `rect` beyond the image edge come
/// back transparent, so the result always has the rectangle's size.
pub fn copy_region(image: &RgbaImage, rect: TileRect) -> RgbaImage {
    let mut out = RgbaImage::new(rect.width, rect.height);
    let bounds = TileRect::new(0, 0, image.width(), image.height());
    let Some(visible) = rect.intersect(&bounds) else {
        return out;
    };

    let src_stride = image.width() as usize * 4;
    let out_stride = rect.width as usize * 4;
    let run = visible.width as usize * 4;
    let src_x = visible.x as usize * 4;
    let out_x = (visible.x as i64 - rect.x as i64) as usize * 4;
    let out_y = (visible.y as i64 - rect.y as i64) as usize;
    let src: &[u8] = image;
    let dst: &mut [u8] = &mut out;

    for row in 0..visible.height as usize {
        let s = (visible.y as usize + row) * src_stride + src_x;
        let d = (out_y + row) * out_stride + out_x;
        dst[d..d + run].copy_from_slice(&src[s..s + run]);
    }
    out
}

/// Source column/row for destination offset `offset` when `src_len` pixels
/// are stretched over `dst_len` (nearest neighbour).
fn nearest(offset: u32, src_len: u32, dst_len: u32) -> u32 {
    if src_len == dst_len {
        return offset;
    }
    ((offset as u64 * src_len as u64) / dst_len as u64) as u32
}

/// Write `src`, stretched over `target`, into the `region` of `dst`.
/// `region` must lie inside both `dst` and `target`.  Only the pixels of
/// `region` are sampled, so a huge `target` costs nothing extra.  Rows are
/// processed in parallel.
fn blit_rows(
    dst: &mut RgbaImage,
    src: &RgbaImage,
    target: TileRect,
    region: TileRect,
    erase: bool,
) {
    let stride = dst.width() as usize * 4;
    let x0 = region.left() as usize;
    let x1 = region.right() as usize;
    let y0 = region.top() as usize;
    let rows = region.height as usize;
    let buf: &mut [u8] = dst;

    buf.par_chunks_mut(stride)
        .skip(y0)
        .take(rows)
        .enumerate()
        .for_each(|(i, row)| {
            let dy = ((y0 + i) as i64 - target.y as i64) as u32;
            let sy = nearest(dy, src.height(), target.height);
            for x in x0..x1 {
                let dx = (x as i64 - target.x as i64) as u32;
                let sx = nearest(dx, src.width(), target.width);
                let top = *src.get_pixel(sx, sy);
                let px = &mut row[x * 4..x * 4 + 4];
                // Erasing to transparent and then blending over it is a plain copy.
                let out = if erase {
                    top
                } else {
                    blend_over(Rgba([px[0], px[1], px[2], px[3]]), top)
                };
                px.copy_from_slice(&out.0);
            }
        });
}

// ============================================================================
// SELECTION CANVAS
// ============================================================================

/// Drag progress of the tile selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum DragState {
    #[default]
    Idle,
    /// Secondary button is held; `anchor` is the cell it went down on.
    Selecting { anchor: TileRect },
}

/// Result of a save attempt.  Cancellation is not an error.
#[derive(Clone, Debug, PartialEq)]
pub enum SaveOutcome {
    Saved(PathBuf),
    Cancelled,
    Failed(CanvasError),
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved(_))
    }
}

/// One open image: its raster, the tile selection drawn over it and
/// whether it has unsaved changes.
pub struct SelectionCanvas {
    id: Uuid,
    name: String,
    image: Option<RgbaImage>,
    /// Fixed on-screen size, follows the last loaded raster.
    display_size: (u32, u32),
    path: Option<PathBuf>,
    dirty: bool,

    selection: Option<TileRect>,
    drag: DragState,
    /// Hover indicator while idle.  Never feeds extraction or compositing.
    cursor_preview: Option<TileRect>,

    active: bool,
    pointer_inside: bool,
    events: EventHub,
}

impl std::fmt::Debug for SelectionCanvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionCanvas")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("display_size", &self.display_size)
            .field("path", &self.path)
            .field("dirty", &self.dirty)
            .field("selection", &self.selection)
            .field("drag", &self.drag)
            .finish_non_exhaustive()
    }
}

impl SelectionCanvas {
    fn empty(name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            image: None,
            display_size: (0, 0),
            path: None,
            dirty: false,
            selection: None,
            drag: DragState::Idle,
            cursor_preview: None,
            active: false,
            pointer_inside: false,
            events: EventHub::new(),
        }
    }

    /// A canvas that has never been saved, named "Untitled-N".
    pub fn untitled(untitled_counter: usize) -> Self {
        Self::empty(format!("Untitled-{}", untitled_counter))
    }

    /// A canvas for an image opened from `path`.  Starts clean.
    pub fn from_file(image: RgbaImage, path: PathBuf) -> Self {
        let mut canvas = Self::empty(String::new());
        canvas.load_image(image);
        canvas.set_image_path(path);
        canvas
    }

    // ---- identity -----------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name with a `*` suffix while there are unsaved changes.
    pub fn display_title(&self) -> String {
        if self.dirty {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Set the persisted path without writing anything.
    pub fn set_image_path(&mut self, path: PathBuf) {
        self.name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        self.path = Some(path);
    }

    // ---- raster -------------------------------------------------------------

    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    /// Direct pixel access for painting tools.  Callers mark the canvas dirty
    /// themselves.
    pub fn image_mut(&mut self) -> Option<&mut RgbaImage> {
        self.image.as_mut()
    }

    pub fn display_size(&self) -> (u32, u32) {
        self.display_size
    }

    /// Replace the raster wholesale.  An empty image is rejected and leaves
    /// the canvas exactly as it was.  Returns `true` if the image was taken.
    pub fn load_image(&mut self, image: RgbaImage) -> bool {
        if image.width() == 0 || image.height() == 0 {
            log_warn!("{}: ignoring empty image", self.name);
            return false;
        }
        self.display_size = image.dimensions();
        self.image = Some(image);
        self.selection = None;
        self.cursor_preview = None;
        self.drag = DragState::Idle;
        true
    }

    /// Clamp `point` into the raster, `None` if there is no raster.
    fn clamp_point(&self, point: Point) -> Option<Point> {
        let image = self.image.as_ref()?;
        let max_x = image.width().saturating_sub(1).min(i32::MAX as u32) as i32;
        let max_y = image.height().saturating_sub(1).min(i32::MAX as u32) as i32;
        Some(Point::new(point.x.clamp(0, max_x), point.y.clamp(0, max_y)))
    }

    // ---- selection ----------------------------------------------------------

    pub fn selection(&self) -> Option<TileRect> {
        self.selection
    }

    pub fn cursor_preview(&self) -> Option<TileRect> {
        self.cursor_preview
    }

    pub fn is_selecting(&self) -> bool {
        matches!(self.drag, DragState::Selecting { .. })
    }

    /// Secondary press: anchor a new selection on the cell under `point`.
    /// Returns `false` when there is no raster to select from.
    pub fn begin_selection(&mut self, point: Point, tile: TileSize) -> bool {
        let Some(point) = self.clamp_point(point) else {
            return false;
        };
        let anchor = grid::cell_at(point, tile);
        self.drag = DragState::Selecting { anchor };
        self.selection = Some(anchor);
        self.pointer_inside = true;
        true
    }

    /// Pointer move.  While selecting, grows the selection to cover the
    /// anchor and the cell under `point`; while idle, only moves the hover
    /// preview.
    pub fn extend_selection(&mut self, point: Point, tile: TileSize) {
        let Some(point) = self.clamp_point(point) else {
            return;
        };
        self.pointer_inside = true;
        let cell = grid::cell_at(point, tile);
        match self.drag {
            DragState::Selecting { anchor } => {
                self.selection = Some(grid::span(&anchor, &cell));
            }
            DragState::Idle => {
                self.cursor_preview = Some(self.preview_around(cell, tile));
            }
        }
    }

    /// Preview rectangle with the committed selection's cell span (one cell
    /// if nothing is selected), centered on `cell` and kept on the grid.
    fn preview_around(&self, cell: TileRect, tile: TileSize) -> TileRect {
        let (cols, rows) = match self.selection {
            Some(sel) => (
                (sel.width / tile.width()).max(1),
                (sel.height / tile.height()).max(1),
            ),
            None => (1, 1),
        };
        TileRect::new(
            cell.x - ((cols - 1) / 2 * tile.width()) as i32,
            cell.y - ((rows - 1) / 2 * tile.height()) as i32,
            cols * tile.width(),
            rows * tile.height(),
        )
    }

    /// Secondary release: finish the drag and return a copy of the pixels
    /// under the selection.  The copy is independent of the canvas.
    pub fn end_selection(&mut self) -> Option<RgbaImage> {
        self.drag = DragState::Idle;
        let selection = self.selection?;
        let image = self.image.as_ref()?;
        let tile = copy_region(image, selection);
        log_info!(
            "{}: extracted {}x{} at ({}, {})",
            self.name,
            selection.width,
            selection.height,
            selection.x,
            selection.y
        );
        Some(tile)
    }

    /// Drop an in-progress drag without extracting, keeping the selection.
    pub fn cancel_drag(&mut self) {
        self.drag = DragState::Idle;
    }

    // ---- compositing --------------------------------------------------------

    /// Primary release: mark the canvas dirty, then ask `exchange` for a
    /// replacement for the selection and composite it.  The dirty flag is
    /// set even if nothing arrives.  Returns `true` if pixels changed.
    pub fn request_replace(&mut self, transparency: bool, exchange: &mut dyn TileExchange) -> bool {
        self.mark_dirty();
        let Some(target) = self.selection else {
            return false;
        };
        match exchange.supply(target) {
            Some(tile) => self.composite(&tile, transparency),
            None => false,
        }
    }

    /// Paste `tile` into the selection.
    ///
    /// With `transparency` off the destination is erased first, so the
    /// selection ends up identical to the tile, transparent pixels included.
    /// With it on the tile is alpha-blended over what is already there.
    /// A tile of a different size is scaled to the selection with nearest
    /// neighbour sampling.
    pub fn composite(&mut self, tile: &RgbaImage, transparency: bool) -> bool {
        if tile.width() == 0 || tile.height() == 0 {
            return false;
        }
        let Some(target) = self.selection else {
            return false;
        };
        let Some(image) = self.image.as_mut() else {
            return false;
        };
        let bounds = TileRect::new(0, 0, image.width(), image.height());
        let Some(region) = target.intersect(&bounds) else {
            return false;
        };

        blit_rows(image, tile, target, region, !transparency);

        if !self.dirty {
            self.mark_dirty();
        }
        true
    }

    // ---- saved state --------------------------------------------------------

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// `true` when the in-memory image matches the last persisted copy.
    pub fn saved_state(&self) -> bool {
        !self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.events.emit(CanvasEvent::DirtyChanged(true));
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
        self.events.emit(CanvasEvent::DirtyChanged(false));
    }

    /// Save to the known path, or ask for one if the canvas was never saved.
    pub fn save(&mut self, files: &mut dyn FileStore) -> SaveOutcome {
        match self.path.clone() {
            None => self.save_as(files),
            Some(path) => match self.write_to(&path, files) {
                Ok(()) => {
                    self.mark_clean();
                    SaveOutcome::Saved(path)
                }
                Err(e) => SaveOutcome::Failed(e),
            },
        }
    }

    /// Ask `files` for a destination and save there.
    pub fn save_as(&mut self, files: &mut dyn FileStore) -> SaveOutcome {
        let suggested = self.suggested_file_name();
        match files.prompt_save_path(&suggested) {
            Some(path) => self.save_to(path, files),
            None => {
                log_info!("{}: save cancelled", self.name);
                SaveOutcome::Cancelled
            }
        }
    }

    /// Write to `path` and adopt it as the persisted path on success.
    pub fn save_to(&mut self, path: PathBuf, files: &mut dyn FileStore) -> SaveOutcome {
        if let Err(e) = self.write_to(&path, files) {
            return SaveOutcome::Failed(e);
        }
        if self.path.as_deref() != Some(path.as_path()) {
            self.set_image_path(path.clone());
            self.events.emit(CanvasEvent::PathChanged(path.clone()));
        }
        self.mark_clean();
        SaveOutcome::Saved(path)
    }

    fn write_to(&self, path: &Path, files: &mut dyn FileStore) -> Result<(), CanvasError> {
        let result = match self.image.as_ref() {
            Some(image) => files.write_image(image, path),
            None => Err(CanvasError::NoImage),
        };
        match &result {
            Ok(()) => log_info!("{}: saved to {}", self.name, path.display()),
            Err(e) => {
                log_err!("{}: failed to save {}: {}", self.name, path.display(), e);
                files.report_error(e);
            }
        }
        result
    }

    fn suggested_file_name(&self) -> String {
        if self.path.is_some() {
            self.name.clone()
        } else {
            format!("{}.png", self.name)
        }
    }

    // ---- overlay ------------------------------------------------------------

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn pointer_left(&mut self) {
        self.pointer_inside = false;
    }

    /// Outline to draw over the canvas, if any.  Shown only on the active
    /// canvas while the pointer is over it.
    pub fn overlay(&self) -> Option<TileRect> {
        if !self.active || !self.pointer_inside {
            return None;
        }
        let rect = if self.is_selecting() {
            self.selection
        } else {
            self.cursor_preview.or(self.selection)
        };
        rect.map(|r| r.outline())
    }

    // ---- listeners ----------------------------------------------------------

    pub fn subscribe(&mut self, listener: impl FnMut(&CanvasEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }
}
