use image::RgbaImage;
use uuid::Uuid;

use crate::canvas::{SaveOutcome, SelectionCanvas};
use crate::io::FileStore;

/// Owns every open canvas.  Canvases enter through `open` / `new_untitled`
/// and leave through `close`; nothing else holds them.
#[derive(Debug, Default)]
pub struct CanvasRegistry {
    canvases: Vec<SelectionCanvas>,
    active: Option<Uuid>,
    untitled_counter: usize,
}

impl CanvasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a blank, never-saved canvas holding `image`.
    pub fn new_untitled(&mut self, image: RgbaImage) -> Uuid {
        self.untitled_counter += 1;
        let mut canvas = SelectionCanvas::untitled(self.untitled_counter);
        canvas.load_image(image);
        self.open(canvas)
    }

    /// Take ownership of `canvas` and make it the active one.
    pub fn open(&mut self, canvas: SelectionCanvas) -> Uuid {
        let id = canvas.id();
        log_info!("Opened canvas {} ({})", canvas.name(), id);
        self.canvases.push(canvas);
        self.set_active(id);
        id
    }

    /// Unregister and hand back the canvas.  Unsaved changes are the
    /// caller's problem.
    pub fn close(&mut self, id: Uuid) -> Option<SelectionCanvas> {
        let idx = self.canvases.iter().position(|c| c.id() == id)?;
        let mut canvas = self.canvases.remove(idx);
        canvas.set_active(false);
        if self.active == Some(id) {
            self.active = None;
        }
        log_info!("Closed canvas {} ({})", canvas.name(), id);
        Some(canvas)
    }

    pub fn get(&self, id: Uuid) -> Option<&SelectionCanvas> {
        self.canvases.iter().find(|c| c.id() == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut SelectionCanvas> {
        self.canvases.iter_mut().find(|c| c.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelectionCanvas> {
        self.canvases.iter()
    }

    pub fn len(&self) -> usize {
        self.canvases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canvases.is_empty()
    }

    /// Only the active canvas draws its selection overlay.
    pub fn set_active(&mut self, id: Uuid) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        for canvas in self.canvases.iter_mut() {
            canvas.set_active(canvas.id() == id);
        }
        self.active = Some(id);
        true
    }

    pub fn active_id(&self) -> Option<Uuid> {
        self.active
    }

    pub fn active(&self) -> Option<&SelectionCanvas> {
        self.get(self.active?)
    }

    pub fn active_mut(&mut self) -> Option<&mut SelectionCanvas> {
        let id = self.active?;
        self.get_mut(id)
    }

    pub fn has_unsaved(&self) -> bool {
        self.canvases.iter().any(|c| c.is_dirty())
    }

    /// Save the active canvas if it has unsaved changes.
    pub fn save_active(&mut self, files: &mut dyn FileStore) -> Option<SaveOutcome> {
        let canvas = self.active_mut()?;
        if canvas.saved_state() {
            return None;
        }
        Some(canvas.save(files))
    }

    /// Save every canvas with unsaved changes, one after another.  A failure
    /// or cancellation on one canvas doesn't stop the rest.
    pub fn save_all(&mut self, files: &mut dyn FileStore) -> Vec<(Uuid, SaveOutcome)> {
        let mut results = Vec::new();
        for canvas in self.canvases.iter_mut().filter(|c| c.is_dirty()) {
            let outcome = canvas.save(files);
            if !outcome.is_saved() {
                log_warn!("Save all: {} not saved ({:?})", canvas.name(), outcome);
            }
            results.push((canvas.id(), outcome));
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::CanvasError;
    use std::path::{Path, PathBuf};

    /// Fails writes to any path containing "bad", never prompts.
    #[derive(Default)]
    struct PickyFiles {
        written: Vec<PathBuf>,
    }

    impl FileStore for PickyFiles {
        fn write_image(&mut self, _image: &RgbaImage, path: &Path) -> Result<(), CanvasError> {
            if path.to_string_lossy().contains("bad") {
                return Err(CanvasError::Io("read-only".into()));
            }
            self.written.push(path.to_path_buf());
            Ok(())
        }

        fn prompt_save_path(&mut self, _suggested: &str) -> Option<PathBuf> {
            None
        }

        fn report_error(&mut self, _err: &CanvasError) {}
    }

    fn opened(path: &str) -> SelectionCanvas {
        SelectionCanvas::from_file(RgbaImage::new(4, 4), PathBuf::from(path))
    }

    #[test]
    fn open_close_lifecycle() {
        let mut reg = CanvasRegistry::new();
        let a = reg.open(opened("/tmp/a.png"));
        let b = reg.new_untitled(RgbaImage::new(8, 8));
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.active_id(), Some(b));
        assert_eq!(reg.get(b).unwrap().name(), "Untitled-1");
        assert!(reg.get(b).unwrap().is_active());
        assert!(!reg.get(a).unwrap().is_active());

        let closed = reg.close(b).expect("registered");
        assert!(!closed.is_active());
        assert_eq!(reg.active_id(), None);
        assert!(reg.close(b).is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn save_all_continues_past_failures() {
        let mut reg = CanvasRegistry::new();
        let bad = reg.open(opened("/tmp/bad.png"));
        let untitled = reg.new_untitled(RgbaImage::new(4, 4));
        let good = reg.open(opened("/tmp/good.png"));
        let clean = reg.open(opened("/tmp/clean.png"));
        for id in [bad, untitled, good] {
            reg.get_mut(id).unwrap().mark_dirty();
        }

        let mut files = PickyFiles::default();
        let results = reg.save_all(&mut files);

        assert_eq!(results.len(), 3);
        assert!(matches!(results[0], (id, SaveOutcome::Failed(_)) if id == bad));
        assert_eq!(results[1], (untitled, SaveOutcome::Cancelled));
        assert_eq!(results[2], (good, SaveOutcome::Saved(PathBuf::from("/tmp/good.png"))));
        assert_eq!(files.written, vec![PathBuf::from("/tmp/good.png")]);

        assert!(reg.get(bad).unwrap().is_dirty());
        assert!(reg.get(untitled).unwrap().is_dirty());
        assert!(!reg.get(good).unwrap().is_dirty());
        assert!(!reg.get(clean).unwrap().is_dirty());
        assert!(reg.has_unsaved());
    }

    #[test]
    fn save_active_skips_clean_canvas() {
        let mut reg = CanvasRegistry::new();
        let id = reg.open(opened("/tmp/one.png"));
        let mut files = PickyFiles::default();
        assert_eq!(reg.save_active(&mut files), None);

        reg.get_mut(id).unwrap().mark_dirty();
        assert!(reg.save_active(&mut files).unwrap().is_saved());
        assert!(!reg.has_unsaved());
    }
}
