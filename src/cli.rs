// ============================================================================
// TileSnap CLI: headless tile extraction and stamping
// ============================================================================
//
// Usage examples:
//   tilesnap -i sheet.png --tile 16x16 --from 5,5 --to 40,20 --extract row.png
//   tilesnap -i sheet.png --from 0,0 --paste grass.png                (saved in place)
//   tilesnap -i maps/*.png --tile 8x8 --from 8,8 --paste door.png --transparent --output-dir out/
//   tilesnap -i sheet.png --from 40,40 --clipboard                    (copy to the OS clipboard)
//   tilesnap -i sheet.png --from 0,0 --paste-clipboard --ask
//
// Every input is driven through the same pointer gestures the editor uses:
// a secondary-button drag from --from to --to, then a primary click to stamp.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use image::RgbaImage;
use uuid::Uuid;

use crate::canvas::{SaveOutcome, SelectionCanvas};
use crate::components::tools::{self, MouseButton, PointerEvent, Tool, ToolContext, ToolResponse};
use crate::grid::{Point, TileRect, TileSize};
use crate::io::{HeadlessFileStore, NativeFileStore, load_image, save_image};
use crate::ops::clipboard::{AppClipboard, SystemClipboard, TileExchange};
use crate::registry::CanvasRegistry;
use crate::settings::Settings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// TileSnap headless tile tool.
///
/// Select a tile-aligned block on each input image, copy it out and/or
/// stamp another image into it.
#[derive(Parser, Debug)]
#[command(
    name = "tilesnap",
    about = "Grid-snapped tile extraction and stamping for pixel-art images",
    long_about = "Select a block of whole grid cells on an image and copy it out, or\n\
                  stamp another image into it. Coordinates snap to the tile grid.\n\n\
                  Example:\n  \
                  tilesnap -i sheet.png --tile 16x16 --from 5,5 --to 40,20 --extract row.png\n  \
                  tilesnap -i maps/*.png --from 8,8 --paste door.png --output-dir out/"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "maps/*.bmp").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Tile size as WIDTHxHEIGHT. Defaults to the saved editor setting.
    #[arg(short, long, value_name = "WxH")]
    pub tile: Option<String>,

    /// Pixel where the selection drag starts.
    #[arg(long, value_name = "X,Y")]
    pub from: String,

    /// Pixel where the selection drag ends (defaults to --from).
    #[arg(long, value_name = "X,Y")]
    pub to: Option<String>,

    /// Write the selected block to this file. Single input only.
    #[arg(short, long, value_name = "FILE")]
    pub extract: Option<PathBuf>,

    /// Stamp this image into the selection (scaled to fit if sizes differ).
    #[arg(short, long, value_name = "FILE")]
    pub paste: Option<PathBuf>,

    /// Stamp the image currently on the OS clipboard instead of a file.
    #[arg(long, conflicts_with = "paste")]
    pub paste_clipboard: bool,

    /// Also copy the selected block to the OS clipboard. Single input only.
    #[arg(short, long)]
    pub clipboard: bool,

    /// Blend the stamp over existing pixels instead of replacing them.
    #[arg(long)]
    pub transparent: bool,

    /// Open a "Save As" dialog for stamped files that could not be written.
    #[arg(long)]
    pub ask: bool,

    /// Keep --tile / --transparent as the defaults for later runs.
    #[arg(long)]
    pub save_settings: bool,

    /// Output file for the stamped image. Single input only.
    /// Without --output / --output-dir inputs are overwritten.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for stamped images (original file names kept).
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Print per-file progress and timing.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the batch and return an OS exit code.
/// `0` = every file succeeded, `1` = something failed.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }
    if let Err(msg) = validate(&args, inputs.len()) {
        eprintln!("error: {}", msg);
        return ExitCode::FAILURE;
    }

    let mut settings = Settings::load();
    if let Some(tile_arg) = &args.tile {
        match TileSize::parse(tile_arg) {
            Some(tile) => settings.tile_size = tile,
            None => {
                eprintln!("error: invalid --tile '{}', expected WIDTHxHEIGHT", tile_arg);
                return ExitCode::FAILURE;
            }
        }
    }
    if args.transparent {
        settings.transparency_enabled = true;
    }
    if args.save_settings {
        settings.save();
    }
    settings.tool = Tool::Selection;

    let Some(from) = parse_point(&args.from) else {
        eprintln!("error: invalid --from '{}', expected X,Y", args.from);
        return ExitCode::FAILURE;
    };
    let to = match args.to.as_deref() {
        Some(s) => match parse_point(s) {
            Some(p) => p,
            None => {
                eprintln!("error: invalid --to '{}', expected X,Y", s);
                return ExitCode::FAILURE;
            }
        },
        None => from,
    };

    let stamp = match load_stamp(&args) {
        Ok(stamp) => stamp,
        Err(msg) => {
            eprintln!("error: {}", msg);
            return ExitCode::FAILURE;
        }
    };

    let mut clip = if args.clipboard {
        SystemClipboard::new()
    } else {
        SystemClipboard::detached()
    };
    if args.clipboard && !clip.is_attached() {
        eprintln!("error: --clipboard needs a desktop session with a clipboard");
        return ExitCode::FAILURE;
    }

    log_info!(
        "CLI: {} input(s), tile {}, drag {:?} -> {:?}",
        inputs.len(),
        settings.tile_size,
        from,
        to
    );

    let mut registry = CanvasRegistry::new();
    let mut failures = 0usize;

    for path in &inputs {
        let started = Instant::now();
        let image = match load_image(path) {
            Ok(img) => img,
            Err(e) => {
                eprintln!("error: {}: {}", path.display(), e);
                failures += 1;
                continue;
            }
        };
        let id = registry.open(SelectionCanvas::from_file(image, path.clone()));
        let Some(canvas) = registry.get_mut(id) else {
            continue;
        };

        let stroke = Stroke { from, to, stamp: stamp.as_ref() };
        match process_canvas(canvas, &settings, &stroke, &args, &mut clip) {
            Ok(()) => {
                if args.verbose {
                    println!(
                        "  {}: selection {:?} ({:.1} ms)",
                        path.display(),
                        canvas.selection(),
                        started.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(msg) => {
                eprintln!("error: {}: {}", path.display(), msg);
                failures += 1;
                // Leave the file on disk untouched
                registry.close(id);
            }
        }
    }

    if stamp.is_some() {
        let mut files = HeadlessFileStore { verbose: args.verbose, ..Default::default() };
        for (id, outcome) in registry.save_all(&mut files) {
            let outcome = if args.ask && !outcome.is_saved() {
                save_with_dialog(&mut registry, id)
            } else {
                outcome
            };
            let name = registry.get(id).map(|c| c.name().to_string()).unwrap_or_default();
            match outcome {
                SaveOutcome::Saved(path) => {
                    if args.verbose {
                        println!("  saved {} → {}", name, path.display());
                    }
                }
                SaveOutcome::Cancelled | SaveOutcome::Failed(_) => failures += 1,
            }
        }
    }

    if failures > 0 {
        eprintln!("{} of {} file(s) failed.", failures, inputs.len());
        log_warn!("CLI finished with {} failure(s)", failures);
        ExitCode::FAILURE
    } else {
        log_info!("CLI finished, {} file(s) processed", inputs.len());
        ExitCode::SUCCESS
    }
}

/// One selection gesture and what to stamp into it.
struct Stroke<'a> {
    from: Point,
    to: Point,
    stamp: Option<&'a RgbaImage>,
}

/// Drag, extract and optionally stamp one canvas.
fn process_canvas(
    canvas: &mut SelectionCanvas,
    settings: &Settings,
    stroke: &Stroke<'_>,
    args: &CliArgs,
    clip: &mut SystemClipboard,
) -> Result<(), String> {
    tile_fits(settings.tile_size, canvas.display_size())?;

    let mut ctx = ToolContext { settings, exchange: &mut *clip };
    let (from, to) = (stroke.from, stroke.to);
    let press = PointerEvent::Press { button: MouseButton::Secondary, pos: from };
    let release = PointerEvent::Release { button: MouseButton::Secondary, pos: to };
    tools::dispatch(canvas, press, &mut ctx);
    tools::dispatch(canvas, PointerEvent::Move { pos: to }, &mut ctx);
    if tools::dispatch(canvas, release, &mut ctx) != ToolResponse::TileExtracted {
        return Err("nothing selected".to_string());
    }

    if let Some(extract_path) = &args.extract {
        let tile = clip.local().tile().ok_or("selection copy went missing")?;
        save_image(tile, extract_path).map_err(|e| e.to_string())?;
        log_info!("CLI: wrote {}", extract_path.display());
    }

    if let Some(stamp) = stroke.stamp {
        let mut source = AppClipboard::with_tile(stamp.clone());
        let mut ctx = ToolContext { settings, exchange: &mut source };
        let placed = tools::dispatch(
            canvas,
            PointerEvent::Release { button: MouseButton::Primary, pos: to },
            &mut ctx,
        );
        if placed != ToolResponse::Placed(true) {
            return Err("stamp could not be placed".to_string());
        }
        if let Some(target) = output_path_for(canvas.path(), args) {
            canvas.set_image_path(target);
        }
    }
    Ok(())
}

/// The image to stamp: `--paste FILE`, the OS clipboard, or nothing.
fn load_stamp(args: &CliArgs) -> Result<Option<RgbaImage>, String> {
    if let Some(path) = &args.paste {
        return load_image(path)
            .map(Some)
            .map_err(|e| format!("could not load paste image: {}", e));
    }
    if !args.paste_clipboard {
        return Ok(None);
    }
    let mut clip = SystemClipboard::new();
    if !clip.is_attached() {
        return Err("--paste-clipboard needs a desktop session with a clipboard".to_string());
    }
    clip.supply(TileRect::default())
        .map(Some)
        .ok_or_else(|| "the clipboard holds no image".to_string())
}

/// Second chance for a stamped canvas that could not be written in place.
fn save_with_dialog(registry: &mut CanvasRegistry, id: Uuid) -> SaveOutcome {
    let Some(canvas) = registry.get_mut(id) else {
        return SaveOutcome::Cancelled;
    };
    let start_dir = canvas
        .path()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    canvas.save_as(&mut NativeFileStore::in_dir(start_dir))
}

/// A tile larger than the image selects mostly padding; refuse it up front.
fn tile_fits(tile: TileSize, (width, height): (u32, u32)) -> Result<(), String> {
    if tile.width() > width || tile.height() > height {
        return Err(format!("tile {} is larger than the {}x{} image", tile, width, height));
    }
    Ok(())
}

fn validate(args: &CliArgs, input_count: usize) -> Result<(), String> {
    let stamps = args.paste.is_some() || args.paste_clipboard;
    if args.extract.is_none() && !args.clipboard && !stamps {
        return Err(
            "nothing to do: pass --extract, --clipboard, --paste or --paste-clipboard".to_string(),
        );
    }
    if (args.extract.is_some() || args.clipboard) && input_count > 1 {
        return Err(format!(
            "--extract / --clipboard copy a single selection but {} inputs were given",
            input_count
        ));
    }
    if !stamps && (args.output.is_some() || args.output_dir.is_some() || args.ask) {
        return Err("--output / --output-dir / --ask only apply when stamping".to_string());
    }
    if args.output.is_some() && args.output_dir.is_some() {
        return Err("use either --output or --output-dir, not both".to_string());
    }
    if args.output.is_some() && input_count > 1 {
        return Err(format!(
            "{} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            input_count
        ));
    }
    Ok(())
}

/// Where a stamped canvas should be written, `None` to overwrite in place.
fn output_path_for(current: Option<&Path>, args: &CliArgs) -> Option<PathBuf> {
    if let Some(out) = &args.output {
        return Some(out.clone());
    }
    let dir = args.output_dir.as_ref()?;
    let file_name = current?.file_name()?;
    if let Err(e) = std::fs::create_dir_all(dir) {
        log_warn!("CLI: could not create {}: {}", dir.display(), e);
    }
    Some(dir.join(file_name))
}

/// Parse `"X,Y"`.  Negative values are fine, they clamp onto the canvas.
pub fn parse_point(s: &str) -> Option<Point> {
    let (x, y) = s.split_once(',')?;
    Some(Point::new(x.trim().parse().ok()?, y.trim().parse().ok()?))
}

/// Expand glob patterns; literal paths pass through if they exist.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for pat in patterns {
        match glob::glob(pat) {
            Ok(paths) => {
                let mut matched = false;
                for entry in paths.flatten() {
                    if entry.is_file() {
                        out.push(entry);
                        matched = true;
                    }
                }
                if !matched {
                    let p = PathBuf::from(pat);
                    if p.is_file() {
                        out.push(p);
                    } else {
                        eprintln!("warning: no files matched '{}'", pat);
                    }
                }
            }
            Err(_) => {
                let p = PathBuf::from(pat);
                if p.is_file() {
                    out.push(p);
                } else {
                    eprintln!("warning: '{}' is not a valid path or glob pattern", pat);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["tilesnap", "-i", "a.png", "--from", "1,2"];
        argv.extend_from_slice(extra);
        CliArgs::try_parse_from(argv).expect("valid args")
    }

    #[test]
    fn parse_point_accepts_signed_pairs() {
        assert_eq!(parse_point("5,5"), Some(Point::new(5, 5)));
        assert_eq!(parse_point(" -3 , 40"), Some(Point::new(-3, 40)));
        assert_eq!(parse_point("5"), None);
        assert_eq!(parse_point("a,b"), None);
    }

    #[test]
    fn validate_requires_an_action() {
        assert!(validate(&args(&[]), 1).is_err());
        assert!(validate(&args(&["--extract", "t.png"]), 1).is_ok());
        assert!(validate(&args(&["--extract", "t.png"]), 2).is_err());
        assert!(validate(&args(&["--extract", "t.png", "-o", "x.png"]), 1).is_err());
        assert!(validate(&args(&["--paste", "s.png", "-o", "x.png"]), 2).is_err());
        assert!(validate(&args(&["--paste", "s.png", "--output-dir", "out"]), 2).is_ok());
    }

    #[test]
    fn validate_clipboard_flags() {
        assert!(validate(&args(&["--clipboard"]), 1).is_ok());
        assert!(validate(&args(&["-c"]), 3).is_err());
        assert!(validate(&args(&["--paste-clipboard", "--output-dir", "out"]), 3).is_ok());
        assert!(validate(&args(&["--extract", "t.png", "--ask"]), 1).is_err());
        assert!(validate(&args(&["--paste", "s.png", "--ask"]), 2).is_ok());
    }

    #[test]
    fn paste_sources_are_exclusive() {
        let argv = ["tilesnap", "-i", "a.png", "--from", "0,0", "-p", "s.png", "--paste-clipboard"];
        assert!(CliArgs::try_parse_from(argv).is_err());
    }

    #[test]
    fn stamp_from_file_or_nothing() {
        assert_eq!(load_stamp(&args(&["--extract", "t.png"])), Ok(None));

        let path = std::env::temp_dir().join(format!("tilesnap-stamp-{}.png", Uuid::new_v4()));
        let stamp = RgbaImage::from_pixel(3, 2, image::Rgba([5, 6, 7, 255]));
        save_image(&stamp, &path).unwrap();
        let loaded = load_stamp(&args(&["--paste", path.to_str().unwrap()]));
        assert_eq!(loaded, Ok(Some(stamp)));
        let _ = std::fs::remove_file(path);

        assert!(load_stamp(&args(&["--paste", "/no/such/stamp.png"])).is_err());
    }

    #[test]
    fn oversized_tile_is_refused() {
        assert!(tile_fits(TileSize::new(16, 16), (32, 32)).is_ok());
        assert!(tile_fits(TileSize::new(32, 32), (32, 32)).is_ok());
        assert!(tile_fits(TileSize::new(60000, 60000), (32, 32)).is_err());
        assert!(tile_fits(TileSize::new(8, 40), (32, 32)).is_err());
    }

    #[test]
    fn refused_tile_leaves_canvas_untouched() {
        let settings = Settings { tile_size: TileSize::new(64, 64), ..Settings::default() };
        let mut canvas = SelectionCanvas::untitled(1);
        canvas.load_image(RgbaImage::new(32, 32));
        let stroke = Stroke { from: Point::new(0, 0), to: Point::new(0, 0), stamp: None };
        let mut clip = SystemClipboard::detached();

        let result = process_canvas(&mut canvas, &settings, &stroke, &args(&["-c"]), &mut clip);
        assert!(result.is_err());
        assert_eq!(canvas.selection(), None);
        assert!(!clip.local().has_tile());
    }

    #[test]
    fn process_canvas_extracts_and_stamps() {
        let settings = Settings { tile_size: TileSize::new(8, 8), ..Settings::default() };
        let mut canvas = SelectionCanvas::untitled(1);
        canvas.load_image(RgbaImage::from_pixel(16, 16, image::Rgba([9, 9, 9, 255])));
        let red = RgbaImage::from_pixel(8, 8, image::Rgba([255, 0, 0, 255]));
        let stroke = Stroke { from: Point::new(9, 9), to: Point::new(9, 9), stamp: Some(&red) };
        let mut clip = SystemClipboard::detached();

        let a = args(&["--paste", "unused.png"]);
        assert_eq!(process_canvas(&mut canvas, &settings, &stroke, &a, &mut clip), Ok(()));
        // The clipboard holds the pixels from before the stamp.
        assert_eq!(*clip.local().tile().unwrap().get_pixel(0, 0), image::Rgba([9, 9, 9, 255]));
        assert_eq!(*canvas.image().unwrap().get_pixel(8, 8), image::Rgba([255, 0, 0, 255]));
        assert_eq!(*canvas.image().unwrap().get_pixel(7, 7), image::Rgba([9, 9, 9, 255]));
        assert!(canvas.is_dirty());
    }

    #[test]
    fn output_path_prefers_explicit_file() {
        let a = args(&["--paste", "s.png", "-o", "x.png"]);
        assert_eq!(output_path_for(Some(Path::new("in/a.png")), &a), Some(PathBuf::from("x.png")));
        let a = args(&["--paste", "s.png"]);
        assert_eq!(output_path_for(Some(Path::new("in/a.png")), &a), None);
    }
}
