use crate::canvas::SelectionCanvas;
use crate::grid::Point;
use crate::ops::clipboard::TileExchange;
use crate::settings::Settings;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Tool {
    Pencil,
    Fill,
    Line,
    Ellipse,
    Rectangle,
    #[default]
    Selection,
    Zoom,
}

impl Tool {
    pub fn all() -> &'static [Tool] {
        &[
            Tool::Pencil,
            Tool::Fill,
            Tool::Line,
            Tool::Ellipse,
            Tool::Rectangle,
            Tool::Selection,
            Tool::Zoom,
        ]
    }

    /// Stable identifier used in the settings file.
    pub fn key(&self) -> &'static str {
        match self {
            Tool::Pencil => "pencil",
            Tool::Fill => "fill",
            Tool::Line => "line",
            Tool::Ellipse => "ellipse",
            Tool::Rectangle => "rectangle",
            Tool::Selection => "selection",
            Tool::Zoom => "zoom",
        }
    }

    pub fn from_key(key: &str) -> Option<Tool> {
        Tool::all().iter().copied().find(|t| t.key() == key)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tool::Pencil => "Pencil",
            Tool::Fill => "Flood Fill",
            Tool::Line => "Line",
            Tool::Ellipse => "Ellipse",
            Tool::Rectangle => "Rectangle",
            Tool::Selection => "Tile Selection",
            Tool::Zoom => "Zoom",
        }
    }

    /// Pointer handler for this tool.  Every tool shares the same signature
    /// so the canvas can route events without knowing which tool is active.
    pub fn handler(self) -> ToolHandler {
        match self {
            Tool::Selection => selection_tool,
            Tool::Pencil
            | Tool::Fill
            | Tool::Line
            | Tool::Ellipse
            | Tool::Rectangle
            | Tool::Zoom => passive_tool,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Primary,
    Secondary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerEvent {
    Press { button: MouseButton, pos: Point },
    Move { pos: Point },
    Release { button: MouseButton, pos: Point },
    Leave,
}

/// What a handler did with an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolResponse {
    Ignored,
    SelectionStarted,
    SelectionChanged,
    PreviewMoved,
    /// A copy of the selection went to the tile exchange.
    TileExtracted,
    /// A replacement was requested; `true` if pixels actually changed.
    Placed(bool),
    PointerLeft,
}

/// Everything a handler may read or call besides the canvas itself.
pub struct ToolContext<'a> {
    pub settings: &'a Settings,
    pub exchange: &'a mut dyn TileExchange,
}

pub type ToolHandler = fn(&mut SelectionCanvas, PointerEvent, &mut ToolContext<'_>) -> ToolResponse;

/// Route `event` to the handler of the tool currently chosen in settings.
pub fn dispatch(
    canvas: &mut SelectionCanvas,
    event: PointerEvent,
    ctx: &mut ToolContext<'_>,
) -> ToolResponse {
    let handler = ctx.settings.tool.handler();
    handler(canvas, event, ctx)
}

fn selection_tool(
    canvas: &mut SelectionCanvas,
    event: PointerEvent,
    ctx: &mut ToolContext<'_>,
) -> ToolResponse {
    let tile = ctx.settings.tile_size;
    match event {
        PointerEvent::Press { button: MouseButton::Secondary, pos } => {
            if canvas.begin_selection(pos, tile) {
                ToolResponse::SelectionStarted
            } else {
                ToolResponse::Ignored
            }
        }
        PointerEvent::Press { button: MouseButton::Primary, .. } => ToolResponse::Ignored,
        PointerEvent::Move { pos } => {
            let was_selecting = canvas.is_selecting();
            canvas.extend_selection(pos, tile);
            if was_selecting {
                ToolResponse::SelectionChanged
            } else {
                ToolResponse::PreviewMoved
            }
        }
        PointerEvent::Release { button: MouseButton::Secondary, .. } => {
            match canvas.end_selection() {
                Some(tile_image) => {
                    ctx.exchange.receive(tile_image);
                    ToolResponse::TileExtracted
                }
                None => ToolResponse::Ignored,
            }
        }
        PointerEvent::Release { button: MouseButton::Primary, .. } => {
            canvas.cancel_drag();
            let transparency = ctx.settings.transparency_enabled;
            let changed = canvas.request_replace(transparency, &mut *ctx.exchange);
            ToolResponse::Placed(changed)
        }
        PointerEvent::Leave => {
            canvas.pointer_left();
            ToolResponse::PointerLeft
        }
    }
}

/// Tools whose painting lives outside the tile core.  They only keep the
/// hover state honest.
fn passive_tool(
    canvas: &mut SelectionCanvas,
    event: PointerEvent,
    _ctx: &mut ToolContext<'_>,
) -> ToolResponse {
    match event {
        PointerEvent::Leave => {
            canvas.pointer_left();
            ToolResponse::PointerLeft
        }
        _ => ToolResponse::Ignored,
    }
}
