//! raylib-shaped exports that record what they would have drawn.
//!
//! Struct arguments arrive as the address of a packed copy, struct results
//! are written through a hidden first pointer, and strings are addresses of
//! NUL-terminated UTF-8, matching the wasm32 C ABI.

use crate::{HeadlessModule, Window};
use raybridge_common::native::{NativeError, NativeModule, NativeValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl From<[u8; 4]> for Rgba {
    fn from([r, g, b, a]: [u8; 4]) -> Self {
        Self { r, g, b, a }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    InitWindow {
        width: i64,
        height: i64,
        title: String,
    },
    CloseWindow,
    TargetFps(i64),
    BeginDrawing,
    EndDrawing,
    Clear(Rgba),
    Text {
        text: String,
        x: i64,
        y: i64,
        size: i64,
        color: Rgba,
    },
    Fps {
        x: i64,
        y: i64,
    },
    Rectangle {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: Rgba,
    },
    Circle {
        x: i64,
        y: i64,
        radius: f64,
        color: Rgba,
    },
}

type Result<T> = std::result::Result<T, NativeError>;

// ─── Argument helpers ───

fn int(args: &[NativeValue], i: usize) -> i64 {
    args[i].as_i64()
}

fn float(args: &[NativeValue], i: usize) -> f64 {
    args[i].as_f64()
}

fn color(m: &HeadlessModule, address: NativeValue) -> Result<Rgba> {
    let mut bytes = [0u8; 4];
    m.read(address.as_address(), &mut bytes)?;
    Ok(bytes.into())
}

fn text(m: &HeadlessModule, address: NativeValue) -> Result<String> {
    m.read_cstr(address.as_address())
}

fn f32_at(bytes: &[u8], offset: usize) -> f64 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    f32::from_le_bytes(raw) as f64
}

fn boolean(value: bool) -> Option<NativeValue> {
    Some(NativeValue::Int(value as i64))
}

pub(crate) fn register_defaults(m: &mut HeadlessModule) {
    m.register("InitWindow", 3, init_window);
    m.register("CloseWindow", 0, close_window);
    m.register("WindowShouldClose", 0, window_should_close);
    m.register("SetTargetFPS", 1, set_target_fps);
    m.register("GetScreenWidth", 0, screen_width);
    m.register("GetScreenHeight", 0, screen_height);
    m.register("BeginDrawing", 0, begin_drawing);
    m.register("EndDrawing", 0, end_drawing);
    m.register("ClearBackground", 1, clear_background);
    m.register("DrawText", 5, draw_text);
    m.register("DrawFPS", 2, draw_fps);
    m.register("MeasureText", 2, measure_text);
    m.register("DrawRectangle", 5, draw_rectangle);
    m.register("DrawRectangleRec", 2, draw_rectangle_rec);
    m.register("DrawCircle", 4, draw_circle);
    m.register("GetFontDefault", 1, font_default);
}

// ─── Window ───

fn init_window(m: &mut HeadlessModule, args: &[NativeValue]) -> Result<Option<NativeValue>> {
    let (width, height) = (int(args, 0), int(args, 1));
    // raylib accepts a null title.
    let title = match args[2].as_address() {
        0 => String::new(),
        _ => text(m, args[2])?,
    };
    tracing::debug!(width, height, %title, "window opened");
    m.window = Some(Window { width, height });
    m.record(DrawCommand::InitWindow { width, height, title });
    Ok(None)
}

fn close_window(m: &mut HeadlessModule, _: &[NativeValue]) -> Result<Option<NativeValue>> {
    m.window = None;
    m.record(DrawCommand::CloseWindow);
    Ok(None)
}

fn window_should_close(m: &mut HeadlessModule, _: &[NativeValue]) -> Result<Option<NativeValue>> {
    let expired = m.close_after.is_some_and(|limit| m.frames >= limit);
    Ok(boolean(expired))
}

fn set_target_fps(m: &mut HeadlessModule, args: &[NativeValue]) -> Result<Option<NativeValue>> {
    m.record(DrawCommand::TargetFps(int(args, 0)));
    Ok(None)
}

fn screen_width(m: &mut HeadlessModule, _: &[NativeValue]) -> Result<Option<NativeValue>> {
    let width = m.window.as_ref().map_or(0, |w| w.width);
    Ok(Some(NativeValue::Int(width)))
}

fn screen_height(m: &mut HeadlessModule, _: &[NativeValue]) -> Result<Option<NativeValue>> {
    let height = m.window.as_ref().map_or(0, |w| w.height);
    Ok(Some(NativeValue::Int(height)))
}

// ─── Frame ───

fn begin_drawing(m: &mut HeadlessModule, _: &[NativeValue]) -> Result<Option<NativeValue>> {
    m.record(DrawCommand::BeginDrawing);
    Ok(None)
}

fn end_drawing(m: &mut HeadlessModule, _: &[NativeValue]) -> Result<Option<NativeValue>> {
    m.frames += 1;
    m.record(DrawCommand::EndDrawing);
    Ok(None)
}

fn clear_background(m: &mut HeadlessModule, args: &[NativeValue]) -> Result<Option<NativeValue>> {
    let color = color(m, args[0])?;
    m.record(DrawCommand::Clear(color));
    Ok(None)
}

// ─── Text ───

fn draw_text(m: &mut HeadlessModule, args: &[NativeValue]) -> Result<Option<NativeValue>> {
    let command = DrawCommand::Text {
        text: text(m, args[0])?,
        x: int(args, 1),
        y: int(args, 2),
        size: int(args, 3),
        color: color(m, args[4])?,
    };
    m.record(command);
    Ok(None)
}

fn draw_fps(m: &mut HeadlessModule, args: &[NativeValue]) -> Result<Option<NativeValue>> {
    m.record(DrawCommand::Fps {
        x: int(args, 0),
        y: int(args, 1),
    });
    Ok(None)
}

/// Monospace approximation: every glyph is half as wide as the font size.
fn measure_text(m: &mut HeadlessModule, args: &[NativeValue]) -> Result<Option<NativeValue>> {
    let chars = text(m, args[0])?.chars().count() as i64;
    Ok(Some(NativeValue::Int(chars * int(args, 1) / 2)))
}

// ─── Shapes ───

fn draw_rectangle(m: &mut HeadlessModule, args: &[NativeValue]) -> Result<Option<NativeValue>> {
    let command = DrawCommand::Rectangle {
        x: float(args, 0),
        y: float(args, 1),
        width: float(args, 2),
        height: float(args, 3),
        color: color(m, args[4])?,
    };
    m.record(command);
    Ok(None)
}

fn draw_rectangle_rec(m: &mut HeadlessModule, args: &[NativeValue]) -> Result<Option<NativeValue>> {
    let mut rec = [0u8; 16];
    m.read(args[0].as_address(), &mut rec)?;
    let command = DrawCommand::Rectangle {
        x: f32_at(&rec, 0),
        y: f32_at(&rec, 4),
        width: f32_at(&rec, 8),
        height: f32_at(&rec, 12),
        color: color(m, args[1])?,
    };
    m.record(command);
    Ok(None)
}

fn draw_circle(m: &mut HeadlessModule, args: &[NativeValue]) -> Result<Option<NativeValue>> {
    let command = DrawCommand::Circle {
        x: int(args, 0),
        y: int(args, 1),
        radius: float(args, 2),
        color: color(m, args[3])?,
    };
    m.record(command);
    Ok(None)
}

// ─── Fonts ───

/// Writes the 40-byte `Font` through the hidden result pointer.
fn font_default(m: &mut HeadlessModule, args: &[NativeValue]) -> Result<Option<NativeValue>> {
    // baseSize, glyphCount, glyphPadding, texture {id, width, height,
    // mipmaps, format}, recs, glyphs
    let words: [u32; 10] = [10, 224, 0, 1, 128, 128, 1, 2, 0, 0];
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    m.write(args[0].as_address(), &bytes)?;
    Ok(None)
}
