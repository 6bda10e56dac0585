//! The bundled script: raylib's "core - basic window" example.

use raybridge::{Namespace, Value};
use raybridge_common::error::BridgeError;

const SCREEN_WIDTH: i64 = 800;
const SCREEN_HEIGHT: i64 = 450;

/// A named color, or the same color built with the `Color` constructor
/// when setup ran with a manual palette.
fn color(ns: &Namespace, name: &str, rgba: [i64; 4]) -> Result<Value, BridgeError> {
    match ns.value(name) {
        Ok(value) => Ok(value),
        Err(BridgeError::UndefinedName { .. }) => {
            let fields: Vec<Value> = rgba.iter().map(|&c| Value::Int(c)).collect();
            ns.call("Color", &fields)
        }
        Err(err) => Err(err),
    }
}

pub fn install(ns: &mut Namespace) {
    ns.define_entry("init", |ns| {
        ns.call(
            "InitWindow",
            &[
                Value::Int(SCREEN_WIDTH),
                Value::Int(SCREEN_HEIGHT),
                Value::from("raylib [core] example - basic window"),
            ],
        )?;
        ns.call("SetTargetFPS", &[Value::Int(60)])?;
        let font = ns.call("GetFontDefault", &[])?;
        tracing::info!(%font, "default font");
        Ok(())
    });

    ns.define_entry("update", |ns| {
        ns.call("BeginDrawing", &[])?;
        ns.call("ClearBackground", &[color(ns, "RAYWHITE", [245, 245, 245, 255])?])?;
        ns.call(
            "DrawText",
            &[
                Value::from("Congrats! You created your first window!"),
                Value::Int(190),
                Value::Int(200),
                Value::Int(20),
                color(ns, "LIGHTGRAY", [200, 200, 200, 255])?,
            ],
        )?;
        ns.call("DrawFPS", &[Value::Int(10), Value::Int(10)])?;
        ns.call("EndDrawing", &[])?;
        Ok(())
    });
}
