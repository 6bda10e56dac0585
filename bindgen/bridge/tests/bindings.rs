//! Raw and adapted calls through the headless runtime.

use raybridge::{BindingKind, Bridge, Value};
use raybridge_common::error::BridgeError;
use raybridge_common::native::{NativeError, NativeModule, NativeValue, SharedModule};
use raybridge_common::types::{ParamKind, ScalarKind};
use raybridge_layout::{FieldKind, Layout, ReturnKind, Signature};
use raybridge_runtime_headless::{DrawCommand, HeadlessModule, Rgba};
use std::cell::RefCell;
use std::rc::Rc;

fn headless() -> (Rc<RefCell<HeadlessModule>>, Bridge) {
    let module = Rc::new(RefCell::new(HeadlessModule::default()));
    let shared: SharedModule = module.clone();
    (module, Bridge::initialize(shared).unwrap())
}

fn strlen(m: &mut HeadlessModule, args: &[NativeValue]) -> Result<Option<NativeValue>, NativeError> {
    let text = m.read_cstr(args[0].as_address())?;
    Ok(Some(NativeValue::Int(text.len() as i64)))
}

fn echo(_: &mut HeadlessModule, args: &[NativeValue]) -> Result<Option<NativeValue>, NativeError> {
    Ok(Some(args[0]))
}

fn trap(_: &mut HeadlessModule, _: &[NativeValue]) -> Result<Option<NativeValue>, NativeError> {
    Err(NativeError::Trap {
        name: "Explode".into(),
        message: "unreachable executed".into(),
    })
}

fn red(bridge: &Bridge) -> Rc<raybridge::PackedValue> {
    let values: Vec<Value> = [230, 41, 55, 255].iter().map(|&c| Value::Int(c)).collect();
    bridge
        .define_packed(&Rc::new(Layout::color()), &values)
        .unwrap()
}

#[test]
fn raw_init_window_forwards_arguments_unchanged() {
    let (module, mut bridge) = headless();
    bridge.bind_raw("InitWindow", "InitWindow").unwrap();
    bridge.bind_raw("GetScreenWidth", "GetScreenWidth").unwrap();

    let result = bridge
        .call("InitWindow", &[Value::Int(800), Value::Int(600), Value::Int(0)])
        .unwrap();
    assert!(matches!(result, Value::Void));
    let (name, args) = module.borrow().calls().last().cloned().unwrap();
    assert_eq!(name, "InitWindow");
    assert_eq!(
        args,
        vec![NativeValue::Int(800), NativeValue::Int(600), NativeValue::Int(0)]
    );

    assert!(matches!(
        bridge.call("GetScreenWidth", &[]).unwrap(),
        Value::Int(800)
    ));
}

#[test]
fn raw_results_are_returned_unchanged() {
    let (module, mut bridge) = headless();
    module.borrow_mut().register("Echo", 1, echo);
    bridge.bind_raw("Echo", "Echo").unwrap();
    assert!(matches!(
        bridge.call("Echo", &[Value::Float(2.5)]).unwrap(),
        Value::Float(v) if v == 2.5
    ));
    assert!(matches!(
        bridge.call("Echo", &[Value::Int(-7)]).unwrap(),
        Value::Int(-7)
    ));
}

#[test]
fn raw_bindings_refuse_text() {
    let (_module, mut bridge) = headless();
    bridge.bind_raw("InitWindow", "InitWindow").unwrap();
    let err = bridge
        .call("InitWindow", &[Value::Int(800), Value::Int(600), Value::from("demo")])
        .unwrap_err();
    assert!(matches!(err, BridgeError::SignatureMismatch { .. }));
}

#[test]
fn catalog_lists_bindings_in_order() {
    let (_module, mut bridge) = headless();
    bridge
        .bind_adapted(
            "ClearBackground",
            "ClearBackground",
            Signature::new(vec![ParamKind::Pointer], ReturnKind::Void),
        )
        .unwrap();
    bridge
        .bind_adapted(
            "DrawText",
            "DrawText",
            Signature::new(
                vec![
                    ParamKind::Text,
                    ParamKind::Numeric,
                    ParamKind::Numeric,
                    ParamKind::Numeric,
                    ParamKind::Pointer,
                ],
                ReturnKind::Void,
            ),
        )
        .unwrap();

    let catalog: Vec<_> = bridge.catalog().collect();
    assert_eq!(
        catalog,
        vec![
            ("ClearBackground", BindingKind::Adapted),
            ("DrawText", BindingKind::Adapted),
        ]
    );
    // Enumerating twice gives the same answer.
    assert_eq!(bridge.catalog().count(), 2);

    let rendered: Vec<String> = bridge
        .catalog()
        .map(|(name, kind)| format!("{name}: {kind}"))
        .collect();
    insta::assert_debug_snapshot!(rendered, @r#"
    [
        "ClearBackground: adapted",
        "DrawText: adapted",
    ]
    "#);
}

#[test]
fn adapted_draw_text_marshals_text_and_color() {
    let (module, mut bridge) = headless();
    bridge
        .bind_adapted(
            "DrawText",
            "DrawText",
            Signature::new(
                vec![
                    ParamKind::Text,
                    ParamKind::Numeric,
                    ParamKind::Numeric,
                    ParamKind::Numeric,
                    ParamKind::Pointer,
                ],
                ReturnKind::Void,
            ),
        )
        .unwrap();
    let red = red(&bridge);
    bridge
        .call(
            "DrawText",
            &[
                Value::from("Congrats!"),
                Value::Int(150),
                Value::Int(200),
                Value::Int(20),
                Value::Packed(red),
            ],
        )
        .unwrap();
    assert_eq!(
        module.borrow().draw_log(),
        &[DrawCommand::Text {
            text: "Congrats!".into(),
            x: 150,
            y: 200,
            size: 20,
            color: Rgba { r: 230, g: 41, b: 55, a: 255 },
        }]
    );
}

#[test]
fn text_arguments_are_nul_terminated_and_freed() {
    let (module, mut bridge) = headless();
    module.borrow_mut().register("StrLen", 1, strlen);
    bridge
        .bind_adapted(
            "StrLen",
            "StrLen",
            Signature::new(vec![ParamKind::Text], ReturnKind::Numeric),
        )
        .unwrap();

    let text = "héllo wörld";
    let result = bridge.call("StrLen", &[Value::from(text)]).unwrap();
    assert!(matches!(result, Value::Int(n) if n == text.len() as i64));

    let address = module.borrow().calls().last().unwrap().1[0].as_address();
    let mut stored = vec![0u8; text.len() + 1];
    module.borrow().read(address, &mut stored).unwrap();
    assert_eq!(&stored[..text.len()], text.as_bytes());
    assert_eq!(stored[text.len()], 0);
    assert!(!module.borrow().is_live(address), "text buffer outlived the call");

    let high_water = module.borrow().stats().high_water;
    for _ in 0..500 {
        bridge.call("StrLen", &[Value::from(text)]).unwrap();
    }
    let stats = module.borrow().stats();
    assert_eq!(stats.high_water, high_water);
    assert_eq!(stats.allocs, stats.frees);
    assert_eq!(module.borrow().live_blocks(), 0);
}

#[test]
fn text_with_an_interior_nul_is_rejected() {
    let (module, mut bridge) = headless();
    module.borrow_mut().register("StrLen", 1, strlen);
    bridge
        .bind_adapted(
            "StrLen",
            "StrLen",
            Signature::new(vec![ParamKind::Text], ReturnKind::Numeric),
        )
        .unwrap();

    let err = bridge.call("StrLen", &[Value::from("ab\0cd")]).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"Signature error: StrLen: argument 1: text contains a NUL byte");
    assert!(module.borrow().calls().is_empty());
    assert_eq!(module.borrow().stats().allocs, 0);
}

#[test]
fn text_is_freed_when_the_native_call_fails() {
    let (module, mut bridge) = headless();
    module.borrow_mut().register("Explode", 1, trap);
    bridge
        .bind_adapted(
            "Explode",
            "Explode",
            Signature::new(vec![ParamKind::Text], ReturnKind::Void),
        )
        .unwrap();
    let err = bridge.call("Explode", &[Value::from("boom")]).unwrap_err();
    assert!(matches!(err, BridgeError::Native(NativeError::Trap { .. })));
    assert_eq!(module.borrow().live_blocks(), 0);
}

#[test]
fn text_is_freed_when_a_later_argument_is_wrong() {
    let (module, mut bridge) = headless();
    bridge
        .bind_adapted(
            "DrawText",
            "DrawText",
            Signature::new(
                vec![
                    ParamKind::Text,
                    ParamKind::Numeric,
                    ParamKind::Numeric,
                    ParamKind::Numeric,
                    ParamKind::Pointer,
                ],
                ReturnKind::Void,
            ),
        )
        .unwrap();
    let err = bridge
        .call(
            "DrawText",
            &[
                Value::from("hi"),
                Value::Int(0),
                Value::Int(0),
                Value::Int(10),
                Value::from("not a color"),
            ],
        )
        .unwrap_err();
    assert!(err.to_string().contains("argument 5: expected pointer, got text"));
    assert_eq!(module.borrow().live_blocks(), 0);
    assert!(module.borrow().draw_log().is_empty());
}

#[test]
fn adapted_arity_is_checked() {
    let (_module, mut bridge) = headless();
    bridge
        .bind_adapted(
            "ClearBackground",
            "ClearBackground",
            Signature::new(vec![ParamKind::Pointer], ReturnKind::Void),
        )
        .unwrap();
    let err = bridge.call("ClearBackground", &[]).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"Signature error: ClearBackground: expected 1 arguments, got 0");
}

#[test]
fn struct_returns_use_a_result_pointer() {
    let (module, mut bridge) = headless();
    let int = || FieldKind::Scalar(ScalarKind::I32);
    let texture = Rc::new(Layout::new(
        "Texture",
        ["id", "width", "height", "mipmaps", "format"]
            .iter()
            .map(|n| (n.to_string(), int()))
            .collect(),
    ));
    let font = Rc::new(Layout::new(
        "Font",
        vec![
            ("baseSize".into(), int()),
            ("glyphCount".into(), int()),
            ("glyphPadding".into(), int()),
            ("texture".into(), FieldKind::Struct(texture)),
            ("recs".into(), FieldKind::Pointer),
            ("glyphs".into(), FieldKind::Pointer),
        ],
    ));
    bridge
        .bind_adapted(
            "GetFontDefault",
            "GetFontDefault",
            Signature::new(vec![], ReturnKind::Struct(font)),
        )
        .unwrap();

    let Value::Packed(font) = bridge.call("GetFontDefault", &[]).unwrap() else {
        panic!("expected a Font");
    };
    assert!(font.is_owned());
    assert_eq!(font.get("baseSize").unwrap().as_i64(), Some(10));
    assert_eq!(font.get("glyphCount").unwrap().as_i64(), Some(224));
    let Value::Packed(atlas) = font.get("texture").unwrap() else {
        panic!("expected a Texture view");
    };
    assert_eq!(atlas.get("width").unwrap().as_i64(), Some(128));

    drop(font);
    drop(atlas);
    assert_eq!(module.borrow().live_blocks(), 0);
}

#[test]
fn boolean_results() {
    let (module, mut bridge) = headless();
    *module.borrow_mut() = HeadlessModule::default().close_after(0);
    bridge
        .bind_adapted(
            "WindowShouldClose",
            "WindowShouldClose",
            Signature::new(vec![], ReturnKind::Boolean),
        )
        .unwrap();
    assert!(matches!(
        bridge.call("WindowShouldClose", &[]).unwrap(),
        Value::Bool(true)
    ));
}
