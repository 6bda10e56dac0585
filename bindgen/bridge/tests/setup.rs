//! Whole-host setup against the headless runtime.

use raybridge::{
    setup, BindingKind, DuplicatePolicy, FrameLoop, Global, Interpreter, Namespace, Palette,
    SetupConfig, Value,
};
use raybridge_common::error::BridgeError;
use raybridge_common::native::SharedModule;
use raybridge_runtime_headless::{DrawCommand, HeadlessModule, Rgba};
use std::cell::RefCell;
use std::rc::Rc;

fn module(headless: HeadlessModule) -> (Rc<RefCell<HeadlessModule>>, SharedModule) {
    let module = Rc::new(RefCell::new(headless));
    let shared: SharedModule = module.clone();
    (module, shared)
}

fn field(ns: &Namespace, name: &str, field: &str) -> i64 {
    let Value::Packed(value) = ns.value(name).unwrap() else {
        panic!("{name} is not a struct");
    };
    value.get(field).unwrap().as_i64().unwrap()
}

#[test]
fn named_colors_are_installed() {
    let (_module, shared) = module(HeadlessModule::default());
    let mut ns = Namespace::new();
    setup(shared, &mut ns, &SetupConfig::default()).unwrap();

    assert_eq!(field(&ns, "RED", "r"), 230);
    assert_eq!(field(&ns, "RAYWHITE", "g"), 245);
    assert_eq!(field(&ns, "BLANK", "a"), 0);

    let Value::Packed(red) = ns.value("RED").unwrap() else {
        unreachable!()
    };
    assert!(red.is_frozen());
    assert!(matches!(
        red.set("r", &Value::Int(1)),
        Err(BridgeError::FrozenValue { .. })
    ));
}

#[test]
fn functions_are_bound_raw_or_adapted() {
    let (_module, shared) = module(HeadlessModule::default());
    let mut ns = Namespace::new();
    let session = setup(shared, &mut ns, &SetupConfig::default()).unwrap();

    let kind = |name: &str| {
        session
            .bridge
            .catalog()
            .find(|(n, _)| *n == name)
            .map(|(_, k)| k)
    };
    assert_eq!(kind("BeginDrawing"), Some(BindingKind::Raw));
    assert_eq!(kind("DrawFPS"), Some(BindingKind::Raw));
    assert_eq!(kind("InitWindow"), Some(BindingKind::Adapted));
    assert_eq!(kind("ClearBackground"), Some(BindingKind::Adapted));
    assert_eq!(kind("GetFontDefault"), Some(BindingKind::Adapted));
    assert_eq!(kind("WindowShouldClose"), Some(BindingKind::Adapted));
    assert!(matches!(
        ns.call("WindowShouldClose", &[]).unwrap(),
        Value::Bool(false)
    ));
    assert_eq!(kind("DrawLine"), None, "not exported by the headless module");

    let skipped: Vec<&str> = session.skipped.iter().map(|(n, _)| n.as_str()).collect();
    assert!(skipped.contains(&"DrawLine"));
    assert!(skipped.contains(&"SetTraceLogCallback"));
    assert!(matches!(ns.get("DrawLine"), Err(BridgeError::UndefinedName { .. })));
}

#[test]
fn constructors_and_defines() {
    let (_module, shared) = module(HeadlessModule::default());
    let mut ns = Namespace::new();
    setup(shared, &mut ns, &SetupConfig::default()).unwrap();

    let rect = ns.construct("Rectangle", &[Value::Float(1.0), Value::Float(2.0)]).unwrap();
    assert_eq!(rect.get("y").unwrap().as_f64(), Some(2.0));
    assert_eq!(rect.get("height").unwrap().as_f64(), Some(0.0));

    let Value::Packed(texture) = ns.call("Texture2D", &[Value::Int(7)]).unwrap() else {
        panic!("constructor did not return a struct");
    };
    assert_eq!(texture.name(), "Texture");
    assert!(matches!(ns.value("KEY_SPACE").unwrap(), Value::Int(32)));
    assert!(matches!(ns.value("RAYLIB_VERSION").unwrap(), Value::Str(ref s) if s == "4.5"));
    assert!(matches!(ns.get("DEG2RAD"), Err(BridgeError::UndefinedName { .. })));
}

#[test]
fn manual_palette_installs_no_colors() {
    let (module, shared) = module(HeadlessModule::default());
    let mut ns = Namespace::new();
    let config = SetupConfig {
        palette: Palette::Manual,
        ..SetupConfig::default()
    };
    setup(shared, &mut ns, &config).unwrap();
    assert!(ns.get("RED").is_err());
    assert!(matches!(ns.get("Color").unwrap(), Global::Constructor(_)));
    assert_eq!(module.borrow().live_blocks(), 0);
}

#[test]
fn loading_module_fails_setup() {
    let (_module, shared) = module(HeadlessModule::loading(4));
    let mut ns = Namespace::new();
    let err = setup(shared, &mut ns, &SetupConfig::default()).unwrap_err();
    assert!(matches!(err, BridgeError::NotInitialized));
    assert!(err.is_setup_error());
    assert!(ns.is_empty());
}

#[test]
fn collisions_are_rejected_before_anything_is_installed() {
    let (module, shared) = module(HeadlessModule::default());
    let mut ns = Namespace::new();
    ns.set_global("RED", Global::Constant(Value::Int(0)));

    let err = setup(shared, &mut ns, &SetupConfig::default()).unwrap_err();
    assert!(matches!(err, BridgeError::DuplicateBinding { ref name } if name == "RED"));
    assert_eq!(ns.len(), 1);
    // The palette allocated for the failed table has been released.
    assert_eq!(module.borrow().live_blocks(), 0);
}

#[test]
fn overwrite_policy_replaces_existing_globals() {
    let (_module, shared) = module(HeadlessModule::default());
    let mut ns = Namespace::new();
    ns.set_global("RED", Global::Constant(Value::Int(0)));
    let config = SetupConfig {
        duplicates: DuplicatePolicy::Overwrite,
        ..SetupConfig::default()
    };
    setup(shared, &mut ns, &config).unwrap();
    assert_eq!(field(&ns, "RED", "r"), 230);
}

#[test]
fn basic_window_runs_for_a_few_frames() {
    let (module, shared) = module(HeadlessModule::default().close_after(3));
    let mut ns = Namespace::new();
    setup(shared, &mut ns, &SetupConfig::default()).unwrap();

    ns.define_entry("init", |ns| {
        ns.call(
            "InitWindow",
            &[Value::Int(800), Value::Int(450), Value::from("basic window")],
        )?;
        ns.call("SetTargetFPS", &[Value::Int(60)])?;
        Ok(())
    });
    ns.define_entry("update", |ns| {
        ns.call("BeginDrawing", &[])?;
        ns.call("ClearBackground", &[ns.value("RAYWHITE")?])?;
        ns.call(
            "DrawText",
            &[
                Value::from("Congrats! You created your first window!"),
                Value::Int(190),
                Value::Int(200),
                Value::Int(20),
                ns.value("LIGHTGRAY")?,
            ],
        )?;
        ns.call("EndDrawing", &[])?;
        Ok(())
    });

    let report = FrameLoop::new(100).run(&mut ns).unwrap();
    assert_eq!(report.frames, 3);
    assert!(report.closed);
    assert_eq!(report.errors, 0);

    let module = module.borrow();
    let log = module.draw_log();
    assert_eq!(
        log[0],
        DrawCommand::InitWindow {
            width: 800,
            height: 450,
            title: "basic window".into(),
        }
    );
    let clears = log
        .iter()
        .filter(|c| **c == DrawCommand::Clear(Rgba { r: 245, g: 245, b: 245, a: 255 }))
        .count();
    assert_eq!(clears, 3);
    assert_eq!(module.frames(), 3);
}

#[test]
fn failing_frames_do_not_stop_the_loop() {
    let (_module, shared) = module(HeadlessModule::default());
    let mut ns = Namespace::new();
    setup(shared, &mut ns, &SetupConfig::default()).unwrap();
    ns.define_entry("update", |ns| {
        ns.call("BeginDrawing", &[])?;
        // Wrong kind: a string where a Color is expected.
        ns.call("ClearBackground", &[Value::from("white")])?;
        ns.call("EndDrawing", &[])?;
        Ok(())
    });
    let report = FrameLoop::new(4).run(&mut ns).unwrap();
    assert_eq!(report.frames, 4);
    assert_eq!(report.errors, 4);
    assert!(!report.closed);
}
