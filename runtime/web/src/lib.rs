//! raybridge in the browser: a raylib module built with Emscripten, driven
//! from JavaScript.
//!
//! ```js
//! const bridge = new WebBridge(Module);
//! bridge.call("InitWindow", [800, 450, "basic window"]);
//! const white = bridge.global("RAYWHITE");
//! bridge.call("ClearBackground", [white]);
//! ```
//!
//! Structs cross into JS as `{ handle, type }` objects. Their native memory
//! is released after the garbage collector finalizes the last such object.

mod handles;
mod module;

pub use handles::HandleTable;
pub use module::EmscriptenModule;

use js_sys::{Array, Function, Object, Reflect};
use raybridge::{setup, Namespace, PackedValue, Session, SetupConfig, Value};
use raybridge_common::error::BridgeError;
use raybridge_common::native::SharedModule;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

/// JS numbers up to this magnitude are exact integers.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

#[wasm_bindgen]
extern "C" {
    type FinalizationRegistry;

    #[wasm_bindgen(constructor)]
    fn new(cleanup: &Function) -> FinalizationRegistry;

    #[wasm_bindgen(method)]
    fn register(this: &FinalizationRegistry, target: &JsValue, held: &JsValue);
}

fn to_js(err: BridgeError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[wasm_bindgen]
pub struct WebBridge {
    namespace: Namespace,
    session: Session,
    handles: Rc<RefCell<HandleTable>>,
    registry: FinalizationRegistry,
    // Called by the registry; must outlive every registered object.
    _finalize: Closure<dyn FnMut(JsValue)>,
}

#[wasm_bindgen]
impl WebBridge {
    /// Bind every export of `module`. `config` is a setup config as JSON.
    #[wasm_bindgen(constructor)]
    pub fn new(module: JsValue, config: Option<String>) -> Result<WebBridge, JsValue> {
        let config = match config {
            Some(json) => SetupConfig::from_json(&json).map_err(to_js)?,
            None => SetupConfig::default(),
        };
        let shared: SharedModule = Rc::new(RefCell::new(EmscriptenModule::new(module)));
        let mut namespace = Namespace::new();
        let session = setup(shared, &mut namespace, &config).map_err(to_js)?;

        web_sys::console::log_1(&JsValue::from_str(&format!(
            "raybridge: {} functions bound, {} skipped",
            session.bridge.len(),
            session.skipped.len()
        )));

        let handles = Rc::new(RefCell::new(HandleTable::new()));
        let table = Rc::clone(&handles);
        let finalize = Closure::<dyn FnMut(JsValue)>::new(move |held: JsValue| {
            if let Some(id) = held.as_f64() {
                table.borrow_mut().release(id as u32);
            }
        });
        let registry = FinalizationRegistry::new(finalize.as_ref().unchecked_ref());

        Ok(WebBridge {
            namespace,
            session,
            handles,
            registry,
            _finalize: finalize,
        })
    }

    /// `[name, "raw" | "adapted"]` pairs in binding order.
    pub fn catalog(&self) -> Array {
        self.session
            .bridge
            .catalog()
            .map(|(name, kind)| {
                JsValue::from(Array::of2(
                    &JsValue::from_str(name),
                    &JsValue::from_str(&kind.to_string()),
                ))
            })
            .collect()
    }

    pub fn call(&self, name: &str, args: Array) -> Result<JsValue, JsValue> {
        let args = args
            .iter()
            .map(|arg| self.value_from_js(&arg))
            .collect::<Result<Vec<_>, _>>()?;
        let result = self.namespace.call(name, &args).map_err(to_js)?;
        self.value_to_js(result)
    }

    /// A named color or define.
    pub fn global(&self, name: &str) -> Result<JsValue, JsValue> {
        let value = self.namespace.value(name).map_err(to_js)?;
        self.value_to_js(value)
    }

    #[wasm_bindgen(js_name = getField)]
    pub fn get_field(&self, target: JsValue, field: &str) -> Result<JsValue, JsValue> {
        let value = self.packed(&target)?.get(field).map_err(to_js)?;
        self.value_to_js(value)
    }

    #[wasm_bindgen(js_name = setField)]
    pub fn set_field(&self, target: JsValue, field: &str, value: JsValue) -> Result<(), JsValue> {
        let value = self.value_from_js(&value)?;
        self.packed(&target)?.set(field, &value).map_err(to_js)
    }

    /// Distinct structs and arrays currently reachable from JS.
    #[wasm_bindgen(getter, js_name = liveHandles)]
    pub fn live_handles(&self) -> usize {
        self.handles.borrow().len()
    }
}

impl WebBridge {
    fn packed(&self, target: &JsValue) -> Result<Rc<PackedValue>, JsValue> {
        match self.value_from_js(target)? {
            Value::Packed(p) => Ok(p),
            other => Err(JsValue::from_str(&format!(
                "expected a struct, got {}",
                other.kind_name()
            ))),
        }
    }

    fn value_from_js(&self, value: &JsValue) -> Result<Value, JsValue> {
        if value.is_undefined() || value.is_null() {
            return Ok(Value::Void);
        }
        if let Some(b) = value.as_bool() {
            return Ok(Value::Bool(b));
        }
        if let Some(n) = value.as_f64() {
            if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
                return Ok(Value::Int(n as i64));
            }
            return Ok(Value::Float(n));
        }
        if let Some(s) = value.as_string() {
            return Ok(Value::Str(s));
        }
        let handle = Reflect::get(value, &JsValue::from_str("handle"))?
            .as_f64()
            .ok_or_else(|| JsValue::from_str("expected a number, string, boolean or handle"))?;
        self.handles
            .borrow()
            .get(handle as u32)
            .cloned()
            .ok_or_else(|| JsValue::from_str(&format!("unknown handle {handle}")))
    }

    fn value_to_js(&self, value: Value) -> Result<JsValue, JsValue> {
        let type_name = match &value {
            Value::Void => return Ok(JsValue::UNDEFINED),
            Value::Int(v) => return Ok(JsValue::from_f64(*v as f64)),
            Value::Float(v) => return Ok(JsValue::from_f64(*v)),
            Value::Bool(b) => return Ok(JsValue::from_bool(*b)),
            Value::Str(s) => return Ok(JsValue::from_str(s)),
            Value::Packed(p) => p.name().to_string(),
            Value::Array(_) => "array".to_string(),
        };
        let handle = JsValue::from_f64(self.handles.borrow_mut().lend(value) as f64);
        let object = Object::new();
        Reflect::set(&object, &JsValue::from_str("handle"), &handle)?;
        Reflect::set(&object, &JsValue::from_str("type"), &JsValue::from_str(&type_name))?;
        self.registry.register(&object, &handle);
        Ok(object.into())
    }
}
