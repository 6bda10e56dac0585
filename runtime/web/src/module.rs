//! [`NativeModule`] over an Emscripten `Module` object.
//!
//! Exports are looked up as `Module._Name`, the heap as `Module._malloc` /
//! `Module._free`, and memory through `Module.HEAPU8`. The heap view is
//! fetched on every access because Emscripten replaces it when memory grows.

use js_sys::{Array, Function, Reflect, Uint8Array};
use raybridge_common::native::{NativeError, NativeModule, NativeValue};
use wasm_bindgen::{JsCast, JsValue};

pub struct EmscriptenModule {
    module: JsValue,
}

fn js_message(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    match Reflect::get(value, &JsValue::from_str("message")) {
        Ok(message) if message.is_string() => message.as_string().unwrap_or_default(),
        _ => format!("{value:?}"),
    }
}

impl EmscriptenModule {
    pub fn new(module: JsValue) -> Self {
        Self { module }
    }

    fn function(&self, property: &str) -> Option<Function> {
        Reflect::get(&self.module, &JsValue::from_str(property))
            .ok()?
            .dyn_into::<Function>()
            .ok()
    }

    fn heap(&self, address: u32, len: u32) -> Result<Uint8Array, NativeError> {
        let out_of_bounds = NativeError::OutOfBounds { address, len };
        let heap = Reflect::get(&self.module, &JsValue::from_str("HEAPU8"))
            .ok()
            .and_then(|heap| heap.dyn_into::<Uint8Array>().ok())
            .ok_or_else(|| out_of_bounds.clone())?;
        let end = address.checked_add(len).ok_or_else(|| out_of_bounds.clone())?;
        if address == 0 || end > heap.length() {
            return Err(out_of_bounds);
        }
        Ok(heap.subarray(address, end))
    }

    fn invoke(&self, property: &str, name: &str, args: &Array) -> Result<JsValue, NativeError> {
        let function = self.function(property).ok_or_else(|| NativeError::MissingExport {
            name: name.to_string(),
        })?;
        function
            .apply(&JsValue::NULL, args)
            .map_err(|err| NativeError::Trap {
                name: name.to_string(),
                message: js_message(&err),
            })
    }
}

impl NativeModule for EmscriptenModule {
    fn is_ready(&self) -> bool {
        let called_run = Reflect::get(&self.module, &JsValue::from_str("calledRun"))
            .map(|v| v.is_truthy())
            .unwrap_or(false);
        called_run && self.function("_malloc").is_some()
    }

    fn allocate(&mut self, size: u32) -> u32 {
        let args = Array::of1(&JsValue::from_f64(size as f64));
        match self.invoke("_malloc", "malloc", &args) {
            Ok(address) => address.as_f64().map_or(0, |a| a as u32),
            Err(err) => {
                web_sys::console::error_1(&JsValue::from_str(&err.to_string()));
                0
            }
        }
    }

    fn free(&mut self, address: u32) {
        let args = Array::of1(&JsValue::from_f64(address as f64));
        if let Err(err) = self.invoke("_free", "free", &args) {
            web_sys::console::error_1(&JsValue::from_str(&err.to_string()));
        }
    }

    fn read(&self, address: u32, buf: &mut [u8]) -> Result<(), NativeError> {
        self.heap(address, buf.len() as u32)?.copy_to(buf);
        Ok(())
    }

    fn write(&mut self, address: u32, bytes: &[u8]) -> Result<(), NativeError> {
        self.heap(address, bytes.len() as u32)?.copy_from(bytes);
        Ok(())
    }

    fn has_export(&self, name: &str) -> bool {
        self.function(&format!("_{name}")).is_some()
    }

    fn call(&mut self, name: &str, args: &[NativeValue]) -> Result<Option<NativeValue>, NativeError> {
        let js_args: Array = args
            .iter()
            .map(|arg| JsValue::from_f64(arg.as_f64()))
            .collect();
        let result = self.invoke(&format!("_{name}"), name, &js_args)?;
        if result.is_undefined() {
            return Ok(None);
        }
        // JS numbers carry no int/float distinction; integral results come
        // back as ints, which is what every wasm32 int or pointer return is.
        let number = result.as_f64().ok_or_else(|| NativeError::Trap {
            name: name.to_string(),
            message: format!("returned a non-number: {result:?}"),
        })?;
        if number.fract() == 0.0 && number.abs() < 9.007_199_254_740_992e15 {
            Ok(Some(NativeValue::Int(number as i64)))
        } else {
            Ok(Some(NativeValue::Float(number)))
        }
    }
}
