//! raybridge: calls from an interpreter into a wasm-compiled raylib.
//!
//! The [`Bridge`] owns the binding catalog for one native module. Packed
//! values and arrays live in the module's linear memory and are released
//! when their last handle drops. [`setup`] runs the whole host sequence:
//! resolve an API description, bind every export the module provides,
//! build a [`BindingTable`] and install it into an [`Interpreter`].

pub mod binding;
pub mod frame;
pub mod namespace;
pub mod packed;
pub mod setup;
pub mod value;

use indexmap::IndexMap;
use raybridge_common::error::BridgeError;
use raybridge_common::native::SharedModule;
use raybridge_layout::{Layout, Signature};
use std::rc::Rc;

pub use binding::{BindingKind, BoundFunction, DuplicatePolicy};
pub use frame::{FrameLoop, FrameReport};
pub use namespace::{BindingTable, Constructor, Global, Interpreter, Namespace};
pub use packed::{PackedArray, PackedValue};
pub use setup::{setup, ApiSource, Palette, Session, SetupConfig};
pub use value::Value;

pub struct Bridge {
    module: SharedModule,
    bindings: IndexMap<String, Rc<BoundFunction>>,
    policy: DuplicatePolicy,
}

impl Bridge {
    /// Fails with `NotInitialized` while the module is still loading.
    pub fn initialize(module: SharedModule) -> Result<Self, BridgeError> {
        if !module.borrow().is_ready() {
            return Err(BridgeError::NotInitialized);
        }
        tracing::debug!("bridge initialized");
        Ok(Self {
            module,
            bindings: IndexMap::new(),
            policy: DuplicatePolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    pub fn module(&self) -> &SharedModule {
        &self.module
    }

    /// Allocate a value of `layout` and write `values` into its fields in
    /// declaration order. Missing trailing fields stay zero.
    pub fn define_packed(
        &self,
        layout: &Rc<Layout>,
        values: &[Value],
    ) -> Result<Rc<PackedValue>, BridgeError> {
        let value = PackedValue::allocate(&self.module, layout)?;
        value.fill(values)?;
        Ok(value)
    }

    /// Expose `symbol` under `name` with arguments passed straight through.
    pub fn bind_raw(&mut self, name: &str, symbol: &str) -> Result<(), BridgeError> {
        self.check_binding(name, symbol)?;
        let function = BoundFunction::raw(name, symbol, &self.module);
        self.insert(function);
        Ok(())
    }

    /// Expose `symbol` under `name`, converting arguments per `signature`.
    pub fn bind_adapted(
        &mut self,
        name: &str,
        symbol: &str,
        signature: Signature,
    ) -> Result<(), BridgeError> {
        self.check_binding(name, symbol)?;
        let function = BoundFunction::adapted(name, symbol, signature, &self.module);
        self.insert(function);
        Ok(())
    }

    /// Bound names in binding order.
    pub fn catalog(&self) -> impl Iterator<Item = (&str, BindingKind)> + '_ {
        self.bindings
            .iter()
            .map(|(name, function)| (name.as_str(), function.kind()))
    }

    pub fn binding(&self, name: &str) -> Option<&Rc<BoundFunction>> {
        self.bindings.get(name)
    }

    pub fn functions(&self) -> impl Iterator<Item = &Rc<BoundFunction>> {
        self.bindings.values()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, BridgeError> {
        let function = self
            .bindings
            .get(name)
            .ok_or_else(|| BridgeError::UndefinedName { name: name.into() })?;
        function.call(args)
    }

    fn check_binding(&self, name: &str, symbol: &str) -> Result<(), BridgeError> {
        if !self.module.borrow().has_export(symbol) {
            return Err(BridgeError::UnknownSymbol {
                symbol: symbol.to_string(),
            });
        }
        if self.bindings.contains_key(name) && self.policy == DuplicatePolicy::Reject {
            return Err(BridgeError::DuplicateBinding {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn insert(&mut self, function: BoundFunction) {
        tracing::debug!(name = function.name(), kind = %function.kind(), "bound");
        let name = function.name().to_string();
        if self.bindings.insert(name, Rc::new(function)).is_some() {
            tracing::debug!("replaced an earlier binding");
        }
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("bindings", &self.bindings.keys().collect::<Vec<_>>())
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raybridge_common::native::{NativeError, NativeModule, NativeValue};
    use std::cell::RefCell;

    /// Minimal module: 256 bytes, bump allocator, one export.
    struct Tiny {
        memory: Vec<u8>,
        next: u32,
        ready: bool,
    }

    impl NativeModule for Tiny {
        fn is_ready(&self) -> bool {
            self.ready
        }
        fn allocate(&mut self, size: u32) -> u32 {
            if self.next + size > self.memory.len() as u32 {
                return 0;
            }
            let address = self.next;
            self.next += size;
            address
        }
        fn free(&mut self, _: u32) {}
        fn read(&self, address: u32, buf: &mut [u8]) -> Result<(), NativeError> {
            let start = address as usize;
            buf.copy_from_slice(&self.memory[start..start + buf.len()]);
            Ok(())
        }
        fn write(&mut self, address: u32, bytes: &[u8]) -> Result<(), NativeError> {
            let start = address as usize;
            self.memory[start..start + bytes.len()].copy_from_slice(bytes);
            Ok(())
        }
        fn has_export(&self, name: &str) -> bool {
            name == "Add"
        }
        fn call(&mut self, _: &str, args: &[NativeValue]) -> Result<Option<NativeValue>, NativeError> {
            Ok(Some(NativeValue::Int(args.iter().map(|a| a.as_i64()).sum())))
        }
    }

    fn tiny(ready: bool) -> SharedModule {
        Rc::new(RefCell::new(Tiny {
            memory: vec![0; 256],
            next: 8,
            ready,
        }))
    }

    #[test]
    fn loading_module_is_not_initialized() {
        assert!(matches!(
            Bridge::initialize(tiny(false)),
            Err(BridgeError::NotInitialized)
        ));
    }

    #[test]
    fn unknown_symbol_is_rejected() {
        let mut bridge = Bridge::initialize(tiny(true)).unwrap();
        let err = bridge.bind_raw("Sub", "Sub").unwrap_err();
        assert!(matches!(err, BridgeError::UnknownSymbol { .. }));
        assert!(bridge.is_empty());
    }

    #[test]
    fn duplicate_policy() {
        let mut bridge = Bridge::initialize(tiny(true)).unwrap();
        bridge.bind_raw("Add", "Add").unwrap();
        assert!(matches!(
            bridge.bind_raw("Add", "Add"),
            Err(BridgeError::DuplicateBinding { .. })
        ));

        let mut bridge = bridge.with_policy(DuplicatePolicy::Overwrite);
        bridge.bind_raw("Add", "Add").unwrap();
        assert_eq!(bridge.len(), 1);
    }

    #[test]
    fn raw_call_sums() {
        let mut bridge = Bridge::initialize(tiny(true)).unwrap();
        bridge.bind_raw("Add", "Add").unwrap();
        let result = bridge
            .call("Add", &[Value::Int(2), Value::Bool(true), Value::Float(3.0)])
            .unwrap();
        assert!(matches!(result, Value::Int(6)));
        assert!(matches!(
            bridge.call("Missing", &[]),
            Err(BridgeError::UndefinedName { .. })
        ));
    }

    #[test]
    fn exhausted_heap_is_allocation_failure() {
        let bridge = Bridge::initialize(tiny(true)).unwrap();
        let big = Rc::new(Layout::new(
            "Big",
            vec![(
                "data".into(),
                raybridge_layout::FieldKind::Array {
                    element: Box::new(raybridge_layout::FieldKind::Pointer),
                    len: 1024,
                },
            )],
        ));
        assert!(matches!(
            bridge.define_packed(&big, &[]),
            Err(BridgeError::AllocationFailed { size: 4096 })
        ));
    }
}
