//! The binding table and the interpreter namespace it is installed into.

use crate::binding::{BoundFunction, DuplicatePolicy};
use crate::packed::PackedValue;
use crate::value::Value;
use crate::Bridge;
use indexmap::IndexMap;
use raybridge_common::error::BridgeError;
use raybridge_common::native::SharedModule;
use raybridge_layout::Layout;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

type Result<T> = std::result::Result<T, BridgeError>;

/// Anything that can live in an interpreter's global namespace.
#[derive(Debug, Clone)]
pub enum Global {
    Function(Rc<BoundFunction>),
    /// A struct instance, usually a frozen named constant such as `RED`.
    Packed(Rc<PackedValue>),
    Constructor(Constructor),
    /// A plain number or string define.
    Constant(Value),
}

impl Global {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Global::Function(f) => match f.kind() {
                crate::BindingKind::Raw => "raw function",
                crate::BindingKind::Adapted => "adapted function",
            },
            Global::Packed(_) => "struct",
            Global::Constructor(_) => "constructor",
            Global::Constant(_) => "constant",
        }
    }
}

/// Builds packed values of one layout, e.g. `Color(230, 41, 55, 255)`.
#[derive(Clone)]
pub struct Constructor {
    layout: Rc<Layout>,
    module: SharedModule,
}

impl Constructor {
    pub fn new(layout: Rc<Layout>, module: &SharedModule) -> Self {
        Self {
            layout,
            module: Rc::clone(module),
        }
    }

    pub fn layout(&self) -> &Rc<Layout> {
        &self.layout
    }

    /// Missing trailing fields default to zero.
    pub fn construct(&self, values: &[Value]) -> Result<Rc<PackedValue>> {
        let value = PackedValue::allocate(&self.module, &self.layout)?;
        value.fill(values)?;
        Ok(value)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Constructor").field(&self.layout.name).finish()
    }
}

/// What the bridge needs from an interpreter.
///
/// Loading and running script text is the host's business; the bridge only
/// installs globals and calls the `init`/`update` entry points.
pub trait Interpreter {
    fn get_global(&self, name: &str) -> Option<Global>;

    fn set_global(&mut self, name: &str, value: Global);

    /// Run an entry point. `Ok(false)` if the script does not define it.
    fn call_entry(&mut self, name: &str) -> Result<bool>;
}

/// Every global the bridge will install, validated before installation.
#[derive(Debug, Default)]
pub struct BindingTable {
    entries: IndexMap<String, Global>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from every bound function, in catalog order.
    pub fn from_bridge(bridge: &Bridge) -> Self {
        let entries = bridge
            .functions()
            .map(|f| (f.name().to_string(), Global::Function(Rc::clone(f))))
            .collect();
        Self { entries }
    }

    pub fn insert(&mut self, name: &str, global: Global, policy: DuplicatePolicy) -> Result<()> {
        if self.entries.contains_key(name) && policy == DuplicatePolicy::Reject {
            return Err(BridgeError::DuplicateBinding { name: name.into() });
        }
        self.entries.insert(name.to_string(), global);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Global> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Global)> {
        self.entries.iter().map(|(name, global)| (name.as_str(), global))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Install every entry, or nothing.
    ///
    /// Under [`DuplicatePolicy::Reject`] a name already present in the
    /// interpreter fails the whole installation before any global is set.
    pub fn install(&self, interpreter: &mut dyn Interpreter, policy: DuplicatePolicy) -> Result<usize> {
        if policy == DuplicatePolicy::Reject {
            if let Some(name) = self
                .entries
                .keys()
                .find(|name| interpreter.get_global(name).is_some())
            {
                return Err(BridgeError::DuplicateBinding { name: name.clone() });
            }
        }
        for (name, global) in &self.entries {
            interpreter.set_global(name, global.clone());
        }
        tracing::info!(globals = self.entries.len(), "binding table installed");
        Ok(self.entries.len())
    }
}

type Entry = Rc<RefCell<dyn FnMut(&Namespace) -> Result<()>>>;

/// An in-process interpreter namespace with Rust closures as scripts.
#[derive(Default)]
pub struct Namespace {
    globals: IndexMap<String, Global>,
    entries: IndexMap<String, Entry>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry point such as `init` or `update`.
    pub fn define_entry(
        &mut self,
        name: &str,
        entry: impl FnMut(&Namespace) -> Result<()> + 'static,
    ) {
        self.entries
            .insert(name.to_string(), Rc::new(RefCell::new(entry)));
    }

    pub fn get(&self, name: &str) -> Result<&Global> {
        self.globals
            .get(name)
            .ok_or_else(|| BridgeError::UndefinedName { name: name.into() })
    }

    /// Read a value-like global (a struct constant or a define).
    pub fn value(&self, name: &str) -> Result<Value> {
        match self.get(name)? {
            Global::Packed(p) => Ok(Value::Packed(Rc::clone(p))),
            Global::Constant(v) => Ok(v.clone()),
            other => Err(BridgeError::SignatureMismatch {
                name: name.into(),
                message: format!("{} is not a value", other.kind_name()),
            }),
        }
    }

    /// Call a function, or a constructor (yielding a struct).
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        match self.get(name)? {
            Global::Function(f) => f.call(args),
            Global::Constructor(c) => Ok(Value::Packed(c.construct(args)?)),
            other => Err(BridgeError::SignatureMismatch {
                name: name.into(),
                message: format!("{} is not callable", other.kind_name()),
            }),
        }
    }

    pub fn construct(&self, name: &str, values: &[Value]) -> Result<Rc<PackedValue>> {
        match self.get(name)? {
            Global::Constructor(c) => c.construct(values),
            other => Err(BridgeError::SignatureMismatch {
                name: name.into(),
                message: format!("{} is not a constructor", other.kind_name()),
            }),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Global)> {
        self.globals.iter().map(|(name, global)| (name.as_str(), global))
    }

    pub fn len(&self) -> usize {
        self.globals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.globals.is_empty()
    }
}

impl Interpreter for Namespace {
    fn get_global(&self, name: &str) -> Option<Global> {
        self.globals.get(name).cloned()
    }

    fn set_global(&mut self, name: &str, value: Global) {
        self.globals.insert(name.to_string(), value);
    }

    fn call_entry(&mut self, name: &str) -> Result<bool> {
        let Some(cell) = self.entries.get(name).cloned() else {
            return Ok(false);
        };
        let mut entry = cell.try_borrow_mut().map_err(|_| BridgeError::SignatureMismatch {
            name: name.into(),
            message: "entry point called re-entrantly".into(),
        })?;
        (*entry)(self)?;
        Ok(true)
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("globals", &self.globals)
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
