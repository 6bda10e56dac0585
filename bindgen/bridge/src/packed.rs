//! Packed values: fixed-layout aggregates living in native linear memory.
//!
//! Every read and write goes straight to memory; nothing is cached on the
//! Rust side. A value allocated by the bridge frees its block exactly once,
//! when the last `Rc` to it is dropped. Views of nested structs or array
//! elements hold their parent alive instead of owning memory.
//!
//! Integer writes wrap to the field's width, the way a C assignment would:
//! writing 300 into an `unsigned char` stores 44. Callers that care about
//! range must check before writing.

use crate::value::Value;
use crate::Bridge;
use raybridge_common::error::BridgeError;
use raybridge_common::native::SharedModule;
use raybridge_common::types::ScalarKind;
use raybridge_layout::{FieldKind, Layout};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

type Result<T> = std::result::Result<T, BridgeError>;

/// Who is responsible for the bytes behind a value.
// Parents are only held to keep their block alive.
#[allow(dead_code)]
enum Owner {
    /// Allocated by the bridge; freed on drop.
    Heap,
    Value(Rc<PackedValue>),
    Array(Rc<PackedArray>),
}

pub struct PackedValue {
    module: SharedModule,
    layout: Rc<Layout>,
    address: u32,
    owner: Owner,
    frozen: Cell<bool>,
}

impl PackedValue {
    /// Allocate a zeroed value of `layout`.
    pub(crate) fn allocate(module: &SharedModule, layout: &Rc<Layout>) -> Result<Rc<Self>> {
        let address = allocate_zeroed(module, layout.size)?;
        tracing::debug!(layout = %layout.name, address, size = layout.size, "allocated packed value");
        Ok(Rc::new(Self {
            module: Rc::clone(module),
            layout: Rc::clone(layout),
            address,
            owner: Owner::Heap,
            frozen: Cell::new(false),
        }))
    }

    fn view(
        module: &SharedModule,
        layout: &Rc<Layout>,
        address: u32,
        owner: Owner,
        frozen: bool,
    ) -> Rc<Self> {
        Rc::new(Self {
            module: Rc::clone(module),
            layout: Rc::clone(layout),
            address,
            owner,
            frozen: Cell::new(frozen),
        })
    }

    pub fn layout(&self) -> &Rc<Layout> {
        &self.layout
    }

    pub fn name(&self) -> &str {
        &self.layout.name
    }

    pub fn size(&self) -> u32 {
        self.layout.size
    }

    /// True if dropping the last handle frees native memory.
    pub fn is_owned(&self) -> bool {
        matches!(self.owner, Owner::Heap)
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.get()
    }

    /// Reject every later write, through this handle or any view of it.
    pub fn freeze(&self) {
        self.frozen.set(true);
    }

    pub(crate) fn address(&self) -> u32 {
        self.address
    }

    pub fn get(self: &Rc<Self>, field: &str) -> Result<Value> {
        let f = self.field(field)?;
        read_kind(
            &self.module,
            self.address + f.offset,
            &f.kind,
            Owner::Value(Rc::clone(self)),
            self.is_frozen(),
        )
    }

    pub fn set(&self, field: &str, value: &Value) -> Result<()> {
        let f = self.field(field)?;
        if self.is_frozen() {
            return Err(BridgeError::FrozenValue {
                layout: self.layout.name.clone(),
                field: field.to_string(),
            });
        }
        let label = format!("{}.{}", self.layout.name, f.name);
        write_kind(&self.module, self.address + f.offset, &f.kind, value, &label)
    }

    /// Write `values` into the leading fields in declaration order.
    pub(crate) fn fill(&self, values: &[Value]) -> Result<()> {
        if values.len() > self.layout.fields.len() {
            return Err(BridgeError::SignatureMismatch {
                name: self.layout.name.clone(),
                message: format!(
                    "expected at most {} values, got {}",
                    self.layout.fields.len(),
                    values.len()
                ),
            });
        }
        for (field, value) in self.layout.fields.iter().zip(values) {
            self.set(&field.name, value)?;
        }
        Ok(())
    }

    /// Every field in declaration order.
    pub fn fields(self: &Rc<Self>) -> Result<Vec<(String, Value)>> {
        self.layout
            .fields
            .iter()
            .map(|f| Ok((f.name.clone(), self.get(&f.name)?)))
            .collect()
    }

    /// The raw bytes as they sit in linear memory.
    pub fn bytes(&self) -> Result<Vec<u8>> {
        read_bytes(&self.module, self.address, self.layout.size)
    }

    /// Copy every byte of `other`, which must share this value's layout.
    pub fn copy_from(&self, other: &PackedValue) -> Result<()> {
        if other.layout.name != self.layout.name || other.size() != self.size() {
            return Err(BridgeError::SignatureMismatch {
                name: self.layout.name.clone(),
                message: format!("cannot copy from {}", other.layout.name),
            });
        }
        if self.is_frozen() {
            return Err(BridgeError::FrozenValue {
                layout: self.layout.name.clone(),
                field: "*".into(),
            });
        }
        let bytes = other.bytes()?;
        self.module.borrow_mut().write(self.address, &bytes)?;
        Ok(())
    }

    fn field(&self, name: &str) -> Result<&raybridge_layout::Field> {
        self.layout
            .field(name)
            .ok_or_else(|| BridgeError::UnknownField {
                layout: self.layout.name.clone(),
                field: name.to_string(),
            })
    }
}

impl Drop for PackedValue {
    fn drop(&mut self) {
        if self.is_owned() {
            release(&self.module, self.address, &self.layout.name);
        }
    }
}

impl fmt::Debug for PackedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackedValue")
            .field("layout", &self.layout.name)
            .field("size", &self.layout.size)
            .field("owned", &self.is_owned())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

/// A contiguous run of scalars or structs in linear memory.
pub struct PackedArray {
    module: SharedModule,
    element: FieldKind,
    len: u32,
    address: u32,
    owner: Owner,
    frozen: Cell<bool>,
}

impl PackedArray {
    /// Allocate `len` zeroed elements.
    pub fn new(bridge: &Bridge, element: FieldKind, len: u32) -> Result<Rc<Self>> {
        let size = element
            .checked_size()
            .and_then(|size| size.checked_mul(len))
            .ok_or(BridgeError::AllocationFailed { size: u32::MAX })?;
        let module = bridge.module();
        let address = allocate_zeroed(module, size)?;
        tracing::debug!(%element, len, address, "allocated packed array");
        Ok(Rc::new(Self {
            module: Rc::clone(module),
            element,
            len,
            address,
            owner: Owner::Heap,
            frozen: Cell::new(false),
        }))
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn element(&self) -> &FieldKind {
        &self.element
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.get()
    }

    pub(crate) fn address(&self) -> u32 {
        self.address
    }

    pub fn get(self: &Rc<Self>, index: usize) -> Result<Value> {
        let address = self.element_address(index)?;
        read_kind(
            &self.module,
            address,
            &self.element,
            Owner::Array(Rc::clone(self)),
            self.is_frozen(),
        )
    }

    /// Struct elements are copied in byte for byte.
    pub fn set(&self, index: usize, value: &Value) -> Result<()> {
        let address = self.element_address(index)?;
        if self.is_frozen() {
            return Err(BridgeError::FrozenValue {
                layout: self.element.to_string(),
                field: index.to_string(),
            });
        }
        let label = format!("{}[{index}]", self.element);
        write_kind(&self.module, address, &self.element, value, &label)
    }

    pub fn to_vec(self: &Rc<Self>) -> Result<Vec<Value>> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }

    fn element_address(&self, index: usize) -> Result<u32> {
        if index >= self.len() {
            return Err(BridgeError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        Ok(self.address + index as u32 * self.element.size())
    }
}

impl Drop for PackedArray {
    fn drop(&mut self) {
        if matches!(self.owner, Owner::Heap) {
            release(&self.module, self.address, "array");
        }
    }
}

impl fmt::Debug for PackedArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackedArray")
            .field("element", &self.element.to_string())
            .field("len", &self.len)
            .field("owned", &matches!(self.owner, Owner::Heap))
            .finish()
    }
}

// ─── Memory helpers ───

fn allocate_zeroed(module: &SharedModule, size: u32) -> Result<u32> {
    let mut m = module.borrow_mut();
    let address = m.allocate(size.max(1));
    if address == 0 {
        return Err(BridgeError::AllocationFailed { size });
    }
    // The allocator may hand back a block that still holds old bytes.
    if let Err(err) = m.write(address, &vec![0; size as usize]) {
        m.free(address);
        return Err(err.into());
    }
    Ok(address)
}

fn release(module: &SharedModule, address: u32, what: &str) {
    match module.try_borrow_mut() {
        Ok(mut m) => {
            m.free(address);
            tracing::debug!(address, what, "freed");
        }
        Err(_) => tracing::error!(address, what, "native module busy during release; block leaked"),
    }
}

fn read_bytes(module: &SharedModule, address: u32, size: u32) -> Result<Vec<u8>> {
    let mut bytes = vec![0; size as usize];
    module.borrow().read(address, &mut bytes)?;
    Ok(bytes)
}

fn read_kind(
    module: &SharedModule,
    address: u32,
    kind: &FieldKind,
    owner: Owner,
    frozen: bool,
) -> Result<Value> {
    match kind {
        FieldKind::Scalar(scalar) => {
            let bytes = read_bytes(module, address, scalar.size())?;
            Ok(decode_scalar(*scalar, &bytes))
        }
        FieldKind::Pointer => {
            let bytes = read_bytes(module, address, 4)?;
            Ok(decode_scalar(ScalarKind::U32, &bytes))
        }
        FieldKind::Struct(layout) => Ok(Value::Packed(PackedValue::view(
            module, layout, address, owner, frozen,
        ))),
        FieldKind::Array { element, len } => Ok(Value::Array(Rc::new(PackedArray {
            module: Rc::clone(module),
            element: (**element).clone(),
            len: *len,
            address,
            owner,
            frozen: Cell::new(frozen),
        }))),
    }
}

fn write_kind(
    module: &SharedModule,
    address: u32,
    kind: &FieldKind,
    value: &Value,
    label: &str,
) -> Result<()> {
    let bytes = match (kind, value) {
        (FieldKind::Scalar(scalar), _) => {
            encode_scalar(*scalar, value).ok_or_else(|| mismatch(label, scalar, value))?
        }
        (FieldKind::Pointer, Value::Packed(p)) => p.address().to_le_bytes().to_vec(),
        (FieldKind::Pointer, Value::Array(a)) => a.address().to_le_bytes().to_vec(),
        (FieldKind::Pointer, Value::Void) => vec![0; 4],
        (FieldKind::Pointer, _) => encode_scalar(ScalarKind::U32, value)
            .ok_or_else(|| mismatch(label, "pointer", value))?,
        (FieldKind::Struct(layout), Value::Packed(p))
            if p.layout.name == layout.name && p.size() == layout.size =>
        {
            read_bytes(&p.module, p.address, layout.size)?
        }
        (FieldKind::Array { .. }, Value::Array(a))
            if a.element.size() * a.len == kind.size() =>
        {
            read_bytes(&a.module, a.address, kind.size())?
        }
        _ => return Err(mismatch(label, kind, value)),
    };
    module.borrow_mut().write(address, &bytes)?;
    Ok(())
}

fn mismatch(label: &str, expected: impl fmt::Display, got: &Value) -> BridgeError {
    BridgeError::SignatureMismatch {
        name: label.to_string(),
        message: format!("expected {expected}, got {}", got.kind_name()),
    }
}

/// Decode little-endian `bytes` (exactly the scalar's width).
pub(crate) fn decode_scalar(kind: ScalarKind, bytes: &[u8]) -> Value {
    let mut raw = [0u8; 8];
    raw[..bytes.len()].copy_from_slice(bytes);
    let word = u64::from_le_bytes(raw);
    match kind {
        ScalarKind::I8 => Value::Int(word as u8 as i8 as i64),
        ScalarKind::U8 => Value::Int(word as u8 as i64),
        ScalarKind::I16 => Value::Int(word as u16 as i16 as i64),
        ScalarKind::U16 => Value::Int(word as u16 as i64),
        ScalarKind::I32 => Value::Int(word as u32 as i32 as i64),
        ScalarKind::U32 => Value::Int(word as u32 as i64),
        ScalarKind::I64 | ScalarKind::U64 => Value::Int(word as i64),
        ScalarKind::F32 => Value::Float(f32::from_bits(word as u32) as f64),
        ScalarKind::F64 => Value::Float(f64::from_bits(word)),
        ScalarKind::Bool => Value::Bool(word != 0),
    }
}

/// Encode to little-endian bytes, wrapping integers to the scalar's width.
pub(crate) fn encode_scalar(kind: ScalarKind, value: &Value) -> Option<Vec<u8>> {
    let bits = match (kind, value) {
        (ScalarKind::F32, _) => (value.as_f64()? as f32).to_bits() as u64,
        (ScalarKind::F64, _) => value.as_f64()?.to_bits(),
        (ScalarKind::Bool, Value::Bool(b)) => *b as u64,
        (ScalarKind::Bool, Value::Int(v)) => (*v != 0) as u64,
        (ScalarKind::Bool, _) => return None,
        _ => value.as_i64()? as u64,
    };
    Some(bits.to_le_bytes()[..kind.size() as usize].to_vec())
}
