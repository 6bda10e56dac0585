//! raybridge headless runtime: an in-process native module.
//!
//! Owns a fixed linear memory with a free-list heap and exports a
//! raylib-shaped function table. Instead of rendering, every export appends
//! a [`DrawCommand`] to a log that hosts and tests can inspect.

pub mod allocator;
mod exports;

use indexmap::IndexMap;
use raybridge_common::native::{NativeError, NativeModule, NativeValue};

pub use allocator::{AllocStats, FreeListAllocator};
pub use exports::{DrawCommand, Rgba};

/// One wasm page.
pub const PAGE_SIZE: u32 = 64 * 1024;

/// Addresses below this are reserved (null page, static data).
pub const HEAP_BASE: u32 = 1024;

/// An export implementation. Arguments are already arity-checked.
pub type ExportFn =
    fn(&mut HeadlessModule, &[NativeValue]) -> Result<Option<NativeValue>, NativeError>;

#[derive(Clone, Copy)]
struct Export {
    arity: usize,
    func: ExportFn,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Window {
    pub(crate) width: i64,
    pub(crate) height: i64,
}

pub struct HeadlessModule {
    memory: Vec<u8>,
    heap: FreeListAllocator,
    ready: bool,
    exports: IndexMap<String, Export>,
    pub(crate) window: Option<Window>,
    pub(crate) frames: u64,
    pub(crate) close_after: Option<u64>,
    log: Vec<DrawCommand>,
    calls: Vec<(String, Vec<NativeValue>)>,
}

impl HeadlessModule {
    /// A ready module with `pages` pages of linear memory.
    pub fn new(pages: u32) -> Self {
        let size = pages.saturating_mul(PAGE_SIZE);
        let mut module = Self {
            memory: vec![0; size as usize],
            heap: FreeListAllocator::new(HEAP_BASE, size),
            ready: true,
            exports: IndexMap::new(),
            window: None,
            frames: 0,
            close_after: None,
            log: Vec::new(),
            calls: Vec::new(),
        };
        exports::register_defaults(&mut module);
        module
    }

    /// A module that still reports itself as loading.
    pub fn loading(pages: u32) -> Self {
        Self {
            ready: false,
            ..Self::new(pages)
        }
    }

    pub fn finish_loading(&mut self) {
        self.ready = true;
    }

    /// Make `WindowShouldClose` report true once `frames` frames have ended.
    pub fn close_after(mut self, frames: u64) -> Self {
        self.close_after = Some(frames);
        self
    }

    /// Add or replace an export.
    pub fn register(&mut self, name: &str, arity: usize, func: ExportFn) {
        self.exports.insert(name.to_string(), Export { arity, func });
    }

    pub fn export_names(&self) -> impl Iterator<Item = &str> {
        self.exports.keys().map(String::as_str)
    }

    pub fn stats(&self) -> AllocStats {
        self.heap.stats()
    }

    pub fn live_blocks(&self) -> usize {
        self.heap.live_blocks()
    }

    pub fn is_live(&self, address: u32) -> bool {
        self.heap.is_live(address)
    }

    pub fn draw_log(&self) -> &[DrawCommand] {
        &self.log
    }

    pub fn take_draw_log(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.log)
    }

    /// Every export call in order, with the arguments exactly as received.
    pub fn calls(&self) -> &[(String, Vec<NativeValue>)] {
        &self.calls
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn record(&mut self, command: DrawCommand) {
        tracing::trace!(?command, "draw");
        self.log.push(command);
    }

    fn check_range(&self, address: u32, len: usize) -> Result<std::ops::Range<usize>, NativeError> {
        let start = address as usize;
        match start.checked_add(len) {
            Some(end) if address != 0 && end <= self.memory.len() => Ok(start..end),
            _ => Err(NativeError::OutOfBounds {
                address,
                len: len as u32,
            }),
        }
    }
}

impl Default for HeadlessModule {
    fn default() -> Self {
        Self::new(16)
    }
}

impl NativeModule for HeadlessModule {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn allocate(&mut self, size: u32) -> u32 {
        let address = self.heap.allocate(size);
        if address == 0 {
            tracing::warn!(size, "headless heap exhausted");
        }
        address
    }

    fn free(&mut self, address: u32) {
        if address != 0 && !self.heap.free(address) {
            tracing::warn!(address, "free of an address that is not live");
        }
    }

    fn read(&self, address: u32, buf: &mut [u8]) -> Result<(), NativeError> {
        let range = self.check_range(address, buf.len())?;
        buf.copy_from_slice(&self.memory[range]);
        Ok(())
    }

    fn write(&mut self, address: u32, bytes: &[u8]) -> Result<(), NativeError> {
        let range = self.check_range(address, bytes.len())?;
        self.memory[range].copy_from_slice(bytes);
        Ok(())
    }

    fn has_export(&self, name: &str) -> bool {
        self.exports.contains_key(name)
    }

    fn call(&mut self, name: &str, args: &[NativeValue]) -> Result<Option<NativeValue>, NativeError> {
        let export = *self
            .exports
            .get(name)
            .ok_or_else(|| NativeError::MissingExport { name: name.into() })?;
        if args.len() != export.arity {
            return Err(NativeError::Arity {
                name: name.into(),
                expected: export.arity,
                found: args.len(),
            });
        }
        self.calls.push((name.to_string(), args.to_vec()));
        (export.func)(self, args)
    }
}
