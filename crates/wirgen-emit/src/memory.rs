//! Linear memory code generation.
//!
//! Generates `mem.rs` containing:
//! - Page constants (`PAGE_SIZE`, `INITIAL_PAGES`, `MAX_PAGES`)
//! - The `Memory` type for the configured backend
//! - Bounds-checked little-endian loads and stores
//! - Unchecked fast paths when unsafe access is enabled

use std::fmt::Write;

use tracing::debug;
use wirgen_ir::{Memory, Module};

use crate::config::{EmitConfig, MemoryBackend};
use crate::error::{EmitError, Result};
use crate::header::file_header;

/// Bytes per WebAssembly page.
pub const PAGE_SIZE: u64 = 65536;

/// Page limit of a 32-bit memory.
pub const PAGE_LIMIT: u32 = 65536;

/// Native load accessors: (type, width in bytes, bit type for floats).
const LOADS: &[(&str, usize, Option<&str>)] = &[
    ("u8", 1, None),
    ("i8", 1, None),
    ("u16", 2, None),
    ("i16", 2, None),
    ("u32", 4, None),
    ("i32", 4, None),
    ("u64", 8, None),
    ("i64", 8, None),
    ("f32", 4, Some("u32")),
    ("f64", 8, Some("u64")),
];

/// Native store accessors.
const STORES: &[(&str, usize, Option<&str>)] = &[
    ("u8", 1, None),
    ("u16", 2, None),
    ("u32", 4, None),
    ("u64", 8, None),
    ("f32", 4, Some("u32")),
    ("f64", 8, Some("u64")),
];

/// Effective page limit of a memory, after checking its declared limits.
///
/// # Errors
///
/// Returns an error if the sizes exceed the 32-bit page limit or the
/// maximum is below the initial size.
pub fn max_pages(memory: &Memory) -> Result<u32> {
    if memory.initial > PAGE_LIMIT {
        return Err(EmitError::MemoryTooLarge(memory.initial));
    }
    match memory.maximum {
        Some(maximum) if maximum > PAGE_LIMIT => Err(EmitError::MemoryTooLarge(maximum)),
        Some(maximum) if maximum < memory.initial => Err(EmitError::MemoryLimits {
            initial: memory.initial,
            maximum,
        }),
        Some(maximum) => Ok(maximum),
        None => Ok(PAGE_LIMIT),
    }
}

/// Generate `mem.rs`. Returns `None` when the module has no memory.
///
/// # Errors
///
/// Returns an error if the memory limits are invalid.
pub fn gen_memory(module: &Module, cfg: &EmitConfig) -> Result<Option<String>> {
    let Some(memory) = &module.memory else {
        return Ok(None);
    };
    let max = max_pages(memory)?;
    debug!(initial = memory.initial, max, backend = ?cfg.memory_backend, "generating memory");

    let mut out = file_header(cfg, "Linear memory.");
    out.push_str(
        "//!\n//! `grow` takes `&mut Memory`: an instance shared between threads must\n\
         //! be accessed behind a lock or other external serialization.\n\n",
    );
    out.push_str("#![allow(dead_code, clippy::all)]\n\n");

    if cfg.memory_backend == MemoryBackend::Mapped {
        out.push_str("use std::ffi::c_void;\nuse std::num::NonZeroUsize;\nuse std::ptr::NonNull;\n\n");
        out.push_str("use nix::sys::mman::{MapFlags, ProtFlags, mmap_anonymous, mprotect, munmap};\n\n");
    }
    out.push_str("use super::context::Trap;\n\n");

    let _ = writeln!(out, "/// Bytes per page.");
    let _ = writeln!(out, "pub const PAGE_SIZE: usize = {PAGE_SIZE};");
    let _ = writeln!(out, "/// Pages allocated at instantiation.");
    let _ = writeln!(out, "pub const INITIAL_PAGES: u32 = {};", memory.initial);
    let _ = writeln!(out, "/// Pages the memory may grow to.");
    let _ = writeln!(out, "pub const MAX_PAGES: u32 = {max};");
    out.push('\n');

    match cfg.memory_backend {
        MemoryBackend::Buffer => gen_buffer_backend(&mut out),
        MemoryBackend::Mapped => gen_mapped_backend(&mut out),
    }
    out.push('\n');

    out.push_str("impl Memory {\n");
    gen_shared_methods(&mut out);
    gen_checked_accessors(&mut out);
    if cfg.unsafe_access {
        gen_unchecked_accessors(&mut out);
    }
    out.push_str("}\n");

    Ok(Some(out))
}

fn gen_buffer_backend(out: &mut String) {
    out.push_str(
        r"/// Linear memory backed by a heap buffer.
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    /// Allocate `INITIAL_PAGES` zeroed pages.
    pub fn new() -> Result<Self, Trap> {
        Ok(Self {
            data: vec![0; INITIAL_PAGES as usize * PAGE_SIZE],
        })
    }

    /// Grow by `delta` pages, returning the old size or -1 on failure.
    pub fn grow(&mut self, delta: u32) -> i32 {
        let old = self.size();
        let Some(new) = old.checked_add(delta).filter(|&n| n <= MAX_PAGES) else {
            return -1;
        };
        if self.data.try_reserve_exact((new - old) as usize * PAGE_SIZE).is_err() {
            return -1;
        }
        self.data.resize(new as usize * PAGE_SIZE, 0);
        old as i32
    }

    /// Current contents.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Current contents, mutably.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn base(&self) -> *const u8 {
        self.data.as_ptr()
    }

    fn base_mut(&mut self) -> *mut u8 {
        self.data.as_mut_ptr()
    }
}
",
    );
}

fn gen_mapped_backend(out: &mut String) {
    out.push_str(
        r"/// Linear memory backed by an anonymous mapping.
///
/// `MAX_PAGES` of address space are reserved inaccessible up front and
/// pages are made readable and writable as the memory grows, so growth
/// never moves existing contents.
pub struct Memory {
    base: NonNull<u8>,
    reserved: usize,
    len: usize,
}

// The mapping is owned exclusively by this value.
unsafe impl Send for Memory {}

impl Memory {
    /// Reserve `MAX_PAGES` and commit `INITIAL_PAGES` zeroed pages.
    pub fn new() -> Result<Self, Trap> {
        let reserved = MAX_PAGES as usize * PAGE_SIZE;
        let base = match NonZeroUsize::new(reserved) {
            Some(size) => {
                let region = unsafe {
                    mmap_anonymous(
                        None,
                        size,
                        ProtFlags::PROT_NONE,
                        MapFlags::MAP_PRIVATE | MapFlags::MAP_NORESERVE,
                    )
                };
                region.map_err(|_| Trap::OutOfMemory)?.cast::<u8>()
            }
            None => NonNull::dangling(),
        };
        let mut mem = Self {
            base,
            reserved,
            len: 0,
        };
        mem.commit(INITIAL_PAGES as usize * PAGE_SIZE)?;
        Ok(mem)
    }

    fn commit(&mut self, len: usize) -> Result<(), Trap> {
        if len > self.len {
            let protected = unsafe {
                mprotect(
                    self.base.cast::<c_void>(),
                    len,
                    ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                )
            };
            protected.map_err(|_| Trap::OutOfMemory)?;
        }
        self.len = len;
        Ok(())
    }

    /// Grow by `delta` pages, returning the old size or -1 on failure.
    pub fn grow(&mut self, delta: u32) -> i32 {
        let old = self.size();
        let Some(new) = old.checked_add(delta).filter(|&n| n <= MAX_PAGES) else {
            return -1;
        };
        match self.commit(new as usize * PAGE_SIZE) {
            Ok(()) => old as i32,
            Err(_) => -1,
        }
    }

    /// Current contents.
    pub fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.base.as_ptr(), self.len) }
    }

    /// Current contents, mutably.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.base.as_ptr(), self.len) }
    }

    fn base(&self) -> *const u8 {
        self.base.as_ptr()
    }

    fn base_mut(&mut self) -> *mut u8 {
        self.base.as_ptr()
    }
}

impl Drop for Memory {
    fn drop(&mut self) {
        if self.reserved != 0 {
            unsafe {
                let _ = munmap(self.base.cast::<c_void>(), self.reserved);
            }
        }
    }
}
",
    );
}

fn gen_shared_methods(out: &mut String) {
    out.push_str(
        r"    /// Current size in pages.
    pub fn size(&self) -> u32 {
        (self.bytes().len() / PAGE_SIZE) as u32
    }

    fn range(&self, addr: u32, offset: u32, width: usize) -> Result<std::ops::Range<usize>, Trap> {
        let start = (addr as usize)
            .checked_add(offset as usize)
            .ok_or(Trap::MemoryOutOfBounds)?;
        let end = start.checked_add(width).ok_or(Trap::MemoryOutOfBounds)?;
        if end > self.bytes().len() {
            return Err(Trap::MemoryOutOfBounds);
        }
        Ok(start..end)
    }

    /// Copy `bytes` into memory at `offset`.
    pub fn init_data(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Trap> {
        let range = self.range(offset, 0, bytes.len())?;
        self.bytes_mut()[range].copy_from_slice(bytes);
        Ok(())
    }
",
    );
}

fn gen_checked_accessors(out: &mut String) {
    for &(ty, width, _) in LOADS {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "    pub fn load_{ty}(&self, addr: u32, offset: u32) -> Result<{ty}, Trap> {{"
        );
        let _ = writeln!(out, "        let range = self.range(addr, offset, {width})?;");
        let _ = writeln!(out, "        let mut buf = [0u8; {width}];");
        let _ = writeln!(out, "        buf.copy_from_slice(&self.bytes()[range]);");
        let _ = writeln!(out, "        Ok({ty}::from_le_bytes(buf))");
        let _ = writeln!(out, "    }}");
    }
    for &(ty, _, _) in STORES {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "    pub fn store_{ty}(&mut self, addr: u32, offset: u32, value: {ty}) -> Result<(), Trap> {{"
        );
        let _ = writeln!(
            out,
            "        let range = self.range(addr, offset, std::mem::size_of::<{ty}>())?;"
        );
        let _ = writeln!(
            out,
            "        self.bytes_mut()[range].copy_from_slice(&value.to_le_bytes());"
        );
        let _ = writeln!(out, "        Ok(())");
        let _ = writeln!(out, "    }}");
    }
}

fn gen_unchecked_accessors(out: &mut String) {
    for &(ty, width, bits) in LOADS {
        let raw = bits.unwrap_or(ty);
        let read = format!("{raw}::from_le(unsafe {{ ptr.cast::<{raw}>().read_unaligned() }})");
        let value = match bits {
            Some(_) => format!("{ty}::from_bits({read})"),
            None => read,
        };
        let _ = writeln!(out);
        let _ = writeln!(out, "    /// # Safety");
        let _ = writeln!(out, "    ///");
        let _ = writeln!(
            out,
            "    /// `addr + offset + {width}` must not exceed the memory size in bytes."
        );
        let _ = writeln!(
            out,
            "    pub unsafe fn load_{ty}_unchecked(&self, addr: u32, offset: u32) -> {ty} {{"
        );
        let _ = writeln!(
            out,
            "        let ptr = unsafe {{ self.base().add(addr as usize + offset as usize) }};"
        );
        let _ = writeln!(out, "        {value}");
        let _ = writeln!(out, "    }}");
    }
    for &(ty, width, bits) in STORES {
        let (raw, value) = match bits {
            Some(raw) => (raw, "value.to_bits().to_le()"),
            None => (ty, "value.to_le()"),
        };
        let _ = writeln!(out);
        let _ = writeln!(out, "    /// # Safety");
        let _ = writeln!(out, "    ///");
        let _ = writeln!(
            out,
            "    /// `addr + offset + {width}` must not exceed the memory size in bytes."
        );
        let _ = writeln!(
            out,
            "    pub unsafe fn store_{ty}_unchecked(&mut self, addr: u32, offset: u32, value: {ty}) {{"
        );
        let _ = writeln!(
            out,
            "        let ptr = unsafe {{ self.base_mut().add(addr as usize + offset as usize) }};"
        );
        let _ = writeln!(
            out,
            "        unsafe {{ ptr.cast::<{raw}>().write_unaligned({value}) }};"
        );
        let _ = writeln!(out, "    }}");
    }
}
