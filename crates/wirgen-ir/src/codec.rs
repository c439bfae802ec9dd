//! Binary wire encoding for [`Module`].
//!
//! Layout: magic `WGIR`, a version byte, then the sections in a fixed
//! order (types, functions, globals, memory, table, imports, exports,
//! start). Integers are LEB128, floats are little-endian raw bits, strings
//! and byte payloads are length-prefixed, optionals carry a flag byte.
//! Instruction and type tags follow the WebAssembly binary opcodes where
//! one exists.

use thiserror::Error;

use crate::instr::{BinaryOp, ConvertOp, Instr, LoadOp, MemArg, StoreOp, UnaryOp};
use crate::module::{
    DataSegment, ElementSegment, ExportedFunction, Function, Global, ImportedFunction, InitExpr,
    Memory, Module, Table,
};
use crate::types::{BlockType, Signature, ValType, Value};

/// File magic.
pub const MAGIC: [u8; 4] = *b"WGIR";

/// Current format version.
pub const VERSION: u8 = 1;

/// Wire decoding errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of input at offset {0}")]
    UnexpectedEof(usize),
    #[error("invalid magic number")]
    BadMagic,
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),
    #[error("invalid {what} tag 0x{tag:02x} at offset {offset}")]
    InvalidTag {
        what: &'static str,
        tag: u8,
        offset: usize,
    },
    #[error("integer overflow at offset {0}")]
    Overflow(usize),
    #[error("invalid UTF-8 string at offset {0}")]
    InvalidUtf8(usize),
    #[error("{0} trailing bytes after module")]
    TrailingBytes(usize),
}

pub type Result<T> = std::result::Result<T, DecodeError>;

const BLOCK_EMPTY: u8 = 0x40;

const TAG_I32: u8 = 0x7f;
const TAG_I64: u8 = 0x7e;
const TAG_F32: u8 = 0x7d;
const TAG_F64: u8 = 0x7c;

const INIT_CONST: u8 = 0;
const INIT_GLOBAL: u8 = 1;
const INIT_IMPORT: u8 = 2;

mod op {
    pub const UNREACHABLE: u8 = 0x00;
    pub const NOP: u8 = 0x01;
    pub const BLOCK: u8 = 0x02;
    pub const LOOP: u8 = 0x03;
    pub const IF: u8 = 0x04;
    pub const ELSE: u8 = 0x05;
    pub const END: u8 = 0x0b;
    pub const BR: u8 = 0x0c;
    pub const BR_IF: u8 = 0x0d;
    pub const BR_TABLE: u8 = 0x0e;
    pub const RETURN: u8 = 0x0f;
    pub const CALL: u8 = 0x10;
    pub const CALL_INDIRECT: u8 = 0x11;
    pub const CALL_IMPORT: u8 = 0x12;
    pub const DROP: u8 = 0x1a;
    pub const SELECT: u8 = 0x1b;
    pub const LOCAL_GET: u8 = 0x20;
    pub const LOCAL_SET: u8 = 0x21;
    pub const LOCAL_TEE: u8 = 0x22;
    pub const GLOBAL_GET: u8 = 0x23;
    pub const GLOBAL_SET: u8 = 0x24;
    pub const LOAD: u8 = 0x28;
    pub const STORE: u8 = 0x36;
    pub const MEMORY_SIZE: u8 = 0x3f;
    pub const MEMORY_GROW: u8 = 0x40;
    pub const CONST: u8 = 0x41;
    pub const UNARY: u8 = 0x45;
    pub const BINARY: u8 = 0x46;
    pub const CONVERT: u8 = 0xa7;
}

// ============= Reading =============

/// Cursor over an encoded module.
#[derive(Debug)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    /// Current byte offset.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(DecodeError::UnexpectedEof(self.offset))?;
        let out = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_uleb_u64(&mut self) -> Result<u64> {
        let start = self.offset;
        let mut result = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            if shift >= 64 || (shift == 63 && byte & 0x7e != 0) {
                return Err(DecodeError::Overflow(start));
            }
            result |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let start = self.offset;
        let v = self.read_uleb_u64()?;
        u32::try_from(v).map_err(|_| DecodeError::Overflow(start))
    }

    pub fn read_sleb_i64(&mut self) -> Result<i64> {
        let start = self.offset;
        let mut result = 0i64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            if shift >= 64 {
                return Err(DecodeError::Overflow(start));
            }
            result |= i64::from(byte & 0x7f) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                if shift < 64 && byte & 0x40 != 0 {
                    result |= -1i64 << shift;
                }
                return Ok(result);
            }
        }
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let start = self.offset;
        let v = self.read_sleb_i64()?;
        i32::try_from(v).map_err(|_| DecodeError::Overflow(start))
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_le_bytes(buf))
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        let offset = self.offset;
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            tag => Err(DecodeError::InvalidTag {
                what: "flag",
                tag,
                offset,
            }),
        }
    }

    pub fn read_len(&mut self) -> Result<usize> {
        let start = self.offset;
        let len = self.read_u32()? as usize;
        // A length can never exceed the bytes left to describe its elements.
        if len > self.remaining() {
            return Err(DecodeError::UnexpectedEof(start));
        }
        Ok(len)
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_len()?;
        Ok(self.take(len)?.to_vec())
    }

    pub fn read_string(&mut self) -> Result<String> {
        let start = self.offset;
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8(start))
    }

    fn read_vec<T>(&mut self, mut f: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        let len = self.read_len()?;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(f(self)?);
        }
        Ok(out)
    }

    fn invalid(&self, what: &'static str, tag: u8) -> DecodeError {
        DecodeError::InvalidTag {
            what,
            tag,
            offset: self.offset.saturating_sub(1),
        }
    }

    fn read_val_type(&mut self) -> Result<ValType> {
        match self.read_u8()? {
            TAG_I32 => Ok(ValType::I32),
            TAG_I64 => Ok(ValType::I64),
            TAG_F32 => Ok(ValType::F32),
            TAG_F64 => Ok(ValType::F64),
            tag => Err(self.invalid("value type", tag)),
        }
    }

    fn read_block_type(&mut self) -> Result<BlockType> {
        match self.read_u8()? {
            BLOCK_EMPTY => Ok(BlockType::Empty),
            TAG_I32 => Ok(BlockType::Value(ValType::I32)),
            TAG_I64 => Ok(BlockType::Value(ValType::I64)),
            TAG_F32 => Ok(BlockType::Value(ValType::F32)),
            TAG_F64 => Ok(BlockType::Value(ValType::F64)),
            tag => Err(self.invalid("block type", tag)),
        }
    }

    fn read_value(&mut self) -> Result<Value> {
        Ok(match self.read_val_type()? {
            ValType::I32 => Value::I32(self.read_i32()?),
            ValType::I64 => Value::I64(self.read_sleb_i64()?),
            ValType::F32 => Value::F32(self.read_u32_le()?),
            ValType::F64 => Value::F64(self.read_u64_le()?),
        })
    }

    fn read_signature(&mut self) -> Result<Signature> {
        let params = self.read_vec(Self::read_val_type)?;
        let results = self.read_vec(Self::read_val_type)?;
        Ok(Signature { params, results })
    }

    fn read_memarg(&mut self) -> Result<MemArg> {
        let align = self.read_u32()?;
        let offset = self.read_u32()?;
        Ok(MemArg { align, offset })
    }

    fn read_instr(&mut self) -> Result<Instr> {
        let instr = match self.read_u8()? {
            op::UNREACHABLE => Instr::Unreachable,
            op::NOP => Instr::Nop,
            op::BLOCK => Instr::Block(self.read_block_type()?),
            op::LOOP => Instr::Loop(self.read_block_type()?),
            op::IF => Instr::If(self.read_block_type()?),
            op::ELSE => Instr::Else,
            op::END => Instr::End,
            op::BR => Instr::Br(self.read_u32()?),
            op::BR_IF => Instr::BrIf(self.read_u32()?),
            op::BR_TABLE => {
                let targets = self.read_vec(Self::read_u32)?;
                let default = self.read_u32()?;
                Instr::BrTable { targets, default }
            }
            op::RETURN => Instr::Return,
            op::CALL => Instr::Call(self.read_u32()?),
            op::CALL_INDIRECT => Instr::CallIndirect(self.read_u32()?),
            op::CALL_IMPORT => Instr::CallImport(self.read_u32()?),
            op::DROP => Instr::Drop,
            op::SELECT => Instr::Select,
            op::LOCAL_GET => Instr::LocalGet(self.read_u32()?),
            op::LOCAL_SET => Instr::LocalSet(self.read_u32()?),
            op::LOCAL_TEE => Instr::LocalTee(self.read_u32()?),
            op::GLOBAL_GET => Instr::GlobalGet(self.read_u32()?),
            op::GLOBAL_SET => Instr::GlobalSet(self.read_u32()?),
            op::LOAD => {
                let tag = self.read_u8()?;
                let op = LoadOp::from_index(tag).ok_or_else(|| self.invalid("load", tag))?;
                Instr::Load(op, self.read_memarg()?)
            }
            op::STORE => {
                let tag = self.read_u8()?;
                let op = StoreOp::from_index(tag).ok_or_else(|| self.invalid("store", tag))?;
                Instr::Store(op, self.read_memarg()?)
            }
            op::MEMORY_SIZE => Instr::MemorySize,
            op::MEMORY_GROW => Instr::MemoryGrow,
            op::CONST => Instr::Const(self.read_value()?),
            op::UNARY => {
                let ty = self.read_val_type()?;
                let tag = self.read_u8()?;
                let op = UnaryOp::from_index(tag).ok_or_else(|| self.invalid("unary", tag))?;
                Instr::Unary(ty, op)
            }
            op::BINARY => {
                let ty = self.read_val_type()?;
                let tag = self.read_u8()?;
                let op = BinaryOp::from_index(tag).ok_or_else(|| self.invalid("binary", tag))?;
                Instr::Binary(ty, op)
            }
            op::CONVERT => {
                let tag = self.read_u8()?;
                let op =
                    ConvertOp::from_index(tag).ok_or_else(|| self.invalid("conversion", tag))?;
                Instr::Convert(op)
            }
            tag => return Err(self.invalid("instruction", tag)),
        };
        Ok(instr)
    }

    fn read_function(&mut self) -> Result<Function> {
        let id = self.read_u32()?;
        let signature = self.read_signature()?;
        let locals = self.read_vec(Self::read_val_type)?;
        let body = self.read_vec(Self::read_instr)?;
        Ok(Function {
            id,
            signature,
            locals,
            body,
        })
    }

    fn read_global(&mut self) -> Result<Global> {
        let ty = self.read_val_type()?;
        let mutable = self.read_bool()?;
        let init = match self.read_u8()? {
            INIT_CONST => InitExpr::Const(self.read_value()?),
            INIT_GLOBAL => InitExpr::Global(self.read_u32()?),
            INIT_IMPORT => InitExpr::Import(self.read_u32()?),
            tag => return Err(self.invalid("initializer", tag)),
        };
        Ok(Global { ty, mutable, init })
    }

    fn read_memory(&mut self) -> Result<Memory> {
        let initial = self.read_u32()?;
        let maximum = if self.read_bool()? {
            Some(self.read_u32()?)
        } else {
            None
        };
        let data = self.read_vec(|r| {
            let offset = r.read_u32()?;
            let bytes = r.read_bytes()?;
            Ok(DataSegment { offset, bytes })
        })?;
        Ok(Memory {
            initial,
            maximum,
            data,
        })
    }

    fn read_table(&mut self) -> Result<Table> {
        let initial = self.read_u32()?;
        let elements = self.read_vec(|r| {
            let offset = r.read_u32()?;
            let funcs = r.read_vec(Self::read_u32)?;
            Ok(ElementSegment { offset, funcs })
        })?;
        Ok(Table { initial, elements })
    }

    fn read_option<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<Option<T>> {
        if self.read_bool()? {
            Ok(Some(f(self)?))
        } else {
            Ok(None)
        }
    }
}

/// Decode a module from its wire encoding.
///
/// # Errors
///
/// Returns an error if the input is truncated, malformed or carries
/// trailing bytes.
pub fn decode(bytes: &[u8]) -> Result<Module> {
    let mut r = Reader::new(bytes);
    if bytes.len() < MAGIC.len() || r.take(MAGIC.len())? != MAGIC {
        return Err(DecodeError::BadMagic);
    }
    let version = r.read_u8()?;
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    let types = r.read_vec(Reader::read_signature)?;
    let functions = r.read_vec(Reader::read_function)?;
    let globals = r.read_vec(Reader::read_global)?;
    let memory = r.read_option(Reader::read_memory)?;
    let table = r.read_option(Reader::read_table)?;
    let imported_functions = r.read_vec(|r| {
        let module = r.read_string()?;
        let field = r.read_string()?;
        let signature = r.read_signature()?;
        Ok(ImportedFunction {
            module,
            field,
            signature,
        })
    })?;
    let exported_functions = r.read_vec(|r| {
        let name = r.read_string()?;
        let func = r.read_u32()?;
        Ok(ExportedFunction { name, func })
    })?;
    let start = r.read_option(Reader::read_u32)?;

    if r.remaining() != 0 {
        return Err(DecodeError::TrailingBytes(r.remaining()));
    }

    Ok(Module {
        types,
        functions,
        globals,
        memory,
        table,
        imported_functions,
        exported_functions,
        start,
    })
}

// ============= Writing =============

/// Byte writer for the wire encoding.
#[derive(Debug, Default)]
pub struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    #[must_use]
    pub const fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }

    pub fn write_u8(&mut self, v: u8) {
        self.bytes.push(v);
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn write_uleb_u64(&mut self, mut v: u64) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                self.bytes.push(byte);
                return;
            }
            self.bytes.push(byte | 0x80);
        }
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write_uleb_u64(u64::from(v));
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn write_sleb_i64(&mut self, mut v: i64) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            let done = (v == 0 && byte & 0x40 == 0) || (v == -1 && byte & 0x40 != 0);
            if done {
                self.bytes.push(byte);
                return;
            }
            self.bytes.push(byte | 0x80);
        }
    }

    pub fn write_bool(&mut self, v: bool) {
        self.bytes.push(u8::from(v));
    }

    fn write_len(&mut self, len: usize) {
        self.write_uleb_u64(len as u64);
    }

    pub fn write_bytes(&mut self, b: &[u8]) {
        self.write_len(b.len());
        self.bytes.extend_from_slice(b);
    }

    pub fn write_str(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }

    fn write_vec<T>(&mut self, items: &[T], mut f: impl FnMut(&mut Self, &T)) {
        self.write_len(items.len());
        for item in items {
            f(self, item);
        }
    }

    fn write_val_type(&mut self, ty: ValType) {
        self.write_u8(match ty {
            ValType::I32 => TAG_I32,
            ValType::I64 => TAG_I64,
            ValType::F32 => TAG_F32,
            ValType::F64 => TAG_F64,
        });
    }

    fn write_block_type(&mut self, ty: BlockType) {
        match ty {
            BlockType::Empty => self.write_u8(BLOCK_EMPTY),
            BlockType::Value(ty) => self.write_val_type(ty),
        }
    }

    fn write_value(&mut self, v: Value) {
        self.write_val_type(v.ty());
        match v {
            Value::I32(v) => self.write_sleb_i64(i64::from(v)),
            Value::I64(v) => self.write_sleb_i64(v),
            Value::F32(bits) => self.bytes.extend_from_slice(&bits.to_le_bytes()),
            Value::F64(bits) => self.bytes.extend_from_slice(&bits.to_le_bytes()),
        }
    }

    fn write_signature(&mut self, sig: &Signature) {
        self.write_vec(&sig.params, |w, ty| w.write_val_type(*ty));
        self.write_vec(&sig.results, |w, ty| w.write_val_type(*ty));
    }

    fn write_memarg(&mut self, arg: MemArg) {
        self.write_u32(arg.align);
        self.write_u32(arg.offset);
    }

    fn write_instr(&mut self, instr: &Instr) {
        match instr {
            Instr::Unreachable => self.write_u8(op::UNREACHABLE),
            Instr::Nop => self.write_u8(op::NOP),
            Instr::Block(ty) => {
                self.write_u8(op::BLOCK);
                self.write_block_type(*ty);
            }
            Instr::Loop(ty) => {
                self.write_u8(op::LOOP);
                self.write_block_type(*ty);
            }
            Instr::If(ty) => {
                self.write_u8(op::IF);
                self.write_block_type(*ty);
            }
            Instr::Else => self.write_u8(op::ELSE),
            Instr::End => self.write_u8(op::END),
            Instr::Br(depth) => {
                self.write_u8(op::BR);
                self.write_u32(*depth);
            }
            Instr::BrIf(depth) => {
                self.write_u8(op::BR_IF);
                self.write_u32(*depth);
            }
            Instr::BrTable { targets, default } => {
                self.write_u8(op::BR_TABLE);
                self.write_vec(targets, |w, t| w.write_u32(*t));
                self.write_u32(*default);
            }
            Instr::Return => self.write_u8(op::RETURN),
            Instr::Call(func) => {
                self.write_u8(op::CALL);
                self.write_u32(*func);
            }
            Instr::CallIndirect(ty) => {
                self.write_u8(op::CALL_INDIRECT);
                self.write_u32(*ty);
            }
            Instr::CallImport(index) => {
                self.write_u8(op::CALL_IMPORT);
                self.write_u32(*index);
            }
            Instr::Drop => self.write_u8(op::DROP),
            Instr::Select => self.write_u8(op::SELECT),
            Instr::LocalGet(i) => {
                self.write_u8(op::LOCAL_GET);
                self.write_u32(*i);
            }
            Instr::LocalSet(i) => {
                self.write_u8(op::LOCAL_SET);
                self.write_u32(*i);
            }
            Instr::LocalTee(i) => {
                self.write_u8(op::LOCAL_TEE);
                self.write_u32(*i);
            }
            Instr::GlobalGet(i) => {
                self.write_u8(op::GLOBAL_GET);
                self.write_u32(*i);
            }
            Instr::GlobalSet(i) => {
                self.write_u8(op::GLOBAL_SET);
                self.write_u32(*i);
            }
            Instr::Load(load, arg) => {
                self.write_u8(op::LOAD);
                self.write_u8(load.index());
                self.write_memarg(*arg);
            }
            Instr::Store(store, arg) => {
                self.write_u8(op::STORE);
                self.write_u8(store.index());
                self.write_memarg(*arg);
            }
            Instr::MemorySize => self.write_u8(op::MEMORY_SIZE),
            Instr::MemoryGrow => self.write_u8(op::MEMORY_GROW),
            Instr::Const(v) => {
                self.write_u8(op::CONST);
                self.write_value(*v);
            }
            Instr::Unary(ty, unary) => {
                self.write_u8(op::UNARY);
                self.write_val_type(*ty);
                self.write_u8(unary.index());
            }
            Instr::Binary(ty, binary) => {
                self.write_u8(op::BINARY);
                self.write_val_type(*ty);
                self.write_u8(binary.index());
            }
            Instr::Convert(convert) => {
                self.write_u8(op::CONVERT);
                self.write_u8(convert.index());
            }
        }
    }

    fn write_function(&mut self, f: &Function) {
        self.write_u32(f.id);
        self.write_signature(&f.signature);
        self.write_vec(&f.locals, |w, ty| w.write_val_type(*ty));
        self.write_vec(&f.body, Self::write_instr);
    }

    fn write_global(&mut self, g: &Global) {
        self.write_val_type(g.ty);
        self.write_bool(g.mutable);
        match g.init {
            InitExpr::Const(v) => {
                self.write_u8(INIT_CONST);
                self.write_value(v);
            }
            InitExpr::Global(i) => {
                self.write_u8(INIT_GLOBAL);
                self.write_u32(i);
            }
            InitExpr::Import(i) => {
                self.write_u8(INIT_IMPORT);
                self.write_u32(i);
            }
        }
    }
}

/// Encode a module into its wire format.
#[must_use]
pub fn encode(module: &Module) -> Vec<u8> {
    let mut w = Writer::new();
    w.bytes.extend_from_slice(&MAGIC);
    w.write_u8(VERSION);

    w.write_vec(&module.types, Writer::write_signature);
    w.write_vec(&module.functions, Writer::write_function);
    w.write_vec(&module.globals, Writer::write_global);

    w.write_bool(module.memory.is_some());
    if let Some(memory) = &module.memory {
        w.write_u32(memory.initial);
        w.write_bool(memory.maximum.is_some());
        if let Some(max) = memory.maximum {
            w.write_u32(max);
        }
        w.write_vec(&memory.data, |w, seg| {
            w.write_u32(seg.offset);
            w.write_bytes(&seg.bytes);
        });
    }

    w.write_bool(module.table.is_some());
    if let Some(table) = &module.table {
        w.write_u32(table.initial);
        w.write_vec(&table.elements, |w, seg| {
            w.write_u32(seg.offset);
            w.write_vec(&seg.funcs, |w, f| w.write_u32(*f));
        });
    }

    w.write_vec(&module.imported_functions, |w, import| {
        w.write_str(&import.module);
        w.write_str(&import.field);
        w.write_signature(&import.signature);
    });
    w.write_vec(&module.exported_functions, |w, export| {
        w.write_str(&export.name);
        w.write_u32(export.func);
    });

    w.write_bool(module.start.is_some());
    if let Some(start) = module.start {
        w.write_u32(start);
    }

    w.finish()
}
