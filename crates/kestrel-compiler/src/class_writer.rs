//! Binary output for generated types.
//!
//! [`BinaryEmitter`] is the seam between code generation and the on-disk
//! format. [`ClassWriter`] is the shipped implementation: a big-endian,
//! class-file shaped layout tagged with the `KSTR` magic.
//!
//! ```text
//! magic "KSTR" | minor u16 | major u16
//! constant pool (count u16, tagged entries)
//! access u16 | this u16 | super u16 | interfaces (u16 count, u16 each)
//! fields  (access, name, descriptor, attributes)
//! methods (access, name, descriptor, attributes)
//! class attributes (none)
//! ```

use kestrel_core::{InternalError, Modifiers};
use kestrel_types::{ConstantValue, FieldId, TypeDefId, TypeKind, TypeSystem};
use tracing::debug;

use crate::bytecode::{ConstantPool, Instruction, Opcode, Operand, PoolConstant, PoolEntry, SwitchTable};
use crate::emit::Code;
use crate::passes::{GeneratedMethod, GeneratedType};

pub const MAGIC: &[u8; 4] = b"KSTR";
pub const VERSION_MAJOR: u16 = 1;
pub const VERSION_MINOR: u16 = 0;

const WIDE: u8 = 196;
const LDC_W: u8 = 19;

/// Turns one completed type and its generated bodies into bytes.
pub trait BinaryEmitter {
    fn emit(&self, types: &TypeSystem, generated: &GeneratedType) -> Result<Vec<u8>, InternalError>;
}

/// The default [`BinaryEmitter`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ClassWriter;

impl ClassWriter {
    pub fn new() -> Self {
        Self
    }
}

impl BinaryEmitter for ClassWriter {
    fn emit(&self, types: &TypeSystem, generated: &GeneratedType) -> Result<Vec<u8>, InternalError> {
        let mut pool = ConstantPool::new();
        // Everything after the pool is written first so that every entry it
        // references exists when the pool is serialized.
        let mut body = Encoder::new();
        write_header(&mut body, &mut pool, types, generated.def);
        let fields = &types.def(generated.def).fields;
        body.write_len(fields.len())?;
        for &field in fields {
            write_field(&mut body, &mut pool, types, field);
        }
        body.write_len(generated.methods.len())?;
        for method in &generated.methods {
            write_method(&mut body, &mut pool, method)?;
        }
        // No class attributes.
        body.write_u16(0);

        let mut out = Encoder::new();
        out.write_bytes(MAGIC);
        out.write_u16(VERSION_MINOR);
        out.write_u16(VERSION_MAJOR);
        write_pool(&mut out, &pool);
        out.write_bytes(&body.finish());
        let bytes = out.finish();
        debug!(ty = %generated.name, len = bytes.len(), "class written");
        Ok(bytes)
    }
}

// ==========================================================================
// Encoder
// ==========================================================================

struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }

    fn len(&self) -> usize {
        self.buf.len()
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn write_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn write_len(&mut self, len: usize) -> Result<(), InternalError> {
        let len = u16::try_from(len).map_err(|_| InternalError::other("table length overflow"))?;
        self.write_u16(len);
        Ok(())
    }
}

// ==========================================================================
// Class structure
// ==========================================================================

fn write_pool(out: &mut Encoder, pool: &ConstantPool) {
    out.write_u16(pool.count());
    for (_, entry) in pool.entries() {
        out.write_u8(entry.tag());
        match entry {
            PoolEntry::Utf8(text) => {
                // Names and literals are far below the u16 limit; longer text is cut.
                let bytes = text.as_bytes();
                let len = bytes.len().min(usize::from(u16::MAX));
                out.write_u16(len as u16);
                out.write_bytes(&bytes[..len]);
            }
            PoolEntry::Int(v) => out.write_i32(*v),
            PoolEntry::Float(v) => out.write_u32(v.into_inner().to_bits()),
            PoolEntry::Long(v) => out.write_u64(*v as u64),
            PoolEntry::Double(v) => out.write_u64(v.into_inner().to_bits()),
            PoolEntry::Class(name) | PoolEntry::String(name) => out.write_u16(*name),
            PoolEntry::FieldRef { class, name_and_type }
            | PoolEntry::MethodRef { class, name_and_type }
            | PoolEntry::InterfaceMethodRef { class, name_and_type } => {
                out.write_u16(*class);
                out.write_u16(*name_and_type);
            }
            PoolEntry::NameAndType { name, descriptor } => {
                out.write_u16(*name);
                out.write_u16(*descriptor);
            }
        }
    }
}

fn write_header(body: &mut Encoder, pool: &mut ConstantPool, types: &TypeSystem, def: TypeDefId) {
    let entry = types.def(def);
    let mut access = access_flags(entry.modifiers);
    match entry.kind {
        TypeKind::Interface => access |= 0x0200 | 0x0400,
        TypeKind::Annotation => access |= 0x0200 | 0x0400 | 0x2000,
        TypeKind::Enum => access |= 0x4000 | 0x0020,
        TypeKind::Class | TypeKind::Delegate => access |= 0x0020,
    }
    // Nested types are emitted as top-level classes.
    access &= !(0x0002 | 0x0004 | 0x0008);
    body.write_u16(access);
    body.write_u16(pool.class(&types.internal_name(def)));
    let base = entry
        .base
        .and_then(|base| types.def_of(base))
        .or_else(|| (def != types.platform().object).then_some(types.platform().object));
    body.write_u16(base.map_or(0, |base| pool.class(&types.internal_name(base))));
    let interfaces: Vec<TypeDefId> = entry.interfaces.iter().filter_map(|&i| types.def_of(i)).collect();
    body.write_u16(interfaces.len() as u16);
    for interface in interfaces {
        body.write_u16(pool.class(&types.internal_name(interface)));
    }
}

fn write_field(body: &mut Encoder, pool: &mut ConstantPool, types: &TypeSystem, field: FieldId) {
    let entry = types.field(field);
    body.write_u16(access_flags(entry.modifiers));
    body.write_u16(pool.utf8(&entry.name));
    body.write_u16(pool.utf8(&types.descriptor(entry.ty)));
    let constant = entry.constant.as_ref().and_then(|value| constant_entry(pool, value));
    match constant {
        Some(index) => {
            body.write_u16(1);
            body.write_u16(pool.utf8("ConstantValue"));
            body.write_u32(2);
            body.write_u16(index);
        }
        None => body.write_u16(0),
    }
}

/// Pool index of a field's `ConstantValue` attribute.
fn constant_entry(pool: &mut ConstantPool, value: &ConstantValue) -> Option<u16> {
    Some(match value {
        ConstantValue::Bool(v) => pool.add(PoolEntry::Int(i32::from(*v))),
        ConstantValue::Int(v) => pool.add(PoolEntry::Int(*v)),
        ConstantValue::Char(v) => pool.add(PoolEntry::Int(i32::from(*v))),
        ConstantValue::Long(v) => pool.add(PoolEntry::Long(*v)),
        ConstantValue::Float(v) => pool.add(PoolEntry::Float(*v)),
        ConstantValue::Double(v) => pool.add(PoolEntry::Double(*v)),
        ConstantValue::String(v) => pool.string(v),
        _ => return None,
    })
}

fn write_method(body: &mut Encoder, pool: &mut ConstantPool, method: &GeneratedMethod) -> Result<(), InternalError> {
    body.write_u16(access_flags(method.modifiers));
    body.write_u16(pool.utf8(&method.name));
    body.write_u16(pool.utf8(&method.descriptor));
    let Some(code) = &method.code else {
        body.write_u16(0);
        return Ok(());
    };
    let bytes = encode_code(code, pool)?;
    let length = u32::try_from(bytes.len()).map_err(|_| InternalError::other("method too large"))?;
    body.write_u16(1);
    body.write_u16(pool.utf8("Code"));
    // max_stack, max_locals, code length, code, empty handler and attribute tables
    body.write_u32(2 + 2 + 4 + length + 2 + 2);
    body.write_u16(code.max_stack);
    body.write_u16(code.max_locals);
    body.write_u32(length);
    body.write_bytes(&bytes);
    body.write_u16(0);
    body.write_u16(0);
    Ok(())
}

fn access_flags(modifiers: Modifiers) -> u16 {
    const FLAGS: [(Modifiers, u16); 13] = [
        (Modifiers::PUBLIC, 0x0001),
        (Modifiers::PRIVATE, 0x0002),
        (Modifiers::PROTECTED, 0x0004),
        (Modifiers::STATIC, 0x0008),
        (Modifiers::FINAL, 0x0010),
        (Modifiers::SYNCHRONIZED, 0x0020),
        (Modifiers::VOLATILE, 0x0040),
        (Modifiers::TRANSIENT, 0x0080),
        (Modifiers::NATIVE, 0x0100),
        (Modifiers::ABSTRACT, 0x0400),
        (Modifiers::STRICTFP, 0x0800),
        (Modifiers::SYNTHETIC, 0x1000),
        (Modifiers::ENUM, 0x4000),
    ];
    FLAGS
        .iter()
        .filter(|(modifier, _)| modifiers.contains(*modifier))
        .fold(0, |acc, (_, flag)| acc | flag)
}

// ==========================================================================
// Code
// ==========================================================================

/// Encode one body. Labels resolve to byte offsets relative to the
/// branching instruction.
pub(crate) fn encode_code(code: &Code, pool: &mut ConstantPool) -> Result<Vec<u8>, InternalError> {
    let indices: Vec<u16> = code.instructions.iter().map(|i| pool_index(i, pool)).collect();

    let mut offsets = Vec::with_capacity(code.instructions.len() + 1);
    let mut offset = 0usize;
    for (instruction, &index) in code.instructions.iter().zip(&indices) {
        offsets.push(offset);
        offset += instruction_size(instruction, index, offset);
    }
    // A label bound past the last instruction.
    offsets.push(offset);

    let target = |label: crate::bytecode::Label| -> Result<usize, InternalError> {
        code.label_position(label)
            .and_then(|position| offsets.get(position).copied())
            .ok_or(InternalError::UnboundLabel { label: label.index() })
    };

    let mut out = Encoder::new();
    for ((instruction, &index), &at) in code.instructions.iter().zip(&indices).zip(&offsets) {
        let opcode: u8 = instruction.opcode.into();
        match &instruction.operand {
            Operand::None => out.write_u8(opcode),
            Operand::Local(slot) => match u8::try_from(*slot) {
                Ok(slot) => {
                    out.write_u8(opcode);
                    out.write_u8(slot);
                }
                Err(_) => {
                    out.write_u8(WIDE);
                    out.write_u8(opcode);
                    out.write_u16(*slot);
                }
            },
            Operand::Int(value) => {
                out.write_u8(opcode);
                if instruction.opcode == Opcode::Sipush {
                    out.write_i16(*value as i16);
                } else {
                    out.write_u8(*value as u8);
                }
            }
            Operand::Label(label) => {
                out.write_u8(opcode);
                let delta = target(*label)? as i64 - at as i64;
                let delta = i16::try_from(delta).map_err(|_| InternalError::other("branch offset out of range"))?;
                out.write_i16(delta);
            }
            Operand::Constant(_) => {
                if instruction.opcode == Opcode::Ldc && index > u16::from(u8::MAX) {
                    out.write_u8(LDC_W);
                    out.write_u16(index);
                } else if instruction.opcode == Opcode::Ldc {
                    out.write_u8(opcode);
                    out.write_u8(index as u8);
                } else {
                    out.write_u8(opcode);
                    out.write_u16(index);
                }
            }
            Operand::Field(_) | Operand::Type(_) => {
                out.write_u8(opcode);
                out.write_u16(index);
            }
            Operand::Method(method) => {
                out.write_u8(opcode);
                out.write_u16(index);
                if instruction.opcode == Opcode::Invokeinterface {
                    out.write_u8((1 + method.argument_slots()) as u8);
                    out.write_u8(0);
                }
            }
            Operand::Switch(table) => {
                out.write_u8(opcode);
                while out.len() % 4 != 0 {
                    out.write_u8(0);
                }
                let relative = |label| -> Result<i32, InternalError> { Ok((target(label)? as i64 - at as i64) as i32) };
                out.write_i32(relative(table.default)?);
                if instruction.opcode == Opcode::Tableswitch {
                    let (low, high) = bounds(table);
                    out.write_i32(low);
                    out.write_i32(high);
                    let mut cases = table.cases.iter().peekable();
                    for key in low..=high {
                        let label = match cases.peek() {
                            Some(&&(case, label)) if case == key => {
                                cases.next();
                                label
                            }
                            _ => table.default,
                        };
                        out.write_i32(relative(label)?);
                    }
                } else {
                    out.write_i32(table.cases.len() as i32);
                    for &(key, label) in &table.cases {
                        out.write_i32(key);
                        out.write_i32(relative(label)?);
                    }
                }
            }
            Operand::Increment { local, delta } => match (u8::try_from(*local), i8::try_from(*delta)) {
                (Ok(local), Ok(delta)) => {
                    out.write_u8(opcode);
                    out.write_u8(local);
                    out.write_u8(delta as u8);
                }
                _ => {
                    out.write_u8(WIDE);
                    out.write_u8(opcode);
                    out.write_u16(*local);
                    out.write_i16(*delta);
                }
            },
        }
    }
    Ok(out.finish())
}

/// Pool index an instruction refers to, or 0.
fn pool_index(instruction: &Instruction, pool: &mut ConstantPool) -> u16 {
    match &instruction.operand {
        Operand::Constant(constant) => match constant {
            PoolConstant::Int(v) => pool.add(PoolEntry::Int(*v)),
            PoolConstant::Long(v) => pool.add(PoolEntry::Long(*v)),
            PoolConstant::Float(v) => pool.add(PoolEntry::Float(*v)),
            PoolConstant::Double(v) => pool.add(PoolEntry::Double(*v)),
            PoolConstant::String(v) => pool.string(v),
        },
        Operand::Field(field) => pool.field(&field.owner, &field.name, &field.descriptor),
        Operand::Method(method) => pool.method(&method.owner, &method.name, &method.descriptor, method.interface),
        Operand::Type(name) => pool.class(name),
        _ => 0,
    }
}

fn instruction_size(instruction: &Instruction, index: u16, offset: usize) -> usize {
    match &instruction.operand {
        Operand::None => 1,
        Operand::Local(slot) if *slot > u16::from(u8::MAX) => 4,
        Operand::Local(_) => 2,
        Operand::Int(_) if instruction.opcode == Opcode::Sipush => 3,
        Operand::Int(_) => 2,
        Operand::Label(_) | Operand::Field(_) | Operand::Type(_) => 3,
        Operand::Constant(_) if instruction.opcode == Opcode::Ldc && index <= u16::from(u8::MAX) => 2,
        Operand::Constant(_) => 3,
        Operand::Method(_) if instruction.opcode == Opcode::Invokeinterface => 5,
        Operand::Method(_) => 3,
        Operand::Switch(table) => {
            let padding = 3 - offset % 4;
            let payload = if instruction.opcode == Opcode::Tableswitch {
                let (low, high) = bounds(table);
                12 + 4 * (i64::from(high) - i64::from(low) + 1) as usize
            } else {
                8 + 8 * table.cases.len()
            };
            1 + padding + payload
        }
        Operand::Increment { local, delta } => {
            if *local > u16::from(u8::MAX) || i8::try_from(*delta).is_err() {
                6
            } else {
                3
            }
        }
    }
}

fn bounds(table: &SwitchTable) -> (i32, i32) {
    match (table.cases.first(), table.cases.last()) {
        (Some(&(low, _)), Some(&(high, _))) => (low, high),
        _ => (0, -1),
    }
}

#[cfg(test)]
mod tests {
    use kestrel_core::Modifiers;
    use kestrel_types::TypeSystem;

    use super::*;
    use crate::bytecode::{MethodRef, SwitchTable};
    use crate::emit::CodeEmitter;

    fn code(build: impl FnOnce(&mut CodeEmitter)) -> Code {
        let mut emitter = CodeEmitter::new("test");
        build(&mut emitter);
        emitter.finish(4).expect("valid body")
    }

    #[test]
    fn backward_branches_get_negative_offsets() {
        let body = code(|e| {
            let top = e.new_label();
            e.bind(top);
            e.emit_iinc(1, 1);
            e.emit_jump(Opcode::Goto, top);
        });
        let bytes = encode_code(&body, &mut ConstantPool::new()).unwrap();
        // iinc 1 1, goto -3
        assert_eq!(bytes, vec![132, 1, 1, 167, 0xFF, 0xFD]);
    }

    #[test]
    fn wide_forms_for_large_slots_and_deltas() {
        let body = code(|e| {
            e.emit_iinc(300, 1);
            e.emit_iinc(1, 1000);
            e.emit(Opcode::Return);
        });
        let bytes = encode_code(&body, &mut ConstantPool::new()).unwrap();
        assert_eq!(&bytes[..6], &[WIDE, 132, 0x01, 0x2C, 0x00, 0x01]);
        assert_eq!(&bytes[6..12], &[WIDE, 132, 0x00, 0x01, 0x03, 0xE8]);
        assert_eq!(bytes[12], 177);
    }

    #[test]
    fn tableswitch_is_aligned_and_fills_gaps() {
        let body = code(|e| {
            let one = e.new_label();
            let three = e.new_label();
            let default = e.new_label();
            e.emit_local(Opcode::Iload, 1);
            e.emit_switch(SwitchTable {
                default,
                cases: vec![(1, one), (3, three)],
            });
            e.bind(one);
            e.emit(Opcode::Return);
            e.bind(three);
            e.emit(Opcode::Return);
            e.bind(default);
            e.emit(Opcode::Return);
        });
        let bytes = encode_code(&body, &mut ConstantPool::new()).unwrap();
        assert_eq!(bytes[2], 170);
        // iload takes 2 bytes, the switch opcode 1, so one pad byte.
        assert_eq!(bytes[3], 0);
        let word = |at: usize| i32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let switch_len = 1 + 1 + 12 + 3 * 4;
        let first_return = 2 + switch_len as i32;
        assert_eq!(word(4), first_return - 2 + 2, "default");
        assert_eq!((word(8), word(12)), (1, 3));
        assert_eq!(word(16), first_return - 2);
        // Key 2 is missing and falls back to the default.
        assert_eq!(word(20), word(4));
        assert_eq!(word(24), first_return - 2 + 1);
    }

    #[test]
    fn interface_calls_carry_their_argument_count() {
        let body = code(|e| {
            e.emit_local(Opcode::Aload, 1);
            e.emit_local(Opcode::Iload, 2);
            e.emit_invoke(Opcode::Invokeinterface, MethodRef::new("app/Sink", "put", "(I)V").on_interface());
            e.emit(Opcode::Return);
        });
        let mut pool = ConstantPool::new();
        let bytes = encode_code(&body, &mut pool).unwrap();
        // Utf8, Class, Utf8, Utf8, NameAndType, then the reference itself.
        assert_eq!(&bytes[4..9], &[185, 0, 6, 2, 0]);
        assert_eq!(pool.entries().iter().filter(|(_, e)| e.tag() == 11).count(), 1);
    }

    #[test]
    fn class_starts_with_magic_and_version() {
        let types = TypeSystem::new();
        let object = types.platform().object;
        let generated = GeneratedType {
            def: object,
            name: "kestrel.lang.Object".to_string(),
            methods: vec![GeneratedMethod {
                method: types.def(object).methods[0],
                name: "<init>".to_string(),
                descriptor: "()V".to_string(),
                modifiers: Modifiers::PUBLIC,
                code: Some(code(|e| e.emit(Opcode::Return))),
            }],
        };
        let bytes = ClassWriter::new().emit(&types, &generated).unwrap();
        assert_eq!(&bytes[..4], MAGIC);
        assert_eq!(u16::from_be_bytes([bytes[4], bytes[5]]), VERSION_MINOR);
        assert_eq!(u16::from_be_bytes([bytes[6], bytes[7]]), VERSION_MAJOR);
        // The root type has no super class; the trailing class attribute count is zero.
        assert_eq!(&bytes[bytes.len() - 2..], &[0, 0]);
    }

    #[test]
    fn access_flags_map_modifiers() {
        let flags = access_flags(Modifiers::PUBLIC | Modifiers::STATIC | Modifiers::FINAL | Modifiers::SYNTHETIC);
        assert_eq!(flags, 0x0001 | 0x0008 | 0x0010 | 0x1000);
        assert_eq!(access_flags(Modifiers::VIRTUAL | Modifiers::OVERRIDE), 0);
    }
}
