//! Instructions: an opcode plus one typed operand.

use std::fmt;

use ordered_float::OrderedFloat;

use super::Opcode;

/// Branch target inside one method body, bound by the emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub(crate) u32);

impl Label {
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A value loaded with `ldc`/`ldc2_w`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PoolConstant {
    Int(i32),
    Long(i64),
    Float(OrderedFloat<f32>),
    Double(OrderedFloat<f64>),
    String(String),
}

impl PoolConstant {
    pub fn slots(&self) -> u16 {
        match self {
            PoolConstant::Long(_) | PoolConstant::Double(_) => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for PoolConstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolConstant::Int(v) => write!(f, "{}", v),
            PoolConstant::Long(v) => write!(f, "{}L", v),
            PoolConstant::Float(v) => write!(f, "{}f", v),
            PoolConstant::Double(v) => write!(f, "{}d", v),
            PoolConstant::String(v) => write!(f, "{:?}", v),
        }
    }
}

/// Symbolic field reference: owner internal name, field name and descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl FieldRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }

    pub fn slots(&self) -> u16 {
        value_slots(&self.descriptor)
    }
}

/// Symbolic method reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    /// The owner is an interface.
    pub interface: bool,
}

impl MethodRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
            interface: false,
        }
    }

    pub fn on_interface(mut self) -> Self {
        self.interface = true;
        self
    }

    /// Slots taken by the declared arguments, excluding any receiver.
    pub fn argument_slots(&self) -> u16 {
        let params = self
            .descriptor
            .strip_prefix('(')
            .and_then(|rest| rest.split_once(')'))
            .map(|(params, _)| params)
            .unwrap_or("");
        split_descriptors(params).iter().map(|d| value_slots(d)).sum()
    }

    pub fn return_slots(&self) -> u16 {
        match self.descriptor.rsplit_once(')') {
            Some((_, "V")) | None => 0,
            Some((_, ret)) => value_slots(ret),
        }
    }
}

/// Keys must be sorted ascending and unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SwitchTable {
    pub default: Label,
    pub cases: Vec<(i32, Label)>,
}

impl SwitchTable {
    /// Dense enough for a `tableswitch`.
    pub fn is_dense(&self) -> bool {
        match (self.cases.first(), self.cases.last()) {
            (Some(&(low, _)), Some(&(high, _))) => {
                let span = i64::from(high) - i64::from(low) + 1;
                span <= 2 * self.cases.len() as i64 + 4
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    None,
    Local(u16),
    Int(i32),
    Label(Label),
    Constant(PoolConstant),
    Field(FieldRef),
    Method(MethodRef),
    /// Internal name of a class or descriptor of an array type.
    Type(String),
    Switch(SwitchTable),
    Increment { local: u16, delta: i16 },
}

/// One instruction of a method body. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand: Operand,
}

impl Instruction {
    pub fn new(opcode: Opcode, operand: Operand) -> Self {
        Self { opcode, operand }
    }

    pub fn simple(opcode: Opcode) -> Self {
        Self::new(opcode, Operand::None)
    }

    pub fn label(&self) -> Option<Label> {
        match self.operand {
            Operand::Label(label) => Some(label),
            _ => None,
        }
    }

    /// Slots popped and pushed by this instruction.
    pub fn stack_effect(&self) -> (u16, u16) {
        if let Some(effect) = self.opcode.fixed_stack_effect() {
            return effect;
        }
        match (&self.operand, self.opcode) {
            (Operand::Constant(constant), _) => (0, constant.slots()),
            (Operand::Field(field), Opcode::Getstatic) => (0, field.slots()),
            (Operand::Field(field), Opcode::Putstatic) => (field.slots(), 0),
            (Operand::Field(field), Opcode::Getfield) => (1, field.slots()),
            (Operand::Field(field), Opcode::Putfield) => (1 + field.slots(), 0),
            (Operand::Method(method), Opcode::Invokestatic) => {
                (method.argument_slots(), method.return_slots())
            }
            (Operand::Method(method), _) => (1 + method.argument_slots(), method.return_slots()),
            _ => (0, 0),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode.mnemonic())?;
        match &self.operand {
            Operand::None => Ok(()),
            Operand::Local(slot) => write!(f, " {}", slot),
            Operand::Int(value) => write!(f, " {}", value),
            Operand::Label(label) => write!(f, " {}", label),
            Operand::Constant(constant) => write!(f, " {}", constant),
            Operand::Field(field) => {
                write!(f, " {}.{}:{}", field.owner, field.name, field.descriptor)
            }
            Operand::Method(method) => {
                write!(f, " {}.{}{}", method.owner, method.name, method.descriptor)
            }
            Operand::Type(name) => write!(f, " {}", name),
            Operand::Switch(table) => {
                write!(f, " {{")?;
                for (key, label) in &table.cases {
                    write!(f, " {}: {},", key, label)?;
                }
                write!(f, " default: {} }}", table.default)
            }
            Operand::Increment { local, delta } => write!(f, " {} {}", local, delta),
        }
    }
}

fn value_slots(descriptor: &str) -> u16 {
    match descriptor.as_bytes().first() {
        Some(b'J') | Some(b'D') => 2,
        Some(b'V') | None => 0,
        _ => 1,
    }
}

/// Split a run of concatenated field descriptors.
fn split_descriptors(mut run: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    while !run.is_empty() {
        let bytes = run.as_bytes();
        let mut end = 0;
        while bytes.get(end) == Some(&b'[') {
            end += 1;
        }
        end += match bytes.get(end) {
            Some(b'L') => run[end..].find(';').map_or(run.len() - end, |i| i + 1),
            Some(_) => 1,
            None => 0,
        };
        parts.push(&run[..end]);
        run = &run[end..];
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_slots_follow_descriptor() {
        let method = MethodRef::new("app/Foo", "m", "(IJLkestrel/lang/String;[D)D");
        assert_eq!(method.argument_slots(), 1 + 2 + 1 + 1);
        assert_eq!(method.return_slots(), 2);
        let void = MethodRef::new("app/Foo", "run", "()V");
        assert_eq!(void.argument_slots(), 0);
        assert_eq!(void.return_slots(), 0);
    }

    #[test]
    fn field_instructions_account_for_receiver() {
        let field = FieldRef::new("app/Foo", "total", "J");
        let get = Instruction::new(Opcode::Getfield, Operand::Field(field.clone()));
        let put = Instruction::new(Opcode::Putfield, Operand::Field(field));
        assert_eq!(get.stack_effect(), (1, 2));
        assert_eq!(put.stack_effect(), (3, 0));
    }

    #[test]
    fn invoke_pops_receiver_unless_static() {
        let method = MethodRef::new("app/Foo", "m", "(I)I");
        let virt = Instruction::new(Opcode::Invokevirtual, Operand::Method(method.clone()));
        let stat = Instruction::new(Opcode::Invokestatic, Operand::Method(method));
        assert_eq!(virt.stack_effect(), (2, 1));
        assert_eq!(stat.stack_effect(), (1, 1));
    }

    #[test]
    fn switch_density() {
        let table = |keys: &[i32]| SwitchTable {
            default: Label(0),
            cases: keys.iter().map(|&k| (k, Label(1))).collect(),
        };
        assert!(table(&[1, 2, 3, 5]).is_dense());
        assert!(!table(&[1, 1000]).is_dense());
    }

    #[test]
    fn display_is_readable() {
        let inc = Instruction::new(Opcode::Iinc, Operand::Increment { local: 2, delta: -1 });
        assert_eq!(inc.to_string(), "iinc 2 -1");
    }
}
