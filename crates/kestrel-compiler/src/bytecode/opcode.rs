//! Operation codes of the target stack machine.
//!
//! Byte values are the encoding written by the class writer, so
//! [`Opcode`] converts to and from `u8` through `num_enum`.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Target instruction set.
///
/// Operands are carried by [`Instruction`](super::Instruction), never inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0,

    // =========================================================================
    // Constants
    // =========================================================================
    AconstNull = 1,
    IconstM1 = 2,
    Iconst0 = 3,
    Iconst1 = 4,
    Iconst2 = 5,
    Iconst3 = 6,
    Iconst4 = 7,
    Iconst5 = 8,
    Lconst0 = 9,
    Lconst1 = 10,
    Fconst0 = 11,
    Fconst1 = 12,
    Fconst2 = 13,
    Dconst0 = 14,
    Dconst1 = 15,
    /// Operand: integer literal in `i8` range.
    Bipush = 16,
    /// Operand: integer literal in `i16` range.
    Sipush = 17,
    /// Operand: one-slot pool constant.
    Ldc = 18,
    /// Operand: two-slot pool constant.
    Ldc2W = 20,

    // =========================================================================
    // Locals
    // =========================================================================
    Iload = 21,
    Lload = 22,
    Fload = 23,
    Dload = 24,
    Aload = 25,
    Istore = 54,
    Lstore = 55,
    Fstore = 56,
    Dstore = 57,
    Astore = 58,
    /// Operand: increment of an `int` local.
    Iinc = 132,

    // =========================================================================
    // Arrays
    // =========================================================================
    Iaload = 46,
    Laload = 47,
    Faload = 48,
    Daload = 49,
    Aaload = 50,
    Baload = 51,
    Caload = 52,
    Saload = 53,
    Iastore = 79,
    Lastore = 80,
    Fastore = 81,
    Dastore = 82,
    Aastore = 83,
    Bastore = 84,
    Castore = 85,
    Sastore = 86,
    /// Operand: integer literal holding the primitive array type code.
    Newarray = 188,
    /// Operand: element type.
    Anewarray = 189,
    Arraylength = 190,

    // =========================================================================
    // Stack
    // =========================================================================
    Pop = 87,
    Pop2 = 88,
    Dup = 89,
    DupX1 = 90,
    DupX2 = 91,
    Dup2 = 92,
    Dup2X1 = 93,
    Dup2X2 = 94,
    Swap = 95,

    // =========================================================================
    // Arithmetic
    // =========================================================================
    Iadd = 96,
    Ladd = 97,
    Fadd = 98,
    Dadd = 99,
    Isub = 100,
    Lsub = 101,
    Fsub = 102,
    Dsub = 103,
    Imul = 104,
    Lmul = 105,
    Fmul = 106,
    Dmul = 107,
    Idiv = 108,
    Ldiv = 109,
    Fdiv = 110,
    Ddiv = 111,
    Irem = 112,
    Lrem = 113,
    Frem = 114,
    Drem = 115,
    Ineg = 116,
    Lneg = 117,
    Fneg = 118,
    Dneg = 119,
    Ishl = 120,
    Lshl = 121,
    Ishr = 122,
    Lshr = 123,
    Iushr = 124,
    Lushr = 125,
    Iand = 126,
    Land = 127,
    Ior = 128,
    Lor = 129,
    Ixor = 130,
    Lxor = 131,

    // =========================================================================
    // Conversions
    // =========================================================================
    I2l = 133,
    I2f = 134,
    I2d = 135,
    L2i = 136,
    L2f = 137,
    L2d = 138,
    F2i = 139,
    F2l = 140,
    F2d = 141,
    D2i = 142,
    D2l = 143,
    D2f = 144,
    I2b = 145,
    I2c = 146,
    I2s = 147,

    // =========================================================================
    // Comparisons and branches
    // =========================================================================
    Lcmp = 148,
    Fcmpl = 149,
    Fcmpg = 150,
    Dcmpl = 151,
    Dcmpg = 152,
    Ifeq = 153,
    Ifne = 154,
    Iflt = 155,
    Ifge = 156,
    Ifgt = 157,
    Ifle = 158,
    IfIcmpeq = 159,
    IfIcmpne = 160,
    IfIcmplt = 161,
    IfIcmpge = 162,
    IfIcmpgt = 163,
    IfIcmple = 164,
    IfAcmpeq = 165,
    IfAcmpne = 166,
    Goto = 167,
    Tableswitch = 170,
    Lookupswitch = 171,
    Ifnull = 198,
    Ifnonnull = 199,

    // =========================================================================
    // Returns
    // =========================================================================
    Ireturn = 172,
    Lreturn = 173,
    Freturn = 174,
    Dreturn = 175,
    Areturn = 176,
    Return = 177,

    // =========================================================================
    // Fields and methods
    // =========================================================================
    Getstatic = 178,
    Putstatic = 179,
    Getfield = 180,
    Putfield = 181,
    Invokevirtual = 182,
    Invokespecial = 183,
    Invokestatic = 184,
    Invokeinterface = 185,

    // =========================================================================
    // Objects
    // =========================================================================
    New = 187,
    Athrow = 191,
    Checkcast = 192,
    Instanceof = 193,
}

impl Opcode {
    /// Slots popped and pushed by opcodes whose effect does not depend on the operand.
    ///
    /// Returns `None` for field, method and constant instructions.
    pub fn fixed_stack_effect(self) -> Option<(u16, u16)> {
        use Opcode::*;
        let effect = match self {
            Nop | Iinc | Goto | Return => (0, 0),
            AconstNull | IconstM1 | Iconst0 | Iconst1 | Iconst2 | Iconst3 | Iconst4 | Iconst5
            | Fconst0 | Fconst1 | Fconst2 | Bipush | Sipush | Iload | Fload | Aload | New => (0, 1),
            Lconst0 | Lconst1 | Dconst0 | Dconst1 | Lload | Dload => (0, 2),
            Istore | Fstore | Astore | Pop => (1, 0),
            Lstore | Dstore | Pop2 => (2, 0),
            Iaload | Faload | Aaload | Baload | Caload | Saload => (2, 1),
            Laload | Daload => (2, 2),
            Iastore | Fastore | Aastore | Bastore | Castore | Sastore => (3, 0),
            Lastore | Dastore => (4, 0),
            Newarray | Anewarray | Arraylength | Checkcast | Instanceof => (1, 1),
            Dup => (1, 2),
            DupX1 => (2, 3),
            DupX2 => (3, 4),
            Dup2 => (2, 4),
            Dup2X1 => (3, 5),
            Dup2X2 => (4, 6),
            Swap => (2, 2),
            Iadd | Isub | Imul | Idiv | Irem | Ishl | Ishr | Iushr | Iand | Ior | Ixor | Fadd
            | Fsub | Fmul | Fdiv | Frem => (2, 1),
            Ladd | Lsub | Lmul | Ldiv | Lrem | Land | Lor | Lxor | Dadd | Dsub | Dmul | Ddiv
            | Drem => (4, 2),
            Lshl | Lshr | Lushr => (3, 2),
            Ineg | Fneg | I2f | F2i | I2b | I2c | I2s => (1, 1),
            Lneg | Dneg | L2d | D2l => (2, 2),
            I2l | I2d | F2l | F2d => (1, 2),
            L2i | L2f | D2i | D2f => (2, 1),
            Lcmp | Dcmpl | Dcmpg => (4, 1),
            Fcmpl | Fcmpg => (2, 1),
            Ifeq | Ifne | Iflt | Ifge | Ifgt | Ifle | Ifnull | Ifnonnull | Tableswitch
            | Lookupswitch | Ireturn | Freturn | Areturn | Athrow => (1, 0),
            IfIcmpeq | IfIcmpne | IfIcmplt | IfIcmpge | IfIcmpgt | IfIcmple | IfAcmpeq
            | IfAcmpne | Lreturn | Dreturn => (2, 0),
            Ldc | Ldc2W | Getstatic | Putstatic | Getfield | Putfield | Invokevirtual
            | Invokespecial | Invokestatic | Invokeinterface => return None,
        };
        Some(effect)
    }

    /// Control never falls through to the next instruction.
    pub fn ends_flow(self) -> bool {
        matches!(
            self,
            Opcode::Goto
                | Opcode::Tableswitch
                | Opcode::Lookupswitch
                | Opcode::Ireturn
                | Opcode::Lreturn
                | Opcode::Freturn
                | Opcode::Dreturn
                | Opcode::Areturn
                | Opcode::Return
                | Opcode::Athrow
        )
    }

    pub fn is_conditional_branch(self) -> bool {
        matches!(
            self,
            Opcode::Ifeq
                | Opcode::Ifne
                | Opcode::Iflt
                | Opcode::Ifge
                | Opcode::Ifgt
                | Opcode::Ifle
                | Opcode::IfIcmpeq
                | Opcode::IfIcmpne
                | Opcode::IfIcmplt
                | Opcode::IfIcmpge
                | Opcode::IfIcmpgt
                | Opcode::IfIcmple
                | Opcode::IfAcmpeq
                | Opcode::IfAcmpne
                | Opcode::Ifnull
                | Opcode::Ifnonnull
        )
    }

    /// The branch taken when this conditional branch's condition is false.
    pub fn negate(self) -> Option<Opcode> {
        use Opcode::*;
        let negated = match self {
            Ifeq => Ifne,
            Ifne => Ifeq,
            Iflt => Ifge,
            Ifge => Iflt,
            Ifgt => Ifle,
            Ifle => Ifgt,
            IfIcmpeq => IfIcmpne,
            IfIcmpne => IfIcmpeq,
            IfIcmplt => IfIcmpge,
            IfIcmpge => IfIcmplt,
            IfIcmpgt => IfIcmple,
            IfIcmple => IfIcmpgt,
            IfAcmpeq => IfAcmpne,
            IfAcmpne => IfAcmpeq,
            Ifnull => Ifnonnull,
            Ifnonnull => Ifnull,
            _ => return None,
        };
        Some(negated)
    }

    pub fn mnemonic(self) -> String {
        let name = format!("{:?}", self);
        let mut out = String::with_capacity(name.len() + 2);
        for (i, ch) in name.chars().enumerate() {
            if ch.is_ascii_uppercase() && i > 0 {
                out.push('_');
            }
            // `Iconst3` is `iconst_3`; `Dup2` and `I2l` keep their digits attached.
            if ch.is_ascii_digit() && out.ends_with("const") {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_values_round_trip() {
        for op in [Opcode::Iinc, Opcode::Dup2X2, Opcode::Invokeinterface, Opcode::Ifnonnull] {
            let byte: u8 = op.into();
            assert_eq!(Opcode::try_from(byte), Ok(op));
        }
        assert!(Opcode::try_from(0xFFu8).is_err());
    }

    #[test]
    fn dup_forms_grow_the_stack_by_their_width() {
        for (op, width) in [
            (Opcode::Dup, 1),
            (Opcode::DupX1, 1),
            (Opcode::DupX2, 1),
            (Opcode::Dup2, 2),
            (Opcode::Dup2X1, 2),
            (Opcode::Dup2X2, 2),
        ] {
            let (pop, push) = op.fixed_stack_effect().unwrap();
            assert_eq!(push - pop, width, "{:?}", op);
        }
    }

    #[test]
    fn negation_is_an_involution() {
        for op in [Opcode::Ifeq, Opcode::IfIcmplt, Opcode::IfAcmpne, Opcode::Ifnull] {
            assert_eq!(op.negate().and_then(Opcode::negate), Some(op));
        }
        assert_eq!(Opcode::Goto.negate(), None);
    }

    #[test]
    fn mnemonics_are_snake_case() {
        assert_eq!(Opcode::Dup2X1.mnemonic(), "dup2_x1");
        assert_eq!(Opcode::IfIcmpge.mnemonic(), "if_icmpge");
        assert_eq!(Opcode::Iinc.mnemonic(), "iinc");
        assert_eq!(Opcode::Iconst3.mnemonic(), "iconst_3");
        assert_eq!(Opcode::IconstM1.mnemonic(), "iconst_m1");
        assert_eq!(Opcode::Ldc2W.mnemonic(), "ldc2_w");
    }
}
