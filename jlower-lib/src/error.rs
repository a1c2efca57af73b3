use thiserror::Error;

use crate::jvmtypes::Label;

/// Why lowering of a method stopped. Instruction positions are indices into the method's
/// instruction stream, labels and line-number markers included.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("operand stack underflow at instruction {insn}")]
    StackUnderflow { insn : usize },

    #[error("inconsistent operand stacks merge at instruction {insn}")]
    InconsistentMerge { insn : usize },

    #[error("unsupported instruction `{mnemonic}` (opcode {opcode:#04x}) at instruction {insn}")]
    Unsupported { insn : usize, opcode : u8, mnemonic : &'static str },

    #[error("wide value at instruction {insn} is not paired with its second slot")]
    MalformedWidePair { insn : usize },

    #[error("local slot {index} is out of range (max_locals is {max})")]
    InvalidLocal { index : u16, max : u16 },

    #[error("label {0:?} does not occur in the instruction stream")]
    UndefinedLabel(Label),

    #[error("operand at instruction {insn} is not a local or a constant")]
    NotImmediate { insn : usize },

    #[error("instruction {insn} changed stack depth by {actual}, expected {expected}")]
    StackEffect { insn : usize, expected : i32, actual : i32 },

    #[error("instruction {insn} already holds a statement")]
    UnitCollision { insn : usize },

    #[error("no defining statement for the operand produced at instruction {insn}")]
    MissingDefinition { insn : usize },
}

/// A method-scoped lowering failure. No partially lowered body accompanies it.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("cannot lower {method}: {kind}")]
pub struct LoweringError {
    pub method : String,
    pub kind : ErrorKind,
}

pub(crate) type LowerResult<T> = Result<T, ErrorKind>;

#[test]
fn test_messages() {
    let e = LoweringError {
        method : "<A: void f()>".to_owned(),
        kind : ErrorKind::Unsupported { insn : 3, opcode : 0xa8, mnemonic : "jsr" },
    };
    assert_eq!("cannot lower <A: void f()>: unsupported instruction `jsr` (opcode 0xa8) at instruction 3", e.to_string());
}
