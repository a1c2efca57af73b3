use std::collections::BTreeMap;

use classfile_parser::code_attribute::Instruction;

use crate::ir::Constant;
use crate::types::{CallSite, FieldRef, MethodRef, Type};
use crate::GeneralResult;

/// Operand category of an instruction, as encoded in its opcode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JType {
    Int,
    Long,
    Float,
    Double,
    Object,
    Byte,
    Char,
    Short,
    Void,
}

impl JType {
    pub fn size(self) -> u8 {
        use JType::*;
        match self {
            Long | Double => 2,
            Int | Float | Object | Byte | Char | Short => 1,
            Void => 0,
        }
    }

    pub fn is_wide(self) -> bool { self.size() == 2 }

    pub fn to_type(self) -> Type {
        match self {
            JType::Int    => Type::Int,
            JType::Long   => Type::Long,
            JType::Float  => Type::Float,
            JType::Double => Type::Double,
            JType::Byte   => Type::Byte,
            JType::Char   => Type::Char,
            JType::Short  => Type::Short,
            JType::Void   => Type::Void,
            JType::Object => Type::class("java.lang.Object"),
        }
    }
}

// Element type of a `newarray` instruction's `atype` operand
fn array_element(atype : u8) -> Option<Type> {
    match atype {
        4  => Some(Type::Boolean),
        5  => Some(Type::Char),
        6  => Some(Type::Float),
        7  => Some(Type::Double),
        8  => Some(Type::Byte),
        9  => Some(Type::Short),
        10 => Some(Type::Int),
        11 => Some(Type::Long),
        _  => None,
    }
}

/// A position in the instruction stream that branches, switches and exception ranges refer to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArithmeticOperation {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    Shl,
    Shr,
    Ushr,
    And,
    Or,
    Xor,
}

impl ArithmeticOperation {
    pub fn is_shift(self) -> bool {
        use ArithmeticOperation::*;
        matches!(self, Shl | Shr | Ushr)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StackOperation {
    Pop,
    Dup,
    DupX1,
    DupX2,
    Swap,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NanComparisons {
    Greater,
    Less,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperandCount {
    _1 = 1,
    _2 = 2,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VarOp {
    Get,
    Put,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VarKind {
    Static,
    Field,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InvokeKind {
    Interface,
    Special,
    Static,
    Virtual,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MonitorOp {
    Enter,
    Exit,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TypeCheckOp {
    Cast,
    InstanceOf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SwitchParams {
    Lookup { default : Label, pairs : Vec<(i32, Label)> },
    Table  { default : Label, low : i32, high : i32, targets : Vec<Label> },
}

impl SwitchParams {
    pub fn default(&self) -> Label {
        match self {
            SwitchParams::Lookup { default, .. } | SwitchParams::Table { default, .. } => *default,
        }
    }

    pub fn targets(&self) -> Vec<Label> {
        match self {
            SwitchParams::Lookup { pairs, .. } => pairs.iter().map(|&(_, l)| l).collect(),
            SwitchParams::Table { targets, .. } => targets.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AllocationKind {
    Element    (Type),
    Array      { element : Type },
    MultiArray { ty : Type, dims : u8 },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    Allocation  (AllocationKind),
    Arithmetic  { kind : JType, op : ArithmeticOperation },
    Branch      { kind : JType, ops : OperandCount, way : Comparison, target : Label },
    Compare     { kind : JType, nans : Option<NanComparisons> },
    Constant    (Constant),
    Conversion  { from : JType, to : JType },
    Increment   { index : u16, value : i16 },
    Invocation  { kind : InvokeKind, method : MethodRef },
    Dynamic     (CallSite), /* i.e. invokedynamic */
    Jump        { target : Label },
    Label       (Label),
    Length,     /* i.e. arraylength */
    LineNumber  (u16),
    LoadArray   (JType),
    LoadLocal   { kind : JType, index : u16 },
    Monitor     (MonitorOp),
    Noop,
    StackOp     { size : OperandCount, op : StackOperation },
    StoreArray  (JType),
    StoreLocal  { kind : JType, index : u16 },
    Switch      (SwitchParams),
    Throw,
    TypeCheck   { op : TypeCheckOp, ty : Type },
    VarAction   { op : VarOp, kind : VarKind, field : FieldRef },
    Yield       { kind : JType }, /* i.e. return */

    Unhandled   { opcode : u8, mnemonic : &'static str },
}

impl Operation {
    /// Net change in operand-stack words caused by this instruction, when it is fixed by the
    /// opcode alone. Labels (which may push a caught exception) and `athrow` have none.
    pub fn stack_effect(&self) -> Option<i32> {
        use Operation::*;
        let width = |k : JType| i32::from(k.size());
        let effect = match self {
            Operation::Label(_) | Throw | Unhandled { .. } => return None,
            Noop | LineNumber(_) | Jump { .. } | Increment { .. } | Length => 0,

            Allocation(AllocationKind::Element(_))          => 1,
            Allocation(AllocationKind::Array { .. })        => 0,
            Allocation(AllocationKind::MultiArray { dims, .. }) => 1 - i32::from(*dims),

            Arithmetic { op : ArithmeticOperation::Neg, .. } => 0,
            Arithmetic { op, .. } if op.is_shift() => -1,
            Arithmetic { kind, .. } => -width(*kind),
            Compare { kind, .. } => 1 - 2 * width(*kind),
            Conversion { from, to } => width(*to) - width(*from),

            Branch { ops, .. } => -(*ops as i32),
            Switch(_) => -1,
            Yield { kind } => -width(*kind),
            Monitor(_) => -1,

            Constant(c) => if c.is_wide() { 2 } else { 1 },
            LoadLocal { kind, .. } => width(*kind),
            StoreLocal { kind, .. } => -width(*kind),
            LoadArray(kind) => width(*kind) - 2,
            StoreArray(kind) => -2 - width(*kind),

            StackOp { op : StackOperation::Pop, size } => -(*size as i32),
            StackOp { op : StackOperation::Swap, .. } => 0,
            StackOp { size, .. } => *size as i32,

            TypeCheck { .. } => 0,

            VarAction { op, kind, field } => {
                let w = i32::from(field.ty.size());
                let base = if *kind == VarKind::Field { -1 } else { 0 };
                match op {
                    VarOp::Get => base + w,
                    VarOp::Put => base - w,
                }
            },
            Invocation { kind, method } => {
                let args : i32 = method.params.iter().map(|p| i32::from(p.size())).sum();
                let base = if *kind == InvokeKind::Static { 0 } else { 1 };
                i32::from(method.ret.size()) - args - base
            },
            Dynamic(site) => {
                let args : i32 = site.params.iter().map(|p| i32::from(p.size())).sum();
                i32::from(site.ret.size()) - args
            },
        };
        Some(effect)
    }

    /// Labels this instruction may transfer control to, other than its successor.
    pub fn jump_targets(&self) -> Vec<Label> {
        match self {
            Operation::Branch { target, .. } | Operation::Jump { target } => vec![ *target ],
            Operation::Switch(params) => {
                let mut t = params.targets();
                t.push(params.default());
                t
            },
            _ => vec![],
        }
    }
}

/// Resolves constant-pool references made by instructions.
pub trait ConstantResolver {
    fn field(&self, index : u16) -> GeneralResult<FieldRef>;
    fn method(&self, index : u16) -> GeneralResult<MethodRef>;
    fn class_type(&self, index : u16) -> GeneralResult<Type>;
    fn loadable(&self, index : u16) -> GeneralResult<Constant>;
    fn call_site(&self, index : u16) -> GeneralResult<CallSite>;
}

fn offset(addr : usize, off : i32) -> GeneralResult<usize> {
    let target = addr as i64 + i64::from(off);
    usize::try_from(target).map_err(|_| format!("branch at {} leaves the method", addr).into())
}

/// Byte offsets an instruction may branch to.
pub fn branch_offsets(addr : usize, insn : &Instruction) -> GeneralResult<Vec<usize>> {
    use Instruction::*;
    let out = match *insn {
        Ifeq(off) | Ifne(off) | Iflt(off) | Ifge(off) | Ifgt(off) | Ifle(off)
            | IfIcmpeq(off) | IfIcmpne(off)
            | IfIcmplt(off) | IfIcmpge(off) | IfIcmpgt(off) | IfIcmple(off)
            | IfAcmpeq(off) | IfAcmpne(off)
            | Ifnull(off) | Ifnonnull(off)
            | Goto(off)
            => vec![ offset(addr, off.into())? ],
        GotoW(off) => vec![ offset(addr, off)? ],
        Tableswitch { default, ref offsets, .. } =>
            std::iter::once(default).chain(offsets.iter().copied()).map(|o| offset(addr, o)).collect::<GeneralResult<_>>()?,
        Lookupswitch { default, ref pairs } =>
            std::iter::once(default).chain(pairs.iter().map(|p| p.1)).map(|o| offset(addr, o)).collect::<GeneralResult<_>>()?,
        _ => vec![],
    };
    Ok(out)
}

trait OperandType {
    fn get_operand_type(&self) -> Option<JType>;
}

impl OperandType for Instruction {
    fn get_operand_type(&self) -> Option<JType> {
        use Instruction::*;
        use JType::*;
        match self {
            Aconstnull
                | Aload(_) | AloadWide(_)
                | Aload0 | Aload1 | Aload2 | Aload3
                | Astore(_) | AstoreWide(_)
                | Astore0 | Astore1 | Astore2 | Astore3
                | Areturn
                | IfAcmpeq(_) | IfAcmpne(_) | Ifnull(_) | Ifnonnull(_)
                => Some(Object),
            Iconstm1 | Iconst0 | Iconst1 | Iconst2 | Iconst3 | Iconst4 | Iconst5
                | Iload(_) | IloadWide(_)
                | Iload0 | Iload1 | Iload2 | Iload3
                | Istore(_) | IstoreWide(_)
                | Istore0 | Istore1 | Istore2 | Istore3
                | Iadd | Isub | Imul | Idiv | Irem | Ineg
                | Ishl | Ishr | Iushr | Iand | Ior | Ixor
                | Ireturn
                | Ifeq(_) | Ifne(_) | Iflt(_) | Ifge(_) | Ifgt(_) | Ifle(_)
                | IfIcmpeq(_) | IfIcmpne(_) | IfIcmplt(_) | IfIcmpge(_) | IfIcmpgt(_) | IfIcmple(_)
                => Some(Int),
            Lconst0 | Lconst1
                | Lload(_) | LloadWide(_)
                | Lload0 | Lload1 | Lload2 | Lload3
                | Lstore(_) | LstoreWide(_)
                | Lstore0 | Lstore1 | Lstore2 | Lstore3
                | Ladd | Lsub | Lmul | Ldiv | Lrem | Lneg
                | Lshl | Lshr | Lushr | Land | Lor | Lxor
                | Lreturn
                => Some(Long),
            Fconst0 | Fconst1 | Fconst2
                | Fload(_) | FloadWide(_)
                | Fload0 | Fload1 | Fload2 | Fload3
                | Fstore(_) | FstoreWide(_)
                | Fstore0 | Fstore1 | Fstore2 | Fstore3
                | Fadd | Fsub | Fmul | Fdiv | Frem | Fneg
                | Freturn
                => Some(Float),
            Dconst0 | Dconst1
                | Dload(_) | DloadWide(_)
                | Dload0 | Dload1 | Dload2 | Dload3
                | Dstore(_) | DstoreWide(_)
                | Dstore0 | Dstore1 | Dstore2 | Dstore3
                | Dadd | Dsub | Dmul | Ddiv | Drem | Dneg
                | Dreturn
                => Some(Double),
            Return
                => Some(Void),

                  I2l | I2f | I2d | I2b | I2c | I2s => Some(Int),
            L2i |       L2f | L2d                   => Some(Long),
            F2i | F2l |       F2d                   => Some(Float),
            D2i | D2l | D2f                         => Some(Double),

            _ => None,
        }
    }
}

/// Translates one decoded instruction, resolving its constant-pool operands through `pool` and its
/// branch offsets through `labels`.
pub fn decode_insn(
        addr : usize,
        insn : Instruction,
        pool : &dyn ConstantResolver,
        labels : &BTreeMap<usize, Label>,
    ) -> GeneralResult<Operation>
{
    use AllocationKind::*;
    use Instruction::*;
    use JType::*;
    use Operation::*;

    let kind_of = |insn : &Instruction| -> GeneralResult<JType> {
        insn.get_operand_type().ok_or_else(|| format!("no operand type for {:?}", insn).into())
    };
    let kind = || kind_of(&insn);
    let label_at = |off : i32| -> GeneralResult<crate::jvmtypes::Label> {
        let target = offset(addr, off)?;
        labels.get(&target).copied().ok_or_else(|| format!("no label at offset {}", target).into())
    };

    let op = match insn {
        Nop => Noop,

        Aconstnull => Constant(crate::ir::Constant::Null),
        Iconstm1   => Constant(crate::ir::Constant::Int(-1)),
        Iconst0    => Constant(crate::ir::Constant::Int(0)),
        Iconst1    => Constant(crate::ir::Constant::Int(1)),
        Iconst2    => Constant(crate::ir::Constant::Int(2)),
        Iconst3    => Constant(crate::ir::Constant::Int(3)),
        Iconst4    => Constant(crate::ir::Constant::Int(4)),
        Iconst5    => Constant(crate::ir::Constant::Int(5)),
        Lconst0    => Constant(crate::ir::Constant::Long(0)),
        Lconst1    => Constant(crate::ir::Constant::Long(1)),
        Fconst0    => Constant(crate::ir::Constant::Float(0.0)),
        Fconst1    => Constant(crate::ir::Constant::Float(1.0)),
        Fconst2    => Constant(crate::ir::Constant::Float(2.0)),
        Dconst0    => Constant(crate::ir::Constant::Double(0.0)),
        Dconst1    => Constant(crate::ir::Constant::Double(1.0)),

        Bipush(v) => Constant(crate::ir::Constant::Int(v.into())),
        Sipush(v) => Constant(crate::ir::Constant::Int(v.into())),

        Ldc(index) => Constant(pool.loadable(index.into())?),
        LdcW(index) | Ldc2W(index) => Constant(pool.loadable(index)?),

        Iload(index) | Lload(index) | Fload(index) | Dload(index) | Aload(index)
            => LoadLocal { kind : kind()?, index : index.into() },

        IloadWide(index) | LloadWide(index) | FloadWide(index) | DloadWide(index) | AloadWide(index)
            => LoadLocal { kind : kind()?, index },

        Dload0 | Fload0 | Iload0 | Lload0 | Aload0 => LoadLocal { kind : kind()?, index : 0 },
        Dload1 | Fload1 | Iload1 | Lload1 | Aload1 => LoadLocal { kind : kind()?, index : 1 },
        Dload2 | Fload2 | Iload2 | Lload2 | Aload2 => LoadLocal { kind : kind()?, index : 2 },
        Dload3 | Fload3 | Iload3 | Lload3 | Aload3 => LoadLocal { kind : kind()?, index : 3 },

        Iaload => LoadArray(Int),
        Laload => LoadArray(Long),
        Faload => LoadArray(Float),
        Daload => LoadArray(Double),
        Aaload => LoadArray(Object),
        Baload => LoadArray(Byte),
        Caload => LoadArray(Char),
        Saload => LoadArray(Short),

        Istore(index) | Lstore(index) | Fstore(index) | Dstore(index) | Astore(index)
            => StoreLocal { kind : kind()?, index : index.into() },

        IstoreWide(index) | LstoreWide(index) | FstoreWide(index) | DstoreWide(index) | AstoreWide(index)
            => StoreLocal { kind : kind()?, index },

        Dstore0 | Fstore0 | Istore0 | Lstore0 | Astore0 => StoreLocal { kind : kind()?, index : 0 },
        Dstore1 | Fstore1 | Istore1 | Lstore1 | Astore1 => StoreLocal { kind : kind()?, index : 1 },
        Dstore2 | Fstore2 | Istore2 | Lstore2 | Astore2 => StoreLocal { kind : kind()?, index : 2 },
        Dstore3 | Fstore3 | Istore3 | Lstore3 | Astore3 => StoreLocal { kind : kind()?, index : 3 },

        Iastore => StoreArray(Int),
        Lastore => StoreArray(Long),
        Fastore => StoreArray(Float),
        Dastore => StoreArray(Double),
        Aastore => StoreArray(Object),
        Bastore => StoreArray(Byte),
        Castore => StoreArray(Char),
        Sastore => StoreArray(Short),

        Pop     => StackOp { op : StackOperation::Pop  , size : OperandCount::_1 },
        Pop2    => StackOp { op : StackOperation::Pop  , size : OperandCount::_2 },
        Dup     => StackOp { op : StackOperation::Dup  , size : OperandCount::_1 },
        Dupx1   => StackOp { op : StackOperation::DupX1, size : OperandCount::_1 },
        Dupx2   => StackOp { op : StackOperation::DupX2, size : OperandCount::_1 },
        Dup2    => StackOp { op : StackOperation::Dup  , size : OperandCount::_2 },
        Dup2x1  => StackOp { op : StackOperation::DupX1, size : OperandCount::_2 },
        Dup2x2  => StackOp { op : StackOperation::DupX2, size : OperandCount::_2 },
        Swap    => StackOp { op : StackOperation::Swap , size : OperandCount::_2 },

        Iadd | Ladd | Fadd | Dadd
            | Isub | Lsub | Fsub | Dsub
            | Imul | Lmul | Fmul | Dmul
            | Idiv | Ldiv | Fdiv | Ddiv
            | Irem | Lrem | Frem | Drem
            | Ineg | Lneg | Fneg | Dneg
            | Ishl | Lshl
            | Ishr | Lshr
            | Iushr| Lushr
            | Iand | Land
            | Ior  | Lor
            | Ixor | Lxor
            => {
                let op = match insn {
                    Iadd | Ladd | Fadd | Dadd => ArithmeticOperation::Add,
                    Isub | Lsub | Fsub | Dsub => ArithmeticOperation::Sub,
                    Imul | Lmul | Fmul | Dmul => ArithmeticOperation::Mul,
                    Idiv | Ldiv | Fdiv | Ddiv => ArithmeticOperation::Div,
                    Irem | Lrem | Frem | Drem => ArithmeticOperation::Rem,
                    Ineg | Lneg | Fneg | Dneg => ArithmeticOperation::Neg,
                    Ishl | Lshl               => ArithmeticOperation::Shl,
                    Ishr | Lshr               => ArithmeticOperation::Shr,
                    Iushr| Lushr              => ArithmeticOperation::Ushr,
                    Iand | Land               => ArithmeticOperation::And,
                    Ior  | Lor                => ArithmeticOperation::Or,
                    _                         => ArithmeticOperation::Xor,
                };
                Arithmetic { kind : kind()?, op }
            },

        Iinc     { index, value } => Increment { index : index.into(), value : value.into() },
        IincWide { index, value } => Increment { index, value },

        I2l | I2f | I2d | L2i | L2f | L2d | F2i | F2l | F2d | D2i | D2l | D2f | I2b | I2c | I2s
            => {
                let to = match insn {
                    I2b                   => Byte,
                    I2c                   => Char,
                    I2s                   => Short,

                          L2i | F2i | D2i => Int,
                    I2l |       F2l | D2l => Long,
                    I2f | L2f |       D2f => Float,
                    _                     => Double,
                };

                Conversion { from : kind()?, to }
            },

        Lcmp    => Compare { kind : Long  , nans : None                          },
        Fcmpl   => Compare { kind : Float , nans : Some(NanComparisons::Less   ) },
        Fcmpg   => Compare { kind : Float , nans : Some(NanComparisons::Greater) },
        Dcmpl   => Compare { kind : Double, nans : Some(NanComparisons::Less   ) },
        Dcmpg   => Compare { kind : Double, nans : Some(NanComparisons::Greater) },

        Ifeq(off) | Ifne(off) | Iflt(off) | Ifge(off) | Ifgt(off) | Ifle(off)
            | IfIcmpeq(off) | IfIcmpne(off)
            | IfIcmplt(off) | IfIcmpge(off) | IfIcmpgt(off) | IfIcmple(off)
            | IfAcmpeq(off) | IfAcmpne(off)
            | Ifnull(off) | Ifnonnull(off)
            => {
                let target = label_at(off.into())?;
                let way = match insn {
                    Ifeq(_) | IfIcmpeq(_) | IfAcmpeq(_) | Ifnull(_)    => Comparison::Eq,
                    Ifne(_) | IfIcmpne(_) | IfAcmpne(_) | Ifnonnull(_) => Comparison::Ne,
                    Iflt(_) | IfIcmplt(_)                              => Comparison::Lt,
                    Ifge(_) | IfIcmpge(_)                              => Comparison::Ge,
                    Ifgt(_) | IfIcmpgt(_)                              => Comparison::Gt,
                    _                                                  => Comparison::Le,
                };
                let ops = match insn {
                    Ifeq(_) | Ifne(_) | Iflt(_) | Ifge(_) | Ifgt(_) | Ifle(_)
                        | Ifnull(_) | Ifnonnull(_)
                        => OperandCount::_1,
                    _   => OperandCount::_2,
                };

                Branch { kind : kind()?, way, ops, target }
            },

        Goto(off)  => Jump { target : label_at(off.into())? },
        GotoW(off) => Jump { target : label_at(off)? },

        Ireturn | Lreturn | Freturn | Dreturn | Areturn | Return
            => Yield { kind : kind()? },

        Getstatic(index) => VarAction { op : VarOp::Get, kind : VarKind::Static, field : pool.field(index)? },
        Putstatic(index) => VarAction { op : VarOp::Put, kind : VarKind::Static, field : pool.field(index)? },
        Getfield(index)  => VarAction { op : VarOp::Get, kind : VarKind::Field , field : pool.field(index)? },
        Putfield(index)  => VarAction { op : VarOp::Put, kind : VarKind::Field , field : pool.field(index)? },

        Invokevirtual(index) => Invocation { kind : InvokeKind::Virtual, method : pool.method(index)? },
        Invokespecial(index) => Invocation { kind : InvokeKind::Special, method : pool.method(index)? },
        Invokestatic(index)  => Invocation { kind : InvokeKind::Static , method : pool.method(index)? },
        Invokeinterface { index, .. } => Invocation { kind : InvokeKind::Interface, method : pool.method(index)? },
        Invokedynamic(index) => Dynamic(pool.call_site(index)?),

        New(index) => Allocation(Element(pool.class_type(index)?)),
        Newarray(atype) => match array_element(atype) {
            Some(element) => Allocation(Array { element }),
            None => return Err(format!("bad newarray type {}", atype).into()),
        },
        Anewarray(index) => Allocation(Array { element : pool.class_type(index)? }),
        Multianewarray { index, dimensions } =>
            Allocation(MultiArray { ty : pool.class_type(index)?, dims : dimensions }),

        Arraylength => Length,

        Tableswitch { default, low, high, offsets } => Switch(SwitchParams::Table {
            default : label_at(default)?,
            low,
            high,
            targets : offsets.into_iter().map(label_at).collect::<GeneralResult<_>>()?,
        }),
        Lookupswitch { default, pairs } => Switch(SwitchParams::Lookup {
            default : label_at(default)?,
            pairs : pairs.into_iter()
                .map(|(k, o)| -> GeneralResult<(i32, crate::jvmtypes::Label)> { Ok((k, label_at(o)?)) })
                .collect::<GeneralResult<_>>()?,
        }),

        Athrow => Throw,
        Checkcast(index)  => TypeCheck { op : TypeCheckOp::Cast      , ty : pool.class_type(index)? },
        Instanceof(index) => TypeCheck { op : TypeCheckOp::InstanceOf, ty : pool.class_type(index)? },
        Monitorenter => Monitor(MonitorOp::Enter),
        Monitorexit  => Monitor(MonitorOp::Exit),

        // Subroutines are never lowered
        Jsr(_)     => Unhandled { opcode : 0xa8, mnemonic : "jsr" },
        JsrW(_)    => Unhandled { opcode : 0xc9, mnemonic : "jsr_w" },
        Ret(_)     => Unhandled { opcode : 0xa9, mnemonic : "ret" },
        RetWide(_) => Unhandled { opcode : 0xa9, mnemonic : "ret" },

        #[allow(unreachable_patterns)]
        _ => return Err(format!("undecodable instruction {:?}", insn).into()),
    };

    Ok(op)
}

#[cfg(test)]
pub(crate) struct FakePool;

#[cfg(test)]
impl ConstantResolver for FakePool {
    fn field(&self, index : u16) -> GeneralResult<FieldRef> {
        Ok(FieldRef { class : "Fake".to_owned(), name : format!("f{}", index), ty : Type::Int })
    }
    fn method(&self, index : u16) -> GeneralResult<MethodRef> {
        MethodRef::new("Fake", &format!("m{}", index), "(JI)V")
    }
    fn class_type(&self, _ : u16) -> GeneralResult<Type> { Ok(Type::class("java/lang/String")) }
    fn loadable(&self, index : u16) -> GeneralResult<Constant> { Ok(Constant::Long(index.into())) }
    fn call_site(&self, _ : u16) -> GeneralResult<CallSite> { Err("no call sites".into()) }
}

#[test]
fn test_decode_insn() -> GeneralResult<()> {
    let labels : BTreeMap<usize, Label> = vec![ (3, Label(0)), (20, Label(1)) ].into_iter().collect();
    let decode = |addr, insn| decode_insn(addr, insn, &FakePool, &labels);

    assert_eq!(Operation::Constant(Constant::Int(-1)), decode(0, Instruction::Iconstm1)?);
    assert_eq!(Operation::LoadLocal { kind : JType::Long, index : 2 }, decode(0, Instruction::Lload2)?);
    assert_eq!(
        Operation::Branch { kind : JType::Object, ops : OperandCount::_2, way : Comparison::Ne, target : Label(1) },
        decode(10, Instruction::IfAcmpne(10))?
    );
    assert_eq!(Operation::Jump { target : Label(0) }, decode(13, Instruction::Goto(-10))?);
    assert!(decode(13, Instruction::Goto(-9)).is_err());
    assert_eq!(Operation::Constant(Constant::Long(7)), decode(0, Instruction::Ldc2W(7))?);
    assert_eq!(
        Operation::Unhandled { opcode : 0xa8, mnemonic : "jsr" },
        decode(0, Instruction::Jsr(3))?
    );
    assert!(decode(0, Instruction::Invokedynamic(1)).is_err());
    Ok(())
}

#[test]
fn test_branch_offsets() -> GeneralResult<()> {
    use Instruction::*;
    assert_eq!(vec![ 15 ], branch_offsets(10, &Ifeq(5))?);
    assert_eq!(vec![ 2 ], branch_offsets(10, &GotoW(-8))?);
    assert!(branch_offsets(10, &Iadd)?.is_empty());
    let ls = Lookupswitch { default : 30, pairs : vec![ (1, 10), (5, 20) ] };
    assert_eq!(vec![ 30, 10, 20 ], branch_offsets(0, &ls)?);
    assert!(branch_offsets(1, &Goto(-2)).is_err());
    Ok(())
}

#[test]
fn test_stack_effects() -> GeneralResult<()> {
    use Operation::*;
    let wide_add = Arithmetic { kind : JType::Long, op : ArithmeticOperation::Add };
    let wide_shl = Arithmetic { kind : JType::Long, op : ArithmeticOperation::Shl };
    assert_eq!(Some(-2), wide_add.stack_effect());
    assert_eq!(Some(-1), wide_shl.stack_effect());
    assert_eq!(Some(-3), Compare { kind : JType::Double, nans : None }.stack_effect());
    assert_eq!(Some(-1), Compare { kind : JType::Float, nans : None }.stack_effect());
    let call = Invocation { kind : InvokeKind::Virtual, method : FakePool.method(0)? };
    assert_eq!(Some(-4), call.stack_effect());
    assert_eq!(Some(2), StackOp { op : StackOperation::DupX2, size : OperandCount::_2 }.stack_effect());
    assert_eq!(None, Throw.stack_effect());
    Ok(())
}
