//! The simulated operand stack.
//!
//! Every value an instruction produces is an [`Operand`] in an arena owned by the lowering
//! context. Wherever an operand's value is substituted into an expression or statement, the
//! substitution goes through a fresh slot that the operand remembers, so that binding the operand
//! to a register later (a "spill") rewrites every place it was already used.

use std::convert::Infallible;

use log::trace;

use crate::error::{ErrorKind, LowerResult};
use crate::ir::{Immediate, LocalId, Rvalue};
use crate::lower::{LoweringContext, PendingStmt};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct OperandId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct SlotId(pub u32);

impl OperandId {
    pub fn index(self) -> usize { self.0 as usize }
}

impl SlotId {
    pub fn index(self) -> usize { self.0 as usize }
}

/// One word of the operand stack. A wide value occupies a `WideHalf` word beneath its operand.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Entry {
    Operand(OperandId),
    WideHalf,
}

#[derive(Clone, Debug)]
pub(crate) struct Operand {
    /// instruction that produced this value; spill assignments are emitted there
    pub insn : usize,
    pub value : Rvalue<SlotId>,
    /// register this value was spilled into, if any
    pub stack : Option<LocalId>,
    /// slots this value has been substituted into
    pub uses : Vec<SlotId>,
}

impl Operand {
    pub fn stack_or_value(&self) -> Rvalue<SlotId> {
        match self.stack {
            Some(l) => l.into(),
            None => self.value.clone(),
        }
    }
}

/// A slot-free rendering of a value, for structural comparison.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Resolved(Box<Rvalue<Resolved>>);

impl LoweringContext<'_> {
    pub fn operand(&self, id : OperandId) -> &Operand { &self.operands[id.index()] }

    pub fn new_operand(&mut self, insn : usize, value : Rvalue<SlotId>) -> OperandId {
        let id = OperandId(self.operands.len() as u32);
        self.operands.push(Operand { insn, value, stack : None, uses : Vec::new() });
        id
    }

    pub fn new_slot(&mut self, value : Rvalue<SlotId>) -> SlotId {
        let id = SlotId(self.slots.len() as u32);
        self.slots.push(value);
        id
    }

    /// Substitutes the operand's current value into a new slot that follows later spills.
    pub fn use_operand(&mut self, id : OperandId) -> SlotId {
        let slot = self.new_slot(self.operand(id).stack_or_value());
        self.operands[id.index()].uses.push(slot);
        slot
    }

    pub fn update_uses(&mut self, id : OperandId) {
        let o = &self.operands[id.index()];
        let value = o.stack_or_value();
        for &u in &o.uses {
            self.slots[u.index()] = value.clone();
        }
    }

    pub fn resolve_deep(&self, value : &Rvalue<SlotId>) -> Resolved {
        let mapped : Result<_, Infallible> =
            value.try_map(&mut |s| Ok(self.resolve_deep(&self.slots[s.index()])));
        match mapped {
            Ok(r) => Resolved(Box::new(r)),
            Err(never) => match never {},
        }
    }

    pub fn operands_equivalent(&self, a : OperandId, b : OperandId) -> bool {
        a == b || self.resolve_deep(&self.operand(a).stack_or_value()) == self.resolve_deep(&self.operand(b).stack_or_value())
    }

    pub fn stacks_equivalent(&self, a : &[Entry], b : &[Entry]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|pair| match pair {
            (Entry::WideHalf, Entry::WideHalf) => true,
            (Entry::Operand(x), Entry::Operand(y)) => self.operands_equivalent(*x, *y),
            _ => false,
        })
    }

    pub fn push_entry(&mut self, e : Entry) { self.stack.push(e) }

    pub fn push(&mut self, id : OperandId) { self.push_entry(Entry::Operand(id)) }

    pub fn push_wide(&mut self, id : OperandId) {
        self.push_entry(Entry::WideHalf);
        self.push_entry(Entry::Operand(id));
    }

    pub fn push_typed(&mut self, id : OperandId, wide : bool) {
        if wide {
            self.push_wide(id)
        } else {
            self.push(id)
        }
    }

    pub fn pop_entry(&mut self) -> LowerResult<Entry> {
        self.stack.pop().ok_or(ErrorKind::StackUnderflow { insn : self.current })
    }

    pub fn peek(&self) -> LowerResult<Entry> {
        self.stack.last().copied().ok_or(ErrorKind::StackUnderflow { insn : self.current })
    }

    pub fn pop(&mut self) -> LowerResult<OperandId> {
        match self.pop_entry()? {
            Entry::Operand(id) => Ok(id),
            Entry::WideHalf => Err(ErrorKind::MalformedWidePair { insn : self.current }),
        }
    }

    pub fn pop_wide(&mut self) -> LowerResult<OperandId> {
        let id = self.pop()?;
        match self.pop_entry()? {
            Entry::WideHalf => Ok(id),
            // `dup2` of a wide value repeats the operand in place of the placeholder
            Entry::Operand(other) if other == id => Ok(id),
            Entry::Operand(_) => Err(ErrorKind::MalformedWidePair { insn : self.current }),
        }
    }

    pub fn pop_typed(&mut self, wide : bool) -> LowerResult<OperandId> {
        if wide { self.pop_wide() } else { self.pop() }
    }

    /// Binds the operand to a fresh register, assigned where the operand was produced.
    pub fn spill(&mut self, id : OperandId) -> LowerResult<()> {
        let local = self.locals.fresh();
        let (insn, value) = {
            let o = &mut self.operands[id.index()];
            o.stack = Some(local);
            (o.insn, o.value.clone())
        };
        trace!("spilling value of instruction {} into {:?}", insn, local);
        let lhs = self.new_slot(local.into());
        let rhs = self.new_slot(value);
        self.set_unit(insn, PendingStmt::Assign { lhs, rhs })?;
        self.update_uses(id);
        Ok(())
    }

    fn spill_unless(&mut self, id : OperandId, keep : fn(&Rvalue<SlotId>) -> bool) -> LowerResult<OperandId> {
        let o = self.operand(id);
        if o.stack.is_none() && !keep(&o.value) {
            self.spill(id)?;
        }
        Ok(id)
    }

    /// Pops a value that must be a register.
    pub fn pop_register(&mut self) -> LowerResult<OperandId> {
        let id = self.pop()?;
        self.spill_unless(id, |v| v.as_local().is_some())
    }

    /// Pops a value that must be a register or a constant.
    pub fn pop_immediate(&mut self) -> LowerResult<OperandId> {
        let id = self.pop()?;
        self.spill_unless(id, |v| v.as_local().is_some() || v.is_constant())
    }

    pub fn pop_immediate_wide(&mut self) -> LowerResult<OperandId> {
        let id = self.pop_wide()?;
        self.spill_unless(id, |v| v.as_local().is_some() || v.is_constant())
    }

    pub fn pop_immediate_typed(&mut self, wide : bool) -> LowerResult<OperandId> {
        if wide { self.pop_immediate_wide() } else { self.pop_immediate() }
    }

    /// Pops a value that must be a constant; anything else is spilled, registers included.
    pub fn pop_constant_or_register(&mut self) -> LowerResult<OperandId> {
        let id = self.pop()?;
        self.spill_unless(id, Rvalue::is_constant)
    }

    fn mentions_local(&self, value : &Rvalue<SlotId>, local : LocalId) -> bool {
        match value {
            Rvalue::Immediate(Immediate::Local(l)) => *l == local,
            _ => value.operands().into_iter().any(|s| self.mentions_local(&self.slots[s.index()], local)),
        }
    }

    /// Freezes stacked values that a write could change. With `Some(local)`, those reading that
    /// local; with `None` (a call or a heap write), every value not already a register or constant.
    pub fn assign_read_ops(&mut self, local : Option<LocalId>) -> LowerResult<()> {
        let stacked : Vec<OperandId> = self.stack.iter()
            .filter_map(|e| match e { Entry::Operand(id) => Some(*id), Entry::WideHalf => None })
            .collect();
        for id in stacked {
            let o = self.operand(id);
            if o.stack.is_some() {
                continue;
            }
            let freeze = match local {
                Some(l) => self.mentions_local(&o.value, l),
                None => o.value.as_local().is_none() && !o.value.is_constant(),
            };
            if freeze {
                self.spill(id)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::{BinaryOp, Constant, Expr};
    use crate::method::sample;
    use crate::types::Type;
    use crate::GeneralResult;
    use quickcheck::{quickcheck, TestResult};

    fn with_context<T>(f : impl FnOnce(&mut LoweringContext) -> T) -> T {
        let m = sample(vec![], Type::Void, 4, vec![ crate::jvmtypes::Operation::Noop ; 8 ]);
        #[allow(clippy::unwrap_used)]
        let mut ctx = LoweringContext::new(&m).unwrap();
        f(&mut ctx)
    }

    #[test]
    fn test_underflow() {
        with_context(|ctx| {
            assert_eq!(Err(ErrorKind::StackUnderflow { insn : 0 }), ctx.pop());
            assert_eq!(Err(ErrorKind::StackUnderflow { insn : 0 }), ctx.peek());
        });
    }

    #[test]
    fn test_wide_pairing() -> GeneralResult<()> {
        with_context(|ctx| {
            let a = ctx.new_operand(0, Constant::Int(1).into());
            let b = ctx.new_operand(1, Constant::Int(2).into());
            ctx.push(a);
            ctx.push(b);
            assert_eq!(Err(ErrorKind::MalformedWidePair { insn : 0 }), ctx.pop_wide());

            let w = ctx.new_operand(2, Constant::Long(3).into());
            ctx.push_wide(w);
            assert_eq!(2, ctx.stack.len());
            assert_eq!(Ok(w), ctx.pop_wide());
            assert!(ctx.stack.is_empty());

            ctx.push(w);
            ctx.push(w);
            assert_eq!(Ok(w), ctx.pop_wide());

            ctx.push_wide(w);
            assert_eq!(Err(ErrorKind::MalformedWidePair { insn : 0 }), ctx.pop().and_then(|_| ctx.pop()));
            Ok(())
        })
    }

    #[test]
    fn test_spill_disciplines() -> GeneralResult<()> {
        with_context(|ctx| {
            let local = ctx.locals.slot(1)?;
            let c = ctx.new_operand(0, Constant::Int(7).into());
            let l = ctx.new_operand(1, local.into());
            let (x, y) = (ctx.new_slot(local.into()), ctx.new_slot(Constant::Int(1).into()));
            let e = ctx.new_operand(2, Rvalue::Expr(Expr::Binary { op : BinaryOp::Add, lhs : x, rhs : y }));

            ctx.push(e);
            ctx.push(l);
            ctx.push(c);
            ctx.push(c);
            ctx.push(l);

            assert_eq!(l, ctx.pop_register()?);
            assert!(ctx.operand(l).stack.is_none());
            assert_eq!(c, ctx.pop_immediate()?);
            assert!(ctx.operand(c).stack.is_none());
            assert_eq!(c, ctx.pop_constant_or_register()?);
            assert!(ctx.operand(c).stack.is_none());
            assert_eq!(l, ctx.pop_constant_or_register()?);
            assert!(ctx.operand(l).stack.is_some());
            assert!(ctx.has_unit(1));
            assert_eq!(e, ctx.pop_immediate()?);
            assert!(ctx.operand(e).stack.is_some());
            assert!(ctx.has_unit(2));
            assert!(!ctx.has_unit(0));
            Ok(())
        })
    }

    #[test]
    fn test_spill_rebinds_uses() -> GeneralResult<()> {
        with_context(|ctx| {
            let array = ctx.new_slot(Constant::Null.into());
            let f = ctx.new_operand(3, Rvalue::Expr(Expr::Length(array)));
            let used = ctx.use_operand(f);
            ctx.spill(f)?;
            let reg = ctx.operand(f).stack.ok_or("not spilled")?;
            assert_eq!(Rvalue::from(reg), ctx.slots[used.index()]);
            assert!(ctx.has_unit(3));
            Ok(())
        })
    }

    #[test]
    fn test_read_ops_frozen_by_store() -> GeneralResult<()> {
        with_context(|ctx| {
            let local = ctx.locals.slot(2)?;
            let other = ctx.locals.slot(3)?;
            let (x, y) = (ctx.new_slot(local.into()), ctx.new_slot(Constant::Int(1).into()));
            let reads = ctx.new_operand(0, Rvalue::Expr(Expr::Binary { op : BinaryOp::Add, lhs : x, rhs : y }));
            let unrelated = ctx.new_operand(1, other.into());
            let direct = ctx.new_operand(2, local.into());
            ctx.push(reads);
            ctx.push(unrelated);
            ctx.push(direct);

            ctx.assign_read_ops(Some(local))?;
            assert!(ctx.operand(reads).stack.is_some());
            assert!(ctx.operand(unrelated).stack.is_none());
            assert!(ctx.operand(direct).stack.is_some());
            Ok(())
        })
    }

    quickcheck! {
        fn prop_push_pop_round_trip(widths : Vec<bool>) -> TestResult {
            if widths.len() > 64 {
                return TestResult::discard();
            }
            with_context(|ctx| {
                let ids : Vec<OperandId> = widths.iter().enumerate()
                    .map(|(i, _)| ctx.new_operand(i, Constant::Int(i as i32).into()))
                    .collect();
                for (&id, &wide) in ids.iter().zip(&widths) {
                    ctx.push_typed(id, wide);
                }
                let words : usize = widths.iter().map(|&w| if w { 2 } else { 1 }).sum();
                if ctx.stack.len() != words {
                    return TestResult::failed();
                }
                for (&id, &wide) in ids.iter().zip(&widths).rev() {
                    if ctx.pop_typed(wide) != Ok(id) {
                        return TestResult::failed();
                    }
                }
                TestResult::from_bool(ctx.stack.is_empty())
            })
        }
    }
}
