use log::debug;

use crate::error::LowerResult;
use crate::ir::{Ref, Rvalue};
use crate::jvmtypes::Label;
use crate::lower::LoweringContext;
use crate::stack::{OperandId, SlotId};

/// A synthetic entry point for an exception handler whose code is also reached by ordinary jumps.
///
/// The entry binds the caught exception to its own register and then jumps to the shared code, so
/// the shared code always starts with the exception value in that register on the stack.
#[derive(Clone, Debug)]
pub(crate) struct InlineHandler {
    pub label : Label,
    /// slot naming the register the caught exception is bound to
    pub local : SlotId,
    /// the caught exception, as seen on the stack at the shared label
    pub operand : OperandId,
}

impl LoweringContext<'_> {
    /// Creates an [`InlineHandler`] for every handler label that is also a jump target. Labels
    /// that already have one are left alone, so calling this again changes nothing.
    pub fn split_exception_handlers(&mut self) -> LowerResult<usize> {
        let mut created = 0;
        for label in self.handlers.clone() {
            let insn = self.label_index(label)?;
            if self.inline_handlers.contains_key(&insn) || !self.is_jump_target(label) {
                continue;
            }
            let register = self.locals.fresh();
            let local = self.new_slot(register.into());
            let operand = self.new_operand(insn, Rvalue::Ref(Ref::CaughtException));
            self.operands[operand.index()].stack = Some(register);
            self.inline_handlers.insert(insn, InlineHandler { label, local, operand });
            created += 1;
        }
        if created > 0 {
            debug!("split {} exception handlers shared with normal control flow", created);
        }
        Ok(created)
    }

    fn is_jump_target(&self, label : Label) -> bool {
        self.method.code.iter().any(|op| op.jump_targets().contains(&label))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::Constant;
    use crate::jvmtypes::Operation as Op;
    use crate::method::{sample, TryCatchBlock};
    use crate::types::Type;
    use crate::GeneralResult;

    fn method(jumped_to : bool) -> crate::method::MethodInput {
        let (start, end, handler) = (Label(1), Label(2), Label(3));
        let mut code = vec![
            Op::Label(start),
            Op::Constant(Constant::Null),
            Op::Label(end),
        ];
        if jumped_to {
            code.push(Op::Jump { target : handler });
        } else {
            code.push(Op::Throw);
        }
        code.extend(vec![
            Op::Label(handler),
            Op::Throw,
        ]);
        let mut m = sample(vec![], Type::Void, 0, code);
        m.try_catch.push(TryCatchBlock { start, end, handler, catch_type : None });
        m.try_catch.push(TryCatchBlock { start, end, handler, catch_type : Some("java/lang/Error".to_owned()) });
        m
    }

    #[test]
    fn test_split_is_idempotent() -> GeneralResult<()> {
        let m = method(true);
        let mut ctx = LoweringContext::new(&m)?;
        assert_eq!(1, ctx.split_exception_handlers()?);
        let first = ctx.inline_handlers.get(&4).map(|h| (h.local, h.operand)).ok_or("no handler at 4")?;
        assert_eq!(Label(3), ctx.inline_handlers[&4].label);

        assert_eq!(0, ctx.split_exception_handlers()?);
        assert_eq!(1, ctx.inline_handlers.len());
        assert_eq!(Some(first), ctx.inline_handlers.get(&4).map(|h| (h.local, h.operand)));
        Ok(())
    }

    #[test]
    fn test_unshared_handler_untouched() -> GeneralResult<()> {
        let m = method(false);
        let mut ctx = LoweringContext::new(&m)?;
        assert_eq!(0, ctx.split_exception_handlers()?);
        assert!(ctx.inline_handlers.is_empty());
        Ok(())
    }

    #[test]
    fn test_exception_operand_is_bound() -> GeneralResult<()> {
        let m = method(true);
        let mut ctx = LoweringContext::new(&m)?;
        ctx.split_exception_handlers()?;
        let h = ctx.inline_handlers.get(&4).ok_or("no handler")?;
        let o = ctx.operand(h.operand);
        assert_eq!(Rvalue::Ref(Ref::CaughtException), o.value);
        assert_eq!(Some(ctx.slots[h.local.index()].clone()), o.stack.map(Rvalue::from));
        Ok(())
    }
}
