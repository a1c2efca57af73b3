use std::mem;

use log::trace;

use crate::error::{ErrorKind, LowerResult};
use crate::ir::LocalId;
use crate::lower::{LoweringContext, PendingStmt};
use crate::stack::{OperandId, SlotId};

/// What lowering remembers about one instruction between visits.
#[derive(Clone, Debug, Default)]
pub(crate) struct Frame {
    /// values this instruction produced on its first visit, reused on later visits
    pub out : Option<Vec<OperandId>>,
    /// the operands consumed on each visit, one row per visit
    ins : Vec<Vec<OperandId>>,
    /// register shared by position `i` of every row, once rows have been merged
    in_stack_locals : Vec<Option<LocalId>>,
    /// slots in this instruction's statement where the consumed operands were substituted
    uses : Vec<SlotId>,
}

impl Frame {
    pub fn set_in(&mut self, oprs : Vec<OperandId>) {
        self.in_stack_locals = vec![ None ; oprs.len() ];
        self.ins = vec![ oprs ];
    }

    pub fn set_uses(&mut self, uses : Vec<SlotId>) { self.uses = uses }
}

impl LoweringContext<'_> {
    pub fn out(&self, insn : usize) -> Option<OperandId> {
        self.frames[insn].out.as_ref().and_then(|o| o.first().copied())
    }

    pub fn set_out(&mut self, insn : usize, op : OperandId) { self.frames[insn].out = Some(vec![ op ]) }

    pub fn set_in(&mut self, insn : usize, oprs : Vec<OperandId>) { self.frames[insn].set_in(oprs) }

    pub fn set_uses(&mut self, insn : usize, uses : Vec<SlotId>) { self.frames[insn].set_uses(uses) }

    /// Reconciles the operands consumed on a later visit of `insn` with those of earlier visits, so
    /// that every value arriving at the same input position ends up in the same register.
    pub fn merge_in(&mut self, insn : usize, oprs : &[OperandId]) -> LowerResult<()> {
        if oprs.is_empty() {
            return Ok(());
        }
        let mut frame = mem::take(&mut self.frames[insn]);
        let result = self.merge_frame(insn, &mut frame, oprs);
        self.frames[insn] = frame;
        result
    }

    fn merge_frame(&mut self, insn : usize, frame : &mut Frame, oprs : &[OperandId]) -> LowerResult<()> {
        if frame.ins.first().map(Vec::len) != Some(oprs.len()) {
            return Err(ErrorKind::InconsistentMerge { insn });
        }
        trace!("merging {} operands into instruction {}", oprs.len(), insn);

        for (i, &new_op) in oprs.iter().enumerate() {
            if let Some(stack) = frame.in_stack_locals[i] {
                match self.operand(new_op).stack {
                    None => self.bind_operand(new_op, stack)?,
                    Some(s) if s == stack => {},
                    Some(_) => {
                        // already held elsewhere; copy it into the shared register
                        let rhs = self.use_operand(new_op);
                        let lhs = self.new_slot(stack.into());
                        let at = self.operand(new_op).insn;
                        self.merge_units(at, PendingStmt::Assign { lhs, rhs });
                    },
                }
                continue;
            }

            let existing = frame.ins.iter().find_map(|row| self.operand(row[i]).stack);
            let stack = match existing.or(self.operand(new_op).stack) {
                Some(s) => s,
                None => self.locals.fresh(),
            };
            for row in &frame.ins {
                self.rebind_operand(row[i], stack)?;
            }
            self.rebind_operand(new_op, stack)?;
            if let Some(&u) = frame.uses.get(i) {
                self.slots[u.index()] = stack.into();
            }
            frame.in_stack_locals[i] = Some(stack);
        }

        frame.ins.push(oprs.to_vec());
        Ok(())
    }

    // Assigns an unbound operand to `stack` where it was produced.
    fn bind_operand(&mut self, op : OperandId, stack : LocalId) -> LowerResult<()> {
        let (insn, value) = {
            let o = &mut self.operands[op.index()];
            o.stack = Some(stack);
            (o.insn, o.value.clone())
        };
        let lhs = self.new_slot(stack.into());
        let rhs = self.new_slot(value);
        self.set_unit(insn, PendingStmt::Assign { lhs, rhs })?;
        self.update_uses(op);
        Ok(())
    }

    fn rebind_operand(&mut self, op : OperandId, stack : LocalId) -> LowerResult<()> {
        match self.operand(op).stack {
            Some(s) if s == stack => Ok(()),
            None => self.bind_operand(op, stack),
            Some(_) => {
                let def = self.definition_slot(self.operand(op).insn)?;
                self.slots[def.index()] = stack.into();
                self.operands[op.index()].stack = Some(stack);
                self.update_uses(op);
                Ok(())
            },
        }
    }

    /// The slot naming the register defined by the statement at `insn`.
    pub fn definition_slot(&self, insn : usize) -> LowerResult<SlotId> {
        if let Some(handler) = self.inline_handlers.get(&insn) {
            return Ok(handler.local);
        }
        match self.units[insn].first() {
            Some(PendingStmt::Assign { lhs, .. }) => Ok(*lhs),
            Some(PendingStmt::Identity { local, .. }) => Ok(*local),
            _ => Err(ErrorKind::MissingDefinition { insn }),
        }
    }
}
