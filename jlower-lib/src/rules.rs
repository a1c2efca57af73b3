//! Per-instruction lowering rules.
//!
//! Each rule runs every time its instruction is reached. The first visit builds the instruction's
//! statement (its "unit") or its result operand; later visits only pop the same number of operands
//! and merge them into the first visit's inputs, so the statements are never built twice.

use crate::error::{ErrorKind, LowerResult};
use crate::ir::{BinaryOp, Condition, Constant, Expr, InstanceKind, Invoke, Ref, Rvalue, SwitchTable};
use crate::jvmtypes::*;
use crate::lower::{LoweringContext, PendingStmt};
use crate::stack::{Entry, OperandId, SlotId};
use crate::types::{CallSite, FieldRef, MethodRef, Type};

// `None` for the one unary operation, negation
fn binary_op(op : ArithmeticOperation) -> Option<BinaryOp> {
    use ArithmeticOperation::*;
    Some(match op {
        Add  => BinaryOp::Add,
        Sub  => BinaryOp::Sub,
        Mul  => BinaryOp::Mul,
        Div  => BinaryOp::Div,
        Rem  => BinaryOp::Rem,
        Shl  => BinaryOp::Shl,
        Shr  => BinaryOp::Shr,
        Ushr => BinaryOp::Ushr,
        And  => BinaryOp::And,
        Or   => BinaryOp::Or,
        Xor  => BinaryOp::Xor,
        Neg  => return None,
    })
}

impl LoweringContext<'_> {
    pub(crate) fn lower_insn(&mut self, insn : usize, op : &Operation) -> LowerResult<()> {
        match op {
            Operation::Constant(c) => self.lower_constant(insn, c),
            Operation::LoadLocal { kind, index } => self.lower_load_local(insn, *kind, *index),
            Operation::StoreLocal { kind, index } => self.lower_store_local(insn, *kind, *index),
            Operation::Increment { index, value } => self.lower_increment(insn, *index, *value),
            Operation::LoadArray(kind) => self.lower_load_array(insn, *kind),
            Operation::StoreArray(kind) => self.lower_store_array(insn, *kind),
            Operation::StackOp { size, op } => self.lower_stack_op(*size, *op),

            Operation::Arithmetic { kind, op } => match binary_op(*op) {
                Some(bin) => self.lower_binary(insn, bin, kind.is_wide(), op.is_shift(), kind.is_wide()),
                None => self.lower_unary(insn, kind.is_wide(), kind.is_wide(), Expr::Negate),
            },
            Operation::Compare { kind, nans } => {
                let bin = match nans {
                    None => BinaryOp::Cmp,
                    Some(NanComparisons::Less) => BinaryOp::Cmpl,
                    Some(NanComparisons::Greater) => BinaryOp::Cmpg,
                };
                self.lower_binary(insn, bin, kind.is_wide(), false, false)
            },
            Operation::Conversion { from, to } => {
                let ty = to.to_type();
                self.lower_unary(insn, from.is_wide(), to.is_wide(), |value| Expr::Cast { value, ty })
            },
            Operation::Length => self.lower_unary(insn, false, false, Expr::Length),
            Operation::TypeCheck { op : TypeCheckOp::Cast, ty } => {
                let ty = ty.clone();
                self.lower_unary(insn, false, false, |value| Expr::Cast { value, ty })
            },
            Operation::TypeCheck { op : TypeCheckOp::InstanceOf, ty } => {
                let ty = ty.clone();
                self.lower_unary(insn, false, false, |value| Expr::InstanceOf { value, ty })
            },

            Operation::Allocation(AllocationKind::Element(ty)) => self.lower_new(insn, ty),
            Operation::Allocation(AllocationKind::Array { element }) => {
                let element = element.clone();
                self.lower_unary(insn, false, false, |size| Expr::NewArray { element, size })
            },
            Operation::Allocation(AllocationKind::MultiArray { ty, dims }) => self.lower_new_multi_array(insn, ty, *dims),

            Operation::VarAction { op : VarOp::Get, kind, field } => self.lower_get_field(insn, *kind, field),
            Operation::VarAction { op : VarOp::Put, kind, field } => self.lower_put_field(insn, *kind, field),
            Operation::Invocation { kind, method } => self.lower_invocation(insn, *kind, method),
            Operation::Dynamic(site) => self.lower_dynamic(insn, site),

            Operation::Branch { kind, ops, way, target } => self.lower_branch(insn, *kind, *ops, *way, *target),
            Operation::Jump { target } => {
                if !self.has_unit(insn) {
                    self.set_unit(insn, PendingStmt::Goto { target : *target })?;
                }
                Ok(())
            },
            Operation::Switch(params) => self.lower_switch(insn, params),
            Operation::Yield { kind } => self.lower_return(insn, *kind),
            Operation::Throw => self.lower_throw(insn),
            Operation::Monitor(m) => self.lower_monitor(insn, *m),

            Operation::Noop => {
                if !self.has_unit(insn) {
                    self.set_unit(insn, PendingStmt::Nop)?;
                }
                Ok(())
            },
            Operation::LineNumber(_) => Ok(()),
            Operation::Label(label) => self.lower_label(insn, *label),
            Operation::Unhandled { opcode, mnemonic } =>
                Err(ErrorKind::Unsupported { insn, opcode : *opcode, mnemonic }),
        }
    }

    // The operand cached from the first visit, or a new one built by `make`.
    fn cached_out(&mut self, insn : usize, make : impl FnOnce(&mut Self) -> Rvalue<SlotId>) -> OperandId {
        match self.out(insn) {
            Some(o) => o,
            None => {
                let value = make(self);
                let o = self.new_operand(insn, value);
                self.set_out(insn, o);
                o
            },
        }
    }

    fn lower_constant(&mut self, insn : usize, c : &Constant) -> LowerResult<()> {
        let o = self.cached_out(insn, |_| c.clone().into());
        self.push_typed(o, c.is_wide());
        Ok(())
    }

    fn lower_load_local(&mut self, insn : usize, kind : JType, index : u16) -> LowerResult<()> {
        let local = self.locals.slot(index)?;
        let o = self.cached_out(insn, |_| local.into());
        self.push_typed(o, kind.is_wide());
        Ok(())
    }

    fn lower_store_local(&mut self, insn : usize, kind : JType, index : u16) -> LowerResult<()> {
        let o = self.pop_typed(kind.is_wide())?;
        let local = self.locals.slot(index)?;
        if self.has_unit(insn) {
            self.merge_in(insn, &[ o ])?;
        } else {
            let rhs = self.use_operand(o);
            let lhs = self.new_slot(local.into());
            self.set_in(insn, vec![ o ]);
            self.set_uses(insn, vec![ rhs ]);
            self.set_unit(insn, PendingStmt::Assign { lhs, rhs })?;
        }
        self.assign_read_ops(Some(local))
    }

    fn lower_increment(&mut self, insn : usize, index : u16, value : i16) -> LowerResult<()> {
        let local = self.locals.slot(index)?;
        self.assign_read_ops(Some(local))?;
        if !self.has_unit(insn) {
            let lhs = self.new_slot(local.into());
            let a = self.new_slot(local.into());
            let b = self.new_slot(Constant::Int(value.into()).into());
            let rhs = self.new_slot(Rvalue::Expr(Expr::Binary { op : BinaryOp::Add, lhs : a, rhs : b }));
            self.set_unit(insn, PendingStmt::Assign { lhs, rhs })?;
        }
        Ok(())
    }

    fn lower_load_array(&mut self, insn : usize, kind : JType) -> LowerResult<()> {
        let o = match self.out(insn) {
            Some(o) => {
                let index = self.pop()?;
                let base = self.pop()?;
                self.merge_in(insn, &[ index, base ])?;
                o
            },
            None => {
                let index = self.pop_immediate()?;
                let base = self.pop_immediate()?;
                let base_slot = self.use_operand(base);
                let index_slot = self.use_operand(index);
                let o = self.new_operand(insn, Rvalue::Ref(Ref::Array { base : base_slot, index : index_slot }));
                self.set_in(insn, vec![ index, base ]);
                self.set_uses(insn, vec![ index_slot, base_slot ]);
                self.set_out(insn, o);
                o
            },
        };
        self.push_typed(o, kind.is_wide());
        Ok(())
    }

    fn lower_store_array(&mut self, insn : usize, kind : JType) -> LowerResult<()> {
        let wide = kind.is_wide();
        if self.has_unit(insn) {
            let value = self.pop_typed(wide)?;
            let index = self.pop()?;
            let base = self.pop()?;
            self.merge_in(insn, &[ value, index, base ])?;
        } else {
            let value = self.pop_immediate_typed(wide)?;
            let index = self.pop_immediate()?;
            let base = self.pop_register()?;
            let base_slot = self.use_operand(base);
            let index_slot = self.use_operand(index);
            let rhs = self.use_operand(value);
            let lhs = self.new_slot(Rvalue::Ref(Ref::Array { base : base_slot, index : index_slot }));
            self.set_in(insn, vec![ value, index, base ]);
            self.set_uses(insn, vec![ rhs, index_slot, base_slot ]);
            self.set_unit(insn, PendingStmt::Assign { lhs, rhs })?;
        }
        self.assign_read_ops(None)
    }

    // Pops the word beneath a possibly-wide value: its placeholder, or a value of its own.
    fn pop_second_word(&mut self, first : OperandId) -> LowerResult<Entry> {
        if self.peek()? == Entry::WideHalf {
            self.pop_entry()?;
            Ok(Entry::Operand(first))
        } else {
            Ok(Entry::Operand(self.pop_immediate()?))
        }
    }

    fn lower_stack_op(&mut self, size : OperandCount, op : StackOperation) -> LowerResult<()> {
        use StackOperation::*;
        let push_all = |ctx : &mut Self, entries : &[Entry]| entries.iter().for_each(|e| ctx.push_entry(*e));

        match (op, size) {
            (Pop, OperandCount::_1) => { self.pop_immediate()?; },
            (Pop, OperandCount::_2) => {
                self.pop_immediate()?;
                if self.peek()? == Entry::WideHalf {
                    self.pop_entry()?;
                } else {
                    self.pop_immediate()?;
                }
            },
            (Dup, OperandCount::_1) => {
                let d = Entry::Operand(self.pop_immediate()?);
                push_all(self, &[ d, d ]);
            },
            (DupX1, OperandCount::_1) => {
                let d = Entry::Operand(self.pop_immediate()?);
                let o2 = Entry::Operand(self.pop_immediate()?);
                push_all(self, &[ d, o2, d ]);
            },
            (DupX2, OperandCount::_1) => {
                let d = Entry::Operand(self.pop_immediate()?);
                let o2 = Entry::Operand(self.pop_immediate()?);
                let o3 = if self.peek()? == Entry::WideHalf { self.pop_entry()? } else { Entry::Operand(self.pop_immediate()?) };
                push_all(self, &[ d, o3, o2, d ]);
            },
            (Dup, OperandCount::_2) => {
                let first = self.pop_immediate()?;
                let d2 = self.pop_second_word(first)?;
                let d = Entry::Operand(first);
                push_all(self, &[ d2, d, d2, d ]);
            },
            (DupX1, OperandCount::_2) => {
                let first = self.pop_immediate()?;
                let d2 = self.pop_second_word(first)?;
                let d = Entry::Operand(first);
                let o2 = Entry::Operand(self.pop_immediate()?);
                push_all(self, &[ d2, d, o2, d2, d ]);
            },
            (DupX2, OperandCount::_2) => {
                let first = self.pop_immediate()?;
                let d2 = self.pop_second_word(first)?;
                let d = Entry::Operand(first);
                let o2 = Entry::Operand(self.pop_immediate()?);
                let o2h = if self.peek()? == Entry::WideHalf { self.pop_entry()? } else { Entry::Operand(self.pop_immediate()?) };
                push_all(self, &[ d2, d, o2h, o2, d2, d ]);
            },
            (Swap, _) => {
                let o1 = self.pop_immediate()?;
                let o2 = self.pop_immediate()?;
                self.push(o1);
                self.push(o2);
            },
        }
        Ok(())
    }

    fn lower_unary(
        &mut self,
        insn : usize,
        wide_in : bool,
        wide_out : bool,
        make : impl FnOnce(SlotId) -> Expr<SlotId>,
    ) -> LowerResult<()> {
        let o = match self.out(insn) {
            Some(o) => {
                let v = self.pop_typed(wide_in)?;
                self.merge_in(insn, &[ v ])?;
                o
            },
            None => {
                let v = self.pop_immediate_typed(wide_in)?;
                let s = self.use_operand(v);
                let o = self.new_operand(insn, Rvalue::Expr(make(s)));
                self.set_in(insn, vec![ v ]);
                self.set_uses(insn, vec![ s ]);
                self.set_out(insn, o);
                o
            },
        };
        self.push_typed(o, wide_out);
        Ok(())
    }

    // Shift distances are always a single word, even when shifting a long.
    fn lower_binary(&mut self, insn : usize, op : BinaryOp, wide : bool, shift : bool, wide_out : bool) -> LowerResult<()> {
        let wide_rhs = wide && !shift;
        let o = match self.out(insn) {
            Some(o) => {
                let b = self.pop_typed(wide_rhs)?;
                let a = self.pop_typed(wide)?;
                self.merge_in(insn, &[ b, a ])?;
                o
            },
            None => {
                let b = self.pop_immediate_typed(wide_rhs)?;
                let a = self.pop_immediate_typed(wide)?;
                let lhs = self.use_operand(a);
                let rhs = self.use_operand(b);
                let o = self.new_operand(insn, Rvalue::Expr(Expr::Binary { op, lhs, rhs }));
                self.set_in(insn, vec![ b, a ]);
                self.set_uses(insn, vec![ rhs, lhs ]);
                self.set_out(insn, o);
                o
            },
        };
        self.push_typed(o, wide_out);
        Ok(())
    }

    fn lower_new(&mut self, insn : usize, ty : &Type) -> LowerResult<()> {
        let o = self.cached_out(insn, |_| Rvalue::Expr(Expr::New(ty.clone())));
        self.push(o);
        Ok(())
    }

    fn lower_new_multi_array(&mut self, insn : usize, ty : &Type, dims : u8) -> LowerResult<()> {
        let o = match self.out(insn) {
            Some(o) => {
                let mut sizes = (0..dims).map(|_| self.pop()).collect::<LowerResult<Vec<_>>>()?;
                sizes.reverse();
                self.merge_in(insn, &sizes)?;
                o
            },
            None => {
                let mut sizes = (0..dims).map(|_| self.pop_immediate()).collect::<LowerResult<Vec<_>>>()?;
                sizes.reverse();
                let slots : Vec<SlotId> = sizes.iter().map(|&s| self.use_operand(s)).collect();
                let o = self.new_operand(insn, Rvalue::Expr(Expr::NewMultiArray { ty : ty.clone(), sizes : slots.clone() }));
                self.set_in(insn, sizes);
                self.set_uses(insn, slots);
                self.set_out(insn, o);
                o
            },
        };
        self.push(o);
        Ok(())
    }

    fn lower_get_field(&mut self, insn : usize, kind : VarKind, field : &FieldRef) -> LowerResult<()> {
        let o = match (self.out(insn), kind) {
            (Some(o), VarKind::Static) => o,
            (Some(o), VarKind::Field) => {
                let base = self.pop()?;
                self.merge_in(insn, &[ base ])?;
                o
            },
            (None, VarKind::Static) => {
                let o = self.new_operand(insn, Rvalue::Ref(Ref::StaticField(field.clone())));
                self.set_out(insn, o);
                o
            },
            (None, VarKind::Field) => {
                let base = self.pop_register()?;
                let s = self.use_operand(base);
                let o = self.new_operand(insn, Rvalue::Ref(Ref::InstanceField { base : s, field : field.clone() }));
                self.set_in(insn, vec![ base ]);
                self.set_uses(insn, vec![ s ]);
                self.set_out(insn, o);
                o
            },
        };
        self.push_typed(o, field.ty.is_wide());
        Ok(())
    }

    fn lower_put_field(&mut self, insn : usize, kind : VarKind, field : &FieldRef) -> LowerResult<()> {
        let wide = field.ty.is_wide();
        if self.has_unit(insn) {
            let value = self.pop_typed(wide)?;
            let mut ins = vec![ value ];
            if kind == VarKind::Field {
                ins.push(self.pop()?);
            }
            self.merge_in(insn, &ins)?;
        } else {
            let value = self.pop_immediate_typed(wide)?;
            let mut ins = vec![ value ];
            let (target, base_slot) = match kind {
                VarKind::Static => (Ref::StaticField(field.clone()), None),
                VarKind::Field => {
                    let base = self.pop_register()?;
                    ins.push(base);
                    let s = self.use_operand(base);
                    (Ref::InstanceField { base : s, field : field.clone() }, Some(s))
                },
            };
            let rhs = self.use_operand(value);
            let lhs = self.new_slot(Rvalue::Ref(target));
            self.set_in(insn, ins);
            self.set_uses(insn, std::iter::once(rhs).chain(base_slot).collect());
            self.set_unit(insn, PendingStmt::Assign { lhs, rhs })?;
        }
        self.assign_read_ops(None)
    }

    // Pops call arguments (and the receiver, if any); returns them in argument order, receiver last.
    fn pop_call_operands(&mut self, params : &[Type], receiver : bool, first_visit : bool) -> LowerResult<Vec<OperandId>> {
        let mut oprs = Vec::with_capacity(params.len() + 1);
        for p in params.iter().rev() {
            oprs.push(if first_visit { self.pop_immediate_typed(p.is_wide())? } else { self.pop_typed(p.is_wide())? });
        }
        oprs.reverse();
        if receiver {
            oprs.push(if first_visit { self.pop_register()? } else { self.pop()? });
        }
        Ok(oprs)
    }

    fn lower_call(
        &mut self,
        insn : usize,
        params : &[Type],
        ret : &Type,
        receiver : bool,
        make : impl FnOnce(Vec<SlotId>, Option<SlotId>) -> Invoke<SlotId>,
    ) -> LowerResult<()> {
        let o = match self.out(insn) {
            Some(o) => {
                let oprs = self.pop_call_operands(params, receiver, false)?;
                self.merge_in(insn, &oprs)?;
                o
            },
            None => {
                let oprs = self.pop_call_operands(params, receiver, true)?;
                let slots : Vec<SlotId> = oprs.iter().map(|&a| self.use_operand(a)).collect();
                let mut args = slots.clone();
                let base = if receiver { args.pop() } else { None };
                let invoke = make(args, base);
                if !oprs.is_empty() {
                    self.set_in(insn, oprs);
                    self.set_uses(insn, slots);
                }
                let o = self.new_operand(insn, Rvalue::Expr(Expr::Invoke(invoke)));
                self.set_out(insn, o);
                o
            },
        };

        if *ret == Type::Void {
            if !self.has_unit(insn) {
                let invoke = match &self.operand(o).value {
                    Rvalue::Expr(Expr::Invoke(i)) => i.clone(),
                    _ => return Err(ErrorKind::MissingDefinition { insn }),
                };
                self.set_unit(insn, PendingStmt::Invoke(invoke))?;
            }
        } else {
            self.push_typed(o, ret.is_wide());
        }
        self.assign_read_ops(None)
    }

    fn lower_invocation(&mut self, insn : usize, kind : InvokeKind, method : &MethodRef) -> LowerResult<()> {
        let instance = match kind {
            InvokeKind::Static    => None,
            InvokeKind::Virtual   => Some(InstanceKind::Virtual),
            InvokeKind::Special   => Some(InstanceKind::Special),
            InvokeKind::Interface => Some(InstanceKind::Interface),
        };
        let m = method.clone();
        self.lower_call(insn, &method.params, &method.ret, instance.is_some(), move |args, base| {
            match (instance, base) {
                (Some(kind), Some(base)) => Invoke::Instance { kind, base, method : m, args },
                _ => Invoke::Static { method : m, args },
            }
        })
    }

    fn lower_dynamic(&mut self, insn : usize, site : &CallSite) -> LowerResult<()> {
        let s = site.clone();
        self.lower_call(insn, &site.params, &site.ret, false, move |args, _| Invoke::Dynamic { site : s, args })
    }

    fn lower_branch(&mut self, insn : usize, kind : JType, ops : OperandCount, way : Comparison, target : Label) -> LowerResult<()> {
        if self.has_unit(insn) {
            let v = self.pop()?;
            let mut ins = vec![ v ];
            if ops == OperandCount::_2 {
                ins.push(self.pop()?);
            }
            return self.merge_in(insn, &ins);
        }

        let v = self.pop_immediate()?;
        let (condition, ins, uses) = match ops {
            OperandCount::_2 => {
                let v1 = self.pop_immediate()?;
                let lhs = self.use_operand(v1);
                let rhs = self.use_operand(v);
                (Condition { op : way, lhs, rhs }, vec![ v, v1 ], vec![ rhs, lhs ])
            },
            OperandCount::_1 => {
                let lhs = self.use_operand(v);
                let zero = if kind == JType::Object { Constant::Null } else { Constant::Int(0) };
                let rhs = self.new_slot(zero.into());
                (Condition { op : way, lhs, rhs }, vec![ v ], vec![ lhs ])
            },
        };
        self.set_in(insn, ins);
        self.set_uses(insn, uses);
        self.set_unit(insn, PendingStmt::If { condition, target })
    }

    fn lower_switch(&mut self, insn : usize, params : &SwitchParams) -> LowerResult<()> {
        if self.has_unit(insn) {
            let key = self.pop()?;
            return self.merge_in(insn, &[ key ]);
        }
        let key = self.pop_immediate()?;
        let s = self.use_operand(key);
        let table = match params {
            SwitchParams::Lookup { pairs, .. } => SwitchTable::Lookup(pairs.iter().map(|&(k, _)| k).collect()),
            SwitchParams::Table { low, high, .. } => SwitchTable::Table { low : *low, high : *high },
        };
        self.set_in(insn, vec![ key ]);
        self.set_uses(insn, vec![ s ]);
        self.set_unit(insn, PendingStmt::Switch { key : s, table, targets : params.targets(), default : params.default() })
    }

    fn lower_return(&mut self, insn : usize, kind : JType) -> LowerResult<()> {
        if kind == JType::Void {
            if !self.has_unit(insn) {
                self.set_unit(insn, PendingStmt::ReturnVoid)?;
            }
            return Ok(());
        }
        if self.has_unit(insn) {
            let v = self.pop_typed(kind.is_wide())?;
            return self.merge_in(insn, &[ v ]);
        }
        let v = self.pop_immediate_typed(kind.is_wide())?;
        let s = self.use_operand(v);
        self.set_in(insn, vec![ v ]);
        self.set_uses(insn, vec![ s ]);
        self.set_unit(insn, PendingStmt::Return(s))
    }

    // Consumes one operand into a single-operand statement built by `make`.
    fn lower_consumer(&mut self, insn : usize, make : fn(SlotId) -> PendingStmt) -> LowerResult<()> {
        if self.has_unit(insn) {
            let v = self.pop()?;
            return self.merge_in(insn, &[ v ]);
        }
        let v = self.pop_constant_or_register()?;
        let s = self.use_operand(v);
        self.set_in(insn, vec![ v ]);
        self.set_uses(insn, vec![ s ]);
        self.set_unit(insn, make(s))
    }

    fn lower_throw(&mut self, insn : usize) -> LowerResult<()> { self.lower_consumer(insn, PendingStmt::Throw) }

    fn lower_monitor(&mut self, insn : usize, op : MonitorOp) -> LowerResult<()> {
        match op {
            MonitorOp::Enter => self.lower_consumer(insn, PendingStmt::EnterMonitor),
            MonitorOp::Exit  => self.lower_consumer(insn, PendingStmt::ExitMonitor),
        }
    }

    // Only exception-handler labels do anything: they push the caught exception.
    fn lower_label(&mut self, insn : usize, label : Label) -> LowerResult<()> {
        if !self.handlers.contains(&label) {
            return Ok(());
        }
        if self.inline_handlers.contains_key(&insn) {
            // reached with the exception already on the stack; the entry is emitted separately
            if !self.has_unit(insn) {
                self.set_unit(insn, PendingStmt::Nop)?;
            }
            return Ok(());
        }
        let o = match self.out(insn) {
            Some(o) => o,
            None => {
                let local = self.locals.fresh();
                let o = self.new_operand(insn, Rvalue::Ref(Ref::CaughtException));
                self.operands[o.index()].stack = Some(local);
                self.set_out(insn, o);
                let slot = self.new_slot(local.into());
                self.set_unit(insn, PendingStmt::Identity { local : slot, value : Ref::CaughtException })?;
                o
            },
        };
        self.push(o);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::ir::{BinaryOp, Constant, Expr, Immediate, Invoke, Ref, Rvalue, StmtKind};
    use crate::jvmtypes::*;
    use crate::jvmtypes::Operation as Op;
    use crate::lower::lower_method;
    use crate::method::{sample, TryCatchBlock};
    use crate::types::{FieldRef, MethodRef, Type};
    use crate::GeneralResult;

    fn kinds(m : &crate::method::MethodInput) -> GeneralResult<Vec<StmtKind>> {
        Ok(lower_method(m)?.stmts.into_iter().map(|s| s.kind).collect())
    }

    #[test]
    fn test_wide_arithmetic_and_shift() -> GeneralResult<()> {
        // long f(long a, int s) { return (a << s) * a; }
        let m = sample(vec![ Type::Long, Type::Int ], Type::Long, 3, vec![
            Op::LoadLocal { kind : JType::Long, index : 0 },
            Op::LoadLocal { kind : JType::Int, index : 2 },
            Op::Arithmetic { kind : JType::Long, op : ArithmeticOperation::Shl },
            Op::LoadLocal { kind : JType::Long, index : 0 },
            Op::Arithmetic { kind : JType::Long, op : ArithmeticOperation::Mul },
            Op::Yield { kind : JType::Long },
        ]);
        let ks = kinds(&m)?;
        // two parameter identities, a spilled shift, a spilled product, and the return
        assert_eq!(5, ks.len());
        assert!(matches!(&ks[2], StmtKind::Assign { rhs : Rvalue::Expr(Expr::Binary { op : BinaryOp::Shl, .. }), .. }));
        assert!(matches!(&ks[3], StmtKind::Assign { rhs : Rvalue::Expr(Expr::Binary { op : BinaryOp::Mul, .. }), .. }));
        assert!(matches!(&ks[4], StmtKind::Return(Immediate::Local(_))));
        Ok(())
    }

    #[test]
    fn test_dup2_of_wide_value() -> GeneralResult<()> {
        let m = sample(vec![], Type::Long, 0, vec![
            Op::Constant(Constant::Long(5)),
            Op::StackOp { size : OperandCount::_2, op : StackOperation::Dup },
            Op::Arithmetic { kind : JType::Long, op : ArithmeticOperation::Add },
            Op::Yield { kind : JType::Long },
        ]);
        let ks = kinds(&m)?;
        let five = Immediate::Constant(Constant::Long(5));
        let sum = Rvalue::Expr(Expr::Binary { op : BinaryOp::Add, lhs : five.clone(), rhs : five });
        assert!(matches!(&ks[0], StmtKind::Assign { rhs, .. } if *rhs == sum));
        Ok(())
    }

    #[test]
    fn test_field_write_freezes_reads() -> GeneralResult<()> {
        // push this.x; this.x = 1; return the old value
        let field = FieldRef { class : "Sample".to_owned(), name : "x".to_owned(), ty : Type::Int };
        let mut m = sample(vec![], Type::Int, 1, vec![
            Op::LoadLocal { kind : JType::Object, index : 0 },
            Op::VarAction { op : VarOp::Get, kind : VarKind::Field, field : field.clone() },
            Op::LoadLocal { kind : JType::Object, index : 0 },
            Op::Constant(Constant::Int(1)),
            Op::VarAction { op : VarOp::Put, kind : VarKind::Field, field },
            Op::Yield { kind : JType::Int },
        ]);
        m.is_static = false;
        let ks = kinds(&m)?;
        assert_eq!(4, ks.len());
        assert!(matches!(&ks[1], StmtKind::Assign { lhs : Rvalue::Immediate(_), rhs : Rvalue::Ref(Ref::InstanceField { .. }) }));
        assert!(matches!(&ks[2], StmtKind::Assign { lhs : Rvalue::Ref(Ref::InstanceField { .. }), .. }));
        Ok(())
    }

    #[test]
    fn test_void_call_statement() -> GeneralResult<()> {
        let m = sample(vec![ Type::Int ], Type::Void, 1, vec![
            Op::LoadLocal { kind : JType::Int, index : 0 },
            Op::Invocation { kind : InvokeKind::Static, method : MethodRef::new("Sample", "g", "(I)V")? },
            Op::Yield { kind : JType::Void },
        ]);
        let ks = kinds(&m)?;
        match &ks[1] {
            StmtKind::Invoke(Invoke::Static { method, args }) => {
                assert_eq!("g", method.name);
                assert_eq!(1, args.len());
            },
            other => return Err(format!("expected a static call, got {:?}", other).into()),
        }
        Ok(())
    }

    #[test]
    fn test_throw_spills_register() -> GeneralResult<()> {
        let m = sample(vec![ Type::class("java/lang/Throwable") ], Type::Void, 1, vec![
            Op::LoadLocal { kind : JType::Object, index : 0 },
            Op::Throw,
        ]);
        let ks = kinds(&m)?;
        assert_eq!(3, ks.len());
        let copied = match &ks[1] {
            StmtKind::Assign { lhs : Rvalue::Immediate(s), .. } => s.clone(),
            other => return Err(format!("expected a copy, got {:?}", other).into()),
        };
        assert_eq!(StmtKind::Throw(copied), ks[2]);
        Ok(())
    }

    #[test]
    fn test_plain_exception_handler() -> GeneralResult<()> {
        let (start, end, handler) = (Label(1), Label(2), Label(3));
        let mut m = sample(vec![], Type::Void, 0, vec![
            Op::Label(start),
            Op::Invocation { kind : InvokeKind::Static, method : MethodRef::new("Sample", "a", "()V")? },
            Op::Label(end),
            Op::Yield { kind : JType::Void },
            Op::Label(handler),
            Op::Throw,
        ]);
        m.try_catch.push(TryCatchBlock { start, end, handler, catch_type : Some("java/io/IOException".to_owned()) });
        let body = lower_method(&m)?;
        let trap = &body.traps[0];
        assert_eq!(Type::class("java.io.IOException"), trap.exception);
        let entry = body.stmt(trap.handler).ok_or("no handler")?;
        let exc = match entry.kind {
            StmtKind::Identity { local, value : Ref::CaughtException } => local,
            ref other => return Err(format!("expected identity, got {:?}", other).into()),
        };
        assert_eq!(Some(&StmtKind::Throw(Immediate::Local(exc))), body.stmts.last().map(|s| &s.kind));
        Ok(())
    }

    #[test]
    fn test_switch_and_monitor() -> GeneralResult<()> {
        let (a, b) = (Label(1), Label(2));
        let m = sample(vec![ Type::Int ], Type::Void, 1, vec![
            Op::LoadLocal { kind : JType::Int, index : 0 },
            Op::Switch(SwitchParams::Lookup { default : b, pairs : vec![ (3, a), (9, b) ] }),
            Op::Label(a),
            Op::Constant(Constant::Null),
            Op::Monitor(MonitorOp::Enter),
            Op::Label(b),
            Op::Yield { kind : JType::Void },
        ]);
        let ks = kinds(&m)?;
        assert!(matches!(&ks[1], StmtKind::Switch { targets, .. } if targets.len() == 2));
        assert!(ks.contains(&StmtKind::EnterMonitor(Immediate::Constant(Constant::Null))));
        Ok(())
    }

    #[test]
    fn test_multi_array_sizes_in_order() -> GeneralResult<()> {
        let ty = Type::Int.array_of(2)?;
        let m = sample(vec![], Type::Void, 0, vec![
            Op::Constant(Constant::Int(2)),
            Op::Constant(Constant::Int(3)),
            Op::Allocation(AllocationKind::MultiArray { ty : ty.clone(), dims : 2 }),
            Op::StackOp { size : OperandCount::_1, op : StackOperation::Pop },
            Op::Yield { kind : JType::Void },
        ]);
        let ks = kinds(&m)?;
        let sizes = vec![ Immediate::Constant(Constant::Int(2)), Immediate::Constant(Constant::Int(3)) ];
        assert!(matches!(&ks[0], StmtKind::Assign { rhs : Rvalue::Expr(Expr::NewMultiArray { sizes : s, .. }), .. } if *s == sizes));
        Ok(())
    }
}
