use std::mem;

use rustc_hash::FxHashMap;

use crate::error::{ErrorKind, LowerResult};
use crate::ir::{Body, Immediate, LocalId, Ref, Rvalue, Stmt, StmtId, StmtKind, Trap, Value};
use crate::jvmtypes::{Label, Operation};
use crate::lower::{LoweringContext, PendingStmt};
use crate::method::LoweringOptions;
use crate::stack::SlotId;
use crate::types::Type;

// A statement in final order, with where it came from.
struct Placed {
    stmt : PendingStmt,
    insn : usize,
    line : Option<u16>,
}

impl LoweringContext<'_> {
    fn immediate(&self, slot : SlotId, insn : usize) -> LowerResult<Immediate> {
        match &self.slots[slot.index()] {
            Rvalue::Immediate(i) => Ok(i.clone()),
            _ => Err(ErrorKind::NotImmediate { insn }),
        }
    }

    fn value(&self, slot : SlotId, insn : usize) -> LowerResult<Value> {
        self.slots[slot.index()].try_map(&mut |&s| self.immediate(s, insn))
    }

    fn register(&self, slot : SlotId, insn : usize) -> LowerResult<LocalId> {
        self.slots[slot.index()].as_local().ok_or(ErrorKind::MissingDefinition { insn })
    }

    fn finish(&self, p : Placed, labels : &FxHashMap<Label, StmtId>) -> LowerResult<Stmt> {
        let insn = p.insn;
        let imm = |s : SlotId| self.immediate(s, insn);
        let target = |l : Label| labels.get(&l).copied().ok_or(ErrorKind::UndefinedLabel(l));

        let kind = match p.stmt {
            PendingStmt::Nop => StmtKind::Nop,
            PendingStmt::Identity { local, value } => StmtKind::Identity {
                local : self.register(local, insn)?,
                value : value.try_map(&mut |&s| imm(s))?,
            },
            PendingStmt::Assign { lhs, rhs } => StmtKind::Assign {
                lhs : self.value(lhs, insn)?,
                rhs : self.value(rhs, insn)?,
            },
            PendingStmt::Invoke(inv) => StmtKind::Invoke(inv.try_map(&mut |&s| imm(s))?),
            PendingStmt::If { condition, target : t } => StmtKind::If {
                condition : condition.try_map(&mut |&s| imm(s))?,
                target : target(t)?,
            },
            PendingStmt::Goto { target : t } => StmtKind::Goto { target : target(t)? },
            PendingStmt::Switch { key, table, targets, default } => StmtKind::Switch {
                key : imm(key)?,
                table,
                targets : targets.into_iter().map(target).collect::<LowerResult<_>>()?,
                default : target(default)?,
            },
            PendingStmt::Return(s)       => StmtKind::Return(imm(s)?),
            PendingStmt::ReturnVoid      => StmtKind::ReturnVoid,
            PendingStmt::Throw(s)        => StmtKind::Throw(imm(s)?),
            PendingStmt::EnterMonitor(s) => StmtKind::EnterMonitor(imm(s)?),
            PendingStmt::ExitMonitor(s)  => StmtKind::ExitMonitor(imm(s)?),
        };
        Ok(Stmt { kind, line : p.line })
    }

    /// Lays out the units in instruction order and resolves every slot and label.
    pub fn assemble(mut self, options : &LoweringOptions) -> LowerResult<Body> {
        let method = self.method;
        let mut placed = Vec::new();

        // receiver and parameters come first, in declaration order
        let mut leading = Vec::new();
        let mut index : u16 = 0;
        if !method.is_static {
            let ty = Type::class(&method.class);
            let local = self.locals.declare(0, ty.clone())?;
            let slot = self.new_slot(local.into());
            placed.push(Placed { stmt : PendingStmt::Identity { local : slot, value : Ref::This(ty) }, insn : 0, line : None });
            leading.push(0);
            index = 1;
        }
        for (n, ty) in method.params.iter().enumerate() {
            let local = self.locals.declare(index, ty.clone())?;
            let slot = self.new_slot(local.into());
            let value = Ref::Parameter { index : n, ty : ty.clone() };
            placed.push(Placed { stmt : PendingStmt::Identity { local : slot, value }, insn : 0, line : None });
            leading.push(index);
            index += u16::from(ty.size());
        }

        let mut lines = Vec::with_capacity(method.code.len());
        let mut line = None;
        for op in &method.code {
            if let Operation::LineNumber(n) = op {
                line = Some(*n);
            }
            lines.push(if options.keep_line_numbers { line } else { None });
        }

        let mut labels = FxHashMap::default();
        let mut handler_entries = FxHashMap::default();
        let mut pending_labels = Vec::new();
        for (insn, unit) in mem::take(&mut self.units).into_iter().enumerate() {
            if let Operation::Label(l) = method.code[insn] {
                pending_labels.push(l);
            }
            if unit.is_empty() {
                continue;
            }
            let first = StmtId(placed.len());
            for l in pending_labels.drain(..) {
                labels.insert(l, first);
            }
            if let (Operation::Label(l), Some(PendingStmt::Identity { value : Ref::CaughtException, .. })) = (&method.code[insn], unit.first()) {
                handler_entries.insert(*l, first);
            }
            placed.extend(unit.into_iter().map(|stmt| Placed { stmt, insn, line : lines[insn] }));
        }

        for (insn, handler) in mem::take(&mut self.inline_handlers) {
            handler_entries.insert(handler.label, StmtId(placed.len()));
            let entry = PendingStmt::Identity { local : handler.local, value : Ref::CaughtException };
            placed.push(Placed { stmt : entry, insn, line : lines[insn] });
            placed.push(Placed { stmt : PendingStmt::Goto { target : handler.label }, insn, line : lines[insn] });
        }

        // labels at the very end still need something to point to
        if !pending_labels.is_empty() {
            let end = StmtId(placed.len());
            for l in pending_labels.drain(..) {
                labels.insert(l, end);
            }
            placed.push(Placed { stmt : PendingStmt::Nop, insn : method.code.len(), line : None });
        }

        let stmts = placed.into_iter()
            .map(|p| self.finish(p, &labels))
            .collect::<LowerResult<Vec<_>>>()?;

        let lookup = |l : Label| labels.get(&l).copied().ok_or(ErrorKind::UndefinedLabel(l));
        let traps = method.try_catch.iter().map(|tc| {
            let handler = match handler_entries.get(&tc.handler) {
                Some(&h) => h,
                None => lookup(tc.handler)?,
            };
            Ok(Trap {
                exception : Type::class(tc.catch_type.as_deref().unwrap_or("java.lang.Throwable")),
                begin : lookup(tc.start)?,
                end : lookup(tc.end)?,
                handler,
            })
        }).collect::<LowerResult<Vec<_>>>()?;

        let edges = Body::control_edges(&stmts);
        Ok(Body {
            signature : method.signature(),
            locals : self.locals.into_ordered(&leading),
            stmts,
            traps,
            edges,
        })
    }
}
