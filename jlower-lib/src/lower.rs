use std::collections::BTreeMap;

use log::{debug, trace};
use rustc_hash::FxHashMap;

use crate::error::{ErrorKind, LowerResult, LoweringError};
use crate::frame::Frame;
use crate::handlers::InlineHandler;
use crate::ir::{Body, Condition, Invoke, Ref, Rvalue, SwitchTable};
use crate::jvmtypes::{Label, Operation};
use crate::locals::Locals;
use crate::method::{LoweringOptions, MethodInput};
use crate::stack::{Entry, Operand, OperandId, SlotId};

/// A statement under construction. Operand positions are slots; jump targets are still labels.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum PendingStmt {
    Nop,
    Identity     { local : SlotId, value : Ref<SlotId> },
    Assign       { lhs : SlotId, rhs : SlotId },
    Invoke       (Invoke<SlotId>),
    If           { condition : Condition<SlotId>, target : Label },
    Goto         { target : Label },
    Switch       { key : SlotId, table : SwitchTable, targets : Vec<Label>, default : Label },
    Return       (SlotId),
    ReturnVoid,
    Throw        (SlotId),
    EnterMonitor (SlotId),
    ExitMonitor  (SlotId),
}

// The stacks that have travelled along one control-flow edge.
#[derive(Clone, Debug, Default)]
struct Edge {
    /// scheduled but not yet followed
    pending : Option<Vec<Entry>>,
    history : Vec<Vec<Entry>>,
}

#[derive(Clone, Debug)]
struct Task {
    target : usize,
    stack : Vec<Entry>,
    edge : Option<(usize, usize)>,
}

pub(crate) struct LoweringContext<'m> {
    pub method : &'m MethodInput,
    pub locals : Locals,
    pub operands : Vec<Operand>,
    pub slots : Vec<Rvalue<SlotId>>,
    pub stack : Vec<Entry>,
    pub frames : Vec<Frame>,
    /// statements produced by each instruction, in emission order
    pub units : Vec<Vec<PendingStmt>>,
    labels : FxHashMap<Label, usize>,
    /// handler labels of the exception table, by first appearance
    pub handlers : Vec<Label>,
    pub inline_handlers : BTreeMap<usize, InlineHandler>,
    edges : FxHashMap<(usize, usize), Edge>,
    worklist : Vec<Task>,
    depth_at : Vec<Option<usize>>,
    /// instruction being lowered, for error reporting
    pub current : usize,
}

impl<'m> LoweringContext<'m> {
    pub fn new(method : &'m MethodInput) -> LowerResult<Self> {
        let n = method.code.len();
        let mut labels = FxHashMap::default();
        for (i, op) in method.code.iter().enumerate() {
            if let Operation::Label(l) = op {
                labels.entry(*l).or_insert(i);
            }
        }

        let mut handlers = Vec::new();
        for tc in &method.try_catch {
            for l in [ tc.start, tc.end, tc.handler ] {
                if !labels.contains_key(&l) {
                    return Err(ErrorKind::UndefinedLabel(l));
                }
            }
            if !handlers.contains(&tc.handler) {
                handlers.push(tc.handler);
            }
        }
        for l in method.code.iter().flat_map(Operation::jump_targets) {
            if !labels.contains_key(&l) {
                return Err(ErrorKind::UndefinedLabel(l));
            }
        }

        Ok(LoweringContext {
            method,
            locals : Locals::new(method.max_locals, &method.local_names),
            operands : Vec::new(),
            slots : Vec::new(),
            stack : Vec::new(),
            frames : vec![ Frame::default() ; n ],
            units : vec![ Vec::new() ; n ],
            labels,
            handlers,
            inline_handlers : BTreeMap::new(),
            edges : FxHashMap::default(),
            worklist : Vec::new(),
            depth_at : vec![ None ; n ],
            current : 0,
        })
    }

    pub fn label_index(&self, label : Label) -> LowerResult<usize> {
        self.labels.get(&label).copied().ok_or(ErrorKind::UndefinedLabel(label))
    }

    pub fn has_unit(&self, insn : usize) -> bool { !self.units[insn].is_empty() }

    pub fn set_unit(&mut self, insn : usize, stmt : PendingStmt) -> LowerResult<()> {
        let unit = &mut self.units[insn];
        if !unit.is_empty() {
            return Err(ErrorKind::UnitCollision { insn });
        }
        unit.push(stmt);
        Ok(())
    }

    pub fn merge_units(&mut self, insn : usize, stmt : PendingStmt) { self.units[insn].push(stmt) }

    /// Visits every reachable instruction, once per distinct incoming stack.
    pub fn run(&mut self) -> LowerResult<()> {
        if self.method.code.is_empty() {
            return Ok(());
        }
        self.split_exception_handlers()?;

        // handlers are seeded first so that the entry block is taken from the worklist first
        for label in self.handlers.clone() {
            let target = self.label_index(label)?;
            let stack = match self.inline_handlers.get(&target) {
                Some(h) => vec![ Entry::Operand(h.operand) ],
                None => vec![],
            };
            self.worklist.push(Task { target, stack, edge : None });
        }
        self.worklist.push(Task { target : 0, stack : vec![], edge : None });

        while let Some(task) = self.worklist.pop() {
            self.follow(task)?;
        }
        Ok(())
    }

    fn follow(&mut self, task : Task) -> LowerResult<()> {
        if let Some(edge) = task.edge.and_then(|key| self.edges.get_mut(&key)) {
            edge.pending = None;
        }
        trace!("following instruction {} with stack depth {}", task.target, task.stack.len());
        self.stack = task.stack;

        let method = self.method;
        let mut insn = task.target;
        while insn < method.code.len() {
            self.current = insn;
            self.check_depth(insn)?;

            let op = &method.code[insn];
            let before = self.stack.len() as i32;
            self.lower_insn(insn, op)?;
            if let Some(expected) = op.stack_effect() {
                let actual = self.stack.len() as i32 - before;
                if actual != expected {
                    return Err(ErrorKind::StackEffect { insn, expected, actual });
                }
            }

            match op {
                Operation::Yield { .. } | Operation::Throw => return Ok(()),
                Operation::Branch { target, .. } => {
                    let mut targets = Vec::with_capacity(2);
                    if insn + 1 < method.code.len() {
                        targets.push(insn + 1);
                    }
                    targets.push(self.label_index(*target)?);
                    return self.add_edges(insn, &targets);
                },
                Operation::Jump { target } => {
                    let t = self.label_index(*target)?;
                    return self.add_edges(insn, &[ t ]);
                },
                Operation::Switch(params) => {
                    let mut targets = vec![ self.label_index(params.default())? ];
                    for l in params.targets() {
                        targets.push(self.label_index(l)?);
                    }
                    return self.add_edges(insn, &targets);
                },
                _ => insn += 1,
            }
        }
        Ok(())
    }

    fn check_depth(&mut self, insn : usize) -> LowerResult<()> {
        let depth = self.stack.len();
        match self.depth_at[insn] {
            None => self.depth_at[insn] = Some(depth),
            Some(d) if d != depth => return Err(ErrorKind::InconsistentMerge { insn }),
            Some(_) => {},
        }
        Ok(())
    }

    // Schedules each target with the current stack unless that exact stack already went that way.
    fn add_edges(&mut self, from : usize, targets : &[usize]) -> LowerResult<()> {
        let snapshot = self.stack.clone();
        for &to in targets {
            let key = (from, to);
            let schedule = match self.edges.get(&key) {
                None => true,
                Some(Edge { pending : Some(pending), .. }) => {
                    if !self.stacks_equivalent(pending, &snapshot) {
                        return Err(ErrorKind::InconsistentMerge { insn : to });
                    }
                    false
                },
                Some(Edge { history, .. }) => !history.iter().any(|h| *h == snapshot),
            };
            if schedule {
                let edge = self.edges.entry(key).or_default();
                edge.pending = Some(snapshot.clone());
                edge.history.push(snapshot.clone());
                trace!("scheduling edge {} -> {}", from, to);
                self.worklist.push(Task { target : to, stack : snapshot.clone(), edge : Some(key) });
            }
        }
        Ok(())
    }
}

/// Lowers one method with default options.
pub fn lower_method(method : &MethodInput) -> Result<Body, LoweringError> {
    lower_method_with(method, &LoweringOptions::default())
}

/// Lowers one method's stack code into a register-based [`Body`].
///
/// Lowering is deterministic, and independent of any other method, so callers may lower many
/// methods in parallel.
pub fn lower_method_with(method : &MethodInput, options : &LoweringOptions) -> Result<Body, LoweringError> {
    let wrap = |kind| LoweringError { method : method.signature(), kind };
    debug!("lowering {} ({} instructions)", method.signature(), method.code.len());

    let mut ctx = LoweringContext::new(method).map_err(wrap)?;
    ctx.run().map_err(wrap)?;
    let body = ctx.assemble(options).map_err(wrap)?;

    debug!("lowered {}: {} statements, {} locals, {} traps",
        body.signature, body.stmts.len(), body.locals.len(), body.traps.len());
    Ok(body)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::{BinaryOp, Constant, Expr, Immediate, InstanceKind, StmtId, StmtKind, Value};
    use crate::jvmtypes::*;
    use crate::jvmtypes::Operation as Op;
    use crate::method::{sample, TryCatchBlock};
    use crate::types::{FieldRef, MethodRef, Type};
    use crate::GeneralResult;
    use quickcheck::{quickcheck, Arbitrary, Gen};

    fn local(body : &Body, name : &str) -> GeneralResult<Immediate> {
        body.locals.iter()
            .find(|l| l.name == name)
            .map(|l| Immediate::Local(l.id))
            .ok_or_else(|| format!("no local named {}", name).into())
    }

    fn int(i : i32) -> Immediate { Immediate::Constant(Constant::Int(i)) }

    fn assign(lhs : &Immediate, rhs : Value) -> StmtKind {
        StmtKind::Assign { lhs : Rvalue::Immediate(lhs.clone()), rhs }
    }

    fn kinds(body : &Body) -> Vec<StmtKind> { body.stmts.iter().map(|s| s.kind.clone()).collect() }

    // int f(int a, int b) { return a + b; }
    #[test]
    fn test_straight_line_add() -> GeneralResult<()> {
        let m = sample(vec![ Type::Int, Type::Int ], Type::Int, 2, vec![
            Op::LoadLocal { kind : JType::Int, index : 0 },
            Op::LoadLocal { kind : JType::Int, index : 1 },
            Op::Arithmetic { kind : JType::Int, op : ArithmeticOperation::Add },
            Op::Yield { kind : JType::Int },
        ]);
        let body = lower_method(&m)?;
        let (a, b) = (local(&body, "l0")?, local(&body, "l1")?);
        let sum = Rvalue::Expr(Expr::Binary { op : BinaryOp::Add, lhs : a.clone(), rhs : b.clone() });

        let s = body.locals.iter().find(|l| l.name.starts_with("$stack")).ok_or("no stack local")?;
        let s = Immediate::Local(s.id);
        let want = vec![
            StmtKind::Identity { local : lhs_local(&a)?, value : Ref::Parameter { index : 0, ty : Type::Int } },
            StmtKind::Identity { local : lhs_local(&b)?, value : Ref::Parameter { index : 1, ty : Type::Int } },
            assign(&s, sum),
            StmtKind::Return(s),
        ];
        assert_eq!(want, kinds(&body));
        assert_eq!(3, body.locals.len());
        Ok(())
    }

    // return 1 + 2;
    #[test]
    fn test_constant_add() -> GeneralResult<()> {
        let m = sample(vec![], Type::Int, 0, vec![
            Op::Constant(Constant::Int(1)),
            Op::Constant(Constant::Int(2)),
            Op::Arithmetic { kind : JType::Int, op : ArithmeticOperation::Add },
            Op::Yield { kind : JType::Int },
        ]);
        let body = lower_method(&m)?;
        assert_eq!(1, body.locals.len());
        assert!(body.locals[0].name.starts_with("$stack"));
        let s = Immediate::Local(body.locals[0].id);
        let sum = Rvalue::Expr(Expr::Binary { op : BinaryOp::Add, lhs : int(1), rhs : int(2) });
        assert_eq!(vec![ assign(&s, sum), StmtKind::Return(s) ], kinds(&body));
        Ok(())
    }

    // return x + (o.notify(), x);  with x a static field the call may change
    #[test]
    fn test_field_read_not_reused_across_call() -> GeneralResult<()> {
        let x = FieldRef { class : "Sample".to_owned(), name : "x".to_owned(), ty : Type::Int };
        let get = || Op::VarAction { op : VarOp::Get, kind : VarKind::Static, field : x.clone() };
        let m = sample(vec![], Type::Int, 1, vec![
            get(),
            Op::LoadLocal { kind : JType::Object, index : 0 },
            Op::Invocation { kind : InvokeKind::Virtual, method : MethodRef::new("java/lang/Object", "notify", "()V")? },
            get(),
            Op::Arithmetic { kind : JType::Int, op : ArithmeticOperation::Add },
            Op::Yield { kind : JType::Int },
        ]);
        let body = lower_method(&m)?;
        let ks = kinds(&body);
        let reads : Vec<usize> = ks.iter().enumerate().filter_map(|(i, k)| match k {
            StmtKind::Assign { rhs : Rvalue::Ref(Ref::StaticField(f)), .. } if *f == x => Some(i),
            _ => None,
        }).collect();
        let call = ks.iter().position(|k| matches!(k, StmtKind::Invoke(_))).ok_or("no call statement")?;
        assert_eq!(2, reads.len(), "{}", body);
        assert!(reads[0] < call && call < reads[1], "{}", body);

        // the sum adds the two frozen reads, not the field itself
        let frozen : Vec<Immediate> = reads.iter().map(|&i| match &ks[i] {
            StmtKind::Assign { lhs : Rvalue::Immediate(l), .. } => Ok(l.clone()),
            other => Err(format!("unexpected {:?}", other)),
        }).collect::<Result<_, _>>()?;
        let sum = Rvalue::Expr(Expr::Binary { op : BinaryOp::Add, lhs : frozen[0].clone(), rhs : frozen[1].clone() });
        assert!(ks.iter().any(|k| matches!(k, StmtKind::Assign { rhs, .. } if *rhs == sum)), "{}", body);
        Ok(())
    }

    fn lhs_local(i : &Immediate) -> GeneralResult<crate::ir::LocalId> {
        match i {
            Immediate::Local(l) => Ok(*l),
            Immediate::Constant(_) => Err("not a local".into()),
        }
    }

    // x = cond ? 1 : 2; return x;  (lowered from stack code that merges two constants)
    #[test]
    fn test_diamond_merge() -> GeneralResult<()> {
        let (other, join) = (Label(1), Label(2));
        let m = sample(vec![ Type::Int ], Type::Int, 1, vec![
            Op::LoadLocal { kind : JType::Int, index : 0 },
            Op::Branch { kind : JType::Int, ops : OperandCount::_1, way : Comparison::Eq, target : other },
            Op::Constant(Constant::Int(1)),
            Op::Jump { target : join },
            Op::Label(other),
            Op::Constant(Constant::Int(2)),
            Op::Label(join),
            Op::Yield { kind : JType::Int },
        ]);
        let body = lower_method(&m)?;

        // the two constants are assigned to the same register, which is returned
        let mut assigned = Vec::new();
        let mut returned = None;
        for s in &body.stmts {
            match &s.kind {
                StmtKind::Assign { lhs : Rvalue::Immediate(l), rhs : Rvalue::Immediate(c) } => assigned.push((l.clone(), c.clone())),
                StmtKind::Return(v) => returned = Some(v.clone()),
                _ => {},
            }
        }
        assert_eq!(2, assigned.len());
        assert_eq!(assigned[0].0, assigned[1].0);
        assert!(assigned.iter().any(|(_, c)| *c == int(1)));
        assert!(assigned.iter().any(|(_, c)| *c == int(2)));
        assert_eq!(Some(assigned[0].0.clone()), returned);

        assert!(body.stmts.iter().any(|s| matches!(s.kind, StmtKind::If { .. })));
        assert!(body.stmts.iter().any(|s| matches!(s.kind, StmtKind::Goto { .. })));
        Ok(())
    }

    // try { a(); } catch (Throwable t) { b(); }  where the handler is also reached by a goto
    #[test]
    fn test_inline_exception_handler() -> GeneralResult<()> {
        let (start, end, handler) = (Label(1), Label(2), Label(3));
        let call = |name : &str| Op::Invocation {
            kind : InvokeKind::Static,
            method : MethodRef::new("Sample", name, "()V").unwrap_or_else(|_| unreachable!()),
        };
        let mut m = sample(vec![], Type::Void, 1, vec![
            Op::Label(start),
            call("a"),
            Op::Label(end),
            Op::Constant(Constant::Null),
            Op::Jump { target : handler },
            Op::Label(handler),
            Op::StoreLocal { kind : JType::Object, index : 0 },
            call("b"),
            Op::Yield { kind : JType::Void },
        ]);
        m.try_catch.push(TryCatchBlock { start, end, handler, catch_type : None });

        let body = lower_method(&m)?;
        let text = body.to_string();
        assert_eq!(1, body.traps.len());
        let trap = &body.traps[0];
        assert_eq!(Type::class("java.lang.Throwable"), trap.exception);

        // the trap lands on a dedicated caught-exception statement that jumps to the shared code
        let entry = body.stmt(trap.handler).ok_or("no handler statement")?;
        assert!(matches!(entry.kind, StmtKind::Identity { value : Ref::CaughtException, .. }), "{}", text);
        let next = body.stmt(StmtId(trap.handler.0 + 1)).ok_or("no goto")?;
        let shared = match next.kind {
            StmtKind::Goto { target } => target,
            _ => return Err(format!("expected goto after handler entry:\n{}", text).into()),
        };
        assert!(shared.0 < trap.handler.0);

        // both arrivals store into the same register before the shared code runs
        let exc = match &entry.kind { StmtKind::Identity { local, .. } => *local, _ => unreachable!() };
        let null_copy = assign(&Immediate::Local(exc), Rvalue::from(Constant::Null));
        assert!(body.stmts.iter().any(|s| s.kind == null_copy), "{}", text);
        Ok(())
    }

    // void f(Object o) { o.hashCode(); }  with the result discarded by `pop`
    #[test]
    fn test_discarded_call_is_kept() -> GeneralResult<()> {
        let mut m = sample(vec![], Type::Void, 1, vec![
            Op::LoadLocal { kind : JType::Object, index : 0 },
            Op::Invocation { kind : InvokeKind::Virtual, method : MethodRef::new("java/lang/Object", "hashCode", "()I")? },
            Op::StackOp { size : OperandCount::_1, op : StackOperation::Pop },
            Op::Yield { kind : JType::Void },
        ]);
        m.is_static = false;
        m.class = "java.lang.Object".to_owned();
        let body = lower_method(&m)?;
        let calls = body.stmts.iter().filter(|s| match &s.kind {
            StmtKind::Assign { rhs : Rvalue::Expr(Expr::Invoke(Invoke::Instance { kind : InstanceKind::Virtual, .. })), .. } => true,
            _ => false,
        }).count();
        assert_eq!(1, calls);
        assert!(matches!(body.stmts[0].kind, StmtKind::Identity { value : Ref::This(_), .. }));
        assert_eq!(Some(&StmtKind::ReturnVoid), body.stmts.last().map(|s| &s.kind));
        Ok(())
    }

    // i++ while the old value of i is still on the stack
    #[test]
    fn test_increment_freezes_pending_read() -> GeneralResult<()> {
        let m = sample(vec![ Type::Int ], Type::Int, 1, vec![
            Op::LoadLocal { kind : JType::Int, index : 0 },
            Op::Increment { index : 0, value : 1 },
            Op::Yield { kind : JType::Int },
        ]);
        let body = lower_method(&m)?;
        let i = local(&body, "l0")?;
        let ks = kinds(&body);
        assert_eq!(4, ks.len());
        let saved = match &ks[1] {
            StmtKind::Assign { lhs : Rvalue::Immediate(s), rhs } if *rhs == Rvalue::Immediate(i.clone()) => s.clone(),
            other => return Err(format!("expected a copy of l0, got {:?}", other).into()),
        };
        assert_eq!(assign(&i, Rvalue::Expr(Expr::Binary { op : BinaryOp::Add, lhs : i.clone(), rhs : int(1) })), ks[2]);
        assert_eq!(StmtKind::Return(saved), ks[3]);
        Ok(())
    }

    #[test]
    fn test_underflow_error() {
        let m = sample(vec![], Type::Void, 0, vec![
            Op::StackOp { size : OperandCount::_1, op : StackOperation::Pop },
            Op::Yield { kind : JType::Void },
        ]);
        let err = lower_method(&m).map(|_| ()).unwrap_err();
        assert_eq!(ErrorKind::StackUnderflow { insn : 0 }, err.kind);
        assert_eq!("<Sample: void run()>", err.method);
    }

    #[test]
    fn test_unsupported_error() {
        let m = sample(vec![], Type::Void, 0, vec![
            Op::Unhandled { opcode : 0xa8, mnemonic : "jsr" },
            Op::Yield { kind : JType::Void },
        ]);
        let err = lower_method(&m).map(|_| ()).unwrap_err();
        assert_eq!(ErrorKind::Unsupported { insn : 0, opcode : 0xa8, mnemonic : "jsr" }, err.kind);
    }

    #[test]
    fn test_malformed_wide_error() {
        let m = sample(vec![], Type::Long, 0, vec![
            Op::Constant(Constant::Int(1)),
            Op::Constant(Constant::Int(2)),
            Op::Yield { kind : JType::Long },
        ]);
        let err = lower_method(&m).map(|_| ()).unwrap_err();
        assert_eq!(ErrorKind::MalformedWidePair { insn : 2 }, err.kind);
    }

    // two paths reach the join with stacks of different depth
    #[test]
    fn test_inconsistent_merge_error() {
        let join = Label(1);
        let m = sample(vec![ Type::Int ], Type::Void, 1, vec![
            Op::LoadLocal { kind : JType::Int, index : 0 },
            Op::Branch { kind : JType::Int, ops : OperandCount::_1, way : Comparison::Eq, target : join },
            Op::Constant(Constant::Int(1)),
            Op::Label(join),
            Op::Yield { kind : JType::Void },
        ]);
        let err = lower_method(&m).map(|_| ()).unwrap_err();
        assert_eq!(ErrorKind::InconsistentMerge { insn : 3 }, err.kind);
    }

    #[test]
    fn test_undefined_label_error() {
        let m = sample(vec![], Type::Void, 0, vec![ Op::Jump { target : Label(9) } ]);
        let err = lower_method(&m).map(|_| ()).unwrap_err();
        assert_eq!(ErrorKind::UndefinedLabel(Label(9)), err.kind);
    }

    #[test]
    fn test_unit_collision() -> GeneralResult<()> {
        let m = sample(vec![], Type::Void, 0, vec![ Op::Noop, Op::Yield { kind : JType::Void } ]);
        let mut ctx = LoweringContext::new(&m)?;
        ctx.set_unit(0, PendingStmt::Nop)?;
        assert_eq!(Err(ErrorKind::UnitCollision { insn : 0 }), ctx.set_unit(0, PendingStmt::Nop));
        ctx.merge_units(0, PendingStmt::Nop);
        assert_eq!(2, ctx.units[0].len());
        Ok(())
    }

    #[test]
    fn test_loop_terminates() -> GeneralResult<()> {
        let top = Label(1);
        // while (true) i += 1;
        let m = sample(vec![], Type::Void, 1, vec![
            Op::Constant(Constant::Int(0)),
            Op::StoreLocal { kind : JType::Int, index : 0 },
            Op::Label(top),
            Op::Increment { index : 0, value : 1 },
            Op::Jump { target : top },
        ]);
        let body = lower_method(&m)?;
        assert_eq!(3, body.stmts.len());
        Ok(())
    }

    #[test]
    fn test_empty_method() -> GeneralResult<()> {
        let m = sample(vec![ Type::Long ], Type::Void, 2, vec![]);
        let body = lower_method(&m)?;
        assert_eq!(1, body.stmts.len());
        assert_eq!(1, body.locals.len());
        Ok(())
    }

    #[test]
    fn test_lowering_is_send() {
        fn is_send<T : Send>() {}
        is_send::<MethodInput>();
        is_send::<Body>();
        is_send::<LoweringError>();
    }

    // Straight-line integer code that never underflows; used to check determinism and balance.
    #[derive(Clone, Debug)]
    enum Step {
        Push(i32),
        Load(u16),
        Store(u16),
        Add,
        Dup,
        Pop,
        Swap,
        Call,
    }

    impl Arbitrary for Step {
        fn arbitrary<G : Gen>(g : &mut G) -> Self {
            match g.next_u32() % 8 {
                0 => Step::Push(i32::arbitrary(g)),
                1 => Step::Load((g.next_u32() % 3) as u16),
                2 => Step::Store((g.next_u32() % 3) as u16),
                3 => Step::Add,
                4 => Step::Dup,
                5 => Step::Pop,
                6 => Step::Swap,
                _ => Step::Call,
            }
        }
    }

    fn program(steps : &[Step]) -> MethodInput {
        let k = JType::Int;
        let mut code = Vec::new();
        let mut depth = 0usize;
        for s in steps {
            let (op, needs, delta) : (Operation, usize, isize) = match *s {
                Step::Push(i)  => (Op::Constant(Constant::Int(i)), 0, 1),
                Step::Load(i)  => (Op::LoadLocal { kind : k, index : i }, 0, 1),
                Step::Store(i) => (Op::StoreLocal { kind : k, index : i }, 1, -1),
                Step::Add      => (Op::Arithmetic { kind : k, op : ArithmeticOperation::Add }, 2, -1),
                Step::Dup      => (Op::StackOp { size : OperandCount::_1, op : StackOperation::Dup }, 1, 1),
                Step::Pop      => (Op::StackOp { size : OperandCount::_1, op : StackOperation::Pop }, 1, -1),
                Step::Swap     => (Op::StackOp { size : OperandCount::_1, op : StackOperation::Swap }, 2, 0),
                Step::Call     => (Op::Invocation {
                    kind : InvokeKind::Static,
                    method : MethodRef { class : "Sample".to_owned(), name : "g".to_owned(), params : vec![ Type::Int ], ret : Type::Int },
                }, 1, 0),
            };
            if depth >= needs {
                code.push(op);
                depth = (depth as isize + delta) as usize;
            }
        }
        while depth > 1 {
            code.push(Op::StackOp { size : OperandCount::_1, op : StackOperation::Pop });
            depth -= 1;
        }
        if depth == 0 {
            code.push(Op::Constant(Constant::Int(0)));
        }
        code.push(Op::Yield { kind : k });
        sample(vec![], Type::Int, 3, code)
    }

    quickcheck! {
        fn prop_deterministic(steps : Vec<Step>) -> bool {
            let m = program(&steps);
            match (lower_method(&m), lower_method(&m)) {
                (Ok(a), Ok(b)) => a == b && a.to_string() == b.to_string(),
                _ => false,
            }
        }

        fn prop_single_return(steps : Vec<Step>) -> bool {
            let m = program(&steps);
            match lower_method(&m) {
                Ok(body) => {
                    let returns = body.stmts.iter().filter(|s| matches!(s.kind, StmtKind::Return(_))).count();
                    returns == 1 && matches!(body.stmts.last().map(|s| &s.kind), Some(StmtKind::Return(_)))
                },
                Err(_) => false,
            }
        }
    }
}
