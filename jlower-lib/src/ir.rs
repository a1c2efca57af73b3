//! The register-based intermediate representation produced by lowering.
//!
//! Expression trees are generic over the type of their operand positions. During lowering every
//! position is an indirect slot so that a later spill can rebind it; the finished [`Body`] uses
//! [`Immediate`] operands only.

use std::collections::BTreeMap;
use std::fmt;

use crate::jvmtypes::Comparison;
use crate::types::{CallSite, FieldRef, MethodHandle, MethodRef, Type};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(pub u32);

/// A virtual register.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Local {
    pub id : LocalId,
    pub name : String,
    pub ty : Type,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtId(pub usize);

#[derive(Clone, Debug)]
pub enum Constant {
    Null,
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Class(Type),
    MethodType { params : Vec<Type>, ret : Type },
    MethodHandle(MethodHandle),
}

impl Constant {
    pub fn is_wide(&self) -> bool { matches!(self, Constant::Long(_) | Constant::Double(_)) }
}

// Floating-point literals compare by bit pattern, so that two loads of the same NaN are the same
// constant.
impl PartialEq for Constant {
    fn eq(&self, other : &Self) -> bool {
        use Constant::*;
        match (self, other) {
            (Null, Null) => true,
            (Int(a), Int(b)) => a == b,
            (Long(a), Long(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Double(a), Double(b)) => a.to_bits() == b.to_bits(),
            (String(a), String(b)) => a == b,
            (Class(a), Class(b)) => a == b,
            (MethodType { params : pa, ret : ra }, MethodType { params : pb, ret : rb }) =>
                pa == pb && ra == rb,
            (MethodHandle(a), MethodHandle(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Constant {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Immediate {
    Local(LocalId),
    Constant(Constant),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    Ushr,
    And,
    Or,
    Xor,
    Cmp,
    Cmpl,
    Cmpg,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Condition<U> {
    pub op : Comparison,
    pub lhs : U,
    pub rhs : U,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InstanceKind {
    Virtual,
    Special,
    Interface,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Invoke<U> {
    Static   { method : MethodRef, args : Vec<U> },
    Instance { kind : InstanceKind, base : U, method : MethodRef, args : Vec<U> },
    Dynamic  { site : CallSite, args : Vec<U> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr<U> {
    Binary        { op : BinaryOp, lhs : U, rhs : U },
    Negate        (U),
    Length        (U),
    Cast          { value : U, ty : Type },
    InstanceOf    { value : U, ty : Type },
    New           (Type),
    NewArray      { element : Type, size : U },
    NewMultiArray { ty : Type, sizes : Vec<U> },
    Invoke        (Invoke<U>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ref<U> {
    StaticField   (FieldRef),
    InstanceField { base : U, field : FieldRef },
    Array         { base : U, index : U },
    This          (Type),
    Parameter     { index : usize, ty : Type },
    CaughtException,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rvalue<U> {
    Immediate(Immediate),
    Expr(Expr<U>),
    Ref(Ref<U>),
}

pub type Value = Rvalue<Immediate>;

impl<U> Condition<U> {
    pub fn try_map<V, E>(&self, f : &mut dyn FnMut(&U) -> Result<V, E>) -> Result<Condition<V>, E> {
        Ok(Condition { op : self.op, lhs : f(&self.lhs)?, rhs : f(&self.rhs)? })
    }
}

impl<U> Invoke<U> {
    pub fn args(&self) -> &[U] {
        match self {
            Invoke::Static { args, .. } | Invoke::Instance { args, .. } | Invoke::Dynamic { args, .. } => args,
        }
    }

    pub fn operands(&self) -> Vec<&U> {
        match self {
            Invoke::Instance { base, args, .. } => std::iter::once(base).chain(args).collect(),
            _ => self.args().iter().collect(),
        }
    }

    pub fn try_map<V, E>(&self, f : &mut dyn FnMut(&U) -> Result<V, E>) -> Result<Invoke<V>, E> {
        let mut map_args = |args : &[U]| args.iter().map(|a| f(a)).collect::<Result<Vec<_>, _>>();
        Ok(match self {
            Invoke::Static { method, args } =>
                Invoke::Static { method : method.clone(), args : map_args(args)? },
            Invoke::Dynamic { site, args } =>
                Invoke::Dynamic { site : site.clone(), args : map_args(args)? },
            Invoke::Instance { kind, base, method, args } => {
                let args = map_args(args)?;
                Invoke::Instance { kind : *kind, base : f(base)?, method : method.clone(), args }
            },
        })
    }
}

impl<U> Expr<U> {
    pub fn operands(&self) -> Vec<&U> {
        use Expr::*;
        match self {
            Binary { lhs, rhs, .. } => vec![ lhs, rhs ],
            Negate(v) | Length(v) | Cast { value : v, .. } | InstanceOf { value : v, .. } => vec![ v ],
            NewArray { size, .. } => vec![ size ],
            NewMultiArray { sizes, .. } => sizes.iter().collect(),
            Invoke(inv) => inv.operands(),
            New(_) => vec![],
        }
    }

    pub fn try_map<V, E>(&self, f : &mut dyn FnMut(&U) -> Result<V, E>) -> Result<Expr<V>, E> {
        use Expr::*;
        Ok(match self {
            Binary { op, lhs, rhs } => Binary { op : *op, lhs : f(lhs)?, rhs : f(rhs)? },
            Negate(v) => Negate(f(v)?),
            Length(v) => Length(f(v)?),
            Cast { value, ty } => Cast { value : f(value)?, ty : ty.clone() },
            InstanceOf { value, ty } => InstanceOf { value : f(value)?, ty : ty.clone() },
            New(ty) => New(ty.clone()),
            NewArray { element, size } => NewArray { element : element.clone(), size : f(size)? },
            NewMultiArray { ty, sizes } => NewMultiArray {
                ty : ty.clone(),
                sizes : sizes.iter().map(|s| f(s)).collect::<Result<_, _>>()?,
            },
            Invoke(inv) => Invoke(inv.try_map(f)?),
        })
    }
}

impl<U> Ref<U> {
    pub fn operands(&self) -> Vec<&U> {
        match self {
            Ref::InstanceField { base, .. } => vec![ base ],
            Ref::Array { base, index } => vec![ base, index ],
            _ => vec![],
        }
    }

    pub fn try_map<V, E>(&self, f : &mut dyn FnMut(&U) -> Result<V, E>) -> Result<Ref<V>, E> {
        use Ref::*;
        Ok(match self {
            StaticField(field) => StaticField(field.clone()),
            InstanceField { base, field } => InstanceField { base : f(base)?, field : field.clone() },
            Array { base, index } => Array { base : f(base)?, index : f(index)? },
            This(ty) => This(ty.clone()),
            Parameter { index, ty } => Parameter { index : *index, ty : ty.clone() },
            CaughtException => CaughtException,
        })
    }
}

impl<U> Rvalue<U> {
    pub fn operands(&self) -> Vec<&U> {
        match self {
            Rvalue::Immediate(_) => vec![],
            Rvalue::Expr(e) => e.operands(),
            Rvalue::Ref(r) => r.operands(),
        }
    }

    pub fn try_map<V, E>(&self, f : &mut dyn FnMut(&U) -> Result<V, E>) -> Result<Rvalue<V>, E> {
        Ok(match self {
            Rvalue::Immediate(i) => Rvalue::Immediate(i.clone()),
            Rvalue::Expr(e) => Rvalue::Expr(e.try_map(f)?),
            Rvalue::Ref(r) => Rvalue::Ref(r.try_map(f)?),
        })
    }

    pub fn as_local(&self) -> Option<LocalId> {
        match self {
            Rvalue::Immediate(Immediate::Local(l)) => Some(*l),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool { matches!(self, Rvalue::Immediate(Immediate::Constant(_))) }
}

impl<U> From<LocalId> for Rvalue<U> {
    fn from(l : LocalId) -> Self { Rvalue::Immediate(Immediate::Local(l)) }
}

impl<U> From<Constant> for Rvalue<U> {
    fn from(c : Constant) -> Self { Rvalue::Immediate(Immediate::Constant(c)) }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SwitchTable {
    Lookup(Vec<i32>),
    Table { low : i32, high : i32 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StmtKind {
    Nop,
    Identity     { local : LocalId, value : Ref<Immediate> },
    Assign       { lhs : Value, rhs : Value },
    Invoke       (Invoke<Immediate>),
    If           { condition : Condition<Immediate>, target : StmtId },
    Goto         { target : StmtId },
    Switch       { key : Immediate, table : SwitchTable, targets : Vec<StmtId>, default : StmtId },
    Return       (Immediate),
    ReturnVoid,
    Throw        (Immediate),
    EnterMonitor (Immediate),
    ExitMonitor  (Immediate),
}

impl StmtKind {
    /// Explicit jump targets, in operand order, without duplicates.
    pub fn branch_targets(&self) -> Vec<StmtId> {
        let mut out = match self {
            StmtKind::If { target, .. } | StmtKind::Goto { target } => vec![ *target ],
            StmtKind::Switch { targets, default, .. } => targets.iter().chain(Some(default)).copied().collect(),
            _ => vec![],
        };
        let mut seen = std::collections::BTreeSet::new();
        out.retain(|t| seen.insert(*t));
        out
    }

    pub fn falls_through(&self) -> bool {
        !matches!(self,
            StmtKind::Goto { .. } | StmtKind::Switch { .. }
                | StmtKind::Return(_) | StmtKind::ReturnVoid | StmtKind::Throw(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stmt {
    pub kind : StmtKind,
    pub line : Option<u16>,
}

/// A protected region: statements in `begin..end` are covered, and control reaches `handler`
/// when one of them raises an instance of `exception`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trap {
    pub exception : Type,
    pub begin : StmtId,
    pub end : StmtId,
    pub handler : StmtId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Body {
    pub signature : String,
    pub locals : Vec<Local>,
    pub stmts : Vec<Stmt>,
    pub traps : Vec<Trap>,
    /// Normal (non-exceptional) control flow, as (predecessor, successor) pairs
    pub edges : Vec<(StmtId, StmtId)>,
}

impl Body {
    pub fn local(&self, id : LocalId) -> Option<&Local> { self.locals.iter().find(|l| l.id == id) }

    pub fn stmt(&self, id : StmtId) -> Option<&Stmt> { self.stmts.get(id.0) }

    pub fn successors(&self, id : StmtId) -> impl Iterator<Item=StmtId> + '_ {
        self.edges.iter().filter(move |(from, _)| *from == id).map(|&(_, to)| to)
    }

    pub fn predecessors(&self, id : StmtId) -> impl Iterator<Item=StmtId> + '_ {
        self.edges.iter().filter(move |(_, to)| *to == id).map(|&(from, _)| from)
    }

    pub(crate) fn control_edges(stmts : &[Stmt]) -> Vec<(StmtId, StmtId)> {
        let mut edges = Vec::new();
        for (i, s) in stmts.iter().enumerate() {
            let here = StmtId(i);
            if s.kind.falls_through() && i + 1 < stmts.len() {
                edges.push((here, StmtId(i + 1)));
            }
            for t in s.kind.branch_targets() {
                if !edges.contains(&(here, t)) {
                    edges.push((here, t));
                }
            }
        }
        edges
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f : &mut fmt::Formatter) -> fmt::Result {
        use BinaryOp::*;
        let s = match self {
            Add  => "+",
            Sub  => "-",
            Mul  => "*",
            Div  => "/",
            Rem  => "%",
            Shl  => "<<",
            Shr  => ">>",
            Ushr => ">>>",
            And  => "&",
            Or   => "|",
            Xor  => "^",
            Cmp  => "cmp",
            Cmpl => "cmpl",
            Cmpg => "cmpg",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f : &mut fmt::Formatter) -> fmt::Result {
        use Comparison::*;
        let s = match self {
            Eq => "==",
            Ne => "!=",
            Lt => "<",
            Ge => ">=",
            Gt => ">",
            Le => "<=",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f : &mut fmt::Formatter) -> fmt::Result {
        use Constant::*;
        match self {
            Null      => write!(f, "null"),
            Int(v)    => write!(f, "{}", v),
            Long(v)   => write!(f, "{}L", v),
            Float(v)  => write!(f, "{:?}F", v),
            Double(v) => write!(f, "{:?}", v),
            String(s) => write!(f, "{:?}", s),
            Class(t)  => write!(f, "class \"{}\"", t),
            MethodHandle(h) => write!(f, "{}", h),
            MethodType { params, ret } => {
                let params : Vec<_> = params.iter().map(ToString::to_string).collect();
                write!(f, "methodtype: {} __METHODTYPE__({})", ret, params.join(","))
            },
        }
    }
}

// Renders IR pieces against a body, which owns register names and statement labels.
struct Printer<'a> {
    body : &'a Body,
    labels : BTreeMap<StmtId, usize>,
}

impl<'a> Printer<'a> {
    fn new(body : &'a Body) -> Self {
        let mut targets : Vec<StmtId> = body.stmts.iter().flat_map(|s| s.kind.branch_targets()).collect();
        for t in &body.traps {
            targets.extend([ t.begin, t.end, t.handler ]);
        }
        targets.sort();
        targets.dedup();
        let labels = targets.into_iter().enumerate().map(|(i, t)| (t, i + 1)).collect();
        Printer { body, labels }
    }

    fn label(&self, id : StmtId) -> String {
        match self.labels.get(&id) {
            Some(n) => format!("label{}", n),
            None => format!("{:?}", id),
        }
    }

    fn local(&self, id : LocalId) -> &str {
        self.body.local(id).map_or("<unbound>", |l| l.name.as_str())
    }

    fn imm(&self, i : &Immediate) -> String {
        match i {
            Immediate::Local(l) => self.local(*l).to_owned(),
            Immediate::Constant(c) => c.to_string(),
        }
    }

    fn list(&self, items : &[Immediate]) -> String {
        items.iter().map(|i| self.imm(i)).collect::<Vec<_>>().join(", ")
    }

    fn invoke(&self, inv : &Invoke<Immediate>) -> String {
        match inv {
            Invoke::Static { method, args } =>
                format!("staticinvoke {}({})", method, self.list(args)),
            Invoke::Dynamic { site, args } =>
                format!("dynamicinvoke {}({})", site, self.list(args)),
            Invoke::Instance { kind, base, method, args } => {
                let kind = match kind {
                    InstanceKind::Virtual   => "virtualinvoke",
                    InstanceKind::Special   => "specialinvoke",
                    InstanceKind::Interface => "interfaceinvoke",
                };
                format!("{} {}.{}({})", kind, self.imm(base), method, self.list(args))
            },
        }
    }

    fn expr(&self, e : &Expr<Immediate>) -> String {
        use Expr::*;
        match e {
            Binary { op, lhs, rhs }   => format!("{} {} {}", self.imm(lhs), op, self.imm(rhs)),
            Negate(v)                 => format!("neg {}", self.imm(v)),
            Length(v)                 => format!("lengthof {}", self.imm(v)),
            Cast { value, ty }        => format!("({}) {}", ty, self.imm(value)),
            InstanceOf { value, ty }  => format!("{} instanceof {}", self.imm(value), ty),
            New(ty)                   => format!("new {}", ty),
            NewArray { element, size } => format!("newarray ({})[{}]", element, self.imm(size)),
            NewMultiArray { ty, sizes } => {
                let dims : String = sizes.iter().map(|s| format!("[{}]", self.imm(s))).collect();
                format!("newmultiarray ({}){}", ty, dims)
            },
            Invoke(inv) => self.invoke(inv),
        }
    }

    fn reference(&self, r : &Ref<Immediate>) -> String {
        use Ref::*;
        match r {
            StaticField(field)            => field.to_string(),
            InstanceField { base, field } => format!("{}.{}", self.imm(base), field),
            Array { base, index }         => format!("{}[{}]", self.imm(base), self.imm(index)),
            This(ty)                      => format!("@this: {}", ty),
            Parameter { index, ty }       => format!("@parameter{}: {}", index, ty),
            CaughtException               => "@caughtexception".to_owned(),
        }
    }

    fn value(&self, v : &Value) -> String {
        match v {
            Rvalue::Immediate(i) => self.imm(i),
            Rvalue::Expr(e) => self.expr(e),
            Rvalue::Ref(r) => self.reference(r),
        }
    }

    fn stmt(&self, s : &StmtKind) -> String {
        use StmtKind::*;
        match s {
            Nop                      => "nop".to_owned(),
            Identity { local, value } => format!("{} := {}", self.local(*local), self.reference(value)),
            Assign { lhs, rhs }      => format!("{} = {}", self.value(lhs), self.value(rhs)),
            Invoke(inv)              => self.invoke(inv),
            Goto { target }          => format!("goto {}", self.label(*target)),
            Return(v)                => format!("return {}", self.imm(v)),
            ReturnVoid               => "return".to_owned(),
            Throw(v)                 => format!("throw {}", self.imm(v)),
            EnterMonitor(v)          => format!("entermonitor {}", self.imm(v)),
            ExitMonitor(v)           => format!("exitmonitor {}", self.imm(v)),
            If { condition, target } => format!(
                "if {} {} {} goto {}",
                self.imm(&condition.lhs), condition.op, self.imm(&condition.rhs), self.label(*target)
            ),
            Switch { key, table, targets, default } => {
                let cases : Vec<String> = match table {
                    SwitchTable::Lookup(keys) =>
                        keys.iter().zip(targets).map(|(k, t)| format!("case {}: goto {};", k, self.label(*t))).collect(),
                    SwitchTable::Table { low, high } =>
                        (*low..=*high).zip(targets).map(|(k, t)| format!("case {}: goto {};", k, self.label(*t))).collect(),
                };
                let name = match table { SwitchTable::Lookup(_) => "lookupswitch", SwitchTable::Table { .. } => "tableswitch" };
                format!("{}({}) {{ {} default: goto {}; }}", name, self.imm(key), cases.join(" "), self.label(*default))
            },
        }
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f : &mut fmt::Formatter) -> fmt::Result {
        let p = Printer::new(self);

        writeln!(f, "{} {{", self.signature)?;
        for l in &self.locals {
            writeln!(f, "    {} {};", l.ty, l.name)?;
        }
        if !self.locals.is_empty() {
            writeln!(f)?;
        }
        for (i, s) in self.stmts.iter().enumerate() {
            let id = StmtId(i);
            if p.labels.contains_key(&id) {
                writeln!(f, "  {}:", p.label(id))?;
            }
            match s.line {
                Some(line) => writeln!(f, "    {}; // line {}", p.stmt(&s.kind), line)?,
                None       => writeln!(f, "    {};", p.stmt(&s.kind))?,
            }
        }
        if !self.traps.is_empty() {
            writeln!(f)?;
        }
        for t in &self.traps {
            writeln!(
                f, "    catch {} from {} to {} with {};",
                t.exception, p.label(t.begin), p.label(t.end), p.label(t.handler)
            )?;
        }
        writeln!(f, "}}")
    }
}

#[cfg(test)]
fn sample_body() -> Body {
    let int = |i| Immediate::Constant(Constant::Int(i));
    let stmts = vec![
        StmtKind::Identity { local : LocalId(0), value : Ref::Parameter { index : 0, ty : Type::Int } },
        StmtKind::If {
            condition : Condition { op : Comparison::Ne, lhs : Immediate::Local(LocalId(0)), rhs : int(0) },
            target : StmtId(4),
        },
        StmtKind::Assign { lhs : LocalId(1).into(), rhs : Constant::Int(10).into() },
        StmtKind::Goto { target : StmtId(5) },
        StmtKind::Assign { lhs : LocalId(1).into(), rhs : Constant::Int(20).into() },
        StmtKind::Return(Immediate::Local(LocalId(1))),
    ];
    let stmts : Vec<Stmt> = stmts.into_iter().map(|kind| Stmt { kind, line : None }).collect();
    Body {
        signature : "<Sample: int choose(int)>".to_owned(),
        locals : vec![
            Local { id : LocalId(0), name : "l0".to_owned(), ty : Type::Int },
            Local { id : LocalId(1), name : "$stack1".to_owned(), ty : Type::Unknown },
        ],
        edges : Body::control_edges(&stmts),
        stmts,
        traps : vec![],
    }
}

#[test]
fn test_control_edges() {
    let body = sample_body();
    let e = |a, b| (StmtId(a), StmtId(b));
    assert_eq!(body.edges, vec![ e(0, 1), e(1, 2), e(1, 4), e(2, 3), e(3, 5), e(4, 5) ]);
    assert_eq!(body.predecessors(StmtId(5)).collect::<Vec<_>>(), vec![ StmtId(3), StmtId(4) ]);
    assert_eq!(body.successors(StmtId(1)).collect::<Vec<_>>(), vec![ StmtId(2), StmtId(4) ]);
}

#[test]
fn test_display_body() {
    let text = sample_body().to_string();
    let expected = "\
<Sample: int choose(int)> {
    int l0;
    unknown $stack1;

    l0 := @parameter0: int;
    if l0 != 0 goto label1;
    $stack1 = 10;
    goto label2;
  label1:
    $stack1 = 20;
  label2:
    return $stack1;
}
";
    assert_eq!(expected, text);
}

#[test]
fn test_table_switch_up_to_max_key() {
    let stmts = vec![
        StmtKind::Switch {
            key : Immediate::Local(LocalId(0)),
            table : SwitchTable::Table { low : i32::MAX - 1, high : i32::MAX },
            targets : vec![ StmtId(1), StmtId(2) ],
            default : StmtId(2),
        },
        StmtKind::ReturnVoid,
        StmtKind::ReturnVoid,
    ];
    let stmts : Vec<Stmt> = stmts.into_iter().map(|kind| Stmt { kind, line : None }).collect();
    let body = Body {
        signature : "<Sample: void pick(int)>".to_owned(),
        locals : vec![ Local { id : LocalId(0), name : "l0".to_owned(), ty : Type::Int } ],
        edges : Body::control_edges(&stmts),
        stmts,
        traps : vec![],
    };
    let text = body.to_string();
    assert!(text.contains("case 2147483646: goto label1; case 2147483647: goto label2;"), "{}", text);
}

#[test]
fn test_switch_targets_deduplicated() {
    let s = StmtKind::Switch {
        key : Immediate::Local(LocalId(0)),
        table : SwitchTable::Table { low : 0, high : 2 },
        targets : vec![ StmtId(3), StmtId(4), StmtId(3) ],
        default : StmtId(4),
    };
    assert_eq!(s.branch_targets(), vec![ StmtId(3), StmtId(4) ]);
    assert!(!s.falls_through());
}

#[test]
fn test_constant_equality() {
    assert_eq!(Constant::Float(f32::NAN), Constant::Float(f32::NAN));
    assert_ne!(Constant::Double(0.0), Constant::Double(-0.0));
    assert_ne!(Constant::Int(1), Constant::Long(1));
    assert_eq!("1.5F", Constant::Float(1.5).to_string());
    assert_eq!("7L", Constant::Long(7).to_string());
}
