use crate::jvmtypes::{Label, Operation};
use crate::types::Type;

/// One exception-table entry, with its byte offsets already replaced by labels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TryCatchBlock {
    pub start : Label,
    pub end : Label,
    pub handler : Label,
    /// `None` catches everything
    pub catch_type : Option<String>,
}

/// A declared name for a local slot; used only to name registers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalName {
    pub index : u16,
    pub name : String,
}

/// Everything lowering needs to know about one method.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodInput {
    pub class : String,
    pub name : String,
    pub params : Vec<Type>,
    pub ret : Type,
    pub is_static : bool,
    pub max_locals : u16,
    /// informational only
    pub max_stack : u16,
    pub code : Vec<Operation>,
    pub try_catch : Vec<TryCatchBlock>,
    pub local_names : Vec<LocalName>,
}

impl MethodInput {
    pub fn signature(&self) -> String {
        let params : Vec<_> = self.params.iter().map(ToString::to_string).collect();
        format!("<{}: {} {}({})>", self.class, self.ret, self.name, params.join(","))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoweringOptions {
    /// Attach source line numbers to statements
    pub keep_line_numbers : bool,
}

#[cfg(test)]
pub(crate) fn sample(params : Vec<Type>, ret : Type, max_locals : u16, code : Vec<Operation>) -> MethodInput {
    MethodInput {
        class : "Sample".to_owned(),
        name : "run".to_owned(),
        params,
        ret,
        is_static : true,
        max_locals,
        max_stack : 8,
        code,
        try_catch : vec![],
        local_names : vec![],
    }
}

#[test]
fn test_signature() {
    let m = sample(vec![ Type::Int, Type::class("java/lang/String") ], Type::Void, 2, vec![]);
    assert_eq!("<Sample: void run(int,java.lang.String)>", m.signature());
}
