use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::path::Path;

use classfile_parser::ClassFile;
use classfile_parser::attribute_info::AttributeInfo;
use classfile_parser::constant_info::ConstantInfo;
use classfile_parser::method_info::{MethodAccessFlags, MethodInfo};
use log::{debug, warn};

use crate::error::LoweringError;
use crate::ir::{Body, Constant};
use crate::jvmtypes::{branch_offsets, decode_insn, ConstantResolver, Label, Operation};
use crate::lower::lower_method_with;
use crate::method::{LocalName, LoweringOptions, MethodInput, TryCatchBlock};
use crate::types::{parse_method_descriptor, CallSite, FieldRef, MethodHandle, MethodRef, Type};
use crate::GeneralResult;

fn generic_error(e : impl Error) -> Box<dyn Error> {
    format!("unknown error: {}", e).into()
}

/// Reads a `.class` file.
pub fn parse_class(path : &Path) -> GeneralResult<ClassFile> {
    // the parser appends the extension itself
    let p = path.with_extension("");
    let p = p.to_str().ok_or("expected Unicode filename")?;
    classfile_parser::parse_class(p).map_err(Into::into)
}

type Member = (String, String, String);

/// A view of a class's constant pool that answers the questions instruction decoding asks.
pub struct ConstantPool<'a> {
    entries : &'a [ConstantInfo],
    /// `(method handle index, argument indices)` per entry of the `BootstrapMethods` attribute
    bootstrap : Vec<(u16, Vec<u16>)>,
}

impl<'a> ConstantPool<'a> {
    pub fn new(class : &'a ClassFile) -> GeneralResult<ConstantPool<'a>> {
        let mut pool = ConstantPool { entries : &class.const_pool, bootstrap : Vec::new() };
        if let Some(attr) = pool.attribute(&class.attributes, "BootstrapMethods")? {
            pool.bootstrap = bootstrap_methods(&attr.info)?;
        }
        Ok(pool)
    }

    fn get(&self, index : u16) -> GeneralResult<&'a ConstantInfo> {
        usize::from(index).checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .ok_or_else(|| format!("constant pool index {} out of range", index).into())
    }

    pub fn utf8(&self, index : u16) -> GeneralResult<&'a str> {
        match self.get(index)? {
            ConstantInfo::Utf8(u) => Ok(&u.utf8_string),
            other => Err(format!("expected a string at constant {}, found {:?}", index, other).into()),
        }
    }

    /// The internal name (`java/lang/String`) of a class constant.
    pub fn class_name(&self, index : u16) -> GeneralResult<&'a str> {
        match self.get(index)? {
            ConstantInfo::Class(c) => self.utf8(c.name_index),
            other => Err(format!("expected a class at constant {}, found {:?}", index, other).into()),
        }
    }

    fn name_and_type(&self, index : u16) -> GeneralResult<(&'a str, &'a str)> {
        match self.get(index)? {
            ConstantInfo::NameAndType(nt) => Ok((self.utf8(nt.name_index)?, self.utf8(nt.descriptor_index)?)),
            other => Err(format!("expected a name and type at constant {}, found {:?}", index, other).into()),
        }
    }

    // class, name and descriptor of a field or method reference
    fn member(&self, index : u16) -> GeneralResult<Member> {
        let (class_index, nat_index) = match self.get(index)? {
            ConstantInfo::FieldRef(r)           => (r.class_index, r.name_and_type_index),
            ConstantInfo::MethodRef(r)          => (r.class_index, r.name_and_type_index),
            ConstantInfo::InterfaceMethodRef(r) => (r.class_index, r.name_and_type_index),
            other => return Err(format!("expected a member reference at constant {}, found {:?}", index, other).into()),
        };
        let (name, desc) = self.name_and_type(nat_index)?;
        Ok((self.class_name(class_index)?.to_owned(), name.to_owned(), desc.to_owned()))
    }

    fn method_handle(&self, index : u16) -> GeneralResult<MethodHandle> {
        match self.get(index)? {
            ConstantInfo::MethodHandle(h) => {
                let (class, name, descriptor) = self.member(h.reference_index)?;
                Ok(MethodHandle { kind : h.reference_kind, class : class.replace('/', "."), name, descriptor })
            },
            other => Err(format!("expected a method handle at constant {}, found {:?}", index, other).into()),
        }
    }

    fn attribute<'b>(&self, attrs : &'b [AttributeInfo], name : &str) -> GeneralResult<Option<&'b AttributeInfo>> {
        for a in attrs {
            if self.utf8(a.attribute_name_index)? == name {
                return Ok(Some(a));
            }
        }
        Ok(None)
    }
}

impl ConstantResolver for ConstantPool<'_> {
    fn field(&self, index : u16) -> GeneralResult<FieldRef> {
        let (class, name, desc) = self.member(index)?;
        Ok(FieldRef { class : class.replace('/', "."), name, ty : Type::from_descriptor(&desc)? })
    }

    fn method(&self, index : u16) -> GeneralResult<MethodRef> {
        match self.get(index)? {
            ConstantInfo::MethodRef(_) | ConstantInfo::InterfaceMethodRef(_) => {
                let (class, name, desc) = self.member(index)?;
                MethodRef::new(&class, &name, &desc)
            },
            other => Err(format!("expected a method at constant {}, found {:?}", index, other).into()),
        }
    }

    fn class_type(&self, index : u16) -> GeneralResult<Type> {
        Type::from_class_name(self.class_name(index)?)
    }

    fn loadable(&self, index : u16) -> GeneralResult<Constant> {
        use ConstantInfo::*;
        let c = match self.get(index)? {
            Integer(x)      => Constant::Int(x.value),
            Float(x)        => Constant::Float(x.value),
            Long(x)         => Constant::Long(x.value),
            Double(x)       => Constant::Double(x.value),
            String(x)       => Constant::String(self.utf8(x.string_index)?.to_owned()),
            Class(x)        => Constant::Class(Type::from_class_name(self.utf8(x.name_index)?)?),
            MethodType(x)   => {
                let (params, ret) = parse_method_descriptor(self.utf8(x.descriptor_index)?)?;
                Constant::MethodType { params, ret }
            },
            ConstantInfo::MethodHandle(_) => Constant::MethodHandle(self.method_handle(index)?),
            other => return Err(format!("constant {} is not loadable: {:?}", index, other).into()),
        };
        Ok(c)
    }

    fn call_site(&self, index : u16) -> GeneralResult<CallSite> {
        let indy = match self.get(index)? {
            ConstantInfo::InvokeDynamic(x) => x,
            other => return Err(format!("expected a call site at constant {}, found {:?}", index, other).into()),
        };
        let (name, desc) = self.name_and_type(indy.name_and_type_index)?;
        let (params, ret) = parse_method_descriptor(desc)?;
        let (bootstrap, bootstrap_args) = match self.bootstrap.get(usize::from(indy.bootstrap_method_attr_index)) {
            Some((handle, args)) => (
                Some(self.method_handle(*handle)?),
                args.iter().map(|&a| self.loadable(a)).collect::<GeneralResult<_>>()?,
            ),
            None => (None, Vec::new()),
        };
        Ok(CallSite { name : name.to_owned(), params, ret, bootstrap, bootstrap_args })
    }
}

fn read_u16s(info : &[u8]) -> GeneralResult<Vec<u16>> {
    if info.len() % 2 != 0 {
        return Err(format!("attribute of odd length {}", info.len()).into());
    }
    Ok(info.chunks_exact(2).map(|c| u16::from_be_bytes([ c[0], c[1] ])).collect())
}

// Splits a `count, entries...` attribute into `count` entries of `width` words each.
fn table(info : &[u8], width : usize) -> GeneralResult<Vec<Vec<u16>>> {
    let words = read_u16s(info)?;
    let (&count, rest) = words.split_first().ok_or("empty attribute")?;
    if rest.len() != usize::from(count) * width {
        return Err(format!("attribute holds {} words, expected {} entries of {}", rest.len(), count, width).into());
    }
    Ok(rest.chunks(width).map(<[u16]>::to_vec).collect())
}

/// `(start_pc, line)` pairs of a `LineNumberTable` attribute.
fn line_numbers(info : &[u8]) -> GeneralResult<Vec<(usize, u16)>> {
    Ok(table(info, 2)?.into_iter().map(|e| (usize::from(e[0]), e[1])).collect())
}

/// `(name_index, slot)` pairs of a `LocalVariableTable` attribute.
fn local_variables(info : &[u8]) -> GeneralResult<Vec<(u16, u16)>> {
    Ok(table(info, 5)?.into_iter().map(|e| (e[2], e[4])).collect())
}

fn bootstrap_methods(info : &[u8]) -> GeneralResult<Vec<(u16, Vec<u16>)>> {
    let words = read_u16s(info)?;
    let (&count, mut rest) = words.split_first().ok_or("empty BootstrapMethods attribute")?;
    let mut out = Vec::with_capacity(count.into());
    for _ in 0..count {
        match rest {
            [ method, n, tail @ .. ] if tail.len() >= usize::from(*n) => {
                let (args, after) = tail.split_at(usize::from(*n));
                out.push((*method, args.to_vec()));
                rest = after;
            },
            _ => return Err("truncated BootstrapMethods attribute".into()),
        }
    }
    Ok(out)
}

impl ConstantPool<'_> {
    /// Builds the lowering input for `method`, or `None` when it has no body.
    pub fn method_input(&self, class_name : &str, method : &MethodInfo) -> GeneralResult<Option<MethodInput>> {
        use classfile_parser::attribute_info::code_attribute_parser;
        use classfile_parser::code_attribute::code_parser;

        let name = self.utf8(method.name_index)?;
        let (params, ret) = parse_method_descriptor(self.utf8(method.descriptor_index)?)?;
        let flags = method.access_flags;
        if flags.contains(MethodAccessFlags::ABSTRACT) || flags.contains(MethodAccessFlags::NATIVE) {
            warn!("skipping {}.{}: no code to lower", class_name, name);
            return Ok(None);
        }
        let attr = match self.attribute(&method.attributes, "Code")? {
            Some(a) => a,
            None => {
                warn!("skipping {}.{}: no Code attribute", class_name, name);
                return Ok(None);
            },
        };

        let code = code_attribute_parser(&attr.info).map_err(generic_error)?.1;
        let insns = code_parser(&code.code).map_err(generic_error)?.1;

        let mut offsets = BTreeSet::new();
        for (addr, insn) in &insns {
            offsets.extend(branch_offsets(*addr, insn)?);
        }
        for e in &code.exception_table {
            offsets.extend([ e.start_pc, e.end_pc, e.handler_pc ].iter().map(|&pc| usize::from(pc)));
        }
        let labels = offsets.into_iter()
            .enumerate()
            .map(|(n, addr)| -> GeneralResult<(usize, Label)> { Ok((addr, Label(u32::try_from(n)?))) })
            .collect::<GeneralResult<BTreeMap<_,_>>>()?;

        let mut lines = BTreeMap::new();
        let mut local_names = Vec::new();
        for a in &code.attributes {
            match self.utf8(a.attribute_name_index)? {
                "LineNumberTable" => lines.extend(line_numbers(&a.info)?),
                "LocalVariableTable" => {
                    for (name_index, index) in local_variables(&a.info)? {
                        local_names.push(LocalName { index, name : self.utf8(name_index)?.to_owned() });
                    }
                },
                _ => {},
            }
        }

        let mut ops = Vec::with_capacity(insns.len() + labels.len());
        for (addr, insn) in insns {
            if let Some(&l) = labels.get(&addr) {
                ops.push(Operation::Label(l));
            }
            if let Some(&line) = lines.get(&addr) {
                ops.push(Operation::LineNumber(line));
            }
            ops.push(decode_insn(addr, insn, self, &labels)?);
        }
        // an exception range may end at the end of the code
        if let Some(&l) = labels.get(&code.code.len()) {
            ops.push(Operation::Label(l));
        }

        let label = |pc : u16| -> GeneralResult<Label> {
            labels.get(&usize::from(pc)).copied().ok_or_else(|| format!("no label at offset {}", pc).into())
        };
        let try_catch = code.exception_table.iter().map(|e| -> GeneralResult<TryCatchBlock> {
            Ok(TryCatchBlock {
                start : label(e.start_pc)?,
                end : label(e.end_pc)?,
                handler : label(e.handler_pc)?,
                catch_type : match e.catch_type {
                    0 => None,
                    n => Some(self.class_name(n)?.to_owned()),
                },
            })
        }).collect::<GeneralResult<Vec<_>>>()?;

        debug!("decoded {}.{}: {} operations, {} handlers", class_name, name, ops.len(), try_catch.len());
        Ok(Some(MethodInput {
            class : class_name.replace('/', "."),
            name : name.to_owned(),
            params,
            ret,
            is_static : flags.contains(MethodAccessFlags::STATIC),
            max_locals : code.max_locals,
            max_stack : code.max_stack,
            code : ops,
            try_catch,
            local_names,
        }))
    }
}

pub fn method_input(class : &ClassFile, method : &MethodInfo) -> GeneralResult<Option<MethodInput>> {
    let pool = ConstantPool::new(class)?;
    pool.method_input(pool.class_name(class.this_class)?, method)
}

/// Builds the lowering input of every method of `class` that has a body.
pub fn method_inputs(class : &ClassFile) -> GeneralResult<Vec<MethodInput>> {
    let pool = ConstantPool::new(class)?;
    let name = pool.class_name(class.this_class)?;
    let mut out = Vec::with_capacity(class.methods.len());
    for method in &class.methods {
        out.extend(pool.method_input(name, method)?);
    }
    Ok(out)
}

/// Lowers every method of `class` that has a body. A method that fails to lower does not stop
/// the others; only an unreadable class file is an error here.
pub fn lower_class(class : &ClassFile, options : &LoweringOptions) -> GeneralResult<Vec<Result<Body, LoweringError>>> {
    Ok(method_inputs(class)?.iter().map(|m| lower_method_with(m, options)).collect())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::StmtKind;
    use crate::jvmtypes::{ArithmeticOperation, JType};
    use classfile_parser::constant_info::{IntegerConstant, LongConstant};

    fn u2(b : &mut Vec<u8>, n : u16) { b.extend_from_slice(&n.to_be_bytes()) }
    fn u4(b : &mut Vec<u8>, n : u32) { b.extend_from_slice(&n.to_be_bytes()) }
    fn utf8(b : &mut Vec<u8>, s : &str) {
        b.push(1);
        u2(b, s.len() as u16);
        b.extend_from_slice(s.as_bytes());
    }

    // class T { static int add(int, int) { return a + b; } private native void n(); }
    fn sample_class() -> Vec<u8> {
        let mut b = vec![ 0xca, 0xfe, 0xba, 0xbe ];
        u2(&mut b, 0);
        u2(&mut b, 52);

        u2(&mut b, 11);
        utf8(&mut b, "T");                          // 1
        b.push(7); u2(&mut b, 1);                   // 2
        utf8(&mut b, "java/lang/Object");           // 3
        b.push(7); u2(&mut b, 3);                   // 4
        utf8(&mut b, "add");                        // 5
        utf8(&mut b, "(II)I");                      // 6
        utf8(&mut b, "Code");                       // 7
        utf8(&mut b, "LineNumberTable");            // 8
        utf8(&mut b, "n");                          // 9
        utf8(&mut b, "()V");                        // 10

        u2(&mut b, 0x0021);
        u2(&mut b, 2);
        u2(&mut b, 4);
        u2(&mut b, 0); // interfaces
        u2(&mut b, 0); // fields

        u2(&mut b, 2);
        u2(&mut b, 0x0009);
        u2(&mut b, 5);
        u2(&mut b, 6);
        u2(&mut b, 1);
        u2(&mut b, 7);
        u4(&mut b, 28);
        u2(&mut b, 2); // max_stack
        u2(&mut b, 2); // max_locals
        u4(&mut b, 4);
        b.extend_from_slice(&[ 0x1a, 0x1b, 0x60, 0xac ]); // iload_0 iload_1 iadd ireturn
        u2(&mut b, 0); // exception table
        u2(&mut b, 1);
        u2(&mut b, 8);
        u4(&mut b, 6);
        u2(&mut b, 1);
        u2(&mut b, 0);
        u2(&mut b, 7);

        u2(&mut b, 0x0102);
        u2(&mut b, 9);
        u2(&mut b, 10);
        u2(&mut b, 0);

        u2(&mut b, 0); // class attributes
        b
    }

    fn load_sample() -> GeneralResult<ClassFile> {
        let path = std::env::temp_dir().join(format!("jlower-frontend-{}.class", std::process::id()));
        std::fs::write(&path, sample_class())?;
        let class = parse_class(&path);
        std::fs::remove_file(&path)?;
        class
    }

    #[test]
    fn test_method_inputs() -> GeneralResult<()> {
        let class = load_sample()?;
        let inputs = method_inputs(&class)?;
        assert_eq!(1, inputs.len());
        let m = &inputs[0];
        assert_eq!("<T: int add(int,int)>", m.signature());
        assert!(m.is_static);
        assert_eq!(2, m.max_locals);
        assert_eq!(vec![
            Operation::LineNumber(7),
            Operation::LoadLocal { kind : JType::Int, index : 0 },
            Operation::LoadLocal { kind : JType::Int, index : 1 },
            Operation::Arithmetic { kind : JType::Int, op : ArithmeticOperation::Add },
            Operation::Yield { kind : JType::Int },
        ], m.code);
        assert_eq!(None, method_input(&class, &class.methods[1])?);
        Ok(())
    }

    #[test]
    fn test_lower_class() -> GeneralResult<()> {
        let class = load_sample()?;
        let bodies = lower_class(&class, &LoweringOptions { keep_line_numbers : true })?;
        assert_eq!(1, bodies.len());
        let body = bodies.into_iter().next().ok_or("no body")??;
        assert_eq!("<T: int add(int,int)>", body.signature);
        let last = body.stmts.last().ok_or("empty body")?;
        assert!(matches!(last.kind, StmtKind::Return(_)));
        assert_eq!(Some(7), last.line);
        Ok(())
    }

    #[test]
    fn test_loadable_constants() -> GeneralResult<()> {
        let entries = vec![
            ConstantInfo::Integer(IntegerConstant { value : -5 }),
            ConstantInfo::Long(LongConstant { value : 1 << 40 }),
            ConstantInfo::Unusable,
        ];
        let pool = ConstantPool { entries : &entries, bootstrap : vec![] };
        assert_eq!(Constant::Int(-5), pool.loadable(1)?);
        assert_eq!(Constant::Long(1 << 40), pool.loadable(2)?);
        assert!(pool.loadable(3).is_err());
        assert!(pool.loadable(0).is_err());
        assert!(pool.loadable(4).is_err());
        assert!(pool.class_name(1).is_err());
        assert!(pool.call_site(1).is_err());
        Ok(())
    }

    #[test]
    fn test_attribute_tables() -> GeneralResult<()> {
        let lines = [ 0, 2, 0, 0, 0, 3, 0, 4, 0, 9 ];
        assert_eq!(vec![ (0, 3), (4, 9) ], line_numbers(&lines)?);
        assert!(line_numbers(&lines[..9]).is_err());
        assert!(line_numbers(&lines[..8]).is_err());

        let vars = [ 0, 1, 0, 0, 0, 5, 0, 12, 0, 13, 0, 2 ];
        assert_eq!(vec![ (12, 2) ], local_variables(&vars)?);

        // two methods: #20 with args #21 #22, #23 with none
        let bsm = [ 0, 2, 0, 20, 0, 2, 0, 21, 0, 22, 0, 23, 0, 0 ];
        assert_eq!(vec![ (20, vec![ 21, 22 ]), (23, vec![]) ], bootstrap_methods(&bsm)?);
        assert!(bootstrap_methods(&bsm[..12]).is_err());
        assert!(bootstrap_methods(&[]).is_err());
        Ok(())
    }
}
