use std::fmt;

use crate::GeneralResult;

/// The value types that appear in descriptors and in the produced IR.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
    /// A class or interface, by its dotted binary name (`java.lang.String`)
    Class(String),
    Array { element : Box<Type>, dims : u8 },
    /// Registers whose type is not inferred during lowering
    Unknown,
}

impl Type {
    pub fn class(name : &str) -> Type { Type::Class(name.replace('/', ".")) }

    /// Number of operand-stack (and local-slot) words a value of this type occupies.
    pub fn size(&self) -> u8 {
        use Type::*;
        match self {
            Long | Double => 2,
            Void => 0,
            _ => 1,
        }
    }

    pub fn is_wide(&self) -> bool { self.size() == 2 }

    /// Arrays have at most 255 dimensions.
    pub fn array_of(self, dims : u8) -> GeneralResult<Type> {
        match self {
            Type::Array { element, dims : inner } => {
                let dims = inner.checked_add(dims).ok_or("array type has more than 255 dimensions")?;
                Ok(Type::Array { element, dims })
            },
            other => Ok(Type::Array { element : Box::new(other), dims }),
        }
    }

    /// Parses exactly one field descriptor (`I`, `Ljava/lang/Object;`, `[[J`).
    pub fn from_descriptor(s : &str) -> GeneralResult<Type> {
        let (ty, used) = parse_one(s)?;
        if used != s.len() {
            return Err(format!("trailing characters in field descriptor `{}`", s).into());
        }
        Ok(ty)
    }

    /// Interprets a constant-pool class name, which is either an internal name
    /// (`java/lang/String`) or, for array classes, a field descriptor.
    pub fn from_class_name(name : &str) -> GeneralResult<Type> {
        if name.starts_with('[') {
            Type::from_descriptor(name)
        } else if name.is_empty() {
            Err("empty class name".into())
        } else {
            Ok(Type::class(name))
        }
    }
}

// Returns the parsed type and the number of bytes consumed.
fn parse_one(s : &str) -> GeneralResult<(Type, usize)> {
    use Type::*;

    let ch = s.chars().next().ok_or("string ended too soon")?;
    let simple = |t| -> GeneralResult<(Type, usize)> { Ok((t, 1)) };
    match ch {
        'Z' => simple(Boolean),
        'B' => simple(Byte),
        'C' => simple(Char),
        'S' => simple(Short),
        'I' => simple(Int),
        'J' => simple(Long),
        'F' => simple(Float),
        'D' => simple(Double),
        'V' => simple(Void),
        'L' => {
            let end = s.find(';').ok_or("string ended too soon")?;
            Ok((Type::class(&s[1..end]), end + 1))
        },
        '[' => {
            let (inner, used) = parse_one(&s[1..])?;
            Ok((inner.array_of(1)?, used + 1))
        },
        _ => Err(format!("unexpected character {}", ch).into()),
    }
}

/// Splits a method descriptor into its parameter types and its return type.
pub fn parse_method_descriptor(descriptor : &str) -> GeneralResult<(Vec<Type>, Type)> {
    if !descriptor.starts_with('(') {
        return Err(format!("descriptor `{}` missing opening parenthesis", descriptor).into());
    }
    let close = descriptor.rfind(')').ok_or("descriptor missing closing parenthesis")?;

    let mut params = Vec::new();
    let mut rest = &descriptor[1..close];
    while !rest.is_empty() {
        let (ty, used) = parse_one(rest)?;
        params.push(ty);
        rest = &rest[used..];
    }

    let ret = Type::from_descriptor(&descriptor[close + 1..])?;
    Ok((params, ret))
}

impl fmt::Display for Type {
    fn fmt(&self, f : &mut fmt::Formatter) -> fmt::Result {
        use Type::*;
        match self {
            Boolean => write!(f, "boolean"),
            Byte    => write!(f, "byte"),
            Char    => write!(f, "char"),
            Short   => write!(f, "short"),
            Int     => write!(f, "int"),
            Long    => write!(f, "long"),
            Float   => write!(f, "float"),
            Double  => write!(f, "double"),
            Void    => write!(f, "void"),
            Unknown => write!(f, "unknown"),
            Class(name) => write!(f, "{}", name),
            Array { element, dims } => {
                write!(f, "{}", element)?;
                for _ in 0..*dims {
                    write!(f, "[]")?;
                }
                Ok(())
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub class : String,
    pub name : String,
    pub ty : Type,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub class : String,
    pub name : String,
    pub params : Vec<Type>,
    pub ret : Type,
}

impl MethodRef {
    pub fn new(class : &str, name : &str, descriptor : &str) -> GeneralResult<MethodRef> {
        let (params, ret) = parse_method_descriptor(descriptor)?;
        Ok(MethodRef { class : class.replace('/', "."), name : name.to_owned(), params, ret })
    }
}

/// A method handle as it appears in the constant pool.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodHandle {
    pub kind : u8,
    pub class : String,
    pub name : String,
    pub descriptor : String,
}

/// The resolved shape of an `invokedynamic` call site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallSite {
    pub name : String,
    pub params : Vec<Type>,
    pub ret : Type,
    pub bootstrap : Option<MethodHandle>,
    pub bootstrap_args : Vec<crate::ir::Constant>,
}

fn write_params(f : &mut fmt::Formatter, params : &[Type]) -> fmt::Result {
    for (i, p) in params.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{}", p)?;
    }
    Ok(())
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f : &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{}: {} {}>", self.class, self.ty, self.name)
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f : &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{}: {} {}(", self.class, self.ret, self.name)?;
        write_params(f, &self.params)?;
        write!(f, ")>")
    }
}

impl fmt::Display for MethodHandle {
    fn fmt(&self, f : &mut fmt::Formatter) -> fmt::Result {
        write!(f, "handle: <{}: {}{}>", self.class, self.name, self.descriptor)
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f : &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\" <{} {}(", self.name, self.ret, self.name)?;
        write_params(f, &self.params)?;
        write!(f, ")>")
    }
}

#[test]
fn test_field_descriptors() -> GeneralResult<()> {
    use Type::*;
    assert_eq!(Int, Type::from_descriptor("I")?);
    assert_eq!(Type::class("java/lang/String"), Type::from_descriptor("Ljava/lang/String;")?);
    assert_eq!(Int.array_of(3)?, Type::from_descriptor("[[[I")?);
    assert_eq!(Type::class("a/B").array_of(1)?, Type::from_descriptor("[La/B;")?);
    assert!(Type::from_descriptor("").is_err());
    assert!(Type::from_descriptor("Q").is_err());
    assert!(Type::from_descriptor("II").is_err());
    assert!(Type::from_descriptor("Ljava/lang/String").is_err());
    Ok(())
}

#[test]
fn test_method_descriptors() -> GeneralResult<()> {
    use Type::*;
    assert_eq!((vec![ Int, Int, Int ], Void), parse_method_descriptor("(III)V")?);
    assert_eq!((vec![ Long, Double ], Int), parse_method_descriptor("(JD)I")?);
    assert_eq!(
        (vec![ Type::class("metasyntactic"), Type::class("variable") ], Int),
        parse_method_descriptor("(Lmetasyntactic;Lvariable;)I")?
    );
    assert_eq!((vec![ Int.array_of(3)? ], Int), parse_method_descriptor("([[[I)I")?);
    assert_eq!((vec![], Type::class("placeholder")), parse_method_descriptor("()Lplaceholder;")?);
    assert!(parse_method_descriptor("III)V").is_err());
    assert!(parse_method_descriptor("(III").is_err());
    Ok(())
}

#[test]
fn test_sizes() -> GeneralResult<()> {
    use Type::*;
    assert_eq!(0, Void.size());
    assert_eq!(1, Int.size());
    assert_eq!(1, Type::class("java.lang.Object").size());
    assert!(Long.is_wide());
    assert!(Double.is_wide());
    assert!(!Long.array_of(1)?.is_wide());
    Ok(())
}

#[test]
fn test_array_dimension_limit() -> GeneralResult<()> {
    let deepest = format!("{}I", "[".repeat(255));
    assert_eq!(Type::Int.array_of(255)?, Type::from_descriptor(&deepest)?);
    assert!(Type::from_descriptor(&format!("[{}", deepest)).is_err());
    assert!(Type::Int.array_of(200)?.array_of(56).is_err());
    Ok(())
}

#[test]
fn test_display() -> GeneralResult<()> {
    assert_eq!("int[][]", Type::from_descriptor("[[I")?.to_string());
    assert_eq!("java.lang.String", Type::from_descriptor("Ljava/lang/String;")?.to_string());
    let m = MethodRef::new("java/io/PrintStream", "println", "(Ljava/lang/String;J)V")?;
    assert_eq!("<java.io.PrintStream: void println(java.lang.String,long)>", m.to_string());
    Ok(())
}
