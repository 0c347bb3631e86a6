use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::bytecode::Instructions;
use crate::frontend::token::Location;
use crate::lang::ast::{BlockStatement, Identifier};
use crate::runtime::env::Environment;
use serde::{Deserialize, Serialize};

pub const INTEGER_OBJ: &str = "INTEGER";
pub const BOOLEAN_OBJ: &str = "BOOLEAN";
pub const STRING_OBJ: &str = "STRING";
pub const NULL_OBJ: &str = "NULL";
pub const ARRAY_OBJ: &str = "ARRAY";
pub const HASH_OBJ: &str = "HASH";
pub const COMPILED_FUNCTION_OBJ: &str = "COMPILED_FUNCTION";
pub const FUNCTION_OBJ: &str = "FUNCTION";
pub const BUILTIN_OBJ: &str = "BUILTIN";
pub const RETURN_VALUE_OBJ: &str = "RETURN_VALUE";
pub const ERROR_OBJ: &str = "ERROR";

/// Runtime value in the donkey language.
///
/// `Return` and `Error` only ever occur on the tree-walking path; the
/// bytecode VM neither produces nor consumes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// 64-bit signed integer.
    Integer(i64),

    /// Boolean value.
    Boolean(bool),

    /// UTF-8 string value.
    String(String),

    /// The null singleton.
    Null,

    /// Ordered sequence of values.
    Array(Rc<Vec<Value>>),

    /// Mapping from hash key to the original key/value pair.
    Hash(Rc<HashMap<HashKey, HashPair>>),

    /// A function lowered to bytecode, living in the constant pool.
    CompiledFunction(Rc<CompiledFunction>),

    /// An AST function closing over its defining environment
    /// (tree-walking path only).
    #[serde(skip)]
    Function(Rc<Function>),

    /// A host function (tree-walking path only).
    #[serde(skip)]
    Builtin(Builtin),

    /// Wrapper that carries a `return` out of nested blocks
    /// (tree-walking path only).
    Return(Box<Value>),

    /// A runtime error produced by the evaluator, with the location of the
    /// node that failed when one is known.
    Error {
        message: String,
        location: Option<Location>,
    },
}

/// Instruction stream and local-slot count of one compiled function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledFunction {
    pub instructions: Instructions,
    pub num_locals: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub parameters: Vec<Identifier>,
    pub body: BlockStatement,
    #[serde(skip)]
    pub env: Rc<RefCell<Environment>>,
}

// Environments can refer back to the functions they hold; comparing them
// would recurse forever, so function equality ignores the environment.
impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.parameters == other.parameters && self.body == other.body
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Builtin {
    pub name: &'static str,
    pub func: fn(Vec<Value>) -> Value,
}

/// Hash-table key for Integer, Boolean and String values: the value's type
/// plus a 64-bit fingerprint. Two values produce equal keys exactly when a
/// hash lookup should treat them as the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashKey {
    pub kind: HashKeyKind,
    pub value: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashKeyKind {
    Integer,
    Boolean,
    String,
}

/// Original key and value stored under a `HashKey`, so hash contents can be
/// rendered back to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashPair {
    pub key: Value,
    pub value: Value,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => INTEGER_OBJ,
            Value::Boolean(_) => BOOLEAN_OBJ,
            Value::String(_) => STRING_OBJ,
            Value::Null => NULL_OBJ,
            Value::Array(_) => ARRAY_OBJ,
            Value::Hash(_) => HASH_OBJ,
            Value::CompiledFunction(_) => COMPILED_FUNCTION_OBJ,
            Value::Function(_) => FUNCTION_OBJ,
            Value::Builtin(_) => BUILTIN_OBJ,
            Value::Return(_) => RETURN_VALUE_OBJ,
            Value::Error { .. } => ERROR_OBJ,
        }
    }

    /// Everything is truthy except `false` and `null`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Boolean(value) => *value,
            Value::Null => false,
            _ => true,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error { .. })
    }

    /// The hash-table key for this value, or `None` for unhashable types
    /// (arrays, hashes, functions, null).
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Value::Integer(value) => Some(HashKey {
                kind: HashKeyKind::Integer,
                value: *value as u64,
            }),
            Value::Boolean(value) => Some(HashKey {
                kind: HashKeyKind::Boolean,
                value: u64::from(*value),
            }),
            Value::String(value) => Some(HashKey {
                kind: HashKeyKind::String,
                value: fnv1a64(value.as_bytes()),
            }),
            _ => None,
        }
    }
}

/// Equality as the language defines it: integers, strings and booleans by
/// value, null equal to null, containers and functions only when they are
/// the very same object. Any cross-type comparison is unequal.
pub fn identity_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => l == r,
        (Value::String(l), Value::String(r)) => l == r,
        (Value::Boolean(l), Value::Boolean(r)) => l == r,
        (Value::Null, Value::Null) => true,
        (Value::Array(l), Value::Array(r)) => Rc::ptr_eq(l, r),
        (Value::Hash(l), Value::Hash(r)) => Rc::ptr_eq(l, r),
        (Value::CompiledFunction(l), Value::CompiledFunction(r)) => Rc::ptr_eq(l, r),
        (Value::Function(l), Value::Function(r)) => Rc::ptr_eq(l, r),
        _ => false,
    }
}

/// 64-bit FNV-1a over a byte slice.
fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

impl std::fmt::Display for Value {
    /// Renders a value back at the user, donkey-syntax-ish.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(value) => write!(f, "{}", value),
            Value::Boolean(value) => write!(f, "{}", value),
            Value::String(value) => write!(f, "{}", value),
            Value::Null => write!(f, "null"),
            Value::Array(elements) => {
                let rendered: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            Value::Hash(pairs) => {
                let rendered: Vec<String> = pairs
                    .values()
                    .map(|pair| format!("{}: {}", pair.key, pair.value))
                    .collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
            Value::CompiledFunction(func) => {
                write!(f, "CompiledFunction[{:p}]", Rc::as_ptr(func))
            }
            Value::Function(func) => {
                let params: Vec<String> = func.parameters.iter().map(|p| p.to_string()).collect();
                write!(f, "fn({}) {{\n{}\n}}", params.join(", "), func.body)
            }
            Value::Builtin(_) => write!(f, "builtin function"),
            Value::Return(value) => write!(f, "{}", value),
            Value::Error { message, location } => match location {
                Some(loc) => write!(f, "Runtime error: {} >> {}", loc, message),
                None => write!(f, "Runtime error: {}", message),
            },
        }
    }
}
