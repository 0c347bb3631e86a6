use std::rc::Rc;

use crate::lang::value::{Builtin, Value};

/// Host functions available to the tree-walking backend. They are resolved
/// after environment lookup, so user bindings shadow them.
pub fn lookup(name: &str) -> Option<Builtin> {
    let builtin = match name {
        "len" => Builtin {
            name: "len",
            func: builtin_len,
        },
        "first" => Builtin {
            name: "first",
            func: builtin_first,
        },
        "last" => Builtin {
            name: "last",
            func: builtin_last,
        },
        "rest" => Builtin {
            name: "rest",
            func: builtin_rest,
        },
        "push" => Builtin {
            name: "push",
            func: builtin_push,
        },
        "print" => Builtin {
            name: "print",
            func: builtin_print,
        },
        _ => return None,
    };
    Some(builtin)
}

fn error(message: String) -> Value {
    Value::Error {
        message,
        location: None,
    }
}

fn builtin_len(args: Vec<Value>) -> Value {
    if args.len() != 1 {
        return error(format!(
            "wrong number of arguments. got={}, want=1",
            args.len()
        ));
    }

    match &args[0] {
        Value::String(value) => Value::Integer(value.len() as i64),
        Value::Array(elements) => Value::Integer(elements.len() as i64),
        other => error(format!(
            "argument to `len` not supported, got={}",
            other.type_name()
        )),
    }
}

fn builtin_first(args: Vec<Value>) -> Value {
    if args.len() != 1 {
        return error(format!(
            "wrong number of arguments. got={}, want=1",
            args.len()
        ));
    }

    match &args[0] {
        Value::Array(elements) => elements.first().cloned().unwrap_or(Value::Null),
        other => error(format!(
            "argument to `first` must be ARRAY, got={}",
            other.type_name()
        )),
    }
}

fn builtin_last(args: Vec<Value>) -> Value {
    if args.len() != 1 {
        return error(format!(
            "wrong number of arguments. got={}, want=1",
            args.len()
        ));
    }

    match &args[0] {
        Value::Array(elements) => elements.last().cloned().unwrap_or(Value::Null),
        other => error(format!(
            "argument to `last` must be ARRAY, got={}",
            other.type_name()
        )),
    }
}

fn builtin_rest(args: Vec<Value>) -> Value {
    if args.len() != 1 {
        return error(format!(
            "wrong number of arguments. got={}, want=1",
            args.len()
        ));
    }

    match &args[0] {
        Value::Array(elements) => {
            if elements.is_empty() {
                Value::Null
            } else {
                Value::Array(Rc::new(elements[1..].to_vec()))
            }
        }
        other => error(format!(
            "argument to `rest` must be ARRAY, got={}",
            other.type_name()
        )),
    }
}

fn builtin_push(args: Vec<Value>) -> Value {
    if args.len() != 2 {
        return error(format!(
            "wrong number of arguments. got={}, want=2",
            args.len()
        ));
    }

    match &args[0] {
        Value::Array(elements) => {
            let mut extended = elements.as_ref().clone();
            extended.push(args[1].clone());
            Value::Array(Rc::new(extended))
        }
        other => error(format!(
            "argument to `push` must be ARRAY, got={}",
            other.type_name()
        )),
    }
}

fn builtin_print(args: Vec<Value>) -> Value {
    for arg in &args {
        println!("{}", arg);
    }
    Value::Null
}
