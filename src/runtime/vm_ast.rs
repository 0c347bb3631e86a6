use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::frontend::token::Location;
use crate::lang::ast::{BlockStatement, Expression, Program, Statement};
use crate::lang::value::{identity_eq, Function, HashPair, Value};
use crate::runtime::builtins;
use crate::runtime::env::Environment;

/// The tree-walking backend: walks the AST directly, no bytecode involved.
///
/// Unlike the compiled path, functions here close over their defining
/// environment and calls bind arguments to parameters. Errors are ordinary
/// values that carry the offending node's source location.
pub struct VmAst {
    env: Rc<RefCell<Environment>>,
}

impl VmAst {
    pub fn new() -> Self {
        VmAst {
            env: Rc::new(RefCell::new(Environment::new())),
        }
    }

    pub fn run(&mut self, program: &Program) -> Value {
        eval_program(program, &self.env)
    }
}

impl Default for VmAst {
    fn default() -> Self {
        VmAst::new()
    }
}

pub fn eval_program(program: &Program, env: &Rc<RefCell<Environment>>) -> Value {
    let mut result = Value::Null;

    for statement in &program.statements {
        result = eval_statement(statement, env);

        match result {
            Value::Return(value) => return *value,
            Value::Error { .. } => return result,
            _ => {}
        }
    }
    result
}

fn eval_statement(statement: &Statement, env: &Rc<RefCell<Environment>>) -> Value {
    match statement {
        Statement::Let { name, value } => {
            let value = eval_expression(value, env);
            if value.is_error() {
                return value;
            }
            env.borrow_mut().set(&name.name, value);
            Value::Null
        }

        Statement::Return { value } => {
            let value = eval_expression(value, env);
            if value.is_error() {
                return value;
            }
            Value::Return(Box::new(value))
        }

        Statement::Expression { expression } => eval_expression(expression, env),
    }
}

fn eval_block(block: &BlockStatement, env: &Rc<RefCell<Environment>>) -> Value {
    let mut result = Value::Null;

    for statement in &block.statements {
        result = eval_statement(statement, env);

        // returns and errors bubble up unopened so outer blocks stop too
        if matches!(result, Value::Return(_) | Value::Error { .. }) {
            return result;
        }
    }
    result
}

fn eval_expression(expression: &Expression, env: &Rc<RefCell<Environment>>) -> Value {
    match expression {
        Expression::IntegerLiteral(value) => Value::Integer(*value),
        Expression::StringLiteral(value) => Value::String(value.clone()),
        Expression::BooleanLiteral(value) => Value::Boolean(*value),

        Expression::Identifier(ident) => {
            if let Some(value) = env.borrow().get(&ident.name) {
                return value;
            }
            if let Some(builtin) = builtins::lookup(&ident.name) {
                return Value::Builtin(builtin);
            }
            new_error(
                format!("identifier not found: {}", ident.name),
                Some(ident.location),
            )
        }

        Expression::Prefix {
            operator,
            right,
            location,
        } => {
            let right = eval_expression(right, env);
            if right.is_error() {
                return right;
            }
            eval_prefix(operator, right, *location)
        }

        Expression::Infix {
            operator,
            left,
            right,
            location,
        } => {
            let left = eval_expression(left, env);
            if left.is_error() {
                return left;
            }
            let right = eval_expression(right, env);
            if right.is_error() {
                return right;
            }
            eval_infix(operator, left, right, *location)
        }

        Expression::If {
            condition,
            consequence,
            alternative,
        } => {
            let condition = eval_expression(condition, env);
            if condition.is_error() {
                return condition;
            }

            if condition.is_truthy() {
                eval_block(consequence, env)
            } else if let Some(alternative) = alternative {
                eval_block(alternative, env)
            } else {
                Value::Null
            }
        }

        Expression::Function { parameters, body } => Value::Function(Rc::new(Function {
            parameters: parameters.clone(),
            body: body.clone(),
            env: Rc::clone(env),
        })),

        Expression::Call {
            function,
            arguments,
            location,
        } => {
            let function = eval_expression(function, env);
            if function.is_error() {
                return function;
            }

            let args = match eval_expressions(arguments, env) {
                Ok(args) => args,
                Err(err) => return err,
            };

            let mut result = apply_function(function, args, *location);
            if let Value::Error { location: loc, .. } = &mut result {
                *loc = Some(*location);
            }
            result
        }

        Expression::Index {
            left,
            index,
            location,
        } => {
            let left = eval_expression(left, env);
            if left.is_error() {
                return left;
            }
            let index = eval_expression(index, env);
            if index.is_error() {
                return index;
            }
            eval_index(left, index, *location)
        }

        Expression::Array { elements } => match eval_expressions(elements, env) {
            Ok(elements) => Value::Array(Rc::new(elements)),
            Err(err) => err,
        },

        Expression::Hash { pairs, location } => {
            let mut evaluated = HashMap::new();

            for (key_node, value_node) in pairs {
                let key = eval_expression(key_node, env);
                if key.is_error() {
                    return key;
                }

                let hash_key = match key.hash_key() {
                    Some(hash_key) => hash_key,
                    None => {
                        return new_error(
                            format!("unusable as hash key: {}", key.type_name()),
                            Some(*location),
                        )
                    }
                };

                let value = eval_expression(value_node, env);
                if value.is_error() {
                    return value;
                }

                evaluated.insert(hash_key, HashPair { key, value });
            }

            Value::Hash(Rc::new(evaluated))
        }
    }
}

fn eval_expressions(
    expressions: &[Expression],
    env: &Rc<RefCell<Environment>>,
) -> Result<Vec<Value>, Value> {
    let mut result = Vec::with_capacity(expressions.len());

    for expression in expressions {
        let evaluated = eval_expression(expression, env);
        if evaluated.is_error() {
            return Err(evaluated);
        }
        result.push(evaluated);
    }

    Ok(result)
}

fn eval_prefix(operator: &str, right: Value, location: Location) -> Value {
    match operator {
        "!" => Value::Boolean(!right.is_truthy()),
        "-" => match right {
            Value::Integer(value) => Value::Integer(value.wrapping_neg()),
            other => new_error(
                format!("unknown operator: -{}", other.type_name()),
                Some(location),
            ),
        },
        _ => new_error(
            format!("unknown operator: {}{}", operator, right.type_name()),
            Some(location),
        ),
    }
}

fn eval_infix(operator: &str, left: Value, right: Value, location: Location) -> Value {
    match (&left, &right) {
        (Value::Integer(l), Value::Integer(r)) => {
            eval_integer_infix(operator, *l, *r, location)
        }
        (Value::String(l), Value::String(r)) => eval_string_infix(operator, l, r, location),
        _ => match operator {
            "==" => Value::Boolean(identity_eq(&left, &right)),
            "!=" => Value::Boolean(!identity_eq(&left, &right)),
            _ if left.type_name() != right.type_name() => new_error(
                format!(
                    "type mismatch: {} {} {}",
                    left.type_name(),
                    operator,
                    right.type_name()
                ),
                Some(location),
            ),
            _ => new_error(
                format!(
                    "unknown operator: {} {} {}",
                    left.type_name(),
                    operator,
                    right.type_name()
                ),
                Some(location),
            ),
        },
    }
}

fn eval_integer_infix(operator: &str, left: i64, right: i64, location: Location) -> Value {
    match operator {
        "+" => Value::Integer(left.wrapping_add(right)),
        "-" => Value::Integer(left.wrapping_sub(right)),
        "*" => Value::Integer(left.wrapping_mul(right)),
        "/" => {
            if right == 0 {
                return new_error("division by zero".to_string(), Some(location));
            }
            Value::Integer(left.wrapping_div(right))
        }
        "<" => Value::Boolean(left < right),
        "<=" => Value::Boolean(left <= right),
        ">" => Value::Boolean(left > right),
        ">=" => Value::Boolean(left >= right),
        "==" => Value::Boolean(left == right),
        "!=" => Value::Boolean(left != right),
        _ => new_error(
            format!("unknown operator: INTEGER {} INTEGER", operator),
            Some(location),
        ),
    }
}

fn eval_string_infix(operator: &str, left: &str, right: &str, location: Location) -> Value {
    match operator {
        "+" => Value::String(format!("{}{}", left, right)),
        // string subtraction removes every occurrence of the right side
        "-" => Value::String(left.replace(right, "")),
        "==" => Value::Boolean(left == right),
        "!=" => Value::Boolean(left != right),
        _ => new_error(
            format!("unknown operator: STRING {} STRING", operator),
            Some(location),
        ),
    }
}

fn eval_index(left: Value, index: Value, location: Location) -> Value {
    match (&left, &index) {
        (Value::Array(elements), Value::Integer(idx)) => {
            let max = elements.len() as i64 - 1;

            if *idx > max || -*idx > max + 1 {
                return Value::Null;
            }

            let access = if *idx < 0 { *idx + max + 1 } else { *idx };
            elements[access as usize].clone()
        }

        (Value::Hash(pairs), _) => {
            let hash_key = match index.hash_key() {
                Some(hash_key) => hash_key,
                None => {
                    return new_error(
                        format!("unusable as hash key: {}", index.type_name()),
                        Some(location),
                    )
                }
            };

            match pairs.get(&hash_key) {
                Some(pair) => pair.value.clone(),
                None => Value::Null,
            }
        }

        _ => new_error(
            format!("index operator not supported: {}", left.type_name()),
            Some(location),
        ),
    }
}

fn apply_function(function: Value, args: Vec<Value>, location: Location) -> Value {
    match function {
        Value::Function(function) => {
            let mut extended = Environment::new_enclosed(Rc::clone(&function.env));
            for (parameter, arg) in function.parameters.iter().zip(args) {
                extended.set(&parameter.name, arg);
            }

            let result = eval_block(&function.body, &Rc::new(RefCell::new(extended)));
            unwrap_return(result)
        }

        Value::Builtin(builtin) => (builtin.func)(args),

        other => new_error(
            format!("not a function: {}", other.type_name()),
            Some(location),
        ),
    }
}

// a return must stop at the call boundary instead of bubbling further up
fn unwrap_return(value: Value) -> Value {
    match value {
        Value::Return(inner) => *inner,
        other => other,
    }
}

fn new_error(message: String, location: Option<Location>) -> Value {
    Value::Error { message, location }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;
    use crate::frontend::parser::Parser;

    fn parse(input: &str) -> Program {
        let tokens = Lexer::new(input).tokenize();
        let mut parser = Parser::new(tokens);
        let program = parser.parse_program();
        assert!(
            parser.errors().is_empty(),
            "parser errors for {:?}: {:?}",
            input,
            parser.errors()
        );
        program
    }

    fn eval_source(input: &str) -> Value {
        let mut vm = VmAst::new();
        vm.run(&parse(input))
    }

    fn assert_int(input: &str, expected: i64) {
        assert_eq!(eval_source(input), Value::Integer(expected), "for {:?}", input);
    }

    fn assert_bool(input: &str, expected: bool) {
        assert_eq!(eval_source(input), Value::Boolean(expected), "for {:?}", input);
    }

    fn assert_error(input: &str, expected: &str) {
        match eval_source(input) {
            Value::Error { message, .. } => {
                assert_eq!(message, expected, "for {:?}", input)
            }
            other => panic!("for {:?}: expected error, got {:?}", input, other),
        }
    }

    #[test]
    fn test_integer_expressions() {
        assert_int("5", 5);
        assert_int("-5", -5);
        assert_int("5 + 5 + 5 + 5 - 10", 10);
        assert_int("2 * 2 * 2 * 2 * 2", 32);
        assert_int("(5 + 10 * 2 + 15 / 3) * 2 + -10", 50);
    }

    #[test]
    fn test_boolean_expressions() {
        assert_bool("true", true);
        assert_bool("1 < 2", true);
        assert_bool("1 <= 1", true);
        assert_bool("1 > 2", false);
        assert_bool("1 >= 2", false);
        assert_bool("1 == 1", true);
        assert_bool("true != false", true);
        assert_bool("(1 < 2) == true", true);
        assert_bool("!true", false);
        assert_bool("!!5", true);
    }

    #[test]
    fn test_conditionals() {
        assert_int("if (true) { 10 }", 10);
        assert_int("if (1 < 2) { 10 } else { 20 }", 10);
        assert_int("if (1 > 2) { 10 } else { 20 }", 20);
        assert_eq!(eval_source("if (false) { 10 }"), Value::Null);
    }

    #[test]
    fn test_return_statements() {
        assert_int("return 10;", 10);
        assert_int("return 10; 9;", 10);
        assert_int("return 2 * 5; 9;", 10);
        assert_int("9; return 2 * 5; 9;", 10);
        assert_int(
            "if (10 > 1) { if (10 > 1) { return 10; } return 1; }",
            10,
        );
    }

    #[test]
    fn test_let_statements() {
        assert_int("let a = 5; a;", 5);
        assert_int("let a = 5 * 5; a;", 25);
        assert_int("let a = 5; let b = a; b;", 5);
        assert_int("let a = 5; let b = a; let c = a + b + 5; c;", 15);
    }

    #[test]
    fn test_functions_bind_arguments() {
        assert_int("let identity = fn(x) { x; }; identity(5);", 5);
        assert_int("let identity = fn(x) { return x; }; identity(5);", 5);
        assert_int("let double = fn(x) { x * 2; }; double(5);", 10);
        assert_int("let add = fn(x, y) { x + y; }; add(5, 5);", 10);
        assert_int("let add = fn(x, y) { x + y; }; add(5 + 5, add(5, 5));", 20);
        assert_int("fn(x) { x; }(5)", 5);
    }

    #[test]
    fn test_closures() {
        assert_int(
            "let newAdder = fn(x) { fn(y) { x + y }; }; let addTwo = newAdder(2); addTwo(2);",
            4,
        );
    }

    #[test]
    fn test_string_operations() {
        assert_eq!(
            eval_source("\"don\" + \"key\""),
            Value::String("donkey".to_string())
        );
        assert_eq!(
            eval_source("\"donkey\" - \"key\""),
            Value::String("don".to_string())
        );
        assert_bool("\"a\" == \"a\"", true);
        assert_bool("\"a\" != \"b\"", true);
    }

    #[test]
    fn test_array_operations() {
        assert_int("[1, 2 * 2, 3 + 3][1]", 4);
        assert_int("let arr = [1, 2, 3]; arr[-1]", 3);
        assert_eq!(eval_source("[1, 2, 3][3]"), Value::Null);
        assert_eq!(eval_source("[1, 2, 3][-4]"), Value::Null);
        assert_int("len([1, 2, 3])", 3);
        assert_int("first([7, 8])", 7);
        assert_int("last([7, 8])", 8);
        assert_int("len(rest([1, 2, 3]))", 2);
        assert_int("last(push([1], 9))", 9);
    }

    #[test]
    fn test_hash_operations() {
        assert_int("{1: 2, 3: 4}[3]", 4);
        assert_int("{\"don\": 5}[\"don\"]", 5);
        assert_int("{true: 6}[true]", 6);
        assert_eq!(eval_source("{1: 2}[0]"), Value::Null);
    }

    #[test]
    fn test_error_handling() {
        assert_error("5 + true;", "type mismatch: INTEGER + BOOLEAN");
        assert_error("5 + true; 5;", "type mismatch: INTEGER + BOOLEAN");
        assert_error("-true", "unknown operator: -BOOLEAN");
        assert_error("true + false;", "unknown operator: BOOLEAN + BOOLEAN");
        assert_error("foobar", "identifier not found: foobar");
        assert_error("{[]: 1}", "unusable as hash key: ARRAY");
        assert_error("{1: 1}[[]]", "unusable as hash key: ARRAY");
        assert_error("5[0]", "index operator not supported: INTEGER");
        assert_error("5(1)", "not a function: INTEGER");
        assert_error("1 / 0", "division by zero");
    }

    #[test]
    fn test_errors_carry_locations() {
        match eval_source("let x =\n  nope;") {
            Value::Error { location, .. } => {
                let location = location.expect("location should be set");
                assert_eq!(location.line, 2);
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_backends_agree_on_shared_semantics() {
        use crate::bytecode::compile::Compiler;
        use crate::runtime::vm_bc::VmBc;

        let sources = vec![
            "1 + 2 * 3",
            "50 / 2 * 2 + 10 - 5",
            "-50 + 100 + -50",
            "(1 < 2) == true",
            "1 <= 1",
            "if (1 > 2) { 10 } else { 20 }",
            "if (false) { 10 }",
            "let a = 1; let b = 2; a + b",
            "\"don\" + \"key\"",
            "\"donkey\" - \"key\"",
            "[1, 2, 3][-1]",
            "{1: 2, 3: 4}[3]",
            "!(if (false) { 5 })",
        ];

        for source in sources {
            let program = parse(source);

            let mut evaluator = VmAst::new();
            let eval_result = evaluator.run(&program);

            let mut compiler = Compiler::new();
            compiler.compile(&program).unwrap();
            let mut vm = VmBc::new(compiler.bytecode());
            vm.run().unwrap();
            let vm_result = vm.last_popped_stack_elem();

            assert_eq!(
                eval_result, vm_result,
                "backends disagree on {:?}",
                source
            );
        }
    }
}
