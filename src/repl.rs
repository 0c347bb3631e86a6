use std::io::{self, BufRead, Write};

use crate::bytecode::symbol::SymbolTable;
use crate::bytecode::Compiler;
use crate::frontend::lexer::Lexer;
use crate::frontend::parser::Parser;
use crate::frontend::parser_error::ParserError;
use crate::lang::value::Value;
use crate::runtime::vm_bc::{VmBc, GLOBALS_SIZE};

pub const PROMPT: &str = "\u{1b}[33m💡 >> \u{1b}[0m";
const PARSER_ERROR_PROMPT: &str = "🚨 parser errors:";
const COMPILER_ERROR_PROMPT: &str = "🚨 compiler errors:";

/// Interactive loop over the bytecode pipeline.
///
/// The symbol table, constant pool and globals array outlive each turn, so a
/// binding made on one line still resolves on the next. Each turn builds a
/// fresh compiler and VM around that retained state.
pub fn start(input: &mut dyn BufRead, output: &mut dyn Write) -> io::Result<()> {
    let mut symbol_table = SymbolTable::new();
    let mut constants: Vec<Value> = Vec::new();
    let mut globals: Vec<Value> = vec![Value::Null; GLOBALS_SIZE];

    loop {
        write!(output, "{}", PROMPT)?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(());
        }

        let tokens = Lexer::new(&line).tokenize();
        let mut parser = Parser::new(tokens);
        let program = parser.parse_program();

        if !parser.errors().is_empty() {
            print_parser_errors(output, parser.errors())?;
            continue;
        }

        let mut compiler = Compiler::new_with_state(symbol_table, constants);
        let compiled = compiler.compile(&program);
        let bytecode = compiler.bytecode();
        (symbol_table, constants) = compiler.into_state();

        if let Err(err) = compiled {
            writeln!(output, "{}", COMPILER_ERROR_PROMPT)?;
            writeln!(output, "\t{}", err)?;
            continue;
        }

        let mut machine = VmBc::new_with_global_state(bytecode, globals);
        let ran = machine.run();
        let last_popped = machine.last_popped_stack_elem();
        globals = machine.into_globals();

        if let Err(err) = ran {
            writeln!(output, "Bytecode execution failed:")?;
            writeln!(output, "\t{}", err)?;
            continue;
        }

        writeln!(output, "{}", last_popped)?;
    }
}

fn print_parser_errors(output: &mut dyn Write, errors: &[ParserError]) -> io::Result<()> {
    writeln!(output, "{}", PARSER_ERROR_PROMPT)?;
    for error in errors {
        writeln!(output, "\t{}", error)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    fn run_session(source: &str) -> String {
        let mut input = BufReader::new(source.as_bytes());
        let mut output = Vec::new();
        start(&mut input, &mut output).expect("repl io should not fail");
        String::from_utf8(output).expect("repl output is utf-8")
    }

    #[test]
    fn test_bindings_survive_across_turns() {
        let output = run_session("let x = 1;\nx + 41\n");
        assert!(output.contains("42"), "output was: {}", output);
    }

    #[test]
    fn test_functions_survive_across_turns() {
        let output = run_session("let double = fn() { 21 * 2 };\ndouble()\n");
        assert!(output.contains("42"), "output was: {}", output);
    }

    #[test]
    fn test_parser_errors_do_not_kill_the_session() {
        let output = run_session("let = ;\n1 + 1\n");
        assert!(output.contains("parser errors"), "output was: {}", output);
        assert!(output.contains('2'), "output was: {}", output);
    }

    #[test]
    fn test_compile_errors_do_not_kill_the_session() {
        let output = run_session("nope\n1 + 1\n");
        assert!(
            output.contains("undefined variable nope"),
            "output was: {}",
            output
        );
        assert!(output.contains('2'), "output was: {}", output);
    }

    #[test]
    fn test_runtime_errors_do_not_kill_the_session() {
        let output = run_session("1 + true\n2 + 2\n");
        assert!(
            output.contains("unsupported types"),
            "output was: {}",
            output
        );
        assert!(output.contains('4'), "output was: {}", output);
    }
}
