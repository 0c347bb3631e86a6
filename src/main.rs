mod bytecode;
mod frontend;
mod lang;
mod repl;
mod runtime;

use std::{env, fs, io, path::Path, process};

use crate::bytecode::disasm::print_bc;
use crate::bytecode::Compiler;
use crate::frontend::lexer::Lexer;
use crate::frontend::parser::Parser;
use crate::lang::ast::Program;
use crate::runtime::{VmAst, VmBc};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.contains(&"--help".to_string()) || args.contains(&"-h".to_string()) {
        print_usage();
        return;
    }

    let tokens_only = args.contains(&"--tokens".to_string());
    let ast_only = args.contains(&"--ast".to_string());
    let disassemble = args.contains(&"--dis".to_string());
    let eval = args.contains(&"--eval".to_string());

    // first non-flag argument is the filename
    let filename = args.iter().skip(1).find(|a| !a.starts_with('-'));

    match filename {
        Some(filename) => {
            ensure_extension(filename);
            match fs::read_to_string(filename) {
                Ok(source) => {
                    if tokens_only {
                        dump_tokens(&source);
                    } else {
                        run_program(&source, ast_only, disassemble, eval);
                    }
                }
                Err(e) => {
                    eprintln!("Failed to read '{}': {}", filename, e);
                    process::exit(1);
                }
            }
        }
        None => {
            let user = env::var("USER").unwrap_or_else(|_| "friend".to_string());
            println!("Hello {}! This is the donkey programming language!", user);
            println!("Feel free to type in commands");

            let stdin = io::stdin();
            let stdout = io::stdout();
            if let Err(e) = repl::start(&mut stdin.lock(), &mut stdout.lock()) {
                eprintln!("repl error: {}", e);
                process::exit(1);
            }
        }
    }
}

fn print_usage() {
    println!("DONKEY - a small scripting language");
    println!();
    println!("Usage:");
    println!("  donkey                    Start interactive REPL");
    println!("  donkey <file.dk>          Compile and run a program (bytecode VM)");
    println!("  donkey --eval <file.dk>   Run a program on the tree-walking backend");
    println!("  donkey --tokens <file.dk> Show lexed tokens only");
    println!("  donkey --ast <file.dk>    Show the parsed program only");
    println!("  donkey --dis <file.dk>    Show disassembled bytecode instead of running");
    println!("  donkey --help, -h         Show this help");
}

fn ensure_extension(filename: &str) {
    let path = Path::new(filename);
    if path.extension().and_then(|e| e.to_str()) != Some("dk") {
        eprintln!("Error: expected a .dk file, got {}", filename);
        process::exit(1);
    }
}

fn dump_tokens(source: &str) {
    for token in Lexer::new(source).tokenize() {
        println!(
            "{:>4}:{:<3} {:?} {:?}",
            token.location.line, token.location.column, token.kind, token.literal
        );
    }
}

fn parse_or_exit(source: &str) -> Program {
    let tokens = Lexer::new(source).tokenize();
    let mut parser = Parser::new(tokens);
    let program = parser.parse_program();

    if !parser.errors().is_empty() {
        eprintln!("Parse errors:");
        for error in parser.errors() {
            eprintln!("\t{}", error);
        }
        process::exit(1);
    }

    program
}

fn run_program(source: &str, ast_only: bool, disassemble: bool, eval: bool) {
    let program = parse_or_exit(source);

    if ast_only {
        println!("{:#?}", program);
        return;
    }

    if eval {
        run_program_ast(&program);
    } else {
        run_program_bc(&program, disassemble);
    }
}

fn run_program_ast(program: &Program) {
    let mut vm = VmAst::new();
    let result = vm.run(program);

    if result.is_error() {
        eprintln!("{}", result);
        process::exit(1);
    }

    println!("{}", result);
}

fn run_program_bc(program: &Program, disassemble: bool) {
    let mut compiler = Compiler::new();
    if let Err(e) = compiler.compile(program) {
        eprintln!("Compile error: {}", e);
        process::exit(1);
    }

    let bytecode = compiler.bytecode();

    if disassemble {
        print_bc(&bytecode);
        return;
    }

    let mut vm = VmBc::new(bytecode);
    if let Err(e) = vm.run() {
        eprintln!("{}", e);
        process::exit(1);
    }

    println!("{}", vm.last_popped_stack_elem());
}
