use std::mem;
use std::rc::Rc;

use crate::bytecode::compile_error::CompileError;
use crate::bytecode::op::{make, Instructions, Op};
use crate::bytecode::symbol::{SymbolScope, SymbolTable};
use crate::lang::ast::{BlockStatement, Expression, Program, Statement};
use crate::lang::value::{CompiledFunction, Value};
use serde::{Deserialize, Serialize};

/// The compiler's output: a flat instruction stream plus the constant pool
/// it references. This pair is the only thing handed to the VM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Value>,
}

#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: Op,
    position: usize,
}

/// Per-function instruction buffer. The memo of the last two emissions is
/// what enables the small in-place rewrites (dropping a trailing `OpPop`,
/// turning it into `OpReturnValue`).
#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Instructions,
    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,
}

/// Single-pass AST-to-bytecode compiler.
///
/// Function literals open a fresh compilation scope and a fresh symbol table
/// scope; leaving the scope yields the function's instruction stream, which
/// becomes a constant. Forward jumps are emitted with a placeholder operand
/// and back-patched once the target offset is known.
pub struct Compiler {
    constants: Vec<Value>,
    symbol_table: SymbolTable,
    scopes: Vec<CompilationScope>,
    scope_index: usize,
}

impl Compiler {
    pub fn new() -> Self {
        Compiler {
            constants: Vec::new(),
            symbol_table: SymbolTable::new(),
            scopes: vec![CompilationScope::default()],
            scope_index: 0,
        }
    }

    /// A compiler that picks up where a previous one left off. The REPL uses
    /// this to keep identifiers and constant indices stable across turns.
    pub fn new_with_state(symbol_table: SymbolTable, constants: Vec<Value>) -> Self {
        let mut compiler = Compiler::new();
        compiler.symbol_table = symbol_table;
        compiler.constants = constants;
        compiler
    }

    /// Hands the symbol table and constant pool back for the next turn.
    pub fn into_state(self) -> (SymbolTable, Vec<Value>) {
        (self.symbol_table, self.constants)
    }

    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.current_instructions().clone(),
            constants: self.constants.clone(),
        }
    }

    pub fn compile(&mut self, program: &Program) -> Result<(), CompileError> {
        for statement in &program.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    fn compile_statement(&mut self, statement: &Statement) -> Result<(), CompileError> {
        match statement {
            Statement::Expression { expression } => {
                self.compile_expression(expression)?;
                self.emit(Op::Pop, &[]);
            }

            Statement::Let { name, value } => {
                self.compile_expression(value)?;
                let symbol = self.symbol_table.define(&name.name);
                match symbol.scope {
                    SymbolScope::Global => self.emit(Op::SetGlobal, &[symbol.index]),
                    SymbolScope::Local => self.emit(Op::SetLocal, &[symbol.index]),
                };
            }

            Statement::Return { value } => {
                self.compile_expression(value)?;
                self.emit(Op::ReturnValue, &[]);
            }
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &BlockStatement) -> Result<(), CompileError> {
        for statement in &block.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    fn compile_expression(&mut self, expression: &Expression) -> Result<(), CompileError> {
        match expression {
            Expression::Identifier(ident) => {
                let symbol = self
                    .symbol_table
                    .resolve(&ident.name)
                    .ok_or_else(|| CompileError::undefined_variable(&ident.name))?;
                match symbol.scope {
                    SymbolScope::Global => self.emit(Op::GetGlobal, &[symbol.index]),
                    SymbolScope::Local => self.emit(Op::GetLocal, &[symbol.index]),
                };
            }

            Expression::IntegerLiteral(value) => {
                let idx = self.add_constant(Value::Integer(*value));
                self.emit(Op::Constant, &[idx]);
            }

            Expression::StringLiteral(value) => {
                let idx = self.add_constant(Value::String(value.clone()));
                self.emit(Op::Constant, &[idx]);
            }

            Expression::BooleanLiteral(value) => {
                if *value {
                    self.emit(Op::True, &[]);
                } else {
                    self.emit(Op::False, &[]);
                }
            }

            Expression::Prefix {
                operator, right, ..
            } => {
                self.compile_expression(right)?;
                match operator.as_str() {
                    "!" => self.emit(Op::Bang, &[]),
                    "-" => self.emit(Op::Minus, &[]),
                    _ => return Err(CompileError::unknown_operator(operator)),
                };
            }

            Expression::Infix {
                operator,
                left,
                right,
                ..
            } => {
                // `<` and `<=` compile with flipped operands so the
                // instruction set only needs the greater-than forms.
                let (first, second) = if reorders(operator) {
                    (right, left)
                } else {
                    (left, right)
                };

                self.compile_expression(first)?;
                self.compile_expression(second)?;

                let op = match operator.as_str() {
                    "+" => Op::Add,
                    "-" => Op::Sub,
                    "*" => Op::Mul,
                    "/" => Op::Div,
                    "==" => Op::Equal,
                    "!=" => Op::NotEqual,
                    ">" | "<" => Op::GreaterThan,
                    ">=" | "<=" => Op::GreaterOrEqual,
                    _ => return Err(CompileError::unknown_operator(operator)),
                };
                self.emit(op, &[]);
            }

            Expression::If {
                condition,
                consequence,
                alternative,
            } => {
                self.compile_expression(condition)?;

                // Placeholder operand, back-patched below.
                let jump_not_truthy_pos = self.emit(Op::JumpNotTruthy, &[9999]);

                self.compile_block(consequence)?;
                if self.last_instruction_is(Op::Pop) {
                    self.remove_last_instruction();
                }

                // Placeholder operand, back-patched below.
                let jump_pos = self.emit(Op::Jump, &[9999]);

                let after_consequence_pos = self.current_instructions().len();
                self.change_operand(jump_not_truthy_pos, after_consequence_pos);

                match alternative {
                    // no else-block: the expression still produces a value
                    None => {
                        self.emit(Op::Null, &[]);
                    }
                    Some(alternative) => {
                        self.compile_block(alternative)?;
                        if self.last_instruction_is(Op::Pop) {
                            self.remove_last_instruction();
                        }
                    }
                }

                let after_alternative_pos = self.current_instructions().len();
                self.change_operand(jump_pos, after_alternative_pos);
            }

            Expression::Function { body, .. } => {
                self.enter_scope();

                self.compile_block(body)?;

                // implicit returns: fn(){ 5 } returns 5
                if self.last_instruction_is(Op::Pop) {
                    self.replace_last_instruction(Op::ReturnValue);
                }
                // empty body: fn(){} returns null
                if !self.last_instruction_is(Op::ReturnValue) {
                    self.emit(Op::Return, &[]);
                }

                let num_locals = self.symbol_table.num_definitions;
                let instructions = self.leave_scope();

                let func = Value::CompiledFunction(Rc::new(CompiledFunction {
                    instructions,
                    num_locals,
                }));
                let idx = self.add_constant(func);
                self.emit(Op::Constant, &[idx]);
            }

            Expression::Call { function, .. } => {
                self.compile_expression(function)?;
                // OpCall carries no arity and arguments are not compiled;
                // the callee on top of the stack is all the frame setup sees.
                self.emit(Op::Call, &[]);
            }

            Expression::Index { left, index, .. } => {
                self.compile_expression(left)?;
                self.compile_expression(index)?;
                self.emit(Op::Index, &[]);
            }

            Expression::Array { elements } => {
                for element in elements {
                    self.compile_expression(element)?;
                }
                self.emit(Op::Array, &[elements.len()]);
            }

            Expression::Hash { pairs, .. } => {
                // Sort keys by their rendering so the emitted order is
                // deterministic regardless of how the pairs were collected.
                let mut sorted: Vec<&(Expression, Expression)> = pairs.iter().collect();
                sorted.sort_by_key(|pair| pair.0.to_string());

                for (key, value) in sorted {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(Op::Hash, &[pairs.len() * 2]);
            }
        }
        Ok(())
    }

    fn emit(&mut self, op: Op, operands: &[usize]) -> usize {
        let instruction = make(op, operands);
        let pos = self.add_instruction(instruction);

        self.set_last_instruction(op, pos);
        pos
    }

    fn add_instruction(&mut self, instruction: Vec<u8>) -> usize {
        let scope = &mut self.scopes[self.scope_index];
        let pos = scope.instructions.len();
        scope.instructions.0.extend_from_slice(&instruction);
        pos
    }

    fn set_last_instruction(&mut self, opcode: Op, position: usize) {
        let scope = &mut self.scopes[self.scope_index];
        scope.previous_instruction = scope.last_instruction;
        scope.last_instruction = Some(EmittedInstruction { opcode, position });
    }

    fn last_instruction_is(&self, op: Op) -> bool {
        self.scopes[self.scope_index]
            .last_instruction
            .map_or(false, |last| last.opcode == op)
    }

    fn remove_last_instruction(&mut self) {
        let scope = &mut self.scopes[self.scope_index];
        if let Some(last) = scope.last_instruction {
            scope.instructions.0.truncate(last.position);
            scope.last_instruction = scope.previous_instruction;
        }
    }

    /// Overwrites bytes at `pos`; the replacement must have the same length
    /// as the instruction it replaces.
    fn replace_instruction(&mut self, pos: usize, new_instruction: &[u8]) {
        let instructions = &mut self.scopes[self.scope_index].instructions.0;
        instructions[pos..pos + new_instruction.len()].copy_from_slice(new_instruction);
    }

    fn replace_last_instruction(&mut self, op: Op) {
        if let Some(last) = self.scopes[self.scope_index].last_instruction {
            self.replace_instruction(last.position, &make(op, &[]));
            if let Some(last) = &mut self.scopes[self.scope_index].last_instruction {
                last.opcode = op;
            }
        }
    }

    /// Re-encodes the instruction at `pos` with a new operand (back-patching
    /// a placeholder jump target).
    fn change_operand(&mut self, pos: usize, operand: usize) {
        if let Some(op) = Op::from_byte(self.current_instructions().0[pos]) {
            let new_instruction = make(op, &[operand]);
            self.replace_instruction(pos, &new_instruction);
        }
    }

    fn current_instructions(&self) -> &Instructions {
        &self.scopes[self.scope_index].instructions
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        self.scope_index += 1;

        let outer = mem::take(&mut self.symbol_table);
        self.symbol_table = SymbolTable::new_enclosed(outer);
    }

    fn leave_scope(&mut self) -> Instructions {
        let scope = self.scopes.pop().unwrap_or_default();
        self.scope_index = self.scope_index.saturating_sub(1);

        if let Some(outer) = self.symbol_table.outer.take() {
            self.symbol_table = *outer;
        }

        scope.instructions
    }

    fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}

fn reorders(operator: &str) -> bool {
    operator == "<" || operator == "<="
}
