use std::collections::HashMap;
use std::rc::Rc;

use crate::bytecode::op::read_u16;
use crate::bytecode::{Bytecode, Op};
use crate::lang::value::{identity_eq, CompiledFunction, HashKey, HashPair, Value};
use crate::runtime::frame::Frame;
use crate::runtime::runtime_error::{
    calling_non_function, division_by_zero, frame_overflow, index_not_supported, stack_overflow,
    stack_underflow, unknown_comparison_operator, unknown_integer_operator,
    unknown_string_operator, unsupported_binary_types, unsupported_negation, unusable_hash_key,
    RuntimeError,
};

pub const STACK_SIZE: usize = 2048;
pub const GLOBALS_SIZE: usize = 65536;
pub const MAX_FRAMES: usize = 1024;

/// The bytecode virtual machine: a value stack, a globals array, and a stack
/// of call frames over one compiled program.
///
/// `sp` always points at the next free slot; the top of stack is
/// `stack[sp - 1]`. Popped slots are not cleared, which is what makes
/// `last_popped_stack_elem` observable after a run.
pub struct VmBc {
    constants: Vec<Value>,
    globals: Vec<Value>,

    stack: Vec<Value>,
    sp: usize,

    frames: Vec<Frame>,
}

impl VmBc {
    pub fn new(bytecode: Bytecode) -> Self {
        let main_func = Rc::new(CompiledFunction {
            instructions: bytecode.instructions,
            num_locals: 0,
        });
        let main_frame = Frame::new(main_func, 0);

        VmBc {
            constants: bytecode.constants,
            globals: vec![Value::Null; GLOBALS_SIZE],
            stack: vec![Value::Null; STACK_SIZE],
            sp: 0,
            frames: vec![main_frame],
        }
    }

    /// A machine reusing a globals array from a previous run. The REPL uses
    /// this so bindings survive across turns.
    pub fn new_with_global_state(bytecode: Bytecode, globals: Vec<Value>) -> Self {
        let mut vm = VmBc::new(bytecode);
        vm.globals = globals;
        vm
    }

    /// Hands the globals array back for the next turn.
    pub fn into_globals(self) -> Vec<Value> {
        self.globals
    }

    /// The slot one past the top of stack: the value most recently popped.
    pub fn last_popped_stack_elem(&self) -> Value {
        self.stack[self.sp].clone()
    }

    pub fn run(&mut self) -> Result<(), RuntimeError> {
        while self.current_frame().ip < self.current_frame().instructions().len() as isize - 1 {
            self.current_frame_mut().ip += 1;

            let ip = self.current_frame().ip as usize;
            let byte = self.current_frame().instructions().0[ip];
            let op = match Op::from_byte(byte) {
                Some(op) => op,
                None => return Err(RuntimeError::new(format!("opcode {} undefined", byte))),
            };

            match op {
                Op::Pop => {
                    self.pop()?;
                }

                Op::Constant => {
                    let idx = self.read_u16_operand();
                    let constant = self.constants[idx].clone();
                    self.push(constant)?;
                }

                Op::Null => self.push(Value::Null)?,
                Op::True => self.push(Value::Boolean(true))?,
                Op::False => self.push(Value::Boolean(false))?,

                Op::Jump => {
                    let ip = self.current_frame().ip as usize;
                    let pos = read_u16(&self.current_frame().instructions().0[ip + 1..]) as isize;
                    // land one before the target; the loop will increment
                    self.current_frame_mut().ip = pos - 1;
                }

                Op::JumpNotTruthy => {
                    let pos = self.read_u16_operand() as isize;
                    let condition = self.pop()?;
                    if !condition.is_truthy() {
                        self.current_frame_mut().ip = pos - 1;
                    }
                }

                Op::SetGlobal => {
                    let idx = self.read_u16_operand();
                    self.globals[idx] = self.pop()?;
                }

                Op::GetGlobal => {
                    let idx = self.read_u16_operand();
                    let value = self.globals[idx].clone();
                    self.push(value)?;
                }

                Op::SetLocal => {
                    let idx = self.read_u8_operand();
                    let base_pointer = self.current_frame().base_pointer;
                    self.stack[base_pointer + idx] = self.pop()?;
                }

                Op::GetLocal => {
                    let idx = self.read_u8_operand();
                    let base_pointer = self.current_frame().base_pointer;
                    let value = self.stack[base_pointer + idx].clone();
                    self.push(value)?;
                }

                Op::Add | Op::Sub | Op::Mul | Op::Div => {
                    self.execute_binary_operation(op)?;
                }

                Op::Equal | Op::NotEqual | Op::GreaterThan | Op::GreaterOrEqual => {
                    self.execute_comparison(op)?;
                }

                Op::Bang => {
                    let operand = self.pop()?;
                    self.push(Value::Boolean(!operand.is_truthy()))?;
                }

                Op::Minus => {
                    let operand = self.pop()?;
                    match operand {
                        Value::Integer(value) => {
                            self.push(Value::Integer(value.wrapping_neg()))?
                        }
                        other => return Err(unsupported_negation(other.type_name())),
                    }
                }

                Op::Array => {
                    let length = self.read_u16_operand();
                    let elements = self.stack[self.sp - length..self.sp].to_vec();
                    self.sp -= length;
                    self.push(Value::Array(Rc::new(elements)))?;
                }

                Op::Hash => {
                    let length = self.read_u16_operand();
                    let hash = self.build_hash(self.sp - length, self.sp)?;
                    self.sp -= length;
                    self.push(hash)?;
                }

                Op::Index => {
                    let index = self.pop()?;
                    let left = self.pop()?;
                    self.execute_index(left, index)?;
                }

                Op::Call => {
                    let callee = self.stack[self.sp - 1].clone();
                    let func = match callee {
                        Value::CompiledFunction(func) => func,
                        other => return Err(calling_non_function(other.type_name())),
                    };

                    if self.frames.len() >= MAX_FRAMES {
                        return Err(frame_overflow());
                    }
                    if self.sp + func.num_locals > STACK_SIZE {
                        return Err(stack_overflow());
                    }

                    // the base pointer sits just above the callee; the
                    // reserved slots hold the function's locals
                    let frame = Frame::new(Rc::clone(&func), self.sp);
                    self.sp += func.num_locals;
                    self.frames.push(frame);
                }

                Op::ReturnValue => {
                    let value = self.pop()?;
                    let frame = self.pop_frame()?;
                    self.sp = frame.base_pointer - 1;
                    self.push(value)?;
                }

                Op::Return => {
                    let frame = self.pop_frame()?;
                    self.sp = frame.base_pointer - 1;
                    self.push(Value::Null)?;
                }
            }
        }
        Ok(())
    }

    fn current_frame(&self) -> &Frame {
        &self.frames[self.frames.len() - 1]
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn pop_frame(&mut self) -> Result<Frame, RuntimeError> {
        if self.frames.len() == 1 {
            // the main frame only ever halts, it never returns
            return Err(RuntimeError::new("return outside of a function"));
        }
        Ok(self.frames.pop().unwrap())
    }

    /// Reads a two-byte operand after the current opcode and advances the
    /// instruction pointer past it.
    fn read_u16_operand(&mut self) -> usize {
        let last = self.frames.len() - 1;
        let frame = &mut self.frames[last];
        let ip = frame.ip as usize;
        let value = read_u16(&frame.func.instructions.0[ip + 1..]) as usize;
        frame.ip += 2;
        value
    }

    fn read_u8_operand(&mut self) -> usize {
        let last = self.frames.len() - 1;
        let frame = &mut self.frames[last];
        let ip = frame.ip as usize;
        let value = frame.func.instructions.0[ip + 1] as usize;
        frame.ip += 1;
        value
    }

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.sp >= STACK_SIZE {
            return Err(stack_overflow());
        }
        self.stack[self.sp] = value;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        if self.sp == 0 {
            return Err(stack_underflow());
        }
        self.sp -= 1;
        Ok(self.stack[self.sp].clone())
    }

    fn execute_binary_operation(&mut self, op: Op) -> Result<(), RuntimeError> {
        let right = self.pop()?;
        let left = self.pop()?;

        match (&left, &right) {
            (Value::Integer(l), Value::Integer(r)) => {
                self.execute_binary_integer_operation(op, *l, *r)
            }
            (Value::String(l), Value::String(r)) => {
                self.execute_binary_string_operation(op, l, r)
            }
            _ => Err(unsupported_binary_types(
                left.type_name(),
                right.type_name(),
            )),
        }
    }

    fn execute_binary_integer_operation(
        &mut self,
        op: Op,
        left: i64,
        right: i64,
    ) -> Result<(), RuntimeError> {
        let result = match op {
            Op::Add => left.wrapping_add(right),
            Op::Sub => left.wrapping_sub(right),
            Op::Mul => left.wrapping_mul(right),
            Op::Div => {
                if right == 0 {
                    return Err(division_by_zero());
                }
                left.wrapping_div(right)
            }
            _ => return Err(unknown_integer_operator(op.def().name)),
        };

        self.push(Value::Integer(result))
    }

    fn execute_binary_string_operation(
        &mut self,
        op: Op,
        left: &str,
        right: &str,
    ) -> Result<(), RuntimeError> {
        let result = match op {
            Op::Add => format!("{}{}", left, right),
            // string subtraction removes every occurrence of the right side
            Op::Sub => left.replace(right, ""),
            _ => return Err(unknown_string_operator(op.def().name)),
        };

        self.push(Value::String(result))
    }

    fn execute_comparison(&mut self, op: Op) -> Result<(), RuntimeError> {
        let right = self.pop()?;
        let left = self.pop()?;

        if let (Value::Integer(l), Value::Integer(r)) = (&left, &right) {
            return self.execute_integer_comparison(op, *l, *r);
        }

        match op {
            Op::Equal => self.push(Value::Boolean(identity_eq(&left, &right))),
            Op::NotEqual => self.push(Value::Boolean(!identity_eq(&left, &right))),
            _ => Err(unknown_comparison_operator(
                op.def().name,
                left.type_name(),
                right.type_name(),
            )),
        }
    }

    fn execute_integer_comparison(
        &mut self,
        op: Op,
        left: i64,
        right: i64,
    ) -> Result<(), RuntimeError> {
        let result = match op {
            Op::Equal => left == right,
            Op::NotEqual => left != right,
            Op::GreaterThan => left > right,
            Op::GreaterOrEqual => left >= right,
            _ => return Err(unknown_integer_operator(op.def().name)),
        };

        self.push(Value::Boolean(result))
    }

    fn build_hash(&self, start: usize, end: usize) -> Result<Value, RuntimeError> {
        let mut pairs = HashMap::new();

        let mut i = start;
        while i < end {
            let key = self.stack[i].clone();
            let value = self.stack[i + 1].clone();

            let hash_key: HashKey = key
                .hash_key()
                .ok_or_else(|| unusable_hash_key(key.type_name()))?;

            pairs.insert(hash_key, HashPair { key, value });
            i += 2;
        }

        Ok(Value::Hash(Rc::new(pairs)))
    }

    fn execute_index(&mut self, left: Value, index: Value) -> Result<(), RuntimeError> {
        match (&left, &index) {
            (Value::Array(elements), Value::Integer(idx)) => {
                let max = elements.len() as i64 - 1;

                // out of range on either side yields null, never an error
                if *idx > max || -*idx > max + 1 {
                    return self.push(Value::Null);
                }

                // negative indices count from the back
                let access = if *idx < 0 { *idx + max + 1 } else { *idx };
                let element = elements[access as usize].clone();
                self.push(element)
            }

            (Value::Hash(pairs), _) => {
                let key = index
                    .hash_key()
                    .ok_or_else(|| unusable_hash_key(index.type_name()))?;

                match pairs.get(&key) {
                    Some(pair) => {
                        let value = pair.value.clone();
                        self.push(value)
                    }
                    None => self.push(Value::Null),
                }
            }

            _ => Err(index_not_supported(left.type_name())),
        }
    }
}
