use std::rc::Rc;

use crate::bytecode::op::Instructions;
use crate::lang::value::CompiledFunction;

/// Activation record for one function invocation.
///
/// The instruction pointer starts at -1 so that the run loop's pre-increment
/// lands on byte 0. The base pointer is the value-stack index where this
/// frame's local slots begin.
#[derive(Debug)]
pub struct Frame {
    pub func: Rc<CompiledFunction>,
    pub ip: isize,
    pub base_pointer: usize,
}

impl Frame {
    pub fn new(func: Rc<CompiledFunction>, base_pointer: usize) -> Self {
        Frame {
            func,
            ip: -1,
            base_pointer,
        }
    }

    pub fn instructions(&self) -> &Instructions {
        &self.func.instructions
    }
}
