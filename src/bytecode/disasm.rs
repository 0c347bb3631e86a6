use crate::bytecode::compile::Bytecode;
use crate::bytecode::op::{read_operands, Definition, Instructions, Op};
use crate::lang::value::Value;

/// Disassembly is the `Display` of an instruction stream: one line per
/// instruction, `NNNN OpName operands…`, where NNNN is the zero-padded byte
/// offset. Undefined bytes produce an ERROR line and decoding continues at
/// the next byte.
impl std::fmt::Display for Instructions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut i = 0;
        while i < self.0.len() {
            let op = match Op::from_byte(self.0[i]) {
                Some(op) => op,
                None => {
                    writeln!(f, "ERROR: opcode {} undefined", self.0[i])?;
                    i += 1;
                    continue;
                }
            };

            let def = op.def();
            let (operands, read) = read_operands(def, &self.0[i + 1..]);
            writeln!(f, "{:04} {}", i, fmt_instruction(def, &operands))?;

            i += 1 + read;
        }
        Ok(())
    }
}

fn fmt_instruction(def: &Definition, operands: &[usize]) -> String {
    if operands.len() != def.operand_widths.len() {
        return format!(
            "ERROR: operand len {} does not match defined {}",
            operands.len(),
            def.operand_widths.len()
        );
    }

    match operands.len() {
        0 => def.name.to_string(),
        1 => format!("{} {}", def.name, operands[0]),
        _ => format!("ERROR: unhandled operand count for {}", def.name),
    }
}

/// Prints a whole bytecode bundle: the main instruction stream followed by
/// the constant pool, with compiled-function constants disassembled inline.
pub fn print_bc(bytecode: &Bytecode) {
    println!("════════════════════════════════════════");
    println!(" main");
    println!("════════════════════════════════════════");
    print!("{}", bytecode.instructions);
    println!();

    for (i, constant) in bytecode.constants.iter().enumerate() {
        match constant {
            Value::CompiledFunction(func) => {
                println!("════════════════════════════════════════");
                println!(" constants[{}]  fn, {} locals", i, func.num_locals);
                println!("════════════════════════════════════════");
                print!("{}", func.instructions);
                println!();
            }
            other => println!("constants[{}] = {}", i, other),
        }
    }
}
