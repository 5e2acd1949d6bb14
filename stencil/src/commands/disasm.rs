//! `stencil disasm` -- dumps a compiled template's bytecode, one
//! instruction per line, in the same byte layout the compiler writes and
//! the VM reads back.

use std::path::PathBuf;

use stencil_util::{OpCode, TemplateError};

use crate::error::{CliError, Result};

#[derive(Debug, Clone)]
pub struct DisasmArgs {
    pub template: PathBuf,
    pub verbose: bool,
}

pub fn run(args: DisasmArgs) -> Result<()> {
    let source = std::fs::read_to_string(&args.template)
        .map_err(|e| CliError::FileOperation(format!("reading {}: {e}", args.template.display())))?;

    tracing::debug!(template = %args.template.display(), "compiling template");

    let compiled = stencil::compile(&source)?;
    let program = compiled.program();

    println!("constants:");
    for (idx, constant) in program.constants.iter().enumerate() {
        println!("  {idx:>4} {constant:?}");
    }

    println!("code:");
    for line in disassemble(&program.code)? {
        println!("  {line}");
    }
    Ok(())
}

/// Renders one line of text per instruction: `offset  MNEMONIC operand...`.
/// Operand widths mirror exactly what `stencil-compile` emits for each
/// opcode -- see its `Compiler::emit_*` calls.
fn disassemble(code: &[u8]) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    let mut ip = 0usize;
    while ip < code.len() {
        let offset = ip;
        let byte = code[ip];
        let op = OpCode::from_u8(byte)
            .ok_or_else(|| CliError::from(TemplateError::internal(format!("unknown opcode {byte} at {offset}"))))?;
        ip += 1;

        let operands = match op {
            OpCode::Constant | OpCode::Global | OpCode::Selector | OpCode::Text => {
                let idx = read_u16(code, ip, offset)?;
                ip += 2;
                format!(" {idx}")
            }
            OpCode::Jump | OpCode::JumpIfFalsy | OpCode::JumpIfTruthy => {
                let target = read_u16(code, ip, offset)?;
                ip += 2;
                format!(" {target}")
            }
            OpCode::EnterFrame | OpCode::SetLocal => {
                let n = *code.get(ip).ok_or_else(|| truncated(offset))?;
                ip += 1;
                format!(" {n}")
            }
            OpCode::GetLocal => {
                let depth = *code.get(ip).ok_or_else(|| truncated(offset))?;
                let slot = *code.get(ip + 1).ok_or_else(|| truncated(offset))?;
                ip += 2;
                format!(" {depth} {slot}")
            }
            OpCode::Null
            | OpCode::False
            | OpCode::IterInit
            | OpCode::IterNext
            | OpCode::LeaveFrame
            | OpCode::Not
            | OpCode::Pop
            | OpCode::Render
            | OpCode::True
            | OpCode::SelectorDynamic => String::new(),
        };

        lines.push(format!("{offset:>4}  {}{operands}", op.mnemonic()));
    }
    Ok(lines)
}

fn read_u16(code: &[u8], ip: usize, offset: usize) -> Result<u16> {
    let hi = *code.get(ip).ok_or_else(|| truncated(offset))?;
    let lo = *code.get(ip + 1).ok_or_else(|| truncated(offset))?;
    Ok(u16::from_be_bytes([hi, lo]))
}

fn truncated(offset: usize) -> CliError {
    CliError::from(TemplateError::internal(format!("truncated operand at {offset}")))
}
