//! The stack machine that executes a compiled [`Program`] against a
//! [`Bindings`] root, producing rendered output.
//!
//! Modeled on the dispatch loop of a classic bytecode interpreter: read the
//! opcode at `ip`, advance past its operands, perform the effect, repeat
//! until `ip` runs off the end of `code`.

use stencil_compile::{Constant, OpCode, Program};
use stencil_util::{Span, TemplateError};

use crate::bindings::Bindings;
use crate::serializer::{DefaultSerializer, Serializer};
use crate::undefined::{Permissive, UndefinedPolicy};
use crate::value::Value;

/// Runs `program` against `bindings` using the default serializer and the
/// permissive undefined-value policy.
pub fn run(program: &Program, bindings: &Bindings) -> Result<String, TemplateError> {
    run_with(program, bindings, &DefaultSerializer, &Permissive)
}

/// Runs `program` with an explicit serializer and undefined-value policy.
pub fn run_with(
    program: &Program,
    bindings: &Bindings,
    serializer: &dyn Serializer,
    policy: &dyn UndefinedPolicy,
) -> Result<String, TemplateError> {
    let mut vm = Vm {
        code: &program.code,
        constants: &program.constants,
        stack: Vec::new(),
        frames: Vec::new(),
        output: String::new(),
        ip: 0,
    };
    vm.exec(bindings, serializer, policy)?;
    Ok(vm.output)
}

/// An activation record pushed by `ENTER_FRAME`, popped by `LEAVE_FRAME`.
/// Holds one local slot per loop variable (plus an entered-flag slot for
/// `for ... else`).
struct Frame {
    slots: Vec<Value>,
}

/// What `ITER_INIT` pushes in place of the iterable it consumed. Eagerly
/// materializes the element sequence -- templates are short-lived and this
/// keeps `ITER_NEXT` a simple index bump.
struct IterCursor {
    items: Vec<Value>,
    next: usize,
}

impl IterCursor {
    fn from_value(value: &Value, policy: &dyn UndefinedPolicy) -> Self {
        let items = match value {
            Value::Array(items) => items.as_ref().clone(),
            Value::String(s) => s.chars().map(|c| Value::string(c.to_string())).collect(),
            Value::Object(map) => map.keys().map(|k| Value::string(k.clone())).collect(),
            Value::Undefined(info) => policy.iterate(info),
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) => Vec::new(),
        };
        Self { items, next: 0 }
    }

    fn advance(&mut self) -> Option<Value> {
        let item = self.items.get(self.next)?.clone();
        self.next += 1;
        Some(item)
    }
}

/// One slot of the operand stack: either a plain value, or the live
/// iterator state an enclosing `for` loop is stepping through. Kept as a
/// single stack (rather than a side channel) so `ITER_NEXT`/`POP` at loop
/// exit follow ordinary stack discipline.
enum Cell {
    Value(Value),
    Iter(IterCursor),
}

struct Vm<'p> {
    code: &'p [u8],
    constants: &'p [Constant],
    stack: Vec<Cell>,
    frames: Vec<Frame>,
    output: String,
    ip: usize,
}

impl<'p> Vm<'p> {
    fn exec(
        &mut self,
        bindings: &Bindings,
        serializer: &dyn Serializer,
        policy: &dyn UndefinedPolicy,
    ) -> Result<(), TemplateError> {
        while self.ip < self.code.len() {
            let byte = self.code[self.ip];
            let op = OpCode::from_u8(byte)
                .ok_or_else(|| TemplateError::internal(format!("invalid opcode byte {byte}")))?;
            self.ip += 1;
            tracing::trace!(op = op.mnemonic(), ip = self.ip - 1, "exec");
            self.step(op, bindings, serializer, policy)?;
        }
        Ok(())
    }

    fn step(
        &mut self,
        op: OpCode,
        bindings: &Bindings,
        serializer: &dyn Serializer,
        policy: &dyn UndefinedPolicy,
    ) -> Result<(), TemplateError> {
        match op {
            OpCode::Null => self.push_value(Value::Null),
            OpCode::True => self.push_value(Value::Bool(true)),
            OpCode::False => self.push_value(Value::Bool(false)),
            OpCode::Not => {
                let v = self.pop_value()?;
                self.push_value(Value::Bool(!self.truthy(&v, policy)));
            }
            OpCode::Pop => {
                self.pop_cell()?;
            }
            OpCode::Constant => {
                let idx = self.read_u16();
                self.push_value(self.constant_value(idx)?);
            }
            OpCode::Text => {
                let idx = self.read_u16();
                let text = self.constant_str(idx)?;
                self.output.push_str(text);
            }
            OpCode::Global => {
                let idx = self.read_u16();
                let name = self.constant_str(idx)?.to_string();
                let value = bindings.get(&name).cloned().unwrap_or_else(|| Value::undefined(name, Span::DUMMY));
                self.push_value(value);
            }
            OpCode::Selector => {
                let idx = self.read_u16();
                let key = self.constant_str(idx)?.to_string();
                let container = self.pop_value()?;
                self.push_value(container.select(&key, Span::DUMMY));
            }
            OpCode::SelectorDynamic => {
                let key = self.pop_value()?;
                let container = self.pop_value()?;
                self.push_value(container.select_dynamic(&key, Span::DUMMY));
            }
            OpCode::EnterFrame => {
                let n = self.read_u8();
                self.frames.push(Frame { slots: vec![Value::Null; n as usize] });
            }
            OpCode::LeaveFrame => {
                self.frames.pop().ok_or_else(|| TemplateError::internal("LEAVE_FRAME with no active frame"))?;
            }
            OpCode::SetLocal => {
                let slot = self.read_u8();
                let v = self.pop_value()?;
                self.current_frame_mut()?.slots[slot as usize] = v;
            }
            OpCode::GetLocal => {
                let depth = self.read_u8();
                let slot = self.read_u8();
                let value = self.frame_at(depth)?.slots[slot as usize].clone();
                self.push_value(value);
            }
            OpCode::IterInit => {
                let v = self.pop_value()?;
                self.stack.push(Cell::Iter(IterCursor::from_value(&v, policy)));
            }
            OpCode::IterNext => {
                let cursor = self.peek_iter_mut()?;
                match cursor.advance() {
                    Some(item) => {
                        self.stack.push(Cell::Value(item));
                        self.stack.push(Cell::Value(Value::Bool(true)));
                    }
                    None => self.stack.push(Cell::Value(Value::Bool(false))),
                }
            }
            OpCode::JumpIfFalsy => {
                let target = self.read_u16();
                let top = self.peek_value()?;
                if !self.truthy(&top, policy) {
                    self.jump(target)?;
                }
            }
            OpCode::JumpIfTruthy => {
                let target = self.read_u16();
                let top = self.peek_value()?;
                if self.truthy(&top, policy) {
                    self.jump(target)?;
                }
            }
            OpCode::Jump => {
                let target = self.read_u16();
                self.jump(target)?;
            }
            OpCode::Render => {
                let v = self.pop_value()?;
                let text = match &v {
                    Value::Undefined(info) => {
                        let rendered = policy.stringify(info);
                        if rendered.is_err() {
                            tracing::warn!(name = %info.name, "undefined variable rendered under strict policy");
                        }
                        rendered?
                    }
                    other => serializer.serialize(other)?,
                };
                self.output.push_str(&text);
            }
        }
        Ok(())
    }

    // -- stack helpers -----------------------------------------------------

    fn push_value(&mut self, value: Value) {
        self.stack.push(Cell::Value(value));
    }

    fn pop_cell(&mut self) -> Result<Cell, TemplateError> {
        self.stack.pop().ok_or_else(|| TemplateError::internal("operand stack underflow"))
    }

    fn pop_value(&mut self) -> Result<Value, TemplateError> {
        match self.pop_cell()? {
            Cell::Value(v) => Ok(v),
            Cell::Iter(_) => Err(TemplateError::internal("expected a value, found an iterator cell")),
        }
    }

    fn peek_value(&self) -> Result<Value, TemplateError> {
        match self.stack.last() {
            Some(Cell::Value(v)) => Ok(v.clone()),
            Some(Cell::Iter(_)) => Err(TemplateError::internal("expected a value, found an iterator cell")),
            None => Err(TemplateError::internal("operand stack underflow")),
        }
    }

    fn peek_iter_mut(&mut self) -> Result<&mut IterCursor, TemplateError> {
        match self.stack.last_mut() {
            Some(Cell::Iter(cursor)) => Ok(cursor),
            Some(Cell::Value(_)) => Err(TemplateError::internal("expected an iterator cell, found a value")),
            None => Err(TemplateError::internal("operand stack underflow")),
        }
    }

    fn truthy(&self, value: &Value, policy: &dyn UndefinedPolicy) -> bool {
        match value {
            Value::Undefined(info) => policy.truthy(info),
            other => other.is_truthy(),
        }
    }

    // -- frames --------------------------------------------------------------

    fn current_frame_mut(&mut self) -> Result<&mut Frame, TemplateError> {
        self.frames.last_mut().ok_or_else(|| TemplateError::internal("no active frame for local access"))
    }

    fn frame_at(&self, depth: u8) -> Result<&Frame, TemplateError> {
        let len = self.frames.len();
        let idx = len
            .checked_sub(1 + depth as usize)
            .ok_or_else(|| TemplateError::internal(format!("frame depth {depth} out of range (have {len})")))?;
        Ok(&self.frames[idx])
    }

    // -- bytecode reading ------------------------------------------------------

    fn read_u8(&mut self) -> u8 {
        let b = self.code[self.ip];
        self.ip += 1;
        b
    }

    fn read_u16(&mut self) -> u16 {
        let hi = self.code[self.ip];
        let lo = self.code[self.ip + 1];
        self.ip += 2;
        u16::from_be_bytes([hi, lo])
    }

    fn jump(&mut self, target: u16) -> Result<(), TemplateError> {
        let target = target as usize;
        if target > self.code.len() {
            return Err(TemplateError::internal(format!("jump target {target} out of range ({} bytes)", self.code.len())));
        }
        self.ip = target;
        Ok(())
    }

    fn constant(&self, idx: u16) -> Result<&Constant, TemplateError> {
        self.constants
            .get(idx as usize)
            .ok_or_else(|| TemplateError::internal(format!("constant index {idx} out of range")))
    }

    fn constant_value(&self, idx: u16) -> Result<Value, TemplateError> {
        Ok(match self.constant(idx)? {
            Constant::Str(s) => Value::string(s.clone()),
            Constant::Int(n) => Value::Int(*n),
        })
    }

    fn constant_str(&self, idx: u16) -> Result<&str, TemplateError> {
        match self.constant(idx)? {
            Constant::Str(s) => Ok(s.as_str()),
            Constant::Int(_) => Err(TemplateError::internal(format!("constant {idx} is not a string"))),
        }
    }
}
