//! The bytecode instruction set shared by `stencil-compile` (which emits it)
//! and `stencil-vm` (which executes it).
//!
//! Every instruction is a one-byte opcode followed by zero or more
//! big-endian operand bytes. Living in this crate (rather than in either
//! the compiler or the VM) keeps the two in lockstep: there is exactly one
//! definition of what opcode `5` means.

/// One bytecode instruction. `#[repr(u8)]` so the discriminant *is* the wire
/// value the compiler writes and the VM reads back with [`OpCode::from_u8`].
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpCode {
    /// Push `Null`.
    Null = 0,
    /// `idx(2)`: push `constants[idx]`.
    Constant = 1,
    /// `n(1)`: push a frame with `n` local slots, all `Null`.
    EnterFrame = 2,
    /// Push `Bool(false)`.
    False = 3,
    /// `depth(1) slot(1)`: push the given slot from the frame `depth` levels out.
    GetLocal = 4,
    /// `idx(2)`: look up `constants[idx]` in the root binding.
    Global = 5,
    /// Pop an iterable, push an internal iterator value.
    IterInit = 6,
    /// Advance the iterator on top of stack; push element + `true`, or just `false`.
    IterNext = 7,
    /// `target(2)`: peek top; jump there if falsy.
    JumpIfFalsy = 8,
    /// `target(2)`: peek top; jump there if truthy.
    JumpIfTruthy = 9,
    /// `target(2)`: unconditional jump.
    Jump = 10,
    /// Pop the current frame.
    LeaveFrame = 11,
    /// Pop a value, push its logical negation.
    Not = 12,
    /// Pop and discard the top of stack.
    Pop = 13,
    /// Pop a value, serialize it, append to the output buffer.
    Render = 14,
    /// `idx(2)`: pop a container, push `container[constants[idx]]`.
    Selector = 15,
    /// `slot(1)`: pop a value into the current frame's slot.
    SetLocal = 16,
    /// `idx(2)`: append `constants[idx]` (a string) to the output buffer.
    Text = 17,
    /// Push `Bool(true)`.
    True = 18,
    /// Pop a key value and a container; push `container[key]` or
    /// `Undefined`. Extension beyond the worked scenarios' opcode table:
    /// `SELECTOR` alone cannot express a bracketed key that is itself a
    /// path expression (`a[b.c]`), since its operand is a constant-pool
    /// index, not a stack value. See DESIGN.md.
    SelectorDynamic = 19,
}

impl OpCode {
    /// Decodes a raw opcode byte, or `None` for an unknown value -- the VM
    /// turns that into an `Internal` error rather than panicking, since a
    /// foreign byte stream should never reach it in normal operation.
    pub const fn from_u8(byte: u8) -> Option<OpCode> {
        use OpCode::*;
        Some(match byte {
            0 => Null,
            1 => Constant,
            2 => EnterFrame,
            3 => False,
            4 => GetLocal,
            5 => Global,
            6 => IterInit,
            7 => IterNext,
            8 => JumpIfFalsy,
            9 => JumpIfTruthy,
            10 => Jump,
            11 => LeaveFrame,
            12 => Not,
            13 => Pop,
            14 => Render,
            15 => Selector,
            16 => SetLocal,
            17 => Text,
            18 => True,
            19 => SelectorDynamic,
            _ => return None,
        })
    }

    pub const fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Null => "NULL",
            OpCode::Constant => "CONSTANT",
            OpCode::EnterFrame => "ENTER_FRAME",
            OpCode::False => "FALSE",
            OpCode::GetLocal => "GET_LOCAL",
            OpCode::Global => "GLOBAL",
            OpCode::IterInit => "ITER_INIT",
            OpCode::IterNext => "ITER_NEXT",
            OpCode::JumpIfFalsy => "JUMP_IF_FALSY",
            OpCode::JumpIfTruthy => "JUMP_IF_TRUTHY",
            OpCode::Jump => "JUMP",
            OpCode::LeaveFrame => "LEAVE_FRAME",
            OpCode::Not => "NOT",
            OpCode::Pop => "POP",
            OpCode::Render => "RENDER",
            OpCode::Selector => "SELECTOR",
            OpCode::SetLocal => "SET_LOCAL",
            OpCode::Text => "TEXT",
            OpCode::True => "TRUE",
            OpCode::SelectorDynamic => "SELECTOR_DYNAMIC",
        }
    }
}
