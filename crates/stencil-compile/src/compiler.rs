//! Lowers a parsed [`Node`] tree into a flat [`Program`].
//!
//! One pass over the AST, emitting bytecode into a growable buffer and
//! literal values into a deduplicated constant pool. A side-table
//! (`const_index`) gives O(1) dedup lookups -- the same shape as the
//! teacher's string interner, just scoped to a single `Compiler` instead of
//! living behind a process-global table.

use std::collections::HashMap;

use stencil_par::{BinaryOp, Expr, IndexKey, Node, Segment, UnaryOp};
use stencil_util::{OpCode, TemplateError};

use crate::constant::Constant;
use crate::program::Program;

/// Compiles a template source string straight through parsing into a
/// [`Program`]. A pure function of `source`: the same text always produces
/// byte-identical `code` and `constants`.
pub fn compile(source: &str) -> Result<Program, TemplateError> {
    let nodes = stencil_par::parse(source)?;
    let mut compiler = Compiler::new();
    compiler.compile_nodes(&nodes)?;
    let program = compiler.finish();
    tracing::debug!(code_len = program.code.len(), constants = program.constants.len(), "compiled template");
    Ok(program)
}

/// Maps a local variable name to its slot within the frame it was declared
/// in. One entry per active `for` loop.
struct Scope {
    slots: HashMap<String, u8>,
}

struct Compiler {
    code: Vec<u8>,
    constants: Vec<Constant>,
    const_index: HashMap<Constant, u16>,
    /// Innermost scope last; a `for` loop pushes one on entry, pops it on
    /// exit. Looking up a path head walks this from the end.
    scopes: Vec<Scope>,
}

impl Compiler {
    fn new() -> Self {
        Self { code: Vec::new(), constants: Vec::new(), const_index: HashMap::new(), scopes: Vec::new() }
    }

    fn finish(self) -> Program {
        Program { code: self.code, constants: self.constants }
    }

    // -- constant pool -----------------------------------------------------

    fn intern(&mut self, value: Constant) -> u16 {
        if let Some(&idx) = self.const_index.get(&value) {
            return idx;
        }
        let idx = self.constants.len() as u16;
        self.constants.push(value.clone());
        self.const_index.insert(value, idx);
        idx
    }

    fn intern_str(&mut self, s: &str) -> u16 {
        self.intern(Constant::Str(s.to_string()))
    }

    // -- byte emission -------------------------------------------------------

    fn emit_op(&mut self, op: OpCode) {
        self.code.push(op as u8);
    }

    fn emit_u8(&mut self, byte: u8) {
        self.code.push(byte);
    }

    fn emit_u16(&mut self, value: u16) {
        self.code.extend_from_slice(&value.to_be_bytes());
    }

    /// Emits a placeholder jump target and returns the byte offset to patch
    /// later via [`Compiler::patch_jump`].
    fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_op(op);
        let patch_at = self.code.len();
        self.emit_u16(0);
        patch_at
    }

    fn patch_jump(&mut self, patch_at: usize) {
        let target = self.code.len() as u16;
        self.code[patch_at..patch_at + 2].copy_from_slice(&target.to_be_bytes());
    }

    fn here(&self) -> usize {
        self.code.len()
    }

    fn emit_jump_to(&mut self, op: OpCode, target: usize) {
        self.emit_op(op);
        self.emit_u16(target as u16);
    }

    // -- scope / locals --------------------------------------------------

    fn resolve_local(&self, name: &str) -> Option<(u8, u8)> {
        let depth_from_innermost = |idx: usize| (self.scopes.len() - 1 - idx) as u8;
        for (idx, scope) in self.scopes.iter().enumerate().rev() {
            if let Some(&slot) = scope.slots.get(name) {
                return Some((slot, depth_from_innermost(idx)));
            }
        }
        None
    }

    // -- nodes -------------------------------------------------------------

    fn compile_nodes(&mut self, nodes: &[Node]) -> Result<(), TemplateError> {
        for node in nodes {
            self.compile_node(node)?;
        }
        Ok(())
    }

    fn compile_node(&mut self, node: &Node) -> Result<(), TemplateError> {
        match node {
            Node::Text(text) => {
                if text.is_empty() {
                    return Ok(());
                }
                let idx = self.intern_str(text);
                self.emit_op(OpCode::Text);
                self.emit_u16(idx);
            }
            Node::Output { expr, .. } => {
                self.compile_expr(expr)?;
                self.emit_op(OpCode::Render);
            }
            Node::If { branches, else_body } => self.compile_if(branches, else_body.as_deref())?,
            Node::For { var, iter, body, else_body } => {
                self.compile_for(var, iter, body, else_body.as_deref())?
            }
        }
        Ok(())
    }

    fn compile_if(
        &mut self,
        branches: &[(Expr, Vec<Node>)],
        else_body: Option<&[Node]>,
    ) -> Result<(), TemplateError> {
        let mut end_patches = Vec::with_capacity(branches.len());

        for (cond, body) in branches {
            self.compile_expr(cond)?;
            let next_patch = self.emit_jump(OpCode::JumpIfFalsy);
            self.emit_op(OpCode::Pop);
            self.compile_nodes(body)?;
            end_patches.push(self.emit_jump(OpCode::Jump));
            self.patch_jump(next_patch);
            self.emit_op(OpCode::Pop);
        }

        if let Some(else_body) = else_body {
            self.compile_nodes(else_body)?;
        }

        for patch in end_patches {
            self.patch_jump(patch);
        }
        Ok(())
    }

    fn compile_for(
        &mut self,
        var: &str,
        iter: &Expr,
        body: &[Node],
        else_body: Option<&[Node]>,
    ) -> Result<(), TemplateError> {
        let has_else = else_body.is_some();
        let frame_size: u8 = if has_else { 2 } else { 1 };

        self.emit_op(OpCode::EnterFrame);
        self.emit_u8(frame_size);

        if has_else {
            self.emit_op(OpCode::False);
            self.emit_op(OpCode::SetLocal);
            self.emit_u8(1);
        }

        // `iter` is compiled against the *enclosing* scope: the new frame's
        // scope is only registered below, once `iter` is fully lowered, so a
        // loop variable that shadows a name used in its own iterable
        // expression (`{% for item in item %}`) or an outer loop's variable
        // (`{% for x in xs %}{% for x in x %}`) still resolves outward.
        self.compile_expr(iter)?;
        self.emit_op(OpCode::IterInit);

        let mut slots = HashMap::new();
        slots.insert(var.to_string(), 0u8);
        self.scopes.push(Scope { slots });

        let loop_top = self.here();
        self.emit_op(OpCode::IterNext);
        let exit_patch = self.emit_jump(OpCode::JumpIfFalsy);
        self.emit_op(OpCode::Pop);
        self.emit_op(OpCode::SetLocal);
        self.emit_u8(0);

        if has_else {
            self.emit_op(OpCode::True);
            self.emit_op(OpCode::SetLocal);
            self.emit_u8(1);
        }

        self.compile_nodes(body)?;
        self.emit_jump_to(OpCode::Jump, loop_top);

        self.patch_jump(exit_patch);
        self.emit_op(OpCode::Pop); // discard the `false` flag
        self.emit_op(OpCode::Pop); // discard the iterator

        if has_else {
            self.emit_op(OpCode::GetLocal);
            self.emit_u8(0); // depth: current frame
            self.emit_u8(1); // slot: entered-flag
            let skip_patch = self.emit_jump(OpCode::JumpIfTruthy);
            self.emit_op(OpCode::Pop);
            if let Some(else_body) = else_body {
                self.compile_nodes(else_body)?;
            }
            self.patch_jump(skip_patch);
            self.emit_op(OpCode::Pop);
        }

        self.scopes.pop();
        self.emit_op(OpCode::LeaveFrame);
        Ok(())
    }

    // -- expressions ---------------------------------------------------------

    fn compile_expr(&mut self, expr: &Expr) -> Result<(), TemplateError> {
        match expr {
            Expr::Path { head, segments, .. } => {
                if let Some((slot, depth)) = self.resolve_local(head) {
                    self.emit_op(OpCode::GetLocal);
                    self.emit_u8(depth);
                    self.emit_u8(slot);
                } else {
                    let idx = self.intern_str(head);
                    self.emit_op(OpCode::Global);
                    self.emit_u16(idx);
                }
                for segment in segments {
                    self.compile_segment(segment)?;
                }
            }
            Expr::StringLit(s) => {
                let idx = self.intern_str(s);
                self.emit_op(OpCode::Constant);
                self.emit_u16(idx);
            }
            Expr::IntLit(n) => {
                let idx = self.intern(Constant::Int(*n));
                self.emit_op(OpCode::Constant);
                self.emit_u16(idx);
            }
            Expr::BoolLit(true) => self.emit_op(OpCode::True),
            Expr::BoolLit(false) => self.emit_op(OpCode::False),
            Expr::Null => self.emit_op(OpCode::Null),
            Expr::Unary { op: UnaryOp::Not, expr } => {
                self.compile_expr(expr)?;
                self.emit_op(OpCode::Not);
            }
            Expr::Binary { op: BinaryOp::And, left, right } => {
                self.compile_expr(left)?;
                let patch = self.emit_jump(OpCode::JumpIfFalsy);
                self.emit_op(OpCode::Pop);
                self.compile_expr(right)?;
                self.patch_jump(patch);
            }
            Expr::Binary { op: BinaryOp::Or, left, right } => {
                self.compile_expr(left)?;
                let patch = self.emit_jump(OpCode::JumpIfTruthy);
                self.emit_op(OpCode::Pop);
                self.compile_expr(right)?;
                self.patch_jump(patch);
            }
        }
        Ok(())
    }

    fn compile_segment(&mut self, segment: &Segment) -> Result<(), TemplateError> {
        match segment {
            Segment::DotName(name) => {
                let idx = self.intern_str(name);
                self.emit_op(OpCode::Selector);
                self.emit_u16(idx);
            }
            Segment::Index(IndexKey::String(s)) => {
                let idx = self.intern_str(s);
                self.emit_op(OpCode::Selector);
                self.emit_u16(idx);
            }
            Segment::Index(IndexKey::Int(n)) => {
                // Indices are keyed by their decimal text so SELECTOR can
                // stay a single string-keyed opcode for both object fields
                // and array elements.
                let idx = self.intern_str(&n.to_string());
                self.emit_op(OpCode::Selector);
                self.emit_u16(idx);
            }
            Segment::Index(IndexKey::Path(inner)) => self.compile_dynamic_index(inner)?,
        }
        Ok(())
    }

    /// `a[b.c]`: the key itself is a path expression evaluated at render
    /// time, not a compile-time constant. We push the key's value on the
    /// stack with [`OpCode::SelectorDynamic`] consuming it alongside the
    /// container.
    fn compile_dynamic_index(&mut self, key_expr: &Expr) -> Result<(), TemplateError> {
        self.compile_expr(key_expr)?;
        self.emit_op(OpCode::SelectorDynamic);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::Constant;

    fn constants(src: &str) -> Vec<Constant> {
        compile(src).unwrap().constants
    }

    #[test]
    fn empty_source_is_empty_program() {
        let program = compile("").unwrap();
        assert!(program.code.is_empty());
        assert!(program.constants.is_empty());
    }

    #[test]
    fn single_text_chunk() {
        let program = compile("hello").unwrap();
        assert_eq!(program.constants, vec![Constant::Str("hello".to_string())]);
        assert_eq!(program.code, vec![OpCode::Text as u8, 0, 0]);
    }

    #[test]
    fn path_shares_constant_pool_with_text() {
        // `{{ a.b }}` -> constants == ["a", "b"]
        assert_eq!(
            constants("{{ a.b }}"),
            vec![Constant::Str("a".to_string()), Constant::Str("b".to_string())]
        );
    }

    #[test]
    fn if_shares_constant_pool_between_cond_and_body() {
        // `{% if a %}b{% endif %}` -> constants == ["a", "b"]
        assert_eq!(
            constants("{% if a %}b{% endif %}"),
            vec![Constant::Str("a".to_string()), Constant::Str("b".to_string())]
        );
    }

    #[test]
    fn output_emits_global_then_render() {
        let program = compile("{{ a }}").unwrap();
        assert_eq!(
            program.code,
            vec![OpCode::Global as u8, 0, 0, OpCode::Render as u8]
        );
    }

    #[test]
    fn for_loop_uses_get_local_not_global() {
        let program = compile("{% for x in y %}{{ x }}{% endfor %}").unwrap();
        // GLOBAL "y" must appear; GLOBAL "x" must not -- `x` resolves via GET_LOCAL.
        assert_eq!(program.constants, vec![Constant::Str("y".to_string())]);
        assert!(program.code.contains(&(OpCode::GetLocal as u8)));
    }

    #[test]
    fn jump_targets_are_in_bounds() {
        let program = compile("{% if a %}x{% elif b %}y{% else %}z{% endif %}").unwrap();
        let mut ip = 0;
        while ip < program.code.len() {
            let op = OpCode::from_u8(program.code[ip]).unwrap();
            ip += 1;
            match op {
                OpCode::Jump | OpCode::JumpIfFalsy | OpCode::JumpIfTruthy => {
                    let target = u16::from_be_bytes([program.code[ip], program.code[ip + 1]]);
                    assert!((target as usize) <= program.code.len());
                    ip += 2;
                }
                OpCode::Constant | OpCode::Global | OpCode::Selector | OpCode::Text => ip += 2,
                OpCode::EnterFrame | OpCode::SetLocal => ip += 1,
                OpCode::GetLocal => ip += 2,
                _ => {}
            }
        }
    }

    #[test]
    fn compile_is_pure() {
        let a = compile("{% for x in y %}{{ x }} {{ z }}{% endfor %}").unwrap();
        let b = compile("{% for x in y %}{{ x }} {{ z }}{% endfor %}").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn nested_loops_increase_get_local_depth() {
        let program =
            compile("{% for x in xs %}{% for y in ys %}{{ x }}{{ y }}{% endfor %}{% endfor %}")
                .unwrap();
        // two GET_LOCAL instructions: depth 1 (outer x) and depth 0 (inner y)
        let mut depths = Vec::new();
        let mut ip = 0;
        while ip < program.code.len() {
            let op = OpCode::from_u8(program.code[ip]).unwrap();
            ip += 1;
            if op == OpCode::GetLocal {
                depths.push(program.code[ip]);
                ip += 2;
            } else {
                ip += match op {
                    OpCode::Jump | OpCode::JumpIfFalsy | OpCode::JumpIfTruthy => 2,
                    OpCode::Constant | OpCode::Global | OpCode::Selector | OpCode::Text => 2,
                    OpCode::EnterFrame | OpCode::SetLocal => 1,
                    _ => 0,
                };
            }
        }
        assert_eq!(depths, vec![1, 0]);
    }

    #[test]
    fn loop_variable_shadowing_its_own_iterable_resolves_outward() {
        // `{% for item in item %}` -- the `item` in `in item` must read the
        // outer binding via GLOBAL, not the loop's own (not yet entered)
        // frame via GET_LOCAL.
        let program = compile("{% for item in item %}{{ item }}{% endfor %}").unwrap();
        assert_eq!(program.constants, vec![Constant::Str("item".to_string())]);
        let mut ip = 0;
        let mut globals = 0;
        let mut get_locals = 0;
        while ip < program.code.len() {
            let op = OpCode::from_u8(program.code[ip]).unwrap();
            ip += 1;
            match op {
                OpCode::Global => {
                    globals += 1;
                    ip += 2;
                }
                OpCode::GetLocal => {
                    get_locals += 1;
                    ip += 2;
                }
                OpCode::Jump | OpCode::JumpIfFalsy | OpCode::JumpIfTruthy => ip += 2,
                OpCode::Constant | OpCode::Selector | OpCode::Text => ip += 2,
                OpCode::EnterFrame | OpCode::SetLocal => ip += 1,
                _ => {}
            }
        }
        // One GLOBAL for the iterable's `item`, one GET_LOCAL for the body's `item`.
        assert_eq!(globals, 1);
        assert_eq!(get_locals, 1);
    }

    #[test]
    fn inner_loop_reusing_outer_variable_name_as_iterable_resolves_outward() {
        // `{% for x in xs %}{% for x in x %}...` -- the inner `in x` must
        // read the outer loop's `x` (frame depth 1), not the inner loop's
        // own not-yet-entered frame.
        let program =
            compile("{% for x in xs %}{% for x in x %}{{ x }}{% endfor %}{% endfor %}").unwrap();
        let mut ip = 0;
        let mut depths = Vec::new();
        while ip < program.code.len() {
            let op = OpCode::from_u8(program.code[ip]).unwrap();
            ip += 1;
            if op == OpCode::GetLocal {
                depths.push(program.code[ip]);
                ip += 2;
            } else {
                ip += match op {
                    OpCode::Jump | OpCode::JumpIfFalsy | OpCode::JumpIfTruthy => 2,
                    OpCode::Constant | OpCode::Global | OpCode::Selector | OpCode::Text => 2,
                    OpCode::EnterFrame | OpCode::SetLocal => 1,
                    _ => 0,
                };
            }
        }
        // The inner `in x` resolves to the outer frame (depth 1); the body's
        // `{{ x }}` resolves to the inner frame (depth 0).
        assert_eq!(depths, vec![1, 0]);
    }

    #[test]
    fn for_else_reads_the_entered_flag_from_the_current_frame() {
        let program = compile("{% for x in y %}{{ x }}{% else %}e{% endfor %}").unwrap();
        // The entered-flag GET_LOCAL must read (depth=0, slot=1): the
        // *current* frame's second slot, not an enclosing frame's first.
        let mut found = None;
        let mut ip = 0;
        while ip < program.code.len() {
            let op = OpCode::from_u8(program.code[ip]).unwrap();
            ip += 1;
            match op {
                OpCode::GetLocal => {
                    found = Some((program.code[ip], program.code[ip + 1]));
                    ip += 2;
                }
                OpCode::Jump | OpCode::JumpIfFalsy | OpCode::JumpIfTruthy => ip += 2,
                OpCode::Constant | OpCode::Global | OpCode::Selector | OpCode::Text => ip += 2,
                OpCode::EnterFrame | OpCode::SetLocal => ip += 1,
                _ => {}
            }
        }
        assert_eq!(found, Some((0, 1)));
    }
}
