//! Type 2 charstring interpreter.
//!
//! Unlike an outline evaluator this does not track the current point. It
//! resolves subroutine calls, keeps the operand stack and reports every
//! other operator, with its operands, to a [`CharstringVisitor`] in program
//! order. That is exactly the information needed to rewrite a charstring.
//!
//! See <https://adobe-type-tools.github.io/font-tech-notes/pdfs/5177.Type2.pdf>

use read_fonts::tables::postscript::Index;

use crate::{
    number::Number,
    opcode::{cs, OpCode, SHORT_INT},
};

/// Maximum nesting depth for subroutine calls.
///
/// See "Appendix B Type 2 Charstring Implementation Limits" at
/// <https://adobe-type-tools.github.io/font-tech-notes/pdfs/5177.Type2.pdf#page=33>
pub const NESTING_DEPTH_LIMIT: u32 = 10;

/// Maximum number of operands on the stack.
///
/// This is the CFF2 limit, which is more permissive than the 48 of CFF.
pub const MAX_STACK: usize = 513;

/// Errors that abort interpretation of a charstring.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CharstringError {
    #[error("operand stack underflow")]
    StackUnderflow,
    #[error("operand stack overflow")]
    StackOverflow,
    #[error("invalid charstring operator {0}")]
    InvalidOperator(u16),
    #[error("invalid subroutine index {0}")]
    InvalidSubrIndex(i32),
    #[error("callsubr without local subroutines")]
    MissingSubrs,
    #[error("subroutine nesting depth exceeded")]
    NestingDepthExceeded,
    #[error("charstring data ended in the middle of an operand")]
    Truncated,
    #[error("return outside of a subroutine")]
    ReturnOutsideSubr,
}

/// Progress of the interpreter.
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub enum InterpreterState {
    #[default]
    Running,
    /// A subroutine has just returned to its caller.
    Returned,
    /// `endchar` was executed.
    Ended,
    Failed,
}

/// Receives the operators of a charstring as they execute.
///
/// Subroutine calls and returns are resolved by the interpreter and never
/// reach the visitor.
pub trait CharstringVisitor {
    /// Called once per operator.
    ///
    /// `width` is the advance width operand when this operator is the one
    /// that carries it, `operands` the remaining stack contents and `mask`
    /// the bytes that follow `hintmask` and `cntrmask`.
    fn visit(&mut self, width: Option<Number>, op: OpCode, operands: &[Number], mask: &[u8]);
}

/// Executes charstrings against a set of global and local subroutines.
pub struct Interpreter<'a> {
    global_subrs: Index<'a>,
    local_subrs: Option<Index<'a>>,
    stack: Vec<Number>,
    stem_count: usize,
    seen_stack_clearing_op: bool,
    state: InterpreterState,
}

impl<'a> Interpreter<'a> {
    pub fn new(global_subrs: Index<'a>, local_subrs: Option<Index<'a>>) -> Self {
        Self {
            global_subrs,
            local_subrs,
            stack: Vec::new(),
            stem_count: 0,
            seen_stack_clearing_op: false,
            state: InterpreterState::Running,
        }
    }

    pub fn state(&self) -> InterpreterState {
        self.state
    }

    /// Runs one glyph program to completion.
    ///
    /// The interpreter can be reused for further glyphs sharing the same
    /// subroutines; all per-glyph state is reset here.
    pub fn run(
        &mut self,
        charstring: &[u8],
        visitor: &mut impl CharstringVisitor,
    ) -> Result<(), CharstringError> {
        self.stack.clear();
        self.stem_count = 0;
        self.seen_stack_clearing_op = false;
        self.state = InterpreterState::Running;
        let result = self.execute_glyph(charstring, visitor);
        self.state = match result {
            Ok(_) => InterpreterState::Ended,
            Err(_) => InterpreterState::Failed,
        };
        result
    }

    fn execute_glyph(
        &mut self,
        charstring: &[u8],
        visitor: &mut impl CharstringVisitor,
    ) -> Result<(), CharstringError> {
        self.execute(charstring, 0, visitor)?;
        if self.state != InterpreterState::Ended {
            log::warn!("charstring ended without endchar");
            self.execute_operator(cs::ENDCHAR, &[], visitor)?;
        }
        Ok(())
    }

    fn execute(
        &mut self,
        data: &[u8],
        nesting_depth: u32,
        visitor: &mut impl CharstringVisitor,
    ) -> Result<(), CharstringError> {
        if nesting_depth > NESTING_DEPTH_LIMIT {
            return Err(CharstringError::NestingDepthExceeded);
        }
        let mut pos = 0;
        while let Some(&b0) = data.get(pos) {
            let rest = &data[pos + 1..];
            if b0 == SHORT_INT || b0 >= 32 {
                let (number, len) =
                    Number::read_charstring(b0, rest).ok_or(CharstringError::Truncated)?;
                self.push(number)?;
                pos += len;
                continue;
            }
            let (op, len) = OpCode::read(b0, rest).ok_or(CharstringError::Truncated)?;
            pos += len;
            match op {
                cs::CALLSUBR | cs::CALLGSUBR => {
                    let index = self.pop()?.to_int();
                    let subrs = if op == cs::CALLSUBR {
                        self.local_subrs
                            .as_ref()
                            .ok_or(CharstringError::MissingSubrs)?
                    } else {
                        &self.global_subrs
                    };
                    let biased = index
                        .checked_add(subrs.subr_bias())
                        .ok_or(CharstringError::InvalidSubrIndex(index))?;
                    let subr = usize::try_from(biased)
                        .ok()
                        .and_then(|ix| subrs.get(ix).ok())
                        .ok_or(CharstringError::InvalidSubrIndex(biased))?;
                    self.execute(subr, nesting_depth + 1, visitor)?;
                    if self.state == InterpreterState::Ended {
                        return Ok(());
                    }
                    self.state = InterpreterState::Running;
                }
                cs::RETURN => {
                    if nesting_depth == 0 {
                        return Err(CharstringError::ReturnOutsideSubr);
                    }
                    self.state = InterpreterState::Returned;
                    return Ok(());
                }
                _ => {
                    let mask_len = self.execute_operator(op, &data[pos..], visitor)?;
                    pos += mask_len;
                    if op == cs::ENDCHAR {
                        self.state = InterpreterState::Ended;
                        return Ok(());
                    }
                }
            }
        }
        // running off the end of a subroutine is an implicit return
        Ok(())
    }

    /// Reports a stack clearing operator to the visitor.
    ///
    /// Returns the number of mask bytes consumed from `rest`.
    fn execute_operator(
        &mut self,
        op: OpCode,
        rest: &[u8],
        visitor: &mut impl CharstringVisitor,
    ) -> Result<usize, CharstringError> {
        let min_args = min_args(op).ok_or(CharstringError::InvalidOperator(op.to_u16()))?;
        // dotsection never carries the width
        let width_present = op != cs::DOTSECTION
            && !self.seen_stack_clearing_op
            && has_width(op, self.stack.len());
        if op != cs::DOTSECTION {
            self.seen_stack_clearing_op = true;
        }
        let (width, operands) = match self.stack.split_first() {
            Some((width, operands)) if width_present => (Some(*width), operands),
            _ => (None, &self.stack[..]),
        };
        if operands.len() < min_args {
            return Err(CharstringError::StackUnderflow);
        }
        let mut mask: &[u8] = &[];
        match op {
            cs::HSTEM | cs::VSTEM | cs::HSTEMHM | cs::VSTEMHM => {
                self.stem_count += operands.len() / 2;
            }
            // operands here are an implied vstemhm
            cs::HINTMASK | cs::CNTRMASK => {
                self.stem_count += operands.len() / 2;
                let mask_len = (self.stem_count + 7) / 8;
                mask = rest.get(..mask_len).ok_or(CharstringError::Truncated)?;
            }
            _ => {}
        }
        visitor.visit(width, op, operands, mask);
        self.stack.clear();
        Ok(mask.len())
    }

    fn push(&mut self, number: Number) -> Result<(), CharstringError> {
        if self.stack.len() == MAX_STACK {
            return Err(CharstringError::StackOverflow);
        }
        self.stack.push(number);
        Ok(())
    }

    fn pop(&mut self) -> Result<Number, CharstringError> {
        self.stack.pop().ok_or(CharstringError::StackUnderflow)
    }
}

/// Returns true if an operator seen with `len` operands, as the first
/// stack clearing operator of a glyph, is preceded by a width.
fn has_width(op: OpCode, len: usize) -> bool {
    match op {
        cs::HSTEM | cs::VSTEM | cs::HSTEMHM | cs::VSTEMHM | cs::HINTMASK | cs::CNTRMASK => {
            len % 2 == 1
        }
        cs::RMOVETO => len == 3,
        cs::HMOVETO | cs::VMOVETO => len == 2,
        // a bare width or a width with the seac accent arguments
        cs::ENDCHAR => len == 1 || len == 5,
        _ => false,
    }
}

/// Minimum operand count of each supported operator, excluding the width.
fn min_args(op: OpCode) -> Option<usize> {
    Some(match op {
        cs::HSTEM | cs::VSTEM | cs::HSTEMHM | cs::VSTEMHM => 2,
        cs::HINTMASK | cs::CNTRMASK | cs::ENDCHAR | cs::DOTSECTION => 0,
        cs::RMOVETO => 2,
        cs::HMOVETO | cs::VMOVETO => 1,
        cs::RLINETO => 2,
        cs::HLINETO | cs::VLINETO => 1,
        cs::RRCURVETO => 6,
        cs::RCURVELINE | cs::RLINECURVE => 8,
        cs::VVCURVETO | cs::HHCURVETO | cs::VHCURVETO | cs::HVCURVETO => 4,
        cs::HFLEX => 7,
        cs::FLEX => 13,
        cs::HFLEX1 => 9,
        cs::FLEX1 => 11,
        _ => return None,
    })
}
