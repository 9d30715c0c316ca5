//! Bytecode execution loop

use super::Interpreter;
use crate::error::InterpError;
use crate::frame::{CodeObject, Frame, Opcode, Value};

/// Cursor over a code object's bytes
struct Reader<'a> {
    code: &'a [u8],
    pc: usize,
}

impl<'a> Reader<'a> {
    fn bytes<const N: usize>(&mut self) -> Result<[u8; N], InterpError> {
        let end = self.pc + N;
        let slice = self
            .code
            .get(self.pc..end)
            .ok_or(InterpError::TruncatedOperand(self.pc))?;
        self.pc = end;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, InterpError> {
        Ok(self.bytes::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, InterpError> {
        Ok(u16::from_le_bytes(self.bytes()?))
    }

    fn i32(&mut self) -> Result<i32, InterpError> {
        Ok(i32::from_le_bytes(self.bytes()?))
    }

    fn u32(&mut self) -> Result<u32, InterpError> {
        Ok(u32::from_le_bytes(self.bytes()?))
    }

    fn i64(&mut self) -> Result<i64, InterpError> {
        Ok(i64::from_le_bytes(self.bytes()?))
    }

    fn f64(&mut self) -> Result<f64, InterpError> {
        Ok(f64::from_le_bytes(self.bytes()?))
    }

    fn jump(&mut self, rel: i32) -> Result<(), InterpError> {
        let target = self.pc as i64 + rel as i64;
        if target < 0 || target > self.code.len() as i64 {
            return Err(InterpError::InvalidJump(target));
        }
        self.pc = target as usize;
        Ok(())
    }
}

fn pop(stack: &mut Vec<Value>, at: usize) -> Result<Value, InterpError> {
    stack.pop().ok_or(InterpError::StackUnderflow(at))
}

fn arith(op: Opcode, a: Value, b: Value) -> Result<Value, InterpError> {
    let name = op.name();
    let mismatch = || InterpError::TypeMismatch {
        op: name,
        left: a.type_tag(),
        right: b.type_tag(),
    };
    let (x, y) = match (a, b) {
        (Value::Int(x), Value::Int(y)) => {
            return Ok(Value::Int(match op {
                Opcode::Add => x.wrapping_add(y),
                Opcode::Sub => x.wrapping_sub(y),
                _ => x.wrapping_mul(y),
            }));
        }
        (Value::Int(x), Value::Float(y)) => (x as f64, y),
        (Value::Float(x), Value::Int(y)) => (x, y as f64),
        (Value::Float(x), Value::Float(y)) => (x, y),
        _ => return Err(mismatch()),
    };
    Ok(Value::Float(match op {
        Opcode::Add => x + y,
        Opcode::Sub => x - y,
        _ => x * y,
    }))
}

fn less_than(a: Value, b: Value) -> Result<Value, InterpError> {
    let lt = match (a, b) {
        (Value::Int(x), Value::Int(y)) => x < y,
        (Value::Int(x), Value::Float(y)) => (x as f64) < y,
        (Value::Float(x), Value::Int(y)) => x < y as f64,
        (Value::Float(x), Value::Float(y)) => x < y,
        _ => {
            return Err(InterpError::TypeMismatch {
                op: Opcode::Lt.name(),
                left: a.type_tag(),
                right: b.type_tag(),
            })
        }
    };
    Ok(Value::Bool(lt))
}

fn equals(a: Value, b: Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => x as f64 == y,
        _ => a == b,
    }
}

impl Interpreter {
    /// Run `code` over `locals` until it returns
    pub(super) fn execute(
        &self,
        code: &CodeObject,
        locals: &mut [Value],
        depth: usize,
    ) -> Result<Value, InterpError> {
        let mut stack: Vec<Value> = Vec::with_capacity(8);
        let mut r = Reader { code: &code.code, pc: 0 };

        while r.pc < r.code.len() {
            let at = r.pc;
            let byte = r.u8()?;
            let op = Opcode::from_u8(byte).ok_or(InterpError::InvalidOpcode(byte))?;

            match op {
                Opcode::Nop => {}
                Opcode::Pop => {
                    pop(&mut stack, at)?;
                }
                Opcode::ConstNull => stack.push(Value::Null),
                Opcode::ConstTrue => stack.push(Value::Bool(true)),
                Opcode::ConstFalse => stack.push(Value::Bool(false)),
                Opcode::ConstI64 => stack.push(Value::Int(r.i64()?)),
                Opcode::ConstF64 => stack.push(Value::Float(r.f64()?)),

                Opcode::LoadLocal => {
                    let idx = r.u16()?;
                    let v = *locals.get(idx as usize).ok_or(InterpError::InvalidLocal(idx))?;
                    stack.push(v);
                }
                Opcode::StoreLocal => {
                    let idx = r.u16()?;
                    let v = pop(&mut stack, at)?;
                    *locals.get_mut(idx as usize).ok_or(InterpError::InvalidLocal(idx))? = v;
                }

                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Lt | Opcode::Eq => {
                    let b = pop(&mut stack, at)?;
                    let a = pop(&mut stack, at)?;
                    let result = match op {
                        Opcode::Lt => less_than(a, b)?,
                        Opcode::Eq => Value::Bool(equals(a, b)),
                        _ => arith(op, a, b)?,
                    };
                    stack.push(result);
                }
                Opcode::Not => {
                    let v = pop(&mut stack, at)?;
                    stack.push(Value::Bool(!v.is_truthy()));
                }

                Opcode::Jmp => {
                    let rel = r.i32()?;
                    r.jump(rel)?;
                }
                Opcode::JmpIfFalse => {
                    let rel = r.i32()?;
                    if !pop(&mut stack, at)?.is_truthy() {
                        r.jump(rel)?;
                    }
                }
                Opcode::Call => {
                    let func = r.u32()?;
                    let argc = r.u8()? as usize;
                    if stack.len() < argc {
                        return Err(InterpError::StackUnderflow(at));
                    }
                    let args = stack.split_off(stack.len() - argc);
                    let callee = self
                        .program
                        .function(func)
                        .ok_or(InterpError::UnknownFunction(func))?;
                    if argc != callee.param_count {
                        return Err(InterpError::ArityMismatch {
                            name: callee.name.clone(),
                            expected: callee.param_count,
                            got: argc,
                        });
                    }
                    let frame = Frame::new(callee.clone(), &args, depth + 1);
                    stack.push(self.eval_frame(frame)?);
                }
                Opcode::Return => return pop(&mut stack, at),
            }
        }

        Err(InterpError::MissingReturn(code.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::InterpError;
    use crate::frame::{CodeBuilder, CodeObject, Opcode, Program, TypeTag, Value};
    use crate::hook::SharedRegistry;
    use crate::interp::Interpreter;
    use std::sync::Arc;

    fn run(code: Vec<u8>, params: usize, locals: usize, args: &[Value]) -> Result<Value, InterpError> {
        let mut program = Program::new();
        let f = program.add(CodeObject::new("test_func", params, locals, code));
        Interpreter::with_registry(program, Arc::new(SharedRegistry::new())).call(f, args)
    }

    #[test]
    fn test_arithmetic() {
        let code = CodeBuilder::new()
            .const_i64(3)
            .const_i64(5)
            .op(Opcode::Add)
            .const_i64(2)
            .op(Opcode::Mul)
            .op(Opcode::Return)
            .finish();
        assert_eq!(run(code, 0, 0, &[]), Ok(Value::Int(16)));
    }

    #[test]
    fn test_mixed_float() {
        let code = CodeBuilder::new()
            .load_local(0)
            .const_f64(0.5)
            .op(Opcode::Sub)
            .op(Opcode::Return)
            .finish();
        assert_eq!(run(code, 1, 1, &[Value::Int(2)]), Ok(Value::Float(1.5)));
    }

    #[test]
    fn test_type_mismatch() {
        let code = CodeBuilder::new()
            .op(Opcode::ConstTrue)
            .const_i64(1)
            .op(Opcode::Add)
            .op(Opcode::Return)
            .finish();
        assert_eq!(
            run(code, 0, 0, &[]),
            Err(InterpError::TypeMismatch {
                op: "add",
                left: TypeTag::Bool,
                right: TypeTag::Int
            })
        );
    }

    #[test]
    fn test_loop_sum() {
        // local0 = n, local1 = acc; while 0 < n { acc += n; n -= 1 }; return acc
        let mut b = CodeBuilder::new();
        b.const_i64(0).store_local(1);
        let top = b.offset();
        b.const_i64(0).load_local(0).op(Opcode::Lt);
        let exit = b.jump_placeholder(Opcode::JmpIfFalse);
        b.load_local(1).load_local(0).op(Opcode::Add).store_local(1);
        b.load_local(0).const_i64(1).op(Opcode::Sub).store_local(0);
        let back = top as i32 - (b.offset() as i32 + 5);
        b.jump(Opcode::Jmp, back);
        b.patch_jump(exit);
        b.load_local(1).op(Opcode::Return);

        assert_eq!(run(b.finish(), 1, 2, &[Value::Int(10)]), Ok(Value::Int(55)));
    }

    #[test]
    fn test_nested_call() {
        let mut program = Program::new();
        let double = program.add(CodeObject::new(
            "double",
            1,
            1,
            CodeBuilder::new().load_local(0).const_i64(2).op(Opcode::Mul).op(Opcode::Return).finish(),
        ));
        let main = program.add(CodeObject::new(
            "main",
            0,
            0,
            CodeBuilder::new().const_i64(21).call(double, 1).op(Opcode::Return).finish(),
        ));
        let interp = Interpreter::with_registry(program, Arc::new(SharedRegistry::new()));
        assert_eq!(interp.call(main, &[]), Ok(Value::Int(42)));
        assert_eq!(interp.stats().frames, 2);
    }

    #[test]
    fn test_recursion_limit() {
        let mut program = Program::new();
        let code = CodeBuilder::new().call(0, 0).op(Opcode::Return).finish();
        let f = program.add(CodeObject::new("forever", 0, 0, code));
        let interp = Interpreter::with_registry(program, Arc::new(SharedRegistry::new())).with_max_depth(16);
        assert_eq!(interp.call(f, &[]), Err(InterpError::RecursionLimit(16)));
    }

    #[test]
    fn test_malformed_code() {
        assert_eq!(run(vec![0xEE], 0, 0, &[]), Err(InterpError::InvalidOpcode(0xEE)));
        assert_eq!(
            run(vec![Opcode::ConstI64 as u8, 1], 0, 0, &[]),
            Err(InterpError::TruncatedOperand(1))
        );
        assert_eq!(run(vec![Opcode::Return as u8], 0, 0, &[]), Err(InterpError::StackUnderflow(0)));
        assert_eq!(
            run(vec![Opcode::Nop as u8], 0, 0, &[]),
            Err(InterpError::MissingReturn("test_func".to_string()))
        );
    }

    #[test]
    fn test_not_and_eq() {
        let code = CodeBuilder::new()
            .const_i64(2)
            .const_f64(2.0)
            .op(Opcode::Eq)
            .op(Opcode::Not)
            .op(Opcode::Return)
            .finish();
        assert_eq!(run(code, 0, 0, &[]), Ok(Value::Bool(false)));
    }
}
