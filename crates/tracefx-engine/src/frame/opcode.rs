//! Bytecode opcodes for frames evaluated by the reference interpreter

/// Bytecode opcode enumeration
///
/// Every opcode is one byte; operands follow in the stream as little-endian
/// immediates (see [`Opcode::operand_size`]).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ===== Stack & constants (0x00-0x0F) =====
    /// No operation
    Nop = 0x00,
    /// Pop top value from stack
    Pop = 0x01,
    /// Push null
    ConstNull = 0x02,
    /// Push true
    ConstTrue = 0x03,
    /// Push false
    ConstFalse = 0x04,
    /// Push 64-bit integer (operand: i64)
    ConstI64 = 0x05,
    /// Push 64-bit float (operand: f64)
    ConstF64 = 0x06,

    // ===== Locals (0x10-0x1F) =====
    /// Load local onto stack (operand: u16 index)
    LoadLocal = 0x10,
    /// Store top of stack into local (operand: u16 index)
    StoreLocal = 0x11,

    // ===== Arithmetic & comparison (0x20-0x2F) =====
    /// pop b, pop a, push a + b
    Add = 0x20,
    /// pop b, pop a, push a - b
    Sub = 0x21,
    /// pop b, pop a, push a * b
    Mul = 0x22,
    /// pop b, pop a, push a < b
    Lt = 0x23,
    /// pop b, pop a, push a == b
    Eq = 0x24,
    /// pop a, push !a
    Not = 0x25,

    // ===== Control flow (0x30-0x3F) =====
    /// Unconditional relative jump (operand: i32 offset from next instruction)
    Jmp = 0x30,
    /// Pop condition, jump if false (operand: i32 offset from next instruction)
    JmpIfFalse = 0x31,
    /// Call function by index (operands: u32 function index, u8 argument count)
    Call = 0x32,
    /// Return top of stack
    Return = 0x33,
}

impl Opcode {
    /// Decode an opcode byte
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Nop),
            0x01 => Some(Self::Pop),
            0x02 => Some(Self::ConstNull),
            0x03 => Some(Self::ConstTrue),
            0x04 => Some(Self::ConstFalse),
            0x05 => Some(Self::ConstI64),
            0x06 => Some(Self::ConstF64),
            0x10 => Some(Self::LoadLocal),
            0x11 => Some(Self::StoreLocal),
            0x20 => Some(Self::Add),
            0x21 => Some(Self::Sub),
            0x22 => Some(Self::Mul),
            0x23 => Some(Self::Lt),
            0x24 => Some(Self::Eq),
            0x25 => Some(Self::Not),
            0x30 => Some(Self::Jmp),
            0x31 => Some(Self::JmpIfFalse),
            0x32 => Some(Self::Call),
            0x33 => Some(Self::Return),
            _ => None,
        }
    }

    /// Number of operand bytes following the opcode
    pub fn operand_size(self) -> usize {
        match self {
            Self::ConstI64 | Self::ConstF64 => 8,
            Self::LoadLocal | Self::StoreLocal => 2,
            Self::Jmp | Self::JmpIfFalse => 4,
            Self::Call => 5,
            _ => 0,
        }
    }

    /// Mnemonic used in diagnostics
    pub fn name(self) -> &'static str {
        match self {
            Self::Nop => "nop",
            Self::Pop => "pop",
            Self::ConstNull => "const.null",
            Self::ConstTrue => "const.true",
            Self::ConstFalse => "const.false",
            Self::ConstI64 => "const.i64",
            Self::ConstF64 => "const.f64",
            Self::LoadLocal => "load.local",
            Self::StoreLocal => "store.local",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Lt => "lt",
            Self::Eq => "eq",
            Self::Not => "not",
            Self::Jmp => "jmp",
            Self::JmpIfFalse => "jmp.if_false",
            Self::Call => "call",
            Self::Return => "return",
        }
    }
}

/// Decoded instruction: opcode and its byte offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instr {
    pub offset: usize,
    pub opcode: Opcode,
}

/// Walk a bytecode stream instruction by instruction.
///
/// Stops at the first undecodable byte or truncated operand; callers that
/// need to report those use the interpreter, which validates as it runs.
pub fn instructions(code: &[u8]) -> impl Iterator<Item = Instr> + '_ {
    let mut pc = 0;
    std::iter::from_fn(move || {
        let opcode = Opcode::from_u8(*code.get(pc)?)?;
        let next = pc + 1 + opcode.operand_size();
        if next > code.len() {
            return None;
        }
        let instr = Instr { offset: pc, opcode };
        pc = next;
        Some(instr)
    })
}

/// Incremental bytecode emitter
#[derive(Debug, Default, Clone)]
pub struct CodeBuilder {
    code: Vec<u8>,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current offset (where the next instruction will be written)
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    pub fn op(&mut self, op: Opcode) -> &mut Self {
        self.code.push(op as u8);
        self
    }

    pub fn const_i64(&mut self, val: i64) -> &mut Self {
        self.code.push(Opcode::ConstI64 as u8);
        self.code.extend_from_slice(&val.to_le_bytes());
        self
    }

    pub fn const_f64(&mut self, val: f64) -> &mut Self {
        self.code.push(Opcode::ConstF64 as u8);
        self.code.extend_from_slice(&val.to_le_bytes());
        self
    }

    pub fn load_local(&mut self, idx: u16) -> &mut Self {
        self.code.push(Opcode::LoadLocal as u8);
        self.code.extend_from_slice(&idx.to_le_bytes());
        self
    }

    pub fn store_local(&mut self, idx: u16) -> &mut Self {
        self.code.push(Opcode::StoreLocal as u8);
        self.code.extend_from_slice(&idx.to_le_bytes());
        self
    }

    /// Emit a jump with a raw relative offset
    pub fn jump(&mut self, op: Opcode, offset: i32) -> &mut Self {
        debug_assert!(matches!(op, Opcode::Jmp | Opcode::JmpIfFalse));
        self.code.push(op as u8);
        self.code.extend_from_slice(&offset.to_le_bytes());
        self
    }

    /// Emit a jump whose target is patched later with [`CodeBuilder::patch_jump`].
    /// Returns the offset of the jump instruction.
    pub fn jump_placeholder(&mut self, op: Opcode) -> usize {
        let at = self.offset();
        self.jump(op, 0);
        at
    }

    /// Point the jump emitted at `at` to the current offset
    pub fn patch_jump(&mut self, at: usize) {
        let next = at + 5;
        let rel = (self.code.len() as i64 - next as i64) as i32;
        self.code[at + 1..next].copy_from_slice(&rel.to_le_bytes());
    }

    pub fn call(&mut self, func: u32, argc: u8) -> &mut Self {
        self.code.push(Opcode::Call as u8);
        self.code.extend_from_slice(&func.to_le_bytes());
        self.code.push(argc);
        self
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.code)
    }
}
