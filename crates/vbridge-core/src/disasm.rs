use iced_x86::{Code, Decoder, DecoderOptions, Formatter, Instruction, IntelFormatter, OpKind};

/// One decoded guest instruction.
#[derive(Debug, Clone)]
pub struct DecodedInstr {
    instr: Instruction,
    text: String,
}

impl DecodedInstr {
    /// Decodes the first instruction in `bytes` as if it sat at `ip` in a `bitness`-bit code
    /// segment. Returns `None` for invalid or truncated encodings.
    pub fn decode(bitness: u32, ip: u64, bytes: &[u8]) -> Option<Self> {
        let mut decoder = Decoder::with_ip(bitness, bytes, ip, DecoderOptions::NONE);
        let instr = decoder.decode();
        if instr.is_invalid() {
            return None;
        }
        let mut formatter = IntelFormatter::new();
        let mut text = String::new();
        formatter.format(&instr, &mut text);
        Some(Self { instr, text })
    }

    pub fn len(&self) -> usize {
        self.instr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instr.len() == 0
    }

    pub fn opcode(&self) -> Code {
        self.instr.code()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn instruction(&self) -> &Instruction {
        &self.instr
    }

    fn immediate_of(&self, kinds: &[OpKind]) -> Option<u64> {
        (0..self.instr.op_count())
            .find(|&op| kinds.contains(&self.instr.op_kind(op)))
            .map(|op| self.instr.immediate(op))
    }

    pub fn imm16(&self) -> Option<u16> {
        self.immediate_of(&[OpKind::Immediate16, OpKind::Immediate8to16])
            .map(|v| v as u16)
    }

    pub fn imm32(&self) -> Option<u32> {
        self.immediate_of(&[OpKind::Immediate32, OpKind::Immediate8to32])
            .map(|v| v as u32)
    }

    pub fn imm64(&self) -> Option<u64> {
        self.immediate_of(&[
            OpKind::Immediate64,
            OpKind::Immediate8to64,
            OpKind::Immediate32to64,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_mov_imm64() {
        // mov rax, 0x1122334455667788
        let bytes = [0x48, 0xB8, 0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11];
        let instr = DecodedInstr::decode(64, 0x40_1000, &bytes).unwrap();
        assert_eq!(instr.len(), 10);
        assert_eq!(instr.opcode(), Code::Mov_r64_imm64);
        assert_eq!(instr.imm64(), Some(0x1122_3344_5566_7788));
        assert_eq!(instr.imm32(), None);
        assert!(instr.text().starts_with("mov rax,"));
    }

    #[test]
    fn bitness_changes_decoding() {
        // B8 imm: mov eax, imm32 in 32-bit code, mov ax, imm16 in 16-bit code.
        let bytes = [0xB8, 0x34, 0x12, 0x00, 0x00];
        let op32 = DecodedInstr::decode(32, 0, &bytes).unwrap();
        assert_eq!(op32.imm32(), Some(0x1234));
        let op16 = DecodedInstr::decode(16, 0, &bytes).unwrap();
        assert_eq!(op16.len(), 3);
        assert_eq!(op16.imm16(), Some(0x1234));
    }

    #[test]
    fn invalid_encoding_is_none() {
        // PUSH ES does not exist in 64-bit mode.
        assert!(DecodedInstr::decode(64, 0, &[0x06]).is_none());
        assert!(DecodedInstr::decode(32, 0, &[0x06]).is_some());
        assert!(DecodedInstr::decode(64, 0, &[0x48]).is_none());
    }
}
