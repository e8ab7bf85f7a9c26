use bytemuck::Zeroable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegReg {
    Es = 0,
    Cs = 1,
    Ss = 2,
    Ds = 3,
    Fs = 4,
    Gs = 5,
}

impl SegReg {
    pub const ALL: [SegReg; 6] = [
        SegReg::Es,
        SegReg::Cs,
        SegReg::Ss,
        SegReg::Ds,
        SegReg::Fs,
        SegReg::Gs,
    ];
}

/// Access-rights layout of [`SegmentDescriptor::attr`].
///
/// The low byte is the descriptor access byte (type, S, DPL, P) and bits 8..=11 carry the
/// AVL/L/D-B/G nibble from the descriptor's flags. The bridge stores and returns this field
/// unchanged; the helpers below exist only for mode derivation.
pub mod attr {
    pub const TYPE_MASK: u16 = 0x000F;
    pub const S: u16 = 1 << 4;
    pub const DPL_SHIFT: u16 = 5;
    pub const DPL_MASK: u16 = 0b11 << DPL_SHIFT;
    pub const P: u16 = 1 << 7;
    pub const AVL: u16 = 1 << 8;
    pub const L: u16 = 1 << 9;
    pub const DB: u16 = 1 << 10;
    pub const G: u16 = 1 << 11;
}

/// Decoded descriptor cache of a segment register, LDTR or TR.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Zeroable)]
pub struct SegmentDescriptor {
    pub present: bool,
    pub selector: u16,
    pub base: u64,
    /// Byte-granular limit (already scaled by the G bit).
    pub limit: u32,
    pub attr: u16,
}

impl SegmentDescriptor {
    #[inline]
    pub fn rpl(&self) -> u8 {
        (self.selector & 0x3) as u8
    }

    #[inline]
    pub fn dpl(&self) -> u8 {
        ((self.attr & attr::DPL_MASK) >> attr::DPL_SHIFT) as u8
    }

    /// L bit: 64-bit code segment.
    #[inline]
    pub fn long(&self) -> bool {
        self.attr & attr::L != 0
    }

    /// D/B bit: 32-bit default operand size.
    #[inline]
    pub fn default_size_32(&self) -> bool {
        self.attr & attr::DB != 0
    }
}

/// GDTR / IDTR.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Zeroable)]
pub struct DescriptorTableRegister {
    pub base: u64,
    pub limit: u16,
}
