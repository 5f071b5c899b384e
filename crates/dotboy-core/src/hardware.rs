#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
/// Hardware model the machine emulates.
///
/// Selects the post-boot register values and whether the CGB extensions
/// (banked VRAM/WRAM, color palettes, HDMA, double speed) are mapped.
pub enum Model {
    #[default]
    Dmg,
    Cgb,
}

impl Model {
    #[inline]
    pub const fn is_cgb(self) -> bool {
        matches!(self, Model::Cgb)
    }

    /// Picks the model a cartridge asks for through its header CGB flag.
    pub fn for_cgb_flag(flag: u8) -> Self {
        if flag & 0x80 != 0 {
            Model::Cgb
        } else {
            Model::Dmg
        }
    }
}

/// CPU clock of a DMG or a CGB in normal speed, in cycles per second.
pub const CPU_HZ: u32 = 4_194_304;

/// Dots per frame: 154 lines of 456 dots.
pub const CYCLES_PER_FRAME: u32 = 70_224;
