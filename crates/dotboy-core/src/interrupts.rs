/// Interrupt sources in dispatch priority order.
///
/// See gbdev.io/pandocs/Interrupts.html and
/// gbdev.io/pandocs/Interrupt_Sources.html.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interrupt {
    VBlank,
    LcdStat,
    Timer,
    Serial,
    Joypad,
}

/// Mask of the five implemented IF/IE bits.
pub const INTERRUPT_MASK: u8 = 0x1F;

impl Interrupt {
    /// All sources, highest priority first.
    pub const ALL: [Interrupt; 5] = [
        Interrupt::VBlank,
        Interrupt::LcdStat,
        Interrupt::Timer,
        Interrupt::Serial,
        Interrupt::Joypad,
    ];

    #[inline]
    pub const fn bit(self) -> u8 {
        match self {
            Interrupt::VBlank => 0x01,
            Interrupt::LcdStat => 0x02,
            Interrupt::Timer => 0x04,
            Interrupt::Serial => 0x08,
            Interrupt::Joypad => 0x10,
        }
    }

    #[inline]
    pub const fn vector(self) -> u16 {
        match self {
            Interrupt::VBlank => 0x40,
            Interrupt::LcdStat => 0x48,
            Interrupt::Timer => 0x50,
            Interrupt::Serial => 0x58,
            Interrupt::Joypad => 0x60,
        }
    }
}

/// Set the request flag for `interrupt` in an IF register.
#[inline]
pub fn request(if_reg: &mut u8, interrupt: Interrupt) {
    *if_reg |= interrupt.bit();
}

/// Returns the highest-priority interrupt that is both requested and enabled.
pub fn highest_pending(if_reg: u8, ie_reg: u8) -> Option<Interrupt> {
    let pending = if_reg & ie_reg & INTERRUPT_MASK;
    Interrupt::ALL
        .into_iter()
        .find(|interrupt| pending & interrupt.bit() != 0)
}
