//! Interface to the readout board that carries the CCPDv2.
//!
//! The board supplies the chip's analog rails, shifts the configuration
//! registers in, generates injection and TDC gate pulses, and buffers TDC words
//! in a FIFO. How it does so (USB, Ethernet, a simulator) is up to the
//! implementation; [`Ccpdv2`] only needs the blocking calls of the [`Board`]
//! trait.
//!
//! [`Ccpdv2`]: crate::Ccpdv2

use crate::error::BoardError;

/// Analog supply and bias rails on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rail {
    /// Digital and analog supply of the sensor (`CCPD_Vdd`).
    Vdd,
    /// Analog ground reference (`CCPD_Vssa`).
    Vssa,
    /// Gate bias (`CCPD_VGate`).
    VGate,
    /// Cascode bias (`CCPD_Vcasc`).
    Vcasc,
    /// Amplifier baseline (`CCPD_BL`).
    Baseline,
    /// Comparator threshold (`CCPD_Th`).
    Threshold,
    /// Threshold of the discriminator on the carrier PCB (`PCB_Th`).
    PcbThreshold,
    /// Injection pulse high level.
    InjectionHigh,
    /// Injection pulse low level.
    InjectionLow,
    /// Sensor bias high voltage.
    HighVoltage,
}

/// Shift registers on the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShiftRegister {
    /// 120-bit global bias DAC register.
    Global,
    /// 432-bit pixel configuration register.
    Config,
}

/// Pulse generators on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pulser {
    /// Drives the injection capacitors.
    Injection,
    /// Opens the TDC acquisition window.
    TdcGate,
}

/// Timing of one pulse generator, in clock cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PulserSettings {
    /// Delay from start to the first pulse.
    pub delay: u32,
    /// Width of each pulse.
    pub width: u32,
    /// Number of pulses per start.
    pub repeat: u32,
    /// Whether the output is driven.
    pub enabled: bool,
}

/// Routing flags of the board's receiver block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverConfig {
    /// FE-I4 data receiver.
    pub fe: bool,
    /// Trigger logic unit input.
    pub tlu: bool,
    /// Board TDC input.
    pub tdc: bool,
    /// CCPD TDC input; when set the FIFO holds CCPD TDC words.
    pub ccpd_tdc: bool,
    /// Route the hit monitor to the FE-I4.
    pub hitmon_sel: bool,
    /// Select the external input.
    pub ex_sel: bool,
}

/// Blocking transport to the readout board.
///
/// All calls block until the board has acknowledged them. Voltages are in volts
/// and currents in milliamps.
pub trait Board {
    /// Set the output voltage of a rail.
    fn set_voltage(&mut self, rail: Rail, volts: f64) -> Result<(), BoardError>;
    /// Read back the output voltage of a rail.
    fn voltage(&mut self, rail: Rail) -> Result<f64, BoardError>;
    /// Read back the current drawn from a rail.
    fn current(&mut self, rail: Rail) -> Result<f64, BoardError>;
    /// Limit the current a rail may source.
    fn set_current_limit(&mut self, rail: Rail, milliamps: f64) -> Result<(), BoardError>;
    /// Switch a rail's output on or off.
    fn set_rail_enabled(&mut self, rail: Rail, enabled: bool) -> Result<(), BoardError>;

    /// Load the contents of a shift register into the board's buffer.
    ///
    /// Bit 0 of `bits[0]` is the first bit of the register.
    fn load_shift_register(&mut self, register: ShiftRegister, bits: &[u8])
    -> Result<(), BoardError>;
    /// Start shifting the loaded contents into the chip.
    fn start_shift_register(&mut self, register: ShiftRegister) -> Result<(), BoardError>;
    /// True once the last started shift has finished.
    fn shift_register_done(&mut self, register: ShiftRegister) -> Result<bool, BoardError>;

    /// Program a pulse generator.
    fn configure_pulser(
        &mut self,
        pulser: Pulser,
        settings: &PulserSettings,
    ) -> Result<(), BoardError>;
    /// Read back a pulse generator's settings.
    fn pulser_settings(&mut self, pulser: Pulser) -> Result<PulserSettings, BoardError>;
    /// Fire a pulse generator.
    fn start_pulser(&mut self, pulser: Pulser) -> Result<(), BoardError>;
    /// True once the pulse train started last has finished.
    fn pulser_done(&mut self, pulser: Pulser) -> Result<bool, BoardError>;

    /// Reset the CCPD TDC.
    fn reset_tdc(&mut self) -> Result<(), BoardError>;
    /// Enable or disable TDC conversions.
    fn set_tdc_enabled(&mut self, enabled: bool) -> Result<(), BoardError>;
    /// Gate the TDC with the external (TDC gate pulser) signal.
    fn set_tdc_external(&mut self, external: bool) -> Result<(), BoardError>;
    /// Read back the TDC enable flags as `(enabled, external)`.
    fn tdc_flags(&mut self) -> Result<(bool, bool), BoardError>;

    /// Discard everything in the data FIFO.
    fn reset_fifo(&mut self) -> Result<(), BoardError>;
    /// Drain the data FIFO.
    fn read_fifo(&mut self) -> Result<Vec<u32>, BoardError>;

    /// Reset the receiver block.
    fn reset_receiver(&mut self) -> Result<(), BoardError>;
    /// Write the receiver routing flags.
    fn write_receiver(&mut self, config: ReceiverConfig) -> Result<(), BoardError>;
}
