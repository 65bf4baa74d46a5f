use std::time::Duration;

use embedded_hal::delay::DelayNs;
use tracing::{debug, warn};

use super::{Ccpdv2, PowerReadings, RailReading};
use crate::board::{Board, Rail};
use crate::error::Error;
use crate::settings::PowerSettings;

/// Current limit on `CCPD_Vdd` while powering up, in milliamps.
const VDD_CURRENT_LIMIT: f64 = 200.0;
/// Settling time after switching `CCPD_Vdd`.
const VDD_SETTLE: Duration = Duration::from_secs(1);
/// `CCPD_Vdd` while trim codes are shifted in.
const TRIM_VDD: f64 = 1.999;

impl<B: Board, D: DelayNs> Ccpdv2<B, D> {
    /// Read voltage and current of one rail.
    pub fn rail(&mut self, rail: Rail) -> Result<RailReading, Error> {
        Ok(RailReading {
            volts: self.board.voltage(rail)?,
            milliamps: self.board.current(rail)?,
        })
    }

    ////////////////////////////////////////////////////////////////////////////////
    // Supplies
    ////////////////////////////////////////////////////////////////////////////////

    /// Bring the supplies up in order: `Vdd` (then wait 1 s), `Vssa`, `VGate`,
    /// `Vcasc`.
    pub fn power_on(&mut self, power: &PowerSettings) -> Result<(), Error> {
        self.board.set_current_limit(Rail::Vdd, VDD_CURRENT_LIMIT)?;
        self.board.set_voltage(Rail::Vdd, power.vdd)?;
        self.board.set_rail_enabled(Rail::Vdd, true)?;
        self.sleep(VDD_SETTLE);
        self.board.set_voltage(Rail::Vssa, power.vss)?;
        self.board.set_rail_enabled(Rail::Vssa, true)?;
        self.board.set_voltage(Rail::VGate, power.vgate)?;
        self.board.set_rail_enabled(Rail::VGate, true)?;
        self.board.set_voltage(Rail::Vcasc, power.vcasc)?;
        self.power = *power;
        Ok(())
    }

    /// Zero the biases and switch the supplies off, `Vdd` last.
    pub fn power_off(&mut self) -> Result<(), Error> {
        for rail in [Rail::Vcasc, Rail::Baseline, Rail::Threshold, Rail::PcbThreshold] {
            self.board.set_voltage(rail, 0.0)?;
        }
        self.board.set_rail_enabled(Rail::Vssa, false)?;
        self.board.set_rail_enabled(Rail::VGate, false)?;
        self.sleep(VDD_SETTLE);
        self.board.set_rail_enabled(Rail::Vdd, false)?;
        Ok(())
    }

    /// Read back the four supply rails.
    pub fn power(&mut self) -> Result<PowerReadings, Error> {
        Ok(PowerReadings {
            vdd: self.rail(Rail::Vdd)?,
            vssa: self.rail(Rail::Vssa)?,
            vgate: self.rail(Rail::VGate)?,
            vcasc: self.rail(Rail::Vcasc)?,
        })
    }

    pub(super) fn raise_vdd_for_trim(&mut self) -> Result<(), Error> {
        self.board.set_voltage(Rail::Vdd, TRIM_VDD)?;
        let reading = self.rail(Rail::Vdd)?;
        debug!(volts = reading.volts, milliamps = reading.milliamps, "Vdd raised for trim update");
        Ok(())
    }

    pub(super) fn restore_vdd(&mut self) -> Result<(), Error> {
        self.board.set_voltage(Rail::Vdd, self.power.vdd)?;
        let reading = self.rail(Rail::Vdd)?;
        debug!(volts = reading.volts, milliamps = reading.milliamps, "Vdd restored");
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////////////
    // Biases
    ////////////////////////////////////////////////////////////////////////////////

    /// Set the comparator threshold.
    ///
    /// # Errors
    ///
    /// [`Error::ThresholdOutOfRange`] outside `-0.1..=1.999` V; nothing is written.
    pub fn put_th(&mut self, volts: f64) -> Result<(), Error> {
        if !(-0.1..=1.999).contains(&volts) {
            return Err(Error::ThresholdOutOfRange { volts });
        }
        self.board.set_voltage(Rail::Threshold, volts)?;
        Ok(())
    }

    /// Read back the comparator threshold.
    pub fn threshold(&mut self) -> Result<RailReading, Error> {
        self.rail(Rail::Threshold)
    }

    /// Set the amplifier baseline.
    ///
    /// # Errors
    ///
    /// [`Error::BaselineOutOfRange`] outside `-0.1..=1.9` V; nothing is written.
    pub fn put_bl(&mut self, volts: f64) -> Result<(), Error> {
        if !(-0.1..=1.9).contains(&volts) {
            return Err(Error::BaselineOutOfRange { volts });
        }
        self.board.set_voltage(Rail::Baseline, volts)?;
        Ok(())
    }

    /// Read back the amplifier baseline.
    pub fn baseline(&mut self) -> Result<RailReading, Error> {
        self.rail(Rail::Baseline)
    }

    /// Set the threshold of the discriminator on the carrier PCB.
    pub fn put_pcbth(&mut self, volts: f64) -> Result<(), Error> {
        self.board.set_voltage(Rail::PcbThreshold, volts)?;
        Ok(())
    }

    /// Read back the PCB discriminator threshold.
    pub fn pcb_threshold(&mut self) -> Result<RailReading, Error> {
        self.rail(Rail::PcbThreshold)
    }

    /// Set the injection pulse levels.
    pub fn put_injection(&mut self, high: f64, low: f64) -> Result<(), Error> {
        self.board.set_voltage(Rail::InjectionHigh, high)?;
        self.board.set_voltage(Rail::InjectionLow, low)?;
        Ok(())
    }

    /// Read back the injection pulse levels as `(high, low)`.
    pub fn injection(&mut self) -> Result<(f64, f64), Error> {
        Ok((
            self.board.voltage(Rail::InjectionHigh)?,
            self.board.voltage(Rail::InjectionLow)?,
        ))
    }

    /// Program the HV supply with `-hv` volts.
    ///
    /// `hv` is the sensor bias and must not be positive; a positive `hv` is refused
    /// with a warning and nothing is written.
    pub fn put_hv(&mut self, hv: f64) -> Result<(), Error> {
        let bias = -hv;
        if bias < 0.0 {
            warn!(hv, "HV must be negative");
            return Ok(());
        }
        self.board.set_voltage(Rail::HighVoltage, bias)?;
        Ok(())
    }

    /// Read back the sensor bias as `(volts, amps)`.
    pub fn hv(&mut self) -> Result<(f64, f64), Error> {
        let reading = self.rail(Rail::HighVoltage)?;
        Ok((reading.volts, reading.milliamps / 1000.0))
    }
}
