//! Chip settings and the table of named parameters that change them.
//!
//! [`ChipSettings`] holds every value the session programs into the chip and the
//! board. It can be read from a TOML file; absent keys take the power-up
//! defaults. Individual values are changed at run time with [`Setting`]s, which
//! report the [`Groups`] of hardware that need re-programming.
//!
//! ```toml
//! th = 0.92
//! smallhit = 80
//!
//! [global]
//! VNDAC = 12
//!
//! [pulser]
//! repeat = 100
//!
//! [pixel_config]
//! pixels = [[22, 32]]
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Error;
use crate::board::ReceiverConfig;
use crate::pixel::{AnalogOut, COLUMNS, Pixel, PixelConfig, PreampEnable, ROWS, TdacMatrix};
use crate::registers::{GlobalDac, GlobalDacs};

/// Supply voltages applied at power-on, in volts.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PowerSettings {
    /// `CCPD_Vdd`.
    pub vdd: f64,
    /// `CCPD_Vssa`.
    pub vss: f64,
    /// `CCPD_VGate`.
    pub vgate: f64,
    /// `CCPD_Vcasc`.
    pub vcasc: f64,
}

impl Default for PowerSettings {
    fn default() -> Self {
        Self {
            vdd: 1.8,
            vss: 1.5,
            vgate: 2.1,
            vcasc: 1.0,
        }
    }
}

/// Injection pulser timing, in pulser clock cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PulserConfig {
    /// Injections per measurement; 0 selects single-shot TDC gate mode.
    pub repeat: u32,
    /// Injection period.
    pub period: u32,
    /// Delay of the TDC gate.
    pub delay: u32,
    /// Whether the injection output is driven.
    pub inj_en: bool,
}

impl Default for PulserConfig {
    fn default() -> Self {
        Self {
            repeat: 200,
            period: 100,
            delay: 2000,
            inj_en: true,
        }
    }
}

/// Where the board's FIFO takes its data from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadoutMode {
    /// CCPD TDC words only.
    Ccpd,
    /// FE-I4 readout with the hit monitor routed to the FE-I4.
    Hitmon,
    /// FE-I4 readout triggered by injection.
    Inj,
    /// FE-I4 readout with an external LEMO trigger.
    Lemo,
    /// FE-I4 readout with an RJ45 (TLU) trigger.
    Rj45,
}

impl ReadoutMode {
    /// Name used in run logs and settings.
    pub fn name(&self) -> &'static str {
        match self {
            ReadoutMode::Ccpd => "ccpd",
            ReadoutMode::Hitmon => "hitmon",
            ReadoutMode::Inj => "inj",
            ReadoutMode::Lemo => "lemo",
            ReadoutMode::Rj45 => "rj45",
        }
    }

    /// Receiver routing for this mode.
    pub fn receiver_config(&self) -> ReceiverConfig {
        let fei4 = ReceiverConfig {
            fe: true,
            tlu: true,
            tdc: true,
            ..ReceiverConfig::default()
        };
        match self {
            ReadoutMode::Ccpd => ReceiverConfig {
                ccpd_tdc: true,
                ..ReceiverConfig::default()
            },
            ReadoutMode::Hitmon => ReceiverConfig {
                hitmon_sel: true,
                ex_sel: true,
                ..fei4
            },
            ReadoutMode::Inj => ReceiverConfig {
                ex_sel: true,
                ..fei4
            },
            ReadoutMode::Lemo | ReadoutMode::Rj45 => fei4,
        }
    }
}

impl std::str::FromStr for ReadoutMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ccpd" => Ok(ReadoutMode::Ccpd),
            "hitmon" => Ok(ReadoutMode::Hitmon),
            "inj" => Ok(ReadoutMode::Inj),
            "lemo" => Ok(ReadoutMode::Lemo),
            "rj45" => Ok(ReadoutMode::Rj45),
            _ => Err(invalid("mode", s)),
        }
    }
}

/// How measurement records are written to the run log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFormat {
    /// `<parameter> <mean> <stddev> <count_good> <count_all>`.
    #[default]
    Summary,
    /// As [`RecordFormat::Summary`] with the list of good payloads in place of
    /// `count_all`.
    RawSamples,
}

/// Everything the session programs into the chip and board.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChipSettings {
    /// Global bias DACs.
    pub global: GlobalDacs,
    /// Supply voltages.
    pub power: PowerSettings,
    /// Sensor bias magnitude in volts; applied as a negative voltage.
    pub hv: f64,
    /// Comparator threshold in volts.
    pub th: f64,
    /// Amplifier baseline in volts.
    pub bl: f64,
    /// PCB discriminator threshold in volts.
    pub pcbth: f64,
    /// Injection pulse high level in volts.
    pub inj_high: f64,
    /// Injection pulse low level in volts.
    pub inj_low: f64,
    /// Injection pulser timing.
    pub pulser: PulserConfig,
    /// FIFO data source.
    pub mode: ReadoutMode,
    /// Pixel selection and enables.
    pub pixel_config: PixelConfig,
    /// Trim code every pixel starts with.
    pub tdac: u8,
    /// Payloads at or below this are treated as noise.
    pub smallhit: u16,
    /// Exposure per measurement in seconds; below 0.1 ms the TDC gate is awaited.
    pub exposure: f64,
    /// Run log record format.
    pub record_format: RecordFormat,
}

impl Default for ChipSettings {
    fn default() -> Self {
        Self {
            global: GlobalDacs::default(),
            power: PowerSettings::default(),
            hv: 5.0,
            th: 1.0,
            bl: 0.8,
            pcbth: 1.0,
            inj_high: 0.75,
            inj_low: 0.5,
            pulser: PulserConfig::default(),
            mode: ReadoutMode::Rj45,
            pixel_config: PixelConfig::default(),
            tdac: 0,
            smallhit: 100,
            exposure: 0.0,
            record_format: RecordFormat::Summary,
        }
    }
}

impl ChipSettings {
    /// Parse settings from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        Ok(toml::from_str(text)?)
    }

    /// Read settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

/// Hardware groups that need re-programming after settings change.
///
/// Groups are applied in field order.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Groups {
    pub power: bool,
    pub injection: bool,
    pub hv: bool,
    pub global: bool,
    pub tdac: bool,
    pub config: bool,
    pub pulser: bool,
    pub threshold: bool,
    pub pcb_threshold: bool,
    pub baseline: bool,
    pub mode: bool,
}

impl Groups {
    /// Groups programmed when a session starts: everything but HV and the trims.
    pub const INIT: Self = Self {
        power: true,
        injection: true,
        hv: false,
        global: true,
        tdac: false,
        config: true,
        pulser: true,
        threshold: true,
        pcb_threshold: true,
        baseline: true,
        mode: true,
    };

    /// Nothing to program.
    pub const NONE: Self = Self {
        power: false,
        injection: false,
        hv: false,
        global: false,
        tdac: false,
        config: false,
        pulser: false,
        threshold: false,
        pcb_threshold: false,
        baseline: false,
        mode: false,
    };

    /// Groups needing programming after both `self` and `other`.
    pub fn union(self, other: Self) -> Self {
        Self {
            power: self.power || other.power,
            injection: self.injection || other.injection,
            hv: self.hv || other.hv,
            global: self.global || other.global,
            tdac: self.tdac || other.tdac,
            config: self.config || other.config,
            pulser: self.pulser || other.pulser,
            threshold: self.threshold || other.threshold,
            pcb_threshold: self.pcb_threshold || other.pcb_threshold,
            baseline: self.baseline || other.baseline,
            mode: self.mode || other.mode,
        }
    }
}

/// Named pixel selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelSet {
    /// Every pixel.
    All,
    /// Columns 12 to 47, the region covered by the FE-I4.
    Standard,
    /// No pixel.
    None,
}

impl PixelSet {
    /// The pixels in the selection, column-major.
    pub fn pixels(&self) -> Vec<Pixel> {
        let columns = match self {
            PixelSet::All => 0..COLUMNS,
            PixelSet::Standard => 12..48,
            PixelSet::None => 0..0,
        };
        columns
            .flat_map(|column| (0..ROWS).filter_map(move |row| Pixel::new(row, column).ok()))
            .collect()
    }
}

/// A single change to the chip settings.
#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    /// One global bias DAC.
    Dac(GlobalDac, u8),
    /// `EnPullUp`.
    PullUp(bool),
    /// `EnPosFB`.
    PositiveFeedback(bool),
    /// Every trim code.
    TdacAll(u8),
    /// Trim code of the first selected pixel.
    TdacMonitorPixel(u8),
    /// Trim code of one pixel.
    TdacPixel(Pixel, u8),
    /// Replace the whole trim matrix.
    Tdacs(TdacMatrix),
    /// Load trim codes from a `row column code` table.
    TdacFile(PathBuf),
    /// Pixels routed to the monitor.
    Pixels(Vec<Pixel>),
    /// Preamplifier enables.
    Preamp(PreampEnable),
    /// Analog output selection.
    AnalogOut(AnalogOut),
    /// Monitor row enable override.
    MonitorMask(Option<u32>),
    /// Injections per measurement.
    Repeat(u32),
    /// Injection period.
    Period(u32),
    /// TDC gate delay.
    Delay(u32),
    /// Injection output enable.
    InjectionEnable(bool),
    /// Comparator threshold.
    Threshold(f64),
    /// Amplifier baseline.
    Baseline(f64),
    /// PCB discriminator threshold.
    PcbThreshold(f64),
    /// Injection high level.
    InjectionHigh(f64),
    /// Injection low level.
    InjectionLow(f64),
    /// Sensor bias magnitude.
    HighVoltage(f64),
    /// `CCPD_Vdd`.
    Vdd(f64),
    /// `CCPD_Vssa`.
    Vss(f64),
    /// `CCPD_Vcasc`.
    Vcasc(f64),
    /// `CCPD_VGate`.
    VGate(f64),
    /// FIFO data source.
    Mode(ReadoutMode),
    /// Exposure in seconds.
    Exposure(f64),
    /// Noise floor.
    SmallHit(u16),
    /// Run log record format.
    Format(RecordFormat),
}

type Parser = fn(&str) -> Option<Setting>;

/// Setting names and how to parse their values.
///
/// Global DAC names and `tdac<row>_<col>` are resolved before this table.
const SETTERS: &[(&str, Parser)] = &[
    ("EnPullUp", |v| flag(v).map(Setting::PullUp)),
    ("EnPosFB", |v| flag(v).map(Setting::PositiveFeedback)),
    ("tdacall", |v| v.parse().ok().map(Setting::TdacAll)),
    ("tdacmonpix", |v| v.parse().ok().map(Setting::TdacMonitorPixel)),
    ("tdacfile", |v| Some(Setting::TdacFile(PathBuf::from(v)))),
    ("pixels", parse_pixels),
    ("pix", parse_pixels),
    ("en", |v| flag(v).map(|on| Setting::Preamp(PreampEnable::All(on)))),
    ("ao", |v| match v {
        "0" => Some(Setting::AnalogOut(AnalogOut::Off)),
        "-1" => Some(Setting::AnalogOut(AnalogOut::SelectedColumns)),
        mask => mask.parse().ok().map(|m| Setting::AnalogOut(AnalogOut::Mask(m))),
    }),
    ("enLR", |v| match v {
        "-1" => Some(Setting::MonitorMask(None)),
        mask => mask.parse().ok().map(|m| Setting::MonitorMask(Some(m))),
    }),
    ("repeat", |v| v.parse().ok().map(Setting::Repeat)),
    ("period", |v| v.parse().ok().map(Setting::Period)),
    ("delay", |v| v.parse().ok().map(Setting::Delay)),
    ("inj_en", |v| flag(v).map(Setting::InjectionEnable)),
    ("th", |v| v.parse().ok().map(Setting::Threshold)),
    ("bl", |v| v.parse().ok().map(Setting::Baseline)),
    ("BL", |v| v.parse().ok().map(Setting::Baseline)),
    ("pcbth", |v| v.parse().ok().map(Setting::PcbThreshold)),
    ("inj_high", |v| v.parse().ok().map(Setting::InjectionHigh)),
    ("inj_low", |v| v.parse().ok().map(Setting::InjectionLow)),
    ("hv", |v| v.parse().ok().map(Setting::HighVoltage)),
    ("vdd", |v| v.parse().ok().map(Setting::Vdd)),
    ("vss", |v| v.parse().ok().map(Setting::Vss)),
    ("vcasc", |v| v.parse().ok().map(Setting::Vcasc)),
    ("vgate", |v| v.parse().ok().map(Setting::VGate)),
    ("mode", |v| v.parse().ok().map(Setting::Mode)),
    ("exp", |v| v.parse().ok().map(Setting::Exposure)),
    ("smallhit", |v| v.parse().ok().map(Setting::SmallHit)),
    ("dataformat", |v| {
        v.parse::<u32>().ok().map(|bits| {
            Setting::Format(if bits & 0x2 != 0 {
                RecordFormat::RawSamples
            } else {
                RecordFormat::Summary
            })
        })
    }),
];

fn flag(v: &str) -> Option<bool> {
    match v {
        "1" | "true" | "True" => Some(true),
        "0" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// `all`, `std`, `none`, or `row,col;row,col;...`.
fn parse_pixels(v: &str) -> Option<Setting> {
    let pixels = match v {
        "all" => PixelSet::All.pixels(),
        "std" => PixelSet::Standard.pixels(),
        "none" => PixelSet::None.pixels(),
        list => list
            .split(';')
            .map(|pair| {
                let (row, column) = pair.split_once(',')?;
                Pixel::new(row.trim().parse().ok()?, column.trim().parse().ok()?).ok()
            })
            .collect::<Option<Vec<_>>>()?,
    };
    Some(Setting::Pixels(pixels))
}

fn invalid(name: &str, value: &str) -> Error {
    Error::InvalidSettingValue {
        name: name.to_owned(),
        value: value.to_owned(),
    }
}

impl Setting {
    /// Look a setting up by name and parse its value.
    ///
    /// Names follow the chip documentation (`VNDAC`, `ThPRes`, …) for the global
    /// DACs, `tdac<row>_<col>` for a single trim, and the entries of the settings
    /// table otherwise (`th`, `bl`, `pixels`, `repeat`, …).
    pub fn parse(name: &str, value: &str) -> Result<Self, Error> {
        if let Some(dac) = GlobalDac::from_name(name) {
            return value
                .parse()
                .map(|v| Setting::Dac(dac, v))
                .map_err(|_| invalid(name, value));
        }
        if let Some((_, parser)) = SETTERS.iter().find(|(key, _)| *key == name) {
            return parser(value).ok_or_else(|| invalid(name, value));
        }
        if let Some((row, column)) = name
            .strip_prefix("tdac")
            .and_then(|rest| rest.split_once('_'))
        {
            let pixel = match (row.parse(), column.parse()) {
                (Ok(row), Ok(column)) => Pixel::new(row, column)?,
                _ => return Err(Error::UnknownSetting(name.to_owned())),
            };
            return value
                .parse()
                .map(|code| Setting::TdacPixel(pixel, code))
                .map_err(|_| invalid(name, value));
        }
        Err(Error::UnknownSetting(name.to_owned()))
    }

    /// Apply the change and report which hardware groups it touches.
    ///
    /// Trim changes are made to `tdacs`, the matrix the session wants on the chip.
    pub fn apply(
        self,
        settings: &mut ChipSettings,
        tdacs: &mut TdacMatrix,
    ) -> Result<Groups, Error> {
        let mut groups = Groups::NONE;
        match self {
            Setting::Dac(dac, value) => {
                settings.global.set(dac, value)?;
                groups.global = true;
            }
            Setting::PullUp(on) => {
                settings.global.en_pull_up = on;
                groups.global = true;
            }
            Setting::PositiveFeedback(on) => {
                settings.global.en_pos_fb = on;
                groups.global = true;
            }
            Setting::TdacAll(code) => {
                tdacs.fill(code)?;
                groups.tdac = true;
                groups.config = true;
            }
            Setting::TdacMonitorPixel(code) => {
                let pixel = settings
                    .pixel_config
                    .pixels
                    .first()
                    .copied()
                    .ok_or_else(|| invalid("tdacmonpix", "no pixel selected"))?;
                tdacs.set(pixel, code)?;
                groups.tdac = true;
                groups.config = true;
            }
            Setting::TdacPixel(pixel, code) => {
                tdacs.set(pixel, code)?;
                groups.tdac = true;
                groups.config = true;
            }
            Setting::Tdacs(matrix) => {
                *tdacs = matrix;
                groups.tdac = true;
                groups.config = true;
            }
            Setting::TdacFile(path) => {
                load_tdac_table(&path, tdacs)?;
                groups.tdac = true;
                groups.config = true;
            }
            Setting::Pixels(pixels) => {
                settings.pixel_config.pixels = pixels;
                groups.config = true;
            }
            Setting::Preamp(preamp) => {
                settings.pixel_config.preamp = preamp;
                groups.config = true;
            }
            Setting::AnalogOut(ao) => {
                settings.pixel_config.analog_out = ao;
                groups.config = true;
            }
            Setting::MonitorMask(mask) => {
                settings.pixel_config.monitor_mask = mask;
                groups.config = true;
            }
            Setting::Repeat(v) => {
                settings.pulser.repeat = v;
                groups.pulser = true;
            }
            Setting::Period(v) => {
                settings.pulser.period = v;
                groups.pulser = true;
            }
            Setting::Delay(v) => {
                settings.pulser.delay = v;
                groups.pulser = true;
            }
            Setting::InjectionEnable(on) => {
                settings.pulser.inj_en = on;
                groups.pulser = true;
            }
            Setting::Threshold(v) => {
                settings.th = v;
                groups.threshold = true;
            }
            Setting::Baseline(v) => {
                settings.bl = v;
                groups.baseline = true;
            }
            Setting::PcbThreshold(v) => {
                settings.pcbth = v;
                groups.pcb_threshold = true;
            }
            Setting::InjectionHigh(v) => {
                settings.inj_high = v;
                groups.injection = true;
            }
            Setting::InjectionLow(v) => {
                settings.inj_low = v;
                groups.injection = true;
            }
            Setting::HighVoltage(v) => {
                settings.hv = v;
                groups.hv = true;
            }
            Setting::Vdd(v) => {
                settings.power.vdd = v;
                groups.power = true;
            }
            Setting::Vss(v) => {
                settings.power.vss = v;
                groups.power = true;
            }
            Setting::Vcasc(v) => {
                settings.power.vcasc = v;
                groups.power = true;
            }
            Setting::VGate(v) => {
                settings.power.vgate = v;
                groups.power = true;
            }
            Setting::Mode(mode) => {
                settings.mode = mode;
                groups.mode = true;
            }
            Setting::Exposure(v) => settings.exposure = v,
            Setting::SmallHit(v) => settings.smallhit = v,
            Setting::Format(format) => settings.record_format = format,
        }
        Ok(groups)
    }
}

/// Read a whitespace-separated `row column code` table into `tdacs`.
///
/// Numbers may be written as floats (`3.0e0`); blank lines and `#` comments are
/// skipped.
pub fn load_tdac_table(path: &Path, tdacs: &mut TdacMatrix) -> Result<(), Error> {
    let text = std::fs::read_to_string(path)?;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<f64> = line
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|_| invalid("tdacfile", line))?;
        let [row, column, code] = fields[..] else {
            return Err(invalid("tdacfile", line));
        };
        if row < 0.0 || column < 0.0 || !(0.0..=255.0).contains(&code) {
            return Err(invalid("tdacfile", line));
        }
        tdacs.set(Pixel::new(row as usize, column as usize)?, code as u8)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_uses_the_table() {
        assert_eq!(Setting::parse("th", "0.9").unwrap(), Setting::Threshold(0.9));
        assert_eq!(Setting::parse("BL", "0.7").unwrap(), Setting::Baseline(0.7));
        assert_eq!(
            Setting::parse("VNDAC", "12").unwrap(),
            Setting::Dac(GlobalDac::VNDAC, 12)
        );
        assert_eq!(
            Setting::parse("tdac3_17", "9").unwrap(),
            Setting::TdacPixel(Pixel::new(3, 17).unwrap(), 9)
        );
        assert_eq!(
            Setting::parse("mode", "ccpd").unwrap(),
            Setting::Mode(ReadoutMode::Ccpd)
        );
        assert_eq!(
            Setting::parse("ao", "-1").unwrap(),
            Setting::AnalogOut(AnalogOut::SelectedColumns)
        );
    }

    #[test]
    fn unknown_names_rejected() {
        assert!(matches!(
            Setting::parse("VNDac", "3"),
            Err(Error::UnknownSetting(name)) if name == "VNDac"
        ));
        assert!(matches!(
            Setting::parse("th", "high"),
            Err(Error::InvalidSettingValue { .. })
        ));
    }

    #[test]
    fn pixel_lists_and_presets() {
        let Setting::Pixels(pixels) = Setting::parse("pixels", "22,32; 3,4").unwrap() else {
            panic!("expected pixels");
        };
        assert_eq!(pixels, vec![Pixel::new(22, 32).unwrap(), Pixel::new(3, 4).unwrap()]);
        let Setting::Pixels(std) = Setting::parse("pix", "std").unwrap() else {
            panic!("expected pixels");
        };
        assert_eq!(std.len(), 36 * ROWS);
        assert!(Setting::parse("pixels", "30,1").is_err());
    }

    #[test]
    fn apply_reports_groups() {
        let mut settings = ChipSettings::default();
        let mut tdacs = TdacMatrix::default();
        let groups = Setting::TdacAll(7).apply(&mut settings, &mut tdacs).unwrap();
        assert!(groups.tdac && groups.config);
        assert!(!groups.global);
        assert_eq!(tdacs, TdacMatrix::filled(7).unwrap());

        let groups = Setting::Dac(GlobalDac::ThP, 40)
            .apply(&mut settings, &mut tdacs)
            .unwrap();
        assert_eq!(groups, Groups { global: true, ..Groups::NONE });
        assert_eq!(settings.global.thp, 40);
    }

    #[test]
    fn monitor_pixel_trim_needs_a_pixel() {
        let mut settings = ChipSettings::default();
        let mut tdacs = TdacMatrix::default();
        assert!(Setting::TdacMonitorPixel(3).apply(&mut settings, &mut tdacs).is_err());
        settings.pixel_config.pixels = vec![Pixel::new(5, 6).unwrap()];
        Setting::TdacMonitorPixel(3).apply(&mut settings, &mut tdacs).unwrap();
        assert_eq!(tdacs.get(Pixel::new(5, 6).unwrap()), 3);
    }

    #[test]
    fn toml_overrides_defaults() {
        let settings = ChipSettings::from_toml_str(
            r#"
            th = 0.92
            mode = "ccpd"

            [global]
            VNDAC = 12

            [pulser]
            repeat = 100

            [pixel_config]
            pixels = [[22, 32]]
            analog_out = "selected_columns"
            "#,
        )
        .unwrap();
        assert_eq!(settings.th, 0.92);
        assert_eq!(settings.mode, ReadoutMode::Ccpd);
        assert_eq!(settings.global.vn_dac, 12);
        assert_eq!(settings.global.vn2, 60);
        assert_eq!(settings.pulser.repeat, 100);
        assert_eq!(settings.pulser.period, 100);
        assert_eq!(settings.pixel_config.pixels, vec![Pixel::new(22, 32).unwrap()]);
        assert_eq!(settings.pixel_config.analog_out, AnalogOut::SelectedColumns);
        assert_eq!(settings.smallhit, 100);
    }

    #[test]
    fn toml_rejects_pixel_off_matrix() {
        let result = ChipSettings::from_toml_str("[pixel_config]\npixels = [[24, 0]]\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn receiver_routing() {
        let ccpd = ReadoutMode::Ccpd.receiver_config();
        assert!(ccpd.ccpd_tdc && !ccpd.fe);
        let hitmon = ReadoutMode::Hitmon.receiver_config();
        assert!(hitmon.fe && hitmon.hitmon_sel && hitmon.ex_sel && !hitmon.ccpd_tdc);
        assert_eq!(
            ReadoutMode::Lemo.receiver_config(),
            ReadoutMode::Rj45.receiver_config()
        );
    }
}
