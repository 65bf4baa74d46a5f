//! Append-only text log of a tuning run.
//!
//! Every command and measurement is written as one line to the working log
//! (`scan.txt` by default). Metadata lines start with `#`; measurement lines are
//! `<parameter> <mean> <stddev> <count_good> <count_all>`. Each append opens,
//! writes and closes the file so the log survives a crash mid-run.
//! [`RunLog::archive`] moves the working log onto the end of the archive.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::Error;
use crate::analysis::ResponseStats;
use crate::driver::{AllConfig, PowerReadings};
use crate::pixel::{PixelConfig, TdacMatrix};
use crate::registers::{GlobalDac, GlobalDacs};
use crate::settings::{PulserConfig, ReadoutMode, RecordFormat};

/// Outliers above this many are logged as the whole matrix.
const COMPACT_TDAC_LIMIT: usize = 15;

/// Where the run log lives and how lines are decorated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Working log, appended to by every command.
    pub working: PathBuf,
    /// Archive the working log is moved onto by [`RunLog::archive`].
    pub archive: PathBuf,
    /// Also emit every line as an `info` event.
    pub echo: bool,
    /// Stamp `#cmd` lines with the local time.
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            working: PathBuf::from("scan.txt"),
            archive: PathBuf::from("scan_archive.txt"),
            echo: true,
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// `scan.txt` and `scan_archive.txt` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            working: dir.join("scan.txt"),
            archive: dir.join("scan_archive.txt"),
            ..Self::default()
        }
    }
}

/// Writer for the run log.
#[derive(Debug, Clone)]
pub struct RunLog {
    config: LogConfig,
}

impl RunLog {
    /// Log with the given paths. Nothing is created until the first append.
    pub fn new(config: LogConfig) -> Self {
        Self { config }
    }

    /// Paths and options in use.
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Append one record. Embedded newlines are written as `,` so that every
    /// record is one line.
    pub fn append(&mut self, text: &str) -> Result<(), Error> {
        let line = text.replace('\n', ",");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.working)?;
        writeln!(file, "{line}")?;
        if self.config.echo {
            info!("{text}");
        }
        Ok(())
    }

    /// Move the working log onto the end of the archive.
    ///
    /// A missing working log is not an error; the archive is still created.
    pub fn archive(&mut self) -> Result<(), Error> {
        let mut archive = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.archive)?;
        let mut working = match File::open(&self.config.working) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.config.working.display(), "no working log to archive");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        io::copy(&mut working, &mut archive)?;
        drop(working);
        std::fs::remove_file(&self.config.working)?;
        Ok(())
    }

    /// `#cmd <timestamp> <command>`.
    pub fn command(&mut self, command: &str) -> Result<(), Error> {
        let line = if self.config.timestamps {
            let now = chrono::Local::now().format("%y/%m/%d-%H:%M:%S");
            format!("#cmd {now} {command}")
        } else {
            format!("#cmd {command}")
        };
        self.append(&line)
    }

    /// One measurement record.
    pub fn data(
        &mut self,
        parameter: f64,
        stats: &ResponseStats,
        format: RecordFormat,
    ) -> Result<(), Error> {
        let head = format!(
            "{:.6} {:.6} {:.6} {}",
            parameter, stats.mean, stats.stddev, stats.count_good
        );
        let line = match format {
            RecordFormat::Summary => format!("{head} {}", stats.count_all),
            RecordFormat::RawSamples => {
                let good: Vec<String> = stats.good.iter().map(u16::to_string).collect();
                format!("{head} [{}]", good.join(" "))
            }
        };
        self.append(&line)
    }

    /// Trim codes: `#tdacall <common>` plus `,tdac<row>-<col> <code>` for each
    /// pixel that differs, or the whole matrix if too many differ.
    pub fn tdacs(&mut self, tdacs: &TdacMatrix) -> Result<(), Error> {
        let mut text = format!("#tdacall {}", tdacs.reference_code());
        let outliers = tdacs.outliers();
        if outliers.len() < COMPACT_TDAC_LIMIT {
            for (row, column, code) in outliers {
                text.push_str(&format!(",tdac{row}-{column} {code}"));
            }
        } else {
            for row in tdacs.rows() {
                let codes: Vec<String> = row.iter().map(i8::to_string).collect();
                text.push_str(&format!("\n#[{}]", codes.join(" ")));
            }
        }
        self.append(&text)
    }

    /// Global DACs, four lines of `#<name> <value>,…`.
    pub fn global(&mut self, dacs: &GlobalDacs) -> Result<(), Error> {
        let mut lines: Vec<String> = GlobalDac::ALL
            .chunks(5)
            .map(|chunk| {
                let fields: Vec<String> = chunk
                    .iter()
                    .map(|dac| format!("{} {}", dac.name(), dacs.get(*dac)))
                    .collect();
                format!("#{}", fields.join(","))
            })
            .collect();
        if let Some(last) = lines.last_mut() {
            last.push_str(&format!(
                ",EnPullUp {},EnPosFB {}",
                u8::from(dacs.en_pull_up),
                u8::from(dacs.en_pos_fb)
            ));
        }
        self.append(&lines.join("\n"))
    }

    /// `#hv_v <volts> hv_i <amps>`.
    pub fn hv(&mut self, volts: f64, amps: f64) -> Result<(), Error> {
        self.append(&format!("#hv_v {volts:.6} hv_i {amps:.6}"))
    }

    /// `#pixels <list> config <bits>`.
    pub fn pixels(&mut self, config: &PixelConfig, bits: &[String]) -> Result<(), Error> {
        self.append(&format!("#pixels {} config {}", config.pixels_string(), bits.join(" ")))
    }

    /// `#repeat <n> period <n> delay <n> inj_en <0|1>`.
    pub fn pulser(&mut self, pulser: &PulserConfig) -> Result<(), Error> {
        self.append(&format!(
            "#repeat {} period {} delay {} inj_en {}",
            pulser.repeat,
            pulser.period,
            pulser.delay,
            u8::from(pulser.inj_en)
        ))
    }

    /// Supply readings after power-on.
    pub fn power(&mut self, power: &PowerReadings) -> Result<(), Error> {
        self.append(&format!(
            "#Vdd {:.6} {:.6} Vssa {:.6} {:.6} VGate {:.6} {:.6} Vcasc {:.6} {:.6}",
            power.vdd.volts,
            power.vdd.milliamps,
            power.vssa.volts,
            power.vssa.milliamps,
            power.vgate.volts,
            power.vgate.milliamps,
            power.vcasc.volts,
            power.vcasc.milliamps
        ))
    }

    /// `#th <volts>`.
    pub fn threshold(&mut self, volts: f64) -> Result<(), Error> {
        self.append(&format!("#th {volts:.6}"))
    }

    /// `#pcbth <volts>`.
    pub fn pcb_threshold(&mut self, volts: f64) -> Result<(), Error> {
        self.append(&format!("#pcbth {volts:.6}"))
    }

    /// `#bl <volts>`.
    pub fn baseline(&mut self, volts: f64) -> Result<(), Error> {
        self.append(&format!("#bl {volts:.6}"))
    }

    /// `#inj_high <volts> inj_low <volts>`.
    pub fn injection(&mut self, high: f64, low: f64) -> Result<(), Error> {
        self.append(&format!("#inj_high {high:.6} inj_low {low:.6}"))
    }

    /// `#mode <name>`.
    pub fn mode(&mut self, mode: ReadoutMode) -> Result<(), Error> {
        self.append(&format!("#mode {}", mode.name()))
    }

    /// `#config <group> <group> …`, the pixel register in group order.
    pub fn config_bits(&mut self, groups: &[String]) -> Result<(), Error> {
        self.append(&format!("#config {}", groups.join(" ")))
    }

    /// `#global <slot> <slot> …`, the global register in slot order.
    pub fn global_bits(&mut self, slots: &[String]) -> Result<(), Error> {
        self.append(&format!("#global {}", slots.join(" ")))
    }

    /// `#noise th <volts>`.
    pub fn noise_threshold(&mut self, volts: f64) -> Result<(), Error> {
        self.append(&format!("#noise th {volts:.6}"))
    }

    /// `#found tdac <code>`, or `#found tdac out of range`.
    pub fn found_tdac(&mut self, code: Option<i32>) -> Result<(), Error> {
        match code {
            Some(code) => self.append(&format!("#found tdac {code}")),
            None => self.append("#found tdac out of range"),
        }
    }

    /// Snapshot of everything read back from the hardware.
    pub fn all_config(&mut self, all: &AllConfig) -> Result<(), Error> {
        let rx = &all.receiver;
        self.append(&format!(
            "#allconfig inj_high {:.6} inj_low {:.6} bl {:.6} {:.6} \
             th {:.6} {:.6} pcbth {:.6} {:.6}\n\
             #inj delay {} width {} repeat {} en {} gate delay {} width {} repeat {} en {}\n\
             #tdc en {} ext {} rx fe {} tlu {} tdc {} ccpd_tdc {} hitmon {} ex {}",
            all.injection_high,
            all.injection_low,
            all.baseline.volts,
            all.baseline.milliamps,
            all.threshold.volts,
            all.threshold.milliamps,
            all.pcb_threshold.volts,
            all.pcb_threshold.milliamps,
            all.injection.delay,
            all.injection.width,
            all.injection.repeat,
            u8::from(all.injection.enabled),
            all.tdc_gate.delay,
            all.tdc_gate.width,
            all.tdc_gate.repeat,
            u8::from(all.tdc_gate.enabled),
            u8::from(all.tdc_enabled),
            u8::from(all.tdc_external),
            u8::from(rx.fe),
            u8::from(rx.tlu),
            u8::from(rx.tdc),
            u8::from(rx.ccpd_tdc),
            u8::from(rx.hitmon_sel),
            u8::from(rx.ex_sel),
        ))?;
        self.power(&all.power)?;
        self.global(&all.global)
    }
}
