//! A tuning session: one chip, its settings, its trim state and its run log.

use std::io::Write;
use std::path::Path;

use embedded_hal::delay::DelayNs;
use tracing::info;

use crate::board::Board;
use crate::driver::Ccpdv2;
use crate::error::Error;
use crate::pixel::{COLUMNS, ROWS, TdacMatrix};
use crate::retry::WaitOutcome;
use crate::runlog::RunLog;
use crate::search::{CancelToken, Probe, SearchOutcome, TdacOutcome, TdacState, Tuner, write_tdacs};
use crate::settings::{ChipSettings, Groups, Setting};

/// Owns the driver and everything the searches need between calls.
///
/// ```ignore
/// let log = RunLog::new(LogConfig::default());
/// let mut session = Session::new(chip, ChipSettings::default(), log)?;
/// session.init()?;
/// session.set(&[Setting::parse("pixels", "22,32")?, Setting::parse("th", "1.0")?])?;
/// let outcome = session.find_th(1.3, 0.6, -0.05)?;
/// ```
#[derive(Debug)]
pub struct Session<B, D> {
    chip: Ccpdv2<B, D>,
    settings: ChipSettings,
    tdacs: TdacState,
    log: RunLog,
    cancel: CancelToken,
}

impl<B: Board, D: DelayNs> Session<B, D> {
    /// Session over `chip`. Every trim starts at `settings.tdac`; nothing is
    /// written until [`Self::init`] or [`Self::set`].
    pub fn new(chip: Ccpdv2<B, D>, settings: ChipSettings, log: RunLog) -> Result<Self, Error> {
        let tdacs = TdacState::with_desired(TdacMatrix::filled(settings.tdac)?);
        Ok(Self {
            chip,
            settings,
            tdacs,
            log,
            cancel: CancelToken::new(),
        })
    }

    /// Current settings.
    pub fn settings(&self) -> &ChipSettings {
        &self.settings
    }

    /// Trim codes wanted on the chip and last written.
    pub fn tdacs(&self) -> &TdacState {
        &self.tdacs
    }

    /// The driver.
    pub fn chip(&mut self) -> &mut Ccpdv2<B, D> {
        &mut self.chip
    }

    /// The run log.
    pub fn log(&mut self) -> &mut RunLog {
        &mut self.log
    }

    /// Token that stops a running search from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Clear the register models and program everything but HV and the trims.
    pub fn init(&mut self) -> Result<(), Error> {
        self.log.command("init")?;
        self.chip.reset_registers();
        self.tdacs.invalidate();
        self.apply(Groups::INIT)
    }

    /// Apply a batch of settings, then program the hardware they touch.
    ///
    /// Settings are applied in order; if one is invalid the batch stops there
    /// and nothing is programmed.
    pub fn set(&mut self, settings: &[Setting]) -> Result<(), Error> {
        self.log.command("set")?;
        let mut groups = Groups::NONE;
        for setting in settings {
            let touched = setting
                .clone()
                .apply(&mut self.settings, &mut self.tdacs.desired)?;
            groups = groups.union(touched);
        }
        self.apply(groups)
    }

    fn apply(&mut self, groups: Groups) -> Result<(), Error> {
        if groups.power {
            self.chip.power_on(&self.settings.power)?;
            let readings = self.chip.power()?;
            self.log.power(&readings)?;
        }
        if groups.injection {
            self.chip
                .put_injection(self.settings.inj_high, self.settings.inj_low)?;
            self.log
                .injection(self.settings.inj_high, self.settings.inj_low)?;
        }
        if groups.hv {
            self.chip.put_hv(self.settings.hv)?;
            let (volts, amps) = self.chip.hv()?;
            self.log.hv(volts, amps)?;
        }
        if groups.global {
            self.chip.put_global(&self.settings.global)?;
            self.log.global(&self.settings.global)?;
        }
        if groups.tdac {
            write_tdacs(&mut self.chip, &mut self.tdacs, false)?;
            self.log.tdacs(&self.tdacs.desired)?;
        }
        if groups.config {
            self.chip.put_pixel_config(&self.settings.pixel_config)?;
            let bits = self.chip.config_register().group_strings();
            self.log.pixels(&self.settings.pixel_config, &bits)?;
        }
        if groups.pulser {
            self.chip.put_pulser(&self.settings.pulser)?;
            self.log.pulser(&self.settings.pulser)?;
        }
        if groups.threshold {
            self.chip.put_th(self.settings.th)?;
            self.log.threshold(self.settings.th)?;
        }
        if groups.pcb_threshold {
            self.chip.put_pcbth(self.settings.pcbth)?;
            self.log.pcb_threshold(self.settings.pcbth)?;
        }
        if groups.baseline {
            self.chip.put_bl(self.settings.bl)?;
            self.log.baseline(self.settings.bl)?;
        }
        if groups.mode {
            self.chip.put_mode(self.settings.mode)?;
            self.log.mode(self.settings.mode)?;
        }
        Ok(())
    }

    /// Borrow the chip, settings, trims and log as a [`Tuner`].
    pub fn tuner(&mut self) -> Tuner<'_, Ccpdv2<B, D>> {
        Tuner::new(&mut self.chip, &mut self.settings, &mut self.tdacs, &mut self.log)
            .with_cancel(self.cancel.clone())
    }

    /// See [`Tuner::scan_th`].
    pub fn scan_th(&mut self, start: f64, stop: f64, step: f64) -> Result<Vec<Probe>, Error> {
        self.tuner().scan_th(start, stop, step)
    }

    /// See [`Tuner::spectrum`].
    pub fn spectrum(&mut self, n: usize) -> Result<Vec<Probe>, Error> {
        self.tuner().spectrum(n)
    }

    /// See [`Tuner::find_th`].
    pub fn find_th(&mut self, start: f64, stop: f64, step: f64) -> Result<SearchOutcome, Error> {
        self.tuner().find_th(start, stop, step)
    }

    /// See [`Tuner::find_noise`].
    pub fn find_noise(
        &mut self,
        start: f64,
        stop: f64,
        step: f64,
        exposure: f64,
    ) -> Result<SearchOutcome, Error> {
        self.tuner().find_noise(start, stop, step, exposure)
    }

    /// See [`Tuner::find_tdac`].
    pub fn find_tdac(
        &mut self,
        count_threshold: usize,
        exposure: f64,
    ) -> Result<TdacOutcome, Error> {
        self.tuner().find_tdac(count_threshold, exposure)
    }

    /// Rewrite every trim column, whatever the cache says.
    pub fn set_tdac_again(&mut self) -> Result<WaitOutcome, Error> {
        self.log.command("set_tdac_again")?;
        write_tdacs(&mut self.chip, &mut self.tdacs, true)
    }

    /// Log a read-back of the board, the global DACs and the trims.
    pub fn show(&mut self) -> Result<(), Error> {
        self.log.command("show")?;
        let all = self.chip.all_config()?;
        self.log.all_config(&all)?;
        self.log.tdacs(&self.tdacs.desired)?;
        let bits = self.chip.config_register().group_strings();
        self.log.pixels(&self.settings.pixel_config, &bits)
    }

    /// Log both register models bit by bit.
    pub fn show2(&mut self) -> Result<(), Error> {
        self.log.command("show2")?;
        let config = self.chip.config_register().group_strings();
        self.log.config_bits(&config)?;
        let global = self.chip.global_register().slot_strings();
        self.log.global_bits(&global)
    }

    /// Move the working log onto the archive.
    pub fn clear(&mut self) -> Result<(), Error> {
        self.log.archive()
    }

    /// Desired trim codes as `(row, column, code)`, column-major.
    pub fn tdac_table(&self) -> Vec<(usize, usize, u8)> {
        let mut table = Vec::with_capacity(ROWS * COLUMNS);
        for column in 0..COLUMNS {
            let codes = self.tdacs.desired.column_codes(column);
            for (row, code) in codes.into_iter().enumerate() {
                table.push((row, column, code));
            }
        }
        table
    }

    /// Write [`Self::tdac_table`] as `row column code` lines, readable back with
    /// the `tdacfile` setting.
    pub fn save_tdac(&self, path: &Path) -> Result<(), Error> {
        let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
        for (row, column, code) in self.tdac_table() {
            writeln!(file, "{row} {column} {code}")?;
        }
        file.flush()?;
        info!(path = %path.display(), "saved trim table");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Rail;
    use crate::board::ShiftRegister;
    use crate::board::mock::{MockBoard, NoDelay};
    use crate::pixel::Pixel;
    use crate::runlog::LogConfig;
    use crate::settings::ReadoutMode;

    fn session(dir: &Path) -> Session<MockBoard, NoDelay> {
        let log = RunLog::new(LogConfig {
            echo: false,
            timestamps: false,
            ..LogConfig::in_dir(dir)
        });
        let chip = Ccpdv2::new(MockBoard::default(), NoDelay::default());
        Session::new(chip, ChipSettings::default(), log).unwrap()
    }

    fn config_loads(session: &mut Session<MockBoard, NoDelay>) -> usize {
        session
            .chip()
            .board()
            .loads
            .iter()
            .filter(|(register, _)| *register == ShiftRegister::Config)
            .count()
    }

    fn working_log(session: &mut Session<MockBoard, NoDelay>) -> String {
        std::fs::read_to_string(&session.log().config().working).unwrap()
    }

    #[test]
    fn init_programs_everything_but_hv_and_trims() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        session.init().unwrap();
        let board = session.chip().board();
        assert_eq!(board.voltages[&Rail::Threshold], 1.0);
        assert_eq!(board.voltages[&Rail::Baseline], 0.8);
        assert_eq!(board.voltages[&Rail::InjectionHigh], 0.75);
        assert!(!board.voltages.contains_key(&Rail::HighVoltage));
        assert_eq!(board.receiver, ReadoutMode::Rj45.receiver_config());
        assert_eq!(config_loads(&mut session), 1);

        let log = working_log(&mut session);
        let kinds: Vec<&str> = log
            .lines()
            .map(|line| line.split(' ').next().unwrap())
            .collect();
        assert_eq!(
            kinds,
            [
                "#cmd", "#Vdd", "#inj_high", "#BLRes", "#pixels", "#repeat", "#th", "#pcbth", "#bl",
                "#mode"
            ]
        );
    }

    #[test]
    fn trims_written_by_changed_column() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        session.init().unwrap();
        let before = config_loads(&mut session);

        session.set(&[Setting::TdacAll(7)]).unwrap();
        // Every column (ten commits each) plus the pixel config.
        assert_eq!(config_loads(&mut session) - before, 60 * 10 + 1);

        let before = config_loads(&mut session);
        session
            .set(&[Setting::parse("tdac3_17", "2").unwrap()])
            .unwrap();
        assert_eq!(config_loads(&mut session) - before, 10 + 1);
        assert_eq!(session.tdacs().written(), &session.tdacs().desired);
        assert_eq!(session.chip().board().voltages[&Rail::Vdd], 1.8);

        let before = config_loads(&mut session);
        session.set_tdac_again().unwrap();
        assert_eq!(config_loads(&mut session) - before, 60 * 10);
    }

    #[test]
    fn bad_setting_programs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        let result = session.set(&[Setting::Threshold(0.5), Setting::TdacAll(16)]);
        assert!(matches!(result, Err(Error::TdacOutOfRange(16))));
        assert!(session.chip().board().voltage_writes.is_empty());
    }

    #[test]
    fn out_of_range_threshold_setting_fails_before_write() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        let result = session.set(&[Setting::Threshold(2.5)]);
        assert!(matches!(result, Err(Error::ThresholdOutOfRange { .. })));
        assert!(!session.chip().board().voltages.contains_key(&Rail::Threshold));
    }

    #[test]
    fn saved_trims_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tdac.txt");
        let mut first = session(dir.path());
        first
            .set(&[
                Setting::TdacAll(4),
                Setting::TdacPixel(Pixel::new(23, 59).unwrap(), 11),
            ])
            .unwrap();
        first.save_tdac(&path).unwrap();
        let table = first.tdac_table();
        assert_eq!(table.len(), ROWS * COLUMNS);
        assert_eq!(table[1], (1, 0, 4));

        let mut second = session(dir.path());
        second.set(&[Setting::TdacFile(path)]).unwrap();
        assert_eq!(second.tdacs().desired, first.tdacs().desired);
    }

    #[test]
    fn show_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        session.init().unwrap();
        session.show().unwrap();
        session.show2().unwrap();
        let log = working_log(&mut session);
        assert!(log.contains("#cmd show\n#allconfig inj_high 0.750000"));
        assert!(log.contains("#cmd show2\n#config "));
        assert!(log.contains("\n#global "));

        session.clear().unwrap();
        let archive = std::fs::read_to_string(&session.log().config().archive).unwrap();
        assert_eq!(archive, log);
        assert!(!session.log().config().working.exists());
    }

    #[test]
    fn cancel_token_reaches_searches() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        session.cancel_token().cancel();
        let outcome = session.find_th(1.3, 0.6, -0.05).unwrap();
        assert_eq!(outcome, SearchOutcome::Cancelled { last: None });
        assert_eq!(session.find_tdac(5, 0.1).unwrap(), TdacOutcome::Cancelled);
    }
}
