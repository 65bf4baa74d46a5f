//! Searches run against a synthetic front end whose response is a simple
//! function of the programmed threshold or trim code.
use std::path::Path;
use std::time::Duration;

use ccpdv2_tune::pixel::{Pixel, PixelConfig, ROWS};
use ccpdv2_tune::search::grid;
use ccpdv2_tune::{
    CancelToken, ChipSettings, Error, Frontend, LogConfig, RunLog, SampleBatch, SearchOutcome,
    TdacOutcome, TdacState, Tuner, WaitOutcome,
};

/// Payload well above the default noise floor of 100.
const HIT: u32 = 500;

enum Response {
    /// Nothing, ever.
    Silent,
    /// `words` hits whenever the threshold is at or below `edge`.
    Edge { edge: f64, words: usize },
    /// `words` hits whenever `pixel` has been written a code of at least `code`.
    TrimFrom { pixel: Pixel, code: u8, words: usize },
    /// An edge at `short`, moving up to `long` for exposures of 50 ms or more.
    ExposureEdge { short: f64, long: f64, words: usize },
    /// An edge at `edge` that only appears after `after` measurements.
    WarmUp { after: usize, edge: f64, words: usize },
}

fn below(th: f64, edge: f64, words: usize) -> usize {
    if th <= edge + 1e-9 { words } else { 0 }
}

struct Synthetic {
    response: Response,
    th: f64,
    thresholds: Vec<f64>,
    exposures: Vec<Duration>,
    columns: Vec<(usize, [u8; ROWS])>,
    trims: Vec<[u8; ROWS]>,
    config_writes: usize,
}

impl Synthetic {
    fn new(response: Response) -> Self {
        Self {
            response,
            th: 0.0,
            thresholds: Vec::new(),
            exposures: Vec::new(),
            columns: Vec::new(),
            trims: vec![[0; ROWS]; 60],
            config_writes: 0,
        }
    }
}

impl Frontend for Synthetic {
    fn set_threshold_voltage(&mut self, volts: f64) -> Result<(), Error> {
        if !(-0.1..=1.999).contains(&volts) {
            return Err(Error::ThresholdOutOfRange { volts });
        }
        self.th = volts;
        self.thresholds.push(volts);
        Ok(())
    }

    fn threshold_voltage(&mut self) -> Result<f64, Error> {
        Ok(self.th)
    }

    fn write_tdac_column(
        &mut self,
        column: usize,
        codes: &[u8; ROWS],
    ) -> Result<WaitOutcome, Error> {
        self.columns.push((column, *codes));
        self.trims[column] = *codes;
        Ok(WaitOutcome::Done)
    }

    fn write_config_register(&mut self, _config: &PixelConfig) -> Result<WaitOutcome, Error> {
        self.config_writes += 1;
        Ok(WaitOutcome::Done)
    }

    fn trigger_measurement(&mut self, exposure: Duration) -> Result<SampleBatch, Error> {
        let measurements = self.exposures.len();
        self.exposures.push(exposure);
        let words = match self.response {
            Response::Silent => 0,
            Response::Edge { edge, words } => below(self.th, edge, words),
            Response::ExposureEdge { short, long, words } => {
                let edge = if exposure >= Duration::from_millis(50) {
                    long
                } else {
                    short
                };
                below(self.th, edge, words)
            }
            Response::WarmUp { after, edge, words } => {
                if measurements >= after {
                    below(self.th, edge, words)
                } else {
                    0
                }
            }
            Response::TrimFrom { pixel, code, words } => {
                if self.trims[pixel.column()][pixel.row()] >= code {
                    words
                } else {
                    0
                }
            }
        };
        Ok(SampleBatch(vec![HIT; words]))
    }
}

fn quiet_log(dir: &Path) -> RunLog {
    RunLog::new(LogConfig {
        echo: false,
        timestamps: false,
        ..LogConfig::in_dir(dir)
    })
}

fn read_log(log: &RunLog) -> String {
    std::fs::read_to_string(&log.config().working).unwrap()
}

#[test]
fn scan_visits_half_open_grid() -> Result<(), Error> {
    let dir = tempfile::tempdir()?;
    let mut log = quiet_log(dir.path());
    let mut frontend = Synthetic::new(Response::Silent);
    let mut settings = ChipSettings::default();
    let mut tdacs = TdacState::new();

    let probes = Tuner::new(&mut frontend, &mut settings, &mut tdacs, &mut log)
        .scan_th(1.0, 0.8, -0.1)?;
    let visited: Vec<f64> = probes.iter().map(|p| p.parameter).collect();
    assert_eq!(visited.len(), 2);
    assert!((visited[0] - 1.0).abs() < 1e-12);
    assert!((visited[1] - 0.9).abs() < 1e-12);
    assert!((settings.th - 0.9).abs() < 1e-12);
    assert_eq!(
        read_log(&log),
        "#cmd scan_th 1.000000 0.800000 -0.100000\n\
         1.000000 NaN NaN 0 0\n\
         0.900000 NaN NaN 0 0\n"
    );
    Ok(())
}

#[test]
fn repeated_scan_logs_identically() -> Result<(), Error> {
    let mut logs = Vec::new();
    for _ in 0..2 {
        let dir = tempfile::tempdir()?;
        let mut log = quiet_log(dir.path());
        let mut frontend = Synthetic::new(Response::Edge { edge: 0.95, words: 40 });
        let mut settings = ChipSettings::default();
        let mut tdacs = TdacState::new();
        Tuner::new(&mut frontend, &mut settings, &mut tdacs, &mut log).scan_th(1.1, 0.8, -0.01)?;
        logs.push(read_log(&log));
    }
    assert_eq!(logs[0], logs[1]);
    assert!(logs[0].contains(" 500.000000 0.000000 40 40\n"));
    Ok(())
}

#[test]
fn spectrum_logs_against_index() -> Result<(), Error> {
    let dir = tempfile::tempdir()?;
    let mut log = quiet_log(dir.path());
    let mut frontend = Synthetic::new(Response::Edge { edge: 2.0, words: 3 });
    let mut settings = ChipSettings::default();
    let mut tdacs = TdacState::new();

    let probes = Tuner::new(&mut frontend, &mut settings, &mut tdacs, &mut log).spectrum(3)?;
    assert_eq!(probes.len(), 3);
    assert!(frontend.thresholds.is_empty());
    assert!(read_log(&log).ends_with("2.000000 500.000000 0.000000 3 3\n"));
    Ok(())
}

#[test]
fn find_th_converges_on_edge() -> Result<(), Error> {
    let dir = tempfile::tempdir()?;
    let mut log = quiet_log(dir.path());
    let mut frontend = Synthetic::new(Response::Edge { edge: 0.95, words: 200 });
    let mut settings = ChipSettings::default();
    assert_eq!(settings.pulser.repeat, 200);
    let mut tdacs = TdacState::new();

    let outcome = Tuner::new(&mut frontend, &mut settings, &mut tdacs, &mut log)
        .find_th(1.3, 0.6, -0.05)?;
    let SearchOutcome::Found { threshold } = outcome else {
        panic!("expected convergence, got {outcome:?}");
    };
    assert!((threshold - 0.95).abs() <= 0.001);

    // Coarse walk down to the edge, then restarts 45 mV and 6 mV above it.
    let restarts: Vec<f64> = frontend
        .thresholds
        .windows(2)
        .filter(|pair| pair[1] > pair[0])
        .map(|pair| pair[1])
        .collect();
    assert_eq!(restarts.len(), 2);
    assert!((restarts[0] - 0.995).abs() < 1e-6);
    assert!((restarts[1] - 0.956).abs() < 1e-6);
    assert!(read_log(&log).starts_with("#cmd find_th -0.050000\n"));
    Ok(())
}

#[test]
fn find_th_without_response_is_exhausted() -> Result<(), Error> {
    let dir = tempfile::tempdir()?;
    let mut log = quiet_log(dir.path());
    let mut frontend = Synthetic::new(Response::Silent);
    let mut settings = ChipSettings::default();
    let mut tdacs = TdacState::new();

    let outcome = Tuner::new(&mut frontend, &mut settings, &mut tdacs, &mut log)
        .find_th(1.3, 0.6, -0.05)?;
    assert!(matches!(outcome, SearchOutcome::Exhausted { last: Some(_) }));
    assert_eq!(frontend.thresholds.len(), grid(1.3, 0.6, -0.05).len());
    Ok(())
}

#[test]
fn out_of_range_threshold_aborts_search() {
    let dir = tempfile::tempdir().unwrap();
    let mut log = quiet_log(dir.path());
    let mut frontend = Synthetic::new(Response::Silent);
    let mut settings = ChipSettings::default();
    let mut tdacs = TdacState::new();

    let result = Tuner::new(&mut frontend, &mut settings, &mut tdacs, &mut log)
        .find_th(2.5, 0.6, -0.05);
    assert!(matches!(result, Err(Error::ThresholdOutOfRange { .. })));
    assert!(frontend.thresholds.is_empty());
    assert!(frontend.exposures.is_empty());
    assert_eq!(settings.th, ChipSettings::default().th);
}

#[test]
fn cancelled_search_stops_before_probing() -> Result<(), Error> {
    let dir = tempfile::tempdir()?;
    let mut log = quiet_log(dir.path());
    let mut frontend = Synthetic::new(Response::Silent);
    let mut settings = ChipSettings::default();
    let mut tdacs = TdacState::new();
    let cancel = CancelToken::new();
    cancel.cancel();

    let outcome = Tuner::new(&mut frontend, &mut settings, &mut tdacs, &mut log)
        .with_cancel(cancel)
        .find_noise(1.1, 0.6, -0.05, 0.01)?;
    assert_eq!(outcome, SearchOutcome::Cancelled { last: None });
    assert!(frontend.exposures.is_empty());
    Ok(())
}

#[test]
fn silent_noise_search_retries_with_half_step() -> Result<(), Error> {
    let dir = tempfile::tempdir()?;
    let mut log = quiet_log(dir.path());
    let mut frontend = Synthetic::new(Response::Silent);
    let mut settings = ChipSettings::default();
    let mut tdacs = TdacState::new();

    let outcome = Tuner::new(&mut frontend, &mut settings, &mut tdacs, &mut log)
        .find_noise(1.1, 0.6, -0.05, 0.01)?;
    assert!(matches!(outcome, SearchOutcome::Exhausted { .. }));

    let first = grid(1.1, 0.6, -0.05).len();
    let again = grid(1.1, 0.6, -0.025).len();
    assert_eq!(frontend.thresholds.len(), first + again);
    let second_pass = &frontend.thresholds[first..];
    assert!((second_pass[0] - 1.1).abs() < 1e-12);
    assert!((second_pass[1] - second_pass[0] + 0.025).abs() < 1e-9);
    Ok(())
}

#[test]
fn noise_search_refines_to_fine_step() -> Result<(), Error> {
    let dir = tempfile::tempdir()?;
    let mut log = quiet_log(dir.path());
    let mut frontend = Synthetic::new(Response::Edge { edge: 0.8234, words: 10 });
    let mut settings = ChipSettings::default();
    let mut tdacs = TdacState::new();

    let outcome = Tuner::new(&mut frontend, &mut settings, &mut tdacs, &mut log)
        .find_noise(1.1, 0.6, -0.05, 0.01)?;
    let SearchOutcome::Found { threshold } = outcome else {
        panic!("expected convergence, got {outcome:?}");
    };
    assert!((threshold - 0.823).abs() < 1e-9);

    // The last two phases run with ten times the exposure.
    let first = frontend.exposures[0].as_secs_f64();
    let last = frontend.exposures[frontend.exposures.len() - 1].as_secs_f64();
    assert!((first - 0.01).abs() < 1e-6);
    assert!((last - 0.1).abs() < 1e-6);
    assert!((settings.exposure - 0.1).abs() < 1e-12);
    assert!(read_log(&log).ends_with("#noise th 0.823000\n"));
    Ok(())
}

fn noise_search(response: Response) -> Result<(Synthetic, f64), Error> {
    let dir = tempfile::tempdir()?;
    let mut log = quiet_log(dir.path());
    let mut frontend = Synthetic::new(response);
    let mut settings = ChipSettings::default();
    let mut tdacs = TdacState::new();

    let outcome = Tuner::new(&mut frontend, &mut settings, &mut tdacs, &mut log)
        .find_noise(1.1, 0.6, -0.05, 0.01)?;
    let SearchOutcome::Found { threshold } = outcome else {
        panic!("expected convergence, got {outcome:?}");
    };
    Ok((frontend, threshold))
}

fn assert_probes(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len(), "{actual:?}");
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-9, "{actual:?} != {expected:?}");
    }
}

#[test]
fn noise_search_moves_coarse_grid_up_when_head_fires() -> Result<(), Error> {
    let (frontend, threshold) = noise_search(Response::Edge { edge: 1.3, words: 10 })?;
    assert!((threshold - 1.3).abs() < 1e-9);
    // Restarted ten steps above the first probe, then 45 mV above the hit.
    assert_probes(
        &frontend.thresholds[..10],
        &[1.1, 1.6, 1.55, 1.5, 1.45, 1.4, 1.35, 1.3, 1.345, 1.34],
    );
    assert_eq!(frontend.thresholds.len(), 33);
    Ok(())
}

#[test]
fn noise_search_moves_medium_grid_up_when_head_fires() -> Result<(), Error> {
    let (frontend, threshold) = noise_search(Response::Edge { edge: 0.948, words: 10 })?;
    assert!((threshold - 0.948).abs() < 1e-9);
    // The medium grid starts at 0.945, which already fires.
    assert_probes(
        &frontend.thresholds[..8],
        &[1.1, 1.05, 1.0, 0.95, 0.9, 0.945, 0.99, 0.985],
    );
    assert!((frontend.exposures[6].as_secs_f64() - 0.01).abs() < 1e-6);
    assert_eq!(frontend.thresholds.len(), 28);
    Ok(())
}

#[test]
fn noise_search_moves_long_exposure_grid_up_when_head_fires() -> Result<(), Error> {
    let (frontend, threshold) = noise_search(Response::ExposureEdge {
        short: 0.9,
        long: 0.96,
        words: 10,
    })?;
    assert!((threshold - 0.96).abs() < 1e-9);
    assert_probes(
        &frontend.thresholds[13..18],
        &[0.905, 0.9, 0.945, 0.99, 0.985],
    );
    assert!((frontend.exposures[14].as_secs_f64() - 0.01).abs() < 1e-6);
    assert!((frontend.exposures[15].as_secs_f64() - 0.1).abs() < 1e-6);
    assert!((frontend.exposures[16].as_secs_f64() - 0.1).abs() < 1e-6);
    assert_probes(
        &frontend.thresholds[22..],
        &[0.96, 0.964, 0.963, 0.962, 0.961, 0.96],
    );
    Ok(())
}

#[test]
fn noise_search_moves_second_coarse_grid_up_when_head_fires() -> Result<(), Error> {
    let first = grid(1.1, 0.6, -0.05).len();
    let (frontend, threshold) = noise_search(Response::WarmUp {
        after: first,
        edge: 1.3,
        words: 10,
    })?;
    assert!((threshold - 1.3).abs() < 1e-9);
    // Second pass with half the step, moved up ten half steps.
    assert_probes(
        &frontend.thresholds[first - 1..first + 5],
        &[0.6, 1.1, 1.35, 1.325, 1.3, 1.345],
    );
    assert_eq!(frontend.thresholds.len(), 40);
    Ok(())
}

#[test]
fn noise_search_hit_on_last_coarse_probe_halves_step() -> Result<(), Error> {
    let (frontend, threshold) = noise_search(Response::Edge { edge: 0.61, words: 10 })?;
    assert!((threshold - 0.61).abs() < 1e-9);
    let first = grid(1.1, 0.6, -0.05).len();
    let again = grid(1.1, 0.6, -0.025).len();
    assert_probes(&frontend.thresholds[first - 1..first + 2], &[0.6, 1.1, 1.075]);
    // The half-step pass fires on its own last probe and goes to 5 mV steps.
    assert_probes(
        &frontend.thresholds[first + again - 1..first + again + 2],
        &[0.6, 0.645, 0.64],
    );
    assert_eq!(frontend.thresholds.len(), 55);
    Ok(())
}

fn trim_search(code: u8) -> Result<(Synthetic, TdacState, TdacOutcome, String), Error> {
    let dir = tempfile::tempdir()?;
    let mut log = quiet_log(dir.path());
    let pixel = Pixel::new(22, 32)?;
    let mut frontend = Synthetic::new(Response::TrimFrom {
        pixel,
        code,
        words: 20,
    });
    let mut settings = ChipSettings::default();
    settings.pixel_config.pixels = vec![pixel];
    let mut tdacs = TdacState::new();

    let outcome = Tuner::new(&mut frontend, &mut settings, &mut tdacs, &mut log).find_tdac(5, 0.1)?;
    let text = read_log(&log);
    Ok((frontend, tdacs, outcome, text))
}

#[test]
fn trim_search_backs_off_one_code() -> Result<(), Error> {
    let (frontend, tdacs, outcome, log) = trim_search(7)?;
    assert_eq!(outcome, TdacOutcome::Found(6));

    let pixel = Pixel::new(22, 32)?;
    assert_eq!(tdacs.desired.get(pixel), 6);
    assert_eq!(tdacs.written(), &tdacs.desired);
    let (column, codes) = frontend.columns.last().unwrap();
    assert_eq!(*column, 32);
    assert_eq!(codes[22], 6);

    // First update writes every column; after that only the pixel's column.
    assert!(frontend.columns[60..].iter().all(|(column, _)| *column == 32));
    assert_eq!(frontend.columns.len(), 60 + 7 + 1);
    assert_eq!(frontend.config_writes, 8);
    assert!(log.starts_with("#cmd find_tdac 0.100000\n"));
    assert!(log.ends_with("#found tdac 6\n"));
    Ok(())
}

#[test]
fn trim_search_at_floor_keeps_zero() -> Result<(), Error> {
    let (frontend, tdacs, outcome, log) = trim_search(0)?;
    assert_eq!(outcome, TdacOutcome::Floor);
    assert_eq!(tdacs.desired.get(Pixel::new(22, 32)?), 0);
    assert_eq!(frontend.columns.len(), 60);
    assert!(log.ends_with("#found tdac -1\n"));
    Ok(())
}

#[test]
fn trim_search_out_of_range() -> Result<(), Error> {
    let (frontend, tdacs, outcome, log) = trim_search(16)?;
    assert_eq!(outcome, TdacOutcome::OutOfRange);
    assert_eq!(tdacs.desired.get(Pixel::new(22, 32)?), 15);
    assert_eq!(frontend.exposures.len(), 16);
    assert!(log.ends_with("#found tdac out of range\n"));
    Ok(())
}
