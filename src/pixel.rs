//! Pixel addressing, per-pixel trim codes and pixel enable configuration.

use serde::Deserialize;

use crate::Error;

/// Number of pixel rows on the CCPDv2.
pub const ROWS: usize = 24;
/// Number of pixel columns on the CCPDv2.
pub const COLUMNS: usize = 60;
/// Largest trim code a TDAC accepts.
pub const TDAC_MAX: u8 = 15;

/// Coordinate of a single pixel, `row` in `0..24` and `column` in `0..60`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "[usize; 2]")]
pub struct Pixel {
    row: usize,
    column: usize,
}

impl Pixel {
    /// Create a pixel coordinate, checking it lies on the matrix.
    pub fn new(row: usize, column: usize) -> Result<Self, Error> {
        if row < ROWS && column < COLUMNS {
            Ok(Self { row, column })
        } else {
            Err(Error::PixelOutOfRange { row, column })
        }
    }

    /// Pixel row.
    pub fn row(&self) -> usize {
        self.row
    }

    /// Pixel column.
    pub fn column(&self) -> usize {
        self.column
    }
}

impl TryFrom<[usize; 2]> for Pixel {
    type Error = Error;

    fn try_from([row, column]: [usize; 2]) -> Result<Self, Self::Error> {
        Self::new(row, column)
    }
}

impl std::fmt::Display for Pixel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.row, self.column)
    }
}

/// Map a FE-I4 pixel seen through the capacitive coupling back to a CCPDv2 pixel.
///
/// Three CCPDv2 pixels share each FE-I4 pixel; `vncout` (`0..3`) says which of
/// the three output buffers (`VNCOut1..3`) was enabled when the hit was seen.
/// Only the 12 x 32 FE-I4 region covering the sensor is valid.
pub fn fei4_to_ccpd(fei4_row: usize, fei4_column: usize, vncout: usize) -> Result<Pixel, Error> {
    if fei4_row >= 12 || fei4_column >= 32 || vncout >= 3 {
        return Err(Error::PixelOutOfRange {
            row: fei4_row,
            column: fei4_column,
        });
    }
    let row_base = (11 - fei4_row) * 2;
    let column = (15 - fei4_column / 2) * 3 + vncout;
    let same_parity = fei4_row % 2 == fei4_column % 2;
    // The middle buffer is wired to the opposite sub-row of the outer two.
    let upper = if vncout == 1 { !same_parity } else { same_parity };
    Pixel::new(row_base + usize::from(upper), column)
}

/// Trim DAC codes for the whole matrix.
///
/// Codes are `0..=15`; `-1` marks a pixel whose code is unknown (never written).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TdacMatrix {
    codes: [[i8; COLUMNS]; ROWS],
}

/// Pixel whose code is taken as the common value when logging a matrix.
pub(crate) const REFERENCE_PIXEL: (usize, usize) = (5, 49);

impl TdacMatrix {
    /// Matrix with every code unknown, for a write cache nothing has touched.
    pub fn unknown() -> Self {
        Self {
            codes: [[-1; COLUMNS]; ROWS],
        }
    }

    /// Matrix with every pixel set to `code`.
    pub fn filled(code: u8) -> Result<Self, Error> {
        let code = check_code(code)?;
        Ok(Self {
            codes: [[code; COLUMNS]; ROWS],
        })
    }

    /// Code of one pixel, `-1` if unknown.
    pub fn get(&self, pixel: Pixel) -> i8 {
        self.codes[pixel.row][pixel.column]
    }

    /// Set the code of one pixel.
    pub fn set(&mut self, pixel: Pixel, code: u8) -> Result<(), Error> {
        self.codes[pixel.row][pixel.column] = check_code(code)?;
        Ok(())
    }

    /// Set every pixel to `code`.
    pub fn fill(&mut self, code: u8) -> Result<(), Error> {
        let code = check_code(code)?;
        self.codes = [[code; COLUMNS]; ROWS];
        Ok(())
    }

    /// The 24 codes of one column, unknown codes written as 0.
    pub fn column_codes(&self, column: usize) -> [u8; ROWS] {
        let mut out = [0u8; ROWS];
        for (row, code) in out.iter_mut().enumerate() {
            *code = self.codes[row][column].max(0) as u8;
        }
        out
    }

    /// Columns in which `self` and `other` differ, in ascending order.
    pub fn changed_columns(&self, other: &TdacMatrix) -> Vec<usize> {
        (0..COLUMNS)
            .filter(|&column| {
                (0..ROWS).any(|row| self.codes[row][column] != other.codes[row][column])
            })
            .collect()
    }

    /// Code of the reference pixel used as the common value in logs.
    pub fn reference_code(&self) -> i8 {
        self.codes[REFERENCE_PIXEL.0][REFERENCE_PIXEL.1]
    }

    /// Pixels whose code differs from [`Self::reference_code`], row-major.
    pub fn outliers(&self) -> Vec<(usize, usize, i8)> {
        let reference = self.reference_code();
        let mut out = Vec::new();
        for (row, codes) in self.codes.iter().enumerate() {
            for (column, &code) in codes.iter().enumerate() {
                if code != reference {
                    out.push((row, column, code));
                }
            }
        }
        out
    }

    /// Rows of the matrix.
    pub fn rows(&self) -> impl Iterator<Item = &[i8; COLUMNS]> {
        self.codes.iter()
    }
}

impl Default for TdacMatrix {
    fn default() -> Self {
        Self {
            codes: [[0; COLUMNS]; ROWS],
        }
    }
}

fn check_code(code: u8) -> Result<i8, Error> {
    if code <= TDAC_MAX {
        Ok(code as i8)
    } else {
        Err(Error::TdacOutOfRange(code))
    }
}

/// Preamplifier enables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreampEnable {
    /// Every preamplifier on or off; the selected pixels are always switched on.
    All(bool),
    /// One 24-bit row mask for each of the three column phases (`col % 3`).
    ///
    /// The most significant of the 24 bits is row 0.
    RowMasks([u32; 3]),
}

/// Analog output (`ao`) column selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalogOut {
    /// No column drives the analog output.
    Off,
    /// The columns holding the selected pixels drive it.
    SelectedColumns,
    /// 20-bit mask of COLUMN groups; bit `g` drives group `g`.
    Mask(u32),
}

/// Everything written to the pixel configuration register apart from the trims.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PixelConfig {
    /// Pixels routed to the hit monitor.
    pub pixels: Vec<Pixel>,
    /// Preamplifier enables.
    pub preamp: PreampEnable,
    /// Analog output column selection.
    pub analog_out: AnalogOut,
    /// Optional 24-bit override of the monitor row enables (`EnL`/`EnR`).
    ///
    /// The most significant of the 24 bits is row 0.
    pub monitor_mask: Option<u32>,
}

impl Default for PixelConfig {
    fn default() -> Self {
        Self {
            pixels: Vec::new(),
            preamp: PreampEnable::All(true),
            analog_out: AnalogOut::Off,
            monitor_mask: None,
        }
    }
}

impl PixelConfig {
    /// Render the selected pixels like `[[22, 32], [3, 4]]`.
    pub(crate) fn pixels_string(&self) -> String {
        let inner: Vec<String> = self.pixels.iter().map(Pixel::to_string).collect();
        format!("[{}]", inner.join(", "))
    }
}
