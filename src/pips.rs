//! Pip / price unit conversion
//!
//! All distance thresholds in the engine are expressed in pips. A `PipScale`
//! converts between pips and raw price deltas for one instrument. Pip counts
//! are rounded to `PIP_PRECISION` decimal places so that binary floating-point
//! noise (`1.1007 - 1.1000 = 0.000699999...`) never decides a threshold test.

use serde::{Deserialize, Serialize};

/// Decimal places kept when converting a price delta to pips
pub const PIP_PRECISION: i32 = 6;

/// Pip size used for most FX majors
pub const DEFAULT_PIP_SIZE: f64 = 0.0001;

/// Pip size for JPY-quoted pairs
pub const JPY_PIP_SIZE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipScale {
    pip_size: f64,
}

impl Default for PipScale {
    fn default() -> Self {
        Self {
            pip_size: DEFAULT_PIP_SIZE,
        }
    }
}

impl PipScale {
    /// Panics if `pip_size` is not a positive finite number.
    pub fn new(pip_size: f64) -> Self {
        assert!(
            pip_size.is_finite() && pip_size > 0.0,
            "pip size must be positive, got {}",
            pip_size
        );
        Self { pip_size }
    }

    /// Conventional pip size for an FX symbol (0.01 for JPY-quoted pairs)
    pub fn for_symbol(symbol: &str) -> Self {
        if symbol.to_ascii_uppercase().ends_with("JPY") {
            Self::new(JPY_PIP_SIZE)
        } else {
            Self::default()
        }
    }

    pub fn pip_size(&self) -> f64 {
        self.pip_size
    }

    /// Convert a pip count to a price delta
    #[inline]
    pub fn pips_to_price(&self, pips: f64) -> f64 {
        pips * self.pip_size
    }

    /// Convert a price delta to pips (signed)
    #[inline]
    pub fn price_to_pips(&self, delta: f64) -> f64 {
        let scale = 10f64.powi(PIP_PRECISION);
        (delta / self.pip_size * scale).round() / scale
    }
}
