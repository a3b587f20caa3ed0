//! Formatting and conversion helpers.

/// Format a frequency in hertz as a human-readable MHz string.
///
/// Returns a string like `"14.074000 MHz"` with six decimal places.
///
/// # Example
///
/// ```
/// use chanlib_core::format_freq_mhz;
///
/// assert_eq!(format_freq_mhz(14_074_000.0), "14.074000 MHz");
/// assert_eq!(format_freq_mhz(10_000_100.0), "10.000100 MHz");
/// ```
pub fn format_freq_mhz(freq_hz: f64) -> String {
    let mhz = freq_hz / 1_000_000.0;
    format!("{mhz:.6} MHz")
}

/// Estimate a channel's SNR in dB from radiod's power readings.
///
/// `baseband_db` is the channel power, `noise_density_db` the noise
/// spectral density in dB/Hz, and `bandwidth_hz` the filter width. Returns
/// `None` when any input is non-finite or the bandwidth is zero.
///
/// # Example
///
/// ```
/// use chanlib_core::snr_db;
///
/// // 5 kHz filter: noise power = -150 + 37 = -113 dB
/// let snr = snr_db(-90.0, -150.0, 5_000.0).unwrap();
/// assert!((snr - 23.01).abs() < 0.01);
/// assert_eq!(snr_db(-90.0, -150.0, 0.0), None);
/// ```
pub fn snr_db(baseband_db: f32, noise_density_db: f32, bandwidth_hz: f32) -> Option<f32> {
    let bw = bandwidth_hz.abs();
    if !baseband_db.is_finite() || !noise_density_db.is_finite() || !bw.is_finite() || bw == 0.0 {
        return None;
    }
    let noise_db = noise_density_db + 10.0 * bw.log10();
    let snr = baseband_db - noise_db;
    snr.is_finite().then_some(snr)
}
