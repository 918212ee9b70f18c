//! Short-term loudness for the capture-mode level meter.

/// Floor mapped to an empty meter.
pub const DEFAULT_FLOOR_DB: f32 = -45.0;

/// Loudness of `pcm` on a 0..=100 display scale.
///
/// Mean-square amplitude relative to full scale, in dB, remapped linearly so
/// `floor_db` reads 0 and 0 dBFS reads 100.
pub fn level_percent(pcm: &[i16], floor_db: f32) -> u8 {
    if pcm.is_empty() || floor_db >= 0.0 {
        return 0;
    }
    let sum: f64 = pcm.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    let full_scale = f64::from(i16::MAX) * f64::from(i16::MAX);
    let mean_square = (sum + f64::from(f32::EPSILON)) / pcm.len() as f64 / full_scale;
    let db = 10.0 * mean_square.log10();

    let floor = f64::from(floor_db);
    let ratio = ((db - floor) / -floor).clamp(0.0, 1.0);
    (ratio * 100.0) as u8
}

/// `[ 42%]########            |` style bar for a 0..=100 value.
pub fn render_level(percent: u8, width: usize) -> String {
    let percent = percent.min(100);
    let filled = width * usize::from(percent) / 100;
    format!(
        "[{:3}%]{}{}|",
        percent,
        "#".repeat(filled),
        " ".repeat(width - filled)
    )
}
