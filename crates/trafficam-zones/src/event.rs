use serde::{Deserialize, Serialize};

/// Opaque tags identifying where and when a clip was recorded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipContext {
    pub rotunda: String,
    pub schedule: String,
    pub day: String,
}

/// One completed entry→exit crossing. Times are seconds from the clip start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrossingEvent {
    pub object_id: u64,
    pub rotunda: String,
    pub schedule: String,
    pub day: String,
    pub entry_zone: usize,
    pub exit_zone: usize,
    pub entry_time: f64,
    pub exit_time: f64,
    pub dwell: f64,
    pub vehicle_type: String,
    pub vehicle_color: String,
}

impl CrossingEvent {
    pub fn entry_time_hms(&self) -> String {
        format_hms(self.entry_time)
    }

    pub fn exit_time_hms(&self) -> String {
        format_hms(self.exit_time)
    }

    pub fn dwell_hms(&self) -> String {
        format_hms(self.dwell)
    }
}

/// `HH:MM:S.mmm`: zero-padded hours and minutes, seconds with three decimals
/// and no padding (`00:01:5.250`). Negative inputs render as zero.
pub fn format_hms(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let hours = (seconds / 3600.0).floor() as u64;
    let minutes = ((seconds % 3600.0) / 60.0).floor() as u64;
    let rest = seconds % 60.0;
    format!("{hours:02}:{minutes:02}:{rest:.3}")
}
