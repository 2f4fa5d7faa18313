// crates/vireo-core/src/helpers/time.rs
//
// Container-duration arithmetic shared by the demuxer and the playback
// controller. The on-screen counters and the loop-around check both go
// through these, so the integer-division behaviour here is load-bearing:
// `duration_seconds` truncates the sub-second part to centiseconds, which
// keeps `framerate * duration_seconds` an exact frame count for whole-second
// clips.

/// Microseconds per second, the unit container durations arrive in.
pub const AV_TIME_BASE: i64 = 1_000_000;

/// Split a duration in `AV_TIME_BASE` units into (hours, minutes, seconds,
/// leftover microseconds).
///
/// ```
/// use vireo_core::helpers::time::split_duration_us;
/// assert_eq!(split_duration_us(2_000_005), (0, 0, 2, 5));
/// assert_eq!(split_duration_us(3_725_000_000), (1, 2, 5, 0));
/// ```
pub fn split_duration_us(duration_us: i64) -> (i32, i32, i32, i64) {
    let micros = duration_us % AV_TIME_BASE;
    let mut secs = duration_us / AV_TIME_BASE;
    let mut mins = secs / 60;
    secs %= 60;
    let hours = mins / 60;
    mins %= 60;
    (hours as i32, mins as i32, secs as i32, micros)
}

/// Reassemble a split duration into fractional seconds.
///
/// The microsecond part contributes in centisecond steps only: the inner
/// `(100 * micros) / AV_TIME_BASE` is integer division.
pub fn duration_seconds(hours: i32, minutes: i32, seconds: i32, micros: i64) -> f64 {
    let whole = (hours as i64) * 3600 + (minutes as i64) * 60 + (seconds as i64);
    whole as f64 + 0.01 * ((100 * micros) / AV_TIME_BASE) as f64
}

/// Format split counters as `hh:mm:ss.cc` for the editor overlay.
///
/// ```
/// use vireo_core::helpers::time::format_counters;
/// assert_eq!(format_counters(0, 1, 5, 250_000), "00:01:05.25");
/// ```
pub fn format_counters(hours: i32, minutes: i32, seconds: i32, micros: i64) -> String {
    let centis = (100 * micros) / AV_TIME_BASE;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{centis:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_handles_sub_second_remainder() {
        let (h, m, s, us) = split_duration_us(2_005_000);
        assert_eq!((h, m, s), (0, 0, 2));
        assert_eq!(us, 5_000);
    }

    #[test]
    fn split_carries_minutes_and_hours() {
        // 1h 01m 01.5s
        let (h, m, s, us) = split_duration_us(3_661_500_000);
        assert_eq!((h, m, s, us), (1, 1, 1, 500_000));
    }

    #[test]
    fn duration_seconds_truncates_to_centiseconds() {
        // 5 microseconds vanish below the centisecond step.
        assert_eq!(duration_seconds(0, 0, 2, 5), 2.0);
        // Half a second survives as 0.50.
        assert_eq!(duration_seconds(0, 0, 2, 500_000), 2.5);
    }

    #[test]
    fn two_second_clip_yields_sixty_frames_at_thirty_fps() {
        let (h, m, s, us) = split_duration_us(2_000_005);
        let duration = duration_seconds(h, m, s, us);
        let frames = (30.0 * duration) as i64;
        assert_eq!(frames, 60);
    }

    #[test]
    fn counters_format_as_hh_mm_ss_cc() {
        assert_eq!(format_counters(1, 2, 3, 40_000), "01:02:03.04");
        assert_eq!(format_counters(0, 0, 0, 0), "00:00:00.00");
    }
}
