use super::{Rating, TrackRecord};

/// Anything listened to for longer than this counts as played, whatever the duration says
pub const PLAYED_FLOOR_SECONDS: i64 = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Played,
    Skipped,
}

/// Played once past half the track, or past four minutes.
/// `duration_ms / 2000` is integer division. A zero duration is unknown, so only the floor applies;
/// a bare `elapsed > duration_ms / 2000` would count every short play of such a track as played.
pub fn classify(elapsed_secs: i64, duration_ms: u64) -> Classification {
    let past_half = duration_ms > 0 && elapsed_secs > (duration_ms / 2000) as i64;
    if past_half || elapsed_secs > PLAYED_FLOOR_SECONDS {
        Classification::Played
    } else {
        Classification::Skipped
    }
}

impl TrackRecord {
    /// Apply the play/skip rule at `now` and report whether the record should be queued.
    /// Skip markers only go out when the track carries track-auth.
    pub fn finalize(&mut self, now: i64) -> bool {
        let elapsed = now.saturating_sub(self.start_time());
        let played = classify(elapsed, self.duration_ms) == Classification::Played;

        if !played && !self.rating.is_set() && self.has_track_auth() {
            self.rating = Rating::Skipped;
        }

        played || self.rating.is_set()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackInfo;

    fn record(duration_ms: u64, track_auth: &str) -> TrackRecord {
        TrackRecord::started(
            TrackInfo {
                title: "X".to_string(),
                artist: "Y".to_string(),
                album: String::new(),
                duration_ms,
                track_auth: track_auth.to_string(),
            },
            0,
            0,
        )
    }

    #[test]
    fn test_classify_threshold() {
        for duration_ms in [2_000u64, 90_000, 180_000, 181_999, 600_000, 3_600_000] {
            for elapsed in [0i64, 1, 44, 45, 89, 90, 91, 239, 240, 241, 1_000] {
                let expected = elapsed > (duration_ms / 2000) as i64 || elapsed > 240;
                assert_eq!(
                    classify(elapsed, duration_ms) == Classification::Played,
                    expected,
                    "elapsed={} duration_ms={}",
                    elapsed,
                    duration_ms
                );
            }
        }
    }

    #[test]
    fn test_long_track_uses_floor() {
        // 20 minute track: half is 600s, but 241s is already enough
        assert_eq!(classify(241, 1_200_000), Classification::Played);
        assert_eq!(classify(240, 1_200_000), Classification::Skipped);
    }

    #[test]
    fn test_unknown_duration_relies_on_floor() {
        for elapsed in [0i64, 1, 30, 120, 240] {
            assert_eq!(classify(elapsed, 0), Classification::Skipped, "elapsed={}", elapsed);
        }
        assert_eq!(classify(241, 0), Classification::Played);
    }

    #[test]
    fn test_sub_two_second_duration() {
        // 1999ms halves to 0 whole seconds
        assert_eq!(classify(1, 1_999), Classification::Played);
        assert_eq!(classify(0, 1_999), Classification::Skipped);
    }

    #[test]
    fn test_finalize_played_keeps_rating() {
        let mut track = record(180_000, "abc");
        assert!(track.finalize(200));
        assert_eq!(track.rating, Rating::None);
    }

    #[test]
    fn test_finalize_skip_with_auth_marks_skipped() {
        let mut track = record(180_000, "abc");
        assert!(track.finalize(30));
        assert_eq!(track.rating, Rating::Skipped);
    }

    #[test]
    fn test_finalize_skip_without_auth_discards() {
        let mut track = record(180_000, "");
        assert!(!track.finalize(30));
        assert_eq!(track.rating, Rating::None);
    }

    #[test]
    fn test_finalize_skip_keeps_explicit_rating() {
        let mut track = record(180_000, "abc");
        track.rating = Rating::Loved;
        assert!(track.finalize(30));
        assert_eq!(track.rating, Rating::Loved);

        let mut track = record(180_000, "");
        track.rating = Rating::Banned;
        assert!(track.finalize(5));
        assert_eq!(track.rating, Rating::Banned);
    }

    #[test]
    fn test_finalize_unknown_duration_short_play() {
        let mut track = record(0, "");
        assert!(!track.finalize(120));

        let mut track = record(0, "abc");
        assert!(track.finalize(120));
        assert_eq!(track.rating, Rating::Skipped);
    }

    #[test]
    fn test_finalize_survives_absurd_start_time() {
        let mut track: TrackRecord = serde_json::from_str(&format!(
            r#"{{"title":"X","artist":"Y","album":"","duration_ms":180000,"start_time":{}}}"#,
            i64::MIN
        ))
        .unwrap();
        assert!(track.finalize(i64::MAX));
        assert_eq!(track.rating, Rating::None);

        let mut track = record(180_000, "abc");
        assert!(track.finalize(i64::MIN));
        assert_eq!(track.rating, Rating::Skipped);
    }

    #[test]
    fn test_finalize_floor_with_unknown_duration() {
        let mut track = record(0, "");
        assert!(track.finalize(241));
        assert_eq!(track.rating, Rating::None);
    }
}
