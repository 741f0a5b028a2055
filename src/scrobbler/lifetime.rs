/// Whether the host can let the scrobbler go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// Background work is still out
    KeepAlive,
    /// Nothing in flight, safe to save state and stop
    MayTerminate,
    /// Connectivity dropped; no point waiting on the network
    ShutdownNow,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobStatus {
    pub now_playing_in_flight: bool,
    pub flush_in_flight: bool,
    pub connectivity_lost: bool,
}

impl JobStatus {
    /// Pure function of the status; call it as often as you like
    pub fn lifetime(&self) -> Lifetime {
        if self.connectivity_lost {
            Lifetime::ShutdownNow
        } else if self.now_playing_in_flight || self.flush_in_flight {
            Lifetime::KeepAlive
        } else {
            Lifetime::MayTerminate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_may_terminate() {
        let status = JobStatus::default();
        assert_eq!(status.lifetime(), Lifetime::MayTerminate);
        assert_eq!(status.lifetime(), Lifetime::MayTerminate);
    }

    #[test]
    fn test_any_job_keeps_alive() {
        let status = JobStatus {
            now_playing_in_flight: true,
            ..Default::default()
        };
        assert_eq!(status.lifetime(), Lifetime::KeepAlive);

        let status = JobStatus {
            flush_in_flight: true,
            ..Default::default()
        };
        assert_eq!(status.lifetime(), Lifetime::KeepAlive);
    }

    #[test]
    fn test_lost_connectivity_wins() {
        let status = JobStatus {
            now_playing_in_flight: true,
            flush_in_flight: true,
            connectivity_lost: true,
        };
        assert_eq!(status.lifetime(), Lifetime::ShutdownNow);
    }
}
