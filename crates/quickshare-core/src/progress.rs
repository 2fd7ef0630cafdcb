//! Routing of engine-pushed progress and stats onto orchestration state.
//!
//! Events are applied in arrival order with no buffering. A progress event
//! for an index the manifest no longer has is dropped silently: sessions may
//! keep reporting on items that were cleared in the meantime.

use serde::Serialize;

use crate::manifest::{FileManifest, ItemStatus};

/// An event pushed by the engine without a matching request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Progress for one manifest item
    Progress(ProgressEvent),
    /// Session-wide throughput
    Stats(StatsEvent),
}

/// Progress for one manifest item, addressed by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Manifest index; may be stale or out of range
    pub index: i64,
    /// Free-text status label
    pub status_label: String,
    /// Percentage as sent by the engine; clamped to 0..=100 on apply
    pub percent: i64,
    /// Manifest generation the engine was addressing, if it tracks one
    pub generation: Option<u64>,
}

impl ProgressEvent {
    /// Create an event without a generation tag.
    #[must_use]
    pub fn new(index: i64, status_label: impl Into<String>, percent: i64) -> Self {
        Self {
            index,
            status_label: status_label.into(),
            percent,
            generation: None,
        }
    }
}

/// Session-wide throughput display values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsEvent {
    /// Formatted speed, e.g. `"3.20 MB/s"`
    pub speed: String,
    /// Formatted total sent, e.g. `"120.00 MB"`
    pub total_sent: String,
}

/// Last reported session-wide stats.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Formatted speed
    pub speed: String,
    /// Formatted total sent
    pub total_sent: String,
}

/// What happened to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The item at `index` was updated
    Applied {
        /// Manifest index
        index: usize,
        /// Resulting status kind
        status: ItemStatus,
        /// The item just moved from a non-terminal to a terminal status
        became_terminal: bool,
    },
    /// Session stats were overwritten
    StatsUpdated,
    /// The index is outside the current manifest
    OutOfRange,
    /// The event addressed an earlier manifest generation
    Stale,
}

/// Applies engine events to the manifest and session counters.
#[derive(Debug, Default)]
pub struct ProgressRouter {
    stats: Option<SessionStats>,
}

impl ProgressRouter {
    /// Create a router with no stats yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply any engine event.
    pub fn apply(&mut self, manifest: &mut FileManifest, event: EngineEvent) -> ApplyOutcome {
        match event {
            EngineEvent::Progress(progress) => self.on_progress(manifest, &progress),
            EngineEvent::Stats(stats) => {
                self.on_stats(stats);
                ApplyOutcome::StatsUpdated
            }
        }
    }

    /// Apply a progress event to one item.
    pub fn on_progress(&mut self, manifest: &mut FileManifest, event: &ProgressEvent) -> ApplyOutcome {
        if let Some(generation) = event.generation {
            if generation != manifest.generation() {
                tracing::debug!(
                    index = event.index,
                    generation,
                    current = manifest.generation(),
                    "dropping progress for an earlier file list"
                );
                return ApplyOutcome::Stale;
            }
        }

        let Ok(index) = usize::try_from(event.index) else {
            tracing::trace!(index = event.index, "negative progress index");
            return ApplyOutcome::OutOfRange;
        };
        let Some(item) = manifest.get_mut(index) else {
            tracing::trace!(index, "progress index out of range");
            return ApplyOutcome::OutOfRange;
        };

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let percent = event.percent.clamp(0, 100) as u8;
        let was_terminal = item.status.is_terminal();
        item.apply_progress(&event.status_label, percent);

        tracing::debug!(index, percent, status = %item.status, "item progress");
        ApplyOutcome::Applied {
            index,
            status: item.status,
            became_terminal: !was_terminal && item.status.is_terminal(),
        }
    }

    /// Overwrite the session-wide stats. No smoothing.
    pub fn on_stats(&mut self, event: StatsEvent) {
        self.stats = Some(SessionStats {
            speed: event.speed,
            total_sent: event.total_sent,
        });
    }

    /// Last reported stats, if any.
    #[must_use]
    pub fn stats(&self) -> Option<&SessionStats> {
        self.stats.as_ref()
    }

    /// Forget the stats of a finished session.
    pub fn reset_stats(&mut self) {
        self.stats = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ItemSnapshot;

    fn manifest_with(n: usize) -> FileManifest {
        let mut manifest = FileManifest::new();
        manifest.adopt(
            (0..n)
                .map(|i| ItemSnapshot::file(format!("f{i}.txt"), "1.00 KB"))
                .collect(),
        );
        manifest
    }

    #[test]
    fn test_out_of_range_is_ignored() {
        let mut manifest = manifest_with(2);
        let before = manifest.render();
        let mut router = ProgressRouter::new();

        for index in [2, 99, -1] {
            let outcome = router.on_progress(&mut manifest, &ProgressEvent::new(index, "x", 50));
            assert_eq!(outcome, ApplyOutcome::OutOfRange);
        }
        assert_eq!(manifest.render(), before);
    }

    #[test]
    fn test_hundred_is_terminal_success() {
        let mut manifest = manifest_with(1);
        let mut router = ProgressRouter::new();

        router.on_progress(&mut manifest, &ProgressEvent::new(0, "Gönderiliyor", 99));
        assert_eq!(manifest.get(0).unwrap().status, ItemStatus::InProgress);

        let outcome = router.on_progress(&mut manifest, &ProgressEvent::new(0, "Tamamlandı", 100));
        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                index: 0,
                status: ItemStatus::Done,
                became_terminal: true
            }
        );

        let again = router.on_progress(&mut manifest, &ProgressEvent::new(0, "Tamamlandı", 100));
        assert!(matches!(
            again,
            ApplyOutcome::Applied {
                became_terminal: false,
                ..
            }
        ));
    }

    #[test]
    fn test_percent_is_clamped() {
        let mut manifest = manifest_with(1);
        let mut router = ProgressRouter::new();
        router.on_progress(&mut manifest, &ProgressEvent::new(0, "weird", 250));
        assert_eq!(manifest.get(0).unwrap().progress_percent, 100);
        router.on_progress(&mut manifest, &ProgressEvent::new(0, "weird", -4));
        assert_eq!(manifest.get(0).unwrap().progress_percent, 0);
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let mut manifest = manifest_with(1);
        let mut router = ProgressRouter::new();
        let mut event = ProgressEvent::new(0, "Gönderiliyor", 10);
        event.generation = Some(manifest.generation() + 5);
        assert_eq!(router.on_progress(&mut manifest, &event), ApplyOutcome::Stale);
        assert_eq!(manifest.get(0).unwrap().progress_percent, 0);

        event.generation = Some(manifest.generation());
        assert!(matches!(
            router.on_progress(&mut manifest, &event),
            ApplyOutcome::Applied { index: 0, .. }
        ));
    }

    #[test]
    fn test_stats_last_write_wins() {
        let mut manifest = manifest_with(0);
        let mut router = ProgressRouter::new();
        assert!(router.stats().is_none());

        for (speed, sent) in [("1.00 MB/s", "5.00 MB"), ("0.50 MB/s", "6.00 MB")] {
            router.apply(
                &mut manifest,
                EngineEvent::Stats(StatsEvent {
                    speed: speed.to_string(),
                    total_sent: sent.to_string(),
                }),
            );
        }
        let stats = router.stats().unwrap();
        assert_eq!(stats.speed, "0.50 MB/s");
        assert_eq!(stats.total_sent, "6.00 MB");

        router.reset_stats();
        assert!(router.stats().is_none());
    }
}
