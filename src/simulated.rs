//! Simulated streaming for single-shot completions.
//!
//! Replays an already finalized prediction set through the same snapshot
//! callback the real decoder uses, growing one slot at a time.

use rand::Rng;
use tokio::time::{sleep, Duration};
use tracing::debug;

use crate::models::PredictionSet;

/// Timing of a simulated replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationCadence {
    /// Characters revealed per update
    pub step: usize,
    /// Lower bound of the randomized delay between updates
    pub min_delay: Duration,
    /// Upper bound of the randomized delay between updates
    pub max_delay: Duration,
    /// Pause between finishing one slot and starting the next
    pub slot_pause: Duration,
}

impl Default for SimulationCadence {
    fn default() -> Self {
        Self {
            step: 3,
            min_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            slot_pause: Duration::from_millis(500),
        }
    }
}

impl SimulationCadence {
    fn next_delay(&self) -> Duration {
        let min = self.min_delay.as_millis() as u64;
        let max = (self.max_delay.as_millis() as u64).max(min);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

/// Replay `results` progressively, then emit `results` itself as the final snapshot.
///
/// Every snapshot has the same number of slots as `results`. Slot 0 carries the
/// reasoning from the first snapshot on.
pub async fn simulate_streaming<F>(
    results: &PredictionSet,
    cadence: &SimulationCadence,
    mut on_update: F,
) -> PredictionSet
where
    F: FnMut(PredictionSet),
{
    let step = cadence.step.max(1);
    let mut current = PredictionSet::empty(results.len());
    if let Some(reasoning) = results.reasoning() {
        current.attach_reasoning(reasoning);
    }

    debug!(slot_count = results.len(), "Simulating streaming output");

    for (index, slot) in results.slots().iter().enumerate() {
        on_update(current.clone());

        let text = slot.text();
        let total = text.chars().count();
        for (j, (offset, ch)) in text.char_indices().enumerate() {
            if j % step == 0 || j + 1 == total {
                current.set_text(index, &text[..offset + ch.len_utf8()]);
                on_update(current.clone());
                sleep(cadence.next_delay()).await;
            }
        }

        if index + 1 < results.len() {
            sleep(cadence.slot_pause).await;
        }
    }

    on_update(results.clone());
    results.clone()
}
