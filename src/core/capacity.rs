use crate::domain::model::SectionId;
use crate::utils::error::{RegistrarError, Result};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-section exclusive guards. Every check-and-mutate on a section's
/// counters runs under its guard; different sections never contend.
#[derive(Debug, Default)]
pub struct SectionGuards {
    gates: DashMap<SectionId, Arc<Mutex<()>>>,
}

impl SectionGuards {
    pub fn new() -> Self {
        Self {
            gates: DashMap::new(),
        }
    }

    /// Acquire the exclusive guard for one section, waiting at most `wait`.
    pub async fn acquire(&self, section_id: &SectionId, wait: Duration) -> Result<SectionGuard> {
        let gate = {
            // Scope the map entry so its shard lock is not held across the await.
            let entry = self.gates.entry(section_id.clone()).or_default();
            Arc::clone(entry.value())
        };

        match tokio::time::timeout(wait, gate.lock_owned()).await {
            Ok(permit) => Ok(SectionGuard {
                section_id: section_id.clone(),
                _permit: permit,
            }),
            Err(_) => Err(RegistrarError::SectionBusy {
                section_id: section_id.clone(),
                waited_ms: wait.as_millis() as u64,
            }),
        }
    }

    /// Number of sections that have ever been guarded. Gates are kept for
    /// the process lifetime.
    pub fn tracked_sections(&self) -> usize {
        self.gates.len()
    }
}

/// RAII handle for one section's capacity guard.
pub struct SectionGuard {
    section_id: SectionId,
    _permit: OwnedMutexGuard<()>,
}

impl SectionGuard {
    pub fn section_id(&self) -> &SectionId {
        &self.section_id
    }
}

impl std::fmt::Debug for SectionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SectionGuard")
            .field("section_id", &self.section_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_guard_is_exclusive_per_section() {
        let guards = SectionGuards::new();
        let section: SectionId = "CS101-A".into();

        let held = guards.acquire(&section, WAIT).await.unwrap();
        let err = guards.acquire(&section, WAIT).await.unwrap_err();

        match err {
            RegistrarError::SectionBusy {
                section_id,
                waited_ms,
            } => {
                assert_eq!(section_id, section);
                assert_eq!(waited_ms, 50);
            }
            other => panic!("expected SectionBusy, got {other:?}"),
        }
        drop(held);
    }

    #[tokio::test]
    async fn test_different_sections_do_not_contend() {
        let guards = SectionGuards::new();

        let _a = guards.acquire(&"CS101-A".into(), WAIT).await.unwrap();
        let _b = guards.acquire(&"CS102-B".into(), WAIT).await.unwrap();

        assert_eq!(guards.tracked_sections(), 2);
    }

    #[tokio::test]
    async fn test_guard_released_on_drop() {
        let guards = SectionGuards::new();
        let section: SectionId = "CS101-A".into();

        let held = guards.acquire(&section, WAIT).await.unwrap();
        assert_eq!(held.section_id(), &section);
        drop(held);

        guards.acquire(&section, WAIT).await.unwrap();
    }

    #[tokio::test]
    async fn test_guard_released_when_holder_panics() {
        let guards = Arc::new(SectionGuards::new());
        let section: SectionId = "CS101-A".into();

        let task_guards = Arc::clone(&guards);
        let task_section = section.clone();
        let result = tokio::spawn(async move {
            let _held = task_guards.acquire(&task_section, WAIT).await.unwrap();
            panic!("holder died mid-operation");
        })
        .await;
        assert!(result.is_err());

        // The permit must have been released by the unwind.
        guards.acquire(&section, WAIT).await.unwrap();
    }
}
