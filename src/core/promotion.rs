use crate::domain::model::{Enrollment, EnrollmentStatus, Section, SectionId};
use crate::domain::ports::EnrollmentStore;
use crate::utils::error::Result;

/// Promote the head of the section's waitlist into the free seat, if both
/// exist. Callers hold the section guard and own the journal; every record
/// mutated here has its prior version pushed first so the caller can
/// unwind the whole unit.
pub(crate) async fn promote_next_locked<S: EnrollmentStore>(
    store: &S,
    section: &mut Section,
    journal: &mut Vec<Enrollment>,
) -> Result<Option<Enrollment>> {
    if section.waitlist_count == 0 || !section.has_open_seat() {
        return Ok(None);
    }

    let mut queue = store.waitlisted_by_section(&section.id).await?;
    if queue.is_empty() {
        return Ok(None);
    }

    let next = queue.remove(0);
    journal.push(next.clone());

    let mut promoted = next;
    promoted.status = EnrollmentStatus::Active;
    promoted.waitlist_position = None;
    store.update(promoted.clone()).await?;

    section.active_count += 1;
    section.waitlist_count -= 1;

    renumber_queue(store, queue, journal).await?;

    Ok(Some(promoted))
}

/// Renumber the section's waitlist to 1..n after a departure that was not
/// a promotion (a waitlisted student leaving).
pub(crate) async fn renumber_waitlist_locked<S: EnrollmentStore>(
    store: &S,
    section_id: &SectionId,
    journal: &mut Vec<Enrollment>,
) -> Result<()> {
    let queue = store.waitlisted_by_section(section_id).await?;
    renumber_queue(store, queue, journal).await
}

async fn renumber_queue<S: EnrollmentStore>(
    store: &S,
    queue: Vec<Enrollment>,
    journal: &mut Vec<Enrollment>,
) -> Result<()> {
    for (index, entry) in queue.into_iter().enumerate() {
        let expected = index as u32 + 1;
        if entry.waitlist_position == Some(expected) {
            continue;
        }
        journal.push(entry.clone());
        let mut renumbered = entry;
        renumbered.waitlist_position = Some(expected);
        store.update(renumbered).await?;
    }
    Ok(())
}
