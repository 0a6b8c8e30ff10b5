use crate::domain::model::{Enrollment, Section, SectionId, StudentId};
use crate::domain::ports::{EnrollmentStore, SectionCatalog};
use crate::utils::error::{RegistrarError, Result};

/// Read-only projections over the catalog and the store. Reads bypass the
/// section guards, so answers are point-in-time.
pub struct RosterQueries<C: SectionCatalog, S: EnrollmentStore> {
    catalog: C,
    store: S,
}

impl<C: SectionCatalog, S: EnrollmentStore> RosterQueries<C, S> {
    pub fn new(catalog: C, store: S) -> Self {
        Self { catalog, store }
    }

    /// ACTIVE enrollments for the section, ordered by enrolled-at.
    pub async fn get_roster(&self, section_id: &SectionId) -> Result<Vec<Enrollment>> {
        let section = self.require_section(section_id).await?;
        self.store.active_by_section(&section.id).await
    }

    /// WAITLISTED enrollments ordered by position.
    pub async fn get_waitlist(&self, section_id: &SectionId) -> Result<Vec<Enrollment>> {
        let section = self.require_section(section_id).await?;
        self.store.waitlisted_by_section(&section.id).await
    }

    /// The sections the student is ACTIVE in, one per enrolled course.
    pub async fn student_sections(&self, student_id: &StudentId) -> Result<Vec<Section>> {
        let section_ids = self.store.active_sections_for_student(student_id).await?;
        let mut sections = Vec::with_capacity(section_ids.len());
        for section_id in &section_ids {
            sections.push(self.require_section(section_id).await?);
        }
        Ok(sections)
    }

    async fn require_section(&self, section_id: &SectionId) -> Result<Section> {
        match self.catalog.find_section(section_id).await? {
            Some(section) => Ok(section),
            None => Err(RegistrarError::SectionNotFound {
                section_id: section_id.clone(),
            }),
        }
    }
}
