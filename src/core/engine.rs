use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::settings::EngineSettings;
use crate::core::capacity::SectionGuards;
use crate::core::promotion;
use crate::domain::model::{
    AuditEvent, AuditEventKind, CompensationOutcome, Enrollment, EnrollmentStatus, Section,
    SectionId, Student, StudentId,
};
use crate::domain::ports::{AuditSink, EnrollmentStore, SectionCatalog, StudentDirectory};
use crate::utils::error::{RegistrarError, Result};

/// The closed record plus whoever was promoted into the freed seat.
#[derive(Debug, Clone, Serialize)]
pub struct DropOutcome {
    pub dropped: Enrollment,
    pub promoted: Option<Enrollment>,
}

/// `promoted` is the student who took the seat freed in the from-section.
#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub enrollment: Enrollment,
    pub promoted: Option<Enrollment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkEnrollReport {
    pub section_id: SectionId,
    pub outcomes: Vec<BulkOutcome>,
}

impl BulkEnrollReport {
    pub fn enrolled_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, BulkOutcomeStatus::Enrolled))
            .count()
    }

    pub fn waitlisted_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, BulkOutcomeStatus::Waitlisted { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, BulkOutcomeStatus::Failed { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, BulkOutcomeStatus::Skipped))
            .count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkOutcome {
    pub student_id: StudentId,
    pub status: BulkOutcomeStatus,
}

#[derive(Debug, Clone, Serialize)]
pub enum BulkOutcomeStatus {
    Enrolled,
    Waitlisted { position: u32 },
    Failed { reason: String },
    Skipped,
}

/// Advisory only: the state can change between this read and a later enroll.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub student_id: StudentId,
    pub section_id: SectionId,
    pub can_enroll: bool,
    pub would_waitlist: bool,
    pub available_seats: u32,
    pub blocker: Option<ValidationBlocker>,
}

impl ValidationReport {
    fn blocked(
        student_id: StudentId,
        section_id: SectionId,
        available_seats: u32,
        blocker: ValidationBlocker,
    ) -> Self {
        Self {
            student_id,
            section_id,
            can_enroll: false,
            would_waitlist: false,
            available_seats,
            blocker: Some(blocker),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ValidationBlocker {
    StudentNotFound,
    StudentInactive,
    SectionNotFound,
    AlreadyEnrolled { status: EnrollmentStatus },
    SectionFull,
}

/// The enrollment engine. One instance owns the per-section guards, so all
/// operations against a section must go through the same engine.
pub struct EnrollmentEngine<
    D: StudentDirectory,
    C: SectionCatalog,
    S: EnrollmentStore,
    A: AuditSink + 'static,
> {
    directory: D,
    catalog: C,
    store: S,
    audit: Arc<A>,
    guards: SectionGuards,
    settings: EngineSettings,
}

impl<D, C, S, A> EnrollmentEngine<D, C, S, A>
where
    D: StudentDirectory,
    C: SectionCatalog,
    S: EnrollmentStore,
    A: AuditSink + 'static,
{
    pub fn new(directory: D, catalog: C, store: S, audit: A) -> Self {
        Self {
            directory,
            catalog,
            store,
            audit: Arc::new(audit),
            guards: SectionGuards::new(),
            settings: EngineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Enroll a student into a section: ACTIVE if a seat is free,
    /// WAITLISTED at the next position otherwise (policy permitting).
    pub async fn enroll(&self, student_id: StudentId, section_id: SectionId) -> Result<Enrollment> {
        self.require_active_student(&student_id).await?;

        let _guard = self
            .guards
            .acquire(&section_id, self.settings.guard_wait())
            .await?;
        let mut section = self.require_section(&section_id).await?;

        if let Some(existing) = self
            .store
            .find_current(&student_id, &section.course_id)
            .await?
        {
            return Err(RegistrarError::AlreadyEnrolled {
                student_id,
                course_id: section.course_id,
                status: existing.status,
            });
        }

        let enrollment = if section.has_open_seat() {
            let enrollment = Enrollment::active(
                student_id.clone(),
                section.id.clone(),
                section.course_id.clone(),
            );
            self.store.insert(enrollment.clone()).await?;
            section.active_count += 1;
            enrollment
        } else {
            self.check_waitlist_policy(&section)?;
            let position = section.waitlist_count + 1;
            let enrollment = Enrollment::waitlisted(
                student_id.clone(),
                section.id.clone(),
                section.course_id.clone(),
                position,
            );
            self.store.insert(enrollment.clone()).await?;
            section.waitlist_count += 1;
            enrollment
        };

        // Record write and counter write are one unit: back out the record
        // if the section save fails.
        if let Err(err) = self.catalog.save_section(&section).await {
            if let Err(cleanup) = self.store.remove(&enrollment.id).await {
                tracing::error!(
                    "💥 Could not back out enrollment {} after section save failure: {}",
                    enrollment.id,
                    cleanup
                );
            }
            return Err(err);
        }

        if enrollment.status.is_active() {
            tracing::info!(
                "🎓 Enrolled {} in section {} ({})",
                student_id,
                section_id,
                section.course_id
            );
            self.emit_audit(AuditEvent::new(
                AuditEventKind::Enrolled,
                student_id,
                section.course_id,
                format!("section {}", section_id),
            ));
        } else {
            let position = enrollment.waitlist_position.unwrap_or(0);
            tracing::info!(
                "⏳ Waitlisted {} for section {} at position {}",
                student_id,
                section_id,
                position
            );
            self.emit_audit(AuditEvent::new(
                AuditEventKind::Waitlisted,
                student_id,
                section.course_id,
                format!("section {} position {}", section_id, position),
            ));
        }

        Ok(enrollment)
    }

    /// Drop an ACTIVE enrollment. Runs the waitlist promoter under the
    /// same guard when `auto_promote` is on.
    pub async fn drop_enrollment(
        &self,
        student_id: StudentId,
        section_id: SectionId,
    ) -> Result<DropOutcome> {
        let _guard = self
            .guards
            .acquire(&section_id, self.settings.guard_wait())
            .await?;
        let mut section = self.require_section(&section_id).await?;

        // The record must belong to this very section; a sibling section of
        // the same course has its own seats and counters.
        let active = match self
            .store
            .find_current(&student_id, &section.course_id)
            .await?
        {
            Some(enrollment)
                if enrollment.status.is_active() && enrollment.section_id == section.id =>
            {
                enrollment
            }
            _ => {
                return Err(RegistrarError::EnrollmentNotFound {
                    student_id,
                    course_id: section.course_id,
                });
            }
        };

        let mut journal = vec![active.clone()];
        let mut dropped = active;
        dropped.status = EnrollmentStatus::Dropped;
        self.store.update(dropped.clone()).await?;
        section.active_count = section.active_count.saturating_sub(1);

        let promoted = if self.settings.auto_promote {
            match promotion::promote_next_locked(&self.store, &mut section, &mut journal).await {
                Ok(promoted) => promoted,
                Err(err) => {
                    self.unwind(&journal).await;
                    return Err(err);
                }
            }
        } else {
            None
        };

        if let Err(err) = self.catalog.save_section(&section).await {
            self.unwind(&journal).await;
            return Err(err);
        }

        tracing::info!(
            "📤 Dropped {} from section {} ({})",
            student_id,
            section_id,
            section.course_id
        );
        self.emit_audit(AuditEvent::new(
            AuditEventKind::Dropped,
            student_id,
            section.course_id.clone(),
            format!("section {}", section_id),
        ));
        if let Some(promoted) = &promoted {
            tracing::info!(
                "⬆️ Promoted {} into section {} from the waitlist",
                promoted.student_id,
                section_id
            );
            self.emit_audit(AuditEvent::new(
                AuditEventKind::Promoted,
                promoted.student_id.clone(),
                promoted.course_id.clone(),
                format!("section {}", section_id),
            ));
        }

        Ok(DropOutcome { dropped, promoted })
    }

    /// Take a WAITLISTED student off the queue and renumber the rest.
    pub async fn leave_waitlist(
        &self,
        student_id: StudentId,
        section_id: SectionId,
    ) -> Result<Enrollment> {
        let _guard = self
            .guards
            .acquire(&section_id, self.settings.guard_wait())
            .await?;
        let mut section = self.require_section(&section_id).await?;

        let waiting = match self
            .store
            .find_current(&student_id, &section.course_id)
            .await?
        {
            Some(enrollment)
                if enrollment.status.is_waitlisted() && enrollment.section_id == section.id =>
            {
                enrollment
            }
            _ => {
                return Err(RegistrarError::EnrollmentNotFound {
                    student_id,
                    course_id: section.course_id,
                });
            }
        };

        let mut journal = vec![waiting.clone()];
        let mut departed = waiting;
        let left_position = departed.waitlist_position.unwrap_or(0);
        departed.status = EnrollmentStatus::Dropped;
        departed.waitlist_position = None;
        self.store.update(departed.clone()).await?;
        section.waitlist_count = section.waitlist_count.saturating_sub(1);

        if let Err(err) =
            promotion::renumber_waitlist_locked(&self.store, &section.id, &mut journal).await
        {
            self.unwind(&journal).await;
            return Err(err);
        }

        if let Err(err) = self.catalog.save_section(&section).await {
            self.unwind(&journal).await;
            return Err(err);
        }

        tracing::info!(
            "🚪 {} left the waitlist for section {} (was position {})",
            student_id,
            section_id,
            left_position
        );
        self.emit_audit(AuditEvent::new(
            AuditEventKind::LeftWaitlist,
            student_id,
            section.course_id,
            format!("section {} position {}", section_id, left_position),
        ));

        Ok(departed)
    }

    /// Promote the head of the waitlist into a free seat, if both exist.
    /// The explicit path for deployments running with `auto_promote` off.
    pub async fn promote_next(&self, section_id: SectionId) -> Result<Option<Enrollment>> {
        let _guard = self
            .guards
            .acquire(&section_id, self.settings.guard_wait())
            .await?;
        let mut section = self.require_section(&section_id).await?;

        let mut journal = Vec::new();
        let promoted =
            match promotion::promote_next_locked(&self.store, &mut section, &mut journal).await {
                Ok(promoted) => promoted,
                Err(err) => {
                    self.unwind(&journal).await;
                    return Err(err);
                }
            };

        if promoted.is_some() {
            if let Err(err) = self.catalog.save_section(&section).await {
                self.unwind(&journal).await;
                return Err(err);
            }
        }

        if let Some(promoted) = &promoted {
            tracing::info!(
                "⬆️ Promoted {} into section {} from the waitlist",
                promoted.student_id,
                section_id
            );
            self.emit_audit(AuditEvent::new(
                AuditEventKind::Promoted,
                promoted.student_id.clone(),
                promoted.course_id.clone(),
                format!("section {}", section_id),
            ));
        }

        Ok(promoted)
    }

    /// Move a student between sections as two independently guarded steps;
    /// a failed enroll triggers best-effort re-enrollment into the original.
    pub async fn transfer(
        &self,
        student_id: StudentId,
        from: SectionId,
        to: SectionId,
    ) -> Result<TransferOutcome> {
        let drop_outcome = match self.drop_enrollment(student_id.clone(), from.clone()).await {
            Ok(outcome) => outcome,
            Err(err) => {
                // The drop never applied, so there is nothing to restore.
                return Err(RegistrarError::TransferFailed {
                    source: Box::new(err),
                    compensation: CompensationOutcome::NotRequired,
                });
            }
        };

        match self.enroll(student_id.clone(), to.clone()).await {
            Ok(enrollment) => {
                tracing::info!(
                    "🔁 Transferred {} from section {} to section {}",
                    student_id,
                    from,
                    to
                );
                self.emit_audit(AuditEvent::new(
                    AuditEventKind::TransferCompleted,
                    student_id,
                    enrollment.course_id.clone(),
                    format!("from {} to {}", from, to),
                ));
                Ok(TransferOutcome {
                    enrollment,
                    promoted: drop_outcome.promoted,
                })
            }
            Err(enroll_err) => {
                let compensation = self.compensate(&student_id, &from).await;
                tracing::warn!(
                    "↩️ Transfer of {} from {} to {} failed ({}); compensation: {}",
                    student_id,
                    from,
                    to,
                    enroll_err,
                    compensation
                );
                self.emit_audit(AuditEvent::new(
                    AuditEventKind::TransferCompensated,
                    student_id,
                    drop_outcome.dropped.course_id.clone(),
                    compensation.to_string(),
                ));
                Err(RegistrarError::TransferFailed {
                    source: Box::new(enroll_err),
                    compensation,
                })
            }
        }
    }

    /// Sequential enroll of many students into one section. Individual
    /// failures are recorded, never fatal; ids past the deadline are skipped.
    pub async fn bulk_enroll(
        &self,
        section_id: SectionId,
        student_ids: Vec<StudentId>,
        deadline: Option<Duration>,
    ) -> BulkEnrollReport {
        let cutoff = deadline.map(|limit| tokio::time::Instant::now() + limit);
        let mut outcomes = Vec::with_capacity(student_ids.len());

        for student_id in student_ids {
            let expired = match cutoff {
                Some(cutoff) => tokio::time::Instant::now() >= cutoff,
                None => false,
            };
            if expired {
                outcomes.push(BulkOutcome {
                    student_id,
                    status: BulkOutcomeStatus::Skipped,
                });
                continue;
            }

            let status = match self.enroll(student_id.clone(), section_id.clone()).await {
                Ok(enrollment) => {
                    if enrollment.status.is_active() {
                        BulkOutcomeStatus::Enrolled
                    } else {
                        BulkOutcomeStatus::Waitlisted {
                            position: enrollment.waitlist_position.unwrap_or(0),
                        }
                    }
                }
                Err(err) => BulkOutcomeStatus::Failed {
                    reason: err.to_string(),
                },
            };
            outcomes.push(BulkOutcome { student_id, status });
        }

        let report = BulkEnrollReport {
            section_id,
            outcomes,
        };
        tracing::info!(
            "📦 Bulk enroll into {}: {} enrolled, {} waitlisted, {} failed, {} skipped",
            report.section_id,
            report.enrolled_count(),
            report.waitlisted_count(),
            report.failed_count(),
            report.skipped_count()
        );
        report
    }

    /// Mirrors enroll's decision logic without touching anything.
    pub async fn validate(
        &self,
        student_id: StudentId,
        section_id: SectionId,
    ) -> Result<ValidationReport> {
        let section = match self.catalog.find_section(&section_id).await? {
            Some(section) => section,
            None => {
                return Ok(ValidationReport::blocked(
                    student_id,
                    section_id,
                    0,
                    ValidationBlocker::SectionNotFound,
                ));
            }
        };
        let available_seats = section.available_seats();

        match self.directory.find_student(&student_id).await? {
            Some(student) if student.active => {}
            Some(_) => {
                return Ok(ValidationReport::blocked(
                    student_id,
                    section_id,
                    available_seats,
                    ValidationBlocker::StudentInactive,
                ));
            }
            None => {
                return Ok(ValidationReport::blocked(
                    student_id,
                    section_id,
                    available_seats,
                    ValidationBlocker::StudentNotFound,
                ));
            }
        }

        if let Some(existing) = self
            .store
            .find_current(&student_id, &section.course_id)
            .await?
        {
            return Ok(ValidationReport::blocked(
                student_id,
                section_id,
                available_seats,
                ValidationBlocker::AlreadyEnrolled {
                    status: existing.status,
                },
            ));
        }

        if section.has_open_seat() {
            Ok(ValidationReport {
                student_id,
                section_id,
                can_enroll: true,
                would_waitlist: false,
                available_seats,
                blocker: None,
            })
        } else if self.check_waitlist_policy(&section).is_ok() {
            Ok(ValidationReport {
                student_id,
                section_id,
                can_enroll: true,
                would_waitlist: true,
                available_seats: 0,
                blocker: None,
            })
        } else {
            Ok(ValidationReport::blocked(
                student_id,
                section_id,
                0,
                ValidationBlocker::SectionFull,
            ))
        }
    }

    async fn require_active_student(&self, student_id: &StudentId) -> Result<Student> {
        match self.directory.find_student(student_id).await? {
            Some(student) if student.active => Ok(student),
            Some(_) => Err(RegistrarError::StudentInactive {
                student_id: student_id.clone(),
            }),
            None => Err(RegistrarError::StudentNotFound {
                student_id: student_id.clone(),
            }),
        }
    }

    async fn require_section(&self, section_id: &SectionId) -> Result<Section> {
        match self.catalog.find_section(section_id).await? {
            Some(section) => Ok(section),
            None => Err(RegistrarError::SectionNotFound {
                section_id: section_id.clone(),
            }),
        }
    }

    fn check_waitlist_policy(&self, section: &Section) -> Result<()> {
        if !self.settings.waitlist_enabled {
            return Err(RegistrarError::SectionFull {
                section_id: section.id.clone(),
            });
        }
        if let Some(cap) = self.settings.max_waitlist {
            if section.waitlist_count >= cap {
                return Err(RegistrarError::SectionFull {
                    section_id: section.id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Best-effort restore of the original seat after a failed transfer.
    async fn compensate(&self, student_id: &StudentId, from: &SectionId) -> CompensationOutcome {
        match self.enroll(student_id.clone(), from.clone()).await {
            Ok(enrollment) => {
                if enrollment.status.is_active() {
                    CompensationOutcome::RestoredActive
                } else {
                    CompensationOutcome::RestoredWaitlisted {
                        position: enrollment.waitlist_position.unwrap_or(0),
                    }
                }
            }
            Err(err) => CompensationOutcome::Failed {
                detail: err.to_string(),
            },
        }
    }

    /// Restore prior record versions in reverse order.
    async fn unwind(&self, journal: &[Enrollment]) {
        for prior in journal.iter().rev() {
            if let Err(err) = self.store.update(prior.clone()).await {
                tracing::error!("💥 Rollback of enrollment {} failed: {}", prior.id, err);
            }
        }
    }

    fn emit_audit(&self, event: AuditEvent) {
        let sink = Arc::clone(&self.audit);
        tokio::spawn(async move {
            let kind = event.kind;
            if let Err(err) = sink.record_event(event).await {
                tracing::warn!("⚠️ Audit sink rejected {:?} event: {}", kind, err);
            }
        });
    }
}
