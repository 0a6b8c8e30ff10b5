pub mod capacity;
pub mod engine;
pub mod promotion;
pub mod roster;

pub use crate::domain::model::{Enrollment, EnrollmentStatus, Section, Student};
pub use crate::domain::ports::{AuditSink, EnrollmentStore, SectionCatalog, StudentDirectory};
pub use crate::utils::error::Result;
