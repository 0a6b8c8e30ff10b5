use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::domain::model::AuditEvent;
use crate::domain::ports::AuditSink;
use crate::utils::error::{RegistrarError, Result};

/// Writes every audit event as a structured log line.
#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record_event(&self, event: AuditEvent) -> Result<()> {
        tracing::info!(
            "📝 audit: {:?} student={} course={} {}",
            event.kind,
            event.student_id,
            event.course_id,
            event.detail
        );
        Ok(())
    }
}

/// Collects audit events in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<AuditEvent> {
        let events = self.events.lock().await;
        events.clone()
    }

    /// Wait until at least `count` events have arrived. Emission is
    /// asynchronous, so tests poll instead of asserting immediately.
    pub async fn wait_for_events(&self, count: usize, timeout: Duration) -> Vec<AuditEvent> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let events = self.events().await;
            if events.len() >= count || tokio::time::Instant::now() >= deadline {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record_event(&self, event: AuditEvent) -> Result<()> {
        let mut events = self.events.lock().await;
        events.push(event);
        Ok(())
    }
}

/// Fails every emission.
#[derive(Debug, Clone, Default)]
pub struct FailingAuditSink;

#[async_trait]
impl AuditSink for FailingAuditSink {
    async fn record_event(&self, _event: AuditEvent) -> Result<()> {
        Err(RegistrarError::StorageUnavailable {
            detail: "audit sink offline".to_string(),
        })
    }
}
