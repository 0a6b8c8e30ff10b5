use anyhow::Result;
use async_trait::async_trait;
use section_registrar::adapters::audit::InMemoryAuditSink;
use section_registrar::adapters::memory::{
    InMemoryEnrollmentStore, InMemorySectionCatalog, InMemoryStudentDirectory,
};
use section_registrar::domain::model::{Section, SectionId, Student};
use section_registrar::domain::ports::{EnrollmentStore, SectionCatalog};
use section_registrar::{EngineSettings, EnrollmentEngine, RegistrarError};
use std::sync::Arc;
use std::time::Duration;

async fn seed(
    student_count: u32,
    sections: &[(&str, &str, u32)],
) -> (
    InMemoryStudentDirectory,
    InMemorySectionCatalog,
    InMemoryEnrollmentStore,
) {
    let directory = InMemoryStudentDirectory::new();
    for i in 1..=student_count {
        directory
            .add_student(Student {
                id: format!("S-{i}").as_str().into(),
                name: format!("Student {i}"),
                active: true,
            })
            .await;
    }

    let catalog = InMemorySectionCatalog::new();
    for (id, course, capacity) in sections {
        catalog.add_section(Section::new(*id, *course, *capacity)).await;
    }

    (directory, catalog, InMemoryEnrollmentStore::new())
}

async fn assert_section_consistent(
    catalog: &InMemorySectionCatalog,
    store: &InMemoryEnrollmentStore,
    section_id: &str,
) {
    let section = catalog
        .find_section(&section_id.into())
        .await
        .unwrap()
        .expect("section must exist");
    let active = store.active_by_section(&section.id).await.unwrap();
    let waiting = store.waitlisted_by_section(&section.id).await.unwrap();

    assert_eq!(section.active_count as usize, active.len());
    assert_eq!(section.waitlist_count as usize, waiting.len());
    assert!(section.active_count <= section.max_capacity);

    // Positions stay gap-free in queue order.
    let positions: Vec<u32> = waiting
        .iter()
        .map(|e| e.waitlist_position.expect("waitlisted entries carry a position"))
        .collect();
    let expected: Vec<u32> = (1..=waiting.len() as u32).collect();
    assert_eq!(positions, expected);
}

/// Catalog wrapper whose writes take a while. Used to hold a section's
/// guard long enough to provoke contention.
#[derive(Clone)]
struct SlowCatalog {
    inner: InMemorySectionCatalog,
    delay: Duration,
}

#[async_trait]
impl SectionCatalog for SlowCatalog {
    async fn find_section(&self, id: &SectionId) -> section_registrar::Result<Option<Section>> {
        self.inner.find_section(id).await
    }

    async fn save_section(&self, section: &Section) -> section_registrar::Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.save_section(section).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_student_enrollments_admit_exactly_one() -> Result<()> {
    let (directory, catalog, store) = seed(1, &[("CS101-A", "CS101", 2)]).await;
    let engine = Arc::new(EnrollmentEngine::new(
        directory,
        catalog.clone(),
        store.clone(),
        InMemoryAuditSink::new(),
    ));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.enroll("S-1".into(), "CS101-A".into()).await })
        })
        .collect();

    let mut admitted = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => admitted += 1,
            Err(RegistrarError::AlreadyEnrolled { .. }) => rejected += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(admitted, 1);
    assert_eq!(rejected, 7);
    assert_section_consistent(&catalog, &store, "CS101-A").await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_enrolls_fill_seats_then_queue_without_gaps() -> Result<()> {
    let (directory, catalog, store) = seed(20, &[("CS101-A", "CS101", 3)]).await;
    let engine = Arc::new(EnrollmentEngine::new(
        directory,
        catalog.clone(),
        store.clone(),
        InMemoryAuditSink::new(),
    ));

    let handles: Vec<_> = (1..=20)
        .map(|i| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .enroll(format!("S-{i}").as_str().into(), "CS101-A".into())
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await?.expect("every distinct student gets in or queues");
    }

    let section = catalog.find_section(&"CS101-A".into()).await?.unwrap();
    assert_eq!(section.active_count, 3);
    assert_eq!(section.waitlist_count, 17);
    assert_section_consistent(&catalog, &store, "CS101-A").await;
    Ok(())
}

#[tokio::test]
async fn test_guard_timeout_surfaces_section_busy() -> Result<()> {
    let (directory, catalog, store) = seed(2, &[("CS101-A", "CS101", 5)]).await;
    let slow = SlowCatalog {
        inner: catalog,
        delay: Duration::from_millis(800),
    };
    let settings = EngineSettings {
        guard_wait_ms: 100,
        ..Default::default()
    };
    let engine = Arc::new(
        EnrollmentEngine::new(directory, slow, store, InMemoryAuditSink::new())
            .with_settings(settings),
    );

    // First enroll holds the guard through its slow catalog write.
    let holder = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.enroll("S-1".into(), "CS101-A".into()).await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;

    let err = engine
        .enroll("S-2".into(), "CS101-A".into())
        .await
        .unwrap_err();
    match err {
        RegistrarError::SectionBusy {
            section_id,
            waited_ms,
        } => {
            assert_eq!(section_id.as_str(), "CS101-A");
            assert_eq!(waited_ms, 100);
        }
        other => panic!("expected SectionBusy, got {other:?}"),
    }

    holder.await?.expect("the guard holder itself succeeds");
    Ok(())
}

#[tokio::test]
async fn test_sections_are_guarded_independently() -> Result<()> {
    let (directory, catalog, store) = seed(
        2,
        &[("CS101-A", "CS101", 5), ("CS102-B", "CS102", 5)],
    )
    .await;
    let slow = SlowCatalog {
        inner: catalog,
        delay: Duration::from_millis(800),
    };
    let settings = EngineSettings {
        guard_wait_ms: 100,
        ..Default::default()
    };
    let engine = Arc::new(
        EnrollmentEngine::new(directory, slow, store, InMemoryAuditSink::new())
            .with_settings(settings),
    );

    // While CS101-A's guard is held, CS102-B must still be acquirable
    // within the same short wait.
    let holder = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.enroll("S-1".into(), "CS101-A".into()).await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;

    engine
        .enroll("S-2".into(), "CS102-B".into())
        .await
        .expect("a different section must not contend");

    holder.await?.expect("the guard holder itself succeeds");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_drops_and_enrolls_keep_the_section_consistent() -> Result<()> {
    let (directory, catalog, store) = seed(8, &[("CS101-A", "CS101", 2)]).await;
    let engine = Arc::new(EnrollmentEngine::new(
        directory,
        catalog.clone(),
        store.clone(),
        InMemoryAuditSink::new(),
    ));

    // Two seats taken, four students queued.
    for i in 1..=6 {
        engine
            .enroll(format!("S-{i}").as_str().into(), "CS101-A".into())
            .await?;
    }

    let mut handles = Vec::new();
    for id in ["S-1", "S-2"] {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine.drop_enrollment(id.into(), "CS101-A".into()).await.map(|_| ())
        }));
    }
    for id in ["S-7", "S-8"] {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine.enroll(id.into(), "CS101-A".into()).await.map(|_| ())
        }));
    }
    for handle in handles {
        handle.await?.expect("all racing operations are valid");
    }

    // Whatever the interleaving, the counters and the queue must reconcile.
    assert_section_consistent(&catalog, &store, "CS101-A").await;

    let section = catalog.find_section(&"CS101-A".into()).await?.unwrap();
    assert_eq!(section.active_count, 2);
    assert_eq!(section.waitlist_count, 4);
    Ok(())
}
