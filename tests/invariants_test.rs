use proptest::prelude::*;
use section_registrar::adapters::audit::InMemoryAuditSink;
use section_registrar::adapters::memory::{
    InMemoryEnrollmentStore, InMemorySectionCatalog, InMemoryStudentDirectory,
};
use section_registrar::domain::model::{Section, Student, StudentId};
use section_registrar::domain::ports::{EnrollmentStore, SectionCatalog};
use section_registrar::{EngineSettings, EnrollmentEngine};
use std::collections::HashMap;
use tokio_test::block_on;

type MemoryEngine = EnrollmentEngine<
    InMemoryStudentDirectory,
    InMemorySectionCatalog,
    InMemoryEnrollmentStore,
    InMemoryAuditSink,
>;

const STUDENTS: usize = 6;

#[derive(Debug, Clone)]
enum Op {
    Enroll(usize),
    Drop(usize),
    Leave(usize),
    Promote,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..STUDENTS).prop_map(Op::Enroll),
        2 => (0..STUDENTS).prop_map(Op::Drop),
        1 => (0..STUDENTS).prop_map(Op::Leave),
        1 => Just(Op::Promote),
    ]
}

fn arb_op_sequence() -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(arb_op(), 1..40)
}

fn student(index: usize) -> StudentId {
    format!("S-{}", index + 1).as_str().into()
}

async fn build_engine(
    sections: &[(&str, &str, u32)],
    settings: EngineSettings,
) -> (MemoryEngine, InMemorySectionCatalog, InMemoryEnrollmentStore) {
    let directory = InMemoryStudentDirectory::new();
    for i in 0..STUDENTS {
        directory
            .add_student(Student {
                id: student(i),
                name: format!("Student {}", i + 1),
                active: true,
            })
            .await;
    }
    let catalog = InMemorySectionCatalog::new();
    for (id, course, capacity) in sections {
        catalog.add_section(Section::new(*id, *course, *capacity)).await;
    }
    let store = InMemoryEnrollmentStore::new();
    let engine = EnrollmentEngine::new(
        directory,
        catalog.clone(),
        store.clone(),
        InMemoryAuditSink::new(),
    )
    .with_settings(settings);
    (engine, catalog, store)
}

/// Every outcome the engine can produce must leave the section counters
/// equal to the derived counts, the seats within capacity, the waitlist
/// gap-free, and each student with at most one current record per course.
async fn check_invariants(
    catalog: &InMemorySectionCatalog,
    store: &InMemoryEnrollmentStore,
    section_ids: &[&str],
) {
    for section_id in section_ids {
        let section = catalog
            .find_section(&(*section_id).into())
            .await
            .unwrap()
            .expect("seeded section");
        let active = store.active_by_section(&section.id).await.unwrap();
        let waiting = store.waitlisted_by_section(&section.id).await.unwrap();

        assert_eq!(
            section.active_count as usize,
            active.len(),
            "active counter diverged for {section_id}"
        );
        assert_eq!(
            section.waitlist_count as usize,
            waiting.len(),
            "waitlist counter diverged for {section_id}"
        );
        assert!(
            section.active_count <= section.max_capacity,
            "capacity exceeded for {section_id}"
        );

        let positions: Vec<u32> = waiting
            .iter()
            .map(|e| e.waitlist_position.expect("waitlisted entries carry a position"))
            .collect();
        let expected: Vec<u32> = (1..=waiting.len() as u32).collect();
        assert_eq!(positions, expected, "queue has gaps for {section_id}");
    }

    let mut per_course: HashMap<(String, String), usize> = HashMap::new();
    for record in store.snapshot().await {
        if record.is_current() {
            *per_course
                .entry((
                    record.student_id.to_string(),
                    record.course_id.to_string(),
                ))
                .or_insert(0) += 1;
        }
    }
    assert!(
        per_course.values().all(|&n| n <= 1),
        "a student holds two current records in one course"
    );
}

proptest! {
    #[test]
    fn random_single_section_histories_preserve_invariants(ops in arb_op_sequence()) {
        block_on(async {
            let (engine, catalog, store) =
                build_engine(&[("CS101-A", "CS101", 2)], EngineSettings::default()).await;

            for op in &ops {
                // Rejections are expected along the way; the state afterwards
                // is what matters.
                match op {
                    Op::Enroll(i) => {
                        let _ = engine.enroll(student(*i), "CS101-A".into()).await;
                    }
                    Op::Drop(i) => {
                        let _ = engine.drop_enrollment(student(*i), "CS101-A".into()).await;
                    }
                    Op::Leave(i) => {
                        let _ = engine.leave_waitlist(student(*i), "CS101-A".into()).await;
                    }
                    Op::Promote => {
                        let _ = engine.promote_next("CS101-A".into()).await;
                    }
                }
                check_invariants(&catalog, &store, &["CS101-A"]).await;
            }
        });
    }

    #[test]
    fn random_sibling_section_histories_preserve_invariants(
        ops in proptest::collection::vec((arb_op(), any::<bool>()), 1..40)
    ) {
        block_on(async {
            // Two sections of one course: queues, positions and counters are
            // per section, while a student holds at most one current record
            // in the course across both.
            let (engine, catalog, store) = build_engine(
                &[("CS101-A", "CS101", 1), ("CS101-B", "CS101", 2)],
                EngineSettings::default(),
            )
            .await;

            for (op, pick_b) in &ops {
                let section = if *pick_b { "CS101-B" } else { "CS101-A" };
                match op {
                    Op::Enroll(i) => {
                        let _ = engine.enroll(student(*i), section.into()).await;
                    }
                    Op::Drop(i) => {
                        let _ = engine.drop_enrollment(student(*i), section.into()).await;
                    }
                    Op::Leave(i) => {
                        let _ = engine.leave_waitlist(student(*i), section.into()).await;
                    }
                    Op::Promote => {
                        let _ = engine.promote_next(section.into()).await;
                    }
                }
                check_invariants(&catalog, &store, &["CS101-A", "CS101-B"]).await;
            }
        });
    }

    #[test]
    fn random_histories_without_auto_promote_preserve_invariants(ops in arb_op_sequence()) {
        block_on(async {
            let settings = EngineSettings {
                auto_promote: false,
                ..Default::default()
            };
            let (engine, catalog, store) =
                build_engine(&[("CS101-A", "CS101", 2)], settings).await;

            for op in &ops {
                match op {
                    Op::Enroll(i) => {
                        let _ = engine.enroll(student(*i), "CS101-A".into()).await;
                    }
                    Op::Drop(i) => {
                        let _ = engine.drop_enrollment(student(*i), "CS101-A".into()).await;
                    }
                    Op::Leave(i) => {
                        let _ = engine.leave_waitlist(student(*i), "CS101-A".into()).await;
                    }
                    Op::Promote => {
                        let _ = engine.promote_next("CS101-A".into()).await;
                    }
                }
            }
            check_invariants(&catalog, &store, &["CS101-A"]).await;
        });
    }

    #[test]
    fn random_transfers_across_sections_preserve_invariants(
        moves in proptest::collection::vec((0..STUDENTS, any::<bool>()), 1..30)
    ) {
        block_on(async {
            let (engine, catalog, store) = build_engine(
                &[("CS101-A", "CS101", 1), ("CS102-B", "CS102", 2)],
                EngineSettings::default(),
            )
            .await;

            for (i, towards_b) in &moves {
                let (from, to) = if *towards_b {
                    ("CS101-A", "CS102-B")
                } else {
                    ("CS102-B", "CS101-A")
                };
                // Try to get the student in somewhere first, then shuffle.
                let _ = engine.enroll(student(*i), from.into()).await;
                let _ = engine.transfer(student(*i), from.into(), to.into()).await;
                check_invariants(&catalog, &store, &["CS101-A", "CS102-B"]).await;
            }
        });
    }

    #[test]
    fn waitlist_never_exceeds_its_cap(ops in arb_op_sequence(), cap in 0u32..3) {
        block_on(async {
            let settings = EngineSettings {
                max_waitlist: Some(cap),
                ..Default::default()
            };
            let (engine, catalog, store) =
                build_engine(&[("CS101-A", "CS101", 1)], settings).await;

            for op in &ops {
                match op {
                    Op::Enroll(i) => {
                        let _ = engine.enroll(student(*i), "CS101-A".into()).await;
                    }
                    Op::Drop(i) => {
                        let _ = engine.drop_enrollment(student(*i), "CS101-A".into()).await;
                    }
                    Op::Leave(i) => {
                        let _ = engine.leave_waitlist(student(*i), "CS101-A".into()).await;
                    }
                    Op::Promote => {
                        let _ = engine.promote_next("CS101-A".into()).await;
                    }
                }
                let section = catalog
                    .find_section(&"CS101-A".into())
                    .await
                    .unwrap()
                    .expect("seeded section");
                assert!(section.waitlist_count <= cap, "cap breached");
            }
            check_invariants(&catalog, &store, &["CS101-A"]).await;
        });
    }
}
