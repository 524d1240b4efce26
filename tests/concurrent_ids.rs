//! Sequential ID issuance under concurrent writers.

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use image::{Rgb, RgbImage};
use pulmo_lib::config::TriageConfig;
use pulmo_lib::db::SqliteStore;
use pulmo_lib::models::enums::{Classification, Priority};
use pulmo_lib::models::{NewDiagnosis, NewPatient};
use pulmo_lib::notify::NotificationGateway;
use pulmo_lib::orchestrator::{
    Intent, NotifyPreference, Orchestrator, PatientIdentity, ResponsePayload,
};
use pulmo_lib::report::PdfReportGateway;
use pulmo_lib::triage::{ClassificationWorker, StaticModel};

const WRITERS: usize = 20;

#[test]
fn twenty_concurrent_registrations_get_unique_sequential_ids() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(&dir.path().join("triage.db")).unwrap();
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let store = store.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                store
                    .register_patient(&NewPatient::named(format!("Patient {i}")))
                    .map(|p| p.id)
            })
        })
        .collect();

    let ids: Vec<String> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();

    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(unique.len(), WRITERS);

    let expected: HashSet<String> = (1..=WRITERS).map(|n| format!("P{n:03}")).collect();
    let got: HashSet<String> = ids.into_iter().collect();
    assert_eq!(got, expected);
    assert_eq!(store.list_patients().unwrap().len(), WRITERS);
}

#[test]
fn concurrent_diagnoses_for_one_patient() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(&dir.path().join("triage.db")).unwrap();
    let patient = store.register_patient(&NewPatient::named("Jane Doe")).unwrap();
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = (0..WRITERS)
        .map(|_| {
            let store = store.clone();
            let barrier = barrier.clone();
            let patient_id = patient.id.clone();
            thread::spawn(move || {
                barrier.wait();
                store
                    .record_diagnosis(&NewDiagnosis {
                        patient_id,
                        image_reference: None,
                        classification: Classification::Normal,
                        confidence: 0.2,
                        priority: Priority::Low,
                        notes: None,
                        created_by: "system".into(),
                    })
                    .map(|d| d.id)
            })
        })
        .collect();

    let ids: HashSet<String> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();
    let expected: HashSet<String> = (1..=WRITERS).map(|n| format!("D{n:03}")).collect();
    assert_eq!(ids, expected);
}

#[test]
fn concurrent_analyses_for_one_new_patient_share_the_record() {
    const REQUESTS: usize = 8;

    let dir = tempfile::tempdir().unwrap();
    let config = TriageConfig::with_data_dir(dir.path());
    config.ensure_directories().unwrap();
    let orchestrator = Arc::new(Orchestrator::new(
        SqliteStore::open(&config.database_path).unwrap(),
        Box::new(ClassificationWorker::new(Box::new(StaticModel::new(0.3)))),
        Box::new(NotificationGateway::new(&config).unwrap()),
        Box::new(PdfReportGateway::new(&config.reports_dir)),
    ));

    let image = dir.path().join("chest.png");
    RgbImage::from_fn(64, 64, |x, y| Rgb([(x + y) as u8, x as u8, y as u8]))
        .save(&image)
        .unwrap();

    let barrier = Arc::new(Barrier::new(REQUESTS));
    let handles: Vec<_> = (0..REQUESTS)
        .map(|_| {
            let orchestrator = orchestrator.clone();
            let barrier = barrier.clone();
            let image = image.clone();
            thread::spawn(move || {
                let identity = PatientIdentity {
                    name: Some("Jane".into()),
                    national_id: Some("42".into()),
                    ..PatientIdentity::default()
                };
                barrier.wait();
                orchestrator.handle(Intent::AnalyzeImage {
                    identity,
                    image_path: image,
                    notify: NotifyPreference::Skip,
                    report: false,
                    notes: None,
                    created_by: None,
                })
            })
        })
        .collect();

    let mut registered = 0;
    let mut patient_ids = HashSet::new();
    for handle in handles {
        let response = handle.join().unwrap();
        assert!(response.is_completed(), "{:?}", response.error);
        match response.into_result().unwrap() {
            ResponsePayload::Triage(outcome) => {
                if outcome.patient_registered {
                    registered += 1;
                }
                patient_ids.insert(outcome.patient.id);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    assert_eq!(registered, 1);
    assert_eq!(patient_ids.len(), 1);
    let store = orchestrator.store();
    assert_eq!(store.list_patients().unwrap().len(), 1);
    assert_eq!(store.list_diagnoses().unwrap().len(), REQUESTS);
}
