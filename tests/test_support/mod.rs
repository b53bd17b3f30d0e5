#![allow(dead_code)]

use classboard_migrate::model::*;
use classboard_migrate::{MigrationConfig, Migrator, Store};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

/// Migrator over an in-memory store with backups and logs under a temp dir.
pub fn memory_migrator(prefix: &str) -> (Migrator, PathBuf) {
    let workspace = temp_dir(prefix);
    let store = Store::in_memory().expect("in-memory store");
    let migrator =
        Migrator::new(store, MigrationConfig::new(&workspace)).expect("build migrator");
    (migrator, workspace)
}

pub fn student(id: &str, email: &str) -> Student {
    Student {
        id: id.to_string(),
        name: format!("Student {}", id),
        email: email.to_string(),
        phone: None,
        grade: None,
    }
}

pub fn class(id: &str, capacity: i64, enrolled: &[&str]) -> Class {
    Class {
        id: id.to_string(),
        name: format!("Class {}", id),
        subject: "Mathematics".to_string(),
        teacher: Some("Ms. Rivera".to_string()),
        room: None,
        capacity,
        enrolled_students: enrolled.iter().map(|s| s.to_string()).collect(),
    }
}

/// One record in every group, all cross-references satisfied.
pub fn full_payload() -> MigrationPayload {
    MigrationPayload {
        students: vec![student("1", "a@b.com"), student("2", "c@d.org")],
        classes: vec![class("c1", 20, &["1", "2"])],
        schedules: vec![Schedule {
            id: "sch1".into(),
            class_id: "c1".into(),
            day_of_week: 1,
            start_time: "08:30".into(),
            end_time: "09:20".into(),
            room: None,
        }],
        schedule_exceptions: vec![ScheduleException {
            id: "ex1".into(),
            schedule_id: "sch1".into(),
            date: "2024-10-16".into(),
            reason: Some("Holiday".into()),
            cancelled: true,
            new_start_time: None,
            new_end_time: None,
        }],
        meetings: vec![Meeting {
            id: "m1".into(),
            title: "Parent night".into(),
            date: "2024-11-05".into(),
            start_time: "16:00".into(),
            end_time: "17:00".into(),
            class_id: Some("c1".into()),
            location: None,
            notes: None,
        }],
        attendance: vec![AttendanceRecord {
            id: "att1".into(),
            class_id: "c1".into(),
            date: "2024-09-09".into(),
            entries: vec![
                AttendanceEntry {
                    student_id: "1".into(),
                    status: "present".into(),
                    note: None,
                },
                AttendanceEntry {
                    student_id: "2".into(),
                    status: "late".into(),
                    note: Some("bus".into()),
                },
            ],
        }],
        notes: vec![ClassNote {
            id: "n1".into(),
            class_id: "c1".into(),
            date: "2024-09-09".into(),
            content: "Unit 1 started".into(),
            author: None,
        }],
        tests: vec![Test {
            id: "t1".into(),
            class_id: "c1".into(),
            title: "Quiz 1".into(),
            date: "2024-09-27".into(),
            max_score: 40.0,
        }],
        test_results: vec![TestResult {
            id: "r1".into(),
            test_id: "t1".into(),
            student_id: "1".into(),
            score: 36.0,
            percentage: 90.0,
            grade: "A".into(),
        }],
        homework: vec![HomeworkAssignment {
            id: "h1".into(),
            class_id: "c1".into(),
            title: "Worksheet".into(),
            description: None,
            due_date: "2024-09-16".into(),
            max_points: Some(20.0),
        }],
        submissions: vec![HomeworkSubmission {
            id: "sub1".into(),
            assignment_id: "h1".into(),
            student_id: "2".into(),
            submitted_at: "2024-09-15".into(),
            status: "graded".into(),
            grade: Some(18.5),
            feedback: None,
        }],
    }
}
