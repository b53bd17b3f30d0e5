use rusqlite::{Connection, Transaction};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use uuid::Uuid;

use crate::db;
use crate::error::MigrationError;
use crate::model::*;
use crate::validate::ExistingIds;

/// Persistence handle for the ClassBoard tables.
///
/// Constructed explicitly and handed to the migrator, so tests can run
/// against an in-memory database.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(workspace: &Path) -> Result<Self, MigrationError> {
        std::fs::create_dir_all(workspace).map_err(|e| MigrationError::Io {
            path: workspace.to_path_buf(),
            source: e,
        })?;
        let conn = db::open_db(workspace).map_err(|e| MigrationError::persistence("open", e))?;
        Ok(Self { conn })
    }

    /// Read-only handle on the workspace database, or `None` when no database
    /// has been created yet. Nothing on disk is created or changed.
    pub fn open_read_only(workspace: &Path) -> Result<Option<Self>, MigrationError> {
        if !workspace.join(db::DB_FILE).is_file() {
            return Ok(None);
        }
        let conn = db::open_db_read_only(workspace)
            .map_err(|e| MigrationError::persistence("open read-only", e))?;
        Ok(Some(Self { conn }))
    }

    pub fn in_memory() -> Result<Self, MigrationError> {
        let conn = db::open_in_memory().map_err(|e| MigrationError::persistence("open", e))?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Insert one entity group from the payload inside its own transaction.
    pub fn insert_group(
        &mut self,
        group: EntityGroup,
        payload: &MigrationPayload,
    ) -> rusqlite::Result<usize> {
        let tx = self.conn.transaction()?;
        let n = insert_into(&tx, group, payload)?;
        tx.commit()?;
        Ok(n)
    }

    /// Remove exactly the rows `insert_group` would have written for this group.
    pub fn delete_group(
        &mut self,
        group: EntityGroup,
        payload: &MigrationPayload,
    ) -> rusqlite::Result<usize> {
        let tx = self.conn.transaction()?;
        let n = delete_from(&tx, group, payload)?;
        tx.commit()?;
        Ok(n)
    }

    /// Read every persisted record back into payload shape.
    pub fn snapshot(&self) -> rusqlite::Result<MigrationPayload> {
        let conn = &self.conn;
        Ok(MigrationPayload {
            students: load_students(conn)?,
            classes: load_classes(conn)?,
            schedules: load_schedules(conn)?,
            schedule_exceptions: load_schedule_exceptions(conn)?,
            meetings: load_meetings(conn)?,
            attendance: load_attendance(conn)?,
            notes: load_notes(conn)?,
            tests: load_tests(conn)?,
            test_results: load_test_results(conn)?,
            homework: load_homework(conn)?,
            submissions: load_submissions(conn)?,
        })
    }

    /// Clear every table and write the snapshot back, all in one transaction.
    pub fn replace_all(&mut self, snapshot: &MigrationPayload) -> rusqlite::Result<()> {
        let tx = self.conn.transaction()?;
        for table in db::TABLES.iter().rev() {
            tx.execute(&format!("DELETE FROM {}", table), [])?;
        }
        for group in EntityGroup::ALL {
            insert_into(&tx, group, snapshot)?;
        }
        tx.commit()
    }

    pub fn counts(&self) -> rusqlite::Result<BTreeMap<EntityGroup, usize>> {
        let mut out = BTreeMap::new();
        for group in EntityGroup::ALL {
            out.insert(group, db::table_count(&self.conn, table_for(group))?);
        }
        Ok(out)
    }

    pub fn existing_ids(&self) -> rusqlite::Result<ExistingIds> {
        let conn = &self.conn;
        Ok(ExistingIds {
            students: ids_in(conn, "students")?,
            classes: ids_in(conn, "classes")?,
            schedules: ids_in(conn, "schedules")?,
            schedule_exceptions: ids_in(conn, "schedule_exceptions")?,
            meetings: ids_in(conn, "meetings")?,
            attendance: ids_in(conn, "attendance_records")?,
            notes: ids_in(conn, "class_notes")?,
            tests: ids_in(conn, "tests")?,
            test_results: ids_in(conn, "test_results")?,
            homework: ids_in(conn, "homework_assignments")?,
            submissions: ids_in(conn, "homework_submissions")?,
        })
    }
}

pub fn table_for(group: EntityGroup) -> &'static str {
    match group {
        EntityGroup::Students => "students",
        EntityGroup::Classes => "classes",
        EntityGroup::Enrollments => "class_enrollments",
        EntityGroup::Schedules => "schedules",
        EntityGroup::ScheduleExceptions => "schedule_exceptions",
        EntityGroup::Meetings => "meetings",
        EntityGroup::Attendance => "attendance_records",
        EntityGroup::Notes => "class_notes",
        EntityGroup::Tests => "tests",
        EntityGroup::TestResults => "test_results",
        EntityGroup::Homework => "homework_assignments",
        EntityGroup::Submissions => "homework_submissions",
    }
}

fn ids_in(conn: &Connection, table: &str) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("SELECT id FROM {}", table))?;
    let ids = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(ids)
}

fn insert_into(
    tx: &Transaction<'_>,
    group: EntityGroup,
    p: &MigrationPayload,
) -> rusqlite::Result<usize> {
    let mut n = 0usize;
    match group {
        EntityGroup::Students => {
            let mut stmt = tx.prepare(
                "INSERT INTO students(id, name, email, phone, grade, sort_order)
                 VALUES(?, ?, ?, ?, ?, ?)",
            )?;
            for (i, s) in p.students.iter().enumerate() {
                n += stmt.execute((&s.id, &s.name, &s.email, &s.phone, &s.grade, i as i64))?;
            }
        }
        EntityGroup::Classes => {
            let mut stmt = tx.prepare(
                "INSERT INTO classes(id, name, subject, teacher, room, capacity, sort_order)
                 VALUES(?, ?, ?, ?, ?, ?, ?)",
            )?;
            for (i, c) in p.classes.iter().enumerate() {
                n += stmt.execute((
                    &c.id,
                    &c.name,
                    &c.subject,
                    &c.teacher,
                    &c.room,
                    c.capacity,
                    i as i64,
                ))?;
            }
        }
        EntityGroup::Enrollments => {
            let mut stmt = tx.prepare(
                "INSERT INTO class_enrollments(id, class_id, student_id, sort_order)
                 VALUES(?, ?, ?, ?)",
            )?;
            for c in &p.classes {
                for (i, sid) in c.enrolled_students.iter().enumerate() {
                    let id = Uuid::new_v4().to_string();
                    n += stmt.execute((&id, &c.id, sid, i as i64))?;
                }
            }
        }
        EntityGroup::Schedules => {
            let mut stmt = tx.prepare(
                "INSERT INTO schedules(id, class_id, day_of_week, start_time, end_time, room, sort_order)
                 VALUES(?, ?, ?, ?, ?, ?, ?)",
            )?;
            for (i, s) in p.schedules.iter().enumerate() {
                n += stmt.execute((
                    &s.id,
                    &s.class_id,
                    s.day_of_week,
                    &s.start_time,
                    &s.end_time,
                    &s.room,
                    i as i64,
                ))?;
            }
        }
        EntityGroup::ScheduleExceptions => {
            let mut stmt = tx.prepare(
                "INSERT INTO schedule_exceptions(
                   id, schedule_id, date, reason, cancelled, new_start_time, new_end_time, sort_order
                 ) VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for (i, x) in p.schedule_exceptions.iter().enumerate() {
                n += stmt.execute((
                    &x.id,
                    &x.schedule_id,
                    &x.date,
                    &x.reason,
                    x.cancelled as i64,
                    &x.new_start_time,
                    &x.new_end_time,
                    i as i64,
                ))?;
            }
        }
        EntityGroup::Meetings => {
            let mut stmt = tx.prepare(
                "INSERT INTO meetings(
                   id, title, date, start_time, end_time, class_id, location, notes, sort_order
                 ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for (i, m) in p.meetings.iter().enumerate() {
                n += stmt.execute((
                    &m.id,
                    &m.title,
                    &m.date,
                    &m.start_time,
                    &m.end_time,
                    &m.class_id,
                    &m.location,
                    &m.notes,
                    i as i64,
                ))?;
            }
        }
        EntityGroup::Attendance => {
            let mut rec_stmt = tx.prepare(
                "INSERT INTO attendance_records(id, class_id, date, sort_order) VALUES(?, ?, ?, ?)",
            )?;
            let mut entry_stmt = tx.prepare(
                "INSERT INTO attendance_entries(id, record_id, student_id, status, note, sort_order)
                 VALUES(?, ?, ?, ?, ?, ?)",
            )?;
            for (i, a) in p.attendance.iter().enumerate() {
                n += rec_stmt.execute((&a.id, &a.class_id, &a.date, i as i64))?;
                for (j, e) in a.entries.iter().enumerate() {
                    let id = Uuid::new_v4().to_string();
                    entry_stmt.execute((&id, &a.id, &e.student_id, &e.status, &e.note, j as i64))?;
                }
            }
        }
        EntityGroup::Notes => {
            let mut stmt = tx.prepare(
                "INSERT INTO class_notes(id, class_id, date, content, author, sort_order)
                 VALUES(?, ?, ?, ?, ?, ?)",
            )?;
            for (i, x) in p.notes.iter().enumerate() {
                n += stmt.execute((&x.id, &x.class_id, &x.date, &x.content, &x.author, i as i64))?;
            }
        }
        EntityGroup::Tests => {
            let mut stmt = tx.prepare(
                "INSERT INTO tests(id, class_id, title, date, max_score, sort_order)
                 VALUES(?, ?, ?, ?, ?, ?)",
            )?;
            for (i, t) in p.tests.iter().enumerate() {
                n += stmt.execute((&t.id, &t.class_id, &t.title, &t.date, t.max_score, i as i64))?;
            }
        }
        EntityGroup::TestResults => {
            let mut stmt = tx.prepare(
                "INSERT INTO test_results(id, test_id, student_id, score, percentage, grade, sort_order)
                 VALUES(?, ?, ?, ?, ?, ?, ?)",
            )?;
            for (i, r) in p.test_results.iter().enumerate() {
                n += stmt.execute((
                    &r.id,
                    &r.test_id,
                    &r.student_id,
                    r.score,
                    r.percentage,
                    &r.grade,
                    i as i64,
                ))?;
            }
        }
        EntityGroup::Homework => {
            let mut stmt = tx.prepare(
                "INSERT INTO homework_assignments(id, class_id, title, description, due_date, max_points, sort_order)
                 VALUES(?, ?, ?, ?, ?, ?, ?)",
            )?;
            for (i, h) in p.homework.iter().enumerate() {
                n += stmt.execute((
                    &h.id,
                    &h.class_id,
                    &h.title,
                    &h.description,
                    &h.due_date,
                    h.max_points,
                    i as i64,
                ))?;
            }
        }
        EntityGroup::Submissions => {
            let mut stmt = tx.prepare(
                "INSERT INTO homework_submissions(
                   id, assignment_id, student_id, submitted_at, status, grade, feedback, sort_order
                 ) VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for (i, s) in p.submissions.iter().enumerate() {
                n += stmt.execute((
                    &s.id,
                    &s.assignment_id,
                    &s.student_id,
                    &s.submitted_at,
                    &s.status,
                    s.grade,
                    &s.feedback,
                    i as i64,
                ))?;
            }
        }
    }
    Ok(n)
}

fn delete_ids<'a>(
    tx: &Transaction<'_>,
    table: &str,
    ids: impl Iterator<Item = &'a str>,
) -> rusqlite::Result<usize> {
    let mut stmt = tx.prepare(&format!("DELETE FROM {} WHERE id = ?", table))?;
    let mut n = 0usize;
    for id in ids {
        n += stmt.execute([id])?;
    }
    Ok(n)
}

fn delete_from(
    tx: &Transaction<'_>,
    group: EntityGroup,
    p: &MigrationPayload,
) -> rusqlite::Result<usize> {
    let table = table_for(group);
    match group {
        EntityGroup::Enrollments => {
            let mut stmt = tx
                .prepare("DELETE FROM class_enrollments WHERE class_id = ? AND student_id = ?")?;
            let mut n = 0usize;
            for c in &p.classes {
                for sid in &c.enrolled_students {
                    n += stmt.execute((&c.id, sid))?;
                }
            }
            Ok(n)
        }
        EntityGroup::Attendance => {
            let mut entries = tx.prepare("DELETE FROM attendance_entries WHERE record_id = ?")?;
            for a in &p.attendance {
                entries.execute([&a.id])?;
            }
            delete_ids(tx, table, p.attendance.iter().map(|a| a.id.as_str()))
        }
        EntityGroup::Students => delete_ids(tx, table, p.students.iter().map(|x| x.id.as_str())),
        EntityGroup::Classes => delete_ids(tx, table, p.classes.iter().map(|x| x.id.as_str())),
        EntityGroup::Schedules => {
            delete_ids(tx, table, p.schedules.iter().map(|x| x.id.as_str()))
        }
        EntityGroup::ScheduleExceptions => delete_ids(
            tx,
            table,
            p.schedule_exceptions.iter().map(|x| x.id.as_str()),
        ),
        EntityGroup::Meetings => delete_ids(tx, table, p.meetings.iter().map(|x| x.id.as_str())),
        EntityGroup::Notes => delete_ids(tx, table, p.notes.iter().map(|x| x.id.as_str())),
        EntityGroup::Tests => delete_ids(tx, table, p.tests.iter().map(|x| x.id.as_str())),
        EntityGroup::TestResults => {
            delete_ids(tx, table, p.test_results.iter().map(|x| x.id.as_str()))
        }
        EntityGroup::Homework => delete_ids(tx, table, p.homework.iter().map(|x| x.id.as_str())),
        EntityGroup::Submissions => {
            delete_ids(tx, table, p.submissions.iter().map(|x| x.id.as_str()))
        }
    }
}

fn load_students(conn: &Connection) -> rusqlite::Result<Vec<Student>> {
    let mut stmt =
        conn.prepare("SELECT id, name, email, phone, grade FROM students ORDER BY sort_order, id")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Student {
                id: r.get(0)?,
                name: r.get(1)?,
                email: r.get(2)?,
                phone: r.get(3)?,
                grade: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn load_classes(conn: &Connection) -> rusqlite::Result<Vec<Class>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, subject, teacher, room, capacity FROM classes ORDER BY sort_order, id",
    )?;
    let mut classes = stmt
        .query_map([], |r| {
            Ok(Class {
                id: r.get(0)?,
                name: r.get(1)?,
                subject: r.get(2)?,
                teacher: r.get(3)?,
                room: r.get(4)?,
                capacity: r.get(5)?,
                enrolled_students: Vec::new(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut enroll_stmt = conn.prepare(
        "SELECT student_id FROM class_enrollments WHERE class_id = ? ORDER BY sort_order, rowid",
    )?;
    for c in classes.iter_mut() {
        c.enrolled_students = enroll_stmt
            .query_map([&c.id], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
    }
    Ok(classes)
}

fn load_schedules(conn: &Connection) -> rusqlite::Result<Vec<Schedule>> {
    let mut stmt = conn.prepare(
        "SELECT id, class_id, day_of_week, start_time, end_time, room
         FROM schedules ORDER BY sort_order, id",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Schedule {
                id: r.get(0)?,
                class_id: r.get(1)?,
                day_of_week: r.get(2)?,
                start_time: r.get(3)?,
                end_time: r.get(4)?,
                room: r.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn load_schedule_exceptions(conn: &Connection) -> rusqlite::Result<Vec<ScheduleException>> {
    let mut stmt = conn.prepare(
        "SELECT id, schedule_id, date, reason, cancelled, new_start_time, new_end_time
         FROM schedule_exceptions ORDER BY sort_order, id",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(ScheduleException {
                id: r.get(0)?,
                schedule_id: r.get(1)?,
                date: r.get(2)?,
                reason: r.get(3)?,
                cancelled: r.get::<_, i64>(4)? != 0,
                new_start_time: r.get(5)?,
                new_end_time: r.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn load_meetings(conn: &Connection) -> rusqlite::Result<Vec<Meeting>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, date, start_time, end_time, class_id, location, notes
         FROM meetings ORDER BY sort_order, id",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Meeting {
                id: r.get(0)?,
                title: r.get(1)?,
                date: r.get(2)?,
                start_time: r.get(3)?,
                end_time: r.get(4)?,
                class_id: r.get(5)?,
                location: r.get(6)?,
                notes: r.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn load_attendance(conn: &Connection) -> rusqlite::Result<Vec<AttendanceRecord>> {
    let mut stmt = conn
        .prepare("SELECT id, class_id, date FROM attendance_records ORDER BY sort_order, id")?;
    let mut records = stmt
        .query_map([], |r| {
            Ok(AttendanceRecord {
                id: r.get(0)?,
                class_id: r.get(1)?,
                date: r.get(2)?,
                entries: Vec::new(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut entry_stmt = conn.prepare(
        "SELECT student_id, status, note FROM attendance_entries
         WHERE record_id = ? ORDER BY sort_order, rowid",
    )?;
    for a in records.iter_mut() {
        a.entries = entry_stmt
            .query_map([&a.id], |r| {
                Ok(AttendanceEntry {
                    student_id: r.get(0)?,
                    status: r.get(1)?,
                    note: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
    }
    Ok(records)
}

fn load_notes(conn: &Connection) -> rusqlite::Result<Vec<ClassNote>> {
    let mut stmt = conn.prepare(
        "SELECT id, class_id, date, content, author FROM class_notes ORDER BY sort_order, id",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(ClassNote {
                id: r.get(0)?,
                class_id: r.get(1)?,
                date: r.get(2)?,
                content: r.get(3)?,
                author: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn load_tests(conn: &Connection) -> rusqlite::Result<Vec<Test>> {
    let mut stmt = conn
        .prepare("SELECT id, class_id, title, date, max_score FROM tests ORDER BY sort_order, id")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Test {
                id: r.get(0)?,
                class_id: r.get(1)?,
                title: r.get(2)?,
                date: r.get(3)?,
                max_score: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn load_test_results(conn: &Connection) -> rusqlite::Result<Vec<TestResult>> {
    let mut stmt = conn.prepare(
        "SELECT id, test_id, student_id, score, percentage, grade
         FROM test_results ORDER BY sort_order, id",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(TestResult {
                id: r.get(0)?,
                test_id: r.get(1)?,
                student_id: r.get(2)?,
                score: r.get(3)?,
                percentage: r.get(4)?,
                grade: r.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn load_homework(conn: &Connection) -> rusqlite::Result<Vec<HomeworkAssignment>> {
    let mut stmt = conn.prepare(
        "SELECT id, class_id, title, description, due_date, max_points
         FROM homework_assignments ORDER BY sort_order, id",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(HomeworkAssignment {
                id: r.get(0)?,
                class_id: r.get(1)?,
                title: r.get(2)?,
                description: r.get(3)?,
                due_date: r.get(4)?,
                max_points: r.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn load_submissions(conn: &Connection) -> rusqlite::Result<Vec<HomeworkSubmission>> {
    let mut stmt = conn.prepare(
        "SELECT id, assignment_id, student_id, submitted_at, status, grade, feedback
         FROM homework_submissions ORDER BY sort_order, id",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(HomeworkSubmission {
                id: r.get(0)?,
                assignment_id: r.get(1)?,
                student_id: r.get(2)?,
                submitted_at: r.get(3)?,
                status: r.get(4)?,
                grade: r.get(5)?,
                feedback: r.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
