use rusqlite::{Connection, OpenFlags};
use std::path::Path;

pub const DB_FILE: &str = "classboard.sqlite3";

/// Tables in dependency order; clearing walks this list backwards.
pub const TABLES: [&str; 13] = [
    "students",
    "classes",
    "class_enrollments",
    "schedules",
    "schedule_exceptions",
    "meetings",
    "attendance_records",
    "attendance_entries",
    "class_notes",
    "tests",
    "test_results",
    "homework_assignments",
    "homework_submissions",
];

/// Open the workspace database. The workspace directory must exist.
pub fn open_db(workspace: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(workspace.join(DB_FILE))?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Open an existing workspace database without creating or migrating it.
pub fn open_db_read_only(workspace: &Path) -> rusqlite::Result<Connection> {
    Connection::open_with_flags(
        workspace.join(DB_FILE),
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
}

pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            phone TEXT,
            grade TEXT,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            subject TEXT NOT NULL,
            teacher TEXT,
            room TEXT,
            capacity INTEGER NOT NULL CHECK(capacity > 0),
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS class_enrollments(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            UNIQUE(class_id, student_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_class_enrollments_class ON class_enrollments(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_class_enrollments_student ON class_enrollments(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schedules(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            day_of_week INTEGER NOT NULL CHECK(day_of_week BETWEEN 0 AND 6),
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            room TEXT,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schedules_class ON schedules(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schedule_exceptions(
            id TEXT PRIMARY KEY,
            schedule_id TEXT NOT NULL,
            date TEXT NOT NULL,
            reason TEXT,
            cancelled INTEGER NOT NULL,
            new_start_time TEXT,
            new_end_time TEXT,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(schedule_id) REFERENCES schedules(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS meetings(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            date TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            class_id TEXT,
            location TEXT,
            notes TEXT,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_records(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            date TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_entries(
            id TEXT PRIMARY KEY,
            record_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            status TEXT NOT NULL,
            note TEXT,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(record_id) REFERENCES attendance_records(id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            UNIQUE(record_id, student_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_records_class ON attendance_records(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_entries_record ON attendance_entries(record_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS class_notes(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            date TEXT NOT NULL,
            content TEXT NOT NULL,
            author TEXT,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS tests(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            title TEXT NOT NULL,
            date TEXT NOT NULL,
            max_score REAL NOT NULL,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS test_results(
            id TEXT PRIMARY KEY,
            test_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            score REAL NOT NULL,
            percentage REAL NOT NULL,
            grade TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(test_id) REFERENCES tests(id),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_test_results_test ON test_results(test_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_test_results_student ON test_results(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS homework_assignments(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            due_date TEXT NOT NULL,
            max_points REAL,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS homework_submissions(
            id TEXT PRIMARY KEY,
            assignment_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            submitted_at TEXT NOT NULL,
            status TEXT NOT NULL,
            grade REAL,
            feedback TEXT,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(assignment_id) REFERENCES homework_assignments(id),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_homework_submissions_assignment ON homework_submissions(assignment_id)",
        [],
    )?;

    Ok(())
}

pub fn table_count(conn: &Connection, table: &str) -> rusqlite::Result<usize> {
    let sql = format!("SELECT COUNT(*) FROM {}", table);
    let n: i64 = conn.query_row(&sql, [], |r| r.get(0))?;
    Ok(n.max(0) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_every_table() {
        let conn = open_in_memory().expect("open db");
        for table in TABLES {
            assert_eq!(table_count(&conn, table).expect(table), 0);
        }
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let conn = open_in_memory().expect("open db");
        let res = conn.execute(
            "INSERT INTO schedules(id, class_id, day_of_week, start_time, end_time, sort_order)
             VALUES('s1', 'missing', 1, '08:00', '09:00', 0)",
            [],
        );
        assert!(res.is_err());
    }
}
