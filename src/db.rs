use rusqlite::Connection;
use std::path::Path;
use tracing::info;

pub const DB_FILE_NAME: &str = "conduit.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)?;
    init_schema(&conn)?;
    info!(path = %db_path.display(), "workspace database opened");
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            school_name TEXT,
            registered_at TEXT NOT NULL
        )",
        [],
    )?;
    // A missing school counts as one value, so two school-less namesakes collide.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS uq_students_name_school
         ON students(first_name, last_name, IFNULL(school_name, ''))",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_name ON students(last_name, first_name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            event_type TEXT NOT NULL,
            description TEXT,
            start_date TEXT,
            end_date TEXT,
            organizer TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS event_participants(
            id TEXT PRIMARY KEY,
            event_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            role TEXT,
            registered_at TEXT NOT NULL,
            FOREIGN KEY(event_id) REFERENCES events(id) ON DELETE CASCADE,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
            UNIQUE(student_id, event_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_event_participants_event ON event_participants(event_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS study_groups(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            start_date TEXT,
            end_date TEXT,
            event_id TEXT,
            FOREIGN KEY(event_id) REFERENCES events(id) ON DELETE SET NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_study_groups_event ON study_groups(event_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS participants(
            id TEXT PRIMARY KEY,
            group_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            FOREIGN KEY(group_id) REFERENCES study_groups(id) ON DELETE CASCADE,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
            UNIQUE(student_id, group_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_participants_group ON participants(group_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS lessons(
            id TEXT PRIMARY KEY,
            group_id TEXT NOT NULL,
            lesson_date TEXT NOT NULL,
            topic TEXT NOT NULL,
            subject_area TEXT NOT NULL,
            sheet_link TEXT,
            FOREIGN KEY(group_id) REFERENCES study_groups(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lessons_group ON lessons(group_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS lesson_columns(
            id TEXT PRIMARY KEY,
            lesson_id TEXT NOT NULL,
            label TEXT NOT NULL,
            problem_type TEXT NOT NULL DEFAULT 'regular',
            display_order INTEGER NOT NULL,
            is_discussed INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(lesson_id) REFERENCES lessons(id) ON DELETE CASCADE,
            UNIQUE(lesson_id, label),
            UNIQUE(lesson_id, display_order)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS results(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            column_id TEXT NOT NULL,
            lesson_id TEXT NOT NULL,
            solved_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
            FOREIGN KEY(column_id) REFERENCES lesson_columns(id) ON DELETE CASCADE,
            FOREIGN KEY(lesson_id) REFERENCES lessons(id) ON DELETE CASCADE,
            UNIQUE(student_id, column_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_results_lesson ON results(lesson_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_results_student ON results(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS olympiads(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            olympiad_date TEXT NOT NULL,
            level TEXT NOT NULL,
            subject TEXT NOT NULL,
            organizer TEXT,
            UNIQUE(name, olympiad_date, subject)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS olympiad_results(
            id TEXT PRIMARY KEY,
            olympiad_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            award TEXT NOT NULL,
            score REAL,
            details TEXT,
            document_link TEXT,
            submitted_at TEXT NOT NULL,
            FOREIGN KEY(olympiad_id) REFERENCES olympiads(id) ON DELETE CASCADE,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS uq_olympiad_results_details
         ON olympiad_results(student_id, olympiad_id, IFNULL(details, ''))",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_olympiad_results_olympiad ON olympiad_results(olympiad_id)",
        [],
    )?;

    Ok(())
}
