use super::{clean_opt, new_id, now_stamp};
use crate::error::{StoreError, StoreResult};
use crate::model::{Group, GroupOverview, Student};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::{debug, info, instrument};

const STUDENT_COLUMNS: &str = "s.id, s.first_name, s.last_name, s.school_name, s.registered_at";

pub(crate) fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        first_name: r.get(1)?,
        last_name: r.get(2)?,
        school: r.get(3)?,
        registered_at: r.get(4)?,
    })
}

fn group_from_row(r: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: r.get(0)?,
        name: r.get(1)?,
        description: r.get(2)?,
        start_date: r.get(3)?,
        end_date: r.get(4)?,
        event_id: r.get(5)?,
    })
}

#[instrument(skip(conn))]
pub fn create_student(
    conn: &Connection,
    first_name: &str,
    last_name: &str,
    school: Option<&str>,
) -> StoreResult<Student> {
    let first_name = first_name.trim();
    let last_name = last_name.trim();
    if first_name.is_empty() || last_name.is_empty() {
        return Err(StoreError::Invalid(
            "first and last name must not be empty".into(),
        ));
    }
    let student = Student {
        id: new_id(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        school: clean_opt(school),
        registered_at: now_stamp(),
    };
    conn.execute(
        "INSERT INTO students(id, first_name, last_name, school_name, registered_at)
         VALUES(?, ?, ?, ?, ?)",
        (
            &student.id,
            &student.first_name,
            &student.last_name,
            &student.school,
            &student.registered_at,
        ),
    )
    .map_err(|e| StoreError::from(e).for_entity("student"))?;
    info!(student_id = %student.id, "student created");
    Ok(student)
}

pub fn get_student(conn: &Connection, student_id: &str) -> StoreResult<Option<Student>> {
    let sql = format!("SELECT {STUDENT_COLUMNS} FROM students s WHERE s.id = ?");
    Ok(conn
        .query_row(&sql, [student_id], student_from_row)
        .optional()?)
}

pub fn require_student(conn: &Connection, student_id: &str) -> StoreResult<Student> {
    get_student(conn, student_id)?.ok_or_else(|| StoreError::not_found("student", student_id))
}

pub fn list_students(conn: &Connection) -> StoreResult<Vec<Student>> {
    let sql = format!(
        "SELECT {STUDENT_COLUMNS} FROM students s ORDER BY s.last_name, s.first_name, s.id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn find_students_by_name(
    conn: &Connection,
    first_name: &str,
    last_name: &str,
) -> StoreResult<Vec<Student>> {
    let sql = format!(
        "SELECT {STUDENT_COLUMNS} FROM students s
         WHERE s.first_name = ? AND s.last_name = ?
         ORDER BY s.school_name, s.id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map((first_name.trim(), last_name.trim()), student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[instrument(skip(conn))]
pub fn delete_student(conn: &Connection, student_id: &str) -> StoreResult<()> {
    let n = conn.execute("DELETE FROM students WHERE id = ?", [student_id])?;
    if n == 0 {
        return Err(StoreError::not_found("student", student_id));
    }
    info!("student deleted");
    Ok(())
}

#[instrument(skip(conn, description))]
pub fn create_group(
    conn: &Connection,
    name: &str,
    description: Option<&str>,
    event_id: Option<&str>,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> StoreResult<Group> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::Invalid("group name must not be empty".into()));
    }
    if let Some(eid) = event_id {
        if super::events::get_event(conn, eid)?.is_none() {
            return Err(StoreError::not_found("event", eid));
        }
    }
    let group = Group {
        id: new_id(),
        name: name.to_string(),
        description: clean_opt(description),
        start_date: clean_opt(start_date),
        end_date: clean_opt(end_date),
        event_id: event_id.map(str::to_string),
    };
    conn.execute(
        "INSERT INTO study_groups(id, name, description, start_date, end_date, event_id)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &group.id,
            &group.name,
            &group.description,
            &group.start_date,
            &group.end_date,
            &group.event_id,
        ),
    )
    .map_err(|e| StoreError::from(e).for_entity("group"))?;
    info!(group_id = %group.id, "group created");
    Ok(group)
}

pub fn get_group(conn: &Connection, group_id: &str) -> StoreResult<Option<Group>> {
    Ok(conn
        .query_row(
            "SELECT id, name, description, start_date, end_date, event_id
             FROM study_groups WHERE id = ?",
            [group_id],
            group_from_row,
        )
        .optional()?)
}

pub fn require_group(conn: &Connection, group_id: &str) -> StoreResult<Group> {
    get_group(conn, group_id)?.ok_or_else(|| StoreError::not_found("group", group_id))
}

/// Groups ordered by name, optionally only those linked to one event.
pub fn list_groups(conn: &Connection, event_id: Option<&str>) -> StoreResult<Vec<GroupOverview>> {
    // Correlated subqueries keep the counts from multiplying through joins.
    let mut stmt = conn.prepare(
        "SELECT
           g.id, g.name, g.description, g.start_date, g.end_date, g.event_id,
           e.name,
           (SELECT COUNT(*) FROM participants p WHERE p.group_id = g.id),
           (SELECT COUNT(*) FROM lessons l WHERE l.group_id = g.id)
         FROM study_groups g
         LEFT JOIN events e ON e.id = g.event_id
         WHERE (?1 IS NULL OR g.event_id = ?1)
         ORDER BY g.name",
    )?;
    let rows = stmt
        .query_map([event_id], |r| {
            Ok(GroupOverview {
                group: group_from_row(r)?,
                event_name: r.get(6)?,
                student_count: r.get(7)?,
                lesson_count: r.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[instrument(skip(conn))]
pub fn delete_group(conn: &Connection, group_id: &str) -> StoreResult<()> {
    let n = conn.execute("DELETE FROM study_groups WHERE id = ?", [group_id])?;
    if n == 0 {
        return Err(StoreError::not_found("group", group_id));
    }
    info!("group deleted");
    Ok(())
}

/// Returns `true` when the student was newly added; membership is a set.
#[instrument(skip(conn))]
pub fn add_student_to_group(conn: &Connection, student_id: &str, group_id: &str) -> StoreResult<bool> {
    require_student(conn, student_id)?;
    require_group(conn, group_id)?;
    let n = conn.execute(
        "INSERT INTO participants(id, group_id, student_id) VALUES(?, ?, ?)
         ON CONFLICT(student_id, group_id) DO NOTHING",
        (new_id(), group_id, student_id),
    )?;
    debug!(added = n > 0, "group membership");
    Ok(n > 0)
}

pub fn remove_student_from_group(
    conn: &Connection,
    student_id: &str,
    group_id: &str,
) -> StoreResult<bool> {
    let n = conn.execute(
        "DELETE FROM participants WHERE student_id = ? AND group_id = ?",
        (student_id, group_id),
    )?;
    Ok(n > 0)
}

pub fn list_group_students(conn: &Connection, group_id: &str) -> StoreResult<Vec<Student>> {
    let sql = format!(
        "SELECT {STUDENT_COLUMNS}
         FROM students s
         JOIN participants p ON p.student_id = s.id
         WHERE p.group_id = ?
         ORDER BY s.last_name, s.first_name, s.registered_at, s.rowid"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([group_id], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Groups a student has been enrolled in.
pub fn list_student_groups(conn: &Connection, student_id: &str) -> StoreResult<Vec<Group>> {
    let mut stmt = conn.prepare(
        "SELECT g.id, g.name, g.description, g.start_date, g.end_date, g.event_id
         FROM study_groups g
         JOIN participants p ON p.group_id = g.id
         WHERE p.student_id = ?
         ORDER BY g.name",
    )?;
    let rows = stmt
        .query_map([student_id], group_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Debug)]
pub enum Enrollment {
    Enrolled { student: Student, created: bool, added: bool },
    Ambiguous(Vec<Student>),
}

/// Find a student by name (creating one when there is no match) and add them
/// to the group. Several namesakes are reported back untouched.
#[instrument(skip(conn, school))]
pub fn enroll_by_name(
    conn: &Connection,
    group_id: &str,
    first_name: &str,
    last_name: &str,
    school: Option<&str>,
) -> StoreResult<Enrollment> {
    require_group(conn, group_id)?;
    let mut found = find_students_by_name(conn, first_name, last_name)?;
    let school = clean_opt(school);
    if found.len() > 1 {
        if let Some(s) = &school {
            found.retain(|st| st.school.as_deref() == Some(s.as_str()));
        }
    }
    let (student, created) = match found.len() {
        0 => (
            create_student(conn, first_name, last_name, school.as_deref())?,
            true,
        ),
        1 => (found.remove(0), false),
        _ => return Ok(Enrollment::Ambiguous(found)),
    };
    let added = add_student_to_group(conn, &student.id, group_id)?;
    Ok(Enrollment::Enrolled {
        student,
        created,
        added,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    #[test]
    fn duplicate_student_without_school_is_rejected() {
        let conn = open_in_memory().expect("db");
        create_student(&conn, "Anna", "Petrova", None).expect("first");
        let e = create_student(&conn, "Anna", "Petrova", Some("  ")).expect_err("dup");
        assert_eq!(e.code(), "already_exists");
        create_student(&conn, "Anna", "Petrova", Some("School 57")).expect("other school");
    }

    #[test]
    fn membership_is_a_set_and_roster_is_name_ordered() {
        let conn = open_in_memory().expect("db");
        let g = create_group(&conn, "Juniors", None, None, None, None).expect("group");
        let b = create_student(&conn, "Boris", "Smirnov", None).expect("b");
        let a = create_student(&conn, "Anna", "Smirnova", None).expect("a");
        let c = create_student(&conn, "Alexei", "Ivanov", None).expect("c");
        for s in [&b, &a, &c] {
            assert!(add_student_to_group(&conn, &s.id, &g.id).expect("add"));
        }
        assert!(!add_student_to_group(&conn, &a.id, &g.id).expect("re-add"));

        let names: Vec<String> = list_group_students(&conn, &g.id)
            .expect("roster")
            .iter()
            .map(|s| s.display_name())
            .collect();
        assert_eq!(names, ["Ivanov Alexei", "Smirnov Boris", "Smirnova Anna"]);

        let groups = list_groups(&conn, None).expect("groups");
        assert_eq!(groups[0].student_count, 3);
    }

    #[test]
    fn enroll_reuses_single_match_and_reports_ambiguity() {
        let conn = open_in_memory().expect("db");
        let g = create_group(&conn, "Seniors", None, None, None, None).expect("group");
        let existing = create_student(&conn, "Ivan", "Popov", Some("School 2")).expect("s");

        match enroll_by_name(&conn, &g.id, "Ivan", "Popov", None).expect("enroll") {
            Enrollment::Enrolled { student, created, added } => {
                assert_eq!(student.id, existing.id);
                assert!(!created);
                assert!(added);
            }
            other => panic!("unexpected {other:?}"),
        }

        create_student(&conn, "Ivan", "Popov", Some("School 9")).expect("namesake");
        assert!(matches!(
            enroll_by_name(&conn, &g.id, "Ivan", "Popov", None).expect("enroll"),
            Enrollment::Ambiguous(c) if c.len() == 2
        ));
        assert!(matches!(
            enroll_by_name(&conn, &g.id, "Ivan", "Popov", Some("School 9")).expect("enroll"),
            Enrollment::Enrolled { created: false, added: true, .. }
        ));
    }
}
