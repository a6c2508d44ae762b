use super::{clean_opt, new_id, now_stamp, roster};
use crate::conduit::DERIVED_COLUMNS;
use crate::error::{StoreError, StoreResult};
use crate::model::{Lesson, Problem, ProblemType, SolveRecord, SubjectArea};
use rusqlite::{Connection, OptionalExtension, Row};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

fn lesson_from_row(r: &Row<'_>) -> rusqlite::Result<Lesson> {
    Ok(Lesson {
        id: r.get(0)?,
        group_id: r.get(1)?,
        date: r.get(2)?,
        topic: r.get(3)?,
        subject_area: r.get(4)?,
        sheet_link: r.get(5)?,
    })
}

fn problem_from_row(r: &Row<'_>) -> rusqlite::Result<Problem> {
    Ok(Problem {
        id: r.get(0)?,
        lesson_id: r.get(1)?,
        label: r.get(2)?,
        problem_type: r.get(3)?,
        display_order: r.get(4)?,
        discussed: r.get::<_, i64>(5)? != 0,
    })
}

const PROBLEM_COLUMNS: &str = "id, lesson_id, label, problem_type, display_order, is_discussed";

#[instrument(skip(conn, sheet_link))]
pub fn create_lesson(
    conn: &Connection,
    group_id: &str,
    date: &str,
    topic: &str,
    subject_area: SubjectArea,
    sheet_link: Option<&str>,
) -> StoreResult<Lesson> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(StoreError::Invalid("lesson topic must not be empty".into()));
    }
    roster::require_group(conn, group_id)?;
    let lesson = Lesson {
        id: new_id(),
        group_id: group_id.to_string(),
        date: date.to_string(),
        topic: topic.to_string(),
        subject_area,
        sheet_link: clean_opt(sheet_link),
    };
    conn.execute(
        "INSERT INTO lessons(id, group_id, lesson_date, topic, subject_area, sheet_link)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &lesson.id,
            &lesson.group_id,
            &lesson.date,
            &lesson.topic,
            lesson.subject_area,
            &lesson.sheet_link,
        ),
    )?;
    info!(lesson_id = %lesson.id, "lesson created");
    Ok(lesson)
}

pub fn get_lesson(conn: &Connection, lesson_id: &str) -> StoreResult<Option<Lesson>> {
    Ok(conn
        .query_row(
            "SELECT id, group_id, lesson_date, topic, subject_area, sheet_link
             FROM lessons WHERE id = ?",
            [lesson_id],
            lesson_from_row,
        )
        .optional()?)
}

pub fn require_lesson(conn: &Connection, lesson_id: &str) -> StoreResult<Lesson> {
    get_lesson(conn, lesson_id)?.ok_or_else(|| StoreError::not_found("lesson", lesson_id))
}

/// Lessons of a group, newest first.
pub fn list_lessons(conn: &Connection, group_id: &str) -> StoreResult<Vec<Lesson>> {
    let mut stmt = conn.prepare(
        "SELECT id, group_id, lesson_date, topic, subject_area, sheet_link
         FROM lessons
         WHERE group_id = ?
         ORDER BY lesson_date DESC, rowid DESC",
    )?;
    let rows = stmt
        .query_map([group_id], lesson_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Deletes the lesson together with its problems and results.
#[instrument(skip(conn))]
pub fn delete_lesson(conn: &Connection, lesson_id: &str) -> StoreResult<()> {
    let n = conn.execute("DELETE FROM lessons WHERE id = ?", [lesson_id])?;
    if n == 0 {
        return Err(StoreError::not_found("lesson", lesson_id));
    }
    info!("lesson deleted");
    Ok(())
}

/// Adds a problem column. Without an explicit order it goes after the last one.
#[instrument(skip(conn))]
pub fn create_problem(
    conn: &Connection,
    lesson_id: &str,
    label: &str,
    problem_type: ProblemType,
    display_order: Option<i64>,
) -> StoreResult<Problem> {
    let label = label.trim();
    if label.is_empty() {
        return Err(StoreError::Invalid("problem label must not be empty".into()));
    }
    if DERIVED_COLUMNS.iter().any(|d| d.eq_ignore_ascii_case(label)) {
        return Err(StoreError::Invalid(format!(
            "problem label '{label}' is reserved for a conduit total column"
        )));
    }
    if matches!(display_order, Some(o) if o < 0) {
        return Err(StoreError::Invalid("displayOrder must be >= 0".into()));
    }
    require_lesson(conn, lesson_id)?;
    let display_order = match display_order {
        Some(o) => o,
        None => conn.query_row(
            "SELECT COALESCE(MAX(display_order) + 1, 0) FROM lesson_columns WHERE lesson_id = ?",
            [lesson_id],
            |r| r.get(0),
        )?,
    };
    let problem = Problem {
        id: new_id(),
        lesson_id: lesson_id.to_string(),
        label: label.to_string(),
        problem_type,
        display_order,
        discussed: false,
    };
    conn.execute(
        "INSERT INTO lesson_columns(id, lesson_id, label, problem_type, display_order, is_discussed)
         VALUES(?, ?, ?, ?, ?, 0)",
        (
            &problem.id,
            &problem.lesson_id,
            &problem.label,
            problem.problem_type,
            problem.display_order,
        ),
    )
    .map_err(|e| StoreError::from(e).for_entity("problem"))?;
    info!(problem_id = %problem.id, "problem created");
    Ok(problem)
}

pub fn get_problem(conn: &Connection, problem_id: &str) -> StoreResult<Option<Problem>> {
    let sql = format!("SELECT {PROBLEM_COLUMNS} FROM lesson_columns WHERE id = ?");
    Ok(conn
        .query_row(&sql, [problem_id], problem_from_row)
        .optional()?)
}

pub fn list_problems(conn: &Connection, lesson_id: &str) -> StoreResult<Vec<Problem>> {
    let sql = format!(
        "SELECT {PROBLEM_COLUMNS} FROM lesson_columns WHERE lesson_id = ? ORDER BY display_order"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([lesson_id], problem_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[instrument(skip(conn))]
pub fn delete_problem(conn: &Connection, problem_id: &str) -> StoreResult<()> {
    let n = conn.execute("DELETE FROM lesson_columns WHERE id = ?", [problem_id])?;
    if n == 0 {
        return Err(StoreError::not_found("problem", problem_id));
    }
    Ok(())
}

#[instrument(skip(conn))]
pub fn set_discussed(conn: &Connection, problem_id: &str, discussed: bool) -> StoreResult<Problem> {
    let n = conn.execute(
        "UPDATE lesson_columns SET is_discussed = ? WHERE id = ?",
        (discussed as i64, problem_id),
    )?;
    if n == 0 {
        return Err(StoreError::not_found("problem", problem_id));
    }
    get_problem(conn, problem_id)?.ok_or_else(|| StoreError::not_found("problem", problem_id))
}

/// Make exactly `labels` discussed within the lesson; returns how many flags flipped.
#[instrument(skip(conn, labels))]
pub fn sync_discussed(conn: &Connection, lesson_id: &str, labels: &[String]) -> StoreResult<usize> {
    require_lesson(conn, lesson_id)?;
    let wanted: HashSet<&str> = labels.iter().map(|s| s.as_str()).collect();
    let problems = list_problems(conn, lesson_id)?;
    if let Some(unknown) = wanted
        .iter()
        .find(|l| !problems.iter().any(|p| p.label == **l))
    {
        return Err(StoreError::Invalid(format!(
            "no problem labelled '{unknown}' in this lesson"
        )));
    }

    let tx = conn.unchecked_transaction()?;
    let mut changed = 0;
    for p in &problems {
        let should = wanted.contains(p.label.as_str());
        if p.discussed != should {
            set_discussed(&tx, &p.id, should)?;
            changed += 1;
        }
    }
    tx.commit()?;
    debug!(changed, "discussed flags synced");
    Ok(changed)
}

pub fn list_results(conn: &Connection, lesson_id: &str) -> StoreResult<Vec<SolveRecord>> {
    let mut stmt = conn.prepare(
        "SELECT student_id, column_id FROM results WHERE lesson_id = ? ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([lesson_id], |r| {
            Ok(SolveRecord {
                student_id: r.get(0)?,
                problem_id: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Idempotent: recording an existing solve changes nothing and returns `false`.
pub fn add_result(
    conn: &Connection,
    student_id: &str,
    problem_id: &str,
    lesson_id: &str,
) -> StoreResult<bool> {
    let problem =
        get_problem(conn, problem_id)?.ok_or_else(|| StoreError::not_found("problem", problem_id))?;
    if problem.lesson_id != lesson_id {
        return Err(StoreError::Invalid(format!(
            "problem {problem_id} does not belong to lesson {lesson_id}"
        )));
    }
    roster::require_student(conn, student_id)?;
    let n = conn.execute(
        "INSERT INTO results(id, student_id, column_id, lesson_id, solved_at)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(student_id, column_id) DO NOTHING",
        (new_id(), student_id, problem_id, lesson_id, now_stamp()),
    )?;
    debug!(student_id, problem_id, inserted = n > 0, "add result");
    Ok(n > 0)
}

/// Idempotent: removing a missing solve changes nothing and returns `false`.
pub fn delete_result(conn: &Connection, student_id: &str, problem_id: &str) -> StoreResult<bool> {
    let n = conn.execute(
        "DELETE FROM results WHERE student_id = ? AND column_id = ?",
        (student_id, problem_id),
    )?;
    debug!(student_id, problem_id, deleted = n > 0, "delete result");
    Ok(n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::store::roster::{create_group, create_student};

    fn lesson_fixture(conn: &Connection) -> Lesson {
        let g = create_group(conn, "G", None, None, None, None).expect("group");
        create_lesson(conn, &g.id, "2024-10-01", "Pigeonhole", SubjectArea::Combinatorics, None)
            .expect("lesson")
    }

    #[test]
    fn problems_default_to_next_display_order() {
        let conn = open_in_memory().expect("db");
        let lesson = lesson_fixture(&conn);
        let p0 = create_problem(&conn, &lesson.id, "1", ProblemType::Regular, None).expect("p0");
        let p1 = create_problem(&conn, &lesson.id, "2", ProblemType::Bonus, Some(5)).expect("p1");
        let p2 = create_problem(&conn, &lesson.id, "3*", ProblemType::Zero, None).expect("p2");
        assert_eq!((p0.display_order, p1.display_order, p2.display_order), (0, 5, 6));

        let dup_label = create_problem(&conn, &lesson.id, "1", ProblemType::Regular, None)
            .expect_err("dup label");
        assert_eq!(dup_label.code(), "already_exists");
        let dup_order = create_problem(&conn, &lesson.id, "4", ProblemType::Regular, Some(5))
            .expect_err("dup order");
        assert_eq!(dup_order.code(), "already_exists");
    }

    #[test]
    fn total_column_names_are_not_problem_labels() {
        let conn = open_in_memory().expect("db");
        let lesson = lesson_fixture(&conn);
        for label in ["score", " solved ", "Score"] {
            let e = create_problem(&conn, &lesson.id, label, ProblemType::Regular, None)
                .expect_err("reserved label");
            assert_eq!(e.code(), "bad_params");
        }
        assert!(list_problems(&conn, &lesson.id).expect("problems").is_empty());
        create_problem(&conn, &lesson.id, "scores", ProblemType::Regular, None).expect("near miss");
    }

    #[test]
    fn results_are_idempotent_and_lesson_consistent() {
        let conn = open_in_memory().expect("db");
        let lesson = lesson_fixture(&conn);
        let other = create_lesson(&conn, &lesson.group_id, "2024-10-08", "Parity", SubjectArea::Logic, None)
            .expect("other lesson");
        let s = create_student(&conn, "Olga", "Morozova", None).expect("student");
        let p = create_problem(&conn, &lesson.id, "1", ProblemType::Regular, None).expect("p");

        assert!(add_result(&conn, &s.id, &p.id, &lesson.id).expect("add"));
        assert!(!add_result(&conn, &s.id, &p.id, &lesson.id).expect("add again"));
        assert_eq!(list_results(&conn, &lesson.id).expect("results").len(), 1);

        let e = add_result(&conn, &s.id, &p.id, &other.id).expect_err("wrong lesson");
        assert_eq!(e.code(), "bad_params");

        assert!(delete_result(&conn, &s.id, &p.id).expect("delete"));
        assert!(!delete_result(&conn, &s.id, &p.id).expect("delete again"));
    }

    #[test]
    fn deleting_a_lesson_cascades_to_problems_and_results() {
        let conn = open_in_memory().expect("db");
        let lesson = lesson_fixture(&conn);
        let s = create_student(&conn, "Olga", "Morozova", None).expect("student");
        let p = create_problem(&conn, &lesson.id, "1", ProblemType::Regular, None).expect("p");
        add_result(&conn, &s.id, &p.id, &lesson.id).expect("add");

        delete_lesson(&conn, &lesson.id).expect("delete");
        assert!(get_problem(&conn, &p.id).expect("get").is_none());
        let left: i64 = conn
            .query_row("SELECT COUNT(*) FROM results", [], |r| r.get(0))
            .expect("count");
        assert_eq!(left, 0);
    }

    #[test]
    fn sync_discussed_flips_only_differences() {
        let conn = open_in_memory().expect("db");
        let lesson = lesson_fixture(&conn);
        for l in ["1", "2", "3"] {
            create_problem(&conn, &lesson.id, l, ProblemType::Regular, None).expect("p");
        }
        assert_eq!(sync_discussed(&conn, &lesson.id, &["1".into(), "3".into()]).expect("sync"), 2);
        assert_eq!(sync_discussed(&conn, &lesson.id, &["3".into()]).expect("sync"), 1);
        let flags: Vec<bool> = list_problems(&conn, &lesson.id)
            .expect("list")
            .iter()
            .map(|p| p.discussed)
            .collect();
        assert_eq!(flags, [false, false, true]);
        assert!(sync_discussed(&conn, &lesson.id, &["9".into()]).is_err());
    }
}
