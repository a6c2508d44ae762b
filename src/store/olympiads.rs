use super::{clean_opt, new_id, now_stamp, roster};
use crate::error::{StoreError, StoreResult};
use crate::model::{Award, Olympiad, OlympiadLevel, OlympiadResult};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::{info, instrument};

fn olympiad_from_row(r: &Row<'_>) -> rusqlite::Result<Olympiad> {
    Ok(Olympiad {
        id: r.get(0)?,
        name: r.get(1)?,
        date: r.get(2)?,
        level: r.get(3)?,
        subject: r.get(4)?,
        organizer: r.get(5)?,
    })
}

fn result_from_row(r: &Row<'_>) -> rusqlite::Result<OlympiadResult> {
    let last: String = r.get(3)?;
    let first: String = r.get(4)?;
    Ok(OlympiadResult {
        id: r.get(0)?,
        olympiad_id: r.get(1)?,
        student_id: r.get(2)?,
        student_name: format!("{} {}", last, first),
        award: r.get(5)?,
        score: r.get(6)?,
        details: r.get(7)?,
        document_link: r.get(8)?,
        submitted_at: r.get(9)?,
    })
}

const RESULT_SELECT: &str = "SELECT r.id, r.olympiad_id, r.student_id, s.last_name, s.first_name,
        r.award, r.score, r.details, r.document_link, r.submitted_at
     FROM olympiad_results r
     JOIN students s ON s.id = r.student_id";

#[instrument(skip(conn, organizer))]
pub fn create_olympiad(
    conn: &Connection,
    name: &str,
    date: &str,
    level: OlympiadLevel,
    subject: &str,
    organizer: Option<&str>,
) -> StoreResult<Olympiad> {
    let name = name.trim();
    let subject = subject.trim();
    if name.is_empty() || subject.is_empty() {
        return Err(StoreError::Invalid(
            "olympiad name and subject must not be empty".into(),
        ));
    }
    let olympiad = Olympiad {
        id: new_id(),
        name: name.to_string(),
        date: date.to_string(),
        level,
        subject: subject.to_string(),
        organizer: clean_opt(organizer),
    };
    conn.execute(
        "INSERT INTO olympiads(id, name, olympiad_date, level, subject, organizer)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &olympiad.id,
            &olympiad.name,
            &olympiad.date,
            olympiad.level,
            &olympiad.subject,
            &olympiad.organizer,
        ),
    )
    .map_err(|e| StoreError::from(e).for_entity("olympiad"))?;
    info!(olympiad_id = %olympiad.id, "olympiad created");
    Ok(olympiad)
}

pub fn get_olympiad(conn: &Connection, olympiad_id: &str) -> StoreResult<Option<Olympiad>> {
    Ok(conn
        .query_row(
            "SELECT id, name, olympiad_date, level, subject, organizer FROM olympiads WHERE id = ?",
            [olympiad_id],
            olympiad_from_row,
        )
        .optional()?)
}

/// Newest first, optionally restricted to one subject.
pub fn list_olympiads(conn: &Connection, subject: Option<&str>) -> StoreResult<Vec<Olympiad>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, olympiad_date, level, subject, organizer
         FROM olympiads
         WHERE (?1 IS NULL OR subject = ?1)
         ORDER BY olympiad_date DESC, name",
    )?;
    let rows = stmt
        .query_map([subject], olympiad_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[instrument(skip(conn))]
pub fn delete_olympiad(conn: &Connection, olympiad_id: &str) -> StoreResult<()> {
    let n = conn.execute("DELETE FROM olympiads WHERE id = ?", [olympiad_id])?;
    if n == 0 {
        return Err(StoreError::not_found("olympiad", olympiad_id));
    }
    Ok(())
}

pub struct NewOlympiadResult<'a> {
    pub olympiad_id: &'a str,
    pub student_id: &'a str,
    pub award: Award,
    pub score: Option<f64>,
    pub details: Option<&'a str>,
    pub document_link: Option<&'a str>,
}

#[instrument(skip_all, fields(olympiad_id = new.olympiad_id, student_id = new.student_id))]
pub fn add_result(conn: &Connection, new: &NewOlympiadResult<'_>) -> StoreResult<OlympiadResult> {
    if get_olympiad(conn, new.olympiad_id)?.is_none() {
        return Err(StoreError::not_found("olympiad", new.olympiad_id));
    }
    roster::require_student(conn, new.student_id)?;
    let id = new_id();
    conn.execute(
        "INSERT INTO olympiad_results(id, olympiad_id, student_id, award, score, details, document_link, submitted_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            new.olympiad_id,
            new.student_id,
            new.award,
            new.score,
            clean_opt(new.details),
            clean_opt(new.document_link),
            now_stamp(),
        ),
    )
    .map_err(|e| StoreError::from(e).for_entity("olympiad result"))?;
    let sql = format!("{RESULT_SELECT} WHERE r.id = ?");
    Ok(conn.query_row(&sql, [&id], result_from_row)?)
}

pub fn delete_result(conn: &Connection, result_id: &str) -> StoreResult<()> {
    let n = conn.execute("DELETE FROM olympiad_results WHERE id = ?", [result_id])?;
    if n == 0 {
        return Err(StoreError::not_found("olympiad result", result_id));
    }
    Ok(())
}

pub fn list_results_for_olympiad(conn: &Connection, olympiad_id: &str) -> StoreResult<Vec<OlympiadResult>> {
    let sql = format!("{RESULT_SELECT} WHERE r.olympiad_id = ? ORDER BY s.last_name, s.first_name");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([olympiad_id], result_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_results_for_student(conn: &Connection, student_id: &str) -> StoreResult<Vec<OlympiadResult>> {
    let sql = format!(
        "{RESULT_SELECT}
         JOIN olympiads o ON o.id = r.olympiad_id
         WHERE r.student_id = ?
         ORDER BY o.olympiad_date DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([student_id], result_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::store::roster::create_student;

    #[test]
    fn olympiad_results_are_unique_per_details() {
        let conn = open_in_memory().expect("db");
        let o = create_olympiad(&conn, "City round", "2024-11-10", OlympiadLevel::Municipal, "Math", None)
            .expect("olympiad");
        let s = create_student(&conn, "Elena", "Lebedeva", None).expect("student");
        let new = NewOlympiadResult {
            olympiad_id: &o.id,
            student_id: &s.id,
            award: Award::Prize2,
            score: Some(31.5),
            details: None,
            document_link: None,
        };
        let r = add_result(&conn, &new).expect("result");
        assert_eq!(r.student_name, "Lebedeva Elena");
        assert_eq!(add_result(&conn, &new).expect_err("dup").code(), "already_exists");

        let grade_9 = NewOlympiadResult { details: Some("grade 9"), ..new };
        add_result(&conn, &grade_9).expect("different details");
        assert_eq!(list_results_for_student(&conn, &s.id).expect("list").len(), 2);
        assert_eq!(list_olympiads(&conn, Some("Physics")).expect("filter").len(), 0);
    }
}
