//! The conduit: an editable students x problems solve matrix for one lesson.
//!
//! Building projects the roster, the lesson's problems and its results into a
//! grid of booleans plus two derived columns (solved count and score).
//! Reconciling diffs a baseline grid against an edited one and turns every
//! changed cell into a single solve or unsolve operation; discussed problems
//! are frozen and never produce operations.

use crate::calc::{self, ProblemRatings};
use crate::error::StoreResult;
use crate::model::{Problem, ProblemType, SolveRecord, Student};
use crate::store::ConduitStore;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

pub const SOLVED_COLUMN: &str = "solved";
pub const SCORE_COLUMN: &str = "score";
pub const DERIVED_COLUMNS: [&str; 2] = [SOLVED_COLUMN, SCORE_COLUMN];

/// row name -> problem label -> solved
pub type CellGrid = BTreeMap<String, BTreeMap<String, bool>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConduitColumn {
    pub problem_id: String,
    pub label: String,
    pub problem_type: ProblemType,
    pub display_order: i64,
    pub discussed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConduitRow {
    pub student_id: String,
    pub name: String,
    /// One entry per column, in column order.
    pub cells: Vec<bool>,
    pub solved: i64,
    pub score: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConduitMatrix {
    pub lesson_id: String,
    pub columns: Vec<ConduitColumn>,
    pub rows: Vec<ConduitRow>,
}

impl ConduitMatrix {
    pub fn empty(lesson_id: &str) -> Self {
        ConduitMatrix {
            lesson_id: lesson_id.to_string(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    /// The editable part of the matrix, keyed by row name and label.
    pub fn cells(&self) -> CellGrid {
        self.rows
            .iter()
            .map(|row| {
                let cells = self
                    .columns
                    .iter()
                    .zip(&row.cells)
                    .map(|(c, v)| (c.label.clone(), *v))
                    .collect();
                (row.name.clone(), cells)
            })
            .collect()
    }

    pub fn name_to_id(&self) -> HashMap<String, String> {
        self.rows
            .iter()
            .map(|r| (r.name.clone(), r.student_id.clone()))
            .collect()
    }

    pub fn label_to_id(&self) -> HashMap<String, String> {
        self.columns
            .iter()
            .map(|c| (c.label.clone(), c.problem_id.clone()))
            .collect()
    }

    pub fn discussed_labels(&self) -> HashSet<String> {
        self.columns
            .iter()
            .filter(|c| c.discussed)
            .map(|c| c.label.clone())
            .collect()
    }
}

/// Row names are "Last First". The first namesake in roster order keeps the
/// plain name; later ones get the school appended, or a numeric suffix when
/// that is still taken. Rosters list namesakes by registration, so enrolling
/// a new namesake never renames an existing row.
fn row_names(students: &[Student]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    students
        .iter()
        .map(|s| {
            let base = s.display_name();
            let mut name = base.clone();
            if taken.contains(&name) {
                if let Some(school) = s.school.as_deref() {
                    name = format!("{base} ({school})");
                }
            }
            let mut n = 2;
            while taken.contains(&name) {
                name = format!("{base} #{n}");
                n += 1;
            }
            taken.insert(name.clone());
            name
        })
        .collect()
}

/// Project one lesson into a conduit matrix together with the ratings used
/// for the score column. Nothing to show (no students or no problems) gives
/// an empty matrix and empty ratings.
pub fn build_conduit(
    lesson_id: &str,
    students: &[Student],
    problems: &[Problem],
    results: &[SolveRecord],
) -> (ConduitMatrix, ProblemRatings) {
    if students.is_empty() || problems.is_empty() {
        return (ConduitMatrix::empty(lesson_id), ProblemRatings::new());
    }

    let ratings = calc::compute_problem_ratings(students, problems, results);

    let mut students: Vec<Student> = students.to_vec();
    // Stable: equal registration stamps keep the store's order.
    students.sort_by(|a, b| {
        (a.last_name.as_str(), a.first_name.as_str(), a.registered_at.as_str()).cmp(&(
            b.last_name.as_str(),
            b.first_name.as_str(),
            b.registered_at.as_str(),
        ))
    });
    let mut problems: Vec<Problem> = problems.to_vec();
    problems.sort_by_key(|p| p.display_order);

    let solved: HashSet<(&str, &str)> = results
        .iter()
        .map(|r| (r.student_id.as_str(), r.problem_id.as_str()))
        .collect();

    let names = row_names(&students);
    let rows = students
        .iter()
        .zip(names)
        .map(|(s, name)| ConduitRow {
            cells: problems
                .iter()
                .map(|p| solved.contains(&(s.id.as_str(), p.id.as_str())))
                .collect(),
            solved: calc::lesson_solved_count(&s.id, results),
            score: calc::lesson_score(&s.id, results, &ratings),
            student_id: s.id.clone(),
            name,
        })
        .collect();

    let columns = problems
        .iter()
        .map(|p| ConduitColumn {
            problem_id: p.id.clone(),
            label: p.label.clone(),
            problem_type: p.problem_type,
            display_order: p.display_order,
            discussed: p.discussed,
        })
        .collect();

    (
        ConduitMatrix {
            lesson_id: lesson_id.to_string(),
            columns,
            rows,
        },
        ratings,
    )
}

/// Build the conduit of a stored lesson. Unknown lessons give an empty matrix.
pub fn load_conduit<S: ConduitStore + ?Sized>(
    store: &S,
    lesson_id: &str,
) -> StoreResult<(ConduitMatrix, ProblemRatings)> {
    let Some(lesson) = store.lesson(lesson_id)? else {
        return Ok((ConduitMatrix::empty(lesson_id), ProblemRatings::new()));
    };
    let students = store.students_in_group(&lesson.group_id)?;
    let problems = store.columns_for_lesson(lesson_id)?;
    let results = store.results_for_lesson(lesson_id)?;
    Ok(build_conduit(lesson_id, &students, &problems, &results))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveOp {
    pub student_id: String,
    pub problem_id: String,
    pub lesson_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsolveOp {
    pub student_id: String,
    pub problem_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub solves: Vec<SolveOp>,
    pub unsolves: Vec<UnsolveOp>,
    /// Changed cells that could not be mapped to a student or problem.
    pub warnings: Vec<String>,
    /// Changed cells dropped because their problem is discussed.
    pub frozen_skipped: usize,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.solves.is_empty() && self.unsolves.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReconcileContext<'a> {
    pub lesson_id: &'a str,
    pub name_to_id: &'a HashMap<String, String>,
    pub label_to_id: &'a HashMap<String, String>,
    pub frozen_labels: &'a HashSet<String>,
}

/// Diff `edited` against `original` cell by cell.
///
/// Cells missing from `original` count as unsolved; cells missing from
/// `edited` are left alone. Derived columns and discussed problems never
/// produce operations; a real problem wins over a derived column of the same
/// name.
pub fn reconcile(original: &CellGrid, edited: &CellGrid, ctx: &ReconcileContext<'_>) -> Reconciliation {
    let mut out = Reconciliation::default();

    for (name, cells) in edited {
        let before = original.get(name);
        for (label, &now) in cells {
            let problem_id = ctx.label_to_id.get(label);
            if problem_id.is_none() && DERIVED_COLUMNS.contains(&label.as_str()) {
                continue;
            }
            let was = before.and_then(|r| r.get(label)).copied().unwrap_or(false);
            if was == now {
                continue;
            }
            if ctx.frozen_labels.contains(label) {
                out.frozen_skipped += 1;
                continue;
            }

            let student_id = ctx.name_to_id.get(name);
            let (Some(student_id), Some(problem_id)) = (student_id, problem_id) else {
                let msg = match student_id {
                    None => format!("unknown student '{name}', skipped cell '{label}'"),
                    Some(_) => format!("unknown problem '{label}', skipped for '{name}'"),
                };
                warn!(lesson_id = ctx.lesson_id, "{msg}");
                out.warnings.push(msg);
                continue;
            };

            if now {
                out.solves.push(SolveOp {
                    student_id: student_id.clone(),
                    problem_id: problem_id.clone(),
                    lesson_id: ctx.lesson_id.to_string(),
                });
            } else {
                out.unsolves.push(UnsolveOp {
                    student_id: student_id.clone(),
                    problem_id: problem_id.clone(),
                });
            }
        }
    }

    debug!(
        solves = out.solves.len(),
        unsolves = out.unsolves.len(),
        warnings = out.warnings.len(),
        frozen = out.frozen_skipped,
        "conduit reconciled"
    );
    out
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplySummary {
    /// Results actually inserted.
    pub added: usize,
    /// Results actually removed.
    pub removed: usize,
    /// Operations that found the state already in place.
    pub unchanged: usize,
}

/// Apply every operation inside one transaction: either all of them land or
/// none do.
pub fn apply_reconciliation(conn: &Connection, rec: &Reconciliation) -> StoreResult<ApplySummary> {
    if rec.is_empty() {
        return Ok(ApplySummary::default());
    }
    let tx = conn.unchecked_transaction()?;
    let mut summary = ApplySummary::default();
    for op in &rec.solves {
        if tx.add_result(&op.student_id, &op.problem_id, &op.lesson_id)? {
            summary.added += 1;
        } else {
            summary.unchanged += 1;
        }
    }
    for op in &rec.unsolves {
        if tx.delete_result(&op.student_id, &op.problem_id)? {
            summary.removed += 1;
        } else {
            summary.unchanged += 1;
        }
    }
    tx.commit()?;
    info!(
        added = summary.added,
        removed = summary.removed,
        unchanged = summary.unchanged,
        "conduit changes applied"
    );
    Ok(summary)
}
