//! Data access over the workspace database.
//!
//! The calculation code never touches SQL directly: it reads fully
//! materialized snapshots through [`ConduitStore`], which is implemented for
//! `rusqlite::Connection` (and therefore for an open `Transaction` as well).

pub mod events;
pub mod lessons;
pub mod olympiads;
pub mod roster;

use crate::error::StoreResult;
use crate::model::{Lesson, Problem, SolveRecord, Student};
use rusqlite::Connection;

/// Reads and writes the conduit core depends on.
pub trait ConduitStore {
    fn lesson(&self, lesson_id: &str) -> StoreResult<Option<Lesson>>;

    fn lessons_for_group(&self, group_id: &str) -> StoreResult<Vec<Lesson>>;

    /// Group roster ordered by last name, then first name.
    fn students_in_group(&self, group_id: &str) -> StoreResult<Vec<Student>>;

    /// Problems of a lesson in display order.
    fn columns_for_lesson(&self, lesson_id: &str) -> StoreResult<Vec<Problem>>;

    fn results_for_lesson(&self, lesson_id: &str) -> StoreResult<Vec<SolveRecord>>;

    /// Returns `true` when a new result was recorded, `false` when it already existed.
    fn add_result(&self, student_id: &str, problem_id: &str, lesson_id: &str) -> StoreResult<bool>;

    /// Returns `true` when a result was removed.
    fn delete_result(&self, student_id: &str, problem_id: &str) -> StoreResult<bool>;

    fn mark_discussed(&self, problem_id: &str, discussed: bool) -> StoreResult<Problem>;
}

impl ConduitStore for Connection {
    fn lesson(&self, lesson_id: &str) -> StoreResult<Option<Lesson>> {
        lessons::get_lesson(self, lesson_id)
    }

    fn lessons_for_group(&self, group_id: &str) -> StoreResult<Vec<Lesson>> {
        lessons::list_lessons(self, group_id)
    }

    fn students_in_group(&self, group_id: &str) -> StoreResult<Vec<Student>> {
        roster::list_group_students(self, group_id)
    }

    fn columns_for_lesson(&self, lesson_id: &str) -> StoreResult<Vec<Problem>> {
        lessons::list_problems(self, lesson_id)
    }

    fn results_for_lesson(&self, lesson_id: &str) -> StoreResult<Vec<SolveRecord>> {
        lessons::list_results(self, lesson_id)
    }

    fn add_result(&self, student_id: &str, problem_id: &str, lesson_id: &str) -> StoreResult<bool> {
        lessons::add_result(self, student_id, problem_id, lesson_id)
    }

    fn delete_result(&self, student_id: &str, problem_id: &str) -> StoreResult<bool> {
        lessons::delete_result(self, student_id, problem_id)
    }

    fn mark_discussed(&self, problem_id: &str, discussed: bool) -> StoreResult<Problem> {
        lessons::set_discussed(self, problem_id, discussed)
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub(crate) fn now_stamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Trim and drop empty optional text so `""` and `null` mean the same thing.
pub(crate) fn clean_opt(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}
