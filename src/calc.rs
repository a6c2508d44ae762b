//! Problem ratings and score aggregation.
//!
//! A problem's rating is an inverse-popularity weight: with `N` students in
//! the group and `k` of them having solved it, the rating is `N - k + 1`.
//! Ratings are lesson-local and always recomputed from the current results;
//! nothing here is cached.

use crate::error::StoreResult;
use crate::model::{Problem, SolveRecord, Student};
use crate::store::ConduitStore;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// problem id -> rating
pub type ProblemRatings = BTreeMap<String, i64>;

/// Ratings for every problem of a lesson.
///
/// Only distinct rostered students count towards `k`, which keeps every
/// rating inside `[1, N + 1]`. An empty roster or an empty problem list
/// yields no ratings at all.
pub fn compute_problem_ratings(
    roster: &[Student],
    problems: &[Problem],
    results: &[SolveRecord],
) -> ProblemRatings {
    let participants: HashSet<&str> = roster.iter().map(|s| s.id.as_str()).collect();
    let n = participants.len() as i64;
    if n == 0 || problems.is_empty() {
        return ProblemRatings::new();
    }

    let solvers: HashSet<(&str, &str)> = results
        .iter()
        .filter(|r| participants.contains(r.student_id.as_str()))
        .map(|r| (r.problem_id.as_str(), r.student_id.as_str()))
        .collect();

    problems
        .iter()
        .map(|p| {
            let solved = solvers.iter().filter(|(pid, _)| *pid == p.id).count() as i64;
            (p.id.clone(), problem_rating(n, solved))
        })
        .collect()
}

pub fn problem_rating(participants: i64, solved: i64) -> i64 {
    (participants - solved) + 1
}

/// Sum of ratings over the problems this student solved. Problems without a
/// rating contribute nothing.
pub fn lesson_score(student_id: &str, results: &[SolveRecord], ratings: &ProblemRatings) -> i64 {
    let solved: HashSet<&str> = results
        .iter()
        .filter(|r| r.student_id == student_id)
        .map(|r| r.problem_id.as_str())
        .collect();
    solved
        .into_iter()
        .map(|pid| ratings.get(pid).copied().unwrap_or(0))
        .sum()
}

pub fn lesson_solved_count(student_id: &str, results: &[SolveRecord]) -> i64 {
    results
        .iter()
        .filter(|r| r.student_id == student_id)
        .map(|r| r.problem_id.as_str())
        .collect::<HashSet<_>>()
        .len() as i64
}

/// Fresh ratings for a lesson. Unknown lessons have no ratings.
pub fn lesson_ratings<S: ConduitStore + ?Sized>(store: &S, lesson_id: &str) -> StoreResult<ProblemRatings> {
    let Some(lesson) = store.lesson(lesson_id)? else {
        return Ok(ProblemRatings::new());
    };
    let roster = store.students_in_group(&lesson.group_id)?;
    let problems = store.columns_for_lesson(lesson_id)?;
    let results = store.results_for_lesson(lesson_id)?;
    let ratings = compute_problem_ratings(&roster, &problems, &results);
    debug!(lesson_id, participants = roster.len(), problems = ratings.len(), "ratings computed");
    Ok(ratings)
}

pub fn score_for_student_in_lesson<S: ConduitStore + ?Sized>(
    store: &S,
    student_id: &str,
    lesson_id: &str,
    ratings: &ProblemRatings,
) -> StoreResult<i64> {
    let results = store.results_for_lesson(lesson_id)?;
    Ok(lesson_score(student_id, &results, ratings))
}

pub fn solved_count_for_student_in_lesson<S: ConduitStore + ?Sized>(
    store: &S,
    student_id: &str,
    lesson_id: &str,
) -> StoreResult<i64> {
    let results = store.results_for_lesson(lesson_id)?;
    Ok(lesson_solved_count(student_id, &results))
}

/// Sum of per-lesson scores; each lesson gets its own freshly computed ratings.
pub fn total_score_for_student_in_group<S: ConduitStore + ?Sized>(
    store: &S,
    student_id: &str,
    group_id: &str,
) -> StoreResult<i64> {
    let mut total = 0;
    for lesson in store.lessons_for_group(group_id)? {
        let ratings = lesson_ratings(store, &lesson.id)?;
        if ratings.is_empty() {
            continue;
        }
        total += score_for_student_in_lesson(store, student_id, &lesson.id, &ratings)?;
    }
    Ok(total)
}

pub fn total_solved_for_student_in_group<S: ConduitStore + ?Sized>(
    store: &S,
    student_id: &str,
    group_id: &str,
) -> StoreResult<i64> {
    let mut total = 0;
    for lesson in store.lessons_for_group(group_id)? {
        total += solved_count_for_student_in_lesson(store, student_id, &lesson.id)?;
    }
    Ok(total)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStanding {
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub school: Option<String>,
    pub total_solved: i64,
    pub total_score: i64,
}

/// Group totals for every rostered student, in roster order.
pub fn group_standings<S: ConduitStore + ?Sized>(store: &S, group_id: &str) -> StoreResult<Vec<StudentStanding>> {
    let roster = store.students_in_group(group_id)?;
    let mut out = Vec::with_capacity(roster.len());
    for s in roster {
        out.push(StudentStanding {
            total_solved: total_solved_for_student_in_group(store, &s.id, group_id)?,
            total_score: total_score_for_student_in_group(store, &s.id, group_id)?,
            student_id: s.id,
            first_name: s.first_name,
            last_name: s.last_name,
            school: s.school,
        });
    }
    Ok(out)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::model::{Lesson, ProblemType, SubjectArea};
    use std::cell::RefCell;

    pub(crate) fn student(id: &str, last: &str, first: &str) -> Student {
        Student {
            id: id.into(),
            first_name: first.into(),
            last_name: last.into(),
            school: None,
            registered_at: "2024-09-01 10:00:00".into(),
        }
    }

    pub(crate) fn problem(id: &str, lesson_id: &str, label: &str, order: i64) -> Problem {
        Problem {
            id: id.into(),
            lesson_id: lesson_id.into(),
            label: label.into(),
            problem_type: ProblemType::Regular,
            display_order: order,
            discussed: false,
        }
    }

    pub(crate) fn solve(student_id: &str, problem_id: &str) -> SolveRecord {
        SolveRecord {
            student_id: student_id.into(),
            problem_id: problem_id.into(),
        }
    }

    /// In-memory stand-in for the workspace database.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub lessons: Vec<Lesson>,
        pub roster: BTreeMap<String, Vec<Student>>,
        pub problems: Vec<Problem>,
        pub results: RefCell<Vec<(SolveRecord, String)>>,
    }

    impl MemoryStore {
        pub(crate) fn add_lesson(&mut self, id: &str, group_id: &str) {
            self.lessons.push(Lesson {
                id: id.into(),
                group_id: group_id.into(),
                date: "2024-10-01".into(),
                topic: "Invariants".into(),
                subject_area: SubjectArea::Combinatorics,
                sheet_link: None,
            });
        }
    }

    impl ConduitStore for MemoryStore {
        fn lesson(&self, lesson_id: &str) -> StoreResult<Option<Lesson>> {
            Ok(self.lessons.iter().find(|l| l.id == lesson_id).cloned())
        }

        fn lessons_for_group(&self, group_id: &str) -> StoreResult<Vec<Lesson>> {
            Ok(self.lessons.iter().filter(|l| l.group_id == group_id).cloned().collect())
        }

        fn students_in_group(&self, group_id: &str) -> StoreResult<Vec<Student>> {
            Ok(self.roster.get(group_id).cloned().unwrap_or_default())
        }

        fn columns_for_lesson(&self, lesson_id: &str) -> StoreResult<Vec<Problem>> {
            let mut v: Vec<Problem> = self.problems.iter().filter(|p| p.lesson_id == lesson_id).cloned().collect();
            v.sort_by_key(|p| p.display_order);
            Ok(v)
        }

        fn results_for_lesson(&self, lesson_id: &str) -> StoreResult<Vec<SolveRecord>> {
            Ok(self
                .results
                .borrow()
                .iter()
                .filter(|(_, l)| l == lesson_id)
                .map(|(r, _)| r.clone())
                .collect())
        }

        fn add_result(&self, student_id: &str, problem_id: &str, lesson_id: &str) -> StoreResult<bool> {
            let rec = solve(student_id, problem_id);
            let mut results = self.results.borrow_mut();
            if results.iter().any(|(r, _)| *r == rec) {
                return Ok(false);
            }
            results.push((rec, lesson_id.to_string()));
            Ok(true)
        }

        fn delete_result(&self, student_id: &str, problem_id: &str) -> StoreResult<bool> {
            let rec = solve(student_id, problem_id);
            let mut results = self.results.borrow_mut();
            let before = results.len();
            results.retain(|(r, _)| *r != rec);
            Ok(results.len() != before)
        }

        fn mark_discussed(&self, problem_id: &str, _discussed: bool) -> StoreResult<Problem> {
            Err(StoreError::not_found("problem", problem_id))
        }
    }

    /// 3 students, 2 problems: A solved by s1 and s2, B by nobody.
    pub(crate) fn three_by_two() -> MemoryStore {
        let mut store = MemoryStore::default();
        store.add_lesson("L1", "G1");
        store.roster.insert(
            "G1".into(),
            vec![
                student("s1", "Alekseeva", "Anna"),
                student("s2", "Borisov", "Boris"),
                student("s3", "Vasiliev", "Viktor"),
            ],
        );
        store.problems = vec![problem("pA", "L1", "A", 0), problem("pB", "L1", "B", 1)];
        for (s, p) in [("s1", "pA"), ("s2", "pA")] {
            store.add_result(s, p, "L1").expect("add");
        }
        store
    }

    #[test]
    fn rating_is_participants_minus_solvers_plus_one() {
        let store = three_by_two();
        let ratings = lesson_ratings(&store, "L1").expect("ratings");
        assert_eq!(ratings.get("pA"), Some(&2));
        assert_eq!(ratings.get("pB"), Some(&4));

        // s1 solved only A, s2 solves both after adding B.
        store.add_result("s2", "pB", "L1").expect("add");
        let ratings = lesson_ratings(&store, "L1").expect("ratings");
        assert_eq!(ratings.get("pB"), Some(&3));
        assert_eq!(score_for_student_in_lesson(&store, "s1", "L1", &ratings).expect("s1"), 2);
        assert_eq!(score_for_student_in_lesson(&store, "s2", "L1", &ratings).expect("s2"), 5);
    }

    #[test]
    fn scenario_scores_two_and_six() {
        let roster = vec![student("s1", "A", "a"), student("s2", "B", "b"), student("s3", "C", "c")];
        let problems = vec![problem("pA", "L", "A", 0), problem("pB", "L", "B", 1)];
        let results = vec![solve("s1", "pA"), solve("s2", "pA")];
        let ratings = compute_problem_ratings(&roster, &problems, &results);
        assert_eq!(ratings["pA"], 2);
        assert_eq!(ratings["pB"], 4);
        assert_eq!(lesson_score("s1", &results, &ratings), 2);
        // Scoring against fixed ratings: solving both is worth 2 + 4.
        let both = vec![solve("s3", "pA"), solve("s3", "pB")];
        assert_eq!(lesson_score("s3", &both, &ratings), 6);
    }

    #[test]
    fn ratings_stay_in_bounds_and_never_increase_with_solvers() {
        for n in 1..=6usize {
            let roster: Vec<Student> = (0..n).map(|i| student(&format!("s{i}"), "L", "F")).collect();
            let problems = vec![problem("p", "L", "1", 0)];
            let mut prev = i64::MAX;
            for k in 0..=n {
                let mut results: Vec<SolveRecord> = (0..k).map(|i| solve(&format!("s{i}"), "p")).collect();
                // Duplicates and outsiders must not move the count.
                results.push(solve("outsider", "p"));
                if k > 0 {
                    results.push(solve("s0", "p"));
                }
                let r = compute_problem_ratings(&roster, &problems, &results)["p"];
                assert_eq!(r, n as i64 - k as i64 + 1);
                assert!((1..=n as i64 + 1).contains(&r));
                assert!(r <= prev);
                prev = r;
            }
        }
    }

    #[test]
    fn empty_inputs_give_empty_ratings() {
        let problems = vec![problem("p", "L", "1", 0)];
        assert!(compute_problem_ratings(&[], &problems, &[]).is_empty());
        assert!(compute_problem_ratings(&[student("s", "L", "F")], &[], &[]).is_empty());

        let store = MemoryStore::default();
        assert!(lesson_ratings(&store, "missing").expect("ratings").is_empty());
        assert_eq!(total_score_for_student_in_group(&store, "s", "missing").expect("score"), 0);
        assert_eq!(total_solved_for_student_in_group(&store, "s", "missing").expect("solved"), 0);
    }

    #[test]
    fn unrated_problems_contribute_zero() {
        let ratings: ProblemRatings = [("pA".to_string(), 3)].into_iter().collect();
        let results = vec![solve("s", "pA"), solve("s", "gone")];
        assert_eq!(lesson_score("s", &results, &ratings), 3);
        assert_eq!(lesson_solved_count("s", &results), 2);
    }

    #[test]
    fn group_total_equals_sum_of_lesson_scores() {
        let mut store = three_by_two();
        store.add_lesson("L2", "G1");
        store.problems.push(problem("pC", "L2", "C", 0));
        store.problems.push(problem("pD", "L2", "D", 1));
        for (s, p) in [("s1", "pC"), ("s1", "pD"), ("s3", "pD")] {
            store.add_result(s, p, "L2").expect("add");
        }

        for sid in ["s1", "s2", "s3"] {
            let mut by_lesson = 0;
            let mut solved = 0;
            for lid in ["L1", "L2"] {
                let ratings = lesson_ratings(&store, lid).expect("ratings");
                by_lesson += score_for_student_in_lesson(&store, sid, lid, &ratings).expect("score");
                solved += solved_count_for_student_in_lesson(&store, sid, lid).expect("solved");
            }
            assert_eq!(total_score_for_student_in_group(&store, sid, "G1").expect("total"), by_lesson);
            assert_eq!(total_solved_for_student_in_group(&store, sid, "G1").expect("solved"), solved);
        }

        let standings = group_standings(&store, "G1").expect("standings");
        // L1: A=2, B=4. L2: C=3, D=2.
        let totals: Vec<(i64, i64)> = standings.iter().map(|s| (s.total_solved, s.total_score)).collect();
        assert_eq!(totals, [(3, 7), (1, 2), (1, 2)]);
    }
}
