//! Demo workspace contents generated from a fixed RNG seed.

use crate::error::{StoreError, StoreResult};
use crate::model::{Award, EventType, Group, OlympiadLevel, ProblemType, Student, SubjectArea};
use crate::store::events::{self, NewEvent};
use crate::store::olympiads::{self, NewOlympiadResult};
use crate::store::{lessons, roster};
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, instrument};

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_STUDENTS: usize = 60;

const EVENTS: usize = 3;
const INDEPENDENT_GROUPS: usize = 2;
const OLYMPIADS: usize = 8;
const SOLVED_PROBABILITY: f64 = 0.6;
const OLYMPIAD_PROBABILITY: f64 = 0.25;
const EVENT_PROBABILITY: f64 = 0.1;

const FIRST_NAMES: &[&str] = &[
    "Alexander", "Mikhail", "Ivan", "Dmitry", "Sergey", "Andrey", "Alexey", "Maxim", "Evgeny",
    "Vladimir", "Anna", "Maria", "Ekaterina", "Olga", "Natalia", "Elena", "Irina", "Svetlana",
    "Tatiana", "Yulia",
];
const LAST_NAMES: &[&str] = &[
    "Ivanov", "Petrov", "Sidorov", "Smirnov", "Kuznetsov", "Popov", "Vasiliev", "Sokolov",
    "Mikhailov", "Novikov", "Fedorova", "Morozova", "Volkova", "Alekseeva", "Lebedeva",
    "Semenova", "Egorova", "Pavlova", "Kozlova", "Stepanova",
];
const SCHOOLS: &[&str] = &[
    "School 1", "School 2", "School 3", "School 4", "School 5", "School 57", "School 179",
    "Second School Lyceum", "Kolmogorov School", "Phystech Lyceum",
];
const ORGANIZERS: &[&str] = &["MCCME", "MIPT", "Yandex", "Sirius", "City Council"];
const SEASONS: &[&str] = &["Spring", "Summer", "Autumn", "Winter"];
const TOPICS: &[&str] = &[
    "Parity", "Pigeonhole principle", "Invariants", "Graphs", "Induction", "Divisibility",
    "Inequalities", "Coloring", "Games", "Triangles",
];
const OLYMPIAD_SUBJECTS: &[&str] = &["Mathematics", "Informatics", "Physics"];
const OLYMPIAD_NAMES: &[&str] = &[
    "All-Russian Olympiad", "Moscow Mathematical Olympiad", "Tournament of Towns",
    "Phystech Olympiad", "Lomonosov Olympiad", "Open Programming Olympiad",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedSummary {
    pub students: usize,
    pub events: usize,
    pub groups: usize,
    pub memberships: usize,
    pub lessons: usize,
    pub problems: usize,
    pub results: usize,
    pub event_participants: usize,
    pub olympiads: usize,
    pub olympiad_results: usize,
    /// Records not created because an equal one already existed.
    pub skipped: usize,
}

/// Map a uniqueness collision to `None` and count it.
fn unless_exists<T>(r: StoreResult<T>, skipped: &mut usize) -> StoreResult<Option<T>> {
    match r {
        Ok(v) => Ok(Some(v)),
        Err(StoreError::AlreadyExists { .. }) => {
            *skipped += 1;
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn pick<'a>(rng: &mut StdRng, items: &[&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

fn pick_enum<T: Copy>(rng: &mut StdRng, items: &[T], fallback: T) -> T {
    items.choose(rng).copied().unwrap_or(fallback)
}

fn random_date(rng: &mut StdRng, from: NaiveDate, span_days: i64) -> NaiveDate {
    from + Duration::days(rng.random_range(0..span_days.max(1)))
}

fn fmt_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

/// Fill the workspace with a reproducible demo data set. Everything runs in
/// one transaction; collisions with existing rows are skipped.
#[instrument(skip(conn))]
pub fn seed_demo(conn: &Connection, seed: u64, student_count: usize) -> StoreResult<SeedSummary> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut sum = SeedSummary::default();
    let tx = conn.unchecked_transaction()?;
    let epoch = NaiveDate::from_ymd_opt(2023, 9, 1).unwrap_or_default();

    let mut students: Vec<Student> = Vec::new();
    for _ in 0..student_count {
        let first = pick(&mut rng, FIRST_NAMES);
        let last = pick(&mut rng, LAST_NAMES);
        let school = rng.random_bool(0.8).then(|| pick(&mut rng, SCHOOLS));
        if let Some(s) = unless_exists(roster::create_student(&tx, first, last, school), &mut sum.skipped)? {
            students.push(s);
        }
    }
    sum.students = students.len();

    let mut groups: Vec<Group> = Vec::new();
    for i in 0..EVENTS {
        let letter = char::from(b'A' + i as u8);
        let name = format!(
            "Event {letter} ({} {})",
            pick(&mut rng, SEASONS),
            rng.random_range(2023..=2024_i32)
        );
        let start = random_date(&mut rng, epoch, 270);
        let end = start + Duration::days(rng.random_range(5..=60));
        let event_type = pick_enum(&mut rng, EventType::ALL, EventType::Other);
        let description = format!("Demo event of type {}", event_type.as_str());
        let (start, end) = (fmt_date(start), fmt_date(end));
        let new = NewEvent {
            name: &name,
            event_type,
            description: Some(description.as_str()),
            start_date: Some(start.as_str()),
            end_date: Some(end.as_str()),
            organizer: Some(pick(&mut rng, ORGANIZERS)),
        };
        let Some(event) = unless_exists(events::create_event(&tx, &new), &mut sum.skipped)? else {
            continue;
        };
        sum.events += 1;

        for n in 1..=rng.random_range(1..=2) {
            let gname = format!("Group {letter}-{n}");
            let gdesc = format!("Group of {}", event.name);
            let g = roster::create_group(
                &tx,
                &gname,
                Some(gdesc.as_str()),
                Some(event.id.as_str()),
                Some(start.as_str()),
                Some(end.as_str()),
            );
            if let Some(g) = unless_exists(g, &mut sum.skipped)? {
                groups.push(g);
            }
        }
        for s in &students {
            if rng.random_bool(EVENT_PROBABILITY) && events::add_participant(&tx, &event.id, &s.id, None)? {
                sum.event_participants += 1;
            }
        }
    }

    for n in 1..=INDEPENDENT_GROUPS {
        let g = roster::create_group(&tx, &format!("Circle {n}"), None, None, None, None);
        if let Some(g) = unless_exists(g, &mut sum.skipped)? {
            groups.push(g);
        }
    }
    sum.groups = groups.len();

    for g in &groups {
        let size = rng.random_range(10..=20_usize).min(students.len());
        let members: Vec<&Student> = students.choose_multiple(&mut rng, size).collect();
        for s in &members {
            if roster::add_student_to_group(&tx, &s.id, &g.id)? {
                sum.memberships += 1;
            }
        }

        for _ in 0..rng.random_range(5..=10) {
            let date = fmt_date(random_date(&mut rng, epoch, 365));
            let topic = pick(&mut rng, TOPICS);
            let area = pick_enum(&mut rng, SubjectArea::ALL, SubjectArea::Other);
            let lesson = lessons::create_lesson(&tx, &g.id, &date, topic, area, None)?;
            sum.lessons += 1;

            for k in 1..=rng.random_range(4..=8) {
                let problem_type = match rng.random_range(0..10) {
                    0 => ProblemType::Bonus,
                    1 => ProblemType::Zero,
                    _ => ProblemType::Regular,
                };
                let p = lessons::create_problem(&tx, &lesson.id, &k.to_string(), problem_type, None)?;
                sum.problems += 1;
                for s in &members {
                    if rng.random_bool(SOLVED_PROBABILITY) && lessons::add_result(&tx, &s.id, &p.id, &lesson.id)? {
                        sum.results += 1;
                    }
                }
            }
        }
    }

    for _ in 0..OLYMPIADS {
        let subject = pick(&mut rng, OLYMPIAD_SUBJECTS);
        let name = pick(&mut rng, OLYMPIAD_NAMES);
        let date = fmt_date(random_date(&mut rng, epoch, 365));
        let level = pick_enum(&mut rng, OlympiadLevel::ALL, OlympiadLevel::Other);
        let organizer = Some(pick(&mut rng, ORGANIZERS));
        let o = olympiads::create_olympiad(&tx, name, &date, level, subject, organizer);
        let Some(o) = unless_exists(o, &mut sum.skipped)? else {
            continue;
        };
        sum.olympiads += 1;

        for s in &students {
            if !rng.random_bool(OLYMPIAD_PROBABILITY) {
                continue;
            }
            let score = (rng.random_range(0.0..100.0_f64) * 10.0).round() / 10.0;
            let new = NewOlympiadResult {
                olympiad_id: &o.id,
                student_id: &s.id,
                award: pick_enum(&mut rng, Award::ALL, Award::Participant),
                score: Some(score),
                details: None,
                document_link: None,
            };
            if unless_exists(olympiads::add_result(&tx, &new), &mut sum.skipped)?.is_some() {
                sum.olympiad_results += 1;
            }
        }
    }

    tx.commit()?;
    info!(?sum, "demo data seeded");
    Ok(sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc;
    use crate::db::open_in_memory;

    #[test]
    fn same_seed_gives_same_shape() {
        let a = seed_demo(&open_in_memory().expect("db"), 7, 30).expect("seed a");
        let b = seed_demo(&open_in_memory().expect("db"), 7, 30).expect("seed b");
        assert_eq!(a, b);
        assert!(a.students > 0 && a.groups >= EVENTS && a.lessons >= 5 * a.groups);
        assert!(a.problems >= 4 * a.lessons);
        assert!(a.results > 0);
    }

    #[test]
    fn reseeding_skips_existing_rows() {
        let conn = open_in_memory().expect("db");
        let first = seed_demo(&conn, DEFAULT_SEED, 20).expect("first");
        let second = seed_demo(&conn, DEFAULT_SEED, 20).expect("second");
        assert_eq!((second.students, second.groups, second.lessons), (0, 0, 0));
        assert!(second.skipped >= first.students);
    }

    #[test]
    fn seeded_ratings_stay_in_bounds() {
        let conn = open_in_memory().expect("db");
        seed_demo(&conn, 3, 25).expect("seed");
        for g in roster::list_groups(&conn, None).expect("groups") {
            let n = roster::list_group_students(&conn, &g.group.id).expect("roster").len() as i64;
            for l in lessons::list_lessons(&conn, &g.group.id).expect("lessons") {
                for r in calc::lesson_ratings(&conn, &l.id).expect("ratings").values() {
                    assert!((1..=n + 1).contains(r));
                }
            }
        }
    }
}
