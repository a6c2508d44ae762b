use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Closed vocabularies are stored as lowercase text and travel over IPC the
/// same way, so one table of names drives both directions.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(
                        "unknown {}: {} (expected one of: {})",
                        stringify!($name),
                        other,
                        [$($text),+].join(", ")
                    )),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let s = value.as_str()?;
                s.parse().map_err(|e: String| FromSqlError::Other(e.into()))
            }
        }
    };
}

text_enum!(ProblemType {
    Regular => "regular",
    Bonus => "bonus",
    Zero => "zero",
});

text_enum!(SubjectArea {
    Algebra => "algebra",
    Geometry => "geometry",
    NumberTheory => "number_theory",
    Combinatorics => "combinatorics",
    Logic => "logic",
    Other => "other",
});

text_enum!(EventType {
    Gathering => "gathering",
    Circle => "circle",
    SummerSchool => "summer_school",
    TournamentSeries => "tournament_series",
    Other => "other",
});

text_enum!(OlympiadLevel {
    School => "school",
    Municipal => "municipal",
    Regional => "regional",
    National => "national",
    International => "international",
    Other => "other",
});

text_enum!(Award {
    Winner => "winner",
    Prize1 => "prize_1",
    Prize2 => "prize_2",
    Prize3 => "prize_3",
    HonorableMention => "honorable_mention",
    Participant => "participant",
    Diploma1 => "diploma_1",
    Diploma2 => "diploma_2",
    Diploma3 => "diploma_3",
    None => "none",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub school: Option<String>,
    pub registered_at: String,
}

impl Student {
    /// Row key used by the conduit: "Last First".
    pub fn display_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub name: String,
    pub event_type: EventType,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub organizer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventParticipant {
    pub student: Student,
    pub role: Option<String>,
    pub registered_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub event_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupOverview {
    #[serde(flatten)]
    pub group: Group,
    pub event_name: Option<String>,
    pub student_count: i64,
    pub lesson_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub group_id: String,
    pub date: String,
    pub topic: String,
    pub subject_area: SubjectArea,
    pub sheet_link: Option<String>,
}

/// A lesson column: one problem of the lesson's sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: String,
    pub lesson_id: String,
    pub label: String,
    pub problem_type: ProblemType,
    pub display_order: i64,
    pub discussed: bool,
}

/// "This student solved this problem" inside the problem's lesson.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveRecord {
    pub student_id: String,
    pub problem_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Olympiad {
    pub id: String,
    pub name: String,
    pub date: String,
    pub level: OlympiadLevel,
    pub subject: String,
    pub organizer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OlympiadResult {
    pub id: String,
    pub olympiad_id: String,
    pub student_id: String,
    pub student_name: String,
    pub award: Award,
    pub score: Option<f64>,
    pub details: Option<String>,
    pub document_link: Option<String>,
    pub submitted_at: String,
}
