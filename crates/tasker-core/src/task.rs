use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Category {
    #[default]
    Business,
    School,
    Personal,
    Work,
    Health,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Business,
        Category::School,
        Category::Personal,
        Category::Work,
        Category::Health,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Business => "Business",
            Category::School => "School",
            Category::Personal => "Personal",
            Category::Work => "Work",
            Category::Health => "Health",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .into_iter()
            .find(|cat| cat.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let valid = Category::ALL.map(Category::label).join(", ");
                anyhow!("unknown category '{wanted}', expected one of: {valid}")
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,

    pub title: String,

    pub category: Category,

    pub completed: bool,

    /// Milliseconds since the Unix epoch.
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

impl Task {
    pub fn new(id: String, title: String, category: Category, created_at: i64) -> Self {
        Self {
            id,
            title,
            category,
            completed: false,
            created_at,
        }
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.created_at)
    }
}

/// Returns an id that no task in `existing` already uses.
pub fn generate_id(existing: &[Task]) -> String {
    loop {
        let candidate = Uuid::new_v4().simple().to_string();
        if !existing.iter().any(|t| t.id == candidate) {
            return candidate;
        }
    }
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Sample list used when nothing usable is persisted yet.
pub fn seed_tasks(now: i64) -> Vec<Task> {
    let seed = [
        ("1", "Wake up by 6am", Category::Personal, true),
        ("2", "Check emails", Category::Work, false),
        ("3", "Lunch with team", Category::Business, false),
        ("4", "Meditation", Category::Health, false),
    ];

    seed.into_iter()
        .map(|(id, title, category, completed)| Task {
            completed,
            ..Task::new(id.to_string(), title.to_string(), category, now)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!("work".parse::<Category>().unwrap(), Category::Work);
        assert_eq!(" HEALTH ".parse::<Category>().unwrap(), Category::Health);
        assert_eq!("School".parse::<Category>().unwrap(), Category::School);

        let err = "Chores".parse::<Category>().unwrap_err();
        assert!(err.to_string().contains("Business, School, Personal, Work, Health"));
    }

    #[test]
    fn task_serializes_with_camel_case_timestamp() {
        let task = Task::new("abc".to_string(), "Read".to_string(), Category::School, 42);
        let value = serde_json::to_value(&task).unwrap();

        assert_eq!(value["id"], "abc");
        assert_eq!(value["category"], "School");
        assert_eq!(value["completed"], false);
        assert_eq!(value["createdAt"], 42);
    }

    #[test]
    fn unknown_category_fails_to_deserialize() {
        let json = r#"{"id":"1","title":"x","category":"Chores","completed":false,"createdAt":1}"#;
        assert!(serde_json::from_str::<Task>(json).is_err());
    }

    #[test]
    fn seed_has_four_tasks_with_distinct_ids() {
        let seed = seed_tasks(1_000);
        assert_eq!(seed.len(), 4);
        assert!(seed[0].completed);
        assert!(seed[1..].iter().all(|t| !t.completed));
        assert!(seed.iter().all(|t| t.created_at == 1_000));

        let ids: Vec<_> = seed.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn generated_ids_avoid_existing() {
        let seed = seed_tasks(0);
        let id = generate_id(&seed);
        assert_eq!(id.len(), 32);
        assert!(seed.iter().all(|t| t.id != id));
    }
}
