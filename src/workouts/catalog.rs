use crate::common::{MoodFitError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const LONG_KEYWORDS: [&str; 4] = ["sprint", "hiit", "battle rope", "rowing"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutItem {
    pub name: String,
    /// Sets/reps label, e.g. "3x12" or "30 sec".
    pub kind: String,
    pub link: String,
    /// Dataset's own duration column, shown as-is.
    pub raw_duration: String,
    pub duration_minutes: u32,
    pub mood: String,
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    #[serde(rename = "Exercise")]
    exercise: String,
    #[serde(rename = "Sets", default)]
    sets: String,
    #[serde(rename = "Video_Link", default)]
    video_link: String,
    #[serde(rename = "Duration", default)]
    duration: String,
    #[serde(rename = "Mood", default)]
    mood: String,
}

impl From<CatalogRow> for WorkoutItem {
    fn from(row: CatalogRow) -> Self {
        let duration_minutes = classify_duration(&row.exercise, &row.sets);
        WorkoutItem {
            name: row.exercise,
            kind: row.sets,
            link: row.video_link,
            raw_duration: row.duration,
            duration_minutes,
            mood: normalize_mood(&row.mood),
        }
    }
}

/// Minutes budgeted for an exercise, from its name and sets label.
/// Name keywords are matched case-insensitively, the `sec` marker in the sets
/// label is not.
pub fn classify_duration(name: &str, kind: &str) -> u32 {
    let name = name.to_lowercase();
    if LONG_KEYWORDS.iter().any(|k| name.contains(k)) {
        5
    } else if name.contains("plank") || kind.contains("sec") {
        2
    } else {
        3
    }
}

/// Strip list/quote noise such as `['Happy']` and lowercase.
pub fn normalize_mood(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '[' | ']' | '\''))
        .collect::<String>()
        .trim()
        .to_lowercase()
}

/// The read-only exercise list.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: Vec<WorkoutItem>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MoodFitError::DatasetMissing(path.to_path_buf()));
        }

        let catalog = Self::from_reader(File::open(path)?)?;
        tracing::debug!("Loaded {} workouts from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let items = csv
            .deserialize::<CatalogRow>()
            .map(|row| row.map(WorkoutItem::from))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self { items })
    }

    pub fn from_items(items: Vec<WorkoutItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[WorkoutItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
