use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered task priority, stored as 1 (lowest) through 4 (highest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Priority {
    Low = 1,
    Medium = 2,
    High = 3,
    Urgent = 4,
}

impl Priority {
    pub fn level(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Priority::Low),
            2 => Ok(Priority::Medium),
            3 => Ok(Priority::High),
            4 => Ok(Priority::Urgent),
            other => Err(format!("priority must be between 1 and 4, got {}", other)),
        }
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.level()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatType {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

impl RepeatType {
    pub fn as_str(self) -> &'static str {
        match self {
            RepeatType::None => "none",
            RepeatType::Daily => "daily",
            RepeatType::Weekly => "weekly",
            RepeatType::Monthly => "monthly",
        }
    }
}

impl fmt::Display for RepeatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepeatType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(RepeatType::None),
            "daily" => Ok(RepeatType::Daily),
            "weekly" => Ok(RepeatType::Weekly),
            "monthly" => Ok(RepeatType::Monthly),
            other => Err(format!("unknown repeat type: {}", other)),
        }
    }
}

/// Interval or anchor for a repeating task; meaning depends on the repeat type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepeatValue {
    Number(i64),
    Text(String),
}

/// Canonical task row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>, // ISO 8601: YYYY-MM-DD
    #[serde(default)]
    pub due_time: Option<String>,
    #[serde(default)]
    pub group: Option<String>,    // Category.name
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub repeat_type: RepeatType,
    #[serde(default)]
    pub repeat_value: Option<RepeatValue>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub archived: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub completed: bool,
}

/// Missing and `null` flags both read as false
fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

impl Task {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            note: None,
            due_date: None,
            due_time: None,
            group: None,
            priority: None,
            repeat_type: RepeatType::None,
            repeat_value: None,
            archived: false,
            completed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub archived: bool,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: None,
            archived: false,
        }
    }
}

/// Denormalized copy of a canonical task held by one of the derived views.
///
/// `id` is local to the view table; `task_id` points back at the canonical
/// row and is unique within each view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewEntry {
    pub id: Option<i64>,
    pub task_id: i64,
    pub title: String,
    pub note: Option<String>,
    pub due_date: Option<String>,
    pub due_time: Option<String>,
    pub priority: Option<Priority>,
    pub group: Option<String>,
    pub completed: bool,
}

impl ViewEntry {
    /// Copy the projected fields of a stored task into a new, unsaved entry
    pub fn project(task_id: i64, task: &Task) -> Self {
        Self {
            id: None,
            task_id,
            title: task.title.clone(),
            note: task.note.clone(),
            due_date: task.due_date.clone(),
            due_time: task.due_time.clone(),
            priority: task.priority,
            group: task.group.clone(),
            completed: task.completed,
        }
    }

    /// True when every copied field matches, ignoring the table-local id
    pub fn same_projection(&self, other: &ViewEntry) -> bool {
        self.task_id == other.task_id
            && self.title == other.title
            && self.note == other.note
            && self.due_date == other.due_date
            && self.due_time == other.due_time
            && self.priority == other.priority
            && self.group == other.group
            && self.completed == other.completed
    }
}
