// Status and category filtering over the task list

use crate::models::Task;
use eyre::{Result, eyre};
use std::fmt;
use std::str::FromStr;

/// Completion-state filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl StatusFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => !task.completed,
            StatusFilter::Completed => task.completed,
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => write!(f, "all"),
            StatusFilter::Active => write!(f, "active"),
            StatusFilter::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "active" => Ok(StatusFilter::Active),
            "completed" => Ok(StatusFilter::Completed),
            other => Err(eyre!(
                "Invalid status filter: {} (expected all, active or completed)",
                other
            )),
        }
    }
}

/// Category filter: everything, or one exact label
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl CategoryFilter {
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(category) => task.category == *category,
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => write!(f, "all"),
            CategoryFilter::Only(category) => write!(f, "{}", category),
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(eyre!("Category filter cannot be empty"));
        }
        if s == "all" {
            Ok(CategoryFilter::All)
        } else {
            Ok(CategoryFilter::Only(s.to_string()))
        }
    }
}

impl From<&str> for CategoryFilter {
    fn from(s: &str) -> Self {
        if s == "all" {
            CategoryFilter::All
        } else {
            CategoryFilter::Only(s.to_string())
        }
    }
}

/// Combined view selection: status AND category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub status: StatusFilter,
    pub category: CategoryFilter,
}

impl Filter {
    pub fn new(status: StatusFilter, category: impl Into<CategoryFilter>) -> Self {
        Self {
            status,
            category: category.into(),
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.category.matches(task) && self.status.matches(task)
    }

    /// Text shown in place of the list when nothing matches
    pub fn empty_message(&self) -> String {
        match (&self.status, &self.category) {
            (StatusFilter::All, CategoryFilter::All) => "No tasks yet. Add a task to get started!".to_string(),
            (StatusFilter::Active, _) => "No active tasks. Great job!".to_string(),
            (StatusFilter::Completed, _) => "No completed tasks yet.".to_string(),
            (StatusFilter::All, CategoryFilter::Only(category)) => {
                format!("No tasks in {} category.", category)
            }
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status={} category={}", self.status, self.category)
    }
}
