//! Course catalog: modules, chapters and exercises
//!
//! The catalog is a read-only TOML file:
//!
//! ```toml
//! [[modules]]
//! id = "m1"
//! title = "Foundations"
//! slug = "foundations"
//! week_number = 1
//!
//! [[chapters]]
//! id = "c1"
//! title = "Kinematics"
//! slug = "kinematics"
//! module_id = "m1"
//! chapter_number = 1
//! content = "..."
//! ```

use crate::error::{Error, Result};
use crate::store::SourceType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl std::fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DifficultyLevel::Beginner => write!(f, "beginner"),
            DifficultyLevel::Intermediate => write!(f, "intermediate"),
            DifficultyLevel::Advanced => write!(f, "advanced"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseType {
    MultipleChoice,
    #[default]
    Coding,
    Simulation,
    Essay,
}

impl std::fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExerciseType::MultipleChoice => write!(f, "multiple_choice"),
            ExerciseType::Coding => write!(f, "coding"),
            ExerciseType::Simulation => write!(f, "simulation"),
            ExerciseType::Essay => write!(f, "essay"),
        }
    }
}

/// A week-long learning unit grouping chapters and exercises
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseModule {
    pub id: String,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub week_number: u32,
    #[serde(default)]
    pub learning_goals: Vec<String>,
    /// Ids of modules to complete first
    #[serde(default)]
    pub prerequisites: Vec<String>,
    /// Hours
    #[serde(default)]
    pub estimated_duration: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl CourseModule {
    /// Index source id; prefixed so ids shared across kinds stay distinct
    pub fn source_id(&self) -> String {
        format!("module:{}", self.id)
    }

    pub fn indexable_text(&self) -> String {
        let mut text = format!("{}\n\n{}", self.title, self.description);
        for goal in &self.learning_goals {
            text.push_str("\n- ");
            text.push_str(goal);
        }
        text
    }
}

/// A textbook chapter; `content` is Markdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub content: String,
    pub module_id: String,
    /// Ordering within the module
    pub chapter_number: u32,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    /// Minutes
    #[serde(default)]
    pub estimated_reading_time: u32,
    #[serde(default)]
    pub difficulty_level: DifficultyLevel,
    #[serde(default)]
    pub is_published: bool,
}

impl Chapter {
    pub fn source_id(&self) -> String {
        format!("chapter:{}", self.id)
    }

    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }

    pub fn indexable_text(&self) -> String {
        format!("{}\n\n{}", self.title, self.content)
    }
}

/// An exercise attached to a chapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub chapter_id: String,
    pub module_id: String,
    #[serde(default)]
    pub exercise_type: ExerciseType,
    #[serde(default)]
    pub difficulty_level: DifficultyLevel,
    /// Minutes
    #[serde(default)]
    pub estimated_completion_time: u32,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Exercise {
    pub fn source_id(&self) -> String {
        format!("exercise:{}", self.id)
    }

    /// Text to index; the solution stays out of the index
    pub fn indexable_text(&self) -> String {
        format!("{}\n\n{}\n\n{}", self.title, self.description, self.content)
    }
}

fn default_true() -> bool {
    true
}

/// Something in the catalog that can be ingested
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogDocument {
    pub source_id: String,
    pub source_type: SourceType,
    pub title: String,
    pub content: String,
}

/// The whole course catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub modules: Vec<CourseModule>,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

impl Catalog {
    /// Load and validate a catalog file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading catalog from {:?}", path);
        if !path.exists() {
            return Err(Error::Config(format!(
                "Catalog file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let catalog: Catalog = toml::from_str(content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Ids must be unique per kind and every reference must resolve
    pub fn validate(&self) -> Result<()> {
        let module_ids = unique_ids("module", self.modules.iter().map(|m| m.id.as_str()))?;
        let chapter_ids = unique_ids("chapter", self.chapters.iter().map(|c| c.id.as_str()))?;
        unique_ids("exercise", self.exercises.iter().map(|e| e.id.as_str()))?;

        for chapter in &self.chapters {
            if !module_ids.contains(chapter.module_id.as_str()) {
                return Err(Error::Config(format!(
                    "Chapter '{}' references unknown module '{}'",
                    chapter.id, chapter.module_id
                )));
            }
        }

        for exercise in &self.exercises {
            if !chapter_ids.contains(exercise.chapter_id.as_str()) {
                return Err(Error::Config(format!(
                    "Exercise '{}' references unknown chapter '{}'",
                    exercise.id, exercise.chapter_id
                )));
            }
            if !module_ids.contains(exercise.module_id.as_str()) {
                return Err(Error::Config(format!(
                    "Exercise '{}' references unknown module '{}'",
                    exercise.id, exercise.module_id
                )));
            }
        }

        Ok(())
    }

    /// Modules ordered by week
    pub fn modules(&self) -> Vec<&CourseModule> {
        let mut modules: Vec<&CourseModule> = self.modules.iter().collect();
        modules.sort_by_key(|m| m.week_number);
        modules
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn exercises(&self) -> &[Exercise] {
        &self.exercises
    }

    /// Look a module up by id or slug
    pub fn module(&self, key: &str) -> Result<&CourseModule> {
        self.modules
            .iter()
            .find(|m| m.id == key || m.slug == key)
            .ok_or_else(|| Error::CatalogEntryNotFound(format!("module '{}'", key)))
    }

    /// Look a chapter up by id or slug
    pub fn chapter(&self, key: &str) -> Result<&Chapter> {
        self.chapters
            .iter()
            .find(|c| c.id == key || c.slug == key)
            .ok_or_else(|| Error::CatalogEntryNotFound(format!("chapter '{}'", key)))
    }

    pub fn exercise(&self, id: &str) -> Result<&Exercise> {
        self.exercises
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| Error::CatalogEntryNotFound(format!("exercise '{}'", id)))
    }

    /// Chapters of a module (id or slug) in reading order
    pub fn chapters_in_module(&self, module: &str) -> Result<Vec<&Chapter>> {
        let module = self.module(module)?;
        let mut chapters: Vec<&Chapter> = self
            .chapters
            .iter()
            .filter(|c| c.module_id == module.id)
            .collect();
        chapters.sort_by_key(|c| c.chapter_number);
        Ok(chapters)
    }

    pub fn exercises_for_chapter(&self, chapter: &str) -> Result<Vec<&Exercise>> {
        let chapter = self.chapter(chapter)?;
        Ok(self
            .exercises
            .iter()
            .filter(|e| e.chapter_id == chapter.id)
            .collect())
    }

    /// Everything that belongs in the index: active modules, published
    /// chapters and active exercises
    pub fn documents(&self) -> Vec<CatalogDocument> {
        let modules = self.modules().into_iter().filter(|m| m.is_active).map(|m| {
            CatalogDocument {
                source_id: m.source_id(),
                source_type: SourceType::Module,
                title: m.title.clone(),
                content: m.indexable_text(),
            }
        });
        let chapters = self.chapters.iter().filter(|c| c.is_published).map(|c| {
            CatalogDocument {
                source_id: c.source_id(),
                source_type: SourceType::Chapter,
                title: c.title.clone(),
                content: c.indexable_text(),
            }
        });
        let exercises = self.exercises.iter().filter(|e| e.is_active).map(|e| {
            CatalogDocument {
                source_id: e.source_id(),
                source_type: SourceType::Exercise,
                title: e.title.clone(),
                content: e.indexable_text(),
            }
        });

        modules.chain(chapters).chain(exercises).collect()
    }
}

fn unique_ids<'a>(kind: &str, ids: impl Iterator<Item = &'a str>) -> Result<HashSet<&'a str>> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(Error::Config(format!("Duplicate {} id '{}'", kind, id)));
        }
    }
    Ok(seen)
}
