//! Catalog browsing commands

use crate::catalog::{Catalog, Chapter, CourseModule, Exercise};
use crate::config::Config;
use crate::error::Result;

/// Load the catalog file named in the configuration
pub fn load_catalog(config: &Config) -> Result<Catalog> {
    Catalog::load(&config.catalog_path())
}

/// Chapters, optionally limited to one module, in reading order
pub fn cmd_list_chapters<'a>(catalog: &'a Catalog, module: Option<&str>) -> Result<Vec<&'a Chapter>> {
    match module {
        Some(module) => catalog.chapters_in_module(module),
        None => {
            let mut chapters: Vec<&Chapter> = catalog.chapters().iter().collect();
            let week = |c: &Chapter| catalog.module(&c.module_id).map(|m| m.week_number).unwrap_or(0);
            chapters.sort_by_key(|c| (week(c), c.chapter_number));
            Ok(chapters)
        }
    }
}

pub fn cmd_list_modules(catalog: &Catalog) -> Vec<&CourseModule> {
    catalog.modules()
}

pub fn cmd_list_exercises<'a>(catalog: &'a Catalog, chapter: Option<&str>) -> Result<Vec<&'a Exercise>> {
    match chapter {
        Some(chapter) => catalog.exercises_for_chapter(chapter),
        None => Ok(catalog.exercises().iter().collect()),
    }
}

pub fn print_modules(modules: &[&CourseModule]) {
    println!("\n🗂  Modules\n");
    if modules.is_empty() {
        println!("The catalog has no modules.");
        return;
    }

    for module in modules {
        let inactive = if module.is_active { "" } else { " (inactive)" };
        println!("• Week {}: {}{}", module.week_number, module.title, inactive);
        println!("  ID: {} / {}", module.id, module.slug);
        if !module.description.is_empty() {
            println!("  {}", module.description);
        }
        println!();
    }
}

pub fn print_chapters(chapters: &[&Chapter]) {
    println!("\n📖 Chapters\n");
    if chapters.is_empty() {
        println!("No chapters found.");
        return;
    }

    for chapter in chapters {
        let draft = if chapter.is_published { "" } else { " (draft)" };
        println!("• {}. {}{}", chapter.chapter_number, chapter.title, draft);
        println!("  ID: {} / {}", chapter.id, chapter.slug);
        println!(
            "  Module: {}, {} words, {}",
            chapter.module_id,
            chapter.word_count(),
            chapter.difficulty_level
        );
        println!();
    }
}

pub fn print_exercises(exercises: &[&Exercise]) {
    println!("\n✏️  Exercises\n");
    if exercises.is_empty() {
        println!("No exercises found.");
        return;
    }

    for exercise in exercises {
        println!(
            "• {} [{}, {}]",
            exercise.title, exercise.exercise_type, exercise.difficulty_level
        );
        println!("  ID: {} (chapter {})", exercise.id, exercise.chapter_id);
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
        [[modules]]
        id = "m2"
        title = "Energy"
        slug = "energy"
        week_number = 2

        [[modules]]
        id = "m1"
        title = "Motion"
        slug = "motion"
        week_number = 1

        [[chapters]]
        id = "c3"
        title = "Work"
        slug = "work"
        module_id = "m2"
        chapter_number = 1

        [[chapters]]
        id = "c2"
        title = "Acceleration"
        slug = "acceleration"
        module_id = "m1"
        chapter_number = 2

        [[chapters]]
        id = "c1"
        title = "Velocity"
        slug = "velocity"
        module_id = "m1"
        chapter_number = 1

        [[exercises]]
        id = "e1"
        title = "Speed"
        chapter_id = "c1"
        module_id = "m1"
    "#;

    #[test]
    fn test_chapters_follow_course_order() {
        let catalog = Catalog::from_toml(CATALOG).unwrap();

        let ids: Vec<&str> = cmd_list_chapters(&catalog, None)
            .unwrap()
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);

        let energy = cmd_list_chapters(&catalog, Some("energy")).unwrap();
        assert_eq!(energy.len(), 1);
        assert_eq!(cmd_list_modules(&catalog)[0].id, "m1");
    }

    #[test]
    fn test_exercises_by_chapter() {
        let catalog = Catalog::from_toml(CATALOG).unwrap();
        assert_eq!(cmd_list_exercises(&catalog, None).unwrap().len(), 1);
        assert_eq!(cmd_list_exercises(&catalog, Some("velocity")).unwrap().len(), 1);
        assert!(cmd_list_exercises(&catalog, Some("c3")).unwrap().is_empty());
        assert!(cmd_list_exercises(&catalog, Some("nope")).is_err());
    }
}
