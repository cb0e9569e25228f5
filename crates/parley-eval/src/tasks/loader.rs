//! Task loading
//!
//! Resolves task names from configuration into task sources: built-in
//! integration teachers, or `file:<path>` tasks read from YAML/JSON files.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use walkdir::WalkDir;

use super::integration;
use super::source::{ExampleSource, TaskSource};
use super::{DataType, Example};
use crate::error::ConfigError;

/// Prefix for file-backed task names
pub const FILE_TASK_PREFIX: &str = "file:";

/// Loader for evaluation tasks
#[derive(Debug, Clone)]
pub struct TaskLoader {
    /// Split every task is loaded for
    datatype: DataType,

    /// Seed for generated data and training shuffles
    seed: u64,
}

impl TaskLoader {
    /// Create a new task loader
    pub fn new(datatype: DataType, seed: u64) -> Self {
        Self { datatype, seed }
    }

    /// Split tasks are loaded for
    pub fn datatype(&self) -> DataType {
        self.datatype
    }

    /// Split a comma-separated task list into trimmed names
    pub fn task_names(task: &str) -> Vec<String> {
        task.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Load every task of a comma-separated list, rejecting duplicates
    pub fn load_all(&self, task: &str) -> Result<Vec<Box<dyn TaskSource>>, ConfigError> {
        let names = Self::task_names(task);
        if names.is_empty() {
            return Err(ConfigError::invalid_option("task", "no task given"));
        }

        let mut seen = HashSet::new();
        let mut sources = Vec::with_capacity(names.len());
        for name in names {
            if !seen.insert(name.clone()) {
                return Err(ConfigError::DuplicateTask { name });
            }
            sources.push(self.load(&name)?);
        }
        Ok(sources)
    }

    /// Load a single task by name
    pub fn load(&self, name: &str) -> Result<Box<dyn TaskSource>, ConfigError> {
        if let Some(path) = name.strip_prefix(FILE_TASK_PREFIX) {
            let examples = load_path(Path::new(path)).map_err(|e| ConfigError::TaskLoad {
                name: name.to_string(),
                message: format!("{e:#}"),
            })?;
            tracing::debug!(task = name, examples = examples.len(), "Loaded file task");
            let source = ExampleSource::for_datatype(name, examples, self.datatype, self.seed);
            return Ok(Box::new(source));
        }

        integration::source(name, self.datatype, self.seed)
            .map(|source| Box::new(source) as Box<dyn TaskSource>)
            .ok_or_else(|| ConfigError::unknown_task(name))
    }
}

/// Load examples from a task file, or from every task file under a directory
pub fn load_path(path: &Path) -> Result<Vec<Example>> {
    if !path.exists() {
        anyhow::bail!("Path does not exist: {:?}", path);
    }
    if path.is_file() {
        return load_task_file(path);
    }

    let mut files: Vec<_> = WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| is_task_file(p))
        .collect();
    files.sort();

    let mut examples = Vec::new();
    for file in files {
        examples.extend(load_task_file(&file)?);
    }
    Ok(examples)
}

/// Load examples from one YAML or JSON file
fn load_task_file(path: &Path) -> Result<Vec<Example>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read task file: {:?}", path))?;

    if path.extension().is_some_and(|ext| ext == "yaml" || ext == "yml") {
        load_examples_from_yaml(&content)
            .with_context(|| format!("Failed to parse YAML task: {:?}", path))
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON task: {:?}", path))
    }
}

/// Check if a path is a task file
fn is_task_file(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }

    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml") | Some("json")
    )
}

/// Load examples from a YAML string (useful for testing)
pub fn load_examples_from_yaml(yaml: &str) -> Result<Vec<Example>> {
    let examples: Vec<Example> = serde_yaml::from_str(yaml)?;
    Ok(examples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::Next;

    const YAML: &str = r#"
- text: what is two plus two
  labels: ["four", "4"]
- text: say hi
  labels: [hi]
  episode_done: false
- text: unlabeled prompt
"#;

    #[test]
    fn test_load_examples_from_yaml() {
        let examples = load_examples_from_yaml(YAML).unwrap();
        assert_eq!(examples.len(), 3);
        assert_eq!(examples[0].labels, vec!["four", "4"]);
        assert!(!examples[1].episode_done);
        assert!(examples[2].labels.is_empty());
    }

    #[test]
    fn test_task_names_trimmed() {
        assert_eq!(
            TaskLoader::task_names(" a , b,, c "),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn test_load_builtin_and_unknown() {
        let loader = TaskLoader::new(DataType::default(), 1);
        let source = loader.load("integration_tests").unwrap();
        assert_eq!(source.id(), "integration_tests");
        assert_eq!(source.num_examples(), Some(100));

        assert!(matches!(
            loader.load("no_such_task"),
            Err(ConfigError::UnknownTask { .. })
        ));
    }

    #[test]
    fn test_load_all_rejects_duplicates() {
        let loader = TaskLoader::new(DataType::default(), 1);
        let err = loader
            .load_all("integration_tests, integration_tests")
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::DuplicateTask { .. }));
        assert!(loader.load_all(" , ").is_err());
    }

    #[test]
    fn test_load_file_task() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qa.yaml");
        std::fs::write(&path, YAML).unwrap();

        let loader = TaskLoader::new(DataType::default(), 1);
        let name = format!("{FILE_TASK_PREFIX}{}", path.display());
        let mut source = loader.load(&name).unwrap();
        assert_eq!(source.num_examples(), Some(3));
        match source.next_example().unwrap() {
            Next::Example(ex) => assert_eq!(ex.text, "what is two plus two"),
            other => panic!("Expected example, got {other:?}"),
        }
    }

    #[test]
    fn test_load_directory_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), r#"[{"text": "second", "labels": ["2"]}]"#)
            .unwrap();
        std::fs::write(dir.path().join("a.yml"), "- text: first\n  labels: ['1']\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let examples = load_path(dir.path()).unwrap();
        let texts: Vec<_> = examples.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let loader = TaskLoader::new(DataType::default(), 1);
        let err = loader.load("file:/definitely/not/here.yaml").err().unwrap();
        assert!(matches!(err, ConfigError::TaskLoad { .. }));
    }
}
