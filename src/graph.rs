//! Dependency graph over tasks, derived from their input and output files.

use crate::context::Task;
use crate::error::{BuildError, Result};
use std::collections::HashMap;
use std::path::PathBuf;

/// Tasks ordered by file dependencies
///
/// Task B depends on task A iff one of B's inputs is one of A's outputs.
pub struct TaskGraph<'t> {
    tasks: Vec<&'t dyn Task>,
    dependents: Vec<Vec<usize>>,
    in_degree: Vec<usize>,
}

impl<'t> TaskGraph<'t> {
    /// Build the graph.
    ///
    /// # Errors
    /// `BuildError::Graph` if two tasks declare the same output.
    pub fn new(tasks: Vec<&'t dyn Task>) -> Result<Self> {
        let mut producers: HashMap<PathBuf, usize> = HashMap::new();
        for (index, task) in tasks.iter().enumerate() {
            for output in task.outputs() {
                if let Some(other) = producers.insert(output.clone(), index) {
                    return Err(BuildError::graph(format!(
                        "'{}' is an output of both '{}' and '{}'",
                        output.display(),
                        tasks[other].name(),
                        task.name()
                    )));
                }
            }
        }

        let mut dependents = vec![Vec::new(); tasks.len()];
        let mut in_degree = vec![0; tasks.len()];
        for (index, task) in tasks.iter().enumerate() {
            let mut producers_of_inputs: Vec<usize> = task
                .inputs()
                .iter()
                .filter_map(|input| producers.get(input).copied())
                .collect();
            producers_of_inputs.sort_unstable();
            producers_of_inputs.dedup();

            for producer in producers_of_inputs {
                dependents[producer].push(index);
                in_degree[index] += 1;
            }
        }

        Ok(TaskGraph {
            tasks,
            dependents,
            in_degree,
        })
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Partition the tasks into levels; every task only depends on tasks of
    /// earlier levels. Order within a level follows insertion order.
    ///
    /// # Errors
    /// `BuildError::Graph` if the dependencies contain a cycle.
    pub fn levels(&self) -> Result<Vec<Vec<&'t dyn Task>>> {
        let mut in_degree = self.in_degree.clone();
        let mut current: Vec<usize> = (0..self.tasks.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();
        let mut levels = Vec::new();
        let mut placed = 0;

        while !current.is_empty() {
            let mut next = Vec::new();
            for &index in &current {
                for &dependent in &self.dependents[index] {
                    in_degree[dependent] -= 1;
                    if in_degree[dependent] == 0 {
                        next.push(dependent);
                    }
                }
            }
            placed += current.len();
            next.sort_unstable();
            levels.push(current.iter().map(|&i| self.tasks[i]).collect());
            current = next;
        }

        if placed != self.tasks.len() {
            let stuck: Vec<String> = (0..self.tasks.len())
                .filter(|&i| in_degree[i] > 0)
                .map(|i| self.tasks[i].name())
                .collect();
            return Err(BuildError::graph(format!(
                "dependency cycle between: {}",
                stuck.join(", ")
            )));
        }

        Ok(levels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{RedoContext, RedoOutcome};

    struct FakeTask {
        name: &'static str,
        inputs: Vec<&'static str>,
        outputs: Vec<&'static str>,
    }

    impl Task for FakeTask {
        fn name(&self) -> String {
            self.name.to_string()
        }
        fn inputs(&self) -> Vec<PathBuf> {
            self.inputs.iter().map(PathBuf::from).collect()
        }
        fn outputs(&self) -> Vec<PathBuf> {
            self.outputs.iter().map(PathBuf::from).collect()
        }
        fn fingerprint(&self) -> String {
            String::new()
        }
        fn redo(&self, _ctx: &RedoContext<'_>) -> Result<RedoOutcome> {
            Ok(RedoOutcome::default())
        }
    }

    fn task(name: &'static str, inputs: &[&'static str], outputs: &[&'static str]) -> FakeTask {
        FakeTask {
            name,
            inputs: inputs.to_vec(),
            outputs: outputs.to_vec(),
        }
    }

    fn names(levels: &[Vec<&dyn Task>]) -> Vec<Vec<String>> {
        levels
            .iter()
            .map(|level| level.iter().map(|t| t.name()).collect())
            .collect()
    }

    #[test]
    fn test_levels_follow_file_dependencies() {
        let doc = task("doc", &["a.pdf", "v.tex", "dbor.tex"], &["dbor.pdf"]);
        let a = task("a", &["a.svg"], &["a.pdf"]);
        let b = task("b", &["b.svg"], &["b.pdf"]);
        let v = task("v", &[], &["v.tex"]);

        let tasks: Vec<&dyn Task> = vec![&doc as &dyn Task, &a, &b, &v];
        let graph = TaskGraph::new(tasks).unwrap();
        let levels = graph.levels().unwrap();

        assert_eq!(names(&levels), vec![vec!["a", "b", "v"], vec!["doc"]]);
    }

    #[test]
    fn test_duplicate_output_rejected() {
        let a = task("a", &[], &["x.pdf"]);
        let b = task("b", &[], &["x.pdf"]);
        let tasks: Vec<&dyn Task> = vec![&a as &dyn Task, &b];
        let err = TaskGraph::new(tasks).err().unwrap();
        assert!(err.to_string().contains("output of both 'a' and 'b'"));
    }

    #[test]
    fn test_cycle_rejected() {
        let a = task("a", &["y"], &["x"]);
        let b = task("b", &["x"], &["y"]);
        let c = task("c", &[], &["z"]);
        let tasks: Vec<&dyn Task> = vec![&a as &dyn Task, &b, &c];
        let graph = TaskGraph::new(tasks).unwrap();
        let err = graph.levels().err().unwrap();
        assert!(err.to_string().contains("cycle"));
        assert!(err.to_string().contains("a, b"));
    }

    #[test]
    fn test_empty_graph() {
        let graph = TaskGraph::new(Vec::new()).unwrap();
        assert!(graph.is_empty());
        assert!(graph.levels().unwrap().is_empty());
    }
}
