//! Stage planning
//!
//! Tasks run as a sequential chain. A run of consecutive tasks marked
//! `independent` becomes one branch stage: every branch gets the same input
//! and the chained context is left as it was before the stage.

use crate::ast::TaskDescriptor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// One task whose output replaces the current context
    Chain(usize),
    /// Independent tasks run concurrently on the same input
    Branches(Vec<usize>),
}

impl Stage {
    /// Index of the first task in the stage
    pub fn first_index(&self) -> usize {
        match self {
            Self::Chain(i) => *i,
            Self::Branches(indices) => indices.first().copied().unwrap_or_default(),
        }
    }

    pub fn indices(&self) -> &[usize] {
        match self {
            Self::Chain(i) => std::slice::from_ref(i),
            Self::Branches(indices) => indices,
        }
    }
}

pub fn plan_stages(tasks: &[TaskDescriptor]) -> Vec<Stage> {
    let mut stages = Vec::new();
    let mut branches: Vec<usize> = Vec::new();

    for (i, task) in tasks.iter().enumerate() {
        if task.independent {
            branches.push(i);
            continue;
        }
        if !branches.is_empty() {
            stages.push(Stage::Branches(std::mem::take(&mut branches)));
        }
        stages.push(Stage::Chain(i));
    }
    if !branches.is_empty() {
        stages.push(Stage::Branches(branches));
    }

    stages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tasks(independent: &[bool]) -> Vec<TaskDescriptor> {
        independent
            .iter()
            .map(|&ind| {
                let t = TaskDescriptor::new("sort");
                if ind {
                    t.independent()
                } else {
                    t
                }
            })
            .collect()
    }

    #[test]
    fn all_sequential() {
        assert_eq!(
            plan_stages(&tasks(&[false, false])),
            vec![Stage::Chain(0), Stage::Chain(1)]
        );
    }

    #[test]
    fn consecutive_independent_tasks_group() {
        assert_eq!(
            plan_stages(&tasks(&[false, true, true, false, true])),
            vec![
                Stage::Chain(0),
                Stage::Branches(vec![1, 2]),
                Stage::Chain(3),
                Stage::Branches(vec![4]),
            ]
        );
    }

    #[test]
    fn every_task_in_exactly_one_stage() {
        let plan = plan_stages(&tasks(&[true, false, true, true, false, false, true]));
        let flat: Vec<usize> = plan.iter().flat_map(|s| s.indices().to_vec()).collect();
        assert_eq!(flat, (0..7).collect::<Vec<_>>());
        assert_eq!(plan[0].first_index(), 0);
    }
}
