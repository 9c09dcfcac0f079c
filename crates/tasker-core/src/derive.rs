use std::cmp::Ordering;

use crate::task::{Category, Task};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCount {
    pub count: usize,
    pub completed: usize,
}

impl CategoryCount {
    /// Share of completed tasks, rounded to the nearest whole percent.
    pub fn percentage(&self) -> u32 {
        if self.count == 0 {
            return 0;
        }
        ((self.completed as f64 / self.count as f64) * 100.0).round() as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryStats {
    counts: [CategoryCount; Category::ALL.len()],
}

impl CategoryStats {
    pub fn get(&self, category: Category) -> CategoryCount {
        self.counts[index_of(category)]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, CategoryCount)> + '_ {
        Category::ALL.into_iter().zip(self.counts.iter().copied())
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|c| c.count).sum()
    }
}

fn index_of(category: Category) -> usize {
    match category {
        Category::Business => 0,
        Category::School => 1,
        Category::Personal => 2,
        Category::Work => 3,
        Category::Health => 4,
    }
}

pub fn category_stats(tasks: &[Task]) -> CategoryStats {
    let mut counts = [CategoryCount::default(); Category::ALL.len()];
    for task in tasks {
        let slot = &mut counts[index_of(task.category)];
        slot.count += 1;
        if task.completed {
            slot.completed += 1;
        }
    }
    CategoryStats { counts }
}

/// Incomplete tasks first, each group newest first. Stable for equal keys.
pub fn display_order(tasks: &[Task]) -> Vec<Task> {
    let mut sorted = tasks.to_vec();
    sorted.sort_by(compare_for_display);
    sorted
}

fn compare_for_display(a: &Task, b: &Task) -> Ordering {
    a.completed
        .cmp(&b.completed)
        .then_with(|| b.created_at.cmp(&a.created_at))
}
