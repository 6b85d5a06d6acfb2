use chrono::Local;

use crate::models::{ProposedTask, Task, UNSPECIFIED_TIME};

/// Owns the task list and the transient proposal/edit markers.
///
/// Created once at startup from the store; every mutation goes through the
/// methods below and is followed by a store save at the call site. Display
/// ordering is always a lexicographic sort by the `time` string — unpadded
/// hours and the unspecified placeholder sort oddly on purpose; that is the
/// product's documented behavior, not something to fix here.
#[derive(Debug, Default)]
pub struct AppState {
    pub tasks: Vec<Task>,
    pub proposed: Option<Vec<ProposedTask>>,
    pub loading: bool,
    pub editing_id: Option<String>,
}

impl AppState {
    pub fn new(tasks: Vec<Task>) -> Self {
        AppState {
            tasks,
            ..Default::default()
        }
    }

    /// Appends a new incomplete task. An empty trimmed description is a
    /// silent no-op; an empty trimmed time becomes the placeholder.
    /// Returns whether anything changed.
    pub fn add_task(&mut self, time: &str, description: &str) -> bool {
        let description = description.trim();
        if description.is_empty() {
            return false;
        }
        let time = time.trim();
        let time = if time.is_empty() { UNSPECIFIED_TIME } else { time };
        self.tasks.push(Task::new(time, description));
        true
    }

    /// Flips completion for the matching task, stamping or clearing
    /// `completed_at`. Missing ids are benign no-ops.
    pub fn toggle_complete(&mut self, id: &str) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        task.is_completed = !task.is_completed;
        task.completed_at = if task.is_completed {
            Some(current_time_hhmm())
        } else {
            None
        };
        true
    }

    pub fn delete_task(&mut self, id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        self.tasks.len() != before
    }

    pub fn start_edit(&mut self, id: &str) {
        if self.tasks.iter().any(|t| t.id == id) {
            self.editing_id = Some(id.to_string());
        }
    }

    pub fn cancel_edit(&mut self) {
        self.editing_id = None;
    }

    /// Raw overwrite of both fields; empty strings are accepted as-is.
    pub fn save_edit(&mut self, id: &str, time: &str, description: &str) -> bool {
        self.editing_id = None;
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        task.time = time.to_string();
        task.task = description.to_string();
        true
    }

    /// Empties the list. Confirmation is the caller's responsibility; every
    /// surface gates this behind an explicit yes/no prompt.
    pub fn clear_all(&mut self) {
        self.tasks.clear();
    }

    /// Wholesale replace: the proposal becomes the entire task list, each
    /// entry getting a fresh id and incomplete status. Prior tasks are
    /// discarded, not merged.
    pub fn commit_proposal(&mut self, proposal: Vec<ProposedTask>) {
        self.tasks = proposal
            .into_iter()
            .map(|p| Task::new(p.time, p.task))
            .collect();
        self.proposed = None;
    }

    pub fn discard_proposal(&mut self) {
        self.proposed = None;
    }

    /// Display order: stable lexicographic sort by the time string.
    pub fn sorted_tasks(&self) -> Vec<&Task> {
        let mut sorted: Vec<&Task> = self.tasks.iter().collect();
        sorted.sort_by(|a, b| a.time.cmp(&b.time));
        sorted
    }
}

fn current_time_hhmm() -> String {
    Local::now().format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal(entries: &[(&str, &str)]) -> Vec<ProposedTask> {
        entries
            .iter()
            .map(|(time, task)| ProposedTask {
                time: time.to_string(),
                task: task.to_string(),
            })
            .collect()
    }

    #[test]
    fn add_with_empty_description_is_a_no_op() {
        let mut state = AppState::default();
        assert!(!state.add_task("09:00", "   "));
        assert!(state.tasks.is_empty());
    }

    #[test]
    fn add_with_empty_time_uses_placeholder() {
        let mut state = AppState::default();
        assert!(state.add_task("  ", "buy milk"));
        assert_eq!(state.tasks[0].time, UNSPECIFIED_TIME);
        assert_eq!(state.tasks[0].task, "buy milk");
        assert!(!state.tasks[0].is_completed);
    }

    #[test]
    fn toggle_stamps_and_clears_completed_at() {
        let mut state = AppState::default();
        state.add_task("09:00", "standup");
        let id = state.tasks[0].id.clone();

        assert!(state.toggle_complete(&id));
        assert!(state.tasks[0].is_completed);
        let stamp = state.tasks[0].completed_at.clone().expect("stamp set");
        assert!(!stamp.is_empty());

        assert!(state.toggle_complete(&id));
        assert!(!state.tasks[0].is_completed);
        assert!(state.tasks[0].completed_at.is_none());
    }

    #[test]
    fn toggle_of_unknown_id_changes_nothing() {
        let mut state = AppState::default();
        state.add_task("09:00", "standup");
        assert!(!state.toggle_complete("no-such-id"));
        assert!(!state.tasks[0].is_completed);
    }

    #[test]
    fn delete_removes_only_the_matching_task() {
        let mut state = AppState::default();
        state.add_task("09:00", "a");
        state.add_task("10:00", "b");
        let id = state.tasks[0].id.clone();

        assert!(state.delete_task(&id));
        assert_eq!(state.tasks.len(), 1);
        assert_eq!(state.tasks[0].task, "b");
        assert!(!state.delete_task(&id));
    }

    #[test]
    fn edit_overwrites_fields_and_clears_marker() {
        let mut state = AppState::default();
        state.add_task("09:00", "draft");
        let id = state.tasks[0].id.clone();

        state.start_edit(&id);
        assert_eq!(state.editing_id.as_deref(), Some(id.as_str()));

        assert!(state.save_edit(&id, "10:30", "final"));
        assert!(state.editing_id.is_none());
        assert_eq!(state.tasks[0].time, "10:30");
        assert_eq!(state.tasks[0].task, "final");
    }

    #[test]
    fn edit_accepts_empty_strings_raw() {
        let mut state = AppState::default();
        state.add_task("09:00", "draft");
        let id = state.tasks[0].id.clone();

        assert!(state.save_edit(&id, "", ""));
        assert_eq!(state.tasks[0].time, "");
        assert_eq!(state.tasks[0].task, "");
    }

    #[test]
    fn start_edit_of_unknown_id_does_not_set_marker() {
        let mut state = AppState::default();
        state.start_edit("no-such-id");
        assert!(state.editing_id.is_none());
    }

    #[test]
    fn commit_proposal_replaces_wholesale_with_fresh_ids() {
        let mut state = AppState::default();
        state.add_task("08:00", "old entry");

        state.proposed = Some(proposal(&[("09:00", "A"), ("10:00", "B")]));
        let p = state.proposed.clone().unwrap();
        state.commit_proposal(p);

        assert_eq!(state.tasks.len(), 2);
        assert_eq!(state.tasks[0].task, "A");
        assert_eq!(state.tasks[1].task, "B");
        assert!(state.tasks.iter().all(|t| !t.is_completed));
        assert_ne!(state.tasks[0].id, state.tasks[1].id);
        assert!(state.tasks.iter().all(|t| !t.id.is_empty()));
        assert!(state.proposed.is_none());
    }

    #[test]
    fn display_order_is_lexicographic_including_placeholder() {
        let mut state = AppState::default();
        state.add_task("10:00", "late");
        state.add_task("09:00", "early");
        state.add_task(UNSPECIFIED_TIME, "sometime");

        let order: Vec<&str> = state.sorted_tasks().iter().map(|t| t.time.as_str()).collect();
        assert_eq!(order, vec!["09:00", "10:00", UNSPECIFIED_TIME]);
    }

    #[test]
    fn clear_all_empties_the_list() {
        let mut state = AppState::default();
        state.add_task("09:00", "a");
        state.add_task("10:00", "b");
        state.clear_all();
        assert!(state.tasks.is_empty());
    }
}
