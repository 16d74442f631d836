use ion_types::{BranchKey, RepositoryKey};

/// What merging a received branch did to the local branch of the same key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BranchUpdate {
    /// The branch was new here and was taken as received.
    Added,
    /// Both sides already had the same heads.
    Unchanged,
    /// The received heads are already in local history.
    LocalAhead,
    /// Local heads were in the received history and were replaced.
    FastForward,
    /// Neither side descends from the other; both heads are kept for a
    /// later merge.
    Diverged,
}

/// Outcome of taking in one repository container (pull, or the receiving
/// end of a push).
#[derive(Clone, Debug)]
pub struct ReceiveResult {
    pub repository_key: RepositoryKey,
    /// The repository was not known here before.
    pub created: bool,
    pub elements_received: usize,
    pub branches: Vec<(BranchKey, BranchUpdate)>,
    pub bytes_transferred: u64,
}

impl ReceiveResult {
    pub fn update_of(&self, branch: &BranchKey) -> Option<BranchUpdate> {
        self.branches
            .iter()
            .find(|(key, _)| key == branch)
            .map(|(_, update)| *update)
    }
}

#[derive(Clone, Debug, Default)]
pub struct PushResult {
    pub repositories: usize,
    pub elements_sent: usize,
    pub bytes_transferred: u64,
}

#[derive(Clone, Debug, Default)]
pub struct FetchResult {
    pub elements_received: usize,
    pub bytes_transferred: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_of_finds_branch() {
        let master = BranchKey::generate();
        let result = ReceiveResult {
            repository_key: RepositoryKey::generate(),
            created: false,
            elements_received: 0,
            branches: vec![(master.clone(), BranchUpdate::FastForward)],
            bytes_transferred: 0,
        };
        assert_eq!(result.update_of(&master), Some(BranchUpdate::FastForward));
        assert_eq!(result.update_of(&BranchKey::generate()), None);
    }

    #[test]
    fn transfer_result_defaults() {
        let push = PushResult::default();
        assert_eq!(push.repositories, 0);
        assert_eq!(push.elements_sent, 0);
        let fetch = FetchResult::default();
        assert_eq!(fetch.elements_received, 0);
    }
}
