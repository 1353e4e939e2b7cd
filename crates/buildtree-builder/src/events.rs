use buildtree_core::Error;

/// Notifications sent to whatever presents the installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    ProgressIncrement,
    ActionDescription(String),
    /// A leaf package finished; every leaf completing means the whole tree did.
    SubtreeCompleted,
    Error {
        title: String,
        header: String,
        diagnostic: String,
    },
    RemovalError {
        title: String,
        header: String,
        diagnostic: String,
    },
    Completion,
}

impl BuildEvent {
    pub fn error(err: &Error) -> Self {
        Self::Error {
            title: err.title().to_string(),
            header: err.header(),
            diagnostic: err.diagnostic().to_string(),
        }
    }

    pub fn removal_error(err: &Error) -> Self {
        Self::RemovalError {
            title: err.title().to_string(),
            header: err.header(),
            diagnostic: err.diagnostic().to_string(),
        }
    }
}

pub trait EventSink {
    fn emit(&mut self, event: BuildEvent);
}

impl<F> EventSink for F
where
    F: FnMut(BuildEvent),
{
    fn emit(&mut self, event: BuildEvent) {
        self(event)
    }
}
