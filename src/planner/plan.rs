//! Task actions and the decision table.
//!
//! A task observes the remote object, classifies what it saw as an
//! [`Observation`] and then asks [`decide`] which [`TaskAction`] follows.
//! The table is pure so it can be tested without a catalog.

use serde::{Deserialize, Serialize};

/// Desired end state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetState {
    /// The object must exist with the desired settings.
    Present,
    /// The object must not exist.
    Absent,
}

/// Action decided by a task at execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskAction {
    /// Object was created.
    Create,
    /// First version of a versioned object was created.
    CreateFirstVersion,
    /// Object was updated in place, or a new version was created.
    Update,
    /// Object was deleted.
    Delete,
    /// Nothing to do.
    NoAction,
    /// Checkmode: object would be created.
    WouldCreate,
    /// Checkmode: object would be updated.
    WouldUpdate,
    /// Checkmode: object would be deleted.
    WouldDelete,
    /// Checkmode: the update is known to be impossible.
    WouldFailToUpdate,
}

/// Version advancement strategy for version tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionStrategy {
    /// Use the requested version string; it must be newer than the existing one.
    Exact,
    /// Increment the minor component of the highest existing version.
    BumpMinor,
    /// Increment the patch component of the highest existing version.
    #[default]
    BumpPatch,
}

/// What a task found when it compared the remote object with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Nothing matching the identity exists.
    Missing,
    /// Exists and matches the desired settings.
    Unchanged,
    /// Exists and differs in fields that can be changed.
    Changed,
    /// Exists and differs in fields the remote API cannot change.
    ChangeNotSupported,
}

/// Outcome of the decision table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Carry out (or report) the given action.
    Act(TaskAction),
    /// Fail with an update-not-supported error.
    RejectUpdate,
}

/// Decides the action for a task.
#[must_use]
pub const fn decide(target: TargetState, observation: Observation, checkmode: bool) -> Decision {
    let action = match (target, observation) {
        (TargetState::Absent, Observation::Missing) => TaskAction::NoAction,
        (TargetState::Absent, _) => {
            if checkmode {
                TaskAction::WouldDelete
            } else {
                TaskAction::Delete
            }
        }
        (TargetState::Present, Observation::Missing) => {
            if checkmode {
                TaskAction::WouldCreate
            } else {
                TaskAction::Create
            }
        }
        (TargetState::Present, Observation::Unchanged) => TaskAction::NoAction,
        (TargetState::Present, Observation::Changed) => {
            if checkmode {
                TaskAction::WouldUpdate
            } else {
                TaskAction::Update
            }
        }
        (TargetState::Present, Observation::ChangeNotSupported) => {
            if checkmode {
                TaskAction::WouldFailToUpdate
            } else {
                return Decision::RejectUpdate;
            }
        }
    };
    Decision::Act(action)
}

impl TaskAction {
    /// Returns true for actions that changed the remote catalog.
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        matches!(
            self,
            Self::Create | Self::CreateFirstVersion | Self::Update | Self::Delete
        )
    }

    /// Returns true for checkmode-only actions.
    #[must_use]
    pub const fn is_checkmode(self) -> bool {
        matches!(
            self,
            Self::WouldCreate | Self::WouldUpdate | Self::WouldDelete | Self::WouldFailToUpdate
        )
    }

    /// Returns the wire name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::CreateFirstVersion => "CREATE_FIRST_VERSION",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::NoAction => "NO_ACTION",
            Self::WouldCreate => "WOULD_CREATE",
            Self::WouldUpdate => "WOULD_UPDATE",
            Self::WouldDelete => "WOULD_DELETE",
            Self::WouldFailToUpdate => "WOULD_FAIL_TO_UPDATE",
        }
    }
}

impl std::fmt::Display for TaskAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::fmt::Display for TargetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Present => "present",
            Self::Absent => "absent",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for VersionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Exact => "EXACT",
            Self::BumpMinor => "BUMP_MINOR",
            Self::BumpPatch => "BUMP_PATCH",
        };
        write!(f, "{s}")
    }
}
