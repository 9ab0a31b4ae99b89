use std::fmt;

///
/// EntityState
///
/// Lifecycle state of one tracked record.
///
/// `Detached` is both initial and terminal: records enter tracking via
/// Add/Attach/Load and leave it via Detach or an accepted Remove. The
/// pending states (`New`, `Modified`, `Deleted`) are exactly the states a
/// change set reports.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    Detached,
    New,
    Unmodified,
    Modified,
    Deleted,
}

impl EntityState {
    #[must_use]
    pub const fn is_attached(self) -> bool {
        !matches!(self, Self::Detached)
    }

    /// Return whether this state carries a pending change of its own.
    #[must_use]
    pub const fn has_pending_change(self) -> bool {
        matches!(self, Self::New | Self::Modified | Self::Deleted)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Detached => "detached",
            Self::New => "new",
            Self::Unmodified => "unmodified",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
