use std::str::FromStr;

use serde::Deserialize;

/// How the debounce window reacts to change notifications that arrive while
/// it is already open.
///
/// - `Fixed`: the first change of a window starts a single timer; later
///   changes join the batch without moving the deadline (default).
/// - `Reset`: every change pushes the deadline out by the full delay, so a
///   continuous stream of saves keeps the window open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DebouncePolicy {
    #[default]
    Fixed,
    Reset,
}

impl FromStr for DebouncePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(DebouncePolicy::Fixed),
            "reset" => Ok(DebouncePolicy::Reset),
            other => Err(format!(
                "invalid debounce_policy: {other} (expected \"fixed\" or \"reset\")"
            )),
        }
    }
}

/// Kind of a raw filesystem notification, reduced to what the batcher cares
/// about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// File contents (or metadata) were modified in place.
    Change,
    /// The path was created, removed or renamed.
    Rename,
    /// Access events and anything else `notify` reports.
    Other,
}

impl From<&notify::EventKind> for ChangeKind {
    fn from(kind: &notify::EventKind) -> Self {
        use notify::EventKind;
        use notify::event::ModifyKind;

        match kind {
            EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Rename,
            EventKind::Modify(_) => ChangeKind::Change,
            EventKind::Create(_) | EventKind::Remove(_) => ChangeKind::Rename,
            EventKind::Access(_) | EventKind::Any | EventKind::Other => ChangeKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::EventKind;
    use notify::event::{CreateKind, DataChange, ModifyKind, RenameMode};

    #[test]
    fn debounce_policy_parses_case_insensitively() {
        assert_eq!(" Fixed ".parse::<DebouncePolicy>(), Ok(DebouncePolicy::Fixed));
        assert_eq!("RESET".parse::<DebouncePolicy>(), Ok(DebouncePolicy::Reset));
        assert!("sliding".parse::<DebouncePolicy>().is_err());
    }

    #[test]
    fn only_in_place_modifications_count_as_change() {
        let data = EventKind::Modify(ModifyKind::Data(DataChange::Content));
        let rename = EventKind::Modify(ModifyKind::Name(RenameMode::Both));
        let create = EventKind::Create(CreateKind::File);

        assert_eq!(ChangeKind::from(&data), ChangeKind::Change);
        assert_eq!(ChangeKind::from(&rename), ChangeKind::Rename);
        assert_eq!(ChangeKind::from(&create), ChangeKind::Rename);
    }
}
