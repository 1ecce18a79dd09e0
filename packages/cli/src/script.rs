//! Edit scripts replayed by `puck apply`
//!
//! A script is a JSON array of steps:
//!
//! ```json
//! [
//!   { "action": { "type": "insert", "componentType": "Heading", "destinationIndex": 0, "destinationZone": "root:default-zone" } },
//!   "undo",
//!   "redo",
//!   { "refreshPermissions": { "type": "Banner" } }
//! ]
//! ```

use puck_editor::{Action, RefreshQuery};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Step {
    Action(Action),
    Undo,
    Redo,
    RefreshPermissions(RefreshTarget),
}

/// Which cached permissions to drop; empty means all of them
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct RefreshTarget {
    pub item: Option<String>,
    #[serde(rename = "type")]
    pub component_type: Option<String>,
    pub root: bool,
}

impl From<RefreshTarget> for RefreshQuery {
    fn from(target: RefreshTarget) -> Self {
        match target {
            RefreshTarget { item: Some(id), .. } => RefreshQuery::Item(id),
            RefreshTarget {
                component_type: Some(component_type),
                ..
            } => RefreshQuery::Type(component_type),
            RefreshTarget { root: true, .. } => RefreshQuery::Root,
            _ => RefreshQuery::All,
        }
    }
}

impl Step {
    pub fn describe(&self) -> String {
        match self {
            Step::Action(action) => action.name().to_string(),
            Step::Undo => "undo".to_string(),
            Step::Redo => "redo".to_string(),
            Step::RefreshPermissions(_) => "refreshPermissions".to_string(),
        }
    }
}

pub fn parse(source: &str) -> serde_json::Result<Vec<Step>> {
    serde_json::from_str(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use puck_common::ZoneKey;

    #[test]
    fn test_parse_script() {
        let steps = parse(
            r#"[
                { "action": { "type": "remove", "index": 0, "zone": "root:default-zone" } },
                "undo",
                "redo",
                { "refreshPermissions": { "item": "b1" } },
                { "refreshPermissions": {} }
            ]"#,
        )
        .unwrap();

        assert_eq!(
            steps[0],
            Step::Action(Action::Remove {
                index: 0,
                zone: ZoneKey::root(),
            })
        );
        assert_eq!(steps[1], Step::Undo);
        assert_eq!(steps[2], Step::Redo);
        assert_eq!(steps[4].describe(), "refreshPermissions");

        let Step::RefreshPermissions(target) = steps[3].clone() else {
            panic!("expected a refresh step");
        };
        assert_eq!(RefreshQuery::from(target), RefreshQuery::Item("b1".to_string()));
        assert_eq!(RefreshQuery::from(RefreshTarget::default()), RefreshQuery::All);
    }

    #[test]
    fn test_unknown_step_is_an_error() {
        assert!(parse(r#"["rewind"]"#).is_err());
    }
}
