use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ObjectId;

/// The mutable state stored in state.yaml
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct State {
    /// Storage format version, 0 for a store that was never initialized
    #[serde(default)]
    pub version: u32,

    /// Ref of the stage the learner is currently on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<String>,

    /// Maps stage refs to their head commit
    #[serde(default)]
    pub refs: BTreeMap<String, ObjectId>, // ref_name -> commit hash
}
