//! Setup-owner tagging.
//!
//! Every package needs its Setup driver compiled exactly once before any of
//! its units build. The first unit of a package in dependency order owns
//! that compilation; later units of the same package point back at the
//! owner.

use std::collections::HashMap;

use crate::unit::{ConfiguredUnit, PkgName, UnitId, Version, DUMMY_PACKAGE};

/// A configured unit plus its package's setup owner.
///
/// `setup_owner` is `None` for the owner itself and `Some(owner)` for every
/// later unit of the same package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedUnit {
    pub unit: ConfiguredUnit,
    pub setup_owner: Option<UnitId>,
}

/// Walk a dependency-sorted unit list and mark setup owners.
///
/// The planner's synthetic seed unit is dropped here; it exists only to
/// carry the user's requirements through the resolver and is never built.
pub fn tag_setup_owners(sorted: Vec<ConfiguredUnit>) -> Vec<TaggedUnit> {
    let mut owners: HashMap<(PkgName, Version), UnitId> = HashMap::new();
    let mut tagged = Vec::with_capacity(sorted.len());

    for unit in sorted {
        if unit.pkg_name.as_str() == DUMMY_PACKAGE {
            continue;
        }
        let setup_owner = match owners.get(&unit.pkg_key()) {
            Some(owner) => Some(owner.clone()),
            None => {
                owners.insert(unit.pkg_key(), unit.id.clone());
                None
            }
        };
        tagged.push(TaggedUnit { unit, setup_owner });
    }

    tagged
}
