//! Plan blob parsing and rendering.
//!
//! The planner's output is the `plan.json` the native tool drops under
//! `dist-newstyle/cache/`. Two unit shapes occur:
//!
//! - granular units carry a `component-name` and flat `depends` /
//!   `exe-depends` lists;
//! - whole-package units carry a `components` map; its `setup` entry holds
//!   the Setup driver's dependencies and the remaining entries are folded
//!   into the unit's own dependency lists.
//!
//! Rendering mirrors parsing, so `parse(render(plan)) == plan`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use benv_core::{Error, Result};

use crate::unit::{
    CabalPlan, ComponentName, ConfiguredUnit, FlagSpec, PkgName, PkgSrc, PlanUnit, UnitId, Version,
};

#[derive(Debug, Serialize, Deserialize)]
struct WirePlan {
    #[serde(rename = "install-plan")]
    install_plan: Vec<WireUnit>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireUnit {
    #[serde(rename = "type")]
    kind: String,
    id: UnitId,
    #[serde(rename = "pkg-name")]
    pkg_name: PkgName,
    #[serde(rename = "pkg-version")]
    pkg_version: Version,
    #[serde(
        rename = "component-name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    component_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    components: Option<BTreeMap<String, WireComponent>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    depends: Vec<UnitId>,
    #[serde(rename = "exe-depends", default, skip_serializing_if = "Vec::is_empty")]
    exe_depends: Vec<UnitId>,
    #[serde(rename = "pkg-src", default, skip_serializing_if = "Option::is_none")]
    pkg_src: Option<WirePkgSrc>,
    #[serde(default, skip_serializing_if = "FlagSpec::is_empty")]
    flags: FlagSpec,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WireComponent {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    depends: Vec<UnitId>,
    #[serde(rename = "exe-depends", default, skip_serializing_if = "Vec::is_empty")]
    exe_depends: Vec<UnitId>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WirePkgSrc {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
}

/// Parse a plan blob.
pub fn parse_plan(json: &str) -> Result<CabalPlan> {
    let wire: WirePlan = serde_json::from_str(json)
        .map_err(|e| Error::parse(format!("malformed plan: {}", e)))?;

    let mut units = Vec::with_capacity(wire.install_plan.len());
    for raw in wire.install_plan {
        units.push(parse_unit(raw)?);
    }
    Ok(CabalPlan::new(units))
}

fn parse_unit(raw: WireUnit) -> Result<PlanUnit> {
    match raw.kind.as_str() {
        "pre-existing" => Ok(PlanUnit::PreExisting {
            id: raw.id,
            pkg_name: raw.pkg_name,
            version: raw.pkg_version,
            depends: raw.depends,
        }),
        "configured" => {
            let src = match raw.pkg_src {
                Some(ref s) if s.kind == "local" => {
                    let path = s.path.clone().ok_or_else(|| {
                        Error::parse(format!("unit {}: local pkg-src without path", raw.id))
                    })?;
                    PkgSrc::Local(path)
                }
                _ => PkgSrc::Remote,
            };

            let (component, setup_depends, depends, exe_depends) = match raw.components {
                None => {
                    let name = raw.component_name.as_deref().unwrap_or("lib");
                    let component = ComponentName::parse(&raw.pkg_name, name).ok_or_else(|| {
                        Error::parse(format!("unit {}: unknown component {}", raw.id, name))
                    })?;
                    (component, Vec::new(), raw.depends, raw.exe_depends)
                }
                Some(map) => fold_components(&raw.id, &raw.pkg_name, map)?,
            };

            Ok(PlanUnit::Configured(ConfiguredUnit {
                id: raw.id,
                pkg_name: raw.pkg_name,
                version: raw.pkg_version,
                component,
                src,
                flags: raw.flags,
                setup_depends,
                depends,
                exe_depends,
            }))
        }
        other => Err(Error::parse(format!(
            "unit {}: unknown plan unit type {:?}",
            raw.id, other
        ))),
    }
}

/// Fold a whole-package `components` map into one configured unit: the
/// `setup` entry supplies the Setup driver's dependencies, everything else
/// is unioned into the unit's own lists. The main library (or the first
/// entry) names the unit.
fn fold_components(
    id: &UnitId,
    pkg: &PkgName,
    map: BTreeMap<String, WireComponent>,
) -> Result<(ComponentName, Vec<UnitId>, Vec<UnitId>, Vec<UnitId>)> {
    let mut setup_depends = Vec::new();
    let mut depends = Vec::new();
    let mut exe_depends = Vec::new();
    let mut component: Option<ComponentName> = None;

    for (name, comp) in map {
        if name == "setup" {
            setup_depends = comp.depends;
            continue;
        }
        let parsed = ComponentName::parse(pkg, &name)
            .ok_or_else(|| Error::parse(format!("unit {}: unknown component {}", id, name)))?;
        if component.is_none() || name == "lib" {
            component = Some(parsed);
        }
        for dep in comp.depends {
            if !depends.contains(&dep) {
                depends.push(dep);
            }
        }
        for dep in comp.exe_depends {
            if !exe_depends.contains(&dep) {
                exe_depends.push(dep);
            }
        }
    }

    let component = component
        .ok_or_else(|| Error::parse(format!("unit {}: components map has no buildable entry", id)))?;
    Ok((component, setup_depends, depends, exe_depends))
}

/// Render a plan back to its wire form.
pub fn render_plan(plan: &CabalPlan) -> Result<String> {
    let wire = WirePlan {
        install_plan: plan.units.iter().map(render_unit).collect(),
    };
    serde_json::to_string_pretty(&wire)
        .map_err(|e| Error::parse(format!("failed to render plan: {}", e)))
}

fn render_unit(unit: &PlanUnit) -> WireUnit {
    match unit {
        PlanUnit::PreExisting {
            id,
            pkg_name,
            version,
            depends,
        } => WireUnit {
            kind: "pre-existing".to_string(),
            id: id.clone(),
            pkg_name: pkg_name.clone(),
            pkg_version: version.clone(),
            component_name: None,
            components: None,
            depends: depends.clone(),
            exe_depends: Vec::new(),
            pkg_src: None,
            flags: FlagSpec::default(),
        },
        PlanUnit::Configured(u) => {
            let pkg_src = Some(match &u.src {
                PkgSrc::Local(path) => WirePkgSrc {
                    kind: "local".to_string(),
                    path: Some(path.clone()),
                },
                PkgSrc::Remote => WirePkgSrc {
                    kind: "repo-tar".to_string(),
                    path: None,
                },
            });

            if u.setup_depends.is_empty() {
                WireUnit {
                    kind: "configured".to_string(),
                    id: u.id.clone(),
                    pkg_name: u.pkg_name.clone(),
                    pkg_version: u.version.clone(),
                    component_name: Some(u.component.render(&u.pkg_name)),
                    components: None,
                    depends: u.depends.clone(),
                    exe_depends: u.exe_depends.clone(),
                    pkg_src,
                    flags: u.flags.clone(),
                }
            } else {
                // Setup dependencies only exist in the components form.
                let mut components = BTreeMap::new();
                components.insert(
                    u.component.render(&u.pkg_name),
                    WireComponent {
                        depends: u.depends.clone(),
                        exe_depends: u.exe_depends.clone(),
                    },
                );
                components.insert(
                    "setup".to_string(),
                    WireComponent {
                        depends: u.setup_depends.clone(),
                        exe_depends: Vec::new(),
                    },
                );
                WireUnit {
                    kind: "configured".to_string(),
                    id: u.id.clone(),
                    pkg_name: u.pkg_name.clone(),
                    pkg_version: u.version.clone(),
                    component_name: None,
                    components: Some(components),
                    depends: Vec::new(),
                    exe_depends: Vec::new(),
                    pkg_src,
                    flags: u.flags.clone(),
                }
            }
        }
    }
}

/// Read a plan blob from disk.
pub fn read_plan(path: &Path) -> Result<CabalPlan> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::io_at("failed to read plan file", path, e))?;
    parse_plan(&contents).map_err(|e| match e {
        Error::Parse { message, .. } => Error::parse_at(message, path),
        other => other,
    })
}

/// Write a plan blob to disk.
pub fn write_plan(plan: &CabalPlan, path: &Path) -> Result<()> {
    let rendered = render_plan(plan)?;
    std::fs::write(path, rendered)
        .map_err(|e| Error::io_at("failed to write plan file", path, e))
}
