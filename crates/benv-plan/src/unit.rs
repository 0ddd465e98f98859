//! Build plan data model.
//!
//! A plan is an acyclic list of build units emitted by the external
//! resolver. Units are identified by a stable [`UnitId`]; two units may
//! share a package name and version (one per component) but never an id.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

/// Name of the synthetic package injected by the planner to represent the
/// user's seed requirements. It is never compiled.
pub const DUMMY_PACKAGE: &str = "dummy-package";

/// A package name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PkgName(String);

/// The native tool's stable per-unit identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

/// A package version, kept as opaque text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

/// A package flag name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagName(String);

macro_rules! text_newtype {
    ($ty:ident) => {
        impl $ty {
            /// Wrap a text value.
            pub fn new(text: impl Into<String>) -> Self {
                Self(text.into())
            }

            /// View the underlying text.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $ty {
            fn from(text: &str) -> Self {
                Self(text.to_string())
            }
        }
    };
}

text_newtype!(PkgName);
text_newtype!(UnitId);
text_newtype!(Version);
text_newtype!(FlagName);

/// The closed set of component kinds the native tool can configure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentKind {
    Lib,
    FLib,
    Exe,
    Test,
    Bench,
    Setup,
}

impl ComponentKind {
    /// The native tool's name for this kind, as it appears in component
    /// targets and configure flags.
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentKind::Lib => "lib",
            ComponentKind::FLib => "flib",
            ComponentKind::Exe => "exe",
            ComponentKind::Test => "test",
            ComponentKind::Bench => "bench",
            ComponentKind::Setup => "setup",
        }
    }

    /// Parse a kind from the native tool's name.
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "lib" => Some(ComponentKind::Lib),
            "flib" => Some(ComponentKind::FLib),
            "exe" => Some(ComponentKind::Exe),
            "test" => Some(ComponentKind::Test),
            "bench" => Some(ComponentKind::Bench),
            "setup" => Some(ComponentKind::Setup),
            _ => None,
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A component within a package: kind plus name.
///
/// The main library of a package carries the package's own name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentName {
    pub kind: ComponentKind,
    pub name: String,
}

impl ComponentName {
    /// The main library component of `pkg`.
    pub fn main_lib(pkg: &PkgName) -> Self {
        Self {
            kind: ComponentKind::Lib,
            name: pkg.as_str().to_string(),
        }
    }

    /// Parse a component name in the plan's `kind` / `kind:name` notation.
    /// A bare kind names the package's eponymous component.
    pub fn parse(pkg: &PkgName, text: &str) -> Option<Self> {
        match text.split_once(':') {
            Some((kind, name)) => Some(Self {
                kind: ComponentKind::parse(kind)?,
                name: name.to_string(),
            }),
            None => Some(Self {
                kind: ComponentKind::parse(text)?,
                name: pkg.as_str().to_string(),
            }),
        }
    }

    /// Render in the plan's notation, using the bare form for the main
    /// library.
    pub fn render(&self, pkg: &PkgName) -> String {
        if self.name == pkg.as_str() {
            self.kind.as_str().to_string()
        } else {
            format!("{}:{}", self.kind, self.name)
        }
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// Where a unit's source comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PkgSrc {
    /// Built in place from a filesystem path; never fetched.
    Local(PathBuf),
    /// Fetched by name and version into the fetch root.
    Remote,
}

impl PkgSrc {
    pub fn is_local(&self) -> bool {
        matches!(self, PkgSrc::Local(_))
    }
}

/// Flag assignments for a package.
///
/// Flags are tri-state: present-true, present-false, or absent (unset).
/// A flag spec is empty iff every flag is unset, i.e. the map is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagSpec(pub BTreeMap<FlagName, bool>);

impl FlagSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, flag: FlagName, value: bool) {
        self.0.insert(flag, value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render assignments in the native `+flag` / `-flag` notation.
    /// Unset flags are omitted.
    pub fn assignments(&self) -> Vec<String> {
        self.0
            .iter()
            .map(|(name, on)| format!("{}{}", if *on { '+' } else { '-' }, name))
            .collect()
    }
}

/// A version constraint (possibly empty) plus flag assignments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PkgSpec {
    /// Raw constraint text in the native tool's range syntax, e.g. `==1.2`.
    pub constraints: String,
    pub flags: FlagSpec,
}

impl PkgSpec {
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty() && self.flags.is_empty()
    }
}

/// A seed requirement: source, constraint and requested components.
#[derive(Debug, Clone, Default)]
pub struct UnitSpec {
    pub src: Option<PathBuf>,
    pub spec: PkgSpec,
    pub components: BTreeSet<ComponentName>,
}

/// Seed requirements keyed by package.
pub type UnitSpecs = BTreeMap<PkgName, UnitSpec>;

/// Version pins keyed by package (freeze-file contents).
pub type PkgSpecs = BTreeMap<PkgName, PkgSpec>;

/// Pairs of packages for which upper bounds are relaxed. The pair
/// `(*, *)` means every depender may bypass every dependee's bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowNewer(BTreeSet<(String, String)>);

impl AllowNewer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relax all bounds everywhere.
    pub fn universal() -> Self {
        let mut set = BTreeSet::new();
        set.insert(("*".to_string(), "*".to_string()));
        Self(set)
    }

    pub fn insert(&mut self, depender: impl Into<String>, dependee: impl Into<String>) {
        self.0.insert((depender.into(), dependee.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, String)> {
        self.0.iter()
    }
}

/// A plan entry produced by the external planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfiguredUnit {
    pub id: UnitId,
    pub pkg_name: PkgName,
    pub version: Version,
    pub component: ComponentName,
    pub src: PkgSrc,
    pub flags: FlagSpec,
    /// Units the package's Setup driver is compiled against
    pub setup_depends: Vec<UnitId>,
    /// Library dependencies
    pub depends: Vec<UnitId>,
    /// Build-tool dependencies
    pub exe_depends: Vec<UnitId>,
}

impl ConfiguredUnit {
    /// The `name-version` rendering used for fetch subdirectories.
    pub fn name_ver(&self) -> String {
        format!("{}-{}", self.pkg_name, self.version)
    }

    /// Key identifying this unit's package.
    pub fn pkg_key(&self) -> (PkgName, Version) {
        (self.pkg_name.clone(), self.version.clone())
    }

    /// All dependency edges, in setup / library / build-tool order.
    pub fn all_depends(&self) -> impl Iterator<Item = &UnitId> {
        self.setup_depends
            .iter()
            .chain(self.depends.iter())
            .chain(self.exe_depends.iter())
    }
}

/// A unit in the plan: either configured for building, or already present
/// in some system package database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanUnit {
    Configured(ConfiguredUnit),
    PreExisting {
        id: UnitId,
        pkg_name: PkgName,
        version: Version,
        depends: Vec<UnitId>,
    },
}

impl PlanUnit {
    pub fn id(&self) -> &UnitId {
        match self {
            PlanUnit::Configured(u) => &u.id,
            PlanUnit::PreExisting { id, .. } => id,
        }
    }

    pub fn as_configured(&self) -> Option<&ConfiguredUnit> {
        match self {
            PlanUnit::Configured(u) => Some(u),
            PlanUnit::PreExisting { .. } => None,
        }
    }
}

/// An ordered sequence of plan units.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CabalPlan {
    pub units: Vec<PlanUnit>,
}

impl CabalPlan {
    pub fn new(units: Vec<PlanUnit>) -> Self {
        Self { units }
    }

    /// Look up a unit by id.
    pub fn lookup(&self, id: &UnitId) -> Option<&PlanUnit> {
        self.units.iter().find(|u| u.id() == id)
    }

    /// Iterate over the configured units in plan order.
    pub fn configured(&self) -> impl Iterator<Item = &ConfiguredUnit> {
        self.units.iter().filter_map(PlanUnit::as_configured)
    }
}
