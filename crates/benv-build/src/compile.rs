//! Per-unit command assembly.
//!
//! The unit compiler is pure: for a configured unit it assembles the
//! external command sequences the executor will either run directly or
//! render into a script. Two sequences exist per unit:
//!
//! - the *setup script*, compiled once per package by its setup owner,
//!   builds the package's Setup driver against the temp database;
//! - the *build script* drives that Setup executable through configure,
//!   build, copy and (for libraries) registration into the temp database.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use benv_core::{CommandSpec, DestDir, Error, Result};
use benv_plan::{
    CabalPlan, ComponentKind, ConfiguredUnit, PkgName, PkgSrc, PlanUnit, UnitId,
};

use crate::package_db::{registration_file, PkgDbDirs};

/// Contents written when a package ships no Setup driver of its own.
pub const DEFAULT_SETUP_SOURCE: &str = "import Distribution.Simple\nmain = defaultMain\n";

/// Caller-supplied argument lists, appended verbatim per unit.
#[derive(Debug, Clone, Default)]
pub struct UnitArgs {
    /// Extra arguments to `Setup configure`
    pub configure: Vec<String>,
    /// Extra arguments to `Setup build`
    pub build: Vec<String>,
    /// Extra arguments to the registration tool
    pub register: Vec<String>,
}

/// Per-unit argument injection: the caller maps each configured unit to its
/// argument lists.
pub type UnitArgsFn = Arc<dyn Fn(&ConfiguredUnit) -> UnitArgs + Send + Sync>;

/// A callback returning the same arguments for every unit.
pub fn uniform_unit_args(args: UnitArgs) -> UnitArgsFn {
    Arc::new(move |_| args.clone())
}

/// External tool names (or paths) the engine drives.
#[derive(Debug, Clone)]
pub struct Toolchain {
    /// The compiler used for Setup drivers
    pub compiler: String,
    /// The native package tool used for planning and unpacking
    pub cabal: String,
    /// The runtime's registration tool
    pub pkg_tool: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            compiler: "ghc".to_string(),
            cabal: "cabal".to_string(),
            pkg_tool: "ghc-pkg".to_string(),
        }
    }
}

/// How a dependency is named in a `--dependency` flag.
#[derive(Debug, Clone)]
struct DepInfo {
    pkg_name: PkgName,
    /// Sublibrary name, when the dependency is not the package's main library
    lib_name: Option<String>,
}

/// Assembles command sequences for single units.
pub struct UnitCompiler {
    deps: HashMap<UnitId, DepInfo>,
    fetch_dir: PathBuf,
    dest: DestDir,
    dbs: PkgDbDirs,
    toolchain: Toolchain,
    unit_args: UnitArgsFn,
}

impl UnitCompiler {
    /// Create a compiler for the given plan and run layout.
    pub fn new(
        plan: &CabalPlan,
        fetch_dir: PathBuf,
        dest: DestDir,
        dbs: PkgDbDirs,
        toolchain: Toolchain,
        unit_args: UnitArgsFn,
    ) -> Self {
        let mut deps = HashMap::with_capacity(plan.units.len());
        for unit in &plan.units {
            let info = match unit {
                PlanUnit::Configured(u) => DepInfo {
                    pkg_name: u.pkg_name.clone(),
                    lib_name: (u.component.kind == ComponentKind::Lib
                        && u.component.name != u.pkg_name.as_str())
                    .then(|| u.component.name.clone()),
                },
                PlanUnit::PreExisting { pkg_name, .. } => DepInfo {
                    pkg_name: pkg_name.clone(),
                    lib_name: None,
                },
            };
            deps.insert(unit.id().clone(), info);
        }
        Self {
            deps,
            fetch_dir,
            dest,
            dbs,
            toolchain,
            unit_args,
        }
    }

    /// The directory a unit builds in.
    pub fn src_dir(&self, unit: &ConfiguredUnit) -> PathBuf {
        match &unit.src {
            PkgSrc::Local(path) => path.clone(),
            PkgSrc::Remote => self.fetch_dir.join(unit.name_ver()),
        }
    }

    /// The compiled Setup driver of a unit's package.
    pub fn setup_exe(&self, unit: &ConfiguredUnit) -> PathBuf {
        let name = if cfg!(windows) { "Setup.exe" } else { "Setup" };
        self.src_dir(unit).join("dist").join(name)
    }

    /// The setup script: compile the package's Setup driver.
    pub fn setup_commands(&self, unit: &ConfiguredUnit) -> Vec<CommandSpec> {
        let src = self.src_dir(unit);
        let setup_src = find_setup_source(&src).unwrap_or_else(|| src.join("Setup.hs"));

        let mut spec = CommandSpec::new(self.toolchain.compiler.as_str())
            .arg("--make")
            .arg(setup_src.display().to_string())
            .arg(format!("-package-db={}", self.dbs.temp_db.display()));
        for dep in &unit.setup_depends {
            spec = spec.arg("-package-id").arg(dep.as_str());
        }
        spec = spec
            .arg(format!("-outputdir={}", src.join("dist/setup").display()))
            .arg("-o")
            .arg(self.setup_exe(unit).display().to_string())
            .current_dir(&src);

        vec![spec]
    }

    /// The build script: configure, build, copy and register one unit.
    pub fn build_commands(&self, unit: &ConfiguredUnit) -> Vec<CommandSpec> {
        let src = self.src_dir(unit);
        let setup = self.setup_exe(unit).display().to_string();
        let args = (self.unit_args)(unit);

        // Built tool dependencies live under the staged bin directory and
        // are found through PATH.
        let extra_path: Option<PathBuf> =
            (!unit.exe_depends.is_empty()).then(|| self.dest.staged_bin_dir());
        let base = |prog: &str| {
            let spec = CommandSpec::new(prog).current_dir(&src);
            match &extra_path {
                Some(bin) => spec.prepend_path(bin),
                None => spec,
            }
        };

        let mut cmds = Vec::with_capacity(5);

        let mut configure = base(&setup)
            .arg("configure")
            .arg(format!("--prefix={}", self.dest.prefix.display()))
            .arg(format!("--cid={}", unit.id))
            .arg(format!("--package-db={}", self.dbs.temp_db.display()))
            .arg(format!(
                "--{}={}",
                unit.component.kind, unit.component.name
            ));
        for dep in &unit.depends {
            if let Some(flag) = self.dependency_flag(dep) {
                configure = configure.arg(flag);
            }
        }
        for assignment in unit.flags.assignments() {
            configure = configure.arg(format!("--flags={}", assignment));
        }
        cmds.push(configure.args(args.configure));

        cmds.push(base(&setup).arg("build").args(args.build));

        cmds.push(
            base(&setup)
                .arg("copy")
                .arg(format!("--destdir={}", self.dest.dest_dir.display())),
        );

        if unit.component.kind == ComponentKind::Lib {
            let conf = registration_file(&self.dbs.temp_db, &unit.id);
            cmds.push(
                base(&setup)
                    .arg("register")
                    .arg(format!("--gen-pkg-config={}", conf.display())),
            );
            cmds.push(
                base(&self.toolchain.pkg_tool)
                    .arg("register")
                    .arg(format!("--package-db={}", self.dbs.temp_db.display()))
                    .arg("--force")
                    .arg(conf.display().to_string())
                    .args(args.register),
            );
        }

        cmds
    }

    /// Render a `--dependency` flag for one library dependency. Unknown
    /// unit ids are tolerated and skipped.
    fn dependency_flag(&self, dep: &UnitId) -> Option<String> {
        let info = self.deps.get(dep)?;
        match &info.lib_name {
            Some(lib) => Some(format!("--dependency={}:{}={}", info.pkg_name, lib, dep)),
            None => Some(format!("--dependency={}={}", info.pkg_name, dep)),
        }
    }
}

/// Find a package's Setup driver source, trying `Setup.hs` then `Setup.lhs`.
pub fn find_setup_source(src_dir: &Path) -> Option<PathBuf> {
    let hs = src_dir.join("Setup.hs");
    if hs.exists() {
        return Some(hs);
    }
    let lhs = src_dir.join("Setup.lhs");
    if lhs.exists() {
        return Some(lhs);
    }
    None
}

/// Make sure a Setup driver source exists, writing the default driver when
/// the package ships none.
pub fn ensure_setup_source(src_dir: &Path) -> Result<PathBuf> {
    if let Some(existing) = find_setup_source(src_dir) {
        return Ok(existing);
    }
    let path = src_dir.join("Setup.hs");
    std::fs::write(&path, DEFAULT_SETUP_SOURCE)
        .map_err(|e| Error::io_at("failed to write default Setup driver", &path, e))?;
    Ok(path)
}

/// Shell guard equivalent of [`ensure_setup_source`] for emitted scripts.
pub fn setup_source_guard(src_dir: &Path) -> String {
    let dir = crate::script::sh_quote(&src_dir.to_string_lossy());
    format!(
        "[ -f {dir}/Setup.hs ] || [ -f {dir}/Setup.lhs ] || printf '{}' > {dir}/Setup.hs",
        DEFAULT_SETUP_SOURCE.replace('\n', "\\n")
    )
}
