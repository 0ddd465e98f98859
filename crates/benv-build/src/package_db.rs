//! Package database management.
//!
//! A run maintains two databases. Units register into a *temp* database
//! rooted in the fetched tree, so that later units in the same run can link
//! against libraries that still live under the staging destination. Once a
//! package's last unit finishes, its registration files are staged into the
//! *final* database under the install prefix, which is the authoritative
//! output of the build.

use std::path::{Path, PathBuf};
use tracing::debug;

use benv_core::{CommandSpec, Error, Result};
use benv_plan::{ComponentKind, ConfiguredUnit, UnitId};

/// Directory name of both package databases.
pub const PKG_DB_DIR: &str = "package.conf";

/// The temp and final package database paths for a run.
#[derive(Debug, Clone)]
pub struct PkgDbDirs {
    /// Staging database under the fetch root
    pub temp_db: PathBuf,
    /// Authoritative database under the install prefix
    pub final_db: PathBuf,
}

/// Compute and create the two package databases.
///
/// A stale temp database from an earlier run is removed first; removal
/// errors are swallowed since the create below surfaces anything real.
pub fn prepare(fetch_dir: &Path, install_dir: &Path) -> Result<PkgDbDirs> {
    let temp_db = fetch_dir.join(PKG_DB_DIR);
    let final_db = install_dir.join(PKG_DB_DIR);

    if temp_db.exists() {
        debug!("Removing stale temp package db at {}", temp_db.display());
        let _ = std::fs::remove_dir_all(&temp_db);
    }

    std::fs::create_dir_all(&temp_db)
        .map_err(|e| Error::io_at("failed to create temp package db", &temp_db, e))?;
    std::fs::create_dir_all(&final_db)
        .map_err(|e| Error::io_at("failed to create final package db", &final_db, e))?;

    Ok(PkgDbDirs { temp_db, final_db })
}

/// The per-unit registration file inside a database.
pub fn registration_file(db: &Path, unit: &UnitId) -> PathBuf {
    db.join(format!("{}.conf", unit))
}

/// Commands staging a finished package's registration files from the temp
/// database into the final one.
///
/// Only library-bearing units produce registration files. The engine's
/// scheduling runs these while the package holds a unique turn, so the
/// final database is never written concurrently.
pub fn stage_commands(
    dbs: &PkgDbDirs,
    units: &[ConfiguredUnit],
    pkg_tool: &str,
    pkg_tool_args: &[String],
) -> Vec<CommandSpec> {
    units
        .iter()
        .filter(|u| u.component.kind == ComponentKind::Lib)
        .map(|u| {
            CommandSpec::new(pkg_tool)
                .arg("register")
                .arg(format!("--package-db={}", dbs.final_db.display()))
                .arg("--force")
                .arg(registration_file(&dbs.temp_db, &u.id).display().to_string())
                .args(pkg_tool_args.iter().cloned())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use benv_plan::{ComponentName, FlagSpec, PkgName, PkgSrc, Version};

    fn unit(pkg: &str, kind: ComponentKind, comp: &str) -> ConfiguredUnit {
        ConfiguredUnit {
            id: UnitId::new(format!("{}-1.0-{}", pkg, comp)),
            pkg_name: PkgName::from(pkg),
            version: Version::from("1.0"),
            component: ComponentName {
                kind,
                name: comp.to_string(),
            },
            src: PkgSrc::Remote,
            flags: FlagSpec::default(),
            setup_depends: Vec::new(),
            depends: Vec::new(),
            exe_depends: Vec::new(),
        }
    }

    #[test]
    fn test_prepare_creates_both_dbs() {
        let tmp = tempfile::tempdir().unwrap();
        let fetch = tmp.path().join("fetch");
        let install = tmp.path().join("stage/opt");
        std::fs::create_dir_all(&fetch).unwrap();

        let dbs = prepare(&fetch, &install).unwrap();
        assert!(dbs.temp_db.is_dir());
        assert!(dbs.final_db.is_dir());
        assert_eq!(dbs.temp_db, fetch.join("package.conf"));
        assert_eq!(dbs.final_db, install.join("package.conf"));
    }

    #[test]
    fn test_prepare_recreates_temp_db() {
        let tmp = tempfile::tempdir().unwrap();
        let fetch = tmp.path().to_path_buf();
        let install = tmp.path().join("install");

        let dbs = prepare(&fetch, &install).unwrap();
        std::fs::write(dbs.temp_db.join("stale.conf"), "old").unwrap();

        let dbs = prepare(&fetch, &install).unwrap();
        assert!(dbs.temp_db.is_dir());
        assert!(!dbs.temp_db.join("stale.conf").exists());
    }

    #[test]
    fn test_registration_file_named_by_unit_id() {
        let path = registration_file(Path::new("/db"), &UnitId::from("foo-1.0-abc"));
        assert_eq!(path, PathBuf::from("/db/foo-1.0-abc.conf"));
    }

    #[test]
    fn test_stage_commands_only_for_libraries() {
        let dbs = PkgDbDirs {
            temp_db: PathBuf::from("/fetch/package.conf"),
            final_db: PathBuf::from("/install/package.conf"),
        };
        let units = vec![
            unit("bar", ComponentKind::Lib, "bar"),
            unit("bar", ComponentKind::Exe, "mybar"),
        ];

        let cmds = stage_commands(&dbs, &units, "ghc-pkg", &[]);
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].prog, "ghc-pkg");
        assert!(cmds[0]
            .args
            .contains(&"--package-db=/install/package.conf".to_string()));
        assert!(cmds[0]
            .args
            .contains(&"/fetch/package.conf/bar-1.0-bar.conf".to_string()));
    }

    #[test]
    fn test_stage_commands_pass_through_args() {
        let dbs = PkgDbDirs {
            temp_db: PathBuf::from("/f/package.conf"),
            final_db: PathBuf::from("/i/package.conf"),
        };
        let units = vec![unit("lib", ComponentKind::Lib, "lib")];
        let cmds = stage_commands(&dbs, &units, "ghc-pkg", &["--verbose=0".to_string()]);
        assert!(cmds[0].args.contains(&"--verbose=0".to_string()));
    }
}
