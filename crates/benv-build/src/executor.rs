//! Plan execution.
//!
//! Takes the tagged, dependency-ordered unit list and drives it to
//! completion under one of three strategies: strictly sequential, bounded
//! parallel, or script emission. The parallel strategy realizes the dual
//! DAG of the design: one *package node* per distinct package (compiling
//! its Setup driver) and one *unit node* per configured unit, with
//! completion events connecting them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::debug;

use benv_core::{CommandSpec, DestDir, Error, ProcessRunner, Result, Semaphore};
use benv_plan::{
    sort_plan, tag_setup_owners, CabalPlan, ConfiguredUnit, PkgName, TaggedUnit, UnitId, Version,
};
use benv_telemetry::TimingGuard;
use benv_ui::Output;

use crate::compile::{ensure_setup_source, setup_source_guard, Toolchain, UnitArgsFn, UnitCompiler};
use crate::package_db::{self, PkgDbDirs};
use crate::script::{sh_quote, ScriptBuffer};

/// How a plan is executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStrategy {
    /// Strictly sequential, in dependency order.
    TopoSort,
    /// Bounded-parallel; `0` means unbounded.
    Async(usize),
    /// Emit a shell script to the given path instead of running anything.
    Script(PathBuf),
}

/// Options for plan execution.
#[derive(Clone)]
pub struct BuildOptions {
    pub strategy: BuildStrategy,
    pub toolchain: Toolchain,
    pub unit_args: UnitArgsFn,
}

type PkgKey = (PkgName, Version);

/// Execute a resolved plan against the given fetch and destination layout.
pub async fn build_plan(
    plan: &CabalPlan,
    fetch_dir: &Path,
    dest: &DestDir,
    options: &BuildOptions,
    output: &Output,
) -> Result<()> {
    let sorted = sort_plan(plan)?;
    let tagged = tag_setup_owners(sorted);
    if tagged.is_empty() {
        output.info("Nothing to build");
        return Ok(());
    }

    let dbs = package_db::prepare(fetch_dir, &dest.install_dir)?;
    let compiler = UnitCompiler::new(
        plan,
        fetch_dir.to_path_buf(),
        dest.clone(),
        dbs.clone(),
        options.toolchain.clone(),
        options.unit_args.clone(),
    );

    match &options.strategy {
        BuildStrategy::TopoSort => {
            run_toposort(&tagged, &compiler, &dbs, options, output).await
        }
        BuildStrategy::Async(jobs) => {
            run_async_strategy(&tagged, &compiler, &dbs, *jobs, options, output).await
        }
        BuildStrategy::Script(path) => emit_script(&tagged, &compiler, &dbs, options, path, output),
    }
}

/// Units of each package, in tagged order, for completion-time staging.
fn package_groups(tagged: &[TaggedUnit]) -> Vec<(PkgKey, Vec<ConfiguredUnit>)> {
    let mut order: Vec<PkgKey> = Vec::new();
    let mut groups: HashMap<PkgKey, Vec<ConfiguredUnit>> = HashMap::new();
    for t in tagged {
        let key = t.unit.pkg_key();
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(t.unit.clone());
    }
    order
        .into_iter()
        .map(|key| {
            let units = groups.remove(&key).expect("group exists for ordered key");
            (key, units)
        })
        .collect()
}

fn staging_for(
    dbs: &PkgDbDirs,
    units: &[ConfiguredUnit],
    options: &BuildOptions,
) -> Vec<CommandSpec> {
    // Registration-tool pass-through args come from the package's first unit.
    let register_args = (options.unit_args)(&units[0]).register;
    package_db::stage_commands(dbs, units, &options.toolchain.pkg_tool, &register_args)
}

// ─── Sequential strategy ─────────────────────────────────────────────────

async fn run_toposort(
    tagged: &[TaggedUnit],
    compiler: &UnitCompiler,
    dbs: &PkgDbDirs,
    options: &BuildOptions,
    output: &Output,
) -> Result<()> {
    let runner = ProcessRunner::new();
    let groups = package_groups(tagged);
    let mut remaining: HashMap<PkgKey, usize> = groups
        .iter()
        .map(|(key, units)| (key.clone(), units.len()))
        .collect();
    let staging: HashMap<PkgKey, Vec<CommandSpec>> = groups
        .iter()
        .map(|(key, units)| (key.clone(), staging_for(dbs, units, options)))
        .collect();

    for t in tagged {
        if t.setup_owner.is_none() {
            ensure_setup_source(&compiler.src_dir(&t.unit))?;
            output.status("Setup", &t.unit.name_ver());
            for cmd in compiler.setup_commands(&t.unit) {
                runner.run(&cmd).await?;
            }
        }

        output.status(
            "Building",
            &format!("{} ({})", t.unit.name_ver(), t.unit.component),
        );
        let _timing = TimingGuard::new(format!("build {}", t.unit.name_ver()));
        for cmd in compiler.build_commands(&t.unit) {
            runner.run(&cmd).await?;
        }

        let key = t.unit.pkg_key();
        let left = remaining.get_mut(&key).expect("package is counted");
        *left -= 1;
        if *left == 0 {
            for cmd in &staging[&key] {
                runner.run(cmd).await?;
            }
            output.status("Registered", &t.unit.name_ver());
        }
    }

    Ok(())
}

// ─── Bounded-parallel strategy ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NodeKey {
    Pkg(PkgName, Version),
    Unit(UnitId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Pending,
    Done,
    Failed,
}

/// Commands shared by all unit nodes of one package, run by whichever node
/// finishes last.
struct PkgCompletion {
    remaining: AtomicUsize,
    staging: Vec<CommandSpec>,
}

struct AsyncNode {
    key: NodeKey,
    label: String,
    preds: Vec<NodeKey>,
    cmds: Vec<CommandSpec>,
    completion: Option<Arc<PkgCompletion>>,
}

async fn run_async_strategy(
    tagged: &[TaggedUnit],
    compiler: &UnitCompiler,
    dbs: &PkgDbDirs,
    jobs: usize,
    options: &BuildOptions,
    output: &Output,
) -> Result<()> {
    // Setup sources are ensured up front; everything else happens in tasks.
    for t in tagged {
        if t.setup_owner.is_none() {
            ensure_setup_source(&compiler.src_dir(&t.unit))?;
        }
    }

    let nodes = make_async_nodes(tagged, compiler, dbs, options);
    run_async(nodes, Semaphore::bounded(jobs), output).await
}

/// Build the dual DAG.
///
/// The package node's predecessors are the unit nodes of the owner's setup
/// dependencies; a unit node's predecessors are its own package node plus
/// the unit nodes of its library and build-tool dependencies. Edges to
/// anything outside the tagged set are dropped as already complete.
fn make_async_nodes(
    tagged: &[TaggedUnit],
    compiler: &UnitCompiler,
    dbs: &PkgDbDirs,
    options: &BuildOptions,
) -> Vec<AsyncNode> {
    let in_plan: std::collections::HashSet<&UnitId> =
        tagged.iter().map(|t| &t.unit.id).collect();
    let unit_edge = |dep: &UnitId| -> Option<NodeKey> {
        in_plan.get(dep).map(|_| NodeKey::Unit(dep.clone()))
    };

    let groups = package_groups(tagged);
    let completions: HashMap<PkgKey, Arc<PkgCompletion>> = groups
        .iter()
        .map(|(key, units)| {
            let completion = Arc::new(PkgCompletion {
                remaining: AtomicUsize::new(units.len()),
                staging: staging_for(dbs, units, options),
            });
            (key.clone(), completion)
        })
        .collect();

    let mut nodes = Vec::with_capacity(tagged.len() + groups.len());

    for t in tagged {
        let (name, version) = t.unit.pkg_key();
        if t.setup_owner.is_none() {
            nodes.push(AsyncNode {
                key: NodeKey::Pkg(name.clone(), version.clone()),
                label: format!("setup {}", t.unit.name_ver()),
                preds: t.unit.setup_depends.iter().filter_map(unit_edge).collect(),
                cmds: compiler.setup_commands(&t.unit),
                completion: None,
            });
        }

        let mut preds = vec![NodeKey::Pkg(name.clone(), version.clone())];
        preds.extend(t.unit.depends.iter().filter_map(unit_edge));
        preds.extend(t.unit.exe_depends.iter().filter_map(unit_edge));

        nodes.push(AsyncNode {
            key: NodeKey::Unit(t.unit.id.clone()),
            label: format!("{} ({})", t.unit.name_ver(), t.unit.component),
            preds,
            cmds: compiler.build_commands(&t.unit),
            completion: Some(Arc::clone(&completions[&t.unit.pkg_key()])),
        });
    }

    nodes
}

/// Spawn every node, wiring completion events through watch channels
/// created up front, and surface the first failure.
///
/// A node whose predecessor fails marks itself failed without running, so
/// dependents never start; unrelated in-flight nodes finish naturally.
async fn run_async(nodes: Vec<AsyncNode>, sem: Semaphore, output: &Output) -> Result<()> {
    let mut senders: HashMap<NodeKey, watch::Sender<NodeState>> = HashMap::new();
    let mut receivers: HashMap<NodeKey, watch::Receiver<NodeState>> = HashMap::new();
    for node in &nodes {
        let (tx, rx) = watch::channel(NodeState::Pending);
        senders.insert(node.key.clone(), tx);
        receivers.insert(node.key.clone(), rx);
    }

    let runner = ProcessRunner::new();
    let mut tasks: JoinSet<Result<()>> = JoinSet::new();

    for node in nodes {
        let tx = senders.remove(&node.key).expect("sender exists per node");
        let preds: Vec<watch::Receiver<NodeState>> = node
            .preds
            .iter()
            .filter_map(|key| receivers.get(key).cloned())
            .collect();
        let sem = sem.clone();
        let runner = runner.clone();
        let output = output.clone();

        tasks.spawn(async move {
            for mut rx in preds {
                let state = match rx.wait_for(|s| *s != NodeState::Pending).await {
                    Ok(guard) => *guard,
                    // Sender gone without completing: treat as failed.
                    Err(_) => NodeState::Failed,
                };
                if state == NodeState::Failed {
                    debug!("Skipping {}: predecessor failed", node.label);
                    let _ = tx.send(NodeState::Failed);
                    return Ok(());
                }
            }

            let result = sem
                .with_token(async {
                    output.status("Building", &node.label);
                    let _timing = TimingGuard::new(node.label.clone());
                    for cmd in &node.cmds {
                        runner.run(cmd).await?;
                    }
                    if let Some(completion) = &node.completion {
                        if completion.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                            for cmd in &completion.staging {
                                runner.run(cmd).await?;
                            }
                        }
                    }
                    Ok(())
                })
                .await;

            match result {
                Ok(()) => {
                    let _ = tx.send(NodeState::Done);
                    Ok(())
                }
                Err(e) => {
                    let _ = tx.send(NodeState::Failed);
                    Err(e)
                }
            }
        });
    }

    // The first failure is what the run reports; later ones are only
    // surfaced as warnings so in-flight siblings still drain.
    let mut first_error: Option<Error> = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                if first_error.is_none() {
                    first_error = Some(e);
                } else {
                    output.warn(&format!("also failed: {}", e));
                }
            }
            Err(join_err) => {
                if first_error.is_none() {
                    first_error = Some(Error::Other(join_err.into()));
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

// ─── Script strategy ─────────────────────────────────────────────────────

fn emit_script(
    tagged: &[TaggedUnit],
    compiler: &UnitCompiler,
    dbs: &PkgDbDirs,
    options: &BuildOptions,
    path: &Path,
    output: &Output,
) -> Result<()> {
    let groups = package_groups(tagged);
    let mut remaining: HashMap<PkgKey, usize> = groups
        .iter()
        .map(|(key, units)| (key.clone(), units.len()))
        .collect();
    let staging: HashMap<PkgKey, Vec<CommandSpec>> = groups
        .iter()
        .map(|(key, units)| (key.clone(), staging_for(dbs, units, options)))
        .collect();

    let mut buf = ScriptBuffer::new();
    buf.comment("Generated by benv; reproduces the build against the same");
    buf.comment("fetch and install directories.");
    buf.raw(format!(
        "mkdir -p {} {}",
        sh_quote(&dbs.temp_db.to_string_lossy()),
        sh_quote(&dbs.final_db.to_string_lossy()),
    ));
    buf.blank();

    for t in tagged {
        if t.setup_owner.is_none() {
            buf.comment(&format!("setup: {}", t.unit.name_ver()));
            buf.raw(setup_source_guard(&compiler.src_dir(&t.unit)));
            for cmd in compiler.setup_commands(&t.unit) {
                buf.command(&cmd);
            }
            buf.blank();
        }

        buf.comment(&format!("build: {} ({})", t.unit.name_ver(), t.unit.component));
        for cmd in compiler.build_commands(&t.unit) {
            buf.command(&cmd);
        }
        buf.blank();

        let key = t.unit.pkg_key();
        let left = remaining.get_mut(&key).expect("package is counted");
        *left -= 1;
        if *left == 0 && !staging[&key].is_empty() {
            buf.comment(&format!("register: {}", t.unit.name_ver()));
            for cmd in &staging[&key] {
                buf.command(cmd);
            }
            buf.blank();
        }
    }

    buf.append_to(path)?;
    output.status("Wrote", &path.display().to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{uniform_unit_args, UnitArgs};
    use benv_plan::{ComponentKind, ComponentName, FlagSpec, PkgSrc, PlanUnit};

    fn unit(
        pkg: &str,
        ver: &str,
        kind: ComponentKind,
        comp: &str,
        deps: &[&str],
    ) -> ConfiguredUnit {
        ConfiguredUnit {
            id: UnitId::new(format!("{}-{}-{}", pkg, ver, comp)),
            pkg_name: PkgName::from(pkg),
            version: Version::from(ver),
            component: ComponentName {
                kind,
                name: comp.to_string(),
            },
            src: PkgSrc::Remote,
            flags: FlagSpec::default(),
            setup_depends: Vec::new(),
            depends: deps.iter().map(|d| UnitId::from(*d)).collect(),
            exe_depends: Vec::new(),
        }
    }

    fn options(strategy: BuildStrategy) -> BuildOptions {
        BuildOptions {
            strategy,
            toolchain: Toolchain::default(),
            unit_args: uniform_unit_args(UnitArgs::default()),
        }
    }

    fn silent() -> Output {
        Output::with_verbosity(benv_ui::Verbosity::Silent)
    }

    #[tokio::test]
    async fn test_script_mode_emits_blocks_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let fetch = tmp.path().join("fetch");
        std::fs::create_dir_all(&fetch).unwrap();
        let dest = DestDir::new(&tmp.path().join("stage"), Path::new("/opt/out")).unwrap();
        let script = tmp.path().join("out.sh");

        let lib = unit("bar", "2.0", ComponentKind::Lib, "bar", &[]);
        let exe = unit("bar", "2.0", ComponentKind::Exe, "mybar", &["bar-2.0-bar"]);
        let plan = CabalPlan::new(vec![
            PlanUnit::Configured(lib),
            PlanUnit::Configured(exe),
        ]);

        build_plan(
            &plan,
            &fetch,
            &dest,
            &options(BuildStrategy::Script(script.clone())),
            &silent(),
        )
        .await
        .unwrap();

        let contents = std::fs::read_to_string(&script).unwrap();
        assert!(contents.starts_with("#!/bin/sh\nset -eu\n"));

        // One setup block (the library owns it), then lib and exe builds,
        // then final staging.
        assert_eq!(contents.matches("# setup:").count(), 1);
        let setup_pos = contents.find("# setup: bar-2.0").unwrap();
        let lib_pos = contents.find("--lib=bar").unwrap();
        let exe_pos = contents.find("--exe=mybar").unwrap();
        let register_pos = contents.find("# register: bar-2.0").unwrap();
        assert!(setup_pos < lib_pos);
        assert!(lib_pos < exe_pos);
        assert!(exe_pos < register_pos);

        // The exe block has no register step of its own.
        let exe_block = &contents[exe_pos..register_pos];
        assert!(!exe_block.contains("--gen-pkg-config"));

        // Package databases were still prepared on disk.
        assert!(fetch.join("package.conf").is_dir());
        assert!(dest.install_dir.join("package.conf").is_dir());
    }

    #[tokio::test]
    async fn test_cycle_fails_before_any_output() {
        let tmp = tempfile::tempdir().unwrap();
        let fetch = tmp.path().join("fetch");
        std::fs::create_dir_all(&fetch).unwrap();
        let dest = DestDir::new(&tmp.path().join("stage"), Path::new("/opt/out")).unwrap();
        let script = tmp.path().join("out.sh");

        let u = unit("u", "1", ComponentKind::Lib, "u", &["v-1-v"]);
        let v = unit("v", "1", ComponentKind::Lib, "v", &["u-1-u"]);
        let plan = CabalPlan::new(vec![PlanUnit::Configured(u), PlanUnit::Configured(v)]);

        let err = build_plan(
            &plan,
            &fetch,
            &dest,
            &options(BuildStrategy::Script(script.clone())),
            &silent(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::PlanCyclic { .. }));
        assert!(!script.exists());
    }

    #[tokio::test]
    async fn test_empty_plan_is_a_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        let fetch = tmp.path().join("fetch");
        std::fs::create_dir_all(&fetch).unwrap();
        let dest = DestDir::new(&tmp.path().join("stage"), Path::new("/opt/out")).unwrap();

        let plan = CabalPlan::default();
        build_plan(&plan, &fetch, &dest, &options(BuildStrategy::TopoSort), &silent())
            .await
            .unwrap();
    }

    #[cfg(unix)]
    fn log_node(key: NodeKey, log: &Path, tag: &str, preds: Vec<NodeKey>) -> AsyncNode {
        let cmd = CommandSpec::new("sh").arg("-c").arg(format!(
            "echo {} >> {}",
            tag,
            log.display()
        ));
        AsyncNode {
            key,
            label: tag.to_string(),
            preds,
            cmds: vec![cmd],
            completion: None,
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_async_respects_happens_before() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("log");

        let pkg = NodeKey::Pkg(PkgName::from("p"), Version::from("1"));
        let a = NodeKey::Unit(UnitId::from("a"));
        let b = NodeKey::Unit(UnitId::from("b"));

        // b depends on a; both depend on the package node.
        let nodes = vec![
            log_node(b.clone(), &log, "b", vec![pkg.clone(), a.clone()]),
            log_node(a.clone(), &log, "a", vec![pkg.clone()]),
            log_node(pkg.clone(), &log, "setup", vec![]),
        ];

        run_async(nodes, Semaphore::bounded(4), &silent())
            .await
            .unwrap();

        let lines: Vec<String> = std::fs::read_to_string(&log)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        assert_eq!(lines, vec!["setup", "a", "b"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_async_failure_skips_dependents() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("log");

        let bad = NodeKey::Unit(UnitId::from("bad"));
        let child = NodeKey::Unit(UnitId::from("child"));
        let bystander = NodeKey::Unit(UnitId::from("bystander"));

        let mut bad_node = log_node(bad.clone(), &log, "bad", vec![]);
        bad_node.cmds = vec![CommandSpec::new("sh").arg("-c").arg("exit 7")];

        let nodes = vec![
            bad_node,
            log_node(child.clone(), &log, "child", vec![bad.clone()]),
            log_node(bystander.clone(), &log, "bystander", vec![]),
        ];

        let err = run_async(nodes, Semaphore::bounded(2), &silent())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CommandFailed { exit_code: Some(7), .. }));

        let contents = std::fs::read_to_string(&log).unwrap_or_default();
        // The dependent never ran; the unrelated node was allowed to finish.
        assert!(!contents.contains("child"));
        assert!(contents.contains("bystander"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_async_package_completion_runs_once() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("log");

        let completion = Arc::new(PkgCompletion {
            remaining: AtomicUsize::new(2),
            staging: vec![CommandSpec::new("sh").arg("-c").arg(format!(
                "echo staged >> {}",
                log.display()
            ))],
        });

        let mut first = log_node(NodeKey::Unit(UnitId::from("one")), &log, "one", vec![]);
        first.completion = Some(Arc::clone(&completion));
        let mut second = log_node(NodeKey::Unit(UnitId::from("two")), &log, "two", vec![]);
        second.completion = Some(Arc::clone(&completion));

        run_async(vec![first, second], Semaphore::none(), &silent())
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&log).unwrap();
        assert_eq!(contents.matches("staged").count(), 1);
        // Staging ran after both units.
        assert!(contents.trim_end().ends_with("staged"));
    }

    #[test]
    fn test_make_async_nodes_graph_shape() {
        let tmp = tempfile::tempdir().unwrap();
        let fetch = tmp.path().join("fetch");
        std::fs::create_dir_all(&fetch).unwrap();
        let dest = DestDir::new(&tmp.path().join("stage"), Path::new("/opt/out")).unwrap();
        let dbs = package_db::prepare(&fetch, &dest.install_dir).unwrap();

        let mut lib = unit("p", "1", ComponentKind::Lib, "p", &[]);
        lib.setup_depends = vec![UnitId::from("q-1-q")];
        let exe = unit("p", "1", ComponentKind::Exe, "tool", &["p-1-p"]);
        let q = unit("q", "1", ComponentKind::Lib, "q", &[]);

        let plan = CabalPlan::new(vec![
            PlanUnit::Configured(q.clone()),
            PlanUnit::Configured(lib.clone()),
            PlanUnit::Configured(exe.clone()),
        ]);
        let opts = options(BuildStrategy::Async(2));
        let compiler = UnitCompiler::new(
            &plan,
            fetch.clone(),
            dest,
            dbs.clone(),
            Toolchain::default(),
            opts.unit_args.clone(),
        );

        let sorted = sort_plan(&plan).unwrap();
        let tagged = tag_setup_owners(sorted);
        let nodes = make_async_nodes(&tagged, &compiler, &dbs, &opts);

        // Two packages plus three units.
        assert_eq!(nodes.len(), 5);

        let p_pkg = NodeKey::Pkg(PkgName::from("p"), Version::from("1"));
        let pkg_node = nodes.iter().find(|n| n.key == p_pkg).unwrap();
        assert_eq!(pkg_node.preds, vec![NodeKey::Unit(UnitId::from("q-1-q"))]);

        let exe_node = nodes
            .iter()
            .find(|n| n.key == NodeKey::Unit(exe.id.clone()))
            .unwrap();
        assert!(exe_node.preds.contains(&p_pkg));
        assert!(exe_node.preds.contains(&NodeKey::Unit(lib.id.clone())));
    }
}
