// tests/resolution.rs

//! Resolution engine behaviour against in-memory indexes and a scripted
//! installer.

mod common;

use common::*;
use pysolver::resolver::{ErrorDetails, IndexVersions};
use pysolver::{
    Error, ErrorKind, GateConfig, IndexSolver, MarkerEnvironment, ResolutionEngine,
    ResolutionReport, SolverConfig, StaticIndex, TraversalOrder, VersionSelection,
};
use std::collections::HashSet;

fn environment() -> MarkerEnvironment {
    MarkerEnvironment::for_host("3.8.10")
}

fn run(
    config: &SolverConfig,
    solvers: &[IndexSolver<StaticIndex>],
    installer: &FakeInstaller,
    items: &[&str],
) -> pysolver::Result<ResolutionReport> {
    let env = environment();
    ResolutionEngine::new(config, solvers, installer, &env).run(&requirements(items))
}

fn pypi() -> Vec<IndexSolver<StaticIndex>> {
    vec![IndexSolver::new(flask_index(PYPI), VersionSelection::All)]
}

fn resolved(report: &ResolutionReport) -> Vec<String> {
    let mut pairs: Vec<String> = report
        .tree
        .iter()
        .map(|n| format!("{}=={}", n.package_name, n.package_version_requested))
        .collect();
    pairs.sort();
    pairs
}

#[test]
fn test_transitive_graph_is_deduplicated() {
    let installer = flask_installer();
    let report = run(&SolverConfig::default(), &pypi(), &installer, &["flask>=1.0"]).unwrap();

    assert_eq!(
        resolved(&report),
        vec![
            "flask==1.0",
            "itsdangerous==1.1.0",
            "jinja2==2.10",
            "jinja2==2.11",
            "markupsafe==1.1.1",
            "werkzeug==0.14",
            "werkzeug==0.15",
        ]
    );

    // markupsafe is required by both jinja2 releases but probed once
    let installed = installer.installed();
    let unique: HashSet<&String> = installed.iter().collect();
    assert_eq!(unique.len(), installed.len());
    assert_eq!(installer.released(), installed);

    assert!(report.errors.is_empty());
    assert!(report.unparsed.is_empty());
    assert!(report.unresolved.is_empty());
    assert!(report.environment.is_some());
}

#[test]
fn test_lifo_traversal_order() {
    let installer = flask_installer();
    run(&SolverConfig::default(), &pypi(), &installer, &["flask>=1.0"]).unwrap();
    assert_eq!(
        installer.installed(),
        vec![
            "flask==1.0",
            "itsdangerous==1.1.0",
            "jinja2==2.11",
            "markupsafe==1.1.1",
            "jinja2==2.10",
            "werkzeug==0.15",
            "werkzeug==0.14",
        ]
    );
}

#[test]
fn test_fifo_traversal_order() {
    let config = SolverConfig {
        traversal: TraversalOrder::Fifo,
        ..Default::default()
    };
    let installer = flask_installer();
    run(&config, &pypi(), &installer, &["flask>=1.0"]).unwrap();
    assert_eq!(
        installer.installed(),
        vec![
            "flask==1.0",
            "werkzeug==0.14",
            "werkzeug==0.15",
            "jinja2==2.10",
            "jinja2==2.11",
            "itsdangerous==1.1.0",
            "markupsafe==1.1.1",
        ]
    );
}

#[test]
fn test_dependency_records() {
    let report = run(
        &SolverConfig::default(),
        &pypi(),
        &flask_installer(),
        &["flask>=1.0"],
    )
    .unwrap();

    let flask = report.node("Flask", "1.0").unwrap();
    assert_eq!(flask.index_url, PYPI);
    assert_eq!(flask.sha256, vec!["aa11"]);
    assert_eq!(flask.dependencies.len(), 3);

    let werkzeug = &flask.dependencies[0];
    assert_eq!(werkzeug.package_name, "Werkzeug");
    assert_eq!(werkzeug.normalized_package_name, "werkzeug");
    assert_eq!(werkzeug.specifier.as_deref(), Some(">=0.14"));
    assert_eq!(werkzeug.marker_evaluation_result, Some(true));
    assert_eq!(
        werkzeug.resolved_versions,
        vec![IndexVersions {
            versions: vec!["0.14".to_string(), "0.15".to_string()],
            index: PYPI.to_string(),
        }]
    );

    let itsdangerous = &flask.dependencies[2];
    assert!(itsdangerous.specifier.is_none());
    assert_eq!(itsdangerous.resolved_versions[0].versions, vec!["1.1.0"]);
}

#[test]
fn test_markers_do_not_gate_traversal() {
    let installer = FakeInstaller::new().with(
        "flask==1.0",
        &["itsdangerous; python_version < \"3\"", "Jinja2>=2.11; extra == 'i18n'"],
    );
    let report = run(&SolverConfig::default(), &pypi(), &installer, &["flask==1.0"]).unwrap();

    let flask = report.node("flask", "1.0").unwrap();
    assert_eq!(flask.dependencies[0].marker_evaluation_result, Some(false));
    assert_eq!(flask.dependencies[1].extra, vec!["i18n"]);
    assert_eq!(flask.dependencies[1].marker_evaluation_result, Some(true));

    assert!(report.node("itsdangerous", "1.1.0").is_some());
    assert!(report.node("jinja2", "2.11").is_some());
}

#[test]
fn test_unparseable_dependency_is_skipped() {
    let installer = FakeInstaller::new().with("flask==1.0", &["itsdangerous", "Jinja2 (>=2.10"]);
    let report = run(&SolverConfig::default(), &pypi(), &installer, &["flask==1.0"]).unwrap();

    let flask = report.node("flask", "1.0").unwrap();
    assert_eq!(flask.dependencies.len(), 1);
    assert_eq!(resolved(&report), vec!["flask==1.0", "itsdangerous==1.1.0"]);
}

#[test]
fn test_unparsed_and_unresolved_roots() {
    let report = run(
        &SolverConfig::default(),
        &pypi(),
        &flask_installer(),
        &["flask[", "six", "flask>=5.0"],
    )
    .unwrap();

    assert!(report.tree.is_empty());
    assert_eq!(report.unparsed.len(), 1);
    assert_eq!(report.unparsed[0].requirement, "flask[");
    assert!(!report.unparsed[0].details.is_empty());

    assert_eq!(report.unresolved.len(), 2);
    let six = &report.unresolved[0];
    assert_eq!(six.package_name, "six");
    assert_eq!(six.version_spec, "");
    assert_eq!(six.index_url, PYPI);
    assert!(!six.is_provided);

    let flask = &report.unresolved[1];
    assert_eq!(flask.version_spec, ">=5.0");
    assert!(flask.is_provided);
}

#[test]
fn test_excluded_root_is_skipped() {
    let config = SolverConfig {
        exclude_packages: ["Flask".to_string()].into_iter().collect(),
        ..Default::default()
    };
    let installer = flask_installer();
    let report = run(&config, &pypi(), &installer, &["flask", "itsdangerous"]).unwrap();

    assert_eq!(resolved(&report), vec!["itsdangerous==1.1.0"]);
    assert!(report.unresolved.is_empty());
}

#[test]
fn test_install_failure_is_recorded() {
    let installer = flask_installer().with_probe("werkzeug==0.15", Probe::InstallFails);
    let report = run(&SolverConfig::default(), &pypi(), &installer, &["flask>=1.0"]).unwrap();

    assert_eq!(report.tree.len(), 6);
    assert!(report.node("werkzeug", "0.15").is_none());

    assert_eq!(report.errors.len(), 1);
    let error = &report.errors[0];
    assert_eq!(error.package_name, "werkzeug");
    assert_eq!(error.package_version, "0.15");
    assert_eq!(error.kind, ErrorKind::CommandError);
    assert!(error.is_provided);
    match &error.details {
        ErrorDetails::Command(details) => {
            assert_eq!(details.return_code, Some(1));
            assert!(details.stderr.contains("No matching distribution"));
        }
        other => panic!("unexpected details: {other:?}"),
    }
}

#[test]
fn test_not_site_package_is_recorded() {
    let installer = flask_installer().with_probe("itsdangerous==1.1.0", Probe::NotSitePackage);
    let report = run(&SolverConfig::default(), &pypi(), &installer, &["flask>=1.0"]).unwrap();

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, ErrorKind::NotSitePackage);
    // The failed probe is still released
    assert!(installer.released().contains(&"itsdangerous==1.1.0".to_string()));
}

#[test]
fn test_environment_failure_aborts() {
    let installer = flask_installer().with_probe("flask==1.0", Probe::EnvironmentGone);
    let result = run(&SolverConfig::default(), &pypi(), &installer, &["flask>=1.0"]);
    assert!(matches!(result, Err(Error::EnvironmentError(_))));
}

#[test]
fn test_installed_version_mismatch() {
    let installer = FakeInstaller::new().with_probe(
        "flask==1.0",
        Probe::Reports {
            version: "1.0.1".to_string(),
            requires: Vec::new(),
        },
    );
    let report = run(&SolverConfig::default(), &pypi(), &installer, &["flask==1.0"]).unwrap();

    let flask = &report.tree[0];
    assert_eq!(flask.package_version, "1.0.1");
    assert_eq!(flask.package_version_requested, "1.0");
    assert_eq!(flask.sha256, vec!["aa11"]);
}

#[test]
fn test_no_transitive_probes_roots_only() {
    let config = SolverConfig {
        transitive: false,
        ..Default::default()
    };
    let installer = flask_installer();
    let report = run(&config, &pypi(), &installer, &["flask>=1.0"]).unwrap();

    assert_eq!(resolved(&report), vec!["flask==1.0"]);
    // Dependencies are still matched against the index
    let flask = &report.tree[0];
    assert_eq!(flask.dependencies[1].resolved_versions[0].versions, vec!["2.10", "2.11"]);
}

#[test]
fn test_highest_selection() {
    let solvers = vec![IndexSolver::new(flask_index(PYPI), VersionSelection::Highest)];
    let report = run(&SolverConfig::default(), &solvers, &flask_installer(), &["flask"]).unwrap();
    assert_eq!(
        resolved(&report),
        vec![
            "flask==1.0",
            "itsdangerous==1.1.0",
            "jinja2==2.11",
            "markupsafe==1.1.1",
            "werkzeug==0.15",
        ]
    );
}

#[test]
fn test_gate_already_reported_is_not_queued() {
    let gate = RecordingGate::skipping(&["jinja2==2.11"]);
    let installer = flask_installer();
    let env = environment();
    let config = SolverConfig::default();
    let solvers = pypi();
    let report = ResolutionEngine::new(&config, &solvers, &installer, &env)
        .with_gate(&gate)
        .run(&requirements(&["flask>=1.0"]))
        .unwrap();

    assert!(report.node("jinja2", "2.11").is_none());
    assert!(report.node("jinja2", "2.10").is_some());
    assert!(report.node("markupsafe", "1.1.1").is_some());
    assert!(report.errors.is_empty());
    assert!(!installer.installed().contains(&"jinja2==2.11".to_string()));

    let queries = gate.queries.borrow();
    assert!(queries.contains(&format!("jinja2==2.11 {}", PYPI)));
    // Roots are never gated
    assert!(!queries.iter().any(|q| q.starts_with("flask==")));
    // Each release is asked about at most once
    let unique: HashSet<&String> = queries.iter().collect();
    assert_eq!(unique.len(), queries.len());
}

#[test]
fn test_gate_exhaustion_aborts() {
    let gate = RecordingGate::failing();
    let env = environment();
    let config = SolverConfig::default();
    let solvers = pypi();
    let installer = flask_installer();
    let result = ResolutionEngine::new(&config, &solvers, &installer, &env)
        .with_gate(&gate)
        .run(&requirements(&["flask>=1.0"]));

    let err = result.unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, Error::SubgraphGateExhausted { .. }));
}

#[test]
fn test_multiple_indexes() {
    let solvers = vec![
        IndexSolver::new(flask_index(PYPI), VersionSelection::All),
        IndexSolver::new(
            StaticIndex::new(MIRROR)
                .with_releases("flask", &["1.0"])
                .with_releases("werkzeug", &["0.16"]),
            VersionSelection::All,
        ),
    ];
    let installer = FakeInstaller::new().with("flask==1.0", &["Werkzeug>=0.14"]);
    let report = run(&SolverConfig::default(), &solvers, &installer, &["flask==1.0"]).unwrap();

    let pypi_flask = report
        .tree
        .iter()
        .find(|n| n.package_name == "flask" && n.index_url == PYPI)
        .unwrap();
    assert_eq!(
        pypi_flask.dependencies[0].resolved_versions,
        vec![
            IndexVersions {
                versions: vec!["0.14".to_string(), "0.15".to_string()],
                index: PYPI.to_string(),
            },
            IndexVersions {
                versions: vec!["0.16".to_string()],
                index: MIRROR.to_string(),
            },
        ]
    );

    // Each index run starts from a fresh visited set
    let per_index = |url: &str| report.tree.iter().filter(|n| n.index_url == url).count();
    assert_eq!(per_index(PYPI), 4);
    assert_eq!(per_index(MIRROR), 4);
}

#[test]
fn test_invalid_configuration_aborts_before_probing() {
    let config = SolverConfig {
        transitive: false,
        subgraph_check: Some(GateConfig::new("https://gate.example.com/check", "solver")),
        ..Default::default()
    };
    let installer = flask_installer();
    let result = run(&config, &pypi(), &installer, &["flask"]);

    assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    assert!(installer.installed().is_empty());
}

#[test]
fn test_report_serialization() {
    let installer = flask_installer().with_probe("werkzeug==0.14", Probe::InstallFails);
    let report = run(
        &SolverConfig::default(),
        &pypi(),
        &installer,
        &["flask>=1.0", "flask["],
    )
    .unwrap();

    let value = serde_json::to_value(&report).unwrap();
    for key in [
        "tree",
        "errors",
        "unparsed",
        "unresolved",
        "environment",
        "environment_packages",
    ] {
        assert!(value.get(key).is_some(), "missing {key}");
    }
    assert_eq!(value["errors"][0]["type"], "command_error");
    assert_eq!(value["environment"]["python_version"], "3.8");
    assert_eq!(value["tree"][0]["package_name"], "flask");
}
