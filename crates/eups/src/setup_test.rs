// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;
use crate::fixtures::{StackBuilder, tmpdir};

const P_TABLE: &str = r#"
setupRequired(q)
setupOptional(missing)
envPrepend(PATH, ${PRODUCT_DIR}/bin)
envSet(P_MODE, on)
"#;

struct TestStack {
    _tmpdir: TempDir,
    builder: StackBuilder,
}

impl TestStack {
    fn eups(&self, options: SetupOptions) -> Eups {
        Eups::new(vec![self.builder.stack()], options)
    }
}

#[fixture]
fn stack(tmpdir: TempDir) -> TestStack {
    let builder = StackBuilder::new(tmpdir.path());
    builder
        .product("p", "1.0", "Linux", Some(P_TABLE))
        .tag("p", "current", "Linux", "1.0")
        .product("q", "1.0", "Linux", Some("envAppend(Q_LIST, one)\n"))
        .product("q", "2.0", "Linux", Some("envAppend(Q_LIST, two)\n"))
        .tag("q", "current", "Linux", "1.0");
    TestStack {
        _tmpdir: tmpdir,
        builder,
    }
}

fn linux() -> SetupOptions {
    SetupOptions {
        flavor: Flavor::new("Linux"),
        ..SetupOptions::default()
    }
}

fn setup(name: &str) -> SetupRequest {
    SetupRequest::setup(ProductRequest::named(name))
}

fn statuses(report: &SetupReport) -> Vec<(&str, &str, SetupStatus)> {
    report
        .records
        .iter()
        .map(|r| (r.name.as_str(), r.version.as_str(), r.status))
        .collect()
}

#[rstest]
fn test_setup_with_dependencies(stack: TestStack) {
    let eups = stack.eups(linux());
    let mut ctx = EnvironmentContext::from_vars([("PATH", "/usr/bin")]);
    let report = eups.setup(&setup("p"), &mut ctx).unwrap();

    assert_eq!(
        statuses(&report),
        vec![
            ("p", "1.0", SetupStatus::Setup),
            ("q", "1.0", SetupStatus::Setup),
        ]
    );
    let p_dir = stack.builder.root().join("Linux/p/1.0");
    assert_eq!(
        ctx.get("PATH"),
        Some(format!("{}/bin:/usr/bin", p_dir.display()).as_str())
    );
    assert_eq!(ctx.get("P_MODE"), Some("on"));
    assert_eq!(ctx.get("Q_LIST"), Some("one"));
    assert_eq!(ctx.get("P_DIR"), Some(&*p_dir.to_string_lossy()));
    assert_eq!(
        ctx.get("SETUP_Q"),
        Some(format!("q 1.0 -f Linux -Z {}", stack.builder.root().display()).as_str())
    );
}

#[rstest]
fn test_max_depth_zero_skips_dependencies(stack: TestStack) {
    let eups = stack.eups(SetupOptions {
        max_depth: Some(0),
        ..linux()
    });
    let mut ctx = EnvironmentContext::new();
    let report = eups.setup(&setup("p"), &mut ctx).unwrap();

    assert_eq!(ctx.get("P_MODE"), Some("on"));
    assert!(!ctx.contains("SETUP_Q"));
    assert!(!ctx.contains("Q_LIST"));
    assert_eq!(
        statuses(&report),
        vec![
            ("p", "1.0", SetupStatus::Setup),
            ("q", "", SetupStatus::Listed),
            ("missing", "", SetupStatus::Listed),
        ]
    );
    assert!(report.find("missing").unwrap().optional);
}

#[rstest]
fn test_exact_missing_version_applies_nothing(stack: TestStack) {
    let eups = stack.eups(SetupOptions {
        exact: true,
        ..linux()
    });
    let mut ctx = EnvironmentContext::new();
    let request = SetupRequest::setup(
        ProductRequest::named("p").with_version("3.0".parse().unwrap()),
    );
    let err = eups.setup(&request, &mut ctx).unwrap_err();
    match err {
        Error::ProductNotFound { name, version, .. } => {
            assert_eq!(name, "p");
            assert_eq!(version.as_deref(), Some("3.0"));
        }
        other => panic!("expected ProductNotFound, got {other:?}"),
    }
    assert!(ctx.journal().is_empty());
    assert!(!ctx.contains("P_MODE"));
}

#[rstest]
fn test_unsetup_restores_environment(stack: TestStack) {
    let eups = stack.eups(linux());
    let mut ctx = EnvironmentContext::from_vars([("PATH", "/usr/bin")]);
    eups.setup(&setup("p"), &mut ctx).unwrap();

    let request = SetupRequest::unsetup(ProductRequest::named("p"));
    let report = eups.setup(&request, &mut ctx).unwrap();
    assert_eq!(
        statuses(&report),
        vec![
            ("p", "1.0", SetupStatus::Unsetup),
            ("q", "1.0", SetupStatus::Unsetup),
        ]
    );
    assert_eq!(ctx.get("PATH"), Some("/usr/bin"));
    assert_eq!(ctx.get("Q_LIST"), Some(""));
    for var in ["P_MODE", "SETUP_P", "P_DIR", "SETUP_Q", "Q_DIR"] {
        assert!(!ctx.contains(var), "{var} should be unset");
    }
}

#[rstest]
fn test_unsetup_in_fresh_environment(stack: TestStack) {
    let eups = stack.eups(linux());
    let mut first = EnvironmentContext::new();
    eups.setup(&setup("p"), &mut first).unwrap();

    // A later invocation only sees the resulting variables.
    let mut ctx = EnvironmentContext::from_vars(first.vars().clone());
    let request = SetupRequest::unsetup(ProductRequest::named("p"));
    eups.setup(&request, &mut ctx).unwrap();
    assert!(!ctx.contains("P_MODE"));
    assert!(!ctx.contains("SETUP_Q"));
    assert_eq!(ctx.get("PATH"), Some(""));
}

#[rstest]
fn test_unsetup_inactive_product(stack: TestStack) {
    let eups = stack.eups(linux());
    let mut ctx = EnvironmentContext::new();
    let request = SetupRequest::unsetup(ProductRequest::named("p"));
    let err = eups.setup(&request, &mut ctx).unwrap_err();
    assert!(matches!(err, Error::ProductNotSetup { .. }));
}

fn with_q(eups: &Eups, version: &str) -> EnvironmentContext {
    let mut ctx = EnvironmentContext::new();
    let request = SetupRequest::setup(
        ProductRequest::named("q").with_version(version.parse().unwrap()),
    );
    eups.setup(&request, &mut ctx).unwrap();
    ctx
}

#[rstest]
fn test_dependency_version_conflict(stack: TestStack) {
    stack
        .builder
        .product("r", "1.0", "Linux", Some("setupRequired(q 2.0)\n"))
        .tag("r", "current", "Linux", "1.0");
    let eups = stack.eups(linux());
    let mut ctx = with_q(&eups, "1.0");

    let err = eups.setup(&setup("r"), &mut ctx).unwrap_err();
    match err {
        Error::VersionConflict {
            name,
            active_version,
            requested_version,
        } => {
            assert_eq!(name, "q");
            assert_eq!(active_version, "1.0");
            assert_eq!(requested_version, "2.0");
        }
        other => panic!("expected VersionConflict, got {other:?}"),
    }
}

#[rstest]
fn test_keep_leaves_active_dependency(stack: TestStack) {
    stack
        .builder
        .product("r", "1.0", "Linux", Some("setupRequired(q 2.0)\n"))
        .tag("r", "current", "Linux", "1.0");
    let eups = stack.eups(SetupOptions {
        keep: true,
        ..linux()
    });
    let mut ctx = with_q(&eups, "1.0");

    let report = eups.setup(&setup("r"), &mut ctx).unwrap();
    assert_eq!(report.find("q").unwrap().status, SetupStatus::Kept);
    assert_eq!(ctx.get("Q_LIST"), Some("one"));
    assert!(ctx.get("SETUP_Q").unwrap().starts_with("q 1.0 "));
}

#[rstest]
fn test_force_replaces_active_dependency(stack: TestStack) {
    stack
        .builder
        .product("r", "1.0", "Linux", Some("setupRequired(q 2.0)\n"))
        .tag("r", "current", "Linux", "1.0");
    let eups = stack.eups(SetupOptions {
        force: true,
        ..linux()
    });
    let mut ctx = with_q(&eups, "1.0");

    let report = eups.setup(&setup("r"), &mut ctx).unwrap();
    assert_eq!(
        statuses(&report),
        vec![
            ("r", "1.0", SetupStatus::Setup),
            ("q", "1.0", SetupStatus::Unsetup),
            ("q", "2.0", SetupStatus::Setup),
        ]
    );
    assert_eq!(ctx.get("Q_LIST"), Some("two"));
    assert!(ctx.get("SETUP_Q").unwrap().starts_with("q 2.0 "));
}

#[rstest]
fn test_same_version_already_active_is_kept(stack: TestStack) {
    let eups = stack.eups(linux());
    let mut ctx = with_q(&eups, "1.0");
    let report = eups.setup(&setup("p"), &mut ctx).unwrap();
    assert_eq!(report.find("q").unwrap().status, SetupStatus::Kept);
    assert_eq!(ctx.get("Q_LIST"), Some("one"));
}

#[rstest]
fn test_top_level_switch_unsetups_previous(stack: TestStack) {
    let eups = stack.eups(linux());
    let mut ctx = with_q(&eups, "1.0");
    let request = SetupRequest::setup(
        ProductRequest::named("q").with_version("2.0".parse().unwrap()),
    );
    let report = eups.setup(&request, &mut ctx).unwrap();
    assert_eq!(
        statuses(&report),
        vec![
            ("q", "1.0", SetupStatus::Unsetup),
            ("q", "2.0", SetupStatus::Setup),
        ]
    );
    assert_eq!(ctx.get("Q_LIST"), Some("two"));
}

#[rstest]
fn test_cycles_are_visited_once(stack: TestStack) {
    stack
        .builder
        .product("a", "1.0", "Linux", Some("setupRequired(b)\nenvAppend(CYCLE, a)\n"))
        .tag("a", "current", "Linux", "1.0")
        .product("b", "1.0", "Linux", Some("setupRequired(a)\nenvAppend(CYCLE, b)\n"))
        .tag("b", "current", "Linux", "1.0");
    let eups = stack.eups(linux());
    let mut ctx = EnvironmentContext::new();
    let report = eups.setup(&setup("a"), &mut ctx).unwrap();
    assert_eq!(report.records.len(), 2);
    assert_eq!(ctx.get("CYCLE"), Some("b:a"));
}

#[rstest]
fn test_build_type_selects_table_branch(stack: TestStack) {
    stack.builder.product(
        "t",
        "1.0",
        "Linux",
        Some("if (type == build) {\n  envSet(T_BUILD, 1)\n}\nenvSet(T_ALWAYS, 1)\n"),
    );
    let request = SetupRequest::setup(
        ProductRequest::named("t").with_version("1.0".parse().unwrap()),
    );

    let mut ctx = EnvironmentContext::new();
    stack.eups(linux()).setup(&request, &mut ctx).unwrap();
    assert!(!ctx.contains("T_BUILD"));
    assert!(ctx.contains("T_ALWAYS"));

    let mut ctx = EnvironmentContext::new();
    let build = SetupOptions {
        build_type: Some("build".into()),
        ..linux()
    };
    stack.eups(build).setup(&request, &mut ctx).unwrap();
    assert!(ctx.contains("T_BUILD"));
}

#[rstest]
fn test_table_file_override(stack: TestStack) {
    let dir = stack.builder.root().join("work");
    std::fs::create_dir_all(&dir).unwrap();
    let table = dir.join("mine.table");
    std::fs::write(&table, "envSet(MINE, ${PRODUCT_NAME})\n").unwrap();

    let eups = stack.eups(linux());
    let mut ctx = EnvironmentContext::new();
    let request = SetupRequest::setup(ProductRequest::default()).with_table_file(&table);
    eups.setup(&request, &mut ctx).unwrap();
    assert_eq!(ctx.get("MINE"), Some("mine"));
    assert!(ctx.get("SETUP_MINE").unwrap().starts_with("mine LOCAL:"));
}

#[rstest]
fn test_missing_table_file_is_under_specified(stack: TestStack) {
    let missing = stack.builder.root().join("nope").join("p.table");
    let eups = stack.eups(linux());
    let mut ctx = EnvironmentContext::new();

    let err = eups
        .setup(&setup("p").with_table_file(&missing), &mut ctx)
        .unwrap_err();
    assert!(matches!(err, Error::UnderSpecifiedProduct { .. }));
    assert_eq!(err.exit_status(), 3);
    assert!(!ctx.contains("SETUP_P"));

    let err = eups
        .setup(
            &SetupRequest::setup(ProductRequest::default()).with_table_file(&missing),
            &mut ctx,
        )
        .unwrap_err();
    assert_eq!(err.exit_status(), 3);
}

#[rstest]
fn test_callbacks(stack: TestStack) {
    let mut eups = stack.eups(linux());
    eups.add_callback(Box::new(|command: &str, _request: &SetupRequest| -> Result<()> {
        if command == "unsetup" {
            return Err(Error::OperationForbidden {
                command: command.to_string(),
                reason: "unsetup is disabled".into(),
            });
        }
        Ok(())
    }));
    let mut ctx = EnvironmentContext::new();
    eups.setup(&setup("q"), &mut ctx).unwrap();
    let err = eups
        .setup(&SetupRequest::unsetup(ProductRequest::named("q")), &mut ctx)
        .unwrap_err();
    assert_eq!(err.exit_status(), 255);

    eups.add_callback(Box::new(|_command: &str, _request: &SetupRequest| -> Result<()> {
        Err(Error::ProductNotSetup {
            name: "hook".into(),
        })
    }));
    let err = eups.setup(&setup("q"), &mut ctx).unwrap_err();
    assert!(matches!(err, Error::CallbackFailed { .. }));
    assert_eq!(err.exit_status(), 9);
}

#[rstest]
fn test_dependencies_leave_context_untouched(stack: TestStack) {
    let eups = stack.eups(linux());
    let ctx = EnvironmentContext::new();
    let report = eups.dependencies(&setup("p"), &ctx).unwrap();
    assert_eq!(report.records.len(), 2);
    assert!(ctx.vars().is_empty());
}

#[rstest]
fn test_setup_commands(stack: TestStack) {
    let eups = stack.eups(SetupOptions {
        max_depth: Some(0),
        ..linux()
    });
    let mut ctx = EnvironmentContext::new();
    let commands = eups
        .setup_commands(&setup("q"), &mut ctx, Shell::Sh)
        .unwrap();
    let q_dir = stack.builder.root().join("Linux/q/1.0");
    assert_eq!(commands[0], format!("export Q_DIR='{}'", q_dir.display()));
    assert!(commands[1].starts_with("export SETUP_Q='q 1.0 -f Linux -Z "));
    assert_eq!(commands[2], "export Q_LIST='one'");
    assert!(ctx.journal().is_empty());
}
