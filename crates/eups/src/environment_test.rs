// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use std::cell::RefCell;
use std::rc::Rc;

use rstest::rstest;

use super::*;

#[rstest]
fn test_segments_join_with_separator() {
    let mut ctx = EnvironmentContext::from_vars([("PATH", "/usr/bin")]);
    ctx.add_segment("PATH", "/opt/bin", ":", SegmentEnd::Front);
    ctx.add_segment("PATH", "/usr/local/bin", ":", SegmentEnd::Back);
    assert_eq!(ctx.get("PATH"), Some("/opt/bin:/usr/bin:/usr/local/bin"));

    ctx.add_segment("NEW", "x", ":", SegmentEnd::Back);
    assert_eq!(ctx.get("NEW"), Some("x"));
}

#[rstest]
fn test_remove_segment_picks_the_right_occurrence() {
    let mut ctx = EnvironmentContext::from_vars([("P", "a:b:a:c:a")]);
    ctx.remove_segment("P", "a", ":", SegmentEnd::Front);
    assert_eq!(ctx.get("P"), Some("b:a:c:a"));
    ctx.remove_segment("P", "a", ":", SegmentEnd::Back);
    assert_eq!(ctx.get("P"), Some("b:a:c"));
}

#[rstest]
#[case(SegmentEnd::Back, "x:/a:/b", "x")]
#[case(SegmentEnd::Front, "/a:/b:x", "x")]
#[case(SegmentEnd::Back, "/a:/b:y:/a:/b", "/a:/b:y")]
#[case(SegmentEnd::Front, "/a:/b:y:/a:/b", "y:/a:/b")]
#[case(SegmentEnd::Back, "x:/a:/bc", "x:/a:/bc")]
fn test_remove_multi_segment_value(
    #[case] end: SegmentEnd,
    #[case] current: &str,
    #[case] expected: &str,
) {
    let mut ctx = EnvironmentContext::from_vars([("V", current)]);
    ctx.remove_segment("V", "/a:/b", ":", end);
    assert_eq!(ctx.get("V"), Some(expected));
}

#[rstest]
fn test_remove_last_segment_leaves_empty_var() {
    let mut ctx = EnvironmentContext::new();
    ctx.add_segment("GOOB", "/usr/goob", ":", SegmentEnd::Back);
    ctx.remove_segment("GOOB", "/usr/goob", ":", SegmentEnd::Back);
    assert_eq!(ctx.get("GOOB"), Some(""));
}

#[rstest]
fn test_restore_uses_value_before_first_change() {
    let mut ctx = EnvironmentContext::from_vars([("FOO", "orig")]);
    ctx.set_var("FOO", "one");
    ctx.set_var("FOO", "two");
    ctx.restore_var("FOO");
    assert_eq!(ctx.get("FOO"), Some("orig"));

    ctx.set_var("NEW", "x");
    ctx.restore_var("NEW");
    assert!(!ctx.contains("NEW"));

    ctx.restore_var("NEVER_TOUCHED");
    assert!(!ctx.contains("NEVER_TOUCHED"));
}

#[rstest]
fn test_journal_records_real_changes_only() {
    let mut ctx = EnvironmentContext::from_vars([("KEEP", "1")]);
    ctx.unset_var("MISSING");
    ctx.unset_alias("nope");
    assert!(ctx.journal().is_empty());

    ctx.set_var("A", "1");
    ctx.unset_var("KEEP");
    ctx.set_alias("ll", "ls -l");
    ctx.unset_alias("ll");
    assert_eq!(
        ctx.take_journal(),
        vec![
            Mutation::SetVar {
                name: "A".into(),
                value: "1".into()
            },
            Mutation::UnsetVar {
                name: "KEEP".into()
            },
            Mutation::SetAlias {
                name: "ll".into(),
                command: "ls -l".into()
            },
            Mutation::UnsetAlias { name: "ll".into() },
        ]
    );
    assert!(ctx.journal().is_empty());
}

#[rstest]
fn test_restore_alias() {
    let mut tx = EnvironmentContext::new();
    tx.set_alias("ll", "ls -l");
    tx.unset_alias("ll");
    tx.restore_alias("ll");
    assert_eq!(tx.alias("ll"), None);

    let mut ctx = EnvironmentContext::new().with_aliases([("ll", "ls -l")]);
    ctx.unset_alias("ll");
    ctx.set_alias("ll", "ls -la");
    ctx.restore_alias("ll");
    assert_eq!(ctx.alias("ll"), Some("ls -l"));
}

#[rstest]
fn test_source_runs_hook_and_journals() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let hook_seen = Rc::clone(&seen);
    let mut ctx = EnvironmentContext::new();
    ctx.set_source_hook(Box::new(move |script| {
        hook_seen.borrow_mut().push(script.to_string());
        Ok(())
    }));
    ctx.source("/p/ups/p.sh").unwrap();
    assert_eq!(*seen.borrow(), vec!["/p/ups/p.sh".to_string()]);
    assert_eq!(
        ctx.journal(),
        &[Mutation::Source {
            script: "/p/ups/p.sh".into()
        }]
    );
}

#[rstest]
fn test_source_hook_error_is_propagated() {
    let mut ctx = EnvironmentContext::new();
    ctx.set_source_hook(Box::new(|script| {
        Err(crate::Error::CallbackFailed {
            command: script.to_string(),
            reason: "refused".into(),
        })
    }));
    assert!(ctx.source("/p/ups/p.sh").is_err());
    assert!(ctx.journal().is_empty());
}
