//! A single unparameterized step runs to completion end-to-end.

use crate::prelude::*;

const HELLO_WORLD: &str = r#"
description:
  name: hello-world
study:
  - name: say-hello
    run:
      cmd: echo "Hello, World!" > hello_world.txt
"#;

#[test]
fn single_step_finishes_ok() {
    let ws = Workspace::new();
    let study = ws.run_fg(HELLO_WORLD);

    assert_eq!(study.state_of("say-hello"), "finished_ok");
    assert!(study.workspace_of("say-hello").join("hello_world.txt").exists());
}

#[test]
fn dry_run_renders_script_without_launching_conductor() {
    let ws = Workspace::new();
    ws.run_dry(HELLO_WORLD).stdout_has("expanded 1 instance");

    let study = ws.only_study_dir();
    assert!(study.workspace_of("say-hello").join("say-hello.sh").exists());
    assert!(!study.path().join("graph.snapshot").exists());
}
