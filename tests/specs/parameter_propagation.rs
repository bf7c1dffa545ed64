//! Two parameters used by different subsets of a three-stage chain: the
//! step using only one parameter collapses to its unique values, a step
//! using both keeps every combination, and a step using neither still
//! inherits its parent's full combination set by propagation.

use crate::prelude::*;

// SIZE and ITER are equal-length value vectors zipped by index:
// (10,1), (10,2), (20,3). `build` only references SIZE, so it collapses
// the two SIZE=10 combinations into a single instance; `run` references
// both and keeps all three; `post` references neither but still expands
// per combination because it inherits `run`'s propagated usage.
const CHAIN: &str = r#"
description:
  name: param-chain
study:
  - name: build
    run:
      cmd: echo "building size $(SIZE)" > build.txt
  - name: run
    run:
      cmd: echo "running size $(SIZE) iter $(ITER)" > run.txt
      depends: [build]
  - name: post
    run:
      cmd: echo "post-processing" > post.txt
      depends: [run]
global:
  parameters:
    SIZE:
      values: ["10", "10", "20"]
      label: "SIZE.%%"
    ITER:
      values: ["1", "2", "3"]
      label: "ITER.%%"
"#;

#[test]
fn parameter_usage_determines_per_step_fan_out() {
    let ws = Workspace::new();
    let study = ws.run_fg(CHAIN);

    // build only reads SIZE: the two SIZE=10 combinations collapse.
    assert_eq!(study.count_with_prefix("build/"), 2);
    assert_eq!(study.state_containing("build/SIZE.10"), "finished_ok");
    assert_eq!(study.state_containing("build/SIZE.20"), "finished_ok");

    // run reads both SIZE and ITER: every combination stays distinct.
    assert_eq!(study.count_with_prefix("run/"), 3);

    // post reads neither, but inherits run's full propagated usage.
    assert_eq!(study.count_with_prefix("post/"), 3);

    for name in study.names() {
        assert_eq!(study.state_of(&name), "finished_ok", "{name} did not finish ok");
    }
}
