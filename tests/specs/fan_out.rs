//! A step referencing a global parameter fans out into one instance per
//! parameter value.

use crate::prelude::*;

const FAN_OUT: &str = r#"
description:
  name: fan-out
study:
  - name: say-hello
    run:
      cmd: echo "Hello, $(PLANET)!" > greeting.txt
global:
  parameters:
    PLANET:
      values: [Mercury, Venus, Earth]
      label: "PLANET.%%"
"#;

#[test]
fn step_using_a_parameter_expands_once_per_value() {
    let ws = Workspace::new();
    let study = ws.run_fg(FAN_OUT);

    assert_eq!(study.count_with_prefix("say-hello/"), 3);
    assert_eq!(study.state_containing("Mercury"), "finished_ok");
    assert_eq!(study.state_containing("Venus"), "finished_ok");
    assert_eq!(study.state_containing("Earth"), "finished_ok");
}

#[test]
fn step_not_referencing_the_parameter_stays_singular() {
    let ws = Workspace::new();
    let spec = r#"
description:
  name: fan-out-unused
study:
  - name: say-hello
    run:
      cmd: echo "Hello, $(PLANET)!" > greeting.txt
  - name: unrelated
    run:
      cmd: echo done > done.txt
global:
  parameters:
    PLANET:
      values: [Mercury, Venus]
      label: "PLANET.%%"
"#;
    let study = ws.run_fg(spec);

    assert_eq!(study.count_with_prefix("say-hello/"), 2);
    assert_eq!(study.state_of("unrelated"), "finished_ok");
}
