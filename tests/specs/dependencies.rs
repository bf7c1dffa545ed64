//! Per-combination dependency propagation: a child that references the same
//! parameter as its parent gets one instance per combination, each wired to
//! its matching parent instance.

use crate::prelude::*;

const PER_COMBINATION: &str = r#"
description:
  name: per-combo
study:
  - name: say-hello
    run:
      cmd: echo "Hello, $(PLANET)!" > greeting.txt
  - name: say-bye
    run:
      cmd: echo "Bye, $(PLANET)!" > farewell.txt
      depends: [say-hello]
global:
  parameters:
    PLANET:
      values: [Mercury, Venus]
      label: "PLANET.%%"
"#;

#[test]
fn child_referencing_same_parameter_expands_per_combination() {
    let ws = Workspace::new();
    let study = ws.run_fg(PER_COMBINATION);

    assert_eq!(study.count_with_prefix("say-hello/"), 2);
    assert_eq!(study.count_with_prefix("say-bye/"), 2);
    assert_eq!(study.state_containing("say-bye/PLANET.Mercury"), "finished_ok");
    assert_eq!(study.state_containing("say-bye/PLANET.Venus"), "finished_ok");
}

#[test]
fn failed_parent_combination_cascades_only_to_its_own_child() {
    let ws = Workspace::new();
    let spec = r#"
description:
  name: per-combo-failure
study:
  - name: say-hello
    run:
      cmd: |
        if [ "$(PLANET)" = "Mercury" ]; then exit 1; fi
  - name: say-bye
    run:
      cmd: echo bye
      depends: [say-hello]
global:
  parameters:
    PLANET:
      values: [Mercury, Venus]
      label: "PLANET.%%"
"#;
    let study = ws.run_fg(spec);

    assert_eq!(study.state_containing("say-hello/PLANET.Mercury"), "failed");
    assert_eq!(study.state_containing("say-hello/PLANET.Venus"), "finished_ok");
    assert_eq!(study.state_containing("say-bye/PLANET.Mercury"), "cancelled");
    assert_eq!(study.state_containing("say-bye/PLANET.Venus"), "finished_ok");
}
