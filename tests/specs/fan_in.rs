//! A `_*` fan-in dependency aggregates every instance of its parent step
//! into a single downstream instance.

use crate::prelude::*;

const FAN_IN: &str = r#"
description:
  name: fan-in
study:
  - name: say-hello
    run:
      cmd: echo "Hello, $(PLANET)!" > greeting.txt
  - name: say-bye
    run:
      cmd: echo "Bye, $(PLANET)!" > farewell.txt
      depends: [say-hello]
  - name: bye-all
    run:
      cmd: echo "Everyone has said bye." > summary.txt
      depends: [say-bye_*]
global:
  parameters:
    PLANET:
      values: [Mercury, Venus, Earth]
      label: "PLANET.%%"
"#;

#[test]
fn fan_in_step_produces_a_single_downstream_instance() {
    let ws = Workspace::new();
    let study = ws.run_fg(FAN_IN);

    assert_eq!(study.count_with_prefix("say-bye/"), 3);
    assert_eq!(study.count_with_prefix("bye-all"), 1);
    assert_eq!(study.state_of("bye-all"), "finished_ok");
}

#[test]
fn fan_in_waits_for_every_parent_instance() {
    let ws = Workspace::new();
    let spec = r#"
description:
  name: fan-in-wait
study:
  - name: say-hello
    run:
      cmd: |
        if [ "$(PLANET)" = "Mercury" ]; then sleep 1; fi
        echo hi > greeting.txt
  - name: wrap-up
    run:
      cmd: echo done > done.txt
      depends: [say-hello_*]
global:
  parameters:
    PLANET:
      values: [Mercury, Venus]
      label: "PLANET.%%"
"#;
    let study = ws.run_fg(spec);

    assert_eq!(study.state_containing("say-hello/PLANET.Mercury"), "finished_ok");
    assert_eq!(study.state_containing("say-hello/PLANET.Venus"), "finished_ok");
    assert_eq!(study.state_of("wrap-up"), "finished_ok");
}
