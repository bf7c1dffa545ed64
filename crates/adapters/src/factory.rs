// SPDX-License-Identifier: MIT

//! Selects the concrete [`SchedulerAdapter`] for a [`SchedulerKind`] — the
//! one place dynamic dispatch over scheduler types happens: a fixed enum
//! mapped to a `Box<dyn SchedulerAdapter>`, no runtime attribute discovery.

use crate::{FluxAdapter, LocalAdapter, LsfAdapter, SchedulerAdapter, SlurmAdapter};
use cond_core::SchedulerKind;

pub fn build_adapter(kind: SchedulerKind) -> Box<dyn SchedulerAdapter> {
    match kind {
        SchedulerKind::Local => Box::new(LocalAdapter::new()),
        SchedulerKind::Slurm => Box::new(SlurmAdapter::new()),
        SchedulerKind::Lsf => Box::new(LsfAdapter::new()),
        SchedulerKind::Flux => Box::new(FluxAdapter::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_an_adapter_for_every_scheduler_kind() {
        for kind in [
            SchedulerKind::Local,
            SchedulerKind::Slurm,
            SchedulerKind::Lsf,
            SchedulerKind::Flux,
        ] {
            let _adapter = build_adapter(kind);
        }
    }
}
