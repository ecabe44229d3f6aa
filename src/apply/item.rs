//! Per-item apply sequence.
use crate::actions::Built;
use crate::audit::{AuditEntry, Outcome};
use crate::config::{Item, Module};
use crate::error::{ApplyError, HookKind, Phase};
use crate::snapshot::Snapshot;

use super::{HookScope, ModuleExecutor};

impl ModuleExecutor {
    /// Apply one item: build, guard, hooks, snapshot, run, verify, hooks.
    ///
    /// Every path that gets past the OS check produces exactly one audit
    /// entry, except hook and snapshot failures which abort before the run.
    pub(super) fn apply_item(
        &self,
        module: &Module,
        item: &Item,
        snapshot: Option<&mut Snapshot>,
    ) -> Result<(), ApplyError> {
        let name = module.name.as_str();
        let built = self
            .builder
            .build(item, self.opts.os, self.opts.direction)
            .map_err(|e| ApplyError::item(name, &item.label(), Phase::Build, e))?;
        let action = match built {
            Built::Action(action) => action,
            Built::NotApplicable => {
                self.log.debug(&format!(
                    "skip ({} not applicable on {})",
                    item.kind.name(),
                    self.opts.os
                ));
                return Ok(());
            }
        };
        let desc = action.describe();

        if let Some(guard) = item.skip_if.as_deref() {
            let skip = self
                .shell
                .eval(&self.cancel, guard)
                .map_err(|e| ApplyError::item(name, &desc, Phase::SkipIf, e))?;
            if skip {
                self.log.debug(&format!("skip [skip_if] {desc}"));
                self.audit_outcome(module, &desc, Outcome::Skipped);
                return Ok(());
            }
        }

        if let Some(check) = action.idempotency() {
            let applied = check
                .is_applied(&self.cancel)
                .map_err(|e| ApplyError::item(name, &desc, Phase::Idempotency, e))?;
            if applied {
                self.log.debug(&format!("skip [already applied] {desc}"));
                self.audit_outcome(module, &desc, Outcome::Skipped);
                return Ok(());
            }
        }

        let is_sync = item.is_sync(self.opts.direction);
        self.item_hook(item.hooks.before_apply.as_deref(), HookKind::BeforeApply, name, &desc)?;
        if is_sync {
            self.item_hook(item.hooks.before_sync.as_deref(), HookKind::BeforeSync, name, &desc)?;
        }

        if let (Some(snap), Some(target)) = (snapshot, action.snapshot_target()) {
            snap.record(&target)
                .map_err(|e| ApplyError::item(name, &desc, Phase::Snapshot, e))?;
        }

        self.log.info(&format!("-> {desc}"));
        if let Err(e) = action.run(&self.cancel, self.opts.dry_run) {
            self.audit.log(
                AuditEntry::now(&self.opts.command, name, &desc, Outcome::Failure).with_error(&e),
            );
            return Err(ApplyError::item(name, &desc, Phase::Run, e));
        }
        self.audit_outcome(module, &desc, Outcome::Success);

        if let Some(check) = item.verify.as_deref()
            && !self.opts.dry_run
        {
            self.shell
                .run(&self.cancel, check)
                .map_err(|e| ApplyError::item(name, &desc, Phase::Verify, e))?;
        }

        if is_sync {
            self.item_hook(item.hooks.after_sync.as_deref(), HookKind::AfterSync, name, &desc)?;
        }
        self.item_hook(item.hooks.after_apply.as_deref(), HookKind::AfterApply, name, &desc)
    }

    fn item_hook(
        &self,
        command: Option<&str>,
        kind: HookKind,
        module: &str,
        desc: &str,
    ) -> Result<(), ApplyError> {
        self.run_hook(command, kind, HookScope::Item, desc)
            .map_err(|e| ApplyError::item(module, desc, Phase::Hook(kind), e))
    }

    fn audit_outcome(&self, module: &Module, desc: &str, outcome: Outcome) {
        self.audit
            .log(AuditEntry::now(&self.opts.command, &module.name, desc, outcome));
    }
}
