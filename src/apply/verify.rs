//! Read-only verification pass.
use crate::actions::Built;
use crate::audit::{AuditEntry, Outcome};
use crate::config::Module;
use crate::error::{ApplyError, Phase};
use crate::logging::ModuleStatus;
use crate::logging::style::{Tone, paint};

use super::ModuleExecutor;

/// Audit command name for verification entries.
const VERIFY_COMMAND: &str = "verify";

impl ModuleExecutor {
    /// Verify every tag-matching module.
    ///
    /// Returns `true` when every declared check passed.
    ///
    /// # Errors
    ///
    /// Returns an [`ApplyError`] if the run is cancelled.
    pub fn verify_all<'a>(
        &self,
        modules: impl IntoIterator<Item = &'a Module>,
    ) -> Result<bool, ApplyError> {
        let mut all_passed = true;
        for module in modules {
            if !self.matches_tags(module) {
                self.log
                    .debug(&format!("==> {}  [skip: tag mismatch]", module.name));
                self.log
                    .record_module(&module.name, ModuleStatus::SkippedByTags, None);
                continue;
            }
            all_passed &= self.verify_module(module)?;
        }
        Ok(all_passed)
    }

    /// Run the `verify` command of every item in `module` that declares one.
    ///
    /// Actions are built but never run. Items without a check, items not
    /// applicable on this OS, and items that fail to build are left out.
    ///
    /// # Errors
    ///
    /// Returns an [`ApplyError`] if the run is cancelled.
    pub fn verify_module(&self, module: &Module) -> Result<bool, ApplyError> {
        self.log.stage(&module.name);
        let mut failed = 0usize;

        for item in &module.items {
            let Some(check) = item.verify.as_deref() else {
                self.log
                    .debug(&format!("----  {}  [no verify]", item.kind.name()));
                continue;
            };
            let action = match self.builder.build(item, self.opts.os, self.opts.direction) {
                Ok(Built::Action(action)) => action,
                Ok(Built::NotApplicable) => continue,
                Err(e) => {
                    self.log.debug(&format!("skip {}: {e}", item.label()));
                    continue;
                }
            };
            if self.cancel.is_cancelled() {
                return Err(ApplyError::module(
                    &module.name,
                    Phase::Verify,
                    "verification cancelled",
                ));
            }

            let desc = action.describe();
            let entry = match self.shell.run(&self.cancel, check) {
                Ok(()) => {
                    self.log.info(&format!("{}  {desc}", paint(Tone::Pass, "PASS")));
                    AuditEntry::now(VERIFY_COMMAND, &module.name, &desc, Outcome::Success)
                }
                Err(e) => {
                    failed += 1;
                    self.log.info(&format!("{}  {desc}", paint(Tone::Fail, "FAIL")));
                    self.log.debug(&format!("{e:#}"));
                    AuditEntry::now(VERIFY_COMMAND, &module.name, &desc, Outcome::Failure)
                        .with_error(&e)
                }
            };
            self.audit.log(entry);
        }

        if failed == 0 {
            self.log
                .record_module(&module.name, ModuleStatus::Committed, Some("verified"));
        } else {
            let message = format!("{failed} check(s) failed");
            self.log
                .record_module(&module.name, ModuleStatus::Failed, Some(&message));
        }
        Ok(failed == 0)
    }
}
