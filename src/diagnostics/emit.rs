//! Diagnostic emission backend.
//!
//! Outputs violations to stderr and the `log` facade, then applies the
//! configured policy. Never returns.

use std::io::Write;

use super::context::DiagContext;
use super::kind::Diagnostic;
use super::policy::ViolationPolicy;

/// Report a contract violation and stop.
#[cold]
#[inline(never)]
pub fn violation(diag: &Diagnostic, ctx: &DiagContext, policy: ViolationPolicy) -> ! {
    let context = ctx.format();

    log::error!("[{}] {} ({})", diag.code, diag.message, context);
    emit_to_stderr(diag, &context);

    match policy {
        ViolationPolicy::Panic => panic!("{}\nContext: {}", diag, context),
        ViolationPolicy::Abort => std::process::abort(),
    }
}

fn emit_to_stderr(diag: &Diagnostic, context: &str) {
    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "[statphase][{}] error: {}", diag.code, diag.message);
    let _ = writeln!(stderr, "  context: {}", context);

    if let Some(note) = diag.note {
        let _ = writeln!(stderr, "  note: {}", note);
    }

    if let Some(help) = diag.help {
        let _ = writeln!(stderr, "  help: {}", help);
    }

    let _ = writeln!(stderr);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::kind::SP001;

    #[test]
    #[should_panic(expected = "[statphase][SP001]")]
    fn test_panic_policy_panics_with_code() {
        violation(&SP001, &DiagContext::capture(), ViolationPolicy::Panic);
    }
}
