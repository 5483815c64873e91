//! Diagnostic context - thread and phase stack awareness.

/// Runtime state captured when a violation is reported.
#[derive(Debug, Clone, Default)]
pub struct DiagContext {
    /// Thread name (if available).
    pub thread_name: Option<String>,
    /// Title of the current phase, if any.
    pub phase: Option<String>,
    /// Number of open phases.
    pub depth: usize,
}

impl DiagContext {
    /// Capture the thread part of the context.
    pub fn capture() -> Self {
        Self {
            thread_name: std::thread::current().name().map(String::from),
            phase: None,
            depth: 0,
        }
    }

    /// Attach the phase stack state.
    pub fn with_phase(mut self, phase: Option<&str>, depth: usize) -> Self {
        self.phase = phase.map(String::from);
        self.depth = depth;
        self
    }

    /// Format context for diagnostic output.
    pub fn format(&self) -> String {
        let mut parts = Vec::new();

        match self.thread_name {
            Some(ref name) => parts.push(format!("thread=\"{}\"", name)),
            None => parts.push(format!("thread={:?}", std::thread::current().id())),
        }

        if let Some(ref phase) = self.phase {
            parts.push(format!("phase=\"{}\"", phase));
        }
        parts.push(format!("depth={}", self.depth));

        parts.join(", ")
    }
}

impl std::fmt::Display for DiagContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format())
    }
}
