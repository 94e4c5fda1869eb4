//! Per-city validation diagnostics (spec §7). These are data, never
//! exceptions — the one promoted kind that *does* unwind is
//! [`crate::model::route::CriticalError`], which stops at the route
//! builder and is folded back into an ordinary [`Diagnostic`] by
//! [`crate::city::City`].

use crate::element::{Element, ElementRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub element: Option<ElementRef>,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.element {
            Some(el) => write!(f, "{} ({el})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Accumulates a city's error/warning buffers. Mirrors the original's
/// `City.warn`/`City.error`/`City.error_if`.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn warn(&mut self, message: impl Into<String>, el: Option<&Element>) {
        self.warnings.push(Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            element: el.map(ElementRef::from),
        });
    }

    pub fn error(&mut self, message: impl Into<String>, el: Option<&Element>) {
        self.errors.push(Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            element: el.map(ElementRef::from),
        });
    }

    pub fn error_if(&mut self, is_error: bool, message: impl Into<String>, el: Option<&Element>) {
        if is_error {
            self.error(message, el);
        } else {
            self.warn(message, el);
        }
    }

    /// Like [`Diagnostics::warn`]/[`Diagnostics::error`], for callers that
    /// already hold an [`ElementRef`] (e.g. a [`crate::model::route::Route`]
    /// that has outlived the borrowed [`Element`] it was built from).
    pub fn warn_ref(&mut self, message: impl Into<String>, el: Option<ElementRef>) {
        self.warnings.push(Diagnostic { severity: Severity::Warning, message: message.into(), element: el });
    }

    pub fn error_ref(&mut self, message: impl Into<String>, el: Option<ElementRef>) {
        self.errors.push(Diagnostic { severity: Severity::Error, message: message.into(), element: el });
    }

    pub fn is_good(&self) -> bool {
        self.errors.is_empty()
    }
}
