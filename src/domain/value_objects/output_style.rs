//! Replaces the inherited source's cross-cutting booleans for rich/color/
//! plain output with a single enum resolved once
//! at the API boundary.

/// How human-facing text (graph dumps, `print_commands`, monitor tables)
/// should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputStyle {
    /// No ANSI escapes, no box-drawing beyond plain ASCII.
    #[default]
    Plain,
    /// ANSI color codes, plain-text layout otherwise.
    Colors,
    /// Full `indicatif`-backed live rendering.
    Rich,
}

/// Variants of the live-progress surface the monitor can drive. The queue holds one of these and never
/// branches on UI-library availability at call sites; see
/// `application::services::monitor` for the implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressView {
    /// A single scrolling/refreshing table region (the default).
    #[default]
    LiveTable,
    /// A full-screen interactive view. See DESIGN.md: this corpus carries no
    /// full-screen TUI crate, so this variant renders through the same path
    /// as `LiveTable` rather than fabricating a dependency.
    ScreenedApp,
    /// No rendering at all (used by tests and non-interactive automation).
    Silent,
}
