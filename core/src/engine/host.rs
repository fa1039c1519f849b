//! Host collaborator
//!
//! The engine never runs function bodies itself. It raises an event and the host
//! synchronously executes whatever handlers are bound to it, re-entering the engine
//! through the `&mut Engine` it is handed.

use super::Engine;

/// Event raised towards the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// Run one iteration of a function body.
    Function { name: String, owner: Option<String> },
    /// One item of a template loop.
    TemplateLoop { loop_name: String },
    /// One item of a delayed-function loop.
    DelayedLoop { loop_name: String },
    /// One item of a running function's param loop.
    ParamLoop { loop_name: String },
    /// One item of a scoped var loop.
    ScopedVarLoop { loop_name: String },
}

pub trait Host {
    /// Snapshot of whatever object selection the host keeps between events.
    type Selection;

    /// Run the handlers bound to `event` before returning.
    fn raise_event(&mut self, engine: &mut Engine, event: HostEvent);

    fn save_selection(&mut self) -> Self::Selection;

    fn restore_selection(&mut self, saved: Self::Selection, reselect: bool);

    /// Where in host logic execution currently is, for call stacks and warnings.
    fn call_site_label(&self) -> String;
}

/// Run `f` with the host's selection saved beforehand and restored afterwards.
pub fn with_saved_selection<H, R>(host: &mut H, reselect: bool, f: impl FnOnce(&mut H) -> R) -> R
where
    H: Host + ?Sized,
{
    let saved = host.save_selection();
    let out = f(host);
    host.restore_selection(saved, reselect);
    out
}
