//! Test helpers for engine tests
//!
//! `ScriptedHost` stands in for the host application: function bodies and loop
//! bodies are closures keyed by (case-insensitive) function or loop name.

use std::collections::HashMap;
use std::rc::Rc;

use crate::config::EngineConfig;
use crate::engine::{Engine, Expected, Host, HostEvent};

pub type Handler = Rc<dyn Fn(&mut Engine, &mut ScriptedHost)>;

pub struct ScriptedHost {
    handlers: HashMap<String, Handler>,
    /// Every event raised, in order.
    pub events: Vec<HostEvent>,
    /// Free-form output written by handlers.
    pub log: Vec<String>,
    pub selection: i32,
    pub restores: usize,
    pub site: String,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            events: Vec::new(),
            log: Vec::new(),
            selection: 0,
            restores: 0,
            site: "test event".to_string(),
        }
    }

    /// Bind a body to a function name or loop name.
    pub fn on(mut self, name: &str, handler: impl Fn(&mut Engine, &mut ScriptedHost) + 'static) -> Self {
        self.handlers.insert(name.to_ascii_lowercase(), Rc::new(handler));
        self
    }

    /// Names of the functions raised, in order.
    pub fn function_events(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                HostEvent::Function { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Host for ScriptedHost {
    type Selection = i32;

    fn raise_event(&mut self, engine: &mut Engine, event: HostEvent) {
        let key = match &event {
            HostEvent::Function { name, .. } => name.to_ascii_lowercase(),
            HostEvent::TemplateLoop { loop_name }
            | HostEvent::DelayedLoop { loop_name }
            | HostEvent::ParamLoop { loop_name }
            | HostEvent::ScopedVarLoop { loop_name } => loop_name.to_ascii_lowercase(),
        };
        self.events.push(event);
        if let Some(handler) = self.handlers.get(&key).cloned() {
            handler(engine, self);
        }
    }

    fn save_selection(&mut self) -> i32 {
        self.selection
    }

    fn restore_selection(&mut self, saved: i32, _reselect: bool) {
        self.selection = saved;
        self.restores += 1;
    }

    fn call_site_label(&self) -> String {
        self.site.clone()
    }
}

pub fn engine() -> Engine {
    Engine::new(EngineConfig::default())
}

/// Declare with optional delay and repeat and no recursion.
pub fn declare(engine: &mut Engine, signature: &str) {
    engine
        .declare(signature, Expected::Optional, Expected::Optional, false)
        .expect("declare failed");
}

pub fn declare_recursive(engine: &mut Engine, signature: &str) {
    engine
        .declare(signature, Expected::Optional, Expected::Optional, true)
        .expect("declare failed");
}
