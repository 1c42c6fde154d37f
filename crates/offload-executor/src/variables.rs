//! Request-scoped variables.
//!
//! Downstream phases and output formatters read offload results by name.
//! Getters are evaluated on every read; nothing is cached per request.

use std::collections::HashMap;

use offload_module::ConfigError;

use crate::request::Request;

/// Returns the variable's value, or `None` for "not found".
pub type VariableGetter = fn(&Request) -> Option<String>;

#[derive(Default)]
pub struct VariableRegistry {
    vars: HashMap<String, VariableGetter>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, getter: VariableGetter) -> Result<(), ConfigError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ConfigError::InvalidValue("variable name must not be empty"));
        }
        if self.vars.contains_key(&name) {
            return Err(ConfigError::InvalidValue("duplicate variable"));
        }
        self.vars.insert(name, getter);
        Ok(())
    }

    /// Evaluate `name` for `request`. Unknown names read as not found.
    pub fn get(&self, name: &str, request: &Request) -> Option<String> {
        self.vars.get(name).and_then(|getter| getter(request))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }
}

/// Elapsed milliseconds of the request's finished offload.
///
/// Not found when the request never offloaded or the task has not
/// completed yet.
pub fn elapsed_ms(request: &Request) -> Option<String> {
    let output = request.context()?.result()?;
    Some(output.elapsed_ms().to_string())
}

/// Offload state name, `INIT`/`PROCESSING`/`DONE`.
pub fn offload_state(request: &Request) -> Option<String> {
    request.offload_state().map(|s| s.name().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Counters;
    use crate::request::RequestTable;
    use std::rc::Rc;

    fn target(r: &Request) -> Option<String> {
        Some(r.target().to_string())
    }

    #[test]
    fn test_register_rules() {
        let mut v = VariableRegistry::new();
        v.register("a", target).unwrap();
        assert!(v.contains("a"));
        assert_eq!(v.register("a", target), Err(ConfigError::InvalidValue("duplicate variable")));
        assert!(v.register("", target).is_err());
    }

    #[test]
    fn test_not_found_without_done_context() {
        let mut t = RequestTable::new(Rc::new(Counters::default()));
        let id = t.insert("/sleep");
        let mut v = VariableRegistry::new();
        v.register("offload_elapsed_ms", elapsed_ms).unwrap();
        v.register("offload_state", offload_state).unwrap();

        let r = t.get(id).unwrap();
        assert_eq!(v.get("offload_elapsed_ms", r), None);
        assert_eq!(v.get("offload_state", r), None);
        assert_eq!(v.get("nope", r), None);

        t.get_mut(id).unwrap().ensure_context();
        let r = t.get(id).unwrap();
        assert_eq!(v.get("offload_elapsed_ms", r), None);
        assert_eq!(v.get("offload_state", r).as_deref(), Some("INIT"));
    }
}
