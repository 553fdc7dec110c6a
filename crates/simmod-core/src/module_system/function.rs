use std::collections::BTreeMap;
use std::fmt;

use crate::module_system::interface::{ModuleData, ModuleFailure};

/// Signature shared by every externally callable module function
pub type ModuleFn = Box<dyn Fn(&ModuleData, &[f64]) -> Result<f64, ModuleFailure> + Send + Sync>;

/// A named function a module exposes to the rest of the simulation
pub struct ExternalFunction {
    name: String,
    arity: usize,
    func: ModuleFn,
}

impl ExternalFunction {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of arguments the function expects
    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn call(&self, data: &ModuleData, args: &[f64]) -> Result<f64, ModuleFailure> {
        (self.func)(data, args)
    }
}

impl fmt::Debug for ExternalFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// Functions a module exposes by name
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, ExternalFunction>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function. Returns `true` if it replaced one with the same name.
    pub fn register<F>(&mut self, name: &str, arity: usize, func: F) -> bool
    where
        F: Fn(&ModuleData, &[f64]) -> Result<f64, ModuleFailure> + Send + Sync + 'static,
    {
        let function = ExternalFunction {
            name: name.to_string(),
            arity,
            func: Box::new(func),
        };
        self.functions.insert(name.to_string(), function).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&ExternalFunction> {
        self.functions.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
