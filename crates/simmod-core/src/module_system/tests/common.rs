#![cfg(test)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::module_system::category::ModuleCategory;
use crate::module_system::dependency::Dependency;
use crate::module_system::interface::{
    Capability, CoolingModel, HaloState, ModuleData, ModuleFailure, ModuleInterface,
    StarFormationModel,
};

/// Cools a fixed fraction of the hot gas per unit time
pub struct FractionCooling(pub f64);

impl CoolingModel for FractionCooling {
    fn cooling_mass(
        &self,
        _data: &ModuleData,
        halo: &HaloState,
        dt: f64,
    ) -> Result<f64, ModuleFailure> {
        Ok(halo.hot_gas * self.0 * dt)
    }
}

/// Turns cold gas into stars with an efficiency stored in the module data
pub struct EfficiencyStarFormation;

impl StarFormationModel for EfficiencyStarFormation {
    fn stars_formed(
        &self,
        data: &ModuleData,
        halo: &HaloState,
        dt: f64,
    ) -> Result<f64, ModuleFailure> {
        let efficiency = data
            .downcast_ref::<f64>()
            .ok_or_else(|| ModuleFailure::new(-1, "missing efficiency"))?;
        Ok(halo.cold_gas * efficiency * dt)
    }
}

/// Counts lifecycle callbacks of a test module
#[derive(Debug, Clone, Default)]
pub struct Calls {
    pub init: Arc<AtomicUsize>,
    pub cleanup: Arc<AtomicUsize>,
}

impl Calls {
    pub fn inits(&self) -> usize {
        self.init.load(Ordering::SeqCst)
    }

    pub fn cleanups(&self) -> usize {
        self.cleanup.load(Ordering::SeqCst)
    }
}

/// Base-capability module with counting callbacks
pub fn basic_module(
    name: &str,
    version: &str,
    category: ModuleCategory,
    calls: &Calls,
) -> ModuleInterface {
    let init = Arc::clone(&calls.init);
    let cleanup = Arc::clone(&calls.cleanup);
    ModuleInterface::builder(name, version, category)
        .on_initialize(move |_| {
            init.fetch_add(1, Ordering::SeqCst);
            Ok(ModuleData::empty())
        })
        .on_cleanup(move |_| {
            cleanup.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .build()
}

pub fn cooling_module(name: &str, version: &str) -> ModuleInterface {
    ModuleInterface::builder(name, version, ModuleCategory::Cooling)
        .on_initialize(|_| Ok(ModuleData::empty()))
        .on_cleanup(|_| Ok(()))
        .capability(Capability::Cooling(Box::new(FractionCooling(0.1))))
        .build()
}

/// Star formation module reading `efficiency` from its parameters
pub fn star_formation_module(
    name: &str,
    version: &str,
    dependencies: Vec<Dependency>,
) -> ModuleInterface {
    let mut builder = ModuleInterface::builder(name, version, ModuleCategory::StarFormation)
        .on_initialize(|params| Ok(ModuleData::new(params.get_or("efficiency", 0.05_f64))))
        .on_cleanup(|_| Ok(()))
        .capability(Capability::StarFormation(Box::new(EfficiencyStarFormation)));
    for dep in dependencies {
        builder = builder.dependency(dep);
    }
    builder.build()
}
