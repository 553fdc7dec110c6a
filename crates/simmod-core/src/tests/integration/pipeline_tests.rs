use std::fs;
use std::sync::Arc;

use tempfile::tempdir;

use crate::config::RegistryConfig;
use crate::module_system::interface::{
    Capability, CoolingModel, HaloState, ModuleData, ModuleFailure, ModuleInterface,
    ModuleParameters, StarFormationModel,
};
use crate::module_system::{
    DefaultModuleManager, Dependency, ErrorKind, ModuleCategory, ModuleManager, ModuleRegistry,
    StaticModuleLoader, Version,
};

struct IsothermalCooling;

impl CoolingModel for IsothermalCooling {
    fn cooling_mass(
        &self,
        _data: &ModuleData,
        halo: &HaloState,
        dt: f64,
    ) -> Result<f64, ModuleFailure> {
        if halo.virial_radius <= 0.0 {
            return Err(ModuleFailure::new(1, "halo has no extent"));
        }
        Ok((halo.hot_gas * halo.virial_velocity / halo.virial_radius * dt).min(halo.hot_gas))
    }
}

struct KennicuttSchmidt;

impl StarFormationModel for KennicuttSchmidt {
    fn stars_formed(
        &self,
        data: &ModuleData,
        halo: &HaloState,
        dt: f64,
    ) -> Result<f64, ModuleFailure> {
        let efficiency = data.downcast_ref::<f64>().copied().unwrap_or(0.01);
        Ok((efficiency * halo.cold_gas * dt).min(halo.cold_gas))
    }
}

fn cooling(name: &str, version: &str) -> ModuleInterface {
    ModuleInterface::builder(name, version, ModuleCategory::Cooling)
        .author("Simmod Developers")
        .on_initialize(|_| Ok(ModuleData::empty()))
        .on_cleanup(|_| Ok(()))
        .capability(Capability::Cooling(Box::new(IsothermalCooling)))
        .build()
}

fn star_formation(name: &str, dependency: Dependency) -> ModuleInterface {
    ModuleInterface::builder(name, "1.0.0", ModuleCategory::StarFormation)
        .on_initialize(|p| Ok(ModuleData::new(p.get_or("efficiency", 0.01_f64))))
        .on_cleanup(|_| Ok(()))
        .capability(Capability::StarFormation(Box::new(KennicuttSchmidt)))
        .dependency(dependency)
        .build()
}

/// One timestep: cool hot gas onto the disk, then form stars from it
fn evolve(registry: &ModuleRegistry, halo: &mut HaloState, dt: f64) -> Result<(), String> {
    let cooling = registry
        .get_active_by_category(ModuleCategory::Cooling)
        .map_err(|e| e.to_string())?;
    let data = cooling.data.ok_or("cooling module has no data")?;
    let cooled = match cooling.interface.capability() {
        Capability::Cooling(model) => {
            model.cooling_mass(data, halo, dt).map_err(|e| e.to_string())?
        }
        _ => return Err("active cooling module lacks cooling entry points".to_string()),
    };
    halo.hot_gas -= cooled;
    halo.cold_gas += cooled;

    let sf = registry
        .get_active_by_category(ModuleCategory::StarFormation)
        .map_err(|e| e.to_string())?;
    let data = sf.data.ok_or("star formation module has no data")?;
    let formed = match sf.interface.capability() {
        Capability::StarFormation(model) => {
            model.stars_formed(data, halo, dt).map_err(|e| e.to_string())?
        }
        _ => return Err("active star formation module lacks entry points".to_string()),
    };
    halo.cold_gas -= formed;
    halo.stellar_mass += formed;
    Ok(())
}

#[test]
fn test_cooling_and_star_formation_pipeline() {
    let mut registry = ModuleRegistry::new();
    let params = ModuleParameters::new();

    let a = registry.register(cooling("A", "1.0.0")).unwrap();
    registry.initialize(a, &params).unwrap();
    registry.set_active(a).unwrap();

    let needs_cooling =
        Dependency::on_category(ModuleCategory::Cooling).with_range(Version::new(1, 0, 0), None);
    let b = registry.register(star_formation("B", needs_cooling)).unwrap();
    let mut sf_params = ModuleParameters::new();
    sf_params.set("efficiency", 0.1).unwrap();
    registry.initialize(b, &sf_params).unwrap();
    registry.set_active(b).unwrap();

    let mut halo = HaloState {
        hot_gas: 100.0,
        virial_velocity: 1.0,
        virial_radius: 10.0,
        ..HaloState::default()
    };
    let total = halo.hot_gas;
    for _ in 0..10 {
        evolve(&registry, &mut halo, 1.0).unwrap();
    }
    assert!(halo.stellar_mass > 0.0);
    assert!(halo.hot_gas < 100.0);
    let mass = halo.hot_gas + halo.cold_gas + halo.stellar_mass;
    assert!((mass - total).abs() < 1e-9, "mass is conserved");

    // Losing the cooling module strands star formation
    registry.deactivate(b).unwrap();
    registry.unregister(a).unwrap();
    let err = registry.set_active(b).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DependencyNotFound);
    assert!(evolve(&registry, &mut halo, 1.0).is_err());
}

#[test]
fn test_swapping_cooling_implementation_mid_run() {
    let mut registry = ModuleRegistry::new();
    let params = ModuleParameters::new();
    let old = registry.register(cooling("sd93", "1.0.0")).unwrap();
    let new = registry.register(cooling("gnat07", "2.0.0")).unwrap();
    let sf = registry
        .register(star_formation(
            "ks",
            Dependency::on_category(ModuleCategory::Cooling)
                .with_range(Version::new(1, 0, 0), Some(Version::new(1, 9, 9))),
        ))
        .unwrap();
    for id in [old, new, sf] {
        registry.initialize(id, &params).unwrap();
    }
    registry.set_active(old).unwrap();
    registry.set_active(sf).unwrap();

    // Replacing the active cooling module does not re-check modules already active
    registry.set_active(new).unwrap();
    assert_eq!(registry.active_id(ModuleCategory::Cooling), Some(new));
    assert_eq!(registry.active_id(ModuleCategory::StarFormation), Some(sf));

    // but re-activating the dependent does
    registry.deactivate(sf).unwrap();
    let err = registry.set_active(sf).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DependencyConflict);
}

#[tokio::test]
async fn test_manifest_directory_end_to_end() {
    let dir = tempdir().expect("tempdir");
    fs::write(
        dir.path().join("cooling.manifest"),
        "name: A\nversion: 1.0.0\ntype: cooling\nlibrary: libA.so\n\
         auto_initialize: true\nauto_activate: true\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("sf.manifest.json"),
        r#"{ "name": "B", "version": "1.0.0", "type": "star_formation", "library": "libB.so",
             "auto_initialize": true, "auto_activate": true }"#,
    )
    .unwrap();

    let a_path = dir.path().join("libA.so");
    let b_path = dir.path().join("libB.so");
    let loader = StaticModuleLoader::new().with(a_path, || cooling("A", "1.0.0")).with(b_path, || {
        star_formation(
            "B",
            Dependency::on_category(ModuleCategory::Cooling)
                .with_range(Version::new(1, 0, 0), None),
        )
    });
    let mut params = ModuleParameters::new();
    params.set("efficiency", 0.2).unwrap();
    let mut config = RegistryConfig::default();
    config.parameters.insert("B".to_string(), params);

    let manager = DefaultModuleManager::with_config(config, Arc::new(loader));
    let report = manager.load_directory(dir.path()).await.unwrap();
    assert!(report.is_clean(), "{:?}", report.failed);

    let registry = manager.registry();
    {
        let registry = registry.lock().await;
        let mut halo = HaloState { cold_gas: 50.0, virial_radius: 1.0, ..HaloState::default() };
        evolve(&registry, &mut halo, 1.0).unwrap();
        assert!((halo.stellar_mass - 10.0).abs() < 1e-9);
    }

    manager.shutdown().await.unwrap();
    assert_eq!(registry.lock().await.initialized_count(), 0);
}
