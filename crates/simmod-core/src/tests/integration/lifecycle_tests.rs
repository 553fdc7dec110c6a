use rand::Rng;
use rand::seq::SliceRandom;

use crate::module_system::interface::{ModuleData, ModuleInterface, ModuleParameters};
use crate::module_system::{ModuleCategory, ModuleId, ModuleRegistry, ModuleStatus};

const CATEGORIES: [ModuleCategory; 4] = [
    ModuleCategory::Infall,
    ModuleCategory::Feedback,
    ModuleCategory::Reincorporation,
    ModuleCategory::DiskInstability,
];

fn module(name: &str, category: ModuleCategory) -> ModuleInterface {
    ModuleInterface::builder(name, "1.0.0", category)
        .on_initialize(|_| Ok(ModuleData::new(0u64)))
        .on_cleanup(|_| Ok(()))
        .build()
}

fn check_invariants(registry: &ModuleRegistry) {
    let index = registry.active_modules();
    for category in CATEGORIES {
        let entries = index.iter().filter(|(c, _)| *c == category).count();
        assert!(entries <= 1, "{} entries for '{}'", entries, category);
    }
    for record in registry.iter() {
        let indexed = index.iter().any(|(_, id)| *id == record.id());
        assert_eq!(
            record.is_active(),
            indexed,
            "'{}' flag and index disagree",
            record.interface().name
        );
        if record.is_active() {
            assert!(record.is_initialized());
        }
        assert_eq!(record.data().is_some(), record.is_initialized());
    }
}

#[test]
fn test_random_operation_sequences_keep_registry_consistent() {
    let mut rng = rand::thread_rng();
    let params = ModuleParameters::new();

    for _ in 0..20 {
        let mut registry = ModuleRegistry::with_capacity(32);
        let mut ids: Vec<ModuleId> = Vec::new();
        let mut next = 0;

        for _ in 0..200 {
            match rng.gen_range(0..6) {
                0 => {
                    let category = *CATEGORIES.choose(&mut rng).unwrap();
                    if let Ok(id) = registry.register(module(&format!("m{}", next), category)) {
                        ids.push(id);
                    }
                    next += 1;
                }
                op => {
                    let Some(&id) = ids.choose(&mut rng) else { continue };
                    let before = registry.status(id).ok();
                    let outcome = match op {
                        1 => registry.initialize(id, &params),
                        2 => registry.set_active(id),
                        3 => registry.deactivate(id),
                        4 => registry.cleanup(id),
                        _ => registry.unregister(id),
                    };
                    let after = registry.status(id).ok();
                    if outcome.is_err() && op != 4 {
                        assert_eq!(before, after, "failed operation {} changed state", op);
                    }
                    if op == 2 && outcome.is_ok() {
                        assert_eq!(after, Some(ModuleStatus::Active));
                    }
                }
            }
            check_invariants(&registry);
        }
        assert!(registry.slot_count() <= registry.capacity());
    }
}
