//! Database Facade Integration Tests
//!
//! End-to-end tests through the public API against a document on disk.
//!
//! ## Test Coverage
//! - Singleton round-trip
//! - Collection insert, lookup by key and delete
//! - Uniqueness and multi-value existence checks
//! - Reference checks across models
//! - The network interface lifecycle scenario
//! - Concurrent writers sharing one document

#[cfg(test)]
mod database_tests {
    use anyhow::Result;
    use confdb_core::{
        CheckMode, Database, DatabaseConfig, DatabaseError, ModelDefinition, PropertyDefinition,
        PropertyType, StaticModelRegistry,
    };
    use serde_json::{json, Value};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn registry() -> Result<Arc<StaticModelRegistry>> {
        let registry = StaticModelRegistry::from_definitions([
            ModelDefinition::singleton("system")
                .with_property(PropertyDefinition::new("hostname", PropertyType::String))
                .with_property(PropertyDefinition::new("dns", PropertyType::Array)),
            ModelDefinition::collection("network.interface", "uuid")
                .referenceable(true)
                .with_property(PropertyDefinition::new("name", PropertyType::String))
                .with_property(
                    PropertyDefinition::new("enabled", PropertyType::Boolean).with_default(true),
                ),
            ModelDefinition::collection("network.route", "uuid")
                .with_property(PropertyDefinition::new("interface", PropertyType::String))
                .with_property(PropertyDefinition::new("destination", PropertyType::String)),
        ])?;
        Ok(Arc::new(registry))
    }

    /// Helper to create a database over an empty document
    fn create_test_db() -> Result<(Database, TempDir, PathBuf)> {
        let temp_dir = TempDir::new()?;
        let document_path = temp_dir.path().join("config.json");
        let mut config = DatabaseConfig::new(&document_path);
        config.create_if_missing = true;
        let db = Database::open(&config, registry()?)?;
        Ok((db, temp_dir, document_path))
    }

    fn read_document(path: &Path) -> Result<Value> {
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    }

    #[test]
    fn test_singleton_round_trip() -> Result<()> {
        let (db, _temp_dir, _) = create_test_db()?;

        let mut system = db.new_object("system")?;
        system.set("hostname", "fw01")?;
        system.set("dns", json!(["1.1.1.1", "9.9.9.9"]))?;
        db.set(&mut system)?;

        system.set("hostname", "fw02")?;
        db.set(&mut system)?;

        let stored = db.get_one("system", None)?;
        assert_eq!(stored.properties(), system.properties());
        assert!(!stored.is_new());
        Ok(())
    }

    #[test]
    fn test_collection_insert_grows_list() -> Result<()> {
        let (db, _temp_dir, _) = create_test_db()?;

        for name in ["eth0", "eth1"] {
            let before = db.get_list("network.interface")?.len();

            let mut interface = db.new_object("network.interface")?;
            interface.set("name", name)?;
            db.set(&mut interface)?;

            let after = db.get_list("network.interface")?;
            assert_eq!(after.len(), before + 1);
            assert!(after.iter().any(|o| o.key() == interface.key()));
        }
        Ok(())
    }

    #[test]
    fn test_delete_then_get_is_not_found() -> Result<()> {
        let (db, _temp_dir, _) = create_test_db()?;

        let mut interface = db.new_object("network.interface")?;
        interface.set("name", "eth0")?;
        db.set(&mut interface)?;
        let key = interface.key().map(str::to_string);

        assert!(db.get("network.interface", key.as_deref()).is_ok());
        db.delete(&interface)?;

        let err = db.get("network.interface", key.as_deref()).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
        Ok(())
    }

    #[test]
    fn test_is_unique_only_fails_on_other_objects() -> Result<()> {
        let (db, _temp_dir, _) = create_test_db()?;

        let mut eth0 = db.new_object("network.interface")?;
        eth0.set("name", "eth0")?;
        db.set(&mut eth0)?;

        // The object itself never counts as a duplicate
        assert!(db.is_unique(&eth0, "name", CheckMode::Quiet)?);

        let mut other = db.new_object("network.interface")?;
        other.set("name", "eth0")?;
        assert!(!db.is_unique(&other, "name", CheckMode::Quiet)?);

        other.set("name", "eth1")?;
        assert!(db.is_unique(&other, "name", CheckMode::Quiet)?);
        Ok(())
    }

    #[test]
    fn test_exists_is_an_or() -> Result<()> {
        let (db, _temp_dir, _) = create_test_db()?;

        let mut eth0 = db.new_object("network.interface")?;
        eth0.set("name", "eth0")?;
        db.set(&mut eth0)?;

        assert!(db.exists("network.interface", "name", &["eth0"])?);
        assert!(!db.exists("network.interface", "name", &["eth9"])?);
        assert!(db.exists("network.interface", "name", &["eth9", "eth0"])?);
        assert!(db.exists("network.interface", "name", &["eth0", "eth9"])?);
        Ok(())
    }

    #[test]
    fn test_is_referenced_across_models() -> Result<()> {
        let (db, _temp_dir, _) = create_test_db()?;

        let mut eth0 = db.new_object("network.interface")?;
        eth0.set("name", "eth0")?;
        db.set(&mut eth0)?;
        assert!(!db.is_referenced(&eth0, CheckMode::Strict)?);

        let mut route = db.new_object("network.route")?;
        route.set("interface", eth0.key().unwrap_or_default())?;
        route.set("destination", "0.0.0.0/0")?;
        db.set(&mut route)?;

        assert!(db.is_referenced(&eth0, CheckMode::Quiet)?);
        assert!(matches!(
            db.is_referenced(&eth0, CheckMode::Strict),
            Err(DatabaseError::Referenced { .. })
        ));

        // Routes are not referenceable, whatever the mode
        assert!(matches!(
            db.is_referenced(&route, CheckMode::Quiet),
            Err(DatabaseError::NotReferenceable { .. })
        ));

        db.delete(&route)?;
        assert!(!db.is_referenced(&eth0, CheckMode::Strict)?);
        Ok(())
    }

    #[test]
    fn test_network_interface_scenario() -> Result<()> {
        let (db, _temp_dir, document_path) = create_test_db()?;

        let mut a = db.new_object("network.interface")?;
        a.set("name", "eth0")?;
        db.set(&mut a)?;

        let mut b = db.new_object("network.interface")?;
        b.set("name", "eth1")?;
        db.set(&mut b)?;

        // Members come back in insertion order
        let keys: Vec<Option<String>> = db
            .get_list("network.interface")?
            .iter()
            .map(|o| o.key().map(str::to_string))
            .collect();
        let expected: Vec<Option<String>> = [a.key(), b.key()]
            .into_iter()
            .map(|k| k.map(str::to_string))
            .collect();
        assert_eq!(keys, expected);

        db.delete(&a)?;

        let remaining = db.get_list("network.interface")?;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].key(), b.key());
        assert!(!db.exists("network.interface", "name", &["eth0"])?);
        assert!(db.exists("network.interface", "name", &["eth0", "eth1"])?);

        // On disk: defaults were written and key order survives the round trip
        let document = read_document(&document_path)?;
        let stored = &document["network"]["interface"];
        let stored = stored.as_array().map(|a| &a[0]).unwrap_or(stored);
        let keys: Vec<&String> = stored
            .as_object()
            .map(|m| m.keys().collect())
            .unwrap_or_default();
        assert_eq!(keys, ["uuid", "enabled", "name"]);
        Ok(())
    }

    #[test]
    fn test_concurrent_writers_do_not_lose_updates() -> Result<()> {
        let (db, _temp_dir, _) = create_test_db()?;
        let db = Arc::new(db);

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let db = Arc::clone(&db);
                std::thread::spawn(move || -> Result<(), DatabaseError> {
                    for i in 0..5 {
                        let mut interface = db.new_object("network.interface")?;
                        interface.set("name", format!("w{}-{}", worker, i))?;
                        db.set(&mut interface)?;
                    }
                    Ok(())
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("writer thread panicked")?;
        }

        assert_eq!(db.get_list("network.interface")?.len(), 20);
        Ok(())
    }

    #[test]
    fn test_two_handles_share_one_document() -> Result<()> {
        let (first, _temp_dir, document_path) = create_test_db()?;
        let second = Database::open(&DatabaseConfig::new(&document_path), registry()?)?;

        let mut eth0 = first.new_object("network.interface")?;
        eth0.set("name", "eth0")?;
        first.set(&mut eth0)?;

        let mut eth1 = second.new_object("network.interface")?;
        eth1.set("name", "eth1")?;
        second.set(&mut eth1)?;

        assert_eq!(first.get_list("network.interface")?.len(), 2);
        assert_eq!(second.get_list("network.interface")?.len(), 2);
        Ok(())
    }
}
