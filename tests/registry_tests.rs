use anyhow::Result;
use async_trait::async_trait;
use sheetpilot::registry::{ModuleKind, ModuleMetadata, ModuleRegistry};
use sheetpilot::{CleaningModule, DataFrame, ModuleContext};

#[test]
fn test_builtin_modules_are_discovered() {
    let registry = ModuleRegistry::new();
    let ids: Vec<&str> = registry.list_modules().iter().map(|m| m.id.as_str()).collect();

    assert_eq!(
        ids,
        vec![
            "intelligent_text_normalizer",
            "missing_imputer",
            "outlier_detector",
            "text_normalizer"
        ]
    );
}

#[test]
fn test_plugin_kind() {
    let registry = ModuleRegistry::new();
    let plugins: Vec<&str> = registry
        .list_by_kind(ModuleKind::Plugin)
        .iter()
        .map(|m| m.id.as_str())
        .collect();
    assert_eq!(plugins, vec!["intelligent_text_normalizer"]);
}

#[test]
fn test_parameter_schema() {
    let registry = ModuleRegistry::new();
    let meta = registry.metadata("outlier_detector").unwrap();

    let columns = meta.parameter("columns").unwrap();
    assert!(columns.required);
    assert_eq!(columns.param_type, "list");

    let method = meta.parameter("method").unwrap();
    assert_eq!(method.default, serde_json::json!("iqr"));

    let contamination = meta.parameter("contamination").unwrap();
    assert_eq!(contamination.param_type, "number");
    assert_eq!(contamination.max, Some(0.5));

    let n_neighbors = registry
        .metadata("missing_imputer")
        .unwrap()
        .parameter("n_neighbors")
        .unwrap();
    assert_eq!(n_neighbors.param_type, "integer");
    assert_eq!(n_neighbors.default, serde_json::json!(5));
}

#[test]
fn test_unknown_module() {
    let registry = ModuleRegistry::new();
    assert!(registry.get_module("does_not_exist").is_none());
    assert!(registry.metadata("does_not_exist").is_none());
}

struct Passthrough;

#[async_trait]
impl CleaningModule for Passthrough {
    async fn on_create(&mut self, _params: serde_json::Value) -> Result<()> {
        Ok(())
    }

    async fn process(&self, input: &DataFrame, _ctx: &ModuleContext) -> Result<DataFrame> {
        Ok(input.clone())
    }
}

#[tokio::test]
async fn test_register_at_runtime() {
    let mut registry = ModuleRegistry::new();
    registry.register(
        ModuleMetadata::new("passthrough", "Passthrough", "Testing", || Box::new(Passthrough))
            .with_description("Returns its input"),
    );

    assert!(registry.contains("passthrough"));
    assert_eq!(registry.list_modules().len(), 5);

    let mut module = registry.get_module("passthrough").unwrap();
    module.on_create(serde_json::Value::Null).await.unwrap();
    let out = module
        .process(&DataFrame::new(), &ModuleContext::new())
        .await
        .unwrap();
    assert_eq!(out.height(), 0);
}
