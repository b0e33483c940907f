use serde_json::json;
use sheetpilot::modules::{
    ImputeMethod, MissingImputer, OutlierAction, OutlierDetector, OutlierMethod, TextNormalizer,
};
use sheetpilot::{CleanError, CleaningModule, Column, DataFrame, ModuleContext, Value};

fn numbers(values: &[f64]) -> Vec<Value> {
    values.iter().map(|v| Value::Float(*v)).collect()
}

fn mixed_frame() -> DataFrame {
    DataFrame::from_columns(vec![
        Column::new("a", vec![Value::Int(1), Value::Null, Value::Int(3)]),
        Column::new("b", vec![1.5.into(), Value::Null, 2.5.into()]),
        Column::new("t", vec!["x".into(), Value::Null, "x".into()]),
    ])
    .unwrap()
}

fn clean_error(err: &anyhow::Error) -> &CleanError {
    err.downcast_ref::<CleanError>().expect("expected a CleanError")
}

#[test]
fn test_mean_keeps_integer_columns_integral() {
    let result = MissingImputer::new(ImputeMethod::Mean)
        .apply(&mixed_frame(), &ModuleContext::new())
        .unwrap();

    assert_eq!(result.column("a").unwrap().values, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    assert_eq!(result.column("b").unwrap().values[1], Value::Float(2.0));
    assert_eq!(result.column("t").unwrap().values[1], Value::Null);
}

#[test]
fn test_input_frame_is_not_modified() {
    let df = mixed_frame();
    let _ = MissingImputer::new(ImputeMethod::Median)
        .apply(&df, &ModuleContext::new())
        .unwrap();
    assert_eq!(df, mixed_frame());
}

#[test]
fn test_mode_fills_text() {
    let result = MissingImputer::new(ImputeMethod::Mode)
        .with_columns(["t"])
        .apply(&mixed_frame(), &ModuleContext::new())
        .unwrap();
    assert_eq!(result.column("t").unwrap().values[1], Value::from("x"));
    assert_eq!(result.column("a").unwrap().values[1], Value::Null);
}

#[tokio::test]
async fn test_constant_fill_from_params() {
    let mut imputer = MissingImputer::default();
    imputer
        .on_create(json!({"columns": "t", "method": "constant", "fill_value": "unknown"}))
        .await
        .unwrap();

    let result = imputer.process(&mixed_frame(), &ModuleContext::new()).await.unwrap();
    assert_eq!(result.column("t").unwrap().values[1], Value::from("unknown"));
}

#[test]
fn test_missing_columns_are_listed_sorted() {
    let err = MissingImputer::default()
        .with_columns(["zeta", "a", "alpha"])
        .apply(&mixed_frame(), &ModuleContext::new())
        .unwrap_err();

    assert_eq!(err.to_string(), r#"Columns not found: ["alpha", "zeta"]"#);
}

#[test]
fn test_knn_skips_all_null_columns() {
    let df = DataFrame::from_columns(vec![
        Column::new("x", numbers(&[1.0, 2.0, 3.0])),
        Column::new("empty", vec![Value::Null, Value::Null, Value::Null]),
    ])
    .unwrap();

    let result = MissingImputer::new(ImputeMethod::Knn)
        .apply(&df, &ModuleContext::new())
        .unwrap();
    assert_eq!(result.column("empty").unwrap().null_count(), 3);
}

#[test]
fn test_normalizer_options() {
    let df = DataFrame::from_columns(vec![Column::new(
        "text",
        vec!["  Hello, WORLD!  ".into(), "u r the best".into(), Value::Null],
    )])
    .unwrap();

    let normalizer: TextNormalizer = serde_json::from_value(json!({
        "columns": ["text"],
        "lowercase": false,
        "slang_dict": {"u": "you", "r": "are"},
        "remove_stopwords": true
    }))
    .unwrap();

    let result = normalizer.apply(&df).unwrap();
    let values = &result.column("text").unwrap().values;
    assert_eq!(values[0], Value::from("Hello WORLD"));
    assert_eq!(values[1], Value::from("best"));
    assert_eq!(values[2], Value::from(""));
}

#[test]
fn test_normalizer_rejects_numeric_column() {
    let df = DataFrame::from_columns(vec![Column::new("n", numbers(&[1.0, 2.0]))]).unwrap();
    let err = TextNormalizer::new(["n"]).apply(&df).unwrap_err();
    assert!(matches!(clean_error(&err), CleanError::NotText(name) if name == "n"));
}

#[tokio::test]
async fn test_normalizer_requires_columns() {
    let mut normalizer = TextNormalizer::default();
    let err = normalizer.on_create(json!({})).await.unwrap_err();
    assert!(matches!(clean_error(&err), CleanError::InvalidParams { .. }));
}

#[test]
fn test_zscore_removes_extreme_row() {
    let mut values = vec![10.0; 20];
    values[3] = 11.0;
    values[7] = 9.0;
    values.push(100.0);
    let df = DataFrame::from_columns(vec![Column::new("v", numbers(&values))]).unwrap();

    let result = OutlierDetector::new(["v"], OutlierMethod::Zscore)
        .apply(&df, &ModuleContext::new())
        .unwrap();
    assert_eq!(result.height(), 20);
}

#[test]
fn test_custom_iqr_threshold() {
    let df = DataFrame::from_columns(vec![Column::new("v", numbers(&[1.0, 2.0, 3.0, 4.0, 7.0]))]).unwrap();

    let loose = OutlierDetector::new(["v"], OutlierMethod::Iqr)
        .apply(&df, &ModuleContext::new())
        .unwrap();
    assert_eq!(loose.height(), 5);

    let strict = OutlierDetector::new(["v"], OutlierMethod::Iqr)
        .with_threshold(0.5)
        .apply(&df, &ModuleContext::new())
        .unwrap();
    assert_eq!(strict.height(), 4);
}

#[test]
fn test_zero_variance_column_is_skipped() {
    let df = DataFrame::from_columns(vec![Column::new("flat", numbers(&[5.0, 5.0, 5.0]))]).unwrap();
    let ctx = ModuleContext::new();

    let result = OutlierDetector::new(["flat"], OutlierMethod::Iqr)
        .with_action(OutlierAction::Flag)
        .apply(&df, &ctx)
        .unwrap();

    assert_eq!(result, df);
    assert!(!result.has_column("is_outlier"));
    assert_eq!(ctx.take_warnings(), vec!["Column 'flat' has zero variance, skipping"]);
}

#[test]
fn test_outlier_rejects_text_column() {
    let df = DataFrame::from_columns(vec![Column::new("s", vec!["a".into(), "b".into()])]).unwrap();
    let err = OutlierDetector::new(["s"], OutlierMethod::Zscore)
        .apply(&df, &ModuleContext::new())
        .unwrap_err();
    assert_eq!(err.to_string(), "Column 's' is not numeric");
}

#[test]
fn test_lof_flags_isolated_point() {
    let mut x: Vec<f64> = (0..30).map(|i| (i % 6) as f64).collect();
    let mut y: Vec<f64> = (0..30).map(|i| (i / 6) as f64).collect();
    x.push(50.0);
    y.push(50.0);
    let df = DataFrame::from_columns(vec![
        Column::new("x", numbers(&x)),
        Column::new("y", numbers(&y)),
    ])
    .unwrap();

    let mut detector = OutlierDetector::new(["x", "y"], OutlierMethod::Lof).with_action(OutlierAction::Flag);
    detector.n_neighbors = 5;
    detector.contamination = 0.03;

    let result = detector.apply(&df, &ModuleContext::new()).unwrap();
    let flags = &result.column("is_outlier").unwrap().values;
    assert_eq!(flags[30], Value::Bool(true));
    assert_eq!(flags.iter().filter(|f| **f == Value::Bool(true)).count(), 1);
}

#[test]
fn test_isolation_forest_removes_isolated_point() {
    let mut values: Vec<f64> = (0..99).map(|i| (i % 10) as f64).collect();
    values.push(500.0);
    let df = DataFrame::from_columns(vec![Column::new("v", numbers(&values))]).unwrap();

    let mut detector = OutlierDetector::new(["v"], OutlierMethod::Isolation);
    detector.contamination = 0.01;

    let result = detector.apply(&df, &ModuleContext::new()).unwrap();
    assert!(!result.column("v").unwrap().values.contains(&Value::Float(500.0)));
}
