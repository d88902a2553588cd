use super::*;
use crate::error::ErrorKind;
use crate::table::Table;
use arrow::array::{Array, Float32Array, Int64Array, StringArray, UInt64Array};

fn cells() -> Table {
    Table::from_columns(vec![
        ("CD4", Arc::new(Int64Array::from(vec![1, 5, 9])) as ArrayRef),
        ("CD8", Arc::new(Int64Array::from(vec![2, 0, 4])) as ArrayRef),
        ("DAPI", Arc::new(Float32Array::from(vec![0.5, 0.25, 1.0])) as ArrayRef),
        ("X", Arc::new(Float64Array::from(vec![10.0, 20.0, 30.0])) as ArrayRef),
        ("Y", Arc::new(Float64Array::from(vec![1.0, 2.0, 3.0])) as ArrayRef),
        (
            "region",
            Arc::new(StringArray::from(vec![Some("tumor"), None, Some("stroma")])) as ArrayRef,
        ),
    ])
    .unwrap()
}

fn simple(obs_names: &[&str], vars: &[&str], columns: Vec<Vec<f64>>) -> AnnotatedMatrix {
    let x = FeatureMatrix::from_columns(obs_names.len(), columns).unwrap();
    AnnotatedMatrix::new(
        x,
        DataType::Float64,
        obs_names.iter().map(|s| s.to_string()).collect(),
        vars.iter().map(|s| s.to_string()).collect(),
    )
    .unwrap()
}

#[test]
fn test_feature_matrix_layout() {
    let m = FeatureMatrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
    assert_eq!(m.shape(), (3, 2));
    assert_eq!(m.column(1), &[2.0, 4.0, 6.0]);
    assert_eq!(m.row(2), vec![5.0, 6.0]);
    assert_eq!(m.get(1, 0), 3.0);

    let rows = m.take_rows(&[2, 0]);
    assert_eq!(rows.column(0), &[5.0, 1.0]);
    let cols = m.take_columns(&[1]);
    assert_eq!(cols.shape(), (3, 1));

    assert!(FeatureMatrix::from_rows(&[vec![1.0], vec![1.0, 2.0]]).is_err());
    assert!(FeatureMatrix::from_columns(2, vec![vec![1.0]]).is_err());
}

#[test]
fn test_builder_selects_features_in_pattern_order() -> Result<(), CellError> {
    let table = cells();
    let adata = MatrixBuilder::new(&table)
        .feature("CD8")
        .feature("^CD")
        .annotation("region")
        .build()?;

    assert_eq!(adata.var_names(), &["CD8", "CD4"]);
    assert_eq!(adata.obs_names(), &["0", "1", "2"]);
    assert_eq!(adata.dtype(), &DataType::Int64);
    assert_eq!(adata.x().column(1), &[1.0, 5.0, 9.0]);
    assert_eq!(
        adata.obs("region")?.labels(),
        vec![Some("tumor".to_string()), None, Some("stroma".to_string())]
    );
    assert!(adata.spatial().is_none());
    Ok(())
}

#[test]
fn test_builder_casts_to_first_feature_type() -> Result<(), CellError> {
    let table = cells();
    let adata = MatrixBuilder::new(&table).features(["DAPI", "CD4"]).build()?;
    assert_eq!(adata.dtype(), &DataType::Float32);
    assert_eq!(adata.x().column(0), &[0.5, 0.25, 1.0]);
    assert_eq!(adata.x().column(1), &[1.0, 5.0, 9.0]);
    Ok(())
}

#[test]
fn test_builder_errors() {
    let table = cells();

    let err = MatrixBuilder::new(&table).feature("^CD99$").build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(err.to_string().contains("does not match any in the dataset"));

    let err = MatrixBuilder::new(&table).feature("region").build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = MatrixBuilder::new(&table)
        .feature("CD4")
        .annotation("cluster")
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = MatrixBuilder::new(&table)
        .feature("CD4")
        .spatial("X", "Z")
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = MatrixBuilder::new(&table).build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_builder_spatial_and_round_trip() -> Result<(), CellError> {
    let table = cells();
    let adata = MatrixBuilder::new(&table)
        .features(["CD4", "CD8"])
        .spatial("X", "Y")
        .build()?;

    assert_eq!(adata.spatial(), Some(&[[10.0, 1.0], [20.0, 2.0], [30.0, 3.0]][..]));

    let batch = adata.to_table(None)?;
    assert_eq!(batch.schema().field(0).data_type(), &DataType::Int64);
    let cd8 = batch
        .column(1)
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert_eq!(cd8.values().to_vec(), vec![2, 0, 4]);
    Ok(())
}

#[test]
fn test_builder_keeps_large_integers_exact() -> Result<(), CellError> {
    let limit = 1i64 << 53;
    let table = Table::from_columns(vec![(
        "CD4",
        Arc::new(Int64Array::from(vec![limit, -limit, 1])) as ArrayRef,
    )])?;
    let adata = MatrixBuilder::new(&table).feature("CD4").build()?;

    let batch = adata.to_table(None)?;
    let cd4 = batch.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
    assert_eq!(cd4.values().to_vec(), vec![limit, -limit, 1]);
    Ok(())
}

#[test]
fn test_builder_rejects_inexact_integers() {
    let table = Table::from_columns(vec![(
        "CD4",
        Arc::new(Int64Array::from(vec![(1i64 << 53) + 1, 1])) as ArrayRef,
    )])
    .unwrap();
    let err = MatrixBuilder::new(&table).feature("CD4").build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(err.to_string().contains("CD4"));

    let table = Table::from_columns(vec![(
        "CD8",
        Arc::new(UInt64Array::from(vec![u64::MAX])) as ArrayRef,
    )])
    .unwrap();
    let err = MatrixBuilder::new(&table).feature("CD8").build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_layers() -> Result<(), CellError> {
    let mut adata = simple(&["a", "b"], &["f1"], vec![vec![1.0, 2.0]]);

    let scaled = FeatureMatrix::from_columns(2, vec![vec![0.0, 1.0]])?;
    adata.add_layer("scaled", scaled.clone())?;
    assert_eq!(adata.layer("scaled")?, &scaled);
    assert_eq!(adata.values(Some("scaled"))?, &scaled);
    assert_eq!(adata.layer_keys().collect::<Vec<_>>(), vec!["scaled"]);

    let err = adata.add_layer("scaled", scaled).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    let wrong_shape = FeatureMatrix::from_columns(1, vec![vec![0.0]])?;
    let err = adata.add_layer("other", wrong_shape).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = adata.to_table(Some("missing")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let batch = adata.to_table(Some("scaled"))?;
    assert_eq!(batch.schema().field(0).data_type(), &DataType::Float64);
    Ok(())
}

#[test]
fn test_obs_shape_checked_and_replaced() -> Result<(), CellError> {
    let mut adata = simple(&["a", "b"], &["f1"], vec![vec![1.0, 2.0]]);
    let err = adata
        .add_obs("score", Annotation::Numeric(vec![1.0]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    adata.add_obs("score", Annotation::Numeric(vec![1.0, 2.0]))?;
    adata.add_obs("score", Annotation::Numeric(vec![3.0, f64::NAN]))?;
    assert_eq!(adata.obs_keys().count(), 1);
    assert_eq!(adata.obs("score")?.labels(), vec![Some("3".to_string()), None]);

    let obs = adata.obs_table()?;
    assert_eq!(obs.num_columns(), 1);
    assert_eq!(obs.num_rows(), 2);
    Ok(())
}

#[test]
fn test_take_obs_keeps_blocks_aligned() -> Result<(), CellError> {
    let mut adata = simple(&["a", "b", "c"], &["f1"], vec![vec![1.0, 2.0, 3.0]]);
    adata.add_layer("double", FeatureMatrix::from_columns(3, vec![vec![2.0, 4.0, 6.0]])?)?;
    adata.set_spatial(vec![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]])?;

    let subset = adata.take_obs(&[2, 0])?;
    assert_eq!(subset.obs_names(), &["c", "a"]);
    assert_eq!(subset.layer("double")?.column(0), &[6.0, 2.0]);
    assert_eq!(subset.spatial().unwrap()[0], [2.0, 2.0]);

    assert!(adata.take_obs(&[3]).is_err());
    Ok(())
}

#[test]
fn test_concatenate_inner_joins_and_renames() -> Result<(), CellError> {
    let mut first = simple(&["0", "1"], &["CD4", "CD8"], vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    first.add_obs("region", Annotation::Categorical(vec![Some("r1".into()); 2]))?;
    first.add_layer("scaled", first.x().clone())?;
    first.insert_uns("source", serde_json::json!("first"));

    let mut second = simple(&["0", "1"], &["CD8", "CD20"], vec![vec![5.0, 6.0], vec![7.0, 8.0]]);
    second.add_obs("region", Annotation::Categorical(vec![Some("r2".into()); 2]))?;
    second.insert_uns("source", serde_json::json!("second"));

    let merged = concatenate(&[first, second])?;
    assert_eq!(merged.var_names(), &["CD8"]);
    assert_eq!(merged.n_obs(), 4);
    assert_eq!(merged.x().column(0), &[3.0, 4.0, 5.0, 6.0]);
    assert_eq!(merged.obs_names(), &["0", "1", "0-1", "1-1"]);
    assert_eq!(
        merged.obs("region")?.labels(),
        vec![
            Some("r1".to_string()),
            Some("r1".to_string()),
            Some("r2".to_string()),
            Some("r2".to_string())
        ]
    );
    assert!(merged.layer("scaled").is_err());
    assert!(merged.spatial().is_none());
    assert_eq!(merged.uns("source"), Some(&serde_json::json!("first")));
    Ok(())
}

#[test]
fn test_concatenate_keeps_shared_blocks() -> Result<(), CellError> {
    let mut first = simple(&["a"], &["f"], vec![vec![1.0]]);
    first.set_spatial(vec![[1.0, 1.0]])?;
    first.add_obs("score", Annotation::Numeric(vec![0.5]))?;
    let mut second = simple(&["b"], &["f"], vec![vec![2.0]]);
    second.set_spatial(vec![[2.0, 2.0]])?;
    second.add_obs("score", Annotation::Numeric(vec![1.5]))?;

    let merged = concatenate(&[first, second])?;
    assert_eq!(merged.spatial(), Some(&[[1.0, 1.0], [2.0, 2.0]][..]));
    assert_eq!(merged.obs("score")?, &Annotation::Numeric(vec![0.5, 1.5]));
    assert_eq!(merged.obs_names(), &["a", "b"]);

    let err = concatenate(&[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    Ok(())
}

#[test]
fn test_make_unique_names() {
    let names: Vec<String> = ["x", "x", "x", "y"].iter().map(|s| s.to_string()).collect();
    assert_eq!(make_unique(&names), vec!["x", "x-1", "x-2", "y"]);
}
