use bytes::Bytes;
use eestat_bucket::{
    BucketError, BucketStore, LocalBucketStore, MemoryBucketStore, CSV_CONTENT_TYPE,
};

#[tokio::test]
async fn local_store_round_trips_objects() -> Result<(), BucketError> {
    let root = tempfile::tempdir()?;
    let store = LocalBucketStore::new(root.path(), "estonia-silver")?;

    store
        .put_object(
            "transformed_economy_data.csv",
            Bytes::from_static(b"Year,Total\n2020,1.5\n"),
            CSV_CONTENT_TYPE,
        )
        .await?;

    assert!(root
        .path()
        .join("estonia-silver/transformed_economy_data.csv")
        .is_file());
    let fetched = store.get_object("transformed_economy_data.csv").await?;
    assert_eq!(fetched.as_ref(), b"Year,Total\n2020,1.5\n");

    let missing = store.get_object("transformed_income_data.csv").await;
    assert!(matches!(missing, Err(BucketError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn local_store_keeps_keys_with_spaces() -> Result<(), BucketError> {
    let root = tempfile::tempdir()?;
    let store = LocalBucketStore::new(root.path(), "estonia-gold")?;

    store
        .put_object(
            "summary_from economy_data_summary.pdf",
            Bytes::from_static(b"%PDF-"),
            "application/pdf",
        )
        .await?;
    let fetched = store
        .get_object("summary_from economy_data_summary.pdf")
        .await?;
    assert_eq!(fetched.as_ref(), b"%PDF-");
    Ok(())
}

#[tokio::test]
async fn local_store_rejects_keys_outside_the_bucket() -> Result<(), BucketError> {
    let root = tempfile::tempdir()?;
    let store = LocalBucketStore::new(root.path(), "estonia-bronze")?;

    let result = store.get_object("../secrets.csv").await;
    assert!(matches!(result, Err(BucketError::Configuration(_))));

    let result = store
        .put_object("/etc/passwd", Bytes::new(), CSV_CONTENT_TYPE)
        .await;
    assert!(matches!(result, Err(BucketError::Configuration(_))));
    Ok(())
}

#[test]
fn local_store_requires_a_bucket_name() {
    let result = LocalBucketStore::new("/tmp", "");
    assert!(matches!(result, Err(BucketError::Configuration(_))));
}

#[tokio::test]
async fn memory_store_reports_missing_objects() {
    let store = MemoryBucketStore::new("estonia-bronze");
    store.insert("economy_data.csv", Bytes::from_static(b"a,b\n"), CSV_CONTENT_TYPE);

    assert_eq!(store.bucket(), "estonia-bronze");
    assert_eq!(store.keys(), vec!["economy_data.csv".to_string()]);
    assert!(store.get_object("economy_data.csv").await.is_ok());
    assert!(matches!(
        store.get_object("income_data.csv").await,
        Err(BucketError::NotFound(key)) if key == "income_data.csv"
    ));

    let stored = store.object("economy_data.csv").expect("object seeded");
    assert_eq!(stored.content_type, CSV_CONTENT_TYPE);
}
