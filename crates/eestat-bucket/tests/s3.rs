use bytes::Bytes;
use eestat_bucket::{BucketError, BucketStore, S3BucketStore, S3Config, CSV_CONTENT_TYPE};

const REQUIRED_VARS: &[&str] = &[
    "EESTAT_TEST_S3_BUCKET",
    "EESTAT_TEST_S3_ENDPOINT",
    "EESTAT_TEST_S3_ACCESS_KEY_ID",
    "EESTAT_TEST_S3_SECRET_ACCESS_KEY",
];

fn config_from_env() -> Option<S3Config> {
    let var = |key: &str| std::env::var(key).ok().filter(|value| !value.is_empty());
    for &key in REQUIRED_VARS {
        var(key)?;
    }

    Some(S3Config {
        bucket: var("EESTAT_TEST_S3_BUCKET")?,
        region: var("EESTAT_TEST_S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
        endpoint: var("EESTAT_TEST_S3_ENDPOINT"),
        access_key_id: var("EESTAT_TEST_S3_ACCESS_KEY_ID"),
        secret_access_key: var("EESTAT_TEST_S3_SECRET_ACCESS_KEY"),
        force_path_style: true,
    })
}

#[tokio::test]
async fn s3_store_put_then_get() -> Result<(), BucketError> {
    let Some(config) = config_from_env() else {
        eprintln!(
            "Skipping S3 bucket test; set {} to enable",
            REQUIRED_VARS.join(", ")
        );
        return Ok(());
    };

    let store = S3BucketStore::new(config).await?;
    let key = "eestat-integration/economy_data.csv";

    store
        .put_object(key, Bytes::from_static(b"Year,Total\n"), CSV_CONTENT_TYPE)
        .await?;
    let fetched = store.get_object(key).await?;
    assert_eq!(fetched.as_ref(), b"Year,Total\n");

    assert!(matches!(
        store.get_object("eestat-integration/missing.csv").await,
        Err(BucketError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn s3_store_rejects_empty_bucket_name() {
    let result = S3BucketStore::new(S3Config::default()).await;
    assert!(matches!(result, Err(BucketError::Configuration(_))));
}
