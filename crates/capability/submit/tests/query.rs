use domain::{DataPoint, Precision};
use nutflux_submit::{
    Credentials, InfluxTarget, InfluxWriter, LogSink, PointSink, SubmitError, batch_precision,
    write_query,
};
use std::time::Duration;

fn target(credentials: Option<Credentials>) -> InfluxTarget {
    InfluxTarget {
        host: "http://127.0.0.1:8086".to_string(),
        database: "systems".to_string(),
        credentials,
    }
}

#[test]
fn query_has_only_db_without_creds_or_timestamps() {
    let points = vec![DataPoint::new("temp").field("value", 1i64)];
    let query = write_query(&target(None), &points);
    assert_eq!(query, vec![("db", "systems".to_string())]);
}

#[test]
fn query_includes_credentials() {
    let creds = Credentials::from(("user".to_string(), "sekrit".to_string()));
    let query = write_query(&target(Some(creds)), &[]);
    assert_eq!(
        query,
        vec![
            ("db", "systems".to_string()),
            ("u", "user".to_string()),
            ("p", "sekrit".to_string()),
        ]
    );
}

#[test]
fn precision_only_when_point_has_timestamp() {
    let untimed = DataPoint::new("a")
        .field("value", 1i64)
        .with_precision(Precision::Hours);
    assert_eq!(batch_precision(std::slice::from_ref(&untimed)), None);

    let timed = DataPoint::new("b")
        .field("value", 1i64)
        .with_timestamp(1000)
        .with_precision(Precision::Seconds);
    let points = vec![timed, untimed];
    assert_eq!(batch_precision(&points), Some(Precision::Seconds));
    let query = write_query(&target(None), &points);
    assert_eq!(query.last(), Some(&("precision", "s".to_string())));
}

#[test]
fn timestamp_without_explicit_precision_is_nanoseconds() {
    let points = vec![DataPoint::new("a").field("value", 1i64).with_timestamp(5)];
    assert_eq!(batch_precision(&points), Some(Precision::Nanoseconds));
}

#[tokio::test]
async fn writer_rejects_invalid_point_before_sending() {
    // 端口 9 不会被访问：编码失败先于网络请求
    let writer = InfluxWriter::new(
        InfluxTarget {
            host: "http://127.0.0.1:9".to_string(),
            database: "systems".to_string(),
            credentials: None,
        },
        Duration::from_millis(100),
    )
    .expect("writer");
    let err = writer
        .submit(&[DataPoint::new("empty")])
        .await
        .expect_err("invalid");
    assert!(matches!(err, SubmitError::Encode(_)));
}

#[tokio::test]
async fn writer_skips_empty_batch() {
    let writer = InfluxWriter::new(target(None), Duration::from_millis(100)).expect("writer");
    writer.submit(&[]).await.expect("empty batch");
}

#[tokio::test]
async fn log_sink_accepts_valid_batch() {
    let points = vec![DataPoint::new("temp").field("value", 1i64)];
    LogSink.submit(&points).await.expect("logged");
}
