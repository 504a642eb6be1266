//! Table operations end to end through the SDK transport.

#[cfg(test)]
mod tests {
    use raziel_core::{
        BatchOp, BatchOptions, CountOptions, DeleteOptions, Error, GetOptions, Key, PutOptions,
        QueryOptions, Step,
    };
    use raziel_model::TransportErrorCode;
    use serde_json::{Value, json};

    use crate::{drop_table, open_test_table};

    #[tokio::test]
    #[ignore = "requires running DynamoDB endpoint"]
    async fn test_should_put_get_and_delete() {
        let (client, table) = open_test_table("crud").await.unwrap();

        table
            .put(["a", "a"], &json!({"foo": 100}), PutOptions::default())
            .await
            .unwrap();
        let value: Value = table.get(["a", "a"], GetOptions::default()).await.unwrap();
        assert_eq!(value, json!({"foo": 100}));

        table.del(["a", "a"], DeleteOptions::default()).await.unwrap();
        let err = table
            .get::<Value>(["a", "a"], GetOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        drop_table(&client, table.name()).await;
    }

    #[tokio::test]
    #[ignore = "requires running DynamoDB endpoint"]
    async fn test_should_reject_existing_row_when_not_exists() {
        let (client, table) = open_test_table("cond").await.unwrap();

        let opts = PutOptions::default().not_exists();
        table.put(["a", "a"], &1, opts.clone()).await.unwrap();
        let err = table.put(["a", "a"], &2, opts).await.unwrap_err();
        let Error::Transport(err) = err else {
            panic!("expected a transport error, got {err}");
        };
        assert_eq!(err.code, TransportErrorCode::ConditionalCheckFailedException);

        drop_table(&client, table.name()).await;
    }

    #[tokio::test]
    #[ignore = "requires running DynamoDB endpoint"]
    async fn test_should_batch_query_and_count() {
        let (client, table) = open_test_table("batch").await.unwrap();

        let ops = vec![
            BatchOp::put(["a", "a"], json!(1)),
            BatchOp::put(["a", "b", "x"], json!(2)),
            BatchOp::put(["a", "b", "y"], json!(3)),
            BatchOp::put(["b", "a"], json!(4)),
        ];
        let summary = table.batch(&ops, BatchOptions::default()).await.unwrap();
        assert_eq!(summary.written, 4);

        let partition = table
            .query(QueryOptions::partition("a"))
            .unwrap()
            .collect_records()
            .await
            .unwrap();
        assert_eq!(partition.len(), 3);

        let prefixed = table
            .query(QueryOptions::prefix("a", ["b"]))
            .unwrap()
            .collect_records()
            .await
            .unwrap();
        let keys: Vec<_> = prefixed.into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec![Key::from(["a", "b/x"]), Key::from(["a", "b/y"])]);

        table
            .batch(&[BatchOp::delete(["b", "a"])], BatchOptions::default())
            .await
            .unwrap();
        assert_eq!(table.count(CountOptions::default()).await.unwrap(), 3);

        drop_table(&client, table.name()).await;
    }

    #[tokio::test]
    #[ignore = "requires running DynamoDB endpoint"]
    async fn test_should_resume_limited_query() {
        let (client, table) = open_test_table("cursor").await.unwrap();

        let ops: Vec<_> = (0..5)
            .map(|i| BatchOp::put(Key::new(["p".to_owned(), format!("{i:02}")]), json!(i)))
            .collect();
        table.batch(&ops, BatchOptions::default()).await.unwrap();

        let mut iter = table
            .query(QueryOptions::partition("p").with_limit(2))
            .unwrap();
        let mut first = Vec::new();
        let cursor = loop {
            match iter.advance().await.unwrap() {
                Step::Record(record) => first.push(record.value),
                Step::Done(cursor) => break cursor,
            }
        };
        assert_eq!(first, vec![json!(0), json!(1)]);

        let rest = table
            .query(QueryOptions::partition("p").with_start(cursor.unwrap()))
            .unwrap()
            .collect_records()
            .await
            .unwrap();
        let rest: Vec<_> = rest.into_iter().map(|r| r.value).collect();
        assert_eq!(rest, vec![json!(2), json!(3), json!(4)]);

        drop_table(&client, table.name()).await;
    }

    #[tokio::test]
    #[ignore = "requires running DynamoDB endpoint"]
    async fn test_should_skip_missing_and_expired_rows_in_get_many() {
        let (client, table) = open_test_table("many").await.unwrap();

        table.put(["a", "1"], &1, PutOptions::default()).await.unwrap();
        table
            .put(["a", "2"], &2, PutOptions::default().with_ttl("-1m"))
            .await
            .unwrap();

        let keys = vec![
            Key::from(["a", "1"]),
            Key::from(["a", "2"]),
            Key::from(["a", "3"]),
        ];
        let records = table.get_many(keys, GetOptions::default()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, json!(1));

        drop_table(&client, table.name()).await;
    }
}
