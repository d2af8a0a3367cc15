use super::*;

#[tokio::test]
async fn test_set_get_roundtrip() {
    let store = MemoryScheduleStore::new();
    store.hash_set("task.period", "a", "1".to_string()).await.unwrap();

    assert_eq!(store.hash_get("task.period", "a").await.unwrap().as_deref(), Some("1"));
    assert_eq!(store.hash_get("task.period", "b").await.unwrap(), None);
    assert_eq!(store.hash_get("other", "a").await.unwrap(), None);
}

#[tokio::test]
async fn test_namespaces_are_isolated() {
    let store = MemoryScheduleStore::new();
    store.hash_set("ns1", "a", "1".to_string()).await.unwrap();
    store.hash_set("ns2", "a", "2".to_string()).await.unwrap();

    let all = store.hash_get_all("ns1").await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all["a"], "1");
}

#[tokio::test]
async fn test_delete_missing_is_ok() {
    let store = MemoryScheduleStore::new();
    store.hash_delete("ns", "ghost").await.unwrap();

    store.hash_set("ns", "a", "1".to_string()).await.unwrap();
    store.hash_delete("ns", "a").await.unwrap();
    assert!(store.hash_get_all("ns").await.unwrap().is_empty());
    assert_eq!(store.len("ns").await, 0);
}

#[tokio::test]
async fn test_set_many_overwrites() {
    let store = MemoryScheduleStore::new();
    store.hash_set("ns", "a", "old".to_string()).await.unwrap();

    store
        .hash_set_many(
            "ns",
            vec![("a".to_string(), "new".to_string()), ("b".to_string(), "2".to_string())],
        )
        .await
        .unwrap();

    assert_eq!(store.len("ns").await, 2);
    assert_eq!(store.hash_get("ns", "a").await.unwrap().as_deref(), Some("new"));
}

#[tokio::test]
async fn test_set_many_empty_creates_nothing() {
    let store = MemoryScheduleStore::new();
    store.hash_set_many("ns", Vec::new()).await.unwrap();
    assert_eq!(store.len("ns").await, 0);
}
