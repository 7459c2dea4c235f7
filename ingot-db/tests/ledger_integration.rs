use sqlx::SqlitePool;
use ingot_db::{MemberRepository, PurchaseKind, PurchaseRepository};

#[tokio::test]
async fn full_reset_removes_member_and_history() {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    MemberRepository::create(&pool, "2001", 50_000_000).await.unwrap();
    PurchaseRepository::record(&pool, "2001", PurchaseKind::Boost, "10 x +15", 30_000_000)
        .await
        .unwrap();
    PurchaseRepository::record(&pool, "2001", PurchaseKind::Tip, "Tip", 1_000_000)
        .await
        .unwrap();

    assert_eq!(
        PurchaseRepository::total_spent(&pool, "2001").await.unwrap(),
        31_000_000
    );

    let deleted = PurchaseRepository::delete_for_member(&pool, "2001").await.unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(MemberRepository::delete(&pool, "2001").await.unwrap(), 1);

    assert!(MemberRepository::get(&pool, "2001").await.unwrap().is_none());
    assert_eq!(PurchaseRepository::total_spent(&pool, "2001").await.unwrap(), 0);
}

#[tokio::test]
async fn ledger_snapshots_follow_the_balance() {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    MemberRepository::create(&pool, "2002", 10_000).await.unwrap();
    for cost in [1_000, 2_000, 3_000] {
        PurchaseRepository::record(&pool, "2002", PurchaseKind::Boost, "order", cost)
            .await
            .unwrap();
    }
    MemberRepository::credit(&pool, "2002", 5_000).await.unwrap();
    PurchaseRepository::record(&pool, "2002", PurchaseKind::Tip, "Tip", 9_000)
        .await
        .unwrap();

    // Newest first: 9000 after the credit, then the three boosts
    let history = PurchaseRepository::history(&pool, "2002", Some(50)).await.unwrap();
    let after: Vec<i64> = history.iter().map(|p| p.balance_after).collect();
    assert_eq!(after, vec![0, 4_000, 7_000, 9_000]);

    let member = MemberRepository::get(&pool, "2002").await.unwrap().unwrap();
    assert_eq!(member.balance_gold, 0);
}
