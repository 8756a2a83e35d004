use toron_scout::testing::*;

#[tokio::test]
async fn outdated_posts_pick_up_current_metrics() {
    let mut stale = post("stale", days_ago(3));
    stale.fetched = hours_ago(2);
    let fresh = post("fresh", days_ago(3));

    let mut current = stale.clone();
    current.score = 50;
    current.num_comments = 9;
    current.author = "someone-else".into();
    current.fetched = hours_ago(0);
    let forum = MockForum::new().on_info(current.clone());

    let h = Harness::new(forum, MockHistory::new(), MockShowApi::new());
    let posts = &h.toron.repository().posts;
    posts
        .put_many([("stale", &stale), ("fresh", &fresh)])
        .await
        .unwrap();
    let flushes_before = h.store.flush_count();

    let stats = h.toron.run_cycle().await.unwrap();

    assert_eq!(stats.refreshed, 1);
    assert_eq!(h.forum.info_calls(), 1);
    assert!(h.store.flush_count() > flushes_before);

    let stored = posts.get("stale").await.unwrap().unwrap();
    assert_eq!(stored.score, 50);
    assert_eq!(stored.num_comments, 9);
    assert_eq!(stored.author, "tester");
    assert_eq!(stored.fetched, current.fetched);
    assert_eq!(posts.get("fresh").await.unwrap(), Some(fresh));
}

#[tokio::test]
async fn posts_missing_upstream_are_left_alone() {
    let mut stale = post("gone", days_ago(20));
    stale.fetched = days_ago(5);
    let h = Harness::new(MockForum::new(), MockHistory::new(), MockShowApi::new());
    h.toron.repository().posts.put("gone", &stale).await.unwrap();

    let stats = h.toron.run_cycle().await.unwrap();

    assert_eq!(stats.refreshed, 0);
    assert_eq!(h.toron.repository().posts.get("gone").await.unwrap(), Some(stale));
}

#[tokio::test]
async fn prune_removes_only_old_low_value_posts() {
    let old_link = post("old_link", days_ago(300));
    let old_discussion = discussion(
        "old_discussion",
        days_ago(300),
        "Show - Episode 1 discussion",
        "Rate this episode",
    );
    let mut old_popular = post("old_popular", days_ago(300));
    old_popular.score = 2;
    let young_link = post("young_link", days_ago(10));

    let h = Harness::new(MockForum::new(), MockHistory::new(), MockShowApi::new());
    let posts = &h.toron.repository().posts;
    posts
        .put_many([
            ("old_link", &old_link),
            ("old_discussion", &old_discussion),
            ("old_popular", &old_popular),
            ("young_link", &young_link),
        ])
        .await
        .unwrap();

    let stats = h.toron.run_cycle().await.unwrap();

    assert_eq!(stats.pruned, 1);
    assert!(posts.get("old_link").await.unwrap().is_none());
    for kept in ["old_discussion", "old_popular", "young_link"] {
        assert!(posts.get(kept).await.unwrap().is_some(), "{kept} should be kept");
    }
}
