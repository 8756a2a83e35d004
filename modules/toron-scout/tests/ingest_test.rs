use toron_scout::testing::*;

#[tokio::test]
async fn reingesting_the_same_listing_changes_nothing() {
    let a = post("a", hours_ago(1));
    let b = post("b", hours_ago(2));
    let c = post("c", hours_ago(3));
    let forum = MockForum::new()
        .on_page(None, vec![a, b], Some("t1"))
        .on_page(Some("t1"), vec![c], None);
    let h = Harness::new(forum, MockHistory::new(), MockShowApi::new());

    let first = h.toron.run_cycle().await.unwrap();
    assert_eq!(first.ingest.pages, 2);
    assert_eq!(first.ingest.written, 3);
    assert_eq!(first.ingest.gap, None);
    let before = h.store.snapshot().await;

    let second = h.toron.run_cycle().await.unwrap();
    assert_eq!(second.ingest.written, 3);
    assert_eq!(second.ingest.gap, None);
    assert_eq!(h.store.snapshot().await, before);
}

#[tokio::test]
async fn gap_in_live_feed_is_backfilled_from_history() {
    let old = post("old", hours_ago(10));
    let g1 = post("g1", hours_ago(8));
    let g2 = post("g2", hours_ago(6));
    let g3 = post("g3", hours_ago(4));
    let n2 = post("n2", hours_ago(2));
    let n1 = post("n1", hours_ago(1));

    let forum = MockForum::new().on_page(None, vec![n1.clone(), n2.clone()], None);
    let history = MockHistory::new()
        .with_posts(vec![g1.clone(), g2.clone(), g3.clone(), n2.clone(), n1.clone()])
        .page_size(2);
    let h = Harness::new(forum, history, MockShowApi::new());
    h.toron
        .repository()
        .posts
        .put("old", &old)
        .await
        .unwrap();

    let stats = h.toron.run_cycle().await.unwrap();

    assert_eq!(stats.ingest.gap, Some((old.created_utc, n2.created_utc)));
    assert_eq!(stats.ingest.backfilled, 5);
    for id in ["g1", "g2", "g3"] {
        assert!(
            h.toron.repository().posts.get(id).await.unwrap().is_some(),
            "{id} should have been backfilled"
        );
    }
    // sweep starts just below the prior high-water mark, resumes one second
    // before each page's newest post and stops once it passes the oldest
    // post the live feed returned
    assert_eq!(
        h.history.cursors(),
        vec![
            old.created_utc - 1,
            g2.created_utc - 1,
            g3.created_utc - 1,
            n2.created_utc - 1
        ]
    );
}

#[tokio::test]
async fn backfill_keeps_posts_sharing_a_second_across_pages() {
    let old = post("old", hours_ago(10));
    let g1 = post("g1", hours_ago(8));
    let same_second = hours_ago(6);
    let g2 = post("g2", same_second);
    let g3 = post("g3", same_second);
    let n1 = post("n1", hours_ago(1));

    let forum = MockForum::new().on_page(None, vec![n1.clone()], None);
    let history = MockHistory::new()
        .with_posts(vec![g1, g2, g3, n1])
        .page_size(2);
    let h = Harness::new(forum, history, MockShowApi::new());
    h.toron.repository().posts.put("old", &old).await.unwrap();

    let stats = h.toron.run_cycle().await.unwrap();

    assert!(stats.ingest.gap.is_some());
    assert_eq!(stats.ingest.backfilled, 4);
    let posts = &h.toron.repository().posts;
    for id in ["g1", "g2", "g3", "n1"] {
        assert!(posts.get(id).await.unwrap().is_some(), "{id} missing after backfill");
    }

    // nothing left for a later cycle to find
    let again = h.toron.run_cycle().await.unwrap();
    assert_eq!(again.ingest.gap, None);
}

#[tokio::test]
async fn no_backfill_when_live_feed_overlaps_store() {
    let stored = post("s", hours_ago(3));
    let forum = MockForum::new().on_page(
        None,
        vec![post("n", hours_ago(1)), post("s", hours_ago(3))],
        None,
    );
    let history = MockHistory::new().with_posts(vec![post("x", hours_ago(2))]);
    let h = Harness::new(forum, history, MockShowApi::new());
    h.toron.repository().posts.put("s", &stored).await.unwrap();

    let stats = h.toron.run_cycle().await.unwrap();

    assert_eq!(stats.ingest.gap, None);
    assert!(h.history.cursors().is_empty());
    assert!(h.toron.repository().posts.get("x").await.unwrap().is_none());
}

#[tokio::test]
async fn forward_paging_stops_after_consecutive_stored_pages() {
    let p1 = post("p1", hours_ago(1));
    let p2 = post("p2", hours_ago(2));
    let p3 = post("p3", hours_ago(3));
    let p4 = post("p4", hours_ago(4));
    let forum = MockForum::new()
        .on_page(None, vec![p1.clone()], Some("t1"))
        .on_page(Some("t1"), vec![p2.clone()], Some("t2"))
        .on_page(Some("t2"), vec![p3.clone()], Some("t3"))
        .on_page(Some("t3"), vec![p4], None);
    let h = Harness::new(forum, MockHistory::new(), MockShowApi::new());
    let posts = &h.toron.repository().posts;
    posts
        .put_many([("p1", &p1), ("p2", &p2), ("p3", &p3)])
        .await
        .unwrap();

    let stats = h.toron.run_cycle().await.unwrap();

    assert_eq!(stats.ingest.pages, 3);
    assert_eq!(h.forum.newest_calls(), 3);
    assert!(posts.get("p4").await.unwrap().is_none());
}

#[tokio::test]
async fn metrics_from_the_listing_are_folded_into_stored_posts() {
    let mut first = post("a", hours_ago(5));
    first.author = "original".into();
    let h = Harness::new(MockForum::new(), MockHistory::new(), MockShowApi::new());
    h.toron.repository().posts.put("a", &first).await.unwrap();

    let mut newer = first.clone();
    newer.author = "renamed".into();
    newer.score = 77;
    newer.num_comments = 12;
    let forum = MockForum::new().on_page(None, vec![newer], None);
    let h = Harness::on_store(h.store.clone(), forum, MockHistory::new(), MockShowApi::new());

    h.toron.run_cycle().await.unwrap();

    let stored = h.toron.repository().posts.get("a").await.unwrap().unwrap();
    assert_eq!(stored.author, "original");
    assert_eq!(stored.score, 77);
    assert_eq!(stored.num_comments, 12);
}

#[tokio::test]
async fn linked_posts_are_prefetched_without_following_their_links() {
    let body = "Previous episode: https://www.reddit.com/r/anime/comments/prev1/episode_1/ enjoy";
    let a = discussion("a", hours_ago(1), "Show - Episode 2 discussion", body);
    let prev = discussion(
        "prev1",
        hours_ago(170),
        "Show - Episode 1 discussion",
        "Next: https://www.reddit.com/r/anime/comments/next1/episode_2/",
    );
    let forum = MockForum::new()
        .on_page(None, vec![a], None)
        .on_info(prev.clone());
    let h = Harness::new(forum, MockHistory::new(), MockShowApi::new());

    let stats = h.toron.run_cycle().await.unwrap();

    assert_eq!(stats.ingest.prefetched, 1);
    assert_eq!(h.forum.info_calls(), 1);
    let stored = h.toron.repository().posts.get("prev1").await.unwrap();
    assert_eq!(stored, Some(prev));
    assert!(h.toron.repository().posts.get("next1").await.unwrap().is_none());
}

#[tokio::test]
async fn unreachable_forum_ends_the_cycle_cleanly() {
    let h = Harness::new(MockForum::new().down(), MockHistory::new(), MockShowApi::new());

    let stats = h.toron.run_cycle().await.unwrap();

    assert_eq!(stats.ingest.pages, 0);
    assert_eq!(stats.ingest.written, 0);
    // every attempt of the single page request
    assert_eq!(h.forum.newest_calls(), 3);
    assert!(h.store.is_empty().await);
}
