//! Store contract scenarios shared by the in-memory and PostgreSQL tests.
#![allow(dead_code)]

use blog_service::db::BlogStore;
use blog_service::models::{NewComment, NewPost};
use blog_service::pagination::PageRequest;
use blog_service::StoreError;
use chrono::{DateTime, Duration, SubsecRound, TimeZone, Utc};

pub fn t(second: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_717_200_000 + second, 0)
        .single()
        .unwrap()
        .trunc_subsecs(6)
}

pub async fn post(store: &dyn BlogStore, title: &str) -> String {
    store
        .create_post(NewPost {
            title: title.to_string(),
            content: "C".to_string(),
            comments_allowed: true,
            created_at: Utc::now().trunc_subsecs(6),
        })
        .await
        .unwrap()
}

pub async fn comment_at(
    store: &dyn BlogStore,
    post_id: &str,
    parent_id: Option<&str>,
    created_at: DateTime<Utc>,
) -> String {
    store
        .create_comment(NewComment {
            post_id: post_id.to_string(),
            parent_id: parent_id.map(str::to_string),
            text: format!("comment at {created_at}"),
            created_at,
        })
        .await
        .unwrap()
}

/// Post round trip: the id is non-empty and the stored fields come back.
pub async fn post_round_trip(store: &dyn BlogStore) {
    let id = store
        .create_post(NewPost {
            title: "T".to_string(),
            content: "C".to_string(),
            comments_allowed: true,
            created_at: t(0),
        })
        .await
        .unwrap();
    assert!(!id.is_empty());

    let post = store.get_post(&id).await.unwrap();
    assert_eq!(post.title, "T");
    assert_eq!(post.content, "C");
    assert!(post.comments_allowed);
    assert_eq!(post.created_at, t(0));

    assert!(matches!(
        store.get_post("no-such-post").await,
        Err(StoreError::PostNotFound(_))
    ));
}

/// Three comments at t1 < t2 < t3 paged two at a time.
pub async fn two_pages_of_three(store: &dyn BlogStore) {
    let p1 = post(store, "P1").await;
    let c1 = comment_at(store, &p1, None, t(1)).await;
    let c2 = comment_at(store, &p1, None, t(2)).await;
    let c3 = comment_at(store, &p1, None, t(3)).await;

    let first = store
        .list_comments(&p1, &PageRequest::first(2).after(""))
        .await
        .unwrap();
    let ids: Vec<&str> = first.items.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec![c1.as_str(), c2.as_str()]);
    assert_eq!(first.end_cursor.as_deref(), Some(c2.as_str()));
    assert!(first.has_next_page);

    let cursor = first.end_cursor.unwrap();
    let second = store
        .list_comments(&p1, &PageRequest::first(2).after(cursor))
        .await
        .unwrap();
    let ids: Vec<&str> = second.items.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec![c3.as_str()]);
    assert!(!second.has_next_page);
}

/// Zero-size pages, unknown cursors and cursors from another post.
pub async fn pagination_edges(store: &dyn BlogStore) {
    let p1 = post(store, "P1").await;
    let p2 = post(store, "P2").await;
    comment_at(store, &p1, None, t(1)).await;
    comment_at(store, &p1, None, t(2)).await;
    let foreign = comment_at(store, &p2, None, t(3)).await;

    let empty = store.list_comments(&p1, &PageRequest::first(0)).await.unwrap();
    assert!(empty.items.is_empty());
    assert!(!empty.has_next_page);
    assert_eq!(empty.end_cursor, None);

    assert_eq!(
        store
            .list_comments(&p1, &PageRequest::first(5).after("missing"))
            .await
            .unwrap_err(),
        StoreError::InvalidCursor("missing".to_string())
    );

    assert_eq!(
        store
            .list_comments(&p1, &PageRequest::first(5).after(foreign.clone()))
            .await
            .unwrap_err(),
        StoreError::InvalidCursor(foreign)
    );

    assert_eq!(
        store
            .list_comments(&p1, &PageRequest::new(None, None))
            .await
            .unwrap_err(),
        StoreError::MissingParameter("first")
    );
}

/// C1 on P1; a reply to C1 claimed under P2 is an ownership mismatch.
pub async fn ownership_across_posts(store: &dyn BlogStore) {
    let p1 = post(store, "P1").await;
    let p2 = post(store, "P2").await;
    let c1 = comment_at(store, &p1, None, t(1)).await;
    comment_at(store, &p2, Some(&c1), t(2)).await;

    assert_eq!(
        store.check_comment_ownership(&c1, &p2).await,
        Err(StoreError::OwnershipMismatch {
            comment_id: c1.clone(),
            post_id: p2.clone(),
        })
    );
    assert_eq!(store.check_comment_ownership(&c1, &p1).await, Ok(()));
    assert_eq!(
        store.check_comment_ownership("missing", &p1).await,
        Err(StoreError::CommentNotFound("missing".to_string()))
    );
}

/// Same-timestamp comments still page in a total order without repeats.
pub async fn walk_with_timestamp_ties(store: &dyn BlogStore) {
    let p1 = post(store, "P1").await;
    let mut expected = Vec::new();
    for n in 0..11 {
        let created_at = t(0) + Duration::seconds(n / 4);
        let id = comment_at(store, &p1, None, created_at).await;
        expected.push((created_at, id));
    }
    expected.sort();
    let expected: Vec<String> = expected.into_iter().map(|(_, id)| id).collect();

    for page_size in [1, 2, 3, 4, 10, 11, 12] {
        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let request = PageRequest::new(Some(page_size), cursor.clone());
            let page = store.list_comments(&p1, &request).await.unwrap();
            seen.extend(page.items.iter().map(|c| c.id.clone()));
            if !page.has_next_page {
                break;
            }
            cursor = page.end_cursor.clone();
        }
        assert_eq!(seen, expected, "page_size={page_size}");
    }
}

pub async fn posts_listed_in_creation_order(store: &dyn BlogStore) {
    for (offset, title) in [(20, "late"), (10, "early")] {
        store
            .create_post(NewPost {
                title: title.to_string(),
                content: "C".to_string(),
                comments_allowed: false,
                created_at: t(offset),
            })
            .await
            .unwrap();
    }

    let titles: Vec<String> = store
        .list_posts()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.title)
        .collect();
    assert_eq!(titles, vec!["early", "late"]);
}
