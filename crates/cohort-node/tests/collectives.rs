//! Collective operations, end to end over a real hub.

mod common;
use common::with_cohort;

#[tokio::test]
async fn reduce_product_to_root_3() {
    with_cohort(4, |node| async move {
        let contribution = node.id() + 1;
        let result = node.reduce(3, contribution, |a, b| a * b).await.unwrap();
        if node.id() == 3 {
            assert_eq!(result, Some(24));
        } else {
            assert_eq!(result, None);
        }
    })
    .await;
}

#[tokio::test]
async fn reduce_sum_to_root_0() {
    with_cohort(4, |node| async move {
        let result = node.reduce(0, node.id(), |a, b| a + b).await.unwrap();
        if node.id() == 0 {
            assert_eq!(result, Some(6));
        } else {
            assert_eq!(result, None);
        }
    })
    .await;
}

#[tokio::test]
async fn reduce_with_noncommutative_operator_keeps_pair_order() {
    // String concatenation is associative but not commutative; the engine's
    // fixed pair order folds node-id order for root 0.
    with_cohort(4, |node| async move {
        let piece = node.id().to_string();
        let result = node.reduce(0, piece, |a, b| format!("{b}{a}")).await.unwrap();
        if node.id() == 0 {
            assert_eq!(result.as_deref(), Some("0123"));
        }
    })
    .await;
}

#[tokio::test]
async fn broadcast_from_root_7() {
    with_cohort(8, |node| async move {
        let value = (node.id() == 7).then_some(42i64);
        let got = node.broadcast(7, value).await.unwrap();
        assert_eq!(got, 42);
    })
    .await;
}

#[tokio::test]
async fn scatter_from_root_2() {
    with_cohort(4, |node| async move {
        let items = (node.id() == 2).then(|| vec![0i64, 1, 10, 11, 20, 21, 30, 31]);
        let slice = node.scatter(2, items).await.unwrap();
        assert_eq!(slice, vec![10 * node.id(), 10 * node.id() + 1]);
    })
    .await;
}

#[tokio::test]
async fn gather_to_root_1() {
    with_cohort(4, |node| async move {
        let items = vec![node.id(), -node.id()];
        let gathered = node.gather(1, items).await.unwrap();
        if node.id() == 1 {
            assert_eq!(gathered, Some(vec![0, 0, 1, -1, 2, -2, 3, -3]));
        } else {
            assert_eq!(gathered, None);
        }
    })
    .await;
}

#[tokio::test]
async fn scatter_then_gather_restores_the_list() {
    with_cohort(4, |node| async move {
        let source: Vec<i64> = (0..16).collect();
        let items = (node.id() == 0).then(|| source.clone());
        let slice = node.scatter(0, items).await.unwrap();
        assert_eq!(slice.len(), 4);

        let gathered = node.gather(0, slice).await.unwrap();
        if node.id() == 0 {
            assert_eq!(gathered, Some(source));
        }
    })
    .await;
}

#[tokio::test]
async fn reduce_all_gives_every_node_the_sum() {
    with_cohort(4, |node| async move {
        let total = node.reduce_all(node.id(), |a, b| a + b).await.unwrap();
        assert_eq!(total, 6);
    })
    .await;
}

#[tokio::test]
async fn gather_all_gives_every_node_the_full_list() {
    with_cohort(4, |node| async move {
        let combined = node.gather_all(vec![node.id() * 2]).await.unwrap();
        assert_eq!(combined, vec![0, 2, 4, 6]);
    })
    .await;
}

#[tokio::test]
async fn back_to_back_collectives_stay_isolated() {
    // The completion barriers must keep a fast node's next collective from
    // leaking sends into a slow partner's current one.
    with_cohort(4, |node| async move {
        for round in 0..5i64 {
            let total = node
                .reduce_all(node.id() + round, |a, b| a + b)
                .await
                .unwrap();
            assert_eq!(total, 6 + 4 * round);

            let slice = node
                .scatter(0, (node.id() == 0).then(|| (0..8).map(|v| v + round).collect()))
                .await
                .unwrap();
            assert_eq!(slice, vec![2 * node.id() + round, 2 * node.id() + round + 1]);
        }
    })
    .await;
}

#[tokio::test]
async fn single_node_cohort_collectives_are_identity() {
    with_cohort(1, |node| async move {
        let reduced = node.reduce(0, 5i64, |a, b| a + b).await.unwrap();
        assert_eq!(reduced, Some(5));

        let broadcast = node.broadcast(0, Some("solo")).await.unwrap();
        assert_eq!(broadcast, "solo");

        let slice = node.scatter(0, Some(vec![1i64, 2, 3])).await.unwrap();
        assert_eq!(slice, vec![1, 2, 3]);

        let gathered = node.gather(0, vec![9i64]).await.unwrap();
        assert_eq!(gathered, Some(vec![9]));
    })
    .await;
}

#[tokio::test]
async fn collectives_carry_structured_payloads() {
    with_cohort(2, |node| async move {
        let pairs = vec![(node.id(), node.id().to_string())];
        let combined = node.gather_all(pairs).await.unwrap();
        assert_eq!(combined, vec![(0, "0".to_string()), (1, "1".to_string())]);
    })
    .await;
}
