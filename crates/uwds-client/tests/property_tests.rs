use proptest::prelude::*;
use std::sync::Arc;
use uwds_authority::MemoryAuthority;
use uwds_client::{DirtySet, Node, NodeCache};
use uwds_proto::{Authority, ClientId, NodeId, WorldScope};
use uwds_test_utils::open_scene;

fn offline_cache(count: usize) -> (Arc<NodeCache>, Vec<NodeId>) {
    let authority: Arc<dyn Authority> = Arc::new(MemoryAuthority::new());
    let cache = Arc::new(NodeCache::new(
        authority,
        WorldScope::new(ClientId::new("prop"), "prop"),
    ));
    let ids = (0..count)
        .map(|_| {
            let node = Node::new();
            let id = node.id().clone();
            cache.insert(node);
            id
        })
        .collect();
    (cache, ids)
}

#[derive(Debug, Clone)]
enum Op {
    SetParent(usize, usize),
    ClearParent(usize),
    AppendChild(usize, usize),
    RemoveChild(usize, usize),
}

fn op(count: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..count, 0..count).prop_map(|(c, p)| Op::SetParent(c, p)),
        (0..count).prop_map(Op::ClearParent),
        (0..count, 0..count).prop_map(|(p, c)| Op::AppendChild(p, c)),
        (0..count, 0..count).prop_map(|(p, c)| Op::RemoveChild(p, c)),
    ]
}

/// Random forest: node `i` optionally hangs under some node `< i`
fn forest() -> impl Strategy<Value = Vec<Option<usize>>> {
    (1..12usize).prop_flat_map(|n| {
        (0..n)
            .map(|i| {
                if i == 0 {
                    Just(None).boxed()
                } else {
                    proptest::option::of(0..i).boxed()
                }
            })
            .collect::<Vec<_>>()
    })
}

proptest! {
    #[test]
    fn prop_dirty_set_holds_each_id_once(names in proptest::collection::vec("[a-e]", 0..50)) {
        let set = DirtySet::new();
        for name in &names {
            set.insert(NodeId::new(name.as_str()));
        }

        let mut unique = names.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(set.len(), unique.len());

        let drained: Vec<String> = std::iter::from_fn(|| set.try_pop())
            .map(|id| id.as_str().to_string())
            .collect();
        prop_assert_eq!(drained, unique);
    }

    #[test]
    fn prop_links_stay_symmetric(ops in proptest::collection::vec(op(6), 0..60)) {
        let (cache, ids) = offline_cache(6);
        for op in ops {
            let _ = match op {
                Op::SetParent(c, p) => cache.set_parent(&ids[c], &ids[p]),
                Op::ClearParent(c) => cache.clear_parent(&ids[c]),
                Op::AppendChild(p, c) => cache.append_child(&ids[p], &ids[c]),
                Op::RemoveChild(p, c) => cache.remove_child(&ids[p], &ids[c]),
            };
        }

        for id in &ids {
            let node = cache.snapshot(id).unwrap();
            if let Some(parent) = node.parent() {
                let parent_node = cache.snapshot(parent).unwrap();
                prop_assert!(parent_node.children().contains(id));
            }
            for child in node.children() {
                let child_node = cache.snapshot(child).unwrap();
                prop_assert_eq!(child_node.parent(), Some(id));
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_mirror_is_order_independent(
        (parents, order) in forest().prop_flat_map(|parents| {
            let order: Vec<usize> = (0..parents.len()).collect();
            (Just(parents), Just(order).prop_shuffle())
        })
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let authority = Arc::new(MemoryAuthority::new());
            let alpha = open_scene(&authority, "alpha").await.unwrap();
            let beta = open_scene(&authority, "beta").await.unwrap();

            let source: Vec<NodeId> = parents
                .iter()
                .map(|_| alpha.new_node().id().clone())
                .collect();
            for (i, parent) in parents.iter().enumerate() {
                if let Some(p) = parent {
                    alpha.nodes().set_parent(&source[i], &source[*p]).unwrap();
                }
            }

            let mirrors: Vec<NodeId> = {
                for &i in &order {
                    beta.mirror(&alpha, &source[i]).unwrap();
                }
                source.iter().map(|id| beta.mirror_of(id).unwrap()).collect()
            };

            for (i, parent) in parents.iter().enumerate() {
                let mirrored = beta.nodes().snapshot(&mirrors[i]).unwrap();
                let expected = parent.map(|p| &mirrors[p]);
                assert_eq!(mirrored.parent(), expected);
                assert_eq!(
                    mirrored.children().len(),
                    parents.iter().filter(|q| **q == Some(i)).count()
                );
            }

            alpha.shutdown().await;
            beta.shutdown().await;
        });
    }
}
