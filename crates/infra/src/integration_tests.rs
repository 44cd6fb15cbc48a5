//! Scenario tests for the stock store contract, run against the in-memory
//! implementation.
//!
//! Verifies:
//! - Dispatches decrement every linked row or none of them
//! - Conditional subtracts never drive a quantity negative, even concurrently
//! - Link replacement is a full, atomic swap
//! - Reads are repeatable

use std::sync::Arc;

use proptest::prelude::*;

use antibiostock_core::{
    Antibiotic, AntibioticCode, DispatchRequest, LinkReplacement, Panel, PanelId, StockError,
    StockUpdate, Withdrawal,
};

use crate::stock_store::{InMemoryStockStore, StockStore};

fn code(s: &str) -> AntibioticCode {
    AntibioticCode::parse(s).unwrap()
}

fn panel_id(id: i64) -> PanelId {
    PanelId::new(id).unwrap()
}

fn antibiotic(c: &str, name: &str, quantity: i64) -> Antibiotic {
    Antibiotic::new(code(c), name, quantity, 0).unwrap()
}

fn panel(id: i64, name: &str) -> Panel {
    Panel {
        id: panel_id(id),
        name: name.to_string(),
    }
}

/// Panel 1 links A (qty 10) and B (qty 2); panel 3 links X and Y (qty 5 each);
/// panel 2 has no links.
fn setup() -> InMemoryStockStore {
    InMemoryStockStore::new()
        .with_antibiotic(antibiotic("A", "Amikacina", 10))
        .with_antibiotic(antibiotic("B", "Bacitracina", 2))
        .with_antibiotic(antibiotic("X", "Xilomicina", 5))
        .with_antibiotic(antibiotic("Y", "Yodomicina", 5))
        .with_antibiotic(antibiotic("AMX", "Amoxicilina", 7))
        .with_antibiotic(antibiotic("CIP", "Ciprofloxacino", 7))
        .with_panel(panel(1, "Urocultivo"))
        .with_panel(panel(2, "Vacio"))
        .with_panel(panel(3, "Hemocultivo"))
        .with_link(panel_id(1), code("A"))
        .with_link(panel_id(1), code("B"))
        .with_link(panel_id(3), code("X"))
        .with_link(panel_id(3), code("Y"))
}

async fn quantities(store: &impl StockStore) -> Vec<(String, i64)> {
    store
        .list_antibiotics()
        .await
        .unwrap()
        .into_iter()
        .map(|a| (a.code.into_inner(), a.quantity))
        .collect()
}

#[tokio::test]
async fn dispatch_decrements_every_linked_row_ordered_by_name() {
    let store = setup();
    let receipt = store
        .register_dispatch(DispatchRequest::new(3, 2).unwrap())
        .await
        .unwrap();

    assert_eq!(receipt.panel_id, panel_id(3));
    assert_eq!(receipt.units, 2);
    let affected: Vec<_> = receipt
        .affected
        .iter()
        .map(|a| (a.code.as_str(), a.quantity))
        .collect();
    assert_eq!(affected, vec![("X", 3), ("Y", 3)]);
}

#[tokio::test]
async fn insufficient_dispatch_changes_nothing() {
    let store = setup();
    let before = quantities(&store).await;

    let err = store
        .register_dispatch(DispatchRequest::new(1, 5).unwrap())
        .await
        .unwrap_err();

    match err {
        StockError::InsufficientStock(shortfalls) => {
            assert_eq!(shortfalls.len(), 1);
            assert_eq!(shortfalls[0].item.code, code("B"));
            assert_eq!(shortfalls[0].required, 5);
        }
        other => panic!("expected insufficient stock, got {other:?}"),
    }
    assert_eq!(quantities(&store).await, before);
}

#[tokio::test]
async fn dangling_link_aborts_dispatch() {
    let store = setup().with_link(panel_id(3), code("GONE"));
    let before = quantities(&store).await;

    let err = store
        .register_dispatch(DispatchRequest::new(3, 1).unwrap())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        StockError::DanglingReference {
            panel_id: panel_id(3),
            missing: vec![code("GONE")],
        }
    );
    assert_eq!(quantities(&store).await, before);
}

#[tokio::test]
async fn removed_antibiotic_leaves_dangling_link() {
    let store = setup();
    store.remove_antibiotic(&code("Y")).unwrap();
    let err = store
        .register_dispatch(DispatchRequest::new(3, 1).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, StockError::DanglingReference { .. }));
}

#[tokio::test]
async fn panel_without_links_cannot_dispatch() {
    let store = setup();
    let err = store
        .register_dispatch(DispatchRequest::new(2, 1).unwrap())
        .await
        .unwrap_err();
    assert_eq!(err, StockError::NoLinkedItems(panel_id(2)));
}

#[tokio::test]
async fn dispatch_to_unknown_panel_is_rejected_as_invalid() {
    let store = setup();
    let before = quantities(&store).await;
    let err = store
        .register_dispatch(DispatchRequest::new(99, 1).unwrap())
        .await
        .unwrap_err();
    assert_eq!(err, StockError::validation("panel 99 does not exist"));
    assert_eq!(quantities(&store).await, before);
}

#[tokio::test]
async fn duplicate_links_are_decremented_once() {
    let store = setup().with_link(panel_id(3), code("X"));
    let receipt = store
        .register_dispatch(DispatchRequest::new(3, 1).unwrap())
        .await
        .unwrap();
    assert_eq!(receipt.affected.len(), 2);
    assert!(receipt.affected.iter().all(|a| a.quantity == 4));
}

#[tokio::test]
async fn concurrent_withdrawals_never_overdraw() {
    let store = Arc::new(setup());

    let mut handles = Vec::new();
    for _ in 0..2 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .withdraw(Withdrawal::new(code("AMX"), 5).unwrap())
                .await
        }));
    }

    let mut ok = 0;
    let mut insufficient = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => ok += 1,
            Err(StockError::InsufficientStock(_)) => insufficient += 1,
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }
    assert_eq!((ok, insufficient), (1, 1));

    let amx = store
        .list_antibiotics()
        .await
        .unwrap()
        .into_iter()
        .find(|a| a.code == code("AMX"))
        .unwrap();
    assert_eq!(amx.quantity, 2);
}

#[tokio::test]
async fn concurrent_dispatches_on_shared_rows_serialize() {
    // X and Y hold 5 each; three dispatches of 2 can only fit twice.
    let store = Arc::new(setup());

    let mut handles = Vec::new();
    for _ in 0..3 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .register_dispatch(DispatchRequest::new(3, 2).unwrap())
                .await
        }));
    }

    let mut ok = 0;
    for h in handles {
        if h.await.unwrap().is_ok() {
            ok += 1;
        }
    }
    assert_eq!(ok, 2);

    let linked = store.linked_antibiotics(panel_id(3)).await.unwrap();
    assert!(linked.iter().all(|a| a.quantity == 1));
}

#[tokio::test]
async fn withdraw_distinguishes_unknown_from_insufficient() {
    let store = setup();
    let missing = store
        .withdraw(Withdrawal::new(code("NOPE"), 1).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(missing, StockError::NotFound(_)));

    let short = store
        .withdraw(Withdrawal::new(code("B"), 3).unwrap())
        .await
        .unwrap_err();
    match short {
        StockError::InsufficientStock(s) => assert_eq!(s[0].item.quantity, 2),
        other => panic!("expected insufficient stock, got {other:?}"),
    }
}

#[tokio::test]
async fn link_replacement_is_a_full_swap() {
    let store = setup();
    let saved = store
        .replace_links(LinkReplacement::new(panel_id(1), vec![code("AMX"), code("CIP")]))
        .await
        .unwrap();
    assert_eq!(saved, 2);

    store
        .replace_links(LinkReplacement::new(panel_id(1), vec![code("CIP")]))
        .await
        .unwrap();
    assert_eq!(store.linked_codes(panel_id(1)).await.unwrap(), vec![code("CIP")]);
}

#[tokio::test]
async fn failed_link_replacement_keeps_previous_links() {
    let store = setup();
    let err = store
        .replace_links(LinkReplacement::new(panel_id(1), vec![code("CIP"), code("GHOST")]))
        .await
        .unwrap_err();
    assert!(matches!(err, StockError::Validation(msg) if msg.contains("GHOST")));
    assert_eq!(
        store.linked_codes(panel_id(1)).await.unwrap(),
        vec![code("A"), code("B")]
    );
}

#[tokio::test]
async fn link_replacement_preserves_duplicates() {
    let store = setup();
    let saved = store
        .replace_links(LinkReplacement::new(panel_id(2), vec![code("CIP"), code("CIP")]))
        .await
        .unwrap();
    assert_eq!(saved, 2);
    assert_eq!(store.linked_codes(panel_id(2)).await.unwrap().len(), 2);
}

#[tokio::test]
async fn membership_flags_linked_rows() {
    let store = setup();
    let rows = store.panel_membership(panel_id(1)).await.unwrap();
    assert_eq!(rows.len(), 6);
    let linked: Vec<_> = rows
        .iter()
        .filter(|r| r.linked)
        .map(|r| r.code.as_str())
        .collect();
    assert_eq!(linked, vec!["A", "B"]);
}

#[tokio::test]
async fn reads_are_repeatable() {
    let store = setup();
    assert_eq!(
        store.list_antibiotics().await.unwrap(),
        store.list_antibiotics().await.unwrap()
    );
    assert_eq!(
        store.list_panels().await.unwrap(),
        store.list_panels().await.unwrap()
    );
    let names: Vec<_> = store
        .list_panels()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["Hemocultivo", "Urocultivo", "Vacio"]);
}

#[tokio::test]
async fn update_and_below_minimum() {
    let store = setup();
    let updated = store
        .update_antibiotic(&code("CIP"), StockUpdate::new(None, Some(9)).unwrap())
        .await
        .unwrap();
    assert_eq!(updated.quantity, 7);
    assert_eq!(updated.minimum_threshold, 9);

    let low = store.below_minimum().await.unwrap();
    assert_eq!(low, vec![updated]);

    let err = store
        .update_antibiotic(&code("NOPE"), StockUpdate::new(Some(1), None).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, StockError::NotFound(_)));
}

#[derive(Debug, Clone)]
enum Op {
    Withdraw(usize, i64),
    Dispatch(i64),
    Set(usize, i64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..4, 1i64..8).prop_map(|(i, n)| Op::Withdraw(i, n)),
        (1i64..6).prop_map(Op::Dispatch),
        (0usize..4, 0i64..10).prop_map(|(i, n)| Op::Set(i, n)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        ..ProptestConfig::default()
    })]

    /// Property: no sequence of withdrawals, dispatches and overwrites leaves
    /// a negative quantity, and a failed dispatch leaves every row untouched.
    #[test]
    fn quantities_never_go_negative(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let store = setup();
            let codes = ["A", "B", "X", "Y"];

            for op in ops {
                let before = quantities(&store).await;
                match op {
                    Op::Withdraw(i, n) => {
                        let _ = store.withdraw(Withdrawal::new(code(codes[i]), n).unwrap()).await;
                    }
                    Op::Dispatch(units) => {
                        let res = store.register_dispatch(DispatchRequest::new(1, units).unwrap()).await;
                        if res.is_err() {
                            prop_assert_eq!(quantities(&store).await, before);
                        }
                    }
                    Op::Set(i, n) => {
                        let _ = store
                            .update_antibiotic(&code(codes[i]), StockUpdate::new(Some(n), None).unwrap())
                            .await;
                    }
                }
                for (_, q) in quantities(&store).await {
                    prop_assert!(q >= 0);
                }
            }
            Ok(())
        })?;
    }
}
