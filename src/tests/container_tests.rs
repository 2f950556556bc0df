use super::fixture::{dialog, el, page, with_bounds, FakeDriver};
use super::init_tracing;
use crate::snapshot::FrameContext;
use crate::{active_container, DomAdapter, LegacyAdapter, ShadowAdapter};

async fn snap(root: crate::Node) -> crate::Snapshot {
    use crate::Driver;
    FakeDriver::new(root)
        .snapshot(&FrameContext::Top)
        .await
        .unwrap()
}

#[tokio::test]
async fn topmost_dialog_wins() {
    init_tracing();
    let snapshot = snap(page(vec![
        dialog("dlg-under", 5, 0.0, 0.0, 800.0, 600.0, vec![]),
        dialog("dlg-over", 20, 100.0, 100.0, 400.0, 300.0, vec![]),
    ]))
    .await;

    let container = active_container(&snapshot, &LegacyAdapter).unwrap();
    assert_eq!(container.id, "dlg-over");
    assert_eq!(container.rank, 20);
}

#[tokio::test]
async fn duplicate_at_identical_coordinates_is_collapsed() {
    init_tracing();
    // Rendering artifact: the same dialog painted twice at one position.
    let snapshot = snap(page(vec![
        dialog("dlg-ghost", 30, 100.0, 100.0, 400.0, 300.0, vec![]),
        dialog("dlg-real", 40, 100.0, 100.0, 400.0, 300.0, vec![]),
    ]))
    .await;

    let container = active_container(&snapshot, &LegacyAdapter).unwrap();
    assert_eq!(container.id, "dlg-real");
}

#[tokio::test]
async fn artifact_layers_never_become_containers() {
    init_tracing();
    let overlay = with_bounds(
        el(
            "svg",
            &[("class", "tmodaldialog"), ("id", "svg-layer"), ("style", "z-index: 99")],
            "",
            vec![],
        ),
        0.0,
        0.0,
        800.0,
        600.0,
    );
    let snapshot = snap(page(vec![
        dialog("dlg-main", 10, 0.0, 0.0, 800.0, 600.0, vec![]),
        overlay,
    ]))
    .await;

    let container = active_container(&snapshot, &LegacyAdapter).unwrap();
    assert_eq!(container.id, "dlg-main");
}

#[tokio::test]
async fn invisible_dialogs_are_skipped() {
    init_tracing();
    let mut hidden = dialog("dlg-hidden", 50, 0.0, 0.0, 800.0, 600.0, vec![]);
    hidden
        .attributes
        .insert("style".into(), "z-index: 50; display: none".into());
    let snapshot = snap(page(vec![
        hidden,
        dialog("dlg-shown", 10, 0.0, 0.0, 800.0, 600.0, vec![]),
    ]))
    .await;

    let container = active_container(&snapshot, &LegacyAdapter).unwrap();
    assert_eq!(container.id, "dlg-shown");
}

#[tokio::test]
async fn missing_id_falls_back_to_the_structural_path() {
    init_tracing();
    let mut anon = dialog("x", 10, 0.0, 0.0, 800.0, 600.0, vec![]);
    anon.attributes.remove("id");
    let snapshot = snap(page(vec![anon])).await;

    let container = active_container(&snapshot, &LegacyAdapter).unwrap();
    assert_eq!(container.id, "container@0");
}

#[tokio::test]
async fn title_comes_from_the_title_bar() {
    init_tracing();
    let snapshot = snap(page(vec![dialog(
        "dlg-titled",
        10,
        0.0,
        0.0,
        800.0,
        600.0,
        vec![el("div", &[("class", "ttitlebar")], "Cadastro de Clientes", vec![])],
    )]))
    .await;

    let container = active_container(&snapshot, &LegacyAdapter).unwrap();
    assert_eq!(container.title, "Cadastro de Clientes");
}

#[tokio::test]
async fn shadow_flavor_detects_its_own_containers() {
    init_tracing();
    let wa_dialog = with_bounds(
        el(
            "wa-dialog",
            &[("id", "wa-main"), ("title", "Pedidos")],
            "",
            vec![el("wa-loading", &[], "", vec![])],
        ),
        0.0,
        0.0,
        800.0,
        600.0,
    );
    let snapshot = snap(page(vec![wa_dialog])).await;

    let adapter = ShadowAdapter;
    let container = active_container(&snapshot, &adapter).unwrap();
    assert_eq!(container.id, "wa-main");
    assert_eq!(container.title, "Pedidos");

    let node = snapshot.node_at(&container.path).unwrap();
    assert!(adapter.is_blocked(node));
}

#[tokio::test]
async fn no_candidates_yields_none() {
    init_tracing();
    let snapshot = snap(page(vec![el("div", &[], "plain page", vec![])])).await;
    assert!(active_container(&snapshot, &LegacyAdapter).is_none());
}
