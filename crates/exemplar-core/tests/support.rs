//! Support set sampling against generated pools.

mod common;

use common::{build_category, context, write_png, ALPHA, BETA};
use exemplar_core::{ImageLister, SupportSetBuilder};

fn classes(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[tokio::test]
async fn test_same_seed_same_exemplars() {
    let dir = tempfile::tempdir().unwrap();
    let layout = build_category(dir.path());
    let context = context();
    let lister = ImageLister::new(&context.config().processing);

    let builder = SupportSetBuilder::new(layout, lister, context.extractor().clone());
    let first = builder.build(&classes(&["alpha", "beta"]), 3, 42).await;
    let second = builder.build(&classes(&["alpha", "beta"]), 3, 42).await;

    assert_eq!(first.image_ids(), second.image_ids());
    assert_eq!(first.exemplar_count(), 6);
    assert!(first.warnings().is_empty());
    assert_eq!(first.seed(), 42);
}

#[tokio::test]
async fn test_class_draw_independent_of_class_list() {
    let dir = tempfile::tempdir().unwrap();
    let layout = build_category(dir.path());
    let context = context();
    let lister = ImageLister::new(&context.config().processing);
    let builder = SupportSetBuilder::new(layout, lister, context.extractor().clone());

    let both = builder.build(&classes(&["alpha", "beta"]), 2, 7).await;
    let alone = builder.build(&classes(&["alpha"]), 2, 7).await;
    assert_eq!(both.exemplars("alpha").unwrap().len(), 2);
    assert_eq!(
        both.image_ids()["alpha"],
        alone.image_ids()["alpha"]
    );
}

#[tokio::test]
async fn test_short_pool_is_degraded_and_open_set_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let layout = build_category(dir.path());
    let pool = layout.support_root().join("shot_5");
    write_png(&pool.join("unknown_object").join("u.png"), BETA, 5);
    let context = context();
    let lister = ImageLister::new(&context.config().processing);
    let builder = SupportSetBuilder::new(layout, lister, context.extractor().clone());

    let set = builder
        .build(&classes(&["alpha", "unknown_object", "missing"]), 10, 1)
        .await;

    assert_eq!(set.class_names(), vec!["alpha"]);
    assert_eq!(set.exemplars("alpha").unwrap().len(), 5);
    assert_eq!(set.shot_count(), 10);
    assert_eq!(set.warnings().len(), 2);
    assert!(set.warnings()[0].contains("5 of 10"));
    assert!(set.warnings()[1].contains("\"missing\""));
}

#[tokio::test]
async fn test_failed_exemplar_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let layout = build_category(dir.path());
    let pool = layout.support_root().join("shot_5").join("alpha");
    std::fs::write(pool.join("s00.png"), b"broken").unwrap();
    write_png(&pool.join("s50.png"), ALPHA, 50);

    let context = context();
    let lister = ImageLister::new(&context.config().processing);
    let builder = SupportSetBuilder::new(layout, lister, context.extractor().clone());

    // Six images, one broken: asking for five still yields five.
    let set = builder.build(&classes(&["alpha"]), 5, 3).await;
    let ids = &set.image_ids()["alpha"];
    assert_eq!(ids.len(), 5);
    assert!(!ids.iter().any(|id| id.ends_with("s00.png")));
}
