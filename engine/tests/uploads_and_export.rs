mod common;

use pretty_assertions::assert_eq;

use common::{png, resolver, BLUE, RED};
use mockup_engine::{
    AssetHandle, AssetResolver, EngineConfig, EngineError, FileCandidate, LayerId, LayerTransform, MemoryAssetStore,
    MockupEngine, ProductKind, SurfaceSize, UserAssetSource, VariantDescriptor, ViewId, ViewSnapshot,
};

async fn mounted_tee() -> (MockupEngine, AssetResolver<MemoryAssetStore>) {
    let resolver = resolver(&["tee/White - Front", "tee/White - Back"]);
    let mut engine = MockupEngine::new(EngineConfig::default());
    engine.mount_with(ProductKind::apparel("tee"), VariantDescriptor::default(), &resolver).await.unwrap();
    (engine, resolver)
}

#[tokio::test]
async fn removing_an_upload_cascades_across_views() {
    let (mut engine, resolver) = mounted_tee().await;
    let handle = engine.register_upload(&FileCandidate::new("logo.png", None, png(30, 30, BLUE))).unwrap();

    let on_front = engine.add_layer_from_upload(&handle).unwrap();
    let text = engine.add_text_layer(Some("keep me")).unwrap();
    engine.switch_view(&ViewId::new("back"), &resolver).await.unwrap();
    let on_back = engine.add_layer_from_upload(&handle).unwrap();
    let on_back_too = engine.add_layer_from_upload(&handle).unwrap();

    let thumbs = engine.thumbnails().unwrap();
    assert_eq!(thumbs.len(), 1);
    assert_eq!(thumbs[0].file_name, "logo.png");
    assert_eq!(thumbs[0].layers, vec![on_front, on_back, on_back_too]);

    // deleting one placed copy takes the upload and every other copy with it
    assert!(engine.select(on_back));
    let removed = engine.handle_key("Backspace").unwrap();
    assert_eq!(removed, vec![on_front, on_back, on_back_too]);

    assert!(engine.view(&ViewId::new("back")).unwrap().store().is_empty());
    let front = engine.view(&ViewId::new("front")).unwrap().store();
    assert_eq!(front.layers().iter().map(|l| l.id).collect::<Vec<_>>(), vec![text]);
    assert!(engine.thumbnails().unwrap().is_empty());
    assert!(!engine.library().contains(&handle));
    assert!(engine.surface().scene().unwrap().layers.is_empty());
    assert_eq!(engine.selected(), None);

    // stale ids are quiet no-ops
    assert!(!engine.select(on_back));
    assert_eq!(engine.update_transform(on_back, LayerTransform::centered(0.0, 0.0, 1.0)).unwrap(), None);
    assert!(matches!(engine.remove_upload(&handle), Err(EngineError::UnknownUpload(_))));
}

#[tokio::test]
async fn plain_layer_delete_keeps_the_upload() {
    let (mut engine, _resolver) = mounted_tee().await;
    let handle = engine.register_upload(&FileCandidate::new("logo.png", None, png(30, 30, BLUE))).unwrap();
    let placed = engine.add_layer_from_upload(&handle).unwrap();
    let text = engine.add_text_layer(None).unwrap();
    assert_eq!(engine.delete_selected().unwrap(), vec![text]);
    assert_eq!(engine.thumbnails().unwrap()[0].layers, vec![placed]);
    assert_eq!(engine.remove_upload(&handle).unwrap(), vec![placed]);
}

#[tokio::test]
async fn uploads_are_validated_per_file() {
    let mut config = EngineConfig::default();
    config.max_upload_bytes = 1024;
    let mut engine = MockupEngine::new(config);
    let files = vec![
        FileCandidate::new("ok.png", Some("image/png"), png(8, 8, RED)),
        FileCandidate::new("notes.pdf", None, vec![1, 2, 3]),
        FileCandidate::new("huge.png", None, vec![0; 2048]),
    ];
    let results = engine.register_uploads(&files);
    assert!(results[0].is_ok());
    let rejected: Vec<String> = results[1..]
        .iter()
        .map(|r| match r {
            Err(EngineError::UploadRejected { file, .. }) => file.clone(),
            other => panic!("unexpected result {:?}", other),
        })
        .collect();
    assert_eq!(rejected, vec!["notes.pdf".to_string(), "huge.png".to_string()]);
    assert_eq!(engine.uploads().entries().len(), 1);
}

#[tokio::test]
async fn export_flattens_background_and_layers_without_zoom() {
    let store = MemoryAssetStore::new().with("poster/Red - Front", png(60, 70, RED));
    let resolver = AssetResolver::new(store);
    let mut config = EngineConfig::default();
    config.surface = SurfaceSize { width: 60, height: 70 };
    let mut engine = MockupEngine::new(config);
    assert!(matches!(engine.export_current_view(), Err(EngineError::NotMounted)));

    engine.mount_with(ProductKind::flat("poster"), VariantDescriptor::named("Scarlet"), &resolver).await.unwrap();
    let handle = engine.register_upload(&FileCandidate::new("dot.png", None, png(10, 10, BLUE))).unwrap();
    let id = engine.add_layer_from_upload(&handle).unwrap();
    let bounds = engine.view(&ViewId::new("front")).unwrap().store().get(id).unwrap().world_bounds();
    assert!((bounds.width() - 36.0).abs() < 1e-9);

    let png_bytes = engine.export_current_view().unwrap();
    let flat = image::load_from_memory(&png_bytes).unwrap().to_rgba8();
    assert_eq!(flat.dimensions(), (60, 70));
    assert_eq!(*flat.get_pixel(30, 35), BLUE);
    assert_eq!(*flat.get_pixel(2, 2), RED);

    engine.zoom_in();
    engine.zoom_in();
    assert_eq!(engine.export_current_view().unwrap(), png_bytes);
    assert!(engine.export_current_view_data_url().unwrap().starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn snapshots_rebuild_another_session() {
    let (mut engine, _resolver) = mounted_tee().await;
    engine.add_text_layer(Some("hello\nworld")).unwrap();
    let asset = engine.resolve_user_asset(&UserAssetSource::Bytes(png(20, 10, RED))).unwrap();
    engine.add_image_layer(&asset).unwrap();
    engine.flip_selected().unwrap();
    let json = engine.export_snapshots_json().unwrap();
    let exported = engine.export_all_view_snapshots().unwrap();
    assert_eq!(exported.len(), 2);

    let (mut other, _resolver) = mounted_tee().await;
    other.restore_snapshots_json(&json).unwrap();
    assert_eq!(other.export_all_view_snapshots().unwrap()[0].layers, exported[0].layers);
    assert_eq!(other.surface().scene().unwrap().layers, exported[0].layers);

    let max_id = exported[0].layers.iter().map(|l| l.id).max().unwrap();
    let fresh = other.add_text_layer(None).unwrap();
    assert!(fresh > max_id);

    let bogus = vec![ViewSnapshot { view: ViewId::new("sleeve"), layers: Vec::new(), background: None }];
    assert!(matches!(other.restore_view_snapshots(bogus), Err(EngineError::UnknownView(_))));
}

#[tokio::test]
async fn restoring_one_view_never_reuses_ids_of_another() {
    let (mut engine, _resolver) = mounted_tee().await;
    let text = engine.add_text_layer(Some("front only")).unwrap();
    let handle = engine.register_upload(&FileCandidate::new("logo.png", None, png(30, 30, BLUE))).unwrap();
    let placed = engine.add_layer_from_upload(&handle).unwrap();
    let front = engine.view(&ViewId::new("front")).unwrap().store().get(placed).cloned().unwrap();

    // ids saved from another session collide with the front and with each other
    let mut copy = front.clone();
    copy.id = text;
    let mut twin = copy.clone();
    twin.z_index += 1;
    let mut foreign = front.clone();
    foreign.source = Some(AssetHandle::new("upload:1"));
    foreign.z_index += 2;
    let back = ViewSnapshot { view: ViewId::new("back"), layers: vec![copy, twin, foreign], background: None };
    engine.restore_view_snapshots(vec![back]).unwrap();

    let back_ids: Vec<LayerId> = engine.view(&ViewId::new("back")).unwrap().store().layers().iter().map(|l| l.id).collect();
    assert_eq!(back_ids.len(), 3);
    for (i, id) in back_ids.iter().enumerate() {
        assert!(*id != text && *id != placed);
        assert!(!back_ids[i + 1..].contains(id));
    }

    let mut removed = engine.remove_upload(&handle).unwrap();
    removed.sort();
    let mut expected = vec![placed, back_ids[0], back_ids[1]];
    expected.sort();
    assert_eq!(removed, expected);

    let front_ids: Vec<LayerId> = engine.view(&ViewId::new("front")).unwrap().store().layers().iter().map(|l| l.id).collect();
    assert_eq!(front_ids, vec![text]);
    // a handle this engine never registered is not linked, so it survives the cascade
    let left = engine.view(&ViewId::new("back")).unwrap().store().layers().to_vec();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, back_ids[2]);
    assert_eq!(left[0].source, Some(AssetHandle::new("upload:1")));
}
