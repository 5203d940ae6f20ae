use overlay_renderer::overlay::{FileDrop, OverlayShared};

#[test]
fn drops_queued_by_the_window_reach_the_frame_loop_once() {
    let shared = OverlayShared::default();
    shared.drops.push(FileDrop {
        path: "C:/downloads/report.pdf".into(),
        point: (120, 80),
    });
    shared.drops.push(FileDrop {
        path: "C:/downloads/image.png".into(),
        point: (121, 81),
    });

    let drained = shared.drops.take_all();
    assert_eq!(drained.len(), 2);
    assert_eq!(drained[0].point, (120, 80));
    assert!(shared.drops.take_all().is_empty());
}

#[test]
fn drop_points_are_client_coordinates() {
    let shared = OverlayShared::default();
    shared.set_client_size(640, 480);
    shared.drops.push(FileDrop {
        path: "notes.txt".into(),
        point: (10, 20),
    });
    let drained = shared.drops.take_all();
    let (w, h) = shared.client_size();
    assert!(drained[0].point.0 < w && drained[0].point.1 < h);
}
