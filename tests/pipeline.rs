//! End-to-end: real PNG scans on disk → detection → export to real JPEGs.

use cardcrop::batch::{BatchEvent, BatchSettings, BatchState};
use cardcrop::config::ExportSettings;
use cardcrop::crop::{Edge, Offsets};
use cardcrop::detection::WhiteThreshold;
use cardcrop::export;
use cardcrop::imaging::RustBackend;
use cardcrop::scan;
use cardcrop::workspace::{Overrides, Workspace, paths_in};
use image::{Rgba, RgbaImage};
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

const WHITE: Rgba<u8> = Rgba([252, 252, 250, 255]);
const INK: Rgba<u8> = Rgba([90, 40, 30, 255]);

/// Save a white scan with a solid card inset by `margin` on every side.
fn write_scan(dir: &Path, name: &str, width: u32, height: u32, margin: u32) {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        let inside = x >= margin && x < width - margin && y >= margin && y < height - margin;
        if inside { INK } else { WHITE }
    });
    img.save(dir.join(name)).unwrap();
}

fn set_mtime(path: &Path, secs_after_epoch: u64) {
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs_after_epoch))
        .unwrap();
}

#[test]
fn detect_and_export_real_files() {
    let tmp = TempDir::new().unwrap();
    write_scan(tmp.path(), "front.png", 400, 300, 40);
    write_scan(tmp.path(), "back.png", 300, 400, 30);
    fs::write(tmp.path().join("corrupt.png"), b"not a png").unwrap();
    fs::write(tmp.path().join("notes.txt"), b"ignored").unwrap();
    set_mtime(&tmp.path().join("front.png"), 2_000);
    set_mtime(&tmp.path().join("back.png"), 1_000);

    let mut ws = Workspace::open(paths_in(tmp.path()), &Overrides::default()).unwrap();

    assert_eq!(ws.batch().len(), 2);
    assert_eq!(ws.failures().len(), 1);
    assert_eq!(ws.failures()[0].name, "corrupt.png");

    // margin = round(300 * 0.005) = 2 (1.5 rounds away from zero)
    let front = ws.batch().find_by_name("front.png").unwrap();
    assert_eq!(front.auto_offsets, Offsets::uniform(38));
    let back = ws.batch().find_by_name("back.png").unwrap();
    assert_eq!(back.auto_offsets, Offsets::uniform(28));

    let report = ws.export(None).unwrap();
    assert_eq!(report.next_index, 3);

    let out = tmp.path().join("cropped");
    // back.png is older, so it is exported first
    assert_eq!(image::image_dimensions(out.join("card1.jpg")).unwrap(), (244, 344));
    assert_eq!(image::image_dimensions(out.join("card2.jpg")).unwrap(), (324, 224));
}

#[test]
fn large_scans_are_downscaled_on_export() {
    let tmp = TempDir::new().unwrap();
    write_scan(tmp.path(), "big.png", 1200, 800, 100);

    let overrides = Overrides {
        max_dimension: Some(250.0),
        base_name: Some("deck".into()),
        ..Default::default()
    };
    let mut ws = Workspace::open(paths_in(tmp.path()), &overrides).unwrap();
    ws.export(None).unwrap();

    // margin = 4, crop = 1200 - 2*96 = 1008 by 800 - 2*96 = 608
    let dims = image::image_dimensions(tmp.path().join("cropped/deck1.jpg")).unwrap();
    assert_eq!(dims, (250, 151));
}

#[test]
fn manual_crop_survives_between_runs() {
    let tmp = TempDir::new().unwrap();
    write_scan(tmp.path(), "a.png", 200, 200, 20);

    let mut ws = Workspace::open(paths_in(tmp.path()), &Overrides::default()).unwrap();
    ws.edit("a.png", &[(Edge::Left, 0), (Edge::Right, 0)]).unwrap();
    ws.save().unwrap();

    let overrides = Overrides {
        threshold: Some(210),
        ..Default::default()
    };
    let ws = Workspace::open(paths_in(tmp.path()), &overrides).unwrap();
    let item = &ws.batch().items()[0];
    assert!(item.is_manual);
    assert_eq!(item.current_offsets.left, 0);
    assert_eq!(item.current_offsets.right, 0);
    // margin = 1
    assert_eq!(item.current_offsets.top, 19);
}

#[test]
fn match_first_crop_across_sizes_with_library_api() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("scans");
    fs::create_dir_all(&source).unwrap();
    write_scan(&source, "a-ref.png", 200, 200, 20);
    write_scan(&source, "b-small.png", 30, 90, 0);

    let backend = RustBackend::new();
    let report = scan::scan(&backend, &source, &[]).unwrap();
    let mut batch = BatchState::new(BatchSettings {
        threshold: WhiteThreshold::new(245),
        match_first_crop: true,
    });
    batch.load_all(report.loaded);

    let reference = batch.reference_id().unwrap();
    batch
        .apply(BatchEvent::SetManual {
            id: reference,
            manual: true,
        })
        .unwrap();
    for edge in Edge::ALL {
        batch
            .apply(BatchEvent::Edit {
                id: reference,
                edge,
                value: 20,
            })
            .unwrap();
    }

    let small = batch.find_by_name("b-small.png").unwrap();
    assert!(small.current_offsets.is_valid_for(small.dimensions()));

    let out = tmp.path().join("out");
    let settings = ExportSettings::default();
    let exported = export::export(&batch, &settings, &out, None).unwrap();
    assert_eq!(exported.exported.len(), 2);
    for file in &exported.exported {
        let (w, h) = image::image_dimensions(&file.output).unwrap();
        assert!(w >= 1 && h >= 1);
        assert_eq!((w, h), (file.width, file.height));
    }
}
